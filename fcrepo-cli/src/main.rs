//! fcrepo: command-line client for Fedora Commons repositories.
//!
//! # Usage
//!
//! ```bash
//! # Show an object profile
//! fcrepo --url http://localhost:8080/fedora show demo:1
//!
//! # Change object attributes
//! fcrepo set demo:1 --label "New label" --state I
//!
//! # Upload datastream content
//! fcrepo put-datastream demo:1 DESC --file desc.txt --mime-type text/plain
//!
//! # Manage content models
//! fcrepo models demo:1 add info:fedora/demo:Model
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use fcrepo_core::{DigitalObject, ObjectAttribute, RepositoryApi};
use fcrepo_http::ClientConfig;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "fcrepo")]
#[command(version = "0.1.0")]
#[command(about = "Fedora Commons repository client")]
struct Cli {
    /// Client configuration file (TOML)
    #[arg(short, long, global = true, default_value = "fedora.toml")]
    config: PathBuf,

    /// Repository base URL, overrides config and FEDORA_URL
    #[arg(long, global = true)]
    url: Option<String>,

    /// User name for HTTP basic authentication
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// Password for HTTP basic authentication
    #[arg(short, long, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show an object profile
    Show {
        pid: String,
        /// Print the flattened profile as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the datastreams of an object
    Datastreams { pid: String },

    /// List the recorded versions of an object
    Versions { pid: String },

    /// Change object attributes
    Set {
        pid: String,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        owner: Option<String>,
        /// A (active), I (inactive) or D (deleted)
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        log_message: Option<String>,
    },

    /// Create an object
    Create {
        /// Pid to create; the server assigns one when omitted
        pid: Option<String>,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        owner: Option<String>,
    },

    /// Purge an object
    Purge { pid: String },

    /// Ask the server for a fresh pid
    #[command(name = "next-pid")]
    NextPid {
        #[arg(long)]
        namespace: Option<String>,
    },

    /// Write datastream content to stdout
    Cat {
        pid: String,
        dsid: String,
        /// Read the version valid at this date
        #[arg(long)]
        as_of: Option<String>,
    },

    /// Create or replace a datastream
    #[command(name = "put-datastream")]
    PutDatastream {
        pid: String,
        dsid: String,
        /// File holding the new content
        #[arg(short, long)]
        file: Option<PathBuf>,
        #[arg(long)]
        mime_type: Option<String>,
        #[arg(long)]
        label: Option<String>,
        /// X, M, E or R
        #[arg(long)]
        control_group: Option<String>,
        /// External location for E and R datastreams
        #[arg(long)]
        location: Option<String>,
    },

    /// Purge a datastream
    #[command(name = "purge-datastream")]
    PurgeDatastream { pid: String, dsid: String },

    /// Verify a datastream checksum
    Verify { pid: String, dsid: String },

    /// List or change content models
    Models {
        pid: String,
        #[command(subcommand)]
        action: Option<ModelAction>,
    },
}

#[derive(Subcommand, Debug)]
enum ModelAction {
    Add { model: String },
    Remove { model: String },
    /// Replace every model with the given list
    Set { models: Vec<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("fcrepo=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let api = connect(&cli)?;

    match cli.command {
        Commands::Show { pid, json } => cmd_show(api, pid, json).await,
        Commands::Datastreams { pid } => cmd_datastreams(api, pid).await,
        Commands::Versions { pid } => cmd_versions(api, pid).await,
        Commands::Set {
            pid,
            label,
            owner,
            state,
            log_message,
        } => {
            let changes = [
                (ObjectAttribute::Label, label),
                (ObjectAttribute::OwnerId, owner),
                (ObjectAttribute::State, state),
                (ObjectAttribute::LogMessage, log_message),
            ];
            cmd_set(api, pid, changes).await
        }
        Commands::Create { pid, label, owner } => cmd_create(api, pid, label, owner).await,
        Commands::Purge { pid } => cmd_purge(api, pid).await,
        Commands::NextPid { namespace } => cmd_next_pid(api, namespace).await,
        Commands::Cat { pid, dsid, as_of } => cmd_cat(api, pid, dsid, as_of).await,
        Commands::PutDatastream {
            pid,
            dsid,
            file,
            mime_type,
            label,
            control_group,
            location,
        } => {
            let options = PutOptions {
                file,
                mime_type,
                label,
                control_group,
                location,
            };
            cmd_put_datastream(api, pid, dsid, options).await
        }
        Commands::PurgeDatastream { pid, dsid } => cmd_purge_datastream(api, pid, dsid).await,
        Commands::Verify { pid, dsid } => cmd_verify(api, pid, dsid).await,
        Commands::Models { pid, action } => cmd_models(api, pid, action).await,
    }
}

/// Configuration file, then environment, then command-line flags
fn connect(cli: &Cli) -> Result<Arc<RepositoryApi>> {
    let mut config = ClientConfig::load(&cli.config)?.with_env()?;
    if let Some(url) = &cli.url {
        config.url = url.clone();
    }
    if let Some(user) = &cli.user {
        config.user = Some(user.clone());
    }
    if let Some(password) = &cli.password {
        config.password = Some(password.clone());
    }
    fcrepo_http::connect(&config).context("Failed to set up repository client")
}

async fn cmd_show(api: Arc<RepositoryApi>, pid: String, json: bool) -> Result<()> {
    let object = DigitalObject::find(&pid, api).await?;
    let profile = object.profile().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(profile)?);
        return Ok(());
    }

    println!("Object {}", pid);
    println!("  Label:     {}", display(object.label().await?));
    println!("  Owner:     {}", display(object.owner_id().await?));
    println!("  State:     {}", display(object.state().await?));
    println!("  Created:   {}", display(object.created_date().await?));
    println!("  Modified:  {}", display(object.last_modified_date().await?));
    for model in profile.values("objModels") {
        println!("  Model:     {}", model);
    }
    Ok(())
}

async fn cmd_datastreams(api: Arc<RepositoryApi>, pid: String) -> Result<()> {
    let mut object = DigitalObject::find(&pid, api).await?;
    let datastreams = object.datastreams().await?;
    if datastreams.is_empty() {
        println!("No datastreams.");
        return Ok(());
    }
    for (dsid, datastream) in datastreams.iter() {
        println!(
            "{:<16} {:<2} {:<24} {}",
            dsid,
            display(datastream.control_group().await?),
            display(datastream.mime_type().await?),
            display(datastream.label().await?)
        );
    }
    Ok(())
}

async fn cmd_versions(api: Arc<RepositoryApi>, pid: String) -> Result<()> {
    let object = DigitalObject::find(&pid, api).await?;
    for version in object.versions().await? {
        println!("{}  {}", version.as_of_date_time(), display(version.label().await?));
    }
    Ok(())
}

async fn cmd_set(
    api: Arc<RepositoryApi>,
    pid: String,
    changes: [(ObjectAttribute, Option<String>); 4],
) -> Result<()> {
    let mut object = DigitalObject::find(&pid, api).await?;
    for (attr, value) in changes {
        if let Some(value) = value {
            object.set_attribute(attr, Some(value)).await?;
        }
    }
    if !object.is_changed().await? {
        println!("Nothing to change.");
        return Ok(());
    }
    object.save().await?;
    println!("Updated {}", pid);
    if let Some(modified) = object.last_modified_date().await? {
        println!("  Modified:  {}", modified);
    }
    Ok(())
}

async fn cmd_create(
    api: Arc<RepositoryApi>,
    pid: Option<String>,
    label: Option<String>,
    owner: Option<String>,
) -> Result<()> {
    let mut attributes = Vec::new();
    if let Some(label) = label {
        attributes.push((ObjectAttribute::Label, label));
    }
    if let Some(owner) = owner {
        attributes.push((ObjectAttribute::OwnerId, owner));
    }
    let object = DigitalObject::create(pid.as_deref(), &attributes, api).await?;
    println!(
        "Created {}",
        object.pid().ok_or_else(|| anyhow!("server returned no pid"))?
    );
    Ok(())
}

async fn cmd_purge(api: Arc<RepositoryApi>, pid: String) -> Result<()> {
    let mut object = DigitalObject::find(&pid, api).await?;
    object.delete().await?;
    println!("Purged {}", pid);
    Ok(())
}

async fn cmd_next_pid(api: Arc<RepositoryApi>, namespace: Option<String>) -> Result<()> {
    println!("{}", api.next_pid(namespace.as_deref()).await?);
    Ok(())
}

async fn cmd_cat(
    api: Arc<RepositoryApi>,
    pid: String,
    dsid: String,
    as_of: Option<String>,
) -> Result<()> {
    let datastream = match as_of {
        Some(as_of) => fcrepo_core::Datastream::as_of(pid, dsid.clone(), as_of, api),
        None => fcrepo_core::Datastream::new(Some(pid), dsid.clone(), api),
    };
    let content = datastream
        .content()
        .await?
        .ok_or_else(|| anyhow!("Datastream {} does not exist", dsid))?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&content)?;
    stdout.flush()?;
    Ok(())
}

struct PutOptions {
    file: Option<PathBuf>,
    mime_type: Option<String>,
    label: Option<String>,
    control_group: Option<String>,
    location: Option<String>,
}

async fn cmd_put_datastream(
    api: Arc<RepositoryApi>,
    pid: String,
    dsid: String,
    options: PutOptions,
) -> Result<()> {
    let mut object = DigitalObject::find(&pid, api).await?;
    let datastream = object.datastream(&dsid).await?;

    if let Some(control_group) = options.control_group {
        datastream.set_control_group(control_group).await?;
    }
    if let Some(mime_type) = options.mime_type {
        datastream.set_mime_type(mime_type).await?;
    }
    if let Some(label) = options.label {
        datastream.set_label(label).await?;
    }
    if let Some(location) = options.location {
        datastream.set_location(location).await?;
    }
    if let Some(path) = options.file {
        let content = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {:?}", path))?;
        datastream.set_content(bytes::Bytes::from(content)).await?;
    }

    let action = datastream.save_action().await?;
    tracing::info!("Datastream {}/{}: {:?}", pid, dsid, action);
    object.save().await?;
    println!("{:?} {}/{}", action, pid, dsid);
    Ok(())
}

async fn cmd_purge_datastream(api: Arc<RepositoryApi>, pid: String, dsid: String) -> Result<()> {
    let mut object = DigitalObject::find(&pid, api).await?;
    object.purge_datastream(&dsid).await?;
    println!("Purged {}/{}", pid, dsid);
    Ok(())
}

async fn cmd_verify(api: Arc<RepositoryApi>, pid: String, dsid: String) -> Result<()> {
    let mut object = DigitalObject::find(&pid, api).await?;
    let datastream = object.datastream(&dsid).await?;
    match datastream.verify_checksum().await? {
        Some(true) => println!("OK {}/{}", pid, dsid),
        Some(false) => return Err(anyhow!("Checksum mismatch for {}/{}", pid, dsid)),
        None => println!("No verifiable checksum for {}/{}", pid, dsid),
    }
    Ok(())
}

async fn cmd_models(api: Arc<RepositoryApi>, pid: String, action: Option<ModelAction>) -> Result<()> {
    let mut object = DigitalObject::find(&pid, api).await?;
    let mut models = object.models().await?;
    match action {
        Some(ModelAction::Add { model }) => models.add(&model).await?,
        Some(ModelAction::Remove { model }) => models.remove(&model).await?,
        Some(ModelAction::Set { models: wanted }) => models.replace_all(wanted.as_slice()).await?,
        None => {}
    }
    for model in models.as_slice() {
        println!("{}", model);
    }
    Ok(())
}

fn display(value: Option<String>) -> String {
    value.unwrap_or_else(|| "-".to_string())
}
