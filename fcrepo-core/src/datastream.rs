//! Datastreams: named sub-resources of a repository object

use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::api::RepositoryApi;
use crate::attributes::DatastreamAttribute;
use crate::checksum;
use crate::error::{FedoraError, Result};
use crate::persistence::{self, SaveAction};
use crate::profile::{Loaded, Profile, ProfileCache};
use crate::tracker::ChangeTracker;
use crate::xml::{self, ListedDatastream};

/// Control groups whose content lives outside the repository
const EXTERNAL_CONTROL_GROUPS: &[&str] = &["E", "R"];

/// A datastream of a repository object.
///
/// The profile is fetched on first use. A datastream with an `as_of` date is
/// a historical view and rejects every mutation.
#[derive(Debug)]
pub struct Datastream {
    pid: Option<String>,
    dsid: String,
    api: Arc<RepositoryApi>,
    as_of: Option<String>,
    profile: ProfileCache,
    attributes: ChangeTracker<DatastreamAttribute>,
    /// Staged replacement content
    content: Option<Bytes>,
    content_changed: bool,
    remote_content: OnceCell<Bytes>,
}

impl Datastream {
    /// Datastream whose remote state is looked up lazily
    pub fn new(pid: Option<String>, dsid: impl Into<String>, api: Arc<RepositoryApi>) -> Self {
        Self {
            pid,
            dsid: dsid.into(),
            api,
            as_of: None,
            profile: ProfileCache::new(),
            attributes: ChangeTracker::new(),
            content: None,
            content_changed: false,
            remote_content: OnceCell::new(),
        }
    }

    /// Read-only view of a datastream as of a point in time
    pub fn as_of(
        pid: impl Into<String>,
        dsid: impl Into<String>,
        as_of: impl Into<String>,
        api: Arc<RepositoryApi>,
    ) -> Self {
        let mut datastream = Self::new(Some(pid.into()), dsid, api);
        datastream.as_of = Some(as_of.into());
        datastream
    }

    /// Datastream taken from an object listing
    pub(crate) fn listed(
        pid: &str,
        entry: ListedDatastream,
        as_of: Option<&str>,
        api: Arc<RepositoryApi>,
    ) -> Self {
        let mut datastream = Self::new(Some(pid.to_string()), entry.dsid, api);
        datastream.as_of = as_of.map(str::to_string);
        if let Some(profile) = entry.profile {
            datastream.profile.replace(profile);
        }
        datastream
    }

    pub fn dsid(&self) -> &str {
        &self.dsid
    }

    pub fn pid(&self) -> Option<&str> {
        self.pid.as_deref()
    }

    /// Point in time this view was taken at, for historical datastreams
    pub fn as_of_date_time(&self) -> Option<&str> {
        self.as_of.as_deref()
    }

    pub fn is_read_only(&self) -> bool {
        self.as_of.is_some()
    }

    pub(crate) fn attach(&mut self, pid: &str) {
        if self.pid.is_none() {
            self.pid = Some(pid.to_string());
        }
    }

    async fn loaded(&self) -> Result<&Loaded> {
        self.profile
            .load(|| async {
                match self.pid.as_deref() {
                    Some(pid) => {
                        self.api
                            .datastream_profile(pid, &self.dsid, self.as_of.as_deref())
                            .await
                    }
                    None => Ok(None),
                }
            })
            .await
    }

    pub async fn profile(&self) -> Result<&Profile> {
        Ok(&self.loaded().await?.profile)
    }

    /// True until the datastream exists remotely
    pub async fn is_new(&self) -> Result<bool> {
        Ok(!self.loaded().await?.exists)
    }

    /// True when any attribute was changed or new content was staged
    pub fn is_changed(&self) -> bool {
        self.attributes.is_changed() || self.content_changed
    }

    /// True when staged content differs from the remote content
    pub fn is_content_changed(&self) -> bool {
        self.content_changed
    }

    pub fn changes(&self) -> Vec<(DatastreamAttribute, Option<String>)> {
        self.attributes.changes()
    }

    pub async fn attribute(&self, attr: DatastreamAttribute) -> Result<Option<String>> {
        let profile = self.profile().await?;
        Ok(self.attributes.resolve(attr, profile))
    }

    pub async fn set_attribute(&mut self, attr: DatastreamAttribute, value: Option<String>) -> Result<()> {
        self.ensure_writable()?;
        let profile = self.profile().await?.clone();
        self.attributes.assign(attr, value, &profile)?;
        Ok(())
    }

    pub async fn label(&self) -> Result<Option<String>> {
        self.attribute(DatastreamAttribute::Label).await
    }

    pub async fn set_label(&mut self, label: impl Into<String>) -> Result<()> {
        self.set_attribute(DatastreamAttribute::Label, Some(label.into())).await
    }

    pub async fn mime_type(&self) -> Result<Option<String>> {
        self.attribute(DatastreamAttribute::MimeType).await
    }

    pub async fn set_mime_type(&mut self, mime_type: impl Into<String>) -> Result<()> {
        self.set_attribute(DatastreamAttribute::MimeType, Some(mime_type.into())).await
    }

    pub async fn control_group(&self) -> Result<Option<String>> {
        self.attribute(DatastreamAttribute::ControlGroup).await
    }

    pub async fn set_control_group(&mut self, control_group: impl Into<String>) -> Result<()> {
        self.set_attribute(DatastreamAttribute::ControlGroup, Some(control_group.into()))
            .await
    }

    pub async fn versionable(&self) -> Result<bool> {
        Ok(self
            .attribute(DatastreamAttribute::Versionable)
            .await?
            .is_some_and(|v| v == "true"))
    }

    pub async fn set_versionable(&mut self, versionable: bool) -> Result<()> {
        self.set_attribute(DatastreamAttribute::Versionable, Some(versionable.to_string()))
            .await
    }

    pub async fn state(&self) -> Result<Option<String>> {
        self.attribute(DatastreamAttribute::State).await
    }

    pub async fn set_state(&mut self, state: impl Into<String>) -> Result<()> {
        self.set_attribute(DatastreamAttribute::State, Some(state.into())).await
    }

    pub async fn checksum_type(&self) -> Result<Option<String>> {
        self.attribute(DatastreamAttribute::ChecksumType).await
    }

    pub async fn checksum(&self) -> Result<Option<String>> {
        self.attribute(DatastreamAttribute::Checksum).await
    }

    pub async fn location(&self) -> Result<Option<String>> {
        self.attribute(DatastreamAttribute::Location).await
    }

    pub async fn set_location(&mut self, location: impl Into<String>) -> Result<()> {
        self.set_attribute(DatastreamAttribute::Location, Some(location.into())).await
    }

    /// Alternate identifiers, stored as a space separated list
    pub async fn alt_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .attribute(DatastreamAttribute::AltIds)
            .await?
            .map(|ids| ids.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default())
    }

    /// Creation date of this datastream version, as reported by the server
    pub async fn create_date(&self) -> Result<Option<String>> {
        Ok(self.profile().await?.text("dsCreateDate").map(str::to_string))
    }

    async fn is_external(&self) -> Result<bool> {
        Ok(self
            .control_group()
            .await?
            .is_some_and(|group| EXTERNAL_CONTROL_GROUPS.contains(&group.as_str())))
    }

    async fn remote_content(&self) -> Result<Bytes> {
        let pid = self.require_pid()?;
        self.remote_content
            .get_or_try_init(|| {
                self.api
                    .datastream_content(pid, &self.dsid, self.as_of.as_deref())
            })
            .await
            .cloned()
    }

    /// Staged content if any, else the remote content of an existing datastream
    pub async fn content(&self) -> Result<Option<Bytes>> {
        if let Some(content) = &self.content {
            return Ok(Some(content.clone()));
        }
        if self.is_new().await? {
            return Ok(None);
        }
        self.remote_content().await.map(Some)
    }

    /// Stage replacement content.
    ///
    /// For an existing datastream the remote content is fetched and compared;
    /// staging identical bytes does not count as a change.
    pub async fn set_content(&mut self, content: impl Into<Bytes>) -> Result<()> {
        self.ensure_writable()?;
        let content = content.into();
        let changed = if self.is_new().await? {
            !content.is_empty()
        } else if self.is_external().await? {
            false
        } else {
            self.remote_content().await? != content
        };
        self.content = Some(content);
        self.content_changed = changed;
        Ok(())
    }

    /// Whether there is anything to create a new datastream from
    pub async fn has_content(&self) -> Result<bool> {
        if self.content.as_ref().is_some_and(|c| !c.is_empty()) {
            return Ok(true);
        }
        Ok(self.location().await?.is_some_and(|l| !l.is_empty()))
    }

    pub async fn save_action(&self) -> Result<SaveAction> {
        let new = self.is_new().await?;
        let has_content = self.has_content().await?;
        Ok(persistence::decide(
            new,
            self.is_changed(),
            self.content_changed,
            has_content,
        ))
    }

    /// Create or update the datastream remotely.
    ///
    /// The server's response profile replaces the cached one; dirty flags
    /// are cleared and staged content becomes the known remote content.
    pub async fn save(&mut self) -> Result<()> {
        self.ensure_writable()?;
        let pid = self.require_pid()?.to_string();

        let body = if self.is_new().await? {
            let params = self.attributes.params_with_defaults(&DatastreamAttribute::ALL);
            self.api
                .add_datastream(&pid, &self.dsid, &params, self.content.clone())
                .await?
        } else {
            let content = if self.content_changed {
                self.content.clone()
            } else {
                None
            };
            self.api
                .modify_datastream(&pid, &self.dsid, &self.attributes.dirty_params(), content)
                .await?
        };
        tracing::debug!("Saved datastream {}/{}", pid, self.dsid);

        let returned = std::str::from_utf8(&body)
            .ok()
            .and_then(|text| xml::flatten_profile(text).ok())
            .filter(|profile| !profile.is_empty());
        match returned {
            Some(profile) => self.profile.replace(profile),
            None => self.profile.invalidate(),
        }

        self.attributes.commit();
        if let Some(content) = self.content.take() {
            self.remote_content = OnceCell::new_with(Some(content));
        }
        self.content_changed = false;
        Ok(())
    }

    /// Purge the datastream remotely
    pub async fn delete(&mut self) -> Result<()> {
        self.ensure_writable()?;
        let pid = self.require_pid()?.to_string();
        self.api.purge_datastream(&pid, &self.dsid).await?;
        self.profile = ProfileCache::absent();
        self.attributes = ChangeTracker::new();
        self.content = None;
        self.content_changed = false;
        self.remote_content = OnceCell::new();
        Ok(())
    }

    /// Earlier versions of this datastream as read-only views
    pub async fn versions(&self) -> Result<Vec<Datastream>> {
        let Some(pid) = self.pid.as_deref() else {
            return Ok(Vec::new());
        };
        if self.is_new().await? {
            return Ok(Vec::new());
        }
        let history = self.api.datastream_history(pid, &self.dsid).await?;
        Ok(history
            .into_iter()
            .filter_map(|entry| {
                let profile = entry.profile?;
                let as_of = profile.text("dsCreateDate")?.to_string();
                let mut version = Datastream::as_of(pid, &self.dsid, as_of, self.api.clone());
                version.profile.replace(profile);
                Some(version)
            })
            .collect())
    }

    /// Compare the content digest with the recorded checksum.
    ///
    /// `None` when there is no content, no checksum, or the checksum type
    /// cannot be computed locally.
    pub async fn verify_checksum(&self) -> Result<Option<bool>> {
        let (Some(kind), Some(expected)) = (self.checksum_type().await?, self.checksum().await?) else {
            return Ok(None);
        };
        let Some(content) = self.content().await? else {
            return Ok(None);
        };
        Ok(checksum::digest(&kind, &content).map(|actual| actual.eq_ignore_ascii_case(&expected)))
    }

    fn ensure_writable(&self) -> Result<()> {
        match &self.as_of {
            Some(as_of) => Err(FedoraError::ImmutableWrite(format!(
                "datastream {} as of {} is a historical version",
                self.dsid, as_of
            ))),
            None => Ok(()),
        }
    }

    fn require_pid(&self) -> Result<&str> {
        self.pid.as_deref().ok_or_else(|| {
            FedoraError::Validation(format!(
                "datastream {} belongs to an object without a pid",
                self.dsid
            ))
        })
    }
}
