//! Fedora Commons client core
//!
//! Object model over the Fedora 3 REST API including:
//! - Repository objects and their datastreams with lazy profiles
//! - Change tracking and save decisions
//! - Error translation for transport failures
//! - Content models and point-in-time version snapshots
//! - In-memory transport for tests and offline use

pub mod error;
pub mod locator;
pub mod transport;
pub mod api;
pub mod xml;
pub mod profile;
pub mod attributes;
pub mod tracker;
pub mod persistence;
pub mod datastream;
pub mod object;
pub mod models;
pub mod versions;
pub mod checksum;
pub mod memory;

pub use api::{object_uri, translate, RepositoryApi, HAS_MODEL};
pub use attributes::{Attribute, DatastreamAttribute, ObjectAttribute, STATES};
pub use datastream::Datastream;
pub use error::{FedoraError, Result, TransportError};
pub use locator::{Method, Operation, Params, Request};
pub use memory::MemoryTransport;
pub use models::Models;
pub use object::DigitalObject;
pub use persistence::SaveAction;
pub use profile::{canonicalize_timestamp, Profile, ProfileValue};
pub use transport::Transport;
pub use versions::VersionSnapshot;
