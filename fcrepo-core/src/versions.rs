//! Point-in-time object snapshots

use std::sync::Arc;

use crate::api::RepositoryApi;
use crate::attributes::ObjectAttribute;
use crate::datastream::Datastream;
use crate::error::{FedoraError, Result};
use crate::profile::{Profile, ProfileCache};
use crate::tracker::ChangeTracker;

/// Read-only view of an object as of one entry of its history.
///
/// Every lookup carries the snapshot date as `asOfDateTime`; setters always
/// fail.
#[derive(Debug)]
pub struct VersionSnapshot {
    pid: String,
    as_of: String,
    api: Arc<RepositoryApi>,
    profile: ProfileCache,
}

impl VersionSnapshot {
    pub fn new(pid: impl Into<String>, as_of: impl Into<String>, api: Arc<RepositoryApi>) -> Self {
        Self {
            pid: pid.into(),
            as_of: as_of.into(),
            api,
            profile: ProfileCache::new(),
        }
    }

    pub fn pid(&self) -> &str {
        &self.pid
    }

    /// History timestamp, verbatim
    pub fn as_of_date_time(&self) -> &str {
        &self.as_of
    }

    pub async fn profile(&self) -> Result<&Profile> {
        let loaded = self
            .profile
            .load(|| self.api.object_profile(&self.pid, Some(self.as_of.as_str())))
            .await?;
        Ok(&loaded.profile)
    }

    pub async fn attribute(&self, attr: ObjectAttribute) -> Result<Option<String>> {
        let profile = self.profile().await?;
        Ok(ChangeTracker::new().resolve(attr, profile))
    }

    pub fn set_attribute(&mut self, attr: ObjectAttribute, _value: Option<String>) -> Result<()> {
        Err(FedoraError::ImmutableWrite(format!(
            "cannot set {:?} on {} as of {}",
            attr, self.pid, self.as_of
        )))
    }

    pub async fn label(&self) -> Result<Option<String>> {
        self.attribute(ObjectAttribute::Label).await
    }

    pub fn set_label(&mut self, label: impl Into<String>) -> Result<()> {
        self.set_attribute(ObjectAttribute::Label, Some(label.into()))
    }

    pub async fn owner_id(&self) -> Result<Option<String>> {
        self.attribute(ObjectAttribute::OwnerId).await
    }

    pub fn set_owner_id(&mut self, owner_id: impl Into<String>) -> Result<()> {
        self.set_attribute(ObjectAttribute::OwnerId, Some(owner_id.into()))
    }

    pub async fn state(&self) -> Result<Option<String>> {
        self.attribute(ObjectAttribute::State).await
    }

    pub fn set_state(&mut self, state: impl Into<String>) -> Result<()> {
        self.set_attribute(ObjectAttribute::State, Some(state.into()))
    }

    pub async fn last_modified_date(&self) -> Result<Option<String>> {
        self.attribute(ObjectAttribute::LastModifiedDate).await
    }

    /// Datastreams as they were at the snapshot date
    pub async fn datastreams(&self) -> Result<Vec<Datastream>> {
        let listing = self.api.datastreams(&self.pid, Some(self.as_of.as_str())).await?;
        Ok(listing
            .into_iter()
            .map(|entry| Datastream::listed(&self.pid, entry, Some(self.as_of.as_str()), self.api.clone()))
            .collect())
    }

    /// One datastream as it was at the snapshot date
    pub fn datastream(&self, dsid: &str) -> Datastream {
        Datastream::as_of(self.pid.as_str(), dsid, self.as_of.as_str(), self.api.clone())
    }
}
