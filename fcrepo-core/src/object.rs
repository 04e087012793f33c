//! Repository objects
//!
//! A [`DigitalObject`] wraps one remote object. Its profile is fetched on
//! first use; a 404 means the object does not exist yet and will be created
//! by the next [`DigitalObject::save`].

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::{self, RepositoryApi};
use crate::attributes::ObjectAttribute;
use crate::datastream::Datastream;
use crate::error::{FedoraError, Result, TransportError};
use crate::locator::{self, Operation, Params};
use crate::models::Models;
use crate::persistence;
use crate::profile::{canonicalize_timestamp, Loaded, Profile, ProfileCache};
use crate::tracker::ChangeTracker;
use crate::versions::VersionSnapshot;

#[derive(Debug)]
pub struct DigitalObject {
    pid: Option<String>,
    api: Arc<RepositoryApi>,
    profile: ProfileCache,
    attributes: ChangeTracker<ObjectAttribute>,
    datastreams: Option<BTreeMap<String, Datastream>>,
    models: Option<Vec<String>>,
}

impl DigitalObject {
    /// Object handle; nothing is fetched until a value is needed.
    ///
    /// Without a pid the server assigns one on the first save.
    pub fn new(pid: Option<String>, api: Arc<RepositoryApi>) -> Self {
        Self {
            pid,
            api,
            profile: ProfileCache::new(),
            attributes: ChangeTracker::new(),
            datastreams: None,
            models: None,
        }
    }

    /// Load an existing object, failing with `NotFound` when it is absent
    pub async fn find(pid: &str, api: Arc<RepositoryApi>) -> Result<Self> {
        let object = Self::new(Some(pid.to_string()), api);
        if object.is_new().await? {
            let request = locator::build(Operation::Object { pid }, &Params::new());
            return Err(FedoraError::NotFound(TransportError::Status {
                status: 404,
                target: request.target(),
                body: String::new(),
            }));
        }
        Ok(object)
    }

    /// Load an object, or prepare a new one under `pid` if it is absent
    pub async fn find_or_initialize(pid: &str, api: Arc<RepositoryApi>) -> Result<Self> {
        let object = Self::new(Some(pid.to_string()), api);
        object.profile().await?;
        Ok(object)
    }

    /// Create an object right away with the given attributes
    pub async fn create(
        pid: Option<&str>,
        attributes: &[(ObjectAttribute, String)],
        api: Arc<RepositoryApi>,
    ) -> Result<Self> {
        let mut object = Self::new(pid.map(str::to_string), api);
        for (attr, value) in attributes {
            object.set_attribute(*attr, Some(value.clone())).await?;
        }
        object.save().await?;
        Ok(object)
    }

    pub fn pid(&self) -> Option<&str> {
        self.pid.as_deref()
    }

    /// `info:fedora/{pid}`
    pub fn uri(&self) -> Option<String> {
        self.pid.as_deref().map(api::object_uri)
    }

    async fn loaded(&self) -> Result<&Loaded> {
        self.profile
            .load(|| async {
                match self.pid.as_deref() {
                    Some(pid) => self.api.object_profile(pid, None).await,
                    None => Ok(None),
                }
            })
            .await
    }

    pub async fn profile(&self) -> Result<&Profile> {
        Ok(&self.loaded().await?.profile)
    }

    /// True until the object exists remotely
    pub async fn is_new(&self) -> Result<bool> {
        Ok(!self.loaded().await?.exists)
    }

    /// True when an attribute is dirty or the object still has to be created
    pub async fn is_changed(&self) -> Result<bool> {
        Ok(self.attributes.is_changed() || self.is_new().await?)
    }

    pub fn changes(&self) -> Vec<(ObjectAttribute, Option<String>)> {
        self.attributes.changes()
    }

    pub async fn attribute(&self, attr: ObjectAttribute) -> Result<Option<String>> {
        let profile = self.profile().await?;
        Ok(self.attributes.resolve(attr, profile))
    }

    pub async fn set_attribute(&mut self, attr: ObjectAttribute, value: Option<String>) -> Result<()> {
        let profile = self.profile().await?.clone();
        self.attributes.assign(attr, value, &profile)?;
        Ok(())
    }

    pub async fn label(&self) -> Result<Option<String>> {
        self.attribute(ObjectAttribute::Label).await
    }

    pub async fn set_label(&mut self, label: impl Into<String>) -> Result<()> {
        self.set_attribute(ObjectAttribute::Label, Some(label.into())).await
    }

    pub async fn owner_id(&self) -> Result<Option<String>> {
        self.attribute(ObjectAttribute::OwnerId).await
    }

    pub async fn set_owner_id(&mut self, owner_id: impl Into<String>) -> Result<()> {
        self.set_attribute(ObjectAttribute::OwnerId, Some(owner_id.into())).await
    }

    pub async fn state(&self) -> Result<Option<String>> {
        self.attribute(ObjectAttribute::State).await
    }

    /// Set the object state; only `A`, `I` and `D` are accepted
    pub async fn set_state(&mut self, state: impl Into<String>) -> Result<()> {
        self.set_attribute(ObjectAttribute::State, Some(state.into())).await
    }

    pub async fn log_message(&self) -> Result<Option<String>> {
        self.attribute(ObjectAttribute::LogMessage).await
    }

    pub async fn set_log_message(&mut self, message: impl Into<String>) -> Result<()> {
        self.set_attribute(ObjectAttribute::LogMessage, Some(message.into())).await
    }

    pub async fn last_modified_date(&self) -> Result<Option<String>> {
        self.attribute(ObjectAttribute::LastModifiedDate).await
    }

    pub async fn created_date(&self) -> Result<Option<String>> {
        self.attribute(ObjectAttribute::CreatedDate).await
    }

    /// Datastreams by dsid, listed from the server on first use
    pub async fn datastreams(&mut self) -> Result<&mut BTreeMap<String, Datastream>> {
        if self.datastreams.is_none() {
            let mut map = BTreeMap::new();
            if let (Some(pid), false) = (self.pid.as_deref(), self.is_new().await?) {
                for entry in self.api.datastreams(pid, None).await? {
                    let dsid = entry.dsid.clone();
                    map.insert(dsid, Datastream::listed(pid, entry, None, self.api.clone()));
                }
            }
            self.datastreams = Some(map);
        }
        Ok(self.datastreams.get_or_insert_with(BTreeMap::new))
    }

    /// Datastream by dsid; an unknown dsid yields a new datastream
    pub async fn datastream(&mut self, dsid: &str) -> Result<&mut Datastream> {
        let pid = self.pid.clone();
        let api = self.api.clone();
        let map = self.datastreams().await?;
        Ok(map
            .entry(dsid.to_string())
            .or_insert_with(|| Datastream::new(pid, dsid, api)))
    }

    /// Persist the object and every datastream that needs saving.
    ///
    /// Object-level changes are committed as soon as the server accepts them;
    /// a datastream failure aborts the walk and leaves the remaining
    /// datastreams dirty.
    pub async fn save(&mut self) -> Result<()> {
        if self.is_new().await? {
            let params = self.attributes.explicit_params();
            let assigned = self.api.ingest(self.pid.as_deref(), &params).await?;
            tracing::debug!("Created object {}", assigned);
            let pid = self.pid.get_or_insert(assigned).clone();
            self.profile.invalidate();
            self.attributes.commit();
            if let Some(datastreams) = self.datastreams.as_mut() {
                for datastream in datastreams.values_mut() {
                    datastream.attach(&pid);
                }
            }
        } else if self.attributes.is_changed() {
            let pid = self.require_pid()?.to_string();
            let stamp = self
                .api
                .modify_object(&pid, &self.attributes.dirty_params())
                .await?;
            tracing::debug!("Updated object {}", pid);
            self.attributes.commit();
            if let Some(stamp) = stamp {
                self.attributes.record_clean(
                    ObjectAttribute::LastModifiedDate,
                    Some(canonicalize_timestamp(&stamp)),
                );
            }
        }

        if let Some(datastreams) = self.datastreams.as_mut() {
            persistence::save_datastreams(datastreams, &mut self.attributes).await?;
        }
        Ok(())
    }

    /// Purge the object remotely
    pub async fn delete(&mut self) -> Result<()> {
        let pid = self.require_pid()?.to_string();
        self.api.purge_object(&pid).await?;
        tracing::debug!("Purged object {}", pid);
        self.profile = ProfileCache::absent();
        self.attributes = ChangeTracker::new();
        self.datastreams = None;
        self.models = None;
        Ok(())
    }

    /// Purge one datastream and drop it from the datastream map
    pub async fn purge_datastream(&mut self, dsid: &str) -> Result<()> {
        let pid = self.require_pid()?.to_string();
        self.api.purge_datastream(&pid, dsid).await?;
        if let Some(datastreams) = self.datastreams.as_mut() {
            datastreams.remove(dsid);
        }
        Ok(())
    }

    /// Content models of the object; each mutation is a relationship call
    pub async fn models(&mut self) -> Result<Models<'_>> {
        if self.models.is_none() {
            let members = self.profile().await?.values("objModels");
            self.models = Some(members);
        }
        let pid = self.pid.as_deref().ok_or_else(|| {
            FedoraError::Validation("models need an object with a pid".to_string())
        })?;
        let members = self.models.get_or_insert_with(Vec::new);
        Ok(Models::new(&self.api, pid, members))
    }

    /// Read-only views of every recorded version, oldest first as listed
    pub async fn versions(&self) -> Result<Vec<VersionSnapshot>> {
        let Some(pid) = self.pid.as_deref() else {
            return Ok(Vec::new());
        };
        if self.is_new().await? {
            return Ok(Vec::new());
        }
        let dates = self.api.object_versions(pid).await?;
        Ok(dates
            .into_iter()
            .map(|as_of| VersionSnapshot::new(pid, as_of, self.api.clone()))
            .collect())
    }

    fn require_pid(&self) -> Result<&str> {
        self.pid
            .as_deref()
            .ok_or_else(|| FedoraError::Validation("object has no pid yet".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::Method;
    use crate::memory::MemoryTransport;

    const PROFILE: &str = "<objectProfile><objLabel>label</objLabel><objOwnerId>owner</objOwnerId><objState>A</objState><objModels><model>info:fedora/fedora-system:FedoraObject-3.0</model><model>info:fedora/a:b</model></objModels><objLastModDate>2012-01-02:05:15:45.100Z</objLastModDate></objectProfile>";

    fn setup() -> (Arc<MemoryTransport>, Arc<RepositoryApi>) {
        let transport = Arc::new(MemoryTransport::new());
        let api = Arc::new(RepositoryApi::new(transport.clone()));
        (transport, api)
    }

    #[tokio::test]
    async fn test_missing_object_is_new() {
        let (transport, api) = setup();
        let object = DigitalObject::new(Some("pid".to_string()), api);

        assert!(object.is_new().await.unwrap());
        assert!(object.is_changed().await.unwrap());
        assert!(object.profile().await.unwrap().is_empty());
        assert_eq!(transport.count(Method::Get, "objects/pid"), 1);
    }

    #[tokio::test]
    async fn test_find_missing_object_fails() {
        let (_, api) = setup();
        let err = DigitalObject::find("pid", api).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_profile_attributes() {
        let (transport, api) = setup();
        transport.respond(Method::Get, "objects/pid", PROFILE);
        let object = DigitalObject::find("pid", api).await.unwrap();

        assert!(!object.is_new().await.unwrap());
        assert!(!object.is_changed().await.unwrap());
        assert_eq!(object.label().await.unwrap().as_deref(), Some("label"));
        assert_eq!(object.owner_id().await.unwrap().as_deref(), Some("owner"));
        assert_eq!(
            object.last_modified_date().await.unwrap().as_deref(),
            Some("2012-01-02:05:15:45.1Z")
        );
        assert_eq!(object.uri().as_deref(), Some("info:fedora/pid"));
        assert_eq!(transport.count(Method::Get, "objects/pid"), 1);
    }

    #[tokio::test]
    async fn test_profile_failure_propagates() {
        let (transport, api) = setup();
        transport.fail(Method::Get, "objects/pid", 500);
        let object = DigitalObject::new(Some("pid".to_string()), api);
        assert!(matches!(
            object.is_new().await,
            Err(FedoraError::InvalidRequest { .. })
        ));
    }

    #[tokio::test]
    async fn test_state_validation() {
        let (transport, api) = setup();
        transport.respond(Method::Get, "objects/pid", PROFILE);
        let mut object = DigitalObject::new(Some("pid".to_string()), api);

        for state in ["A", "I", "D"] {
            object.set_state(state).await.unwrap();
        }
        let err = object.set_state("Q").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Allowed values for state are 'I', 'A' and 'D'. You provided 'Q'"
        );
        assert_eq!(object.state().await.unwrap().as_deref(), Some("D"));
    }

    #[tokio::test]
    async fn test_save_new_object_ingests_explicit_attributes() {
        let (transport, api) = setup();
        transport.respond(Method::Post, "objects/new", "test:1");
        let mut object = DigitalObject::new(None, api);
        object.set_label("hello").await.unwrap();
        object.save().await.unwrap();

        let sent = transport.requests_to(Method::Post, "objects/new");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].param("label"), Some("hello"));
        assert_eq!(object.pid(), Some("test:1"));
        assert!(object.changes().is_empty());
    }

    #[tokio::test]
    async fn test_save_changed_object_sends_dirty_attributes() {
        let (transport, api) = setup();
        transport
            .respond(Method::Get, "objects/pid", PROFILE)
            .respond(Method::Put, "objects/pid", "2012-03-04T01:02:03.500Z");
        let mut object = DigitalObject::new(Some("pid".to_string()), api);
        object.set_label("label").await.unwrap();
        object.set_owner_id("someone").await.unwrap();
        object.save().await.unwrap();

        let sent = transport.requests_to(Method::Put, "objects/pid");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].param("ownerId"), Some("someone"));
        assert_eq!(sent[0].param("label"), None);
        assert_eq!(
            object.last_modified_date().await.unwrap().as_deref(),
            Some("2012-03-04T01:02:03.5Z")
        );
        assert!(!object.is_changed().await.unwrap());

        object.save().await.unwrap();
        assert_eq!(transport.count(Method::Put, "objects/pid"), 1);
    }

    #[tokio::test]
    async fn test_datastream_listing_and_lookup() {
        let (transport, api) = setup();
        transport.respond(Method::Get, "objects/pid", PROFILE).respond(
            Method::Get,
            "objects/pid/datastreams",
            "<objectDatastreams><datastream dsid='a'/><datastream dsid='b'/></objectDatastreams>",
        );
        let mut object = DigitalObject::new(Some("pid".to_string()), api);

        let ids: Vec<String> = object.datastreams().await.unwrap().keys().cloned().collect();
        assert_eq!(ids, vec!["a", "b"]);

        let fresh = object.datastream("c").await.unwrap();
        assert_eq!(fresh.pid(), Some("pid"));
        assert_eq!(object.datastreams().await.unwrap().len(), 3);
        assert_eq!(transport.count(Method::Get, "objects/pid/datastreams"), 1);
    }

    #[tokio::test]
    async fn test_new_object_has_no_listing_or_versions() {
        let (transport, api) = setup();
        let mut object = DigitalObject::new(Some("pid".to_string()), api);

        assert!(object.datastreams().await.unwrap().is_empty());
        assert!(object.versions().await.unwrap().is_empty());
        assert_eq!(transport.count(Method::Get, "objects/pid/datastreams"), 0);
        assert_eq!(transport.count(Method::Get, "objects/pid/versions"), 0);
    }

    #[tokio::test]
    async fn test_models_come_from_profile() {
        let (transport, api) = setup();
        transport.respond(Method::Get, "objects/pid", PROFILE);
        let mut object = DigitalObject::new(Some("pid".to_string()), api);
        let models = object.models().await.unwrap();
        assert!(models.contains("info:fedora/a:b"));
        assert_eq!(models.as_slice().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_purges_object() {
        let (transport, api) = setup();
        transport
            .respond(Method::Get, "objects/pid", PROFILE)
            .respond(Method::Delete, "objects/pid", "");
        let mut object = DigitalObject::new(Some("pid".to_string()), api);
        object.delete().await.unwrap();

        assert_eq!(transport.count(Method::Delete, "objects/pid"), 1);
        assert!(object.is_new().await.unwrap());
    }
}
