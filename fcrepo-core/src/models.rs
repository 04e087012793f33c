//! Content-model membership of an object
//!
//! Every mutation is an immediate `hasModel` relationship call; the local
//! list only changes after the server accepted the call.

use crate::api::{RepositoryApi, HAS_MODEL};
use crate::error::{FedoraError, Result};

/// Borrowed view over an object's models
#[derive(Debug)]
pub struct Models<'a> {
    api: &'a RepositoryApi,
    pid: &'a str,
    members: &'a mut Vec<String>,
}

impl<'a> Models<'a> {
    pub(crate) fn new(api: &'a RepositoryApi, pid: &'a str, members: &'a mut Vec<String>) -> Self {
        Self { api, pid, members }
    }

    pub fn as_slice(&self) -> &[String] {
        self.members.as_slice()
    }

    pub fn contains(&self, model: &str) -> bool {
        self.members.iter().any(|m| m == model)
    }

    pub async fn add(&mut self, model: &str) -> Result<()> {
        self.api.add_relationship(self.pid, HAS_MODEL, model).await?;
        if !self.contains(model) {
            self.members.push(model.to_string());
        }
        tracing::debug!("Added model {} to {}", model, self.pid);
        Ok(())
    }

    pub async fn remove(&mut self, model: &str) -> Result<()> {
        self.api.purge_relationship(self.pid, HAS_MODEL, model).await?;
        self.members.retain(|m| m != model);
        tracing::debug!("Removed model {} from {}", model, self.pid);
        Ok(())
    }

    /// Make the membership equal to `models`.
    ///
    /// Additions run first, then removals. Every call is attempted; failures
    /// are collected into `FedoraError::Partial` and the local list keeps
    /// only the outcome of the calls that succeeded.
    pub async fn replace_all<S: AsRef<str>>(&mut self, models: &[S]) -> Result<()> {
        let wanted: Vec<&str> = models.iter().map(|m| m.as_ref()).collect();
        let additions: Vec<String> = wanted
            .iter()
            .filter(|m| !self.contains(m))
            .map(|m| m.to_string())
            .collect();
        let removals: Vec<String> = self
            .members
            .iter()
            .filter(|m| !wanted.contains(&m.as_str()))
            .cloned()
            .collect();

        let mut failures = Vec::new();
        for model in &additions {
            if let Err(err) = self.add(model).await {
                failures.push(err);
            }
        }
        for model in &removals {
            if let Err(err) = self.remove(model).await {
                failures.push(err);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(FedoraError::Partial { failures })
        }
    }
}
