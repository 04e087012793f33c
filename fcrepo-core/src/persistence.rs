//! Save decisions for datastreams
//!
//! An object's save walks its materialized datastreams and applies
//! [`decide`] to each one independently.

use std::collections::BTreeMap;

use crate::attributes::ObjectAttribute;
use crate::datastream::Datastream;
use crate::error::Result;
use crate::profile::canonicalize_timestamp;
use crate::tracker::ChangeTracker;

/// What saving a datastream requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveAction {
    Create,
    Update,
    Skip,
}

/// Decision table for a single datastream.
///
/// A new datastream is only created once it has content; an existing one is
/// updated when its attributes or its content changed.
pub fn decide(new: bool, changed: bool, content_changed: bool, has_content: bool) -> SaveAction {
    match (new, changed || content_changed) {
        (true, _) if has_content => SaveAction::Create,
        (true, _) => SaveAction::Skip,
        (false, true) => SaveAction::Update,
        (false, false) => SaveAction::Skip,
    }
}

/// Save every datastream that needs it, in dsid order.
///
/// Each saved datastream that reports a creation date stamps the object's
/// `lastModifiedDate` as soon as its save succeeds. The first failure aborts
/// the walk; stamps from datastreams saved before it are kept.
pub(crate) async fn save_datastreams(
    datastreams: &mut BTreeMap<String, Datastream>,
    attributes: &mut ChangeTracker<ObjectAttribute>,
) -> Result<()> {
    for (dsid, datastream) in datastreams.iter_mut() {
        match datastream.save_action().await? {
            SaveAction::Skip => {
                tracing::debug!("Skipping datastream {}", dsid);
                continue;
            }
            action => {
                tracing::debug!("Saving datastream {} ({:?})", dsid, action);
                datastream.save().await?;
            }
        }
        if let Some(stamp) = datastream.create_date().await? {
            attributes.record_clean(
                ObjectAttribute::LastModifiedDate,
                Some(canonicalize_timestamp(&stamp)),
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_datastream_needs_content() {
        assert_eq!(decide(true, true, true, true), SaveAction::Create);
        assert_eq!(decide(true, false, false, true), SaveAction::Create);
        assert_eq!(decide(true, true, true, false), SaveAction::Skip);
        assert_eq!(decide(true, false, false, false), SaveAction::Skip);
    }

    #[test]
    fn test_existing_datastream_needs_changes() {
        assert_eq!(decide(false, false, false, true), SaveAction::Skip);
        assert_eq!(decide(false, false, false, false), SaveAction::Skip);
        assert_eq!(decide(false, true, false, true), SaveAction::Update);
        assert_eq!(decide(false, true, true, false), SaveAction::Update);
        assert_eq!(decide(false, false, true, true), SaveAction::Update);
    }
}
