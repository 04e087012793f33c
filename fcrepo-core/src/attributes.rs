//! Static attribute tables for objects and datastreams
//!
//! Each attribute is described once: its REST parameter name, the profile
//! key it is read from, its default and an optional validator.

use std::fmt;

use crate::error::{FedoraError, Result};

/// Description of one tracked attribute
#[derive(Debug)]
pub struct AttributeDef {
    /// Parameter name used in create/modify requests
    pub param: &'static str,
    /// Profile field the remote value is read from
    pub profile_key: Option<&'static str>,
    pub default: Option<&'static str>,
    pub validate: Option<fn(&str) -> Result<()>>,
}

/// An attribute key with a static definition
pub trait Attribute: Copy + Ord + fmt::Debug + 'static {
    fn definition(self) -> &'static AttributeDef;

    fn validate(self, value: Option<&str>) -> Result<()> {
        match (self.definition().validate, value) {
            (Some(check), Some(value)) => check(value),
            _ => Ok(()),
        }
    }
}

/// Allowed values of an object or datastream state
pub const STATES: &[&str] = &["A", "I", "D"];

fn validate_state(value: &str) -> Result<()> {
    if STATES.contains(&value) {
        Ok(())
    } else {
        Err(FedoraError::Validation(format!(
            "Allowed values for state are 'I', 'A' and 'D'. You provided '{}'",
            value
        )))
    }
}

const fn def(
    param: &'static str,
    profile_key: Option<&'static str>,
    default: Option<&'static str>,
) -> AttributeDef {
    AttributeDef {
        param,
        profile_key,
        default,
        validate: None,
    }
}

/// Attributes of a repository object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectAttribute {
    State,
    OwnerId,
    Label,
    LogMessage,
    LastModifiedDate,
    CreatedDate,
}

impl ObjectAttribute {
    pub const ALL: [ObjectAttribute; 6] = [
        ObjectAttribute::State,
        ObjectAttribute::OwnerId,
        ObjectAttribute::Label,
        ObjectAttribute::LogMessage,
        ObjectAttribute::LastModifiedDate,
        ObjectAttribute::CreatedDate,
    ];
}

static OBJ_STATE: AttributeDef = AttributeDef {
    param: "state",
    profile_key: Some("objState"),
    default: None,
    validate: Some(validate_state),
};
static OBJ_OWNER_ID: AttributeDef = def("ownerId", Some("objOwnerId"), None);
static OBJ_LABEL: AttributeDef = def("label", Some("objLabel"), None);
static OBJ_LOG_MESSAGE: AttributeDef = def("logMessage", None, None);
static OBJ_LAST_MODIFIED_DATE: AttributeDef = def("lastModifiedDate", Some("objLastModDate"), None);
static OBJ_CREATED_DATE: AttributeDef = def("createdDate", Some("objCreateDate"), None);

impl Attribute for ObjectAttribute {
    fn definition(self) -> &'static AttributeDef {
        match self {
            ObjectAttribute::State => &OBJ_STATE,
            ObjectAttribute::OwnerId => &OBJ_OWNER_ID,
            ObjectAttribute::Label => &OBJ_LABEL,
            ObjectAttribute::LogMessage => &OBJ_LOG_MESSAGE,
            ObjectAttribute::LastModifiedDate => &OBJ_LAST_MODIFIED_DATE,
            ObjectAttribute::CreatedDate => &OBJ_CREATED_DATE,
        }
    }
}

/// Attributes of a datastream
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DatastreamAttribute {
    Label,
    MimeType,
    ControlGroup,
    Versionable,
    State,
    ChecksumType,
    Checksum,
    FormatUri,
    Location,
    AltIds,
    LogMessage,
}

impl DatastreamAttribute {
    pub const ALL: [DatastreamAttribute; 11] = [
        DatastreamAttribute::Label,
        DatastreamAttribute::MimeType,
        DatastreamAttribute::ControlGroup,
        DatastreamAttribute::Versionable,
        DatastreamAttribute::State,
        DatastreamAttribute::ChecksumType,
        DatastreamAttribute::Checksum,
        DatastreamAttribute::FormatUri,
        DatastreamAttribute::Location,
        DatastreamAttribute::AltIds,
        DatastreamAttribute::LogMessage,
    ];
}

static DS_LABEL: AttributeDef = def("dsLabel", Some("dsLabel"), None);
static DS_MIME_TYPE: AttributeDef = def("mimeType", Some("dsMIME"), None);
static DS_CONTROL_GROUP: AttributeDef = def("controlGroup", Some("dsControlGroup"), Some("M"));
static DS_VERSIONABLE: AttributeDef = def("versionable", Some("dsVersionable"), Some("true"));
static DS_STATE: AttributeDef = AttributeDef {
    param: "dsState",
    profile_key: Some("dsState"),
    default: Some("A"),
    validate: Some(validate_state),
};
static DS_CHECKSUM_TYPE: AttributeDef = def("checksumType", Some("dsChecksumType"), None);
static DS_CHECKSUM: AttributeDef = def("checksum", Some("dsChecksum"), None);
static DS_FORMAT_URI: AttributeDef = def("formatURI", Some("dsFormatURI"), None);
static DS_LOCATION: AttributeDef = def("dsLocation", Some("dsLocation"), None);
static DS_ALT_IDS: AttributeDef = def("altIDs", Some("dsAltID"), None);
static DS_LOG_MESSAGE: AttributeDef = def("logMessage", None, None);

impl Attribute for DatastreamAttribute {
    fn definition(self) -> &'static AttributeDef {
        match self {
            DatastreamAttribute::Label => &DS_LABEL,
            DatastreamAttribute::MimeType => &DS_MIME_TYPE,
            DatastreamAttribute::ControlGroup => &DS_CONTROL_GROUP,
            DatastreamAttribute::Versionable => &DS_VERSIONABLE,
            DatastreamAttribute::State => &DS_STATE,
            DatastreamAttribute::ChecksumType => &DS_CHECKSUM_TYPE,
            DatastreamAttribute::Checksum => &DS_CHECKSUM,
            DatastreamAttribute::FormatUri => &DS_FORMAT_URI,
            DatastreamAttribute::Location => &DS_LOCATION,
            DatastreamAttribute::AltIds => &DS_ALT_IDS,
            DatastreamAttribute::LogMessage => &DS_LOG_MESSAGE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_validation() {
        assert!(ObjectAttribute::State.validate(Some("A")).is_ok());
        assert!(ObjectAttribute::State.validate(None).is_ok());

        let err = ObjectAttribute::State.validate(Some("Q")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Allowed values for state are 'I', 'A' and 'D'. You provided 'Q'"
        );
        assert!(DatastreamAttribute::State.validate(Some("X")).is_err());
        assert!(ObjectAttribute::Label.validate(Some("Q")).is_ok());
    }

    #[test]
    fn test_params_are_unique() {
        let mut params: Vec<_> = ObjectAttribute::ALL
            .iter()
            .map(|a| a.definition().param)
            .collect();
        params.sort();
        params.dedup();
        assert_eq!(params.len(), ObjectAttribute::ALL.len());

        let mut params: Vec<_> = DatastreamAttribute::ALL
            .iter()
            .map(|a| a.definition().param)
            .collect();
        params.sort();
        params.dedup();
        assert_eq!(params.len(), DatastreamAttribute::ALL.len());
    }

    #[test]
    fn test_datastream_defaults() {
        assert_eq!(DatastreamAttribute::ControlGroup.definition().default, Some("M"));
        assert_eq!(DatastreamAttribute::State.definition().default, Some("A"));
        assert_eq!(DatastreamAttribute::Versionable.definition().default, Some("true"));
        assert!(ObjectAttribute::ALL.iter().all(|a| a.definition().default.is_none()));
    }
}
