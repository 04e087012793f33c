//! XML flattening for repository profile documents
//!
//! Turns the root element's children into a [`Profile`]:
//! - an element without text becomes `Empty`
//! - a repeated element name becomes a list in document order
//! - an element wrapping child elements (`objModels/model`) becomes the list
//!   of its children's text
//! - anything else is scalar text

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;

use crate::profile::{Profile, ProfileValue};

/// XML parsing errors
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid XML structure: {0}")]
    InvalidStructure(String),
}

/// Flatten a profile document
pub fn flatten_profile(xml: &str) -> Result<Profile, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut depth = 0usize;
    let mut fields = FieldCollector::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                if depth >= 2 {
                    fields.open(depth - 1, local_name(&e));
                }
            }
            Ok(Event::Empty(e)) => {
                if depth >= 1 {
                    fields.open(depth, local_name(&e));
                    fields.close(depth);
                }
            }
            Ok(Event::End(_)) => {
                if depth >= 2 {
                    fields.close(depth - 1);
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Text(text)) => {
                let text = text
                    .unescape()
                    .map_err(|e| XmlError::Parse(e.to_string()))?;
                fields.text(depth.saturating_sub(1), &text);
            }
            Ok(Event::CData(data)) => {
                let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                fields.text(depth.saturating_sub(1), &text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XmlError::Parse(e.to_string())),
            _ => {}
        }
    }

    Ok(fields.finish())
}

/// One entry of an object's datastream listing
#[derive(Debug, Clone, PartialEq)]
pub struct ListedDatastream {
    pub dsid: String,
    /// Inline profile, when the server embedded one
    pub profile: Option<Profile>,
}

/// Parse a datastream listing or datastream history document.
///
/// Accepts both `<datastream dsid="..."/>` entries and
/// `<datastreamProfile dsID="...">...</datastreamProfile>` entries.
pub fn parse_datastream_listing(xml: &str) -> Result<Vec<ListedDatastream>, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut depth = 0usize;
    let mut entries = Vec::new();
    let mut current: Option<(String, bool, FieldCollector)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                if depth == 2 {
                    current = Some((dsid_of(&e)?, is_profile(&e), FieldCollector::default()));
                } else if depth > 2 {
                    if let Some((_, _, fields)) = current.as_mut() {
                        fields.open(depth - 2, local_name(&e));
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if depth == 1 {
                    let profile = is_profile(&e).then(Profile::default);
                    entries.push(ListedDatastream {
                        dsid: dsid_of(&e)?,
                        profile,
                    });
                } else if depth >= 2 {
                    if let Some((_, _, fields)) = current.as_mut() {
                        fields.open(depth - 1, local_name(&e));
                        fields.close(depth - 1);
                    }
                }
            }
            Ok(Event::End(_)) => {
                if depth == 2 {
                    if let Some((dsid, has_profile, fields)) = current.take() {
                        entries.push(ListedDatastream {
                            dsid,
                            profile: has_profile.then(|| fields.finish()),
                        });
                    }
                } else if depth > 2 {
                    if let Some((_, _, fields)) = current.as_mut() {
                        fields.close(depth - 2);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Text(text)) => {
                if depth > 2 {
                    let text = text
                        .unescape()
                        .map_err(|e| XmlError::Parse(e.to_string()))?;
                    if let Some((_, _, fields)) = current.as_mut() {
                        fields.text(depth - 2, &text);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XmlError::Parse(e.to_string())),
            _ => {}
        }
    }

    Ok(entries)
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn is_profile(e: &BytesStart<'_>) -> bool {
    e.local_name().as_ref() == b"datastreamProfile"
}

fn dsid_of(e: &BytesStart<'_>) -> Result<String, XmlError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| XmlError::Parse(e.to_string()))?;
        let key = attr.key.local_name();
        if key.as_ref() == b"dsid" || key.as_ref() == b"dsID" {
            let value = attr
                .unescape_value()
                .map_err(|e| XmlError::Parse(e.to_string()))?;
            return Ok(value.into_owned());
        }
    }
    Err(XmlError::InvalidStructure(format!(
        "<{}> entry without a dsid",
        local_name(e)
    )))
}

enum Entry {
    Text(String),
    Nested(Vec<String>),
}

struct OpenField {
    name: String,
    text: String,
    nested: Option<Vec<String>>,
    nested_text: String,
}

/// Accumulates fields one level below a container element.
///
/// Levels are relative: 1 is a field, 2 a value nested in a field, deeper
/// levels only contribute text.
#[derive(Default)]
struct FieldCollector {
    entries: BTreeMap<String, Vec<Entry>>,
    current: Option<OpenField>,
}

impl FieldCollector {
    fn open(&mut self, level: usize, name: String) {
        match level {
            1 => {
                self.current = Some(OpenField {
                    name,
                    text: String::new(),
                    nested: None,
                    nested_text: String::new(),
                });
            }
            2 => {
                if let Some(field) = self.current.as_mut() {
                    field.nested.get_or_insert_with(Vec::new);
                    field.nested_text.clear();
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, level: usize, text: &str) {
        if let Some(field) = self.current.as_mut() {
            match level {
                1 => field.text.push_str(text),
                l if l >= 2 => field.nested_text.push_str(text),
                _ => {}
            }
        }
    }

    fn close(&mut self, level: usize) {
        match level {
            1 => {
                if let Some(field) = self.current.take() {
                    let entry = match field.nested {
                        Some(values) => Entry::Nested(values),
                        None => Entry::Text(field.text),
                    };
                    self.entries.entry(field.name).or_default().push(entry);
                }
            }
            2 => {
                if let Some(field) = self.current.as_mut() {
                    let value = std::mem::take(&mut field.nested_text);
                    field.nested.get_or_insert_with(Vec::new).push(value);
                }
            }
            _ => {}
        }
    }

    fn finish(self) -> Profile {
        let mut fields = BTreeMap::new();
        for (name, mut entries) in self.entries {
            let value = if entries.len() == 1 {
                match entries.remove(0) {
                    Entry::Text(text) if text.is_empty() => ProfileValue::Empty,
                    Entry::Text(text) => ProfileValue::Text(text),
                    Entry::Nested(values) => ProfileValue::List(values),
                }
            } else {
                let mut values = Vec::new();
                for entry in entries {
                    match entry {
                        Entry::Text(text) => values.push(text),
                        Entry::Nested(nested) => values.extend(nested),
                    }
                }
                ProfileValue::List(values)
            };
            fields.insert(name, value);
        }
        Profile::new(fields)
    }
}
