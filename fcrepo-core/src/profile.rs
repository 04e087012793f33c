//! Flattened resource profiles and their lazy cache

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::error::{FedoraError, Result};

/// Profile keys holding server timestamps
pub const DATE_KEYS: &[&str] = &["objLastModDate", "objCreateDate", "dsCreateDate"];

/// Value of a single profile field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ProfileValue {
    /// Element present without text
    Empty,
    Text(String),
    /// Repeated or wrapping element, in document order
    List(Vec<String>),
}

/// Immutable key -> value mapping flattened from a profile document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    fields: Arc<BTreeMap<String, ProfileValue>>,
}

impl Profile {
    pub fn new(fields: BTreeMap<String, ProfileValue>) -> Self {
        Self {
            fields: Arc::new(fields),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ProfileValue> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Scalar text of a field; `None` for empty, missing or list fields
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(ProfileValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    /// All values of a field, treating a scalar as a one-element list
    pub fn values(&self, key: &str) -> Vec<String> {
        match self.fields.get(key) {
            Some(ProfileValue::Text(value)) => vec![value.clone()],
            Some(ProfileValue::List(values)) => values.clone(),
            Some(ProfileValue::Empty) | None => Vec::new(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProfileValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Profiles are frozen once built; this always fails
    pub fn insert(&self, key: &str, _value: ProfileValue) -> Result<()> {
        Err(FedoraError::ImmutableWrite(format!(
            "profile is frozen, cannot set '{}'",
            key
        )))
    }

    /// Owned, mutable copy of the fields
    pub fn to_map(&self) -> BTreeMap<String, ProfileValue> {
        self.fields.as_ref().clone()
    }

    /// Copy with every timestamp field in canonical form
    pub fn with_canonical_dates(self) -> Self {
        if !DATE_KEYS.iter().any(|key| self.text(key).is_some()) {
            return self;
        }
        let mut fields = self.to_map();
        for key in DATE_KEYS {
            if let Some(ProfileValue::Text(value)) = fields.get_mut(*key) {
                *value = canonicalize_timestamp(value);
            }
        }
        Self::new(fields)
    }
}

impl Serialize for Profile {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.fields.as_ref().serialize(serializer)
    }
}

/// Rewrite the fractional-seconds field of a timestamp without trailing zeros.
///
/// `2012-01-02:05:15:45.100Z` becomes `2012-01-02:05:15:45.1Z` and an
/// all-zero fraction keeps a single digit (`45.000Z` becomes `45.0Z`).
/// Values without a fraction are returned unchanged.
pub fn canonicalize_timestamp(raw: &str) -> String {
    let Some(dot) = raw.rfind('.') else {
        return raw.to_string();
    };
    let (head, tail) = raw.split_at(dot + 1);
    let digits = tail.bytes().take_while(u8::is_ascii_digit).count();
    let (fraction, suffix) = tail.split_at(digits);
    if head.len() == 1 || fraction.is_empty() || !(suffix.is_empty() || suffix == "Z") {
        return raw.to_string();
    }

    let trimmed = match fraction.trim_end_matches('0') {
        "" => "0",
        digits => digits,
    };
    format!("{}{}{}", head, trimmed, suffix)
}

/// Outcome of a profile fetch
#[derive(Debug, Clone)]
pub(crate) struct Loaded {
    pub profile: Profile,
    /// False when the server reported the resource as not found
    pub exists: bool,
}

/// Memoized profile of one entity
#[derive(Debug, Default)]
pub(crate) struct ProfileCache {
    cell: OnceCell<Loaded>,
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache already holding a known profile
    pub fn seeded(profile: Profile) -> Self {
        Self {
            cell: OnceCell::new_with(Some(Loaded {
                profile,
                exists: true,
            })),
        }
    }

    /// Cache for a resource known not to exist remotely
    pub fn absent() -> Self {
        Self {
            cell: OnceCell::new_with(Some(Loaded {
                profile: Profile::default(),
                exists: false,
            })),
        }
    }

    /// Run `fetch` on first use; `Ok(None)` from the fetch means not found
    pub async fn load<F, Fut>(&self, fetch: F) -> Result<&Loaded>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<Profile>>>,
    {
        self.cell
            .get_or_try_init(|| async {
                let fetched = fetch().await?;
                Ok::<_, FedoraError>(match fetched {
                    Some(profile) => Loaded {
                        profile: profile.with_canonical_dates(),
                        exists: true,
                    },
                    None => Loaded {
                        profile: Profile::default(),
                        exists: false,
                    },
                })
            })
            .await
    }

    #[cfg(test)]
    pub fn get(&self) -> Option<&Loaded> {
        self.cell.get()
    }

    pub fn invalidate(&mut self) {
        self.cell.take();
    }

    pub fn replace(&mut self, profile: Profile) {
        *self = Self::seeded(profile.with_canonical_dates());
    }
}
