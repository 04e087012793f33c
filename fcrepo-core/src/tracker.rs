//! Per-entity change tracking
//!
//! An attribute resolves to its explicit value, else the profile value, else
//! the static default. A list-valued profile field resolves to its values
//! joined by single spaces. Assigning a value equal to the current resolution is
//! recorded but does not mark the attribute dirty.

use std::collections::{BTreeMap, BTreeSet};

use crate::attributes::Attribute;
use crate::error::Result;
use crate::locator::Params;
use crate::profile::{Profile, ProfileValue};

#[derive(Debug, Clone)]
pub struct ChangeTracker<A: Attribute> {
    explicit: BTreeMap<A, Option<String>>,
    dirty: BTreeSet<A>,
}

impl<A: Attribute> Default for ChangeTracker<A> {
    fn default() -> Self {
        Self {
            explicit: BTreeMap::new(),
            dirty: BTreeSet::new(),
        }
    }
}

impl<A: Attribute> ChangeTracker<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of an attribute
    pub fn resolve(&self, attr: A, profile: &Profile) -> Option<String> {
        if let Some(value) = self.explicit.get(&attr) {
            return value.clone();
        }
        let def = attr.definition();
        let remote = match def.profile_key.and_then(|key| profile.get(key)) {
            Some(ProfileValue::Text(value)) => Some(value.clone()),
            Some(ProfileValue::List(values)) => Some(values.join(" ")),
            Some(ProfileValue::Empty) | None => None,
        };
        remote.or_else(|| def.default.map(str::to_string))
    }

    /// Record an assignment; returns whether the attribute became dirty.
    ///
    /// Validation runs first, so a rejected value leaves no trace.
    pub fn assign(&mut self, attr: A, value: Option<String>, profile: &Profile) -> Result<bool> {
        attr.validate(value.as_deref())?;
        let differs = self.resolve(attr, profile) != value;
        self.explicit.insert(attr, value);
        if differs {
            self.dirty.insert(attr);
        }
        Ok(differs)
    }

    /// Set a value as part of the baseline, without dirtying it
    pub fn record_clean(&mut self, attr: A, value: Option<String>) {
        self.explicit.insert(attr, value);
        self.dirty.remove(&attr);
    }

    pub fn is_dirty(&self, attr: A) -> bool {
        self.dirty.contains(&attr)
    }

    pub fn is_changed(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Dirty attributes with their pending values
    pub fn changes(&self) -> Vec<(A, Option<String>)> {
        self.dirty
            .iter()
            .map(|attr| (*attr, self.explicit.get(attr).cloned().flatten()))
            .collect()
    }

    /// Request parameters for the dirty attributes
    pub fn dirty_params(&self) -> Params {
        self.dirty
            .iter()
            .filter_map(|attr| param_entry(*attr, self.explicit.get(attr)?))
            .collect()
    }

    /// Request parameters for every explicitly assigned attribute
    pub fn explicit_params(&self) -> Params {
        self.explicit
            .iter()
            .filter_map(|(attr, value)| param_entry(*attr, value))
            .collect()
    }

    /// Explicit values laid over the static defaults
    pub fn params_with_defaults(&self, attrs: &[A]) -> Params {
        let mut params: Params = attrs
            .iter()
            .filter_map(|attr| {
                let def = attr.definition();
                def.default.map(|d| (def.param.to_string(), d.to_string()))
            })
            .collect();
        params.extend(self.explicit_params());
        params
    }

    /// Clear dirty flags; explicit values become the baseline
    pub fn commit(&mut self) {
        self.dirty.clear();
    }
}

fn param_entry<A: Attribute>(attr: A, value: &Option<String>) -> Option<(String, String)> {
    value
        .as_ref()
        .map(|v| (attr.definition().param.to_string(), v.clone()))
}
