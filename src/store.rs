//! shared value/display store mutated by the rule engine
//!
//! the caller allocates the store and hands the engine a shared handle;
//! the engine only ever mutates individual entries, it never replaces
//! the maps themselves.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// shared handle to a [`Store`] (single-threaded engine, caller-owned)
pub type SharedStore = Rc<RefCell<Store>>;

/// resolved display flags for a single field
///
/// absent flags stay `None`, so `{hide: false}` (set by the `custom`
/// token) is distinguishable from a flag that was never touched. a
/// default value means visible and user-editable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<bool>,
}

impl DisplayState {
    /// display state with `hide` set
    pub fn hidden() -> Self {
        Self {
            hide: Some(true),
            ..Self::default()
        }
    }

    /// display state with `required` set
    pub fn required() -> Self {
        Self {
            required: Some(true),
            ..Self::default()
        }
    }

    /// display state with `disabled` set
    pub fn disabled() -> Self {
        Self {
            disabled: Some(true),
            ..Self::default()
        }
    }

    /// true when no flag has been set at all
    pub fn is_unset(&self) -> bool {
        *self == Self::default()
    }
}

/// the two parallel mappings the engine resolves into
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Store {
    /// field key -> current value
    pub data: HashMap<String, String>,
    /// field key -> resolved display state
    pub display: HashMap<String, DisplayState>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// wrap a store in the shared handle the engine expects
    pub fn shared(self) -> SharedStore {
        Rc::new(RefCell::new(self))
    }

    /// current value of a field; absent entries read as the empty string
    pub fn value_of(&self, key: &str) -> &str {
        self.data.get(key).map(String::as_str).unwrap_or("")
    }

    /// set a field value (convenience for seeding initial data)
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), value.into());
    }
}

/// true for the values that cannot address a branch: empty or absent
pub fn is_empty_value(value: &str) -> bool {
    value.is_empty()
}
