//! rule resolution system for interdependent form fields
//!
//! each field owns a declarative rule tree describing how its value and
//! display state branch on the *current* values of other fields:
//! - literal / value-list rules resolve unconditionally
//! - branch rules select a sub-rule by a dependency field's value
//! - handler rules watch an explicit key set and compute the next rule
//! - function rules compute the next rule from a single implicit dependency
//!
//! the manager routes "field changed" events to every evaluator whose tree
//! depends on the changed key and commits resolved `(value, display)`
//! pairs into the shared store.

mod eval;
mod events;
mod manager;
mod parser;
mod types;

pub use eval::FieldRule;
pub use events::{CommitBus, CommitEvent, SharedCommitBus};
pub use manager::{RuleManager, DEFAULT_MAX_DEPTH};
pub use parser::{parse_config, parse_rule, ConfigError};
pub use types::{DisplayToken, FieldConfig, RuleFn, RuleNode};
