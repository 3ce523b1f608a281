// library crate for formrule
// exposes the rule engine to the CLI binary and external callers

pub mod rules;
pub mod store;

pub use rules::{
    parse_config, parse_rule, CommitEvent, ConfigError, FieldConfig, FieldRule, RuleManager,
    RuleNode,
};
pub use store::{DisplayState, SharedStore, Store};
