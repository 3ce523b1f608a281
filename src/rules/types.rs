//! core types for the rule system

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

/// closure form shared by handler and function rules
///
/// receives the driving value (the changed dependency's new value when
/// dispatched through `use_value`, the field's own current value when
/// reached through `apply`) and a read-only view of the data map, and
/// returns the rule to apply next.
pub type RuleFn = Rc<dyn Fn(&str, &HashMap<String, String>) -> RuleNode>;

/// one node of a field's dependency rule tree
///
/// trees are immutable once constructed; all runtime state lives in the
/// shared store.
#[derive(Clone)]
pub enum RuleNode {
    /// a display token (`custom` / `hide` / `required` / `disabled`) or an
    /// arbitrary resolved value
    Literal(String),
    /// element 0 is the resolved value; the rest are display tokens merged
    /// into one display state
    ValueList(Vec<String>),
    /// explicit, possibly multi-key dependency declaration
    Handler { watch: Vec<String>, run: RuleFn },
    /// implicit single-dependency rule; never legal as a field's root rule
    Function(RuleFn),
    /// branches on the current value of `dependency`
    Branch {
        dependency: String,
        branches: BTreeMap<String, RuleNode>,
    },
}

impl RuleNode {
    /// literal rule from any string-ish value
    pub fn literal(value: impl Into<String>) -> Self {
        RuleNode::Literal(value.into())
    }

    /// value-list rule: resolved value followed by display tokens
    pub fn value_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RuleNode::ValueList(items.into_iter().map(Into::into).collect())
    }

    /// handler rule watching the given dependency keys
    pub fn handler<I, S, F>(watch: I, run: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&str, &HashMap<String, String>) -> RuleNode + 'static,
    {
        RuleNode::Handler {
            watch: watch.into_iter().map(Into::into).collect(),
            run: Rc::new(run),
        }
    }

    /// function rule (only valid nested inside a branch)
    pub fn function<F>(run: F) -> Self
    where
        F: Fn(&str, &HashMap<String, String>) -> RuleNode + 'static,
    {
        RuleNode::Function(Rc::new(run))
    }

    /// branch rule on `dependency`, mapping its possible values to sub-rules
    pub fn branch<S, I, V>(dependency: S, branches: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = (V, RuleNode)>,
        V: Into<String>,
    {
        RuleNode::Branch {
            dependency: dependency.into(),
            branches: branches
                .into_iter()
                .map(|(value, node)| (value.into(), node))
                .collect(),
        }
    }

    /// final nodes carry a resolved value and never name a dependency
    pub fn is_final(&self) -> bool {
        matches!(self, RuleNode::Literal(_) | RuleNode::ValueList(_))
    }

    pub fn is_handler(&self) -> bool {
        matches!(self, RuleNode::Handler { .. })
    }

    pub fn is_function(&self) -> bool {
        matches!(self, RuleNode::Function(_))
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, RuleNode::Branch { .. })
    }

    /// true when this node is a handler watching `key`
    pub fn watches(&self, key: &str) -> bool {
        match self {
            RuleNode::Handler { watch, .. } => watch.iter().any(|w| w == key),
            _ => false,
        }
    }
}

impl fmt::Debug for RuleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleNode::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            RuleNode::ValueList(items) => f.debug_tuple("ValueList").field(items).finish(),
            RuleNode::Handler { watch, .. } => f
                .debug_struct("Handler")
                .field("watch", watch)
                .finish_non_exhaustive(),
            RuleNode::Function(_) => f.write_str("Function(..)"),
            RuleNode::Branch {
                dependency,
                branches,
            } => f
                .debug_struct("Branch")
                .field("dependency", dependency)
                .field("branches", branches)
                .finish(),
        }
    }
}

/// display tokens a literal rule value may resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayToken {
    /// restore the configured default value and un-hide the field
    Custom,
    Hide,
    Required,
    Disabled,
}

impl DisplayToken {
    /// parse a token from a literal rule value; anything else is a plain value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "custom" => Some(DisplayToken::Custom),
            "hide" => Some(DisplayToken::Hide),
            "required" => Some(DisplayToken::Required),
            "disabled" => Some(DisplayToken::Disabled),
            _ => None,
        }
    }
}

/// static per-field configuration, supplied once at manager construction
#[derive(Debug, Clone, Default)]
pub struct FieldConfig {
    /// opaque widget type hint (e.g. `text`, `select`); unused by the engine
    pub field_type: Option<String>,
    /// default value; empty when not configured
    pub value: String,
    /// dependency rule tree; fields without one are never re-resolved
    pub rule: Option<RuleNode>,
    /// resolve this field once from its default value during the master pass
    pub master: bool,
}

impl FieldConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, field_type: impl Into<String>) -> Self {
        self.field_type = Some(field_type.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_rule(mut self, rule: RuleNode) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn with_master(mut self, master: bool) -> Self {
        self.master = master;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(RuleNode::literal("required").is_final());
        assert!(RuleNode::value_list(["", "hide"]).is_final());
        assert!(RuleNode::handler(["a"], |_, _| RuleNode::literal("x")).is_handler());
        assert!(RuleNode::function(|_, _| RuleNode::literal("x")).is_function());
        assert!(RuleNode::branch("a", [("1", RuleNode::literal("x"))]).is_branch());
    }

    #[test]
    fn test_watches() {
        let handler = RuleNode::handler(["a", "d"], |_, _| RuleNode::literal("z"));
        assert!(handler.watches("a"));
        assert!(handler.watches("d"));
        assert!(!handler.watches("b"));
        assert!(!RuleNode::literal("x").watches("a"));
    }

    #[test]
    fn test_display_token_parse() {
        assert_eq!(DisplayToken::parse("custom"), Some(DisplayToken::Custom));
        assert_eq!(DisplayToken::parse("hide"), Some(DisplayToken::Hide));
        assert_eq!(
            DisplayToken::parse("required"),
            Some(DisplayToken::Required)
        );
        assert_eq!(
            DisplayToken::parse("disabled"),
            Some(DisplayToken::Disabled)
        );
        assert_eq!(DisplayToken::parse("anything"), None);
        assert_eq!(DisplayToken::parse(""), None);
    }

    #[test]
    fn test_field_config_builder() {
        let config = FieldConfig::new()
            .with_type("select")
            .with_value("1")
            .with_master(true);
        assert_eq!(config.field_type.as_deref(), Some("select"));
        assert_eq!(config.value, "1");
        assert!(config.master);
        assert!(config.rule.is_none());
    }

    #[test]
    fn test_debug_skips_closures() {
        let handler = RuleNode::handler(["a"], |_, _| RuleNode::literal("x"));
        let repr = format!("{:?}", handler);
        assert!(repr.contains("watch"));
        let func = RuleNode::function(|_, _| RuleNode::literal("x"));
        assert_eq!(format!("{:?}", func), "Function(..)");
    }
}
