//! per-field rule evaluator
//!
//! owns one field's rule tree and resolves it against the current store:
//! - `has_key` — value-guided search for a dependency anywhere in the tree
//! - `use_value` — dispatch a "dependency changed" event through the tree
//! - `apply` — normalize any rule node to a `(value, display)` pair
//! - `set_value` — commit the pair into the store and emit one event
//!
//! rule anomalies (function at the root, branch addressed through an empty
//! dependency value) are non-fatal: they log a warning and degrade to
//! "nothing applied".

use tracing::warn;

use super::events::{CommitEvent, SharedCommitBus};
use super::types::{DisplayToken, FieldConfig, RuleFn, RuleNode};
use crate::store::{is_empty_value, DisplayState, SharedStore};

/// evaluator for a single managed field
pub struct FieldRule {
    key: String,
    store: SharedStore,
    config: FieldConfig,
    rule: Option<RuleNode>,
    events: SharedCommitBus,
}

impl FieldRule {
    /// build the evaluator and, when the rule has no dependencies at all
    /// (a final root), resolve and commit it immediately
    pub fn new(
        key: impl Into<String>,
        config: FieldConfig,
        store: SharedStore,
        events: SharedCommitBus,
    ) -> Self {
        let key = key.into();

        // a function rule depends on an enclosing branch to supply its
        // argument, so it can never sit at the root
        let rule = match &config.rule {
            Some(RuleNode::Function(_)) => {
                warn!(
                    field = %key,
                    "invalid root config: function rules must be nested inside a branch"
                );
                None
            }
            other => other.clone(),
        };

        let field = Self {
            key,
            store,
            config,
            rule,
            events,
        };

        if let Some(rule) = &field.rule {
            if rule.is_final() {
                field.apply(rule);
            }
        }

        field
    }

    /// field key this evaluator manages
    pub fn key(&self) -> &str {
        &self.key
    }

    /// configured default value
    pub fn default_value(&self) -> &str {
        &self.config.value
    }

    /// whether this field takes part in the one-time master pass
    pub fn is_master(&self) -> bool {
        self.config.master
    }

    /// the parsed rule tree, if the field has a usable one
    pub fn rule(&self) -> Option<&RuleNode> {
        self.rule.as_ref()
    }

    /// full static configuration this evaluator was built from
    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    /// true when this field's rule depends on `dep_key`, following the
    /// *current* store values from the tree root
    pub fn has_key(&self, dep_key: &str) -> bool {
        match &self.rule {
            Some(rule) => self.find_key(dep_key, rule),
            None => false,
        }
    }

    fn find_key(&self, dep_key: &str, rule: &RuleNode) -> bool {
        match rule {
            // final nodes never name a dependency
            RuleNode::Literal(_) | RuleNode::ValueList(_) => false,
            RuleNode::Handler { .. } => rule.watches(dep_key),
            // functions are opaque: no dependency is discoverable through them
            RuleNode::Function(_) => false,
            RuleNode::Branch {
                dependency,
                branches,
            } => {
                if dependency == dep_key {
                    return true;
                }

                let current = self.current_value(dependency);
                let child = branches.get(current.as_str());
                let child_is_invocable =
                    matches!(child, Some(node) if node.is_handler() || node.is_function());

                if is_empty_value(&current) && !child_is_invocable {
                    warn!(
                        field = %self.key,
                        dependency = %dependency,
                        "unresolved dependency: branch field has no value to select a sub-rule"
                    );
                    return false;
                }

                match child {
                    Some(node @ RuleNode::Handler { .. }) => node.watches(dep_key),
                    Some(RuleNode::Function(_)) => false,
                    Some(node @ RuleNode::Branch { .. }) => self.find_key(dep_key, node),
                    _ => false,
                }
            }
        }
    }

    /// dispatch a change of `dep_key` to `new_value` through the rule tree
    pub fn use_value(&self, dep_key: &str, new_value: &str) {
        if let Some(rule) = &self.rule {
            self.use_rule(dep_key, new_value, rule);
        }
    }

    fn use_rule(&self, dep_key: &str, new_value: &str, rule: &RuleNode) {
        match rule {
            // direct hit: the tree branches on the changed field itself,
            // so the *new* value selects the branch
            RuleNode::Branch {
                dependency,
                branches,
            } if dependency == dep_key => match branches.get(new_value) {
                Some(child) => self.apply(child),
                None => warn!(
                    field = %self.key,
                    dependency = %dependency,
                    value = %new_value,
                    "unresolved dependency: no branch for the changed value"
                ),
            },
            RuleNode::Handler { run, .. } if rule.watches(dep_key) => {
                let next = self.invoke(run, new_value);
                self.apply(&next);
            }
            // descend one level, selecting the branch by the dependency's
            // *current* value, and keep looking for dep_key below it
            RuleNode::Branch {
                dependency,
                branches,
            } => {
                let current = self.current_value(dependency);
                let Some(child) = branches.get(current.as_str()) else {
                    return;
                };
                match child {
                    RuleNode::Handler { run, .. } if child.watches(dep_key) => {
                        let next = self.invoke(run, new_value);
                        self.apply(&next);
                    }
                    RuleNode::Function(run) => {
                        let next = self.invoke(run, new_value);
                        self.apply(&next);
                    }
                    _ => {
                        if self.find_key(dep_key, child) {
                            self.use_rule(dep_key, new_value, child);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// normalize a rule node to a concrete `(value, display)` pair and
    /// commit it
    pub fn apply(&self, rule: &RuleNode) {
        match rule {
            RuleNode::ValueList(items) => {
                let mut display = DisplayState::default();
                for token in items.iter().skip(1) {
                    self.merge_token(&mut display, token);
                }
                self.set_value(items.first().cloned(), Some(display));
            }
            RuleNode::Literal(value) => {
                let (value, display) = self.resolve_literal(value);
                self.set_value(value, display);
            }
            // reached through apply, handlers and functions receive the
            // field's own current value, not a changed dependency's
            RuleNode::Handler { run, .. } | RuleNode::Function(run) => {
                let own = self.current_value(&self.key);
                let next = self.invoke(run, &own);
                self.apply(&next);
            }
            RuleNode::Branch {
                dependency,
                branches,
            } => {
                let current = self.current_value(dependency);
                match branches.get(current.as_str()) {
                    Some(child) => self.apply(child),
                    None => warn!(
                        field = %self.key,
                        dependency = %dependency,
                        value = %current,
                        "unresolved dependency: no branch for the current value"
                    ),
                }
            }
        }
    }

    /// resolve a single literal to its `(value, display)` parts; `None`
    /// means "leave the store entry untouched"
    fn resolve_literal(&self, literal: &str) -> (Option<String>, Option<DisplayState>) {
        match DisplayToken::parse(literal) {
            Some(DisplayToken::Custom) => {
                // hand the field back to the user: default value, visible
                let value = self.config.value.clone();
                let display = DisplayState {
                    hide: Some(false),
                    ..DisplayState::default()
                };
                (Some(value), Some(display))
            }
            Some(DisplayToken::Hide) => (None, Some(DisplayState::hidden())),
            Some(DisplayToken::Required) => (None, Some(DisplayState::required())),
            Some(DisplayToken::Disabled) => (None, Some(DisplayState::disabled())),
            None => (Some(literal.to_string()), None),
        }
    }

    /// merge one value-list token into the shared display accumulator
    fn merge_token(&self, display: &mut DisplayState, token: &str) {
        match DisplayToken::parse(token) {
            Some(DisplayToken::Custom) => display.hide = Some(false),
            Some(DisplayToken::Hide) => display.hide = Some(true),
            Some(DisplayToken::Required) => display.required = Some(true),
            Some(DisplayToken::Disabled) => display.disabled = Some(true),
            // plain values carry no display information in list position
            None => {}
        }
    }

    /// commit a resolved pair: `None` parts leave the store untouched,
    /// then exactly one commit event goes out
    pub fn set_value(&self, value: Option<String>, display: Option<DisplayState>) {
        {
            let mut store = self.store.borrow_mut();
            if let Some(value) = &value {
                store.data.insert(self.key.clone(), value.clone());
            }
            if let Some(display) = &display {
                store.display.insert(self.key.clone(), display.clone());
            }
        }
        // the store borrow is released first: subscribers may read it or
        // re-enter the engine
        self.events.emit(&CommitEvent {
            key: self.key.clone(),
            value,
            display,
        });
    }

    fn invoke(&self, run: &RuleFn, value: &str) -> RuleNode {
        let store = self.store.borrow();
        run(value, &store.data)
    }

    fn current_value(&self, key: &str) -> String {
        self.store.borrow().value_of(key).to_string()
    }
}
