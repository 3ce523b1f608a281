//! rule manager
//!
//! owns every field evaluator, routes external "field changed" events to
//! the evaluators whose trees depend on the changed key, and runs the
//! one-time master pass that seeds derived state from declared defaults.

use std::cell::Cell;

use tracing::warn;

use super::eval::FieldRule;
use super::events::{CommitBus, CommitEvent, SharedCommitBus};
use super::types::FieldConfig;
use crate::store::{is_empty_value, SharedStore};

/// dispatch depth tolerated before a re-entrant change cascade is dropped
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// routes field-change events to every dependent [`FieldRule`]
pub struct RuleManager {
    store: SharedStore,
    events: SharedCommitBus,
    rules: Vec<FieldRule>,
    mastered: Cell<bool>,
    max_depth: usize,
    depth: Cell<usize>,
}

impl RuleManager {
    /// empty manager over a caller-owned store; add fields with
    /// [`with_fields`](Self::with_fields)
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            events: CommitBus::new(),
            rules: Vec::new(),
            mastered: Cell::new(false),
            max_depth: DEFAULT_MAX_DEPTH,
            depth: Cell::new(0),
        }
    }

    /// override the re-entrancy depth limit
    ///
    /// commit subscribers may feed changes back into the manager; mutually
    /// dependent fields can then cascade indefinitely. dispatches past the
    /// limit are dropped with a warning instead of exhausting the stack.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// register a commit subscriber before fields are added, so commits
    /// made during field construction are observable
    pub fn with_subscriber<F>(self, subscriber: F) -> Self
    where
        F: Fn(&CommitEvent) + 'static,
    {
        self.events.subscribe(subscriber);
        self
    }

    /// build an evaluator per field, in the given order
    ///
    /// fields whose rule is final (no dependencies) commit their resolved
    /// state immediately, during this call.
    pub fn with_fields<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (String, FieldConfig)>,
    {
        for (key, config) in fields {
            self.rules.push(FieldRule::new(
                key,
                config,
                self.store.clone(),
                self.events.clone(),
            ));
        }
        self
    }

    /// shared store this manager resolves into
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// evaluator for a field key, if one is managed
    pub fn rule(&self, key: &str) -> Option<&FieldRule> {
        self.rules.iter().find(|rule| rule.key() == key)
    }

    /// register a commit subscriber; invoked synchronously, exactly once
    /// per store commit, before the triggering call returns
    pub fn subscribe<F>(&self, subscriber: F)
    where
        F: Fn(&CommitEvent) + 'static,
    {
        self.events.subscribe(subscriber);
    }

    /// the fan-out set for a change in `dep_key`: every evaluator whose
    /// rule tree currently depends on it, in field declaration order
    pub fn find_rule_by_key(&self, dep_key: &str) -> Vec<&FieldRule> {
        self.rules
            .iter()
            .filter(|rule| rule.has_key(dep_key))
            .collect()
    }

    /// external entry point: `key` changed to `value`
    ///
    /// empty values are transient and never trigger rule evaluation; use
    /// [`use_value_allow_empty`](Self::use_value_allow_empty) to dispatch
    /// them anyway. unknown keys are a silent no-op.
    pub fn use_value(&self, key: &str, value: &str) {
        self.dispatch(key, value, false);
    }

    /// like [`use_value`](Self::use_value), but empty values dispatch too
    pub fn use_value_allow_empty(&self, key: &str, value: &str) {
        self.dispatch(key, value, true);
    }

    fn dispatch(&self, key: &str, value: &str, allow_empty: bool) {
        if !allow_empty && is_empty_value(value) {
            return;
        }

        let depth = self.depth.get();
        if depth >= self.max_depth {
            warn!(
                key = %key,
                depth,
                "recursion limit reached, dropping dispatch (mutually dependent fields?)"
            );
            return;
        }
        self.depth.set(depth + 1);

        for rule in self.find_rule_by_key(key) {
            rule.use_value(key, value);
        }

        self.depth.set(depth);
    }

    /// one-shot default pass: resolve every `master` field from its
    /// declared default value
    ///
    /// idempotent; calls after the first are no-ops.
    pub fn master(&self) {
        if self.mastered.replace(true) {
            return;
        }
        for rule in &self.rules {
            if rule.is_master() {
                self.use_value(rule.key(), rule.default_value());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::types::RuleNode;
    use crate::store::{DisplayState, Store};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn branch_on_a() -> FieldConfig {
        FieldConfig::new().with_rule(RuleNode::branch(
            "a",
            [("0", RuleNode::literal("y")), ("1", RuleNode::literal("x"))],
        ))
    }

    #[test]
    fn test_find_rule_by_key_preserves_declaration_order() {
        let store = Store::new().shared();
        let manager = RuleManager::new(store).with_fields([
            ("b".to_string(), branch_on_a()),
            ("c".to_string(), branch_on_a()),
            ("d".to_string(), FieldConfig::new()),
        ]);

        let found: Vec<_> = manager
            .find_rule_by_key("a")
            .into_iter()
            .map(|rule| rule.key().to_string())
            .collect();
        assert_eq!(found, ["b", "c"]);
    }

    #[test]
    fn test_use_value_fans_out_to_all_dependents() {
        let store = Store::new().shared();
        let manager = RuleManager::new(store.clone()).with_fields([
            ("b".to_string(), branch_on_a()),
            ("c".to_string(), branch_on_a()),
        ]);

        manager.use_value("a", "1");
        assert_eq!(store.borrow().value_of("b"), "x");
        assert_eq!(store.borrow().value_of("c"), "x");
    }

    #[test]
    fn test_empty_value_is_suppressed() {
        let store = Store::new().shared();
        let commits = Rc::new(Cell::new(0));
        let manager = {
            let commits = Rc::clone(&commits);
            RuleManager::new(store.clone())
                .with_subscriber(move |_| commits.set(commits.get() + 1))
                .with_fields([("b".to_string(), branch_on_a())])
        };

        manager.use_value("a", "");
        assert_eq!(commits.get(), 0);
        assert!(store.borrow().data.is_empty());
        assert!(store.borrow().display.is_empty());
    }

    #[test]
    fn test_empty_value_dispatches_when_allowed() {
        let store = Store::new().shared();
        let config = FieldConfig::new().with_rule(RuleNode::branch(
            "a",
            [("", RuleNode::literal("blanked"))],
        ));
        let manager =
            RuleManager::new(store.clone()).with_fields([("b".to_string(), config)]);

        manager.use_value_allow_empty("a", "");
        assert_eq!(store.borrow().value_of("b"), "blanked");
    }

    #[test]
    fn test_unknown_key_is_a_silent_noop() {
        let store = Store::new().shared();
        let manager =
            RuleManager::new(store.clone()).with_fields([("b".to_string(), branch_on_a())]);

        manager.use_value("nope", "1");
        assert!(store.borrow().data.is_empty());
    }

    #[test]
    fn test_master_is_idempotent() {
        let store = Store::new().shared();
        store.borrow_mut().set("a", "1");
        let commits = Rc::new(Cell::new(0));
        let manager = {
            let commits = Rc::clone(&commits);
            RuleManager::new(store.clone())
                .with_subscriber(move |_| commits.set(commits.get() + 1))
                .with_fields([
                    (
                        "a".to_string(),
                        FieldConfig::new()
                            .with_type("select")
                            .with_value("1")
                            .with_master(true),
                    ),
                    ("b".to_string(), branch_on_a()),
                ])
        };

        manager.master();
        let after_first = commits.get();
        assert!(after_first > 0);

        manager.master();
        manager.master();
        assert_eq!(commits.get(), after_first);
    }

    #[test]
    fn test_master_skips_fields_with_empty_defaults() {
        let store = Store::new().shared();
        let manager = RuleManager::new(store.clone()).with_fields([
            (
                "a".to_string(),
                FieldConfig::new().with_master(true), // default value is ''
            ),
            ("b".to_string(), branch_on_a()),
        ]);

        manager.master();
        assert!(store.borrow().data.is_empty());
    }

    #[test]
    fn test_recursion_guard_bounds_reentrant_subscribers() {
        let store = Store::new().shared();
        store.borrow_mut().set("a", "1");
        store.borrow_mut().set("b", "1");

        // b follows a, and a subscriber echoes every commit of b back as a
        // change of a: without the guard this cascades forever
        let manager = Rc::new(RefCell::new(None::<Rc<RuleManager>>));
        let commits = Rc::new(Cell::new(0));

        let inner = {
            let manager = Rc::clone(&manager);
            let commits = Rc::clone(&commits);
            Rc::new(
                RuleManager::new(store.clone())
                    .with_max_depth(8)
                    .with_subscriber(move |event| {
                        commits.set(commits.get() + 1);
                        if event.key == "b" {
                            if let Some(manager) = manager.borrow().as_ref() {
                                let value = event.value.clone().unwrap_or_default();
                                manager.use_value("a", &value);
                            }
                        }
                    })
                    .with_fields([(
                        "b".to_string(),
                        FieldConfig::new().with_rule(RuleNode::branch(
                            "a",
                            [("1", RuleNode::literal("1"))],
                        )),
                    )]),
            )
        };
        *manager.borrow_mut() = Some(Rc::clone(&inner));

        inner.use_value("a", "1");

        // one commit per dispatch level, stopped at the configured depth
        assert_eq!(commits.get(), 8);
    }

    #[test]
    fn test_commit_event_fires_before_use_value_returns() {
        let store = Store::new().shared();
        let order = Rc::new(RefCell::new(Vec::new()));
        let manager = {
            let order = Rc::clone(&order);
            RuleManager::new(store)
                .with_subscriber(move |event| order.borrow_mut().push(event.key.clone()))
                .with_fields([("b".to_string(), branch_on_a())])
        };

        manager.use_value("a", "1");
        assert_eq!(order.borrow().as_slice(), ["b"]);
    }

    #[test]
    fn test_display_commit_matches_value_list_tokens() {
        let store = Store::new().shared();
        let config = FieldConfig::new().with_rule(RuleNode::branch(
            "a",
            [("1", RuleNode::value_list(["z", "disabled"]))],
        ));
        let manager =
            RuleManager::new(store.clone()).with_fields([("c".to_string(), config)]);

        manager.use_value("a", "1");
        assert_eq!(store.borrow().value_of("c"), "z");
        assert_eq!(
            store.borrow().display.get("c"),
            Some(&DisplayState::disabled())
        );
    }
}
