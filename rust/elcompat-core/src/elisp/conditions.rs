//! Condition hierarchy: error symbols, their parents and messages.
//!
//! Owned by the [`Evaluator`](super::eval::Evaluator); `define-error`
//! registers new kinds at runtime.

use std::collections::{HashMap, HashSet};

/// Name of the universal root condition.
pub const ERROR_ROOT: &str = "error";

#[derive(Clone, Debug)]
struct ConditionInfo {
    parent: Option<String>,
    message: String,
}

#[derive(Clone, Debug)]
pub struct ConditionRegistry {
    conditions: HashMap<String, ConditionInfo>,
}

/// Standard conditions: (name, parent, message).
const STANDARD_CONDITIONS: &[(&str, &str, &str)] = &[
    ("quit", ERROR_ROOT, "Quit"),
    ("user-error", ERROR_ROOT, ""),
    ("wrong-type-argument", ERROR_ROOT, "Wrong type argument"),
    ("wrong-number-of-arguments", ERROR_ROOT, "Wrong number of arguments"),
    ("void-variable", ERROR_ROOT, "Symbol's value as variable is void"),
    ("void-function", ERROR_ROOT, "Symbol's function definition is void"),
    ("invalid-function", ERROR_ROOT, "Invalid function"),
    ("args-out-of-range", ERROR_ROOT, "Args out of range"),
    ("arith-error", ERROR_ROOT, "Arithmetic error"),
    ("overflow-error", "arith-error", "Arithmetic overflow error"),
    ("invalid-regexp", ERROR_ROOT, "Invalid regexp"),
    ("search-failed", ERROR_ROOT, "Search failed"),
    ("file-error", ERROR_ROOT, "File error"),
    ("file-missing", "file-error", "Cannot open load file"),
    ("setting-constant", ERROR_ROOT, "Attempt to set a constant symbol"),
    ("excessive-lisp-nesting", ERROR_ROOT, "Lisp nesting exceeds `max-lisp-eval-depth'"),
    ("end-of-file", ERROR_ROOT, "End of file during parsing"),
    ("invalid-read-syntax", ERROR_ROOT, "Invalid read syntax"),
    ("cl-assertion-failed", ERROR_ROOT, "Assertion failed"),
];

impl Default for ConditionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionRegistry {
    /// Registry seeded with `error` and the standard conditions.
    pub fn new() -> Self {
        let mut conditions = HashMap::new();
        conditions.insert(
            ERROR_ROOT.to_string(),
            ConditionInfo {
                parent: None,
                message: "error".to_string(),
            },
        );
        for (name, parent, message) in STANDARD_CONDITIONS {
            conditions.insert(
                name.to_string(),
                ConditionInfo {
                    parent: Some(parent.to_string()),
                    message: message.to_string(),
                },
            );
        }
        Self { conditions }
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.conditions.contains_key(name)
    }

    pub fn parent(&self, name: &str) -> Option<&str> {
        self.conditions.get(name)?.parent.as_deref()
    }

    pub fn message(&self, name: &str) -> Option<&str> {
        self.conditions.get(name).map(|info| info.message.as_str())
    }

    /// Register (or redefine) `name` under `parent`.  Refuses a definition
    /// whose parent chain would lead back to `name`, and the root itself.
    pub fn define(&mut self, name: &str, message: &str, parent: &str) -> Result<(), String> {
        if name == ERROR_ROOT {
            return Err("cannot redefine the root condition".to_string());
        }
        if name == parent || self.chain(parent).iter().any(|c| c == name) {
            return Err(format!("condition {name} would be its own ancestor"));
        }
        self.conditions.insert(
            name.to_string(),
            ConditionInfo {
                parent: Some(parent.to_string()),
                message: message.to_string(),
            },
        );
        tracing::debug!(condition = name, parent, "defined condition");
        Ok(())
    }

    /// `name` followed by its ancestors, stopping at the root, an unknown
    /// name, or a name already seen.
    pub fn chain(&self, name: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(name.to_string());
        while let Some(cond) = current {
            if !seen.insert(cond.clone()) {
                break;
            }
            current = self.parent(&cond).map(str::to_string);
            out.push(cond);
        }
        out
    }

    /// Whether a handler spec (a single name, or `t`) catches `condition`.
    pub fn matches(&self, spec: &str, condition: &str) -> bool {
        spec == "t" || self.chain(condition).iter().any(|c| c == spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn user_condition_is_caught_by_its_ancestors() {
        let mut reg = ConditionRegistry::new();
        reg.define("my-err", "My error", ERROR_ROOT).unwrap();
        reg.define("my-sub-err", "Sub", "my-err").unwrap();
        assert!(reg.matches("error", "my-sub-err"));
        assert!(reg.matches("my-err", "my-sub-err"));
        assert!(!reg.matches("my-sub-err", "my-err"));
        assert!(reg.matches("t", "anything"));
        assert_eq!(reg.message("my-err"), Some("My error"));
    }

    #[test]
    fn standard_conditions_descend_from_error() {
        let reg = ConditionRegistry::new();
        assert_eq!(
            reg.chain("overflow-error"),
            vec!["overflow-error", "arith-error", "error"]
        );
        assert!(!reg.matches("error", "throw"));
        assert!(reg.matches("throw", "throw"));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut reg = ConditionRegistry::new();
        reg.define("a", "", ERROR_ROOT).unwrap();
        reg.define("b", "", "a").unwrap();
        assert!(reg.define("a", "", "b").is_err());
        assert!(reg.define("c", "", "c").is_err());
        assert!(reg.define(ERROR_ROOT, "", "a").is_err());
        assert_eq!(reg.parent("a"), Some(ERROR_ROOT));
    }

    proptest! {
        #[test]
        fn chains_are_finite_and_reach_root(parents in proptest::collection::vec(0usize..8, 1..8)) {
            let mut reg = ConditionRegistry::new();
            for (i, p) in parents.iter().enumerate() {
                let parent = if *p >= i { ERROR_ROOT.to_string() } else { format!("c{p}") };
                let _ = reg.define(&format!("c{i}"), "", &parent);
            }
            for i in 0..parents.len() {
                let chain = reg.chain(&format!("c{i}"));
                prop_assert_eq!(chain.last().map(String::as_str), Some(ERROR_ROOT));
            }
        }
    }
}
