//! Runtime configuration.
//!
//! Defaults suit running a single program from the current directory.  The
//! environment can extend them:
//!
//! - `ELCOMPAT_LOAD_PATH`: directories searched by `load` and `require`,
//!   in the platform's path-list syntax (`:` separated on Unix)
//! - `ELCOMPAT_MAX_EVAL_DEPTH`: evaluation nesting limit

use std::env;
use std::path::PathBuf;

pub const LOAD_PATH_VAR: &str = "ELCOMPAT_LOAD_PATH";
pub const MAX_EVAL_DEPTH_VAR: &str = "ELCOMPAT_MAX_EVAL_DEPTH";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Directories searched for `load`/`require`, in order.
    pub load_path: Vec<PathBuf>,
    /// Nesting depth past which evaluation signals `excessive-lisp-nesting`.
    pub max_lisp_eval_depth: usize,
    /// Treat a `require` of a feature that cannot be found as satisfied.
    pub require_shim: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            load_path: vec![PathBuf::from(".")],
            max_lisp_eval_depth: 1600,
            require_shim: true,
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by the environment.  Unparseable values are
    /// ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(paths) = env::var_os(LOAD_PATH_VAR) {
            let extra: Vec<PathBuf> = env::split_paths(&paths)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
            config.load_path.splice(0..0, extra);
        }
        if let Ok(raw) = env::var(MAX_EVAL_DEPTH_VAR) {
            match raw.trim().parse::<usize>() {
                Ok(depth) if depth > 0 => config.max_lisp_eval_depth = depth,
                _ => tracing::warn!(value = %raw, "ignoring invalid {MAX_EVAL_DEPTH_VAR}"),
            }
        }
        config
    }

    /// Put `dir` ahead of the existing load path (the `-L` flag).
    pub fn prepend_load_path(&mut self, dir: impl Into<PathBuf>) {
        self.load_path.insert(0, dir.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.max_lisp_eval_depth, 1600);
        assert!(config.require_shim);
        assert_eq!(config.load_path, vec![PathBuf::from(".")]);
    }

    #[test]
    fn prepend_puts_directory_first() {
        let mut config = RuntimeConfig::default();
        config.prepend_load_path("/opt/lisp");
        assert_eq!(config.load_path[0], PathBuf::from("/opt/lisp"));
        assert_eq!(config.load_path.len(), 2);
    }
}
