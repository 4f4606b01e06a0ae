//! Runtime for running Emacs Lisp game programs outside Emacs.
//!
//! [`elisp::Evaluator`] is the entry point: it reads and evaluates source,
//! owns the [`buffer`] and [`window`] model, and exposes the timers and
//! key dispatch a terminal driver needs.

pub mod buffer;
pub mod config;
pub mod elisp;
pub mod window;

pub use config::RuntimeConfig;
pub use elisp::{EvalError, Evaluator, Value};
