//! Emacs Lisp runtime.
//!
//! Source text goes through [`preprocess`] and [`reader`] into [`Value`]
//! forms, which the [`Evaluator`] runs against the buffer, window, timer
//! and keymap state it owns.

pub mod conditions;
pub mod env;
pub mod error;
pub mod eval;
pub mod gamegrid;
pub mod interactive;
pub mod keymap;
pub mod load;
pub mod preprocess;
pub mod print;
pub mod reader;
pub mod regex;
pub mod timer;
pub mod value;

mod builtins;
mod cl_loop;
mod modes;
mod pcase;
mod places;

pub use error::{EvalError, Flow};
pub use eval::Evaluator;
pub use interactive::TimerOutcome;
pub use load::{FsLoader, SourceLoader};
pub use timer::TimerId;
pub use value::Value;
