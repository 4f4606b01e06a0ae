//! Error and non-local exit types.
//!
//! Evaluation returns [`EvalResult`]; the `Err` side is a [`Flow`], which
//! carries both real failures (signals, arity and type errors, missing
//! primitives) and non-local exits (`throw`).  [`EvalError`] is the public
//! form handed to code outside the evaluator.

use std::fmt;

use thiserror::Error;

use super::value::Value;

pub type EvalResult = Result<Value, Flow>;

/// Non-local control flow and failures raised while evaluating.
#[derive(Clone, Debug)]
pub enum Flow {
    /// A named condition raised by `signal`, `error`, or a primitive.
    Signal(SignalData),
    /// A `throw` looking for its `catch`.
    Throw { tag: Value, value: Value },
    /// A callable received the wrong number of arguments.
    Arity(ArityError),
    /// A primitive received a value of the wrong kind.
    TypeMismatch(TypeMismatch),
    /// A called name has no binding anywhere.
    Unimplemented(String),
}

/// Payload of a named condition.
#[derive(Clone, Debug)]
pub struct SignalData {
    pub symbol: String,
    pub data: Value,
}

/// Structured arity failure.
///
/// `exact` is true when the callee accepts exactly `minimum` arguments;
/// otherwise `minimum` is a lower bound and `maximum` (if any) the upper one.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{}: expected {}, received {received}", self.callee(), self.expected())]
pub struct ArityError {
    pub function: Option<String>,
    pub minimum: usize,
    pub maximum: Option<usize>,
    pub exact: bool,
    pub received: usize,
}

impl ArityError {
    pub fn new(function: Option<&str>, minimum: usize, maximum: Option<usize>, received: usize) -> Self {
        Self {
            function: function.map(str::to_string),
            minimum,
            maximum,
            exact: maximum == Some(minimum),
            received,
        }
    }

    fn callee(&self) -> &str {
        self.function.as_deref().unwrap_or("lambda")
    }

    fn expected(&self) -> String {
        match (self.exact, self.maximum) {
            (true, _) => format!("exactly {}", self.minimum),
            (false, Some(max)) => format!("{} to {}", self.minimum, max),
            (false, None) => format!("at least {}", self.minimum),
        }
    }
}

/// A value of the wrong kind reached a primitive.
#[derive(Clone, Debug, Error)]
#[error("wrong type argument: {expected}, {got}")]
pub struct TypeMismatch {
    /// Predicate name describing the expected kind, e.g. `listp`.
    pub expected: String,
    pub got: Value,
}

/// Preprocessor or reader failure.  Fatal for the load that raised it.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message} (at offset {offset})")]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// Error surfaced by the public evaluation entry points.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Arity(ArityError),
    #[error("{0}")]
    TypeMismatch(TypeMismatch),
    #[error("{symbol}: {data}")]
    Signal { symbol: String, data: Value },
    #[error("no catch for tag: {tag}, {value}")]
    UncaughtThrow { tag: Value, value: Value },
    #[error("feature not implemented: {0}")]
    UnimplementedPrimitive(String),
}

impl From<Flow> for EvalError {
    fn from(flow: Flow) -> Self {
        match flow {
            Flow::Signal(sig) => EvalError::Signal {
                symbol: sig.symbol,
                data: sig.data,
            },
            Flow::Throw { tag, value } => EvalError::UncaughtThrow { tag, value },
            Flow::Arity(err) => EvalError::Arity(err),
            Flow::TypeMismatch(err) => EvalError::TypeMismatch(err),
            Flow::Unimplemented(name) => EvalError::UnimplementedPrimitive(name),
        }
    }
}

impl From<ArityError> for Flow {
    fn from(err: ArityError) -> Self {
        Flow::Arity(err)
    }
}

impl From<TypeMismatch> for Flow {
    fn from(err: TypeMismatch) -> Self {
        Flow::TypeMismatch(err)
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flow::Signal(sig) => write!(f, "{}: {}", sig.symbol, sig.data),
            Flow::Throw { tag, value } => write!(f, "no catch for tag: {tag}, {value}"),
            Flow::Arity(err) => err.fmt(f),
            Flow::TypeMismatch(err) => err.fmt(f),
            Flow::Unimplemented(name) => write!(f, "feature not implemented: {name}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

/// Build a signal flow.  `data` becomes the condition's data list.
pub fn signal(symbol: &str, data: Vec<Value>) -> Flow {
    Flow::Signal(SignalData {
        symbol: symbol.to_string(),
        data: Value::list(data),
    })
}

/// `(error MESSAGE)` equivalent.
pub fn error_message(message: impl Into<String>) -> Flow {
    Flow::Signal(SignalData {
        symbol: "error".to_string(),
        data: Value::string(message),
    })
}

pub fn wrong_type(expected: &str, got: &Value) -> Flow {
    Flow::TypeMismatch(TypeMismatch {
        expected: expected.to_string(),
        got: got.clone(),
    })
}

impl Flow {
    /// Condition name this flow is matched under by `condition-case`.
    pub fn condition_name(&self) -> Option<&str> {
        match self {
            Flow::Signal(sig) => Some(&sig.symbol),
            Flow::Throw { .. } => Some("throw"),
            Flow::Arity(_) => Some("wrong-number-of-arguments"),
            Flow::TypeMismatch(_) => Some("wrong-type-argument"),
            Flow::Unimplemented(_) => None,
        }
    }

    /// Two-element condition record `(NAME DATA)` bound by `condition-case`.
    pub fn condition_record(&self) -> Option<Value> {
        let data = match self {
            Flow::Signal(sig) if sig.data.is_nil() => Value::string(sig.symbol.clone()),
            Flow::Signal(sig) => sig.data.clone(),
            Flow::Throw { tag, value } => Value::list(vec![tag.clone(), value.clone()]),
            Flow::Arity(err) => Value::list(vec![
                err.function
                    .as_deref()
                    .map(Value::symbol)
                    .unwrap_or(Value::Nil),
                Value::Int(err.received as i64),
            ]),
            Flow::TypeMismatch(err) => {
                Value::list(vec![Value::symbol(&err.expected), err.got.clone()])
            }
            Flow::Unimplemented(_) => return None,
        };
        let name = self.condition_name()?;
        Some(Value::list(vec![Value::symbol(name), data]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_error_reports_structured_fields() {
        let err = ArityError::new(Some("pair"), 2, Some(2), 3);
        assert_eq!(err.minimum, 2);
        assert!(err.exact);
        assert_eq!(err.received, 3);
        assert_eq!(err.to_string(), "pair: expected exactly 2, received 3");

        let open = ArityError::new(None, 1, None, 0);
        assert!(!open.exact);
        assert_eq!(open.to_string(), "lambda: expected at least 1, received 0");
    }

    #[test]
    fn unimplemented_has_no_condition_record() {
        let flow = Flow::Unimplemented("frobnicate".into());
        assert!(flow.condition_record().is_none());
        let public: EvalError = flow.into();
        assert_eq!(public.to_string(), "feature not implemented: frobnicate");
    }

    #[test]
    fn signal_without_data_records_its_name_as_message() {
        let flow = Flow::Signal(SignalData {
            symbol: "quit".into(),
            data: Value::Nil,
        });
        let record = flow.condition_record().unwrap();
        assert_eq!(record.to_string(), "(quit \"quit\")");
    }
}
