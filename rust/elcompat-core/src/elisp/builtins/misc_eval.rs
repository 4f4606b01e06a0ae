use super::*;
use crate::elisp::conditions::ERROR_ROOT;
use crate::elisp::print::print_value;
use super::strings::format_string;

use std::time::{SystemTime, UNIX_EPOCH};

// ===========================================================================
// Messages and errors
// ===========================================================================

fn format_args(eval: &Evaluator, args: &[Value]) -> Result<String, Flow> {
    let control = expect_string(&args[0])?;
    format_string(&control, &args[1..], &eval.buffers)
}

/// `(message FORMAT &rest ARGS)`: logged and kept in the message log.
/// A nil format clears the echo area and returns nil.
pub(crate) fn builtin_message(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("message", &args, 1)?;
    if args[0].is_nil() {
        return Ok(Value::Nil);
    }
    let text = format_args(eval, &args)?;
    tracing::info!(target: "elcompat::message", "{text}");
    eval.messages.push(text.clone());
    Ok(Value::string(text))
}

pub(crate) fn builtin_format_message(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("format-message", &args, 1)?;
    Ok(Value::string(format_args(eval, &args)?))
}

pub(crate) fn builtin_error(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("error", &args, 1)?;
    Err(error_message(format_args(eval, &args)?))
}

pub(crate) fn builtin_user_error(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("user-error", &args, 1)?;
    Err(Flow::Signal(SignalData {
        symbol: "user-error".to_string(),
        data: Value::string(format_args(eval, &args)?),
    }))
}

/// `(signal ERROR-SYMBOL DATA)`.
pub(crate) fn builtin_signal(_eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("signal", &args, 2)?;
    let symbol = expect_symbol_name(&args[0])?;
    Err(Flow::Signal(SignalData {
        symbol,
        data: args[1].clone(),
    }))
}

pub(crate) fn builtin_throw(_eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("throw", &args, 2)?;
    Err(Flow::Throw {
        tag: args[0].clone(),
        value: args[1].clone(),
    })
}

/// Render a condition record `(NAME DATA)` the way the echo area would.
pub(crate) fn error_message_string(eval: &Evaluator, record: &Value) -> String {
    let name = record.cons_car().as_symbol_name().unwrap_or("error").to_string();
    let data = record.cons_cdr().cons_car();
    let plain = matches!(name.as_str(), ERROR_ROOT | "user-error");
    let message = eval
        .conditions
        .message(&name)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "peculiar error".to_string());
    let show = |v: &Value| print_value(v, true, &eval.buffers);
    match &data {
        Value::Str(s) if plain || !eval.conditions.is_defined(&name) => s.to_string(),
        Value::Str(s) if **s == *name => message,
        Value::Str(s) => format!("{message}: {s}"),
        Value::Nil => message,
        Value::Cons(_) => {
            let items = list_to_vec(&data).unwrap_or_else(|| vec![data.clone()]);
            match items.first() {
                Some(Value::Str(s)) if plain => s.to_string(),
                _ => format!(
                    "{message}: {}",
                    items.iter().map(show).collect::<Vec<_>>().join(", ")
                ),
            }
        }
        other => format!("{message}: {}", show(other)),
    }
}

pub(crate) fn builtin_error_message_string(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("error-message-string", &args, 1)?;
    if !args[0].is_cons() {
        return Err(wrong_type("consp", &args[0]));
    }
    Ok(Value::string(error_message_string(eval, &args[0])))
}

/// `(define-error NAME MESSAGE &optional PARENT)`.  PARENT may be a list,
/// whose first element is used; it defaults to `error`.
pub(crate) fn builtin_define_error(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("define-error", &args, 2, 3)?;
    let name = expect_symbol_name(&args[0])?;
    let message = match &args[1] {
        Value::Nil => String::new(),
        other => expect_string(other)?,
    };
    let parent = match args.get(2) {
        None | Some(Value::Nil) => ERROR_ROOT.to_string(),
        Some(list @ Value::Cons(_)) => expect_symbol_name(&list.cons_car())?,
        Some(other) => expect_symbol_name(other)?,
    };
    eval.conditions
        .define(&name, &message, &parent)
        .map_err(error_message)?;
    Ok(Value::Nil)
}

// ===========================================================================
// Printing
// ===========================================================================

/// Send printed text to PRINTCHARFUN: a buffer (inserted at point) or,
/// for nil and t, standard output.
fn emit(eval: &mut Evaluator, text: &str, printcharfun: Option<&Value>) -> Result<(), Flow> {
    match printcharfun {
        Some(Value::Buffer(id)) => {
            let buf = eval
                .buffers
                .get_mut(*id)
                .ok_or_else(|| error_message("Selecting deleted buffer"))?;
            buf.insert(text);
        }
        Some(Value::Str(name)) => {
            let id = eval
                .buffers
                .find_buffer_by_name(name)
                .ok_or_else(|| error_message(format!("No such buffer {name}")))?;
            if let Some(buf) = eval.buffers.get_mut(id) {
                buf.insert(text);
            }
        }
        Some(function @ (Value::Lambda(_) | Value::Symbol(_))) => {
            for c in text.chars() {
                eval.apply(function.clone(), vec![Value::Int(c as i64)])?;
            }
        }
        _ => eval.output.push_str(text),
    }
    Ok(())
}

pub(crate) fn builtin_princ(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("princ", &args, 1, 2)?;
    let text = eval.princ(&args[0]);
    emit(eval, &text, args.get(1))?;
    Ok(args[0].clone())
}

pub(crate) fn builtin_prin1(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("prin1", &args, 1, 3)?;
    let text = eval.prin1(&args[0]);
    emit(eval, &text, args.get(1))?;
    Ok(args[0].clone())
}

pub(crate) fn builtin_print(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("print", &args, 1, 2)?;
    let text = format!("\n{}\n", eval.prin1(&args[0]));
    emit(eval, &text, args.get(1))?;
    Ok(args[0].clone())
}

pub(crate) fn builtin_terpri(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("terpri", &args, 2)?;
    emit(eval, "\n", args.first())?;
    Ok(Value::True)
}

// ===========================================================================
// Time
// ===========================================================================

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

pub(crate) fn builtin_float_time(_eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("float-time", &args, 1)?;
    match args.first() {
        None | Some(Value::Nil) => Ok(Value::Float(now_secs())),
        Some(Value::Int(n)) => Ok(Value::Float(*n as f64)),
        Some(Value::Float(f)) => Ok(Value::Float(*f)),
        Some(time @ Value::Cons(_)) => {
            let parts = expect_list(time)?;
            let field = |i: usize| parts.get(i).and_then(Value::as_int).unwrap_or(0) as f64;
            Ok(Value::Float(field(0) * 65536.0 + field(1) + field(2) / 1e6))
        }
        Some(other) => Err(wrong_type("time", other)),
    }
}

/// `(current-time)` as `(HIGH LOW USEC PSEC)`.
pub(crate) fn builtin_current_time(_eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("current-time", &args, 0)?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs = now.as_secs() as i64;
    Ok(Value::list(vec![
        Value::Int(secs >> 16),
        Value::Int(secs & 0xFFFF),
        Value::Int(now.subsec_micros() as i64),
        Value::Int(0),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_logs_and_returns_text() {
        let mut ev = Evaluator::new();
        let out = ev.eval_str("(message \"score: %d\" 12)").unwrap();
        assert_eq!(out, Value::string("score: 12"));
        assert_eq!(ev.messages(), ["score: 12".to_string()]);
        assert_eq!(ev.eval_str("(message nil)").unwrap(), Value::Nil);
        assert_eq!(ev.messages().len(), 1);
    }

    #[test]
    fn error_message_strings() {
        let mut ev = Evaluator::new();
        let msg = ev
            .eval_str("(condition-case err (error \"Bad move %d\" 3) (error (error-message-string err)))")
            .unwrap();
        assert_eq!(msg, Value::string("Bad move 3"));
        let msg = ev
            .eval_str("(condition-case err (car 1) (error (error-message-string err)))")
            .unwrap();
        assert_eq!(msg, Value::string("Wrong type argument: listp, 1"));
        let msg = ev
            .eval_str("(error-message-string '(void-variable foo))")
            .unwrap();
        assert_eq!(msg, Value::string("Symbol's value as variable is void: foo"));
    }

    #[test]
    fn define_error_accepts_parent_lists() {
        let mut ev = Evaluator::new();
        ev.eval_str("(define-error 'game-over \"Game over\" '(user-error))").unwrap();
        assert_eq!(ev.conditions.parent("game-over"), Some("user-error"));
        let caught = ev
            .eval_str("(condition-case nil (signal 'game-over nil) (user-error 'caught))")
            .unwrap();
        assert_eq!(caught, Value::symbol("caught"));
        assert!(ev.eval_str("(define-error 'error \"no\")").is_err());
    }

    #[test]
    fn printing_goes_to_output_or_buffer() {
        let mut ev = Evaluator::new();
        ev.eval_str("(princ \"hi\") (prin1 \"there\") (terpri)").unwrap();
        assert_eq!(ev.take_output(), "hi\"there\"\n");
        ev.eval_str("(with-temp-buffer (princ 42 (current-buffer)) (setq got (buffer-string)))")
            .unwrap();
        assert_eq!(ev.global_value("got"), Some(Value::string("42")));
        assert!(ev.take_output().is_empty());
    }

    #[test]
    fn signal_and_throw_builtins() {
        let mut ev = Evaluator::new();
        let err = builtin_signal(&mut ev, vec![Value::symbol("quit"), Value::Nil]).unwrap_err();
        assert_eq!(err.condition_name(), Some("quit"));
        let out = ev.eval_str("(catch 'done (funcall #'throw 'done 7))").unwrap();
        assert_eq!(out, Value::Int(7));
    }
}
