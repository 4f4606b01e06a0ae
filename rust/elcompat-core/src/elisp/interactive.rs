//! Command invocation for the input and timer drivers.
//!
//! Commands vary in arity: most take no arguments, some take a prefix
//! argument.  The drivers call through [`Evaluator::invoke_command`] and
//! [`Evaluator::fire_timer`], which retry with the other arity based on the
//! structured fields of an [`ArityError`], never on message text.

use super::builtins::{expect_max_args, expect_min_args, expect_range_args};
use super::error::*;
use super::eval::Evaluator;
use super::keymap;
use super::timer::TimerId;
use super::value::*;

use std::time::Instant;

/// Primitives that count as interactive commands.
const COMMAND_PRIMITIVES: &[&str] = &[
    "forward-char",
    "backward-char",
    "forward-line",
    "beginning-of-line",
    "end-of-line",
    "forward-word",
    "backward-word",
    "newline",
    "delete-char",
    "erase-buffer",
    "kill-buffer",
    "switch-to-buffer",
    "split-window",
    "delete-window",
    "delete-other-windows",
    "ignore",
];

/// What happened when a timer was handed to [`Evaluator::fire_timer`].
#[derive(Debug)]
pub enum TimerOutcome {
    /// The callback ran to completion.
    Fired(Value),
    /// The callback signalled `quit`; the timer was disabled.
    Quit,
    /// The callback failed; the timer was disabled.
    Failed(EvalError),
    /// The id is unknown or the timer is no longer active.
    Inactive,
}

impl Evaluator {
    /// Name a resolved callable reports in its arity errors.
    fn callable_name(&self, callee: &Value) -> Option<String> {
        let resolved = match callee {
            Value::Symbol(name) => self.indirect_function(name)?,
            other => other.clone(),
        };
        match resolved {
            Value::Lambda(data) => data.name.clone(),
            Value::Subr(name) => Some(name.to_string()),
            _ => None,
        }
    }

    /// Whether `flow` is the callee itself rejecting a call with `received`
    /// arguments, as opposed to an arity failure deeper in its body.
    fn rejects_arity(&self, callee: &Value, flow: &Flow, received: usize) -> bool {
        let Flow::Arity(err) = flow else {
            return false;
        };
        err.received == received && err.function == self.callable_name(callee)
    }

    /// Call `callee` with no arguments; if it requires one, call it again
    /// with `arg` (default: `1`, then nil).
    pub(crate) fn invoke_command_flow(&mut self, callee: &Value, arg: Option<Value>) -> EvalResult {
        if let Some(name) = callee.as_symbol_name() {
            self.set_global("this-command", Value::symbol(name));
        }
        let result = match self.apply(callee.clone(), Vec::new()) {
            Err(flow) if self.rejects_arity(callee, &flow, 0) && is_one_required(&flow) => {
                match arg {
                    Some(arg) => self.apply(callee.clone(), vec![arg]),
                    None => match self.apply(callee.clone(), vec![Value::Int(1)]) {
                        Err(Flow::TypeMismatch(_)) => self.apply(callee.clone(), vec![Value::Nil]),
                        other => other,
                    },
                }
            }
            other => other,
        };
        let this = self.global_value("this-command").unwrap_or(Value::Nil);
        self.set_global("last-command", this);
        result
    }

    /// Run a bound command (symbol or function value) on behalf of the
    /// input driver.
    pub fn invoke_command(&mut self, callee: &Value, arg: Option<Value>) -> Result<Value, EvalError> {
        self.invoke_command_flow(callee, arg).map_err(EvalError::from)
    }

    /// Binding for a raw input code in the active keymaps.
    pub fn lookup_key_for_input(&mut self, code: i64) -> Option<Value> {
        keymap::key_candidates(code)
            .iter()
            .find_map(|key| super::builtins::keymaps::active_binding(self, key))
            .filter(Value::is_truthy)
    }

    /// Look up and run the command bound to `code`.  Failures are recorded
    /// in the message log.  Returns false when nothing is bound.
    pub fn handle_input(&mut self, code: i64) -> bool {
        let Some(command) = self.lookup_key_for_input(code) else {
            return false;
        };
        self.set_global("last-command-event", Value::Int(code));
        if let Err(err) = self.invoke_command(&command, None) {
            tracing::warn!(code, error = %err, "command failed");
            self.messages.push(format!("{}: {err}", self.prin1(&command)));
        }
        true
    }

    /// Run a due timer's callback.  Timers with arguments get exactly
    /// those; others get the current buffer, or nothing if the callback
    /// takes no arguments.  A failing timer is disabled.
    pub fn fire_timer(&mut self, id: TimerId) -> TimerOutcome {
        let Some(timer) = self.timers.get(id).filter(|t| t.active).cloned() else {
            return TimerOutcome::Inactive;
        };
        self.timers.mark_fired(id, Instant::now());
        tracing::debug!(timer = id.0, callback = %self.prin1(&timer.callback), "firing timer");
        let callback = timer.callback;
        let result = if timer.args.is_empty() {
            let buffer = Value::Buffer(self.buffers.current_id());
            match self.apply(callback.clone(), vec![buffer]) {
                Err(flow) if self.rejects_arity(&callback, &flow, 1) => {
                    self.apply(callback.clone(), Vec::new())
                }
                other => other,
            }
        } else {
            self.apply(callback.clone(), timer.args)
        };
        match result {
            Ok(value) => TimerOutcome::Fired(value),
            Err(flow) => {
                self.timers.deactivate(id);
                let quit = flow
                    .condition_name()
                    .is_some_and(|name| self.conditions.matches("quit", name));
                if quit {
                    tracing::debug!(timer = id.0, "timer quit");
                    TimerOutcome::Quit
                } else {
                    tracing::error!(timer = id.0, error = %flow, "timer callback failed; disabled");
                    TimerOutcome::Failed(flow.into())
                }
            }
        }
    }

    /// Whether `value` names an interactive command.
    pub(crate) fn is_command(&self, value: &Value) -> bool {
        let resolved = match value {
            Value::Symbol(name) => match self.indirect_function(name) {
                Some(resolved) => resolved,
                None => return false,
            },
            other => other.clone(),
        };
        match &resolved {
            Value::Lambda(data) => data
                .body
                .iter()
                .any(|form| form.cons_car().is_symbol_named("interactive")),
            Value::Subr(name) => COMMAND_PRIMITIVES.contains(&&**name),
            Value::Str(_) | Value::Vector(_) => true,
            _ => false,
        }
    }
}

fn is_one_required(flow: &Flow) -> bool {
    matches!(flow, Flow::Arity(err) if err.minimum == 1)
}

fn prefix_arg(eval: &Evaluator) -> Option<Value> {
    eval.global_value("current-prefix-arg").filter(Value::is_truthy)
}

/// `(call-interactively FUNCTION &optional RECORD-FLAG KEYS)`.
pub(crate) fn builtin_call_interactively(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("call-interactively", &args, 1, 3)?;
    if !eval.is_command(&args[0]) && !eval.is_fbound_value(&args[0]) {
        return Err(wrong_type("commandp", &args[0]));
    }
    let arg = prefix_arg(eval);
    eval.invoke_command_flow(&args[0], arg)
}

/// `(command-execute CMD &optional RECORD-FLAG KEYS SPECIAL)`.
pub(crate) fn builtin_command_execute(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("command-execute", &args, 1, 4)?;
    let arg = prefix_arg(eval);
    eval.invoke_command_flow(&args[0], arg)
}

/// `(funcall-interactively FUNCTION &rest ARGS)`.
pub(crate) fn builtin_funcall_interactively(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("funcall-interactively", &args, 1)?;
    let mut args = args.into_iter();
    let function = args.next().unwrap_or(Value::Nil);
    if let Some(name) = function.as_symbol_name() {
        eval.set_global("this-command", Value::symbol(name));
    }
    eval.apply(function, args.collect())
}

/// `(call-fn NAME &rest ARGS)`: call the function named by a symbol or
/// string.
pub(crate) fn builtin_call_fn(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("call-fn", &args, 1)?;
    let mut args = args.into_iter();
    let function = match args.next().unwrap_or(Value::Nil) {
        Value::Str(name) => Value::symbol(&*name),
        other => other,
    };
    if let Some(name) = function.as_symbol_name() {
        if !eval.is_fbound(name) {
            return Err(Flow::Unimplemented(name.to_string()));
        }
    }
    eval.apply(function, args.collect())
}

pub(crate) fn builtin_commandp(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("commandp", &args, 1)?;
    expect_max_args("commandp", &args, 2)?;
    Ok(Value::bool(eval.is_command(&args[0])))
}

impl Evaluator {
    fn is_fbound_value(&self, value: &Value) -> bool {
        match value {
            Value::Symbol(name) => self.is_fbound(name),
            other => other.is_function(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elisp::keymap::KEY_LEFT;

    #[test]
    fn invoke_retries_with_prefix_argument() {
        let mut ev = Evaluator::new();
        ev.eval_str(
            "(defun no-arg () (interactive) 'none)
             (defun one-arg (n) (interactive \"p\") (list 'got n))
             (defun opt-arg (&optional n) (interactive) (list 'opt n))",
        )
        .unwrap();
        let call = |ev: &mut Evaluator, name: &str, arg: Option<Value>| {
            ev.invoke_command(&Value::symbol(name), arg).unwrap().to_string()
        };
        assert_eq!(call(&mut ev, "no-arg", None), "none");
        assert_eq!(call(&mut ev, "one-arg", None), "(got 1)");
        assert_eq!(call(&mut ev, "one-arg", Some(Value::Int(4))), "(got 4)");
        assert_eq!(call(&mut ev, "opt-arg", None), "(opt nil)");
        assert_eq!(ev.global_value("last-command"), Some(Value::symbol("opt-arg")));
    }

    #[test]
    fn nested_arity_errors_are_not_retried() {
        let mut ev = Evaluator::new();
        ev.eval_str(
            "(defun needs-one (x) x)
             (defun broken () (interactive) (needs-one))",
        )
        .unwrap();
        match ev.invoke_command(&Value::symbol("broken"), None) {
            Err(EvalError::Arity(err)) => assert_eq!(err.function.as_deref(), Some("needs-one")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn retries_with_nil_when_one_is_rejected() {
        let mut ev = Evaluator::new();
        ev.eval_str("(defun wants-list (l) (length l))").unwrap();
        assert_eq!(
            ev.invoke_command(&Value::symbol("wants-list"), None).unwrap(),
            Value::Int(0)
        );
    }

    #[test]
    fn input_codes_dispatch_through_local_then_global_maps() {
        let mut ev = Evaluator::new();
        ev.eval_str(
            "(defvar moves nil)
             (defun go-left () (interactive) (push 'left moves))
             (defun go-quit () (interactive) (push 'quit moves))
             (global-set-key (kbd \"q\") 'go-quit)
             (local-set-key [left] 'go-left)",
        )
        .unwrap();
        assert!(ev.handle_input(KEY_LEFT));
        assert!(ev.handle_input('q' as i64));
        assert!(!ev.handle_input('z' as i64));
        assert_eq!(ev.eval_str("moves").unwrap().to_string(), "(quit left)");
        assert_eq!(ev.lookup_key_for_input(13), None);
    }

    #[test]
    fn failing_commands_are_logged_in_messages() {
        let mut ev = Evaluator::new();
        ev.eval_str("(defun explode () (interactive) (error \"boom\")) (global-set-key \"x\" 'explode)")
            .unwrap();
        assert!(ev.handle_input('x' as i64));
        assert!(ev.messages().last().unwrap().contains("boom"));
    }

    #[test]
    fn timers_receive_buffer_or_nothing() {
        let mut ev = Evaluator::new();
        ev.eval_str(
            "(defvar ticks nil)
             (defun tick-buffer (buf) (push (bufferp buf) ticks))
             (defun tick-plain () (push 'plain ticks))
             (defun tick-args (a b) (push (+ a b) ticks))
             (setq t1 (run-at-time 0 nil 'tick-buffer)
                   t2 (run-at-time 0 1 'tick-plain)
                   t3 (run-at-time 0 nil 'tick-args 2 3))",
        )
        .unwrap();
        let due = ev.timers().due(Instant::now());
        assert_eq!(due.len(), 3);
        for id in due {
            assert!(matches!(ev.fire_timer(id), TimerOutcome::Fired(_)));
        }
        assert_eq!(ev.eval_str("ticks").unwrap().to_string(), "(5 plain t)");
        assert_eq!(ev.timers().active_ids().len(), 1);
    }

    #[test]
    fn failing_timers_are_disabled() {
        let mut ev = Evaluator::new();
        let Value::Timer(quits) = ev.eval_str("(run-at-time 0 1 (lambda () (signal 'quit nil)))").unwrap() else {
            panic!("expected a timer");
        };
        let Value::Timer(fails) = ev.eval_str("(run-at-time 0 1 (lambda () (car 1)))").unwrap() else {
            panic!("expected a timer");
        };
        assert!(matches!(ev.fire_timer(quits), TimerOutcome::Quit));
        assert!(matches!(
            ev.fire_timer(fails),
            TimerOutcome::Failed(EvalError::TypeMismatch(_))
        ));
        assert!(ev.timers().active_ids().is_empty());
        assert!(matches!(ev.fire_timer(fails), TimerOutcome::Inactive));
    }

    #[test]
    fn call_fn_and_commandp() {
        let mut ev = Evaluator::new();
        ev.eval_str("(defun cmd () (interactive) 1) (defun plain (x) (* x 2))").unwrap();
        assert_eq!(ev.eval_str("(call-fn 'plain 21)").unwrap(), Value::Int(42));
        assert_eq!(ev.eval_str("(call-fn \"plain\" 2)").unwrap(), Value::Int(4));
        assert!(matches!(
            ev.eval_str("(call-fn 'missing-fn)"),
            Err(EvalError::UnimplementedPrimitive(_))
        ));
        assert_eq!(
            ev.eval_str("(list (commandp 'cmd) (commandp 'plain) (commandp 'forward-char))")
                .unwrap()
                .to_string(),
            "(t nil t)"
        );
        assert_eq!(ev.eval_str("(call-interactively 'cmd)").unwrap(), Value::Int(1));
    }
}
