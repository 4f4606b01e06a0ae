use super::*;
use crate::elisp::timer::{self, TimerId};

use std::time::{Duration, Instant};

/// Delay designator of `run-at-time`: seconds, nil/t for now, or a string
/// such as `"now"`, `"2 sec"` or `"1.5 min"`.
fn delay_of(value: &Value) -> Result<Duration, Flow> {
    match value {
        Value::Nil | Value::True => Ok(Duration::ZERO),
        Value::Str(s) => parse_relative_time(s).ok_or_else(|| {
            error_message(format!("Invalid time specification: {s}"))
        }),
        other => timer::seconds(other).ok_or_else(|| wrong_type("numberp", other)),
    }
}

fn parse_relative_time(spec: &str) -> Option<Duration> {
    let spec = spec.trim();
    if spec == "now" {
        return Some(Duration::ZERO);
    }
    let split = spec
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(spec.len());
    let amount: f64 = spec[..split].parse().ok()?;
    let scale = match spec[split..].trim() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
        "min" | "mins" | "minute" | "minutes" => 60.0,
        "hour" | "hours" => 3600.0,
        _ => return None,
    };
    Some(Duration::from_secs_f64(amount * scale))
}

fn repeat_of(value: Option<&Value>) -> Result<Option<Duration>, Flow> {
    match value {
        None | Some(Value::Nil) => Ok(None),
        Some(v) => timer::seconds(v)
            .map(Some)
            .ok_or_else(|| wrong_type("numberp", v)),
    }
}

fn schedule(eval: &mut Evaluator, args: Vec<Value>, idle: bool) -> EvalResult {
    let delay = delay_of(&args[0])?;
    let period = if idle {
        // An idle timer with REPEAT fires on every idle period.
        args[1].is_truthy().then_some(delay)
    } else {
        repeat_of(args.get(1))?
    };
    let mut rest = args.into_iter().skip(2);
    let callback = rest.next().unwrap_or(Value::Nil);
    let id = eval
        .timers
        .add(delay, period, callback, rest.collect(), idle, Instant::now());
    Ok(Value::Timer(id))
}

/// `run-at-time` and `run-with-timer`: `(TIME REPEAT FUNCTION &rest ARGS)`.
pub(crate) fn builtin_run_at_time(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("run-at-time", &args, 3)?;
    schedule(eval, args, false)
}

pub(crate) fn builtin_run_with_idle_timer(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("run-with-idle-timer", &args, 3)?;
    schedule(eval, args, true)
}

fn expect_timer(value: &Value) -> Result<TimerId, Flow> {
    match value {
        Value::Timer(id) => Ok(*id),
        other => Err(wrong_type("timerp", other)),
    }
}

pub(crate) fn builtin_cancel_timer(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("cancel-timer", &args, 1)?;
    let id = expect_timer(&args[0])?;
    eval.timers.cancel(id);
    Ok(Value::Nil)
}

pub(crate) fn builtin_timerp(args: Vec<Value>) -> EvalResult {
    expect_args("timerp", &args, 1)?;
    Ok(Value::bool(matches!(args[0], Value::Timer(_))))
}

pub(crate) fn builtin_timer_list(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("timer-list", &args, 0)?;
    Ok(Value::list(
        eval.timers.active_ids().into_iter().map(Value::Timer).collect(),
    ))
}

/// `(timer-set-time TIMER TIME &optional REPEAT)`.
pub(crate) fn builtin_timer_set_time(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("timer-set-time", &args, 2, 3)?;
    let id = expect_timer(&args[0])?;
    let period = repeat_of(args.get(2))?.unwrap_or(delay_of(&args[1])?);
    eval.timers.set_period(id, period, Instant::now());
    Ok(args[0].clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_at_time_registers_repeating_timer() {
        let mut ev = Evaluator::new();
        let timer = ev.eval_str("(setq tm (run-at-time 0.5 0.25 'tick 'board))").unwrap();
        let Value::Timer(id) = timer else {
            panic!("expected a timer, got {timer:?}");
        };
        let record = ev.timers().get(id).unwrap();
        assert_eq!(record.period, Some(Duration::from_millis(250)));
        assert_eq!(record.callback, Value::symbol("tick"));
        assert_eq!(record.args, vec![Value::symbol("board")]);
        assert_eq!(ev.eval_str("(timerp tm)").unwrap(), Value::True);
        assert_eq!(ev.eval_str("(length (timer-list))").unwrap(), Value::Int(1));
        ev.eval_str("(cancel-timer tm)").unwrap();
        assert_eq!(ev.eval_str("(timer-list)").unwrap(), Value::Nil);
    }

    #[test]
    fn relative_time_strings() {
        assert_eq!(parse_relative_time("now"), Some(Duration::ZERO));
        assert_eq!(parse_relative_time("2 sec"), Some(Duration::from_secs(2)));
        assert_eq!(parse_relative_time("1.5 min"), Some(Duration::from_secs(90)));
        assert_eq!(parse_relative_time("soon"), None);
    }

    #[test]
    fn idle_timer_repeats_with_its_delay() {
        let mut ev = Evaluator::new();
        let Value::Timer(id) = ev.eval_str("(run-with-idle-timer 2 t #'ignore)").unwrap() else {
            panic!("expected a timer");
        };
        let record = ev.timers().get(id).unwrap();
        assert!(record.idle);
        assert_eq!(record.period, Some(Duration::from_secs(2)));
        assert!(ev.eval_str("(cancel-timer 'nope)").is_err());
    }
}
