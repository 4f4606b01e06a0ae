//! Primitives for editor features this runtime has no model of: text
//! properties, faces, undo, syntax tables, the minibuffer and the display.
//! They accept their usual arguments and return plausible constants so that
//! programs written against a full editor keep running.

use super::*;

use std::time::{SystemTime, UNIX_EPOCH};

/// Names that ignore their arguments and return nil.
const NIL_STUBS: &[&str] = &[
    "put-text-property",
    "add-text-properties",
    "set-text-properties",
    "remove-text-properties",
    "remove-list-of-text-properties",
    "add-face-text-property",
    "remove-overlays",
    "set-face-attribute",
    "set-face-foreground",
    "set-face-background",
    "redisplay",
    "force-mode-line-update",
    "set-window-dedicated-p",
    "recenter",
    "set-window-start",
    "buffer-disable-undo",
    "buffer-enable-undo",
    "undo-boundary",
    "primitive-undo",
    "auto-fill-mode",
    "turn-on-auto-fill",
    "turn-off-auto-fill",
    "fill-region-as-paragraph",
    "lpr-print-region",
    "modify-syntax-entry",
    "set-syntax-table",
    "modify-frame-parameters",
    "set-frame-selected-window",
    "select-frame",
    "make-obsolete",
    "make-obsolete-variable",
    "input-pending-p",
    "called-interactively-p",
    "display-graphic-p",
    "display-images-p",
    "frame-parameter",
    "get-text-property",
    "text-properties-at",
    "ding",
    "beep",
    "sleep-for",
];

/// Names that ignore their arguments and return t.
const T_STUBS: &[&str] = &[
    "sit-for",
    "y-or-n-p",
    "yes-or-no-p",
    "display-color-p",
    "frame-visible-p",
    "facep",
];

/// Result of a constant stub, or `None` when `name` is not one.
pub(crate) fn constant_stub(name: &str) -> Option<Value> {
    if NIL_STUBS.contains(&name) {
        Some(Value::Nil)
    } else if T_STUBS.contains(&name) {
        Some(Value::True)
    } else {
        None
    }
}

pub(crate) fn is_constant_stub(name: &str) -> bool {
    NIL_STUBS.contains(&name) || T_STUBS.contains(&name)
}

/// `(next-single-property-change POS PROP &optional OBJECT LIMIT)`: no text
/// has properties, so the answer is LIMIT (or nil).
pub(crate) fn builtin_next_single_property_change(args: Vec<Value>) -> EvalResult {
    expect_range_args("next-single-property-change", &args, 2, 4)?;
    Ok(args.get(3).cloned().unwrap_or(Value::Nil))
}

pub(crate) fn builtin_face_attribute(args: Vec<Value>) -> EvalResult {
    expect_range_args("face-attribute", &args, 2, 4)?;
    Ok(Value::symbol("unspecified"))
}

/// `make-face` and `copy-face` just hand back the face name.
pub(crate) fn builtin_make_face(args: Vec<Value>) -> EvalResult {
    expect_range_args("make-face", &args, 1, 4)?;
    let target = args.get(1).unwrap_or(&args[0]);
    expect_symbol_name(target)?;
    Ok(target.clone())
}

/// `read-string` and `read-from-minibuffer`: there is no minibuffer, so the
/// initial input (or the empty string) is the answer.
pub(crate) fn builtin_read_string(args: Vec<Value>) -> EvalResult {
    expect_range_args("read-string", &args, 1, 7)?;
    match args.get(1) {
        Some(Value::Str(s)) => Ok(Value::Str(s.clone())),
        Some(Value::Cons(_)) => Ok(args[1].cons_car()),
        _ => Ok(Value::string("")),
    }
}

pub(crate) fn builtin_line_pixel_height(args: Vec<Value>) -> EvalResult {
    expect_args("line-pixel-height", &args, 0)?;
    Ok(Value::Int(1))
}

pub(crate) fn builtin_window_body_pixel_edges(args: Vec<Value>) -> EvalResult {
    expect_max_args("window-body-pixel-edges", &args, 1)?;
    Ok(Value::list(
        [0, 0, 80, 24].into_iter().map(Value::Int).collect(),
    ))
}

pub(crate) fn builtin_window_frame(args: Vec<Value>) -> EvalResult {
    expect_max_args("window-frame", &args, 1)?;
    Ok(Value::symbol("F1"))
}

/// Geometry and work area of the single pretend monitor.
pub(crate) fn builtin_frame_monitor_attributes(args: Vec<Value>) -> EvalResult {
    expect_max_args("frame-monitor-attributes", &args, 1)?;
    let rect = || Value::list([0, 0, 80, 24].into_iter().map(Value::Int).collect());
    Ok(Value::list(vec![
        Value::cons(Value::symbol("geometry"), rect()),
        Value::cons(Value::symbol("workarea"), rect()),
    ]))
}

pub(crate) fn builtin_make_syntax_table(args: Vec<Value>) -> EvalResult {
    expect_max_args("make-syntax-table", &args, 1)?;
    Ok(Value::vector(Vec::new()))
}

pub(crate) fn builtin_make_bool_vector(args: Vec<Value>) -> EvalResult {
    expect_args("make-bool-vector", &args, 2)?;
    let len = expect_natnum(&args[0])?;
    Ok(Value::vector(vec![Value::bool(args[1].is_truthy()); len]))
}

pub(crate) fn builtin_obarray_make(args: Vec<Value>) -> EvalResult {
    expect_max_args("obarray-make", &args, 1)?;
    Ok(Value::vector(Vec::new()))
}

/// Raw prefix argument to a number: nil is 1, `-` is -1, `(N)` is N.
pub(crate) fn builtin_prefix_numeric_value(args: Vec<Value>) -> EvalResult {
    expect_args("prefix-numeric-value", &args, 1)?;
    Ok(Value::Int(match &args[0] {
        Value::Nil => 1,
        Value::Int(n) => *n,
        Value::Symbol(s) if &**s == "-" => -1,
        Value::Cons(_) => args[0].cons_car().as_int().unwrap_or(1),
        _ => 1,
    }))
}

/// `(vertical-motion LINES)`: lines are never wrapped, so this is
/// `forward-line` that reports the lines actually moved.
pub(crate) fn builtin_vertical_motion(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("vertical-motion", &args, 1, 3)?;
    let lines = match &args[0] {
        Value::Cons(_) => args[0].cons_cdr(),
        other => other.clone(),
    };
    let lines = expect_int(&lines)?;
    let shortfall = eval.buffers.current_buffer_mut().forward_line(lines);
    Ok(Value::Int(lines - shortfall * lines.signum()))
}

pub(crate) fn builtin_get_scratch_buffer_create(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("get-scratch-buffer-create", &args, 0)?;
    Ok(Value::Buffer(eval.buffers.get_or_create("*scratch*")))
}

/// `(define-obsolete-function-alias OBSOLETE CURRENT WHEN &optional DOC)`.
pub(crate) fn builtin_define_obsolete_function_alias(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("define-obsolete-function-alias", &args, 2, 4)?;
    let name = expect_symbol_name(&args[0])?;
    eval.fset(&name, args[1].clone())?;
    Ok(args[0].clone())
}

// ===========================================================================
// Time
// ===========================================================================

const DAY_NAMES: [&str; 7] = ["Thu", "Fri", "Sat", "Sun", "Mon", "Tue", "Wed"];
const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Proleptic Gregorian (year, month, day) for days since 1970-01-01.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

/// `current-time-string` layout, in UTC: `"Sun Sep 16 01:03:52 1973"`.
fn time_string(secs: i64) -> String {
    let days = secs.div_euclid(86_400);
    let rem = secs.rem_euclid(86_400);
    let (year, month, day) = civil_from_days(days);
    format!(
        "{} {} {:>2} {:02}:{:02}:{:02} {}",
        DAY_NAMES[days.rem_euclid(7) as usize],
        MONTH_NAMES[month as usize - 1],
        day,
        rem / 3600,
        rem % 3600 / 60,
        rem % 60,
        year
    )
}

/// Whole seconds of a time value: nil (now), a number, or `(HIGH LOW ...)`.
fn time_seconds(value: Option<&Value>) -> Result<i64, Flow> {
    match value {
        None | Some(Value::Nil) => Ok(SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)),
        Some(Value::Int(n)) => Ok(*n),
        Some(Value::Float(f)) => Ok(f.floor() as i64),
        Some(time @ Value::Cons(_)) => {
            let parts = expect_list(time)?;
            let high = parts.first().and_then(Value::as_int).unwrap_or(0);
            let low = parts.get(1).and_then(Value::as_int).unwrap_or(0);
            Ok(high * 65_536 + low)
        }
        Some(other) => Err(wrong_type("time", other)),
    }
}

pub(crate) fn builtin_current_time_string(args: Vec<Value>) -> EvalResult {
    expect_max_args("current-time-string", &args, 2)?;
    Ok(Value::string(time_string(time_seconds(args.first())?)))
}

/// `(time-convert TIME FORM)`; only `integer` and the list form are known.
pub(crate) fn builtin_time_convert(args: Vec<Value>) -> EvalResult {
    expect_range_args("time-convert", &args, 1, 2)?;
    let secs = time_seconds(args.first())?;
    if args.get(1).is_some_and(|form| form.is_symbol_named("integer")) {
        return Ok(Value::Int(secs));
    }
    Ok(Value::list(vec![
        Value::Int(secs >> 16),
        Value::Int(secs & 0xFFFF),
        Value::Int(0),
        Value::Int(0),
    ]))
}

pub(crate) fn builtin_time_equal_p(args: Vec<Value>) -> EvalResult {
    expect_args("time-equal-p", &args, 2)?;
    Ok(Value::bool(
        time_seconds(args.first())? == time_seconds(args.get(1))?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_and_face_calls_are_inert() {
        let mut ev = Evaluator::new();
        let out = ev
            .eval_str(
                "(insert \"abc\")
                 (put-text-property 1 3 'face 'bold)
                 (list (get-text-property 1 'face)
                       (next-single-property-change 1 'face nil 4)
                       (face-attribute 'default :foreground)
                       (buffer-string))",
            )
            .unwrap();
        assert_eq!(out.to_string(), "(nil 4 unspecified \"abc\")");
    }

    #[test]
    fn minibuffer_reads_return_initial_input() {
        let mut ev = Evaluator::new();
        assert_eq!(
            ev.eval_str("(read-string \"Name: \" \"anon\")").unwrap(),
            Value::string("anon")
        );
        assert_eq!(ev.eval_str("(read-from-minibuffer \"? \")").unwrap(), Value::string(""));
        assert_eq!(ev.eval_str("(y-or-n-p \"Quit? \")").unwrap(), Value::True);
        assert_eq!(ev.eval_str("(sit-for 0.1)").unwrap(), Value::True);
    }

    #[test]
    fn prefix_values() {
        let mut ev = Evaluator::new();
        let out = ev
            .eval_str("(list (prefix-numeric-value nil) (prefix-numeric-value '-) (prefix-numeric-value '(4)) (prefix-numeric-value 3))")
            .unwrap();
        assert_eq!(out.to_string(), "(1 -1 4 3)");
    }

    #[test]
    fn time_strings_use_calendar_dates() {
        assert_eq!(time_string(0), "Thu Jan  1 00:00:00 1970");
        assert_eq!(time_string(117_000_232), "Sun Sep 16 04:03:52 1973");
        assert_eq!(time_string(951_782_400), "Tue Feb 29 00:00:00 2000");
        assert_eq!(time_string(-86_400), "Wed Dec 31 00:00:00 1969");
    }

    #[test]
    fn vertical_motion_counts_lines_moved() {
        let mut ev = Evaluator::new();
        ev.eval_str("(erase-buffer) (insert \"a\\nb\\nc\") (goto-char 1)").unwrap();
        assert_eq!(ev.eval_str("(vertical-motion 5)").unwrap(), Value::Int(2));
        assert_eq!(ev.eval_str("(vertical-motion -1)").unwrap(), Value::Int(-1));
    }
}
