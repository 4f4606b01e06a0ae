//! Window and frame primitives.  There is one frame of fixed size.

use super::*;
use super::buffers::resolve_buffer;
use crate::window::WindowId;

use std::rc::Rc;

const FRAME_WIDTH: i64 = 80;
const FRAME_HEIGHT: i64 = 24;

/// A live window designator; nil is the selected window.
fn resolve_window(eval: &mut Evaluator, designator: Option<&Value>) -> Result<WindowId, Flow> {
    match designator {
        None | Some(Value::Nil) => Ok(eval.buffers.selected_window()),
        Some(Value::Window(win)) if eval.buffers.is_live_window(*win) => Ok(*win),
        Some(other) => Err(wrong_type("window-live-p", other)),
    }
}

fn window_buffer_id(eval: &mut Evaluator, win: WindowId) -> Result<crate::buffer::BufferId, Flow> {
    eval.buffers
        .window_buffer(win)
        .ok_or_else(|| wrong_type("window-live-p", &Value::Window(win)))
}

pub(crate) fn builtin_selected_window(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("selected-window", &args, 0)?;
    Ok(Value::Window(eval.buffers.selected_window()))
}

/// Selecting a window makes its buffer current.
pub(crate) fn builtin_select_window(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("select-window", &args, 1, 2)?;
    let win = resolve_window(eval, args.first())?;
    eval.buffers.select_window(win);
    Ok(Value::Window(win))
}

pub(crate) fn builtin_window_buffer(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("window-buffer", &args, 1)?;
    let win = resolve_window(eval, args.first())?;
    Ok(Value::Buffer(window_buffer_id(eval, win)?))
}

pub(crate) fn builtin_set_window_buffer(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("set-window-buffer", &args, 2, 3)?;
    let win = resolve_window(eval, args.first())?;
    let buf = resolve_buffer(eval, &args[1])?;
    eval.buffers.set_window_buffer(win, buf);
    Ok(Value::Nil)
}

pub(crate) fn builtin_get_buffer_window(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("get-buffer-window", &args, 0, 2)?;
    let target = args.first().cloned().unwrap_or(Value::Nil);
    let buf = match resolve_buffer(eval, &target) {
        Ok(buf) => buf,
        Err(_) if matches!(target, Value::Str(_) | Value::Buffer(_)) => return Ok(Value::Nil),
        Err(flow) => return Err(flow),
    };
    Ok(eval
        .buffers
        .get_buffer_window(buf)
        .map_or(Value::Nil, Value::Window))
}

/// Windows in creation order, starting from the selected one.
pub(crate) fn builtin_window_list(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("window-list", &args, 3)?;
    let selected = eval.buffers.selected_window();
    let mut ids = eval.buffers.window_ids();
    if let Some(at) = ids.iter().position(|w| *w == selected) {
        ids.rotate_left(at);
    }
    Ok(Value::list(ids.into_iter().map(Value::Window).collect()))
}

pub(crate) fn builtin_window_live_p(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("window-live-p", &args, 1)?;
    Ok(Value::bool(
        matches!(&args[0], Value::Window(win) if eval.buffers.is_live_window(*win)),
    ))
}

pub(crate) fn builtin_windowp(args: Vec<Value>) -> EvalResult {
    expect_args("windowp", &args, 1)?;
    Ok(Value::bool(matches!(args[0], Value::Window(_))))
}

/// Windows share their buffer's point.
pub(crate) fn builtin_window_point(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("window-point", &args, 1)?;
    let win = resolve_window(eval, args.first())?;
    let buf = window_buffer_id(eval, win)?;
    Ok(Value::Int(
        eval.buffers.get(buf).map_or(0, |b| b.point()) as i64 + 1,
    ))
}

pub(crate) fn builtin_set_window_point(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("set-window-point", &args, 2)?;
    let win = resolve_window(eval, args.first())?;
    let buf = window_buffer_id(eval, win)?;
    let pos = expect_int(&args[1])?;
    let landed = eval
        .buffers
        .get_mut(buf)
        .map_or(0, |b| b.goto_char((pos - 1).max(0) as usize));
    Ok(Value::Int(landed as i64 + 1))
}

pub(crate) fn builtin_window_start(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("window-start", &args, 1)?;
    resolve_window(eval, args.first())?;
    Ok(Value::Int(1))
}

pub(crate) fn builtin_window_end(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("window-end", &args, 2)?;
    let win = resolve_window(eval, args.first())?;
    let buf = window_buffer_id(eval, win)?;
    Ok(Value::Int(eval.buffers.get(buf).map_or(0, |b| b.len()) as i64 + 1))
}

/// `window-width`, `window-body-width` and friends: the fixed frame width.
pub(crate) fn builtin_window_width(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("window-width", &args, 2)?;
    resolve_window(eval, args.first())?;
    Ok(Value::Int(FRAME_WIDTH))
}

pub(crate) fn builtin_window_height(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("window-height", &args, 2)?;
    resolve_window(eval, args.first())?;
    Ok(Value::Int(FRAME_HEIGHT))
}

pub(crate) fn builtin_split_window(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("split-window", &args, 4)?;
    let win = resolve_window(eval, args.first())?;
    let created = eval
        .buffers
        .split_window(win)
        .ok_or_else(|| error_message("Window too small for splitting"))?;
    Ok(Value::Window(created))
}

pub(crate) fn builtin_delete_window(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("delete-window", &args, 1)?;
    let win = resolve_window(eval, args.first())?;
    if !eval.buffers.delete_window(win) {
        return Err(error_message("Attempt to delete minibuffer or sole ordinary window"));
    }
    Ok(Value::Nil)
}

pub(crate) fn builtin_delete_other_windows(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("delete-other-windows", &args, 2)?;
    let win = resolve_window(eval, args.first())?;
    eval.buffers.delete_other_windows(win);
    Ok(Value::Nil)
}

pub(crate) fn builtin_current_window_configuration(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("current-window-configuration", &args, 1)?;
    Ok(Value::WindowConfig(Rc::new(eval.buffers.capture_configuration())))
}

pub(crate) fn builtin_set_window_configuration(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("set-window-configuration", &args, 1, 3)?;
    match &args[0] {
        Value::WindowConfig(config) => {
            eval.buffers.restore_configuration(config);
            Ok(Value::True)
        }
        other => Err(wrong_type("window-configuration-p", other)),
    }
}

pub(crate) fn builtin_window_configuration_p(args: Vec<Value>) -> EvalResult {
    expect_args("window-configuration-p", &args, 1)?;
    Ok(Value::bool(matches!(args[0], Value::WindowConfig(_))))
}

// ===========================================================================
// The frame
// ===========================================================================

pub(crate) fn builtin_selected_frame(args: Vec<Value>) -> EvalResult {
    expect_args("selected-frame", &args, 0)?;
    Ok(Value::symbol("F1"))
}

pub(crate) fn builtin_frame_width(args: Vec<Value>) -> EvalResult {
    expect_max_args("frame-width", &args, 1)?;
    Ok(Value::Int(FRAME_WIDTH))
}

pub(crate) fn builtin_frame_height(args: Vec<Value>) -> EvalResult {
    expect_max_args("frame-height", &args, 1)?;
    Ok(Value::Int(FRAME_HEIGHT))
}

pub(crate) fn builtin_frame_selected_window(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("frame-selected-window", &args, 1)?;
    Ok(Value::Window(eval.buffers.selected_window()))
}

pub(crate) fn builtin_visible_frame_list(args: Vec<Value>) -> EvalResult {
    expect_args("visible-frame-list", &args, 0)?;
    Ok(Value::list(vec![Value::symbol("F1")]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(ev: &mut Evaluator, src: &str) -> Value {
        ev.eval_str(src).unwrap()
    }

    #[test]
    fn split_shares_buffer_and_delete_keeps_last_window() {
        let mut ev = Evaluator::new();
        run(&mut ev, "(setq w2 (split-window))");
        assert_eq!(
            run(&mut ev, "(eq (window-buffer w2) (window-buffer (selected-window)))"),
            Value::True
        );
        assert_eq!(run(&mut ev, "(length (window-list))"), Value::Int(2));
        run(&mut ev, "(delete-other-windows w2)");
        assert_eq!(run(&mut ev, "(eq (selected-window) w2)"), Value::True);
        let err = ev.eval_str("(delete-window)");
        assert!(err.is_err());
        assert_eq!(run(&mut ev, "(window-live-p w2)"), Value::True);
    }

    #[test]
    fn window_configuration_restores_buffers_by_name() {
        let mut ev = Evaluator::new();
        run(&mut ev, "(switch-to-buffer \"board\")");
        run(&mut ev, "(setq conf (current-window-configuration))");
        run(&mut ev, "(switch-to-buffer \"scores\") (kill-buffer \"board\")");
        run(&mut ev, "(set-window-configuration conf)");
        assert_eq!(run(&mut ev, "(buffer-name (window-buffer))"), Value::string("board"));
        assert_eq!(run(&mut ev, "(window-configuration-p conf)"), Value::True);
        let out = run(
            &mut ev,
            "(save-window-excursion (switch-to-buffer \"other\") (buffer-name))",
        );
        assert_eq!(out, Value::string("other"));
        assert_eq!(run(&mut ev, "(buffer-name)"), Value::string("board"));
    }

    #[test]
    fn window_point_follows_buffer_point() {
        let mut ev = Evaluator::new();
        run(&mut ev, "(erase-buffer) (insert \"abcdef\")");
        assert_eq!(run(&mut ev, "(window-point)"), Value::Int(7));
        run(&mut ev, "(set-window-point (selected-window) 3)");
        assert_eq!(run(&mut ev, "(point)"), Value::Int(3));
        assert_eq!(run(&mut ev, "(window-end)"), Value::Int(7));
        assert_eq!(run(&mut ev, "(list (window-width) (window-body-height))").to_string(), "(80 24)");
    }
}
