//! Buffer, point and motion primitives.
//!
//! Buffers store 0-based offsets; every position crossing into Lisp is
//! 1-based and clamped to `[point-min, point-max]`.

use super::*;
use crate::buffer::{Buffer, BufferId};

// ===========================================================================
// Position and buffer-designator helpers
// ===========================================================================

/// Resolve a buffer designator: a live buffer, a buffer name, or nil for
/// the current buffer.
pub(crate) fn resolve_buffer(eval: &mut Evaluator, designator: &Value) -> Result<BufferId, Flow> {
    match designator {
        Value::Nil => Ok(eval.buffers.current_id()),
        Value::Buffer(id) if eval.buffers.is_live(*id) => Ok(*id),
        Value::Buffer(_) => Err(error_message("Selecting deleted buffer")),
        Value::Str(name) => eval
            .buffers
            .find_buffer_by_name(name)
            .ok_or_else(|| error_message(format!("No such buffer {name}"))),
        other => Err(wrong_type("stringp", other)),
    }
}

fn current(eval: &mut Evaluator) -> &mut Buffer {
    eval.buffers.current_buffer_mut()
}

/// 1-based Lisp position to a clamped 0-based offset.
fn to_offset(buf: &Buffer, pos: &Value) -> Result<usize, Flow> {
    let n = match pos {
        Value::Float(f) => f.trunc() as i64,
        other => expect_int(other).map_err(|_| wrong_type("integer-or-marker-p", other))?,
    };
    Ok((n - 1).clamp(0, buf.len() as i64) as usize)
}

fn to_position(offset: usize) -> Value {
    Value::Int(offset as i64 + 1)
}

fn optional_count(args: &[Value], index: usize) -> Result<i64, Flow> {
    match args.get(index) {
        None | Some(Value::Nil) => Ok(1),
        Some(v) => expect_int(v),
    }
}

/// Run `f` at the point a relative line count `n` (as in `beginning-of-line
/// N`) lands on, restoring point afterwards.
fn at_line<T>(buf: &mut Buffer, n: i64, f: impl FnOnce(&Buffer) -> T) -> T {
    let saved = buf.point();
    if n != 1 {
        buf.forward_line(n - 1);
    }
    let out = f(buf);
    buf.goto_char(saved);
    out
}

fn insertion_text(eval: &Evaluator, args: &[Value]) -> Result<String, Flow> {
    let mut text = String::new();
    for arg in args {
        match arg {
            Value::Str(s) => text.push_str(s),
            Value::Int(code) => text.push(
                u32::try_from(*code)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| wrong_type("char-or-string-p", arg))?,
            ),
            Value::Nil => {}
            Value::Symbol(_) | Value::True | Value::Keyword(_) => text.push_str(&eval.princ(arg)),
            other => return Err(wrong_type("char-or-string-p", other)),
        }
    }
    Ok(text)
}

// ===========================================================================
// Insertion and deletion
// ===========================================================================

pub(crate) fn builtin_insert(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    let text = insertion_text(eval, &args)?;
    current(eval).insert(&text);
    Ok(Value::Nil)
}

/// `(insert-char CHAR &optional COUNT)`; CHAR defaults to a space.
pub(crate) fn builtin_insert_char(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("insert-char", &args, 3)?;
    let c = match args.first() {
        None | Some(Value::Nil) => ' ',
        Some(v) => insertion_text(eval, std::slice::from_ref(v))?
            .chars()
            .next()
            .unwrap_or(' '),
    };
    let count = optional_count(&args, 1)?.max(0) as usize;
    current(eval).insert(&std::iter::repeat_n(c, count).collect::<String>());
    Ok(Value::Nil)
}

pub(crate) fn builtin_newline(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("newline", &args, 2)?;
    let count = optional_count(&args, 0)?.max(0) as usize;
    current(eval).insert(&"\n".repeat(count));
    Ok(Value::Nil)
}

pub(crate) fn builtin_erase_buffer(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("erase-buffer", &args, 0)?;
    current(eval).erase();
    Ok(Value::Nil)
}

pub(crate) fn builtin_delete_region(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("delete-region", &args, 2)?;
    let buf = current(eval);
    let (start, end) = (to_offset(buf, &args[0])?, to_offset(buf, &args[1])?);
    buf.delete_region(start, end);
    Ok(Value::Nil)
}

pub(crate) fn builtin_delete_char(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("delete-char", &args, 1, 2)?;
    let n = expect_int(&args[0])?;
    current(eval).delete_char(n);
    Ok(Value::Nil)
}

pub(crate) fn builtin_delete_blank_lines(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("delete-blank-lines", &args, 0)?;
    current(eval).delete_blank_lines();
    Ok(Value::Nil)
}

pub(crate) fn builtin_subst_char_in_region(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("subst-char-in-region", &args, 4, 5)?;
    let chars = insertion_text(eval, &args[2..4])?;
    let mut chars = chars.chars();
    let (Some(from), Some(to)) = (chars.next(), chars.next()) else {
        return Err(wrong_type("characterp", &args[2]));
    };
    let buf = current(eval);
    let (start, end) = (to_offset(buf, &args[0])?, to_offset(buf, &args[1])?);
    buf.subst_char(start, end, from, to);
    Ok(Value::Nil)
}

pub(crate) fn builtin_untabify(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("untabify", &args, 2, 3)?;
    let buf = current(eval);
    let (start, end) = (to_offset(buf, &args[0])?, to_offset(buf, &args[1])?);
    buf.untabify(start, end);
    Ok(Value::Nil)
}

/// `(indent-to COLUMN &optional MINIMUM)`: pad with spaces up to COLUMN.
pub(crate) fn builtin_indent_to(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("indent-to", &args, 1, 2)?;
    let column = expect_natnum(&args[0])?;
    let minimum = match args.get(1) {
        None | Some(Value::Nil) => 0,
        Some(v) => expect_natnum(v)?,
    };
    let buf = current(eval);
    let pad = column.saturating_sub(buf.current_column()).max(minimum);
    buf.insert(&" ".repeat(pad));
    Ok(Value::Int(buf.current_column() as i64))
}

/// `(insert-rectangle LINES)`: each string goes on successive lines at the
/// starting column, extending short lines with spaces.
pub(crate) fn builtin_insert_rectangle(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("insert-rectangle", &args, 1)?;
    let lines = expect_list(&args[0])?
        .iter()
        .map(expect_string)
        .collect::<Result<Vec<_>, _>>()?;
    let buf = current(eval);
    let column = buf.current_column();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            let eol = buf.line_end(buf.point());
            if eol == buf.point_max() {
                buf.goto_char(eol);
                buf.insert("\n");
            } else {
                buf.goto_char(eol + 1);
            }
            let reached = buf.move_to_column(column);
            if reached < column {
                buf.insert(&" ".repeat(column - reached));
            }
        }
        buf.insert(line);
    }
    Ok(Value::Nil)
}

// ===========================================================================
// Point and motion
// ===========================================================================

pub(crate) fn builtin_point(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("point", &args, 0)?;
    Ok(to_position(current(eval).point()))
}

pub(crate) fn builtin_point_min(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("point-min", &args, 0)?;
    Ok(to_position(current(eval).point_min()))
}

pub(crate) fn builtin_point_max(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("point-max", &args, 0)?;
    Ok(to_position(current(eval).point_max()))
}

pub(crate) fn builtin_goto_char(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("goto-char", &args, 1)?;
    let buf = current(eval);
    let offset = to_offset(buf, &args[0])?;
    Ok(to_position(buf.goto_char(offset)))
}

pub(crate) fn builtin_buffer_size(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("buffer-size", &args, 1)?;
    let id = resolve_buffer(eval, args.first().unwrap_or(&Value::Nil))?;
    Ok(Value::Int(eval.buffers.get(id).map_or(0, Buffer::len) as i64))
}

pub(crate) fn builtin_forward_char(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("forward-char", &args, 1)?;
    let n = optional_count(&args, 0)?;
    current(eval).forward_char(n);
    Ok(Value::Nil)
}

pub(crate) fn builtin_backward_char(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("backward-char", &args, 1)?;
    let n = optional_count(&args, 0)?;
    current(eval).forward_char(-n);
    Ok(Value::Nil)
}

/// Returns the number of lines that could not be moved.
pub(crate) fn builtin_forward_line(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("forward-line", &args, 1)?;
    let n = optional_count(&args, 0)?;
    Ok(Value::Int(current(eval).forward_line(n)))
}

pub(crate) fn builtin_beginning_of_line(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("beginning-of-line", &args, 1)?;
    let n = optional_count(&args, 0)?;
    let buf = current(eval);
    let target = at_line(buf, n, |b| b.line_beginning(b.point()));
    buf.goto_char(target);
    Ok(Value::Nil)
}

pub(crate) fn builtin_end_of_line(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("end-of-line", &args, 1)?;
    let n = optional_count(&args, 0)?;
    let buf = current(eval);
    let target = at_line(buf, n, |b| b.line_end(b.point()));
    buf.goto_char(target);
    Ok(Value::Nil)
}

pub(crate) fn builtin_line_beginning_position(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("line-beginning-position", &args, 1)?;
    let n = optional_count(&args, 0)?;
    let buf = current(eval);
    Ok(to_position(at_line(buf, n, |b| b.line_beginning(b.point()))))
}

pub(crate) fn builtin_line_end_position(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("line-end-position", &args, 1)?;
    let n = optional_count(&args, 0)?;
    let buf = current(eval);
    Ok(to_position(at_line(buf, n, |b| b.line_end(b.point()))))
}

/// Lines in the region; a trailing partial line counts.
pub(crate) fn builtin_count_lines(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("count-lines", &args, 2, 3)?;
    let buf = current(eval);
    let (a, b) = (to_offset(buf, &args[0])?, to_offset(buf, &args[1])?);
    let (start, end) = (a.min(b), a.max(b));
    let mut lines = buf.count_lines(start, end);
    if end > start && buf.char_before(end) != Some('\n') {
        lines += 1;
    }
    Ok(Value::Int(lines as i64))
}

fn char_code(c: Option<char>) -> Value {
    Value::Int(c.map_or(0, |c| c as i64))
}

/// `(char-after &optional POS)`; 0 outside the text.
pub(crate) fn builtin_char_after(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("char-after", &args, 1)?;
    let buf = current(eval);
    let offset = match args.first() {
        None | Some(Value::Nil) => Some(buf.point()),
        Some(v) => {
            let n = expect_int(v)?;
            usize::try_from(n - 1).ok()
        }
    };
    Ok(char_code(offset.and_then(|p| buf.char_after(p))))
}

pub(crate) fn builtin_char_before(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("char-before", &args, 1)?;
    let buf = current(eval);
    let offset = match args.first() {
        None | Some(Value::Nil) => Some(buf.point()),
        Some(v) => usize::try_from(expect_int(v)? - 1).ok(),
    };
    Ok(offset
        .and_then(|p| buf.char_before(p))
        .map_or(Value::Nil, |c| Value::Int(c as i64)))
}

pub(crate) fn builtin_following_char(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("following-char", &args, 0)?;
    let buf = current(eval);
    Ok(char_code(buf.char_after(buf.point())))
}

pub(crate) fn builtin_preceding_char(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("preceding-char", &args, 0)?;
    let buf = current(eval);
    Ok(char_code(buf.char_before(buf.point())))
}

pub(crate) fn builtin_bolp(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("bolp", &args, 0)?;
    let buf = current(eval);
    Ok(Value::bool(buf.line_beginning(buf.point()) == buf.point()))
}

pub(crate) fn builtin_eolp(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("eolp", &args, 0)?;
    let buf = current(eval);
    Ok(Value::bool(buf.line_end(buf.point()) == buf.point()))
}

pub(crate) fn builtin_bobp(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("bobp", &args, 0)?;
    let buf = current(eval);
    Ok(Value::bool(buf.point() == buf.point_min()))
}

pub(crate) fn builtin_eobp(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("eobp", &args, 0)?;
    let buf = current(eval);
    Ok(Value::bool(buf.point() == buf.point_max()))
}

pub(crate) fn builtin_current_column(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("current-column", &args, 0)?;
    Ok(Value::Int(current(eval).current_column() as i64))
}

/// `(move-to-column COLUMN &optional FORCE)`; with FORCE t, short lines are
/// padded with spaces.
pub(crate) fn builtin_move_to_column(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("move-to-column", &args, 1, 2)?;
    let column = expect_natnum(&args[0])?;
    let force = args.get(1).is_some_and(Value::is_truthy);
    let buf = current(eval);
    let mut reached = buf.move_to_column(column);
    if force && reached < column {
        buf.insert(&" ".repeat(column - reached));
        reached = column;
    }
    Ok(Value::Int(reached as i64))
}

pub(crate) fn builtin_forward_word(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("forward-word", &args, 1)?;
    let n = optional_count(&args, 0)?;
    let buf = current(eval);
    if n >= 0 {
        buf.forward_word(n as usize);
    } else {
        buf.backward_word(n.unsigned_abs() as usize);
    }
    Ok(Value::True)
}

pub(crate) fn builtin_backward_word(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("backward-word", &args, 1)?;
    let n = optional_count(&args, 0)?;
    let buf = current(eval);
    if n >= 0 {
        buf.backward_word(n as usize);
    } else {
        buf.forward_word(n.unsigned_abs() as usize);
    }
    Ok(Value::True)
}

/// Parse a `skip-chars-*` set: literal characters, `a-z` ranges, a leading
/// `^` for negation and `\` quoting the next character.
pub(crate) fn char_set_matcher(spec: &str) -> impl Fn(char) -> bool {
    let chars: Vec<char> = spec.chars().collect();
    let (negate, body) = match chars.first() {
        Some('^') => (true, &chars[1..]),
        _ => (false, &chars[..]),
    };
    let mut ranges = Vec::new();
    let mut i = 0;
    while i < body.len() {
        let mut c = body[i];
        if c == '\\' && i + 1 < body.len() {
            i += 1;
            c = body[i];
        }
        if i + 2 < body.len() && body[i + 1] == '-' {
            ranges.push((c, body[i + 2]));
            i += 3;
        } else {
            ranges.push((c, c));
            i += 1;
        }
    }
    move |c| ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi) != negate
}

fn skip_limit(buf: &Buffer, limit: Option<&Value>, forward: bool) -> Result<usize, Flow> {
    match limit {
        None | Some(Value::Nil) => Ok(if forward { buf.point_max() } else { buf.point_min() }),
        Some(v) => to_offset(buf, v),
    }
}

pub(crate) fn builtin_skip_chars_forward(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("skip-chars-forward", &args, 1, 2)?;
    let matcher = char_set_matcher(&expect_string(&args[0])?);
    let buf = current(eval);
    let limit = skip_limit(buf, args.get(1), true)?;
    Ok(Value::Int(buf.skip_chars_forward(matcher, limit) as i64))
}

pub(crate) fn builtin_skip_chars_backward(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("skip-chars-backward", &args, 1, 2)?;
    let matcher = char_set_matcher(&expect_string(&args[0])?);
    let buf = current(eval);
    let limit = skip_limit(buf, args.get(1), false)?;
    Ok(Value::Int(-(buf.skip_chars_backward(matcher, limit) as i64)))
}

// ===========================================================================
// Text access
// ===========================================================================

pub(crate) fn builtin_buffer_string(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("buffer-string", &args, 0)?;
    Ok(Value::string(current(eval).buffer_string()))
}

pub(crate) fn builtin_buffer_substring(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("buffer-substring", &args, 2)?;
    let buf = current(eval);
    let (start, end) = (to_offset(buf, &args[0])?, to_offset(buf, &args[1])?);
    Ok(Value::string(buf.buffer_substring(start, end)))
}

/// Copy `[START, END)` of the current buffer into another buffer at its point.
pub(crate) fn builtin_append_to_buffer(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("append-to-buffer", &args, 3)?;
    let target = match &args[0] {
        Value::Str(name) => eval.buffers.get_or_create(name),
        other => resolve_buffer(eval, other)?,
    };
    let buf = current(eval);
    let (start, end) = (to_offset(buf, &args[1])?, to_offset(buf, &args[2])?);
    let text = buf.buffer_substring(start, end);
    if let Some(target) = eval.buffers.get_mut(target) {
        target.insert(&text);
    }
    Ok(Value::Nil)
}

/// `(insert-buffer-substring BUFFER &optional START END)` into the current
/// buffer.
pub(crate) fn builtin_insert_buffer_substring(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("insert-buffer-substring", &args, 1, 3)?;
    let source = resolve_buffer(eval, &args[0])?;
    let text = {
        let buf = eval
            .buffers
            .get(source)
            .ok_or_else(|| error_message("Selecting deleted buffer"))?;
        let start = match args.get(1) {
            None | Some(Value::Nil) => buf.point_min(),
            Some(v) => to_offset(buf, v)?,
        };
        let end = match args.get(2) {
            None | Some(Value::Nil) => buf.point_max(),
            Some(v) => to_offset(buf, v)?,
        };
        buf.buffer_substring(start, end)
    };
    current(eval).insert(&text);
    Ok(Value::Nil)
}

// ===========================================================================
// Buffer objects
// ===========================================================================

pub(crate) fn builtin_current_buffer(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("current-buffer", &args, 0)?;
    Ok(Value::Buffer(eval.buffers.current_id()))
}

pub(crate) fn builtin_set_buffer(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("set-buffer", &args, 1)?;
    let id = resolve_buffer(eval, &args[0])?;
    eval.buffers.set_current(id);
    Ok(Value::Buffer(id))
}

pub(crate) fn builtin_buffer_name(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("buffer-name", &args, 1)?;
    let id = match args.first() {
        None | Some(Value::Nil) => eval.buffers.current_id(),
        Some(Value::Buffer(id)) => *id,
        Some(other) => return Err(wrong_type("bufferp", other)),
    };
    Ok(eval
        .buffers
        .get(id)
        .map_or(Value::Nil, |buf| Value::string(buf.name.clone())))
}

/// Fetch only: an unknown name yields nil.
pub(crate) fn builtin_get_buffer(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("get-buffer", &args, 1)?;
    Ok(match &args[0] {
        Value::Buffer(id) => Value::Buffer(*id),
        Value::Str(name) => eval
            .buffers
            .find_buffer_by_name(name)
            .map_or(Value::Nil, Value::Buffer),
        other => return Err(wrong_type("stringp", other)),
    })
}

pub(crate) fn builtin_get_buffer_create(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("get-buffer-create", &args, 1, 2)?;
    match &args[0] {
        Value::Buffer(id) => Ok(Value::Buffer(*id)),
        other => {
            let name = expect_string(other)?;
            Ok(Value::Buffer(eval.buffers.get_or_create(&name)))
        }
    }
}

pub(crate) fn builtin_generate_new_buffer(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("generate-new-buffer", &args, 1, 2)?;
    let base = expect_string(&args[0])?;
    Ok(Value::Buffer(eval.buffers.generate_new_buffer(&base)))
}

pub(crate) fn builtin_generate_new_buffer_name(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("generate-new-buffer-name", &args, 1, 2)?;
    let base = expect_string(&args[0])?;
    Ok(Value::string(eval.buffers.generate_new_buffer_name(&base)))
}

pub(crate) fn builtin_buffer_list(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("buffer-list", &args, 1)?;
    Ok(Value::list(
        eval.buffers.buffer_list().into_iter().map(Value::Buffer).collect(),
    ))
}

pub(crate) fn builtin_buffer_live_p(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("buffer-live-p", &args, 1)?;
    Ok(Value::bool(matches!(&args[0], Value::Buffer(id) if eval.buffers.is_live(*id))))
}

pub(crate) fn builtin_kill_buffer(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("kill-buffer", &args, 1)?;
    let target = args.first().cloned().unwrap_or(Value::Nil);
    let id = match resolve_buffer(eval, &target) {
        Ok(id) => id,
        Err(_) if matches!(target, Value::Buffer(_)) => return Ok(Value::Nil),
        Err(flow) => return Err(flow),
    };
    Ok(Value::bool(eval.buffers.kill_buffer(id)))
}

pub(crate) fn builtin_bury_buffer(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("bury-buffer", &args, 1)?;
    let id = resolve_buffer(eval, args.first().unwrap_or(&Value::Nil))?;
    eval.buffers.bury_buffer(id);
    Ok(Value::Nil)
}

/// `switch-to-buffer` and friends: show BUFFER (creating it from a name) in
/// the selected window.
pub(crate) fn builtin_switch_to_buffer(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("switch-to-buffer", &args, 1, 3)?;
    let id = match &args[0] {
        Value::Str(name) => eval.buffers.switch_to_buffer(name),
        other => {
            let id = resolve_buffer(eval, other)?;
            eval.buffers.set_current(id);
            id
        }
    };
    Ok(Value::Buffer(id))
}

/// `display-buffer` shows the buffer in the selected window but returns the
/// window rather than the buffer.
pub(crate) fn builtin_display_buffer(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("display-buffer", &args, 1, 3)?;
    builtin_switch_to_buffer(eval, vec![args[0].clone()])?;
    Ok(Value::Window(eval.buffers.selected_window()))
}

pub(crate) fn builtin_rename_buffer(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("rename-buffer", &args, 1, 2)?;
    let mut name = expect_string(&args[0])?;
    let id = eval.buffers.current_id();
    if args.get(1).is_some_and(Value::is_truthy) {
        name = eval.buffers.generate_new_buffer_name(&name);
    }
    if !eval.buffers.rename(id, &name) {
        return Err(error_message(format!("Buffer name `{name}' is in use")));
    }
    Ok(Value::string(name))
}

pub(crate) fn builtin_buffer_modified_p(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("buffer-modified-p", &args, 1)?;
    let id = resolve_buffer(eval, args.first().unwrap_or(&Value::Nil))?;
    Ok(Value::bool(eval.buffers.get(id).is_some_and(|b| b.modified)))
}

pub(crate) fn builtin_set_buffer_modified_p(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("set-buffer-modified-p", &args, 1)?;
    current(eval).modified = args[0].is_truthy();
    Ok(args[0].clone())
}

// ===========================================================================
// Buffer-local variables
// ===========================================================================

pub(crate) fn builtin_make_local_variable(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("make-local-variable", &args, 1)?;
    let name = expect_symbol_name(&args[0])?;
    let initial = eval.globals.get(&name).cloned().unwrap_or(Value::Nil);
    let buf = current(eval);
    if !buf.has_buffer_local(&name) {
        buf.set_buffer_local(&name, initial);
    }
    Ok(args[0].clone())
}

/// Every later `setq` of NAME becomes buffer-local.
pub(crate) fn builtin_make_variable_buffer_local(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("make-variable-buffer-local", &args, 1)?;
    let name = expect_symbol_name(&args[0])?;
    eval.globals.entry(name.clone()).or_insert(Value::Nil);
    eval.specials.insert(name.clone());
    eval.auto_local.insert(name);
    Ok(args[0].clone())
}

pub(crate) fn builtin_kill_local_variable(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("kill-local-variable", &args, 1)?;
    let name = expect_symbol_name(&args[0])?;
    current(eval).kill_local_variable(&name);
    Ok(args[0].clone())
}

pub(crate) fn builtin_buffer_local_value(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("buffer-local-value", &args, 2)?;
    let name = expect_symbol_name(&args[0])?;
    let id = resolve_buffer(eval, &args[1])?;
    eval.buffers
        .get(id)
        .and_then(|buf| buf.get_buffer_local(&name).cloned())
        .or_else(|| eval.globals.get(&name).cloned())
        .ok_or_else(|| signal("void-variable", vec![args[0].clone()]))
}

pub(crate) fn builtin_local_variable_p(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("local-variable-p", &args, 1, 2)?;
    let name = expect_symbol_name(&args[0])?;
    let id = resolve_buffer(eval, args.get(1).unwrap_or(&Value::Nil))?;
    Ok(Value::bool(
        eval.buffers.get(id).is_some_and(|buf| buf.has_buffer_local(&name)),
    ))
}

pub(crate) fn builtin_buffer_local_variables(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("buffer-local-variables", &args, 1)?;
    let id = resolve_buffer(eval, args.first().unwrap_or(&Value::Nil))?;
    let Some(buf) = eval.buffers.get(id) else {
        return Ok(Value::Nil);
    };
    Ok(Value::list(
        buf.buffer_local_names()
            .into_iter()
            .map(|name| {
                let value = buf.get_buffer_local(&name).cloned().unwrap_or(Value::Nil);
                Value::cons(Value::symbol(name), value)
            })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn run(ev: &mut Evaluator, src: &str) -> Value {
        ev.eval_str(src).unwrap()
    }

    #[test]
    fn positions_are_one_based() {
        let mut ev = Evaluator::new();
        run(&mut ev, "(erase-buffer) (insert \"hello\")");
        assert_eq!(run(&mut ev, "(point)"), Value::Int(6));
        assert_eq!(run(&mut ev, "(point-min)"), Value::Int(1));
        assert_eq!(run(&mut ev, "(point-max)"), Value::Int(6));
        assert_eq!(run(&mut ev, "(goto-char 2) (char-after)"), Value::Int('e' as i64));
        assert_eq!(run(&mut ev, "(char-after 99)"), Value::Int(0));
        assert_eq!(run(&mut ev, "(goto-char 100)"), Value::Int(6));
        assert_eq!(run(&mut ev, "(buffer-substring 2 4)"), Value::string("el"));
    }

    #[test]
    fn insert_accepts_chars_and_symbols() {
        let mut ev = Evaluator::new();
        run(&mut ev, "(erase-buffer) (insert ?a \"b\" 'c) (insert-char ?x 2) (newline)");
        assert_eq!(run(&mut ev, "(buffer-string)"), Value::string("abcxx\n"));
    }

    #[test]
    fn line_motion_keeps_column() {
        let mut ev = Evaluator::new();
        run(&mut ev, "(erase-buffer) (insert \"abcd\\nxy\\nlonger\") (goto-char 3)");
        assert_eq!(run(&mut ev, "(current-column)"), Value::Int(2));
        assert_eq!(run(&mut ev, "(forward-line 1) (point)"), Value::Int(8));
        assert_eq!(run(&mut ev, "(forward-line 5)"), Value::Int(4));
        assert_eq!(run(&mut ev, "(line-beginning-position)"), Value::Int(9));
        assert_eq!(run(&mut ev, "(line-end-position 0)"), Value::Int(8));
        assert_eq!(run(&mut ev, "(count-lines (point-min) (point-max))"), Value::Int(3));
        assert_eq!(run(&mut ev, "(beginning-of-line) (bolp)"), Value::True);
        assert_eq!(run(&mut ev, "(end-of-line) (eolp)"), Value::True);
        assert_eq!(run(&mut ev, "(eobp)"), Value::True);
    }

    #[test]
    fn skip_chars_with_ranges_and_negation() {
        let mut ev = Evaluator::new();
        run(&mut ev, "(erase-buffer) (insert \"abc123 rest\") (goto-char 1)");
        assert_eq!(run(&mut ev, "(skip-chars-forward \"a-z\")"), Value::Int(3));
        assert_eq!(run(&mut ev, "(skip-chars-forward \"^ \")"), Value::Int(3));
        assert_eq!(run(&mut ev, "(skip-chars-backward \"0-9\")"), Value::Int(-3));
        let not_digit = char_set_matcher("^0-9");
        assert!(not_digit('a'));
        assert!(!not_digit('5'));
    }

    #[test]
    fn buffer_identity_and_uniquifying_names() {
        let mut ev = Evaluator::new();
        assert_eq!(
            run(&mut ev, "(eq (get-buffer-create \"game\") (get-buffer-create \"game\"))"),
            Value::True
        );
        assert_eq!(
            run(&mut ev, "(buffer-name (generate-new-buffer \"game\"))"),
            Value::string("game<2>")
        );
        assert_eq!(
            run(&mut ev, "(buffer-name (generate-new-buffer \"game\"))"),
            Value::string("game<3>")
        );
        assert_eq!(run(&mut ev, "(get-buffer \"nothing\")"), Value::Nil);
    }

    #[test]
    fn kill_current_buffer_falls_back_to_scratch() {
        let mut ev = Evaluator::new();
        run(&mut ev, "(switch-to-buffer \"board\")");
        assert_eq!(run(&mut ev, "(buffer-name)"), Value::string("board"));
        run(&mut ev, "(kill-buffer \"board\")");
        assert_eq!(run(&mut ev, "(buffer-name)"), Value::string("*scratch*"));
        assert_eq!(run(&mut ev, "(buffer-live-p (get-buffer \"board\"))"), Value::Nil);
    }

    #[test]
    fn buffer_local_variables() {
        let mut ev = Evaluator::new();
        run(&mut ev, "(defvar speed 1) (switch-to-buffer \"a\") (setq-local speed 5)");
        assert_eq!(run(&mut ev, "speed"), Value::Int(5));
        assert_eq!(run(&mut ev, "(local-variable-p 'speed)"), Value::True);
        run(&mut ev, "(switch-to-buffer \"b\")");
        assert_eq!(run(&mut ev, "speed"), Value::Int(1));
        assert_eq!(run(&mut ev, "(buffer-local-value 'speed (get-buffer \"a\"))"), Value::Int(5));
        run(&mut ev, "(make-variable-buffer-local 'score) (setq score 3)");
        assert_eq!(run(&mut ev, "(local-variable-p 'score)"), Value::True);
        run(&mut ev, "(switch-to-buffer \"a\")");
        assert_eq!(run(&mut ev, "score"), Value::Nil);
    }

    #[test]
    fn rectangle_and_indent() {
        let mut ev = Evaluator::new();
        run(&mut ev, "(erase-buffer) (insert \"  \") (insert-rectangle '(\"ab\" \"cd\"))");
        assert_eq!(run(&mut ev, "(buffer-string)"), Value::string("  ab\n  cd"));
        run(&mut ev, "(erase-buffer) (insert \"x\") (indent-to 4)");
        assert_eq!(run(&mut ev, "(buffer-string)"), Value::string("x   "));
    }

    proptest! {
        #[test]
        fn goto_char_always_lands_inside_text(text in "[a-z\\n]{0,40}", pos in -10i64..60) {
            let mut ev = Evaluator::new();
            let id = ev.buffers.current_id();
            ev.buffers.get_mut(id).unwrap().insert(&text);
            let landed = builtin_goto_char(&mut ev, vec![Value::Int(pos)]).unwrap();
            let n = landed.as_int().unwrap();
            prop_assert!(n >= 1 && n <= text.chars().count() as i64 + 1);
        }
    }
}
