//! Searching and match data.
//!
//! Buffer searches record 1-based match positions and move point; string
//! searches record 0-based character offsets and leave point alone.  Literal
//! searches go through the same engine with the needle quoted.

use super::*;
use crate::elisp::regex::{capture_spans, char_to_byte, expand_template, regexp_quote, MatchData, MatchSource};

use regex::Regex;

fn case_fold(eval: &Evaluator) -> bool {
    eval.lookup_variable("case-fold-search", &eval.toplevel_env())
        .is_some_and(|v| v.is_truthy())
}

fn compile(eval: &mut Evaluator, pattern: &str) -> Result<Regex, Flow> {
    let fold = case_fold(eval);
    eval.regexes.compile(pattern, fold)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// Run a buffer search for `pattern` starting at point.  On success point
/// moves past (forward) or to the start of (backward) the match and the new
/// point is returned as a 1-based position.
fn buffer_search(
    eval: &mut Evaluator,
    pattern: &str,
    args: &[Value],
    mut direction: Direction,
) -> EvalResult {
    let re = compile(eval, pattern)?;
    let id = eval.buffers.current_id();
    let count = match args.get(3) {
        None | Some(Value::Nil) => 1,
        Some(v) => expect_int(v)?,
    };
    if count < 0 {
        direction = match direction {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        };
    }
    let buf = eval.buffers.current_buffer_mut();
    let text = buf.buffer_string();
    let point = buf.point();
    let bound = match args.get(1) {
        None | Some(Value::Nil) => match direction {
            Direction::Forward => buf.point_max(),
            Direction::Backward => buf.point_min(),
        },
        Some(v) => (expect_int(v)? - 1).clamp(0, buf.len() as i64) as usize,
    };
    let wrong_side = match direction {
        Direction::Forward => bound < point,
        Direction::Backward => bound > point,
    };
    if wrong_side {
        return Err(error_message("Invalid search bound (wrong side of point)"));
    }

    let mut pos = point;
    let mut last = None;
    for _ in 0..count.unsigned_abs().max(1) {
        let found = match direction {
            Direction::Forward => find_forward(&re, &text, pos, bound),
            Direction::Backward => find_backward(&re, &text, pos, bound),
        };
        match found {
            Some(spans) => {
                let (start, end) = spans[0];
                // Spans are 1-based.
                pos = match direction {
                    Direction::Forward => end as usize - 1,
                    Direction::Backward => start as usize - 1,
                };
                last = Some(spans);
                // An empty match would otherwise be found again.
                if start == end && direction == Direction::Forward && pos < bound {
                    pos += 1;
                }
            }
            None => {
                last = None;
                break;
            }
        }
    }

    match last {
        Some(spans) => {
            let target = match direction {
                Direction::Forward => spans[0].1 - 1,
                Direction::Backward => spans[0].0 - 1,
            } as usize;
            eval.match_data = Some(MatchData {
                groups: spans,
                source: MatchSource::Buffer(id),
            });
            let buf = eval.buffers.current_buffer_mut();
            Ok(Value::Int(buf.goto_char(target) as i64 + 1))
        }
        None => {
            eval.match_data = None;
            match args.get(2) {
                None | Some(Value::Nil) => Err(signal("search-failed", vec![Value::string(pattern)])),
                Some(Value::True) => Ok(Value::Nil),
                Some(_) => {
                    eval.buffers.current_buffer_mut().goto_char(bound);
                    Ok(Value::Nil)
                }
            }
        }
    }
}

/// First match starting at or after char offset `from` and ending by `bound`.
fn find_forward(re: &Regex, text: &str, from: usize, bound: usize) -> Option<Vec<(i64, i64)>> {
    let haystack = &text[..char_to_byte(text, bound)];
    let start = char_to_byte(haystack, from);
    let caps = re.captures_at(haystack, start)?;
    Some(capture_spans(&caps, haystack, 1))
}

/// Last match starting between `bound` and `from` that ends by `from`.
fn find_backward(re: &Regex, text: &str, from: usize, bound: usize) -> Option<Vec<(i64, i64)>> {
    let haystack = &text[..char_to_byte(text, from)];
    (bound..=from).rev().find_map(|pos| {
        let byte = char_to_byte(haystack, pos);
        let caps = re.captures_at(haystack, byte)?;
        (caps.get(0)?.start() == byte).then(|| capture_spans(&caps, haystack, 1))
    })
}

pub(crate) fn builtin_search_forward(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("search-forward", &args, 1, 4)?;
    let needle = regexp_quote(&expect_string(&args[0])?);
    buffer_search(eval, &needle, &args, Direction::Forward)
}

pub(crate) fn builtin_search_backward(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("search-backward", &args, 1, 4)?;
    let needle = regexp_quote(&expect_string(&args[0])?);
    buffer_search(eval, &needle, &args, Direction::Backward)
}

pub(crate) fn builtin_re_search_forward(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("re-search-forward", &args, 1, 4)?;
    let pattern = expect_string(&args[0])?;
    buffer_search(eval, &pattern, &args, Direction::Forward)
}

pub(crate) fn builtin_re_search_backward(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("re-search-backward", &args, 1, 4)?;
    let pattern = expect_string(&args[0])?;
    buffer_search(eval, &pattern, &args, Direction::Backward)
}

/// Match anchored at point.  `record` selects `looking-at` over
/// `looking-at-p`.
fn looking_at(eval: &mut Evaluator, args: &[Value], record: bool) -> EvalResult {
    let re = compile(eval, &expect_string(&args[0])?)?;
    let id = eval.buffers.current_id();
    let buf = eval.buffers.current_buffer_mut();
    let text = buf.buffer_string();
    let at = char_to_byte(&text, buf.point());
    let spans = re
        .captures_at(&text, at)
        .filter(|caps| caps.get(0).is_some_and(|m| m.start() == at))
        .map(|caps| capture_spans(&caps, &text, 1));
    match spans {
        Some(groups) => {
            if record {
                eval.match_data = Some(MatchData {
                    groups,
                    source: MatchSource::Buffer(id),
                });
            }
            Ok(Value::True)
        }
        None => {
            if record {
                eval.match_data = None;
            }
            Ok(Value::Nil)
        }
    }
}

pub(crate) fn builtin_looking_at(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("looking-at", &args, 1, 2)?;
    looking_at(eval, &args, true)
}

pub(crate) fn builtin_looking_at_p(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("looking-at-p", &args, 1)?;
    looking_at(eval, &args, false)
}

/// `(string-match REGEXP STRING &optional START)`; START may be negative.
fn string_match(eval: &mut Evaluator, args: &[Value], record: bool) -> EvalResult {
    let re = compile(eval, &expect_string(&args[0])?)?;
    let text = expect_string(&args[1])?;
    let len = text.chars().count() as i64;
    let start = match args.get(2) {
        None | Some(Value::Nil) => 0,
        Some(v) => {
            let n = expect_int(v)?;
            let n = if n < 0 { len + n } else { n };
            if !(0..=len).contains(&n) {
                return Err(signal("args-out-of-range", vec![args[1].clone(), v.clone()]));
            }
            n as usize
        }
    };
    let Some(caps) = re.captures_at(&text, char_to_byte(&text, start)) else {
        if record {
            eval.match_data = None;
        }
        return Ok(Value::Nil);
    };
    let groups = capture_spans(&caps, &text, 0);
    let begin = groups[0].0;
    if record {
        eval.match_data = Some(MatchData {
            groups,
            source: MatchSource::String,
        });
    }
    Ok(Value::Int(begin))
}

pub(crate) fn builtin_string_match(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("string-match", &args, 2, 4)?;
    string_match(eval, &args, true)
}

pub(crate) fn builtin_string_match_p(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("string-match-p", &args, 2, 3)?;
    string_match(eval, &args, false)
}

// ===========================================================================
// Match data access
// ===========================================================================

fn group_index(args: &[Value]) -> Result<usize, Flow> {
    expect_natnum(&args[0])
}

pub(crate) fn builtin_match_beginning(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("match-beginning", &args, 1)?;
    let n = group_index(&args)?;
    Ok(eval
        .match_data
        .as_ref()
        .and_then(|md| md.group(n))
        .map_or(Value::Nil, |(s, _)| Value::Int(s)))
}

pub(crate) fn builtin_match_end(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("match-end", &args, 1)?;
    let n = group_index(&args)?;
    Ok(eval
        .match_data
        .as_ref()
        .and_then(|md| md.group(n))
        .map_or(Value::Nil, |(_, e)| Value::Int(e)))
}

/// 0-based buffer offsets of a 1-based match span; None when the span
/// starts before position 1.
fn buffer_offsets(start: i64, end: i64) -> Option<(usize, usize)> {
    let start = usize::try_from(start).ok()?.checked_sub(1)?;
    let end = usize::try_from(end).ok()?.checked_sub(1)?;
    Some((start, end))
}

/// Text of group `n` of the last match, read from `string` when given,
/// otherwise from the matched buffer.
fn matched_text(eval: &Evaluator, n: usize, string: Option<&str>) -> Option<String> {
    let md = eval.match_data.as_ref()?;
    let (start, end) = md.group(n)?;
    match (string, md.source) {
        (Some(s), _) => Some(
            s.chars()
                .skip(start as usize)
                .take((end - start) as usize)
                .collect(),
        ),
        (None, MatchSource::Buffer(id)) => {
            let buf = eval.buffers.get(id)?;
            let (start, end) = buffer_offsets(start, end)?;
            Some(buf.buffer_substring(start, end))
        }
        (None, MatchSource::String) => None,
    }
}

pub(crate) fn builtin_match_string(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("match-string", &args, 1, 2)?;
    let n = group_index(&args)?;
    let string = match args.get(1) {
        None | Some(Value::Nil) => None,
        Some(v) => Some(expect_string(v)?),
    };
    Ok(matched_text(eval, n, string.as_deref()).map_or(Value::Nil, Value::string))
}

pub(crate) fn builtin_match_data(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("match-data", &args, 3)?;
    Ok(eval.match_data.as_ref().map_or(Value::Nil, MatchData::to_list))
}

/// `(set-match-data LIST)`: flat start/end pairs; nil entries mark
/// unmatched groups.  Keeps the previous match's source.
pub(crate) fn builtin_set_match_data(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("set-match-data", &args, 1, 2)?;
    let items = expect_list(&args[0])?;
    if items.is_empty() {
        eval.match_data = None;
        return Ok(Value::Nil);
    }
    let position = |v: &Value| -> Result<i64, Flow> {
        match v {
            Value::Nil => Ok(-1),
            other => expect_int(other),
        }
    };
    let groups = items
        .chunks(2)
        .map(|pair| {
            let start = position(&pair[0])?;
            let end = pair.get(1).map(position).transpose()?.unwrap_or(-1);
            Ok(if start < 0 || end < 0 { (-1, -1) } else { (start, end) })
        })
        .collect::<Result<Vec<_>, Flow>>()?;
    let source = eval
        .match_data
        .as_ref()
        .map_or(MatchSource::String, |md| md.source);
    eval.match_data = Some(MatchData { groups, source });
    Ok(Value::Nil)
}

// ===========================================================================
// Replacement
// ===========================================================================

/// `(replace-match NEWTEXT &optional FIXEDCASE LITERAL STRING SUBEXP)`.
/// With STRING, returns the edited copy; otherwise edits the matched buffer
/// in place, leaves point after the replacement and clears match data.
pub(crate) fn builtin_replace_match(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("replace-match", &args, 1, 5)?;
    let template = expect_string(&args[0])?;
    let literal = args.get(2).is_some_and(Value::is_truthy);
    let string = match args.get(3) {
        None | Some(Value::Nil) => None,
        Some(v) => Some(expect_string(v)?),
    };
    let subexp = match args.get(4) {
        None | Some(Value::Nil) => 0,
        Some(v) => expect_natnum(v)?,
    };
    let Some(md) = eval.match_data.clone() else {
        return Err(error_message("replace-match called before any match found"));
    };
    let Some((start, end)) = md.group(subexp) else {
        return Err(signal("args-out-of-range", vec![Value::Int(subexp as i64)]));
    };
    let replacement = if literal {
        template
    } else {
        expand_template(&template, |n| matched_text(eval, n, string.as_deref()))
    };

    if let Some(s) = string {
        let chars: Vec<char> = s.chars().collect();
        let (start, end) = (start as usize, (end as usize).min(chars.len()));
        let mut out: String = chars[..start.min(chars.len())].iter().collect();
        out.push_str(&replacement);
        out.extend(&chars[end..]);
        return Ok(Value::string(out));
    }

    let MatchSource::Buffer(id) = md.source else {
        return Err(error_message("replace-match: last match was not in a buffer"));
    };
    let buf = eval
        .buffers
        .get_mut(id)
        .ok_or_else(|| error_message("Selecting deleted buffer"))?;
    let span = buffer_offsets(start, end).filter(|&(s, e)| s <= e && e <= buf.point_max());
    let Some((start, end)) = span else {
        return Err(signal("args-out-of-range", vec![Value::Int(start), Value::Int(end)]));
    };
    buf.replace_region(start, end, &replacement);
    buf.goto_char(start + replacement.chars().count());
    eval.match_data = None;
    Ok(Value::Nil)
}

/// `(replace-regexp-in-string REGEXP REP STRING &optional FIXEDCASE LITERAL
/// SUBEXP START)`.  REP is a template or a function of the matched text.
pub(crate) fn builtin_replace_regexp_in_string(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("replace-regexp-in-string", &args, 3, 7)?;
    let re = compile(eval, &expect_string(&args[0])?)?;
    let rep = args[1].clone();
    let text = expect_string(&args[2])?;
    let literal = args.get(4).is_some_and(Value::is_truthy);
    let subexp = match args.get(5) {
        None | Some(Value::Nil) => 0,
        Some(v) => expect_natnum(v)?,
    };
    let start = match args.get(6) {
        None | Some(Value::Nil) => 0,
        Some(v) => char_to_byte(&text, expect_natnum(v)?),
    };

    let mut out = String::new();
    let mut copied = start;
    for caps in re.captures_iter(&text[start..]) {
        let Some(whole) = caps.get(0) else { continue };
        let group = |n: usize| caps.get(n).map(|m| m.as_str().to_string());
        let template = match &rep {
            Value::Str(s) => s.to_string(),
            function => {
                eval.match_data = Some(MatchData {
                    groups: capture_spans(&caps, &text[start..], 0),
                    source: MatchSource::String,
                });
                let result = eval.apply(function.clone(), vec![Value::string(whole.as_str())])?;
                expect_string(&result)?
            }
        };
        let replacement = if literal {
            template
        } else {
            expand_template(&template, group)
        };
        let Some(target) = caps.get(subexp) else { continue };
        out.push_str(&text[copied..start + target.start()]);
        out.push_str(&replacement);
        copied = start + target.end();
    }
    out.push_str(&text[copied..]);
    Ok(Value::string(out))
}

pub(crate) fn builtin_regexp_quote(args: Vec<Value>) -> EvalResult {
    expect_args("regexp-quote", &args, 1)?;
    Ok(Value::string(regexp_quote(&expect_string(&args[0])?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(ev: &mut Evaluator, src: &str) -> Value {
        ev.eval_str(src).unwrap()
    }

    #[test]
    fn literal_search_moves_point_and_records_one_based_spans() {
        let mut ev = Evaluator::new();
        run(&mut ev, "(erase-buffer) (insert \"aabbaa\") (goto-char (point-min))");
        assert_eq!(run(&mut ev, "(search-forward \"b\")"), Value::Int(4));
        assert_eq!(run(&mut ev, "(list (match-beginning 0) (match-end 0))").to_string(), "(3 4)");
        assert_eq!(run(&mut ev, "(match-string 0)"), Value::string("b"));
        assert_eq!(run(&mut ev, "(search-backward \"a\")"), Value::Int(2));
        assert_eq!(run(&mut ev, "(point)"), Value::Int(2));
    }

    #[test]
    fn failed_search_signals_unless_noerror() {
        let mut ev = Evaluator::new();
        run(&mut ev, "(erase-buffer) (insert \"abc\") (goto-char 1)");
        let caught = run(&mut ev, "(condition-case e (search-forward \"z\") (search-failed (car e)))");
        assert_eq!(caught, Value::symbol("search-failed"));
        assert_eq!(run(&mut ev, "(search-forward \"z\" nil t)"), Value::Nil);
        assert_eq!(run(&mut ev, "(point)"), Value::Int(1));
        assert_eq!(run(&mut ev, "(search-forward \"z\" nil 'move)"), Value::Nil);
        assert_eq!(run(&mut ev, "(point)"), Value::Int(4));
    }

    #[test]
    fn regex_search_with_groups_and_bound() {
        let mut ev = Evaluator::new();
        run(&mut ev, "(erase-buffer) (insert \"x=12 y=345\") (goto-char 1)");
        assert_eq!(run(&mut ev, "(re-search-forward \"\\\\([a-z]\\\\)=\\\\([0-9]+\\\\)\")"), Value::Int(5));
        assert_eq!(run(&mut ev, "(match-string 2)"), Value::string("12"));
        assert_eq!(run(&mut ev, "(re-search-forward \"[0-9]+\" 9 t)"), Value::Int(9));
        assert_eq!(run(&mut ev, "(re-search-backward \"[a-z]=\")"), Value::Int(6));
        assert_eq!(run(&mut ev, "(looking-at \"y=\\\\([0-9]\\\\)\")"), Value::True);
        assert_eq!(run(&mut ev, "(match-string 1)"), Value::string("3"));
        assert_eq!(run(&mut ev, "(looking-at-p \"x\")"), Value::Nil);
    }

    #[test]
    fn string_match_uses_character_offsets() {
        let mut ev = Evaluator::new();
        assert_eq!(run(&mut ev, "(string-match \"ö\\\\(r\\\\)\" \"héllo wörld\")"), Value::Int(7));
        assert_eq!(run(&mut ev, "(match-end 1)"), Value::Int(9));
        assert_eq!(run(&mut ev, "(match-string 1 \"héllo wörld\")"), Value::string("r"));
        assert_eq!(run(&mut ev, "(string-match \"l\" \"hello\" -2)"), Value::Int(3));
        assert_eq!(run(&mut ev, "(string-match-p \"z\" \"hello\")"), Value::Nil);
        assert_eq!(run(&mut ev, "(match-beginning 0)"), Value::Int(3));
    }

    #[test]
    fn replace_match_in_string_and_buffer() {
        let mut ev = Evaluator::new();
        let out = run(
            &mut ev,
            "(let ((s \"foo-bar\")) (string-match \"\\\\(foo\\\\)-\\\\(bar\\\\)\" s) (replace-match \"\\\\2+\\\\1\" t nil s))",
        );
        assert_eq!(out, Value::string("bar+foo"));
        run(&mut ev, "(erase-buffer) (insert \"one two\") (goto-char 1) (re-search-forward \"tw\\\\(o\\\\)\")");
        run(&mut ev, "(replace-match \"[\\\\&]\")");
        assert_eq!(run(&mut ev, "(buffer-string)"), Value::string("one [two]"));
        assert_eq!(run(&mut ev, "(point)"), Value::Int(10));
        assert_eq!(run(&mut ev, "(match-data)"), Value::Nil);
    }

    #[test]
    fn replace_regexp_in_string_with_template_and_function() {
        let mut ev = Evaluator::new();
        assert_eq!(
            run(&mut ev, "(replace-regexp-in-string \"[0-9]+\" \"<\\\\&>\" \"a1b22\")"),
            Value::string("a<1>b<22>")
        );
        assert_eq!(
            run(&mut ev, "(replace-regexp-in-string \"[a-z]\" #'upcase \"a1b\")"),
            Value::string("A1B")
        );
        assert_eq!(
            run(&mut ev, "(replace-regexp-in-string \"\\\\.\" \"\\\\\" \"a.b\" nil t)"),
            Value::string("a\\b")
        );
        assert_eq!(run(&mut ev, "(regexp-quote \"a+b\")"), Value::string("a\\+b"));
    }

    #[test]
    fn set_match_data_round_trips() {
        let mut ev = Evaluator::new();
        run(&mut ev, "(set-match-data '(1 3 nil nil 4 5))");
        assert_eq!(run(&mut ev, "(match-data)").to_string(), "(1 3 nil nil 4 5)");
        assert_eq!(run(&mut ev, "(match-beginning 1)"), Value::Nil);
        run(&mut ev, "(save-match-data (string-match \"c\" \"abc\"))");
        assert_eq!(run(&mut ev, "(match-beginning 0)"), Value::Int(1));
    }

    #[test]
    fn failed_searches_clear_match_data() {
        let mut ev = Evaluator::new();
        run(&mut ev, "(erase-buffer) (insert \"aabbaa\") (goto-char (point-min))");
        for miss in [
            "(search-forward \"zzz\" nil t)",
            "(re-search-forward \"z+\" nil t)",
            "(looking-at \"q\")",
            "(string-match \"q\" \"abc\")",
        ] {
            run(&mut ev, "(goto-char 1) (search-forward \"b\")");
            assert_eq!(run(&mut ev, "(match-beginning 0)"), Value::Int(3));
            assert_eq!(run(&mut ev, miss), Value::Nil);
            assert_eq!(run(&mut ev, "(match-data)"), Value::Nil, "after {miss}");
        }
    }

    #[test]
    fn misses_in_predicate_forms_keep_match_data() {
        let mut ev = Evaluator::new();
        run(&mut ev, "(erase-buffer) (insert \"aabbaa\") (goto-char 1) (search-forward \"b\")");
        run(&mut ev, "(looking-at-p \"q\") (string-match-p \"q\" \"abc\")");
        assert_eq!(run(&mut ev, "(match-data)").to_string(), "(3 4)");
    }

    #[test]
    fn buffer_match_data_at_position_zero_is_rejected() {
        let mut ev = Evaluator::new();
        run(&mut ev, "(erase-buffer) (insert \"abc\") (goto-char 1) (search-forward \"a\")");
        run(&mut ev, "(set-match-data '(0 1))");
        assert_eq!(run(&mut ev, "(match-string 0)"), Value::Nil);
        let caught = run(&mut ev, "(condition-case e (replace-match \"x\") (args-out-of-range (car e)))");
        assert_eq!(caught, Value::symbol("args-out-of-range"));
        run(&mut ev, "(set-match-data '(2 9))");
        let caught = run(&mut ev, "(condition-case e (replace-match \"x\") (args-out-of-range 'oor))");
        assert_eq!(caught, Value::symbol("oor"));
        assert_eq!(run(&mut ev, "(buffer-string)"), Value::string("abc"));
    }
}
