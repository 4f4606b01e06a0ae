//! Source rewriter run before the reader.
//!
//! A single left-to-right pass folds reader syntax the reader does not handle
//! into plain forms: `#'` quotes, radix and character literals, escaped
//! punctuation tokens, `1+`/`1-`, vector brackets, and a few head symbols that
//! would collide with runtime primitives.  Strings and comments are copied
//! verbatim.

use super::error::ParseError;

/// Head symbols rewritten when called with no arguments, e.g. `(point)`.
const ZERO_ARG_RENAMES: &[(&str, &str)] = &[("point", "(el-point"), ("dun-mode", "(call-fn 'dun-mode")];

fn is_delimiter(c: Option<char>) -> bool {
    match c {
        None => true,
        Some(c) => matches!(
            c,
            ' ' | '\t' | '\n' | '\r' | '(' | ')' | '[' | ']' | '\'' | '`' | ',' | '"'
        ),
    }
}

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '-' | '_' | ':' | '/' | '+' | '*' | '<' | '>' | '=' | '?' | '!' | '$' | '%' | '&' | '.' | '~'
        )
}

fn read_token(chars: &[char], start: usize) -> (String, usize) {
    let len = chars[start..]
        .iter()
        .take_while(|c| is_symbol_char(**c))
        .count();
    (chars[start..start + len].iter().collect(), len)
}

/// Rewrite `source` into text the reader accepts.
pub fn preprocess(source: &str) -> Result<String, ParseError> {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len() + source.len() / 8);
    let mut vector_depth = 0usize;
    let mut vector_opened_at = Vec::new();
    let mut in_string = false;
    let mut string_start = 0;
    let mut in_comment = false;
    let mut escaped = false;

    let at = |i: usize| chars.get(i).copied();
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];

        if in_comment {
            out.push(ch);
            if ch == '\n' {
                in_comment = false;
            }
            i += 1;
            continue;
        }

        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match ch {
            ';' => {
                in_comment = true;
                out.push(ch);
                i += 1;
            }
            '"' => {
                in_string = true;
                string_start = i;
                out.push(ch);
                i += 1;
            }
            '#' if at(i + 1) == Some('\'') => {
                out.push('\'');
                i += 2;
            }
            '#' => match parse_radix_literal(&chars[i..]) {
                Some((value, consumed)) => {
                    out.push_str(&value.to_string());
                    i += consumed;
                    // `#o19` reads as 1 then 9, not as 19.
                    if at(i).is_some_and(|c| c.is_ascii_alphanumeric()) {
                        out.push(' ');
                    }
                }
                None => {
                    out.push(ch);
                    i += 1;
                }
            },
            '\\' if matches!(at(i + 1), Some('?' | '.' | ',' | '!')) => {
                out.push('"');
                out.push(chars[i + 1]);
                out.push('"');
                i += 2;
            }
            '1' if matches!(at(i + 1), Some('+' | '-'))
                && is_delimiter(i.checked_sub(1).and_then(at))
                && is_delimiter(at(i + 2)) =>
            {
                out.push_str(if chars[i + 1] == '+' { "succ" } else { "pred" });
                i += 2;
            }
            '?' if is_delimiter(i.checked_sub(1).and_then(at)) => {
                match parse_char_literal(&chars[i..]) {
                    Some((code, consumed)) => {
                        out.push_str(&code.to_string());
                        i += consumed;
                    }
                    None => {
                        out.push(ch);
                        i += 1;
                    }
                }
            }
            '[' => {
                out.push_str("(vector-literal ");
                vector_depth += 1;
                vector_opened_at.push(i);
                i += 1;
            }
            ']' => {
                if vector_depth == 0 {
                    return Err(ParseError::new("unmatched ] in elisp source", i));
                }
                vector_depth -= 1;
                vector_opened_at.pop();
                out.push(')');
                i += 1;
            }
            '(' => match zero_arg_rename(&chars, i) {
                Some((replacement, consumed)) => {
                    out.push_str(replacement);
                    i += consumed;
                }
                None => {
                    out.push(ch);
                    i += 1;
                }
            },
            c if c.is_ascii_digit() && leading_digit_symbol(&chars, i) => {
                let (token, len) = read_token(&chars, i);
                out.push_str("n-");
                out.push_str(&token);
                i += len;
            }
            _ => {
                out.push(ch);
                i += 1;
            }
        }
    }

    if in_string {
        return Err(ParseError::new("unterminated string literal", string_start));
    }
    if let Some(open) = vector_opened_at.pop() {
        return Err(ParseError::new("unmatched [ in elisp source", open));
    }
    Ok(out)
}

/// `#xFF`, `#o17`, `#b101` → (value, chars consumed).
fn parse_radix_literal(s: &[char]) -> Option<(i64, usize)> {
    let radix = match s.get(1)? {
        'o' | 'O' => 8,
        'x' | 'X' => 16,
        'b' | 'B' => 2,
        _ => return None,
    };
    let digits: String = s[2..]
        .iter()
        .take_while(|c| c.is_digit(radix))
        .collect();
    if digits.is_empty() {
        return None;
    }
    let value = i64::from_str_radix(&digits, radix).ok()?;
    Some((value, 2 + digits.len()))
}

/// `?a`, `?\n`, `?\101`, `?\C-a`, `?\^a` → (code point, chars consumed).
fn parse_char_literal(s: &[char]) -> Option<(u32, usize)> {
    let first = *s.get(1)?;
    if first != '\\' {
        return Some((first as u32, 2));
    }
    let escaped = *s.get(2)?;
    if s.len() >= 5 && s[2..5].iter().all(|c| ('0'..='7').contains(c)) {
        let octal: String = s[2..5].iter().collect();
        return u32::from_str_radix(&octal, 8).ok().map(|v| (v, 5));
    }
    let code = match escaped {
        'n' => 10,
        't' => 9,
        'r' => 13,
        'f' => 12,
        'b' => 8,
        'e' => 27,
        'a' => 7,
        'd' => 127,
        's' if s.get(3) != Some(&'-') => 32,
        'C' if s.get(3) == Some(&'-') => {
            let target = *s.get(4)?;
            return Some((control_code(target), 5));
        }
        '^' => {
            let target = *s.get(3)?;
            return Some((control_code(target), 4));
        }
        other => other as u32,
    };
    Some((code, 3))
}

fn control_code(c: char) -> u32 {
    if c == '?' {
        127
    } else {
        (c.to_ascii_uppercase() as u32) & 0x1f
    }
}

fn zero_arg_rename(chars: &[char], open: usize) -> Option<(&'static str, usize)> {
    let mut i = open + 1;
    while matches!(chars.get(i), Some(' ' | '\t' | '\n' | '\r')) {
        i += 1;
    }
    let (token, len) = read_token(chars, i);
    if len == 0 {
        return None;
    }
    let (_, replacement) = ZERO_ARG_RENAMES.iter().find(|(name, _)| *name == token)?;
    let mut j = i + len;
    while matches!(chars.get(j), Some(' ' | '\t' | '\n' | '\r')) {
        j += 1;
    }
    (chars.get(j) == Some(&')')).then_some((replacement, i + len - open))
}

/// A delimiter-bounded token such as `2048-mode` that starts with a digit,
/// contains letters, and is not itself a number.
fn leading_digit_symbol(chars: &[char], pos: usize) -> bool {
    if pos > 0 && !is_delimiter(Some(chars[pos - 1])) {
        return false;
    }
    let (token, len) = read_token(chars, pos);
    if len == 0 || !is_delimiter(chars.get(pos + len).copied()) {
        return false;
    }
    token.chars().any(|c| c.is_ascii_alphabetic()) && token.parse::<f64>().is_err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pp(s: &str) -> String {
        preprocess(s).unwrap()
    }

    #[test]
    fn char_and_radix_literals_become_decimal() {
        assert_eq!(pp("?a"), "97");
        assert_eq!(pp("?\\n"), "10");
        assert_eq!(pp("#x1F"), "31");
        assert_eq!(pp("#o17"), "15");
        assert_eq!(pp("#b101"), "5");
        assert_eq!(pp("(list ?\\101 ?\\\\ ?\\  ?λ)"), "(list 65 92 32 955)");
        assert_eq!(pp("?\\C-a"), "1");
        assert_eq!(pp("#xyz"), "#xyz");
    }

    #[test]
    fn radix_literal_stops_at_first_invalid_digit() {
        assert_eq!(pp("(list #o19 #b102)"), "(list 1 9 2 2)");
        assert_eq!(pp("#b2"), "#b2");
    }

    #[test]
    fn question_mark_inside_symbol_is_untouched() {
        assert_eq!(pp("(if (done? x) y)"), "(if (done? x) y)");
    }

    #[test]
    fn function_quote_folds_into_quote() {
        assert_eq!(pp("(mapcar #'car xs)"), "(mapcar 'car xs)");
    }

    #[test]
    fn vectors_become_vector_literal_forms() {
        assert_eq!(pp("[1 [2 3]]"), "(vector-literal 1 (vector-literal 2 3))");
        let err = preprocess("(a ])").unwrap_err();
        assert_eq!(err.message, "unmatched ] in elisp source");
        let err = preprocess("[1 2").unwrap_err();
        assert_eq!(err.message, "unmatched [ in elisp source");
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn strings_and_comments_are_verbatim() {
        let src = "(message \"[?a #x1 1+]\") ; [?b #'c\n";
        assert_eq!(pp(src), src);
        assert_eq!(
            preprocess("(message \"oops)").unwrap_err().message,
            "unterminated string literal"
        );
    }

    #[test]
    fn successor_and_predecessor_need_delimiters() {
        assert_eq!(pp("(1+ x)"), "(succ x)");
        assert_eq!(pp("(mapcar '1- xs)"), "(mapcar 'pred xs)");
        assert_eq!(pp("(+ 11+ 1)"), "(+ 11+ 1)");
    }

    #[test]
    fn escaped_punctuation_becomes_strings() {
        assert_eq!(pp("(list \\? \\. \\, \\!)"), "(list \"?\" \".\" \",\" \"!\")");
    }

    #[test]
    fn zero_arg_heads_are_renamed_only_without_arguments() {
        assert_eq!(pp("(goto-char (point))"), "(goto-char (el-point))");
        assert_eq!(pp("( point \n)"), "(el-point \n)");
        assert_eq!(pp("(point 1)"), "(point 1)");
        assert_eq!(pp("(dun-mode)"), "(call-fn 'dun-mode)");
    }

    #[test]
    fn digit_leading_symbols_are_prefixed() {
        assert_eq!(pp("(2048-mode)"), "(n-2048-mode)");
        assert_eq!(pp("(list 1e3 12 0.5)"), "(list 1e3 12 0.5)");
        assert_eq!(pp("foo2bar"), "foo2bar");
    }

    proptest! {
        #[test]
        fn comment_text_never_changes(body in "[a-z?#\\[\\] 1+'x]{0,40}") {
            let src = format!(";{body}\n");
            prop_assert_eq!(preprocess(&src).unwrap(), src);
        }

        #[test]
        fn char_literal_yields_code_point(c in proptest::char::range('!', '~')) {
            prop_assume!(c != '\\');
            let src = format!("?{c}");
            prop_assert_eq!(preprocess(&src).unwrap(), (c as u32).to_string());
        }
    }
}
