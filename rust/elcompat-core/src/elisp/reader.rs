//! Lisp reader.
//!
//! Reads preprocessed source into [`Value`] forms.  Supports integers,
//! floats, strings (with escapes), symbols, keywords, lists, dotted pairs,
//! quote ('), backquote (`), unquote (,), splice (,@), line comments (;) and
//! block comments (#|..|#).  Vector brackets and character literals are
//! rewritten by [`super::preprocess`] before reading.

use super::error::ParseError;
use super::preprocess::preprocess;
use super::value::Value;

/// Read every top-level form of already-preprocessed text.
pub fn parse_forms(input: &str) -> Result<Vec<Value>, ParseError> {
    let mut parser = Parser::new(input);
    let mut forms = Vec::new();
    while parser.skip_ws_and_comments() {
        forms.push(parser.parse_expr()?);
    }
    Ok(forms)
}

/// Preprocess raw source, then read it.
pub fn read_source(source: &str) -> Result<Vec<Value>, ParseError> {
    parse_forms(&preprocess(source)?)
}

/// Read one form starting at char offset `start`; returns the form and the
/// offset just after it.  Used by `read-from-string`.
pub fn read_one(input: &str, start: usize) -> Result<(Value, usize), ParseError> {
    let byte_start = input
        .char_indices()
        .nth(start)
        .map(|(i, _)| i)
        .unwrap_or(input.len());
    let mut parser = Parser::new(input);
    parser.pos = byte_start;
    if !parser.skip_ws_and_comments() {
        return Err(parser.error("end of input"));
    }
    let value = parser.parse_expr()?;
    let consumed = input[..parser.pos].chars().count();
    Ok((value, consumed))
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    // -- Whitespace & comments -----------------------------------------------

    fn skip_ws_and_comments(&mut self) -> bool {
        loop {
            let Some(ch) = self.current() else {
                return false;
            };
            if ch.is_whitespace() {
                self.bump();
                continue;
            }
            if ch == ';' {
                while let Some(c) = self.current() {
                    self.bump();
                    if c == '\n' {
                        break;
                    }
                }
                continue;
            }
            if ch == '#' && self.peek_at(1) == Some('|') {
                self.bump();
                self.bump();
                let mut depth = 1;
                while depth > 0 {
                    match self.current() {
                        None => return false,
                        Some('#') if self.peek_at(1) == Some('|') => {
                            self.bump();
                            self.bump();
                            depth += 1;
                        }
                        Some('|') if self.peek_at(1) == Some('#') => {
                            self.bump();
                            self.bump();
                            depth -= 1;
                        }
                        _ => self.bump(),
                    }
                }
                continue;
            }
            return true;
        }
    }

    // -- Main parse dispatch -------------------------------------------------

    fn parse_expr(&mut self) -> Result<Value, ParseError> {
        self.skip_ws_and_comments();
        let Some(ch) = self.current() else {
            return Err(self.error("unexpected end of input"));
        };

        match ch {
            '(' => self.parse_list_or_dotted(),
            ')' => Err(self.error("unexpected ')'")),
            '\'' => self.parse_prefixed("quote"),
            '`' => self.parse_prefixed("`"),
            ',' => {
                if self.peek_at(1) == Some('@') {
                    self.bump();
                    self.parse_prefixed(",@")
                } else {
                    self.parse_prefixed(",")
                }
            }
            '"' => self.parse_string(),
            '#' if self.peek_at(1) == Some('\'') => {
                self.bump();
                self.parse_prefixed("function")
            }
            _ => self.parse_atom(),
        }
    }

    fn parse_prefixed(&mut self, head: &str) -> Result<Value, ParseError> {
        self.bump();
        let quoted = self.parse_expr()?;
        Ok(Value::list(vec![Value::symbol(head), quoted]))
    }

    // -- Lists and dotted pairs ----------------------------------------------

    fn parse_list_or_dotted(&mut self) -> Result<Value, ParseError> {
        self.expect('(')?;
        let mut items = Vec::new();
        loop {
            self.skip_ws_and_comments();
            match self.current() {
                Some(')') => {
                    self.bump();
                    return Ok(Value::list(items));
                }
                Some('.') if self.is_dot_separator() && !items.is_empty() => {
                    self.bump();
                    let cdr = self.parse_expr()?;
                    self.skip_ws_and_comments();
                    return match self.current() {
                        Some(')') => {
                            self.bump();
                            Ok(Value::list_with_tail(items, cdr))
                        }
                        _ => Err(self.error("expected ')' after dotted pair")),
                    };
                }
                Some(_) => items.push(self.parse_expr()?),
                None => return Err(self.error("unterminated list")),
            }
        }
    }

    /// Check if current '.' is a dot separator (not part of a number like 1.5).
    fn is_dot_separator(&self) -> bool {
        match self.peek_at(1) {
            None => true,
            Some(c) => c.is_whitespace() || c == ')' || c == '(' || c == ';',
        }
    }

    // -- Strings "..." -------------------------------------------------------

    fn parse_string(&mut self) -> Result<Value, ParseError> {
        self.expect('"')?;
        let mut s = String::new();
        loop {
            let Some(ch) = self.current() else {
                return Err(self.error("unterminated string"));
            };
            self.bump();
            match ch {
                '"' => return Ok(Value::string(s)),
                '\\' => {
                    let Some(esc) = self.current() else {
                        return Err(self.error("unterminated escape in string"));
                    };
                    self.bump();
                    match esc {
                        'n' => s.push('\n'),
                        'r' => s.push('\r'),
                        't' => s.push('\t'),
                        'a' => s.push('\x07'),
                        'b' => s.push('\x08'),
                        'f' => s.push('\x0C'),
                        'e' => s.push('\x1B'),
                        'd' => s.push('\x7F'),
                        's' => s.push(' '),
                        '0'..='7' => {
                            let mut val = esc as u32 - '0' as u32;
                            for _ in 0..2 {
                                match self.current() {
                                    Some(c @ '0'..='7') => {
                                        self.bump();
                                        val = val * 8 + (c as u32 - '0' as u32);
                                    }
                                    _ => break,
                                }
                            }
                            if let Some(c) = char::from_u32(val) {
                                s.push(c);
                            }
                        }
                        'x' => {
                            let start = self.pos;
                            while matches!(self.current(), Some(c) if c.is_ascii_hexdigit()) {
                                self.bump();
                            }
                            let digits = &self.input[start..self.pos];
                            let code = u32::from_str_radix(digits, 16)
                                .map_err(|_| self.error("invalid \\x escape"))?;
                            match char::from_u32(code) {
                                Some(c) => s.push(c),
                                None => return Err(self.error("invalid codepoint in \\x escape")),
                            }
                            if self.current() == Some('\\') && self.peek_at(1) == Some(' ') {
                                self.bump();
                                self.bump();
                            }
                        }
                        '\n' => {}
                        other => s.push(other),
                    }
                }
                other => s.push(other),
            }
        }
    }

    // -- Atoms ---------------------------------------------------------------

    fn parse_atom(&mut self) -> Result<Value, ParseError> {
        let mut token = String::new();
        let mut had_escape = false;
        while let Some(ch) = self.current() {
            if ch.is_whitespace()
                || matches!(ch, '(' | ')' | '[' | ']' | '\'' | '`' | ',' | '"' | ';')
            {
                break;
            }
            if ch == '\\' {
                had_escape = true;
                self.bump();
                match self.current() {
                    Some(escaped) => {
                        token.push(escaped);
                        self.bump();
                    }
                    None => token.push('\\'),
                }
                continue;
            }
            token.push(ch);
            self.bump();
        }

        if token.is_empty() {
            let bad = self.current().unwrap_or(' ');
            return Err(self.error(&format!("unexpected character '{bad}'")));
        }
        if had_escape {
            return Ok(Value::Symbol(token.into()));
        }
        if let Ok(n) = token.parse::<i64>() {
            return Ok(Value::Int(n));
        }
        if looks_like_float(&token) {
            if let Ok(f) = token.parse::<f64>() {
                return Ok(Value::Float(f));
            }
        }
        Ok(Value::symbol(&token))
    }

    // -- Helpers -------------------------------------------------------------

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        match self.current() {
            Some(ch) if ch == expected => {
                self.bump();
                Ok(())
            }
            _ => Err(self.error(&format!("expected '{}'", expected))),
        }
    }

    fn current(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn bump(&mut self) {
        if let Some(ch) = self.current() {
            self.pos += ch.len_utf8();
        }
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError::new(message, self.pos)
    }
}

/// `1.5`, `.5`, `1e3`, `-2.0e-1`; plain integers and symbols like `1+` are not.
fn looks_like_float(token: &str) -> bool {
    let body = token.trim_start_matches(['+', '-']);
    let mut saw_digit = false;
    let mut saw_marker = false;
    for c in body.chars() {
        match c {
            '0'..='9' => saw_digit = true,
            '.' | 'e' | 'E' => saw_marker = true,
            '+' | '-' if saw_marker => {}
            _ => return false,
        }
    }
    saw_digit && saw_marker
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn read1(s: &str) -> Value {
        let mut forms = parse_forms(s).unwrap();
        assert_eq!(forms.len(), 1);
        forms.remove(0)
    }

    #[test]
    fn reads_atoms() {
        assert_eq!(read1("42"), Value::Int(42));
        assert_eq!(read1("-7"), Value::Int(-7));
        assert_eq!(read1("1.5"), Value::Float(1.5));
        assert_eq!(read1("1e3"), Value::Float(1000.0));
        assert!(read1("1+").is_symbol_named("1+"));
        assert!(read1("nil").is_nil());
        assert!(matches!(read1(":key"), Value::Keyword(_)));
        assert!(read1("foo\\ bar").is_symbol_named("foo bar"));
        assert!(read1("-").is_symbol_named("-"));
    }

    #[test]
    fn reads_strings_with_escapes() {
        assert_eq!(read1(r#""a\nb\t\"q\"\\""#), Value::string("a\nb\t\"q\"\\"));
        assert_eq!(read1(r#""\101\x42""#), Value::string("AB"));
    }

    #[test]
    fn reads_lists_quotes_and_dotted_pairs() {
        assert_eq!(read1("(a . b)").to_string(), "(a . b)");
        assert_eq!(read1("(1 2 . 3)").to_string(), "(1 2 . 3)");
        assert_eq!(read1("'x").to_string(), "'x");
        assert_eq!(read1("`(a ,b ,@c)").to_string(), "(` (a (, b) (,@ c)))");
        assert_eq!(read1("()"), Value::Nil);
    }

    #[test]
    fn comments_are_skipped() {
        let forms = parse_forms("; hi\n1 #| block #| nested |# |# 2").unwrap();
        assert_eq!(forms, vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn read_source_applies_preprocessing() {
        let forms = read_source("[?a #x10]").unwrap();
        assert_eq!(forms[0].to_string(), "(vector-literal 97 16)");
    }

    #[test]
    fn errors_report_offsets() {
        let err = parse_forms("(a b").unwrap_err();
        assert_eq!(err.message, "unterminated list");
        assert!(parse_forms(")").is_err());
    }

    #[test]
    fn read_one_returns_end_offset() {
        let (value, end) = read_one("(a b) c", 0).unwrap();
        assert_eq!(value.to_string(), "(a b)");
        assert_eq!(end, 5);
    }

    proptest! {
        #[test]
        fn integers_read_back(n in any::<i64>()) {
            prop_assert_eq!(read1(&n.to_string()), Value::Int(n));
        }
    }
}
