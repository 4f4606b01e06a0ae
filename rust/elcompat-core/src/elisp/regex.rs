//! Emacs regexps on top of the `regex` crate, plus match data.
//!
//! Emacs syntax is translated to Rust `regex` syntax before compiling:
//! - Groups: `\(` ... `\)` (bare parens are literal), shy groups `\(?:`
//! - Alternation: `\|`
//! - Repetition braces: `\{n,m\}`
//! - Syntax classes: `\sw`, `\s-`, `\s_`, `\s.` and their `\S` negations
//! - Boundaries: `\b`, `\B`, `\<`, `\>`, `\_<`, `\_>`, `` \` ``, `\'`
//! - `^`/`$` are anchors only where Emacs treats them as such
//!
//! Match positions coming out of the `regex` crate are byte offsets; they
//! are converted to character offsets before landing in [`MatchData`].

use std::collections::HashMap;

use regex::Regex;

use super::error::{signal, Flow};
use super::value::Value;
use crate::buffer::BufferId;

// ---------------------------------------------------------------------------
// Translation
// ---------------------------------------------------------------------------

/// Translate an Emacs regexp into Rust `regex` syntax.
pub fn translate(pattern: &str) -> Result<String, String> {
    let mut translator = Translator::new();
    translator.translate(pattern)?;
    Ok(translator.out)
}

struct Translator {
    out: String,
    /// Open group count, for `\)` validation.
    depth: usize,
    /// True at pattern start and right after `\(` or `\|`, where `*`, `+`
    /// and `?` are literal and `^` is an anchor.
    at_start: bool,
}

impl Translator {
    fn new() -> Self {
        Translator {
            out: String::from("(?m)"),
            depth: 0,
            at_start: true,
        }
    }

    fn translate(&mut self, pattern: &str) -> Result<(), String> {
        let chars: Vec<char> = pattern.chars().collect();
        let len = chars.len();
        let mut i = 0;

        while i < len {
            let c = chars[i];
            match c {
                '\\' => {
                    i = self.translate_escape(&chars, i + 1)?;
                    continue;
                }
                '[' => {
                    i = self.translate_charset(&chars, i + 1)?;
                    self.at_start = false;
                    continue;
                }
                '^' => {
                    if self.at_start {
                        self.out.push('^');
                    } else {
                        self.out.push_str("\\^");
                        self.at_start = false;
                    }
                }
                '$' => {
                    let at_end = i + 1 == len
                        || (chars[i + 1] == '\\' && matches!(chars.get(i + 2), Some(')' | '|')));
                    self.out.push_str(if at_end { "$" } else { "\\$" });
                    self.at_start = false;
                }
                '*' | '+' | '?' => {
                    if self.at_start {
                        self.out.push('\\');
                        self.out.push(c);
                        self.at_start = false;
                    } else {
                        self.out.push(c);
                        // Non-greedy suffix.
                        if chars.get(i + 1) == Some(&'?') {
                            self.out.push('?');
                            i += 1;
                        }
                    }
                }
                '.' => {
                    self.out.push('.');
                    self.at_start = false;
                }
                _ => {
                    self.push_literal(c);
                    self.at_start = false;
                }
            }
            i += 1;
        }

        if self.depth != 0 {
            return Err("Unmatched \\(".to_string());
        }
        Ok(())
    }

    fn push_literal(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
    }

    /// Handle the character after a backslash; returns the next index.
    fn translate_escape(&mut self, chars: &[char], i: usize) -> Result<usize, String> {
        let Some(&c) = chars.get(i) else {
            return Err("Trailing backslash".to_string());
        };
        match c {
            '(' => {
                self.depth += 1;
                self.at_start = true;
                if chars.get(i + 1) == Some(&'?') {
                    // `\(?:` shy group or `\(?N:` explicitly numbered group.
                    let mut j = i + 2;
                    while chars.get(j).is_some_and(|d| d.is_ascii_digit()) {
                        j += 1;
                    }
                    if chars.get(j) != Some(&':') {
                        return Err("Invalid \\(? group".to_string());
                    }
                    self.out.push_str(if j == i + 2 { "(?:" } else { "(" });
                    return Ok(j + 1);
                }
                self.out.push('(');
            }
            ')' => {
                if self.depth == 0 {
                    return Err("Unmatched ) or \\)".to_string());
                }
                self.depth -= 1;
                self.out.push(')');
                self.at_start = false;
            }
            '|' => {
                self.out.push('|');
                self.at_start = true;
            }
            '{' => {
                let mut j = i + 1;
                let mut spec = String::new();
                while let Some(&d) = chars.get(j) {
                    if d == '\\' && chars.get(j + 1) == Some(&'}') {
                        break;
                    }
                    if !(d.is_ascii_digit() || d == ',') {
                        return Err("Invalid content of \\{\\}".to_string());
                    }
                    spec.push(d);
                    j += 1;
                }
                if chars.get(j) != Some(&'\\') {
                    return Err("Unmatched \\{".to_string());
                }
                let spec = if spec.starts_with(',') { format!("0{spec}") } else { spec };
                let spec = if spec.is_empty() { "0".to_string() } else { spec };
                self.out.push('{');
                self.out.push_str(&spec);
                self.out.push('}');
                return Ok(j + 2);
            }
            '<' | '>' | 'b' => {
                self.out.push_str("\\b");
            }
            'B' => self.out.push_str("\\B"),
            'w' => {
                self.out.push_str("\\w");
                self.at_start = false;
            }
            'W' => {
                self.out.push_str("\\W");
                self.at_start = false;
            }
            '`' => self.out.push_str("\\A"),
            '\'' => self.out.push_str("\\z"),
            '=' => {}
            '_' => {
                if !matches!(chars.get(i + 1), Some('<' | '>')) {
                    return Err("Invalid \\_ escape".to_string());
                }
                self.out.push_str("\\b");
                return Ok(i + 2);
            }
            's' | 'S' => {
                let Some(&code) = chars.get(i + 1) else {
                    return Err("Missing syntax code".to_string());
                };
                let class = match code {
                    '-' | ' ' => "\\s",
                    'w' => "\\w",
                    '_' => "[\\w_$&*+\\-/<=>]",
                    '.' => "[[:punct:]]",
                    '(' => "[(\\[{]",
                    ')' => "[)\\]}]",
                    '"' => "\"",
                    _ => return Err(format!("Invalid syntax code {code}")),
                };
                if c == 'S' {
                    self.out.push_str(&negate_class(class));
                } else {
                    self.out.push_str(class);
                }
                self.at_start = false;
                return Ok(i + 2);
            }
            '1'..='9' => return Err("Back references are not supported".to_string()),
            other => {
                self.push_literal(other);
                self.at_start = false;
            }
        }
        Ok(i + 1)
    }

    /// Translate a bracket expression starting just after `[`.
    fn translate_charset(&mut self, chars: &[char], mut i: usize) -> Result<usize, String> {
        let mut class = String::from("[");
        if chars.get(i) == Some(&'^') {
            class.push('^');
            i += 1;
        }
        let mut first = true;
        loop {
            let Some(&c) = chars.get(i) else {
                return Err("Unmatched [ or [^".to_string());
            };
            if c == ']' && !first {
                i += 1;
                break;
            }
            first = false;
            if c == '[' && chars.get(i + 1) == Some(&':') {
                let rest: String = chars[i + 2..].iter().collect();
                if let Some(end) = rest.find(":]") {
                    let name = &rest[..end];
                    class.push_str(posix_class(name)?);
                    i += 2 + name.chars().count() + 2;
                    continue;
                }
            }
            if chars.get(i + 1) == Some(&'-') && chars.get(i + 2).is_some_and(|e| *e != ']') {
                let end = chars[i + 2];
                if end < c {
                    return Err("Invalid range end".to_string());
                }
                push_class_char(&mut class, c);
                class.push('-');
                push_class_char(&mut class, end);
                i += 3;
                continue;
            }
            push_class_char(&mut class, c);
            i += 1;
        }
        class.push(']');
        self.out.push_str(&class);
        Ok(i)
    }
}

fn push_class_char(class: &mut String, c: char) {
    if matches!(c, '\\' | ']' | '[' | '^' | '-' | '&' | '~') {
        class.push('\\');
    }
    class.push(c);
}

fn posix_class(name: &str) -> Result<&'static str, String> {
    Ok(match name {
        "alpha" => "[:alpha:]",
        "digit" => "[:digit:]",
        "alnum" => "[:alnum:]",
        "upper" => "[:upper:]",
        "lower" => "[:lower:]",
        "space" => "[:space:]",
        "blank" => "[:blank:]",
        "punct" => "[:punct:]",
        "xdigit" => "[:xdigit:]",
        "cntrl" => "[:cntrl:]",
        "graph" => "[:graph:]",
        "print" => "[:print:]",
        "word" => "\\w",
        "ascii" => "\\x00-\\x7F",
        "nonascii" => "[^\\x00-\\x7F]",
        "multibyte" => "[^\\x00-\\xFF]",
        "unibyte" => "\\x00-\\xFF",
        _ => return Err(format!("Invalid character class name {name}")),
    })
}

fn negate_class(class: &str) -> String {
    match class {
        "\\s" => "\\S".to_string(),
        "\\w" => "\\W".to_string(),
        _ if class.starts_with('[') => format!("[^{}]", &class[1..class.len() - 1]),
        _ => format!("[^{class}]"),
    }
}

/// `regexp-quote`: a regexp matching `s` literally.
pub fn regexp_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '[' | '*' | '.' | '\\' | '?' | '+' | '^' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// ---------------------------------------------------------------------------
// Compilation cache
// ---------------------------------------------------------------------------

const CACHE_LIMIT: usize = 64;

/// Translated-and-compiled regexps keyed by (pattern, case-fold).
#[derive(Default)]
pub struct RegexCache {
    compiled: HashMap<(String, bool), Regex>,
}

impl RegexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile an Emacs pattern, signaling `invalid-regexp` on failure.
    pub fn compile(&mut self, pattern: &str, case_fold: bool) -> Result<Regex, Flow> {
        let key = (pattern.to_string(), case_fold);
        if let Some(re) = self.compiled.get(&key) {
            return Ok(re.clone());
        }
        let translated = translate(pattern)
            .map_err(|msg| signal("invalid-regexp", vec![Value::string(msg)]))?;
        let source = if case_fold {
            format!("(?i){translated}")
        } else {
            translated
        };
        let re = Regex::new(&source)
            .map_err(|e| signal("invalid-regexp", vec![Value::string(e.to_string())]))?;
        if self.compiled.len() >= CACHE_LIMIT {
            self.compiled.clear();
        }
        self.compiled.insert(key, re.clone());
        Ok(re)
    }
}

// ---------------------------------------------------------------------------
// Match data
// ---------------------------------------------------------------------------

/// What the last match ran against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchSource {
    /// A free string; positions are 0-based.
    String,
    /// A buffer; positions are 1-based.
    Buffer(BufferId),
}

/// The single shared "last match" record.  Unmatched groups are `(-1, -1)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchData {
    pub groups: Vec<(i64, i64)>,
    pub source: MatchSource,
}

impl MatchData {
    pub fn group(&self, n: usize) -> Option<(i64, i64)> {
        self.groups.get(n).copied().filter(|(s, e)| *s >= 0 && *e >= 0)
    }

    /// Flat `(start0 end0 start1 end1 ...)` list for `match-data`.
    pub fn to_list(&self) -> Value {
        let mut out = Vec::with_capacity(self.groups.len() * 2);
        for (s, e) in &self.groups {
            if *s < 0 {
                out.push(Value::Nil);
                out.push(Value::Nil);
            } else {
                out.push(Value::Int(*s));
                out.push(Value::Int(*e));
            }
        }
        while matches!(out.last(), Some(Value::Nil)) {
            out.pop();
        }
        Value::list(out)
    }
}

/// Character offset of byte offset `byte` in `text`.
pub fn byte_to_char(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

/// Byte offset of character offset `ch` in `text` (clamped to the end).
pub fn char_to_byte(text: &str, ch: usize) -> usize {
    text.char_indices()
        .nth(ch)
        .map(|(b, _)| b)
        .unwrap_or(text.len())
}

/// Convert capture byte spans in `text` into character spans shifted by
/// `base` (the character offset of `text` within its source).
pub fn capture_spans(caps: &regex::Captures<'_>, text: &str, base: usize) -> Vec<(i64, i64)> {
    (0..caps.len())
        .map(|n| match caps.get(n) {
            Some(m) => (
                (base + byte_to_char(text, m.start())) as i64,
                (base + byte_to_char(text, m.end())) as i64,
            ),
            None => (-1, -1),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Replacement templates
// ---------------------------------------------------------------------------

/// Expand `\&`, `\N` and `\\` in `template`.  `group` yields the text of a
/// capture (None when it did not participate).  Any other escaped character
/// is copied literally.
pub fn expand_template(template: &str, group: impl Fn(usize) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('&') => out.push_str(&group(0).unwrap_or_default()),
            Some(d @ '0'..='9') => {
                let n = d as usize - '0' as usize;
                out.push_str(&group(n).unwrap_or_default());
            }
            Some('\\') => out.push('\\'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn re(p: &str) -> Regex {
        RegexCache::new().compile(p, false).unwrap()
    }

    #[test]
    fn translates_groups_alternation_and_braces() {
        assert_eq!(translate("\\(a\\|b\\)").unwrap(), "(?m)(a|b)");
        assert_eq!(translate("x\\{2,3\\}").unwrap(), "(?m)x{2,3}");
        assert_eq!(translate("(lit)").unwrap(), "(?m)\\(lit\\)");
        assert_eq!(translate("\\(?:ab\\)+").unwrap(), "(?m)(?:ab)+");
        assert!(translate("\\(open").is_err());
        assert!(translate("a\\)").is_err());
    }

    #[test]
    fn anchors_and_repeat_chars_depend_on_position() {
        assert_eq!(translate("^a*$").unwrap(), "(?m)^a*$");
        assert_eq!(translate("a^b$c").unwrap(), "(?m)a\\^b\\$c");
        assert_eq!(translate("*a").unwrap(), "(?m)\\*a");
        assert!(re("^b").is_match("a\nb"));
    }

    #[test]
    fn bracket_expressions() {
        assert!(re("[]a]").is_match("]"));
        assert!(re("[[:digit:]]+").is_match("42"));
        assert!(re("[^a-c]").is_match("d"));
        assert!(!re("^[^a-c]$").is_match("b"));
        assert!(re("[\\]").is_match("\\"));
        assert!(re("\\s-+\\sw").is_match("  x"));
    }

    #[test]
    fn invalid_patterns_signal_invalid_regexp() {
        let err = RegexCache::new().compile("\\(", false).unwrap_err();
        match err {
            Flow::Signal(sig) => assert_eq!(sig.symbol, "invalid-regexp"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn spans_are_character_offsets() {
        let text = "héllo wörld";
        let r = re("w\\(ö\\)r");
        let caps = r.captures(text).unwrap();
        assert_eq!(capture_spans(&caps, text, 0), vec![(6, 9), (7, 8)]);
        assert_eq!(capture_spans(&caps, text, 1)[0], (7, 10));
        assert_eq!(char_to_byte(text, 2), 3);
    }

    #[test]
    fn template_expansion() {
        let groups = ["foo-bar", "foo", "bar"];
        let get = |n: usize| groups.get(n).map(|s| s.to_string());
        assert_eq!(expand_template("\\2-\\1 [\\&] \\\\ \\q", get), "bar-foo [foo-bar] \\ q");
    }

    #[test]
    fn match_data_list_drops_trailing_unmatched() {
        let md = MatchData {
            groups: vec![(1, 4), (-1, -1)],
            source: MatchSource::String,
        };
        assert_eq!(md.to_list().to_string(), "(1 4)");
        assert_eq!(md.group(1), None);
        assert_eq!(regexp_quote("a.b*"), "a\\.b\\*");
    }
}
