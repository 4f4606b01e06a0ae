use super::*;
use crate::elisp::print::{print_value, BufferNames};

// ===========================================================================
// String operations
// ===========================================================================

/// Text of a string or symbol argument (`string=` and friends accept both).
fn string_designator(value: &Value) -> Result<String, Flow> {
    match value {
        Value::Str(s) => Ok(s.to_string()),
        other => other
            .as_symbol_name()
            .map(str::to_string)
            .ok_or_else(|| wrong_type("stringp", other)),
    }
}

fn char_of(value: &Value) -> Result<char, Flow> {
    let code = expect_int(value)?;
    u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| wrong_type("characterp", value))
}

pub(crate) fn builtin_concat(args: Vec<Value>) -> EvalResult {
    let mut out = String::new();
    for arg in &args {
        match arg {
            Value::Str(s) => out.push_str(s),
            Value::Nil => {}
            other => {
                for item in sequence_items(other)? {
                    out.push(char_of(&item)?);
                }
            }
        }
    }
    Ok(Value::string(out))
}

/// Resolve a possibly negative, possibly nil index against `len`.
fn resolve_index(value: Option<&Value>, len: usize, default: usize) -> Result<Option<usize>, Flow> {
    let Some(value) = value.filter(|v| !v.is_nil()) else {
        return Ok(Some(default));
    };
    let n = expect_int(value)?;
    let resolved = if n < 0 { len as i64 + n } else { n };
    Ok((0..=len as i64).contains(&resolved).then_some(resolved as usize))
}

pub(crate) fn builtin_substring(args: Vec<Value>) -> EvalResult {
    expect_range_args("substring", &args, 1, 3)?;
    let out_of_range = || {
        let mut data = vec![args[0].clone()];
        data.extend(args[1..].iter().cloned());
        signal("args-out-of-range", data)
    };
    let items: Vec<Value> = match &args[0] {
        Value::Str(_) | Value::Vector(_) => sequence_items(&args[0])?,
        other => return Err(wrong_type("arrayp", other)),
    };
    let len = items.len();
    let start = resolve_index(args.get(1), len, 0)?.ok_or_else(out_of_range)?;
    let end = resolve_index(args.get(2), len, len)?.ok_or_else(out_of_range)?;
    if start > end {
        return Err(out_of_range());
    }
    match &args[0] {
        Value::Str(s) => Ok(Value::string(s.chars().skip(start).take(end - start).collect::<String>())),
        _ => Ok(Value::vector(items[start..end].to_vec())),
    }
}

pub(crate) fn builtin_string_equal(args: Vec<Value>) -> EvalResult {
    expect_args("string=", &args, 2)?;
    Ok(Value::bool(string_designator(&args[0])? == string_designator(&args[1])?))
}

pub(crate) fn builtin_string_lessp(args: Vec<Value>) -> EvalResult {
    expect_args("string<", &args, 2)?;
    Ok(Value::bool(string_designator(&args[0])? < string_designator(&args[1])?))
}

pub(crate) fn builtin_string_greaterp(args: Vec<Value>) -> EvalResult {
    expect_args("string>", &args, 2)?;
    Ok(Value::bool(string_designator(&args[0])? > string_designator(&args[1])?))
}

pub(crate) fn builtin_string_prefix_p(args: Vec<Value>) -> EvalResult {
    expect_range_args("string-prefix-p", &args, 2, 3)?;
    let prefix = expect_string(&args[0])?;
    let s = expect_string(&args[1])?;
    let fold = args.get(2).is_some_and(Value::is_truthy);
    Ok(Value::bool(if fold {
        s.to_lowercase().starts_with(&prefix.to_lowercase())
    } else {
        s.starts_with(&prefix)
    }))
}

pub(crate) fn builtin_string_suffix_p(args: Vec<Value>) -> EvalResult {
    expect_range_args("string-suffix-p", &args, 2, 3)?;
    let suffix = expect_string(&args[0])?;
    let s = expect_string(&args[1])?;
    let fold = args.get(2).is_some_and(Value::is_truthy);
    Ok(Value::bool(if fold {
        s.to_lowercase().ends_with(&suffix.to_lowercase())
    } else {
        s.ends_with(&suffix)
    }))
}

pub(crate) fn builtin_string_empty_p(args: Vec<Value>) -> EvalResult {
    expect_args("string-empty-p", &args, 1)?;
    Ok(Value::bool(string_designator(&args[0])?.is_empty()))
}

pub(crate) fn builtin_string_join(args: Vec<Value>) -> EvalResult {
    expect_range_args("string-join", &args, 1, 2)?;
    let parts = expect_list(&args[0])?
        .iter()
        .map(expect_string)
        .collect::<Result<Vec<_>, _>>()?;
    let sep = match args.get(1) {
        None | Some(Value::Nil) => String::new(),
        Some(v) => expect_string(v)?,
    };
    Ok(Value::string(parts.join(&sep)))
}

pub(crate) fn builtin_string_search(args: Vec<Value>) -> EvalResult {
    expect_range_args("string-search", &args, 2, 3)?;
    let needle = expect_string(&args[0])?;
    let haystack = expect_string(&args[1])?;
    let start = resolve_index(args.get(2), haystack.chars().count(), 0)?
        .ok_or_else(|| signal("args-out-of-range", vec![args[1].clone()]))?;
    let byte_start = crate::elisp::regex::char_to_byte(&haystack, start);
    Ok(match haystack[byte_start..].find(&needle) {
        Some(b) => Value::Int((start + haystack[byte_start..byte_start + b].chars().count()) as i64),
        None => Value::Nil,
    })
}

pub(crate) fn builtin_string_replace(args: Vec<Value>) -> EvalResult {
    expect_args("string-replace", &args, 3)?;
    let from = expect_string(&args[0])?;
    let to = expect_string(&args[1])?;
    let s = expect_string(&args[2])?;
    if from.is_empty() {
        return Err(signal("wrong-length-argument", vec![args[0].clone()]));
    }
    Ok(Value::string(s.replace(&from, &to)))
}

fn map_case(value: &Value, name: &str, f: fn(&str) -> String, fc: fn(char) -> char) -> EvalResult {
    match value {
        Value::Str(s) => Ok(Value::string(f(s))),
        Value::Int(_) => Ok(Value::Int(fc(char_of(value)?) as i64)),
        other => Err(wrong_type(name, other)),
    }
}

fn upper_char(c: char) -> char {
    c.to_uppercase().next().unwrap_or(c)
}

fn lower_char(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

pub(crate) fn builtin_upcase(args: Vec<Value>) -> EvalResult {
    expect_args("upcase", &args, 1)?;
    map_case(&args[0], "char-or-string-p", |s| s.to_uppercase(), upper_char)
}

pub(crate) fn builtin_downcase(args: Vec<Value>) -> EvalResult {
    expect_args("downcase", &args, 1)?;
    map_case(&args[0], "char-or-string-p", |s| s.to_lowercase(), lower_char)
}

/// Uppercase the first letter of each word, lowercase the rest.
fn capitalize_words(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphanumeric() {
            out.extend(if in_word { c.to_lowercase().collect::<Vec<_>>() } else { c.to_uppercase().collect() });
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

pub(crate) fn builtin_capitalize(args: Vec<Value>) -> EvalResult {
    expect_args("capitalize", &args, 1)?;
    map_case(&args[0], "char-or-string-p", capitalize_words, upper_char)
}

pub(crate) fn builtin_make_string(args: Vec<Value>) -> EvalResult {
    expect_range_args("make-string", &args, 2, 3)?;
    let n = expect_natnum(&args[0])?;
    let c = char_of(&args[1])?;
    Ok(Value::string(std::iter::repeat_n(c, n).collect::<String>()))
}

pub(crate) fn builtin_string(args: Vec<Value>) -> EvalResult {
    let s = args.iter().map(char_of).collect::<Result<String, _>>()?;
    Ok(Value::string(s))
}

pub(crate) fn builtin_char_to_string(args: Vec<Value>) -> EvalResult {
    expect_args("char-to-string", &args, 1)?;
    Ok(Value::string(char_of(&args[0])?.to_string()))
}

pub(crate) fn builtin_string_to_char(args: Vec<Value>) -> EvalResult {
    expect_args("string-to-char", &args, 1)?;
    let s = expect_string(&args[0])?;
    Ok(Value::Int(s.chars().next().map_or(0, |c| c as i64)))
}

pub(crate) fn builtin_string_to_list(args: Vec<Value>) -> EvalResult {
    expect_args("string-to-list", &args, 1)?;
    let s = expect_string(&args[0])?;
    Ok(Value::list(s.chars().map(|c| Value::Int(c as i64)).collect()))
}

pub(crate) fn builtin_string_to_vector(args: Vec<Value>) -> EvalResult {
    expect_args("string-to-vector", &args, 1)?;
    let s = expect_string(&args[0])?;
    Ok(Value::vector(s.chars().map(|c| Value::Int(c as i64)).collect()))
}

/// Display columns: East Asian wide characters take two.
pub(crate) fn char_width(c: char) -> usize {
    let code = c as u32;
    let wide = matches!(code,
        0x1100..=0x115F | 0x2E80..=0xA4CF | 0xAC00..=0xD7A3 | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F | 0xFF00..=0xFF60 | 0xFFE0..=0xFFE6 | 0x1F300..=0x1F64F
        | 0x1F900..=0x1F9FF | 0x20000..=0x3FFFD);
    if wide {
        2
    } else if c.is_control() {
        0
    } else {
        1
    }
}

pub(crate) fn string_width(s: &str) -> usize {
    s.chars().map(char_width).sum()
}

pub(crate) fn builtin_string_width(args: Vec<Value>) -> EvalResult {
    expect_range_args("string-width", &args, 1, 3)?;
    Ok(Value::Int(string_width(&expect_string(&args[0])?) as i64))
}

/// `(string-pad STRING LENGTH &optional PADDING START)`.
pub(crate) fn builtin_string_pad(args: Vec<Value>) -> EvalResult {
    expect_range_args("string-pad", &args, 2, 4)?;
    let s = expect_string(&args[0])?;
    let length = expect_natnum(&args[1])?;
    let pad = match args.get(2) {
        None | Some(Value::Nil) => ' ',
        Some(v) => char_of(v)?,
    };
    let current = s.chars().count();
    if current >= length {
        return Ok(Value::string(s));
    }
    let fill: String = std::iter::repeat_n(pad, length - current).collect();
    let at_start = args.get(3).is_some_and(Value::is_truthy);
    Ok(Value::string(if at_start { fill + &s } else { s + &fill }))
}

/// `(truncate-string-to-width STR END-COLUMN &optional START-COLUMN PADDING ELLIPSIS)`.
pub(crate) fn builtin_truncate_string_to_width(args: Vec<Value>) -> EvalResult {
    expect_range_args("truncate-string-to-width", &args, 2, 6)?;
    let s = expect_string(&args[0])?;
    let end = expect_natnum(&args[1])?;
    let start = match args.get(2) {
        None | Some(Value::Nil) => 0,
        Some(v) => expect_natnum(v)?,
    };
    let padding = match args.get(3) {
        None | Some(Value::Nil) => None,
        Some(v) => Some(char_of(v)?),
    };
    let ellipsis = match args.get(4) {
        None | Some(Value::Nil) => String::new(),
        Some(Value::Str(e)) => e.to_string(),
        Some(_) => "...".to_string(),
    };
    let total = string_width(&s);
    let (limit, suffix) = if !ellipsis.is_empty() && total > end {
        (end.saturating_sub(string_width(&ellipsis)), ellipsis)
    } else {
        (end, String::new())
    };
    let mut out = String::new();
    let mut column = 0;
    for c in s.chars() {
        let w = char_width(c);
        if column + w > limit {
            break;
        }
        if column >= start {
            out.push(c);
        }
        column += w;
    }
    out.push_str(&suffix);
    if let Some(pad) = padding {
        let width = string_width(&out) + start.min(column);
        for _ in width..end {
            out.push(pad);
        }
    }
    Ok(Value::string(out))
}

pub(crate) fn builtin_string_reverse(args: Vec<Value>) -> EvalResult {
    expect_args("string-reverse", &args, 1)?;
    Ok(Value::string(expect_string(&args[0])?.chars().rev().collect::<String>()))
}

/// Text properties are not modeled; the string comes back unchanged.
pub(crate) fn builtin_propertize(args: Vec<Value>) -> EvalResult {
    expect_min_args("propertize", &args, 1)?;
    expect_string(&args[0])?;
    Ok(args[0].clone())
}

// ===========================================================================
// Regexp-driven string functions (need the regexp cache)
// ===========================================================================

const DEFAULT_SEPARATORS: &str = "[ \u{c}\t\n\r\u{b}]+";
const DEFAULT_TRIM: &str = "[ \t\n\r]+";

/// `(split-string STRING &optional SEPARATORS OMIT-NULLS TRIM)`.
pub(crate) fn builtin_split_string(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("split-string", &args, 1, 4)?;
    let s = expect_string(&args[0])?;
    let (pattern, omit_nulls) = match args.get(1) {
        None | Some(Value::Nil) => (DEFAULT_SEPARATORS.to_string(), true),
        Some(v) => (expect_string(v)?, args.get(2).is_some_and(Value::is_truthy)),
    };
    let re = eval.regexes.compile(&pattern, false)?;
    let trim = match args.get(3) {
        None | Some(Value::Nil) => None,
        Some(v) => Some(eval.regexes.compile(&expect_string(v)?, false)?),
    };
    let mut parts = Vec::new();
    for piece in re.split(&s) {
        let piece = match &trim {
            Some(t) => trim_with(t, t, piece),
            None => piece.to_string(),
        };
        if omit_nulls && piece.is_empty() {
            continue;
        }
        parts.push(Value::string(piece));
    }
    Ok(Value::list(parts))
}

fn trim_with(left: &regex::Regex, right: &regex::Regex, s: &str) -> String {
    let mut start = 0;
    if let Some(m) = left.find(s) {
        if m.start() == 0 {
            start = m.end();
        }
    }
    let rest = &s[start..];
    let mut end = rest.len();
    if let Some(m) = right.find_iter(rest).filter(|m| m.end() == rest.len()).last() {
        end = m.start();
    }
    rest[..end].to_string()
}

fn trim_regex(eval: &mut Evaluator, arg: Option<&Value>) -> Result<regex::Regex, Flow> {
    let pattern = match arg {
        None | Some(Value::Nil) => DEFAULT_TRIM.to_string(),
        Some(v) => expect_string(v)?,
    };
    eval.regexes.compile(&pattern, false)
}

pub(crate) fn builtin_string_trim(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("string-trim", &args, 1, 3)?;
    let s = expect_string(&args[0])?;
    let left = trim_regex(eval, args.get(1))?;
    let right = trim_regex(eval, args.get(2))?;
    Ok(Value::string(trim_with(&left, &right, &s)))
}

pub(crate) fn builtin_string_trim_left(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("string-trim-left", &args, 1, 2)?;
    let s = expect_string(&args[0])?;
    let left = trim_regex(eval, args.get(1))?;
    let never = eval.regexes.compile("\\`\\'", false)?;
    Ok(Value::string(trim_with(&left, &never, &s)))
}

pub(crate) fn builtin_string_trim_right(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("string-trim-right", &args, 1, 2)?;
    let s = expect_string(&args[0])?;
    let right = trim_regex(eval, args.get(1))?;
    let never = eval.regexes.compile("\\`\\'", false)?;
    Ok(Value::string(trim_with(&never, &right, &s)))
}

// ===========================================================================
// format
// ===========================================================================

#[derive(Default)]
struct Spec {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

impl Spec {
    fn pad(&self, body: String, numeric: bool) -> String {
        let Some(width) = self.width else {
            return body;
        };
        let len = body.chars().count();
        if len >= width {
            return body;
        }
        let fill = width - len;
        if self.left {
            body + &" ".repeat(fill)
        } else if self.zero && numeric {
            let (sign, digits) = match body.strip_prefix(['-', '+', ' ']) {
                Some(rest) => (&body[..1], rest),
                None => ("", body.as_str()),
            };
            format!("{sign}{}{digits}", "0".repeat(fill))
        } else {
            " ".repeat(fill) + &body
        }
    }

    fn sign(&self, negative: bool) -> &'static str {
        if negative {
            "-"
        } else if self.plus {
            "+"
        } else if self.space {
            " "
        } else {
            ""
        }
    }
}

/// `%e` body with a signed two-digit exponent.
fn exp_notation(f: f64, precision: usize) -> String {
    let raw = format!("{:.*e}", precision, f);
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.abs())
        }
        None => raw,
    }
}

/// `%g`: shortest of `%e`/`%f` at the given significant digits, trailing
/// zeros removed.
fn general_notation(f: f64, precision: usize) -> String {
    let p = precision.max(1);
    if f == 0.0 {
        return "0".to_string();
    }
    let exp = f.abs().log10().floor() as i32;
    let strip = |s: String| -> String {
        if s.contains('.') {
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            s
        }
    };
    if exp < -4 || exp >= p as i32 {
        let e = exp_notation(f, p - 1);
        match e.split_once('e') {
            Some((m, x)) => format!("{}e{x}", strip(m.to_string())),
            None => e,
        }
    } else {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        strip(format!("{:.*}", decimals, f))
    }
}

fn format_integer(spec: &Spec, n: i64, radix: char) -> String {
    let digits = match radix {
        'o' => format!("{:o}", n.unsigned_abs()),
        'x' => format!("{:x}", n.unsigned_abs()),
        'X' => format!("{:X}", n.unsigned_abs()),
        _ => n.unsigned_abs().to_string(),
    };
    let digits = match spec.precision {
        Some(p) if digits.len() < p => "0".repeat(p - digits.len()) + &digits,
        _ => digits,
    };
    spec.pad(format!("{}{digits}", spec.sign(n < 0)), true)
}

/// Expand a `format` control string.
pub(crate) fn format_string(control: &str, args: &[Value], names: &dyn BufferNames) -> Result<String, Flow> {
    let mut out = String::with_capacity(control.len());
    let mut chars = control.chars().peekable();
    let mut next_arg = 0;
    let mut take = |next_arg: &mut usize| -> Result<Value, Flow> {
        let value = args
            .get(*next_arg)
            .cloned()
            .ok_or_else(|| error_message("Not enough arguments for format string"))?;
        *next_arg += 1;
        Ok(value)
    };
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut spec = Spec::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => spec.left = true,
                '0' => spec.zero = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                '#' => {}
                _ => break,
            }
            chars.next();
        }
        let mut width = String::new();
        while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
            width.push(d);
            chars.next();
        }
        spec.width = width.parse().ok();
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut precision = String::new();
            while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                precision.push(d);
                chars.next();
            }
            spec.precision = Some(precision.parse().unwrap_or(0));
        }
        let Some(conv) = chars.next() else {
            return Err(error_message("Format string ends in middle of format specifier"));
        };
        match conv {
            '%' => out.push('%'),
            's' | 'S' => {
                let value = take(&mut next_arg)?;
                let mut text = print_value(&value, conv == 'S', names);
                if let Some(p) = spec.precision {
                    text = text.chars().take(p).collect();
                }
                out.push_str(&spec.pad(text, false));
            }
            'd' | 'o' | 'x' | 'X' => {
                let value = take(&mut next_arg)?;
                let n = match &value {
                    Value::Int(n) => *n,
                    Value::Float(f) => f.trunc() as i64,
                    other => return Err(error_message(format!(
                        "Format specifier doesn't match argument type: {}",
                        print_value(other, true, names)
                    ))),
                };
                out.push_str(&format_integer(&spec, n, conv));
            }
            'c' => {
                let value = take(&mut next_arg)?;
                let c = char_of(&value)?;
                out.push_str(&spec.pad(c.to_string(), false));
            }
            'f' | 'e' | 'g' => {
                let value = take(&mut next_arg)?;
                let f = value.as_number_f64().ok_or_else(|| {
                    error_message("Format specifier doesn't match argument type")
                })?;
                let precision = spec.precision.unwrap_or(6);
                let body = match conv {
                    'f' => format!("{:.*}", precision, f.abs()),
                    'e' => exp_notation(f.abs(), precision),
                    _ => general_notation(f.abs(), precision),
                };
                let body = if f.is_nan() {
                    "nan".to_string()
                } else if f.is_infinite() {
                    "inf".to_string()
                } else {
                    body
                };
                let negative = f.is_sign_negative() && !f.is_nan() && f != 0.0;
                out.push_str(&spec.pad(format!("{}{body}", spec.sign(negative)), true));
            }
            other => {
                return Err(error_message(format!("Invalid format operation %{other}")));
            }
        }
    }
    Ok(out)
}

pub(crate) fn builtin_format(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("format", &args, 1)?;
    let control = expect_string(&args[0])?;
    Ok(Value::string(format_string(&control, &args[1..], &eval.buffers)?))
}

pub(crate) fn builtin_prin1_to_string(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("prin1-to-string", &args, 1, 3)?;
    let escape = !args.get(1).is_some_and(Value::is_truthy);
    Ok(Value::string(print_value(&args[0], escape, &eval.buffers)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Value {
        Value::string(text)
    }

    fn fmt(control: &str, args: &[Value]) -> String {
        format_string(control, args, &()).unwrap()
    }

    #[test]
    fn format_directives() {
        assert_eq!(fmt("%d-%s", &[Value::Int(3), s("x")]), "3-x");
        assert_eq!(fmt("%S", &[s("q")]), "\"q\"");
        assert_eq!(fmt("%5d|%-5d|%05d", &[Value::Int(42), Value::Int(42), Value::Int(-42)]), "   42|42   |-0042");
        assert_eq!(fmt("%x %X %o", &[Value::Int(255), Value::Int(255), Value::Int(8)]), "ff FF 10");
        assert_eq!(fmt("%.2f", &[Value::Float(3.14159)]), "3.14");
        assert_eq!(fmt("%e", &[Value::Float(1500.0)]), "1.500000e+03");
        assert_eq!(fmt("%g", &[Value::Float(0.0001)]), "0.0001");
        assert_eq!(fmt("%g", &[Value::Float(1234567.0)]), "1.23457e+06");
        assert_eq!(fmt("%c%%", &[Value::Int(97)]), "a%");
        assert_eq!(fmt("%.3s", &[s("abcdef")]), "abc");
        assert!(format_string("%d", &[], &()).is_err());
    }

    #[test]
    fn substring_accepts_negative_indices() {
        assert_eq!(builtin_substring(vec![s("hello"), Value::Int(1), Value::Int(-1)]).unwrap(), s("ell"));
        assert_eq!(builtin_substring(vec![s("hello"), Value::Int(-3)]).unwrap(), s("llo"));
        assert!(builtin_substring(vec![s("hi"), Value::Int(5)]).is_err());
    }

    #[test]
    fn case_and_padding() {
        assert_eq!(builtin_capitalize(vec![s("hello wORLD")]).unwrap(), s("Hello World"));
        assert_eq!(builtin_upcase(vec![Value::Int('a' as i64)]).unwrap(), Value::Int('A' as i64));
        assert_eq!(builtin_string_pad(vec![s("ab"), Value::Int(4)]).unwrap(), s("ab  "));
        assert_eq!(
            builtin_string_pad(vec![s("ab"), Value::Int(4), Value::Int('.' as i64), Value::True]).unwrap(),
            s("..ab")
        );
    }

    #[test]
    fn truncate_to_width_with_ellipsis() {
        let out = builtin_truncate_string_to_width(vec![
            s("abcdefgh"),
            Value::Int(5),
            Value::Nil,
            Value::Nil,
            s("..."),
        ])
        .unwrap();
        assert_eq!(out, s("ab..."));
        assert_eq!(builtin_truncate_string_to_width(vec![s("abc"), Value::Int(5)]).unwrap(), s("abc"));
        assert_eq!(string_width("日本"), 4);
    }

    #[test]
    fn concat_accepts_char_sequences() {
        let chars = Value::list(vec![Value::Int('h' as i64), Value::Int('i' as i64)]);
        assert_eq!(builtin_concat(vec![s("say "), chars, Value::Nil]).unwrap(), s("say hi"));
    }

    #[test]
    fn split_and_trim() {
        let mut ev = Evaluator::new();
        let parts = builtin_split_string(&mut ev, vec![s("  a b\n c ")]).unwrap();
        assert_eq!(parts, Value::list(vec![s("a"), s("b"), s("c")]));
        let parts = builtin_split_string(&mut ev, vec![s("a,,b"), s(",")]).unwrap();
        assert_eq!(parts, Value::list(vec![s("a"), s(""), s("b")]));
        assert_eq!(builtin_string_trim(&mut ev, vec![s("  x y \n")]).unwrap(), s("x y"));
        assert_eq!(builtin_string_trim_left(&mut ev, vec![s("  x ")]).unwrap(), s("x "));
    }
}
