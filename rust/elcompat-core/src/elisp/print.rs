//! Printed representation of values (`prin1` and `princ`).

use super::value::Value;
use crate::buffer::BufferId;

/// Resolves buffer ids to names while printing.
pub trait BufferNames {
    fn buffer_name(&self, id: BufferId) -> Option<String>;
}

impl BufferNames for () {
    fn buffer_name(&self, _id: BufferId) -> Option<String> {
        None
    }
}

/// Longest list or nesting printed before eliding with `...`.
const PRINT_LIMIT: usize = 10_000;

pub fn prin1_to_string(value: &Value) -> String {
    print_value(value, true, &())
}

pub fn princ_to_string(value: &Value) -> String {
    print_value(value, false, &())
}

/// Print `value`; `escape` selects `prin1` (true) or `princ` (false) style.
pub fn print_value(value: &Value, escape: bool, names: &dyn BufferNames) -> String {
    let mut out = String::new();
    write_value(&mut out, value, escape, names, 0);
    out
}

fn write_value(out: &mut String, value: &Value, escape: bool, names: &dyn BufferNames, depth: usize) {
    if depth > PRINT_LIMIT {
        out.push_str("...");
        return;
    }
    match value {
        Value::Nil => out.push_str("nil"),
        Value::True => out.push('t'),
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::Float(f) => out.push_str(&format_float(*f)),
        Value::Symbol(s) | Value::Keyword(s) => out.push_str(s),
        Value::Str(s) => {
            if escape {
                write_escaped_string(out, s);
            } else {
                out.push_str(s);
            }
        }
        Value::Cons(_) => write_list(out, value, escape, names, depth),
        Value::Vector(items) => {
            out.push('[');
            for (i, item) in items.borrow().iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write_value(out, item, escape, names, depth + 1);
            }
            out.push(']');
        }
        Value::Lambda(data) | Value::Macro(data) => {
            if matches!(value, Value::Macro(_)) {
                out.push_str("(macro ");
            }
            out.push_str("(lambda ");
            let mut params: Vec<Value> = data.params.required.iter().map(Value::symbol).collect();
            if !data.params.optional.is_empty() {
                params.push(Value::symbol("&optional"));
                params.extend(data.params.optional.iter().map(Value::symbol));
            }
            if let Some(rest) = &data.params.rest {
                params.push(Value::symbol("&rest"));
                params.push(Value::symbol(rest));
            }
            write_value(out, &Value::list(params), escape, names, depth + 1);
            for form in &data.body {
                out.push(' ');
                write_value(out, form, escape, names, depth + 1);
            }
            out.push(')');
            if matches!(value, Value::Macro(_)) {
                out.push(')');
            }
        }
        Value::Subr(name) => {
            out.push_str("#<subr ");
            out.push_str(name);
            out.push('>');
        }
        Value::Buffer(id) => match names.buffer_name(*id) {
            Some(name) => out.push_str(&format!("#<buffer {name}>")),
            None => out.push_str(&format!("#<buffer {}>", id.0)),
        },
        Value::Window(id) => out.push_str(&format!("#<window {}>", id.0)),
        Value::Keymap(map) => {
            out.push_str("(keymap");
            for (key, binding) in map.borrow().bindings() {
                out.push_str(" (");
                write_escaped_string(out, key);
                out.push_str(" . ");
                write_value(out, binding, escape, names, depth + 1);
                out.push(')');
            }
            out.push(')');
        }
        Value::WindowConfig(_) => out.push_str("#<window-configuration>"),
        Value::Timer(id) => out.push_str(&format!("#<timer {}>", id.0)),
    }
}

fn write_list(out: &mut String, value: &Value, escape: bool, names: &dyn BufferNames, depth: usize) {
    let head = value.cons_car();
    let tail = value.cons_cdr();
    if let (Some(prefix), Value::Cons(_)) = (quote_prefix(&head), &tail) {
        if tail.cons_cdr().is_nil() {
            out.push_str(prefix);
            write_value(out, &tail.cons_car(), escape, names, depth + 1);
            return;
        }
    }

    out.push('(');
    let mut cursor = value.clone();
    let mut count = 0;
    loop {
        match cursor {
            Value::Cons(_) => {
                if count > 0 {
                    out.push(' ');
                }
                if count >= PRINT_LIMIT {
                    out.push_str("...");
                    break;
                }
                write_value(out, &cursor.cons_car(), escape, names, depth + 1);
                count += 1;
                cursor = cursor.cons_cdr();
            }
            Value::Nil => break,
            other => {
                out.push_str(" . ");
                write_value(out, &other, escape, names, depth + 1);
                break;
            }
        }
    }
    out.push(')');
}

fn quote_prefix(head: &Value) -> Option<&'static str> {
    match head.as_symbol_name()? {
        "quote" => Some("'"),
        "function" => Some("#'"),
        _ => None,
    }
}

fn write_escaped_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('"');
}

pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        "0.0e+NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "1.0e+INF" } else { "-1.0e+INF" }.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_lists_and_dotted_tails() {
        let v = Value::list_with_tail(vec![Value::Int(1), Value::symbol("a")], Value::Int(3));
        assert_eq!(prin1_to_string(&v), "(1 a . 3)");
        let quoted = Value::list(vec![Value::symbol("quote"), Value::symbol("x")]);
        assert_eq!(prin1_to_string(&quoted), "'x");
    }

    #[test]
    fn strings_escape_only_in_prin1() {
        let s = Value::string("say \"hi\"");
        assert_eq!(prin1_to_string(&s), "\"say \\\"hi\\\"\"");
        assert_eq!(princ_to_string(&s), "say \"hi\"");
    }

    #[test]
    fn floats_keep_a_fraction_digit() {
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(0.25), "0.25");
        assert_eq!(prin1_to_string(&Value::vector(vec![Value::Float(1.0)])), "[1.0]");
    }
}
