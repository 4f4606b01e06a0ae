//! Keymaps: key-spec strings bound to commands.
//!
//! A keymap is a sparse table from canonical key-spec strings (`"a"`,
//! `"RET"`, `"C-c C-c"`, `"<left>"`) to bound values.  A *full* keymap also
//! carries a dense 256-slot table for single-character keys; every write of a
//! single-character binding goes to both tables so they never disagree.

use std::collections::BTreeMap;

use super::value::Value;

/// Slots in a full keymap's dense table.
pub const FULL_MAP_SIZE: usize = 256;

#[derive(Clone, Debug, Default)]
pub struct Keymap {
    sparse: BTreeMap<String, Value>,
    full: Option<Vec<Value>>,
    parent: Option<Value>,
}

impl Keymap {
    pub fn sparse() -> Self {
        Self::default()
    }

    pub fn full() -> Self {
        Self {
            full: Some(vec![Value::Nil; FULL_MAP_SIZE]),
            ..Self::default()
        }
    }

    pub fn is_full(&self) -> bool {
        self.full.is_some()
    }

    /// Bind `key`.  A `nil` binding removes the key.
    pub fn define(&mut self, key: &str, binding: Value) {
        if let (Some(table), Some(slot)) = (self.full.as_mut(), dense_slot(key)) {
            table[slot] = binding.clone();
        }
        if binding.is_nil() {
            self.sparse.remove(key);
        } else {
            self.sparse.insert(key.to_string(), binding);
        }
    }

    /// Binding of `key` in this map only (no parent lookup).
    pub fn lookup_local(&self, key: &str) -> Option<Value> {
        if let (Some(table), Some(slot)) = (self.full.as_ref(), dense_slot(key)) {
            let hit = &table[slot];
            return (!hit.is_nil()).then(|| hit.clone());
        }
        self.sparse.get(key).cloned()
    }

    pub fn parent(&self) -> Option<&Value> {
        self.parent.as_ref()
    }

    pub fn set_parent(&mut self, parent: Option<Value>) {
        self.parent = parent;
    }

    /// Bindings in key order.
    pub fn bindings(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.sparse.iter()
    }

    pub fn len(&self) -> usize {
        self.sparse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sparse.is_empty()
    }
}

/// Dense-table slot for a one-character key below 256.
fn dense_slot(key: &str) -> Option<usize> {
    let mut chars = key.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    let code = c as usize;
    (code < FULL_MAP_SIZE).then_some(code)
}

/// Look `key` up in `map` and then along its parent chain.
pub fn lookup(map: &Value, key: &str) -> Option<Value> {
    let mut current = Some(map.clone());
    let mut hops = 0;
    while let Some(Value::Keymap(km)) = current {
        if let Some(hit) = km.borrow().lookup_local(key) {
            return Some(hit);
        }
        hops += 1;
        if hops > 64 {
            break;
        }
        current = km.borrow().parent().cloned();
    }
    None
}

// ---------------------------------------------------------------------------
// Key specs
// ---------------------------------------------------------------------------

/// Normalize one `kbd`-style token.
fn canonical_token(token: &str) -> String {
    match token {
        "<return>" | "return" => "RET".to_string(),
        "<tab>" | "tab" => "TAB".to_string(),
        "<escape>" | "escape" => "ESC".to_string(),
        "<SPC>" => "SPC".to_string(),
        "\r" => "RET".to_string(),
        "\t" => "TAB".to_string(),
        "\u{1b}" => "ESC".to_string(),
        _ => token.to_string(),
    }
}

/// `kbd`: normalize each whitespace-separated token of a key description.
pub fn kbd(desc: &str) -> String {
    let tokens: Vec<String> = desc.split_whitespace().map(canonical_token).collect();
    if tokens.is_empty() {
        desc.to_string()
    } else {
        tokens.join(" ")
    }
}

/// Canonical key-spec string for a key argument (string, vector, symbol or
/// character code).  `None` when the value cannot name a key.
pub fn key_spec(key: &Value) -> Option<String> {
    match key {
        Value::Str(s) => Some(if s.chars().count() == 1 {
            canonical_token(s)
        } else {
            s.to_string()
        }),
        Value::Int(code) => char_key(*code),
        Value::Symbol(name) => Some(format!("<{name}>")),
        Value::Vector(items) => {
            let parts: Option<Vec<String>> = items
                .borrow()
                .iter()
                .map(|item| match item {
                    Value::Symbol(name) => Some(match name.as_ref() {
                        "return" => "RET".to_string(),
                        "tab" => "TAB".to_string(),
                        "escape" => "ESC".to_string(),
                        other => format!("<{other}>"),
                    }),
                    other => key_spec(other),
                })
                .collect();
            parts.map(|p| p.join(" "))
        }
        _ => None,
    }
}

fn char_key(code: i64) -> Option<String> {
    let c = char::from_u32(u32::try_from(code).ok()?)?;
    Some(match c {
        '\r' => "RET".to_string(),
        '\t' => "TAB".to_string(),
        '\u{1b}' => "ESC".to_string(),
        _ => c.to_string(),
    })
}

/// Arrow keys as reported by the input driver.
pub const KEY_LEFT: i64 = 252;
pub const KEY_UP: i64 = 253;
pub const KEY_RIGHT: i64 = 254;
pub const KEY_DOWN: i64 = 255;

/// Key-spec strings a raw input code may be bound under, most specific first.
pub fn key_candidates(code: i64) -> Vec<String> {
    let names: &[&str] = match code {
        10 | 13 => &["\r", "\n", "RET", "C-m"],
        9 => &["\t", "TAB", "<tab>", "C-i"],
        27 => &["ESC", "<escape>", "\u{1b}"],
        32 => &["SPC", " "],
        2 => &["\u{2}", "C-b"],
        3 => &["\u{3}", "C-c"],
        6 => &["\u{6}", "C-f"],
        14 => &["\u{e}", "C-n"],
        16 => &["\u{10}", "C-p"],
        KEY_LEFT => &["<left>", "left", "C-b"],
        KEY_UP => &["<up>", "up", "C-p"],
        KEY_RIGHT => &["<right>", "right", "C-f"],
        KEY_DOWN => &["<down>", "down", "C-n"],
        _ => &[],
    };
    if !names.is_empty() {
        return names.iter().map(|s| s.to_string()).collect();
    }
    u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .map(|c| vec![c.to_string()])
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn full_map_mirrors_single_char_writes() {
        let mut map = Keymap::full();
        map.define("a", Value::symbol("left"));
        assert_eq!(map.lookup_local("a"), Some(Value::symbol("left")));
        assert_eq!(map.bindings().count(), 1);
        map.define("a", Value::Nil);
        assert_eq!(map.lookup_local("a"), None);
        assert!(map.is_empty());
        map.define("C-c C-c", Value::symbol("run"));
        assert_eq!(map.lookup_local("C-c C-c"), Some(Value::symbol("run")));
    }

    #[test]
    fn parent_chain_lookup() {
        let parent = Value::Keymap(Rc::new(RefCell::new(Keymap::sparse())));
        if let Value::Keymap(km) = &parent {
            km.borrow_mut().define("q", Value::symbol("quit"));
        }
        let mut child = Keymap::sparse();
        child.set_parent(Some(parent));
        child.define("n", Value::symbol("next"));
        let child = Value::Keymap(Rc::new(RefCell::new(child)));
        assert_eq!(lookup(&child, "q"), Some(Value::symbol("quit")));
        assert_eq!(lookup(&child, "n"), Some(Value::symbol("next")));
        assert_eq!(lookup(&child, "x"), None);
    }

    #[test]
    fn key_specs_are_canonical() {
        assert_eq!(kbd("<return>"), "RET");
        assert_eq!(kbd("C-c  <tab>"), "C-c TAB");
        assert_eq!(key_spec(&Value::string("\r")).as_deref(), Some("RET"));
        assert_eq!(key_spec(&Value::Int(97)).as_deref(), Some("a"));
        let arrows = Value::vector(vec![Value::symbol("left")]);
        assert_eq!(key_spec(&arrows).as_deref(), Some("<left>"));
        assert_eq!(key_spec(&Value::Float(1.0)), None);
    }

    #[test]
    fn candidates_cover_return_and_arrows() {
        assert!(key_candidates(13).contains(&"RET".to_string()));
        assert_eq!(key_candidates(KEY_LEFT)[0], "<left>");
        assert_eq!(key_candidates(120), vec!["x".to_string()]);
    }

    proptest! {
        #[test]
        fn sparse_and_dense_tables_agree(ops in proptest::collection::vec((0u8..128, proptest::bool::ANY), 1..64)) {
            let mut map = Keymap::full();
            for (code, bind) in &ops {
                let key = (*code as char).to_string();
                let value = if *bind { Value::Int(*code as i64) } else { Value::Nil };
                map.define(&key, value);
            }
            for code in 0u8..128 {
                let key = (code as char).to_string();
                let sparse = map.sparse.get(&key).cloned();
                prop_assert_eq!(map.lookup_local(&key), sparse);
            }
        }
    }
}
