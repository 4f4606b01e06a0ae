use super::*;
use crate::elisp::keymap::{self, Keymap};

use std::cell::RefCell;
use std::rc::Rc;

pub(crate) fn new_keymap(full: bool) -> Value {
    let map = if full { Keymap::full() } else { Keymap::sparse() };
    Value::Keymap(Rc::new(RefCell::new(map)))
}

fn expect_keymap(value: &Value) -> Result<Rc<RefCell<Keymap>>, Flow> {
    match value {
        Value::Keymap(km) => Ok(km.clone()),
        other => Err(wrong_type("keymapp", other)),
    }
}

fn expect_key(value: &Value) -> Result<String, Flow> {
    keymap::key_spec(value).ok_or_else(|| wrong_type("arrayp", value))
}

/// Bind `key` in `map`, returning the definition.
pub(crate) fn define_key(map: &Value, key: &str, definition: Value) -> EvalResult {
    expect_keymap(map)?
        .borrow_mut()
        .define(key, definition.clone());
    Ok(definition)
}

pub(crate) fn builtin_make_keymap(args: Vec<Value>) -> EvalResult {
    expect_max_args("make-keymap", &args, 1)?;
    Ok(new_keymap(true))
}

pub(crate) fn builtin_make_sparse_keymap(args: Vec<Value>) -> EvalResult {
    expect_max_args("make-sparse-keymap", &args, 1)?;
    Ok(new_keymap(false))
}

pub(crate) fn builtin_keymapp(args: Vec<Value>) -> EvalResult {
    expect_args("keymapp", &args, 1)?;
    Ok(Value::bool(matches!(args[0], Value::Keymap(_))))
}

pub(crate) fn builtin_define_key(args: Vec<Value>) -> EvalResult {
    expect_range_args("define-key", &args, 3, 4)?;
    let key = expect_key(&args[1])?;
    define_key(&args[0], &key, args[2].clone())
}

/// `keymap-set` takes keys in `kbd` syntax only.
pub(crate) fn builtin_keymap_set(args: Vec<Value>) -> EvalResult {
    expect_args("keymap-set", &args, 3)?;
    let key = keymap::kbd(&expect_string(&args[1])?);
    define_key(&args[0], &key, args[2].clone())
}

pub(crate) fn builtin_kbd(args: Vec<Value>) -> EvalResult {
    expect_args("kbd", &args, 1)?;
    Ok(Value::string(keymap::kbd(&expect_string(&args[0])?)))
}

pub(crate) fn builtin_set_keymap_parent(args: Vec<Value>) -> EvalResult {
    expect_args("set-keymap-parent", &args, 2)?;
    let parent = match &args[1] {
        Value::Nil => None,
        other => {
            expect_keymap(other)?;
            Some(other.clone())
        }
    };
    expect_keymap(&args[0])?.borrow_mut().set_parent(parent);
    Ok(args[1].clone())
}

pub(crate) fn builtin_keymap_parent(args: Vec<Value>) -> EvalResult {
    expect_args("keymap-parent", &args, 1)?;
    Ok(expect_keymap(&args[0])?
        .borrow()
        .parent()
        .cloned()
        .unwrap_or(Value::Nil))
}

pub(crate) fn builtin_suppress_keymap(args: Vec<Value>) -> EvalResult {
    expect_range_args("suppress-keymap", &args, 1, 2)?;
    expect_keymap(&args[0])?;
    Ok(Value::Nil)
}

/// `(lookup-key MAP KEY)`: the binding through the parent chain, or nil.
pub(crate) fn builtin_lookup_key(args: Vec<Value>) -> EvalResult {
    expect_range_args("lookup-key", &args, 2, 3)?;
    expect_keymap(&args[0])?;
    let key = expect_key(&args[1])?;
    Ok(keymap::lookup(&args[0], &key).unwrap_or(Value::Nil))
}

// ===========================================================================
// Active maps
// ===========================================================================

pub(crate) fn builtin_current_global_map(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("current-global-map", &args, 0)?;
    Ok(eval.global_map.clone())
}

pub(crate) fn builtin_current_local_map(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("current-local-map", &args, 0)?;
    Ok(eval
        .buffers
        .current_buffer_mut()
        .local_map
        .clone()
        .unwrap_or(Value::Nil))
}

pub(crate) fn builtin_use_local_map(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("use-local-map", &args, 1)?;
    let map = match &args[0] {
        Value::Nil => None,
        other => {
            expect_keymap(other)?;
            Some(other.clone())
        }
    };
    eval.buffers.current_buffer_mut().local_map = map;
    Ok(Value::Nil)
}

pub(crate) fn builtin_use_global_map(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("use-global-map", &args, 1)?;
    expect_keymap(&args[0])?;
    eval.global_map = args[0].clone();
    Ok(Value::Nil)
}

pub(crate) fn builtin_global_set_key(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("global-set-key", &args, 2)?;
    let key = expect_key(&args[0])?;
    define_key(&eval.global_map.clone(), &key, args[1].clone())
}

/// Bind in the current buffer's local map, creating a sparse one first.
pub(crate) fn builtin_local_set_key(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("local-set-key", &args, 2)?;
    let key = expect_key(&args[0])?;
    let buf = eval.buffers.current_buffer_mut();
    let map = buf.local_map.get_or_insert_with(|| new_keymap(false)).clone();
    define_key(&map, &key, args[1].clone())
}

/// Binding of `key` in the active maps: the local map first, then the
/// global map.
pub(crate) fn active_binding(eval: &mut Evaluator, key: &str) -> Option<Value> {
    let local = eval.buffers.current_buffer_mut().local_map.clone();
    local
        .and_then(|map| keymap::lookup(&map, key))
        .or_else(|| keymap::lookup(&eval.global_map, key))
}

/// `(keymap-lookup MAP KEY)`; a nil MAP searches the active maps.
pub(crate) fn builtin_keymap_lookup(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("keymap-lookup", &args, 2, 4)?;
    let key = keymap::kbd(&expect_string(&args[1])?);
    let hit = match &args[0] {
        Value::Nil => active_binding(eval, &key),
        map => {
            expect_keymap(map)?;
            keymap::lookup(map, &key)
        }
    };
    Ok(hit.unwrap_or(Value::Nil))
}

pub(crate) fn builtin_key_binding(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("key-binding", &args, 1, 4)?;
    let key = expect_key(&args[0])?;
    Ok(active_binding(eval, &key).unwrap_or(Value::Nil))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn define_and_lookup_through_parents() {
        let mut ev = Evaluator::new();
        let out = ev
            .eval_str(
                "(setq parent (make-sparse-keymap))
                 (define-key parent \"q\" 'quit-game)
                 (setq child (make-keymap))
                 (set-keymap-parent child parent)
                 (define-key child (kbd \"<return>\") 'drop)
                 (define-key child [left] 'move-left)
                 (list (lookup-key child \"q\") (lookup-key child \"RET\")
                       (lookup-key child [left]) (lookup-key child \"z\"))",
            )
            .unwrap();
        assert_eq!(out.to_string(), "(quit-game drop move-left nil)");
    }

    #[test]
    fn local_map_shadows_global_map() {
        let mut ev = Evaluator::new();
        ev.eval_str("(global-set-key \"n\" 'new-game) (global-set-key \"p\" 'pause)")
            .unwrap();
        ev.eval_str("(local-set-key \"n\" 'next-piece)").unwrap();
        assert_eq!(ev.eval_str("(key-binding \"n\")").unwrap(), Value::symbol("next-piece"));
        assert_eq!(ev.eval_str("(keymap-lookup nil \"p\")").unwrap(), Value::symbol("pause"));
        ev.eval_str("(use-local-map nil)").unwrap();
        assert_eq!(ev.eval_str("(key-binding \"n\")").unwrap(), Value::symbol("new-game"));
        assert_eq!(ev.eval_str("(current-local-map)").unwrap(), Value::Nil);
    }

    #[test]
    fn non_keymaps_are_rejected() {
        let mut ev = Evaluator::new();
        assert!(matches!(
            ev.eval_str("(define-key 5 \"a\" 'x)"),
            Err(EvalError::TypeMismatch(_))
        ));
        assert_eq!(ev.eval_str("(keymapp (make-sparse-keymap))").unwrap(), Value::True);
    }

    proptest! {
        #[test]
        fn full_map_agrees_with_sparse_bindings(code in 32u32..127, bind in proptest::bool::ANY) {
            let map = new_keymap(true);
            let key = char::from_u32(code).unwrap().to_string();
            let binding = if bind { Value::symbol("cmd") } else { Value::Nil };
            define_key(&map, &key, binding.clone()).unwrap();
            let km = expect_keymap(&map).unwrap();
            let km = km.borrow();
            let in_sparse = km.bindings().find(|(k, _)| **k == key).map(|(_, v)| v.clone());
            prop_assert_eq!(km.lookup_local(&key), in_sparse);
        }
    }
}
