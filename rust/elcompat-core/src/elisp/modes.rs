//! Mode and keymap definition forms.
//!
//! `define-derived-mode` and `define-minor-mode` expand into ordinary
//! interactive closures, so the mode commands they create go through the
//! same call and command paths as any user function.

use super::builtins::keymaps::{define_key, new_keymap};
use super::builtins::{expect_min_args, expect_symbol_name};
use super::env::Env;
use super::error::*;
use super::eval::{expect_form_args, symbol_name_of, Evaluator};
use super::keymap;
use super::value::*;

const PARENT_PROPERTY: &str = "derived-mode-parent";
const MENU_PROPERTY: &str = "easy-menu";

fn sym(name: &str) -> Value {
    Value::symbol(name)
}

fn quoted(value: Value) -> Value {
    Value::list(vec![sym("quote"), value])
}

fn form(items: Vec<Value>) -> Value {
    Value::list(items)
}

impl Evaluator {
    fn put_property(&mut self, symbol: &str, property: &str, value: Value) {
        let key = sym(property);
        let plist = self.plists.entry(symbol.to_string()).or_default();
        match plist.iter_mut().find(|(k, _)| eq_value(k, &key)) {
            Some((_, slot)) => *slot = value,
            None => plist.push((key, value)),
        }
    }

    fn property(&self, symbol: &str, property: &str) -> Option<Value> {
        self.plists
            .get(symbol)?
            .iter()
            .find(|(k, _)| k.is_symbol_named(property))
            .map(|(_, v)| v.clone())
    }

    /// `defvar` without an initial value check: bind `name` globally unless
    /// it already has a value, and mark it special.
    fn declare_special(&mut self, name: &str, init: impl FnOnce() -> Value) {
        self.specials.insert(name.to_string());
        if !self.globals.contains_key(name) {
            self.globals.insert(name.to_string(), init());
        }
    }
}

/// Drop leading `:keyword VALUE` pairs, returning them and the body.
fn split_keyword_args(forms: &[Value]) -> (Vec<(String, Value)>, &[Value]) {
    let mut options = Vec::new();
    let mut rest = forms;
    while let [Value::Keyword(key), value, tail @ ..] = rest {
        options.push((key.to_string(), value.clone()));
        rest = tail;
    }
    (options, rest)
}

/// `(define-derived-mode NAME PARENT MODE-NAME [DOC] [KEYWORD VAL]... BODY...)`.
pub(crate) fn sf_define_derived_mode(ev: &mut Evaluator, tail: &[Value], env: &Env) -> EvalResult {
    expect_form_args("define-derived-mode", tail, 3, None)?;
    let name = symbol_name_of(&tail[0])?;
    let parent = tail[1].clone();
    if !parent.is_nil() {
        symbol_name_of(&parent)?;
    }
    let mode_name = tail[2].clone();
    let mut rest = &tail[3..];
    if let [Value::Str(_), _, ..] = rest {
        rest = &rest[1..];
    }
    let (_options, body) = split_keyword_args(rest);

    let hook = format!("{name}-hook");
    let map = format!("{name}-map");
    ev.declare_special(&hook, || Value::Nil);
    ev.declare_special(&map, || new_keymap(false));
    if !parent.is_nil() {
        ev.put_property(&name, PARENT_PROPERTY, parent.clone());
    }

    let mut forms = vec![form(vec![sym("interactive")])];
    if !parent.is_nil() {
        forms.push(form(vec![
            sym("if"),
            form(vec![sym("fboundp"), quoted(parent.clone())]),
            form(vec![parent]),
        ]));
    }
    forms.push(form(vec![sym("setq-local"), sym("major-mode"), quoted(sym(&name))]));
    forms.push(form(vec![sym("setq-local"), sym("mode-name"), mode_name]));
    forms.push(form(vec![
        sym("if"),
        form(vec![sym("keymapp"), sym(&map)]),
        form(vec![sym("use-local-map"), sym(&map)]),
    ]));
    forms.extend(body.iter().cloned());
    forms.push(form(vec![sym("run-mode-hooks"), quoted(sym(&hook))]));

    let spec = Value::list_with_tail(vec![Value::Nil], Value::list(forms));
    let command = ev.make_closure(&spec, env, Some(name.as_str()))?;
    ev.functions.insert(name.clone(), command);
    tracing::debug!(mode = %name, "defined major mode");
    Ok(sym(&name))
}

/// `(define-minor-mode MODE DOC [KEYWORD VAL]... BODY...)`.  The command
/// toggles on a nil or `toggle` argument and otherwise enables for a
/// positive prefix value.
pub(crate) fn sf_define_minor_mode(ev: &mut Evaluator, tail: &[Value], env: &Env) -> EvalResult {
    expect_form_args("define-minor-mode", tail, 1, None)?;
    let name = symbol_name_of(&tail[0])?;
    let rest = match tail.get(1) {
        Some(Value::Str(_)) => &tail[2..],
        _ => &tail[1..],
    };
    let (options, body) = split_keyword_args(rest);
    let option = |key: &str| {
        options
            .iter()
            .find(|(k, _)| k.trim_start_matches(':') == key)
            .map(|(_, v)| v.clone())
    };
    let init = match option("init-value") {
        Some(form) => ev.eval(&form, env)?,
        None => Value::Nil,
    };
    ev.declare_special(&name, || init);
    let hook = format!("{name}-hook");
    ev.declare_special(&hook, || Value::Nil);
    if let Some(map_form) = option("keymap") {
        let map = ev.eval(&map_form, env)?;
        ev.declare_special(&format!("{name}-map"), || map);
    }

    let arg = sym("arg");
    let mode = sym(&name);
    let toggle = form(vec![
        sym("or"),
        form(vec![sym("null"), arg.clone()]),
        form(vec![sym("eq"), arg.clone(), quoted(sym("toggle"))]),
    ]);
    let new_state = form(vec![
        sym("if"),
        toggle,
        form(vec![sym("not"), mode.clone()]),
        form(vec![
            sym(">"),
            form(vec![sym("prefix-numeric-value"), arg.clone()]),
            Value::Int(0),
        ]),
    ]);
    let mut forms = vec![
        form(vec![sym("interactive")]),
        form(vec![sym("setq"), mode.clone(), new_state]),
    ];
    forms.extend(body.iter().cloned());
    forms.push(form(vec![sym("run-hooks"), quoted(sym(&hook))]));
    forms.push(mode);

    let params = Value::list(vec![sym("&optional"), arg]);
    let spec = Value::list_with_tail(vec![params], Value::list(forms));
    let command = ev.make_closure(&spec, env, Some(name.as_str()))?;
    ev.functions.insert(name.clone(), command);
    tracing::debug!(mode = %name, "defined minor mode");
    Ok(sym(&name))
}

/// `(defvar-keymap NAME [:full BOOL] [:parent MAP] [KEYWORD VAL]... KEY DEF...)`.
/// Keys are evaluated; string keys use `kbd` syntax.
pub(crate) fn sf_defvar_keymap(ev: &mut Evaluator, tail: &[Value], env: &Env) -> EvalResult {
    expect_form_args("defvar-keymap", tail, 1, None)?;
    let name = symbol_name_of(&tail[0])?;
    let (options, pairs) = split_keyword_args(&tail[1..]);
    let mut full = false;
    let mut parent = None;
    for (key, value) in &options {
        match key.trim_start_matches(':') {
            "full" => full = ev.eval(value, env)?.is_truthy(),
            "parent" => parent = Some(ev.eval(value, env)?),
            _ => {}
        }
    }
    if pairs.len() % 2 != 0 {
        return Err(error_message(format!("defvar-keymap {name}: odd number of key/definition forms")));
    }
    let map = new_keymap(full);
    if let (Some(parent), Value::Keymap(km)) = (parent, &map) {
        if !parent.is_nil() {
            km.borrow_mut().set_parent(Some(parent));
        }
    }
    for pair in pairs.chunks(2) {
        let key = ev.eval(&pair[0], env)?;
        let key = match &key {
            Value::Str(desc) => keymap::kbd(desc),
            other => keymap::key_spec(other).ok_or_else(|| wrong_type("arrayp", other))?,
        };
        let definition = ev.eval(&pair[1], env)?;
        define_key(&map, &key, definition)?;
    }
    ev.declare_special(&name, || map);
    Ok(sym(&name))
}

/// `(easy-menu-define SYMBOL MAPS DOC MENU)`: the menu is recorded on
/// SYMBOL and never displayed.
pub(crate) fn sf_easy_menu_define(ev: &mut Evaluator, tail: &[Value], env: &Env) -> EvalResult {
    expect_form_args("easy-menu-define", tail, 4, None)?;
    let name = symbol_name_of(&tail[0])?;
    ev.eval(&tail[1], env)?;
    let menu = ev.eval(&tail[3], env)?;
    ev.put_property(&name, MENU_PROPERTY, menu.clone());
    ev.declare_special(&name, || menu);
    Ok(Value::Nil)
}

/// `(derived-mode-p MODE...)`: the first MODE the current major mode is,
/// or derives from.
pub(crate) fn builtin_derived_mode_p(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("derived-mode-p", &args, 1)?;
    let wanted = if args.len() == 1 && args[0].is_cons() {
        list_to_vec(&args[0]).unwrap_or_default()
    } else {
        args
    };
    let wanted = wanted
        .iter()
        .map(expect_symbol_name)
        .collect::<Result<Vec<_>, _>>()?;
    let env = eval.toplevel_env();
    let mut current = eval
        .lookup_variable("major-mode", &env)
        .and_then(|mode| mode.as_symbol_name().map(str::to_string));
    let mut depth = 0;
    while let Some(mode) = current {
        if let Some(hit) = wanted.iter().find(|w| **w == mode) {
            return Ok(sym(hit));
        }
        depth += 1;
        if depth > 64 {
            break;
        }
        current = eval
            .property(&mode, PARENT_PROPERTY)
            .and_then(|parent| parent.as_symbol_name().map(str::to_string));
    }
    Ok(Value::Nil)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAKE: &str = r#"
        (defvar snake-started nil)
        (defvar-keymap snake-mode-map
          :full t
          "<left>" #'snake-left
          "q" 'snake-quit)
        (define-derived-mode snake-mode special-mode "Snake"
          "Play snake."
          :group 'snake
          (setq snake-started t))
        (defvar hooked 0)
        (add-hook 'snake-mode-hook (lambda () (setq hooked (1+ hooked))))
    "#;

    #[test]
    fn derived_mode_command_sets_up_buffer() {
        let mut ev = Evaluator::new();
        ev.eval_str(SNAKE).unwrap();
        ev.eval_str("(snake-mode)").unwrap();
        let out = ev
            .eval_str("(list major-mode mode-name snake-started hooked (eq (current-local-map) snake-mode-map))")
            .unwrap();
        assert_eq!(out.to_string(), "(snake-mode \"Snake\" t 1 t)");
        assert_eq!(ev.eval_str("(commandp 'snake-mode)").unwrap(), Value::True);
    }

    #[test]
    fn defvar_keymap_binds_kbd_keys() {
        let mut ev = Evaluator::new();
        ev.eval_str(SNAKE).unwrap();
        let out = ev
            .eval_str("(list (lookup-key snake-mode-map (kbd \"<left>\")) (lookup-key snake-mode-map \"q\"))")
            .unwrap();
        assert_eq!(out.to_string(), "(snake-left snake-quit)");
        let Some(Value::Keymap(map)) = ev.global_value("snake-mode-map") else {
            panic!("snake-mode-map is not a keymap");
        };
        assert!(map.borrow().is_full());
    }

    #[test]
    fn derived_mode_p_follows_parents() {
        let mut ev = Evaluator::new();
        ev.eval_str(SNAKE).unwrap();
        ev.eval_str("(define-derived-mode tail-mode snake-mode \"Tail\")").unwrap();
        ev.eval_str("(tail-mode)").unwrap();
        let out = ev
            .eval_str("(list (derived-mode-p 'snake-mode) (derived-mode-p '(special-mode)) (derived-mode-p 'text-mode))")
            .unwrap();
        assert_eq!(out.to_string(), "(snake-mode special-mode nil)");
        assert_eq!(ev.eval_str("hooked").unwrap(), Value::Int(1));
    }

    #[test]
    fn minor_mode_toggles() {
        let mut ev = Evaluator::new();
        ev.eval_str(
            "(defvar turns 0)
             (define-minor-mode pause-mode \"Pause.\" :init-value nil
               (setq turns (1+ turns)))",
        )
        .unwrap();
        let out = ev
            .eval_str("(list (pause-mode) pause-mode (pause-mode 'toggle) (pause-mode 1) (pause-mode -1) turns)")
            .unwrap();
        assert_eq!(out.to_string(), "(t t nil t nil 4)");
    }

    #[test]
    fn easy_menu_is_recorded() {
        let mut ev = Evaluator::new();
        ev.eval_str("(defvar m (make-sparse-keymap)) (easy-menu-define snake-menu m \"Menu\" '(\"Snake\" [\"New\" snake-start]))")
            .unwrap();
        assert_eq!(ev.eval_str("(car snake-menu)").unwrap(), Value::string("Snake"));
        assert_eq!(
            ev.eval_str("(car (get 'snake-menu 'easy-menu))").unwrap(),
            Value::string("Snake")
        );
    }
}
