//! Evaluator: special forms, macros, function calls and variable scoping.
//!
//! Forms are evaluated directly as [`Value`]s.  Ordinary variables are bound
//! lexically in [`Env`] frames; names declared with `defvar` and friends are
//! special and bound dynamically by saving and restoring their global (or
//! buffer-local) value.  Functions live in a separate function-cell table.

use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::builtins;
use super::conditions::ConditionRegistry;
use super::env::Env;
use super::error::*;
use super::gamegrid::GameGrid;
use super::keymap::Keymap;
use super::load::{FsLoader, SourceLoader, BUILTIN_FEATURES};
use super::print::print_value;
use super::reader;
use super::regex::{MatchData, RegexCache};
use super::timer::TimerManager;
use super::value::*;
use crate::buffer::{BufferId, BufferManager};
use crate::config::RuntimeConfig;

use std::cell::RefCell;
use std::rc::Rc;

/// Symbols that name themselves and cannot be assigned.
fn is_constant_symbol(name: &str) -> bool {
    name == "nil" || name == "t" || name.starts_with(':')
}

/// Where a dynamic binding was made, so it can be undone.
enum DynSlot {
    Global,
    Local(BufferId),
}

pub(crate) struct SavedBinding {
    name: String,
    slot: DynSlot,
    old: Option<Value>,
}

/// The interpreter state.
pub struct Evaluator {
    /// Global value cells.
    pub(crate) globals: HashMap<String, Value>,
    /// Function cells.
    pub(crate) functions: HashMap<String, Value>,
    /// Names bound dynamically by `let` and lambda parameters.
    pub(crate) specials: HashSet<String>,
    /// Names that become buffer-local whenever set (`defvar-local`).
    pub(crate) auto_local: HashSet<String>,
    /// Symbol property lists.
    pub(crate) plists: HashMap<String, Vec<(Value, Value)>>,
    pub(crate) features: Vec<String>,
    /// Features whose `require` is in progress.
    pub(crate) loading: Vec<String>,
    pub(crate) buffers: BufferManager,
    pub(crate) match_data: Option<MatchData>,
    pub(crate) regexes: RegexCache,
    pub(crate) conditions: ConditionRegistry,
    pub(crate) timers: TimerManager,
    pub(crate) global_map: Value,
    /// Everything passed to `message`, oldest first.
    pub(crate) messages: Vec<String>,
    /// Text written by `princ`/`prin1`/`print` to standard output.
    pub(crate) output: String,
    pub(crate) config: RuntimeConfig,
    pub(crate) loader: Box<dyn SourceLoader>,
    pub(crate) gamegrid: GameGrid,
    /// Keys of compatibility warnings already logged once.
    pub(crate) warned: HashSet<String>,
    pub(crate) rng: StdRng,
    pub(crate) symbol_counter: u64,
    pub(crate) temp_counter: u64,
    toplevel: Env,
    depth: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_loader(config, Box::new(FsLoader))
    }

    pub fn with_loader(config: RuntimeConfig, loader: Box<dyn SourceLoader>) -> Self {
        let mut ev = Self {
            globals: HashMap::new(),
            functions: HashMap::new(),
            specials: HashSet::new(),
            auto_local: HashSet::new(),
            plists: HashMap::new(),
            features: BUILTIN_FEATURES.iter().map(|f| f.to_string()).collect(),
            loading: Vec::new(),
            buffers: BufferManager::new(),
            match_data: None,
            regexes: RegexCache::new(),
            conditions: ConditionRegistry::new(),
            timers: TimerManager::new(),
            global_map: Value::Keymap(Rc::new(RefCell::new(Keymap::full()))),
            messages: Vec::new(),
            output: String::new(),
            config,
            loader,
            gamegrid: GameGrid::default(),
            warned: HashSet::new(),
            rng: StdRng::from_os_rng(),
            symbol_counter: 0,
            temp_counter: 0,
            toplevel: Env::root(),
            depth: 0,
        };
        ev.install_standard_variables();
        ev
    }

    fn install_standard_variables(&mut self) {
        let load_path = Value::list(
            self.config
                .load_path
                .iter()
                .map(|p| Value::string(p.to_string_lossy().into_owned()))
                .collect(),
        );
        let defaults = [
            ("load-path", load_path),
            ("case-fold-search", Value::Nil),
            ("this-command", Value::Nil),
            ("last-command", Value::Nil),
            ("last-command-event", Value::Nil),
            ("current-prefix-arg", Value::Nil),
            ("unread-command-events", Value::Nil),
            ("inhibit-read-only", Value::Nil),
            ("buffer-read-only", Value::Nil),
            ("truncate-lines", Value::Nil),
            ("indent-tabs-mode", Value::Nil),
            ("cursor-type", Value::True),
            ("fill-column", Value::Int(70)),
            ("tab-width", Value::Int(8)),
            ("major-mode", Value::symbol("fundamental-mode")),
            ("mode-name", Value::string("Fundamental")),
            ("mode-line-format", Value::Nil),
            ("noninteractive", Value::Nil),
            ("window-system", Value::Nil),
            ("emacs-major-version", Value::Int(29)),
            ("emacs-minor-version", Value::Int(1)),
            ("emacs-version", Value::string("29.1")),
            ("system-type", Value::symbol("gnu/linux")),
            ("most-positive-fixnum", Value::Int(i64::MAX)),
            ("most-negative-fixnum", Value::Int(i64::MIN)),
            ("max-lisp-eval-depth", Value::Int(self.config.max_lisp_eval_depth as i64)),
            ("gamegrid-user-score-file-directory", Value::Nil),
        ];
        for (name, value) in defaults {
            self.specials.insert(name.to_string());
            self.globals.insert(name.to_string(), value);
        }
    }

    // -----------------------------------------------------------------------
    // Public entry points
    // -----------------------------------------------------------------------

    /// Preprocess, read and evaluate `source`; returns the last form's value.
    #[tracing::instrument(level = "debug", skip_all, fields(len = source.len()))]
    pub fn eval_str(&mut self, source: &str) -> Result<Value, EvalError> {
        let forms = reader::read_source(source)?;
        let mut last = Value::Nil;
        for form in &forms {
            last = self.eval_toplevel(form)?;
        }
        Ok(last)
    }

    /// Evaluate one already-read form at top level.
    pub fn eval_value(&mut self, form: &Value) -> Result<Value, EvalError> {
        self.eval_toplevel(form).map_err(EvalError::from)
    }

    pub(crate) fn eval_toplevel(&mut self, form: &Value) -> EvalResult {
        let env = self.toplevel.clone();
        self.eval(form, &env)
    }

    /// Call a function value (or function name) with evaluated arguments.
    pub fn funcall(&mut self, function: Value, args: Vec<Value>) -> Result<Value, EvalError> {
        self.apply(function, args).map_err(EvalError::from)
    }

    pub fn global_value(&self, name: &str) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Drain what the program printed to standard output so far.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub fn buffers(&self) -> &BufferManager {
        &self.buffers
    }

    pub fn buffers_mut(&mut self) -> &mut BufferManager {
        &mut self.buffers
    }

    pub fn timers(&self) -> &TimerManager {
        &self.timers
    }

    pub fn match_data(&self) -> Option<&MatchData> {
        self.match_data.as_ref()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// `prin1` representation, resolving buffer names.
    pub fn prin1(&self, value: &Value) -> String {
        print_value(value, true, &self.buffers)
    }

    pub fn princ(&self, value: &Value) -> String {
        print_value(value, false, &self.buffers)
    }

    /// Log `message` at warn level the first time `key` is seen.
    pub(crate) fn warn_once(&mut self, key: &str, message: &str) {
        if self.warned.insert(key.to_string()) {
            tracing::warn!("{message}");
        }
    }

    // -----------------------------------------------------------------------
    // Core eval
    // -----------------------------------------------------------------------

    pub(crate) fn eval(&mut self, form: &Value, env: &Env) -> EvalResult {
        self.depth += 1;
        if self.depth > self.config.max_lisp_eval_depth {
            self.depth -= 1;
            return Err(signal(
                "excessive-lisp-nesting",
                vec![Value::Int(self.config.max_lisp_eval_depth as i64)],
            ));
        }
        let result = self.eval_inner(form, env);
        self.depth -= 1;
        result
    }

    fn eval_inner(&mut self, form: &Value, env: &Env) -> EvalResult {
        match form {
            Value::Symbol(name) => self.eval_symbol(name, env),
            Value::Cons(_) => self.eval_list(form, env),
            other => Ok(other.clone()),
        }
    }

    fn eval_symbol(&self, name: &str, env: &Env) -> EvalResult {
        self.lookup_variable(name, env)
            .ok_or_else(|| signal("void-variable", vec![Value::symbol(name)]))
    }

    pub(crate) fn eval_body(&mut self, body: &[Value], env: &Env) -> EvalResult {
        let mut last = Value::Nil;
        for form in body {
            last = self.eval(form, env)?;
        }
        Ok(last)
    }

    fn eval_args(&mut self, forms: &[Value], env: &Env) -> Result<Vec<Value>, Flow> {
        forms.iter().map(|form| self.eval(form, env)).collect()
    }

    fn eval_list(&mut self, form: &Value, env: &Env) -> EvalResult {
        let head = form.cons_car();
        let rest = form.cons_cdr();
        let tail = list_to_vec(&rest).ok_or_else(|| wrong_type("listp", &rest))?;

        match &head {
            Value::Symbol(name) => {
                let name = name.clone();
                if self.functions.contains_key(&*name) {
                    return match self.indirect_function(&name) {
                        Some(Value::Macro(data)) => {
                            let expansion = self.apply_lambda(&data, tail)?;
                            self.eval(&expansion, env)
                        }
                        Some(function) => {
                            let args = self.eval_args(&tail, env)?;
                            self.apply(function, args)
                        }
                        None => Err(Flow::Unimplemented(name.to_string())),
                    };
                }
                if let Some(result) = self.try_special_form(&name, &tail, env) {
                    return result;
                }
                if !builtins::is_builtin(&name) {
                    return Err(Flow::Unimplemented(name.to_string()));
                }
                let args = self.eval_args(&tail, env)?;
                self.call_builtin(&name, args)
            }
            Value::Cons(_) if head.cons_car().is_symbol_named("lambda") => {
                let function = self.make_closure(&head.cons_cdr(), env, None)?;
                let args = self.eval_args(&tail, env)?;
                self.apply(function, args)
            }
            other => Err(signal("invalid-function", vec![other.clone()])),
        }
    }

    /// Follow function-cell aliases from `name`.  Builtins resolve to a
    /// `Subr`; `None` means nothing is bound.
    pub(crate) fn indirect_function(&self, name: &str) -> Option<Value> {
        let mut current = name.to_string();
        for _ in 0..32 {
            match self.functions.get(&current) {
                Some(Value::Symbol(next)) => current = next.to_string(),
                Some(value) => return Some(value.clone()),
                None => {
                    return builtins::is_builtin(&current).then(|| Value::subr(&current));
                }
            }
        }
        None
    }

    /// Whether `name` can be called (function cell, builtin or special form).
    pub(crate) fn is_fbound(&self, name: &str) -> bool {
        self.functions.contains_key(name) || builtins::is_builtin(name) || is_special_form(name)
    }

    pub(crate) fn call_builtin(&mut self, name: &str, args: Vec<Value>) -> EvalResult {
        builtins::dispatch_builtin(self, name, args)
            .unwrap_or_else(|| Err(Flow::Unimplemented(name.to_string())))
    }

    // -----------------------------------------------------------------------
    // Function application
    // -----------------------------------------------------------------------

    pub(crate) fn apply(&mut self, function: Value, args: Vec<Value>) -> EvalResult {
        match &function {
            Value::Lambda(data) => self.apply_lambda(data, args),
            Value::Subr(name) => self.call_builtin(name, args),
            Value::Nil => Err(signal("void-function", vec![Value::Nil])),
            Value::Symbol(name) | Value::Keyword(name) => match self.indirect_function(name) {
                Some(Value::Macro(_)) => Err(signal("invalid-function", vec![function.clone()])),
                Some(resolved) => self.apply(resolved, args),
                None => Err(Flow::Unimplemented(name.to_string())),
            },
            Value::True => Err(Flow::Unimplemented("t".to_string())),
            Value::Cons(_) if function.cons_car().is_symbol_named("lambda") => {
                let env = self.toplevel.clone();
                let closure = self.make_closure(&function.cons_cdr(), &env, None)?;
                self.apply(closure, args)
            }
            Value::Macro(_) => Err(signal("invalid-function", vec![function.clone()])),
            other => Err(wrong_type("functionp", other)),
        }
    }

    pub(crate) fn apply_lambda(&mut self, data: &LambdaData, args: Vec<Value>) -> EvalResult {
        let params = &data.params;
        let received = args.len();
        if received < params.min_arity() || params.max_arity().is_some_and(|max| received > max) {
            return Err(ArityError::new(
                data.name.as_deref(),
                params.min_arity(),
                params.max_arity(),
                received,
            )
            .into());
        }

        let base = data.env.clone().unwrap_or_else(|| self.toplevel.clone());
        let env = base.child();
        let mut dynamic = Vec::new();
        let mut values = args.into_iter();
        let mut bind = |ev: &Self, name: &str, value: Value| {
            if ev.specials.contains(name) {
                dynamic.push((name.to_string(), value));
            } else {
                env.define(name, value);
            }
        };
        for name in &params.required {
            bind(self, name, values.next().unwrap_or(Value::Nil));
        }
        for name in &params.optional {
            bind(self, name, values.next().unwrap_or(Value::Nil));
        }
        if let Some(rest) = &params.rest {
            bind(self, rest, Value::list(values.collect()));
        }
        self.with_dynamic(dynamic, |ev| ev.eval_body(&data.body, &env))
    }

    /// Build a closure from `(ARGS . BODY)`.
    pub(crate) fn make_closure(&mut self, spec: &Value, env: &Env, name: Option<&str>) -> EvalResult {
        Ok(Value::make_lambda(self.lambda_data(spec, env, name)?))
    }

    pub(crate) fn lambda_data(&mut self, spec: &Value, env: &Env, name: Option<&str>) -> Result<LambdaData, Flow> {
        let params = parse_params(&spec.cons_car())?;
        let rest = spec.cons_cdr();
        let mut body = list_to_vec(&rest).ok_or_else(|| wrong_type("listp", &rest))?;
        let docstring = match body.first() {
            Some(Value::Str(doc)) if body.len() > 1 => {
                let doc = doc.to_string();
                body.remove(0);
                Some(doc)
            }
            _ => None,
        };
        body.retain(|form| !form.cons_car().is_symbol_named("declare"));
        Ok(LambdaData {
            params,
            body,
            env: Some(env.clone()),
            docstring,
            name: name.map(str::to_string),
        })
    }

    /// One step of macro expansion.  Returns the form unchanged (and false)
    /// when its head is not a macro.
    pub(crate) fn macroexpand_1(&mut self, form: &Value) -> Result<(Value, bool), Flow> {
        let Some(name) = form.cons_car().as_symbol_name().map(str::to_string) else {
            return Ok((form.clone(), false));
        };
        let Some(Value::Macro(data)) = self.functions.contains_key(&name).then(|| self.indirect_function(&name)).flatten() else {
            return Ok((form.clone(), false));
        };
        let rest = form.cons_cdr();
        let args = list_to_vec(&rest).ok_or_else(|| wrong_type("listp", &rest))?;
        Ok((self.apply_lambda(&data, args)?, true))
    }

    // -----------------------------------------------------------------------
    // Variables
    // -----------------------------------------------------------------------

    pub(crate) fn lookup_variable(&self, name: &str, env: &Env) -> Option<Value> {
        if !self.specials.contains(name) {
            if let Some(value) = env.lookup(name) {
                return Some(value);
            }
        }
        if let Some(value) = self
            .buffers
            .current_buffer()
            .and_then(|buf| buf.get_buffer_local(name))
        {
            return Some(value.clone());
        }
        self.globals.get(name).cloned()
    }

    /// Assign like `setq`: the nearest lexical binding, else the current
    /// buffer's local value, else the global value.
    pub(crate) fn set_variable(&mut self, name: &str, value: Value, env: &Env) -> Result<(), Flow> {
        if is_constant_symbol(name) {
            return Err(signal("setting-constant", vec![Value::symbol(name)]));
        }
        if !self.specials.contains(name) && env.set_existing(name, value.clone()) {
            return Ok(());
        }
        let auto_local = self.auto_local.contains(name);
        let buf = self.buffers.current_buffer_mut();
        if auto_local || buf.has_buffer_local(name) {
            buf.set_buffer_local(name, value);
        } else {
            self.globals.insert(name.to_string(), value);
        }
        Ok(())
    }

    /// Bind a special variable, returning what is needed to undo it.
    pub(crate) fn push_dynamic(&mut self, name: String, value: Value) -> SavedBinding {
        let local = self
            .buffers
            .current_buffer()
            .filter(|buf| buf.has_buffer_local(&name))
            .map(|buf| buf.id);
        match local {
            Some(id) => {
                let old = self.buffers.get_mut(id).and_then(|buf| {
                    let old = buf.get_buffer_local(&name).cloned();
                    buf.set_buffer_local(&name, value);
                    old
                });
                SavedBinding {
                    name,
                    slot: DynSlot::Local(id),
                    old,
                }
            }
            None => {
                let old = self.globals.insert(name.clone(), value);
                SavedBinding {
                    name,
                    slot: DynSlot::Global,
                    old,
                }
            }
        }
    }

    pub(crate) fn pop_dynamic(&mut self, saved: Vec<SavedBinding>) {
        for binding in saved.into_iter().rev() {
            match binding.slot {
                DynSlot::Global => match binding.old {
                    Some(old) => {
                        self.globals.insert(binding.name, old);
                    }
                    None => {
                        self.globals.remove(&binding.name);
                    }
                },
                DynSlot::Local(id) => {
                    if let (Some(buf), Some(old)) = (self.buffers.get_mut(id), binding.old) {
                        buf.set_buffer_local(&binding.name, old);
                    }
                }
            }
        }
    }

    /// Run `f` with special variables temporarily bound; the old values are
    /// restored whatever `f` returns.
    pub(crate) fn with_dynamic(
        &mut self,
        bindings: Vec<(String, Value)>,
        f: impl FnOnce(&mut Self) -> EvalResult,
    ) -> EvalResult {
        let saved: Vec<SavedBinding> = bindings
            .into_iter()
            .map(|(name, value)| self.push_dynamic(name, value))
            .collect();
        let result = f(self);
        self.pop_dynamic(saved);
        result
    }

    /// Run `f` with `target` (if any) as the current buffer, restoring the
    /// previous current buffer on every exit path.
    pub(crate) fn with_buffer(
        &mut self,
        target: Option<BufferId>,
        f: impl FnOnce(&mut Self) -> EvalResult,
    ) -> EvalResult {
        let saved = self.buffers.current_id();
        if let Some(id) = target {
            self.buffers.set_current(id);
        }
        let result = f(self);
        if self.buffers.is_live(saved) {
            self.buffers.set_current(saved);
        }
        result
    }

    // -----------------------------------------------------------------------
    // Special forms
    // -----------------------------------------------------------------------

    fn try_special_form(&mut self, name: &str, tail: &[Value], env: &Env) -> Option<EvalResult> {
        Some(match name {
            "quote" => self.sf_quote(tail),
            "function" => self.sf_function(tail, env),
            "`" => self.sf_backquote(tail, env),
            "vector-literal" => Ok(Value::vector(tail.iter().map(materialize_literal).collect())),
            "setq" => self.sf_setq(tail, env),
            "setq-local" => self.sf_setq_local(tail, env),
            "setq-default" => self.sf_setq_default(tail, env),
            "if" => self.sf_if(tail, env),
            "when" => self.sf_when(tail, env, true),
            "unless" => self.sf_when(tail, env, false),
            "cond" => self.sf_cond(tail, env),
            "and" => self.sf_and(tail, env),
            "or" => self.sf_or(tail, env),
            "while" => self.sf_while(tail, env),
            "progn" | "save-restriction" | "eval-when-compile" | "eval-and-compile"
            | "with-no-warnings" | "with-silent-modifications" | "combine-after-change-calls" => {
                self.eval_body(tail, env)
            }
            "prog1" => self.sf_prog1(tail, env),
            "prog2" => self.sf_prog2(tail, env),
            "lambda" => self.make_closure(&Value::list(tail.to_vec()), env, None),
            "let" => self.sf_let(tail, env),
            "let*" => self.sf_let_star(tail, env),
            "catch" => self.sf_catch(tail, env),
            "unwind-protect" => self.sf_unwind_protect(tail, env),
            "condition-case" => self.sf_condition_case(tail, env),
            "ignore-errors" => self.sf_ignore_errors(tail, env),
            "dotimes" => self.sf_dotimes(tail, env),
            "dolist" => self.sf_dolist(tail, env),
            "defun" | "defsubst" | "cl-defun" => self.sf_defun(tail, env, false),
            "defmacro" | "cl-defmacro" => self.sf_defun(tail, env, true),
            "defvar" | "defcustom" => self.sf_defvar(tail, env, false),
            "defconst" => self.sf_defvar(tail, env, true),
            "defvar-local" => self.sf_defvar_local(tail, env),
            "defalias" => self.sf_defalias(tail, env),
            "defface" => self.sf_defface(tail),
            "defgroup" | "declare-function" | "declare" | "interactive" => Ok(Value::Nil),
            "cl-case" | "case" => self.sf_cl_case(tail, env),
            "cl-assert" => self.sf_cl_assert(tail, env),
            "save-excursion" | "save-mark-and-excursion" => self.sf_save_excursion(tail, env),
            "save-current-buffer" => self.with_buffer(None, |ev| ev.eval_body(tail, env)),
            "with-current-buffer" => self.sf_with_current_buffer(tail, env),
            "with-temp-buffer" => self.sf_with_temp_buffer(tail, env),
            "save-match-data" => self.sf_save_match_data(tail, env),
            "save-window-excursion" => self.sf_save_window_excursion(tail, env),
            "save-selected-window" => self.sf_save_selected_window(tail, env),
            "pcase" => super::pcase::sf_pcase(self, tail, env),
            "cl-loop" => super::cl_loop::sf_cl_loop(self, tail, env),
            "setf" => super::places::sf_setf(self, tail, env),
            "push" => super::places::sf_push(self, tail, env),
            "pop" => super::places::sf_pop(self, tail, env),
            "incf" | "cl-incf" => super::places::sf_incf(self, tail, env, 1),
            "decf" | "cl-decf" => super::places::sf_incf(self, tail, env, -1),
            "cl-rotatef" => super::places::sf_rotatef(self, tail, env),
            "define-derived-mode" => super::modes::sf_define_derived_mode(self, tail, env),
            "define-minor-mode" => super::modes::sf_define_minor_mode(self, tail, env),
            "defvar-keymap" => super::modes::sf_defvar_keymap(self, tail, env),
            "easy-menu-define" => super::modes::sf_easy_menu_define(self, tail, env),
            _ => return None,
        })
    }

    fn sf_quote(&mut self, tail: &[Value]) -> EvalResult {
        expect_form_args("quote", tail, 1, Some(1))?;
        Ok(materialize_literal(&tail[0]))
    }

    fn sf_function(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        expect_form_args("function", tail, 1, Some(1))?;
        let arg = &tail[0];
        if arg.cons_car().is_symbol_named("lambda") {
            self.make_closure(&arg.cons_cdr(), env, None)
        } else {
            Ok(arg.clone())
        }
    }

    fn sf_backquote(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        expect_form_args("`", tail, 1, Some(1))?;
        self.backquote(&tail[0], env, 1)
    }

    fn backquote(&mut self, template: &Value, env: &Env, depth: usize) -> EvalResult {
        match template {
            Value::Cons(_) => {
                let head = template.cons_car();
                let arg = template.cons_cdr().cons_car();
                if head.is_symbol_named(",") || head.is_symbol_named(",@") {
                    if depth == 1 {
                        return self.eval(&arg, env);
                    }
                    let inner = self.backquote(&arg, env, depth - 1)?;
                    return Ok(Value::list(vec![head, inner]));
                }
                if head.is_symbol_named("`") {
                    let inner = self.backquote(&arg, env, depth + 1)?;
                    return Ok(Value::list(vec![head, inner]));
                }
                if head.is_symbol_named("vector-literal") {
                    let expanded = self.backquote(&template.cons_cdr(), env, depth)?;
                    return Ok(Value::vector(list_to_vec(&expanded).unwrap_or_default()));
                }

                let mut items = Vec::new();
                let mut tail = Value::Nil;
                let mut cursor = template.clone();
                let mut first = true;
                loop {
                    match &cursor {
                        Value::Cons(_) => {
                            // `(a . ,b)` reads as `(a \, b)`.
                            if !first && cursor.cons_car().is_symbol_named(",") {
                                tail = self.backquote(&cursor, env, depth)?;
                                break;
                            }
                            let item = cursor.cons_car();
                            if depth == 1 && item.cons_car().is_symbol_named(",@") {
                                let spliced = self.eval(&item.cons_cdr().cons_car(), env)?;
                                items.extend(sequence_items(&spliced)?);
                            } else {
                                items.push(self.backquote(&item, env, depth)?);
                            }
                            cursor = cursor.cons_cdr();
                            first = false;
                        }
                        Value::Nil => break,
                        other => {
                            tail = other.clone();
                            break;
                        }
                    }
                }
                Ok(Value::list_with_tail(items, tail))
            }
            Value::Vector(items) => {
                let as_list = Value::list(items.borrow().clone());
                let expanded = self.backquote(&as_list, env, depth)?;
                Ok(Value::vector(list_to_vec(&expanded).unwrap_or_default()))
            }
            other => Ok(other.clone()),
        }
    }

    fn sf_setq(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        if tail.len() % 2 != 0 {
            return Err(ArityError::new(Some("setq"), tail.len() + 1, None, tail.len()).into());
        }
        let mut last = Value::Nil;
        for pair in tail.chunks(2) {
            let name = symbol_name_of(&pair[0])?;
            last = self.eval(&pair[1], env)?;
            self.set_variable(&name, last.clone(), env)?;
        }
        Ok(last)
    }

    fn sf_setq_local(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        if tail.len() % 2 != 0 {
            return Err(ArityError::new(Some("setq-local"), tail.len() + 1, None, tail.len()).into());
        }
        let mut last = Value::Nil;
        for pair in tail.chunks(2) {
            let name = symbol_name_of(&pair[0])?;
            last = self.eval(&pair[1], env)?;
            self.buffers
                .current_buffer_mut()
                .set_buffer_local(&name, last.clone());
        }
        Ok(last)
    }

    fn sf_setq_default(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        if tail.len() % 2 != 0 {
            return Err(ArityError::new(Some("setq-default"), tail.len() + 1, None, tail.len()).into());
        }
        let mut last = Value::Nil;
        for pair in tail.chunks(2) {
            let name = symbol_name_of(&pair[0])?;
            last = self.eval(&pair[1], env)?;
            self.globals.insert(name, last.clone());
        }
        Ok(last)
    }

    fn sf_if(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        expect_form_args("if", tail, 2, None)?;
        if self.eval(&tail[0], env)?.is_truthy() {
            self.eval(&tail[1], env)
        } else {
            self.eval_body(&tail[2..], env)
        }
    }

    fn sf_when(&mut self, tail: &[Value], env: &Env, when: bool) -> EvalResult {
        expect_form_args(if when { "when" } else { "unless" }, tail, 1, None)?;
        if self.eval(&tail[0], env)?.is_truthy() == when {
            self.eval_body(&tail[1..], env)
        } else {
            Ok(Value::Nil)
        }
    }

    fn sf_cond(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        for clause in tail {
            let items = list_to_vec(clause).ok_or_else(|| wrong_type("listp", clause))?;
            let Some(test) = items.first() else {
                continue;
            };
            let value = self.eval(test, env)?;
            if value.is_truthy() {
                return if items.len() == 1 {
                    Ok(value)
                } else {
                    self.eval_body(&items[1..], env)
                };
            }
        }
        Ok(Value::Nil)
    }

    fn sf_and(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        let mut last = Value::True;
        for form in tail {
            last = self.eval(form, env)?;
            if last.is_nil() {
                return Ok(Value::Nil);
            }
        }
        Ok(last)
    }

    fn sf_or(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        for form in tail {
            let value = self.eval(form, env)?;
            if value.is_truthy() {
                return Ok(value);
            }
        }
        Ok(Value::Nil)
    }

    fn sf_while(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        expect_form_args("while", tail, 1, None)?;
        while self.eval(&tail[0], env)?.is_truthy() {
            self.eval_body(&tail[1..], env)?;
        }
        Ok(Value::Nil)
    }

    fn sf_prog1(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        expect_form_args("prog1", tail, 1, None)?;
        let first = self.eval(&tail[0], env)?;
        self.eval_body(&tail[1..], env)?;
        Ok(first)
    }

    fn sf_prog2(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        expect_form_args("prog2", tail, 2, None)?;
        self.eval(&tail[0], env)?;
        let second = self.eval(&tail[1], env)?;
        self.eval_body(&tail[2..], env)?;
        Ok(second)
    }

    fn sf_let(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        expect_form_args("let", tail, 1, None)?;
        let mut lexical = Vec::new();
        let mut dynamic = Vec::new();
        for (name, init) in parse_let_bindings(&tail[0])? {
            // Every initializer sees the outer environment only.
            let value = match init {
                Some(form) => self.eval(&form, env)?,
                None => Value::Nil,
            };
            if self.specials.contains(&name) {
                dynamic.push((name, value));
            } else {
                lexical.push((name, value));
            }
        }
        let inner = env.child_with(lexical);
        self.with_dynamic(dynamic, |ev| ev.eval_body(&tail[1..], &inner))
    }

    fn sf_let_star(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        expect_form_args("let*", tail, 1, None)?;
        let bindings = parse_let_bindings(&tail[0])?;
        let inner = env.child();
        let mut saved = Vec::new();
        let result = self.let_star_bind(bindings, &tail[1..], &inner, &mut saved);
        self.pop_dynamic(saved);
        result
    }

    fn let_star_bind(
        &mut self,
        bindings: Vec<(String, Option<Value>)>,
        body: &[Value],
        inner: &Env,
        saved: &mut Vec<SavedBinding>,
    ) -> EvalResult {
        for (name, init) in bindings {
            let value = match init {
                Some(form) => self.eval(&form, inner)?,
                None => Value::Nil,
            };
            if self.specials.contains(&name) {
                saved.push(self.push_dynamic(name, value));
            } else {
                inner.define(&name, value);
            }
        }
        self.eval_body(body, inner)
    }

    fn sf_catch(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        expect_form_args("catch", tail, 1, None)?;
        let tag = self.eval(&tail[0], env)?;
        match self.eval_body(&tail[1..], env) {
            Err(Flow::Throw { tag: thrown, value }) if catch_tag_matches(&tag, &thrown) => Ok(value),
            other => other,
        }
    }

    fn sf_unwind_protect(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        expect_form_args("unwind-protect", tail, 1, None)?;
        let primary = self.eval(&tail[0], env);
        let cleanup = self.eval_body(&tail[1..], env);
        match (primary, cleanup) {
            (Err(flow), _) => Err(flow),
            (Ok(_), Err(flow)) => Err(flow),
            (Ok(value), Ok(_)) => Ok(value),
        }
    }

    fn sf_condition_case(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        expect_form_args("condition-case", tail, 2, None)?;
        let var = symbol_name_of(&tail[0])?;
        let handlers = &tail[2..];
        for handler in handlers {
            if !handler.is_list() {
                return Err(error_message(format!(
                    "Invalid condition handler: {}",
                    self.prin1(handler)
                )));
            }
        }

        let (record, flow) = match self.eval(&tail[1], env) {
            Ok(value) => {
                let success = handlers
                    .iter()
                    .find(|h| h.cons_car().is_symbol_named(":success"));
                return match success {
                    Some(handler) => self.run_handler(handler, &var, value, env),
                    None => Ok(value),
                };
            }
            Err(flow) => match flow.condition_record() {
                Some(record) => (record, flow),
                None => return Err(flow),
            },
        };
        let condition = flow.condition_name().unwrap_or("error").to_string();
        for handler in handlers {
            let spec = handler.cons_car();
            if spec.is_symbol_named(":success") {
                continue;
            }
            if self.handler_matches(&spec, &condition) {
                return self.run_handler(handler, &var, record, env);
            }
        }
        Err(flow)
    }

    fn run_handler(&mut self, handler: &Value, var: &str, value: Value, env: &Env) -> EvalResult {
        let body = list_to_vec(&handler.cons_cdr()).unwrap_or_default();
        if var == "nil" {
            return self.eval_body(&body, env);
        }
        if self.specials.contains(var) {
            return self.with_dynamic(vec![(var.to_string(), value)], |ev| ev.eval_body(&body, env));
        }
        let inner = env.child_with(vec![(var.to_string(), value)]);
        self.eval_body(&body, &inner)
    }

    /// Handler spec: a condition name, `t`, or a list of names.
    pub(crate) fn handler_matches(&self, spec: &Value, condition: &str) -> bool {
        match spec {
            Value::Cons(_) => spec
                .iter()
                .filter_map(|s| s.as_symbol_name().map(str::to_string))
                .any(|s| self.conditions.matches(&s, condition)),
            other => other
                .as_symbol_name()
                .is_some_and(|s| s != "nil" && self.conditions.matches(s, condition)),
        }
    }

    fn sf_ignore_errors(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        match self.eval_body(tail, env) {
            Err(flow) => {
                let caught = flow
                    .condition_name()
                    .is_some_and(|name| self.conditions.matches("error", name));
                if caught {
                    Ok(Value::Nil)
                } else {
                    Err(flow)
                }
            }
            ok => ok,
        }
    }

    fn sf_dotimes(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        expect_form_args("dotimes", tail, 1, None)?;
        let spec = list_to_vec(&tail[0]).ok_or_else(|| wrong_type("listp", &tail[0]))?;
        expect_form_args("dotimes", &spec, 2, Some(3))?;
        let var = symbol_name_of(&spec[0])?;
        let count_value = self.eval(&spec[1], env)?;
        let count = count_value
            .as_int()
            .ok_or_else(|| wrong_type("integerp", &count_value))?;
        let loop_env = env.child();
        loop_env.define(&var, Value::Int(0));
        let mut last = Value::Nil;
        for i in 0..count.max(0) {
            loop_env.define(&var, Value::Int(i));
            last = self.eval_body(&tail[1..], &loop_env)?;
        }
        match spec.get(2) {
            Some(result) => {
                loop_env.define(&var, Value::Int(count.max(0)));
                self.eval(result, &loop_env)
            }
            None => Ok(last),
        }
    }

    fn sf_dolist(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        expect_form_args("dolist", tail, 1, None)?;
        let spec = list_to_vec(&tail[0]).ok_or_else(|| wrong_type("listp", &tail[0]))?;
        expect_form_args("dolist", &spec, 2, Some(3))?;
        let var = symbol_name_of(&spec[0])?;
        let seq = self.eval(&spec[1], env)?;
        let items = sequence_items(&seq)?;
        let loop_env = env.child();
        loop_env.define(&var, Value::Nil);
        let mut last = Value::Nil;
        for item in items {
            loop_env.define(&var, item);
            last = self.eval_body(&tail[1..], &loop_env)?;
        }
        match spec.get(2) {
            Some(result) => {
                loop_env.define(&var, Value::Nil);
                self.eval(result, &loop_env)
            }
            None => Ok(last),
        }
    }

    fn sf_defun(&mut self, tail: &[Value], env: &Env, is_macro: bool) -> EvalResult {
        let form = if is_macro { "defmacro" } else { "defun" };
        expect_form_args(form, tail, 2, None)?;
        let name = symbol_name_of(&tail[0])?;
        let data = self.lambda_data(&Value::list(tail[1..].to_vec()), env, Some(&name))?;
        let value = if is_macro {
            Value::make_macro(data)
        } else {
            Value::make_lambda(data)
        };
        tracing::debug!(name = %name, macro_ = is_macro, "defined function");
        self.functions.insert(name.clone(), value);
        Ok(Value::symbol(name))
    }

    fn sf_defvar(&mut self, tail: &[Value], env: &Env, always_set: bool) -> EvalResult {
        expect_form_args("defvar", tail, 1, None)?;
        let name = symbol_name_of(&tail[0])?;
        self.specials.insert(name.clone());
        if let Some(init) = tail.get(1) {
            if always_set || !self.globals.contains_key(&name) {
                let value = self.eval(init, env)?;
                self.globals.insert(name.clone(), value);
            }
        }
        Ok(Value::symbol(name))
    }

    fn sf_defvar_local(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        let result = self.sf_defvar(tail, env, false)?;
        if let Some(name) = result.as_symbol_name() {
            self.auto_local.insert(name.to_string());
        }
        Ok(result)
    }

    fn sf_defalias(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        expect_form_args("defalias", tail, 2, Some(3))?;
        let target = if tail[0].cons_car().is_symbol_named("quote") {
            tail[0].cons_cdr().cons_car()
        } else if tail[0].is_symbol() {
            tail[0].clone()
        } else {
            self.eval(&tail[0], env)?
        };
        let name = symbol_name_of(&target)?;
        let definition = self.eval(&tail[1], env)?;
        self.fset(&name, definition)?;
        Ok(Value::symbol(name))
    }

    /// Store a function definition, turning quoted lambda lists into closures.
    pub(crate) fn fset(&mut self, name: &str, definition: Value) -> Result<(), Flow> {
        let definition = if definition.cons_car().is_symbol_named("lambda") {
            let env = self.toplevel.clone();
            self.make_closure(&definition.cons_cdr(), &env, Some(name))?
        } else {
            definition
        };
        self.functions.insert(name.to_string(), definition);
        Ok(())
    }

    fn sf_defface(&mut self, tail: &[Value]) -> EvalResult {
        expect_form_args("defface", tail, 1, None)?;
        let name = symbol_name_of(&tail[0])?;
        let face = Value::symbol(&name);
        self.globals.insert(name, face.clone());
        Ok(face)
    }

    fn sf_cl_case(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        expect_form_args("cl-case", tail, 1, None)?;
        let key = self.eval(&tail[0], env)?;
        for clause in &tail[1..] {
            let keys = clause.cons_car();
            let body = list_to_vec(&clause.cons_cdr()).unwrap_or_default();
            let hit = match &keys {
                Value::True => true,
                Value::Symbol(s) if &**s == "otherwise" => true,
                Value::Cons(_) => keys.iter().any(|k| eql_value(&k, &key)),
                Value::Nil => false,
                other => eql_value(other, &key),
            };
            if hit {
                return self.eval_body(&body, env);
            }
        }
        Ok(Value::Nil)
    }

    fn sf_cl_assert(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        expect_form_args("cl-assert", tail, 1, None)?;
        if self.eval(&tail[0], env)?.is_nil() {
            return Err(signal("cl-assertion-failed", vec![tail[0].clone()]));
        }
        Ok(Value::Nil)
    }

    fn sf_save_excursion(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        let buffer = self.buffers.current_id();
        let point = self.buffers.current_buffer_mut().point();
        let result = self.eval_body(tail, env);
        if self.buffers.is_live(buffer) {
            self.buffers.set_current(buffer);
            if let Some(buf) = self.buffers.get_mut(buffer) {
                buf.goto_char(point);
            }
        }
        result
    }

    fn sf_with_current_buffer(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        expect_form_args("with-current-buffer", tail, 1, None)?;
        let target = self.eval(&tail[0], env)?;
        let id = builtins::buffers::resolve_buffer(self, &target)?;
        self.with_buffer(Some(id), |ev| ev.eval_body(&tail[1..], env))
    }

    fn sf_with_temp_buffer(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        self.temp_counter += 1;
        let base = format!("*temp-{}*", self.temp_counter);
        let id = self.buffers.generate_new_buffer(&base);
        let result = self.with_buffer(Some(id), |ev| ev.eval_body(tail, env));
        self.buffers.kill_buffer(id);
        result
    }

    fn sf_save_match_data(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        let saved = self.match_data.clone();
        let result = self.eval_body(tail, env);
        self.match_data = saved;
        result
    }

    fn sf_save_window_excursion(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        let config = self.buffers.capture_configuration();
        let result = self.eval_body(tail, env);
        self.buffers.restore_configuration(&config);
        result
    }

    fn sf_save_selected_window(&mut self, tail: &[Value], env: &Env) -> EvalResult {
        let selected = self.buffers.selected_window();
        let result = self.eval_body(tail, env);
        if self.buffers.is_live_window(selected) {
            self.buffers.select_window(selected);
        }
        result
    }

    /// A fresh uninterned-looking symbol name.
    pub(crate) fn gensym(&mut self, prefix: &str) -> Value {
        self.symbol_counter += 1;
        Value::symbol(format!("{prefix}{}", self.symbol_counter))
    }

    pub(crate) fn toplevel_env(&self) -> Env {
        self.toplevel.clone()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const SPECIAL_FORMS: &[&str] = &[
    "quote", "function", "`", "vector-literal", "setq", "setq-local", "setq-default", "if",
    "when", "unless", "cond", "and", "or", "while", "progn", "save-restriction",
    "eval-when-compile", "eval-and-compile", "with-no-warnings", "with-silent-modifications",
    "combine-after-change-calls", "prog1", "prog2", "lambda", "let", "let*", "catch",
    "unwind-protect", "condition-case", "ignore-errors", "dotimes", "dolist", "defun", "defsubst",
    "cl-defun", "defmacro", "cl-defmacro", "defvar", "defcustom", "defconst", "defvar-local",
    "defalias", "defface", "defgroup", "declare-function", "declare", "interactive", "cl-case",
    "case", "cl-assert", "save-excursion", "save-mark-and-excursion", "save-current-buffer",
    "with-current-buffer", "with-temp-buffer", "save-match-data", "save-window-excursion",
    "save-selected-window", "pcase", "cl-loop", "setf", "push", "pop", "incf", "cl-incf", "decf",
    "cl-decf", "cl-rotatef", "define-derived-mode", "define-minor-mode", "defvar-keymap",
    "easy-menu-define",
];

pub(crate) fn is_special_form(name: &str) -> bool {
    SPECIAL_FORMS.contains(&name)
}

/// Arity check for special forms, reported like a function's.
pub(crate) fn expect_form_args(name: &str, tail: &[Value], min: usize, max: Option<usize>) -> Result<(), Flow> {
    let n = tail.len();
    if n < min || max.is_some_and(|max| n > max) {
        return Err(ArityError::new(Some(name), min, max, n).into());
    }
    Ok(())
}

pub(crate) fn symbol_name_of(value: &Value) -> Result<String, Flow> {
    value
        .as_symbol_name()
        .map(str::to_string)
        .ok_or_else(|| wrong_type("symbolp", value))
}

/// Elements of a list or vector (strings yield character codes).
pub(crate) fn sequence_items(seq: &Value) -> Result<Vec<Value>, Flow> {
    match seq {
        Value::Vector(items) => Ok(items.borrow().clone()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Int(c as i64)).collect()),
        other => list_to_vec(other).ok_or_else(|| wrong_type("sequencep", other)),
    }
}

/// `catch` tags: `eq`, with numbers and strings compared by value.
fn catch_tag_matches(tag: &Value, thrown: &Value) -> bool {
    match (tag, thrown) {
        (Value::Str(a), Value::Str(b)) => a == b,
        _ => eql_value(tag, thrown),
    }
}

/// Parse `(a b &optional c &rest d)`.
pub(crate) fn parse_params(spec: &Value) -> Result<LambdaParams, Flow> {
    let items = list_to_vec(spec).ok_or_else(|| wrong_type("listp", spec))?;
    let mut params = LambdaParams::default();
    let mut section = 0;
    for item in &items {
        let name = symbol_name_of(item)?;
        match name.as_str() {
            "&optional" => section = 1,
            "&rest" | "&body" => section = 2,
            "&key" | "&aux" => section = 3,
            _ => match section {
                0 => params.required.push(name),
                1 => params.optional.push(name),
                2 => params.rest = Some(name),
                _ => {}
            },
        }
    }
    Ok(params)
}

/// `let` binding list: `NAME` or `(NAME [INIT])` entries.
fn parse_let_bindings(spec: &Value) -> Result<Vec<(String, Option<Value>)>, Flow> {
    let items = list_to_vec(spec).ok_or_else(|| wrong_type("listp", spec))?;
    items
        .iter()
        .map(|item| match item {
            Value::Cons(_) => Ok((
                symbol_name_of(&item.cons_car())?,
                item.cons_cdr().is_cons().then(|| item.cons_cdr().cons_car()),
            )),
            other => Ok((symbol_name_of(other)?, None)),
        })
        .collect()
}

/// Turn `(vector-literal ...)` forms inside quoted data into vectors.
/// Values without any are returned as-is, keeping their identity.
pub(crate) fn materialize_literal(value: &Value) -> Value {
    if !contains_vector_literal(value, 0) {
        return value.clone();
    }
    materialize(value, 0)
}

fn contains_vector_literal(value: &Value, depth: usize) -> bool {
    if depth > 512 {
        return false;
    }
    match value {
        Value::Cons(_) => {
            value.cons_car().is_symbol_named("vector-literal")
                || contains_vector_literal(&value.cons_car(), depth + 1)
                || contains_vector_literal(&value.cons_cdr(), depth + 1)
        }
        Value::Vector(items) => items
            .borrow()
            .iter()
            .any(|item| contains_vector_literal(item, depth + 1)),
        _ => false,
    }
}

fn materialize(value: &Value, depth: usize) -> Value {
    if depth > 512 {
        return value.clone();
    }
    match value {
        Value::Cons(_) if value.cons_car().is_symbol_named("vector-literal") => Value::vector(
            value
                .cons_cdr()
                .iter()
                .map(|item| materialize(&item, depth + 1))
                .collect(),
        ),
        Value::Cons(_) => Value::cons(
            materialize(&value.cons_car(), depth + 1),
            materialize(&value.cons_cdr(), depth + 1),
        ),
        Value::Vector(items) => Value::vector(
            items
                .borrow()
                .iter()
                .map(|item| materialize(item, depth + 1))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_one(src: &str) -> Result<Value, EvalError> {
        Evaluator::new().eval_str(src)
    }

    fn eval_ok(src: &str) -> String {
        match eval_one(src) {
            Ok(v) => v.to_string(),
            Err(e) => panic!("{src}: {e}"),
        }
    }

    #[test]
    fn let_is_parallel_let_star_is_sequential() {
        assert_eq!(eval_ok("(setq x 10) (let ((x 1) (y x)) y)"), "10");
        assert_eq!(eval_ok("(let* ((x 1) (y (+ x 1))) y)"), "2");
        assert_eq!(eval_ok("(let (a (b 2)) (list a b))"), "(nil 2)");
    }

    #[test]
    fn catch_returns_thrown_value() {
        assert_eq!(eval_ok("(catch 'k (throw 'k 42) 99)"), "42");
        assert_eq!(eval_ok("(catch 'outer (catch 'inner (throw 'outer 1)) 2)"), "1");
        assert!(matches!(
            eval_one("(throw 'nowhere 1)"),
            Err(EvalError::UncaughtThrow { .. })
        ));
    }

    #[test]
    fn user_condition_caught_by_root() {
        let src = "(define-error 'my-err \"Mine\")
                   (condition-case e (signal 'my-err '(1)) (error (car e)))";
        assert_eq!(eval_ok(src), "my-err");
        let src = "(condition-case e (error \"boom %d\" 3) (error (cadr e)))";
        assert_eq!(eval_ok(src), "\"boom 3\"");
    }

    #[test]
    fn condition_case_reraises_unmatched() {
        let src = "(condition-case nil (signal 'arith-error nil) (void-variable 'no))";
        match eval_one(src) {
            Err(EvalError::Signal { symbol, .. }) => assert_eq!(symbol, "arith-error"),
            other => panic!("unexpected {other:?}"),
        }
        let src = "(condition-case e (car 1) ((arith-error wrong-type-argument) (car e)))";
        assert_eq!(eval_ok(src), "wrong-type-argument");
    }

    #[test]
    fn condition_case_catches_throw_and_arity() {
        assert_eq!(
            eval_ok("(condition-case e (throw 'tag 5) (throw e))"),
            "(throw (tag 5))"
        );
        let src = "(defun pair (a b) (cons a b))
                   (condition-case e (pair 1 2 3) (wrong-number-of-arguments e))";
        assert_eq!(eval_ok(src), "(wrong-number-of-arguments (pair 3))");
    }

    #[test]
    fn unwind_protect_runs_cleanup_on_throw() {
        let src = "(setq log nil)
                   (catch 'done (unwind-protect (throw 'done 1) (setq log 'cleaned)))
                   log";
        assert_eq!(eval_ok(src), "cleaned");
        let src = "(catch 'c (unwind-protect 1 (throw 'c 2)))";
        assert_eq!(eval_ok(src), "2");
    }

    #[test]
    fn arity_error_is_structured() {
        let mut ev = Evaluator::new();
        ev.eval_str("(defun pair (a b) (list a b))").unwrap();
        match ev.eval_str("(pair 1 2 3)") {
            Err(EvalError::Arity(err)) => {
                assert_eq!(err.minimum, 2);
                assert!(err.exact);
                assert_eq!(err.received, 3);
                assert_eq!(err.function.as_deref(), Some("pair"));
            }
            other => panic!("unexpected {other:?}"),
        }
        match ev.eval_str("((lambda (a &optional b) a))") {
            Err(EvalError::Arity(err)) => {
                assert_eq!(err.minimum, 1);
                assert!(!err.exact);
                assert_eq!(err.received, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_function_is_unimplemented() {
        match eval_one("(frobnicate-widget 1)") {
            Err(EvalError::UnimplementedPrimitive(name)) => assert_eq!(name, "frobnicate-widget"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            eval_one("(ignore-errors (frobnicate-widget 1))"),
            Err(EvalError::UnimplementedPrimitive(_))
        ));
        assert!(matches!(
            eval_one("(funcall 5)"),
            Err(EvalError::TypeMismatch(_))
        ));
    }

    #[test]
    fn ignore_errors_does_not_catch_throw() {
        assert_eq!(eval_ok("(ignore-errors (error \"x\"))"), "nil");
        assert_eq!(eval_ok("(catch 'k (ignore-errors (throw 'k 3)))"), "3");
    }

    #[test]
    fn closures_capture_lexical_frames() {
        let src = "(defun make-counter ()
                     (let ((n 0)) (lambda () (setq n (1+ n)))))
                   (setq c (make-counter))
                   (funcall c) (funcall c)";
        assert_eq!(eval_ok(src), "2");
    }

    #[test]
    fn defvar_makes_let_dynamic() {
        let src = "(defvar depth 0)
                   (defun read-depth () depth)
                   (list (let ((depth 5)) (read-depth)) depth)";
        assert_eq!(eval_ok(src), "(5 0)");
        assert_eq!(eval_ok("(defvar v 1) (defvar v 2) v"), "1");
        assert_eq!(eval_ok("(defconst k 1) (defconst k 2) k"), "2");
    }

    #[test]
    fn macros_receive_unevaluated_arguments() {
        let src = "(defmacro my-unless (c &rest body) `(if ,c nil ,@body))
                   (list (my-unless nil 1 2) (my-unless t (error \"no\")))";
        assert_eq!(eval_ok(src), "(2 nil)");
        let src = "(defmacro my-unless (c &rest body) `(if ,c nil ,@body))
                   (macroexpand '(my-unless ready (go)))";
        assert_eq!(eval_ok(src), "(if ready nil (go))");
        assert_eq!(eval_ok("(macroexpand '(car x))"), "(car x)");
    }

    #[test]
    fn backquote_handles_splices_dotted_tails_and_vectors() {
        assert_eq!(eval_ok("(let ((b 2) (c '(3 4))) `(a ,b ,@c))"), "(a 2 3 4)");
        assert_eq!(eval_ok("(let ((b 2)) `(a . ,b))"), "(a . 2)");
        assert_eq!(eval_ok("(let ((b 2)) `[a ,b])"), "[a 2]");
    }

    #[test]
    fn vector_literals_are_literal() {
        assert_eq!(eval_ok("[1 \"two\" :three [4]]"), "[1 \"two\" :three [4]]");
        assert_eq!(eval_ok("(aref [left right] 1)"), "right");
        assert_eq!(eval_ok("'(a [b c])"), "(a [b c])");
    }

    #[test]
    fn dotimes_and_dolist() {
        assert_eq!(eval_ok("(let ((s 0)) (dotimes (i 5 s) (setq s (+ s i))))"), "10");
        assert_eq!(eval_ok("(let (r) (dolist (x '(1 2 3) r) (push x r)))"), "(3 2 1)");
        assert_eq!(eval_ok("(dotimes (i 3) i)"), "2");
    }

    #[test]
    fn cl_case_matches_keys_and_otherwise() {
        let src = "(mapcar (lambda (k) (cl-case k (1 'one) ((2 3) 'few) (otherwise 'many))) '(1 3 9))";
        assert_eq!(eval_ok(src), "(one few many)");
    }

    #[test]
    fn recursion_limit_signals() {
        let mut ev = Evaluator::with_config(RuntimeConfig {
            max_lisp_eval_depth: 100,
            ..RuntimeConfig::default()
        });
        let result = ev.eval_str("(defun loop-forever (n) (loop-forever (1+ n))) (loop-forever 0)");
        match result {
            Err(EvalError::Signal { symbol, .. }) => assert_eq!(symbol, "excessive-lisp-nesting"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(ev.eval_str("(+ 1 2)").unwrap(), Value::Int(3));
    }

    #[test]
    fn setq_rejects_constants_and_odd_arity() {
        assert!(matches!(eval_one("(setq x)"), Err(EvalError::Arity(_))));
        match eval_one("(setq nil 1)") {
            Err(EvalError::Signal { symbol, .. }) => assert_eq!(symbol, "setting-constant"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn defalias_accepts_quoted_and_bare_names() {
        assert_eq!(eval_ok("(defalias 'plus #'+) (plus 1 2)"), "3");
        assert_eq!(eval_ok("(defalias my-list 'list) (my-list 1)"), "(1)");
    }

    #[test]
    fn with_current_buffer_restores_on_error() {
        let mut ev = Evaluator::new();
        ev.eval_str("(get-buffer-create \"other\")").unwrap();
        let before = ev.eval_str("(buffer-name)").unwrap();
        let _ = ev.eval_str("(with-current-buffer \"other\" (error \"fail\"))");
        assert_eq!(ev.eval_str("(buffer-name)").unwrap(), before);
    }
}
