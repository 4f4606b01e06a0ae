//! Lisp value representation and fundamental operations.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::env::Env;
use super::keymap::Keymap;
use super::print;
use super::timer::TimerId;
use crate::buffer::BufferId;
use crate::window::{WindowConfiguration, WindowId};

// ---------------------------------------------------------------------------
// Core value types
// ---------------------------------------------------------------------------

/// Runtime Lisp value.
///
/// Conses and vectors are shared and interior-mutable; strings are immutable.
/// Buffers, windows and timers are ids into their runtime-owned tables.
#[derive(Clone)]
pub enum Value {
    Nil,
    /// `t` — the canonical true value.
    True,
    Int(i64),
    Float(f64),
    Symbol(Rc<str>),
    /// Keyword symbol; the name keeps its leading `:`.
    Keyword(Rc<str>),
    Str(Rc<str>),
    Cons(Rc<ConsCell>),
    Vector(Rc<RefCell<Vec<Value>>>),
    Lambda(Rc<LambdaData>),
    /// Kept apart from `Lambda` so a macro is never applied to evaluated arguments.
    Macro(Rc<LambdaData>),
    /// Built-in function reference (name).  Dispatched by the evaluator.
    Subr(Rc<str>),
    Buffer(BufferId),
    Window(WindowId),
    Keymap(Rc<RefCell<Keymap>>),
    WindowConfig(Rc<WindowConfiguration>),
    Timer(TimerId),
}

/// A mutable pair.
pub struct ConsCell {
    car: RefCell<Value>,
    cdr: RefCell<Value>,
}

/// Shared representation for lambda and macro bodies.
#[derive(Clone, Debug)]
pub struct LambdaData {
    pub params: LambdaParams,
    pub body: Vec<Value>,
    /// Captured lexical environment; `None` for top-level definitions.
    pub env: Option<Env>,
    pub docstring: Option<String>,
    /// Name the function was defined under, used in arity reports.
    pub name: Option<String>,
}

/// Describes a lambda parameter list including &optional and &rest.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LambdaParams {
    pub required: Vec<String>,
    pub optional: Vec<String>,
    pub rest: Option<String>,
}

impl LambdaParams {
    pub fn simple(names: Vec<String>) -> Self {
        Self {
            required: names,
            optional: Vec::new(),
            rest: None,
        }
    }

    /// Total minimum arity.
    pub fn min_arity(&self) -> usize {
        self.required.len()
    }

    /// Total maximum arity (None = unbounded due to &rest).
    pub fn max_arity(&self) -> Option<usize> {
        if self.rest.is_some() {
            None
        } else {
            Some(self.required.len() + self.optional.len())
        }
    }
}

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

impl Value {
    pub fn t() -> Self {
        Value::True
    }

    pub fn bool(b: bool) -> Self {
        if b {
            Value::True
        } else {
            Value::Nil
        }
    }

    /// Intern `s`.  `nil`, `t` and keywords get their dedicated variants.
    pub fn symbol(s: impl AsRef<str>) -> Self {
        let s = s.as_ref();
        match s {
            "nil" => Value::Nil,
            "t" => Value::True,
            _ if s.starts_with(':') && s.len() > 1 => Value::Keyword(Rc::from(s)),
            _ => Value::Symbol(Rc::from(s)),
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(Rc::from(s.into()))
    }

    pub fn cons(car: Value, cdr: Value) -> Self {
        Value::Cons(Rc::new(ConsCell {
            car: RefCell::new(car),
            cdr: RefCell::new(cdr),
        }))
    }

    pub fn list(values: Vec<Value>) -> Self {
        Self::list_with_tail(values, Value::Nil)
    }

    pub fn list_with_tail(values: Vec<Value>, tail: Value) -> Self {
        values
            .into_iter()
            .rev()
            .fold(tail, |acc, item| Value::cons(item, acc))
    }

    pub fn vector(values: Vec<Value>) -> Self {
        Value::Vector(Rc::new(RefCell::new(values)))
    }

    pub fn make_lambda(data: LambdaData) -> Self {
        Value::Lambda(Rc::new(data))
    }

    pub fn make_macro(data: LambdaData) -> Self {
        Value::Macro(Rc::new(data))
    }

    pub fn subr(name: &str) -> Self {
        Value::Subr(Rc::from(name))
    }

    // -----------------------------------------------------------------------
    // Cons access
    // -----------------------------------------------------------------------

    /// Car of a cons; `nil` for anything else.
    pub fn cons_car(&self) -> Value {
        match self {
            Value::Cons(cell) => cell.car.borrow().clone(),
            _ => Value::Nil,
        }
    }

    /// Cdr of a cons; `nil` for anything else.
    pub fn cons_cdr(&self) -> Value {
        match self {
            Value::Cons(cell) => cell.cdr.borrow().clone(),
            _ => Value::Nil,
        }
    }

    pub fn set_car(&self, val: Value) {
        if let Value::Cons(cell) = self {
            *cell.car.borrow_mut() = val;
        }
    }

    pub fn set_cdr(&self, val: Value) {
        if let Value::Cons(cell) = self {
            *cell.cdr.borrow_mut() = val;
        }
    }

    // -----------------------------------------------------------------------
    // Predicates
    // -----------------------------------------------------------------------

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_truthy(&self) -> bool {
        !self.is_nil()
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::Nil | Value::Cons(_))
    }

    pub fn is_cons(&self) -> bool {
        matches!(self, Value::Cons(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::Str(_))
    }

    pub fn is_symbol(&self) -> bool {
        matches!(
            self,
            Value::Nil | Value::True | Value::Symbol(_) | Value::Keyword(_)
        )
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Value::Lambda(_) | Value::Subr(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil | Value::True | Value::Symbol(_) | Value::Keyword(_) => "symbol",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Cons(_) => "cons",
            Value::Vector(_) => "vector",
            Value::Lambda(_) => "interpreted-function",
            Value::Macro(_) => "macro",
            Value::Subr(_) => "subr",
            Value::Buffer(_) => "buffer",
            Value::Window(_) => "window",
            Value::Keymap(_) => "keymap",
            Value::WindowConfig(_) => "window-configuration",
            Value::Timer(_) => "timer",
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_number_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Symbol name, including `nil`, `t` and keywords.
    pub fn as_symbol_name(&self) -> Option<&str> {
        match self {
            Value::Nil => Some("nil"),
            Value::True => Some("t"),
            Value::Symbol(s) | Value::Keyword(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_symbol_named(&self, name: &str) -> bool {
        self.as_symbol_name() == Some(name)
    }

    pub fn get_lambda_data(&self) -> Option<&LambdaData> {
        match self {
            Value::Lambda(data) | Value::Macro(data) => Some(data),
            _ => None,
        }
    }

    /// Iterate the elements of a list, stopping at the first non-cons tail.
    pub fn iter(&self) -> ListIter {
        ListIter {
            current: self.clone(),
        }
    }
}

pub struct ListIter {
    current: Value,
}

impl Iterator for ListIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match &self.current {
            Value::Cons(cell) => {
                let item = cell.car.borrow().clone();
                let next = cell.cdr.borrow().clone();
                self.current = next;
                Some(item)
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Equality
// ---------------------------------------------------------------------------

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        equal_value(self, other, 0)
    }
}

/// `eq`: identity for heap objects, value for immediates and symbols.
pub fn eq_value(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Nil, Value::Nil) | (Value::True, Value::True) => true,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Symbol(a), Value::Symbol(b))
        | (Value::Keyword(a), Value::Keyword(b))
        | (Value::Subr(a), Value::Subr(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b),
        (Value::Cons(a), Value::Cons(b)) => Rc::ptr_eq(a, b),
        (Value::Vector(a), Value::Vector(b)) => Rc::ptr_eq(a, b),
        (Value::Lambda(a), Value::Lambda(b)) | (Value::Macro(a), Value::Macro(b)) => {
            Rc::ptr_eq(a, b)
        }
        (Value::Buffer(a), Value::Buffer(b)) => a == b,
        (Value::Window(a), Value::Window(b)) => a == b,
        (Value::Timer(a), Value::Timer(b)) => a == b,
        (Value::Keymap(a), Value::Keymap(b)) => Rc::ptr_eq(a, b),
        (Value::WindowConfig(a), Value::WindowConfig(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

/// `eql`: like `eq` but floats compare by value.
pub fn eql_value(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
        _ => eq_value(left, right),
    }
}

/// `equal`: structural comparison.  Bails out as unequal past a fixed depth.
pub fn equal_value(left: &Value, right: &Value, depth: usize) -> bool {
    if depth > 4096 {
        return false;
    }
    match (left, right) {
        (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Cons(a), Value::Cons(b)) => {
            if Rc::ptr_eq(a, b) {
                return true;
            }
            equal_value(&a.car.borrow(), &b.car.borrow(), depth + 1)
                && equal_value(&a.cdr.borrow(), &b.cdr.borrow(), depth + 1)
        }
        (Value::Vector(a), Value::Vector(b)) => {
            if Rc::ptr_eq(a, b) {
                return true;
            }
            let av = a.borrow();
            let bv = b.borrow();
            av.len() == bv.len()
                && av
                    .iter()
                    .zip(bv.iter())
                    .all(|(x, y)| equal_value(x, y, depth + 1))
        }
        _ => eq_value(left, right),
    }
}

// ---------------------------------------------------------------------------
// List helpers
// ---------------------------------------------------------------------------

/// Collect a proper list into a `Vec`.  Returns `None` for dotted lists and
/// non-list values.
pub fn list_to_vec(value: &Value) -> Option<Vec<Value>> {
    let mut out = Vec::new();
    let mut cursor = value.clone();
    loop {
        match cursor {
            Value::Nil => return Some(out),
            Value::Cons(cell) => {
                out.push(cell.car.borrow().clone());
                let next = cell.cdr.borrow().clone();
                cursor = next;
            }
            _ => return None,
        }
    }
}

pub fn list_length(value: &Value) -> Option<usize> {
    let mut n = 0;
    let mut cursor = value.clone();
    loop {
        match cursor {
            Value::Nil => return Some(n),
            Value::Cons(cell) => {
                n += 1;
                let next = cell.cdr.borrow().clone();
                cursor = next;
            }
            _ => return None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&print::prin1_to_string(self))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&print::prin1_to_string(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_constructor_folds_nil_t_and_keywords() {
        assert!(Value::symbol("nil").is_nil());
        assert!(matches!(Value::symbol("t"), Value::True));
        assert!(matches!(Value::symbol(":full"), Value::Keyword(_)));
        assert!(matches!(Value::symbol(":"), Value::Symbol(_)));
    }

    #[test]
    fn eq_is_identity_for_strings_equal_is_structural() {
        let a = Value::string("abc");
        let b = Value::string("abc");
        assert!(!eq_value(&a, &b));
        assert!(eq_value(&a, &a.clone()));
        assert_eq!(a, b);
    }

    #[test]
    fn list_round_trips_through_vec() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(list_length(&list), Some(3));
        assert_eq!(
            list_to_vec(&list).unwrap(),
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
        let dotted = Value::cons(Value::Int(1), Value::Int(2));
        assert!(list_to_vec(&dotted).is_none());
    }

    #[test]
    fn set_car_is_visible_through_shared_cells() {
        let list = Value::list(vec![Value::Int(1)]);
        let alias = list.clone();
        alias.set_car(Value::Int(9));
        assert_eq!(list.cons_car(), Value::Int(9));
    }

    #[test]
    fn lambda_params_arity_bounds() {
        let params = LambdaParams {
            required: vec!["a".into()],
            optional: vec!["b".into()],
            rest: None,
        };
        assert_eq!(params.min_arity(), 1);
        assert_eq!(params.max_arity(), Some(2));
        let rest = LambdaParams {
            rest: Some("more".into()),
            ..params
        };
        assert_eq!(rest.max_arity(), None);
    }
}
