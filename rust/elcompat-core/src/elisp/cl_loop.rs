//! The `cl-loop` subset games use.
//!
//! Clauses are parsed up front into a [`LoopSpec`]; the driver then checks
//! every termination controller at the top of each iteration and runs the
//! single terminal clause.

use super::env::Env;
use super::error::*;
use super::eval::{sequence_items, symbol_name_of, Evaluator};
use super::value::*;

/// Iteration cap shared by every `cl-loop`.
pub const MAX_ITERATIONS: usize = 100_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Bound {
    To,
    Downto,
    Below,
    Unbounded,
}

#[derive(Debug)]
struct Numeric {
    var: String,
    start: Value,
    step: Value,
    end: Option<Value>,
    bound: Bound,
}

#[derive(Debug)]
struct Sequence {
    var: String,
    seq: Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Do,
    Sum,
    Collect,
}

#[derive(Debug, Default)]
struct LoopSpec {
    with: Vec<(String, Option<Value>)>,
    assigns: Vec<(String, Value)>,
    sequences: Vec<Sequence>,
    numerics: Vec<Numeric>,
    conditions: Vec<Value>,
    repeat: Option<Value>,
    action: Option<(Action, Vec<Value>)>,
}

fn keyword(form: &Value) -> Option<&str> {
    form.as_symbol_name()
}

fn malformed(what: &str) -> Flow {
    error_message(format!("cl-loop: malformed {what} clause"))
}

struct Clauses<'a> {
    forms: &'a [Value],
    pos: usize,
}

impl<'a> Clauses<'a> {
    fn next(&mut self, what: &str) -> Result<&'a Value, Flow> {
        let form = self.forms.get(self.pos).ok_or_else(|| malformed(what))?;
        self.pos += 1;
        Ok(form)
    }

    fn peek_keyword(&self) -> Option<&'a str> {
        self.forms.get(self.pos).and_then(keyword)
    }

    fn rest(&mut self) -> &'a [Value] {
        let rest = &self.forms[self.pos..];
        self.pos = self.forms.len();
        rest
    }
}

fn parse(forms: &[Value]) -> Result<LoopSpec, Flow> {
    let mut spec = LoopSpec::default();
    let mut clauses = Clauses { forms, pos: 0 };
    while let Some(form) = clauses.forms.get(clauses.pos) {
        clauses.pos += 1;
        match keyword(form) {
            Some("with") => {
                let var = symbol_name_of(clauses.next("with")?)?;
                let init = if clauses.peek_keyword() == Some("=") {
                    clauses.pos += 1;
                    Some(clauses.next("with")?.clone())
                } else {
                    None
                };
                spec.with.push((var, init));
            }
            Some("for") => parse_for(&mut clauses, &mut spec)?,
            Some("while") => spec.conditions.push(clauses.next("while")?.clone()),
            Some("repeat") => spec.repeat = Some(clauses.next("repeat")?.clone()),
            Some("do") => spec.action = Some((Action::Do, clauses.rest().to_vec())),
            Some("sum") => spec.action = Some((Action::Sum, vec![clauses.next("sum")?.clone()])),
            Some("collect") => {
                spec.action = Some((Action::Collect, vec![clauses.next("collect")?.clone()]));
            }
            _ => return Err(error_message(format!("cl-loop: unsupported clause {form}"))),
        }
    }
    Ok(spec)
}

fn parse_for(clauses: &mut Clauses<'_>, spec: &mut LoopSpec) -> Result<(), Flow> {
    let var = symbol_name_of(clauses.next("for")?)?;
    let op = keyword(clauses.next("for")?).ok_or_else(|| malformed("for"))?;
    match op {
        "=" => spec.assigns.push((var, clauses.next("for")?.clone())),
        "in" | "across" => spec.sequences.push(Sequence {
            var,
            seq: clauses.next("for")?.clone(),
        }),
        "below" | "to" => {
            let bound = if op == "below" { Bound::Below } else { Bound::To };
            spec.numerics.push(Numeric {
                var,
                start: Value::Int(0),
                step: Value::Int(1),
                end: Some(clauses.next("for")?.clone()),
                bound,
            });
        }
        "from" | "upfrom" | "downfrom" => {
            let mut numeric = Numeric {
                var,
                start: clauses.next("for")?.clone(),
                step: Value::Int(1),
                end: None,
                bound: if op == "downfrom" { Bound::Downto } else { Bound::Unbounded },
            };
            while let Some(word) = clauses.peek_keyword() {
                let bound = match word {
                    "by" => None,
                    "to" | "upto" => Some(Bound::To),
                    "downto" => Some(Bound::Downto),
                    "below" => Some(Bound::Below),
                    _ => break,
                };
                clauses.pos += 1;
                let operand = clauses.next("for")?.clone();
                match bound {
                    None => numeric.step = operand,
                    Some(bound) => {
                        numeric.bound = bound;
                        numeric.end = Some(operand);
                    }
                }
            }
            spec.numerics.push(numeric);
        }
        _ => return Err(malformed("for")),
    }
    Ok(())
}

struct NumericState {
    var: String,
    value: i64,
    step: i64,
    end: i64,
    bound: Bound,
    /// The next value would overflow.
    exhausted: bool,
}

impl NumericState {
    fn in_range(&self) -> bool {
        if self.exhausted {
            return false;
        }
        match self.bound {
            Bound::To => self.value <= self.end,
            Bound::Downto => self.value >= self.end,
            Bound::Below => self.value < self.end,
            Bound::Unbounded => true,
        }
    }

    fn advance(&mut self) {
        let next = match self.bound {
            Bound::Downto => self.value.checked_sub(self.step),
            _ => self.value.checked_add(self.step),
        };
        match next {
            Some(value) => self.value = value,
            None => self.exhausted = true,
        }
    }
}

fn eval_int(ev: &mut Evaluator, form: &Value, env: &Env) -> Result<i64, Flow> {
    let value = ev.eval(form, env)?;
    value.as_int().ok_or_else(|| wrong_type("integerp", &value))
}

/// Running `sum` total; stays an integer until a float is added.
#[derive(Clone, Copy)]
enum Total {
    Int(i64),
    Float(f64),
}

impl Total {
    fn add(self, value: &Value) -> Result<Self, Flow> {
        Ok(match (self, value) {
            (Total::Int(a), Value::Int(b)) => {
                Total::Int(a.checked_add(*b).ok_or_else(|| signal("overflow-error", vec![]))?)
            }
            (Total::Int(a), Value::Float(b)) => Total::Float(a as f64 + b),
            (Total::Float(a), Value::Int(b)) => Total::Float(a + *b as f64),
            (Total::Float(a), Value::Float(b)) => Total::Float(a + b),
            (_, other) => return Err(wrong_type("number-or-marker-p", other)),
        })
    }

    fn into_value(self) -> Value {
        match self {
            Total::Int(n) => Value::Int(n),
            Total::Float(f) => Value::Float(f),
        }
    }
}

/// `(cl-loop CLAUSE...)`.
pub(crate) fn sf_cl_loop(ev: &mut Evaluator, tail: &[Value], env: &Env) -> EvalResult {
    let spec = parse(tail)?;
    let Some((action, body)) = spec.action else {
        ev.warn_once("cl-loop-no-action", "cl-loop without do/sum/collect clause skipped");
        return Ok(Value::Nil);
    };

    let loop_env = env.child();
    for (var, init) in &spec.with {
        let value = match init {
            Some(form) => ev.eval(form, &loop_env)?,
            None => Value::Nil,
        };
        loop_env.define(var, value);
    }

    let mut sequences = Vec::with_capacity(spec.sequences.len());
    for sequence in &spec.sequences {
        let seq = ev.eval(&sequence.seq, &loop_env)?;
        sequences.push((sequence.var.as_str(), sequence_items(&seq)?));
    }
    let mut numerics = Vec::with_capacity(spec.numerics.len());
    for numeric in &spec.numerics {
        let value = eval_int(ev, &numeric.start, &loop_env)?;
        let end = match &numeric.end {
            Some(form) => eval_int(ev, form, &loop_env)?,
            None => 0,
        };
        let step = eval_int(ev, &numeric.step, &loop_env)?;
        numerics.push(NumericState {
            var: numeric.var.clone(),
            value,
            step: if step == 0 { 1 } else { step.abs() },
            end,
            bound: numeric.bound,
            exhausted: false,
        });
    }
    let repeat = match &spec.repeat {
        Some(form) => Some(eval_int(ev, form, &loop_env)?.max(0) as usize),
        None => None,
    };

    let mut last = Value::Nil;
    let mut total = Total::Int(0);
    let mut collected = Vec::new();
    for iteration in 0..MAX_ITERATIONS {
        if repeat.is_some_and(|count| iteration >= count) {
            break;
        }
        if sequences.iter().any(|(_, items)| iteration >= items.len()) {
            break;
        }
        if numerics.iter().any(|n| !n.in_range()) {
            break;
        }
        for (var, items) in &sequences {
            loop_env.define(var, items[iteration].clone());
        }
        for numeric in &numerics {
            loop_env.define(&numeric.var, Value::Int(numeric.value));
        }
        for (var, form) in &spec.assigns {
            let value = ev.eval(form, &loop_env)?;
            loop_env.define(var, value);
        }
        let mut keep_going = true;
        for condition in &spec.conditions {
            if ev.eval(condition, &loop_env)?.is_nil() {
                keep_going = false;
                break;
            }
        }
        if !keep_going {
            break;
        }

        match action {
            Action::Do => last = ev.eval_body(&body, &loop_env)?,
            Action::Sum => total = total.add(&ev.eval(&body[0], &loop_env)?)?,
            Action::Collect => collected.push(ev.eval(&body[0], &loop_env)?),
        }
        numerics.iter_mut().for_each(NumericState::advance);
        if iteration + 1 == MAX_ITERATIONS {
            tracing::warn!(cap = MAX_ITERATIONS, "cl-loop stopped at iteration cap");
        }
    }

    Ok(match action {
        Action::Do => last,
        Action::Sum => total.into_value(),
        Action::Collect => Value::list(collected),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(src: &str) -> String {
        let mut ev = Evaluator::new();
        ev.eval_str(src).unwrap().to_string()
    }

    #[test]
    fn numeric_ranges() {
        assert_eq!(eval("(cl-loop for i from 1 to 4 collect i)"), "(1 2 3 4)");
        assert_eq!(eval("(cl-loop for i below 3 collect (* i i))"), "(0 1 4)");
        assert_eq!(eval("(cl-loop for i from 10 downto 7 collect i)"), "(10 9 8 7)");
        assert_eq!(eval("(cl-loop for i upfrom 0 by 5 below 20 collect i)"), "(0 5 10 15)");
        assert_eq!(eval("(cl-loop for i from 5 to 1 collect i)"), "nil");
    }

    #[test]
    fn sequences_and_sum() {
        assert_eq!(eval("(cl-loop for x in '(1 2 3) sum x)"), "6");
        assert_eq!(eval("(cl-loop for x across [1 2.5] sum x)"), "3.5");
        assert_eq!(eval("(cl-loop for c across \"ab\" collect c)"), "(97 98)");
    }

    #[test]
    fn all_controllers_are_checked() {
        assert_eq!(
            eval("(cl-loop for x in '(a b c d) for i from 0 to 1 collect (list i x))"),
            "((0 a) (1 b))"
        );
        assert_eq!(eval("(cl-loop repeat 3 for x in '(1 2 3 4 5) collect x)"), "(1 2 3)");
        assert_eq!(
            eval("(cl-loop for x in '(1 2 3 4) while (< x 3) collect x)"),
            "(1 2)"
        );
    }

    #[test]
    fn with_and_for_equals() {
        assert_eq!(
            eval("(cl-loop with acc = 100 for i from 1 to 3 for sq = (* i i) do (setq acc (- acc sq)) acc)"),
            "86"
        );
        assert_eq!(eval("(cl-loop with x repeat 2 collect x)"), "(nil nil)");
    }

    #[test]
    fn iteration_cap_bounds_unbounded_loops() {
        let mut ev = Evaluator::new();
        let out = ev
            .eval_str("(let ((n 0)) (cl-loop for i from 0 do (setq n (1+ n))) n)")
            .unwrap();
        assert_eq!(out, Value::Int(MAX_ITERATIONS as i64));
    }

    #[test]
    fn numeric_bound_at_fixnum_limits() {
        assert_eq!(
            eval("(cl-loop for i from (1- most-positive-fixnum) to most-positive-fixnum collect (- most-positive-fixnum i))"),
            "(1 0)"
        );
        assert_eq!(
            eval("(cl-loop for i from (1+ most-negative-fixnum) downto most-negative-fixnum sum 1)"),
            "2"
        );
    }

    #[test]
    fn sum_overflow_signals() {
        let mut ev = Evaluator::new();
        let caught = ev
            .eval_str("(condition-case e (cl-loop for x in (list most-positive-fixnum 1) sum x) (overflow-error (car e)))")
            .unwrap();
        assert_eq!(caught, Value::symbol("overflow-error"));
    }

    #[test]
    fn missing_action_returns_nil_and_unknown_clause_errors() {
        let mut ev = Evaluator::new();
        assert_eq!(ev.eval_str("(cl-loop for i below 3)").unwrap(), Value::Nil);
        assert!(ev.eval_str("(cl-loop for i below 3 maximize i)").is_err());
    }
}
