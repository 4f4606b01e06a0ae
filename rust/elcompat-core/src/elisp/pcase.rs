//! `pcase` pattern matching.
//!
//! Clause patterns are compiled from their source forms into a [`Pattern`]
//! tree and matched against the subject.  A successful match yields the
//! variables it bound, which are in scope for the clause body.

use super::env::Env;
use super::error::*;
use super::eval::{expect_form_args, materialize_literal, Evaluator};
use super::value::*;

#[derive(Clone, Debug)]
enum Pattern {
    /// `_` and `t`.
    Wildcard,
    Bind(String),
    /// Self-evaluating values and `'X`, compared with `equal`.
    Literal(Value),
    Pred { function: Value, negate: bool },
    Guard(Value),
    And(Vec<Pattern>),
    Or(Vec<Pattern>),
    /// Backquoted cons: car and cdr patterns.
    Cons(Box<Pattern>, Box<Pattern>),
    /// Backquoted vector, matched element by element.
    Vector(Vec<Pattern>),
}

fn unknown_pattern(form: &Value) -> Flow {
    let message = match form.cons_car().as_symbol_name() {
        Some(head) => format!("Unknown {head} pattern: {form}"),
        None => format!("Unknown pattern `{form}'"),
    };
    error_message(message)
}

fn compile(form: &Value) -> Result<Pattern, Flow> {
    match form {
        Value::True => Ok(Pattern::Wildcard),
        Value::Symbol(name) if &**name == "_" => Ok(Pattern::Wildcard),
        Value::Symbol(name) => Ok(Pattern::Bind(name.to_string())),
        Value::Cons(_) => compile_list(form),
        other => Ok(Pattern::Literal(other.clone())),
    }
}

fn compile_list(form: &Value) -> Result<Pattern, Flow> {
    let head = form.cons_car();
    let args = list_to_vec(&form.cons_cdr()).ok_or_else(|| unknown_pattern(form))?;
    let Some(head) = head.as_symbol_name() else {
        return Err(wrong_type("symbolp", &head));
    };
    let single = |args: &[Value]| match args {
        [arg] => Ok(arg.clone()),
        _ => Err(unknown_pattern(form)),
    };
    match head {
        "quote" => Ok(Pattern::Literal(materialize_literal(&single(&args)?))),
        "`" => compile_backquote(&single(&args)?),
        "pred" => {
            let function = single(&args)?;
            if function.cons_car().is_symbol_named("not") {
                let inner = function.cons_cdr().cons_car();
                return Ok(Pattern::Pred { function: inner, negate: true });
            }
            Ok(Pattern::Pred { function, negate: false })
        }
        "guard" => Ok(Pattern::Guard(single(&args)?)),
        "and" => Ok(Pattern::And(args.iter().map(compile).collect::<Result<_, _>>()?)),
        "or" => Ok(Pattern::Or(args.iter().map(compile).collect::<Result<_, _>>()?)),
        _ => Err(unknown_pattern(form)),
    }
}

fn compile_backquote(template: &Value) -> Result<Pattern, Flow> {
    match template {
        Value::Cons(_) => {
            let head = template.cons_car();
            if head.is_symbol_named(",") {
                return compile(&template.cons_cdr().cons_car());
            }
            if head.is_symbol_named("vector-literal") {
                let items = list_to_vec(&template.cons_cdr()).unwrap_or_default();
                return Ok(Pattern::Vector(
                    items.iter().map(compile_backquote).collect::<Result<_, _>>()?,
                ));
            }
            Ok(Pattern::Cons(
                Box::new(compile_backquote(&head)?),
                Box::new(compile_backquote(&template.cons_cdr())?),
            ))
        }
        other => Ok(Pattern::Literal(other.clone())),
    }
}

/// Match `value`, pushing bindings onto `bound`.  On failure `bound` is
/// left as it was.
fn matches(
    ev: &mut Evaluator,
    pattern: &Pattern,
    value: &Value,
    env: &Env,
    bound: &mut Vec<(String, Value)>,
) -> Result<bool, Flow> {
    let mark = bound.len();
    let ok = match pattern {
        Pattern::Wildcard => true,
        Pattern::Bind(name) => {
            bound.push((name.clone(), value.clone()));
            true
        }
        Pattern::Literal(expected) => equal_value(expected, value, 0),
        Pattern::Pred { function, negate } => {
            let result = call_predicate(ev, function, value, &scope(env, bound))?;
            result.is_truthy() != *negate
        }
        Pattern::Guard(form) => {
            let scope = scope(env, bound);
            ev.eval(form, &scope)?.is_truthy()
        }
        Pattern::And(patterns) => {
            let mut all = true;
            for sub in patterns {
                if !matches(ev, sub, value, env, bound)? {
                    all = false;
                    break;
                }
            }
            all
        }
        Pattern::Or(patterns) => {
            let mut any = false;
            for sub in patterns {
                if matches(ev, sub, value, env, bound)? {
                    any = true;
                    break;
                }
            }
            any
        }
        Pattern::Cons(car, cdr) => {
            value.is_cons()
                && matches(ev, car, &value.cons_car(), env, bound)?
                && matches(ev, cdr, &value.cons_cdr(), env, bound)?
        }
        Pattern::Vector(patterns) => match value {
            Value::Vector(items) => {
                let items = items.borrow().clone();
                let mut all = items.len() == patterns.len();
                for (sub, item) in patterns.iter().zip(&items) {
                    if !all {
                        break;
                    }
                    all = matches(ev, sub, item, env, bound)?;
                }
                all
            }
            _ => false,
        },
    };
    if !ok {
        bound.truncate(mark);
    }
    Ok(ok)
}

fn scope(env: &Env, bound: &[(String, Value)]) -> Env {
    env.child_with(bound.to_vec())
}

/// `(pred F)` calls `F` on the subject; `(pred (F ARGS...))` calls it with
/// the subject appended to ARGS.
fn call_predicate(ev: &mut Evaluator, function: &Value, subject: &Value, env: &Env) -> EvalResult {
    match function {
        Value::Cons(_) if function.cons_car().is_symbol_named("lambda") => {
            let closure = ev.eval(function, env)?;
            ev.apply(closure, vec![subject.clone()])
        }
        Value::Cons(_) => {
            let callee = function.cons_car();
            let mut args = Vec::new();
            for form in function.cons_cdr().iter() {
                args.push(ev.eval(&form, env)?);
            }
            args.push(subject.clone());
            ev.apply(callee, args)
        }
        other => ev.apply(other.clone(), vec![subject.clone()]),
    }
}

/// Run `body` with `bound` in scope; special variables are bound
/// dynamically, the rest lexically.
fn run_clause(ev: &mut Evaluator, bound: Vec<(String, Value)>, body: &[Value], env: &Env) -> EvalResult {
    let (dynamic, lexical): (Vec<_>, Vec<_>) =
        bound.into_iter().partition(|(name, _)| ev.specials.contains(name));
    let clause_env = env.child_with(lexical);
    ev.with_dynamic(dynamic, |ev| ev.eval_body(body, &clause_env))
}

/// `(pcase EXP (PATTERN BODY...)...)`.
pub(crate) fn sf_pcase(ev: &mut Evaluator, tail: &[Value], env: &Env) -> EvalResult {
    expect_form_args("pcase", tail, 1, None)?;
    let subject = ev.eval(&tail[0], env)?;
    for clause in &tail[1..] {
        let pattern = compile(&clause.cons_car())?;
        let mut bound = Vec::new();
        if matches(ev, &pattern, &subject, env, &mut bound)? {
            let body = list_to_vec(&clause.cons_cdr()).unwrap_or_default();
            return run_clause(ev, bound, &body, env);
        }
    }
    Ok(Value::Nil)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(src: &str) -> String {
        let mut ev = Evaluator::new();
        ev.eval_str(src).unwrap().to_string()
    }

    #[test]
    fn quoted_and_literal_patterns() {
        let src = "(mapcar (lambda (x)
                     (pcase x
                       ('left \"L\")
                       (\"up\" \"U\")
                       (3 \"three\")
                       (_ \"other\")))
                   '(left \"up\" 3 right))";
        assert_eq!(eval(src), "(\"L\" \"U\" \"three\" \"other\")");
    }

    #[test]
    fn symbol_binds_subject_and_t_does_not() {
        assert_eq!(eval("(pcase (+ 1 2) (n (* n 10)))"), "30");
        assert_eq!(eval("(let ((t-val 1)) (pcase 5 (t t-val)))"), "1");
    }

    #[test]
    fn or_takes_first_matching_branch() {
        let src = "(list (pcase 'down ((or 'up 'down) 'vertical) (_ 'horizontal))
                         (pcase 'left ((or 'up 'down) 'vertical) (_ 'horizontal)))";
        assert_eq!(eval(src), "(vertical horizontal)");
    }

    #[test]
    fn no_clause_matches_yields_nil() {
        assert_eq!(eval("(pcase 7 ('a 1) (\"b\" 2))"), "nil");
    }

    #[test]
    fn subject_is_evaluated_once() {
        let src = "(let ((n 0))
                     (pcase (setq n (1+ n)) ('x 'no) ('y 'no) (_ n)))";
        assert_eq!(eval(src), "1");
    }

    #[test]
    fn backquote_destructures_lists_and_vectors() {
        let src = "(list (pcase '(move 3 4) (`(move ,x ,y) (+ x y)))
                         (pcase '(a . b) (`(,h . ,rest) (list rest h)))
                         (pcase [1 2] (`[,a ,b] (* a b)))
                         (pcase '(stop) (`(move ,x) x) (_ 'none)))";
        assert_eq!(eval(src), "(7 (b a) 2 none)");
    }

    #[test]
    fn pred_and_guard_see_bindings() {
        let src = "(mapcar (lambda (v)
                     (pcase v
                       ((and n (pred integerp) (guard (> n 10))) 'big)
                       ((pred integerp) 'small)
                       ((pred (not stringp)) 'thing)
                       (_ 'text)))
                   '(50 2 sym \"s\"))";
        assert_eq!(eval(src), "(big small thing text)");
    }

    #[test]
    fn unknown_pattern_is_an_error() {
        let mut ev = Evaluator::new();
        let err = ev.eval_str("(pcase 1 ((frob x) x))").unwrap_err();
        assert!(matches!(err, EvalError::Signal { .. }));
    }
}
