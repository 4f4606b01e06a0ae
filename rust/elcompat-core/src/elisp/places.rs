//! Generalized variables: `setf` and the forms built on places.
//!
//! A place form is resolved once into a [`Place`], evaluating its container
//! and index subforms a single time, so read-modify-write forms such as
//! `(incf (aref v (random 3)))` touch one slot.

use super::builtins::{builtin_add, builtin_sub};
use super::env::Env;
use super::error::*;
use super::eval::{expect_form_args, Evaluator};
use super::value::*;

#[derive(Debug)]
enum Place {
    Var(String),
    Car(Value),
    Cdr(Value),
    /// Vector slot.
    Slot(Value, usize),
}

fn out_of_range(seq: &Value, index: i64) -> Flow {
    signal("args-out-of-range", vec![seq.clone(), Value::Int(index)])
}

fn index_of(value: &Value) -> Result<i64, Flow> {
    value.as_int().ok_or_else(|| wrong_type("integerp", value))
}

/// The cons whose car is element `index` of `list`.
fn nth_cell(list: &Value, index: i64) -> Result<Value, Flow> {
    if index < 0 {
        return Err(out_of_range(list, index));
    }
    let mut cursor = list.clone();
    for _ in 0..index {
        if !cursor.is_cons() {
            return Err(out_of_range(list, index));
        }
        cursor = cursor.cons_cdr();
    }
    if cursor.is_cons() {
        Ok(cursor)
    } else {
        Err(out_of_range(list, index))
    }
}

fn vector_slot(seq: Value, index: i64) -> Result<Place, Flow> {
    let Value::Vector(items) = &seq else {
        return Err(wrong_type("arrayp", &seq));
    };
    match usize::try_from(index) {
        Ok(i) if i < items.borrow().len() => Ok(Place::Slot(seq, i)),
        _ => Err(out_of_range(&seq, index)),
    }
}

fn resolve(ev: &mut Evaluator, form: &Value, env: &Env) -> Result<Place, Flow> {
    if let Some(name) = form.as_symbol_name() {
        return Ok(Place::Var(name.to_string()));
    }
    let head = form.cons_car();
    let args = list_to_vec(&form.cons_cdr()).unwrap_or_default();
    let Some(name) = head.as_symbol_name() else {
        return Err(error_message(format!("Bad place: {form}")));
    };
    let arg = |ev: &mut Evaluator, i: usize| -> EvalResult {
        let sub = args.get(i).ok_or_else(|| error_message(format!("Bad place: {form}")))?;
        ev.eval(sub, env)
    };
    match name {
        "car" => Ok(Place::Car(cons_arg(arg(ev, 0)?)?)),
        "cdr" => Ok(Place::Cdr(cons_arg(arg(ev, 0)?)?)),
        "aref" => {
            let seq = arg(ev, 0)?;
            let index = index_of(&arg(ev, 1)?)?;
            vector_slot(seq, index)
        }
        "elt" => {
            let seq = arg(ev, 0)?;
            let index = index_of(&arg(ev, 1)?)?;
            match seq {
                Value::Vector(_) => vector_slot(seq, index),
                list => Ok(Place::Car(nth_cell(&list, index)?)),
            }
        }
        "nth" => {
            let index = index_of(&arg(ev, 0)?)?;
            let list = arg(ev, 1)?;
            Ok(Place::Car(nth_cell(&list, index)?))
        }
        _ => match ev.macroexpand_1(form)? {
            (expanded, true) => resolve(ev, &expanded, env),
            _ => Err(error_message(format!("Unsupported place: {form}"))),
        },
    }
}

fn cons_arg(value: Value) -> Result<Value, Flow> {
    if value.is_cons() {
        Ok(value)
    } else {
        Err(wrong_type("consp", &value))
    }
}

impl Place {
    fn get(&self, ev: &Evaluator, env: &Env) -> EvalResult {
        match self {
            Place::Var(name) => ev
                .lookup_variable(name, env)
                .ok_or_else(|| signal("void-variable", vec![Value::symbol(name)])),
            Place::Car(cell) => Ok(cell.cons_car()),
            Place::Cdr(cell) => Ok(cell.cons_cdr()),
            Place::Slot(Value::Vector(items), i) => Ok(items.borrow()[*i].clone()),
            Place::Slot(other, _) => Err(wrong_type("arrayp", other)),
        }
    }

    fn set(&self, ev: &mut Evaluator, value: Value, env: &Env) -> Result<(), Flow> {
        match self {
            Place::Var(name) => ev.set_variable(name, value, env)?,
            Place::Car(cell) => cell.set_car(value),
            Place::Cdr(cell) => cell.set_cdr(value),
            Place::Slot(Value::Vector(items), i) => items.borrow_mut()[*i] = value,
            Place::Slot(other, _) => return Err(wrong_type("arrayp", other)),
        }
        Ok(())
    }
}

/// `(setf PLACE VALUE...)`.
pub(crate) fn sf_setf(ev: &mut Evaluator, tail: &[Value], env: &Env) -> EvalResult {
    if tail.len() % 2 != 0 {
        return Err(ArityError::new(Some("setf"), tail.len() + 1, None, tail.len()).into());
    }
    let mut last = Value::Nil;
    for pair in tail.chunks(2) {
        let place = resolve(ev, &pair[0], env)?;
        last = ev.eval(&pair[1], env)?;
        place.set(ev, last.clone(), env)?;
    }
    Ok(last)
}

/// `(push NEWELT PLACE)`.
pub(crate) fn sf_push(ev: &mut Evaluator, tail: &[Value], env: &Env) -> EvalResult {
    expect_form_args("push", tail, 2, Some(2))?;
    let item = ev.eval(&tail[0], env)?;
    let place = resolve(ev, &tail[1], env)?;
    let list = Value::cons(item, place.get(ev, env)?);
    place.set(ev, list.clone(), env)?;
    Ok(list)
}

/// `(pop PLACE)`: the removed first element.
pub(crate) fn sf_pop(ev: &mut Evaluator, tail: &[Value], env: &Env) -> EvalResult {
    expect_form_args("pop", tail, 1, Some(1))?;
    let place = resolve(ev, &tail[0], env)?;
    let list = place.get(ev, env)?;
    match &list {
        Value::Nil => Ok(Value::Nil),
        Value::Cons(_) => {
            place.set(ev, list.cons_cdr(), env)?;
            Ok(list.cons_car())
        }
        other => Err(wrong_type("listp", other)),
    }
}

/// `(incf PLACE [DELTA])` for `sign` 1, `decf` for -1.
pub(crate) fn sf_incf(ev: &mut Evaluator, tail: &[Value], env: &Env, sign: i64) -> EvalResult {
    let form = if sign < 0 { "decf" } else { "incf" };
    expect_form_args(form, tail, 1, Some(2))?;
    let place = resolve(ev, &tail[0], env)?;
    let delta = match tail.get(1) {
        Some(delta) => ev.eval(delta, env)?,
        None => Value::Int(1),
    };
    let old = place.get(ev, env)?;
    let new = if sign < 0 {
        builtin_sub(vec![old, delta])?
    } else {
        builtin_add(vec![old, delta])?
    };
    place.set(ev, new.clone(), env)?;
    Ok(new)
}

/// `(cl-rotatef PLACE...)`: shift values one place to the left, the first
/// value moving to the last place.
pub(crate) fn sf_rotatef(ev: &mut Evaluator, tail: &[Value], env: &Env) -> EvalResult {
    let places = tail
        .iter()
        .map(|form| resolve(ev, form, env))
        .collect::<Result<Vec<_>, _>>()?;
    let mut values = places
        .iter()
        .map(|place| place.get(ev, env))
        .collect::<Result<Vec<_>, _>>()?;
    if values.len() > 1 {
        values.rotate_left(1);
        for (place, value) in places.iter().zip(values) {
            place.set(ev, value, env)?;
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
    fn setf_on_each_place_kind() {
        let src = "(let ((l (list 1 2 3)) (v (vector 0 0)) (c (cons 'a 'b)) x)
                     (setf x 5 (nth 1 l) 20 (aref v 1) 'y (elt l 2) 30
                           (car c) 'head (cdr c) 'tail)
                     (list x l v c))";
        assert_eq!(eval(src), "(5 (1 20 30) [0 y] (head . tail))");
    }

    #[test]
    fn push_and_pop_on_variables_and_cars() {
        let src = "(let ((stack nil) (cell (list nil)))
                     (push 1 stack)
                     (push 2 stack)
                     (push 'x (car cell))
                     (list (pop stack) stack (pop (car cell)) cell (pop stack) (pop stack)))";
        assert_eq!(eval(src), "(2 (1) x (nil) 1 nil)");
    }

    #[test]
    fn incf_and_decf_evaluate_place_once() {
        let src = "(let ((v (vector 1 2 3)) (i 0) (n 10))
                     (incf (aref v (setq i (1+ i))) 5)
                     (decf n)
                     (cl-decf n 2.5)
                     (list v i n))";
        assert_eq!(eval(src), "([1 7 3] 1 6.5)");
    }

    #[test]
    fn rotatef_swaps_sequence_elements() {
        let src = "(let ((v (vector 'a 'b 'c)) (x 1) (y 2))
                     (cl-rotatef (elt v 0) (elt v 2))
                     (cl-rotatef x y)
                     (list v x y))";
        assert_eq!(eval(src), "([c b a] 2 1)");
    }

    #[test]
    fn out_of_range_places_signal() {
        let mut ev = Evaluator::new();
        let out = ev
            .eval_str("(condition-case e (setf (aref (vector 1) 3) 0) (args-out-of-range 'oor))")
            .unwrap();
        assert_eq!(out, Value::symbol("oor"));
        assert!(ev.eval_str("(setf (frobnicate x) 1)").is_err());
    }
}
