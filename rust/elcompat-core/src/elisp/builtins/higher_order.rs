use super::*;

use rand::Rng;

// ===========================================================================
// Function application
// ===========================================================================

pub(crate) fn builtin_funcall(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("funcall", &args, 1)?;
    let mut args = args.into_iter();
    let function = args.next().unwrap_or(Value::Nil);
    eval.apply(function, args.collect())
}

/// `(apply FUNCTION &rest ARGS)`: the last argument is spread.
pub(crate) fn builtin_apply(eval: &mut Evaluator, mut args: Vec<Value>) -> EvalResult {
    expect_min_args("apply", &args, 1)?;
    if args.len() == 1 {
        let form = args.remove(0);
        let function = form.cons_car();
        let spread = expect_list(&form.cons_cdr())?;
        return eval.apply(function, spread);
    }
    let last = args.pop().unwrap_or(Value::Nil);
    let spread = expect_list(&last)?;
    let function = args.remove(0);
    args.extend(spread);
    eval.apply(function, args)
}

fn map_items(eval: &mut Evaluator, function: &Value, seq: &Value) -> Result<Vec<Value>, Flow> {
    sequence_items(seq)?
        .into_iter()
        .map(|item| eval.apply(function.clone(), vec![item]))
        .collect()
}

pub(crate) fn builtin_mapcar(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("mapcar", &args, 2)?;
    Ok(Value::list(map_items(eval, &args[0], &args[1])?))
}

pub(crate) fn builtin_mapc(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("mapc", &args, 2)?;
    for item in sequence_items(&args[1])? {
        eval.apply(args[0].clone(), vec![item])?;
    }
    Ok(args[1].clone())
}

pub(crate) fn builtin_mapcan(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("mapcan", &args, 2)?;
    let mut out = Vec::new();
    for result in map_items(eval, &args[0], &args[1])? {
        out.extend(expect_list(&result)?);
    }
    Ok(Value::list(out))
}

pub(crate) fn builtin_mapconcat(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("mapconcat", &args, 2, 3)?;
    let separator = match args.get(2) {
        None | Some(Value::Nil) => String::new(),
        Some(v) => expect_string(v)?,
    };
    let parts = map_items(eval, &args[0], &args[1])?;
    let mut pieces = Vec::with_capacity(parts.len());
    for part in parts {
        match super::strings::builtin_concat(vec![part])? {
            Value::Str(s) => pieces.push(s.to_string()),
            other => return Err(wrong_type("stringp", &other)),
        }
    }
    Ok(Value::string(pieces.join(&separator)))
}

pub(crate) fn builtin_eval(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("eval", &args, 1, 2)?;
    eval.eval_toplevel(&args[0])
}

pub(crate) fn builtin_macroexpand_1(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("macroexpand-1", &args, 1, 2)?;
    Ok(eval.macroexpand_1(&args[0])?.0)
}

pub(crate) fn builtin_macroexpand(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("macroexpand", &args, 1, 2)?;
    let mut form = args[0].clone();
    loop {
        let (expanded, changed) = eval.macroexpand_1(&form)?;
        if !changed {
            return Ok(expanded);
        }
        form = expanded;
    }
}

pub(crate) fn builtin_macroexpand_all(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    builtin_macroexpand(eval, args)
}

// ===========================================================================
// Sorting
// ===========================================================================

/// Stable merge sort with a predicate that may fail.
fn merge_sort(
    eval: &mut Evaluator,
    items: Vec<Value>,
    pred: &Value,
) -> Result<Vec<Value>, Flow> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let mut right = items;
    let left = right.drain(..right.len() / 2).collect();
    let left = merge_sort(eval, left, pred)?;
    let right = merge_sort(eval, right, pred)?;
    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
        // Take from the right only when it is strictly less, keeping ties stable.
        let right_first = eval.apply(pred.clone(), vec![r.clone(), l.clone()])?.is_truthy();
        let next = if right_first { right.next() } else { left.next() };
        out.extend(next);
    }
    out.extend(left);
    out.extend(right);
    Ok(out)
}

/// `(sort SEQ PREDICATE)`.  Lists come back as a new sorted list; vectors
/// are sorted in place.
pub(crate) fn builtin_sort(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("sort", &args, 1)?;
    let pred = match args.get(1) {
        Some(Value::Keyword(_)) | None => Value::symbol("<"),
        Some(p) => p.clone(),
    };
    match &args[0] {
        Value::Vector(items) => {
            let snapshot = items.borrow().clone();
            let sorted = merge_sort(eval, snapshot, &pred)?;
            *items.borrow_mut() = sorted;
            Ok(args[0].clone())
        }
        other => {
            let items = expect_list(other)?;
            Ok(Value::list(merge_sort(eval, items, &pred)?))
        }
    }
}

// ===========================================================================
// seq.el / cl-lib subset
// ===========================================================================

fn test(eval: &mut Evaluator, pred: &Value, item: &Value) -> Result<bool, Flow> {
    Ok(eval.apply(pred.clone(), vec![item.clone()])?.is_truthy())
}

/// Rebuild a filtered sequence with the same kind as `seq`.
fn same_kind(seq: &Value, items: Vec<Value>) -> EvalResult {
    match seq {
        Value::Vector(_) => Ok(Value::vector(items)),
        Value::Str(_) => super::strings::builtin_concat(vec![Value::list(items)]),
        _ => Ok(Value::list(items)),
    }
}

fn filter(eval: &mut Evaluator, pred: &Value, seq: &Value, keep: bool) -> EvalResult {
    let mut out = Vec::new();
    for item in sequence_items(seq)? {
        if test(eval, pred, &item)? == keep {
            out.push(item);
        }
    }
    same_kind(seq, out)
}

fn find(eval: &mut Evaluator, pred: &Value, seq: &Value) -> Result<Option<(usize, Value)>, Flow> {
    for (index, item) in sequence_items(seq)?.into_iter().enumerate() {
        if test(eval, pred, &item)? {
            return Ok(Some((index, item)));
        }
    }
    Ok(None)
}

/// `(seq-find PRED SEQ &optional DEFAULT)`.
pub(crate) fn builtin_seq_find(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("seq-find", &args, 2, 3)?;
    Ok(match find(eval, &args[0], &args[1])? {
        Some((_, item)) => item,
        None => args.get(2).cloned().unwrap_or(Value::Nil),
    })
}

pub(crate) fn builtin_seq_filter(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("seq-filter", &args, 2)?;
    filter(eval, &args[0], &args[1], true)
}

pub(crate) fn builtin_seq_remove(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("seq-remove", &args, 2)?;
    filter(eval, &args[0], &args[1], false)
}

pub(crate) fn builtin_seq_random_elt(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("seq-random-elt", &args, 1)?;
    let items = sequence_items(&args[0])?;
    if items.is_empty() {
        return Err(error_message("Sequence cannot be empty"));
    }
    let index = eval.rng.random_range(0..items.len());
    Ok(items[index].clone())
}

/// `(seq-contains-p SEQ ELT &optional TESTFN)`.
pub(crate) fn builtin_seq_contains_p(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("seq-contains-p", &args, 2, 3)?;
    for item in sequence_items(&args[0])? {
        let hit = match args.get(2).filter(|f| f.is_truthy()) {
            Some(testfn) => eval
                .apply(testfn.clone(), vec![args[1].clone(), item])?
                .is_truthy(),
            None => equal_value(&args[1], &item, 0),
        };
        if hit {
            return Ok(Value::True);
        }
    }
    Ok(Value::Nil)
}

pub(crate) fn builtin_seq_map(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("seq-map", &args, 2)?;
    Ok(Value::list(map_items(eval, &args[0], &args[1])?))
}

pub(crate) fn builtin_seq_reduce(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("seq-reduce", &args, 3)?;
    let mut acc = args[2].clone();
    for item in sequence_items(&args[1])? {
        acc = eval.apply(args[0].clone(), vec![acc, item])?;
    }
    Ok(acc)
}

pub(crate) fn builtin_cl_remove_if(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("cl-remove-if", &args, 2)?;
    filter(eval, &args[0], &args[1], false)
}

pub(crate) fn builtin_cl_remove_if_not(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("cl-remove-if-not", &args, 2)?;
    filter(eval, &args[0], &args[1], true)
}

pub(crate) fn builtin_cl_find_if(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("cl-find-if", &args, 2)?;
    Ok(find(eval, &args[0], &args[1])?.map_or(Value::Nil, |(_, item)| item))
}

/// `(cl-position ITEM SEQ)`, compared with `eql`.
pub(crate) fn builtin_cl_position(_eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("cl-position", &args, 2)?;
    Ok(sequence_items(&args[1])?
        .iter()
        .position(|item| eql_value(item, &args[0]))
        .map_or(Value::Nil, |i| Value::Int(i as i64)))
}

pub(crate) fn builtin_cl_some(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("cl-some", &args, 2)?;
    for item in sequence_items(&args[1])? {
        let result = eval.apply(args[0].clone(), vec![item])?;
        if result.is_truthy() {
            return Ok(result);
        }
    }
    Ok(Value::Nil)
}

pub(crate) fn builtin_cl_every(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("cl-every", &args, 2)?;
    for item in sequence_items(&args[1])? {
        if !test(eval, &args[0], &item)? {
            return Ok(Value::Nil);
        }
    }
    Ok(Value::True)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Value {
        Value::list(values.iter().map(|&n| Value::Int(n)).collect())
    }

    #[test]
    fn apply_spreads_last_argument() {
        let mut ev = Evaluator::new();
        let out = builtin_apply(&mut ev, vec![Value::symbol("+"), Value::Int(1), ints(&[2, 3])]).unwrap();
        assert_eq!(out, Value::Int(6));
        assert!(builtin_apply(&mut ev, vec![Value::symbol("+"), Value::Int(1)]).is_err());
    }

    #[test]
    fn sort_is_stable_and_sorts_vectors_in_place() {
        let mut ev = Evaluator::new();
        let sorted = builtin_sort(&mut ev, vec![ints(&[3, 1, 2]), Value::symbol("<")]).unwrap();
        assert_eq!(sorted, ints(&[1, 2, 3]));

        let pairs = ev
            .eval_str("(sort (list '(1 . a) '(0 . b) '(1 . c)) (lambda (x y) (< (car x) (car y))))")
            .unwrap();
        assert_eq!(pairs.to_string(), "((0 . b) (1 . a) (1 . c))");

        let v = Value::vector(vec![Value::Int(2), Value::Int(1)]);
        builtin_sort(&mut ev, vec![v.clone(), Value::symbol("<")]).unwrap();
        assert_eq!(v, Value::vector(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn mapping_functions() {
        let mut ev = Evaluator::new();
        assert_eq!(
            builtin_mapcar(&mut ev, vec![Value::symbol("1+"), ints(&[1, 2])]).unwrap(),
            ints(&[2, 3])
        );
        let joined = builtin_mapconcat(
            &mut ev,
            vec![Value::symbol("number-to-string"), ints(&[1, 2, 3]), Value::string(",")],
        )
        .unwrap();
        assert_eq!(joined, Value::string("1,2,3"));
        let out = ev.eval_str("(mapcan (lambda (x) (list x x)) '(1 2))").unwrap();
        assert_eq!(out, ints(&[1, 1, 2, 2]));
    }

    #[test]
    fn seq_helpers() {
        let mut ev = Evaluator::new();
        assert_eq!(
            ev.eval_str("(seq-filter (lambda (x) (> x 1)) '(1 2 3))").unwrap(),
            ints(&[2, 3])
        );
        assert_eq!(ev.eval_str("(seq-find #'cl-evenp '(1 3 4 6))").unwrap(), Value::Int(4));
        assert_eq!(ev.eval_str("(cl-position 3 '(1 2 3))").unwrap(), Value::Int(2));
        assert_eq!(ev.eval_str("(seq-contains-p [1 2] 2)").unwrap(), Value::True);
        let picked = ev.eval_str("(seq-random-elt '(7 8 9))").unwrap();
        assert!(matches!(picked, Value::Int(7..=9)));
        assert_eq!(ev.eval_str("(cl-every #'numberp '(1 2.0))").unwrap(), Value::True);
    }

    #[test]
    fn macroexpand_repeats_until_fixpoint() {
        let mut ev = Evaluator::new();
        ev.eval_str("(defmacro inner (x) x) (defmacro outer (x) (list 'inner x))").unwrap();
        assert_eq!(ev.eval_str("(macroexpand '(outer 5))").unwrap(), Value::Int(5));
        assert_eq!(
            ev.eval_str("(macroexpand-1 '(outer 5))").unwrap().to_string(),
            "(inner 5)"
        );
    }
}
