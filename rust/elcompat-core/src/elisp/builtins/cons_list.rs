use super::*;

// ===========================================================================
// Cons cells and lists
// ===========================================================================

pub(crate) fn builtin_cons(args: Vec<Value>) -> EvalResult {
    expect_args("cons", &args, 2)?;
    let mut args = args.into_iter();
    let car = args.next().unwrap_or(Value::Nil);
    let cdr = args.next().unwrap_or(Value::Nil);
    Ok(Value::cons(car, cdr))
}

fn car_of(value: &Value) -> EvalResult {
    match value {
        Value::Nil => Ok(Value::Nil),
        Value::Cons(_) => Ok(value.cons_car()),
        other => Err(wrong_type("listp", other)),
    }
}

fn cdr_of(value: &Value) -> EvalResult {
    match value {
        Value::Nil => Ok(Value::Nil),
        Value::Cons(_) => Ok(value.cons_cdr()),
        other => Err(wrong_type("listp", other)),
    }
}

pub(crate) fn builtin_car(args: Vec<Value>) -> EvalResult {
    expect_args("car", &args, 1)?;
    car_of(&args[0])
}

pub(crate) fn builtin_cdr(args: Vec<Value>) -> EvalResult {
    expect_args("cdr", &args, 1)?;
    cdr_of(&args[0])
}

pub(crate) fn builtin_cadr(args: Vec<Value>) -> EvalResult {
    expect_args("cadr", &args, 1)?;
    car_of(&cdr_of(&args[0])?)
}

pub(crate) fn builtin_cddr(args: Vec<Value>) -> EvalResult {
    expect_args("cddr", &args, 1)?;
    cdr_of(&cdr_of(&args[0])?)
}

pub(crate) fn builtin_caar(args: Vec<Value>) -> EvalResult {
    expect_args("caar", &args, 1)?;
    car_of(&car_of(&args[0])?)
}

pub(crate) fn builtin_cdar(args: Vec<Value>) -> EvalResult {
    expect_args("cdar", &args, 1)?;
    cdr_of(&car_of(&args[0])?)
}

pub(crate) fn builtin_car_safe(args: Vec<Value>) -> EvalResult {
    expect_args("car-safe", &args, 1)?;
    Ok(args[0].cons_car())
}

pub(crate) fn builtin_cdr_safe(args: Vec<Value>) -> EvalResult {
    expect_args("cdr-safe", &args, 1)?;
    Ok(args[0].cons_cdr())
}

pub(crate) fn builtin_list(args: Vec<Value>) -> EvalResult {
    Ok(Value::list(args))
}

pub(crate) fn builtin_make_list(args: Vec<Value>) -> EvalResult {
    expect_args("make-list", &args, 2)?;
    let n = expect_natnum(&args[0])?;
    Ok(Value::list(vec![args[1].clone(); n]))
}

/// Copy every argument but the last; the last becomes the shared tail.
pub(crate) fn builtin_append(args: Vec<Value>) -> EvalResult {
    let Some((last, init)) = args.split_last() else {
        return Ok(Value::Nil);
    };
    let mut items = Vec::new();
    for seq in init {
        items.extend(sequence_items(seq)?);
    }
    let tail = match last {
        Value::Vector(_) | Value::Str(_) => Value::list(sequence_items(last)?),
        other => other.clone(),
    };
    Ok(Value::list_with_tail(items, tail))
}

/// Last cons cell of a non-empty list.
fn last_cell(list: &Value) -> Value {
    let mut cell = list.clone();
    while cell.cons_cdr().is_cons() {
        cell = cell.cons_cdr();
    }
    cell
}

pub(crate) fn builtin_nconc(args: Vec<Value>) -> EvalResult {
    let mut result = Value::Nil;
    let mut tail_cell: Option<Value> = None;
    for (i, arg) in args.iter().enumerate() {
        if arg.is_nil() {
            continue;
        }
        if !arg.is_cons() && i + 1 < args.len() {
            return Err(wrong_type("consp", arg));
        }
        match &tail_cell {
            Some(cell) => cell.set_cdr(arg.clone()),
            None => result = arg.clone(),
        }
        if arg.is_cons() {
            tail_cell = Some(last_cell(arg));
        }
    }
    Ok(result)
}

pub(crate) fn builtin_length(args: Vec<Value>) -> EvalResult {
    expect_args("length", &args, 1)?;
    let n = match &args[0] {
        Value::Nil => 0,
        Value::Cons(_) => list_length(&args[0]).ok_or_else(|| wrong_type("listp", &args[0]))?,
        Value::Vector(items) => items.borrow().len(),
        Value::Str(s) => s.chars().count(),
        other => return Err(wrong_type("sequencep", other)),
    };
    Ok(Value::Int(n as i64))
}

pub(crate) fn builtin_nth(args: Vec<Value>) -> EvalResult {
    expect_args("nth", &args, 2)?;
    let n = expect_int(&args[0])?;
    let mut cursor = args[1].clone();
    for _ in 0..n.max(0) {
        if !cursor.is_list() {
            return Err(wrong_type("listp", &cursor));
        }
        cursor = cursor.cons_cdr();
    }
    car_of(&cursor)
}

pub(crate) fn builtin_nthcdr(args: Vec<Value>) -> EvalResult {
    expect_args("nthcdr", &args, 2)?;
    let n = expect_int(&args[0])?;
    let mut cursor = args[1].clone();
    for _ in 0..n.max(0) {
        if cursor.is_nil() {
            break;
        }
        cursor = cdr_of(&cursor)?;
    }
    Ok(cursor)
}

pub(crate) fn builtin_last(args: Vec<Value>) -> EvalResult {
    expect_range_args("last", &args, 1, 2)?;
    let n = match args.get(1) {
        None | Some(Value::Nil) => 1,
        Some(v) => expect_natnum(v)?,
    };
    let len = list_length(&args[0]).ok_or_else(|| wrong_type("listp", &args[0]))?;
    let mut cursor = args[0].clone();
    for _ in 0..len.saturating_sub(n) {
        cursor = cursor.cons_cdr();
    }
    Ok(cursor)
}

pub(crate) fn builtin_butlast(args: Vec<Value>) -> EvalResult {
    expect_range_args("butlast", &args, 1, 2)?;
    let n = match args.get(1) {
        None | Some(Value::Nil) => 1,
        Some(v) => expect_natnum(v)?,
    };
    let items = expect_list(&args[0])?;
    let keep = items.len().saturating_sub(n);
    Ok(Value::list(items[..keep].to_vec()))
}

pub(crate) fn builtin_reverse(args: Vec<Value>) -> EvalResult {
    expect_args("reverse", &args, 1)?;
    match &args[0] {
        Value::Vector(items) => {
            let mut items = items.borrow().clone();
            items.reverse();
            Ok(Value::vector(items))
        }
        Value::Str(s) => Ok(Value::string(s.chars().rev().collect::<String>())),
        other => {
            let mut items = expect_list(other)?;
            items.reverse();
            Ok(Value::list(items))
        }
    }
}

/// Reverse in place: lists are rewritten cell by cell, vectors directly.
pub(crate) fn builtin_nreverse(args: Vec<Value>) -> EvalResult {
    expect_args("nreverse", &args, 1)?;
    match &args[0] {
        Value::Vector(items) => {
            items.borrow_mut().reverse();
            Ok(args[0].clone())
        }
        Value::Cons(_) => {
            let mut prev = Value::Nil;
            let mut cursor = args[0].clone();
            while cursor.is_cons() {
                let next = cursor.cons_cdr();
                cursor.set_cdr(prev);
                prev = cursor;
                cursor = next;
            }
            Ok(prev)
        }
        _ => builtin_reverse(args),
    }
}

fn member_by(args: &[Value], name: &str, same: fn(&Value, &Value) -> bool) -> EvalResult {
    expect_args(name, args, 2)?;
    let mut cursor = args[1].clone();
    while cursor.is_cons() {
        if same(&args[0], &cursor.cons_car()) {
            return Ok(cursor);
        }
        cursor = cursor.cons_cdr();
    }
    if !cursor.is_nil() {
        return Err(wrong_type("listp", &args[1]));
    }
    Ok(Value::Nil)
}

fn equal(a: &Value, b: &Value) -> bool {
    equal_value(a, b, 0)
}

pub(crate) fn builtin_member(args: Vec<Value>) -> EvalResult {
    member_by(&args, "member", equal)
}

pub(crate) fn builtin_memq(args: Vec<Value>) -> EvalResult {
    member_by(&args, "memq", eq_value)
}

pub(crate) fn builtin_memql(args: Vec<Value>) -> EvalResult {
    member_by(&args, "memql", eql_value)
}

pub(crate) fn builtin_assq(args: Vec<Value>) -> EvalResult {
    expect_args("assq", &args, 2)?;
    Ok(args[1]
        .iter()
        .find(|entry| entry.is_cons() && eq_value(&entry.cons_car(), &args[0]))
        .unwrap_or(Value::Nil))
}

pub(crate) fn builtin_rassq(args: Vec<Value>) -> EvalResult {
    expect_args("rassq", &args, 2)?;
    Ok(args[1]
        .iter()
        .find(|entry| entry.is_cons() && eq_value(&entry.cons_cdr(), &args[0]))
        .unwrap_or(Value::Nil))
}

/// Find the first alist entry whose key satisfies `test`.
fn assoc_with(
    eval: &mut Evaluator,
    key: &Value,
    alist: &Value,
    testfn: Option<&Value>,
) -> EvalResult {
    for entry in alist.iter() {
        if !entry.is_cons() {
            continue;
        }
        let hit = match testfn {
            Some(f) => eval
                .apply(f.clone(), vec![key.clone(), entry.cons_car()])?
                .is_truthy(),
            None => equal(key, &entry.cons_car()),
        };
        if hit {
            return Ok(entry);
        }
    }
    Ok(Value::Nil)
}

pub(crate) fn builtin_assoc(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("assoc", &args, 2, 3)?;
    let testfn = args.get(2).filter(|f| !f.is_nil());
    assoc_with(eval, &args[0], &args[1], testfn)
}

/// `(alist-get KEY ALIST &optional DEFAULT REMOVE TESTFN)`; `eq` by default.
pub(crate) fn builtin_alist_get(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("alist-get", &args, 2, 5)?;
    let entry = match args.get(4).filter(|f| !f.is_nil()) {
        Some(testfn) => assoc_with(eval, &args[0], &args[1], Some(testfn))?,
        None => builtin_assq(vec![args[0].clone(), args[1].clone()])?,
    };
    if entry.is_cons() {
        Ok(entry.cons_cdr())
    } else {
        Ok(args.get(2).cloned().unwrap_or(Value::Nil))
    }
}

fn remove_by(seq: &Value, elt: &Value, same: fn(&Value, &Value) -> bool) -> EvalResult {
    match seq {
        Value::Vector(items) => Ok(Value::vector(
            items.borrow().iter().filter(|x| !same(elt, x)).cloned().collect(),
        )),
        Value::Str(s) => Ok(Value::string(
            s.chars()
                .filter(|c| !same(elt, &Value::Int(*c as i64)))
                .collect::<String>(),
        )),
        other => Ok(Value::list(
            expect_list(other)?.into_iter().filter(|x| !same(elt, x)).collect(),
        )),
    }
}

pub(crate) fn builtin_delq(args: Vec<Value>) -> EvalResult {
    expect_args("delq", &args, 2)?;
    remove_by(&args[1], &args[0], eq_value)
}

pub(crate) fn builtin_delete(args: Vec<Value>) -> EvalResult {
    expect_args("delete", &args, 2)?;
    remove_by(&args[1], &args[0], equal)
}

pub(crate) fn builtin_remove(args: Vec<Value>) -> EvalResult {
    expect_args("remove", &args, 2)?;
    remove_by(&args[1], &args[0], equal)
}

pub(crate) fn builtin_remq(args: Vec<Value>) -> EvalResult {
    expect_args("remq", &args, 2)?;
    remove_by(&args[1], &args[0], eq_value)
}

pub(crate) fn builtin_setcar(args: Vec<Value>) -> EvalResult {
    expect_args("setcar", &args, 2)?;
    if !args[0].is_cons() {
        return Err(wrong_type("consp", &args[0]));
    }
    args[0].set_car(args[1].clone());
    Ok(args[1].clone())
}

pub(crate) fn builtin_setcdr(args: Vec<Value>) -> EvalResult {
    expect_args("setcdr", &args, 2)?;
    if !args[0].is_cons() {
        return Err(wrong_type("consp", &args[0]));
    }
    args[0].set_cdr(args[1].clone());
    Ok(args[1].clone())
}

pub(crate) fn builtin_number_sequence(args: Vec<Value>) -> EvalResult {
    expect_range_args("number-sequence", &args, 1, 3)?;
    let to = args.get(1).filter(|v| !v.is_nil());
    let Some(to) = to else {
        return Ok(Value::list(vec![args[0].clone()]));
    };
    let step = args.get(2).filter(|v| !v.is_nil());
    if [Some(&args[0]), Some(to), step]
        .iter()
        .flatten()
        .any(|v| matches!(v, Value::Float(_)))
    {
        let from = expect_number(&args[0])?;
        let to = expect_number(to)?;
        let step = step.map(expect_number).transpose()?.unwrap_or(1.0);
        if step == 0.0 {
            return Err(error_message("The increment can not be zero"));
        }
        let mut out = Vec::new();
        let mut n = 0.0;
        loop {
            let x = from + n * step;
            if (step > 0.0 && x > to) || (step < 0.0 && x < to) {
                break;
            }
            out.push(Value::Float(x));
            n += 1.0;
        }
        return Ok(Value::list(out));
    }
    let from = expect_int(&args[0])?;
    let to = expect_int(to)?;
    let step = step.map(expect_int).transpose()?.unwrap_or(1);
    if step == 0 {
        return Err(error_message("The increment can not be zero"));
    }
    let mut out = Vec::new();
    let mut x = from;
    while (step > 0 && x <= to) || (step < 0 && x >= to) {
        out.push(Value::Int(x));
        match x.checked_add(step) {
            Some(next) => x = next,
            None => break,
        }
    }
    Ok(Value::list(out))
}

// ===========================================================================
// Property lists
// ===========================================================================

pub(crate) fn builtin_plist_get(args: Vec<Value>) -> EvalResult {
    expect_range_args("plist-get", &args, 2, 3)?;
    let mut cursor = args[0].clone();
    while cursor.is_cons() && cursor.cons_cdr().is_cons() {
        if eq_value(&cursor.cons_car(), &args[1]) {
            return Ok(cursor.cons_cdr().cons_car());
        }
        cursor = cursor.cons_cdr().cons_cdr();
    }
    Ok(Value::Nil)
}

pub(crate) fn builtin_plist_put(args: Vec<Value>) -> EvalResult {
    expect_range_args("plist-put", &args, 3, 4)?;
    let mut cursor = args[0].clone();
    let mut last_value_cell = Value::Nil;
    while cursor.is_cons() && cursor.cons_cdr().is_cons() {
        let value_cell = cursor.cons_cdr();
        if eq_value(&cursor.cons_car(), &args[1]) {
            value_cell.set_car(args[2].clone());
            return Ok(args[0].clone());
        }
        last_value_cell = value_cell.clone();
        cursor = value_cell.cons_cdr();
    }
    let addition = Value::list(vec![args[1].clone(), args[2].clone()]);
    if last_value_cell.is_cons() {
        last_value_cell.set_cdr(addition);
        Ok(args[0].clone())
    } else {
        Ok(addition)
    }
}

pub(crate) fn builtin_plist_member(args: Vec<Value>) -> EvalResult {
    expect_range_args("plist-member", &args, 2, 3)?;
    let mut cursor = args[0].clone();
    while cursor.is_cons() {
        if eq_value(&cursor.cons_car(), &args[1]) {
            return Ok(cursor);
        }
        cursor = cursor.cons_cdr().cons_cdr();
    }
    Ok(Value::Nil)
}

// ===========================================================================
// Vectors and generic sequences
// ===========================================================================

pub(crate) fn builtin_make_vector(args: Vec<Value>) -> EvalResult {
    expect_args("make-vector", &args, 2)?;
    let n = expect_natnum(&args[0])?;
    Ok(Value::vector(vec![args[1].clone(); n]))
}

pub(crate) fn builtin_vector(args: Vec<Value>) -> EvalResult {
    Ok(Value::vector(args))
}

fn index_error(seq: &Value, index: i64) -> Flow {
    signal("args-out-of-range", vec![seq.clone(), Value::Int(index)])
}

pub(crate) fn builtin_aref(args: Vec<Value>) -> EvalResult {
    expect_args("aref", &args, 2)?;
    let index = expect_int(&args[1])?;
    let i = usize::try_from(index).map_err(|_| index_error(&args[0], index))?;
    match &args[0] {
        Value::Vector(items) => items
            .borrow()
            .get(i)
            .cloned()
            .ok_or_else(|| index_error(&args[0], index)),
        Value::Str(s) => s
            .chars()
            .nth(i)
            .map(|c| Value::Int(c as i64))
            .ok_or_else(|| index_error(&args[0], index)),
        other => Err(wrong_type("arrayp", other)),
    }
}

pub(crate) fn builtin_aset(args: Vec<Value>) -> EvalResult {
    expect_args("aset", &args, 3)?;
    let index = expect_int(&args[1])?;
    let i = usize::try_from(index).map_err(|_| index_error(&args[0], index))?;
    match &args[0] {
        Value::Vector(items) => {
            let mut items = items.borrow_mut();
            let slot = items.get_mut(i).ok_or_else(|| index_error(&args[0], index))?;
            *slot = args[2].clone();
            Ok(args[2].clone())
        }
        other => Err(wrong_type("vectorp", other)),
    }
}

pub(crate) fn builtin_elt(args: Vec<Value>) -> EvalResult {
    expect_args("elt", &args, 2)?;
    match &args[0] {
        Value::Vector(_) | Value::Str(_) => builtin_aref(args),
        _ => {
            let index = expect_int(&args[1])?;
            let len = list_length(&args[0]).ok_or_else(|| wrong_type("listp", &args[0]))?;
            if index < 0 || index as usize >= len {
                return Err(index_error(&args[0], index));
            }
            builtin_nth(vec![args[1].clone(), args[0].clone()])
        }
    }
}

pub(crate) fn builtin_vconcat(args: Vec<Value>) -> EvalResult {
    let mut items = Vec::new();
    for seq in &args {
        items.extend(sequence_items(seq)?);
    }
    Ok(Value::vector(items))
}

pub(crate) fn builtin_copy_sequence(args: Vec<Value>) -> EvalResult {
    expect_args("copy-sequence", &args, 1)?;
    match &args[0] {
        Value::Nil => Ok(Value::Nil),
        Value::Vector(items) => Ok(Value::vector(items.borrow().clone())),
        Value::Str(s) => Ok(Value::string(s.to_string())),
        other => Ok(Value::list(expect_list(other)?)),
    }
}

pub(crate) fn builtin_copy_tree(args: Vec<Value>) -> EvalResult {
    expect_range_args("copy-tree", &args, 1, 2)?;
    fn copy(value: &Value, depth: usize) -> Value {
        match value {
            Value::Cons(_) if depth < 4096 => Value::cons(
                copy(&value.cons_car(), depth + 1),
                copy(&value.cons_cdr(), depth + 1),
            ),
            other => other.clone(),
        }
    }
    Ok(copy(&args[0], 0))
}

pub(crate) fn builtin_fillarray(args: Vec<Value>) -> EvalResult {
    expect_args("fillarray", &args, 2)?;
    match &args[0] {
        Value::Vector(items) => {
            items.borrow_mut().iter_mut().for_each(|slot| *slot = args[1].clone());
            Ok(args[0].clone())
        }
        other => Err(wrong_type("vectorp", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(ns: &[i64]) -> Value {
        Value::list(ns.iter().map(|n| Value::Int(*n)).collect())
    }

    #[test]
    fn append_shares_last_argument() {
        let tail = ints(&[3]);
        let joined = builtin_append(vec![ints(&[1, 2]), tail.clone()]).unwrap();
        assert_eq!(joined, ints(&[1, 2, 3]));
        assert!(eq_value(&joined.cons_cdr().cons_cdr(), &tail));
        let from_vector = builtin_append(vec![Value::vector(vec![Value::Int(1)]), Value::Nil]).unwrap();
        assert_eq!(from_vector, ints(&[1]));
    }

    #[test]
    fn nconc_links_lists_in_place() {
        let a = ints(&[1]);
        let b = ints(&[2, 3]);
        let joined = builtin_nconc(vec![Value::Nil, a.clone(), b]).unwrap();
        assert!(eq_value(&joined, &a));
        assert_eq!(a, ints(&[1, 2, 3]));
    }

    #[test]
    fn nth_and_elt_bounds() {
        assert_eq!(builtin_nth(vec![Value::Int(5), ints(&[1])]).unwrap(), Value::Nil);
        assert_eq!(builtin_nth(vec![Value::Int(1), ints(&[1, 2])]).unwrap(), Value::Int(2));
        assert!(builtin_elt(vec![ints(&[1]), Value::Int(3)]).is_err());
        let v = Value::vector(vec![Value::symbol("a")]);
        assert_eq!(builtin_elt(vec![v, Value::Int(0)]).unwrap(), Value::symbol("a"));
    }

    #[test]
    fn last_and_butlast() {
        assert_eq!(builtin_last(vec![ints(&[1, 2, 3])]).unwrap(), ints(&[3]));
        assert_eq!(builtin_last(vec![ints(&[1, 2, 3]), Value::Int(2)]).unwrap(), ints(&[2, 3]));
        assert_eq!(builtin_butlast(vec![ints(&[1, 2, 3])]).unwrap(), ints(&[1, 2]));
    }

    #[test]
    fn nreverse_relinks_cells() {
        let list = ints(&[1, 2, 3]);
        let reversed = builtin_nreverse(vec![list]).unwrap();
        assert_eq!(reversed, ints(&[3, 2, 1]));
    }

    #[test]
    fn plist_put_updates_or_appends() {
        let plist = Value::list(vec![Value::symbol(":a"), Value::Int(1)]);
        let same = builtin_plist_put(vec![plist.clone(), Value::symbol(":a"), Value::Int(2)]).unwrap();
        assert!(eq_value(&same, &plist));
        let grown = builtin_plist_put(vec![plist.clone(), Value::symbol(":b"), Value::Int(3)]).unwrap();
        assert_eq!(builtin_plist_get(vec![grown, Value::symbol(":b")]).unwrap(), Value::Int(3));
        assert_eq!(builtin_plist_get(vec![plist, Value::symbol(":a")]).unwrap(), Value::Int(2));
    }

    #[test]
    fn number_sequence_steps() {
        assert_eq!(builtin_number_sequence(vec![Value::Int(1), Value::Int(4)]).unwrap(), ints(&[1, 2, 3, 4]));
        assert_eq!(
            builtin_number_sequence(vec![Value::Int(5), Value::Int(1), Value::Int(-2)]).unwrap(),
            ints(&[5, 3, 1])
        );
        assert_eq!(builtin_number_sequence(vec![Value::Int(7)]).unwrap(), ints(&[7]));
    }

    #[test]
    fn aref_on_strings_yields_codes() {
        assert_eq!(builtin_aref(vec![Value::string("héllo"), Value::Int(1)]).unwrap(), Value::Int('é' as i64));
        assert!(matches!(
            builtin_aref(vec![Value::string("a"), Value::Int(3)]),
            Err(Flow::Signal(_))
        ));
        assert!(matches!(builtin_aref(vec![Value::Int(1), Value::Int(0)]), Err(Flow::TypeMismatch(_))));
    }
}
