use super::*;

// ===========================================================================
// Type predicates and equality
// ===========================================================================

fn one_arg<'a>(name: &str, args: &'a [Value]) -> Result<&'a Value, Flow> {
    expect_args(name, args, 1)?;
    Ok(&args[0])
}

pub(crate) fn builtin_null(args: Vec<Value>) -> EvalResult {
    Ok(Value::bool(one_arg("null", &args)?.is_nil()))
}

pub(crate) fn builtin_not(args: Vec<Value>) -> EvalResult {
    Ok(Value::bool(one_arg("not", &args)?.is_nil()))
}

pub(crate) fn builtin_eq(args: Vec<Value>) -> EvalResult {
    expect_args("eq", &args, 2)?;
    Ok(Value::bool(eq_value(&args[0], &args[1])))
}

pub(crate) fn builtin_eql(args: Vec<Value>) -> EvalResult {
    expect_args("eql", &args, 2)?;
    Ok(Value::bool(eql_value(&args[0], &args[1])))
}

pub(crate) fn builtin_equal(args: Vec<Value>) -> EvalResult {
    expect_args("equal", &args, 2)?;
    Ok(Value::bool(equal_value(&args[0], &args[1], 0)))
}

pub(crate) fn builtin_identity(args: Vec<Value>) -> EvalResult {
    Ok(one_arg("identity", &args)?.clone())
}

pub(crate) fn builtin_ignore(_args: Vec<Value>) -> EvalResult {
    Ok(Value::Nil)
}

pub(crate) fn builtin_stringp(args: Vec<Value>) -> EvalResult {
    Ok(Value::bool(one_arg("stringp", &args)?.is_string()))
}

pub(crate) fn builtin_symbolp(args: Vec<Value>) -> EvalResult {
    Ok(Value::bool(one_arg("symbolp", &args)?.is_symbol()))
}

pub(crate) fn builtin_keywordp(args: Vec<Value>) -> EvalResult {
    Ok(Value::bool(matches!(one_arg("keywordp", &args)?, Value::Keyword(_))))
}

pub(crate) fn builtin_booleanp(args: Vec<Value>) -> EvalResult {
    Ok(Value::bool(matches!(one_arg("booleanp", &args)?, Value::Nil | Value::True)))
}

pub(crate) fn builtin_consp(args: Vec<Value>) -> EvalResult {
    Ok(Value::bool(one_arg("consp", &args)?.is_cons()))
}

pub(crate) fn builtin_listp(args: Vec<Value>) -> EvalResult {
    Ok(Value::bool(one_arg("listp", &args)?.is_list()))
}

pub(crate) fn builtin_nlistp(args: Vec<Value>) -> EvalResult {
    Ok(Value::bool(!one_arg("nlistp", &args)?.is_list()))
}

pub(crate) fn builtin_atom(args: Vec<Value>) -> EvalResult {
    Ok(Value::bool(!one_arg("atom", &args)?.is_cons()))
}

pub(crate) fn builtin_vectorp(args: Vec<Value>) -> EvalResult {
    Ok(Value::bool(matches!(one_arg("vectorp", &args)?, Value::Vector(_))))
}

pub(crate) fn builtin_arrayp(args: Vec<Value>) -> EvalResult {
    Ok(Value::bool(matches!(one_arg("arrayp", &args)?, Value::Vector(_) | Value::Str(_))))
}

pub(crate) fn builtin_sequencep(args: Vec<Value>) -> EvalResult {
    let value = one_arg("sequencep", &args)?;
    Ok(Value::bool(matches!(value, Value::Vector(_) | Value::Str(_)) || value.is_list()))
}

pub(crate) fn builtin_bufferp(args: Vec<Value>) -> EvalResult {
    Ok(Value::bool(matches!(one_arg("bufferp", &args)?, Value::Buffer(_))))
}

pub(crate) fn builtin_characterp(args: Vec<Value>) -> EvalResult {
    let value = one_arg("characterp", &args)?;
    Ok(Value::bool(matches!(value, Value::Int(n) if (0..=0x3F_FFFF).contains(n))))
}

pub(crate) fn builtin_subrp(args: Vec<Value>) -> EvalResult {
    Ok(Value::bool(matches!(one_arg("subrp", &args)?, Value::Subr(_))))
}

pub(crate) fn builtin_type_of(args: Vec<Value>) -> EvalResult {
    Ok(Value::symbol(one_arg("type-of", &args)?.type_name()))
}

pub(crate) fn builtin_symbol_name(args: Vec<Value>) -> EvalResult {
    let value = one_arg("symbol-name", &args)?;
    value
        .as_symbol_name()
        .map(Value::string)
        .ok_or_else(|| wrong_type("symbolp", value))
}

/// Symbols are compared by name, so an uninterned symbol is just a fresh one.
pub(crate) fn builtin_make_symbol(args: Vec<Value>) -> EvalResult {
    Ok(Value::symbol(expect_string(one_arg("make-symbol", &args)?)?))
}

// ===========================================================================
// Symbol cells (need the evaluator)
// ===========================================================================

pub(crate) fn builtin_intern(_eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("intern", &args, 1, 2)?;
    Ok(Value::symbol(expect_string(&args[0])?))
}

/// A symbol is "interned" here once anything refers to it by name: a value,
/// a function definition or a property.
pub(crate) fn builtin_intern_soft(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("intern-soft", &args, 1, 2)?;
    let name = match &args[0] {
        Value::Str(s) => s.to_string(),
        other => expect_symbol_name(other)?,
    };
    let known = eval.globals.contains_key(&name)
        || eval.is_fbound(&name)
        || eval.plists.contains_key(&name)
        || matches!(name.as_str(), "nil" | "t");
    Ok(if known { Value::symbol(name) } else { Value::Nil })
}

pub(crate) fn builtin_symbol_value(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("symbol-value", &args, 1)?;
    let name = expect_symbol_name(&args[0])?;
    if matches!(args[0], Value::Nil | Value::True | Value::Keyword(_)) {
        return Ok(args[0].clone());
    }
    let env = eval.toplevel_env();
    eval.lookup_variable(&name, &env)
        .ok_or_else(|| signal("void-variable", vec![args[0].clone()]))
}

pub(crate) fn builtin_boundp(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("boundp", &args, 1)?;
    if matches!(args[0], Value::Nil | Value::True | Value::Keyword(_)) {
        return Ok(Value::True);
    }
    let name = expect_symbol_name(&args[0])?;
    let env = eval.toplevel_env();
    Ok(Value::bool(eval.lookup_variable(&name, &env).is_some()))
}

pub(crate) fn builtin_set(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("set", &args, 2)?;
    let name = expect_symbol_name(&args[0])?;
    let env = eval.toplevel_env();
    eval.set_variable(&name, args[1].clone(), &env)?;
    Ok(args[1].clone())
}

pub(crate) fn builtin_makunbound(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("makunbound", &args, 1)?;
    let name = expect_symbol_name(&args[0])?;
    eval.globals.remove(&name);
    eval.buffers.current_buffer_mut().kill_local_variable(&name);
    Ok(args[0].clone())
}

pub(crate) fn builtin_default_value(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("default-value", &args, 1)?;
    let name = expect_symbol_name(&args[0])?;
    eval.globals
        .get(&name)
        .cloned()
        .ok_or_else(|| signal("void-variable", vec![args[0].clone()]))
}

pub(crate) fn builtin_set_default(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("set-default", &args, 2)?;
    let name = expect_symbol_name(&args[0])?;
    eval.globals.insert(name, args[1].clone());
    Ok(args[1].clone())
}

pub(crate) fn builtin_special_variable_p(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("special-variable-p", &args, 1)?;
    let name = expect_symbol_name(&args[0])?;
    Ok(Value::bool(eval.specials.contains(&name)))
}

pub(crate) fn builtin_symbol_function(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("symbol-function", &args, 1)?;
    let name = expect_symbol_name(&args[0])?;
    if let Some(definition) = eval.functions.get(&name) {
        return Ok(definition.clone());
    }
    Ok(if is_builtin(&name) {
        Value::subr(&name)
    } else {
        Value::Nil
    })
}

pub(crate) fn builtin_indirect_function(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("indirect-function", &args, 1, 2)?;
    match args[0].as_symbol_name() {
        Some(name) if !args[0].is_nil() => Ok(eval.indirect_function(name).unwrap_or(Value::Nil)),
        _ => Ok(args[0].clone()),
    }
}

pub(crate) fn builtin_fboundp(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("fboundp", &args, 1)?;
    let name = expect_symbol_name(&args[0])?;
    Ok(Value::bool(eval.is_fbound(&name)))
}

pub(crate) fn builtin_fset(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("fset", &args, 2)?;
    let name = expect_symbol_name(&args[0])?;
    if args[0].is_nil() && args[1].is_truthy() {
        return Err(signal("setting-constant", vec![Value::Nil]));
    }
    eval.fset(&name, args[1].clone())?;
    Ok(args[1].clone())
}

pub(crate) fn builtin_fmakunbound(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("fmakunbound", &args, 1)?;
    let name = expect_symbol_name(&args[0])?;
    eval.functions.remove(&name);
    Ok(args[0].clone())
}

/// `(functionp OBJECT)`: closures, builtins and symbols naming either.
pub(crate) fn builtin_functionp(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("functionp", &args, 1)?;
    let callable = match &args[0] {
        Value::Lambda(_) | Value::Subr(_) => true,
        Value::Symbol(name) => matches!(
            eval.indirect_function(name),
            Some(Value::Lambda(_) | Value::Subr(_))
        ),
        Value::Cons(_) => args[0].cons_car().is_symbol_named("lambda"),
        _ => false,
    };
    Ok(Value::bool(callable))
}

pub(crate) fn builtin_macrop(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("macrop", &args, 1)?;
    let is_macro = match &args[0] {
        Value::Macro(_) => true,
        Value::Symbol(name) => eval.functions.contains_key(&**name)
            && matches!(eval.indirect_function(name), Some(Value::Macro(_))),
        _ => false,
    };
    Ok(Value::bool(is_macro))
}

// ===========================================================================
// Property lists
// ===========================================================================

pub(crate) fn builtin_put(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("put", &args, 3)?;
    let name = expect_symbol_name(&args[0])?;
    let plist = eval.plists.entry(name).or_default();
    match plist.iter_mut().find(|(key, _)| eq_value(key, &args[1])) {
        Some((_, slot)) => *slot = args[2].clone(),
        None => plist.push((args[1].clone(), args[2].clone())),
    }
    Ok(args[2].clone())
}

pub(crate) fn builtin_get(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("get", &args, 2)?;
    let name = expect_symbol_name(&args[0])?;
    Ok(eval
        .plists
        .get(&name)
        .and_then(|plist| plist.iter().find(|(key, _)| eq_value(key, &args[1])))
        .map(|(_, value)| value.clone())
        .unwrap_or(Value::Nil))
}

pub(crate) fn builtin_symbol_plist(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("symbol-plist", &args, 1)?;
    let name = expect_symbol_name(&args[0])?;
    let flat = eval
        .plists
        .get(&name)
        .map(|plist| {
            plist
                .iter()
                .flat_map(|(k, v)| [k.clone(), v.clone()])
                .collect()
        })
        .unwrap_or_default();
    Ok(Value::list(flat))
}

pub(crate) fn builtin_setplist(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_args("setplist", &args, 2)?;
    let name = expect_symbol_name(&args[0])?;
    let items = expect_list(&args[1])?;
    let pairs = items
        .chunks(2)
        .map(|pair| (pair[0].clone(), pair.get(1).cloned().unwrap_or(Value::Nil)))
        .collect();
    eval.plists.insert(name, pairs);
    Ok(args[1].clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> Value {
        Value::symbol(name)
    }

    #[test]
    fn predicates() {
        assert_eq!(builtin_null(vec![Value::Nil]).unwrap(), Value::True);
        assert_eq!(builtin_atom(vec![Value::vector(vec![])]).unwrap(), Value::True);
        assert_eq!(builtin_keywordp(vec![sym(":k")]).unwrap(), Value::True);
        assert_eq!(builtin_keywordp(vec![sym("k")]).unwrap(), Value::Nil);
        assert_eq!(builtin_sequencep(vec![Value::string("s")]).unwrap(), Value::True);
        assert_eq!(builtin_characterp(vec![Value::Int(-1)]).unwrap(), Value::Nil);
        assert_eq!(builtin_type_of(vec![Value::Float(1.0)]).unwrap(), sym("float"));
        assert!(matches!(builtin_null(vec![]), Err(Flow::Arity(_))));
    }

    #[test]
    fn equality_levels() {
        let a = Value::string("x");
        let b = Value::string("x");
        assert_eq!(builtin_equal(vec![a.clone(), b.clone()]).unwrap(), Value::True);
        assert_eq!(builtin_eql(vec![Value::Float(1.5), Value::Float(1.5)]).unwrap(), Value::True);
        assert_eq!(builtin_eq(vec![sym("a"), sym("a")]).unwrap(), Value::True);
    }

    #[test]
    fn property_lists() {
        let mut ev = Evaluator::new();
        builtin_put(&mut ev, vec![sym("snake"), sym("speed"), Value::Int(3)]).unwrap();
        builtin_put(&mut ev, vec![sym("snake"), sym("speed"), Value::Int(4)]).unwrap();
        assert_eq!(builtin_get(&mut ev, vec![sym("snake"), sym("speed")]).unwrap(), Value::Int(4));
        assert_eq!(builtin_get(&mut ev, vec![sym("snake"), sym("size")]).unwrap(), Value::Nil);
        assert_eq!(
            builtin_symbol_plist(&mut ev, vec![sym("snake")]).unwrap(),
            Value::list(vec![sym("speed"), Value::Int(4)])
        );
    }

    #[test]
    fn value_and_function_cells() {
        let mut ev = Evaluator::new();
        assert_eq!(builtin_boundp(&mut ev, vec![sym("score")]).unwrap(), Value::Nil);
        builtin_set(&mut ev, vec![sym("score"), Value::Int(10)]).unwrap();
        assert_eq!(builtin_symbol_value(&mut ev, vec![sym("score")]).unwrap(), Value::Int(10));
        builtin_makunbound(&mut ev, vec![sym("score")]).unwrap();
        assert!(builtin_symbol_value(&mut ev, vec![sym("score")]).is_err());

        assert_eq!(builtin_fboundp(&mut ev, vec![sym("car")]).unwrap(), Value::True);
        assert_eq!(builtin_symbol_function(&mut ev, vec![sym("car")]).unwrap(), Value::subr("car"));
        assert_eq!(builtin_functionp(&mut ev, vec![sym("car")]).unwrap(), Value::True);
        assert_eq!(builtin_functionp(&mut ev, vec![sym("when")]).unwrap(), Value::Nil);
        assert_eq!(builtin_intern_soft(&mut ev, vec![Value::string("no-such-thing")]).unwrap(), Value::Nil);
    }
}
