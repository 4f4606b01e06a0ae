use super::*;

/// Functions stored in a hook value: a single function or a list of them.
fn hook_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Nil => Vec::new(),
        Value::Cons(_) if value.cons_car().is_symbol_named("lambda") => vec![value.clone()],
        Value::Cons(_) => list_to_vec(value).unwrap_or_else(|| vec![value.clone()]),
        other => vec![other.clone()],
    }
}

/// Functions to run for `hook`: the current buffer's local entries first,
/// then the global value.  A `t` entry is the local list's placeholder for
/// the globals and is skipped.
pub(crate) fn hook_functions(eval: &mut Evaluator, hook: &str) -> Vec<Value> {
    let mut functions: Vec<Value> = eval
        .buffers
        .current_buffer_mut()
        .local_hooks(hook)
        .into_iter()
        .filter(|f| !matches!(f, Value::True))
        .collect();
    if let Some(global) = eval.globals.get(hook) {
        functions.extend(hook_list(global));
    }
    functions
}

/// Run `hook` with `args`, stopping early when `stop` accepts a result.
fn run_hook(
    eval: &mut Evaluator,
    hook: &str,
    args: &[Value],
    stop: impl Fn(&Value) -> bool,
) -> Result<Option<Value>, Flow> {
    for function in hook_functions(eval, hook) {
        let result = eval.apply(function, args.to_vec())?;
        if stop(&result) {
            return Ok(Some(result));
        }
    }
    Ok(None)
}

/// `(add-hook HOOK FUNCTION &optional APPEND LOCAL)`.
pub(crate) fn builtin_add_hook(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("add-hook", &args, 2, 4)?;
    let hook = expect_symbol_name(&args[0])?;
    let function = args[1].clone();
    let append = args.get(2).is_some_and(Value::is_truthy);
    if args.get(3).is_some_and(Value::is_truthy) {
        eval.buffers
            .current_buffer_mut()
            .add_local_hook(&hook, function, append);
        return Ok(Value::Nil);
    }
    let mut functions = eval.globals.get(&hook).map(hook_list).unwrap_or_default();
    if !functions.iter().any(|f| *f == function) {
        if append {
            functions.push(function);
        } else {
            functions.insert(0, function);
        }
    }
    eval.specials.insert(hook.clone());
    eval.globals.insert(hook, Value::list(functions));
    Ok(Value::Nil)
}

pub(crate) fn builtin_remove_hook(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_range_args("remove-hook", &args, 2, 3)?;
    let hook = expect_symbol_name(&args[0])?;
    if args.get(2).is_some_and(Value::is_truthy) {
        eval.buffers
            .current_buffer_mut()
            .remove_local_hook(&hook, &args[1]);
        return Ok(Value::Nil);
    }
    if let Some(current) = eval.globals.get(&hook) {
        let kept: Vec<Value> = hook_list(current)
            .into_iter()
            .filter(|f| *f != args[1])
            .collect();
        eval.globals.insert(hook, Value::list(kept));
    }
    Ok(Value::Nil)
}

/// `run-hooks` and `run-mode-hooks`.
pub(crate) fn builtin_run_hooks(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    for hook in &args {
        let hook = expect_symbol_name(hook)?;
        run_hook(eval, &hook, &[], |_| false)?;
    }
    Ok(Value::Nil)
}

pub(crate) fn builtin_run_hook_with_args(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("run-hook-with-args", &args, 1)?;
    let hook = expect_symbol_name(&args[0])?;
    run_hook(eval, &hook, &args[1..], |_| false)?;
    Ok(Value::Nil)
}

pub(crate) fn builtin_run_hook_with_args_until_success(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("run-hook-with-args-until-success", &args, 1)?;
    let hook = expect_symbol_name(&args[0])?;
    Ok(run_hook(eval, &hook, &args[1..], Value::is_truthy)?.unwrap_or(Value::Nil))
}

pub(crate) fn builtin_run_hook_with_args_until_failure(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_min_args("run-hook-with-args-until-failure", &args, 1)?;
    let hook = expect_symbol_name(&args[0])?;
    let failed = run_hook(eval, &hook, &args[1..], Value::is_nil)?;
    Ok(Value::bool(failed.is_none()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_hooks_run_in_order_without_duplicates() {
        let mut ev = Evaluator::new();
        let out = ev
            .eval_str(
                "(setq trail nil)
                 (defun h1 () (push 'h1 trail))
                 (defun h2 () (push 'h2 trail))
                 (add-hook 'game-hook #'h1)
                 (add-hook 'game-hook #'h2 t)
                 (add-hook 'game-hook #'h1)
                 (run-hooks 'game-hook)
                 (nreverse trail)",
            )
            .unwrap();
        assert_eq!(out.to_string(), "(h1 h2)");
        ev.eval_str("(remove-hook 'game-hook #'h1)").unwrap();
        assert_eq!(ev.eval_str("game-hook").unwrap().to_string(), "(h2)");
    }

    #[test]
    fn local_hooks_run_before_globals() {
        let mut ev = Evaluator::new();
        let out = ev
            .eval_str(
                "(setq trail nil)
                 (setq tick-hook (lambda (n) (push (list 'global n) trail)))
                 (add-hook 'tick-hook (lambda (n) (push (list 'local n) trail)) nil t)
                 (run-hook-with-args 'tick-hook 3)
                 (nreverse trail)",
            )
            .unwrap();
        assert_eq!(out.to_string(), "((local 3) (global 3))");
    }

    #[test]
    fn until_success_and_failure() {
        let mut ev = Evaluator::new();
        ev.eval_str("(add-hook 'check-hook #'ignore) (add-hook 'check-hook #'identity t)")
            .unwrap();
        assert_eq!(
            ev.eval_str("(run-hook-with-args-until-success 'check-hook 7)").unwrap(),
            Value::Int(7)
        );
        assert_eq!(
            ev.eval_str("(run-hook-with-args-until-failure 'check-hook 7)").unwrap(),
            Value::Nil
        );
        assert_eq!(ev.eval_str("(run-hooks 'no-such-hook)").unwrap(), Value::Nil);
    }
}
