use super::*;
use crate::elisp::print::format_float;

use rand::Rng;

// ===========================================================================
// Arithmetic
// ===========================================================================

fn has_float(args: &[Value]) -> bool {
    args.iter().any(|a| matches!(a, Value::Float(_)))
}

fn overflow() -> Flow {
    signal("overflow-error", vec![])
}

fn arith_error() -> Flow {
    signal("arith-error", vec![])
}

pub(crate) fn builtin_add(args: Vec<Value>) -> EvalResult {
    if has_float(&args) {
        let mut sum = 0.0f64;
        for a in &args {
            sum += expect_number(a)?;
        }
        Ok(Value::Float(sum))
    } else {
        let mut sum = 0i64;
        for a in &args {
            sum = sum.checked_add(expect_int(a)?).ok_or_else(overflow)?;
        }
        Ok(Value::Int(sum))
    }
}

pub(crate) fn builtin_sub(args: Vec<Value>) -> EvalResult {
    if args.is_empty() {
        return Ok(Value::Int(0));
    }
    if args.len() == 1 {
        return match &args[0] {
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Ok(Value::Int(expect_int(other)?.checked_neg().ok_or_else(overflow)?)),
        };
    }
    if has_float(&args) {
        let mut acc = expect_number(&args[0])?;
        for a in &args[1..] {
            acc -= expect_number(a)?;
        }
        Ok(Value::Float(acc))
    } else {
        let mut acc = expect_int(&args[0])?;
        for a in &args[1..] {
            acc = acc.checked_sub(expect_int(a)?).ok_or_else(overflow)?;
        }
        Ok(Value::Int(acc))
    }
}

pub(crate) fn builtin_mul(args: Vec<Value>) -> EvalResult {
    if has_float(&args) {
        let mut prod = 1.0f64;
        for a in &args {
            prod *= expect_number(a)?;
        }
        Ok(Value::Float(prod))
    } else {
        let mut prod = 1i64;
        for a in &args {
            prod = prod.checked_mul(expect_int(a)?).ok_or_else(overflow)?;
        }
        Ok(Value::Int(prod))
    }
}

pub(crate) fn builtin_div(args: Vec<Value>) -> EvalResult {
    expect_min_args("/", &args, 1)?;
    if args.len() == 1 {
        return builtin_div(vec![Value::Int(1), args[0].clone()]);
    }
    if has_float(&args) {
        let mut acc = expect_number(&args[0])?;
        for a in &args[1..] {
            acc /= expect_number(a)?;
        }
        Ok(Value::Float(acc))
    } else {
        let mut acc = expect_int(&args[0])?;
        for a in &args[1..] {
            let d = expect_int(a)?;
            if d == 0 {
                return Err(arith_error());
            }
            acc = acc.checked_div(d).ok_or_else(overflow)?;
        }
        Ok(Value::Int(acc))
    }
}

pub(crate) fn builtin_percent(args: Vec<Value>) -> EvalResult {
    expect_args("%", &args, 2)?;
    let a = expect_int(&args[0])?;
    let b = expect_int(&args[1])?;
    if b == 0 {
        return Err(arith_error());
    }
    Ok(Value::Int(a.checked_rem(b).ok_or_else(overflow)?))
}

/// Modulus with the sign of the divisor.
pub(crate) fn builtin_mod(args: Vec<Value>) -> EvalResult {
    expect_args("mod", &args, 2)?;
    if has_float(&args) {
        let a = expect_number(&args[0])?;
        let b = expect_number(&args[1])?;
        let r = a % b;
        let r = if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r };
        return Ok(Value::Float(r));
    }
    let a = expect_int(&args[0])?;
    let b = expect_int(&args[1])?;
    if b == 0 {
        return Err(arith_error());
    }
    let r = a.checked_rem(b).ok_or_else(overflow)?;
    Ok(Value::Int(if r != 0 && (r < 0) != (b < 0) { r + b } else { r }))
}

pub(crate) fn builtin_add1(args: Vec<Value>) -> EvalResult {
    expect_args("1+", &args, 1)?;
    match &args[0] {
        Value::Float(f) => Ok(Value::Float(f + 1.0)),
        other => Ok(Value::Int(expect_int(other)?.checked_add(1).ok_or_else(overflow)?)),
    }
}

pub(crate) fn builtin_sub1(args: Vec<Value>) -> EvalResult {
    expect_args("1-", &args, 1)?;
    match &args[0] {
        Value::Float(f) => Ok(Value::Float(f - 1.0)),
        other => Ok(Value::Int(expect_int(other)?.checked_sub(1).ok_or_else(overflow)?)),
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

fn compare_chain(name: &str, args: &[Value], ok: impl Fn(std::cmp::Ordering) -> bool) -> EvalResult {
    expect_min_args(name, args, 1)?;
    for pair in args.windows(2) {
        let ordering = if has_float(pair) {
            let a = expect_number(&pair[0])?;
            let b = expect_number(&pair[1])?;
            match a.partial_cmp(&b) {
                Some(o) => o,
                None => return Ok(Value::Nil),
            }
        } else {
            expect_int(&pair[0])?.cmp(&expect_int(&pair[1])?)
        };
        if !ok(ordering) {
            return Ok(Value::Nil);
        }
    }
    // Single argument still has to be a number.
    expect_number(&args[0])?;
    Ok(Value::True)
}

pub(crate) fn builtin_num_eq(args: Vec<Value>) -> EvalResult {
    compare_chain("=", &args, |o| o.is_eq())
}

pub(crate) fn builtin_num_lt(args: Vec<Value>) -> EvalResult {
    compare_chain("<", &args, |o| o.is_lt())
}

pub(crate) fn builtin_num_le(args: Vec<Value>) -> EvalResult {
    compare_chain("<=", &args, |o| o.is_le())
}

pub(crate) fn builtin_num_gt(args: Vec<Value>) -> EvalResult {
    compare_chain(">", &args, |o| o.is_gt())
}

pub(crate) fn builtin_num_ge(args: Vec<Value>) -> EvalResult {
    compare_chain(">=", &args, |o| o.is_ge())
}

pub(crate) fn builtin_num_ne(args: Vec<Value>) -> EvalResult {
    expect_args("/=", &args, 2)?;
    let eq = builtin_num_eq(args)?;
    Ok(Value::bool(eq.is_nil()))
}

fn extremum(name: &str, args: Vec<Value>, want_max: bool) -> EvalResult {
    expect_min_args(name, &args, 1)?;
    let float = has_float(&args);
    let mut best = args[0].clone();
    let mut best_n = expect_number(&best)?;
    for a in &args[1..] {
        let n = expect_number(a)?;
        if (want_max && n > best_n) || (!want_max && n < best_n) || n.is_nan() {
            best = a.clone();
            best_n = n;
        }
    }
    Ok(if float { Value::Float(best_n) } else { best })
}

pub(crate) fn builtin_max(args: Vec<Value>) -> EvalResult {
    extremum("max", args, true)
}

pub(crate) fn builtin_min(args: Vec<Value>) -> EvalResult {
    extremum("min", args, false)
}

pub(crate) fn builtin_abs(args: Vec<Value>) -> EvalResult {
    expect_args("abs", &args, 1)?;
    match &args[0] {
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Ok(Value::Int(expect_int(other)?.checked_abs().ok_or_else(overflow)?)),
    }
}

// ---------------------------------------------------------------------------
// Rounding
// ---------------------------------------------------------------------------

fn float_to_int(f: f64) -> EvalResult {
    if !f.is_finite() || f >= i64::MAX as f64 || f < i64::MIN as f64 {
        return Err(overflow());
    }
    Ok(Value::Int(f as i64))
}

/// Shared body of `floor`, `ceiling`, `round` and `truncate`: integer
/// operands use exact integer division, anything else goes through floats.
fn rounding(
    name: &str,
    args: &[Value],
    float_op: fn(f64) -> f64,
    int_op: fn(i64, i64) -> i64,
) -> EvalResult {
    expect_range_args(name, args, 1, 2)?;
    let divisor = args.get(1).filter(|d| !d.is_nil());
    match (&args[0], divisor) {
        (Value::Int(n), None) => Ok(Value::Int(*n)),
        (Value::Int(a), Some(Value::Int(b))) => {
            if *b == 0 {
                return Err(arith_error());
            }
            if *a == i64::MIN && *b == -1 {
                return Err(overflow());
            }
            Ok(Value::Int(int_op(*a, *b)))
        }
        (value, divisor) => {
            let mut f = expect_number(value)?;
            if let Some(d) = divisor {
                let d = expect_number(d)?;
                if d == 0.0 {
                    return Err(arith_error());
                }
                f /= d;
            }
            float_to_int(float_op(f))
        }
    }
}

fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

fn ceil_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    if a % b != 0 && ((a < 0) == (b < 0)) {
        q + 1
    } else {
        q
    }
}

/// Nearest integer quotient, ties to even.
fn round_div(a: i64, b: i64) -> i64 {
    let q = floor_div(a, b);
    let r = a - q * b;
    // Compare 2r with |b| on the divisor's side.
    let twice = (r as i128) * 2;
    let b = b as i128;
    let q = q as i128;
    let rounded = if b > 0 {
        if twice > b || (twice == b && q % 2 != 0) {
            q + 1
        } else {
            q
        }
    } else if twice < b || (twice == b && q % 2 != 0) {
        q + 1
    } else {
        q
    };
    rounded as i64
}

pub(crate) fn builtin_floor(args: Vec<Value>) -> EvalResult {
    rounding("floor", &args, f64::floor, floor_div)
}

pub(crate) fn builtin_ceiling(args: Vec<Value>) -> EvalResult {
    rounding("ceiling", &args, f64::ceil, ceil_div)
}

pub(crate) fn builtin_round(args: Vec<Value>) -> EvalResult {
    rounding("round", &args, f64::round_ties_even, round_div)
}

pub(crate) fn builtin_truncate(args: Vec<Value>) -> EvalResult {
    rounding("truncate", &args, f64::trunc, |a, b| a / b)
}

pub(crate) fn builtin_float(args: Vec<Value>) -> EvalResult {
    expect_args("float", &args, 1)?;
    Ok(Value::Float(expect_number(&args[0])?))
}

pub(crate) fn builtin_expt(args: Vec<Value>) -> EvalResult {
    expect_args("expt", &args, 2)?;
    match (&args[0], &args[1]) {
        (Value::Int(base), Value::Int(exp)) if *exp >= 0 => {
            let exp = u32::try_from(*exp).map_err(|_| overflow())?;
            Ok(Value::Int(base.checked_pow(exp).ok_or_else(overflow)?))
        }
        (base, exp) => Ok(Value::Float(expect_number(base)?.powf(expect_number(exp)?))),
    }
}

pub(crate) fn builtin_sqrt(args: Vec<Value>) -> EvalResult {
    expect_args("sqrt", &args, 1)?;
    Ok(Value::Float(expect_number(&args[0])?.sqrt()))
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

pub(crate) fn builtin_oddp(args: Vec<Value>) -> EvalResult {
    expect_args("cl-oddp", &args, 1)?;
    Ok(Value::bool(expect_int(&args[0])? % 2 != 0))
}

pub(crate) fn builtin_evenp(args: Vec<Value>) -> EvalResult {
    expect_args("cl-evenp", &args, 1)?;
    Ok(Value::bool(expect_int(&args[0])? % 2 == 0))
}

pub(crate) fn builtin_zerop(args: Vec<Value>) -> EvalResult {
    expect_args("zerop", &args, 1)?;
    Ok(Value::bool(expect_number(&args[0])? == 0.0))
}

pub(crate) fn builtin_natnump(args: Vec<Value>) -> EvalResult {
    expect_args("natnump", &args, 1)?;
    Ok(Value::bool(matches!(args[0], Value::Int(n) if n >= 0)))
}

pub(crate) fn builtin_numberp(args: Vec<Value>) -> EvalResult {
    expect_args("numberp", &args, 1)?;
    Ok(Value::bool(args[0].is_number()))
}

pub(crate) fn builtin_integerp(args: Vec<Value>) -> EvalResult {
    expect_args("integerp", &args, 1)?;
    Ok(Value::bool(matches!(args[0], Value::Int(_))))
}

pub(crate) fn builtin_floatp(args: Vec<Value>) -> EvalResult {
    expect_args("floatp", &args, 1)?;
    Ok(Value::bool(matches!(args[0], Value::Float(_))))
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

pub(crate) fn builtin_number_to_string(args: Vec<Value>) -> EvalResult {
    expect_args("number-to-string", &args, 1)?;
    match &args[0] {
        Value::Int(n) => Ok(Value::string(n.to_string())),
        Value::Float(f) => Ok(Value::string(format_float(*f))),
        other => Err(wrong_type("numberp", other)),
    }
}

/// Parse the longest numeric prefix of `s` (after leading whitespace);
/// anything unparseable reads as 0.
pub(crate) fn parse_number_prefix(s: &str, base: u32) -> Value {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    if base != 10 {
        let digits_start = end;
        while end < bytes.len() && (bytes[end] as char).is_digit(base) {
            end += 1;
        }
        if end == digits_start {
            return Value::Int(0);
        }
        return i64::from_str_radix(&s[..end], base)
            .map(Value::Int)
            .unwrap_or(Value::Int(0));
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let int_end = end;
    let mut is_float = false;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start {
            end = frac_end;
            is_float = true;
        }
    }
    if end > int_start && end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > digits {
            end = exp_end;
            is_float = true;
        }
    }
    if is_float {
        return s[..end].parse::<f64>().map(Value::Float).unwrap_or(Value::Int(0));
    }
    if int_end == int_start {
        return Value::Int(0);
    }
    s[..int_end]
        .parse::<i64>()
        .map(Value::Int)
        .unwrap_or_else(|_| s[..int_end].parse::<f64>().map(Value::Float).unwrap_or(Value::Int(0)))
}

pub(crate) fn builtin_string_to_number(args: Vec<Value>) -> EvalResult {
    expect_range_args("string-to-number", &args, 1, 2)?;
    let s = expect_string(&args[0])?;
    let base = match args.get(1) {
        None | Some(Value::Nil) => 10,
        Some(b) => {
            let b = expect_int(b)?;
            if !(2..=16).contains(&b) {
                return Err(signal("args-out-of-range", vec![Value::Int(b)]));
            }
            b as u32
        }
    };
    Ok(parse_number_prefix(&s, base))
}

// ---------------------------------------------------------------------------
// Bitwise
// ---------------------------------------------------------------------------

fn fold_ints(args: &[Value], init: i64, op: fn(i64, i64) -> i64) -> EvalResult {
    let mut acc = init;
    for a in args {
        acc = op(acc, expect_int(a)?);
    }
    Ok(Value::Int(acc))
}

pub(crate) fn builtin_logand(args: Vec<Value>) -> EvalResult {
    fold_ints(&args, -1, |a, b| a & b)
}

pub(crate) fn builtin_logior(args: Vec<Value>) -> EvalResult {
    fold_ints(&args, 0, |a, b| a | b)
}

pub(crate) fn builtin_logxor(args: Vec<Value>) -> EvalResult {
    fold_ints(&args, 0, |a, b| a ^ b)
}

pub(crate) fn builtin_lognot(args: Vec<Value>) -> EvalResult {
    expect_args("lognot", &args, 1)?;
    Ok(Value::Int(!expect_int(&args[0])?))
}

pub(crate) fn builtin_ash(args: Vec<Value>) -> EvalResult {
    expect_args("ash", &args, 2)?;
    let value = expect_int(&args[0])?;
    let count = expect_int(&args[1])?;
    if count >= 0 {
        let shift = u32::try_from(count).map_err(|_| overflow())?;
        let shifted = value.checked_shl(shift).ok_or_else(overflow)?;
        if shifted >> shift != value {
            return Err(overflow());
        }
        Ok(Value::Int(shifted))
    } else {
        let shift = count.unsigned_abs().min(63) as u32;
        Ok(Value::Int(value >> shift))
    }
}

// ---------------------------------------------------------------------------
// Random (needs the evaluator's generator)
// ---------------------------------------------------------------------------

/// `(random LIMIT)`: an integer in `[0, LIMIT)`; a non-positive limit gives 0.
/// Without a limit, any fixnum.
pub(crate) fn builtin_random(eval: &mut Evaluator, args: Vec<Value>) -> EvalResult {
    expect_max_args("random", &args, 1)?;
    match args.first() {
        Some(Value::Int(limit)) if *limit <= 0 => Ok(Value::Int(0)),
        Some(Value::Int(limit)) => Ok(Value::Int(eval.rng.random_range(0..*limit))),
        Some(Value::Str(_)) => Ok(Value::Int(eval.rng.random_range(0..i64::MAX))),
        _ => Ok(Value::Int(eval.rng.random())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(ns: &[i64]) -> Vec<Value> {
        ns.iter().map(|n| Value::Int(*n)).collect()
    }

    #[test]
    fn integer_arithmetic_is_checked() {
        assert_eq!(builtin_add(ints(&[1, 2, 3])).unwrap(), Value::Int(6));
        assert_eq!(builtin_sub(ints(&[5])).unwrap(), Value::Int(-5));
        assert_eq!(builtin_div(ints(&[7, 2])).unwrap(), Value::Int(3));
        match builtin_add(ints(&[i64::MAX, 1])) {
            Err(Flow::Signal(sig)) => assert_eq!(sig.symbol, "overflow-error"),
            other => panic!("unexpected {other:?}"),
        }
        match builtin_div(ints(&[1, 0])) {
            Err(Flow::Signal(sig)) => assert_eq!(sig.symbol, "arith-error"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn floats_are_contagious() {
        let sum = builtin_add(vec![Value::Int(1), Value::Float(0.5)]).unwrap();
        assert_eq!(sum, Value::Float(1.5));
        assert_eq!(builtin_max(vec![Value::Int(1), Value::Float(0.5)]).unwrap(), Value::Float(1.0));
    }

    #[test]
    fn mod_follows_divisor_sign() {
        assert_eq!(builtin_mod(ints(&[-7, 3])).unwrap(), Value::Int(2));
        assert_eq!(builtin_mod(ints(&[7, -3])).unwrap(), Value::Int(-2));
        assert_eq!(builtin_percent(ints(&[-7, 3])).unwrap(), Value::Int(-1));
    }

    #[test]
    fn rounding_with_and_without_divisor() {
        assert_eq!(builtin_floor(ints(&[-7, 2])).unwrap(), Value::Int(-4));
        assert_eq!(builtin_ceiling(ints(&[7, 2])).unwrap(), Value::Int(4));
        assert_eq!(builtin_truncate(vec![Value::Float(-2.7)]).unwrap(), Value::Int(-2));
        assert_eq!(builtin_round(vec![Value::Float(2.5)]).unwrap(), Value::Int(2));
        assert_eq!(builtin_round(ints(&[5, 2])).unwrap(), Value::Int(2));
        assert_eq!(builtin_round(ints(&[7, 2])).unwrap(), Value::Int(4));
    }

    #[test]
    fn comparisons_chain() {
        assert_eq!(builtin_num_lt(ints(&[1, 2, 3])).unwrap(), Value::True);
        assert_eq!(builtin_num_lt(ints(&[1, 3, 2])).unwrap(), Value::Nil);
        assert_eq!(builtin_num_eq(vec![Value::Int(1), Value::Float(1.0)]).unwrap(), Value::True);
        assert_eq!(builtin_num_ne(ints(&[1, 2])).unwrap(), Value::True);
        assert!(matches!(builtin_num_lt(vec![Value::string("a"), Value::Int(1)]), Err(Flow::TypeMismatch(_))));
    }

    #[test]
    fn string_to_number_reads_prefixes() {
        assert_eq!(parse_number_prefix("  42abc", 10), Value::Int(42));
        assert_eq!(parse_number_prefix("3.5", 10), Value::Float(3.5));
        assert_eq!(parse_number_prefix("-1e3", 10), Value::Float(-1000.0));
        assert_eq!(parse_number_prefix("abc", 10), Value::Int(0));
        assert_eq!(parse_number_prefix("ff", 16), Value::Int(255));
    }

    #[test]
    fn shifts_and_bits() {
        assert_eq!(builtin_ash(ints(&[1, 4])).unwrap(), Value::Int(16));
        assert_eq!(builtin_ash(ints(&[-16, -2])).unwrap(), Value::Int(-4));
        assert_eq!(builtin_logand(ints(&[12, 10])).unwrap(), Value::Int(8));
        assert_eq!(builtin_logior(ints(&[12, 3])).unwrap(), Value::Int(15));
    }
}
