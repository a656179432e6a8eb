use std::{
    cell::{Cell, OnceCell},
    cmp::Ordering,
    time::{SystemTime, UNIX_EPOCH},
};

use chrono::{Datelike, Local, Timelike};
use indexmap::IndexMap;

use crate::{
    diagnostics::{error, ErrorKind, Result},
    object::{to_array, Array, AssocArray, BuiltinFunction, Filter, Fold, MapFn, VARIADIC},
    value::{compare, to_bool, to_date, to_double, to_int, Value},
};

thread_local! {
    static GLOBALS: OnceCell<IndexMap<&'static str, Value>> = const { OnceCell::new() };
    static RND_STATE: Cell<u64> = const { Cell::new(0) };
}

/// Looks up a built-in binding. The table is built once per thread; values
/// hold `Rc` handles and cannot cross threads.
pub(crate) fn global(name: &str) -> Option<Value> {
    GLOBALS.with(|cell| cell.get_or_init(install).get(name).cloned())
}

fn native(name: &'static str, arity: usize, callback: fn(&[Value]) -> Result<Value>) -> Value {
    Value::object(BuiltinFunction {
        name,
        arity,
        callback,
    })
}

fn install() -> IndexMap<&'static str, Value> {
    let mut globals = IndexMap::new();

    globals.insert("empty", Value::Empty);
    globals.insert("true", Value::from_bool(true));
    globals.insert("false", Value::from_bool(false));
    globals.insert("hash", Value::object(AssocArray::new()));

    globals.insert("bool", native("bool", 1, conv_bool));
    globals.insert("int", native("int", 1, conv_int));
    globals.insert("dbl", native("dbl", 1, conv_dbl));
    globals.insert("str", native("str", 1, conv_str));
    globals.insert("date", native("date", 1, conv_date));

    globals.insert("now", native("now", 0, date_now));
    globals.insert("day", native("day", 1, date_day));
    globals.insert("month", native("month", 1, date_month));
    globals.insert("year", native("year", 1, date_year));
    globals.insert("hour", native("hour", 1, date_hour));
    globals.insert("minute", native("minute", 1, date_minute));
    globals.insert("second", native("second", 1, date_second));
    globals.insert("dayofweek", native("dayofweek", 1, date_dayofweek));
    globals.insert("dayofyear", native("dayofyear", 1, date_dayofyear));

    globals.insert("pi", native("pi", 0, math_pi));
    globals.insert("rnd", native("rnd", 0, math_rnd));
    globals.insert("sin", native("sin", 1, math_sin));
    globals.insert("cos", native("cos", 1, math_cos));
    globals.insert("tan", native("tan", 1, math_tan));
    globals.insert("atan", native("atan", 1, math_atan));
    globals.insert("atan2", native("atan2", 2, math_atan2));
    globals.insert("abs", native("abs", 1, math_abs));
    globals.insert("exp", native("exp", 1, math_exp));
    globals.insert("log", native("log", 1, math_log));
    globals.insert("sqr", native("sqr", 1, math_sqr));
    globals.insert("sqrt", native("sqrt", 1, math_sqrt));
    globals.insert("sgn", native("sgn", 1, math_sgn));
    globals.insert("fract", native("fract", 1, math_fract));

    globals.insert("chr", native("chr", 1, str_chr));
    globals.insert("asc", native("asc", 1, str_asc));
    globals.insert("len", native("len", 1, str_len));
    globals.insert("left", native("left", 2, str_left));
    globals.insert("right", native("right", 2, str_right));
    globals.insert("mid", native("mid", 3, str_mid));
    globals.insert("upper", native("upper", 1, str_upper));
    globals.insert("lower", native("lower", 1, str_lower));
    globals.insert("string", native("string", 2, str_string));
    globals.insert("replace", native("replace", 3, str_replace));
    globals.insert("instr", native("instr", 2, str_instr));
    globals.insert("hex", native("hex", 1, str_hex));

    globals.insert("add", native("add", VARIADIC, array_add));
    globals.insert("remove", native("remove", 2, array_remove));
    globals.insert("size", native("size", VARIADIC, array_size));
    globals.insert("min", native("min", VARIADIC, array_min));
    globals.insert("max", native("max", VARIADIC, array_max));
    globals.insert("head", native("head", VARIADIC, array_head));
    globals.insert("tail", native("tail", VARIADIC, array_tail));

    globals.insert("fold", native("fold", 1, hof_fold));
    globals.insert("map", native("map", 1, hof_map));
    globals.insert("filter", native("filter", 1, hof_filter));

    globals
}

fn expect_str(value: &Value) -> Result<&str> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(error(ErrorKind::TypeMismatch, other.type_name())),
    }
}

fn conv_bool(args: &[Value]) -> Result<Value> {
    Ok(Value::from_bool(to_bool(&args[0])?))
}

fn conv_int(args: &[Value]) -> Result<Value> {
    Ok(Value::Int(to_int(&args[0])?))
}

fn conv_dbl(args: &[Value]) -> Result<Value> {
    Ok(Value::Double(to_double(&args[0])?))
}

fn conv_str(args: &[Value]) -> Result<Value> {
    Ok(Value::Str(args[0].to_string()))
}

fn conv_date(args: &[Value]) -> Result<Value> {
    Ok(Value::Date(to_date(&args[0])?))
}

fn date_now(_: &[Value]) -> Result<Value> {
    Ok(Value::Date(Local::now().naive_local()))
}

fn date_day(args: &[Value]) -> Result<Value> {
    Ok(Value::Int(i64::from(to_date(&args[0])?.day())))
}

fn date_month(args: &[Value]) -> Result<Value> {
    Ok(Value::Int(i64::from(to_date(&args[0])?.month())))
}

fn date_year(args: &[Value]) -> Result<Value> {
    Ok(Value::Int(i64::from(to_date(&args[0])?.year())))
}

fn date_hour(args: &[Value]) -> Result<Value> {
    Ok(Value::Int(i64::from(to_date(&args[0])?.hour())))
}

fn date_minute(args: &[Value]) -> Result<Value> {
    Ok(Value::Int(i64::from(to_date(&args[0])?.minute())))
}

fn date_second(args: &[Value]) -> Result<Value> {
    Ok(Value::Int(i64::from(to_date(&args[0])?.second())))
}

/// Sunday is day 0.
fn date_dayofweek(args: &[Value]) -> Result<Value> {
    let date = to_date(&args[0])?;
    Ok(Value::Int(i64::from(
        date.weekday().num_days_from_sunday(),
    )))
}

fn date_dayofyear(args: &[Value]) -> Result<Value> {
    Ok(Value::Int(i64::from(to_date(&args[0])?.ordinal())))
}

fn math_pi(_: &[Value]) -> Result<Value> {
    Ok(Value::Double(std::f64::consts::PI))
}

/// Xorshift generator, seeded from the clock on first use.
fn math_rnd(_: &[Value]) -> Result<Value> {
    let next = RND_STATE.with(|state| {
        let mut x = state.get();
        if x == 0 {
            x = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| u64::from(d.subsec_nanos()) | 1)
                .unwrap_or(0x9e37_79b9);
        }
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        state.set(x);
        x
    });
    Ok(Value::Double(next as f64 / u64::MAX as f64))
}

fn math_sin(args: &[Value]) -> Result<Value> {
    Ok(Value::Double(to_double(&args[0])?.sin()))
}

fn math_cos(args: &[Value]) -> Result<Value> {
    Ok(Value::Double(to_double(&args[0])?.cos()))
}

fn math_tan(args: &[Value]) -> Result<Value> {
    Ok(Value::Double(to_double(&args[0])?.tan()))
}

fn math_atan(args: &[Value]) -> Result<Value> {
    Ok(Value::Double(to_double(&args[0])?.atan()))
}

fn math_atan2(args: &[Value]) -> Result<Value> {
    Ok(Value::Double(
        to_double(&args[0])?.atan2(to_double(&args[1])?),
    ))
}

fn math_abs(args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(n.wrapping_abs())),
        other => Ok(Value::Double(to_double(other)?.abs())),
    }
}

fn math_exp(args: &[Value]) -> Result<Value> {
    Ok(Value::Double(to_double(&args[0])?.exp()))
}

fn math_log(args: &[Value]) -> Result<Value> {
    Ok(Value::Double(to_double(&args[0])?.ln()))
}

fn math_sqr(args: &[Value]) -> Result<Value> {
    let x = to_double(&args[0])?;
    Ok(Value::Double(x * x))
}

fn math_sqrt(args: &[Value]) -> Result<Value> {
    Ok(Value::Double(to_double(&args[0])?.sqrt()))
}

fn math_sgn(args: &[Value]) -> Result<Value> {
    let x = to_double(&args[0])?;
    Ok(Value::Int(if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }))
}

fn math_fract(args: &[Value]) -> Result<Value> {
    Ok(Value::Double(to_double(&args[0])?.fract()))
}

fn str_chr(args: &[Value]) -> Result<Value> {
    let code = to_int(&args[0])?;
    let c = u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| error(ErrorKind::RuntimeError, format!("character code {code}")))?;
    Ok(Value::Str(c.to_string()))
}

fn str_asc(args: &[Value]) -> Result<Value> {
    let text = expect_str(&args[0])?;
    match text.chars().next() {
        Some(c) => Ok(Value::Int(i64::from(u32::from(c)))),
        None => Err(error(ErrorKind::RuntimeError, "empty string")),
    }
}

fn str_len(args: &[Value]) -> Result<Value> {
    let text = expect_str(&args[0])?;
    Ok(Value::Int(text.chars().count() as i64))
}

fn str_left(args: &[Value]) -> Result<Value> {
    let text = expect_str(&args[0])?;
    let count = to_int(&args[1])?.max(0) as usize;
    Ok(Value::Str(text.chars().take(count).collect()))
}

fn str_right(args: &[Value]) -> Result<Value> {
    let text = expect_str(&args[0])?;
    let count = to_int(&args[1])?.max(0) as usize;
    let total = text.chars().count();
    Ok(Value::Str(text.chars().skip(total.saturating_sub(count)).collect()))
}

/// Zero-based character offset and length.
fn str_mid(args: &[Value]) -> Result<Value> {
    let text = expect_str(&args[0])?;
    let start = to_int(&args[1])?.max(0) as usize;
    let count = to_int(&args[2])?.max(0) as usize;
    Ok(Value::Str(text.chars().skip(start).take(count).collect()))
}

fn str_upper(args: &[Value]) -> Result<Value> {
    Ok(Value::Str(expect_str(&args[0])?.to_uppercase()))
}

fn str_lower(args: &[Value]) -> Result<Value> {
    Ok(Value::Str(expect_str(&args[0])?.to_lowercase()))
}

/// `string(n, fill)`: n copies of the first character of fill.
fn str_string(args: &[Value]) -> Result<Value> {
    let count = to_int(&args[0])?.max(0) as usize;
    let fill = expect_str(&args[1])?
        .chars()
        .next()
        .ok_or_else(|| error(ErrorKind::RuntimeError, "empty fill string"))?;
    Ok(Value::Str(std::iter::repeat(fill).take(count).collect()))
}

fn str_replace(args: &[Value]) -> Result<Value> {
    let text = expect_str(&args[0])?;
    let from = expect_str(&args[1])?;
    let to = expect_str(&args[2])?;
    Ok(Value::Str(text.replace(from, to)))
}

/// Byte offset of the first occurrence, or -1.
fn str_instr(args: &[Value]) -> Result<Value> {
    let text = expect_str(&args[0])?;
    let needle = expect_str(&args[1])?;
    Ok(Value::Int(match text.find(needle) {
        Some(offset) => offset as i64,
        None => -1,
    }))
}

fn str_hex(args: &[Value]) -> Result<Value> {
    Ok(Value::Str(format!("{:X}", to_int(&args[0])?)))
}

/// `add(array, items...)`: appends in place and returns the array.
fn array_add(args: &[Value]) -> Result<Value> {
    let Some((target, rest)) = args.split_first() else {
        return Err(error(ErrorKind::BadParamCount, "add"));
    };
    let array = to_array(target);
    array.items_mut().extend(rest.iter().cloned());
    Ok(Value::Object(array))
}

/// `remove(array, index)`: removes in place and returns the array.
fn array_remove(args: &[Value]) -> Result<Value> {
    let array = to_array(&args[0]);
    let index = to_int(&args[1])?;
    let len = array.items().len();
    if index < 0 || index as usize >= len {
        return Err(error(ErrorKind::RuntimeError, format!("index {index}")));
    }
    array.items_mut().remove(index as usize);
    Ok(Value::Object(array))
}

fn array_size(args: &[Value]) -> Result<Value> {
    Ok(Value::Int(args.len() as i64))
}

fn array_min(args: &[Value]) -> Result<Value> {
    let mut best: Option<&Value> = None;
    for arg in args {
        best = Some(match best {
            Some(current) if compare(arg, current)? != Ordering::Less => current,
            _ => arg,
        });
    }
    Ok(best.cloned().unwrap_or(Value::Empty))
}

fn array_max(args: &[Value]) -> Result<Value> {
    let mut best: Option<&Value> = None;
    for arg in args {
        best = Some(match best {
            Some(current) if compare(arg, current)? != Ordering::Greater => current,
            _ => arg,
        });
    }
    Ok(best.cloned().unwrap_or(Value::Empty))
}

fn array_head(args: &[Value]) -> Result<Value> {
    Ok(args.first().cloned().unwrap_or(Value::Empty))
}

fn array_tail(args: &[Value]) -> Result<Value> {
    let rest = args.iter().skip(1).cloned().collect();
    Ok(Value::object(Array::from_items(rest)))
}

fn expect_callable(value: &Value) -> Result<crate::object::ObjectRef> {
    match value {
        Value::Object(object) => Ok(object.clone()),
        other => Err(error(ErrorKind::TypeMismatch, other.type_name())),
    }
}

fn hof_fold(args: &[Value]) -> Result<Value> {
    Ok(Value::object(Fold {
        func: expect_callable(&args[0])?,
    }))
}

fn hof_map(args: &[Value]) -> Result<Value> {
    Ok(Value::object(MapFn {
        func: expect_callable(&args[0])?,
    }))
}

fn hof_filter(args: &[Value]) -> Result<Value> {
    Ok(Value::object(Filter {
        func: expect_callable(&args[0])?,
    }))
}
