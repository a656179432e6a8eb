use std::cmp::Ordering;

use crate::{
    diagnostics::{error, ErrorKind, Result},
    lexer::Token,
    object::{Array, Compose},
    runtime::Level,
    value::{compare, dereference, to_double, to_int, Value},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
    None,
}

/// Which operands are resolved through their objects before the semantic
/// function runs. Assignment targets and `new` operands must stay boxed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deref {
    None,
    Left,
    Right,
    Both,
}

pub struct OpEntry {
    pub token: Token,
    pub assoc: Assoc,
    pub deref: Deref,
    pub apply: fn(Value, Value) -> Result<Value>,
}

const fn entry(
    token: Token,
    assoc: Assoc,
    deref: Deref,
    apply: fn(Value, Value) -> Result<Value>,
) -> OpEntry {
    OpEntry {
        token,
        assoc,
        deref,
        apply,
    }
}

static SCRIPT: [OpEntry; 1] = [entry(Token::Stmt, Assoc::Left, Deref::Both, op_seq)];

static ASSIGNMENT: [OpEntry; 7] = [
    entry(Token::Assign, Assoc::Right, Deref::Right, op_assign),
    entry(Token::PlusSet, Assoc::Right, Deref::Right, op_add_set),
    entry(Token::MinusSet, Assoc::Right, Deref::Right, op_sub_set),
    entry(Token::MulSet, Assoc::Right, Deref::Right, op_mul_set),
    entry(Token::DivSet, Assoc::Right, Deref::Right, op_div_set),
    entry(Token::IDivSet, Assoc::Right, Deref::Right, op_idiv_set),
    entry(Token::Colon, Assoc::Left, Deref::Both, op_join),
];

static CONDITIONAL: [OpEntry; 1] = [entry(Token::Question, Assoc::None, Deref::None, op_seq)];

static LOGICAL: [OpEntry; 2] = [
    entry(Token::LAnd, Assoc::Left, Deref::Both, op_land),
    entry(Token::LOr, Assoc::Left, Deref::Both, op_lor),
];

static BITWISE: [OpEntry; 2] = [
    entry(Token::BitAnd, Assoc::Left, Deref::Both, op_bitand),
    entry(Token::BitOr, Assoc::Left, Deref::Both, op_bitor),
];

static EQUALITY: [OpEntry; 2] = [
    entry(Token::Eq, Assoc::Left, Deref::Both, op_eq),
    entry(Token::Ne, Assoc::Left, Deref::Both, op_ne),
];

static RELATIONAL: [OpEntry; 4] = [
    entry(Token::Gt, Assoc::Left, Deref::Both, op_gt),
    entry(Token::Ge, Assoc::Left, Deref::Both, op_ge),
    entry(Token::Lt, Assoc::Left, Deref::Both, op_lt),
    entry(Token::Le, Assoc::Left, Deref::Both, op_le),
];

static ADDITIVE: [OpEntry; 2] = [
    entry(Token::Plus, Assoc::Left, Deref::Both, op_add),
    entry(Token::Minus, Assoc::Left, Deref::Both, op_sub),
];

static MULTIPLICATIVE: [OpEntry; 4] = [
    entry(Token::Multiply, Assoc::Left, Deref::Both, op_mul),
    entry(Token::Divide, Assoc::Left, Deref::Both, op_div),
    entry(Token::IDiv, Assoc::Left, Deref::Both, op_idiv),
    entry(Token::Mod, Assoc::Left, Deref::Both, op_mod),
];

static POWER: [OpEntry; 2] = [
    entry(Token::Power, Assoc::Left, Deref::Both, op_pow),
    entry(Token::MDot, Assoc::Left, Deref::Both, op_compose),
];

static UNARY: [OpEntry; 7] = [
    entry(Token::Inc, Assoc::Right, Deref::None, op_inc_prefix),
    entry(Token::Dec, Assoc::Right, Deref::None, op_dec_prefix),
    entry(Token::New, Assoc::Right, Deref::None, op_new),
    entry(Token::Minus, Assoc::Right, Deref::Both, op_neg),
    entry(Token::BitNot, Assoc::Right, Deref::Both, op_bitnot),
    entry(Token::LNot, Assoc::Right, Deref::Both, op_lnot),
    entry(Token::Apo, Assoc::Right, Deref::Both, op_head),
];

static POSTFIX: [OpEntry; 6] = [
    entry(Token::Inc, Assoc::None, Deref::Right, op_inc_postfix),
    entry(Token::Dec, Assoc::None, Deref::Right, op_dec_postfix),
    entry(Token::LPar, Assoc::Left, Deref::Right, op_call),
    entry(Token::LSquare, Assoc::Left, Deref::Right, op_index),
    entry(Token::Dot, Assoc::None, Deref::Right, op_item),
    entry(Token::Apo, Assoc::None, Deref::Both, op_tail),
];

pub fn table(level: Level) -> &'static [OpEntry] {
    match level {
        Level::Script => &SCRIPT,
        Level::Assignment => &ASSIGNMENT,
        Level::Conditional => &CONDITIONAL,
        Level::Logical => &LOGICAL,
        Level::Bitwise => &BITWISE,
        Level::Equality => &EQUALITY,
        Level::Relational => &RELATIONAL,
        Level::Additive => &ADDITIVE,
        Level::Multiplicative => &MULTIPLICATIVE,
        Level::Power => &POWER,
        Level::Unary => &UNARY,
        Level::Postfix => &POSTFIX,
        Level::Statement | Level::Primary => &[],
    }
}

pub fn find(level: Level, token: Token) -> Option<&'static OpEntry> {
    table(level).iter().find(|entry| entry.token == token)
}

fn unsupported(op: &str) -> crate::diagnostics::NScriptError {
    error(ErrorKind::OperationNotSupported, format!("'{op}'"))
}

fn coerce_empty(value: Value) -> Value {
    if value.is_empty() {
        Value::Int(0)
    } else {
        value
    }
}

fn op_seq(_x: Value, y: Value) -> Result<Value> {
    Ok(y)
}

fn op_assign(x: Value, y: Value) -> Result<Value> {
    match x {
        Value::Object(object) => {
            object.set(y.clone())?;
            Ok(y)
        }
        _ => Err(error(ErrorKind::MissingLval, "assignment target")),
    }
}

/// Read-modify-write through an object, returning the stored value.
fn rmw(target: &Value, operand: Value, op: fn(Value, Value) -> Result<Value>) -> Result<Value> {
    let Value::Object(object) = target else {
        return Err(error(ErrorKind::MissingLval, "assignment target"));
    };
    let mut current = object.clone().get()?;
    dereference(&mut current)?;
    let updated = op(current, operand)?;
    object.set(updated.clone())?;
    Ok(updated)
}

fn op_add_set(x: Value, y: Value) -> Result<Value> {
    rmw(&x, y, op_add)
}

fn op_sub_set(x: Value, y: Value) -> Result<Value> {
    rmw(&x, y, op_sub)
}

fn op_mul_set(x: Value, y: Value) -> Result<Value> {
    rmw(&x, y, op_mul)
}

fn op_div_set(x: Value, y: Value) -> Result<Value> {
    rmw(&x, y, op_div)
}

fn op_idiv_set(x: Value, y: Value) -> Result<Value> {
    rmw(&x, y, op_idiv)
}

fn op_inc_prefix(_x: Value, y: Value) -> Result<Value> {
    rmw(&y, Value::Int(1), op_add)
}

fn op_dec_prefix(_x: Value, y: Value) -> Result<Value> {
    rmw(&y, Value::Int(1), op_sub)
}

// Postfix forms receive the already dereferenced old value as `y`.
fn op_inc_postfix(x: Value, y: Value) -> Result<Value> {
    rmw(&x, Value::Int(1), op_add)?;
    Ok(y)
}

fn op_dec_postfix(x: Value, y: Value) -> Result<Value> {
    rmw(&x, Value::Int(1), op_sub)?;
    Ok(y)
}

fn op_add(x: Value, y: Value) -> Result<Value> {
    match (&x, &y) {
        (Value::Empty, _) => Ok(y),
        (_, Value::Empty) => Ok(x),
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(*b))),
        (Value::Int(_) | Value::Double(_), Value::Int(_) | Value::Double(_)) => {
            Ok(Value::Double(to_double(&x)? + to_double(&y)?))
        }
        (Value::Str(a), Value::Str(_) | Value::Int(_) | Value::Double(_) | Value::Date(_)) => {
            Ok(Value::Str(format!("{a}{y}")))
        }
        (Value::Int(_) | Value::Double(_) | Value::Date(_), Value::Str(b)) => {
            Ok(Value::Str(format!("{x}{b}")))
        }
        _ => Err(unsupported("+")),
    }
}

fn op_sub(x: Value, y: Value) -> Result<Value> {
    let (x, y) = (coerce_empty(x), coerce_empty(y));
    match (&x, &y) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_sub(*b))),
        (Value::Int(_) | Value::Double(_), Value::Int(_) | Value::Double(_)) => {
            Ok(Value::Double(to_double(&x)? - to_double(&y)?))
        }
        _ => Err(unsupported("-")),
    }
}

fn op_mul(x: Value, y: Value) -> Result<Value> {
    let (x, y) = (coerce_empty(x), coerce_empty(y));
    match (&x, &y) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_mul(*b))),
        (Value::Int(_) | Value::Double(_), Value::Int(_) | Value::Double(_)) => {
            Ok(Value::Double(to_double(&x)? * to_double(&y)?))
        }
        _ => Err(unsupported("*")),
    }
}

fn op_div(x: Value, y: Value) -> Result<Value> {
    let (x, y) = (coerce_empty(x), coerce_empty(y));
    match (&x, &y) {
        (Value::Int(a), Value::Int(b)) => {
            if *b == 0 {
                Err(error(ErrorKind::RuntimeError, "division by zero"))
            } else {
                Ok(Value::Int(a.wrapping_div(*b)))
            }
        }
        (Value::Int(_) | Value::Double(_), Value::Int(_) | Value::Double(_)) => {
            Ok(Value::Double(to_double(&x)? / to_double(&y)?))
        }
        _ => Err(unsupported("/")),
    }
}

fn op_idiv(x: Value, y: Value) -> Result<Value> {
    let (a, b) = (to_int(&x)?, to_int(&y)?);
    if b == 0 {
        Err(error(ErrorKind::RuntimeError, "division by zero"))
    } else {
        Ok(Value::Int(a.wrapping_div(b)))
    }
}

fn op_mod(x: Value, y: Value) -> Result<Value> {
    let (x, y) = (coerce_empty(x), coerce_empty(y));
    match (&x, &y) {
        (Value::Int(a), Value::Int(b)) => {
            if *b == 0 {
                Err(error(ErrorKind::RuntimeError, "division by zero"))
            } else {
                Ok(Value::Int(a.wrapping_rem(*b)))
            }
        }
        (Value::Int(_) | Value::Double(_), Value::Int(_) | Value::Double(_)) => {
            Ok(Value::Double(to_double(&x)? % to_double(&y)?))
        }
        _ => Err(unsupported("%")),
    }
}

fn op_pow(x: Value, y: Value) -> Result<Value> {
    let (x, y) = (coerce_empty(x), coerce_empty(y));
    match (&x, &y) {
        (Value::Int(_) | Value::Double(_), Value::Int(_) | Value::Double(_)) => {
            Ok(Value::Double(to_double(&x)?.powf(to_double(&y)?)))
        }
        _ => Err(unsupported("^")),
    }
}

fn op_neg(_x: Value, y: Value) -> Result<Value> {
    match y {
        Value::Int(n) => Ok(Value::Int(n.wrapping_neg())),
        Value::Double(d) => Ok(Value::Double(-d)),
        _ => Err(unsupported("-")),
    }
}

fn op_bitand(x: Value, y: Value) -> Result<Value> {
    match (&x, &y) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a & b)),
        _ => Err(unsupported("&")),
    }
}

/// `|` is bitwise-or on ints and a pipeline otherwise: a callable right
/// operand is invoked with the left operand.
fn op_bitor(x: Value, y: Value) -> Result<Value> {
    match (&x, &y) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a | b)),
        (_, Value::Object(object)) => object.clone().call(x),
        _ => Err(unsupported("|")),
    }
}

fn op_bitnot(_x: Value, y: Value) -> Result<Value> {
    match y {
        Value::Int(n) => Ok(Value::Int(!n)),
        _ => Err(unsupported("~")),
    }
}

fn op_land(x: Value, y: Value) -> Result<Value> {
    match (&x, &y) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::from_bool(*a != 0 && *b != 0)),
        _ => Err(unsupported("&&")),
    }
}

fn op_lor(x: Value, y: Value) -> Result<Value> {
    match (&x, &y) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::from_bool(*a != 0 || *b != 0)),
        _ => Err(unsupported("||")),
    }
}

fn op_lnot(_x: Value, y: Value) -> Result<Value> {
    match y {
        Value::Int(n) => Ok(Value::from_bool(n == 0)),
        _ => Err(unsupported("!")),
    }
}

fn op_eq(x: Value, y: Value) -> Result<Value> {
    Ok(Value::from_bool(compare(&x, &y)? == Ordering::Equal))
}

fn op_ne(x: Value, y: Value) -> Result<Value> {
    Ok(Value::from_bool(compare(&x, &y)? != Ordering::Equal))
}

fn op_gt(x: Value, y: Value) -> Result<Value> {
    Ok(Value::from_bool(compare(&x, &y)? == Ordering::Greater))
}

fn op_ge(x: Value, y: Value) -> Result<Value> {
    Ok(Value::from_bool(compare(&x, &y)? != Ordering::Less))
}

fn op_lt(x: Value, y: Value) -> Result<Value> {
    Ok(Value::from_bool(compare(&x, &y)? == Ordering::Less))
}

fn op_le(x: Value, y: Value) -> Result<Value> {
    Ok(Value::from_bool(compare(&x, &y)? != Ordering::Greater))
}

fn op_call(x: Value, y: Value) -> Result<Value> {
    match x {
        Value::Object(object) => object.call(y),
        _ => Err(unsupported("call")),
    }
}

fn op_index(x: Value, y: Value) -> Result<Value> {
    match x {
        Value::Object(object) => object.index(y),
        _ => Err(unsupported("index")),
    }
}

fn op_item(x: Value, y: Value) -> Result<Value> {
    match (x, y) {
        (Value::Object(object), Value::Str(name)) => object.item(&name),
        _ => Err(unsupported("member access")),
    }
}

fn op_new(_x: Value, y: Value) -> Result<Value> {
    match y {
        Value::Object(object) => object.create(),
        _ => Err(unsupported("new")),
    }
}

/// `:` builds and flattens lists; Empty is the identity.
fn op_join(x: Value, y: Value) -> Result<Value> {
    let x_array = match &x {
        Value::Object(object) => object.clone().as_array(),
        _ => None,
    };
    let y_array = match &y {
        Value::Object(object) => object.clone().as_array(),
        _ => None,
    };
    match (&x, &y) {
        (Value::Empty, _) => return Ok(y),
        (_, Value::Empty) => return Ok(x),
        _ => {}
    }
    if let Some(lhs) = x_array {
        match y_array {
            Some(rhs) => {
                let tail = rhs.items().clone();
                lhs.items_mut().extend(tail);
            }
            None => lhs.items_mut().push(y),
        }
        return Ok(Value::Object(lhs));
    }
    if let Some(rhs) = y_array {
        rhs.items_mut().insert(0, x);
        return Ok(Value::Object(rhs));
    }
    Ok(Value::object(Array::from_items(vec![x, y])))
}

/// Prefix `` ` ``: first element of an array; scalars pass through.
fn op_head(_x: Value, y: Value) -> Result<Value> {
    match &y {
        Value::Object(object) => match object.clone().as_array() {
            Some(array) => Ok(array.items().first().cloned().unwrap_or(Value::Empty)),
            None => Err(error(ErrorKind::TypeMismatch, "head of non-array")),
        },
        _ => Ok(y),
    }
}

/// Postfix `` ` ``: remainder of an array; scalars have no remainder.
fn op_tail(x: Value, _y: Value) -> Result<Value> {
    match &x {
        Value::Object(object) => match object.clone().as_array() {
            Some(array) => {
                let items = array.items();
                let rest = items.iter().skip(1).cloned().collect();
                Ok(Value::object(Array::from_items(rest)))
            }
            None => Err(error(ErrorKind::TypeMismatch, "tail of non-array")),
        },
        _ => Ok(Value::Empty),
    }
}

fn op_compose(x: Value, y: Value) -> Result<Value> {
    match (x, y) {
        (Value::Object(outer), Value::Object(inner)) => {
            Ok(Value::object(Compose { outer, inner }))
        }
        _ => Err(unsupported("\u{b7}")),
    }
}
