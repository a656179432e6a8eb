use std::{cmp::Ordering, fmt, rc::Rc};

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::{
    diagnostics::{error, ErrorKind, Result},
    object::{Object, ObjectRef},
};

/// Tagged value produced and consumed by the evaluator. Objects are shared
/// handles, so cloning a value clones a reference, not the object.
#[derive(Clone)]
pub enum Value {
    Empty,
    Int(i64),
    Double(f64),
    Str(String),
    Date(NaiveDateTime),
    Object(ObjectRef),
}

impl Value {
    pub fn object(object: impl Object + 'static) -> Self {
        Value::Object(Rc::new(object))
    }

    /// Truth is the VARIANT-style integer pair: -1 for true, 0 for false.
    pub fn from_bool(value: bool) -> Self {
        Value::Int(if value { -1 } else { 0 })
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Empty => "Empty",
            Value::Int(_) => "Int",
            Value::Double(_) => "Double",
            Value::Str(_) => "String",
            Value::Date(_) => "Date",
            Value::Object(_) => "Object",
        }
    }
}

/// Replaces the value with what its object resolves to, repeatedly, until a
/// plain value remains or the object yields itself (arrays, instances,
/// functions).
pub fn dereference(value: &mut Value) -> Result<()> {
    while let Value::Object(current) = value {
        let next = current.clone().get()?;
        if let Value::Object(object) = &next {
            if Rc::ptr_eq(object, current) {
                break;
            }
        }
        *value = next;
    }
    Ok(())
}

pub fn to_int(value: &Value) -> Result<i64> {
    match value {
        Value::Empty => Ok(0),
        Value::Int(n) => Ok(*n),
        Value::Double(d) => Ok((d + 0.5).trunc() as i64),
        Value::Str(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .or_else(|_| trimmed.parse::<f64>().map(|d| (d + 0.5).trunc() as i64))
                .map_err(|_| error(ErrorKind::TypeMismatch, format!("'{s}'")))
        }
        other => Err(error(ErrorKind::TypeMismatch, other.type_name())),
    }
}

pub fn to_double(value: &Value) -> Result<f64> {
    match value {
        Value::Empty => Ok(0.0),
        Value::Int(n) => Ok(*n as f64),
        Value::Double(d) => Ok(*d),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| error(ErrorKind::TypeMismatch, format!("'{s}'"))),
        other => Err(error(ErrorKind::TypeMismatch, other.type_name())),
    }
}

pub fn to_bool(value: &Value) -> Result<bool> {
    match value {
        Value::Empty => Ok(false),
        Value::Int(n) => Ok(*n != 0),
        Value::Double(d) => Ok(*d != 0.0),
        Value::Str(s) if s.is_empty() => Ok(false),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(|d| d != 0.0)
            .map_err(|_| error(ErrorKind::TypeMismatch, format!("'{s}'"))),
        other => Err(error(ErrorKind::TypeMismatch, other.type_name())),
    }
}

pub fn to_date(value: &Value) -> Result<NaiveDateTime> {
    match value {
        Value::Date(date) => Ok(*date),
        Value::Str(s) => parse_date(s),
        other => Err(error(ErrorKind::TypeMismatch, other.type_name())),
    }
}

/// Total order used by comparisons, `min`/`max` and array sorting helpers.
/// Empty sorts after everything; arrays compare elementwise with length as
/// the tie breaker; other objects compare by identity.
pub fn compare(x: &Value, y: &Value) -> Result<Ordering> {
    match (x, y) {
        (Value::Empty, Value::Empty) => Ok(Ordering::Equal),
        (Value::Empty, _) => Ok(Ordering::Greater),
        (_, Value::Empty) => Ok(Ordering::Less),
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Int(_), Value::Double(_))
        | (Value::Double(_), Value::Int(_))
        | (Value::Double(_), Value::Double(_)) => {
            let (a, b) = (to_double(x)?, to_double(y)?);
            Ok(a.partial_cmp(&b).unwrap_or(Ordering::Equal))
        }
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Ok(a.cmp(b)),
        (Value::Object(a), Value::Object(b)) => match (a.clone().as_array(), b.clone().as_array()) {
            (Some(lhs), Some(rhs)) => {
                let lhs = lhs.items();
                let rhs = rhs.items();
                for (left, right) in lhs.iter().zip(rhs.iter()) {
                    let order = compare(left, right)?;
                    if order != Ordering::Equal {
                        return Ok(order);
                    }
                }
                Ok(lhs.len().cmp(&rhs.len()))
            }
            _ => {
                if Rc::ptr_eq(a, b) {
                    Ok(Ordering::Equal)
                } else {
                    let (pa, pb) = (Rc::as_ptr(a) as *const () as usize, Rc::as_ptr(b) as *const () as usize);
                    Ok(pa.cmp(&pb))
                }
            }
        },
        _ => Err(error(
            ErrorKind::TypeMismatch,
            format!("{} vs {}", x.type_name(), y.type_name()),
        )),
    }
}

/// Accepts `d.m.y`, `d.m.y h:m[:s]` and bare `h:m[:s]` (epoch date). Two
/// digit years below 50 are 2000-based, the rest 1900-based.
pub fn parse_date(text: &str) -> Result<NaiveDateTime> {
    let bad = || error(ErrorKind::SyntaxError, format!("date '{text}'"));
    let mut date = None;
    let mut time = None;
    for field in text.split_whitespace() {
        if field.contains('.') && date.is_none() && time.is_none() {
            let mut parts = field.split('.');
            let day: u32 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
            let month: u32 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
            let mut year: i32 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
            if parts.next().is_some() {
                return Err(bad());
            }
            if year < 100 {
                year += if year < 50 { 2000 } else { 1900 };
            }
            if !(1900..=9999).contains(&year) {
                return Err(bad());
            }
            date = Some(NaiveDate::from_ymd_opt(year, month, day).ok_or_else(bad)?);
        } else if field.contains(':') && time.is_none() {
            let mut parts = field.split(':');
            let hour: u32 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
            let minute: u32 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
            let second: u32 = match parts.next() {
                Some(p) => p.parse().map_err(|_| bad())?,
                None => 0,
            };
            if parts.next().is_some() {
                return Err(bad());
            }
            time = Some((hour, minute, second));
        } else {
            return Err(bad());
        }
    }
    let date = date.unwrap_or_default();
    let (hour, minute, second) = time.unwrap_or((0, 0, 0));
    date.and_hms_opt(hour, minute, second).ok_or_else(bad)
}

fn format_date(date: &NaiveDateTime, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let epoch = (date.year(), date.month(), date.day()) == (1970, 1, 1);
    let midnight = (date.hour(), date.minute(), date.second()) == (0, 0, 0);
    if !epoch || midnight {
        write!(f, "{:02}.{:02}.{:04}", date.day(), date.month(), date.year())?;
        if !midnight {
            write!(f, " ")?;
        }
    }
    if !midnight {
        write!(f, "{}:{:02}", date.hour(), date.minute())?;
        if date.second() != 0 {
            write!(f, ":{:02}", date.second())?;
        }
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Int(n) => write!(f, "{n}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Date(date) => format_date(date, f),
            Value::Object(object) => {
                let mut resolved = self.clone();
                if dereference(&mut resolved).is_err() {
                    return write!(f, "{}", object.print());
                }
                match resolved {
                    Value::Object(object) => write!(f, "{}", object.print()),
                    other => write!(f, "{other}"),
                }
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Object(object) => write!(f, "Object({})", object.print()),
            Value::Str(s) => write!(f, "Str({s:?})"),
            other => write!(f, "{}({})", other.type_name(), other),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}
