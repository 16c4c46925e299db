//! Typed values, value-kind declarations, and token coercion.
//!
//! Coercion converts one token into a [`Value`] checked against the
//! destination's declared kind and byte width. Integer range checks are
//! driven by the declared width (8 bits per byte), not by the native Rust
//! type, so a 3-byte signed destination overflows at 2^23 exactly.

use std::borrow::Cow;
use std::collections::HashSet;
use std::num::IntErrorKind;

use crate::error::Error;

/// Declared type of a value-bearing argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    /// A string destination. `cap == 0` binds by reference to the token
    /// (zero-copy); `cap > 0` stores at most `cap - 1` bytes, silently
    /// truncating on a character boundary.
    Str { cap: usize },
    Bool,
    /// Signed integer of `width` bytes, 1..=8.
    Int { width: usize },
    /// Unsigned integer of `width` bytes, 1..=8.
    UInt { width: usize },
    /// Float of `width` bytes; only 4 and 8 have native representations.
    Float { width: usize },
    /// Fixed-count or variadic sequence. `count == 0` consumes every
    /// remaining token; elements are coerced independently with `elem`.
    Array { elem: Box<ValueKind>, count: usize },
}

impl ValueKind {
    /// Reject declarations parsing cannot honor: zero widths, widths above
    /// 8 bytes, float widths without a native representation, and nested
    /// arrays.
    pub(crate) fn validate(&self, name: &str) -> Result<(), Error> {
        match self {
            ValueKind::Str { .. } | ValueKind::Bool => Ok(()),
            ValueKind::Int { width } | ValueKind::UInt { width } => match width {
                0 => Err(Error::InvalidSize { name: name.to_string() }),
                1..=8 => Ok(()),
                w => Err(Error::UnhandledType { name: name.to_string(), width: *w }),
            },
            ValueKind::Float { width } => match width {
                0 => Err(Error::InvalidSize { name: name.to_string() }),
                4 | 8 => Ok(()),
                w => Err(Error::UnhandledType { name: name.to_string(), width: *w }),
            },
            ValueKind::Array { elem, .. } => {
                if matches!(**elem, ValueKind::Array { .. }) {
                    return Err(Error::InvalidType { name: name.to_string() });
                }
                elem.validate(name)
            }
        }
    }

    /// The zero value a composed payload field starts out as.
    pub(crate) fn default_value<'a>(&self) -> Value<'a> {
        match self {
            ValueKind::Str { .. } => Value::Str(Cow::Borrowed("")),
            ValueKind::Bool => Value::Bool(false),
            ValueKind::Int { .. } => Value::Int(0),
            ValueKind::UInt { .. } => Value::UInt(0),
            ValueKind::Float { .. } => Value::Float(0.0),
            ValueKind::Array { .. } => Value::Array(Vec::new()),
        }
    }
}

/// One coerced value. String values borrow from the token vector when the
/// declaration asked for zero-copy binding, so the vector must outlive the
/// parse result.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Str(Cow<'a, str>),
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Array(Vec<Value<'a>>),
}

impl<'a> Value<'a> {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value<'a>]> {
        match self {
            Value::Array(v) => Some(v.as_slice()),
            _ => None,
        }
    }
}

/// Parsed values for one argument list, keyed by argument name.
///
/// Used both as the top-level parse result and as the payload handed to a
/// subcommand handler. Fields appear in declaration order (positionals
/// first, then optionals) and every value-bearing node has a field, zeroed
/// until a token binds it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values<'a> {
    fields: Vec<(String, Value<'a>)>,
    explicit: HashSet<String>,
}

impl<'a> Values<'a> {
    pub fn get(&self, name: &str) -> Option<&Value<'a>> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    pub fn get_uint(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(Value::as_uint)
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_float)
    }

    pub fn get_array(&self, name: &str) -> Option<&[Value<'a>]> {
        self.get(name).and_then(Value::as_array)
    }

    /// Whether a token actually bound this field, as opposed to the field
    /// still holding its composed default.
    pub fn is_explicit(&self, name: &str) -> bool {
        self.explicit.contains(name)
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value<'a>)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub(crate) fn set(&mut self, name: &str, value: Value<'a>) {
        match self.fields.iter_mut().find(|(key, _)| key == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    pub(crate) fn mark_explicit(&mut self, name: &str) {
        self.explicit.insert(name.to_string());
    }
}

/// A successful coercion, possibly carrying the non-fatal float-underflow
/// diagnostic.
#[derive(Debug)]
pub(crate) struct Coerced<'a> {
    pub value: Value<'a>,
    pub warning: Option<Error>,
}

impl<'a> Coerced<'a> {
    fn clean(value: Value<'a>) -> Self {
        Coerced { value, warning: None }
    }
}

/// Coerce one token against a scalar kind. Array kinds are consumed
/// token-by-token by the engine, which calls back in here with the element
/// kind.
pub(crate) fn coerce<'a>(
    kind: &ValueKind,
    name: &str,
    token: &'a str,
) -> Result<Coerced<'a>, Error> {
    match kind {
        ValueKind::Str { cap } => Ok(Coerced::clean(coerce_str(*cap, token))),
        ValueKind::Bool => coerce_bool(name, token).map(Coerced::clean),
        ValueKind::Int { width } => {
            coerce_integer(name, token, *width, true).map(Coerced::clean)
        }
        ValueKind::UInt { width } => {
            coerce_integer(name, token, *width, false).map(Coerced::clean)
        }
        ValueKind::Float { width } => coerce_float(name, token, *width),
        ValueKind::Array { .. } => Err(Error::InvalidType { name: name.to_string() }),
    }
}

fn coerce_str(cap: usize, token: &str) -> Value<'_> {
    if cap == 0 {
        return Value::Str(Cow::Borrowed(token));
    }
    let mut end = token.len().min(cap - 1);
    while !token.is_char_boundary(end) {
        end -= 1;
    }
    Value::Str(Cow::Owned(token[..end].to_string()))
}

fn coerce_bool<'a>(name: &str, token: &'a str) -> Result<Value<'a>, Error> {
    match token {
        "true" | "1" => Ok(Value::Bool(true)),
        "false" | "0" => Ok(Value::Bool(false)),
        _ => Err(Error::InvalidValue {
            name: name.to_string(),
            token: token.to_string(),
        }),
    }
}

/// Split off a base prefix: `0x`/`0X` is hexadecimal, `0b`/`0B` binary, a
/// leading `0` with more digits octal, anything else decimal.
fn sniff_base(rest: &str) -> (&str, u32) {
    if let Some(digits) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        (digits, 16)
    } else if let Some(digits) = rest.strip_prefix("0b").or_else(|| rest.strip_prefix("0B")) {
        (digits, 2)
    } else if rest.len() > 1 && rest.starts_with('0') {
        (&rest[1..], 8)
    } else {
        (rest, 10)
    }
}

fn coerce_integer<'a>(
    name: &str,
    token: &'a str,
    width: usize,
    signed: bool,
) -> Result<Value<'a>, Error> {
    let invalid = || Error::InvalidValue {
        name: name.to_string(),
        token: token.to_string(),
    };
    let overflow = || Error::Overflow {
        name: name.to_string(),
        token: token.to_string(),
    };
    let underflow = || Error::Underflow {
        name: name.to_string(),
        token: token.to_string(),
    };

    // The sign is consumed before base sniffing and only exists for signed
    // destinations; a `-` on an unsigned destination is always an underflow.
    let mut rest = token;
    let mut negative = false;
    if let Some(stripped) = rest.strip_prefix('-') {
        if !signed {
            return Err(underflow());
        }
        negative = true;
        rest = stripped;
    } else if let Some(stripped) = rest.strip_prefix('+') {
        if !signed {
            return Err(invalid());
        }
        rest = stripped;
    }

    let (digits, base) = sniff_base(rest);
    // `from_str_radix` tolerates its own leading `+`, which would let a
    // second sign through (`++5`, `0x+5`). Only digits may remain here.
    if digits.starts_with(['+', '-']) {
        return Err(invalid());
    }
    let magnitude = match u64::from_str_radix(digits, base) {
        Ok(v) => v,
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => {
            return Err(if negative { underflow() } else { overflow() });
        }
        Err(_) => return Err(invalid()),
    };

    if signed {
        // 2^(8w - 1) is the first value past the positive range and exactly
        // the most negative representable magnitude.
        let limit = 1u128 << (8 * width - 1);
        if negative {
            if u128::from(magnitude) > limit {
                return Err(underflow());
            }
            Ok(Value::Int((-(i128::from(magnitude))) as i64))
        } else {
            if u128::from(magnitude) >= limit {
                return Err(overflow());
            }
            Ok(Value::Int(magnitude as i64))
        }
    } else {
        let limit = 1u128 << (8 * width);
        if u128::from(magnitude) >= limit {
            return Err(overflow());
        }
        Ok(Value::UInt(magnitude))
    }
}

fn coerce_float<'a>(name: &str, token: &'a str, width: usize) -> Result<Coerced<'a>, Error> {
    let (max_finite, min_normal) = match width {
        4 => (f64::from(f32::MAX), f64::from(f32::MIN_POSITIVE)),
        8 => (f64::MAX, f64::MIN_POSITIVE),
        w => {
            return Err(Error::UnhandledType {
                name: name.to_string(),
                width: w,
            });
        }
    };

    let parsed: f64 = token.parse().map_err(|_| Error::InvalidValue {
        name: name.to_string(),
        token: token.to_string(),
    })?;

    // `parse` saturates to infinity instead of reporting overflow, so an
    // infinite result only passes when the token spelled infinity out.
    let spelled_infinite = {
        let bare = token.trim_start_matches(['+', '-']).to_ascii_lowercase();
        bare == "inf" || bare == "infinity"
    };
    let out_of_range = (parsed.is_infinite() && !spelled_infinite)
        || (parsed.is_finite() && parsed.abs() > max_finite);
    if out_of_range {
        return Err(Error::Overflow {
            name: name.to_string(),
            token: token.to_string(),
        });
    }

    let warning = if parsed != 0.0 && parsed.is_finite() && parsed.abs() < min_normal {
        Some(Error::Underflow {
            name: name.to_string(),
            token: token.to_string(),
        })
    } else {
        None
    };

    let value = if width == 4 {
        Value::Float(f64::from(parsed as f32))
    } else {
        Value::Float(parsed)
    };
    Ok(Coerced { value, warning })
}
