// SPDX-License-Identifier: MIT OR Apache-2.0
//! The conversion matrix between port value types.
//!
//! [`convert`] is total over every ordered pair of [`DataType`]s: each pair
//! either converts or reports a [`ConversionError`]. The destination keeps its
//! type in every case; a failed conversion may leave it partially written.

use crate::value::{DataType, EntityId, FlowValue, Vec3};

/// How faithful a successful conversion was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// The value was carried over as-is or by a well defined rule
    Exact,
    /// The conversion is allowed but unsafe (numeric to entity id)
    Lossy,
}

/// Why a conversion was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConversionFailure {
    /// No rule exists for this pair
    #[error("no conversion rule")]
    Unsupported,
    /// The value does not fit the destination
    #[error("value out of range")]
    OutOfRange,
    /// The source string could not be parsed
    #[error("unparsable text")]
    Unparsable,
    /// A custom payload refused the conversion
    #[error("rejected by custom data")]
    Rejected,
}

/// Failed conversion between two value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot convert {from} to {to}: {reason}")]
pub struct ConversionError {
    /// Source type
    pub from: DataType,
    /// Destination type
    pub to: DataType,
    /// Failure reason
    pub reason: ConversionFailure,
}

/// Result of a single conversion
pub type ConversionResult = Result<Conversion, ConversionError>;

/// Convert `from` into the live type of `to`.
pub fn convert(from: &FlowValue, to: &mut FlowValue) -> ConversionResult {
    let from_type = from.data_type();
    let to_type = to.data_type();
    let fail = |reason| ConversionError { from: from_type, to: to_type, reason };

    if from.is_same_type(to) {
        *to = from.clone();
        return Ok(Conversion::Exact);
    }

    match (from, to) {
        (FlowValue::CustomData(source), FlowValue::CustomData(target)) => {
            // Either payload may know about the other.
            if target.set_from(from) || source.get_as(&mut FlowValue::CustomData(target.clone())) {
                Ok(Conversion::Exact)
            } else {
                Err(fail(ConversionFailure::Rejected))
            }
        }
        (_, FlowValue::CustomData(target)) => {
            if target.set_from(from) {
                Ok(Conversion::Exact)
            } else {
                Err(fail(ConversionFailure::Rejected))
            }
        }
        (FlowValue::CustomData(source), to) => {
            if source.get_as(to) {
                Ok(Conversion::Exact)
            } else {
                Err(fail(ConversionFailure::Rejected))
            }
        }

        (_, FlowValue::Void) => Ok(Conversion::Exact),
        (FlowValue::Void, to) => {
            *to = FlowValue::default_for(to_type);
            Ok(Conversion::Exact)
        }

        (FlowValue::Pointer(_), FlowValue::Bool(b)) => {
            *b = false;
            Ok(Conversion::Exact)
        }
        (FlowValue::Pointer(_), _) | (_, FlowValue::Pointer(_)) => {
            Err(fail(ConversionFailure::Unsupported))
        }

        (FlowValue::Vec3(_), FlowValue::EntityId(_)) | (FlowValue::EntityId(_), FlowValue::Vec3(_)) => {
            Err(fail(ConversionFailure::Unsupported))
        }

        (FlowValue::String(text), to) => from_text(text, to).ok_or_else(|| fail(ConversionFailure::Unparsable)),
        (from, FlowValue::String(text)) => {
            *text = to_text(from);
            Ok(Conversion::Exact)
        }

        (FlowValue::Vec3(v), FlowValue::Bool(b)) => {
            *b = v.length_squared() > 0.0;
            Ok(Conversion::Exact)
        }
        (FlowValue::Vec3(v), to) => convert(&FlowValue::Float(v.x), to).map_err(|e| fail(e.reason)),
        (from, FlowValue::Vec3(v)) => {
            let mut scalar = FlowValue::Float(0.0);
            let conversion = convert(from, &mut scalar).map_err(|e| fail(e.reason))?;
            if let FlowValue::Float(x) = scalar {
                *v = Vec3::splat(x);
            }
            Ok(conversion)
        }

        (FlowValue::EntityId(id), FlowValue::Int(to)) => {
            if id.is_32bit() {
                *to = id.0 as u32 as i32;
                Ok(Conversion::Exact)
            } else {
                tracing::error!(id = id.0, "illegal conversion from 64-bit entity id to int");
                Err(fail(ConversionFailure::OutOfRange))
            }
        }
        (FlowValue::EntityId(id), FlowValue::Float(to)) => {
            if id.is_32bit() {
                *to = id.0 as f32;
                Ok(Conversion::Exact)
            } else {
                tracing::error!(id = id.0, "illegal conversion from 64-bit entity id to float");
                Err(fail(ConversionFailure::OutOfRange))
            }
        }
        (FlowValue::EntityId(id), FlowValue::Double(to)) => {
            *to = id.0 as f64;
            Ok(Conversion::Exact)
        }
        (FlowValue::Int(v), FlowValue::EntityId(to)) => Ok(numeric_to_entity(i64::from(*v) as u64, *v == 0, to, from_type)),
        (FlowValue::Float(v), FlowValue::EntityId(to)) => Ok(numeric_to_entity(*v as u64, *v == 0.0, to, from_type)),
        (FlowValue::Double(v), FlowValue::EntityId(to)) => {
            *to = EntityId(*v as u64);
            Ok(Conversion::Exact)
        }
        (FlowValue::Bool(v), FlowValue::EntityId(to)) => {
            *to = EntityId(u64::from(*v));
            Ok(Conversion::Exact)
        }

        (from, to) => {
            let Some(number) = as_number(from) else {
                return Err(fail(ConversionFailure::Unsupported));
            };
            match to {
                FlowValue::Int(v) => *v = number.as_i32(),
                FlowValue::Float(v) => *v = number.as_f64() as f32,
                FlowValue::Double(v) => *v = number.as_f64(),
                FlowValue::Bool(v) => *v = number.is_nonzero(),
                _ => return Err(fail(ConversionFailure::Unsupported)),
            }
            Ok(Conversion::Exact)
        }
    }
}

fn numeric_to_entity(raw: u64, is_zero: bool, to: &mut EntityId, from: DataType) -> Conversion {
    if is_zero {
        *to = EntityId::INVALID;
        Conversion::Exact
    } else {
        tracing::warn!(%from, id = raw, "unsafe conversion to entity id");
        *to = EntityId(raw);
        Conversion::Lossy
    }
}

/// Scalar source of a numeric conversion.
#[derive(Clone, Copy)]
enum Number {
    Int(i32),
    Real(f64),
    Entity(u64),
}

impl Number {
    fn as_i32(self) -> i32 {
        match self {
            Self::Int(v) => v,
            Self::Real(v) => v as i32,
            Self::Entity(v) => v as i32,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => f64::from(v),
            Self::Real(v) => v,
            Self::Entity(v) => v as f64,
        }
    }

    fn is_nonzero(self) -> bool {
        match self {
            Self::Int(v) => v != 0,
            Self::Real(v) => v != 0.0,
            Self::Entity(v) => v != 0,
        }
    }
}

fn as_number(value: &FlowValue) -> Option<Number> {
    match value {
        FlowValue::Int(v) => Some(Number::Int(*v)),
        FlowValue::Float(v) => Some(Number::Real(f64::from(*v))),
        FlowValue::Double(v) => Some(Number::Real(*v)),
        FlowValue::Bool(v) => Some(Number::Int(i32::from(*v))),
        FlowValue::EntityId(v) => Some(Number::Entity(v.0)),
        _ => None,
    }
}

/// Format a value the way string ports expect it.
pub fn to_text(value: &FlowValue) -> String {
    match value {
        FlowValue::Void | FlowValue::Pointer(_) | FlowValue::CustomData(_) => String::new(),
        FlowValue::Int(v) => v.to_string(),
        FlowValue::Float(v) => format!("{v:.6}"),
        FlowValue::Double(v) => format!("{v:.6}"),
        FlowValue::Bool(v) => if *v { "true" } else { "false" }.to_owned(),
        FlowValue::String(v) => v.clone(),
        FlowValue::Vec3(v) => format!("{},{},{}", format_g(v.x), format_g(v.y), format_g(v.z)),
        FlowValue::EntityId(v) => v.0.to_string(),
    }
}

/// Parse `text` into the live type of `to`. Returns `None` when nothing
/// could be parsed; a partially parsed vector keeps the parsed components.
fn from_text(text: &str, to: &mut FlowValue) -> Option<Conversion> {
    match to {
        FlowValue::Int(v) => *v = scan_int(text)?.0,
        FlowValue::Float(v) => *v = scan_float(text)?.0 as f32,
        FlowValue::Double(v) => *v = scan_float(text)?.0,
        FlowValue::EntityId(v) => *v = EntityId(scan_u64(text)?),
        FlowValue::Bool(v) => *v = scan_bool(text)?,
        FlowValue::Vec3(v) => scan_vec3(text, v)?,
        _ => return None,
    }
    Some(Conversion::Exact)
}

/// `%d`: optional sign and at least one digit after leading whitespace.
fn scan_int(text: &str) -> Option<(i32, &str)> {
    let rest = text.trim_start();
    let (negative, digits) = match rest.as_bytes().first() {
        Some(b'-') => (true, &rest[1..]),
        Some(b'+') => (false, &rest[1..]),
        _ => (false, rest),
    };
    let len = digits.bytes().take_while(u8::is_ascii_digit).count();
    if len == 0 {
        return None;
    }
    let magnitude = digits[..len]
        .bytes()
        .fold(0i64, |acc, d| acc.saturating_mul(10).saturating_add(i64::from(d - b'0')));
    let value = if negative { -magnitude } else { magnitude };
    let clamped = value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
    Some((clamped, &digits[len..]))
}

/// `%llu`: unsigned digits after leading whitespace.
fn scan_u64(text: &str) -> Option<u64> {
    let rest = text.trim_start();
    let rest = rest.strip_prefix('+').unwrap_or(rest);
    let len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if len == 0 {
        return None;
    }
    rest[..len].parse().ok()
}

/// `%f` / `%g`: the longest prefix that reads as a decimal float.
fn scan_float(text: &str) -> Option<(f64, &str)> {
    let rest = text.trim_start();
    let bytes = rest.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_digits = bytes[end..].iter().take_while(|b| b.is_ascii_digit()).count();
    end += int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = bytes[end + 1..].iter().take_while(|b| b.is_ascii_digit()).count();
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return None;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = bytes[exp_end..].iter().take_while(|b| b.is_ascii_digit()).count();
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }
    let value = rest[..end].parse().ok()?;
    Some((value, &rest[end..]))
}

fn scan_bool(text: &str) -> Option<bool> {
    if let Some((value, _)) = scan_int(text) {
        return Some(value != 0);
    }
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// `%g,%g,%g`: components are written as they are read, so a truncated
/// triple leaves the earlier components updated.
fn scan_vec3(text: &str, to: &mut Vec3) -> Option<()> {
    let (x, rest) = scan_float(text)?;
    to.x = x as f32;
    let (y, rest) = scan_float(rest.strip_prefix(',')?)?;
    to.y = y as f32;
    let (z, _) = scan_float(rest.strip_prefix(',')?)?;
    to.z = z as f32;
    Some(())
}

/// `%g` with the default precision of six significant digits.
fn format_g(value: f32) -> String {
    let value = f64::from(value);
    if value.is_nan() {
        return "nan".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_owned();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_owned();
    }

    let scientific = format!("{value:.5e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if !(-4..6).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exponent.abs())
    } else {
        let decimals = (5 - exponent).max(0) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_owned()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// Convert into a fresh value of `to_type`
pub fn convert_to(from: &FlowValue, to_type: DataType) -> Result<FlowValue, ConversionError> {
    let mut out = FlowValue::default_for(to_type);
    convert(from, &mut out)?;
    Ok(out)
}
