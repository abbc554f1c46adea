//! Numeric promotion.
//!
//! Among two numeric types, float dominates signed dominates unsigned, and
//! within a class the wider type wins. Time and duration behave as int64.

use core::cmp::Ordering;

use crate::types::Primitive;

use super::Value;

/// A decoded number in its widest representation of its class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Uint(u64),
    Float(f64),
}

impl Number {
    pub fn from_value(val: &Value) -> Option<Number> {
        let p = val.ty().under().as_primitive()?;
        if p.is_signed() {
            val.as_i64().map(Number::Int)
        } else if p.is_unsigned() {
            val.as_u64().map(Number::Uint)
        } else if p.is_float() {
            val.as_f64().map(Number::Float)
        } else {
            None
        }
    }

    pub fn to_f64(self) -> f64 {
        match self {
            Number::Int(v) => v as f64,
            Number::Uint(v) => v as f64,
            Number::Float(v) => v,
        }
    }

    /// Total order across classes. A negative signed value is below every
    /// unsigned value, so signed/unsigned equality fails for negatives.
    pub fn compare(self, other: Number) -> Ordering {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a.cmp(&b),
            (Number::Uint(a), Number::Uint(b)) => a.cmp(&b),
            (Number::Int(a), Number::Uint(b)) => {
                if a < 0 {
                    Ordering::Less
                } else {
                    (a as u64).cmp(&b)
                }
            }
            (Number::Uint(_), Number::Int(_)) => other.compare(self).reverse(),
            (a, b) => a.to_f64().total_cmp(&b.to_f64()),
        }
    }

    /// Encodes the number as a value of the numeric primitive `p`,
    /// wrapping or truncating as the `as` casts do.
    pub fn to_value(self, p: Primitive) -> Value {
        if p.is_float() {
            Value::float(p, self.to_f64())
        } else if p.is_signed() {
            Value::int(p, self.as_signed(p))
        } else {
            Value::uint(p, self.as_unsigned(p))
        }
    }

    /// The number as signed primitive `p`, wrapped to its width.
    pub fn as_signed(self, p: Primitive) -> i64 {
        let v = match self {
            Number::Int(v) => v,
            Number::Uint(v) => v as i64,
            Number::Float(v) => v as i64,
        };
        truncate_signed(v, p.bits())
    }

    /// The number as unsigned primitive `p`, wrapped to its width.
    pub fn as_unsigned(self, p: Primitive) -> u64 {
        let v = match self {
            Number::Int(v) => v as u64,
            Number::Uint(v) => v,
            Number::Float(v) => v as u64,
        };
        truncate_unsigned(v, p.bits())
    }
}

fn truncate_signed(v: i64, bits: u32) -> i64 {
    if bits >= 64 {
        v
    } else {
        let shift = 64 - bits;
        (v << shift) >> shift
    }
}

fn truncate_unsigned(v: u64, bits: u32) -> u64 {
    if bits >= 64 { v } else { v & ((1u64 << bits) - 1) }
}

/// Whether `v` can be represented exactly as primitive `p`.
pub fn fits(v: Number, p: Primitive) -> bool {
    match v {
        Number::Int(v) if p.is_signed() => truncate_signed(v, p.bits()) == v,
        Number::Int(v) if p.is_unsigned() => v >= 0 && truncate_unsigned(v as u64, p.bits()) == v as u64,
        Number::Uint(v) if p.is_unsigned() => truncate_unsigned(v, p.bits()) == v,
        Number::Uint(v) if p.is_signed() => v <= i64::MAX as u64 && fits(Number::Int(v as i64), p),
        Number::Float(v) if p.is_integer() => {
            v.fract() == 0.0 && v.is_finite() && {
                if p.is_signed() {
                    v >= i64::MIN as f64 && v < i64::MAX as f64 && fits(Number::Int(v as i64), p)
                } else {
                    v >= 0.0 && v < u64::MAX as f64 && fits(Number::Uint(v as u64), p)
                }
            }
        }
        _ => p.is_float(),
    }
}

fn class(p: Primitive) -> u8 {
    if p.is_float() {
        2
    } else if p.is_signed() {
        1
    } else {
        0
    }
}

/// The type two numeric operands are promoted to, or `None` when either
/// operand is not numeric.
pub fn promote(a: Primitive, b: Primitive) -> Option<Primitive> {
    if !a.is_number() || !b.is_number() {
        return None;
    }
    let a = as_int64(a);
    let b = as_int64(b);
    if a == b {
        return Some(a);
    }
    let (ca, cb) = (class(a), class(b));
    if ca == 1 && cb == 0 || ca == 0 && cb == 1 {
        // Mixed signedness promotes to the widest signed type.
        return Some(Primitive::Int64);
    }
    Some(match ca.cmp(&cb) {
        Ordering::Greater => a,
        Ordering::Less => b,
        Ordering::Equal if a.bits() >= b.bits() => a,
        Ordering::Equal => b,
    })
}

fn as_int64(p: Primitive) -> Primitive {
    match p {
        Primitive::Time | Primitive::Duration => Primitive::Int64,
        p => p,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promote() {
        use Primitive::*;
        assert_eq!(promote(Int8, Int32), Some(Int32));
        assert_eq!(promote(Uint8, Float32), Some(Float32));
        assert_eq!(promote(Float64, Float16), Some(Float64));
        assert_eq!(promote(Int8, Uint64), Some(Int64));
        assert_eq!(promote(Time, Int32), Some(Int64));
        assert_eq!(promote(String, Int64), None);
    }

    #[test]
    fn test_mixed_sign_compare() {
        assert_eq!(Number::Int(-1).compare(Number::Uint(u64::MAX)), Ordering::Less);
        assert_eq!(Number::Int(5).compare(Number::Uint(5)), Ordering::Equal);
        assert_eq!(Number::Uint(5).compare(Number::Int(-5)), Ordering::Greater);
        assert_eq!(Number::Int(2).compare(Number::Float(1.5)), Ordering::Greater);
    }

    #[test]
    fn test_fits() {
        assert!(fits(Number::Int(127), Primitive::Int8));
        assert!(!fits(Number::Int(128), Primitive::Int8));
        assert!(!fits(Number::Int(-1), Primitive::Uint64));
        assert!(fits(Number::Float(3.0), Primitive::Int64));
        assert!(!fits(Number::Float(3.5), Primitive::Int64));
    }
}
