//! Total ordering of values, as used by sort, top, merge and min/max.
//!
//! Values of different categories order by category (numbers, then bools,
//! strings, bytes, IPs, nets, types, enums, then composites and errors).
//! Numbers compare across widths and signedness after promotion. Null and
//! `missing` compare as null and go last or first per `nulls_max`.

use core::cmp::Ordering;

use crate::codec::prims::decode_uint;
use crate::types::{Primitive, TypeKind};

use super::Value;
use super::coerce::Number;

fn rank(val: &Value) -> u8 {
    match val.ty().under().kind() {
        TypeKind::Primitive(p) => match p {
            p if p.is_number() => 0,
            Primitive::Bool => 1,
            Primitive::String => 2,
            Primitive::Bytes => 3,
            Primitive::Ip => 4,
            Primitive::Net => 5,
            Primitive::Type => 6,
            _ => 15,
        },
        TypeKind::Enum(_) => 7,
        TypeKind::Record(_) => 8,
        TypeKind::Array(_) => 9,
        TypeKind::Set(_) => 10,
        TypeKind::Map(_, _) => 11,
        TypeKind::Error(_) => 12,
        TypeKind::Union(_) | TypeKind::Named(_, _) => 15,
    }
}

fn is_nullish(val: &Value) -> bool {
    val.is_null() || val.is_missing() || val.ty().is_null()
}

pub fn compare(a: &Value, b: &Value, nulls_max: bool) -> Ordering {
    let a = a.under();
    let b = b.under();
    match (is_nullish(&a), is_nullish(&b)) {
        (true, true) => return Ordering::Equal,
        (true, false) => return if nulls_max { Ordering::Greater } else { Ordering::Less },
        (false, true) => return if nulls_max { Ordering::Less } else { Ordering::Greater },
        (false, false) => {}
    }
    let (ra, rb) = (rank(&a), rank(&b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    compare_same_rank(&a, &b, ra, nulls_max)
}

fn compare_same_rank(a: &Value, b: &Value, rank: u8, nulls_max: bool) -> Ordering {
    match rank {
        0 => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => x.compare(y),
            _ => Ordering::Equal,
        },
        4 => match (a.as_ip(), b.as_ip()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => Ordering::Equal,
        },
        5 => match (a.as_net(), b.as_net()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => Ordering::Equal,
        },
        7 => {
            let x = a.bytes().map(decode_uint);
            let y = b.bytes().map(decode_uint);
            x.cmp(&y)
        }
        8 => {
            if a.ty() != b.ty() {
                return a.ty().id().cmp(&b.ty().id());
            }
            let (Some(xs), Some(ys)) = (a.record_entries(), b.record_entries()) else {
                return Ordering::Equal;
            };
            for ((_, x), (_, y)) in xs.iter().zip(ys.iter()) {
                let ord = match (x, y) {
                    (Some(x), Some(y)) => compare(x, y, nulls_max),
                    (None, None) => Ordering::Equal,
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        }
        9 | 10 => {
            let (Some(xs), Some(ys)) = (a.elements(), b.elements()) else {
                return Ordering::Equal;
            };
            compare_seq(xs.iter(), ys.iter(), nulls_max)
        }
        11 => {
            let (Some(xs), Some(ys)) = (a.map_entries(), b.map_entries()) else {
                return Ordering::Equal;
            };
            for ((kx, vx), (ky, vy)) in xs.iter().zip(ys.iter()) {
                let ord = compare(kx, ky, nulls_max).then_with(|| compare(vx, vy, nulls_max));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            xs.len().cmp(&ys.len())
        }
        12 => match (a.error_payload(), b.error_payload()) {
            (Some(x), Some(y)) => compare(&x, &y, nulls_max),
            _ => Ordering::Equal,
        },
        // Bool, string, bytes and type values order by their bodies.
        _ => a.bytes().cmp(&b.bytes()),
    }
}

fn compare_seq<'a>(
    mut xs: impl Iterator<Item = &'a Value>,
    mut ys: impl Iterator<Item = &'a Value>,
    nulls_max: bool,
) -> Ordering {
    loop {
        match (xs.next(), ys.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = compare(x, y, nulls_max);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Equality with numeric coercion. Nulls are never equal to anything.
pub fn equal(a: &Value, b: &Value) -> bool {
    let a = a.under();
    let b = b.under();
    if is_nullish(&a) || is_nullish(&b) {
        return false;
    }
    if rank(&a) != rank(&b) {
        return false;
    }
    if a.ty() == b.ty() {
        return a.bytes() == b.bytes();
    }
    compare(&a, &b, true) == Ordering::Equal
}

/// A key that hashes and compares byte-equal for any two numbers `equal`
/// treats as equal. Numbers map to int64 when integral and in range, then
/// uint64, else float64. Other values are returned with named types
/// stripped.
pub fn hash_key(val: &Value) -> Value {
    let val = val.under();
    let Some(num) = Number::from_value(&val) else {
        return val;
    };
    match num {
        Number::Int(v) => Value::int64(v),
        Number::Uint(v) => match i64::try_from(v) {
            Ok(v) => Value::int64(v),
            Err(_) => Value::uint64(v),
        },
        Number::Float(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            Value::int64(f as i64)
        }
        Number::Float(f) if f.fract() == 0.0 && f >= 0.0 && f < u64::MAX as f64 => {
            Value::uint64(f as u64)
        }
        Number::Float(f) => Value::float64(f),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_across_types() {
        assert_eq!(compare(&Value::int64(2), &Value::float64(1.5), true), Ordering::Greater);
        assert_eq!(compare(&Value::uint64(3), &Value::int64(3), true), Ordering::Equal);
        assert!(equal(&Value::uint64(3), &Value::int64(3)));
        assert!(!equal(&Value::uint64(u64::MAX), &Value::int64(-1)));
    }

    #[test]
    fn test_hash_key_agrees_with_equal() {
        let two = hash_key(&Value::int64(2));
        assert_eq!(hash_key(&Value::int(Primitive::Int32, 2)), two);
        assert_eq!(hash_key(&Value::uint64(2)), two);
        assert_eq!(hash_key(&Value::float64(2.0)), two);
        assert_eq!(hash_key(&Value::float64(2.5)), Value::float64(2.5));
        assert_eq!(hash_key(&Value::uint64(u64::MAX)), Value::uint64(u64::MAX));
        assert_eq!(hash_key(&Value::string("2")), Value::string("2"));
    }

    #[test]
    fn test_nulls_placement() {
        let null = Value::null();
        let one = Value::int64(1);
        assert_eq!(compare(&null, &one, true), Ordering::Greater);
        assert_eq!(compare(&null, &one, false), Ordering::Less);
        assert!(!equal(&null, &null));
    }

    #[test]
    fn test_strings_lexicographic() {
        assert_eq!(compare(&Value::string("a"), &Value::string("b"), true), Ordering::Less);
        assert_eq!(compare(&Value::string("b"), &Value::int64(1), true), Ordering::Greater);
    }
}
