//! # Type Value Encoding
//!
//! Binary form of a type, used as the body of values of type `type` and as
//! the type header of spill frames.
//!
//! ## Format
//!
//! Every type starts with a single discriminant byte:
//!
//! - **0-19**: a primitive type; the byte is its fixed ID and there is no payload.
//! - **32-39**: a composite type followed by its payload.
//!
//! Composite payloads:
//!
//! ```text
//! record: [varint:count]([string:name][u8:flags][type])*
//! array:  [type]
//! set:    [type]
//! map:    [type:key][type:val]
//! union:  [varint:count]([type])*
//! enum:   [varint:count]([string:symbol])*
//! named:  [string:name][type]
//! error:  [type]
//! ```
//!
//! Strings are a varint length followed by UTF-8 bytes. The encoding is
//! structural: two contexts that intern the same type produce the same
//! bytes even though their IDs may differ.

use crate::codec::prims::{append_uvarint, read_uvarint};
use crate::error::{Error, Result};
use crate::types::context::TypeContext;
use crate::types::types::{Field, FieldFlags, Primitive, Type, TypeKind};

const DISC_RECORD: u8 = 32;
const DISC_ARRAY: u8 = 33;
const DISC_SET: u8 = 34;
const DISC_MAP: u8 = 35;
const DISC_UNION: u8 = 36;
const DISC_ENUM: u8 = 37;
const DISC_NAMED: u8 = 38;
const DISC_ERROR: u8 = 39;

// ============================================================================
// Helper Functions
// ============================================================================

fn write_string(buf: &mut Vec<u8>, s: &str) {
    append_uvarint(buf, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

fn read_string(bytes: &[u8]) -> Result<(&str, usize)> {
    let (len, n) = read_uvarint(bytes)?;
    let end = n + len as usize;
    let raw = bytes
        .get(n..end)
        .ok_or_else(|| Error::codec("truncated string in type value"))?;
    let s = core::str::from_utf8(raw)
        .map_err(|_| Error::codec("invalid UTF-8 in type value"))?;
    Ok((s, end))
}

fn read_count(bytes: &[u8]) -> Result<(usize, usize)> {
    let (count, n) = read_uvarint(bytes)?;
    // Every entry takes at least one byte, which bounds hostile counts.
    if count as usize > bytes.len() {
        return Err(Error::codec(format!("implausible count {}", count)));
    }
    Ok((count as usize, n))
}

// ============================================================================
// Encoding
// ============================================================================

pub fn encode_type(ty: &Type) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16);
    encode_inner(ty, &mut buf);
    buf
}

fn encode_inner(ty: &Type, buf: &mut Vec<u8>) {
    match ty.kind() {
        TypeKind::Primitive(p) => buf.push(p.id() as u8),
        TypeKind::Record(fields) => {
            buf.push(DISC_RECORD);
            append_uvarint(buf, fields.len() as u64);
            for field in fields {
                write_string(buf, &field.name);
                buf.push(field.flags.bits());
                encode_inner(&field.ty, buf);
            }
        }
        TypeKind::Array(inner) => {
            buf.push(DISC_ARRAY);
            encode_inner(inner, buf);
        }
        TypeKind::Set(inner) => {
            buf.push(DISC_SET);
            encode_inner(inner, buf);
        }
        TypeKind::Map(key, val) => {
            buf.push(DISC_MAP);
            encode_inner(key, buf);
            encode_inner(val, buf);
        }
        TypeKind::Union(members) => {
            buf.push(DISC_UNION);
            append_uvarint(buf, members.len() as u64);
            for member in members {
                encode_inner(member, buf);
            }
        }
        TypeKind::Enum(symbols) => {
            buf.push(DISC_ENUM);
            append_uvarint(buf, symbols.len() as u64);
            for symbol in symbols {
                write_string(buf, symbol);
            }
        }
        TypeKind::Named(name, inner) => {
            buf.push(DISC_NAMED);
            write_string(buf, name);
            encode_inner(inner, buf);
        }
        TypeKind::Error(inner) => {
            buf.push(DISC_ERROR);
            encode_inner(inner, buf);
        }
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decodes the type at the front of `bytes`, interning it (and every type
/// it references) in `ctx`. Returns the type and the bytes consumed.
pub fn decode_type(ctx: &TypeContext, bytes: &[u8]) -> Result<(Type, usize)> {
    let Some(&disc) = bytes.first() else {
        return Err(Error::codec("empty type value"));
    };
    let mut pos = 1;
    let ty = match disc {
        d if (d as u32) < Primitive::ALL.len() as u32 => {
            return Ok((Type::primitive(Primitive::ALL[d as usize]), 1));
        }
        DISC_RECORD => {
            let (count, n) = read_count(&bytes[pos..])?;
            pos += n;
            let mut fields = Vec::with_capacity(count);
            for _ in 0..count {
                let (name, n) = read_string(&bytes[pos..])?;
                pos += n;
                let flags = *bytes
                    .get(pos)
                    .ok_or_else(|| Error::codec("truncated record type"))?;
                pos += 1;
                let (ty, n) = decode_type(ctx, &bytes[pos..])?;
                pos += n;
                fields.push(Field {
                    name: name.to_string(),
                    ty,
                    flags: FieldFlags::from_bits_truncate(flags),
                });
            }
            ctx.lookup_type_record(fields)?
        }
        DISC_ARRAY | DISC_SET | DISC_ERROR => {
            let (inner, n) = decode_type(ctx, &bytes[pos..])?;
            pos += n;
            match disc {
                DISC_ARRAY => ctx.lookup_type_array(&inner),
                DISC_SET => ctx.lookup_type_set(&inner),
                _ => ctx.lookup_type_error(&inner),
            }
        }
        DISC_MAP => {
            let (key, n) = decode_type(ctx, &bytes[pos..])?;
            pos += n;
            let (val, n) = decode_type(ctx, &bytes[pos..])?;
            pos += n;
            ctx.lookup_type_map(&key, &val)
        }
        DISC_UNION => {
            let (count, n) = read_count(&bytes[pos..])?;
            pos += n;
            let mut members = Vec::with_capacity(count);
            for _ in 0..count {
                let (member, n) = decode_type(ctx, &bytes[pos..])?;
                pos += n;
                members.push(member);
            }
            ctx.lookup_type_union(members)
        }
        DISC_ENUM => {
            let (count, n) = read_count(&bytes[pos..])?;
            pos += n;
            let mut symbols = Vec::with_capacity(count);
            for _ in 0..count {
                let (symbol, n) = read_string(&bytes[pos..])?;
                pos += n;
                symbols.push(symbol.to_string());
            }
            ctx.lookup_type_enum(symbols)
        }
        DISC_NAMED => {
            let (name, n) = read_string(&bytes[pos..])?;
            pos += n;
            let (inner, n) = decode_type(ctx, &bytes[pos..])?;
            pos += n;
            ctx.lookup_type_named(name, &inner)?
        }
        d => return Err(Error::codec(format!("unknown type discriminant {}", d))),
    };
    Ok((ty, pos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn round_trip(ctx: &TypeContext, ty: &Type) {
        let bytes = encode_type(ty);
        let (decoded, n) = decode_type(ctx, &bytes).unwrap();
        assert_eq!(n, bytes.len());
        assert_eq!(&decoded, ty);
    }

    #[test]
    fn test_primitives_are_one_byte() {
        for p in Primitive::ALL {
            let ty = Type::primitive(p);
            assert_eq!(encode_type(&ty), vec![p.id() as u8]);
        }
    }

    #[test]
    fn test_composites_round_trip() {
        let ctx = TypeContext::new();
        let rec = ctx
            .lookup_type_record(vec![
                Field::new("a", Type::int64()),
                Field::optional("b", Type::string()),
            ])
            .unwrap();
        let union = ctx.lookup_type_union(vec![Type::int64(), rec.clone()]);
        let named = ctx.lookup_type_named("point", &rec).unwrap();
        for ty in [
            rec.clone(),
            ctx.lookup_type_array(&union),
            ctx.lookup_type_set(&Type::string()),
            ctx.lookup_type_map(&Type::string(), &named),
            ctx.lookup_type_enum(vec!["red".into(), "green".into()]),
            ctx.lookup_type_error(&Type::string()),
        ] {
            round_trip(&ctx, &ty);
        }
    }

    #[test]
    fn test_encoding_is_structural_across_contexts() {
        let a = TypeContext::new();
        let b = TypeContext::new();
        // Skew the ID counters so the same type gets different IDs.
        b.lookup_type_array(&Type::bool());
        let ta = a.lookup_type_set(&Type::int64());
        let tb = b.lookup_type_set(&Type::int64());
        assert_ne!(ta.id(), tb.id());
        assert_eq!(encode_type(&ta), encode_type(&tb));
        let (back, _) = decode_type(&a, &encode_type(&tb)).unwrap();
        assert_eq!(back, ta);
    }

    #[test]
    fn test_decode_errors() {
        let ctx = TypeContext::new();
        assert!(decode_type(&ctx, &[]).is_err());
        assert!(decode_type(&ctx, &[DISC_ARRAY]).is_err());
        assert!(decode_type(&ctx, &[200]).is_err());
        assert!(ctx.lookup_by_value(&[7, 7]).is_err());
    }
}
