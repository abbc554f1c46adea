use core::fmt::{self, Display};

use crate::codec::prims::{decode_bool, decode_float, decode_int, decode_ip, decode_net, decode_uint};
use crate::codec::{Iter, RecordIter};
use crate::types::{Primitive, Type, TypeKind};

use super::Value;

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_body(f, self.ty(), self.bytes())
    }
}

fn fmt_float(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    if value.is_nan() {
        write!(f, "NaN")
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            write!(f, "+Inf")
        } else {
            write!(f, "-Inf")
        }
    } else {
        write!(f, "{:?}", value)
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn fmt_primitive(f: &mut fmt::Formatter<'_>, p: Primitive, body: &[u8]) -> fmt::Result {
    match p {
        p if p.is_unsigned() => write!(f, "{}", decode_uint(body)),
        Primitive::Duration => write!(f, "{}ns", decode_int(body)),
        Primitive::Time => write!(f, "time({})", decode_int(body)),
        p if p.is_signed() => write!(f, "{}", decode_int(body)),
        p if p.is_float() => match decode_float(body) {
            Ok(v) => fmt_float(f, v),
            Err(_) => write!(f, "<bad float>"),
        },
        Primitive::Bool => write!(f, "{}", decode_bool(body)),
        Primitive::String => {
            let s = String::from_utf8_lossy(body);
            write!(f, "\"{}\"", escape_string(&s))
        }
        Primitive::Bytes => {
            write!(f, "0x")?;
            for b in body {
                write!(f, "{:02x}", b)?;
            }
            Ok(())
        }
        Primitive::Ip => match decode_ip(body) {
            Ok(ip) => write!(f, "{}", ip),
            Err(_) => write!(f, "<bad ip>"),
        },
        Primitive::Net => match decode_net(body) {
            Ok(net) => write!(f, "{}", net),
            Err(_) => write!(f, "<bad net>"),
        },
        Primitive::Type => {
            // Type values are rendered from their encoding without interning.
            let ctx = crate::types::TypeContext::new();
            match ctx.lookup_by_value(body) {
                Ok(ty) => write!(f, "<{}>", ty),
                Err(_) => write!(f, "<bad type>"),
            }
        }
        _ => write!(f, "null"),
    }
}

fn fmt_elems(f: &mut fmt::Formatter<'_>, elem: &Type, body: &[u8]) -> fmt::Result {
    for (i, bytes) in Iter::new(body).enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        fmt_body(f, elem, bytes)?;
    }
    Ok(())
}

pub(crate) fn fmt_body(f: &mut fmt::Formatter<'_>, ty: &Type, body: Option<&[u8]>) -> fmt::Result {
    let Some(body) = body else {
        return write!(f, "null");
    };
    match ty.kind() {
        TypeKind::Primitive(p) => fmt_primitive(f, *p, body),
        TypeKind::Record(fields) => {
            write!(f, "{{")?;
            let mut first = true;
            for (field, (bytes, none)) in fields.iter().zip(RecordIter::new(body, fields)) {
                if none {
                    continue;
                }
                if !first {
                    write!(f, ",")?;
                }
                first = false;
                write!(f, "{}:", field.name)?;
                fmt_body(f, &field.ty, bytes)?;
            }
            write!(f, "}}")
        }
        TypeKind::Array(elem) => {
            write!(f, "[")?;
            fmt_elems(f, elem, body)?;
            write!(f, "]")
        }
        TypeKind::Set(elem) => {
            write!(f, "|[")?;
            fmt_elems(f, elem, body)?;
            write!(f, "]|")
        }
        TypeKind::Map(key, val) => {
            write!(f, "|{{")?;
            let elems: Vec<_> = Iter::new(body).collect();
            for (i, kv) in elems.chunks_exact(2).enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                fmt_body(f, key, kv[0])?;
                write!(f, ":")?;
                fmt_body(f, val, kv[1])?;
            }
            write!(f, "}}|")
        }
        TypeKind::Union(_) => {
            let val = Value::new(ty.clone(), Some(body.to_vec()));
            match val.union_member() {
                Some((_, member)) => write!(f, "{}", member),
                None => write!(f, "<bad union>"),
            }
        }
        TypeKind::Enum(symbols) => match symbols.get(decode_uint(body) as usize) {
            Some(symbol) => write!(f, "{}", symbol),
            None => write!(f, "<bad enum>"),
        },
        TypeKind::Named(_, inner) => fmt_body(f, inner, Some(body)),
        TypeKind::Error(inner) => {
            write!(f, "error(")?;
            fmt_body(f, inner, Some(body))?;
            write!(f, ")")
        }
    }
}
