use std::net::IpAddr;

use crate::codec::prims::{
    self, Net, decode_bool, decode_float, decode_int, decode_ip, decode_net, decode_uint,
};
use crate::codec::{Builder, Iter, RecordIter, decode_element};
use crate::types::{Field, Primitive, Type, TypeContext, TypeKind};

use super::coerce::Number;

/// An immutable `(type, bytes)` pair. `bytes` is the body of the value in
/// the canonical encoding, without the outer tag; `None` is null.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Value {
    ty: Type,
    bytes: Option<Vec<u8>>,
}

impl Value {
    pub fn new(ty: Type, bytes: Option<Vec<u8>>) -> Self {
        Value { ty, bytes }
    }

    /// The untyped null.
    pub fn null() -> Self {
        Value::new(Type::null(), None)
    }

    /// A null of the given type.
    pub fn null_of(ty: Type) -> Self {
        Value::new(ty, None)
    }

    pub fn int64(v: i64) -> Self {
        Value::int(Primitive::Int64, v)
    }

    pub fn int(p: Primitive, v: i64) -> Self {
        debug_assert!(p.is_signed());
        Value::new(Type::primitive(p), Some(prims::encode_int(v).to_vec()))
    }

    pub fn uint64(v: u64) -> Self {
        Value::uint(Primitive::Uint64, v)
    }

    pub fn uint(p: Primitive, v: u64) -> Self {
        debug_assert!(p.is_unsigned());
        Value::new(Type::primitive(p), Some(prims::encode_uint(v).to_vec()))
    }

    pub fn float64(v: f64) -> Self {
        Value::float(Primitive::Float64, v)
    }

    pub fn float(p: Primitive, v: f64) -> Self {
        let body = match p {
            Primitive::Float16 => prims::encode_float16(v as f32),
            Primitive::Float32 => prims::encode_float32(v as f32),
            _ => prims::encode_float64(v),
        };
        Value::new(Type::primitive(p), Some(body.to_vec()))
    }

    pub fn bool(v: bool) -> Self {
        Value::new(Type::bool(), Some(prims::encode_bool(v).to_vec()))
    }

    pub fn string(s: &str) -> Self {
        Value::new(Type::string(), Some(s.as_bytes().to_vec()))
    }

    pub fn bytes_value(b: &[u8]) -> Self {
        Value::new(Type::bytes(), Some(b.to_vec()))
    }

    pub fn ip(ip: IpAddr) -> Self {
        Value::new(
            Type::primitive(Primitive::Ip),
            Some(prims::encode_ip(&ip).to_vec()),
        )
    }

    pub fn net(net: Net) -> Self {
        Value::new(
            Type::primitive(Primitive::Net),
            Some(prims::encode_net(&net).to_vec()),
        )
    }

    /// Nanoseconds since the epoch.
    pub fn time(ns: i64) -> Self {
        Value::int(Primitive::Time, ns)
    }

    pub fn duration(ns: i64) -> Self {
        Value::int(Primitive::Duration, ns)
    }

    /// A value of enum type `ty` selecting symbol `index`.
    pub fn enum_value(ty: Type, index: u64) -> Self {
        Value::new(ty, Some(prims::encode_uint(index).to_vec()))
    }

    /// Wraps `member` as a value of union type `ty`.
    ///
    /// # Panics
    /// If `member`'s type is not one of the union's members.
    pub fn union(ty: &Type, member: &Value) -> Self {
        let tag = ty
            .union_members()
            .and_then(|members| members.iter().position(|m| m == member.ty()))
            .unwrap_or_else(|| panic!("{} is not a member of {}", member.ty(), ty));
        let mut b = Builder::new();
        b.append(Some(&prims::encode_uint(tag as u64)));
        member.append_to(&mut b);
        Value::new(ty.clone(), Some(b.into_bytes()))
    }

    /// Re-types the value without touching its bytes (named and error
    /// wrappers share their payload's layout).
    pub fn retype(&self, ty: Type) -> Self {
        Value::new(ty, self.bytes.clone())
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        self.bytes
    }

    /// Size of the body, used for memory accounting.
    pub fn size(&self) -> usize {
        self.bytes.as_ref().map_or(0, |b| b.len())
    }

    /// Appends the value to a container under construction.
    pub fn append_to(&self, b: &mut Builder) {
        b.append_body(self.bytes(), self.ty.is_container());
    }

    pub fn is_null(&self) -> bool {
        self.bytes.is_none()
    }

    pub fn is_error(&self) -> bool {
        self.ty.is_error()
    }

    fn is_string_error(&self, msg: &str) -> bool {
        self.ty
            .error_inner()
            .is_some_and(|inner| inner.under().is(Primitive::String))
            && self.bytes() == Some(msg.as_bytes())
    }

    pub fn is_missing(&self) -> bool {
        self.is_string_error("missing")
    }

    pub fn is_quiet(&self) -> bool {
        self.is_string_error("quiet")
    }

    /// Strips named wrappers and unwraps union members down to the
    /// concrete value.
    pub fn under(&self) -> Value {
        let mut val = self.clone();
        loop {
            match val.ty.kind() {
                TypeKind::Named(_, inner) => val.ty = inner.clone(),
                TypeKind::Union(_) => match val.union_member() {
                    Some((_, member)) => val = member,
                    None => return val,
                },
                _ => return val,
            }
        }
    }

    fn prim(&self) -> Option<(Primitive, &[u8])> {
        let p = self.ty.under().as_primitive()?;
        Some((p, self.bytes()?))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.prim()? {
            (p, b) if p.is_signed() => Some(decode_int(b)),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self.prim()? {
            (p, b) if p.is_unsigned() => Some(decode_uint(b)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.prim()? {
            (p, b) if p.is_float() => decode_float(b).ok(),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        Number::from_value(self)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.prim()? {
            (Primitive::Bool, b) => Some(decode_bool(b)),
            _ => None,
        }
    }

    /// True only for a non-null boolean true.
    pub fn is_true(&self) -> bool {
        self.as_bool() == Some(true)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.prim()? {
            (Primitive::String, b) => core::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self.prim()? {
            (Primitive::Bytes, b) => Some(b),
            _ => None,
        }
    }

    pub fn as_ip(&self) -> Option<IpAddr> {
        match self.prim()? {
            (Primitive::Ip, b) => decode_ip(b).ok(),
            _ => None,
        }
    }

    pub fn as_net(&self) -> Option<Net> {
        match self.prim()? {
            (Primitive::Net, b) => decode_net(b).ok(),
            _ => None,
        }
    }

    /// Decodes a type value.
    pub fn as_type(&self, ctx: &TypeContext) -> Option<Type> {
        match self.prim()? {
            (Primitive::Type, b) => ctx.lookup_by_value(b).ok(),
            _ => None,
        }
    }

    pub fn enum_symbol(&self) -> Option<&str> {
        let symbols = self.ty.enum_symbols()?;
        let index = decode_uint(self.bytes()?) as usize;
        symbols.get(index).map(String::as_str)
    }

    /// The payload of an error value, typed by the error's inner type.
    pub fn error_payload(&self) -> Option<Value> {
        let inner = self.ty.error_inner()?;
        Some(Value::new(inner.clone(), self.bytes.clone()))
    }

    /// The member index and member value of a non-null union value.
    pub fn union_member(&self) -> Option<(usize, Value)> {
        let members = self.ty.union_members()?;
        let mut it = Iter::new(self.bytes()?);
        let tag = decode_uint(it.next()??) as usize;
        let member = members.get(tag)?;
        let body = it.next()?;
        Some((tag, Value::new(member.clone(), body.map(<[u8]>::to_vec))))
    }

    /// Record fields in type order. Absent optional fields are `None`.
    pub fn record_entries(&self) -> Option<Vec<(&Field, Option<Value>)>> {
        let fields = self.ty.record_fields()?;
        let body = self.bytes()?;
        Some(
            fields
                .iter()
                .zip(RecordIter::new(body, fields))
                .map(|(field, (bytes, none))| {
                    let val = (!none).then(|| {
                        Value::new(field.ty.clone(), bytes.map(<[u8]>::to_vec))
                    });
                    (field, val)
                })
                .collect(),
        )
    }

    /// Looks up a field of a record value. `None` when the value is not a
    /// record, the field does not exist or it is absent.
    pub fn deref(&self, name: &str) -> Option<Value> {
        let fields = self.ty.record_fields()?;
        let index = fields.iter().position(|f| f.name == name)?;
        let (bytes, none) = RecordIter::new(self.bytes()?, fields).nth(index)?;
        if none {
            return None;
        }
        Some(Value::new(
            fields[index].ty.clone(),
            bytes.map(<[u8]>::to_vec),
        ))
    }

    /// Walks a dotted path of field names.
    pub fn deref_path(&self, path: &[String]) -> Option<Value> {
        let mut val = self.clone();
        for name in path {
            val = val.under().deref(name)?;
        }
        Some(val)
    }

    /// Elements of an array or set value.
    pub fn elements(&self) -> Option<Vec<Value>> {
        let elem = self.ty.elem()?;
        let body = self.bytes()?;
        Some(
            Iter::new(body)
                .map(|b| Value::new(elem.clone(), b.map(<[u8]>::to_vec)))
                .collect(),
        )
    }

    pub fn map_entries(&self) -> Option<Vec<(Value, Value)>> {
        let (key, val) = self.ty.map_types()?;
        let elems: Vec<_> = Iter::new(self.bytes()?).collect();
        Some(
            elems
                .chunks_exact(2)
                .map(|kv| {
                    (
                        Value::new(key.clone(), kv[0].map(<[u8]>::to_vec)),
                        Value::new(val.clone(), kv[1].map(<[u8]>::to_vec)),
                    )
                })
                .collect(),
        )
    }

    /// Decodes the value framed at the front of `bytes` as type `ty`,
    /// returning it and the bytes consumed.
    pub fn decode_framed(ty: &Type, bytes: &[u8]) -> crate::error::Result<(Value, usize)> {
        let (elem, n) = decode_element(bytes)?;
        Ok((Value::new(ty.clone(), elem.body.map(<[u8]>::to_vec)), n))
    }
}

impl core::fmt::Debug for Value {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}::{}", self, self.ty)
    }
}
