use core::fmt::Display;
use core::sync::atomic::{AtomicU32, Ordering};

use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::types::encoding::{decode_type, encode_type};
use crate::types::types::{Field, ID_FIRST_COMPOSITE, Primitive, Type, TypeKind};
use crate::value::Value;

/// Interning registry for composite types.
///
/// Every composite type is created through a context, and looking up a
/// structurally identical type returns the same [`Type`] object, so
/// identity comparison is structural comparison. Lookups take a read lock
/// on the hot path and only upgrade to the write lock to insert.
pub struct TypeContext {
    interned: RwLock<Interned>,
    next_id: AtomicU32,
    string_error: Type,
}

#[derive(Default)]
struct Interned {
    by_kind: HashMap<TypeKind, Type>,
    by_id: Vec<Type>,
}

impl Default for TypeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for TypeContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "TypeContext({} types)", self.interned.read().by_id.len())
    }
}

impl TypeContext {
    pub fn new() -> Self {
        let string_error = Type::from_data(
            ID_FIRST_COMPOSITE,
            TypeKind::Error(Type::string()),
        );
        let mut interned = Interned::default();
        interned
            .by_kind
            .insert(string_error.kind().clone(), string_error.clone());
        interned.by_id.push(string_error.clone());
        TypeContext {
            interned: RwLock::new(interned),
            next_id: AtomicU32::new(ID_FIRST_COMPOSITE + 1),
            string_error,
        }
    }

    fn intern(&self, kind: TypeKind) -> Type {
        if let TypeKind::Primitive(p) = kind {
            return Type::primitive(p);
        }
        if let Some(ty) = self.interned.read().by_kind.get(&kind) {
            return ty.clone();
        }
        let mut interned = self.interned.write();
        // Another writer may have won the race between the two locks.
        if let Some(ty) = interned.by_kind.get(&kind) {
            return ty.clone();
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let ty = Type::from_data(id, kind.clone());
        debug_assert_eq!(
            (id - ID_FIRST_COMPOSITE) as usize,
            interned.by_id.len(),
            "type ids must be dense"
        );
        interned.by_id.push(ty.clone());
        interned.by_kind.insert(kind, ty.clone());
        ty
    }

    /// Returns the type with the given ID, if it was allocated by this context.
    pub fn lookup_type(&self, id: u32) -> Option<Type> {
        if id < ID_FIRST_COMPOSITE {
            return Primitive::from_id(id).map(Type::primitive);
        }
        self.interned
            .read()
            .by_id
            .get((id - ID_FIRST_COMPOSITE) as usize)
            .cloned()
    }

    pub fn lookup_type_record(&self, fields: Vec<Field>) -> Result<Type> {
        {
            let mut seen = HashSet::with_capacity(fields.len());
            for field in &fields {
                if !seen.insert(field.name.as_str()) {
                    return Err(Error::DuplicateField(field.name.clone()));
                }
            }
        }
        Ok(self.intern(TypeKind::Record(fields)))
    }

    pub fn lookup_type_array(&self, inner: &Type) -> Type {
        self.intern(TypeKind::Array(inner.clone()))
    }

    pub fn lookup_type_set(&self, inner: &Type) -> Type {
        self.intern(TypeKind::Set(inner.clone()))
    }

    pub fn lookup_type_map(&self, key: &Type, val: &Type) -> Type {
        self.intern(TypeKind::Map(key.clone(), val.clone()))
    }

    /// Members are flattened (a union inside a union contributes its own
    /// members), deduplicated and put in ID order, so the same member set
    /// always yields the same union type.
    pub fn lookup_type_union(&self, members: Vec<Type>) -> Type {
        let mut flat: Vec<Type> = Vec::with_capacity(members.len());
        for member in members {
            match member.kind() {
                TypeKind::Union(inner) => flat.extend(inner.iter().cloned()),
                _ => flat.push(member),
            }
        }
        flat.sort_by_key(|t| t.id());
        flat.dedup();
        self.intern(TypeKind::Union(flat))
    }

    pub fn lookup_type_enum(&self, symbols: Vec<String>) -> Type {
        self.intern(TypeKind::Enum(symbols))
    }

    pub fn lookup_type_named(&self, name: &str, inner: &Type) -> Result<Type> {
        if name.is_empty() || Primitive::from_name(name).is_some() {
            return Err(Error::compile(format!("invalid type name \"{}\"", name)));
        }
        Ok(self.intern(TypeKind::Named(name.to_string(), inner.clone())))
    }

    pub fn lookup_type_error(&self, inner: &Type) -> Type {
        self.intern(TypeKind::Error(inner.clone()))
    }

    /// Decodes a type value body and interns the type it describes.
    pub fn lookup_by_value(&self, bytes: &[u8]) -> Result<Type> {
        let (ty, n) = decode_type(self, bytes)?;
        if n != bytes.len() {
            return Err(Error::codec("trailing bytes after type value"));
        }
        Ok(ty)
    }

    /// Like [`TypeContext::lookup_by_value`] but also returns how many
    /// bytes the encoded type occupied.
    pub fn decode_type_value(&self, bytes: &[u8]) -> Result<(Type, usize)> {
        decode_type(self, bytes)
    }

    /// The value of type `type` describing `ty`.
    pub fn lookup_type_value(&self, ty: &Type) -> Value {
        Value::new(Type::type_type(), Some(encode_type(ty)))
    }

    /// `error(string)`, shared by `missing`, `quiet` and [`TypeContext::new_error`].
    pub fn string_error_type(&self) -> &Type {
        &self.string_error
    }

    pub fn missing(&self) -> Value {
        Value::new(self.string_error.clone(), Some(b"missing".to_vec()))
    }

    pub fn quiet(&self) -> Value {
        Value::new(self.string_error.clone(), Some(b"quiet".to_vec()))
    }

    pub fn new_error(&self, err: impl Display) -> Value {
        Value::new(
            self.string_error.clone(),
            Some(err.to_string().into_bytes()),
        )
    }

    /// `error(val)` for an arbitrary payload.
    pub fn error_value(&self, val: &Value) -> Value {
        Value::new(
            self.lookup_type_error(val.ty()),
            val.bytes().map(|b| b.to_vec()),
        )
    }

    /// `error({message:string, on:<val.type>})`.
    pub fn wrap_error(&self, msg: &str, val: &Value) -> Value {
        let rec = self
            .lookup_type_record(vec![
                Field::new("message", Type::string()),
                Field::new("on", val.ty().clone()),
            ])
            .expect("message and on are distinct");
        let mut b = crate::codec::Builder::new();
        b.append(Some(msg.as_bytes()));
        b.append_body(val.bytes(), val.ty().is_container());
        let body = b.into_bytes();
        Value::new(self.lookup_type_error(&rec), Some(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_interning() {
        let ctx = TypeContext::new();
        let a = ctx.lookup_type_array(&Type::int64());
        let b = ctx.lookup_type_array(&Type::int64());
        assert_eq!(a, b);
        assert!(a.id() >= ID_FIRST_COMPOSITE);
        assert_eq!(ctx.lookup_type(a.id()), Some(a.clone()));
        assert_ne!(a, ctx.lookup_type_set(&Type::int64()));
    }

    #[test]
    fn test_ids_are_monotonic() {
        let ctx = TypeContext::new();
        let a = ctx.lookup_type_array(&Type::int64());
        let b = ctx.lookup_type_array(&Type::string());
        let c = ctx.lookup_type_array(&a);
        assert!(a.id() < b.id() && b.id() < c.id());
    }

    #[test]
    fn test_duplicate_field() {
        let ctx = TypeContext::new();
        let err = ctx
            .lookup_type_record(vec![
                Field::new("a", Type::int64()),
                Field::new("a", Type::string()),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateField(name) if name == "a"));
    }

    #[test]
    fn test_union_is_canonical() {
        let ctx = TypeContext::new();
        let u1 = ctx.lookup_type_union(vec![Type::string(), Type::int64()]);
        let u2 = ctx.lookup_type_union(vec![Type::int64(), Type::string(), Type::int64()]);
        assert_eq!(u1, u2);
        let nested = ctx.lookup_type_union(vec![u1.clone(), Type::bool()]);
        assert_eq!(nested.union_members().unwrap().len(), 3);
    }

    #[test]
    fn test_named_is_nominal() {
        let ctx = TypeContext::new();
        let port = ctx.lookup_type_named("port", &Type::uint64()).unwrap();
        assert_ne!(port, Type::uint64());
        assert_eq!(port.under(), &Type::uint64());
        assert_eq!(port.under().under(), port.under());
        assert!(ctx.lookup_type_named("int64", &Type::uint64()).is_err());
    }

    #[test]
    fn test_concurrent_lookups_agree() {
        let ctx = Arc::new(TypeContext::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ctx = ctx.clone();
                std::thread::spawn(move || {
                    (0..100)
                        .map(|i| {
                            let name = format!("f{}", i % 10);
                            ctx.lookup_type_record(vec![Field::new(name, Type::int64())])
                                .unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for r in &results[1..] {
            assert_eq!(r, &results[0]);
        }
    }

    #[test]
    fn test_errors() {
        let ctx = TypeContext::new();
        assert!(ctx.missing().is_missing());
        assert!(ctx.quiet().is_quiet());
        let wrapped = ctx.wrap_error("bad", &Value::int64(1));
        assert!(wrapped.is_error());
        assert_eq!(wrapped.to_string(), "error({message:\"bad\",on:1})");
    }
}
