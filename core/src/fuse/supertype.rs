//! The supertype of two types: the smallest type both upcast into.

use crate::types::{Field, Kind, Type, TypeContext, TypeKind};

/// Fuses `a` and `b` into a type that subsumes both.
///
/// Records merge their fields (fields present on one side only become
/// optional), collections fuse their element types, enums merge their
/// symbols and everything else falls back to a union that holds at most
/// one member of each composite kind.
pub fn fuse(ctx: &TypeContext, a: &Type, b: &Type) -> Type {
    if a == b {
        return a.clone();
    }
    if a.is_null() {
        return b.clone();
    }
    if b.is_null() {
        return a.clone();
    }
    match (a.kind(), b.kind()) {
        (TypeKind::Record(fa), TypeKind::Record(fb)) => fuse_records(ctx, fa, fb),
        (TypeKind::Array(ia), TypeKind::Array(ib)) => ctx.lookup_type_array(&fuse(ctx, ia, ib)),
        (TypeKind::Set(ia), TypeKind::Set(ib)) => ctx.lookup_type_set(&fuse(ctx, ia, ib)),
        (TypeKind::Map(ka, va), TypeKind::Map(kb, vb)) => {
            ctx.lookup_type_map(&fuse(ctx, ka, kb), &fuse(ctx, va, vb))
        }
        (TypeKind::Enum(sa), TypeKind::Enum(sb)) => {
            let mut symbols = sa.clone();
            for s in sb {
                if !symbols.contains(s) {
                    symbols.push(s.clone());
                }
            }
            ctx.lookup_type_enum(symbols)
        }
        (TypeKind::Error(ia), TypeKind::Error(ib)) => ctx.lookup_type_error(&fuse(ctx, ia, ib)),
        (TypeKind::Named(na, ia), TypeKind::Named(nb, ib)) if na == nb => {
            let inner = fuse(ctx, ia, ib);
            ctx.lookup_type_named(na, &inner)
                .unwrap_or_else(|_| fuse_union(ctx, a, b))
        }
        _ => fuse_union(ctx, a, b),
    }
}

fn fuse_records(ctx: &TypeContext, fa: &[Field], fb: &[Field]) -> Type {
    let mut fields: Vec<Field> = Vec::with_capacity(fa.len().max(fb.len()));
    for f in fa {
        match fb.iter().find(|g| g.name == f.name) {
            Some(g) => fields.push(
                Field::new(f.name.clone(), fuse(ctx, &f.ty, &g.ty)).with_opt(f.is_opt() || g.is_opt()),
            ),
            None => fields.push(f.clone().with_opt(true)),
        }
    }
    for g in fb {
        if !fa.iter().any(|f| f.name == g.name) {
            fields.push(g.clone().with_opt(true));
        }
    }
    ctx.lookup_type_record(fields)
        .expect("fused field names are distinct")
}

fn members(ty: &Type) -> Vec<Type> {
    match ty.union_members() {
        Some(members) => members.to_vec(),
        None => vec![ty.clone()],
    }
}

/// Folds the members of `b` into those of `a`. Two composite members of
/// the same kind fuse into one.
fn fuse_union(ctx: &TypeContext, a: &Type, b: &Type) -> Type {
    let mut out = members(a);
    for m in members(b) {
        if out.contains(&m) {
            continue;
        }
        let kind = m.kind_tag();
        let mergeable = !matches!(kind, Kind::Primitive | Kind::TypeValue | Kind::Named);
        match out.iter().position(|t| mergeable && t.kind_tag() == kind) {
            Some(i) => out[i] = fuse(ctx, &out[i], &m),
            None => out.push(m),
        }
    }
    if out.len() == 1 {
        return out.remove(0);
    }
    ctx.lookup_type_union(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Primitive;
    use pretty_assertions::assert_eq;

    fn record(ctx: &TypeContext, fields: &[(&str, Type)]) -> Type {
        ctx.lookup_type_record(fields.iter().map(|(n, t)| Field::new(*n, t.clone())).collect())
            .unwrap()
    }

    #[test]
    fn test_fuse_records_marks_optional() {
        let ctx = TypeContext::new();
        let a = record(&ctx, &[("a", Type::int64())]);
        let b = record(&ctx, &[("b", Type::string())]);
        let ab = record(&ctx, &[("a", Type::int64()), ("b", Type::string())]);
        let t = fuse(&ctx, &fuse(&ctx, &a, &b), &ab);
        assert_eq!(t.to_string(), "{a:int64?,b:string?}");
    }

    #[test]
    fn test_fuse_field_types() {
        let ctx = TypeContext::new();
        let a = record(&ctx, &[("x", Type::int64())]);
        let b = record(&ctx, &[("x", Type::string())]);
        assert_eq!(fuse(&ctx, &a, &b).to_string(), "{x:(int64|string)}");
    }

    #[test]
    fn test_union_keeps_one_record() {
        let ctx = TypeContext::new();
        let r1 = record(&ctx, &[("a", Type::int64())]);
        let r2 = record(&ctx, &[("b", Type::int64())]);
        let t = fuse(&ctx, &Type::string(), &r1);
        let t = fuse(&ctx, &t, &r2);
        let members = t.union_members().unwrap();
        assert_eq!(members.len(), 2);
        assert!(members.iter().any(|m| m.to_string() == "{a:int64?,b:int64?}"));
    }

    #[test]
    fn test_fuse_arrays_and_enums() {
        let ctx = TypeContext::new();
        let a = ctx.lookup_type_array(&Type::int64());
        let b = ctx.lookup_type_array(&Type::primitive(Primitive::Float64));
        assert_eq!(fuse(&ctx, &a, &b).to_string(), "[(int64|float64)]");
        let e1 = ctx.lookup_type_enum(vec!["a".into(), "b".into()]);
        let e2 = ctx.lookup_type_enum(vec!["b".into(), "c".into()]);
        assert_eq!(fuse(&ctx, &e1, &e2).enum_symbols().unwrap(), ["a", "b", "c"]);
        assert_eq!(fuse(&ctx, &Type::null(), &a), a);
    }
}
