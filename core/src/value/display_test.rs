//! Tests for the diagnostic rendering of values.

use std::net::IpAddr;

use crate::codec::prims::Net;
use crate::types::{Field, Type, TypeContext};
use crate::value::{Value, build};
use pretty_assertions::assert_eq;

#[test]
fn test_display_scalars() {
    assert_eq!(Value::int64(-100).to_string(), "-100");
    assert_eq!(Value::uint64(7).to_string(), "7");
    assert_eq!(Value::float64(3.0).to_string(), "3.0");
    assert_eq!(Value::float64(1.5).to_string(), "1.5");
    assert_eq!(Value::bool(true).to_string(), "true");
    assert_eq!(Value::null().to_string(), "null");
    assert_eq!(Value::bytes_value(&[0xde, 0xad]).to_string(), "0xdead");
}

#[test]
fn test_display_string_escapes() {
    assert_eq!(Value::string("a\"b\n").to_string(), "\"a\\\"b\\n\"");
}

#[test]
fn test_display_ip_and_net() {
    let ip: IpAddr = "10.0.0.1".parse().unwrap();
    assert_eq!(Value::ip(ip).to_string(), "10.0.0.1");
    let net = Net::new("10.0.0.0".parse().unwrap(), 8);
    assert_eq!(Value::net(net).to_string(), "10.0.0.0/8");
}

#[test]
fn test_display_composites() {
    let ctx = TypeContext::new();
    let rec = build::record(
        &ctx,
        vec![
            ("a".into(), Value::int64(1)),
            ("b".into(), build::array(&ctx, &[Value::string("x")])),
        ],
    )
    .unwrap();
    assert_eq!(rec.to_string(), "{a:1,b:[\"x\"]}");
    let m = build::map(&ctx, &[(Value::string("k"), Value::int64(1))]);
    assert_eq!(m.to_string(), "|{\"k\":1}|");
}

#[test]
fn test_display_errors_and_types() {
    let ctx = TypeContext::new();
    assert_eq!(ctx.missing().to_string(), "error(\"missing\")");
    let ty = ctx
        .lookup_type_record(vec![Field::optional("a", Type::int64())])
        .unwrap();
    assert_eq!(ctx.lookup_type_value(&ty).to_string(), "<{a:int64?}>");
}

#[test]
fn test_display_enum_and_named() {
    let ctx = TypeContext::new();
    let color = ctx.lookup_type_enum(vec!["red".into(), "green".into()]);
    assert_eq!(Value::enum_value(color, 1).to_string(), "green");
    let port = ctx.lookup_type_named("port", &Type::uint64()).unwrap();
    assert_eq!(Value::uint64(80).retype(port).to_string(), "80");
}
