//! Flat vectors of primitive values: parallel arrays plus an optional null mask.

use std::net::IpAddr;

use crate::codec::Builder;
use crate::codec::prims::{self, Net};
use crate::types::{Primitive, Type};

use super::{Any, Bitmap};

fn is_null(nulls: &Option<Bitmap>, slot: u32) -> bool {
    nulls.as_ref().is_some_and(|n| n.get(slot))
}

/// Signed integers, durations and times.
#[derive(Debug, Clone)]
pub struct Ints {
    pub ty: Type,
    pub values: Vec<i64>,
    pub nulls: Option<Bitmap>,
}

/// Unsigned integers. Also backs enum vectors, whose values are selectors.
#[derive(Debug, Clone)]
pub struct Uints {
    pub ty: Type,
    pub values: Vec<u64>,
    pub nulls: Option<Bitmap>,
}

#[derive(Debug, Clone)]
pub struct Floats {
    pub ty: Type,
    pub values: Vec<f64>,
    pub nulls: Option<Bitmap>,
}

#[derive(Debug, Clone)]
pub struct Bools {
    pub values: Bitmap,
    pub nulls: Option<Bitmap>,
}

/// Variable-length bodies: strings, bytes and type values.
#[derive(Debug, Clone)]
pub struct Strs {
    pub ty: Type,
    pub offsets: Vec<u32>,
    pub bytes: Vec<u8>,
    pub nulls: Option<Bitmap>,
}

#[derive(Debug, Clone)]
pub struct Ips {
    pub values: Vec<IpAddr>,
    pub nulls: Option<Bitmap>,
}

#[derive(Debug, Clone)]
pub struct Nets {
    pub values: Vec<Net>,
    pub nulls: Option<Bitmap>,
}

impl Ints {
    pub fn new(ty: Type, values: Vec<i64>, nulls: Option<Bitmap>) -> Self {
        Ints { ty, values, nulls }
    }

    pub fn get(&self, slot: u32) -> Option<i64> {
        (!is_null(&self.nulls, slot)).then(|| self.values[slot as usize])
    }
}

impl Uints {
    pub fn new(ty: Type, values: Vec<u64>, nulls: Option<Bitmap>) -> Self {
        Uints { ty, values, nulls }
    }

    pub fn get(&self, slot: u32) -> Option<u64> {
        (!is_null(&self.nulls, slot)).then(|| self.values[slot as usize])
    }
}

impl Floats {
    pub fn new(ty: Type, values: Vec<f64>, nulls: Option<Bitmap>) -> Self {
        Floats { ty, values, nulls }
    }

    pub fn get(&self, slot: u32) -> Option<f64> {
        (!is_null(&self.nulls, slot)).then(|| self.values[slot as usize])
    }
}

impl Bools {
    pub fn new(values: Bitmap, nulls: Option<Bitmap>) -> Self {
        Bools { values, nulls }
    }

    pub fn get(&self, slot: u32) -> Option<bool> {
        (!is_null(&self.nulls, slot)).then(|| self.values.get(slot))
    }
}

impl Strs {
    pub fn new(ty: Type) -> Self {
        Strs {
            ty,
            offsets: vec![0],
            bytes: Vec::new(),
            nulls: None,
        }
    }

    pub fn push(&mut self, body: &[u8]) {
        self.bytes.extend_from_slice(body);
        self.offsets.push(self.bytes.len() as u32);
    }

    pub fn get(&self, slot: u32) -> Option<&[u8]> {
        if is_null(&self.nulls, slot) {
            return None;
        }
        let (start, end) = (self.offsets[slot as usize], self.offsets[slot as usize + 1]);
        Some(&self.bytes[start as usize..end as usize])
    }
}

impl Ips {
    pub fn get(&self, slot: u32) -> Option<IpAddr> {
        (!is_null(&self.nulls, slot)).then(|| self.values[slot as usize])
    }
}

impl Nets {
    pub fn get(&self, slot: u32) -> Option<Net> {
        (!is_null(&self.nulls, slot)).then(|| self.values[slot as usize])
    }
}

impl Any for Ints {
    fn ty(&self) -> Type {
        self.ty.clone()
    }

    fn len(&self) -> u32 {
        self.values.len() as u32
    }

    fn serialize(&self, b: &mut Builder, slot: u32) {
        match self.get(slot) {
            Some(v) => b.append(Some(&prims::encode_int(v))),
            None => b.append_null(),
        }
    }
}

impl Any for Uints {
    fn ty(&self) -> Type {
        self.ty.clone()
    }

    fn len(&self) -> u32 {
        self.values.len() as u32
    }

    fn serialize(&self, b: &mut Builder, slot: u32) {
        match self.get(slot) {
            Some(v) => b.append(Some(&prims::encode_uint(v))),
            None => b.append_null(),
        }
    }
}

impl Any for Floats {
    fn ty(&self) -> Type {
        self.ty.clone()
    }

    fn len(&self) -> u32 {
        self.values.len() as u32
    }

    fn serialize(&self, b: &mut Builder, slot: u32) {
        let Some(v) = self.get(slot) else {
            return b.append_null();
        };
        let body = match self.ty.under().as_primitive() {
            Some(Primitive::Float16) => prims::encode_float16(v as f32),
            Some(Primitive::Float32) => prims::encode_float32(v as f32),
            _ => prims::encode_float64(v),
        };
        b.append(Some(&body));
    }
}

impl Any for Bools {
    fn ty(&self) -> Type {
        Type::bool()
    }

    fn len(&self) -> u32 {
        self.values.len()
    }

    fn serialize(&self, b: &mut Builder, slot: u32) {
        match self.get(slot) {
            Some(v) => b.append(Some(&prims::encode_bool(v))),
            None => b.append_null(),
        }
    }
}

impl Any for Strs {
    fn ty(&self) -> Type {
        self.ty.clone()
    }

    fn len(&self) -> u32 {
        (self.offsets.len() - 1) as u32
    }

    fn serialize(&self, b: &mut Builder, slot: u32) {
        b.append(self.get(slot));
    }
}

impl Any for Ips {
    fn ty(&self) -> Type {
        Type::primitive(Primitive::Ip)
    }

    fn len(&self) -> u32 {
        self.values.len() as u32
    }

    fn serialize(&self, b: &mut Builder, slot: u32) {
        match self.get(slot) {
            Some(ip) => b.append(Some(&prims::encode_ip(&ip))),
            None => b.append_null(),
        }
    }
}

impl Any for Nets {
    fn ty(&self) -> Type {
        Type::primitive(Primitive::Net)
    }

    fn len(&self) -> u32 {
        self.values.len() as u32
    }

    fn serialize(&self, b: &mut Builder, slot: u32) {
        match self.get(slot) {
            Some(net) => b.append(Some(&prims::encode_net(&net))),
            None => b.append_null(),
        }
    }
}
