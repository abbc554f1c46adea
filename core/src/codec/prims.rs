//! Encoders and decoders for primitive leaf bodies.
//!
//! The length of a leaf is carried by its tag, so integers are stored in
//! the fewest little-endian bytes that hold them and zero is the empty body.

use core::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use smallvec::SmallVec;

use crate::error::{Error, Result};

pub type Leaf = SmallVec<[u8; 16]>;

pub fn append_uvarint(buf: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        buf.push((v as u8) | 0x80);
        v >>= 7;
    }
    buf.push(v as u8);
}

/// Reads a LEB128 varint, returning the value and the number of bytes used.
pub fn read_uvarint(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut v = 0u64;
    let mut shift = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if shift >= 64 {
            return Err(Error::codec("uvarint overflow"));
        }
        v |= ((b & 0x7f) as u64) << shift;
        if b & 0x80 == 0 {
            return Ok((v, i + 1));
        }
        shift += 7;
    }
    Err(Error::codec("truncated uvarint"))
}

pub fn encode_uint(v: u64) -> Leaf {
    let mut out = Leaf::new();
    let mut v = v;
    while v != 0 {
        out.push(v as u8);
        v >>= 8;
    }
    out
}

pub fn decode_uint(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .take(8)
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

pub fn encode_int(v: i64) -> Leaf {
    encode_uint(((v << 1) ^ (v >> 63)) as u64)
}

pub fn decode_int(bytes: &[u8]) -> i64 {
    let u = decode_uint(bytes);
    ((u >> 1) as i64) ^ -((u & 1) as i64)
}

pub fn encode_float64(v: f64) -> Leaf {
    Leaf::from_slice(&v.to_le_bytes())
}

pub fn encode_float32(v: f32) -> Leaf {
    Leaf::from_slice(&v.to_le_bytes())
}

pub fn encode_float16(v: f32) -> Leaf {
    Leaf::from_slice(&f32_to_f16_bits(v).to_le_bytes())
}

/// Decodes a float body of any supported width.
pub fn decode_float(bytes: &[u8]) -> Result<f64> {
    match bytes.len() {
        8 => {
            let mut b = [0u8; 8];
            b.copy_from_slice(bytes);
            Ok(f64::from_le_bytes(b))
        }
        4 => {
            let mut b = [0u8; 4];
            b.copy_from_slice(bytes);
            Ok(f32::from_le_bytes(b) as f64)
        }
        2 => Ok(f16_bits_to_f32(u16::from_le_bytes([bytes[0], bytes[1]])) as f64),
        n => Err(Error::codec(format!("float body of {} bytes", n))),
    }
}

pub fn encode_bool(v: bool) -> Leaf {
    let mut out = Leaf::new();
    out.push(v as u8);
    out
}

pub fn decode_bool(bytes: &[u8]) -> bool {
    bytes.first().is_some_and(|b| *b != 0)
}

pub fn encode_ip(ip: &IpAddr) -> Leaf {
    match ip {
        IpAddr::V4(v4) => Leaf::from_slice(&v4.octets()),
        IpAddr::V6(v6) => Leaf::from_slice(&v6.octets()),
    }
}

pub fn decode_ip(bytes: &[u8]) -> Result<IpAddr> {
    match bytes.len() {
        4 => Ok(IpAddr::V4(Ipv4Addr::new(
            bytes[0], bytes[1], bytes[2], bytes[3],
        ))),
        16 => {
            let mut b = [0u8; 16];
            b.copy_from_slice(bytes);
            Ok(IpAddr::V6(Ipv6Addr::from(b)))
        }
        n => Err(Error::codec(format!("ip body of {} bytes", n))),
    }
}

/// An IP network: address plus prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Net {
    pub addr: IpAddr,
    pub prefix: u8,
}

impl Net {
    pub fn new(addr: IpAddr, prefix: u8) -> Self {
        Net { addr, prefix }
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (self.addr, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = prefix_mask_u32(self.prefix);
                u32::from(net) & mask == u32::from(*ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = prefix_mask_u128(self.prefix);
                u128::from(net) & mask == u128::from(*ip) & mask
            }
            _ => false,
        }
    }
}

impl fmt::Display for Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

fn prefix_mask_u32(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix.min(32) as u32)
    }
}

fn prefix_mask_u128(prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - prefix.min(128) as u32)
    }
}

/// A net is the address bytes followed by a mask of the same width.
pub fn encode_net(net: &Net) -> Leaf {
    let mut out = encode_ip(&net.addr);
    match net.addr {
        IpAddr::V4(_) => out.extend_from_slice(&prefix_mask_u32(net.prefix).to_be_bytes()),
        IpAddr::V6(_) => out.extend_from_slice(&prefix_mask_u128(net.prefix).to_be_bytes()),
    }
    out
}

pub fn decode_net(bytes: &[u8]) -> Result<Net> {
    let half = bytes.len() / 2;
    if half != 4 && half != 16 {
        return Err(Error::codec(format!("net body of {} bytes", bytes.len())));
    }
    let addr = decode_ip(&bytes[..half])?;
    let prefix = bytes[half..].iter().map(|b| b.count_ones() as u8).sum();
    Ok(Net { addr, prefix })
}

fn f32_to_f16_bits(v: f32) -> u16 {
    let x = v.to_bits();
    let sign = ((x >> 16) & 0x8000) as u16;
    let exp = ((x >> 23) & 0xff) as i32;
    let mant = x & 0x007f_ffff;
    if exp == 0xff {
        // Inf or NaN.
        return sign | 0x7c00 | if mant != 0 { 0x200 } else { 0 };
    }
    let e = exp - 127 + 15;
    if e >= 0x1f {
        return sign | 0x7c00;
    }
    if e <= 0 {
        if e < -10 {
            return sign;
        }
        let m = (mant | 0x0080_0000) >> (1 - e);
        return sign | ((m + 0x1000) >> 13) as u16;
    }
    // Rounding may carry into the exponent.
    sign | (((e as u32) << 10) + ((mant + 0x1000) >> 13)) as u16
}

fn f16_bits_to_f32(h: u16) -> f32 {
    let sign = ((h & 0x8000) as u32) << 16;
    let exp = ((h >> 10) & 0x1f) as u32;
    let mant = (h & 0x03ff) as u32;
    let bits = match exp {
        0 if mant == 0 => sign,
        0 => {
            // Subnormal: renormalize.
            let mut e = 127 - 15 + 1;
            let mut m = mant;
            while m & 0x0400 == 0 {
                m <<= 1;
                e -= 1;
            }
            sign | ((e as u32) << 23) | ((m & 0x03ff) << 13)
        }
        0x1f => sign | 0x7f80_0000 | (mant << 13),
        _ => sign | ((exp + 127 - 15) << 23) | (mant << 13),
    };
    f32::from_bits(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_encoding_is_minimal() {
        assert!(encode_int(0).is_empty());
        assert_eq!(encode_int(-1).len(), 1);
        assert_eq!(decode_int(&encode_int(-1)), -1);
        assert_eq!(decode_int(&encode_int(i64::MIN)), i64::MIN);
        assert_eq!(decode_int(&encode_int(i64::MAX)), i64::MAX);
        assert_eq!(decode_uint(&encode_uint(u64::MAX)), u64::MAX);
    }

    #[test]
    fn test_uvarint() {
        let mut buf = Vec::new();
        append_uvarint(&mut buf, 300);
        assert_eq!(buf, vec![0xac, 0x02]);
        assert_eq!(read_uvarint(&buf).unwrap(), (300, 2));
        assert!(read_uvarint(&[0x80]).is_err());
    }

    #[test]
    fn test_float16() {
        let h = encode_float16(1.5);
        assert_eq!(h.len(), 2);
        assert_eq!(decode_float(&h).unwrap(), 1.5);
        assert_eq!(decode_float(&encode_float16(-2.0)).unwrap(), -2.0);
    }

    #[test]
    fn test_net() {
        let net = Net::new("10.0.0.0".parse().unwrap(), 8);
        let decoded = decode_net(&encode_net(&net)).unwrap();
        assert_eq!(decoded, net);
        assert!(net.contains(&"10.1.2.3".parse().unwrap()));
        assert!(!net.contains(&"11.0.0.1".parse().unwrap()));
    }
}
