//! Canonical tag-length-body encoding of values.
//!
//! Every element of a container body starts with a uvarint tag:
//!
//! - `0` is a null element with no body.
//! - odd tags are leaves: `tag = (len << 1) | 1`.
//! - even non-zero tags are containers: `tag = (len + 1) << 1`.
//!
//! A [`crate::value::Value`] stores the body of its top-level element
//! without the tag; `None` bytes stand for null. Records whose type has
//! optional fields start their body with a leaf holding the "nones"
//! bitmap, one bit per optional field, and omit absent fields.

mod builder;
mod normalize;
pub mod prims;

pub use builder::Builder;
pub use normalize::{is_normalized_set, normalize_map, normalize_set};

use crate::error::{Error, Result};
use crate::types::Field;
use prims::read_uvarint;

pub(crate) const CONTAINER_TAG_BASE: u64 = 1;

/// A decoded element: its body (or `None` for null) and whether it was
/// framed as a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element<'a> {
    pub body: Option<&'a [u8]>,
    pub container: bool,
}

/// Decodes the element at the front of `bytes`, returning it together with
/// the total number of bytes it occupies (tag included).
pub fn decode_element(bytes: &[u8]) -> Result<(Element<'_>, usize)> {
    let (tag, n) = read_uvarint(bytes)?;
    if tag == 0 {
        return Ok((
            Element {
                body: None,
                container: false,
            },
            n,
        ));
    }
    let (len, container) = if tag & 1 == 1 {
        ((tag >> 1) as usize, false)
    } else {
        (((tag >> 1) - CONTAINER_TAG_BASE) as usize, true)
    };
    let end = n
        .checked_add(len)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| Error::codec(format!("element of {} bytes overruns buffer", len)))?;
    Ok((
        Element {
            body: Some(&bytes[n..end]),
            container,
        },
        end,
    ))
}

/// Iterates the elements of a container body.
///
/// Bodies are produced by [`Builder`], so a malformed body is an internal
/// bug; iteration stops at the first undecodable element.
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    bytes: &'a [u8],
}

impl<'a> Iter<'a> {
    pub fn new(body: &'a [u8]) -> Self {
        Iter { bytes: body }
    }

    pub fn done(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Like `next` but reports malformed input instead of stopping.
    pub fn try_next(&mut self) -> Result<Option<Element<'a>>> {
        if self.bytes.is_empty() {
            return Ok(None);
        }
        let (elem, n) = decode_element(self.bytes)?;
        self.bytes = &self.bytes[n..];
        Ok(Some(elem))
    }

    /// The remaining, not yet iterated, bytes.
    pub fn rest(&self) -> &'a [u8] {
        self.bytes
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = Option<&'a [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.try_next() {
            Ok(elem) => elem.map(|e| e.body),
            Err(err) => {
                debug_assert!(false, "corrupt container body: {}", err);
                self.bytes = &[];
                None
            }
        }
    }
}

/// Iterates the fields of a record body in type order, yielding
/// `(bytes, none)` per field. `none` is true for optional fields that are
/// absent from this value; their bytes are `None`.
pub struct RecordIter<'a, 'f> {
    it: Iter<'a>,
    fields: &'f [Field],
    nones: &'a [u8],
    field: usize,
    opt: usize,
}

impl<'a, 'f> RecordIter<'a, 'f> {
    pub fn new(body: &'a [u8], fields: &'f [Field]) -> Self {
        let mut it = Iter::new(body);
        let nones = if fields.iter().any(|f| f.is_opt()) {
            it.next().flatten().unwrap_or(&[])
        } else {
            &[]
        };
        RecordIter {
            it,
            fields,
            nones,
            field: 0,
            opt: 0,
        }
    }
}

impl<'a, 'f> Iterator for RecordIter<'a, 'f> {
    type Item = (Option<&'a [u8]>, bool);

    fn next(&mut self) -> Option<Self::Item> {
        let field = self.fields.get(self.field)?;
        self.field += 1;
        if field.is_opt() {
            let opt = self.opt;
            self.opt += 1;
            let none = self
                .nones
                .get(opt / 8)
                .is_some_and(|b| b & (1 << (opt % 8)) != 0);
            if none {
                return Some((None, true));
            }
        }
        Some((self.it.next().flatten(), false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn test_tags() {
        let mut b = Builder::new();
        b.append(None);
        b.append(Some(b"ab"));
        b.begin_container();
        b.end_container();
        assert_eq!(b.bytes(), &[0, 5, b'a', b'b', 2]);

        let mut it = Iter::new(b.bytes());
        assert_eq!(it.try_next().unwrap().unwrap().body, None);
        let leaf = it.try_next().unwrap().unwrap();
        assert_eq!(leaf.body, Some(&b"ab"[..]));
        assert!(!leaf.container);
        let empty = it.try_next().unwrap().unwrap();
        assert!(empty.container);
        assert_eq!(empty.body, Some(&[][..]));
        assert!(it.done());
    }

    #[test]
    fn test_overrun_is_an_error() {
        assert!(decode_element(&[9, 1]).is_err());
    }

    #[test]
    fn test_record_with_nones() {
        let fields = vec![
            Field::new("a", Type::int64()),
            Field::optional("b", Type::string()),
            Field::optional("c", Type::string()),
        ];
        let mut b = Builder::new();
        b.begin_container();
        b.append(Some(&[2]));
        b.append(Some(b"z"));
        // "b" is none, "c" is present.
        b.end_container_with_nones(2, &[0]);
        let body = b.take_value().unwrap();

        let got: Vec<_> = RecordIter::new(&body, &fields).collect();
        assert_eq!(
            got,
            vec![(Some(&[2][..]), false), (None, true), (Some(&b"z"[..]), false)]
        );
    }
}
