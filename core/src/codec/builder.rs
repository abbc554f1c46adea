use crate::codec::{CONTAINER_TAG_BASE, prims::append_uvarint};

/// Scoped writer for the canonical value encoding.
///
/// Leaves are written with [`Builder::append`]; containers are bracketed by
/// [`Builder::begin_container`] and one of the `end_*` methods, which go
/// back and prefix the body with its tag once its length is known.
#[derive(Debug, Default, Clone)]
pub struct Builder {
    bytes: Vec<u8>,
    containers: Vec<usize>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Builder {
            bytes: Vec::with_capacity(n),
            containers: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.bytes.clear();
        self.containers.clear();
    }

    /// Appends a leaf, or a null when `leaf` is `None`.
    pub fn append(&mut self, leaf: Option<&[u8]>) {
        match leaf {
            None => self.bytes.push(0),
            Some(body) => {
                append_uvarint(&mut self.bytes, ((body.len() as u64) << 1) | 1);
                self.bytes.extend_from_slice(body);
            }
        }
    }

    pub fn append_null(&mut self) {
        self.bytes.push(0);
    }

    /// Appends an already-encoded container body as a single element.
    pub fn append_container(&mut self, body: Option<&[u8]>) {
        match body {
            None => self.bytes.push(0),
            Some(body) => {
                append_container_tag(&mut self.bytes, body.len());
                self.bytes.extend_from_slice(body);
            }
        }
    }

    /// Appends a value body, choosing leaf or container framing.
    pub fn append_body(&mut self, body: Option<&[u8]>, container: bool) {
        if container {
            self.append_container(body)
        } else {
            self.append(body)
        }
    }

    pub fn begin_container(&mut self) {
        self.containers.push(self.bytes.len());
    }

    pub fn end_container(&mut self) {
        let start = self
            .containers
            .pop()
            .expect("end_container without begin_container");
        let body = self.bytes.split_off(start);
        append_container_tag(&mut self.bytes, body.len());
        self.bytes.extend_from_slice(&body);
    }

    /// Rewrites the body of the innermost open container in place.
    pub fn transform_container(&mut self, f: impl FnOnce(&[u8]) -> Vec<u8>) {
        let start = *self
            .containers
            .last()
            .expect("transform_container without begin_container");
        let body = self.bytes.split_off(start);
        let body = f(&body);
        self.bytes.extend_from_slice(&body);
    }

    /// Closes a record whose type has `opts` optional fields. `nones` lists
    /// the positions, counted among the optional fields only, that are
    /// absent from the body.
    pub fn end_container_with_nones(&mut self, opts: usize, nones: &[usize]) {
        if opts == 0 {
            debug_assert!(nones.is_empty());
            return self.end_container();
        }
        let start = self
            .containers
            .pop()
            .expect("end_container_with_nones without begin_container");
        let fields = self.bytes.split_off(start);
        let mut bitmap = vec![0u8; opts.div_ceil(8)];
        for &none in nones {
            debug_assert!(none < opts);
            bitmap[none / 8] |= 1 << (none % 8);
        }
        let mut body = Vec::with_capacity(bitmap.len() + fields.len() + 2);
        append_uvarint(&mut body, ((bitmap.len() as u64) << 1) | 1);
        body.extend_from_slice(&bitmap);
        body.extend_from_slice(&fields);
        append_container_tag(&mut self.bytes, body.len());
        self.bytes.extend_from_slice(&body);
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        debug_assert!(self.containers.is_empty());
        self.bytes
    }

    /// Takes the body of the single element written since the last reset.
    pub fn take_value(&mut self) -> Option<Vec<u8>> {
        debug_assert!(self.containers.is_empty());
        let out = super::Iter::new(&self.bytes)
            .next()
            .and_then(|elem| elem.map(|b| b.to_vec()));
        self.reset();
        out
    }
}

fn append_container_tag(buf: &mut Vec<u8>, len: usize) {
    append_uvarint(buf, ((len as u64) + CONTAINER_TAG_BASE) << 1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Iter;

    #[test]
    fn test_nested_containers() {
        let mut b = Builder::new();
        b.begin_container();
        b.append(Some(b"a"));
        b.begin_container();
        b.append(None);
        b.end_container();
        b.end_container();

        let outer: Vec<_> = Iter::new(b.bytes()).collect();
        assert_eq!(outer.len(), 1);
        let body = outer[0].unwrap();
        let elems: Vec<_> = Iter::new(body).collect();
        assert_eq!(elems.len(), 2);
        assert_eq!(elems[0], Some(&b"a"[..]));
        let inner: Vec<_> = Iter::new(elems[1].unwrap()).collect();
        assert_eq!(inner, vec![None]);
    }

    #[test]
    fn test_take_value_strips_tag() {
        let mut b = Builder::new();
        b.append(Some(&[1, 2, 3]));
        assert_eq!(b.take_value(), Some(vec![1, 2, 3]));
        b.append_null();
        assert_eq!(b.take_value(), None);
        assert!(b.bytes().is_empty());
    }

    #[test]
    fn test_transform_container() {
        let mut b = Builder::new();
        b.begin_container();
        b.append(Some(b"x"));
        b.transform_container(|body| {
            let mut out = body.to_vec();
            out.extend_from_slice(body);
            out
        });
        b.end_container();
        let body = b.take_value().unwrap();
        assert_eq!(Iter::new(&body).count(), 2);
    }
}
