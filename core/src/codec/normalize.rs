use smallvec::SmallVec;

use super::{Iter, decode_element};

/// One encoded element: `(body, framed bytes)`.
type Encoded<'a> = (Option<&'a [u8]>, &'a [u8]);

fn split(body: &[u8]) -> Vec<Encoded<'_>> {
    let mut out = Vec::new();
    let mut rest = body;
    while !rest.is_empty() {
        let Ok((elem, n)) = decode_element(rest) else {
            debug_assert!(false, "corrupt set or map body");
            break;
        };
        out.push((elem.body, &rest[..n]));
        rest = &rest[n..];
    }
    out
}

/// Sorts the elements of a set body by their byte form and removes
/// duplicates. Null sorts first.
pub fn normalize_set(body: &[u8]) -> Vec<u8> {
    let mut elems = split(body);
    elems.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    elems.dedup_by(|a, b| a.1 == b.1);
    let mut out = Vec::with_capacity(body.len());
    for (_, framed) in elems {
        out.extend_from_slice(framed);
    }
    out
}

/// Sorts the pairs of a map body by the key's byte form. When a key occurs
/// more than once the last pair wins.
pub fn normalize_map(body: &[u8]) -> Vec<u8> {
    let elems = split(body);
    let mut pairs: Vec<(Encoded<'_>, &[u8])> = elems
        .chunks_exact(2)
        .map(|kv| (kv[0], kv[1].1))
        .collect();
    // Stable sort keeps insertion order among equal keys.
    pairs.sort_by(|a, b| a.0.0.cmp(&b.0.0));
    let mut keep: SmallVec<[usize; 16]> = SmallVec::new();
    for i in 0..pairs.len() {
        if i + 1 < pairs.len() && pairs[i].0.0 == pairs[i + 1].0.0 {
            continue;
        }
        keep.push(i);
    }
    let mut out = Vec::with_capacity(body.len());
    for i in keep {
        let ((_, key), val) = pairs[i];
        out.extend_from_slice(key);
        out.extend_from_slice(val);
    }
    out
}

/// Whether a set body is already in canonical order.
pub fn is_normalized_set(body: &[u8]) -> bool {
    let elems: Vec<_> = Iter::new(body).collect();
    elems.windows(2).all(|w| w[0] < w[1])
}
