/// A fixed-length bit set, used for null masks and boolean vectors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitmap {
    words: Vec<u64>,
    len: u32,
}

impl Bitmap {
    pub fn new(len: u32) -> Self {
        Bitmap {
            words: vec![0; (len as usize).div_ceil(64)],
            len,
        }
    }

    pub fn from_fn(len: u32, mut f: impl FnMut(u32) -> bool) -> Self {
        let mut bm = Bitmap::new(len);
        for i in 0..len {
            if f(i) {
                bm.set(i);
            }
        }
        bm
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, i: u32) -> bool {
        debug_assert!(i < self.len, "bit {} out of range {}", i, self.len);
        self.words[(i / 64) as usize] & (1 << (i % 64)) != 0
    }

    pub fn set(&mut self, i: u32) {
        self.words[(i / 64) as usize] |= 1 << (i % 64);
    }

    pub fn push(&mut self, bit: bool) {
        if self.len as usize == self.words.len() * 64 {
            self.words.push(0);
        }
        self.len += 1;
        if bit {
            self.set(self.len - 1);
        }
    }

    pub fn count(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Whether any bit is set.
    pub fn any(&self) -> bool {
        self.words.iter().any(|w| *w != 0)
    }

    pub fn ones(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.len).filter(|i| self.get(*i))
    }

    pub fn pick(&self, index: &[u32]) -> Bitmap {
        Bitmap::from_fn(index.len() as u32, |i| self.get(index[i as usize]))
    }

    pub fn or(&self, other: &Bitmap) -> Bitmap {
        debug_assert_eq!(self.len, other.len);
        Bitmap {
            words: self
                .words
                .iter()
                .zip(&other.words)
                .map(|(a, b)| a | b)
                .collect(),
            len: self.len,
        }
    }
}

/// Null mask of a result computed from two operands: a slot is null when
/// either input slot is.
pub fn or_nulls(a: Option<&Bitmap>, b: Option<&Bitmap>) -> Option<Bitmap> {
    match (a, b) {
        (None, None) => None,
        (Some(a), None) => Some(a.clone()),
        (None, Some(b)) => Some(b.clone()),
        (Some(a), Some(b)) => Some(a.or(b)),
    }
}

/// Drops an all-clear mask.
pub fn nonempty(bm: Bitmap) -> Option<Bitmap> {
    bm.any().then_some(bm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_across_words() {
        let mut bm = Bitmap::default();
        for i in 0..130 {
            bm.push(i % 3 == 0);
        }
        assert_eq!(bm.len(), 130);
        assert_eq!(bm.count(), 44);
        assert!(bm.get(129));
        assert!(!bm.get(128));
    }

    #[test]
    fn test_pick_and_or() {
        let a = Bitmap::from_fn(4, |i| i == 1);
        let b = Bitmap::from_fn(4, |i| i == 3);
        assert_eq!(a.or(&b).ones().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(a.pick(&[1, 1, 0]).ones().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(nonempty(Bitmap::new(3)), None);
    }
}
