use std::cmp;

/// Reads a body framed by `Content-Length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    length: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { length }
    }

    #[inline]
    pub fn remaining(&self) -> u64 {
        self.length
    }

    /// Hands at most the remaining length of `src` to `on_data`; returns the number of
    /// bytes consumed and whether the body is complete.
    pub fn decode(&mut self, src: &[u8], mut on_data: impl FnMut(&[u8])) -> (usize, bool) {
        let len = cmp::min(self.length, src.len() as u64) as usize;
        if len > 0 {
            on_data(&src[..len]);
            self.length -= len as u64;
        }

        (len, self.length == 0)
    }
}
