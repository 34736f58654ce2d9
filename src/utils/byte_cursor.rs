use crate::err::{DeserializationError, DeserializationResult};
use crate::utils::bytes;

/// Walks the fixed-layout prefix of an EVT structure field by field.
///
/// Reads are little-endian and only advance the position when they succeed.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    #[inline]
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    pub(crate) fn take_bytes(
        &mut self,
        len: usize,
        what: &'static str,
    ) -> DeserializationResult<&'a [u8]> {
        let out = bytes::slice_r(self.buf, self.pos, len, what)?;
        self.pos += len;
        Ok(out)
    }

    #[inline]
    pub(crate) fn array<const N: usize>(
        &mut self,
        what: &'static str,
    ) -> DeserializationResult<[u8; N]> {
        let v = bytes::read_array_r::<N>(self.buf, self.pos, what)?;
        self.pos += N;
        Ok(v)
    }

    #[inline]
    pub(crate) fn u16_named(&mut self, what: &'static str) -> DeserializationResult<u16> {
        let v = bytes::read_u16_le_r(self.buf, self.pos, what)?;
        self.pos += 2;
        Ok(v)
    }

    #[inline]
    pub(crate) fn u32_named(&mut self, what: &'static str) -> DeserializationResult<u32> {
        let v = bytes::read_u32_le_r(self.buf, self.pos, what)?;
        self.pos += 4;
        Ok(v)
    }

    /// Reads a NUL-terminated UTF-16LE string, returning its bytes *including* the terminator.
    ///
    /// The terminator must be found before `limit`, which is the end of the region the string
    /// lives in (not necessarily the end of the buffer).
    pub(crate) fn utf16_z(
        &mut self,
        limit: usize,
        what: &'static str,
    ) -> DeserializationResult<&'a [u8]> {
        let region = self.buf.get(self.pos..limit.min(self.buf.len())).ok_or(
            DeserializationError::OutOfBounds {
                what,
                offset: self.pos as u64,
                size: 0,
                limit: limit as u64,
            },
        )?;

        match crate::utils::find_utf16_terminator(region) {
            Some(end) => self.take_bytes(end + 2, what),
            None => Err(DeserializationError::OutOfBounds {
                what,
                offset: self.pos as u64,
                size: region.len() as u64,
                limit: limit as u64,
            }),
        }
    }
}
