//! Checked little-endian reads at fixed offsets of an in-memory buffer.
//!
//! The `read_*` helpers return `Option`, the `*_r` helpers turn a short buffer into
//! `DeserializationError::Truncated` naming the field that was being read.

use crate::err::DeserializationError;

/// Read `N` raw bytes at `offset`.
///
/// Returns `None` if the range is out of bounds.
pub(crate) fn read_array<const N: usize>(buf: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    let bytes: [u8; N] = buf.get(offset..end)?.try_into().ok()?;
    Some(bytes)
}

/// Read a `u16` (little-endian) at `offset`.
pub(crate) fn read_u16_le(buf: &[u8], offset: usize) -> Option<u16> {
    Some(u16::from_le_bytes(read_array::<2>(buf, offset)?))
}

/// Read a `u32` (little-endian) at `offset`.
pub(crate) fn read_u32_le(buf: &[u8], offset: usize) -> Option<u32> {
    Some(u32::from_le_bytes(read_array::<4>(buf, offset)?))
}

#[inline]
fn truncated(what: &'static str, offset: usize, need: usize, len: usize) -> DeserializationError {
    DeserializationError::Truncated {
        what,
        offset: offset as u64,
        need,
        have: len.saturating_sub(offset),
    }
}

pub(crate) fn slice_r<'a>(
    buf: &'a [u8],
    offset: usize,
    len: usize,
    what: &'static str,
) -> Result<&'a [u8], DeserializationError> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| truncated(what, offset, len, buf.len()))?;
    buf.get(offset..end)
        .ok_or_else(|| truncated(what, offset, len, buf.len()))
}

/// Read `N` raw bytes at `offset`, or return `DeserializationError::Truncated`.
pub(crate) fn read_array_r<const N: usize>(
    buf: &[u8],
    offset: usize,
    what: &'static str,
) -> Result<[u8; N], DeserializationError> {
    read_array::<N>(buf, offset).ok_or_else(|| truncated(what, offset, N, buf.len()))
}

/// Read a `u16` (little-endian) at `offset`, or return `DeserializationError::Truncated`.
pub(crate) fn read_u16_le_r(
    buf: &[u8],
    offset: usize,
    what: &'static str,
) -> Result<u16, DeserializationError> {
    read_u16_le(buf, offset).ok_or_else(|| truncated(what, offset, 2, buf.len()))
}

/// Read a `u32` (little-endian) at `offset`, or return `DeserializationError::Truncated`.
pub(crate) fn read_u32_le_r(
    buf: &[u8],
    offset: usize,
    what: &'static str,
) -> Result<u32, DeserializationError> {
    read_u32_le(buf, offset).ok_or_else(|| truncated(what, offset, 4, buf.len()))
}

/// Fails with `SignatureMismatch` unless `found == expected`.
pub(crate) fn ensure_sig(
    found: [u8; 4],
    expected: [u8; 4],
    what: &'static str,
) -> Result<(), DeserializationError> {
    if found != expected {
        return Err(DeserializationError::InvalidSignature {
            what,
            expected,
            found,
        });
    }
    Ok(())
}

/// Fails with `SizeMismatch` unless `found == expected`.
pub(crate) fn ensure_size(
    found: u64,
    expected: u64,
    what: &'static str,
) -> Result<(), DeserializationError> {
    if found != expected {
        return Err(DeserializationError::SizeMismatch {
            what,
            expected,
            found,
        });
    }
    Ok(())
}

/// Allocate a zeroed buffer of `size` bytes, reporting allocation failure instead of aborting.
pub(crate) fn try_alloc(size: usize, what: &'static str) -> Result<Vec<u8>, DeserializationError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(size)
        .map_err(|_| DeserializationError::FailedToAllocate { what, size })?;
    buf.resize(size, 0);
    Ok(buf)
}
