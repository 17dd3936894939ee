//! Little-endian integer access for the binary workbook readers.
//! Offsets past the end of a slice read as zero bytes, so fixed-layout
//! structures never panic on short input.

#[inline]
fn le_array<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut array = [0u8; N];
    if let Some(slice) = offset.checked_add(N).and_then(|end| bytes.get(offset..end)) {
        array.copy_from_slice(slice);
    }
    array
}

#[inline]
pub(crate) fn to_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(le_array(bytes, offset))
}

#[inline]
pub(crate) fn to_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(le_array(bytes, offset))
}

#[inline]
pub(crate) fn to_usize(bytes: &[u8], offset: usize) -> usize {
    to_u32(bytes, offset) as usize
}

#[inline]
pub(crate) fn to_u64(bytes: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(le_array(bytes, offset))
}

/// Reads `bytes` as consecutive 32-bit values; a trailing partial value is
/// ignored.
pub(crate) fn to_usize_iter(bytes: &[u8]) -> impl Iterator<Item = usize> + '_ {
    bytes.chunks_exact(4).map(|chunk| to_usize(chunk, 0))
}
