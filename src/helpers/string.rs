//! Little-endian conversions for the binary containers (OLE compound files,
//! BIFF8 workbooks and Word binary documents).
//!
//! Callers guarantee the slices are long enough; every reader checks record
//! bounds before converting.

/// Converts a byte slice into an iterator of 32-bit unsigned integers.
/// A trailing partial chunk is ignored.
pub(crate) fn to_u32_iter(bytes: &[u8]) -> impl Iterator<Item = u32> + '_ {
    bytes.chunks_exact(4).map(to_u32)
}

/// Converts a byte slice into an iterator of usize values.
pub(crate) fn to_usize_iter(bytes: &[u8]) -> impl Iterator<Item = usize> + '_ {
    to_u32_iter(bytes).map(|value| value as usize)
}

/// Converts the first 8 bytes of a slice to a 64-bit floating point number.
#[inline]
pub(crate) fn to_f64(s: &[u8]) -> f64 {
    f64::from_bits(to_u64(s))
}

/// Converts the first 8 bytes of a slice to a 64-bit unsigned integer.
#[inline]
pub(crate) fn to_u64(s: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&s[..8]);
    u64::from_le_bytes(bytes)
}

/// Converts the first 4 bytes of a slice to a 32-bit unsigned integer.
#[inline]
pub(crate) fn to_u32(s: &[u8]) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&s[..4]);
    u32::from_le_bytes(bytes)
}

/// Converts the first 2 bytes of a slice to a 16-bit unsigned integer.
#[inline]
pub(crate) fn to_u16(s: &[u8]) -> u16 {
    u16::from_le_bytes([s[0], s[1]])
}

/// Converts the first 4 bytes of a slice to a usize value.
#[inline]
pub(crate) fn to_usize(s: &[u8]) -> usize {
    to_u32(s) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn little_endian_conversions() {
        assert_eq!(to_u16(&[0x34, 0x12]), 0x1234);
        assert_eq!(to_u32(&[0x78, 0x56, 0x34, 0x12, 0xFF]), 0x1234_5678);
        assert_eq!(to_usize(&[1, 0, 0, 0]), 1);
        assert_eq!(to_f64(&1.5f64.to_le_bytes()), 1.5);
        assert_eq!(to_usize_iter(&[1, 0, 0, 0, 2, 0, 0, 0, 9]).collect::<Vec<_>>(), vec![1, 2]);
    }
}
