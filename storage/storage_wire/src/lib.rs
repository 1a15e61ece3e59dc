// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Offset-based field extraction for loosely structured payloads.
//!
//! Fixed-layout structures are declared with `zerocopy` in the `*_spec`
//! crates. Log pages, however, are variable-length streams of parameter
//! records whose fields sit at offsets that depend on earlier lengths;
//! those decoders extract fields positionally with the helpers here. Every
//! getter is bounds-checked and returns `None` past the end of the buffer,
//! so a short or truncated page degrades to "field not reported" instead
//! of a panic.

/// Big-endian getters (SCSI payloads).
pub mod be {
    pub fn u16(buf: &[u8], off: usize) -> Option<u16> {
        let b = buf.get(off..off + 2)?;
        Some(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u24(buf: &[u8], off: usize) -> Option<u32> {
        let b = buf.get(off..off + 3)?;
        Some(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    pub fn u32(buf: &[u8], off: usize) -> Option<u32> {
        let b = buf.get(off..off + 4)?;
        Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u48(buf: &[u8], off: usize) -> Option<u64> {
        let b = buf.get(off..off + 6)?;
        Some(u64::from_be_bytes([
            0, 0, b[0], b[1], b[2], b[3], b[4], b[5],
        ]))
    }

    pub fn u64(buf: &[u8], off: usize) -> Option<u64> {
        let b = buf.get(off..off + 8)?;
        Some(u64::from_be_bytes(b.try_into().ok()?))
    }

    /// Reads a counter field whose length the device chooses. Lengths of
    /// 1, 2, 4, and 8 bytes decode to an integer; anything else is not a
    /// counter and yields `None`.
    pub fn counter(buf: &[u8], off: usize, len: usize) -> Option<u64> {
        match len {
            1 => buf.get(off).map(|&b| b as u64),
            2 => u16(buf, off).map(u64::from),
            4 => u32(buf, off).map(u64::from),
            8 => u64(buf, off),
            _ => None,
        }
    }
}

/// Little-endian getters (ATA and NVMe payloads).
pub mod le {
    pub fn u16(buf: &[u8], off: usize) -> Option<u16> {
        let b = buf.get(off..off + 2)?;
        Some(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(buf: &[u8], off: usize) -> Option<u32> {
        let b = buf.get(off..off + 4)?;
        Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u48(buf: &[u8], off: usize) -> Option<u64> {
        let b = buf.get(off..off + 6)?;
        Some(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], 0, 0,
        ]))
    }

    pub fn u64(buf: &[u8], off: usize) -> Option<u64> {
        let b = buf.get(off..off + 8)?;
        Some(u64::from_le_bytes(b.try_into().ok()?))
    }

    pub fn u128(buf: &[u8], off: usize) -> Option<u128> {
        let b = buf.get(off..off + 16)?;
        Some(u128::from_le_bytes(b.try_into().ok()?))
    }
}

/// Extracts bits `hi..=lo` of a value.
pub fn bit_range(value: u64, hi: u32, lo: u32) -> u64 {
    debug_assert!(hi >= lo && hi < 64);
    (value >> lo) & (u64::MAX >> (63 - (hi - lo)))
}

/// Tests a single bit.
pub fn bit(value: u64, n: u32) -> bool {
    (value >> n) & 1 != 0
}

/// Interprets the low `bits` bits of `value` as a two's-complement signed
/// quantity.
pub fn twos_complement(value: u64, bits: u32) -> i64 {
    debug_assert!(bits >= 1 && bits <= 64);
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

/// Converts a 128-bit counter to `f64`. Exact below 2^53; health counters
/// above that only ever feed rate computations where the rounding is
/// irrelevant.
pub fn u128_to_f64(value: u128) -> f64 {
    value as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endian_getters() {
        let buf = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(be::u16(&buf, 0), Some(0x0102));
        assert_eq!(le::u16(&buf, 0), Some(0x0201));
        assert_eq!(be::u24(&buf, 1), Some(0x020304));
        assert_eq!(be::u32(&buf, 2), Some(0x03040506));
        assert_eq!(le::u32(&buf, 2), Some(0x06050403));
        assert_eq!(be::u48(&buf, 0), Some(0x010203040506));
        assert_eq!(le::u48(&buf, 0), Some(0x060504030201));
        assert_eq!(be::u64(&buf, 0), Some(0x0102030405060708));
        assert_eq!(be::u64(&buf, 1), None);
    }

    #[test]
    fn counter_length_switch() {
        let buf = [0xAA, 0xBB, 0xCC, 0xDD];
        assert_eq!(be::counter(&buf, 0, 1), Some(0xAA));
        assert_eq!(be::counter(&buf, 0, 2), Some(0xAABB));
        assert_eq!(be::counter(&buf, 0, 4), Some(0xAABBCCDD));
        assert_eq!(be::counter(&buf, 0, 3), None);
        assert_eq!(be::counter(&buf, 0, 8), None);
    }

    #[test]
    fn bit_helpers() {
        assert_eq!(bit_range(0b1101_0000, 7, 4), 0b1101);
        assert_eq!(bit_range(u64::MAX, 63, 0), u64::MAX);
        assert!(bit(0x8000_0000_0000_0000, 63));
        assert!(!bit(0x4000, 15));
    }

    #[test]
    fn twos_complement_interpretation() {
        assert_eq!(twos_complement(0xFF, 8), -1);
        assert_eq!(twos_complement(0x7F, 8), 127);
        assert_eq!(twos_complement(0x80, 8), -128);
        assert_eq!(twos_complement(0xFFFE, 16), -2);
    }
}
