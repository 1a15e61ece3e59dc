// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Fixed-width ASCII strings as they appear in identification payloads.
//!
//! ATA, SCSI, and NVMe all carry identity strings as fixed-size,
//! space-padded byte fields. Devices routinely pad with NULs instead of
//! spaces, embed control characters, or (on ATA) store the string with the
//! two bytes of every 16-bit word swapped. Everything here normalizes to
//! printable, trimmed Rust strings.

use core::fmt;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

/// A fixed-width ASCII string field in a wire structure.
#[repr(C)]
#[derive(Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes, PartialEq, Eq)]
pub struct AsciiString<const N: usize>(pub [u8; N]);

impl<const N: usize> AsciiString<N> {
    /// Returns the normalized string: non-printable bytes replaced with
    /// spaces, leading and trailing whitespace stripped.
    pub fn to_string(&self) -> String {
        printable(&self.0)
    }

    /// Returns true if the field holds nothing but padding.
    pub fn is_blank(&self) -> bool {
        self.0
            .iter()
            .all(|&b| b == 0 || b == b' ' || !b.is_ascii_graphic())
    }
}

impl<const N: usize> Default for AsciiString<N> {
    fn default() -> Self {
        AsciiString([b' '; N])
    }
}

impl<const N: usize> fmt::Debug for AsciiString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.to_string(), f)
    }
}

impl<const N: usize> fmt::Display for AsciiString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.to_string())
    }
}

/// Normalizes a raw byte field: every byte outside the printable ASCII
/// range becomes a space, then leading/trailing whitespace is stripped.
pub fn printable(bytes: &[u8]) -> String {
    let s: String = bytes
        .iter()
        .map(|&b| {
            if (0x20..=0x7e).contains(&b) {
                b as char
            } else {
                ' '
            }
        })
        .collect();
    s.trim().to_string()
}

/// Normalizes an ATA identify string field. ATA stores strings as 16-bit
/// words with the character order swapped within each word.
pub fn ata_string(bytes: &[u8]) -> String {
    let mut swapped = Vec::with_capacity(bytes.len());
    for pair in bytes.chunks(2) {
        if pair.len() == 2 {
            swapped.push(pair[1]);
            swapped.push(pair[0]);
        } else {
            swapped.push(pair[0]);
        }
    }
    printable(&swapped)
}

/// Clamps a normalized string to a maximum length, respecting char
/// boundaries (always ASCII here, but keep the API honest).
pub fn clamp(s: &str, max: usize) -> &str {
    if s.len() <= max { s } else { &s[..max] }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_replaces_and_trims() {
        assert_eq!(printable(b"  WDC WD80\x00\x00  "), "WDC WD80");
        assert_eq!(printable(b"\x00\x00\x00"), "");
        assert_eq!(printable(b"A\x07B"), "A B");
    }

    #[test]
    fn ata_string_swaps_words() {
        // "E2GH1234" stored as ATA words reads "2EHG2143" raw.
        assert_eq!(ata_string(b"2EHG2143"), "E2GH1234");
        assert_eq!(ata_string(b"DW CDW08"), "WDC WD80");
    }

    #[test]
    fn ascii_field_blank_detection() {
        let f: AsciiString<8> = AsciiString(*b"        ");
        assert!(f.is_blank());
        let f: AsciiString<8> = AsciiString([0; 8]);
        assert!(f.is_blank());
        let f: AsciiString<8> = AsciiString(*b"UHFS1234");
        assert!(!f.is_blank());
        assert_eq!(f.to_string(), "UHFS1234");
    }

    #[test]
    fn clamp_limits_length() {
        assert_eq!(clamp("0123456789", 4), "0123");
        assert_eq!(clamp("abc", 8), "abc");
    }
}
