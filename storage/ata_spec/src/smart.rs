// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! SMART READ DATA sector layout and the vendor attribute table.
//!
//! Attribute raw values are vendor defined; the well-known IDs below are
//! decoded only as a fallback when the standard logs are absent.

use crate::packed_nums::u16_le;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

pub const SMART_ATTRIBUTE_COUNT: usize = 30;

/// One vendor attribute entry. An ID of zero marks an unused slot.
#[repr(C)]
#[derive(Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct SmartAttribute {
    pub id: u8,
    pub flags: u16_le,
    pub current: u8,
    pub worst: u8,
    pub raw: [u8; 6],
    pub reserved: u8,
}

static_assertions::assert_eq_size!(SmartAttribute, [u8; 12]);

impl SmartAttribute {
    /// Raw value, little-endian in the low 6 bytes.
    pub fn raw_value(&self) -> u64 {
        let r = &self.raw;
        u64::from_le_bytes([r[0], r[1], r[2], r[3], r[4], r[5], 0, 0])
    }
}

/// SMART READ DATA response sector.
#[repr(C)]
#[derive(Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct SmartData {
    pub version: u16_le,
    pub attributes: [SmartAttribute; SMART_ATTRIBUTE_COUNT],
    pub offline_status: u8,
    pub self_test_status: u8,
    pub offline_time_seconds: u16_le,
    pub vendor1: u8,
    pub offline_capability: u8,
    pub smart_capability: u16_le,
    pub error_logging_capability: u8,
    pub vendor2: u8,
    pub short_test_minutes: u8,
    pub extended_test_minutes: u8,
    pub conveyance_test_minutes: u8,
    pub extended_test_minutes_word: u16_le,
    pub reserved: [u8; 9],
    pub vendor3: [u8; 125],
    pub checksum: u8,
}

static_assertions::assert_eq_size!(SmartData, [u8; 512]);

impl SmartData {
    pub fn attribute(&self, id: u8) -> Option<&SmartAttribute> {
        if id == 0 {
            return None;
        }
        self.attributes.iter().find(|a| a.id == id)
    }
}

pub const ATTR_REALLOCATED_SECTORS: u8 = 5;
pub const ATTR_POWER_ON_HOURS: u8 = 9;
pub const ATTR_TEMPERATURE: u8 = 194;
pub const ATTR_PENDING_SECTORS: u8 = 197;
/// SSD life left, as a 100-down (or vendor 255-down) nominal value.
pub const ATTR_SSD_LIFE_LEFT: u8 = 231;
pub const ATTR_TOTAL_LBAS_WRITTEN: u8 = 241;
pub const ATTR_TOTAL_LBAS_READ: u8 = 242;

/// Attribute 194 packs the current temperature in the low raw word;
/// some firmwares put min/max in the following words.
pub fn attribute_temperature(attr: &SmartAttribute) -> Option<i16> {
    let t = u16::from_le_bytes([attr.raw[0], attr.raw[1]]) as i16;
    // 0 and absurd values mean the vendor uses the field differently.
    if t > 0 && t < 120 {
        Some(t)
    } else {
        None
    }
}
