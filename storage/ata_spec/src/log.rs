// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! General Purpose Logging structures: the log directory, the ID data
//! log, the device statistics log, SCT status, the extended self-test
//! log, the pending defects log, and the Seagate FARM log.

use crate::packed_nums::u16_le;
use crate::packed_nums::u32_le;
use crate::packed_nums::u64_le;
use bitfield_struct::bitfield;
use open_enum::open_enum;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

/// Every GPL log is addressed in 512-byte pages.
pub const LOG_PAGE_BYTES: usize = 512;

open_enum! {
    pub enum LogAddress: u8 {
        DIRECTORY = 0x00,
        SUMMARY_SMART_ERROR = 0x01,
        COMPREHENSIVE_SMART_ERROR = 0x02,
        EXT_COMPREHENSIVE_SMART_ERROR = 0x03,
        DEVICE_STATISTICS = 0x04,
        SMART_SELF_TEST = 0x06,
        EXT_SMART_SELF_TEST = 0x07,
        POWER_CONDITIONS = 0x08,
        PENDING_DEFECTS = 0x0C,
        IDENTIFY_DEVICE_DATA = 0x30,
        CONCURRENT_POSITIONING_RANGES = 0x47,
        FARM = 0xA6,
        SCT_COMMAND_STATUS = 0xE0,
        SCT_DATA_TRANSFER = 0xE1,
    }
}

/// The log directory: one little-endian word per log address giving the
/// page count, zero when the log is not supported.
#[repr(C)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct LogDirectory {
    pub version: u16_le,
    pub pages: [u16_le; 255],
}

static_assertions::assert_eq_size!(LogDirectory, [u8; LOG_PAGE_BYTES]);

impl LogDirectory {
    /// Number of pages the device advertises for a log, zero if absent.
    pub fn page_count(&self, log: LogAddress) -> u16 {
        if log == LogAddress::DIRECTORY {
            return 1;
        }
        self.pages[log.0 as usize - 1].get()
    }
}

open_enum! {
    pub enum IdDataLogPage: u8 {
        SUPPORTED_PAGES = 0x00,
        COPY_OF_IDENTIFY = 0x01,
        CAPACITY = 0x02,
        SUPPORTED_CAPABILITIES = 0x03,
        CURRENT_SETTINGS = 0x04,
        STRINGS = 0x05,
        SECURITY = 0x06,
        PARALLEL_ATA = 0x07,
        SERIAL_ATA = 0x08,
        ZONED_DEVICE_INFORMATION = 0x09,
    }
}

/// First qword of every ID data log page.
#[bitfield(u64)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct IdDataLogPageHeader {
    pub revision: u16,
    pub page: u8,
    #[bits(39)]
    pub reserved: u64,
    pub valid: bool,
}

/// ID data log page 0: byte 8 starts a list of supported page numbers,
/// bounded by the count at byte 7.
pub const ID_DATA_LOG_LIST_COUNT_OFFSET: usize = 7;
pub const ID_DATA_LOG_LIST_OFFSET: usize = 8;

/// Capacity page (2) qword byte offsets.
pub const CAPACITY_QWORD: usize = 8;
pub const SECTOR_SIZES_QWORD: usize = 16;
pub const LOGICAL_SECTOR_SIZE_QWORD: usize = 24;
pub const BUFFER_SIZE_QWORD: usize = 32;

/// Supported capabilities page (3), qword at byte 8. Valid only when
/// bit 63 is set.
#[bitfield(u64)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct SupportedCapabilities {
    pub write_read_verify: bool,
    pub write_uncorrectable: bool,
    pub gpl_dma: bool,
    pub download_microcode_mode3: bool,
    pub free_fall: bool,
    pub sense_data_reporting: bool,
    pub epc: bool,
    pub amax_addr: bool,
    pub dsn: bool,
    #[bits(36)]
    pub reserved: u64,
    /// SET SECTOR CONFIGURATION EXT.
    pub set_sector_config: bool,
    pub sanitize: bool,
    pub crypto_scramble: bool,
    pub overwrite: bool,
    pub block_erase: bool,
    pub sanitize_antifreeze: bool,
    pub command_duration_limits: bool,
    pub depopulation: bool,
    pub depopulation_restore: bool,
    /// DOWNLOAD MICROCODE with the deferred (subcommand 0Eh/0Fh) path.
    pub deferred_download: bool,
    #[bits(8)]
    pub reserved2: u8,
    pub valid: bool,
}

pub const SUPPORTED_CAPABILITIES_QWORD: usize = 8;
pub const DOWNLOAD_CAPABILITIES_QWORD: usize = 16;

/// Download capabilities qword (page 3, byte 16).
#[bitfield(u64)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct DownloadCapabilities {
    pub dm_offsets_immediate: bool,
    pub dm_immediate: bool,
    pub dm_offsets_deferred: bool,
    #[bits(60)]
    pub reserved: u64,
    pub valid: bool,
}

/// Current settings page (4), qword at byte 8.
#[bitfield(u64)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct CurrentSettings {
    pub write_cache_enabled: bool,
    pub read_look_ahead_enabled: bool,
    pub smart_enabled: bool,
    pub security_enabled: bool,
    pub dlc_enabled: bool,
    pub cdl_enabled: bool,
    pub epc_enabled: bool,
    pub free_fall_enabled: bool,
    pub volatile_write_read_verify: bool,
    pub revert_to_defaults: bool,
    pub sense_data_enabled: bool,
    #[bits(52)]
    pub reserved: u64,
    pub valid: bool,
}

pub const CURRENT_SETTINGS_QWORD: usize = 8;

/// Strings page (5) field offsets; contents are ATA byte-swapped ASCII.
pub const STRINGS_SERIAL_OFFSET: usize = 8;
pub const STRINGS_SERIAL_LEN: usize = 20;
pub const STRINGS_FIRMWARE_OFFSET: usize = 32;
pub const STRINGS_FIRMWARE_LEN: usize = 8;
pub const STRINGS_MODEL_OFFSET: usize = 48;
pub const STRINGS_MODEL_LEN: usize = 40;

/// Zoned device information page (9) qword offsets.
pub const ZONED_CAPABILITIES_QWORD: usize = 8;
pub const ZAC_MINOR_VERSION_QWORD: usize = 16;

#[bitfield(u64)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ZonedCapabilities {
    pub realms_supported: bool,
    pub zone_domains_supported: bool,
    #[bits(61)]
    pub reserved: u64,
    pub valid: bool,
}

open_enum! {
    pub enum DeviceStatsPage: u8 {
        SUPPORTED_PAGES = 0x00,
        GENERAL = 0x01,
        ROTATING_MEDIA = 0x03,
        TEMPERATURE = 0x05,
        SOLID_STATE = 0x07,
    }
}

/// Device statistics qwords: bit 63 = statistic supported, bit 62 =
/// value valid, value in the low 48 bits.
pub fn stat_value(qword: u64) -> Option<u64> {
    if qword & (1 << 63) != 0 && qword & (1 << 62) != 0 {
        Some(qword & 0x0000_FFFF_FFFF_FFFF)
    } else {
        None
    }
}

/// Temperature statistics carry a signed byte in bits 7:0.
pub fn stat_temperature(qword: u64) -> Option<i8> {
    stat_value(qword).map(|v| v as u8 as i8)
}

/// General statistics page (1) qword byte offsets.
pub const STAT_POWER_ON_HOURS: usize = 16;
pub const STAT_LOGICAL_SECTORS_WRITTEN: usize = 24;
pub const STAT_LOGICAL_SECTORS_READ: usize = 40;
/// Workload utilization in milli-units of the rated workload (ACS-4).
pub const STAT_WORKLOAD_UTILIZATION: usize = 72;

/// Temperature statistics page (5) qword byte offsets.
pub const STAT_CURRENT_TEMPERATURE: usize = 8;
pub const STAT_HIGHEST_TEMPERATURE: usize = 32;
pub const STAT_LOWEST_TEMPERATURE: usize = 40;

/// Solid state page (7) qword byte offsets.
pub const STAT_PERCENT_USED_ENDURANCE: usize = 8;

/// SCT status response (read from log E0h).
#[repr(C)]
#[derive(Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct SctStatus {
    pub format_version: u16_le,
    pub sct_version: u16_le,
    pub sct_spec: u16_le,
    pub status_flags: u32_le,
    pub device_state: u8,
    pub reserved: [u8; 3],
    pub ext_status_code: u16_le,
    pub action_code: u16_le,
    pub function_code: u16_le,
    pub reserved2: [u8; 20],
    pub lba: u64_le,
    pub reserved3: [u8; 152],
    pub hda_temp: u8,
    pub min_temp: u8,
    pub max_temp: u8,
    pub lifetime_min_temp: u8,
    pub lifetime_max_temp: u8,
    pub reserved4: u8,
    pub reserved5: [u8; 8],
    pub smart_status: u16_le,
    pub reserved6: [u8; 296],
}

static_assertions::assert_eq_size!(SctStatus, [u8; LOG_PAGE_BYTES]);

/// SCT status temperature sentinel: not reported.
pub const SCT_TEMP_NOT_REPORTED: u8 = 0x80;
pub const SCT_SMART_STATUS_OK: u16 = 0xC24F;
pub const SCT_SMART_STATUS_TRIPPED: u16 = 0x2CF4;

open_enum! {
    pub enum SctAction: u16 {
        LONG_SECTOR_ACCESS = 0x0001,
        WRITE_SAME = 0x0002,
        ERROR_RECOVERY_CONTROL = 0x0003,
        FEATURE_CONTROL = 0x0004,
        DATA_TABLES = 0x0005,
    }
}

pub const SCT_FUNCTION_READ_LONG: u16 = 0x0001;
pub const SCT_FUNCTION_WRITE_LONG: u16 = 0x0002;

/// SCT command key sector, written to log E0h; data moves via log E1h.
#[repr(C)]
#[derive(Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct SctKey {
    pub action_code: u16_le,
    pub function_code: u16_le,
    pub lba: u64_le,
    pub count: u32_le,
    pub reserved: [u8; 496],
}

static_assertions::assert_eq_size!(SctKey, [u8; LOG_PAGE_BYTES]);

/// Extended SMART self-test log descriptor.
#[repr(C)]
#[derive(Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ExtSelfTestDescriptor {
    pub test_code: u8,
    /// Bits 7:4 carry the result code; 0x7 is "read element failed".
    pub status: u8,
    pub lifetime_timestamp: u16_le,
    pub checkpoint: u8,
    pub failing_lba: [u8; 6],
    pub vendor: [u8; 15],
}

static_assertions::assert_eq_size!(ExtSelfTestDescriptor, [u8; 26]);

impl ExtSelfTestDescriptor {
    pub fn result_code(&self) -> u8 {
        self.status >> 4
    }

    pub fn failing_lba(&self) -> u64 {
        let b = &self.failing_lba;
        u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], 0, 0])
    }

    /// An all-zero descriptor is an unused slot.
    pub fn is_unused(&self) -> bool {
        self.status == 0 && self.lifetime_timestamp.get() == 0 && self.failing_lba == [0; 6]
    }
}

pub const SELF_TEST_RESULT_READ_FAILURE: u8 = 0x7;

/// Extended SMART self-test log, first page.
#[repr(C)]
#[derive(Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ExtSelfTestLog {
    pub revision: u16_le,
    /// Index of the most recent descriptor, zero when the log is empty.
    pub index: u16_le,
    pub descriptors: [ExtSelfTestDescriptor; 19],
    pub vendor: [u8; 13],
    pub checksum: u8,
}

static_assertions::assert_eq_size!(ExtSelfTestLog, [u8; LOG_PAGE_BYTES]);

/// Pending defects log (0Ch) header.
#[repr(C)]
#[derive(Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct PendingDefectsHeader {
    pub count: u32_le,
    pub reserved: [u8; 12],
}

/// Pending defect descriptors follow the header, 16 bytes each.
#[repr(C)]
#[derive(Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct PendingDefectDescriptor {
    pub power_on_hours: u32_le,
    pub reserved: [u8; 4],
    pub lba: u64_le,
}

static_assertions::assert_eq_size!(PendingDefectDescriptor, [u8; 16]);

/// Concurrent positioning ranges log (47h): range count at byte 0,
/// 32-byte descriptors from byte 64.
pub const CPR_COUNT_OFFSET: usize = 0;

/// FARM signature qword: bits 63:62 set, low 48 bits hold the literal.
pub const FARM_SIGNATURE_LOW: u64 = 0x4641_524D; // "FARM"

pub fn farm_signature_valid(qword: u64) -> bool {
    qword >> 62 == 0b11 && qword & 0x0000_FFFF_FFFF_FFFF == FARM_SIGNATURE_LOW
}

/// FARM page 1 ("drive information") date-of-manufacture qwords, each
/// carrying two ASCII digits in the low bytes.
pub const FARM_DOM_WEEK_QWORD: usize = 48;
pub const FARM_DOM_YEAR_QWORD: usize = 56;

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::FromZeros;

    #[test]
    fn directory_counts() {
        let mut dir = LogDirectory::new_zeroed();
        dir.pages[LogAddress::DEVICE_STATISTICS.0 as usize - 1] = 8.into();
        assert_eq!(dir.page_count(LogAddress::DEVICE_STATISTICS), 8);
        assert_eq!(dir.page_count(LogAddress::FARM), 0);
        assert_eq!(dir.page_count(LogAddress::DIRECTORY), 1);
    }

    #[test]
    fn stat_qword_rules() {
        // supported + valid
        assert_eq!(stat_value((1 << 63) | (1 << 62) | 1234), Some(1234));
        // supported but not valid
        assert_eq!(stat_value((1 << 63) | 1234), None);
        assert_eq!(stat_value(1234), None);
        assert_eq!(
            stat_temperature((1 << 63) | (1 << 62) | 0xE7),
            Some(-25i8)
        );
    }

    #[test]
    fn farm_signature() {
        assert!(farm_signature_valid((0b11 << 62) | FARM_SIGNATURE_LOW));
        assert!(!farm_signature_valid(FARM_SIGNATURE_LOW));
        assert!(!farm_signature_valid((0b11 << 62) | 0x1234));
    }

    #[test]
    fn self_test_descriptor_lba() {
        let mut d = ExtSelfTestDescriptor::new_zeroed();
        assert!(d.is_unused());
        d.status = 0x74;
        d.failing_lba = [0x00, 0x10, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(d.result_code(), SELF_TEST_RESULT_READ_FAILURE);
        assert_eq!(d.failing_lba(), 0x1000);
    }
}
