// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Definitions from the NVMe Base specification (admin command set,
//! identify structures, and log pages) needed for device introspection
//! and firmware management.
//!
//! NVMe data is little-endian except where noted (NGUID and EUI64 are
//! big-endian byte strings).

pub mod nvm;

use bitfield_struct::bitfield;
use open_enum::open_enum;
use storage_string::AsciiString;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

type U128LE = zerocopy::U128<zerocopy::LE>;

open_enum! {
    pub enum AdminOpcode: u8 {
        GET_LOG_PAGE = 0x02,
        IDENTIFY = 0x06,
        SET_FEATURES = 0x09,
        GET_FEATURES = 0x0A,
        FIRMWARE_COMMIT = 0x10,
        FIRMWARE_IMAGE_DOWNLOAD = 0x11,
        DEVICE_SELF_TEST = 0x14,
        FORMAT_NVM = 0x80,
        SECURITY_SEND = 0x81,
        SECURITY_RECEIVE = 0x82,
        SANITIZE = 0x84,
    }
}

open_enum! {
    /// Generic and command-specific status values, including the status
    /// code type in bits 10:8.
    pub enum Status: u16 {
        SUCCESS = 0x00,
        INVALID_COMMAND_OPCODE = 0x01,
        INVALID_FIELD_IN_COMMAND = 0x02,
        DATA_TRANSFER_ERROR = 0x04,
        ABORTED_COMMAND = 0x07,
        INVALID_NAMESPACE_OR_FORMAT = 0x0B,
        INVALID_LOG_PAGE = 0x109,
        INVALID_FORMAT = 0x10A,
        FIRMWARE_ACTIVATION_REQUIRES_CONVENTIONAL_RESET = 0x10B,
        FIRMWARE_ACTIVATION_REQUIRES_NVM_SUBSYSTEM_RESET = 0x110,
        FIRMWARE_ACTIVATION_REQUIRES_CONTROLLER_RESET = 0x111,
        FIRMWARE_ACTIVATION_REQUIRES_MAX_TIME_VIOLATION = 0x112,
        FIRMWARE_ACTIVATION_PROHIBITED = 0x113,
        OVERLAPPING_RANGE = 0x114,
        UNRECOVERED_READ_ERROR = 0x281,
    }
}

impl Status {
    /// Status code type: 0 generic, 1 command specific, 2 media/data
    /// integrity.
    pub fn code_type(&self) -> u8 {
        ((self.0 >> 8) & 0x7) as u8
    }
}

#[bitfield(u32)]
pub struct Cdw10Identify {
    pub cns: u8,
    pub rsvd: u8,
    pub cntid: u16,
}

open_enum! {
    pub enum Cns: u8 {
        NAMESPACE = 0x00,
        CONTROLLER = 0x01,
        ACTIVE_NAMESPACES = 0x02,
        DESCRIPTOR_NAMESPACE = 0x03,
    }
}

#[bitfield(u16)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct OptionalAdminCommandSupport {
    pub security_send_receive: bool,
    pub format_nvm: bool,
    pub firmware_download: bool,
    pub namespace_management: bool,
    pub device_self_test: bool,
    pub directives: bool,
    pub nvme_mi: bool,
    pub virtualization_management: bool,
    pub doorbell_buffer_config: bool,
    pub get_lba_status: bool,
    pub command_and_feature_lockdown: bool,
    #[bits(5)]
    pub rsvd: u8,
}

#[bitfield(u8)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct FirmwareUpdates {
    /// Slot 1 is read only.
    pub ffsro: bool,
    /// Number of firmware slots.
    #[bits(3)]
    pub nofs: u8,
    /// Activation without reset supported.
    pub fawr: bool,
    /// Multiple update detection supported.
    pub smud: bool,
    #[bits(2)]
    pub rsvd: u8,
}

#[bitfield(u16)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct Oncs {
    pub compare: bool,
    pub write_uncorrectable: bool,
    pub dataset_management: bool,
    pub write_zeroes: bool,
    pub save_select_in_features: bool,
    pub reservations: bool,
    pub timestamp: bool,
    pub verify: bool,
    pub copy: bool,
    #[bits(7)]
    pub rsvd: u8,
}

#[bitfield(u8)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct VolatileWriteCache {
    pub present: bool,
    #[bits(2)]
    pub broadcast_flush_behavior: u8,
    #[bits(5)]
    pub rsvd: u8,
}

open_enum! {
    #[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
    pub enum ControllerType: u8 {
        RESERVED = 0,
        IO_CONTROLLER = 1,
        DISCOVERY_CONTROLLER = 2,
        ADMINISTRATIVE_CONTROLLER = 3,
    }
}

/// Identify Controller data structure (CNS 01h), 4096 bytes.
#[repr(C)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct IdentifyController {
    pub vid: u16,
    pub ssvid: u16,
    pub sn: AsciiString<20>,
    pub mn: AsciiString<40>,
    pub fr: AsciiString<8>,
    pub rab: u8,
    /// IEEE OUI, little-endian byte order.
    pub ieee: [u8; 3],
    pub cmic: u8,
    pub mdts: u8,
    pub cntlid: u16,
    pub ver: u32,
    pub rtd3r: u32,
    pub rtd3e: u32,
    pub oaes: u32,
    pub ctratt: u32,
    pub rrls: u16,
    pub rsvd1: [u8; 9],
    pub cntrltype: ControllerType,
    pub fguid: [u8; 16],
    pub crdt1: u16,
    pub crdt2: u16,
    pub crdt3: u16,
    pub rsvd2: [u8; 106],
    pub rsvd3: [u8; 13],
    pub nvmsr: u8,
    pub vwci: u8,
    pub mec: u8,
    pub oacs: OptionalAdminCommandSupport,
    pub acl: u8,
    pub aerl: u8,
    pub frmw: FirmwareUpdates,
    pub lpa: u8,
    pub elpe: u8,
    pub npss: u8,
    pub avscc: u8,
    pub apsta: u8,
    /// Warning composite temperature threshold, Kelvin.
    pub wctemp: u16,
    /// Critical composite temperature threshold, Kelvin.
    pub cctemp: u16,
    pub mtfa: u16,
    pub hmpre: u32,
    pub hmmin: u32,
    pub tnvmcap: U128LE,
    pub unvmcap: U128LE,
    pub rpmbs: u32,
    /// Extended device self-test time, minutes.
    pub edstt: u16,
    pub dsto: u8,
    pub fwug: u8,
    pub kas: u16,
    pub hctma: u16,
    pub mntmt: u16,
    pub mxtmt: u16,
    pub sanicap: u32,
    pub hmminds: u32,
    pub hmmaxd: u16,
    pub nsetidmax: u16,
    pub endgidmax: u16,
    pub anatt: u8,
    pub anacap: u8,
    pub anagrpmax: u32,
    pub nanagrpid: u32,
    pub pels: u32,
    pub domain_id: u16,
    pub rsvd4: [u8; 10],
    pub megcap: U128LE,
    pub rsvd5: [u8; 128],
    pub sqes: u8,
    pub cqes: u8,
    pub maxcmd: u16,
    /// Number of namespaces.
    pub nn: u32,
    pub oncs: Oncs,
    pub fuses: u16,
    pub fna: u8,
    pub vwc: VolatileWriteCache,
    pub awun: u16,
    pub awupf: u16,
    pub icsvscc: u8,
    pub nwpc: u8,
    pub acwu: u16,
    pub copy_descriptor_fmt: u16,
    pub sgls: u32,
    pub mnan: u32,
    pub maxdna: U128LE,
    pub maxcna: u32,
    pub rsvd6: [u8; 204],
    pub subnqn: [u8; 256],
    pub rsvd7: [u8; 768],
    pub ioccsz: u32,
    pub iorcsz: u32,
    pub icdoff: u16,
    pub fcatt: u8,
    pub msdbd: u8,
    pub ofcs: u16,
    pub rsvd8: [u8; 242],
    pub power: [u8; 1024],
    pub vendor: [u8; 1024],
}

const _: () = assert!(size_of::<IdentifyController>() == 4096);

impl IdentifyController {
    /// NVMe version as (major, minor, tertiary).
    pub fn version(&self) -> (u16, u8, u8) {
        ((self.ver >> 16) as u16, (self.ver >> 8) as u8, self.ver as u8)
    }
}

#[bitfield(u32)]
pub struct Cdw10GetFeatures {
    pub fid: u8,
    #[bits(3)]
    pub sel: u8,
    #[bits(21)]
    pub rsvd: u32,
}

open_enum! {
    pub enum Feature: u8 {
        ARBITRATION = 0x01,
        POWER_MANAGEMENT = 0x02,
        TEMPERATURE_THRESHOLD = 0x04,
        ERROR_RECOVERY = 0x05,
        VOLATILE_WRITE_CACHE = 0x06,
        NUMBER_OF_QUEUES = 0x07,
        WRITE_ATOMICITY = 0x0A,
        ASYNC_EVENT_CONFIG = 0x0B,
        TIMESTAMP = 0x0E,
        SANITIZE_CONFIG = 0x17,
    }
}

/// Get Features select values.
pub const FEATURE_SELECT_CURRENT: u8 = 0;
pub const FEATURE_SELECT_DEFAULT: u8 = 1;
pub const FEATURE_SELECT_SAVED: u8 = 2;

#[bitfield(u32)]
pub struct Cdw11FeatureVolatileWriteCache {
    pub wce: bool,
    #[bits(31)]
    pub rsvd: u32,
}

#[bitfield(u32)]
pub struct Cdw10GetLogPage {
    pub lid: u8,
    #[bits(7)]
    pub lsp: u8,
    pub rae: bool,
    /// Number of dwords, low 16 bits, zero based.
    pub numdl_z: u16,
}

#[bitfield(u32)]
pub struct Cdw11GetLogPage {
    pub numdu: u16,
    pub lsi: u16,
}

open_enum! {
    pub enum LogPageIdentifier: u8 {
        SUPPORTED_LOG_PAGES = 0x00,
        ERROR_INFORMATION = 0x01,
        HEALTH_INFORMATION = 0x02,
        FIRMWARE_SLOT_INFORMATION = 0x03,
        CHANGED_NAMESPACE_LIST = 0x04,
        DEVICE_SELF_TEST = 0x06,
        TELEMETRY_HOST_INITIATED = 0x07,
        SANITIZE_STATUS = 0x81,
    }
}

/// SMART / Health Information log (02h), 512 bytes.
#[repr(C)]
#[derive(Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct SmartHealthLog {
    /// Bit 0 spare below threshold, bit 1 temperature out of range, bit
    /// 2 reliability degraded, bit 3 medium read-only, bit 4 volatile
    /// backup failed.
    pub critical_warning: u8,
    /// Composite temperature, Kelvin.
    pub composite_temperature: zerocopy::U16<zerocopy::LE>,
    pub available_spare: u8,
    pub available_spare_threshold: u8,
    pub percentage_used: u8,
    pub endurance_group_critical_warning: u8,
    pub rsvd1: [u8; 25],
    /// Units of 512,000 bytes.
    pub data_units_read: U128LE,
    pub data_units_written: U128LE,
    pub host_read_commands: U128LE,
    pub host_write_commands: U128LE,
    pub controller_busy_time: U128LE,
    pub power_cycles: U128LE,
    pub power_on_hours: U128LE,
    pub unsafe_shutdowns: U128LE,
    pub media_errors: U128LE,
    pub num_error_info_log_entries: U128LE,
    pub warning_composite_temp_time: u32,
    pub critical_composite_temp_time: u32,
    pub temperature_sensors: [zerocopy::U16<zerocopy::LE>; 8],
    pub thermal_mgmt_temp1_transition_count: u32,
    pub thermal_mgmt_temp2_transition_count: u32,
    pub thermal_mgmt_temp1_total_time: u32,
    pub thermal_mgmt_temp2_total_time: u32,
    pub rsvd2: [u8; 280],
}

static_assertions::assert_eq_size!(SmartHealthLog, [u8; 512]);

pub const CRITICAL_WARNING_SPARE: u8 = 1 << 0;
pub const CRITICAL_WARNING_TEMPERATURE: u8 = 1 << 1;
pub const CRITICAL_WARNING_DEGRADED: u8 = 1 << 2;
pub const CRITICAL_WARNING_READ_ONLY: u8 = 1 << 3;
pub const CRITICAL_WARNING_BACKUP_FAILED: u8 = 1 << 4;

/// Kelvin offset used by composite temperature fields.
pub const KELVIN_OFFSET: i32 = 273;

/// Firmware Slot Information log (03h), 512 bytes.
#[repr(C)]
#[derive(Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct FirmwareSlotLog {
    /// Bits 2:0 active slot, bits 6:4 slot pending activation at next
    /// reset.
    pub afi: u8,
    pub rsvd1: [u8; 7],
    pub firmware_revision: [AsciiString<8>; 7],
    pub rsvd2: [u8; 448],
}

static_assertions::assert_eq_size!(FirmwareSlotLog, [u8; 512]);

impl FirmwareSlotLog {
    pub fn active_slot(&self) -> u8 {
        self.afi & 0x7
    }

    pub fn pending_slot(&self) -> u8 {
        (self.afi >> 4) & 0x7
    }
}

/// Device Self-test log (06h) result entry, 28 bytes.
#[repr(C)]
#[derive(Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct SelfTestResult {
    /// Bits 3:0 result (0xF = entry unused), bits 7:4 test code.
    pub status: u8,
    pub segment_number: u8,
    /// Bit 0 NSID valid, bit 1 FLBA valid, bit 2 SCT valid, bit 3 SC
    /// valid.
    pub valid_info: u8,
    pub rsvd: u8,
    pub power_on_hours: zerocopy::U64<zerocopy::LE>,
    pub nsid: zerocopy::U32<zerocopy::LE>,
    pub failing_lba: zerocopy::U64<zerocopy::LE>,
    pub status_code_type: u8,
    pub status_code: u8,
    pub vendor: [u8; 2],
}

static_assertions::assert_eq_size!(SelfTestResult, [u8; 28]);

pub const SELF_TEST_RESULT_UNUSED: u8 = 0xF;

impl SelfTestResult {
    pub fn result(&self) -> u8 {
        self.status & 0x0F
    }

    pub fn test_code(&self) -> u8 {
        self.status >> 4
    }

    pub fn failing_lba_valid(&self) -> bool {
        self.valid_info & 0x02 != 0
    }
}

/// Device Self-test log (06h): newest result first.
#[repr(C)]
#[derive(Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct SelfTestLog {
    pub current_operation: u8,
    pub current_completion: u8,
    pub rsvd: [u8; 2],
    pub results: [SelfTestResult; 20],
}

static_assertions::assert_eq_size!(SelfTestLog, [u8; 564]);

/// Firmware Commit (10h) CDW10.
#[bitfield(u32)]
pub struct Cdw10FirmwareCommit {
    #[bits(3)]
    pub fs: u8,
    #[bits(3)]
    pub ca: u8,
    #[bits(25)]
    pub rsvd: u32,
    pub bpid: bool,
}

open_enum! {
    pub enum FirmwareCommitAction: u8 {
        /// Download to slot without activation.
        REPLACE = 0b000,
        /// Download to slot and activate at next reset.
        REPLACE_AND_ACTIVATE = 0b001,
        /// Activate the image already in the slot at next reset.
        ACTIVATE = 0b010,
        /// Activate immediately without reset.
        ACTIVATE_IMMEDIATE = 0b011,
        /// Replace the boot partition.
        BOOT_PARTITION = 0b110,
    }
}

/// Firmware Image Download (11h): CDW10 dword count (zero based), CDW11
/// dword offset.
#[bitfield(u32)]
pub struct Cdw10FirmwareDownload {
    pub numd_z: u32,
}

#[bitfield(u32)]
pub struct Cdw11FirmwareDownload {
    pub ofst: u32,
}

/// Security Receive (82h) CDW10.
#[bitfield(u32)]
pub struct Cdw10SecurityReceive {
    pub rsvd: u8,
    pub spsp: u16,
    pub secp: u8,
}
