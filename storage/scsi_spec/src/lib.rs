// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! SCSI command and data structure definitions (SPC-3 through SPC-5 and
//! SBC-4) for device identification, log and mode page access, defect
//! lists, long-sector access, and firmware download.
//!
//! All multi-byte SCSI fields are big-endian.

use bitfield_struct::bitfield;
use open_enum::open_enum;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

pub type U16BE = zerocopy::byteorder::U16<zerocopy::byteorder::BigEndian>;
pub type U32BE = zerocopy::byteorder::U32<zerocopy::byteorder::BigEndian>;
pub type U64BE = zerocopy::byteorder::U64<zerocopy::byteorder::BigEndian>;

open_enum! {
    #[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
    pub enum ScsiOp: u8 {
        TEST_UNIT_READY = 0x00,
        REQUEST_SENSE = 0x03,
        FORMAT_UNIT = 0x04,
        INQUIRY = 0x12,
        MODE_SELECT = 0x15,
        MODE_SENSE = 0x1A,
        RECEIVE_DIAGNOSTIC = 0x1C,
        SEND_DIAGNOSTIC = 0x1D,
        READ_CAPACITY = 0x25,
        READ = 0x28,
        WRITE = 0x2A,
        READ_DEFECT_DATA10 = 0x37,
        WRITE_BUFFER = 0x3B,
        READ_BUFFER = 0x3C,
        READ_LONG = 0x3E,
        WRITE_LONG = 0x3F,
        SANITIZE = 0x48,
        LOG_SELECT = 0x4C,
        LOG_SENSE = 0x4D,
        MODE_SELECT10 = 0x55,
        MODE_SENSE10 = 0x5A,
        PERSISTENT_RESERVE_IN = 0x5E,
        ATA_PASSTHROUGH16 = 0x85,
        READ16 = 0x88,
        WRITE16 = 0x8A,
        SERVICE_ACTION_IN16 = 0x9E,
        SERVICE_ACTION_OUT16 = 0x9F,
        REPORT_LUNS = 0xA0,
        ATA_PASSTHROUGH12 = 0xA1,
        SECURITY_PROTOCOL_IN = 0xA2,
        MAINTENANCE_IN = 0xA3,
        SECURITY_PROTOCOL_OUT = 0xB5,
        READ_DEFECT_DATA12 = 0xB7,
    }
}

pub const SERVICE_ACTION_READ_CAPACITY16: u8 = 0x10;
pub const SERVICE_ACTION_READ_LONG16: u8 = 0x11;
pub const SERVICE_ACTION_WRITE_LONG16: u8 = 0x11;
pub const SERVICE_ACTION_REPORT_SUPPORTED_OP_CODES: u8 = 0x0C;
pub const SERVICE_ACTION_SANITIZE_OVERWRITE: u8 = 0x01;
pub const SERVICE_ACTION_SANITIZE_BLOCK_ERASE: u8 = 0x02;
pub const SERVICE_ACTION_SANITIZE_CRYPTO_ERASE: u8 = 0x03;
pub const SERVICE_ACTION_GET_PHYSICAL_ELEMENT_STATUS: u8 = 0x17;
pub const SERVICE_ACTION_REMOVE_ELEMENT_AND_TRUNCATE: u8 = 0x18;

// Sense machinery.

open_enum! {
    #[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
    pub enum SenseKey: u8 {
        NO_SENSE = 0x00,
        RECOVERED_ERROR = 0x01,
        NOT_READY = 0x02,
        MEDIUM_ERROR = 0x03,
        HARDWARE_ERROR = 0x04,
        ILLEGAL_REQUEST = 0x05,
        UNIT_ATTENTION = 0x06,
        DATA_PROTECT = 0x07,
        BLANK_CHECK = 0x08,
        COPY_ABORTED = 0x0A,
        ABORTED_COMMAND = 0x0B,
        VOL_OVERFLOW = 0x0D,
        MISCOMPARE = 0x0E,
    }
}

open_enum! {
    #[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
    pub enum SenseDataErrorCode: u8 {
        FIXED_CURRENT = 0x70,
        FIXED_DEFERRED = 0x71,
        DESCRIPTOR_CURRENT = 0x72,
        DESCRIPTOR_DEFERRED = 0x73,
    }
}

open_enum! {
    #[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
    pub enum AdditionalSenseCode: u8 {
        NO_SENSE = 0x00,
        LUN_NOT_READY = 0x04,
        WARNING = 0x0B,
        WRITE_ERROR = 0x0C,
        CRC_OR_ECC_ERROR = 0x10,
        UNRECOVERED_ERROR = 0x11,
        DEFECT_LIST_ERROR = 0x19,
        PARAMETER_LIST_LENGTH = 0x1A,
        ILLEGAL_COMMAND = 0x20,
        ILLEGAL_BLOCK = 0x21,
        INVALID_CDB = 0x24,
        INVALID_LUN = 0x25,
        INVALID_FIELD_PARAMETER_LIST = 0x26,
        WRITE_PROTECT = 0x27,
        MEDIUM_CHANGED = 0x28,
        BUS_RESET = 0x29,
        PARAMETERS_CHANGED = 0x2A,
        INVALID_MEDIA = 0x30,
        MEDIUM_FORMAT_CORRUPTED = 0x31,
        DEFECT_LIST = 0x32,
        NO_MEDIA_IN_DEVICE = 0x3A,
        OPERATING_CONDITIONS_CHANGED = 0x3F,
        INTERNAL_TARGET_FAILURE = 0x44,
        RESOURCE_FAILURE = 0x55,
        FAILURE_PREDICTION_THRESHOLD_EXCEEDED = 0x5D,
    }
}

open_enum! {
    #[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
    pub enum ScsiStatus: u8 {
        GOOD = 0x00,
        CHECK_CONDITION = 0x02,
        CONDITION_MET = 0x04,
        BUSY = 0x08,
        RESERVATION_CONFLICT = 0x18,
        TASK_SET_FULL = 0x28,
        TASK_ABORTED = 0x40,
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct SenseDataHeader {
    /*
    UCHAR ErrorCode:7;
    UCHAR Valid:1;
     */
    pub error_code: SenseDataErrorCode,
    pub segment_number: u8,
    /*
    UCHAR SenseKey:4;
    UCHAR Reserved:1;
    UCHAR IncorrectLength:1;
    UCHAR EndOfMedia:1;
    UCHAR FileMark:1;
     */
    pub sense_key: u8,
    pub information: [u8; 4],
    pub additional_sense_length: u8,
}

/// Fixed-format sense data. The devices this crate targets report fixed
/// format; descriptor format is not decoded.
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct SenseData {
    pub header: SenseDataHeader,
    pub command_specific_information: [u8; 4],
    pub additional_sense_code: AdditionalSenseCode,
    pub additional_sense_code_qualifier: u8,
    pub field_replaceable_unit_code: u8,
    pub sense_key_specific: [u8; 3],
}

static_assertions::assert_eq_size!(SenseData, [u8; 18]);

impl SenseData {
    pub const fn new(
        sense_key: SenseKey,
        additional_sense_code: AdditionalSenseCode,
        additional_sense_code_qualifier: u8,
    ) -> Self {
        SenseData {
            header: SenseDataHeader {
                error_code: SenseDataErrorCode::FIXED_CURRENT,
                segment_number: 0,
                sense_key: sense_key.0,
                information: [0; 4],
                additional_sense_length: (size_of::<SenseData>() - size_of::<SenseDataHeader>())
                    as u8,
            },
            command_specific_information: [0; 4],
            additional_sense_code,
            additional_sense_code_qualifier,
            field_replaceable_unit_code: 0,
            sense_key_specific: [0; 3],
        }
    }

    pub fn key(&self) -> SenseKey {
        SenseKey(self.header.sense_key & 0x0F)
    }

    /// The ILI bit, set by READ LONG when the requested byte count does
    /// not match the device's long-sector size.
    pub fn incorrect_length(&self) -> bool {
        self.header.sense_key & 0x20 != 0
    }

    /// The information field as a signed quantity. For an ILI condition
    /// this is the two's-complement residue: requested minus actual
    /// transfer length.
    pub fn information(&self) -> i32 {
        i32::from_be_bytes(self.header.information)
    }
}

// Inquiry.

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct CdbInquiry {
    pub operation_code: ScsiOp,
    pub flags: InquiryFlags,
    pub page_code: u8,
    pub allocation_length: U16BE,
    pub control: u8,
}

static_assertions::assert_eq_size!(CdbInquiry, [u8; 6]);

#[bitfield(u8)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct InquiryFlags {
    #[bits(1)]
    pub vpd: bool,
    #[bits(1)]
    pub csd: bool,
    #[bits(6)]
    pub reserved: u8,
}

pub const INQUIRY_DATA_BUFFER_SIZE: usize = 36;
pub const DIRECT_ACCESS_DEVICE: u8 = 0x00;
pub const SEQUENTIAL_ACCESS_DEVICE: u8 = 0x01;
pub const ZONED_BLOCK_DEVICE: u8 = 0x14;

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct InquiryDataHeader {
    /*
    UCHAR DeviceType : 5;
    UCHAR DeviceTypeQualifier : 3;
    */
    pub device_type: u8,
    pub flags2: InquiryDataFlag2,
    pub versions: u8,
    pub flags3: InquiryDataFlag3,
    pub additional_length: u8,
}

#[bitfield(u8)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct InquiryDataFlag2 {
    #[bits(7)]
    pub device_type_modifier: u8,
    #[bits(1)]
    pub removable_media: bool,
}

#[bitfield(u8)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct InquiryDataFlag3 {
    #[bits(4)]
    pub response_data_format: u8,
    #[bits(1)]
    pub hi_support: bool,
    #[bits(1)]
    pub norm_aca: bool,
    #[bits(1)]
    pub reserved_bit: bool,
    #[bits(1)]
    pub aerc: bool,
}

/// Response data format 1 identifies a CCS-era device.
pub const RESPONSE_DATA_FORMAT_CCS: u8 = 1;

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct InquiryData {
    pub header: InquiryDataHeader,
    pub reserved: [u8; 2],
    pub misc: u8,
    pub vendor_id: [u8; 8],
    pub product_id: [u8; 16],
    pub product_revision_level: [u8; 4],
    pub vendor_specific: [u8; 20],
    pub reserved3: [u8; 2],
    pub version_descriptors: [U16BE; 8],
    pub reserved4: [u8; 30],
}

static_assertions::assert_eq_size!(InquiryData, [u8; 104]);

// VPD pages.

pub const VPD_SUPPORTED_PAGES: u8 = 0x00;
pub const VPD_SERIAL_NUMBER: u8 = 0x80;
pub const VPD_DEVICE_IDENTIFIERS: u8 = 0x83;
pub const VPD_EXTENDED_INQUIRY: u8 = 0x86;
pub const VPD_MODE_PAGE_POLICY: u8 = 0x87;
pub const VPD_ATA_INFORMATION: u8 = 0x89;
pub const VPD_BLOCK_LIMITS: u8 = 0xB0;
pub const VPD_BLOCK_DEVICE_CHARACTERISTICS: u8 = 0xB1;
pub const VPD_LOGICAL_BLOCK_PROVISIONING: u8 = 0xB2;
pub const VPD_ZONED_BLOCK_DEVICE_CHARACTERISTICS: u8 = 0xB6;
pub const VPD_CONCURRENT_POSITIONING_RANGES: u8 = 0xB9;

/// Four-byte VPD page header with the SPC-4 16-bit page length.
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct VpdPageHeader {
    /*
    UCHAR DeviceType : 5;
    UCHAR DeviceTypeQualifier : 3;
     */
    pub device_type: u8,
    pub page_code: u8,
    pub page_length: U16BE,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct VpdIdentificationDescriptor {
    /*
    UCHAR CodeSet : 4;
    UCHAR ProtocolIdentifier : 4;
     */
    pub code_set: u8,
    /*
    UCHAR IdentifierType : 4;
    UCHAR Association : 2;
    UCHAR Reserved : 1;
    UCHAR Piv : 1;
     */
    pub identifier_type: u8,
    pub reserved: u8,
    pub identifier_length: u8,
}

impl VpdIdentificationDescriptor {
    pub fn designator_type(&self) -> u8 {
        self.identifier_type & 0x0F
    }

    pub fn association(&self) -> u8 {
        (self.identifier_type >> 4) & 0x3
    }

    pub fn protocol_identifier(&self) -> u8 {
        self.code_set >> 4
    }

    pub fn piv(&self) -> bool {
        self.identifier_type & 0x80 != 0
    }
}

pub const VPD_CODE_SET_BINARY: u8 = 1;
pub const VPD_CODE_SET_ASCII: u8 = 2;

pub const VPD_IDENTIFIER_TYPE_VENDOR_ID: u8 = 1;
pub const VPD_IDENTIFIER_TYPE_EUI64: u8 = 2;
pub const VPD_IDENTIFIER_TYPE_NAA: u8 = 3;
pub const VPD_IDENTIFIER_TYPE_RELATIVE_TARGET_PORT: u8 = 4;

pub const VPD_ASSOCIATION_LOGICAL_UNIT: u8 = 0;
pub const VPD_ASSOCIATION_TARGET_PORT: u8 = 1;

/// SAS protocol identifier in a PIV designator.
pub const PROTOCOL_IDENTIFIER_SAS: u8 = 6;

/// NAA 6 (IEEE registered extended) designators carry a 64-bit vendor
/// extension after the 8-byte WWN.
pub const NAA_IEEE_REGISTERED_EXTENDED: u8 = 6;

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct VpdBlockLimitsDescriptor {
    pub reserved0: u8,
    pub max_compare_and_write_length: u8,
    pub optimal_transfer_length_granularity: U16BE,
    pub max_transfer_length: U32BE,
    pub optimal_transfer_length: U32BE,
    pub max_prefetch_xd_read_xd_write_transfer_length: U32BE,
    pub max_unmap_lba_count: U32BE,
    pub max_unmap_block_descriptor_count: U32BE,
    pub optimal_unmap_granularity: U32BE,
    pub unmap_granularity_alignment: [u8; 4],
    pub max_write_same_length: U64BE,
    pub max_atomic_transfer_length: U32BE,
    pub atomic_alignment: U32BE,
    pub atomic_transfer_length_granularity: U32BE,
    pub reserved1: [u8; 8],
}

static_assertions::assert_eq_size!(VpdBlockLimitsDescriptor, [u8; 60]);

/// VPD page 0xB1, Block Device Characteristics (payload after the
/// 4-byte page header).
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct VpdBlockDeviceCharacteristics {
    pub medium_rotation_rate: U16BE,
    pub product_type: u8,
    /*
    UCHAR NominalFormFactor : 4;
    UCHAR WACEREQ : 2;
    UCHAR WABEREQ : 2;
     */
    pub form_factor: u8,
    /*
    UCHAR VBULS : 1;
    UCHAR FUAB : 1;
    UCHAR BOCS : 1;
    UCHAR RBWZ : 1;
    UCHAR ZONED : 2;
    UCHAR Reserved : 2;
     */
    pub flags: u8,
    pub reserved: [u8; 55],
}

static_assertions::assert_eq_size!(VpdBlockDeviceCharacteristics, [u8; 60]);

pub const ROTATION_RATE_NOT_REPORTED: u16 = 0x0000;
pub const ROTATION_RATE_NON_ROTATING: u16 = 0x0001;

impl VpdBlockDeviceCharacteristics {
    pub fn nominal_form_factor(&self) -> u8 {
        self.form_factor & 0x0F
    }

    /// 0 = not reported/not zoned, 1 = host aware, 2 = device managed.
    pub fn zoned(&self) -> u8 {
        (self.flags >> 4) & 0x3
    }
}

/// VPD page 0xB2, Logical Block Provisioning (payload after header).
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct VpdLogicalBlockProvisioning {
    pub threshold_exponent: u8,
    /*
    UCHAR DP                : 1;
    UCHAR ANC_SUP           : 1;
    UCHAR LBPRZ             : 3;
    UCHAR LBPWS10           : 1;
    UCHAR LBPWS             : 1;
    UCHAR LBPU              : 1;
    */
    pub flags: u8,
    /*
    UCHAR ProvisioningType  : 3;
    UCHAR MinimumPercentage : 5;
    */
    pub provisioning_type: u8,
    pub reserved: u8,
}

impl VpdLogicalBlockProvisioning {
    pub fn lbpu(&self) -> bool {
        self.flags & 0x80 != 0
    }

    /// 0 = vendor specific, 1 = zeroes, 2 = provisioning initialization
    /// pattern.
    pub fn lbprz(&self) -> u8 {
        (self.flags >> 2) & 0x7
    }

    pub fn anchored_supported(&self) -> bool {
        self.flags & 0x02 != 0
    }
}

/// VPD page 0x86, Extended Inquiry data (whole page, header included).
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct VpdExtendedInquiryPage {
    pub header: VpdPageHeader,
    /*
    UCHAR REF_CHK : 1;
    UCHAR APP_CHK : 1;
    UCHAR GRD_CHK : 1;
    UCHAR SPT : 3;
    UCHAR ActivateMicrocode : 2;
     */
    pub protection_flags: u8,
    pub grouping_flags: u8,
    /*
    UCHAR V_SUP : 1;
    UCHAR NV_SUP : 1;
    UCHAR CRD_SUP : 1;
    UCHAR WU_SUP : 1;
    ...
     */
    pub cache_flags: u8,
    pub flags4: u8,
    pub maintenance_flags: u8,
    pub reserved0: u8,
    pub extended_self_test_minutes: U16BE,
    pub flags5: u8,
    pub max_sense_data_length: u8,
    pub reserved: [u8; 50],
}

static_assertions::assert_eq_size!(VpdExtendedInquiryPage, [u8; 64]);

impl VpdExtendedInquiryPage {
    /// Supported protection types field, decoded per the SPC-4 8-entry
    /// table by the caller.
    pub fn spt(&self) -> u8 {
        (self.protection_flags >> 3) & 0x7
    }

    pub fn nv_cache_supported(&self) -> bool {
        self.cache_flags & 0x02 != 0
    }
}

/// VPD page 0x89, ATA Information: SAT bridge identity, then the full
/// 512-byte ATA IDENTIFY payload at byte 60.
pub const ATA_INFORMATION_VENDOR_OFFSET: usize = 8;
pub const ATA_INFORMATION_PRODUCT_OFFSET: usize = 16;
pub const ATA_INFORMATION_REVISION_OFFSET: usize = 32;
pub const ATA_INFORMATION_IDENTIFY_OFFSET: usize = 60;

/// VPD page 0xB6, Zoned Block Device Characteristics: high nibble of
/// byte 4 distinguishes host-aware from zone-domains/realms devices.
pub const ZONED_VPD_FLAGS_OFFSET: usize = 4;

/// VPD page 0xB9: `(page_length - 60) / 32` concurrent positioning
/// ranges.
pub const CPR_VPD_FIXED_BYTES: usize = 60;
pub const CPR_VPD_DESCRIPTOR_BYTES: usize = 32;

// Mode pages.

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ModeSense {
    pub operation_code: ScsiOp,
    pub flags1: u8,
    pub flags2: ModeSenseFlags,
    pub sub_page_code: u8,
    pub allocation_length: u8,
    pub control: u8,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ModeSense10 {
    pub operation_code: ScsiOp,
    pub flags1: u8,
    pub flags2: ModeSenseFlags,
    pub sub_page_code: u8,
    pub reserved2: [u8; 3],
    pub allocation_length: U16BE,
    pub control: u8,
}

static_assertions::assert_eq_size!(ModeSense10, [u8; 10]);

#[bitfield(u8)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ModeSenseFlags {
    #[bits(6)]
    pub page_code: u8,
    #[bits(2)]
    pub pc: u8,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ModeSelect {
    pub operation_code: ScsiOp,
    pub flags: ModeSelectFlags,
    pub reserved2: [u8; 2],
    pub parameter_list_length: u8,
    pub control: u8,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ModeSelect10 {
    pub operation_code: ScsiOp,
    pub flags: ModeSelectFlags,
    pub reserved2: [u8; 5],
    pub parameter_list_length: U16BE,
    pub control: u8,
}

#[bitfield(u8)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ModeSelectFlags {
    #[bits(1)]
    pub spbit: bool,
    #[bits(3)]
    pub reserved: u8,
    #[bits(1)]
    pub pf: bool,
    #[bits(3)]
    pub other_flags: u8,
}

pub const MODE_CONTROL_CURRENT_VALUES: u8 = 0x00;
pub const MODE_CONTROL_CHANGEABLE_VALUES: u8 = 0x01;
pub const MODE_CONTROL_DEFAULT_VALUES: u8 = 0x02;
pub const MODE_CONTROL_SAVED_VALUES: u8 = 0x03;

pub const MODE_PAGE_ERROR_RECOVERY: u8 = 0x01;
pub const MODE_PAGE_RIGID_GEOMETRY: u8 = 0x04;
pub const MODE_PAGE_CACHING: u8 = 0x08;
pub const MODE_PAGE_CONTROL: u8 = 0x0A;
pub const MODE_PAGE_PROTOCOL_SPECIFIC_PORT: u8 = 0x19;
pub const MODE_PAGE_POWER_CONDITION: u8 = 0x1A;
pub const MODE_PAGE_INFORMATIONAL_EXCEPTIONS: u8 = 0x1C;
pub const MODE_PAGE_ALL: u8 = 0x3F;

pub const MODE_SUBPAGE_CONTROL_EXTENSION: u8 = 0x01;
pub const MODE_SUBPAGE_BACKGROUND_CONTROL: u8 = 0x01;
pub const MODE_SUBPAGE_SAS_PHY_CONTROL: u8 = 0x01;

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ModeParameterHeader {
    pub mode_data_length: u8,
    pub medium_type: u8,
    pub device_specific_parameter: u8,
    pub block_descriptor_length: u8,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ModeParameterHeader10 {
    pub mode_data_length: U16BE,
    pub medium_type: u8,
    pub device_specific_parameter: u8,
    pub reserved: [u8; 2],
    pub block_descriptor_length: U16BE,
}

static_assertions::assert_eq_size!(ModeParameterHeader10, [u8; 8]);

/// Device-specific parameter bit 7 in the mode parameter header marks
/// the medium write protected.
pub const MODE_DSP_WRITE_PROTECT: u8 = 0x80;
pub const MODE_DSP_FUA_SUPPORTED: u8 = 0x10;

/// Caching mode page (0x08), direct-access format.
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ModeCachingPage {
    /*
    UCHAR PageCode : 6;
    UCHAR SPF : 1;
    UCHAR PageSavable : 1;
     */
    pub page_code: u8,
    pub page_length: u8,
    /*
    UCHAR RCD : 1;
    UCHAR MF : 1;
    UCHAR WCE : 1;
    UCHAR SIZE : 1;
    UCHAR DISC : 1;
    UCHAR CAP : 1;
    UCHAR ABPF : 1;
    UCHAR IC : 1;
     */
    pub flags: u8,
    pub retention_priority: u8,
    pub disable_prefetch_transfer: U16BE,
    pub minimum_prefetch: U16BE,
    pub maximum_prefetch: U16BE,
    pub maximum_prefetch_ceiling: U16BE,
    /*
    UCHAR NV_DIS : 1;
    UCHAR Reserved : 2;
    UCHAR VendorSpecific : 2;
    UCHAR DRA : 1;
    UCHAR LBCSS : 1;
    UCHAR FSW : 1;
     */
    pub flags2: u8,
    pub number_of_cache_segments: u8,
    pub cache_segment_size: U16BE,
    pub reserved: [u8; 4],
}

static_assertions::assert_eq_size!(ModeCachingPage, [u8; 20]);

pub const MODE_CACHING_WCE: u8 = 0x04;
pub const MODE_CACHING_DRA: u8 = 0x20;
pub const MODE_CACHING_NV_DIS: u8 = 0x01;

/// Control mode page (0x0A); bytes 10-11 carry the extended self-test
/// completion time in seconds.
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ModeControlPage {
    pub page_code: u8,
    pub page_length: u8,
    pub flags1: u8,
    pub queue_flags: u8,
    pub flags2: u8,
    pub flags3: u8,
    pub obsolete: [u8; 2],
    pub busy_timeout_period: U16BE,
    pub extended_self_test_time: U16BE,
}

static_assertions::assert_eq_size!(ModeControlPage, [u8; 12]);

/// Control extension subpage (0x0A/0x01).
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ModeControlExtensionPage {
    /// Page code with the SPF bit (0x40) set.
    pub page_code: u8,
    pub subpage_code: u8,
    pub page_length: U16BE,
    /*
    UCHAR TCMOS : 1;
    UCHAR SCSIP : 1;
    UCHAR IALUAE : 1;
    UCHAR DLC : 1;
    UCHAR Reserved : 4;
     */
    pub flags: u8,
    pub initial_command_priority: u8,
    pub max_sense_data_length: u8,
    pub reserved: [u8; 25],
}

static_assertions::assert_eq_size!(ModeControlExtensionPage, [u8; 32]);

pub const MODE_CONTROL_EXT_DLC: u8 = 0x08;

/// Page code byte flag selecting a subpage format.
pub const MODE_PAGE_SPF: u8 = 0x40;
/// Page code byte flag: parameters savable.
pub const MODE_PAGE_PS: u8 = 0x80;

/// Informational exceptions control mode page (0x1C).
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ModeInformationalExceptionsPage {
    pub page_code: u8,
    pub page_length: u8,
    /*
    UCHAR LOGERR : 1;
    UCHAR EBACKERR : 1;
    UCHAR TEST : 1;
    UCHAR DEXCPT : 1;
    UCHAR EWASC : 1;
    UCHAR EBF : 1;
    UCHAR Reserved : 1;
    UCHAR PERF : 1;
     */
    pub flags: u8,
    /// Low nibble: method of reporting informational exceptions.
    pub mrie: u8,
    pub interval_timer: U32BE,
    pub report_count: U32BE,
}

static_assertions::assert_eq_size!(ModeInformationalExceptionsPage, [u8; 12]);

/// Power condition mode page (0x1A), EPC format.
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ModePowerConditionPage {
    pub page_code: u8,
    pub page_length: u8,
    /// Bits 7:6 PM_BG_PRECEDENCE, bit 0 STANDBY_Y.
    pub precedence_flags: u8,
    /// Bit 3 IDLE_A, bit 2 IDLE_B, bit 1 IDLE_C, bit 0 STANDBY_Z.
    pub enable_flags: u8,
    pub idle_a_timer: U32BE,
    pub standby_z_timer: U32BE,
    pub idle_b_timer: U32BE,
    pub idle_c_timer: U32BE,
    pub standby_y_timer: U32BE,
    pub reserved: [u8; 15],
    pub ccf_flags: u8,
}

static_assertions::assert_eq_size!(ModePowerConditionPage, [u8; 40]);

/// Background control subpage (0x1C/0x01).
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ModeBackgroundControlPage {
    pub page_code: u8,
    pub subpage_code: u8,
    pub page_length: U16BE,
    /// Bit 2 S_L_FULL, bit 1 LOWIR, bit 0 EN_BMS.
    pub flags: u8,
    /// Bit 0 EN_PS.
    pub ps_flags: u8,
    pub bms_interval_time: U16BE,
    pub prescan_time_limit: U16BE,
    pub min_idle_before_bms: U16BE,
    pub max_time_to_suspend: U16BE,
    pub reserved: [u8; 2],
}

static_assertions::assert_eq_size!(ModeBackgroundControlPage, [u8; 16]);

pub const MODE_BMS_ENABLED: u8 = 0x01;
pub const MODE_BMS_PRESCAN_ENABLED: u8 = 0x01;

/// Protocol specific port page (0x19) leading bytes; the low nibble of
/// byte 2 is the protocol identifier.
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ModeProtocolSpecificPortPage {
    pub page_code: u8,
    pub page_length: u8,
    pub protocol_identifier: u8,
    pub flags: u8,
}

/// SAS phy control and discover subpage (0x19/0x01) phy descriptor.
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct SasPhyModeDescriptor {
    pub reserved0: u8,
    pub phy_identifier: u8,
    pub reserved1: [u8; 2],
    pub attached_device_type: u8,
    /// Low nibble: negotiated logical link rate.
    pub negotiated_link_rate: u8,
    pub flags: [u8; 2],
    pub sas_address: U64BE,
    pub attached_sas_address: U64BE,
    pub attached_phy_identifier: u8,
    pub reserved2: [u8; 7],
    /// High nibble programmed, low nibble hardware minimum link rate.
    pub min_link_rate: u8,
    /// High nibble programmed, low nibble hardware maximum link rate.
    pub max_link_rate: u8,
    pub reserved3: [u8; 14],
}

static_assertions::assert_eq_size!(SasPhyModeDescriptor, [u8; 48]);

/// SAS phy subpage: descriptors start at byte 8; the phy count is at
/// byte 7.
pub const SAS_PHY_COUNT_OFFSET: usize = 7;
pub const SAS_PHY_DESCRIPTORS_OFFSET: usize = 8;

/// SAS link rate nibble to gigabits per second.
pub fn sas_link_rate_gbps(nibble: u8) -> Option<f64> {
    match nibble {
        0x8 => Some(1.5),
        0x9 => Some(3.0),
        0xA => Some(6.0),
        0xB => Some(12.0),
        0xC => Some(22.5),
        _ => None,
    }
}

// Log pages.

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct LogSenseCdb {
    pub operation_code: ScsiOp,
    pub flags1: u8,
    pub page: LogSensePageControl,
    pub subpage_code: u8,
    pub reserved: u8,
    pub parameter_pointer: U16BE,
    pub allocation_length: U16BE,
    pub control: u8,
}

static_assertions::assert_eq_size!(LogSenseCdb, [u8; 10]);

#[bitfield(u8)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct LogSensePageControl {
    #[bits(6)]
    pub page_code: u8,
    #[bits(2)]
    pub pc: u8,
}

/// Page control: cumulative values.
pub const LOG_PC_CUMULATIVE: u8 = 0x01;

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct LogPageHeader {
    /// Bits 5:0 page code, bit 6 SPF, bit 7 DS.
    pub page_code: u8,
    pub subpage_code: u8,
    pub page_length: U16BE,
}

impl LogPageHeader {
    pub fn code(&self) -> u8 {
        self.page_code & 0x3F
    }

    pub fn subpages_supported(&self) -> bool {
        self.page_code & 0x40 != 0
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct LogParameterHeader {
    pub parameter_code: U16BE,
    pub control: u8,
    pub parameter_length: u8,
}

pub const LOG_PAGE_SUPPORTED_PAGES: u8 = 0x00;
pub const LOG_PAGE_WRITE_ERROR_COUNTERS: u8 = 0x02;
pub const LOG_PAGE_READ_ERROR_COUNTERS: u8 = 0x03;
pub const LOG_PAGE_TEMPERATURE: u8 = 0x0D;
pub const LOG_PAGE_START_STOP_CYCLE: u8 = 0x0E;
pub const LOG_PAGE_UTILIZATION: u8 = 0x0E;
pub const LOG_PAGE_SELF_TEST_RESULTS: u8 = 0x10;
pub const LOG_PAGE_SOLID_STATE_MEDIA: u8 = 0x11;
pub const LOG_PAGE_BACKGROUND_SCAN: u8 = 0x15;
pub const LOG_PAGE_GENERAL_STATISTICS: u8 = 0x19;
pub const LOG_PAGE_INFORMATIONAL_EXCEPTIONS: u8 = 0x2F;
pub const LOG_PAGE_FARM: u8 = 0x3D;

pub const LOG_SUBPAGE_SUPPORTED_SUBPAGES: u8 = 0xFF;
pub const LOG_SUBPAGE_ENVIRONMENTAL: u8 = 0x01;
pub const LOG_SUBPAGE_UTILIZATION: u8 = 0x01;
pub const LOG_SUBPAGE_PENDING_DEFECTS: u8 = 0x01;
pub const LOG_SUBPAGE_FARM: u8 = 0x03;

/// Error counter pages: parameter code 5 is total bytes processed.
pub const LOG_PARAM_TOTAL_BYTES_PROCESSED: u16 = 0x0005;

/// Environmental reporting (0x0D/0x01) temperature triad parameter is
/// code 0; humidity triad is code 0x0100. 0xFF means not reported.
pub const LOG_PARAM_ENV_TEMPERATURE: u16 = 0x0000;
pub const LOG_PARAM_ENV_HUMIDITY: u16 = 0x0100;
pub const ENV_NOT_REPORTED: u8 = 0xFF;

/// Background scan (0x15 subpage 0) result parameter codes.
pub const LOG_PARAM_BG_SCAN_STATUS: u16 = 0x0000;
pub const LOG_PARAM_BG_SCAN_FIRST: u16 = 0x0001;
pub const LOG_PARAM_BG_SCAN_LAST: u16 = 0x0800;

/// Pending defects (0x15 subpage 1): parameter 0 is the count, entries
/// run through 0xF000.
pub const LOG_PARAM_PENDING_DEFECT_COUNT: u16 = 0x0000;
pub const LOG_PARAM_PENDING_DEFECT_LAST: u16 = 0xF000;

// Read capacity.

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ReadCapacityData {
    pub logical_block_address: U32BE,
    pub bytes_per_block: U32BE,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ServiceActionIn16 {
    pub operation_code: ScsiOp,
    pub service_action: u8,
    pub logical_block: U64BE,
    pub allocation_length: U32BE,
    pub flags: u8,
    pub control: u8,
}

static_assertions::assert_eq_size!(ServiceActionIn16, [u8; 16]);

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ReadCapacity16Data {
    pub logical_block_address: U64BE,
    pub bytes_per_block: U32BE,
    /*
    UCHAR ProtectionEnable : 1;
    UCHAR ProtectionType : 3;
    UCHAR RcBasis  : 2;
    UCHAR Reserved : 2;
    */
    pub protection_flags: u8,
    /*
    UCHAR LogicalPerPhysicalExponent : 4;
    UCHAR ProtectionInfoExponent : 4;
     */
    pub exponents: u8,
    /*
    UCHAR LowestAlignedBlock_MSB : 6;
    UCHAR LBPRZ : 1;
    UCHAR LBPME : 1;
     */
    pub lowest_aligned_block_msb: u8,
    pub lowest_aligned_block_lsb: u8,
    pub reserved: [u8; 16],
}

static_assertions::assert_eq_size!(ReadCapacity16Data, [u8; 32]);

impl ReadCapacity16Data {
    pub fn protection_enabled(&self) -> bool {
        self.protection_flags & 0x01 != 0
    }

    pub fn protection_type(&self) -> u8 {
        (self.protection_flags >> 1) & 0x7
    }

    pub fn logical_per_physical_exponent(&self) -> u8 {
        self.exponents & 0x0F
    }

    pub fn lowest_aligned_block(&self) -> u16 {
        u16::from_be_bytes([self.lowest_aligned_block_msb & 0x3F, self.lowest_aligned_block_lsb])
    }
}

// Data transfer CDBs, used for the post-injection read.

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct Cdb10 {
    pub operation_code: ScsiOp,
    pub flags: CdbFlags,
    pub logical_block: U32BE,
    pub reserved2: u8,
    pub transfer_blocks: U16BE,
    pub control: u8,
}

static_assertions::assert_eq_size!(Cdb10, [u8; 10]);

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct Cdb16 {
    pub operation_code: ScsiOp,
    pub flags: CdbFlags,
    pub logical_block: U64BE,
    pub transfer_blocks: U32BE,
    pub reserved2: u8,
    pub control: u8,
}

static_assertions::assert_eq_size!(Cdb16, [u8; 16]);

#[bitfield(u8)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct CdbFlags {
    pub relative_address: bool,
    #[bits(2)]
    pub reserved1: u8,
    pub fua: bool,
    pub disable_page_out: bool,
    #[bits(3)]
    pub protection: u8,
}

// Defect lists.

open_enum! {
    pub enum DefectListFormat: u8 {
        SHORT_BLOCK = 0x0,
        EXTENDED_BYTES_FROM_INDEX = 0x1,
        EXTENDED_PHYSICAL_SECTOR = 0x2,
        LONG_BLOCK = 0x3,
        BYTES_FROM_INDEX = 0x4,
        PHYSICAL_SECTOR = 0x5,
        VENDOR_SPECIFIC = 0x6,
        RESERVED = 0x7,
    }
}

impl DefectListFormat {
    /// Bytes per address descriptor; `None` for the vendor-specific and
    /// reserved formats.
    pub fn descriptor_size(&self) -> Option<usize> {
        match *self {
            DefectListFormat::SHORT_BLOCK => Some(4),
            DefectListFormat::EXTENDED_BYTES_FROM_INDEX
            | DefectListFormat::EXTENDED_PHYSICAL_SECTOR
            | DefectListFormat::LONG_BLOCK
            | DefectListFormat::BYTES_FROM_INDEX
            | DefectListFormat::PHYSICAL_SECTOR => Some(8),
            _ => None,
        }
    }
}

#[bitfield(u8)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct DefectListFlags {
    #[bits(3)]
    pub format: u8,
    pub grown: bool,
    pub primary: bool,
    #[bits(3)]
    pub reserved: u8,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ReadDefectData10Cdb {
    pub operation_code: ScsiOp,
    pub reserved1: u8,
    pub flags: DefectListFlags,
    pub reserved2: [u8; 4],
    pub allocation_length: U16BE,
    pub control: u8,
}

static_assertions::assert_eq_size!(ReadDefectData10Cdb, [u8; 10]);

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ReadDefectData12Cdb {
    pub operation_code: ScsiOp,
    pub flags: DefectListFlags,
    pub address_descriptor_index: U32BE,
    pub allocation_length: U32BE,
    pub reserved: u8,
    pub control: u8,
}

static_assertions::assert_eq_size!(ReadDefectData12Cdb, [u8; 12]);

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct DefectListHeader10 {
    pub reserved: u8,
    pub flags: DefectListFlags,
    pub defect_list_length: U16BE,
}

static_assertions::assert_eq_size!(DefectListHeader10, [u8; 4]);

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct DefectListHeader12 {
    pub reserved: u8,
    pub flags: DefectListFlags,
    pub reserved2: [u8; 2],
    pub defect_list_length: U32BE,
}

static_assertions::assert_eq_size!(DefectListHeader12, [u8; 8]);

/// Maximum data length addressable by the 10- and 12-byte commands.
pub const DEFECT_DATA10_MAX_LENGTH: u32 = 0xFFFF;
pub const DEFECT_DATA12_MAX_LENGTH: u32 = 0xFFFF_FFFF;

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ShortBlockDescriptor {
    pub block_address: U32BE,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct LongBlockDescriptor {
    pub block_address: U64BE,
}

/// Bytes-from-index and physical-sector address descriptors share this
/// shape; `value` is bytes-from-index or the sector number.
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct PhysicalAddressDescriptor {
    pub cylinder: [u8; 3],
    pub head: u8,
    pub value: U32BE,
}

static_assertions::assert_eq_size!(PhysicalAddressDescriptor, [u8; 8]);

impl PhysicalAddressDescriptor {
    pub fn cylinder_number(&self) -> u32 {
        let c = &self.cylinder;
        u32::from_be_bytes([0, c[0], c[1], c[2]])
    }

    /// In the extended formats, bit 7 of byte 4 marks a descriptor that
    /// continues the previous physical defect.
    pub fn multi_address_start(&self) -> bool {
        self.value.get() & 0x8000_0000 != 0
    }

    pub fn address_value(&self) -> u32 {
        self.value.get() & 0x0FFF_FFFF
    }
}

/// A bytes-from-index or sector value of 2^28 - 1 means the whole
/// track is defective.
pub const DEFECT_FULL_TRACK: u32 = 0x0FFF_FFFF;

// Reads.

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct Read16Cdb {
    pub operation_code: ScsiOp,
    pub flags: u8,
    pub logical_block: U64BE,
    pub transfer_length: U32BE,
    pub group: u8,
    pub control: u8,
}

static_assertions::assert_eq_size!(Read16Cdb, [u8; 16]);

// Long-sector access.

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ReadLong10Cdb {
    pub operation_code: ScsiOp,
    /// Bit 1 CORRCT.
    pub flags: u8,
    pub logical_block: U32BE,
    pub reserved: u8,
    pub byte_transfer_length: U16BE,
    pub control: u8,
}

static_assertions::assert_eq_size!(ReadLong10Cdb, [u8; 10]);

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ReadLong16Cdb {
    pub operation_code: ScsiOp,
    /// Bits 4:0 service action (11h).
    pub service_action: u8,
    pub logical_block: U64BE,
    pub reserved: [u8; 2],
    pub byte_transfer_length: U16BE,
    /// Bit 0 CORRCT.
    pub flags: u8,
    pub control: u8,
}

static_assertions::assert_eq_size!(ReadLong16Cdb, [u8; 16]);

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct WriteLong10Cdb {
    pub operation_code: ScsiOp,
    pub flags: WriteLongFlags,
    pub logical_block: U32BE,
    pub reserved: u8,
    pub byte_transfer_length: U16BE,
    pub control: u8,
}

static_assertions::assert_eq_size!(WriteLong10Cdb, [u8; 10]);

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct WriteLong16Cdb {
    pub operation_code: ScsiOp,
    /// Bits 4:0 service action (11h), bits 7:5 the WriteLongFlags bits.
    pub service_action_flags: u8,
    pub logical_block: U64BE,
    pub reserved: [u8; 2],
    pub byte_transfer_length: U16BE,
    pub reserved2: u8,
    pub control: u8,
}

static_assertions::assert_eq_size!(WriteLong16Cdb, [u8; 16]);

#[bitfield(u8)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct WriteLongFlags {
    #[bits(5)]
    pub reserved: u8,
    /// Write the block as a physical block.
    pub pblock: bool,
    /// Mark the block pseudo-uncorrectable without transferring data.
    pub wr_uncor: bool,
    /// Disable error correction for the transfer.
    pub cor_dis: bool,
}

// Report supported operation codes (MAINTENANCE IN, A3h/0Ch).

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ReportSupportedOpCodesCdb {
    pub operation_code: ScsiOp,
    pub service_action: u8,
    /// Bits 2:0 reporting options, bit 7 RCTD.
    pub reporting_options: u8,
    pub requested_operation_code: u8,
    pub requested_service_action: U16BE,
    pub allocation_length: U32BE,
    pub reserved: u8,
    pub control: u8,
}

static_assertions::assert_eq_size!(ReportSupportedOpCodesCdb, [u8; 12]);

pub const REPORT_OPTIONS_ONE_COMMAND: u8 = 0x01;
pub const REPORT_OPTIONS_ONE_COMMAND_WITH_SA: u8 = 0x02;

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct OneCommandParameterData {
    pub reserved: u8,
    /// Bits 2:0 support, bit 7 CTDP.
    pub support: u8,
    pub cdb_size: U16BE,
    // cdb_size bytes of usage data follow.
}

impl OneCommandParameterData {
    pub fn support_value(&self) -> u8 {
        self.support & 0x7
    }
}

pub const OP_SUPPORT_UNKNOWN: u8 = 0x0;
pub const OP_SUPPORT_NONE: u8 = 0x1;
pub const OP_SUPPORT_STANDARD: u8 = 0x3;
pub const OP_SUPPORT_VENDOR: u8 = 0x5;

// Security protocol.

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct SecurityProtocolInCdb {
    pub operation_code: ScsiOp,
    pub security_protocol: u8,
    pub security_protocol_specific: U16BE,
    /// Bit 7 INC_512.
    pub flags: u8,
    pub reserved: u8,
    pub allocation_length: U32BE,
    pub reserved2: u8,
    pub control: u8,
}

static_assertions::assert_eq_size!(SecurityProtocolInCdb, [u8; 12]);

pub const SECURITY_PROTOCOL_INFORMATION: u8 = 0x00;
pub const SECURITY_PROTOCOL_TCG_MIN: u8 = 0x01;
pub const SECURITY_PROTOCOL_TCG_MAX: u8 = 0x06;
pub const SECURITY_PROTOCOL_IEEE1667: u8 = 0xEE;
pub const SECURITY_PROTOCOL_ATA_PASSWORD: u8 = 0xEF;

/// Security protocol 0 response: supported protocol list.
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct SupportedSecurityProtocolsHeader {
    pub reserved: [u8; 6],
    pub list_length: U16BE,
    // list_length protocol bytes follow.
}

// Firmware download (WRITE BUFFER).

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct WriteBufferCdb {
    pub operation_code: ScsiOp,
    /// Bits 4:0 mode, bits 7:5 mode specific.
    pub mode: u8,
    pub buffer_id: u8,
    pub buffer_offset: [u8; 3],
    pub parameter_list_length: [u8; 3],
    pub control: u8,
}

static_assertions::assert_eq_size!(WriteBufferCdb, [u8; 10]);

pub const BUFFER_MODE_DOWNLOAD_SAVE: u8 = 0x05;
pub const BUFFER_MODE_DOWNLOAD_OFFSETS_SAVE: u8 = 0x07;
pub const BUFFER_MODE_DOWNLOAD_OFFSETS_DEFER_SELECT_ACTIVATION: u8 = 0x0D;
pub const BUFFER_MODE_DOWNLOAD_OFFSETS_DEFER: u8 = 0x0E;
pub const BUFFER_MODE_ACTIVATE_DEFERRED: u8 = 0x0F;

// Diagnostic pages.

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ReceiveDiagnosticCdb {
    pub operation_code: ScsiOp,
    /// Bit 0 PCV.
    pub flags: u8,
    pub page_code: u8,
    pub allocation_length: U16BE,
    pub control: u8,
}

static_assertions::assert_eq_size!(ReceiveDiagnosticCdb, [u8; 6]);

#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct DiagnosticPageHeader {
    pub page_code: u8,
    pub reserved: u8,
    pub page_length: U16BE,
}

pub const DIAGNOSTIC_PAGE_SUPPORTED: u8 = 0x00;
