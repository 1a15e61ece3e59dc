// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The normalized device record produced by discovery.
//!
//! Every field is optional or defaulted: a page the device refuses to
//! serve leaves its fields untouched and discovery carries on.

/// Root record, produced once per discovery and immutable afterwards.
#[derive(Debug, Default, Clone)]
pub struct DeviceInformation {
    pub identity: Identity,
    pub geometry: Geometry,
    pub health: Health,
    pub features: FeatureSet,
    pub fwdl: FirmwareCapabilities,
    pub last_self_test: Option<LastSelfTest>,
    pub adapter: Option<AdapterInfo>,
    pub security: Security,
    pub inject: InjectionCapabilities,
    /// Ordered list of standard names, e.g. "ACS-4", "SPC-5",
    /// "SATA 3.3".
    pub specifications: Vec<String>,
    /// Rotation rate: 1 = solid state, otherwise RPM.
    pub rotation_rate: Option<u16>,
    pub form_factor: Option<FormFactor>,
    pub zoned: Zoned,
    /// Negotiated interface speed in Gb/s, where the transport reports
    /// one.
    pub interface_speed_gbps: Option<f64>,
    /// Parallel ATA transfer mode, when the device is PATA.
    pub parallel_mode: Option<String>,
    /// Number of concurrent positioning ranges (actuators), when
    /// reported.
    pub positioning_ranges: Option<u32>,
    /// Command queue depth.
    pub queue_depth: Option<u8>,
    /// Nominal buffer (cache) size in bytes.
    pub buffer_size: Option<u64>,
    /// Mode parameter header device-specific byte reported the medium
    /// write protected.
    pub write_protected: bool,
    /// Method of reporting informational exceptions, low nibble of mode
    /// page 0x1C byte 3.
    pub mrie_mode: Option<u8>,
    /// Read Capacity failed with `medium_error(0x31, 0x00)`; sector
    /// sizes are suppressed and the sentinel feature string is present.
    pub format_corrupt: bool,
    /// The device natively speaks ATA behind a SCSI translation layer.
    pub ata_behind_sat: bool,
    /// The device natively speaks NVMe behind a SCSI translation layer.
    pub nvme_behind_scsi: bool,
}

impl DeviceInformation {
    pub fn is_ssd(&self) -> bool {
        self.rotation_rate == Some(1)
    }
}

#[derive(Debug, Default, Clone)]
pub struct Identity {
    pub vendor: String,
    pub model: String,
    pub serial: String,
    pub firmware: String,
    pub wwn: Option<u64>,
    pub wwn_extension: Option<u64>,
    pub ieee_oui: Option<u32>,
    pub date_of_manufacture: Option<DateOfManufacture>,
    pub pcba_serial: Option<String>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DateOfManufacture {
    /// ISO week, 1-53.
    pub week: u8,
    pub year: u16,
}

#[derive(Debug, Default, Clone)]
pub struct Geometry {
    pub logical_sector_size: Option<u32>,
    pub physical_sector_size: Option<u32>,
    /// Highest addressable LBA. Protocols that report a block count are
    /// converted by subtracting one.
    pub max_lba: Option<u64>,
    pub chs: Option<Chs>,
    /// First logical sector of the first aligned physical sector.
    pub alignment_offset: Option<u32>,
    /// Bit 0 of the protection flags byte in Read Capacity (16).
    pub protection_enabled: bool,
    pub protection_type: u8,
}

impl Geometry {
    /// Logical blocks per physical block, defaulting to 1.
    pub fn logical_per_physical(&self) -> u32 {
        match (self.logical_sector_size, self.physical_sector_size) {
            (Some(l), Some(p)) if l > 0 && p >= l => p / l,
            _ => 1,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Chs {
    pub cylinders: u16,
    pub heads: u16,
    pub sectors: u16,
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Triad<T> {
    pub current: Option<T>,
    pub min: Option<T>,
    pub max: Option<T>,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum SmartStatus {
    Ok,
    Tripped,
    #[default]
    Unknown,
}

#[derive(Debug, Default, Clone)]
pub struct Health {
    /// Degrees Celsius.
    pub temperature: Triad<i16>,
    /// Relative humidity, percent.
    pub humidity: Triad<u8>,
    pub power_on_minutes: Option<u64>,
    /// 0.00 to 100.00; `None` when the device does not report wear.
    pub percent_endurance_used: Option<f64>,
    pub smart_status: SmartStatus,
    pub total_bytes_read: Option<u128>,
    pub total_bytes_written: Option<u128>,
    /// SSD only.
    pub total_writes_to_flash: Option<u128>,
    /// Drive-reported utilization as a fraction of the rated workload.
    pub utilization_rate: Option<f64>,
    /// Long (extended) self-test duration in minutes.
    pub long_self_test_minutes: Option<u32>,
}

/// The unified feature list. A feature appears at most once; adding an
/// enabled feature upgrades an existing supported-only entry.
#[derive(Debug, Default, Clone)]
pub struct FeatureSet {
    entries: Vec<FeatureEntry>,
}

#[derive(Debug, Clone)]
pub struct FeatureEntry {
    pub name: String,
    pub enabled: bool,
}

impl FeatureSet {
    /// Records a supported feature. Never downgrades an enabled entry.
    pub fn add(&mut self, name: &str) {
        if !self.entries.iter().any(|e| e.name == name) {
            self.entries.push(FeatureEntry {
                name: name.to_string(),
                enabled: false,
            });
        }
    }

    /// Records a feature with positively detected enablement.
    pub fn add_enabled(&mut self, name: &str) {
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.enabled = true,
            None => self.entries.push(FeatureEntry {
                name: name.to_string(),
                enabled: true,
            }),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name && e.enabled)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureEntry> {
        self.entries.iter()
    }

    /// Renders the list, appending " [Enabled]" where enablement was
    /// detected.
    pub fn render(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| {
                if e.enabled {
                    format!("{} [Enabled]", e.name)
                } else {
                    e.name.clone()
                }
            })
            .collect()
    }
}

/// Feature string injected when Read Capacity reports a corrupted
/// format.
pub const FORMAT_CORRUPT_FEATURE: &str = "Format Corrupt - not all features identifiable.";

/// Firmware download capabilities, normalized across transports.
#[derive(Debug, Default, Clone)]
pub struct FirmwareCapabilities {
    pub full: bool,
    pub segmented: bool,
    pub deferred: bool,
    /// SAS only: deferred download with a separate activate step.
    pub deferred_with_activate: bool,
    /// The DMA variant of DOWNLOAD MICROCODE is available.
    pub dma: bool,
    /// Activation requires a power cycle rather than a reset or
    /// in-band activation.
    pub power_cycle_required: bool,
    /// Segment bounds in 512-byte blocks.
    pub min_segment_blocks: Option<u32>,
    pub max_segment_blocks: Option<u32>,
    pub recommended_segment_blocks: Option<u32>,
    /// Required offset alignment as a power-of-two exponent of bytes.
    pub offset_exponent: Option<u8>,
    /// NVMe: number of firmware slots and the active slot.
    pub slots: Option<u8>,
    pub active_slot: Option<u8>,
    /// NVMe: slot 1 is read only.
    pub slot1_read_only: bool,
    /// NVMe: activation without reset supported.
    pub activate_without_reset: bool,
}

impl FirmwareCapabilities {
    pub fn any_supported(&self) -> bool {
        self.full || self.segmented || self.deferred || self.deferred_with_activate
    }
}

/// Capabilities consumed by the uncorrectable-sector injection ladder.
#[derive(Debug, Copy, Clone, Default)]
pub struct InjectionCapabilities {
    /// SCT read/write long (identify word 206 bit 1).
    pub ata_sct_read_write_long: bool,
    /// Legacy READ LONG / WRITE LONG, gated on an explicitly valid ECC
    /// byte count in identify word 22.
    pub ata_legacy_long: bool,
    pub ata_legacy_ecc_bytes: Option<u16>,
    /// WRITE UNCORRECTABLE EXT.
    pub ata_write_uncorrectable: bool,
    /// SCSI WRITE LONG with WR_UNCOR.
    pub scsi_write_uncorrectable: bool,
    /// The 16-byte READ LONG / WRITE LONG service actions.
    pub scsi_long16: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LastSelfTest {
    pub test_number: u8,
    pub result_code: u8,
    pub power_on_hours: u64,
    pub error_lba: Option<u64>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransportFamily {
    Ata,
    Scsi,
    Nvme,
    Usb,
    Ieee1394,
}

#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub transport: TransportFamily,
    pub vendor_id: u16,
    pub product_id: u16,
    pub revision: u16,
    /// IEEE 1394 specifier ID.
    pub specifier_id: Option<u32>,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Encryption {
    #[default]
    None,
    SelfEncrypting,
    FullDiskEncryption,
}

#[derive(Debug, Default, Clone)]
pub struct Security {
    /// Raw supported security protocol list, as reported.
    pub protocols: Vec<u8>,
    pub tcg: bool,
    pub ieee1667: bool,
    pub encryption: Encryption,
    pub ata: Option<AtaSecurity>,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct AtaSecurity {
    pub supported: bool,
    pub enabled: bool,
    pub locked: bool,
    pub frozen: bool,
    pub count_expired: bool,
    pub enhanced_erase_supported: bool,
    /// Master password capability: false = high, true = maximum.
    pub master_password_maximum: bool,
    pub master_password_id: Option<u16>,
    pub normal_erase_minutes: Option<u32>,
    pub enhanced_erase_minutes: Option<u32>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FormFactor {
    Inch5_25,
    Inch3_5,
    Inch2_5,
    Inch1_8,
    LessThan1_8,
    MSata,
    M2,
    MicroSsd,
    CFast,
}

impl FormFactor {
    pub fn from_ata_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            1 => Some(FormFactor::Inch5_25),
            2 => Some(FormFactor::Inch3_5),
            3 => Some(FormFactor::Inch2_5),
            4 => Some(FormFactor::Inch1_8),
            5 => Some(FormFactor::LessThan1_8),
            6 => Some(FormFactor::MSata),
            7 => Some(FormFactor::M2),
            8 => Some(FormFactor::MicroSsd),
            9 => Some(FormFactor::CFast),
            _ => None,
        }
    }

    /// SCSI block device characteristics VPD uses the same encoding
    /// starting at 1 = 5.25".
    pub fn from_scsi_nibble(nibble: u8) -> Option<Self> {
        Self::from_ata_nibble(nibble)
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Zoned {
    #[default]
    None,
    HostAware,
    DeviceManaged,
    HostManaged,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_set_dedup_and_upgrade() {
        let mut features = FeatureSet::default();
        features.add("SMART");
        features.add("SMART");
        features.add_enabled("SMART");
        features.add("SMART");
        assert_eq!(features.render(), vec!["SMART [Enabled]".to_string()]);

        features.add_enabled("Write Cache");
        assert!(features.is_enabled("Write Cache"));
        assert_eq!(features.iter().count(), 2);
    }

    #[test]
    fn logical_per_physical_default() {
        let mut geometry = Geometry::default();
        assert_eq!(geometry.logical_per_physical(), 1);
        geometry.logical_sector_size = Some(512);
        geometry.physical_sector_size = Some(4096);
        assert_eq!(geometry.logical_per_physical(), 8);
    }
}
