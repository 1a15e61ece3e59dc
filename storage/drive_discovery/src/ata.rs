// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! ATA IDENTIFY DEVICE decoding.

use crate::info::AtaSecurity;
use crate::info::Chs;
use crate::info::DeviceInformation;
use crate::info::FormFactor;
use ata_spec::erase_time_minutes;
use ata_spec::sata_negotiated_speed_gbps;
use ata_spec::word_valid;
use ata_spec::word_valid_bits_14_15;
use ata_spec::AdditionalSupported;
use ata_spec::Commands1;
use ata_spec::Commands2;
use ata_spec::Commands3;
use ata_spec::Commands4;
use ata_spec::IdentifyDevice;
use ata_spec::ParallelMode;
use ata_spec::SctCommandTransport;
use ata_spec::SectorSizeConfig;
use ata_spec::SecurityStatus;
use ata_spec::TransportType;
use storage_string::ata_string;
use storage_string::clamp;

/// Populates identity, geometry, features, and security state from a
/// 512-byte identify payload.
pub(crate) fn decode_identify(id: &IdentifyDevice, info: &mut DeviceInformation) {
    decode_strings(id, info);
    decode_geometry(id, info);
    decode_transport(id, info);
    decode_features(id, info);
    decode_security(id, info);
    decode_specifications(id, info);
}

fn decode_strings(id: &IdentifyDevice, info: &mut DeviceInformation) {
    info.identity.serial = clamp(&ata_string(&id.serial_number), 20).to_string();
    info.identity.firmware = clamp(&ata_string(&id.firmware_revision), 8).to_string();
    info.identity.model = clamp(&ata_string(&id.model_number), 40).to_string();
}

fn decode_geometry(id: &IdentifyDevice, info: &mut DeviceInformation) {
    if word_valid(id.cylinders) && word_valid(id.heads) && word_valid(id.sectors_per_track) {
        info.geometry.chs = Some(Chs {
            cylinders: id.cylinders,
            heads: id.heads,
            sectors: id.sectors_per_track,
        });
    }

    // Capacity ladder: 28-bit count, then the 48-bit field, then the
    // extended 64-bit field when word 69 advertises it.
    let commands2 = Commands2::from(id.commands2_supported);
    let additional = AdditionalSupported::from(id.additional_supported);
    let mut sectors = id.user_addressable_sectors.get() as u64;
    if sectors >= 0x0FFF_FFFF
        && word_valid_bits_14_15(id.commands2_supported)
        && commands2.lba48()
        && id.max_48bit_lba.get() != 0
    {
        sectors = id.max_48bit_lba.get();
    }
    if word_valid(id.additional_supported)
        && additional.extended_user_sectors()
        && id.extended_user_sectors.get() != 0
    {
        sectors = id.extended_user_sectors.get();
    }
    if sectors != 0 {
        info.geometry.max_lba = Some(sectors - 1);
    }

    let config = SectorSizeConfig::from(id.sector_size_config);
    if config.is_valid() {
        let logical = if config.logical_over_512() {
            // Words 117-118 count 16-bit words.
            id.logical_sector_size.get().saturating_mul(2)
        } else {
            512
        };
        let physical = if config.multiple_logical_per_physical() {
            logical << config.logical_per_physical_exp()
        } else {
            logical
        };
        info.geometry.logical_sector_size = Some(logical);
        info.geometry.physical_sector_size = Some(physical);

        // Word 209: logical sector offset within the first physical
        // sector, valid under the bits 15:14 = 01 rule.
        if word_valid_bits_14_15(id.alignment) {
            info.geometry.alignment_offset = Some(u32::from(id.alignment & 0x3FFF));
        }
    } else {
        info.geometry.logical_sector_size = Some(512);
        info.geometry.physical_sector_size = Some(512);
    }

    if word_valid(id.rotation_rate) {
        info.rotation_rate = Some(id.rotation_rate);
    }

    if word_valid(id.queue_depth) {
        info.queue_depth = Some((id.queue_depth & 0x1F) as u8 + 1);
    }

    let ff = ata_spec::FormFactor((id.form_factor & 0xF) as u8);
    if ff != ata_spec::FormFactor::NOT_REPORTED {
        info.form_factor = FormFactor::from_ata_nibble(ff.0);
    }
}

fn decode_transport(id: &IdentifyDevice, info: &mut DeviceInformation) {
    let transport = if word_valid(id.transport_major_version) {
        TransportType((id.transport_major_version >> 12) as u8)
    } else if word_valid(id.sata_capabilities) {
        // Old SATA devices leave word 222 blank.
        TransportType::SERIAL
    } else {
        TransportType::PARALLEL
    };

    match transport {
        TransportType::SERIAL => {
            if word_valid(id.sata_additional) {
                info.interface_speed_gbps = sata_negotiated_speed_gbps(id.sata_additional);
            }
            if word_valid(id.transport_major_version) {
                decode_sata_versions(id.transport_major_version, info);
            }
        }
        TransportType::PARALLEL => {
            if let Some(mode) = classify_parallel_mode(id) {
                info.parallel_mode = Some(mode.name());
                info.interface_speed_gbps = Some(mode.mb_per_s() * 8.0 / 1000.0);
            }
        }
        _ => {}
    }
}

/// Word 222 low bits advertise the SATA versions the device complies
/// with.
fn decode_sata_versions(word222: u16, info: &mut DeviceInformation) {
    const VERSIONS: [(u16, &str); 10] = [
        (1 << 1, "SATA 1.0a"),
        (1 << 2, "SATA II Extensions"),
        (1 << 3, "SATA 2.5"),
        (1 << 4, "SATA 2.6"),
        (1 << 5, "SATA 3.0"),
        (1 << 6, "SATA 3.1"),
        (1 << 7, "SATA 3.2"),
        (1 << 8, "SATA 3.3"),
        (1 << 9, "SATA 3.4"),
        (1 << 10, "SATA 3.5"),
    ];
    for (bit, name) in VERSIONS {
        if word222 & bit != 0 {
            info.specifications.push(name.to_string());
        }
    }
}

/// The legacy cycle-time ladder: highest selected UDMA mode, else
/// multiword DMA, else single-word DMA, else the best PIO mode the
/// timing words support.
fn classify_parallel_mode(id: &IdentifyDevice) -> Option<ParallelMode> {
    fn highest_bit(byte: u8) -> Option<u8> {
        (byte != 0).then(|| 7 - byte.leading_zeros() as u8)
    }

    if word_valid(id.udma_modes) {
        if let Some(mode) = highest_bit((id.udma_modes >> 8) as u8) {
            return Some(ParallelMode::Ultra(mode));
        }
    }
    if word_valid(id.multiword_dma) {
        if let Some(mode) = highest_bit((id.multiword_dma >> 8) as u8) {
            return Some(ParallelMode::MultiWordDma(mode));
        }
    }
    if word_valid(id.single_word_dma) {
        if let Some(mode) = highest_bit((id.single_word_dma >> 8) as u8) {
            return Some(ParallelMode::SingleWordDma(mode));
        }
    }
    // Word 64 bits 1:0 advertise PIO 3 and 4; words 67/68 give the
    // cycle time floor for older devices.
    if word_valid(id.pio_modes_supported) {
        if id.pio_modes_supported & 0x2 != 0 {
            return Some(ParallelMode::Pio(4));
        }
        if id.pio_modes_supported & 0x1 != 0 {
            return Some(ParallelMode::Pio(3));
        }
    }
    if word_valid(id.min_pio_cycle_time) {
        let mode = match id.min_pio_cycle_time {
            0..=120 => 4,
            121..=180 => 3,
            181..=240 => 2,
            241..=383 => 1,
            _ => 0,
        };
        return Some(ParallelMode::Pio(mode));
    }
    if word_valid(id.pio_cycle_time) {
        // Word 51 high byte is the legacy PIO timing mode, 0 through 2.
        return Some(ParallelMode::Pio(((id.pio_cycle_time >> 8) as u8).min(2)));
    }
    None
}

fn decode_features(id: &IdentifyDevice, info: &mut DeviceInformation) {
    let w82 = word_valid(id.commands1_supported).then(|| Commands1::from(id.commands1_supported));
    let w85 = word_valid(id.commands1_enabled).then(|| Commands1::from(id.commands1_enabled));
    let w83 = word_valid_bits_14_15(id.commands2_supported)
        .then(|| Commands2::from(id.commands2_supported));
    let w86 = word_valid_bits_14_15(id.commands2_enabled)
        .then(|| Commands2::from(id.commands2_enabled));
    let w84 = word_valid_bits_14_15(id.commands3_supported)
        .then(|| Commands3::from(id.commands3_supported));
    let w119 = word_valid_bits_14_15(id.commands4_supported)
        .then(|| Commands4::from(id.commands4_supported));
    let w120 = word_valid_bits_14_15(id.commands4_enabled)
        .then(|| Commands4::from(id.commands4_enabled));

    let supported = |f: fn(&Commands1) -> bool| w82.as_ref().is_some_and(f);
    let enabled = |f: fn(&Commands1) -> bool| w85.as_ref().is_some_and(f);

    if supported(|w| w.smart()) {
        if enabled(|w| w.smart()) {
            info.features.add_enabled("SMART");
        } else {
            info.features.add("SMART");
        }
    }
    if supported(|w| w.write_cache()) {
        if enabled(|w| w.write_cache()) {
            info.features.add_enabled("Write Cache");
        } else {
            info.features.add("Write Cache");
        }
    }
    if supported(|w| w.look_ahead()) {
        if enabled(|w| w.look_ahead()) {
            info.features.add_enabled("Read Look-Ahead");
        } else {
            info.features.add("Read Look-Ahead");
        }
    }
    if supported(|w| w.hpa()) {
        info.features.add("HPA");
    }

    if let Some(w83) = &w83 {
        if w83.download_microcode() {
            info.fwdl.full = true;
            info.features.add("Firmware Download");
        }
        if w83.apm() {
            if w86.as_ref().is_some_and(|w| w.apm()) {
                info.features.add_enabled("APM");
            } else {
                info.features.add("APM");
            }
        }
        if w83.puis() {
            if w86.as_ref().is_some_and(|w| w.puis()) {
                info.features.add_enabled("PUIS");
            } else {
                info.features.add("PUIS");
            }
        }
    }

    if let Some(w84) = &w84 {
        if w84.gpl() {
            info.features.add("GPL");
        }
        if w84.smart_self_test() {
            info.features.add("Self-Test");
        }
        if w84.smart_error_logging() {
            info.features.add("SMART Error Logging");
        }
        if w84.wwn_64bit() {
            let w = &id.world_wide_name;
            let wwn = (w[0] as u64) << 48 | (w[1] as u64) << 32 | (w[2] as u64) << 16 | w[3] as u64;
            if wwn != 0 {
                info.identity.wwn = Some(wwn);
                // NAA 5: 4-bit NAA, 24-bit OUI, 36-bit vendor sequence.
                info.identity.ieee_oui = Some(((wwn >> 36) & 0xFF_FFFF) as u32);
            }
        }
    }

    if let Some(w119) = &w119 {
        if w119.write_uncorrectable() {
            info.inject.ata_write_uncorrectable = true;
        }
        if w119.download_microcode_mode3() {
            info.fwdl.segmented = true;
        }
        if w119.epc() {
            if w120.as_ref().is_some_and(|w| w.epc()) {
                info.features.add_enabled("EPC");
            } else {
                info.features.add("EPC");
            }
        }
        if w119.free_fall_control() {
            info.features.add("Free-Fall Control");
        }
        if w119.sense_data_reporting() {
            info.features.add("Sense Data Reporting");
        }
        if w119.dsn() {
            info.features.add("DSN");
        }
        if w119.write_read_verify() {
            info.features.add("Write-Read-Verify");
        }
    }

    if word_valid(id.additional_supported) {
        let additional = AdditionalSupported::from(id.additional_supported);
        if additional.download_microcode_dma() {
            info.fwdl.dma = true;
        }
        if word_valid(id.data_set_management) && id.data_set_management & 0x1 != 0 {
            info.features.add("TRIM");
            if additional.deterministic_trim() {
                info.features.add("Deterministic Read After TRIM");
            }
            if additional.zeroes_after_trim() {
                info.features.add("Read Zeros After TRIM");
            }
        }
    } else if word_valid(id.data_set_management) && id.data_set_management & 0x1 != 0 {
        info.features.add("TRIM");
    }

    if word_valid(id.sct_command_transport) {
        let sct = SctCommandTransport::from(id.sct_command_transport);
        if sct.supported() {
            info.features.add("SCT Command Transport");
        }
        if sct.read_write_long() {
            info.inject.ata_sct_read_write_long = true;
            info.features.add("SCT Read/Write Long");
        }
        if sct.write_same() {
            info.features.add("SCT Write Same");
        }
        if sct.error_recovery_control() {
            info.features.add("SCT Error Recovery Control");
        }
        if sct.feature_control() {
            info.features.add("SCT Feature Control");
        }
        if sct.data_tables() {
            info.features.add("SCT Data Tables");
        }
    }

    // Word 22 doubles as the legacy READ/WRITE LONG indicator. The
    // all-ones pattern is also the invalid-word sentinel, so only an
    // explicitly valid count enables the legacy path.
    if word_valid(id.obsolete_ecc_bytes) {
        info.inject.ata_legacy_long = true;
        info.inject.ata_legacy_ecc_bytes = Some(id.obsolete_ecc_bytes);
    }

    // Firmware segment bounds, words 234-235, in 512-byte blocks.
    if word_valid(id.min_microcode_blocks) {
        info.fwdl.min_segment_blocks = Some(u32::from(id.min_microcode_blocks));
    }
    if word_valid(id.max_microcode_blocks) {
        info.fwdl.max_segment_blocks = Some(u32::from(id.max_microcode_blocks));
    }
}

fn decode_security(id: &IdentifyDevice, info: &mut DeviceInformation) {
    let supported = word_valid(id.commands1_supported)
        && Commands1::from(id.commands1_supported).security();
    if !supported && !word_valid(id.security_status) {
        return;
    }

    let status = SecurityStatus::from(id.security_status);
    let security = AtaSecurity {
        supported: supported || status.supported(),
        enabled: status.enabled(),
        locked: status.locked(),
        frozen: status.frozen(),
        count_expired: status.count_expired(),
        enhanced_erase_supported: status.enhanced_erase_supported(),
        master_password_maximum: status.master_password_maximum(),
        master_password_id: word_valid(id.master_password_id).then_some(id.master_password_id),
        normal_erase_minutes: erase_time_minutes(id.normal_erase_time),
        enhanced_erase_minutes: erase_time_minutes(id.enhanced_erase_time),
    };
    if security.supported {
        if security.enabled {
            info.features.add_enabled("ATA Security");
        } else {
            info.features.add("ATA Security");
        }
        info.security.ata = Some(security);
    }

    // Word 48 bit 0: Trusted Computing feature set.
    if word_valid(id.trusted_computing) && id.trusted_computing & 0x1 != 0 {
        info.features.add("Trusted Computing");
    }
}

fn decode_specifications(id: &IdentifyDevice, info: &mut DeviceInformation) {
    if word_valid(id.major_version) {
        const MAJORS: [(u16, &str); 9] = [
            (ata_spec::MAJOR_ATA4, "ATA/ATAPI-4"),
            (ata_spec::MAJOR_ATA5, "ATA/ATAPI-5"),
            (ata_spec::MAJOR_ATA6, "ATA/ATAPI-6"),
            (ata_spec::MAJOR_ATA7, "ATA/ATAPI-7"),
            (ata_spec::MAJOR_ATA8_ACS, "ATA8-ACS"),
            (ata_spec::MAJOR_ACS2, "ACS-2"),
            (ata_spec::MAJOR_ACS3, "ACS-3"),
            (ata_spec::MAJOR_ACS4, "ACS-4"),
            (ata_spec::MAJOR_ACS5, "ACS-5"),
        ];
        for (bit, name) in MAJORS {
            if id.major_version & bit != 0 {
                info.specifications.push(name.to_string());
            }
        }
    }

    if word_valid(id.minor_version) {
        if let Some(name) = minor_version_name(id.minor_version) {
            info.specifications.push(name.to_string());
        }
    }
}

/// Word 81 minor revision table.
fn minor_version_name(minor: u16) -> Option<&'static str> {
    Some(match minor {
        0x0001 => "ATA-1 prior to rev 4",
        0x0002 => "ATA-1 published",
        0x0003 => "ATA-1 rev 4",
        0x0004 => "ATA-2 published",
        0x0005 => "ATA-2 prior to rev 2k",
        0x0006 => "ATA-3 rev 1",
        0x0007 => "ATA-2 rev 2k",
        0x0008 => "ATA-3 rev 0",
        0x0009 => "ATA-2 rev 3",
        0x000A => "ATA-3 published",
        0x000B => "ATA-3 rev 6",
        0x000C => "ATA-3 rev 7 and 7a",
        0x000D => "ATA/ATAPI-4 rev 6 and 6a",
        0x000E => "ATA/ATAPI-4 rev 13",
        0x000F => "ATA/ATAPI-4 rev 7",
        0x0010 => "ATA/ATAPI-4 rev 18",
        0x0011 => "ATA/ATAPI-4 rev 15",
        0x0012 => "ATA/ATAPI-4 published",
        0x0013 => "ATA/ATAPI-5 rev 3",
        0x0014 => "ATA/ATAPI-4 rev 14",
        0x0015 => "ATA/ATAPI-5 rev 1",
        0x0016 => "ATA/ATAPI-5 published",
        0x0017 => "ATA/ATAPI-4 rev 17",
        0x0018 => "ATA/ATAPI-6 rev 0",
        0x0019 => "ATA/ATAPI-6 rev 3a",
        0x001A => "ATA/ATAPI-7 rev 1",
        0x001B => "ATA/ATAPI-6 rev 2",
        0x001C => "ATA/ATAPI-6 rev 1",
        0x001D => "ATA/ATAPI-7 published",
        0x001E => "ATA/ATAPI-7 rev 0",
        0x001F => "ACS-3 rev 3b",
        0x0021 => "ATA/ATAPI-7 rev 4a",
        0x0022 => "ATA/ATAPI-6 published",
        0x0027 => "ATA8-ACS rev 3c",
        0x0028 => "ATA8-ACS rev 6",
        0x0029 => "ATA8-ACS rev 4",
        0x0031 => "ACS-2 rev 2",
        0x0033 => "ATA8-ACS rev 3e",
        0x0039 => "ATA8-ACS rev 4c",
        0x0042 => "ATA8-ACS rev 3f",
        0x0052 => "ATA8-ACS rev 3b",
        0x005E => "ACS-4 rev 5",
        0x006D => "ACS-3 rev 5",
        0x0082 => "ACS-2 published",
        0x0107 => "ATA8-ACS rev 2d",
        0x010A => "ACS-3 published",
        0x0110 => "ACS-2 rev 3",
        0x011B => "ACS-3 rev 4",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::FromZeros;

    fn identify() -> IdentifyDevice {
        IdentifyDevice::new_zeroed()
    }

    /// Stores a string the way identify data does: space-padded, bytes
    /// swapped within each 16-bit word.
    fn store_ata_string(field: &mut [u8], s: &str) {
        field.fill(b' ');
        field[..s.len()].copy_from_slice(s.as_bytes());
        for pair in field.chunks_exact_mut(2) {
            pair.swap(0, 1);
        }
    }

    #[test]
    fn ssd_identity() {
        let mut id = identify();
        id.rotation_rate = 0x0001;
        store_ata_string(&mut id.model_number, "Seagate SSD");
        store_ata_string(&mut id.firmware_revision, "UHFS1234");
        store_ata_string(&mut id.serial_number, "ZC13D9AM");

        let mut info = DeviceInformation::default();
        decode_identify(&id, &mut info);
        assert_eq!(info.rotation_rate, Some(1));
        assert!(info.is_ssd());
        assert_eq!(info.identity.model, "Seagate SSD");
        assert_eq!(info.identity.firmware, "UHFS1234");
        assert_eq!(info.identity.serial, "ZC13D9AM");
        assert!(info.identity.model.chars().all(|c| !c.is_control()));
    }

    #[test]
    fn capacity_falls_back_to_28_bit() {
        let mut id = identify();
        id.user_addressable_sectors = 0x0FFF_FFFF.into();
        // Word 83 valid, LBA48 advertised, but words 100-103 zeroed.
        id.commands2_supported = 0x4000 | (1 << 10);

        let mut info = DeviceInformation::default();
        decode_identify(&id, &mut info);
        assert_eq!(info.geometry.max_lba, Some(0x0FFF_FFFE));
    }

    #[test]
    fn capacity_prefers_48_bit_then_extended() {
        let mut id = identify();
        id.user_addressable_sectors = 0x0FFF_FFFF.into();
        id.commands2_supported = 0x4000 | (1 << 10);
        id.max_48bit_lba = 0x1_0000_0000u64.into();

        let mut info = DeviceInformation::default();
        decode_identify(&id, &mut info);
        assert_eq!(info.geometry.max_lba, Some(0xFFFF_FFFF));

        // Word 69 extended capacity overrides both.
        id.additional_supported = 1 << 3;
        id.extended_user_sectors = 0x2_0000_0000u64.into();
        let mut info = DeviceInformation::default();
        decode_identify(&id, &mut info);
        assert_eq!(info.geometry.max_lba, Some(0x1_FFFF_FFFF));
    }

    #[test]
    fn sector_sizes_from_word_106() {
        let mut id = identify();
        // Valid, 2^3 logical per physical, logical > 512.
        id.sector_size_config = 0x4000 | 0x2000 | 0x1000 | 0x3;
        id.logical_sector_size = 2048.into(); // words, so 4096 bytes

        let mut info = DeviceInformation::default();
        decode_identify(&id, &mut info);
        assert_eq!(info.geometry.logical_sector_size, Some(4096));
        assert_eq!(info.geometry.physical_sector_size, Some(32768));
        assert_eq!(
            info.geometry.physical_sector_size.unwrap()
                % info.geometry.logical_sector_size.unwrap(),
            0
        );
    }

    #[test]
    fn invalid_words_contribute_nothing() {
        let mut id = identify();
        id.commands1_supported = 0xFFFF;
        id.commands3_supported = 0xFFFF;
        id.commands4_supported = 0x8000 | 0x4; // bit 15 set: invalid

        let mut info = DeviceInformation::default();
        decode_identify(&id, &mut info);
        assert_eq!(info.features.iter().count(), 0);
        assert!(!info.inject.ata_write_uncorrectable);
    }

    #[test]
    fn valid_bits_14_15_words_contribute() {
        let mut id = identify();
        id.commands4_supported = 0x4000 | 0x4;

        let mut info = DeviceInformation::default();
        decode_identify(&id, &mut info);
        assert!(info.inject.ata_write_uncorrectable);
    }

    #[test]
    fn security_word_decode() {
        let mut id = identify();
        id.security_status = 0b0010_1011; // supported, enabled, frozen, enhanced
        id.normal_erase_time = 0x0020;
        id.enhanced_erase_time = 0x8100;
        id.master_password_id = 0xFFFE;

        let mut info = DeviceInformation::default();
        decode_identify(&id, &mut info);
        let security = info.security.ata.unwrap();
        assert!(security.supported && security.enabled && security.frozen);
        assert!(!security.locked);
        assert!(security.enhanced_erase_supported);
        assert_eq!(security.normal_erase_minutes, Some(64));
        assert_eq!(security.enhanced_erase_minutes, Some(512));
        assert_eq!(security.master_password_id, Some(0xFFFE));
    }

    #[test]
    fn word_22_gates_legacy_long() {
        let mut id = identify();
        id.obsolete_ecc_bytes = 0xFFFF;
        let mut info = DeviceInformation::default();
        decode_identify(&id, &mut info);
        assert!(!info.inject.ata_legacy_long);

        id.obsolete_ecc_bytes = 4;
        let mut info = DeviceInformation::default();
        decode_identify(&id, &mut info);
        assert!(info.inject.ata_legacy_long);
        assert_eq!(info.inject.ata_legacy_ecc_bytes, Some(4));
    }

    #[test]
    fn specification_bits_are_monotonic() {
        let mut id = identify();
        id.major_version = ata_spec::MAJOR_ACS3;
        let mut info = DeviceInformation::default();
        decode_identify(&id, &mut info);
        let before = info.specifications.clone();

        id.major_version |= ata_spec::MAJOR_ACS4;
        let mut info = DeviceInformation::default();
        decode_identify(&id, &mut info);
        for name in &before {
            assert!(info.specifications.contains(name));
        }
        assert!(info.specifications.contains(&"ACS-4".to_string()));
    }

    #[test]
    fn sata_transport_and_speed() {
        let mut id = identify();
        id.transport_major_version = 0x1000 | (1 << 8); // serial, SATA 3.3
        id.sata_capabilities = 0x4000 | 0xE; // gen 1-3 supported
        id.sata_additional = 3 << 1; // negotiated gen 3

        let mut info = DeviceInformation::default();
        decode_identify(&id, &mut info);
        assert_eq!(info.interface_speed_gbps, Some(6.0));
        assert!(info.specifications.contains(&"SATA 3.3".to_string()));
    }
}
