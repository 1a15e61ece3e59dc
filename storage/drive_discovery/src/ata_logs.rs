// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! ATA log collection: the GPL log directory and the logs hanging off
//! it, with a SMART READ DATA fallback for devices without GPL.
//!
//! Log failures never fail discovery; a log the device refuses to serve
//! simply contributes nothing.

use crate::info::DateOfManufacture;
use crate::info::DeviceInformation;
use crate::info::LastSelfTest;
use crate::info::SmartStatus;
use crate::quirks::Quirks;
use ata_spec::log::farm_signature_valid;
use ata_spec::log::stat_temperature;
use ata_spec::log::stat_value;
use ata_spec::log::CurrentSettings;
use ata_spec::log::DownloadCapabilities;
use ata_spec::log::ExtSelfTestLog;
use ata_spec::log::IdDataLogPage;
use ata_spec::log::IdDataLogPageHeader;
use ata_spec::log::LogAddress;
use ata_spec::log::LogDirectory;
use ata_spec::log::SctStatus;
use ata_spec::log::SupportedCapabilities;
use ata_spec::log::BUFFER_SIZE_QWORD;
use ata_spec::log::CAPACITY_QWORD;
use ata_spec::log::CURRENT_SETTINGS_QWORD;
use ata_spec::log::DOWNLOAD_CAPABILITIES_QWORD;
use ata_spec::log::FARM_DOM_WEEK_QWORD;
use ata_spec::log::FARM_DOM_YEAR_QWORD;
use ata_spec::log::ID_DATA_LOG_LIST_COUNT_OFFSET;
use ata_spec::log::ID_DATA_LOG_LIST_OFFSET;
use ata_spec::log::LOG_PAGE_BYTES;
use ata_spec::log::SCT_SMART_STATUS_OK;
use ata_spec::log::SCT_SMART_STATUS_TRIPPED;
use ata_spec::log::SCT_TEMP_NOT_REPORTED;
use ata_spec::log::SELF_TEST_RESULT_READ_FAILURE;
use ata_spec::log::STAT_CURRENT_TEMPERATURE;
use ata_spec::log::STAT_HIGHEST_TEMPERATURE;
use ata_spec::log::STAT_LOGICAL_SECTORS_READ;
use ata_spec::log::STAT_LOGICAL_SECTORS_WRITTEN;
use ata_spec::log::STAT_LOWEST_TEMPERATURE;
use ata_spec::log::STAT_PERCENT_USED_ENDURANCE;
use ata_spec::log::STAT_POWER_ON_HOURS;
use ata_spec::log::STAT_WORKLOAD_UTILIZATION;
use ata_spec::log::SUPPORTED_CAPABILITIES_QWORD;
use ata_spec::smart::attribute_temperature;
use ata_spec::smart::SmartData;
use ata_spec::smart::ATTR_POWER_ON_HOURS;
use ata_spec::smart::ATTR_SSD_LIFE_LEFT;
use ata_spec::smart::ATTR_TEMPERATURE;
use ata_spec::smart::ATTR_TOTAL_LBAS_READ;
use ata_spec::smart::ATTR_TOTAL_LBAS_WRITTEN;
use ata_spec::word_valid_bits_14_15;
use ata_spec::AtaCommand;
use ata_spec::Commands1;
use ata_spec::Commands3;
use ata_spec::IdentifyDevice;
use ata_spec::SmartFeature;
use ata_spec::SMART_LBA_HIGH;
use ata_spec::SMART_LBA_MID;
use ata_spec::SMART_TRIPPED_LBA_HIGH;
use ata_spec::SMART_TRIPPED_LBA_MID;
use storage_passthru::AtaTaskfile;
use storage_passthru::DataDirection;
use storage_passthru::PassthroughDevice;
use storage_passthru::TransportError;
use storage_string::ata_string;
use storage_wire::le;
use zerocopy::FromBytes;

pub(crate) fn collect(
    dev: &mut dyn PassthroughDevice,
    id: &IdentifyDevice,
    info: &mut DeviceInformation,
    quirks: &Quirks,
) {
    let gpl = word_valid_bits_14_15(id.commands3_supported)
        && Commands3::from(id.commands3_supported).gpl();
    let smart_enabled = ata_spec::word_valid(id.commands1_enabled)
        && Commands1::from(id.commands1_enabled).smart();

    let mut have_logs = false;
    if gpl {
        if let Some(dir) = read_directory(dev) {
            have_logs = true;
            if dir.page_count(LogAddress::IDENTIFY_DEVICE_DATA) != 0 {
                collect_id_data_log(dev, info);
            }
            if dir.page_count(LogAddress::DEVICE_STATISTICS) != 0 {
                collect_device_statistics(dev, info);
            }
            if dir.page_count(LogAddress::SCT_COMMAND_STATUS) != 0 {
                collect_sct_status(dev, info);
            }
            if dir.page_count(LogAddress::EXT_SMART_SELF_TEST) != 0 {
                collect_self_test(dev, info);
            }
            if dir.page_count(LogAddress::CONCURRENT_POSITIONING_RANGES) != 0 {
                collect_positioning_ranges(dev, info);
            }
            if dir.page_count(LogAddress::FARM) != 0 {
                collect_farm(dev, info);
            }
        } else {
            tracing::debug!("GPL advertised but log directory unreadable");
        }
    }

    if !have_logs && smart_enabled {
        smart_data_fallback(dev, info, quirks);
    }

    if info.health.smart_status == SmartStatus::Unknown && smart_enabled {
        info.health.smart_status = smart_return_status(dev);
    }
}

/// READ LOG EXT. The page number splits across LBA bits 15:8 (low byte)
/// and 47:40 (high byte).
fn read_log(
    dev: &mut dyn PassthroughDevice,
    log: LogAddress,
    page: u16,
    buf: &mut [u8],
) -> Result<(), TransportError> {
    debug_assert_eq!(buf.len() % LOG_PAGE_BYTES, 0);
    let taskfile = AtaTaskfile {
        command: AtaCommand::READ_LOG_EXT.0,
        features: 0,
        count: (buf.len() / LOG_PAGE_BYTES) as u16,
        lba: u64::from(log.0)
            | u64::from(page & 0xFF) << 8
            | u64::from(page >> 8) << 40,
        device: 0x40,
        extended: true,
        dma: false,
    };
    dev.ata_command(&taskfile, DataDirection::FromDevice, buf)?;
    Ok(())
}

fn read_directory(dev: &mut dyn PassthroughDevice) -> Option<LogDirectory> {
    let mut buf = [0u8; LOG_PAGE_BYTES];
    read_log(dev, LogAddress::DIRECTORY, 0, &mut buf).ok()?;
    LogDirectory::read_from_bytes(&buf[..]).ok()
}

fn id_data_page_valid(buf: &[u8], page: IdDataLogPage) -> bool {
    let Some(q) = le::u64(buf, 0) else { return false };
    let header = IdDataLogPageHeader::from(q);
    header.valid() && header.page() == page.0
}

fn collect_id_data_log(dev: &mut dyn PassthroughDevice, info: &mut DeviceInformation) {
    let mut buf = [0u8; LOG_PAGE_BYTES];
    if read_log(dev, LogAddress::IDENTIFY_DEVICE_DATA, 0, &mut buf).is_err()
        || !id_data_page_valid(&buf, IdDataLogPage::SUPPORTED_PAGES)
    {
        return;
    }
    let count = buf[ID_DATA_LOG_LIST_COUNT_OFFSET] as usize;
    let pages: Vec<u8> = buf[ID_DATA_LOG_LIST_OFFSET..]
        .iter()
        .take(count)
        .copied()
        .collect();

    for page in pages {
        let page = IdDataLogPage(page);
        match page {
            IdDataLogPage::CAPACITY
            | IdDataLogPage::SUPPORTED_CAPABILITIES
            | IdDataLogPage::CURRENT_SETTINGS
            | IdDataLogPage::STRINGS => {}
            _ => continue,
        }
        let mut buf = [0u8; LOG_PAGE_BYTES];
        if read_log(dev, LogAddress::IDENTIFY_DEVICE_DATA, page.0 as u16, &mut buf).is_err()
            || !id_data_page_valid(&buf, page)
        {
            continue;
        }
        match page {
            IdDataLogPage::CAPACITY => decode_capacity_page(&buf, info),
            IdDataLogPage::SUPPORTED_CAPABILITIES => decode_capabilities_page(&buf, info),
            IdDataLogPage::CURRENT_SETTINGS => decode_settings_page(&buf, info),
            IdDataLogPage::STRINGS => decode_strings_page(&buf, info),
            _ => {}
        }
    }
}

fn decode_capacity_page(buf: &[u8], info: &mut DeviceInformation) {
    if let Some(q) = le::u64(buf, CAPACITY_QWORD) {
        if q & (1 << 63) != 0 && info.geometry.max_lba.is_none() {
            let sectors = q & 0x0000_FFFF_FFFF_FFFF;
            if sectors != 0 {
                info.geometry.max_lba = Some(sectors - 1);
            }
        }
    }
    if let Some(q) = le::u64(buf, BUFFER_SIZE_QWORD) {
        if q & (1 << 63) != 0 {
            // Low 63 bits count bytes.
            let bytes = q & !(1 << 63);
            if bytes != 0 {
                info.buffer_size = Some(bytes);
            }
        }
    }
}

fn decode_capabilities_page(buf: &[u8], info: &mut DeviceInformation) {
    if let Some(q) = le::u64(buf, SUPPORTED_CAPABILITIES_QWORD) {
        let caps = SupportedCapabilities::from(q);
        if caps.valid() {
            if caps.write_uncorrectable() {
                info.inject.ata_write_uncorrectable = true;
            }
            if caps.download_microcode_mode3() {
                info.fwdl.segmented = true;
            }
            if caps.deferred_download() {
                info.fwdl.deferred = true;
            }
            if caps.sanitize() {
                info.features.add("Sanitize");
            }
            if caps.command_duration_limits() {
                info.features.add("CDL");
            }
            if caps.depopulation() {
                info.features.add("Storage Element Depopulation");
            }
            if caps.set_sector_config() {
                info.features.add("Set Sector Configuration");
            }
        }
    }
    if let Some(q) = le::u64(buf, DOWNLOAD_CAPABILITIES_QWORD) {
        let dl = DownloadCapabilities::from(q);
        if dl.valid() {
            if dl.dm_immediate() {
                info.fwdl.full = true;
            }
            if dl.dm_offsets_immediate() {
                info.fwdl.segmented = true;
            }
            if dl.dm_offsets_deferred() {
                info.fwdl.deferred = true;
            }
        }
    }
}

fn decode_settings_page(buf: &[u8], info: &mut DeviceInformation) {
    let Some(q) = le::u64(buf, CURRENT_SETTINGS_QWORD) else {
        return;
    };
    let settings = CurrentSettings::from(q);
    if !settings.valid() {
        return;
    }
    if settings.write_cache_enabled() {
        info.features.add_enabled("Write Cache");
    }
    if settings.read_look_ahead_enabled() {
        info.features.add_enabled("Read Look-Ahead");
    }
    if settings.smart_enabled() {
        info.features.add_enabled("SMART");
    }
    if settings.epc_enabled() {
        info.features.add_enabled("EPC");
    }
    if settings.cdl_enabled() {
        info.features.add_enabled("CDL");
    }
    if settings.free_fall_enabled() {
        info.features.add_enabled("Free-Fall Control");
    }
    if settings.sense_data_enabled() {
        info.features.add_enabled("Sense Data Reporting");
    }
}

fn decode_strings_page(buf: &[u8], info: &mut DeviceInformation) {
    use ata_spec::log::STRINGS_MODEL_LEN;
    use ata_spec::log::STRINGS_MODEL_OFFSET;
    use ata_spec::log::STRINGS_SERIAL_LEN;
    use ata_spec::log::STRINGS_SERIAL_OFFSET;

    // Identify strings win; the log only fills gaps.
    if info.identity.serial.is_empty() {
        let field = &buf[STRINGS_SERIAL_OFFSET..STRINGS_SERIAL_OFFSET + STRINGS_SERIAL_LEN];
        info.identity.serial = ata_string(field);
    }
    if info.identity.model.is_empty() {
        let field = &buf[STRINGS_MODEL_OFFSET..STRINGS_MODEL_OFFSET + STRINGS_MODEL_LEN];
        info.identity.model = ata_string(field);
    }
}

fn collect_device_statistics(dev: &mut dyn PassthroughDevice, info: &mut DeviceInformation) {
    let logical = u64::from(info.geometry.logical_sector_size.unwrap_or(512));

    let mut buf = [0u8; LOG_PAGE_BYTES];
    if read_log(
        dev,
        LogAddress::DEVICE_STATISTICS,
        ata_spec::log::DeviceStatsPage::GENERAL.0 as u16,
        &mut buf,
    )
    .is_ok()
    {
        if let Some(hours) = le::u64(buf.as_ref(), STAT_POWER_ON_HOURS).and_then(stat_value) {
            info.health.power_on_minutes = Some(hours * 60);
        }
        if let Some(written) =
            le::u64(buf.as_ref(), STAT_LOGICAL_SECTORS_WRITTEN).and_then(stat_value)
        {
            info.health.total_bytes_written = Some(u128::from(written) * u128::from(logical));
        }
        if let Some(read) = le::u64(buf.as_ref(), STAT_LOGICAL_SECTORS_READ).and_then(stat_value) {
            info.health.total_bytes_read = Some(u128::from(read) * u128::from(logical));
        }
        if let Some(workload) =
            le::u64(buf.as_ref(), STAT_WORKLOAD_UTILIZATION).and_then(stat_value)
        {
            // Reported in milli-units of the rated workload.
            info.health.utilization_rate = Some(workload as f64 / 1000.0);
        }
    }

    let mut buf = [0u8; LOG_PAGE_BYTES];
    if read_log(
        dev,
        LogAddress::DEVICE_STATISTICS,
        ata_spec::log::DeviceStatsPage::TEMPERATURE.0 as u16,
        &mut buf,
    )
    .is_ok()
    {
        if let Some(t) = le::u64(buf.as_ref(), STAT_CURRENT_TEMPERATURE).and_then(stat_temperature)
        {
            info.health.temperature.current = Some(i16::from(t));
        }
        if let Some(t) = le::u64(buf.as_ref(), STAT_HIGHEST_TEMPERATURE).and_then(stat_temperature)
        {
            info.health.temperature.max = Some(i16::from(t));
        }
        if let Some(t) = le::u64(buf.as_ref(), STAT_LOWEST_TEMPERATURE).and_then(stat_temperature) {
            info.health.temperature.min = Some(i16::from(t));
        }
    }

    let mut buf = [0u8; LOG_PAGE_BYTES];
    if read_log(
        dev,
        LogAddress::DEVICE_STATISTICS,
        ata_spec::log::DeviceStatsPage::SOLID_STATE.0 as u16,
        &mut buf,
    )
    .is_ok()
    {
        if let Some(pct) = le::u64(buf.as_ref(), STAT_PERCENT_USED_ENDURANCE).and_then(stat_value) {
            info.health.percent_endurance_used = Some(pct as f64);
        }
    }
}

fn collect_sct_status(dev: &mut dyn PassthroughDevice, info: &mut DeviceInformation) {
    let mut buf = [0u8; LOG_PAGE_BYTES];
    if read_log(dev, LogAddress::SCT_COMMAND_STATUS, 0, &mut buf).is_err() {
        return;
    }
    let Ok(status) = SctStatus::read_from_bytes(&buf[..]) else {
        return;
    };

    let temp = |t: u8| (t != SCT_TEMP_NOT_REPORTED).then_some(i16::from(t as i8));
    if info.health.temperature.current.is_none() {
        info.health.temperature.current = temp(status.hda_temp);
    }
    if info.health.temperature.min.is_none() {
        info.health.temperature.min = temp(status.lifetime_min_temp);
    }
    if info.health.temperature.max.is_none() {
        info.health.temperature.max = temp(status.lifetime_max_temp);
    }

    info.health.smart_status = match status.smart_status.get() {
        SCT_SMART_STATUS_OK => SmartStatus::Ok,
        SCT_SMART_STATUS_TRIPPED => SmartStatus::Tripped,
        _ => SmartStatus::Unknown,
    };
}

fn collect_self_test(dev: &mut dyn PassthroughDevice, info: &mut DeviceInformation) {
    let mut buf = [0u8; LOG_PAGE_BYTES];
    if read_log(dev, LogAddress::EXT_SMART_SELF_TEST, 0, &mut buf).is_err() {
        return;
    }
    let Ok(log) = ExtSelfTestLog::read_from_bytes(&buf[..]) else {
        return;
    };
    let index = log.index.get();
    if index == 0 {
        // No self-test has ever run.
        return;
    }
    let descriptor = &log.descriptors[(index as usize - 1) % log.descriptors.len()];
    if descriptor.is_unused() {
        return;
    }
    info.last_self_test = Some(LastSelfTest {
        test_number: descriptor.test_code,
        result_code: descriptor.result_code(),
        power_on_hours: u64::from(descriptor.lifetime_timestamp.get()),
        error_lba: (descriptor.result_code() == SELF_TEST_RESULT_READ_FAILURE)
            .then(|| descriptor.failing_lba()),
    });
}

fn collect_positioning_ranges(dev: &mut dyn PassthroughDevice, info: &mut DeviceInformation) {
    let mut buf = [0u8; LOG_PAGE_BYTES];
    if read_log(dev, LogAddress::CONCURRENT_POSITIONING_RANGES, 0, &mut buf).is_err() {
        return;
    }
    let ranges = buf[ata_spec::log::CPR_COUNT_OFFSET];
    if ranges != 0 {
        info.positioning_ranges = Some(u32::from(ranges));
        info.features.add("Concurrent Positioning Ranges");
    }
}

fn collect_farm(dev: &mut dyn PassthroughDevice, info: &mut DeviceInformation) {
    let mut buf = [0u8; LOG_PAGE_BYTES];
    if read_log(dev, LogAddress::FARM, 0, &mut buf).is_err() {
        return;
    }
    let Some(signature) = le::u64(buf.as_ref(), 0) else {
        return;
    };
    if !farm_signature_valid(signature) {
        return;
    }
    info.features.add("Field Accessible Reliability Metrics");

    // DOM qwords carry two ASCII digits in the low bytes.
    let two_digits = |q: u64| {
        let b = [(q & 0xFF) as u8, (q >> 8 & 0xFF) as u8];
        if b.iter().all(u8::is_ascii_digit) {
            Some((b[0] - b'0') * 10 + (b[1] - b'0'))
        } else {
            None
        }
    };
    let week = le::u64(buf.as_ref(), FARM_DOM_WEEK_QWORD).and_then(two_digits);
    let year = le::u64(buf.as_ref(), FARM_DOM_YEAR_QWORD).and_then(two_digits);
    if let (Some(week), Some(year)) = (week, year) {
        if (1..=53).contains(&week) {
            info.identity.date_of_manufacture = Some(DateOfManufacture {
                week,
                year: 2000 + u16::from(year),
            });
        }
    }
}

/// SMART READ DATA, used only when the device has no GPL logs.
fn smart_data_fallback(
    dev: &mut dyn PassthroughDevice,
    info: &mut DeviceInformation,
    quirks: &Quirks,
) {
    let mut buf = [0u8; 512];
    let taskfile = AtaTaskfile {
        command: AtaCommand::SMART.0,
        features: u16::from(SmartFeature::READ_DATA.0),
        count: 1,
        lba: u64::from(SMART_LBA_MID) << 8 | u64::from(SMART_LBA_HIGH) << 16,
        device: 0x40,
        extended: false,
        dma: false,
    };
    if dev
        .ata_command(&taskfile, DataDirection::FromDevice, &mut buf)
        .is_err()
    {
        return;
    }
    let Ok(data) = SmartData::read_from_bytes(&buf[..]) else {
        return;
    };

    if let Some(attr) = data.attribute(ATTR_POWER_ON_HOURS) {
        info.health.power_on_minutes = Some(attr.raw_value() * 60);
    }
    if let Some(attr) = data.attribute(ATTR_TEMPERATURE) {
        if let Some(t) = attribute_temperature(attr) {
            info.health.temperature.current = Some(t);
        }
    }
    // Some vendors count host writes in GiB or 32 MiB units instead of
    // sectors.
    let write_unit = if quirks.endurance_gib {
        1 << 30
    } else if quirks.endurance_32mib {
        1 << 25
    } else {
        u128::from(info.geometry.logical_sector_size.unwrap_or(512))
    };
    let read_unit = u128::from(info.geometry.logical_sector_size.unwrap_or(512));
    if let Some(attr) = data.attribute(ATTR_TOTAL_LBAS_WRITTEN) {
        info.health.total_bytes_written = Some(u128::from(attr.raw_value()) * write_unit);
    }
    if let Some(attr) = data.attribute(ATTR_TOTAL_LBAS_READ) {
        info.health.total_bytes_read = Some(u128::from(attr.raw_value()) * read_unit);
    }

    if quirks.legacy_0004_percent {
        if let Some(attr) = data.attribute(ATTR_SSD_LIFE_LEFT) {
            info.health.percent_endurance_used =
                Some(100.0 - f64::from(attr.current) * 100.0 / 255.0);
        }
    }

    let minutes = data.extended_test_minutes_word.get();
    let minutes = if minutes != 0 {
        u32::from(minutes)
    } else {
        u32::from(data.extended_test_minutes)
    };
    if minutes != 0 {
        info.health.long_self_test_minutes = Some(minutes);
    }
}

/// SMART RETURN STATUS: the signature registers flip when a threshold
/// has been exceeded.
fn smart_return_status(dev: &mut dyn PassthroughDevice) -> SmartStatus {
    let taskfile = AtaTaskfile {
        command: AtaCommand::SMART.0,
        features: u16::from(SmartFeature::RETURN_STATUS.0),
        count: 0,
        lba: u64::from(SMART_LBA_MID) << 8 | u64::from(SMART_LBA_HIGH) << 16,
        device: 0x40,
        extended: false,
        dma: false,
    };
    let Ok(registers) = dev.ata_command(&taskfile, DataDirection::None, &mut []) else {
        return SmartStatus::Unknown;
    };
    let mid = (registers.lba >> 8 & 0xFF) as u8;
    let high = (registers.lba >> 16 & 0xFF) as u8;
    if mid == SMART_TRIPPED_LBA_MID && high == SMART_TRIPPED_LBA_HIGH {
        SmartStatus::Tripped
    } else if mid == SMART_LBA_MID && high == SMART_LBA_HIGH {
        SmartStatus::Ok
    } else {
        SmartStatus::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ata_spec::log::ExtSelfTestDescriptor;
    use storage_passthru::AtaRegisters;
    use storage_passthru::EmulatedDevice;
    use storage_passthru::Protocol;
    use zerocopy::FromZeros;
    use zerocopy::IntoBytes;

    fn identify_with_gpl() -> IdentifyDevice {
        let mut id = IdentifyDevice::new_zeroed();
        id.commands3_supported = 0x4000 | (1 << 5); // GPL
        id.commands1_supported = 1; // SMART supported
        id.commands1_enabled = 1; // SMART enabled
        id
    }

    fn ok_registers() -> AtaRegisters {
        AtaRegisters {
            status: 0x50,
            error: 0,
            count: 0,
            lba: 0,
            device: 0x40,
        }
    }

    /// Scripts READ LOG EXT by (log, page).
    fn log_server(
        pages: Vec<((u8, u16), Vec<u8>)>,
    ) -> impl FnMut(
        &AtaTaskfile,
        DataDirection,
        &mut [u8],
    ) -> Result<AtaRegisters, TransportError> {
        move |taskfile, _, data| {
            if taskfile.command != AtaCommand::READ_LOG_EXT.0 {
                return Err(TransportError::InvalidOpcode);
            }
            let log = (taskfile.lba & 0xFF) as u8;
            let page = (taskfile.lba >> 8 & 0xFF) as u16 | ((taskfile.lba >> 40 & 0xFF) as u16) << 8;
            match pages.iter().find(|((l, p), _)| *l == log && *p == page) {
                Some((_, contents)) => {
                    data[..contents.len()].copy_from_slice(contents);
                    Ok(ok_registers())
                }
                None => Err(TransportError::Aborted),
            }
        }
    }

    fn directory_with(entries: &[(LogAddress, u16)]) -> Vec<u8> {
        let mut dir = LogDirectory::new_zeroed();
        dir.version = 1.into();
        for &(log, count) in entries {
            dir.pages[log.0 as usize - 1] = count.into();
        }
        dir.as_bytes().to_vec()
    }

    #[test]
    fn statistics_and_sct_populate_health() {
        let mut stats_general = vec![0u8; LOG_PAGE_BYTES];
        let poh: u64 = (1 << 63) | (1 << 62) | 1000;
        stats_general[STAT_POWER_ON_HOURS..STAT_POWER_ON_HOURS + 8]
            .copy_from_slice(&poh.to_le_bytes());
        let written: u64 = (1 << 63) | (1 << 62) | 2048;
        stats_general[STAT_LOGICAL_SECTORS_WRITTEN..STAT_LOGICAL_SECTORS_WRITTEN + 8]
            .copy_from_slice(&written.to_le_bytes());

        let mut sct = SctStatus::new_zeroed();
        sct.hda_temp = 35;
        sct.lifetime_min_temp = 20;
        sct.lifetime_max_temp = SCT_TEMP_NOT_REPORTED;
        sct.smart_status = SCT_SMART_STATUS_OK.into();

        let mut dev = EmulatedDevice::new(Protocol::Ata).with_ata(log_server(vec![
            (
                (LogAddress::DIRECTORY.0, 0),
                directory_with(&[
                    (LogAddress::DEVICE_STATISTICS, 8),
                    (LogAddress::SCT_COMMAND_STATUS, 1),
                ]),
            ),
            (
                (LogAddress::DEVICE_STATISTICS.0, 1),
                stats_general,
            ),
            ((LogAddress::SCT_COMMAND_STATUS.0, 0), sct.as_bytes().to_vec()),
        ]));

        let id = identify_with_gpl();
        let mut info = DeviceInformation::default();
        info.geometry.logical_sector_size = Some(512);
        collect(&mut dev, &id, &mut info, &Quirks::NONE);

        assert_eq!(info.health.power_on_minutes, Some(60_000));
        assert_eq!(info.health.total_bytes_written, Some(2048 * 512));
        assert_eq!(info.health.temperature.current, Some(35));
        assert_eq!(info.health.temperature.min, Some(20));
        // 0x80 sentinel suppresses the lifetime max.
        assert_eq!(info.health.temperature.max, None);
        assert_eq!(info.health.smart_status, SmartStatus::Ok);
    }

    #[test]
    fn self_test_failure_reports_lba() {
        let mut log = ExtSelfTestLog::new_zeroed();
        log.index = 2.into();
        let mut descriptor = ExtSelfTestDescriptor::new_zeroed();
        descriptor.test_code = 0x02;
        descriptor.status = 0x70 | 0x04;
        descriptor.lifetime_timestamp = 500.into();
        descriptor.failing_lba = [0xEF, 0xBE, 0x00, 0x00, 0x00, 0x00];
        log.descriptors[1] = descriptor;

        let mut dev = EmulatedDevice::new(Protocol::Ata).with_ata(log_server(vec![
            (
                (LogAddress::DIRECTORY.0, 0),
                directory_with(&[(LogAddress::EXT_SMART_SELF_TEST, 1)]),
            ),
            (
                (LogAddress::EXT_SMART_SELF_TEST.0, 0),
                log.as_bytes().to_vec(),
            ),
        ]));

        let id = identify_with_gpl();
        let mut info = DeviceInformation::default();
        collect(&mut dev, &id, &mut info, &Quirks::NONE);

        let last = info.last_self_test.unwrap();
        assert_eq!(last.result_code, SELF_TEST_RESULT_READ_FAILURE);
        assert_eq!(last.power_on_hours, 500);
        assert_eq!(last.error_lba, Some(0xBEEF));
    }

    #[test]
    fn farm_signature_gates_dom_decode() {
        let mut farm = vec![0u8; LOG_PAGE_BYTES];
        let signature: u64 = (0b11 << 62) | ata_spec::log::FARM_SIGNATURE_LOW;
        farm[..8].copy_from_slice(&signature.to_le_bytes());
        farm[FARM_DOM_WEEK_QWORD] = b'2';
        farm[FARM_DOM_WEEK_QWORD + 1] = b'3';
        farm[FARM_DOM_YEAR_QWORD] = b'2';
        farm[FARM_DOM_YEAR_QWORD + 1] = b'4';

        let mut dev = EmulatedDevice::new(Protocol::Ata).with_ata(log_server(vec![
            (
                (LogAddress::DIRECTORY.0, 0),
                directory_with(&[(LogAddress::FARM, 16)]),
            ),
            ((LogAddress::FARM.0, 0), farm),
        ]));

        let id = identify_with_gpl();
        let mut info = DeviceInformation::default();
        collect(&mut dev, &id, &mut info, &Quirks::NONE);

        let dom = info.identity.date_of_manufacture.unwrap();
        assert_eq!(dom.week, 23);
        assert_eq!(dom.year, 2024);
    }

    #[test]
    fn smart_fallback_when_gpl_absent() {
        let mut data = SmartData::new_zeroed();
        data.attributes[0].id = ATTR_POWER_ON_HOURS;
        data.attributes[0].raw = [0xE8, 0x03, 0, 0, 0, 0]; // 1000 hours
        data.attributes[1].id = ATTR_TEMPERATURE;
        data.attributes[1].raw = [41, 0, 0, 0, 0, 0];
        let sector = data.as_bytes().to_vec();

        let mut dev = EmulatedDevice::new(Protocol::Ata).with_ata(
            move |taskfile: &AtaTaskfile, _, data: &mut [u8]| {
                if taskfile.command == AtaCommand::SMART.0
                    && taskfile.features == u16::from(SmartFeature::READ_DATA.0)
                {
                    data[..sector.len()].copy_from_slice(&sector);
                    return Ok(ok_registers());
                }
                if taskfile.command == AtaCommand::SMART.0
                    && taskfile.features == u16::from(SmartFeature::RETURN_STATUS.0)
                {
                    let mut registers = ok_registers();
                    registers.lba = u64::from(SMART_TRIPPED_LBA_MID) << 8
                        | u64::from(SMART_TRIPPED_LBA_HIGH) << 16;
                    return Ok(registers);
                }
                Err(TransportError::InvalidOpcode)
            },
        );

        let mut id = IdentifyDevice::new_zeroed();
        id.commands1_supported = 1;
        id.commands1_enabled = 1; // SMART on, no GPL
        let mut info = DeviceInformation::default();
        collect(&mut dev, &id, &mut info, &Quirks::NONE);

        assert_eq!(info.health.power_on_minutes, Some(60_000));
        assert_eq!(info.health.temperature.current, Some(41));
        assert_eq!(info.health.smart_status, SmartStatus::Tripped);
    }

    #[test]
    fn quirks_rescale_smart_attributes() {
        let mut data = SmartData::new_zeroed();
        data.attributes[0].id = ATTR_TOTAL_LBAS_WRITTEN;
        data.attributes[0].raw = [5, 0, 0, 0, 0, 0]; // 5 GiB under the quirk
        data.attributes[1].id = ATTR_SSD_LIFE_LEFT;
        data.attributes[1].current = 204;
        let sector = data.as_bytes().to_vec();

        let mut dev = EmulatedDevice::new(Protocol::Ata).with_ata(
            move |taskfile: &AtaTaskfile, _, data: &mut [u8]| {
                if taskfile.command == AtaCommand::SMART.0
                    && taskfile.features == u16::from(SmartFeature::READ_DATA.0)
                {
                    data[..sector.len()].copy_from_slice(&sector);
                    return Ok(ok_registers());
                }
                Err(TransportError::InvalidOpcode)
            },
        );

        let mut id = IdentifyDevice::new_zeroed();
        id.commands1_supported = 1;
        id.commands1_enabled = 1;
        let quirks = Quirks {
            endurance_gib: true,
            legacy_0004_percent: true,
            ..Quirks::NONE
        };
        let mut info = DeviceInformation::default();
        collect(&mut dev, &id, &mut info, &quirks);

        assert_eq!(info.health.total_bytes_written, Some(5 << 30));
        assert_eq!(info.health.percent_endurance_used, Some(100.0 - 80.0));
    }
}
