// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! SCSI log page collection via LOG SENSE.
//!
//! Pages are streams of parameter records; fields are pulled out
//! positionally with the bounds-checked getters, so short pages degrade
//! to "not reported".

use crate::info::DeviceInformation;
use crate::info::LastSelfTest;
use crate::info::SmartStatus;
use ata_spec::log::farm_signature_valid;
use ata_spec::log::FARM_DOM_WEEK_QWORD;
use ata_spec::log::FARM_DOM_YEAR_QWORD;
use scsi_spec::LogPageHeader;
use scsi_spec::LogParameterHeader;
use scsi_spec::LogSenseCdb;
use scsi_spec::LogSensePageControl;
use scsi_spec::ScsiOp;
use scsi_spec::ENV_NOT_REPORTED;
use scsi_spec::LOG_PAGE_FARM;
use scsi_spec::LOG_PAGE_GENERAL_STATISTICS;
use scsi_spec::LOG_PAGE_INFORMATIONAL_EXCEPTIONS;
use scsi_spec::LOG_PAGE_READ_ERROR_COUNTERS;
use scsi_spec::LOG_PAGE_SELF_TEST_RESULTS;
use scsi_spec::LOG_PAGE_SOLID_STATE_MEDIA;
use scsi_spec::LOG_PAGE_START_STOP_CYCLE;
use scsi_spec::LOG_PAGE_SUPPORTED_PAGES;
use scsi_spec::LOG_PAGE_TEMPERATURE;
use scsi_spec::LOG_PAGE_UTILIZATION;
use scsi_spec::LOG_PAGE_WRITE_ERROR_COUNTERS;
use scsi_spec::LOG_PARAM_ENV_HUMIDITY;
use scsi_spec::LOG_PARAM_ENV_TEMPERATURE;
use scsi_spec::LOG_PARAM_TOTAL_BYTES_PROCESSED;
use scsi_spec::LOG_PC_CUMULATIVE;
use scsi_spec::LOG_SUBPAGE_ENVIRONMENTAL;
use scsi_spec::LOG_SUBPAGE_FARM;
use scsi_spec::LOG_SUBPAGE_UTILIZATION;
use storage_passthru::DataDirection;
use storage_passthru::PassthroughDevice;
use storage_wire::be;
use storage_wire::le;
use zerocopy::FromBytes;
use zerocopy::IntoBytes;

/// First failure address of all ones: no failing LBA recorded.
const SELF_TEST_NO_ADDRESS: u64 = u64::MAX;

pub(crate) fn collect(dev: &mut dyn PassthroughDevice, info: &mut DeviceInformation) {
    let mut pages = supported_pages(dev);
    if pages.is_empty() {
        // Some translation layers zero the directory; probe the pages
        // that matter.
        pages = vec![
            (LOG_PAGE_TEMPERATURE, 0),
            (LOG_PAGE_TEMPERATURE, LOG_SUBPAGE_ENVIRONMENTAL),
            (LOG_PAGE_START_STOP_CYCLE, 0),
            (LOG_PAGE_SELF_TEST_RESULTS, 0),
            (LOG_PAGE_INFORMATIONAL_EXCEPTIONS, 0),
        ];
    }

    for (page, subpage) in pages {
        let mut buf = [0u8; 2048];
        let Some(payload) = log_sense(dev, page, subpage, &mut buf) else {
            continue;
        };
        match (page, subpage) {
            (LOG_PAGE_TEMPERATURE, 0) => decode_temperature(payload, info),
            (LOG_PAGE_TEMPERATURE, LOG_SUBPAGE_ENVIRONMENTAL) => {
                decode_environmental(payload, info)
            }
            (LOG_PAGE_WRITE_ERROR_COUNTERS, 0) => {
                if let Some(bytes) = total_bytes_processed(payload) {
                    info.health.total_bytes_written = Some(bytes);
                }
            }
            (LOG_PAGE_READ_ERROR_COUNTERS, 0) => {
                if let Some(bytes) = total_bytes_processed(payload) {
                    info.health.total_bytes_read = Some(bytes);
                }
            }
            (LOG_PAGE_START_STOP_CYCLE, 0) => decode_start_stop(payload, info),
            (LOG_PAGE_UTILIZATION, LOG_SUBPAGE_UTILIZATION) => decode_utilization(payload, info),
            (LOG_PAGE_SELF_TEST_RESULTS, 0) => decode_self_test(payload, info),
            (LOG_PAGE_SOLID_STATE_MEDIA, 0) => decode_solid_state(payload, info),
            (LOG_PAGE_INFORMATIONAL_EXCEPTIONS, 0) => decode_informational_exceptions(payload, info),
            (LOG_PAGE_GENERAL_STATISTICS, 0) => decode_general_statistics(payload, info),
            (LOG_PAGE_FARM, LOG_SUBPAGE_FARM) => decode_farm(payload, info),
            _ => {}
        }
    }
}

/// Issues LOG SENSE and returns the parameter bytes, header stripped.
fn log_sense<'a>(
    dev: &mut dyn PassthroughDevice,
    page: u8,
    subpage: u8,
    buf: &'a mut [u8],
) -> Option<&'a [u8]> {
    let cdb = LogSenseCdb {
        operation_code: ScsiOp::LOG_SENSE,
        flags1: 0,
        page: LogSensePageControl::new()
            .with_page_code(page)
            .with_pc(LOG_PC_CUMULATIVE),
        subpage_code: subpage,
        reserved: 0,
        parameter_pointer: 0.into(),
        allocation_length: (buf.len() as u16).into(),
        control: 0,
    };
    dev.scsi_command(cdb.as_bytes(), DataDirection::FromDevice, buf)
        .ok()?;
    let (header, rest) = LogPageHeader::read_from_prefix(buf).ok()?;
    // A device that echoes a different page back did not serve the
    // request.
    if header.code() != page || header.subpage_code != subpage {
        return None;
    }
    let len = (header.page_length.get() as usize).min(rest.len());
    Some(&rest[..len])
}

/// Iterates (parameter_code, body) records.
fn parameters<'a>(payload: &'a [u8]) -> impl Iterator<Item = (u16, &'a [u8])> + 'a {
    let mut rest = payload;
    std::iter::from_fn(move || {
        let (header, body) = LogParameterHeader::read_from_prefix(rest).ok()?;
        let len = (header.parameter_length as usize).min(body.len());
        let record = &body[..len];
        rest = &body[len..];
        Some((header.parameter_code.get(), record))
    })
}

fn supported_pages(dev: &mut dyn PassthroughDevice) -> Vec<(u8, u8)> {
    let mut pages = Vec::new();
    let mut buf = [0u8; 512];
    // Supported subpages first: it enumerates (page, subpage) pairs.
    if let Some(payload) = log_sense(
        dev,
        LOG_PAGE_SUPPORTED_PAGES,
        scsi_spec::LOG_SUBPAGE_SUPPORTED_SUBPAGES,
        &mut buf,
    ) {
        for pair in payload.chunks_exact(2) {
            pages.push((pair[0] & 0x3F, pair[1]));
        }
        return pages;
    }
    let mut buf = [0u8; 512];
    if let Some(payload) = log_sense(dev, LOG_PAGE_SUPPORTED_PAGES, 0, &mut buf) {
        for &page in payload {
            pages.push((page & 0x3F, 0));
        }
    }
    pages
}

fn decode_temperature(payload: &[u8], info: &mut DeviceInformation) {
    for (code, body) in parameters(payload) {
        if code == 0 {
            // Byte 1 of the body is the temperature in Celsius.
            if let Some(&t) = body.get(1) {
                if t != ENV_NOT_REPORTED && info.health.temperature.current.is_none() {
                    info.health.temperature.current = Some(i16::from(t));
                }
            }
        }
    }
}

fn decode_environmental(payload: &[u8], info: &mut DeviceInformation) {
    let temp = |b: u8| {
        let t = b as i8;
        (t != i8::MIN).then_some(i16::from(t))
    };
    for (code, body) in parameters(payload) {
        match code {
            LOG_PARAM_ENV_TEMPERATURE if body.len() >= 4 => {
                info.health.temperature.current = temp(body[1]);
                info.health.temperature.max = temp(body[2]);
                info.health.temperature.min = temp(body[3]);
            }
            LOG_PARAM_ENV_HUMIDITY if body.len() >= 4 => {
                let humidity = |b: u8| (b != ENV_NOT_REPORTED && b <= 100).then_some(b);
                info.health.humidity.current = humidity(body[1]);
                info.health.humidity.max = humidity(body[2]);
                info.health.humidity.min = humidity(body[3]);
            }
            _ => {}
        }
    }
}

fn total_bytes_processed(payload: &[u8]) -> Option<u128> {
    for (code, body) in parameters(payload) {
        if code == LOG_PARAM_TOTAL_BYTES_PROCESSED {
            return be::counter(body, 0, body.len()).map(u128::from);
        }
    }
    None
}

fn decode_start_stop(payload: &[u8], info: &mut DeviceInformation) {
    for (code, body) in parameters(payload) {
        // Parameter 1: date of manufacture, ASCII "YYYY" then "WW".
        if code == 0x0001 && body.len() >= 6 {
            let year: Option<u16> = std::str::from_utf8(&body[0..4])
                .ok()
                .and_then(|s| s.trim().parse().ok());
            let week: Option<u8> = std::str::from_utf8(&body[4..6])
                .ok()
                .and_then(|s| s.trim().parse().ok());
            if let (Some(year), Some(week)) = (year, week) {
                if (1..=53).contains(&week) && year >= 1990 {
                    info.identity.date_of_manufacture =
                        Some(crate::info::DateOfManufacture { week, year });
                }
            }
        }
    }
}

fn decode_utilization(payload: &[u8], info: &mut DeviceInformation) {
    for (code, body) in parameters(payload) {
        // Reported in milli-units of the rated workload, like the ATA
        // workload utilization statistic.
        if code == 0x0000 {
            if let Some(v) = be::u16(body, 0) {
                info.health.utilization_rate = Some(f64::from(v) / 1000.0);
            }
        }
    }
}

fn decode_self_test(payload: &[u8], info: &mut DeviceInformation) {
    // Parameter 1 is the most recent result.
    for (code, body) in parameters(payload) {
        if code != 0x0001 || body.len() < 16 {
            continue;
        }
        let result = body[0] & 0x0F;
        let test_number = body[1];
        let hours = be::u16(body, 2).unwrap_or(0);
        if result == 0 && hours == 0 && body[0] == 0 {
            // Empty slot: no self-test has run.
            return;
        }
        let address = be::u64(body, 4).unwrap_or(SELF_TEST_NO_ADDRESS);
        info.last_self_test = Some(LastSelfTest {
            test_number,
            result_code: result,
            power_on_hours: u64::from(hours),
            error_lba: (address != SELF_TEST_NO_ADDRESS).then_some(address),
        });
        return;
    }
}

fn decode_solid_state(payload: &[u8], info: &mut DeviceInformation) {
    for (code, body) in parameters(payload) {
        // Parameter 1: percentage used endurance indicator at body
        // byte 3.
        if code == 0x0001 {
            if let Some(&pct) = body.get(3) {
                info.health.percent_endurance_used = Some(f64::from(pct));
            }
        }
    }
}

fn decode_informational_exceptions(payload: &[u8], info: &mut DeviceInformation) {
    for (code, body) in parameters(payload) {
        if code == 0x0000 && body.len() >= 2 {
            let asc = body[0];
            info.health.smart_status = if asc == 0 {
                SmartStatus::Ok
            } else {
                SmartStatus::Tripped
            };
            if let Some(&t) = body.get(2) {
                if t != ENV_NOT_REPORTED && info.health.temperature.current.is_none() {
                    info.health.temperature.current = Some(i16::from(t));
                }
            }
        }
    }
}

fn decode_general_statistics(payload: &[u8], info: &mut DeviceInformation) {
    let block = u128::from(info.geometry.logical_sector_size.unwrap_or(512));
    for (code, body) in parameters(payload) {
        // Parameter 1, general access statistics: logical blocks
        // received at byte 16, transmitted at byte 24.
        if code == 0x0001 && body.len() >= 32 {
            if info.health.total_bytes_written.is_none() {
                info.health.total_bytes_written =
                    be::u64(body, 16).map(|blocks| u128::from(blocks) * block);
            }
            if info.health.total_bytes_read.is_none() {
                info.health.total_bytes_read =
                    be::u64(body, 24).map(|blocks| u128::from(blocks) * block);
            }
        }
    }
}

fn decode_farm(payload: &[u8], info: &mut DeviceInformation) {
    // FARM data is little-endian qwords even behind the SCSI page
    // framing; the signature gates the whole decode.
    let Some((_, body)) = parameters(payload).next() else {
        return;
    };
    let Some(signature) = le::u64(body, 0) else {
        return;
    };
    if !farm_signature_valid(signature) {
        return;
    }
    info.features.add("Field Accessible Reliability Metrics");

    if info.identity.date_of_manufacture.is_none() {
        let two_digits = |q: u64| {
            let b = [(q & 0xFF) as u8, (q >> 8 & 0xFF) as u8];
            if b.iter().all(u8::is_ascii_digit) {
                Some((b[0] - b'0') * 10 + (b[1] - b'0'))
            } else {
                None
            }
        };
        let week = le::u64(body, FARM_DOM_WEEK_QWORD).and_then(two_digits);
        let year = le::u64(body, FARM_DOM_YEAR_QWORD).and_then(two_digits);
        if let (Some(week), Some(year)) = (week, year) {
            if (1..=53).contains(&week) {
                info.identity.date_of_manufacture = Some(crate::info::DateOfManufacture {
                    week,
                    year: 2000 + u16::from(year),
                });
            }
        }
    }
}
