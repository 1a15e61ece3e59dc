// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Aggregation of defects the drive knows about but has not yet
//! reallocated: the ATA pending defects log, the SCSI pending defects
//! subpage, self-test read failures, and background scan results.

use crate::DefectError;
use ata_spec::log::ExtSelfTestLog;
use ata_spec::log::LogAddress;
use ata_spec::log::PendingDefectDescriptor;
use ata_spec::log::PendingDefectsHeader;
use ata_spec::log::LOG_PAGE_BYTES;
use ata_spec::log::SELF_TEST_RESULT_READ_FAILURE;
use ata_spec::AtaCommand;
use scsi_spec::LogPageHeader;
use scsi_spec::LogParameterHeader;
use scsi_spec::LogSenseCdb;
use scsi_spec::LogSensePageControl;
use scsi_spec::ScsiOp;
use scsi_spec::LOG_PAGE_BACKGROUND_SCAN;
use scsi_spec::LOG_PAGE_SELF_TEST_RESULTS;
use scsi_spec::LOG_PARAM_BG_SCAN_FIRST;
use scsi_spec::LOG_PARAM_BG_SCAN_LAST;
use scsi_spec::LOG_PARAM_PENDING_DEFECT_COUNT;
use scsi_spec::LOG_PARAM_PENDING_DEFECT_LAST;
use scsi_spec::LOG_PC_CUMULATIVE;
use scsi_spec::LOG_SUBPAGE_PENDING_DEFECTS;
use storage_passthru::AtaTaskfile;
use storage_passthru::DataDirection;
use storage_passthru::PassthroughDevice;
use storage_passthru::Protocol;
use storage_passthru::TransportError;
use storage_wire::be;
use zerocopy::FromBytes;
use zerocopy::IntoBytes;

/// A sector the drive has marked as suspect but not yet reallocated.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PendingDefect {
    pub lba: u64,
    /// Drive power-on hours when the defect was recorded.
    pub power_on_hours: u32,
}

/// One background media scan finding.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BackgroundScanResult {
    pub accumulated_power_on_minutes: u32,
    pub reassign_status: u8,
    pub sense_key: u8,
    pub asc: u8,
    pub ascq: u8,
    pub lba: u64,
}

/// Background scan results logs never report more entries than this.
const BG_SCAN_MAX_RESULTS: usize = 2048;

/// Reads the device's pending defect list, folding in read failures
/// recorded by past self-tests.
pub fn read_pending_defects(
    dev: &mut dyn PassthroughDevice,
) -> Result<Vec<PendingDefect>, DefectError> {
    match dev.protocol() {
        Protocol::Ata => ata_pending(dev),
        Protocol::Scsi => scsi_pending(dev),
        Protocol::Nvme => Err(DefectError::NotSupported),
    }
}

/// Reads the background media scan results log (SCSI only).
pub fn read_background_scan_results(
    dev: &mut dyn PassthroughDevice,
) -> Result<Vec<BackgroundScanResult>, DefectError> {
    if dev.protocol() != Protocol::Scsi {
        return Err(DefectError::NotSupported);
    }
    let mut buf = vec![0u8; 0xFFFC];
    let payload = log_sense(dev, LOG_PAGE_BACKGROUND_SCAN, 0, &mut buf)
        .ok_or(DefectError::NotSupported)?;
    let mut out = Vec::new();
    for (code, body) in parameters(payload) {
        // Parameter 0 is the scan status; entries follow.
        if !(LOG_PARAM_BG_SCAN_FIRST..=LOG_PARAM_BG_SCAN_LAST).contains(&code) {
            if code > LOG_PARAM_BG_SCAN_LAST {
                break;
            }
            continue;
        }
        if out.len() == BG_SCAN_MAX_RESULTS {
            break;
        }
        let (Some(minutes), Some(lba)) = (be::u32(body, 0), be::u64(body, 12)) else {
            continue;
        };
        out.push(BackgroundScanResult {
            accumulated_power_on_minutes: minutes,
            reassign_status: body[4] >> 4,
            sense_key: body[4] & 0x0F,
            asc: body[5],
            ascq: body[6],
            lba,
        });
    }
    Ok(out)
}

fn ata_pending(dev: &mut dyn PassthroughDevice) -> Result<Vec<PendingDefect>, DefectError> {
    let mut first = [0u8; LOG_PAGE_BYTES];
    read_log(dev, LogAddress::PENDING_DEFECTS, &mut first).map_err(soft_failure)?;
    let (header, _) = PendingDefectsHeader::read_from_prefix(&first[..])
        .map_err(|_| DefectError::Transport(TransportError::Transport))?;
    let count = header.count.get() as usize;

    // Re-read the whole log once the descriptor count is known.
    let needed = size_of::<PendingDefectsHeader>() + count * size_of::<PendingDefectDescriptor>();
    let mut data = first.to_vec();
    if needed > data.len() {
        data = vec![0u8; needed.div_ceil(LOG_PAGE_BYTES) * LOG_PAGE_BYTES];
        read_log(dev, LogAddress::PENDING_DEFECTS, &mut data)
            .map_err(DefectError::Transport)?;
    }

    let mut out = Vec::with_capacity(count);
    for chunk in data[size_of::<PendingDefectsHeader>()..]
        .chunks_exact(size_of::<PendingDefectDescriptor>())
        .take(count)
    {
        let Ok(descriptor) = PendingDefectDescriptor::read_from_bytes(chunk) else {
            continue;
        };
        out.push(PendingDefect {
            lba: descriptor.lba.get(),
            power_on_hours: descriptor.power_on_hours.get(),
        });
    }
    harvest_ata_self_test(dev, &mut out);
    Ok(out)
}

/// Self-test read failures name sectors that belong in the pending
/// list even when the drive has not logged them there yet.
fn harvest_ata_self_test(dev: &mut dyn PassthroughDevice, out: &mut Vec<PendingDefect>) {
    let mut buf = [0u8; LOG_PAGE_BYTES];
    if read_log(dev, LogAddress::EXT_SMART_SELF_TEST, &mut buf).is_err() {
        return;
    }
    let Ok(log) = ExtSelfTestLog::read_from_bytes(&buf[..]) else {
        return;
    };
    for descriptor in &log.descriptors {
        if descriptor.is_unused()
            || descriptor.result_code() != SELF_TEST_RESULT_READ_FAILURE
        {
            continue;
        }
        out.push(PendingDefect {
            lba: descriptor.failing_lba(),
            power_on_hours: descriptor.lifetime_timestamp.get().into(),
        });
    }
}

fn scsi_pending(dev: &mut dyn PassthroughDevice) -> Result<Vec<PendingDefect>, DefectError> {
    let mut buf = vec![0u8; 0xFFFC];
    let payload = log_sense(
        dev,
        LOG_PAGE_BACKGROUND_SCAN,
        LOG_SUBPAGE_PENDING_DEFECTS,
        &mut buf,
    )
    .ok_or(DefectError::NotSupported)?;

    let mut reported = None;
    let mut out = Vec::new();
    for (code, body) in parameters(payload) {
        match code {
            LOG_PARAM_PENDING_DEFECT_COUNT => reported = be::u32(body, 0),
            code if code <= LOG_PARAM_PENDING_DEFECT_LAST => {
                let (Some(poh), Some(lba)) = (be::u32(body, 0), be::u64(body, 4)) else {
                    continue;
                };
                out.push(PendingDefect {
                    lba,
                    power_on_hours: poh,
                });
            }
            // An out-of-range parameter code ends the defect entries.
            _ => break,
        }
    }
    if reported.is_some_and(|n| n as usize != out.len()) {
        tracing::debug!(
            reported = reported.unwrap_or(0),
            parsed = out.len(),
            "pending defect count disagrees with entry count"
        );
    }
    harvest_scsi_self_test(dev, &mut out);
    Ok(out)
}

fn harvest_scsi_self_test(dev: &mut dyn PassthroughDevice, out: &mut Vec<PendingDefect>) {
    let mut buf = [0u8; 512];
    let Some(payload) = log_sense(dev, LOG_PAGE_SELF_TEST_RESULTS, 0, &mut buf) else {
        return;
    };
    for (code, body) in parameters(payload) {
        if !(0x0001..=0x0014).contains(&code) || body.len() < 12 {
            continue;
        }
        if body[0] & 0x0F != SELF_TEST_RESULT_READ_FAILURE {
            continue;
        }
        let Some(lba) = be::u64(body, 4) else { continue };
        if lba == u64::MAX {
            // No failing address was recorded.
            continue;
        }
        out.push(PendingDefect {
            lba,
            power_on_hours: be::u16(body, 2).unwrap_or(0).into(),
        });
    }
}

fn read_log(
    dev: &mut dyn PassthroughDevice,
    log: LogAddress,
    buf: &mut [u8],
) -> Result<(), TransportError> {
    debug_assert_eq!(buf.len() % LOG_PAGE_BYTES, 0);
    let taskfile = AtaTaskfile {
        command: AtaCommand::READ_LOG_EXT.0,
        features: 0,
        count: (buf.len() / LOG_PAGE_BYTES) as u16,
        lba: u64::from(log.0),
        device: 0x40,
        extended: true,
        dma: false,
    };
    dev.ata_command(&taskfile, DataDirection::FromDevice, buf)?;
    Ok(())
}

/// A log the device refuses to serve means the feature is absent, not
/// that the transfer failed.
fn soft_failure(err: TransportError) -> DefectError {
    match err {
        TransportError::InvalidOpcode | TransportError::Aborted | TransportError::NotSupported => {
            DefectError::NotSupported
        }
        err => DefectError::Transport(err),
    }
}

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
    if header.code() != page || header.subpage_code != subpage {
        return None;
    }
    // A page served with a subpage must carry the SPF bit, or the
    // device ignored the subpage field and served something else.
    if subpage != 0 && !header.subpages_supported() {
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

#[cfg(test)]
mod tests {
    use super::*;
    use storage_passthru::AtaRegisters;
    use storage_passthru::EmulatedDevice;
    use zerocopy::FromZeros;

    fn log_page(page: u8, subpage: u8, params: &[(u16, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (code, record) in params {
            let header = LogParameterHeader {
                parameter_code: (*code).into(),
                control: 0,
                parameter_length: record.len() as u8,
            };
            body.extend_from_slice(header.as_bytes());
            body.extend_from_slice(record);
        }
        let mut out = vec![
            page | if subpage != 0 { 0x40 } else { 0 },
            subpage,
            0,
            0,
        ];
        out[2..4].copy_from_slice(&(body.len() as u16).to_be_bytes());
        out.extend(body);
        out
    }

    fn scsi_log_device(pages: Vec<((u8, u8), Vec<u8>)>) -> EmulatedDevice {
        EmulatedDevice::new(Protocol::Scsi).with_scsi(move |cdb, _, data: &mut [u8]| {
            if cdb[0] != ScsiOp::LOG_SENSE.0 {
                return Err(TransportError::InvalidOpcode);
            }
            let (page, subpage) = (cdb[2] & 0x3F, cdb[3]);
            match pages.iter().find(|((p, s), _)| *p == page && *s == subpage) {
                Some((_, contents)) => {
                    let n = contents.len().min(data.len());
                    data[..n].copy_from_slice(&contents[..n]);
                    Ok(())
                }
                None => Err(TransportError::InvalidOpcode),
            }
        })
    }

    fn pending_entry(poh: u32, lba: u64) -> Vec<u8> {
        let mut body = poh.to_be_bytes().to_vec();
        body.extend_from_slice(&lba.to_be_bytes());
        body
    }

    #[test]
    fn scsi_pending_defects_parse() {
        let page = log_page(
            LOG_PAGE_BACKGROUND_SCAN,
            LOG_SUBPAGE_PENDING_DEFECTS,
            &[
                (LOG_PARAM_PENDING_DEFECT_COUNT, &2u32.to_be_bytes()),
                (0x0001, &pending_entry(100, 0x1000)),
                (0x0002, &pending_entry(250, 0x2000)),
            ],
        );
        let mut dev = scsi_log_device(vec![(
            (LOG_PAGE_BACKGROUND_SCAN, LOG_SUBPAGE_PENDING_DEFECTS),
            page,
        )]);

        let defects = read_pending_defects(&mut dev).unwrap();
        assert_eq!(
            defects,
            vec![
                PendingDefect {
                    lba: 0x1000,
                    power_on_hours: 100
                },
                PendingDefect {
                    lba: 0x2000,
                    power_on_hours: 250
                },
            ]
        );
    }

    #[test]
    fn missing_spf_bit_rejects_the_page() {
        // Same payload, but the header does not set bit 6 of byte 0.
        let mut page = log_page(
            LOG_PAGE_BACKGROUND_SCAN,
            LOG_SUBPAGE_PENDING_DEFECTS,
            &[(0x0001, &pending_entry(1, 2))],
        );
        page[0] &= !0x40;
        let mut dev = scsi_log_device(vec![(
            (LOG_PAGE_BACKGROUND_SCAN, LOG_SUBPAGE_PENDING_DEFECTS),
            page,
        )]);

        match read_pending_defects(&mut dev) {
            Err(DefectError::NotSupported) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn out_of_range_parameter_ends_the_scan() {
        let page = log_page(
            LOG_PAGE_BACKGROUND_SCAN,
            LOG_SUBPAGE_PENDING_DEFECTS,
            &[
                (0x0001, &pending_entry(5, 0xAA)),
                (0xF001, &pending_entry(6, 0xBB)),
                (0x0002, &pending_entry(7, 0xCC)),
            ],
        );
        let mut dev = scsi_log_device(vec![(
            (LOG_PAGE_BACKGROUND_SCAN, LOG_SUBPAGE_PENDING_DEFECTS),
            page,
        )]);

        let defects = read_pending_defects(&mut dev).unwrap();
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].lba, 0xAA);
    }

    #[test]
    fn self_test_read_failures_fold_into_pending_list() {
        let pending = log_page(
            LOG_PAGE_BACKGROUND_SCAN,
            LOG_SUBPAGE_PENDING_DEFECTS,
            &[(LOG_PARAM_PENDING_DEFECT_COUNT, &0u32.to_be_bytes())],
        );
        // result 0x7 at POH 42, failing LBA 0x5000.
        let mut body = vec![0x17, 0x01];
        body.extend_from_slice(&42u16.to_be_bytes());
        body.extend_from_slice(&0x5000u64.to_be_bytes());
        body.extend_from_slice(&[0; 4]);
        let self_test = log_page(LOG_PAGE_SELF_TEST_RESULTS, 0, &[(0x0001, &body)]);

        let mut dev = scsi_log_device(vec![
            (
                (LOG_PAGE_BACKGROUND_SCAN, LOG_SUBPAGE_PENDING_DEFECTS),
                pending,
            ),
            ((LOG_PAGE_SELF_TEST_RESULTS, 0), self_test),
        ]);

        let defects = read_pending_defects(&mut dev).unwrap();
        assert_eq!(
            defects,
            vec![PendingDefect {
                lba: 0x5000,
                power_on_hours: 42
            }]
        );
    }

    #[test]
    fn background_scan_results_parse() {
        let mut entry = 7200u32.to_be_bytes().to_vec();
        entry.push(0x15); // reassigned (1), sense key 5
        entry.push(0x11);
        entry.push(0x01);
        entry.extend_from_slice(&[0; 5]);
        entry.extend_from_slice(&0xDEAD_BEEFu64.to_be_bytes());
        let page = log_page(LOG_PAGE_BACKGROUND_SCAN, 0, &[(0x0001, &entry)]);
        let mut dev = scsi_log_device(vec![((LOG_PAGE_BACKGROUND_SCAN, 0), page)]);

        let results = read_background_scan_results(&mut dev).unwrap();
        assert_eq!(
            results,
            vec![BackgroundScanResult {
                accumulated_power_on_minutes: 7200,
                reassign_status: 1,
                sense_key: 5,
                asc: 0x11,
                ascq: 0x01,
                lba: 0xDEAD_BEEF,
            }]
        );
    }

    fn ata_log_device(pages: Vec<(u8, Vec<u8>)>) -> EmulatedDevice {
        EmulatedDevice::new(Protocol::Ata).with_ata(move |taskfile: &AtaTaskfile, _, data: &mut [u8]| {
            if taskfile.command != AtaCommand::READ_LOG_EXT.0 {
                return Err(TransportError::InvalidOpcode);
            }
            let log = (taskfile.lba & 0xFF) as u8;
            match pages.iter().find(|(l, _)| *l == log) {
                Some((_, contents)) => {
                    let n = contents.len().min(data.len());
                    data[..n].copy_from_slice(&contents[..n]);
                    Ok(AtaRegisters {
                        status: 0x50,
                        error: 0,
                        count: 0,
                        lba: 0,
                        device: 0x40,
                    })
                }
                None => Err(TransportError::Aborted),
            }
        })
    }

    fn ata_pending_log(entries: &[(u32, u64)]) -> Vec<u8> {
        let mut header = PendingDefectsHeader::new_zeroed();
        header.count = (entries.len() as u32).into();
        let mut log = header.as_bytes().to_vec();
        for &(poh, lba) in entries {
            let descriptor = PendingDefectDescriptor {
                power_on_hours: poh.into(),
                reserved: [0; 4],
                lba: lba.into(),
            };
            log.extend_from_slice(descriptor.as_bytes());
        }
        log.resize(log.len().div_ceil(LOG_PAGE_BYTES) * LOG_PAGE_BYTES, 0);
        log
    }

    #[test]
    fn ata_pending_log_parses_descriptors() {
        let log = ata_pending_log(&[(12, 0x800), (40, 0x801)]);
        let mut dev = ata_log_device(vec![(LogAddress::PENDING_DEFECTS.0, log)]);

        let defects = read_pending_defects(&mut dev).unwrap();
        assert_eq!(
            defects,
            vec![
                PendingDefect {
                    lba: 0x800,
                    power_on_hours: 12
                },
                PendingDefect {
                    lba: 0x801,
                    power_on_hours: 40
                },
            ]
        );
    }

    #[test]
    fn ata_pending_log_spans_pages() {
        // 40 descriptors need two 512-byte pages.
        let entries: Vec<_> = (0..40).map(|i| (i, 0x1_0000 + u64::from(i))).collect();
        let log = ata_pending_log(&entries);
        assert_eq!(log.len(), 2 * LOG_PAGE_BYTES);
        let mut dev = ata_log_device(vec![(LogAddress::PENDING_DEFECTS.0, log)]);

        let defects = read_pending_defects(&mut dev).unwrap();
        assert_eq!(defects.len(), 40);
        assert_eq!(defects[39].lba, 0x1_0027);
    }

    #[test]
    fn ata_missing_log_is_not_supported() {
        let mut dev = ata_log_device(vec![]);
        match read_pending_defects(&mut dev) {
            Err(DefectError::NotSupported) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn ata_self_test_failures_fold_in() {
        use ata_spec::log::ExtSelfTestDescriptor;

        let mut log = ExtSelfTestLog::new_zeroed();
        log.index = 1.into();
        let mut descriptor = ExtSelfTestDescriptor::new_zeroed();
        descriptor.test_code = 2;
        descriptor.status = 0x74;
        descriptor.lifetime_timestamp = 321.into();
        descriptor.failing_lba = [0x00, 0x40, 0x00, 0x00, 0x00, 0x00];
        log.descriptors[0] = descriptor;

        let mut dev = ata_log_device(vec![
            (LogAddress::PENDING_DEFECTS.0, ata_pending_log(&[])),
            (LogAddress::EXT_SMART_SELF_TEST.0, log.as_bytes().to_vec()),
        ]);

        let defects = read_pending_defects(&mut dev).unwrap();
        assert_eq!(
            defects,
            vec![PendingDefect {
                lba: 0x4000,
                power_on_hours: 321
            }]
        );
    }
}
