// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! SCSI defect list retrieval and cross-protocol pending-defect
//! aggregation.
//!
//! [`read_defect_list`] pulls the primary and grown defect lists with
//! READ DEFECT DATA, probing the header first so the element storage is
//! sized before any descriptor is transferred, and paging through long
//! lists when the device honors the 12-byte command's address
//! descriptor index. [`read_pending_defects`] and
//! [`read_background_scan_results`] aggregate the not-yet-reallocated
//! defects a drive reports through its logs.

mod pending;

pub use pending::read_background_scan_results;
pub use pending::read_pending_defects;
pub use pending::BackgroundScanResult;
pub use pending::PendingDefect;

use scsi_spec::DefectListFlags;
use scsi_spec::DefectListFormat;
use scsi_spec::DefectListHeader10;
use scsi_spec::DefectListHeader12;
use scsi_spec::LongBlockDescriptor;
use scsi_spec::OneCommandParameterData;
use scsi_spec::PhysicalAddressDescriptor;
use scsi_spec::ReadDefectData10Cdb;
use scsi_spec::ReadDefectData12Cdb;
use scsi_spec::ReportSupportedOpCodesCdb;
use scsi_spec::ScsiOp;
use scsi_spec::ShortBlockDescriptor;
use scsi_spec::DEFECT_DATA10_MAX_LENGTH;
use scsi_spec::DEFECT_DATA12_MAX_LENGTH;
use scsi_spec::DEFECT_FULL_TRACK;
use scsi_spec::OP_SUPPORT_STANDARD;
use scsi_spec::OP_SUPPORT_VENDOR;
use scsi_spec::REPORT_OPTIONS_ONE_COMMAND;
use scsi_spec::SERVICE_ACTION_REPORT_SUPPORTED_OP_CODES;
use storage_passthru::DataDirection;
use storage_passthru::PassthroughDevice;
use storage_passthru::TransportError;
use thiserror::Error;
use zerocopy::FromBytes;
use zerocopy::IntoBytes;

#[derive(Debug, Error)]
pub enum DefectError {
    /// Vendor-specific and reserved formats carry no defined address
    /// descriptor and cannot be requested or parsed.
    #[error("defect list format {0:#x} has no defined address descriptor")]
    BadParameter(u8),
    /// The device refused both the 12- and 10-byte command forms.
    #[error("the device does not support READ DEFECT DATA")]
    NotSupported,
    #[error("defect list transfer failed")]
    Transport(#[source] TransportError),
}

/// A primary/grown defect list as reported by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScsiDefectList {
    /// The address descriptor format actually returned, which may be a
    /// substitute for the one requested.
    pub format: DefectListFormat,
    pub includes_primary: bool,
    pub includes_grown: bool,
    /// The list is shared with other logical units behind the same
    /// target, so counts here overstate this unit's own defects.
    pub device_has_multiple_lus: bool,
    /// The full list is longer than the command form in use can
    /// transfer; `elements` holds the transferable prefix.
    pub overflow: bool,
    pub elements: Vec<DefectDescriptor>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DefectDescriptor {
    /// Short- and long-block formats: a logical block address.
    Block(u64),
    /// Bytes-from-index and physical-sector formats.
    Physical(PhysicalDefect),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PhysicalDefect {
    pub cylinder: u32,
    pub head: u8,
    /// Sector number or bytes from index, depending on the format.
    pub value: u32,
    /// Set on the first descriptor of a run describing one physical
    /// defect. Only the extended formats carry this flag.
    pub multi_address_start: bool,
}

impl PhysicalDefect {
    /// The whole track is defective rather than one sector or byte
    /// range.
    pub fn is_full_track(&self) -> bool {
        self.value == DEFECT_FULL_TRACK
    }
}

/// Paged reads transfer this much per command, header included.
const PAGE_WINDOW_BYTES: usize = 65536;

/// Reads the requested defect list, probing the header before any
/// element is transferred.
pub fn read_defect_list(
    dev: &mut dyn PassthroughDevice,
    format: DefectListFormat,
    want_primary: bool,
    want_grown: bool,
) -> Result<ScsiDefectList, DefectError> {
    if format.descriptor_size().is_none() {
        return Err(DefectError::BadParameter(format.0));
    }
    let request = DefectListFlags::new()
        .with_format(format.0)
        .with_primary(want_primary)
        .with_grown(want_grown);

    // Header-only probe; fall back to the 10-byte command form when the
    // 12-byte one is not implemented.
    let mut use_ten = false;
    let header = match probe_header(dev, request, false) {
        Ok(header) => header,
        Err(TransportError::InvalidOpcode) => {
            use_ten = true;
            match probe_header(dev, request, true) {
                Ok(header) => header,
                Err(TransportError::InvalidOpcode) => return Err(DefectError::NotSupported),
                Err(err) => return Err(DefectError::Transport(err)),
            }
        }
        Err(err) => return Err(DefectError::Transport(err)),
    };

    // The device may substitute a format it supports for the one asked
    // for; everything below follows the echoed format.
    let format = DefectListFormat(header.flags.format());
    let Some(descriptor_size) = format.descriptor_size() else {
        return Err(DefectError::BadParameter(format.0));
    };
    let total = header.list_bytes as usize / descriptor_size;
    tracing::debug!(
        format = format.0,
        total,
        use_ten,
        "defect list header probe"
    );

    let mut list = ScsiDefectList {
        format,
        includes_primary: header.flags.primary(),
        includes_grown: header.flags.grown(),
        device_has_multiple_lus: dev.lun_count().is_ok_and(|n| n > 1),
        overflow: false,
        elements: Vec::new(),
    };
    if total == 0 {
        return Ok(list);
    }

    if use_ten || !supports_address_index(dev) {
        read_single(dev, request, use_ten, descriptor_size, total, &mut list)?;
    } else {
        read_paged(dev, request, descriptor_size, total, &mut list)?;
    }
    Ok(list)
}

struct ListHeader {
    flags: DefectListFlags,
    list_bytes: u32,
}

fn probe_header(
    dev: &mut dyn PassthroughDevice,
    flags: DefectListFlags,
    use_ten: bool,
) -> Result<ListHeader, TransportError> {
    if use_ten {
        let mut buf = [0u8; size_of::<DefectListHeader10>()];
        issue(dev, flags, true, 0, &mut buf)?;
        let header =
            DefectListHeader10::read_from_bytes(&buf[..]).map_err(|_| TransportError::Transport)?;
        Ok(ListHeader {
            flags: header.flags,
            list_bytes: header.defect_list_length.get().into(),
        })
    } else {
        let mut buf = [0u8; size_of::<DefectListHeader12>()];
        issue(dev, flags, false, 0, &mut buf)?;
        let header =
            DefectListHeader12::read_from_bytes(&buf[..]).map_err(|_| TransportError::Transport)?;
        Ok(ListHeader {
            flags: header.flags,
            list_bytes: header.defect_list_length.get(),
        })
    }
}

fn issue(
    dev: &mut dyn PassthroughDevice,
    flags: DefectListFlags,
    use_ten: bool,
    index: u32,
    buf: &mut [u8],
) -> Result<(), TransportError> {
    if use_ten {
        let cdb = ReadDefectData10Cdb {
            operation_code: ScsiOp::READ_DEFECT_DATA10,
            reserved1: 0,
            flags,
            reserved2: [0; 4],
            allocation_length: (buf.len() as u16).into(),
            control: 0,
        };
        dev.scsi_command(cdb.as_bytes(), DataDirection::FromDevice, buf)
    } else {
        let cdb = ReadDefectData12Cdb {
            operation_code: ScsiOp::READ_DEFECT_DATA12,
            flags,
            address_descriptor_index: index.into(),
            allocation_length: (buf.len() as u32).into(),
            reserved: 0,
            control: 0,
        };
        dev.scsi_command(cdb.as_bytes(), DataDirection::FromDevice, buf)
    }
}

/// One command for the whole list, clamped to what the command form can
/// address.
fn read_single(
    dev: &mut dyn PassthroughDevice,
    flags: DefectListFlags,
    use_ten: bool,
    descriptor_size: usize,
    total: usize,
    list: &mut ScsiDefectList,
) -> Result<(), DefectError> {
    let (header_len, max) = if use_ten {
        (
            size_of::<DefectListHeader10>(),
            DEFECT_DATA10_MAX_LENGTH as usize,
        )
    } else {
        (
            size_of::<DefectListHeader12>(),
            DEFECT_DATA12_MAX_LENGTH as usize,
        )
    };
    let wanted = header_len + total * descriptor_size;
    list.overflow = wanted > max;
    let mut buf = vec![0u8; wanted.min(max)];
    issue(dev, flags, use_ten, 0, &mut buf).map_err(DefectError::Transport)?;
    let payload = &buf[header_len..];
    let usable = (payload.len() / descriptor_size).min(total) * descriptor_size;
    list.elements.reserve(usable / descriptor_size);
    parse_descriptors(list.format, &payload[..usable], &mut list.elements);
    Ok(())
}

/// Walks the list in fixed windows via the 12-byte command's address
/// descriptor index.
fn read_paged(
    dev: &mut dyn PassthroughDevice,
    flags: DefectListFlags,
    descriptor_size: usize,
    total: usize,
    list: &mut ScsiDefectList,
) -> Result<(), DefectError> {
    let header_len = size_of::<DefectListHeader12>();
    let per_window = (PAGE_WINDOW_BYTES - header_len) / descriptor_size;
    list.elements.reserve(total);
    let mut index = 0;
    while index < total {
        let count = per_window.min(total - index);
        let mut buf = vec![0u8; header_len + count * descriptor_size];
        issue(dev, flags, false, index as u32, &mut buf).map_err(DefectError::Transport)?;
        parse_descriptors(list.format, &buf[header_len..], &mut list.elements);
        index += count;
    }
    Ok(())
}

/// Asks REPORT SUPPORTED OPERATION CODES whether the 12-byte command
/// honors the address descriptor index: the one-command usage map
/// mirrors the CDB, and the index occupies bytes 2-5.
fn supports_address_index(dev: &mut dyn PassthroughDevice) -> bool {
    let mut buf = [0u8; 64];
    let cdb = ReportSupportedOpCodesCdb {
        operation_code: ScsiOp::MAINTENANCE_IN,
        service_action: SERVICE_ACTION_REPORT_SUPPORTED_OP_CODES,
        reporting_options: REPORT_OPTIONS_ONE_COMMAND,
        requested_operation_code: ScsiOp::READ_DEFECT_DATA12.0,
        requested_service_action: 0.into(),
        allocation_length: (buf.len() as u32).into(),
        reserved: 0,
        control: 0,
    };
    if dev
        .scsi_command(cdb.as_bytes(), DataDirection::FromDevice, &mut buf)
        .is_err()
    {
        return false;
    }
    let Ok((data, usage)) = OneCommandParameterData::read_from_prefix(&buf[..]) else {
        return false;
    };
    if data.support_value() != OP_SUPPORT_STANDARD && data.support_value() != OP_SUPPORT_VENDOR {
        return false;
    }
    data.cdb_size.get() >= 6 && usage.len() >= 6 && usage[2..6].iter().any(|&b| b != 0)
}

fn parse_descriptors(
    format: DefectListFormat,
    payload: &[u8],
    out: &mut Vec<DefectDescriptor>,
) {
    match format {
        DefectListFormat::SHORT_BLOCK => out.extend(
            payload
                .chunks_exact(size_of::<ShortBlockDescriptor>())
                .filter_map(|chunk| ShortBlockDescriptor::read_from_bytes(chunk).ok())
                .map(|d| DefectDescriptor::Block(d.block_address.get().into())),
        ),
        DefectListFormat::LONG_BLOCK => out.extend(
            payload
                .chunks_exact(size_of::<LongBlockDescriptor>())
                .filter_map(|chunk| LongBlockDescriptor::read_from_bytes(chunk).ok())
                .map(|d| DefectDescriptor::Block(d.block_address.get())),
        ),
        DefectListFormat::EXTENDED_BYTES_FROM_INDEX
        | DefectListFormat::EXTENDED_PHYSICAL_SECTOR
        | DefectListFormat::BYTES_FROM_INDEX
        | DefectListFormat::PHYSICAL_SECTOR => {
            let extended = matches!(
                format,
                DefectListFormat::EXTENDED_BYTES_FROM_INDEX
                    | DefectListFormat::EXTENDED_PHYSICAL_SECTOR
            );
            out.extend(
                payload
                    .chunks_exact(size_of::<PhysicalAddressDescriptor>())
                    .filter_map(|chunk| PhysicalAddressDescriptor::read_from_bytes(chunk).ok())
                    .map(|d| {
                        DefectDescriptor::Physical(PhysicalDefect {
                            cylinder: d.cylinder_number(),
                            head: d.head,
                            value: d.address_value(),
                            multi_address_start: extended && d.multi_address_start(),
                        })
                    }),
            );
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage_passthru::EmulatedDevice;
    use storage_passthru::Protocol;
    use zerocopy::FromZeros;

    /// A device serving one defect list. `twelve` enables the 12-byte
    /// command form; `paged` additionally advertises the address
    /// descriptor index through RSOC.
    fn defect_device(
        format: DefectListFormat,
        descriptors: Vec<u8>,
        twelve: bool,
        paged: bool,
    ) -> EmulatedDevice {
        EmulatedDevice::new(Protocol::Scsi).with_scsi(move |cdb, _, data: &mut [u8]| {
            if cdb[0] == ScsiOp::MAINTENANCE_IN.0
                && cdb[1] == SERVICE_ACTION_REPORT_SUPPORTED_OP_CODES
            {
                let mut response = OneCommandParameterData::new_zeroed();
                response.support = OP_SUPPORT_STANDARD;
                response.cdb_size = 12.into();
                let mut contents = response.as_bytes().to_vec();
                let mut usage = [0u8; 12];
                if paged {
                    usage[2..6].fill(0xFF);
                }
                contents.extend_from_slice(&usage);
                let n = contents.len().min(data.len());
                data[..n].copy_from_slice(&contents[..n]);
                return Ok(());
            }
            let flags = DefectListFlags::new()
                .with_format(format.0)
                .with_grown(true)
                .with_primary(false);
            let (start, mut contents) = if cdb[0] == ScsiOp::READ_DEFECT_DATA12.0 {
                if !twelve {
                    return Err(TransportError::InvalidOpcode);
                }
                let index = u32::from_be_bytes([cdb[2], cdb[3], cdb[4], cdb[5]]) as usize;
                let header = DefectListHeader12 {
                    reserved: 0,
                    flags,
                    reserved2: [0; 2],
                    defect_list_length: (descriptors.len() as u32).into(),
                };
                (index * 8, header.as_bytes().to_vec())
            } else if cdb[0] == ScsiOp::READ_DEFECT_DATA10.0 {
                let header = DefectListHeader10 {
                    reserved: 0,
                    flags,
                    defect_list_length: (descriptors.len().min(0xFFFF) as u16).into(),
                };
                (0, header.as_bytes().to_vec())
            } else {
                return Err(TransportError::InvalidOpcode);
            };
            contents.extend_from_slice(&descriptors[start.min(descriptors.len())..]);
            let n = contents.len().min(data.len());
            data[..n].copy_from_slice(&contents[..n]);
            Ok(())
        })
    }

    fn long_block(lba: u64) -> [u8; 8] {
        lba.to_be_bytes()
    }

    #[test]
    fn long_block_list_two_elements() {
        let mut descriptors = Vec::new();
        descriptors.extend_from_slice(&long_block(0x1_0000));
        descriptors.extend_from_slice(&long_block(0x2_0000_0001));

        let mut dev = defect_device(DefectListFormat::LONG_BLOCK, descriptors, true, false);
        let list = read_defect_list(&mut dev, DefectListFormat::LONG_BLOCK, false, true).unwrap();

        assert_eq!(list.format, DefectListFormat::LONG_BLOCK);
        assert!(list.includes_grown);
        assert!(!list.includes_primary);
        assert!(!list.overflow);
        assert_eq!(
            list.elements,
            vec![
                DefectDescriptor::Block(0x1_0000),
                DefectDescriptor::Block(0x2_0000_0001),
            ]
        );
    }

    #[test]
    fn paged_read_matches_single_command() {
        // Enough descriptors that the paged path needs two windows.
        let count = 10_000u64;
        let mut descriptors = Vec::with_capacity(count as usize * 8);
        for lba in 0..count {
            descriptors.extend_from_slice(&long_block(lba * 17));
        }

        let mut single = defect_device(
            DefectListFormat::LONG_BLOCK,
            descriptors.clone(),
            true,
            false,
        );
        let mut paged = defect_device(DefectListFormat::LONG_BLOCK, descriptors, true, true);

        let from_single =
            read_defect_list(&mut single, DefectListFormat::LONG_BLOCK, true, true).unwrap();
        let from_paged =
            read_defect_list(&mut paged, DefectListFormat::LONG_BLOCK, true, true).unwrap();

        assert_eq!(from_single.elements.len(), count as usize);
        assert_eq!(from_single.elements, from_paged.elements);
    }

    #[test]
    fn ten_byte_fallback_parses_short_blocks() {
        let mut descriptors = Vec::new();
        for lba in [0x100u32, 0x200, 0x300] {
            descriptors.extend_from_slice(&lba.to_be_bytes());
        }

        let mut dev = defect_device(DefectListFormat::SHORT_BLOCK, descriptors, false, false);
        let list = read_defect_list(&mut dev, DefectListFormat::SHORT_BLOCK, true, true).unwrap();

        assert_eq!(
            list.elements,
            vec![
                DefectDescriptor::Block(0x100),
                DefectDescriptor::Block(0x200),
                DefectDescriptor::Block(0x300),
            ]
        );
    }

    #[test]
    fn physical_sector_runs_and_full_track() {
        let mut descriptors = Vec::new();
        // Run start on cylinder 5 head 1, continuation, then a full
        // track on another head.
        descriptors.extend_from_slice(&[0x00, 0x00, 0x05, 0x01, 0x80, 0x00, 0x00, 0x20]);
        descriptors.extend_from_slice(&[0x00, 0x00, 0x05, 0x01, 0x00, 0x00, 0x00, 0x21]);
        descriptors.extend_from_slice(&[0x00, 0x00, 0x05, 0x02, 0x8F, 0xFF, 0xFF, 0xFF]);

        let mut dev = defect_device(
            DefectListFormat::EXTENDED_PHYSICAL_SECTOR,
            descriptors,
            true,
            false,
        );
        let list = read_defect_list(
            &mut dev,
            DefectListFormat::EXTENDED_PHYSICAL_SECTOR,
            true,
            true,
        )
        .unwrap();

        let physical: Vec<_> = list
            .elements
            .iter()
            .map(|e| match e {
                DefectDescriptor::Physical(p) => *p,
                other => panic!("unexpected descriptor {other:?}"),
            })
            .collect();
        assert_eq!(physical.len(), 3);
        assert!(physical[0].multi_address_start);
        assert_eq!(physical[0].cylinder, 5);
        assert_eq!(physical[0].head, 1);
        assert_eq!(physical[0].value, 0x20);
        assert!(!physical[1].multi_address_start);
        assert!(physical[2].multi_address_start);
        assert!(physical[2].is_full_track());
    }

    #[test]
    fn vendor_format_is_rejected_before_any_command() {
        let mut dev = EmulatedDevice::new(Protocol::Scsi)
            .with_scsi(|_, _, _: &mut [u8]| panic!("no command expected"));
        match read_defect_list(&mut dev, DefectListFormat::VENDOR_SPECIFIC, true, true) {
            Err(DefectError::BadParameter(0x6)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn both_command_forms_refused() {
        let mut dev = EmulatedDevice::new(Protocol::Scsi);
        match read_defect_list(&mut dev, DefectListFormat::SHORT_BLOCK, true, true) {
            Err(DefectError::NotSupported) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn shared_defect_list_flagged_for_multi_lu_targets() {
        let mut descriptors = Vec::new();
        descriptors.extend_from_slice(&long_block(7));
        let mut dev = defect_device(DefectListFormat::LONG_BLOCK, descriptors, true, false)
            .with_lun_count(4);
        let list = read_defect_list(&mut dev, DefectListFormat::LONG_BLOCK, true, true).unwrap();
        assert!(list.device_has_multiple_lus);
    }
}
