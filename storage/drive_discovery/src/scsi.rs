// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! SCSI identification: standard inquiry, vital product data pages, and
//! read capacity.

use crate::ata;
use crate::info::DeviceInformation;
use crate::quirks;
use crate::quirks::Quirks;
use crate::info::FormFactor;
use crate::info::Zoned;
use crate::info::FORMAT_CORRUPT_FEATURE;
use ata_spec::IdentifyDevice;
use scsi_spec::CdbInquiry;
use scsi_spec::InquiryData;
use scsi_spec::InquiryFlags;
use scsi_spec::ReadCapacity16Data;
use scsi_spec::ReadCapacityData;
use scsi_spec::ScsiOp;
use scsi_spec::ServiceActionIn16;
use scsi_spec::VpdBlockDeviceCharacteristics;
use scsi_spec::VpdBlockLimitsDescriptor;
use scsi_spec::VpdExtendedInquiryPage;
use scsi_spec::VpdIdentificationDescriptor;
use scsi_spec::VpdLogicalBlockProvisioning;
use scsi_spec::VpdPageHeader;
use scsi_spec::ATA_INFORMATION_IDENTIFY_OFFSET;
use scsi_spec::CPR_VPD_DESCRIPTOR_BYTES;
use scsi_spec::CPR_VPD_FIXED_BYTES;
use scsi_spec::NAA_IEEE_REGISTERED_EXTENDED;
use scsi_spec::PROTOCOL_IDENTIFIER_SAS;
use scsi_spec::SERVICE_ACTION_READ_CAPACITY16;
use scsi_spec::VPD_ASSOCIATION_LOGICAL_UNIT;
use scsi_spec::VPD_ASSOCIATION_TARGET_PORT;
use scsi_spec::VPD_ATA_INFORMATION;
use scsi_spec::VPD_BLOCK_DEVICE_CHARACTERISTICS;
use scsi_spec::VPD_BLOCK_LIMITS;
use scsi_spec::VPD_CONCURRENT_POSITIONING_RANGES;
use scsi_spec::VPD_DEVICE_IDENTIFIERS;
use scsi_spec::VPD_EXTENDED_INQUIRY;
use scsi_spec::VPD_IDENTIFIER_TYPE_NAA;
use scsi_spec::VPD_LOGICAL_BLOCK_PROVISIONING;
use scsi_spec::VPD_SERIAL_NUMBER;
use scsi_spec::VPD_SUPPORTED_PAGES;
use scsi_spec::VPD_ZONED_BLOCK_DEVICE_CHARACTERISTICS;
use scsi_spec::ZONED_BLOCK_DEVICE;
use scsi_spec::ZONED_VPD_FLAGS_OFFSET;
use storage_passthru::DataDirection;
use storage_passthru::PassthroughDevice;
use storage_passthru::TransportError;
use storage_string::printable;
use zerocopy::FromBytes;
use zerocopy::IntoBytes;

/// SPC version byte values from standard inquiry.
const VERSION_SPC3: u8 = 0x05;

pub(crate) fn collect(
    dev: &mut dyn PassthroughDevice,
    info: &mut DeviceInformation,
) -> Result<Quirks, TransportError> {
    let inquiry = standard_inquiry(dev)?;
    decode_standard_inquiry(&inquiry, info);
    let quirks = quirks::lookup(&info.identity);
    if quirks.usb_vpd_dummy {
        // The bridge hangs on VPD requests; the drive serial rides in
        // the vendor-specific inquiry bytes instead.
        if info.identity.serial.is_empty() {
            let serial = printable(&inquiry.vendor_specific);
            if !serial.is_empty() {
                info.identity.serial = serial;
            }
        }
    } else {
        collect_vpd(dev, &inquiry, info, &quirks);
    }
    read_capacity(dev, info);
    Ok(quirks)
}

fn standard_inquiry(dev: &mut dyn PassthroughDevice) -> Result<InquiryData, TransportError> {
    let mut buf = [0u8; size_of::<InquiryData>()];
    let cdb = CdbInquiry {
        operation_code: ScsiOp::INQUIRY,
        flags: InquiryFlags::new(),
        page_code: 0,
        allocation_length: (buf.len() as u16).into(),
        control: 0,
    };
    dev.scsi_command(cdb.as_bytes(), DataDirection::FromDevice, &mut buf)?;
    InquiryData::read_from_bytes(&buf[..]).map_err(|_| TransportError::Transport)
}

fn decode_standard_inquiry(inquiry: &InquiryData, info: &mut DeviceInformation) {
    info.identity.vendor = printable(&inquiry.vendor_id);
    info.identity.model = printable(&inquiry.product_id);
    info.identity.firmware = printable(&inquiry.product_revision_level);

    for name in spc_version_names(inquiry.header.versions) {
        info.specifications.push(name.to_string());
    }
    if inquiry.header.flags3.response_data_format() == scsi_spec::RESPONSE_DATA_FORMAT_CCS {
        info.specifications.push("CCS".to_string());
    }
    for descriptor in &inquiry.version_descriptors {
        let code = descriptor.get();
        if code == 0 {
            continue;
        }
        if let Some(name) = version_descriptor_name(code) {
            info.specifications.push(name.to_string());
        }
    }
    if inquiry.header.device_type & 0x1F == ZONED_BLOCK_DEVICE {
        info.zoned = Zoned::HostManaged;
    }
}

/// Standard names implied by the inquiry version byte. The historical
/// values name both the standard and the ones it subsumes.
fn spc_version_names(version: u8) -> &'static [&'static str] {
    match version {
        0x01 => &["SCSI"],
        0x02 => &["SCSI", "SCSI-2"],
        0x03 => &["SCSI-3", "SPC"],
        0x04 => &["SPC-2"],
        0x05 => &["SPC-3"],
        0x06 => &["SPC-4"],
        0x07 => &["SPC-5"],
        _ => &[],
    }
}

/// Standard named by one inquiry version descriptor. Each standard owns
/// a 32-code block; the low five bits select a revision of it.
fn version_descriptor_name(code: u16) -> Option<&'static str> {
    Some(match code & 0xFFE0 {
        0x0020 => "SAM",
        0x0040 => "SAM-2",
        0x0060 => "SAM-3",
        0x0080 => "SAM-4",
        0x00A0 => "SAM-5",
        0x00C0 => "SAM-6",
        0x0120 => "SPC",
        0x0140 => "SBC",
        0x0180 => "SSC",
        0x0260 => "SPC-2",
        0x0300 => "SPC-3",
        0x0320 => "SBC-2",
        0x0460 => "SPC-4",
        0x04C0 => "SBC-3",
        0x05C0 => "SPC-5",
        0x0600 => "SBC-4",
        0x0620 => "ZBC",
        0x0BE0 => "SAS",
        0x0C00 => "SAS-1.1",
        0x0C20 => "SAS-2",
        0x0C40 => "SAS-2.1",
        0x0C60 => "SAS-3",
        0x0C80 => "SAS-4",
        _ => return None,
    })
}

fn read_vpd(dev: &mut dyn PassthroughDevice, page: u8, buf: &mut [u8]) -> bool {
    let cdb = CdbInquiry {
        operation_code: ScsiOp::INQUIRY,
        flags: InquiryFlags::new().with_vpd(true),
        page_code: page,
        allocation_length: (buf.len() as u16).into(),
        control: 0,
    };
    match dev.scsi_command(cdb.as_bytes(), DataDirection::FromDevice, buf) {
        Ok(()) => {
            // A device that echoes a different page back did not
            // actually implement the request.
            buf[1] == page
        }
        Err(err) => {
            tracing::debug!(page, %err, "VPD page not served");
            false
        }
    }
}

fn collect_vpd(
    dev: &mut dyn PassthroughDevice,
    inquiry: &InquiryData,
    info: &mut DeviceInformation,
    quirks: &Quirks,
) {
    let mut buf = [0u8; 512];
    let mut pages: Vec<u8> = Vec::new();
    if read_vpd(dev, VPD_SUPPORTED_PAGES, &mut buf) {
        if let Ok((header, rest)) = VpdPageHeader::read_from_prefix(&buf[..]) {
            let len = (header.page_length.get() as usize).min(rest.len());
            pages.extend_from_slice(&rest[..len]);
        }
    }
    if pages.is_empty() && inquiry.header.versions >= VERSION_SPC3 {
        // Translation layers routinely zero this page; probe the pages
        // an SPC-3 device is expected to carry.
        pages = vec![
            VPD_SERIAL_NUMBER,
            VPD_DEVICE_IDENTIFIERS,
            VPD_EXTENDED_INQUIRY,
            VPD_BLOCK_LIMITS,
            VPD_BLOCK_DEVICE_CHARACTERISTICS,
            VPD_LOGICAL_BLOCK_PROVISIONING,
        ];
    }

    for page in pages {
        let mut buf = [0u8; 1024];
        match page {
            VPD_SERIAL_NUMBER => {
                if read_vpd(dev, page, &mut buf) {
                    decode_serial_page(&buf, info);
                }
            }
            VPD_DEVICE_IDENTIFIERS => {
                if read_vpd(dev, page, &mut buf) {
                    decode_identifiers_page(&buf, info);
                }
            }
            VPD_EXTENDED_INQUIRY => {
                if read_vpd(dev, page, &mut buf) {
                    decode_extended_inquiry_page(&buf, info);
                }
            }
            VPD_ATA_INFORMATION => {
                if !quirks.usb_no_sat_info && read_vpd(dev, page, &mut buf) {
                    decode_ata_information_page(&buf, info);
                }
            }
            VPD_BLOCK_LIMITS => {
                if read_vpd(dev, page, &mut buf) {
                    decode_block_limits_page(&buf, info);
                }
            }
            VPD_BLOCK_DEVICE_CHARACTERISTICS => {
                if read_vpd(dev, page, &mut buf) {
                    decode_characteristics_page(&buf, info);
                }
            }
            VPD_LOGICAL_BLOCK_PROVISIONING => {
                if read_vpd(dev, page, &mut buf) {
                    decode_provisioning_page(&buf, info);
                }
            }
            VPD_ZONED_BLOCK_DEVICE_CHARACTERISTICS => {
                if read_vpd(dev, page, &mut buf) {
                    decode_zoned_page(&buf, info);
                }
            }
            VPD_CONCURRENT_POSITIONING_RANGES => {
                if read_vpd(dev, page, &mut buf) {
                    decode_positioning_page(&buf, info);
                }
            }
            _ => {}
        }
    }
}

fn decode_serial_page(buf: &[u8], info: &mut DeviceInformation) {
    let Ok((header, rest)) = VpdPageHeader::read_from_prefix(buf) else {
        return;
    };
    let len = (header.page_length.get() as usize).min(rest.len());
    let serial = printable(&rest[..len]);
    if !serial.is_empty() {
        info.identity.serial = serial;
    }
}

fn decode_identifiers_page(buf: &[u8], info: &mut DeviceInformation) {
    let Ok((header, mut rest)) = VpdPageHeader::read_from_prefix(buf) else {
        return;
    };
    let mut remaining = (header.page_length.get() as usize).min(rest.len());

    while remaining >= size_of::<VpdIdentificationDescriptor>() {
        let Ok((descriptor, body)) = VpdIdentificationDescriptor::read_from_prefix(rest) else {
            return;
        };
        let len = descriptor.identifier_length as usize;
        if len > body.len() {
            return;
        }
        let identifier = &body[..len];

        if descriptor.designator_type() == VPD_IDENTIFIER_TYPE_NAA {
            match descriptor.association() {
                VPD_ASSOCIATION_LOGICAL_UNIT if len >= 8 => {
                    let wwn = u64::from_be_bytes(identifier[..8].try_into().unwrap());
                    info.identity.wwn = Some(wwn);
                    let naa = (wwn >> 60) as u8;
                    if naa == NAA_IEEE_REGISTERED_EXTENDED && len >= 16 {
                        info.identity.wwn_extension =
                            Some(u64::from_be_bytes(identifier[8..16].try_into().unwrap()));
                    }
                    // NAA 5 and 6 carry a 24-bit IEEE OUI after the
                    // format nibble.
                    if naa == 5 || naa == 6 {
                        info.identity.ieee_oui = Some(((wwn >> 36) & 0xFF_FFFF) as u32);
                    }
                }
                VPD_ASSOCIATION_TARGET_PORT => {
                    if descriptor.piv()
                        && descriptor.protocol_identifier() == PROTOCOL_IDENTIFIER_SAS
                        && !info.specifications.iter().any(|s| s == "SAS")
                    {
                        info.specifications.push("SAS".to_string());
                    }
                }
                _ => {}
            }
        }

        let consumed = size_of::<VpdIdentificationDescriptor>() + len;
        remaining = remaining.saturating_sub(consumed);
        rest = &body[len..];
    }
}

fn decode_extended_inquiry_page(buf: &[u8], info: &mut DeviceInformation) {
    let Ok(page) = VpdExtendedInquiryPage::read_from_prefix(buf).map(|(p, _)| p) else {
        return;
    };
    let minutes = page.extended_self_test_minutes.get();
    if minutes != 0 {
        info.health.long_self_test_minutes = Some(u32::from(minutes));
    }
    if page.nv_cache_supported() {
        info.features.add("NV Cache");
    }
}

fn decode_ata_information_page(buf: &[u8], info: &mut DeviceInformation) {
    let identify = &buf[ATA_INFORMATION_IDENTIFY_OFFSET..];
    let Ok(id) = IdentifyDevice::read_from_prefix(identify).map(|(id, _)| id) else {
        return;
    };
    info.ata_behind_sat = true;
    // The native identity wins over whatever the bridge translated.
    ata::decode_identify(&id, info);
}

fn decode_block_limits_page(buf: &[u8], info: &mut DeviceInformation) {
    let Ok((_, rest)) = VpdPageHeader::read_from_prefix(buf) else {
        return;
    };
    let Ok(limits) = VpdBlockLimitsDescriptor::read_from_prefix(rest).map(|(l, _)| l) else {
        return;
    };
    if limits.max_unmap_lba_count.get() != 0 {
        info.features.add("UNMAP");
    }
}

fn decode_characteristics_page(buf: &[u8], info: &mut DeviceInformation) {
    let Ok((_, rest)) = VpdPageHeader::read_from_prefix(buf) else {
        return;
    };
    let Ok(chars) = VpdBlockDeviceCharacteristics::read_from_prefix(rest).map(|(c, _)| c) else {
        return;
    };
    let rate = chars.medium_rotation_rate.get();
    if rate != scsi_spec::ROTATION_RATE_NOT_REPORTED {
        info.rotation_rate = Some(rate);
    }
    if info.form_factor.is_none() {
        info.form_factor = FormFactor::from_scsi_nibble(chars.nominal_form_factor());
    }
    match chars.zoned() {
        1 => info.zoned = Zoned::HostAware,
        2 => info.zoned = Zoned::DeviceManaged,
        _ => {}
    }
}

fn decode_provisioning_page(buf: &[u8], info: &mut DeviceInformation) {
    let Ok((_, rest)) = VpdPageHeader::read_from_prefix(buf) else {
        return;
    };
    let Ok(lbp) = VpdLogicalBlockProvisioning::read_from_prefix(rest).map(|(l, _)| l) else {
        return;
    };
    if lbp.lbpu() {
        info.features.add("Logical Block Provisioning");
        if lbp.lbprz() == 1 {
            info.features.add("Read Zeros After UNMAP");
        }
    }
}

fn decode_zoned_page(buf: &[u8], info: &mut DeviceInformation) {
    // Byte 4 high nibble: 0 = host aware, 1 = zone domains/realms.
    if info.zoned == Zoned::None {
        if let Some(&flags) = buf.get(ZONED_VPD_FLAGS_OFFSET) {
            info.zoned = match flags >> 4 {
                0 => Zoned::HostAware,
                _ => Zoned::HostManaged,
            };
        }
    }
}

fn decode_positioning_page(buf: &[u8], info: &mut DeviceInformation) {
    let Ok((header, _)) = VpdPageHeader::read_from_prefix(buf) else {
        return;
    };
    let length = header.page_length.get() as usize;
    if length >= CPR_VPD_FIXED_BYTES {
        let ranges = (length - CPR_VPD_FIXED_BYTES) / CPR_VPD_DESCRIPTOR_BYTES;
        if ranges != 0 {
            info.positioning_ranges = Some(ranges as u32);
            info.features.add("Concurrent Positioning Ranges");
        }
    }
}

fn read_capacity(dev: &mut dyn PassthroughDevice, info: &mut DeviceInformation) {
    let mut cdb = [0u8; 10];
    cdb[0] = ScsiOp::READ_CAPACITY.0;
    let mut buf = [0u8; size_of::<ReadCapacityData>()];
    match dev.scsi_command(&cdb, DataDirection::FromDevice, &mut buf) {
        Ok(()) => {
            if let Ok(data) = ReadCapacityData::read_from_bytes(&buf[..]) {
                // The returned address is the last LBA, not a count.
                let last = data.logical_block_address.get();
                if last != 0 {
                    info.geometry.max_lba = Some(u64::from(last));
                }
                let block = data.bytes_per_block.get();
                if block != 0 {
                    info.geometry.logical_sector_size = Some(block);
                    info.geometry.physical_sector_size = Some(block);
                }
            }
        }
        Err(err) if err.is_format_corrupt() => {
            format_corrupt(info);
            return;
        }
        Err(err) => {
            tracing::debug!(%err, "read capacity (10) failed");
        }
    }

    let cdb = ServiceActionIn16 {
        operation_code: ScsiOp::SERVICE_ACTION_IN16,
        service_action: SERVICE_ACTION_READ_CAPACITY16,
        logical_block: 0.into(),
        allocation_length: (size_of::<ReadCapacity16Data>() as u32).into(),
        flags: 0,
        control: 0,
    };
    let mut buf = [0u8; size_of::<ReadCapacity16Data>()];
    match dev.scsi_command(cdb.as_bytes(), DataDirection::FromDevice, &mut buf) {
        Ok(()) => {
            if let Ok(data) = ReadCapacity16Data::read_from_bytes(&buf[..]) {
                if data.logical_block_address.get() != 0 {
                    info.geometry.max_lba = Some(data.logical_block_address.get());
                    let block = data.bytes_per_block.get();
                    if block != 0 {
                        info.geometry.logical_sector_size = Some(block);
                        info.geometry.physical_sector_size =
                            Some(block << data.logical_per_physical_exponent());
                    }
                    info.geometry.alignment_offset = Some(u32::from(data.lowest_aligned_block()));
                    info.geometry.protection_enabled = data.protection_enabled();
                    if data.protection_enabled() {
                        info.geometry.protection_type = data.protection_type() + 1;
                    }
                }
            }
        }
        Err(err) if err.is_format_corrupt() => format_corrupt(info),
        Err(err) => {
            tracing::debug!(%err, "read capacity (16) failed");
        }
    }
}

/// Medium format corrupted: sizes are untrustworthy, so none are
/// reported, and the sentinel feature flags the condition.
fn format_corrupt(info: &mut DeviceInformation) {
    info.format_corrupt = true;
    info.geometry.logical_sector_size = None;
    info.geometry.physical_sector_size = None;
    info.geometry.max_lba = None;
    info.features.add(FORMAT_CORRUPT_FEATURE);
}
