// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! SCSI mode pages, operation-code probing, and the security protocol
//! list.

use crate::info::DeviceInformation;
use crate::info::Encryption;
use crate::quirks::Quirks;
use scsi_spec::ModeBackgroundControlPage;
use scsi_spec::ModeCachingPage;
use scsi_spec::ModeControlExtensionPage;
use scsi_spec::ModeControlPage;
use scsi_spec::ModeInformationalExceptionsPage;
use scsi_spec::ModeParameterHeader;
use scsi_spec::ModeParameterHeader10;
use scsi_spec::ModePowerConditionPage;
use scsi_spec::ModeSense;
use scsi_spec::ModeSense10;
use scsi_spec::ModeSenseFlags;
use scsi_spec::OneCommandParameterData;
use scsi_spec::ReportSupportedOpCodesCdb;
use scsi_spec::SasPhyModeDescriptor;
use scsi_spec::ScsiOp;
use scsi_spec::SecurityProtocolInCdb;
use scsi_spec::SupportedSecurityProtocolsHeader;
use scsi_spec::MODE_BMS_ENABLED;
use scsi_spec::MODE_BMS_PRESCAN_ENABLED;
use scsi_spec::MODE_CACHING_DRA;
use scsi_spec::MODE_CACHING_NV_DIS;
use scsi_spec::MODE_CACHING_WCE;
use scsi_spec::MODE_CONTROL_CHANGEABLE_VALUES;
use scsi_spec::MODE_CONTROL_CURRENT_VALUES;
use scsi_spec::MODE_CONTROL_EXT_DLC;
use scsi_spec::MODE_DSP_WRITE_PROTECT;
use scsi_spec::MODE_PAGE_CACHING;
use scsi_spec::MODE_PAGE_CONTROL;
use scsi_spec::MODE_PAGE_INFORMATIONAL_EXCEPTIONS;
use scsi_spec::MODE_PAGE_POWER_CONDITION;
use scsi_spec::MODE_PAGE_PROTOCOL_SPECIFIC_PORT;
use scsi_spec::MODE_SUBPAGE_BACKGROUND_CONTROL;
use scsi_spec::MODE_SUBPAGE_CONTROL_EXTENSION;
use scsi_spec::MODE_SUBPAGE_SAS_PHY_CONTROL;
use scsi_spec::OP_SUPPORT_STANDARD;
use scsi_spec::PROTOCOL_IDENTIFIER_SAS;
use scsi_spec::REPORT_OPTIONS_ONE_COMMAND;
use scsi_spec::REPORT_OPTIONS_ONE_COMMAND_WITH_SA;
use scsi_spec::SAS_PHY_COUNT_OFFSET;
use scsi_spec::SAS_PHY_DESCRIPTORS_OFFSET;
use scsi_spec::SECURITY_PROTOCOL_ATA_PASSWORD;
use scsi_spec::SECURITY_PROTOCOL_IEEE1667;
use scsi_spec::SECURITY_PROTOCOL_INFORMATION;
use scsi_spec::SECURITY_PROTOCOL_TCG_MAX;
use scsi_spec::SECURITY_PROTOCOL_TCG_MIN;
use scsi_spec::SERVICE_ACTION_GET_PHYSICAL_ELEMENT_STATUS;
use scsi_spec::SERVICE_ACTION_REMOVE_ELEMENT_AND_TRUNCATE;
use scsi_spec::SERVICE_ACTION_REPORT_SUPPORTED_OP_CODES;
use scsi_spec::SERVICE_ACTION_SANITIZE_BLOCK_ERASE;
use scsi_spec::SERVICE_ACTION_SANITIZE_CRYPTO_ERASE;
use scsi_spec::SERVICE_ACTION_SANITIZE_OVERWRITE;
use scsi_spec::SERVICE_ACTION_WRITE_LONG16;
use storage_passthru::DataDirection;
use storage_passthru::PassthroughDevice;
use storage_passthru::TransportError;
use zerocopy::FromBytes;
use zerocopy::IntoBytes;

pub(crate) fn collect(
    dev: &mut dyn PassthroughDevice,
    info: &mut DeviceInformation,
    quirks: &Quirks,
) {
    collect_mode_pages(dev, info);
    if !quirks.no_report_supported_ops {
        collect_op_code_probes(dev, info);
    }
    collect_security_protocols(dev, info);
}

/// MODE SENSE (10), falling back to the 6-byte command when the device
/// rejects the form. Returns the page bytes with headers and block
/// descriptors stripped, plus the device-specific parameter byte.
fn mode_sense(
    dev: &mut dyn PassthroughDevice,
    page: u8,
    subpage: u8,
    pc: u8,
) -> Option<(u8, Vec<u8>)> {
    const DBD: u8 = 0x08;

    let mut buf = [0u8; 512];
    let cdb = ModeSense10 {
        operation_code: ScsiOp::MODE_SENSE10,
        flags1: DBD,
        flags2: ModeSenseFlags::new().with_page_code(page).with_pc(pc),
        sub_page_code: subpage,
        reserved2: [0; 3],
        allocation_length: (buf.len() as u16).into(),
        control: 0,
    };
    match dev.scsi_command(cdb.as_bytes(), DataDirection::FromDevice, &mut buf) {
        Ok(()) => {
            let (header, rest) = ModeParameterHeader10::read_from_prefix(&buf[..]).ok()?;
            let skip = header.block_descriptor_length.get() as usize;
            let page = rest.get(skip..)?.to_vec();
            Some((header.device_specific_parameter, page))
        }
        Err(TransportError::InvalidOpcode) => {
            let mut buf = [0u8; 255];
            let cdb = ModeSense {
                operation_code: ScsiOp::MODE_SENSE,
                flags1: DBD,
                flags2: ModeSenseFlags::new().with_page_code(page).with_pc(pc),
                sub_page_code: subpage,
                allocation_length: buf.len() as u8,
                control: 0,
            };
            dev.scsi_command(cdb.as_bytes(), DataDirection::FromDevice, &mut buf)
                .ok()?;
            let (header, rest) = ModeParameterHeader::read_from_prefix(&buf[..]).ok()?;
            let skip = header.block_descriptor_length as usize;
            let page = rest.get(skip..)?.to_vec();
            Some((header.device_specific_parameter, page))
        }
        Err(err) => {
            tracing::debug!(page, subpage, %err, "mode sense failed");
            None
        }
    }
}

fn collect_mode_pages(dev: &mut dyn PassthroughDevice, info: &mut DeviceInformation) {
    if let Some((dsp, page)) = mode_sense(dev, MODE_PAGE_CACHING, 0, MODE_CONTROL_CURRENT_VALUES) {
        info.write_protected = dsp & MODE_DSP_WRITE_PROTECT != 0;
        if let Ok(caching) = ModeCachingPage::read_from_prefix(&page).map(|(p, _)| p) {
            // The changeable-values form reports a set bit where the
            // host may toggle the field. A device that refuses the form
            // is treated as if everything were changeable.
            let changeable = mode_sense(dev, MODE_PAGE_CACHING, 0, MODE_CONTROL_CHANGEABLE_VALUES)
                .and_then(|(_, p)| ModeCachingPage::read_from_prefix(&p).ok().map(|(c, _)| c));

            if caching.flags & MODE_CACHING_WCE != 0 {
                info.features.add_enabled("Write Cache");
            } else if changeable.is_none_or(|c| c.flags & MODE_CACHING_WCE != 0) {
                info.features.add("Write Cache");
            }
            if caching.flags2 & MODE_CACHING_DRA == 0 {
                info.features.add_enabled("Read Look-Ahead");
            } else if changeable.is_none_or(|c| c.flags2 & MODE_CACHING_DRA != 0) {
                info.features.add("Read Look-Ahead");
            }
            if caching.flags2 & MODE_CACHING_NV_DIS == 0 && info.features.contains("NV Cache") {
                info.features.add_enabled("NV Cache");
            }
        }
    }

    if let Some((_, page)) = mode_sense(dev, MODE_PAGE_CONTROL, 0, MODE_CONTROL_CURRENT_VALUES) {
        if let Ok(control) = ModeControlPage::read_from_prefix(&page).map(|(p, _)| p) {
            let seconds = control.extended_self_test_time.get();
            if seconds != 0 && info.health.long_self_test_minutes.is_none() {
                info.health.long_self_test_minutes = Some(u32::from(seconds).div_ceil(60));
            }
        }
    }

    if let Some((_, page)) = mode_sense(
        dev,
        MODE_PAGE_CONTROL,
        MODE_SUBPAGE_CONTROL_EXTENSION,
        MODE_CONTROL_CURRENT_VALUES,
    ) {
        if let Ok(ext) = ModeControlExtensionPage::read_from_prefix(&page).map(|(p, _)| p) {
            if ext.flags & MODE_CONTROL_EXT_DLC != 0 {
                info.features.add_enabled("Device Life Control");
            }
        }
    }

    if let Some((_, page)) = mode_sense(
        dev,
        MODE_PAGE_INFORMATIONAL_EXCEPTIONS,
        0,
        MODE_CONTROL_CURRENT_VALUES,
    ) {
        if let Ok(iec) = ModeInformationalExceptionsPage::read_from_prefix(&page).map(|(p, _)| p) {
            const DEXCPT: u8 = 0x08;
            if iec.flags & DEXCPT == 0 {
                info.features.add_enabled("Informational Exceptions");
            } else {
                info.features.add("Informational Exceptions");
            }
            info.mrie_mode = Some(iec.mrie & 0x0F);
        }
    }

    if let Some((_, page)) = mode_sense(dev, MODE_PAGE_POWER_CONDITION, 0, MODE_CONTROL_CURRENT_VALUES) {
        if let Ok(power) = ModePowerConditionPage::read_from_prefix(&page).map(|(p, _)| p) {
            info.features.add("EPC");
            if power.enable_flags != 0 || power.precedence_flags & 0x01 != 0 {
                info.features.add_enabled("EPC");
            }
        }
    }

    if let Some((_, page)) = mode_sense(
        dev,
        MODE_PAGE_INFORMATIONAL_EXCEPTIONS,
        MODE_SUBPAGE_BACKGROUND_CONTROL,
        MODE_CONTROL_CURRENT_VALUES,
    ) {
        if let Ok(bg) = ModeBackgroundControlPage::read_from_prefix(&page).map(|(p, _)| p) {
            info.features.add("Background Media Scan");
            if bg.flags & MODE_BMS_ENABLED != 0 {
                info.features.add_enabled("Background Media Scan");
            }
            if bg.ps_flags & MODE_BMS_PRESCAN_ENABLED != 0 {
                info.features.add_enabled("Background Pre-Scan");
            }
        }
    }

    if let Some((_, page)) = mode_sense(
        dev,
        MODE_PAGE_PROTOCOL_SPECIFIC_PORT,
        MODE_SUBPAGE_SAS_PHY_CONTROL,
        MODE_CONTROL_CURRENT_VALUES,
    ) {
        decode_sas_phy_page(&page, info);
    }
}

fn decode_sas_phy_page(page: &[u8], info: &mut DeviceInformation) {
    // Byte 5 low nibble is the protocol identifier for subpage formats.
    let Some(&proto) = page.get(5) else { return };
    if proto & 0x0F != PROTOCOL_IDENTIFIER_SAS {
        return;
    }
    let Some(&phys) = page.get(SAS_PHY_COUNT_OFFSET) else {
        return;
    };
    let mut rest = match page.get(SAS_PHY_DESCRIPTORS_OFFSET..) {
        Some(r) => r,
        None => return,
    };
    for _ in 0..phys {
        let Ok((descriptor, next)) = SasPhyModeDescriptor::read_from_prefix(rest) else {
            return;
        };
        if let Some(gbps) = scsi_spec::sas_link_rate_gbps(descriptor.negotiated_link_rate & 0x0F) {
            // Report the fastest negotiated phy.
            if info.interface_speed_gbps.is_none_or(|cur| gbps > cur) {
                info.interface_speed_gbps = Some(gbps);
            }
        }
        rest = next;
    }
}

/// REPORT SUPPORTED OPERATION CODES for one command, with or without a
/// service action. `None` when the device cannot answer.
fn probe_op_code(
    dev: &mut dyn PassthroughDevice,
    op: u8,
    service_action: Option<u16>,
) -> Option<u8> {
    let mut buf = [0u8; 64];
    let cdb = ReportSupportedOpCodesCdb {
        operation_code: ScsiOp::MAINTENANCE_IN,
        service_action: SERVICE_ACTION_REPORT_SUPPORTED_OP_CODES,
        reporting_options: match service_action {
            Some(_) => REPORT_OPTIONS_ONE_COMMAND_WITH_SA,
            None => REPORT_OPTIONS_ONE_COMMAND,
        },
        requested_operation_code: op,
        requested_service_action: service_action.unwrap_or(0).into(),
        allocation_length: (buf.len() as u32).into(),
        reserved: 0,
        control: 0,
    };
    dev.scsi_command(cdb.as_bytes(), DataDirection::FromDevice, &mut buf)
        .ok()?;
    let data = OneCommandParameterData::read_from_prefix(&buf[..]).ok()?.0;
    Some(data.support_value())
}

fn supported(probe: Option<u8>) -> bool {
    probe == Some(OP_SUPPORT_STANDARD) || probe == Some(scsi_spec::OP_SUPPORT_VENDOR)
}

fn collect_op_code_probes(dev: &mut dyn PassthroughDevice, info: &mut DeviceInformation) {
    // A device without the A3h/0Ch probe answers InvalidOpcode on the
    // first attempt; skip the rest.
    let format_unit = probe_op_code(dev, ScsiOp::FORMAT_UNIT.0, None);
    if format_unit.is_none() {
        return;
    }
    if supported(format_unit) {
        info.features.add("Format Unit");
    }

    for (sa, name) in [
        (SERVICE_ACTION_SANITIZE_OVERWRITE, "Sanitize Overwrite"),
        (SERVICE_ACTION_SANITIZE_BLOCK_ERASE, "Sanitize Block Erase"),
        (SERVICE_ACTION_SANITIZE_CRYPTO_ERASE, "Sanitize Crypto Erase"),
    ] {
        if supported(probe_op_code(dev, ScsiOp::SANITIZE.0, Some(u16::from(sa)))) {
            info.features.add(name);
        }
    }

    if supported(probe_op_code(
        dev,
        ScsiOp::SERVICE_ACTION_IN16.0,
        Some(u16::from(SERVICE_ACTION_GET_PHYSICAL_ELEMENT_STATUS)),
    )) && supported(probe_op_code(
        dev,
        ScsiOp::SERVICE_ACTION_OUT16.0,
        Some(u16::from(SERVICE_ACTION_REMOVE_ELEMENT_AND_TRUNCATE)),
    )) {
        info.features.add("Storage Element Depopulation");
    }

    if supported(probe_op_code(dev, ScsiOp::WRITE_BUFFER.0, None)) {
        info.fwdl.full = true;
        info.fwdl.segmented = true;
        // SPC-4 WRITE BUFFER carries the deferred modes alongside the
        // immediate ones.
        info.fwdl.deferred_with_activate = true;
        info.features.add("Firmware Download");
    }

    if supported(probe_op_code(dev, ScsiOp::WRITE_LONG.0, None)) {
        info.inject.scsi_write_uncorrectable = true;
    }
    if supported(probe_op_code(
        dev,
        ScsiOp::SERVICE_ACTION_OUT16.0,
        Some(u16::from(SERVICE_ACTION_WRITE_LONG16)),
    )) {
        info.inject.scsi_write_uncorrectable = true;
        info.inject.scsi_long16 = true;
    }

    if supported(probe_op_code(dev, ScsiOp::ATA_PASSTHROUGH12.0, None))
        || supported(probe_op_code(dev, ScsiOp::ATA_PASSTHROUGH16.0, None))
    {
        info.features.add("SAT ATA Pass-Through");
    }
}

fn collect_security_protocols(dev: &mut dyn PassthroughDevice, info: &mut DeviceInformation) {
    let mut buf = [0u8; 512];
    let cdb = SecurityProtocolInCdb {
        operation_code: ScsiOp::SECURITY_PROTOCOL_IN,
        security_protocol: SECURITY_PROTOCOL_INFORMATION,
        security_protocol_specific: 0.into(),
        flags: 0,
        reserved: 0,
        allocation_length: (buf.len() as u32).into(),
        reserved2: 0,
        control: 0,
    };
    if dev
        .scsi_command(cdb.as_bytes(), DataDirection::FromDevice, &mut buf)
        .is_err()
    {
        return;
    }
    let Ok((header, rest)) = SupportedSecurityProtocolsHeader::read_from_prefix(&buf[..]) else {
        return;
    };
    let len = (header.list_length.get() as usize).min(rest.len());
    for &protocol in &rest[..len] {
        info.security.protocols.push(protocol);
        match protocol {
            SECURITY_PROTOCOL_TCG_MIN..=SECURITY_PROTOCOL_TCG_MAX => {
                info.security.tcg = true;
                info.security.encryption = Encryption::SelfEncrypting;
            }
            SECURITY_PROTOCOL_IEEE1667 => info.security.ieee1667 = true,
            SECURITY_PROTOCOL_ATA_PASSWORD => {
                info.features.add("ATA Security (via SAT)");
            }
            _ => {}
        }
    }
    if info.security.tcg {
        info.features.add("TCG");
    }
}
