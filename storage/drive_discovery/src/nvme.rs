// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! NVMe discovery: Identify Controller and Namespace, the SMART/Health,
//! Firmware Slot, and Device Self-test logs, the volatile write cache
//! feature, and the Security Receive protocol list.
//!
//! Identity fields fill only when blank so that a SCSI translation
//! layer's identity survives an NVMe overlay.

use crate::info::DeviceInformation;
use crate::info::Encryption;
use crate::info::LastSelfTest;
use crate::info::SmartStatus;
use nvme_spec::nvm::IdentifyNamespace;
use nvme_spec::AdminOpcode;
use nvme_spec::Cdw10GetFeatures;
use nvme_spec::Cdw10GetLogPage;
use nvme_spec::Cdw10Identify;
use nvme_spec::Cdw10SecurityReceive;
use nvme_spec::Cdw11FeatureVolatileWriteCache;
use nvme_spec::Cdw11GetLogPage;
use nvme_spec::Cns;
use nvme_spec::Feature;
use nvme_spec::FirmwareSlotLog;
use nvme_spec::IdentifyController;
use nvme_spec::LogPageIdentifier;
use nvme_spec::SelfTestLog;
use nvme_spec::SmartHealthLog;
use nvme_spec::CRITICAL_WARNING_READ_ONLY;
use nvme_spec::FEATURE_SELECT_CURRENT;
use nvme_spec::KELVIN_OFFSET;
use scsi_spec::SupportedSecurityProtocolsHeader;
use scsi_spec::SECURITY_PROTOCOL_IEEE1667;
use scsi_spec::SECURITY_PROTOCOL_INFORMATION;
use scsi_spec::SECURITY_PROTOCOL_TCG_MAX;
use scsi_spec::SECURITY_PROTOCOL_TCG_MIN;
use storage_passthru::DataDirection;
use storage_passthru::NvmeCommand;
use storage_passthru::PassthroughDevice;
use zerocopy::FromBytes;

const IDENTIFY_BYTES: usize = 4096;

/// Runs the NVMe admin phase against `dev`, filling `info` in place.
/// Returns whether an NVMe controller answered Identify, which is how a
/// USB bridge carrying an NVMe device behind SCSI translation is
/// detected.
pub(crate) fn collect(dev: &mut dyn PassthroughDevice, info: &mut DeviceInformation) -> bool {
    let Some(id) = identify_controller(dev) else {
        return false;
    };
    decode_controller(&id, info);

    if let Some(ns) = identify_namespace(dev, 1) {
        decode_namespace(&ns, info);
    }

    if let Some(buf) = get_log_page(dev, LogPageIdentifier::HEALTH_INFORMATION, 512) {
        if let Ok(log) = SmartHealthLog::read_from_bytes(&buf[..]) {
            decode_health(&log, info);
        }
    }

    if let Some(buf) = get_log_page(dev, LogPageIdentifier::FIRMWARE_SLOT_INFORMATION, 512) {
        if let Ok(log) = FirmwareSlotLog::read_from_bytes(&buf[..]) {
            info.fwdl.active_slot = Some(log.active_slot());
        }
    }

    if id.oacs.device_self_test() {
        if let Some(buf) = get_log_page(dev, LogPageIdentifier::DEVICE_SELF_TEST, 564) {
            if let Ok(log) = SelfTestLog::read_from_bytes(&buf[..]) {
                decode_self_test(&log, info);
            }
        }
    }

    if id.vwc.present() {
        collect_write_cache_state(dev, info);
    }

    if id.oacs.security_send_receive() {
        collect_security_protocols(dev, info);
    }
    true
}

fn identify_controller(dev: &mut dyn PassthroughDevice) -> Option<IdentifyController> {
    let mut buf = vec![0; IDENTIFY_BYTES];
    let command = NvmeCommand {
        opcode: AdminOpcode::IDENTIFY.0,
        cdw10: Cdw10Identify::new().with_cns(Cns::CONTROLLER.0).into(),
        ..Default::default()
    };
    dev.nvme_admin_command(&command, DataDirection::FromDevice, &mut buf)
        .ok()?;
    IdentifyController::read_from_bytes(&buf[..]).ok()
}

fn identify_namespace(dev: &mut dyn PassthroughDevice, nsid: u32) -> Option<IdentifyNamespace> {
    let mut buf = vec![0; IDENTIFY_BYTES];
    let command = NvmeCommand {
        opcode: AdminOpcode::IDENTIFY.0,
        nsid,
        cdw10: Cdw10Identify::new().with_cns(Cns::NAMESPACE.0).into(),
        ..Default::default()
    };
    dev.nvme_admin_command(&command, DataDirection::FromDevice, &mut buf)
        .ok()?;
    IdentifyNamespace::read_from_bytes(&buf[..]).ok()
}

fn get_log_page(
    dev: &mut dyn PassthroughDevice,
    lid: LogPageIdentifier,
    len: usize,
) -> Option<Vec<u8>> {
    let mut buf = vec![0; len];
    let dwords = (len / 4) as u32 - 1;
    let command = NvmeCommand {
        opcode: AdminOpcode::GET_LOG_PAGE.0,
        nsid: u32::MAX,
        cdw10: Cdw10GetLogPage::new()
            .with_lid(lid.0)
            .with_numdl_z(dwords as u16)
            .into(),
        cdw11: Cdw11GetLogPage::new()
            .with_numdu((dwords >> 16) as u16)
            .into(),
        ..Default::default()
    };
    dev.nvme_admin_command(&command, DataDirection::FromDevice, &mut buf)
        .ok()?;
    Some(buf)
}

fn decode_controller(id: &IdentifyController, info: &mut DeviceInformation) {
    if info.identity.model.is_empty() {
        info.identity.model = id.mn.to_string();
    }
    if info.identity.serial.is_empty() {
        info.identity.serial = id.sn.to_string();
    }
    if info.identity.firmware.is_empty() {
        info.identity.firmware = id.fr.to_string();
    }
    if info.identity.ieee_oui.is_none() {
        let ieee = id.ieee;
        info.identity.ieee_oui = Some(u32::from_le_bytes([ieee[0], ieee[1], ieee[2], 0]));
    }

    let (major, minor, _) = id.version();
    if major != 0 {
        info.specifications.push(format!("NVMe {major}.{minor}"));
    }

    // All NVMe media is solid state.
    if info.rotation_rate.is_none() {
        info.rotation_rate = Some(1);
    }

    if id.oacs.format_nvm() {
        info.features.add("Format NVM");
    }
    if id.oacs.namespace_management() {
        info.features.add("Namespace Management");
    }
    if id.oacs.security_send_receive() {
        info.features.add("Security Send/Receive");
    }
    if id.sanicap != 0 {
        info.features.add("Sanitize");
    }
    if id.oacs.device_self_test() {
        info.features.add("Device Self-Test");
        if id.edstt != 0 && info.health.long_self_test_minutes.is_none() {
            info.health.long_self_test_minutes = Some(id.edstt.into());
        }
    }
    if id.oncs.write_uncorrectable() {
        info.features.add("Write Uncorrectable");
    }
    if id.oncs.dataset_management() {
        info.features.add("Dataset Management");
    }
    if id.oncs.write_zeroes() {
        info.features.add("Write Zeroes");
    }
    if id.oncs.verify() {
        info.features.add("Verify");
    }
    if id.vwc.present() {
        info.features.add("Volatile Write Cache");
    }

    if id.oacs.firmware_download() {
        info.features.add("Firmware Download");
        info.fwdl.segmented = true;
        info.fwdl.deferred = true;
        info.fwdl.activate_without_reset = id.frmw.fawr();
        info.fwdl.slot1_read_only = id.frmw.ffsro();
        if id.frmw.nofs() != 0 {
            info.fwdl.slots = Some(id.frmw.nofs());
        }
        // FWUG is in 4 KiB units; 0 means unreported and FFh means no
        // restriction.
        match id.fwug {
            0 | 0xFF => {}
            g if g.is_power_of_two() => {
                info.fwdl.offset_exponent = Some(12 + g.trailing_zeros() as u8);
            }
            _ => {}
        }
    }
}

fn decode_namespace(ns: &IdentifyNamespace, info: &mut DeviceInformation) {
    if ns.nsze != 0 && info.geometry.max_lba.is_none() {
        info.geometry.max_lba = Some(ns.nsze - 1);
    }

    let index = ns.formatted_lba_index();
    if let Some(format) = ns.lbaf.get(index) {
        if format.lbads() >= 9 && info.geometry.logical_sector_size.is_none() {
            let size = 1u32 << format.lbads();
            info.geometry.logical_sector_size = Some(size);
            info.geometry.physical_sector_size = Some(size);
        }
    }

    if ns.eui64 != [0; 8] && info.identity.wwn.is_none() {
        info.identity.wwn = Some(u64::from_be_bytes(ns.eui64));
    }

    if ns.dps.enabled_type() != 0 {
        info.geometry.protection_enabled = true;
        info.geometry.protection_type = ns.dps.enabled_type();
    }
}

fn decode_health(log: &SmartHealthLog, info: &mut DeviceInformation) {
    let kelvin = log.composite_temperature.get();
    if kelvin != 0 && info.health.temperature.current.is_none() {
        info.health.temperature.current = Some(kelvin as i32 as i16 - KELVIN_OFFSET as i16);
    }

    if info.health.percent_endurance_used.is_none() {
        info.health.percent_endurance_used = Some(f64::from(log.percentage_used));
    }

    // Data units are 1000 sectors of 512 bytes.
    if info.health.total_bytes_read.is_none() {
        info.health.total_bytes_read = Some(log.data_units_read.get() * 512_000);
    }
    if info.health.total_bytes_written.is_none() {
        info.health.total_bytes_written = Some(log.data_units_written.get() * 512_000);
    }

    if info.health.power_on_minutes.is_none() {
        let hours = u64::try_from(log.power_on_hours.get()).unwrap_or(u64::MAX);
        info.health.power_on_minutes = Some(hours.saturating_mul(60));
    }

    if info.health.smart_status == SmartStatus::Unknown {
        info.health.smart_status = if log.critical_warning == 0 {
            SmartStatus::Ok
        } else {
            SmartStatus::Tripped
        };
    }
    if log.critical_warning & CRITICAL_WARNING_READ_ONLY != 0 {
        info.write_protected = true;
    }
}

fn decode_self_test(log: &SelfTestLog, info: &mut DeviceInformation) {
    let newest = &log.results[0];
    if newest.result() == nvme_spec::SELF_TEST_RESULT_UNUSED || info.last_self_test.is_some() {
        return;
    }
    info.last_self_test = Some(LastSelfTest {
        test_number: newest.test_code(),
        result_code: newest.result(),
        power_on_hours: newest.power_on_hours.get(),
        error_lba: newest
            .failing_lba_valid()
            .then(|| newest.failing_lba.get()),
    });
}

fn collect_write_cache_state(dev: &mut dyn PassthroughDevice, info: &mut DeviceInformation) {
    let command = NvmeCommand {
        opcode: AdminOpcode::GET_FEATURES.0,
        cdw10: Cdw10GetFeatures::new()
            .with_fid(Feature::VOLATILE_WRITE_CACHE.0)
            .with_sel(FEATURE_SELECT_CURRENT)
            .into(),
        ..Default::default()
    };
    let Ok(dword0) = dev.nvme_admin_command(&command, DataDirection::None, &mut []) else {
        return;
    };
    if Cdw11FeatureVolatileWriteCache::from(dword0).wce() {
        info.features.add_enabled("Volatile Write Cache");
    }
}

fn collect_security_protocols(dev: &mut dyn PassthroughDevice, info: &mut DeviceInformation) {
    let mut buf = vec![0; 512];
    let command = NvmeCommand {
        opcode: AdminOpcode::SECURITY_RECEIVE.0,
        cdw10: Cdw10SecurityReceive::new()
            .with_secp(SECURITY_PROTOCOL_INFORMATION)
            .with_spsp(0)
            .into(),
        cdw11: buf.len() as u32,
        ..Default::default()
    };
    if dev
        .nvme_admin_command(&command, DataDirection::FromDevice, &mut buf)
        .is_err()
    {
        return;
    }
    let Ok((header, list)) = SupportedSecurityProtocolsHeader::read_from_prefix(&buf[..]) else {
        return;
    };
    let count = (header.list_length.get() as usize).min(list.len());
    for &protocol in &list[..count] {
        info.security.protocols.push(protocol);
        match protocol {
            SECURITY_PROTOCOL_TCG_MIN..=SECURITY_PROTOCOL_TCG_MAX => info.security.tcg = true,
            SECURITY_PROTOCOL_IEEE1667 => info.security.ieee1667 = true,
            _ => {}
        }
    }
    if info.security.tcg {
        info.features.add("TCG");
        if info.security.encryption == Encryption::None {
            info.security.encryption = Encryption::SelfEncrypting;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvme_spec::nvm::Flbas;
    use nvme_spec::nvm::Lbaf;
    use nvme_spec::FirmwareUpdates;
    use nvme_spec::OptionalAdminCommandSupport;
    use nvme_spec::Oncs;
    use nvme_spec::VolatileWriteCache;
    use storage_passthru::EmulatedDevice;
    use storage_passthru::Protocol;
    use storage_passthru::TransportError;
    use storage_string::AsciiString;
    use zerocopy::FromZeros;
    use zerocopy::IntoBytes;

    fn ascii<const N: usize>(s: &str) -> AsciiString<N> {
        let mut bytes = [b' '; N];
        bytes[..s.len()].copy_from_slice(s.as_bytes());
        AsciiString(bytes)
    }

    fn controller() -> IdentifyController {
        let mut id = IdentifyController::new_zeroed();
        id.sn = ascii("S5H7NS0W123456");
        id.mn = ascii("Fabrikam NVMe SSD 2TB");
        id.fr = ascii("3B2QGXA7");
        id.ieee = [0xE4, 0x5A, 0x00];
        id.ver = 0x0001_0400;
        id.oacs = OptionalAdminCommandSupport::new()
            .with_security_send_receive(true)
            .with_format_nvm(true)
            .with_firmware_download(true)
            .with_device_self_test(true);
        id.frmw = FirmwareUpdates::new()
            .with_nofs(3)
            .with_fawr(true)
            .with_ffsro(true);
        id.fwug = 4;
        id.edstt = 42;
        id.oncs = Oncs::new()
            .with_write_uncorrectable(true)
            .with_dataset_management(true);
        id.vwc = VolatileWriteCache::new().with_present(true);
        id
    }

    fn namespace() -> IdentifyNamespace {
        let mut ns = IdentifyNamespace::new_zeroed();
        ns.nsze = 3_907_029_168;
        ns.nlbaf = 1;
        ns.flbas = Flbas::new().with_low_index(1);
        ns.lbaf[0] = Lbaf::new().with_lbads(9);
        ns.lbaf[1] = Lbaf::new().with_lbads(12);
        ns.eui64 = [0x00, 0x25, 0x38, 0x5A, 0x01, 0x02, 0x03, 0x04];
        ns
    }

    fn health() -> SmartHealthLog {
        let mut log = SmartHealthLog::new_zeroed();
        log.composite_temperature = 300.into();
        log.percentage_used = 3;
        log.data_units_read = 1_000_000.into();
        log.data_units_written = 250_000.into();
        log.power_on_hours = 1234.into();
        log
    }

    fn scripted(
        id: IdentifyController,
        ns: IdentifyNamespace,
        health: SmartHealthLog,
        self_test: SelfTestLog,
    ) -> EmulatedDevice {
        EmulatedDevice::new(Protocol::Nvme).with_nvme(move |command, _, data| {
            match AdminOpcode(command.opcode) {
                AdminOpcode::IDENTIFY => match Cns(Cdw10Identify::from(command.cdw10).cns()) {
                    Cns::CONTROLLER => data.copy_from_slice(id.as_bytes()),
                    Cns::NAMESPACE => data.copy_from_slice(ns.as_bytes()),
                    _ => return Err(TransportError::InvalidOpcode),
                },
                AdminOpcode::GET_LOG_PAGE => {
                    let lid = Cdw10GetLogPage::from(command.cdw10).lid();
                    match LogPageIdentifier(lid) {
                        LogPageIdentifier::HEALTH_INFORMATION => {
                            data.copy_from_slice(health.as_bytes())
                        }
                        LogPageIdentifier::DEVICE_SELF_TEST => {
                            data.copy_from_slice(self_test.as_bytes())
                        }
                        LogPageIdentifier::FIRMWARE_SLOT_INFORMATION => {
                            let mut log = FirmwareSlotLog::new_zeroed();
                            log.afi = 0x02;
                            data.copy_from_slice(log.as_bytes());
                        }
                        _ => return Err(TransportError::NotSupported),
                    }
                }
                AdminOpcode::GET_FEATURES => {
                    let fid = Cdw10GetFeatures::from(command.cdw10).fid();
                    assert_eq!(Feature(fid), Feature::VOLATILE_WRITE_CACHE);
                    return Ok(Cdw11FeatureVolatileWriteCache::new().with_wce(true).into());
                }
                AdminOpcode::SECURITY_RECEIVE => {
                    data[6..8].copy_from_slice(&3u16.to_be_bytes());
                    data[8] = 0x00;
                    data[9] = 0x01;
                    data[10] = SECURITY_PROTOCOL_IEEE1667;
                }
                _ => return Err(TransportError::InvalidOpcode),
            }
            Ok(0)
        })
    }

    #[test]
    fn nvme_ssd_identity_and_health() {
        let mut dev = scripted(
            controller(),
            namespace(),
            health(),
            SelfTestLog::new_zeroed(),
        );
        let mut info = DeviceInformation::default();
        assert!(collect(&mut dev, &mut info));

        assert_eq!(info.identity.model, "Fabrikam NVMe SSD 2TB");
        assert_eq!(info.identity.serial, "S5H7NS0W123456");
        assert_eq!(info.identity.firmware, "3B2QGXA7");
        assert_eq!(info.identity.ieee_oui, Some(0x005AE4));
        assert_eq!(info.identity.wwn, Some(0x0025_385A_0102_0304));
        assert_eq!(info.specifications, vec!["NVMe 1.4".to_string()]);
        assert!(info.is_ssd());

        assert_eq!(info.geometry.max_lba, Some(3_907_029_167));
        assert_eq!(info.geometry.logical_sector_size, Some(4096));

        // Composite temperature 300 K reads back as 27 degrees C.
        assert_eq!(info.health.temperature.current, Some(27));
        assert_eq!(info.health.percent_endurance_used, Some(3.0));
        assert_eq!(info.health.total_bytes_read, Some(512_000_000_000));
        assert_eq!(info.health.total_bytes_written, Some(128_000_000_000));
        assert_eq!(info.health.power_on_minutes, Some(1234 * 60));
        assert_eq!(info.health.smart_status, SmartStatus::Ok);
        assert_eq!(info.health.long_self_test_minutes, Some(42));

        assert!(info.fwdl.segmented);
        assert!(info.fwdl.deferred);
        assert!(info.fwdl.activate_without_reset);
        assert!(info.fwdl.slot1_read_only);
        assert_eq!(info.fwdl.slots, Some(3));
        assert_eq!(info.fwdl.active_slot, Some(2));
        assert_eq!(info.fwdl.offset_exponent, Some(14));

        assert!(info.features.is_enabled("Volatile Write Cache"));
        assert!(info.features.contains("Format NVM"));
        assert!(info.features.contains("Write Uncorrectable"));
    }

    #[test]
    fn security_receive_reports_tcg() {
        let mut dev = scripted(
            controller(),
            namespace(),
            health(),
            SelfTestLog::new_zeroed(),
        );
        let mut info = DeviceInformation::default();
        collect(&mut dev, &mut info);

        assert_eq!(
            info.security.protocols,
            vec![0x00, 0x01, SECURITY_PROTOCOL_IEEE1667]
        );
        assert!(info.security.tcg);
        assert!(info.security.ieee1667);
        assert_eq!(info.security.encryption, Encryption::SelfEncrypting);
        assert!(info.features.contains("TCG"));
    }

    #[test]
    fn self_test_entry_with_failing_lba() {
        let mut log = SelfTestLog::new_zeroed();
        log.results[0].status = 0x27;
        log.results[0].valid_info = 0x02;
        log.results[0].power_on_hours = 500.into();
        log.results[0].failing_lba = 0xDEAD_0000.into();

        let mut dev = scripted(controller(), namespace(), health(), log);
        let mut info = DeviceInformation::default();
        collect(&mut dev, &mut info);

        let last = info.last_self_test.expect("self-test entry");
        assert_eq!(last.test_number, 0x2);
        assert_eq!(last.result_code, 0x7);
        assert_eq!(last.power_on_hours, 500);
        assert_eq!(last.error_lba, Some(0xDEAD_0000));
    }

    #[test]
    fn critical_warning_marks_read_only_and_tripped() {
        let mut sick = health();
        sick.critical_warning = CRITICAL_WARNING_READ_ONLY;

        let mut dev = scripted(
            controller(),
            namespace(),
            sick,
            SelfTestLog::new_zeroed(),
        );
        let mut info = DeviceInformation::default();
        collect(&mut dev, &mut info);

        assert!(info.write_protected);
        assert_eq!(info.health.smart_status, SmartStatus::Tripped);
    }

    #[test]
    fn scsi_identity_survives_nvme_overlay() {
        let mut dev = scripted(
            controller(),
            namespace(),
            health(),
            SelfTestLog::new_zeroed(),
        );
        let mut info = DeviceInformation::default();
        info.identity.model = "Bridge Vendor Disk".to_string();
        info.identity.serial = "BRIDGE0001".to_string();
        collect(&mut dev, &mut info);

        assert_eq!(info.identity.model, "Bridge Vendor Disk");
        assert_eq!(info.identity.serial, "BRIDGE0001");
        // Health still overlays.
        assert_eq!(info.health.temperature.current, Some(27));
    }
}
