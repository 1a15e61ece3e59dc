// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Deliberate creation of uncorrectable sectors for error-path testing.
//!
//! The engine walks a range of physical sectors and, for each one,
//! works down a ladder of injection methods until one succeeds: ATA
//! WRITE UNCORRECTABLE EXT, SCT long-sector rewrite, legacy READ/WRITE
//! LONG, SCSI WRITE LONG with WR_UNCOR, and finally a SCSI read-long,
//! corrupt, write-long cycle. Corruption inverts a prefix of the sector
//! image, so injecting the same sector twice restores it.

use ata_spec::log::LogAddress;
use ata_spec::log::SctAction;
use ata_spec::log::SctKey;
use ata_spec::log::LOG_PAGE_BYTES;
use ata_spec::log::SCT_FUNCTION_READ_LONG;
use ata_spec::log::SCT_FUNCTION_WRITE_LONG;
use ata_spec::AtaCommand;
use ata_spec::SetFeature;
use ata_spec::WRITE_UNCORRECTABLE_FLAGGED;
use ata_spec::WRITE_UNCORRECTABLE_PSEUDO;
use drive_discovery::info::InjectionCapabilities;
use drive_discovery::DeviceInformation;
use scsi_spec::Read16Cdb;
use scsi_spec::ReadLong10Cdb;
use scsi_spec::ReadLong16Cdb;
use scsi_spec::ScsiOp;
use scsi_spec::WriteLong10Cdb;
use scsi_spec::WriteLong16Cdb;
use scsi_spec::WriteLongFlags;
use scsi_spec::SERVICE_ACTION_READ_LONG16;
use scsi_spec::SERVICE_ACTION_WRITE_LONG16;
use storage_passthru::AtaTaskfile;
use storage_passthru::DataDirection;
use storage_passthru::PassthroughDevice;
use storage_passthru::Protocol;
use storage_passthru::TransportError;
use thiserror::Error;
use zerocopy::FromZeros;
use zerocopy::IntoBytes;

#[derive(Debug, Error)]
pub enum InjectError {
    /// The device offers no injection method the engine knows how to
    /// drive.
    #[error("no supported uncorrectable-sector injection method")]
    NotSupported,
    /// Random injection needs the device capacity.
    #[error("device capacity is unknown")]
    UnknownCapacity,
    /// Every ladder method failed for a sector; earlier sectors were
    /// already injected.
    #[error("injection failed at lba {lba}")]
    Failed {
        lba: u64,
        #[source]
        source: TransportError,
    },
}

#[derive(Debug, Copy, Clone)]
pub struct InjectRequest {
    pub start_lba: u64,
    /// Number of physical sectors to make uncorrectable.
    pub length: u64,
    /// How many leading bytes of each sector image to invert. Zero
    /// leaves the data intact; anything at or past the sector size
    /// corrupts the whole sector.
    pub corrupt_bytes: usize,
    /// Flag the sector uncorrectable rather than writing a
    /// pseudo-uncorrectable image.
    pub flagged: bool,
    /// Read each sector back afterwards (ignoring the expected error)
    /// so the drive logs it as a pending defect.
    pub read_after_inject: bool,
}

/// Legacy READ/WRITE LONG address 28-bit addressing only.
const LBA28_LIMIT: u64 = 1 << 28;

/// Makes the requested sectors uncorrectable and returns the LBAs
/// processed, in order. Fails fast: the first sector for which every
/// method fails aborts the walk.
pub fn create_uncorrectables(
    dev: &mut dyn PassthroughDevice,
    info: &DeviceInformation,
    request: &InjectRequest,
) -> Result<Vec<u64>, InjectError> {
    let ladder = Ladder::new(dev.protocol(), info, request)?;

    // Start on a physical boundary so a partial physical sector is
    // never left behind.
    let start = request.start_lba - request.start_lba % ladder.logical_per_physical;
    let mut injected = Vec::with_capacity(request.length as usize);
    for i in 0..request.length {
        let lba = start + i * ladder.increment;
        ladder.inject_one(dev, lba)?;
        if request.read_after_inject {
            read_back(dev, lba, ladder.logical_bytes);
        }
        injected.push(lba);
    }
    Ok(injected)
}

/// Injects `count` uncorrectable sectors at random physical-aligned
/// LBAs. The PRNG is seeded from the wall clock on every call.
pub fn create_random_uncorrectables(
    dev: &mut dyn PassthroughDevice,
    info: &DeviceInformation,
    count: u64,
    flagged: bool,
    read_after_inject: bool,
) -> Result<Vec<u64>, InjectError> {
    let max_lba = info.geometry.max_lba.ok_or(InjectError::UnknownCapacity)?;
    let mut rng = XorShift64::from_clock();
    let mut injected = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let request = InjectRequest {
            start_lba: rng.next_u64() % (max_lba + 1),
            length: 1,
            corrupt_bytes: usize::MAX,
            flagged,
            read_after_inject,
        };
        injected.extend(create_uncorrectables(dev, info, &request)?);
    }
    Ok(injected)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Method {
    AtaWriteUncorrectable,
    SctLong,
    LegacyLong,
    ScsiWriteUncorrectable,
    ScsiLongRewrite,
}

struct Ladder {
    methods: Vec<Method>,
    caps: InjectionCapabilities,
    logical_bytes: usize,
    logical_per_physical: u64,
    /// LBAs between injected sectors; 1 when the legacy long commands
    /// lead the ladder, since they address single logical sectors.
    increment: u64,
    flagged: bool,
    corrupt_bytes: usize,
}

impl Ladder {
    fn new(
        protocol: Protocol,
        info: &DeviceInformation,
        request: &InjectRequest,
    ) -> Result<Self, InjectError> {
        let caps = info.inject;
        let methods = candidate_methods(protocol, &caps, request.flagged);
        if methods.is_empty() {
            return Err(InjectError::NotSupported);
        }
        let logical = info.geometry.logical_sector_size.unwrap_or(512);
        let physical = info.geometry.physical_sector_size.unwrap_or(logical);
        let logical_per_physical = u64::from((physical / logical.max(1)).max(1));
        let increment = if methods[0] == Method::LegacyLong {
            1
        } else {
            logical_per_physical
        };
        Ok(Self {
            methods,
            caps,
            logical_bytes: logical as usize,
            logical_per_physical,
            increment,
            flagged: request.flagged,
            corrupt_bytes: request.corrupt_bytes,
        })
    }

    fn inject_one(&self, dev: &mut dyn PassthroughDevice, lba: u64) -> Result<(), InjectError> {
        let mut last = TransportError::NotSupported;
        for &method in &self.methods {
            let outcome = match method {
                Method::AtaWriteUncorrectable => {
                    ata_write_uncorrectable(dev, lba, self.logical_per_physical, self.flagged)
                }
                Method::SctLong => sct_rewrite(dev, lba, self.logical_bytes, self.corrupt_bytes),
                Method::LegacyLong => {
                    if lba >= LBA28_LIMIT {
                        continue;
                    }
                    legacy_long_rewrite(
                        dev,
                        lba,
                        self.caps.ata_legacy_ecc_bytes.unwrap_or(4),
                        self.corrupt_bytes,
                    )
                }
                Method::ScsiWriteUncorrectable => {
                    scsi_write_uncorrectable(dev, lba, self.long16(lba))
                }
                Method::ScsiLongRewrite => {
                    scsi_long_rewrite(dev, lba, self.long16(lba), self.corrupt_bytes)
                }
            };
            match outcome {
                Ok(()) => {
                    tracing::debug!(lba, ?method, "injected uncorrectable sector");
                    return Ok(());
                }
                Err(err) => last = err,
            }
        }
        Err(InjectError::Failed { lba, source: last })
    }

    fn long16(&self, lba: u64) -> bool {
        self.caps.scsi_long16 || lba > u64::from(u32::MAX)
    }
}

fn candidate_methods(
    protocol: Protocol,
    caps: &InjectionCapabilities,
    flagged: bool,
) -> Vec<Method> {
    let mut methods = Vec::new();
    match protocol {
        Protocol::Ata => {
            // Flagging (rather than corrupting) a sector is only
            // expressible through WRITE UNCORRECTABLE EXT.
            if flagged && caps.ata_write_uncorrectable {
                methods.push(Method::AtaWriteUncorrectable);
            }
            if caps.ata_sct_read_write_long {
                methods.push(Method::SctLong);
            }
            if caps.ata_legacy_long {
                methods.push(Method::LegacyLong);
            }
            if !flagged && caps.ata_write_uncorrectable {
                methods.push(Method::AtaWriteUncorrectable);
            }
        }
        Protocol::Scsi => {
            if caps.scsi_write_uncorrectable {
                methods.push(Method::ScsiWriteUncorrectable);
            }
            methods.push(Method::ScsiLongRewrite);
        }
        Protocol::Nvme => {}
    }
    methods
}

/// `out[i] = !in[i]` for the leading `corrupt_bytes` bytes. Inverting
/// twice restores the original image.
fn corrupt(data: &mut [u8], corrupt_bytes: usize) {
    for byte in data.iter_mut().take(corrupt_bytes) {
        *byte = !*byte;
    }
}

fn ata_write_uncorrectable(
    dev: &mut dyn PassthroughDevice,
    lba: u64,
    sectors: u64,
    flagged: bool,
) -> Result<(), TransportError> {
    let feature = if flagged {
        WRITE_UNCORRECTABLE_FLAGGED
    } else {
        WRITE_UNCORRECTABLE_PSEUDO
    };
    let taskfile = AtaTaskfile {
        command: AtaCommand::WRITE_UNCORRECTABLE_EXT.0,
        features: feature.into(),
        count: sectors as u16,
        lba,
        device: 0x40,
        extended: true,
        dma: false,
    };
    dev.ata_command(&taskfile, DataDirection::None, &mut [])?;
    Ok(())
}

fn sct_rewrite(
    dev: &mut dyn PassthroughDevice,
    lba: u64,
    logical_bytes: usize,
    corrupt_bytes: usize,
) -> Result<(), TransportError> {
    let mut data = vec![0u8; logical_bytes.next_multiple_of(LOG_PAGE_BYTES)];
    sct_key(dev, SCT_FUNCTION_READ_LONG, lba)?;
    ata_log(dev, AtaCommand::READ_LOG_EXT, LogAddress::SCT_DATA_TRANSFER, &mut data)?;
    corrupt(&mut data[..logical_bytes], corrupt_bytes);
    sct_key(dev, SCT_FUNCTION_WRITE_LONG, lba)?;
    ata_log(dev, AtaCommand::WRITE_LOG_EXT, LogAddress::SCT_DATA_TRANSFER, &mut data)?;
    Ok(())
}

/// Issues an SCT command by writing its key sector to log E0h.
fn sct_key(
    dev: &mut dyn PassthroughDevice,
    function: u16,
    lba: u64,
) -> Result<(), TransportError> {
    let mut key = SctKey::new_zeroed();
    key.action_code = SctAction::LONG_SECTOR_ACCESS.0.into();
    key.function_code = function.into();
    key.lba = lba.into();
    key.count = 1.into();
    let mut buf = key.as_bytes().to_vec();
    ata_log(dev, AtaCommand::WRITE_LOG_EXT, LogAddress::SCT_COMMAND_STATUS, &mut buf)
}

fn ata_log(
    dev: &mut dyn PassthroughDevice,
    command: AtaCommand,
    log: LogAddress,
    buf: &mut [u8],
) -> Result<(), TransportError> {
    debug_assert_eq!(buf.len() % LOG_PAGE_BYTES, 0);
    let direction = if command == AtaCommand::READ_LOG_EXT {
        DataDirection::FromDevice
    } else {
        DataDirection::ToDevice
    };
    let taskfile = AtaTaskfile {
        command: command.0,
        features: 0,
        count: (buf.len() / LOG_PAGE_BYTES) as u16,
        lba: u64::from(log.0),
        device: 0x40,
        extended: true,
        dma: false,
    };
    dev.ata_command(&taskfile, direction, buf)?;
    Ok(())
}

fn legacy_long_rewrite(
    dev: &mut dyn PassthroughDevice,
    lba: u64,
    ecc_bytes: u16,
    corrupt_bytes: usize,
) -> Result<(), TransportError> {
    // Drives that do not default to 4 ECC bytes need the transfer
    // length configured first.
    if ecc_bytes != 4 {
        let taskfile = AtaTaskfile {
            command: AtaCommand::SET_FEATURES.0,
            features: u16::from(SetFeature::LEGACY_ECC_BYTES.0),
            count: ecc_bytes,
            lba: 0,
            device: 0x40,
            extended: false,
            dma: false,
        };
        dev.ata_command(&taskfile, DataDirection::None, &mut [])?;
    }

    let mut data = vec![0u8; 512 + usize::from(ecc_bytes)];
    let taskfile = AtaTaskfile {
        command: AtaCommand::READ_LONG.0,
        features: 0,
        count: 1,
        lba: lba & 0x00FF_FFFF,
        device: 0x40 | (lba >> 24) as u8 & 0x0F,
        extended: false,
        dma: false,
    };
    dev.ata_command(&taskfile, DataDirection::FromDevice, &mut data)?;
    corrupt(&mut data[..512], corrupt_bytes);
    let taskfile = AtaTaskfile {
        command: AtaCommand::WRITE_LONG.0,
        ..taskfile
    };
    dev.ata_command(&taskfile, DataDirection::ToDevice, &mut data)?;
    Ok(())
}

fn scsi_write_uncorrectable(
    dev: &mut dyn PassthroughDevice,
    lba: u64,
    long16: bool,
) -> Result<(), TransportError> {
    let flags = WriteLongFlags::new().with_wr_uncor(true);
    if long16 {
        let cdb = WriteLong16Cdb {
            operation_code: ScsiOp::SERVICE_ACTION_OUT16,
            service_action_flags: u8::from(flags) | SERVICE_ACTION_WRITE_LONG16,
            logical_block: lba.into(),
            reserved: [0; 2],
            byte_transfer_length: 0.into(),
            reserved2: 0,
            control: 0,
        };
        dev.scsi_command(cdb.as_bytes(), DataDirection::None, &mut [])
    } else {
        let cdb = WriteLong10Cdb {
            operation_code: ScsiOp::WRITE_LONG,
            flags,
            logical_block: (lba as u32).into(),
            reserved: 0,
            byte_transfer_length: 0.into(),
            control: 0,
        };
        dev.scsi_command(cdb.as_bytes(), DataDirection::None, &mut [])
    }
}

fn scsi_long_rewrite(
    dev: &mut dyn PassthroughDevice,
    lba: u64,
    long16: bool,
    corrupt_bytes: usize,
) -> Result<(), TransportError> {
    // A zero-length probe draws an ILI response whose residue is the
    // negated long-sector size.
    let residue = match read_long(dev, lba, long16, &mut []) {
        Err(TransportError::IllegalLength { residue }) => residue,
        Err(err) => return Err(err),
        Ok(()) => return Err(TransportError::NotSupported),
    };
    if residue >= 0 {
        return Err(TransportError::NotSupported);
    }
    let length = residue.unsigned_abs() as usize;

    let mut data = vec![0u8; length];
    read_long(dev, lba, long16, &mut data)?;
    corrupt(&mut data, corrupt_bytes);
    write_long(dev, lba, long16, &mut data)?;
    Ok(())
}

fn read_long(
    dev: &mut dyn PassthroughDevice,
    lba: u64,
    long16: bool,
    buf: &mut [u8],
) -> Result<(), TransportError> {
    if long16 {
        let cdb = ReadLong16Cdb {
            operation_code: ScsiOp::SERVICE_ACTION_IN16,
            service_action: SERVICE_ACTION_READ_LONG16,
            logical_block: lba.into(),
            reserved: [0; 2],
            byte_transfer_length: (buf.len() as u16).into(),
            flags: 0,
            control: 0,
        };
        dev.scsi_command(cdb.as_bytes(), DataDirection::FromDevice, buf)
    } else {
        let cdb = ReadLong10Cdb {
            operation_code: ScsiOp::READ_LONG,
            flags: 0,
            logical_block: (lba as u32).into(),
            reserved: 0,
            byte_transfer_length: (buf.len() as u16).into(),
            control: 0,
        };
        dev.scsi_command(cdb.as_bytes(), DataDirection::FromDevice, buf)
    }
}

fn write_long(
    dev: &mut dyn PassthroughDevice,
    lba: u64,
    long16: bool,
    buf: &mut [u8],
) -> Result<(), TransportError> {
    if long16 {
        let cdb = WriteLong16Cdb {
            operation_code: ScsiOp::SERVICE_ACTION_OUT16,
            service_action_flags: SERVICE_ACTION_WRITE_LONG16,
            logical_block: lba.into(),
            reserved: [0; 2],
            byte_transfer_length: (buf.len() as u16).into(),
            reserved2: 0,
            control: 0,
        };
        dev.scsi_command(cdb.as_bytes(), DataDirection::ToDevice, buf)
    } else {
        let cdb = WriteLong10Cdb {
            operation_code: ScsiOp::WRITE_LONG,
            flags: WriteLongFlags::new(),
            logical_block: (lba as u32).into(),
            reserved: 0,
            byte_transfer_length: (buf.len() as u16).into(),
            control: 0,
        };
        dev.scsi_command(cdb.as_bytes(), DataDirection::ToDevice, buf)
    }
}

/// Best-effort read to push the sector into the drive's pending-defect
/// accounting; the medium error it usually draws is the point.
fn read_back(dev: &mut dyn PassthroughDevice, lba: u64, logical_bytes: usize) {
    let mut buf = vec![0u8; logical_bytes];
    let _ = match dev.protocol() {
        Protocol::Ata => {
            let taskfile = AtaTaskfile {
                command: AtaCommand::READ_DMA_EXT.0,
                features: 0,
                count: 1,
                lba,
                device: 0x40,
                extended: true,
                dma: true,
            };
            dev.ata_command(&taskfile, DataDirection::FromDevice, &mut buf)
                .map(|_| ())
        }
        Protocol::Scsi => {
            let cdb = Read16Cdb {
                operation_code: ScsiOp::READ16,
                flags: 0,
                logical_block: lba.into(),
                transfer_length: 1.into(),
                group: 0,
                control: 0,
            };
            dev.scsi_command(cdb.as_bytes(), DataDirection::FromDevice, &mut buf)
        }
        Protocol::Nvme => Ok(()),
    };
}

/// Xorshift64. The randomness only spreads injected sectors around the
/// medium, so reproducibility across calls is not wanted.
struct XorShift64(u64);

impl XorShift64 {
    fn from_clock() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0x9E37_79B9_7F4A_7C15, |d| d.as_nanos() as u64);
        Self(nanos | 1)
    }

    fn next_u64(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use storage_passthru::AtaRegisters;
    use storage_passthru::EmulatedDevice;

    fn ok_registers() -> AtaRegisters {
        AtaRegisters {
            status: 0x50,
            error: 0,
            count: 0,
            lba: 0,
            device: 0x40,
        }
    }

    fn ata_info(logical: u32, physical: u32, caps: InjectionCapabilities) -> DeviceInformation {
        let mut info = DeviceInformation::default();
        info.geometry.logical_sector_size = Some(logical);
        info.geometry.physical_sector_size = Some(physical);
        info.geometry.max_lba = Some(1 << 30);
        info.inject = caps;
        info
    }

    #[test]
    fn aligns_and_steps_by_physical_sector() {
        let recorded = Rc::new(RefCell::new(Vec::new()));
        let log = recorded.clone();
        let mut dev = EmulatedDevice::new(Protocol::Ata).with_ata(
            move |taskfile: &AtaTaskfile, _, _: &mut [u8]| {
                assert_eq!(taskfile.command, AtaCommand::WRITE_UNCORRECTABLE_EXT.0);
                assert_eq!(taskfile.features, u16::from(WRITE_UNCORRECTABLE_FLAGGED));
                assert_eq!(taskfile.count, 8);
                log.borrow_mut().push(taskfile.lba);
                Ok(ok_registers())
            },
        );
        let info = ata_info(
            512,
            4096,
            InjectionCapabilities {
                ata_write_uncorrectable: true,
                ..Default::default()
            },
        );

        let injected = create_uncorrectables(
            &mut dev,
            &info,
            &InjectRequest {
                start_lba: 4097,
                length: 3,
                corrupt_bytes: 0,
                flagged: true,
                read_after_inject: false,
            },
        )
        .unwrap();

        assert_eq!(injected, vec![4096, 4104, 4112]);
        assert_eq!(*recorded.borrow(), vec![4096, 4104, 4112]);
        for lba in injected {
            assert_eq!(lba % 8, 0);
        }
    }

    #[test]
    fn sct_rewrite_inverts_the_corrupt_prefix() {
        let written = Rc::new(RefCell::new(Vec::new()));
        let sink = written.clone();
        let mut pending_function = 0u16;
        let mut dev = EmulatedDevice::new(Protocol::Ata).with_ata(
            move |taskfile: &AtaTaskfile, _, data: &mut [u8]| {
                let log = (taskfile.lba & 0xFF) as u8;
                match (taskfile.command, log) {
                    (0x3F, 0xE0) => {
                        pending_function = u16::from_le_bytes([data[2], data[3]]);
                        Ok(ok_registers())
                    }
                    (0x2F, 0xE1) => {
                        assert_eq!(pending_function, SCT_FUNCTION_READ_LONG);
                        data.fill(0xAB);
                        Ok(ok_registers())
                    }
                    (0x3F, 0xE1) => {
                        assert_eq!(pending_function, SCT_FUNCTION_WRITE_LONG);
                        sink.borrow_mut().extend_from_slice(data);
                        Ok(ok_registers())
                    }
                    _ => Err(TransportError::Aborted),
                }
            },
        );
        let info = ata_info(
            512,
            512,
            InjectionCapabilities {
                ata_sct_read_write_long: true,
                ..Default::default()
            },
        );

        create_uncorrectables(
            &mut dev,
            &info,
            &InjectRequest {
                start_lba: 64,
                length: 1,
                corrupt_bytes: 16,
                flagged: false,
                read_after_inject: false,
            },
        )
        .unwrap();

        let written = written.borrow();
        assert_eq!(written.len(), 512);
        assert!(written[..16].iter().all(|&b| b == 0x54));
        assert!(written[16..512].iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn legacy_long_prepares_ecc_and_steps_singly() {
        let commands = Rc::new(RefCell::new(Vec::new()));
        let log = commands.clone();
        let mut dev = EmulatedDevice::new(Protocol::Ata).with_ata(
            move |taskfile: &AtaTaskfile, _, data: &mut [u8]| {
                log.borrow_mut().push((taskfile.command, taskfile.count));
                if taskfile.command == AtaCommand::READ_LONG.0
                    || taskfile.command == AtaCommand::WRITE_LONG.0
                {
                    assert_eq!(data.len(), 512 + 22);
                }
                Ok(ok_registers())
            },
        );
        let mut info = ata_info(
            512,
            4096,
            InjectionCapabilities {
                ata_legacy_long: true,
                ata_legacy_ecc_bytes: Some(22),
                ..Default::default()
            },
        );
        info.geometry.max_lba = Some(LBA28_LIMIT - 1);

        let injected = create_uncorrectables(
            &mut dev,
            &info,
            &InjectRequest {
                start_lba: 100,
                length: 2,
                corrupt_bytes: 4,
                flagged: false,
                read_after_inject: false,
            },
        )
        .unwrap();

        // Legacy long addresses logical sectors, so the increment is 1
        // even with 4Kn physical sectors.
        assert_eq!(injected, vec![96, 97]);
        let commands = commands.borrow();
        assert_eq!(commands[0], (AtaCommand::SET_FEATURES.0, 22));
        assert_eq!(commands[1].0, AtaCommand::READ_LONG.0);
        assert_eq!(commands[2].0, AtaCommand::WRITE_LONG.0);
    }

    #[test]
    fn scsi_write_uncorrectable_sets_wr_uncor() {
        let mut dev = EmulatedDevice::new(Protocol::Scsi).with_scsi(
            |cdb: &[u8], _, _: &mut [u8]| {
                assert_eq!(cdb[0], ScsiOp::WRITE_LONG.0);
                let flags = WriteLongFlags::from(cdb[1]);
                assert!(flags.wr_uncor());
                assert_eq!(u16::from_be_bytes([cdb[7], cdb[8]]), 0);
                Ok(())
            },
        );
        let mut info = ata_info(
            512,
            512,
            InjectionCapabilities {
                scsi_write_uncorrectable: true,
                ..Default::default()
            },
        );
        info.geometry.max_lba = Some(1 << 20);

        let injected = create_uncorrectables(
            &mut dev,
            &info,
            &InjectRequest {
                start_lba: 777,
                length: 1,
                corrupt_bytes: 0,
                flagged: false,
                read_after_inject: false,
            },
        )
        .unwrap();
        assert_eq!(injected, vec![777]);
    }

    /// A scripted SCSI target whose long-sector image survives between
    /// commands, so rewriting the same sector twice restores it.
    fn long_sector_target(image: Rc<RefCell<Vec<u8>>>) -> EmulatedDevice {
        EmulatedDevice::new(Protocol::Scsi).with_scsi(move |cdb, _, data: &mut [u8]| {
            let image_len = image.borrow().len();
            match cdb[0] {
                op if op == ScsiOp::READ_LONG.0 => {
                    let requested = usize::from(u16::from_be_bytes([cdb[7], cdb[8]]));
                    if requested != image_len {
                        return Err(TransportError::IllegalLength {
                            residue: requested as i32 - image_len as i32,
                        });
                    }
                    data.copy_from_slice(&image.borrow());
                    Ok(())
                }
                op if op == ScsiOp::WRITE_LONG.0 => {
                    let requested = usize::from(u16::from_be_bytes([cdb[7], cdb[8]]));
                    if requested != image_len {
                        return Err(TransportError::IllegalLength {
                            residue: requested as i32 - image_len as i32,
                        });
                    }
                    image.borrow_mut().copy_from_slice(data);
                    Ok(())
                }
                _ => Err(TransportError::InvalidOpcode),
            }
        })
    }

    #[test]
    fn read_long_ili_probe_then_double_injection_restores() {
        let original: Vec<u8> = (0..520u32).map(|i| i as u8).collect();
        let image = Rc::new(RefCell::new(original.clone()));
        let mut dev = long_sector_target(image.clone());
        let mut info = ata_info(512, 512, InjectionCapabilities::default());
        info.geometry.max_lba = Some(1 << 20);
        let request = InjectRequest {
            start_lba: 5,
            length: 1,
            corrupt_bytes: 520,
            flagged: false,
            read_after_inject: false,
        };

        create_uncorrectables(&mut dev, &info, &request).unwrap();
        {
            let corrupted = image.borrow();
            assert!(corrupted.iter().zip(&original).all(|(c, o)| *c == !*o));
        }

        let mut dev = long_sector_target(image.clone());
        create_uncorrectables(&mut dev, &info, &request).unwrap();
        assert_eq!(*image.borrow(), original);
    }

    #[test]
    fn nvme_devices_are_not_supported() {
        let mut dev = EmulatedDevice::new(Protocol::Nvme);
        let info = DeviceInformation::default();
        match create_uncorrectables(
            &mut dev,
            &info,
            &InjectRequest {
                start_lba: 0,
                length: 1,
                corrupt_bytes: 0,
                flagged: false,
                read_after_inject: false,
            },
        ) {
            Err(InjectError::NotSupported) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn failure_reports_the_failing_lba() {
        let mut served = 0;
        let mut dev = EmulatedDevice::new(Protocol::Ata).with_ata(
            move |_: &AtaTaskfile, _, _: &mut [u8]| {
                served += 1;
                if served > 2 {
                    return Err(TransportError::Aborted);
                }
                Ok(ok_registers())
            },
        );
        let info = ata_info(
            512,
            4096,
            InjectionCapabilities {
                ata_write_uncorrectable: true,
                ..Default::default()
            },
        );

        match create_uncorrectables(
            &mut dev,
            &info,
            &InjectRequest {
                start_lba: 0,
                length: 4,
                corrupt_bytes: 0,
                flagged: true,
                read_after_inject: false,
            },
        ) {
            Err(InjectError::Failed {
                lba: 16,
                source: TransportError::Aborted,
            }) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn random_injection_stays_aligned_and_in_range() {
        let mut dev = EmulatedDevice::new(Protocol::Ata).with_ata(
            |_: &AtaTaskfile, _, _: &mut [u8]| Ok(ok_registers()),
        );
        let info = ata_info(
            512,
            4096,
            InjectionCapabilities {
                ata_write_uncorrectable: true,
                ..Default::default()
            },
        );

        let injected = create_random_uncorrectables(&mut dev, &info, 32, false, false).unwrap();
        assert_eq!(injected.len(), 32);
        for lba in injected {
            assert_eq!(lba % 8, 0);
            assert!(lba <= 1 << 30);
        }
    }
}
