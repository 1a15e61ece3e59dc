// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The transport facade: a synchronous passthrough interface that issues
//! one ATA, SCSI, or NVMe admin command at a time to a device.
//!
//! Implementations own blocking, timeouts, and OS plumbing. Command-level
//! failures are normalized into [`TransportError`] so the layers above can
//! run fallback ladders without caring which transport produced the error.

pub mod emulated;

pub use emulated::EmulatedDevice;

use scsi_spec::AdditionalSenseCode;
use scsi_spec::SenseData;
use scsi_spec::SenseKey;
use thiserror::Error;

/// The command set a device accepts natively.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Protocol {
    Ata,
    Scsi,
    Nvme,
}

/// Data phase direction for a command.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DataDirection {
    None,
    FromDevice,
    ToDevice,
}

/// ATA register inputs for a command. 48-bit commands use the full
/// width of `features`, `count`, and `lba`; 28-bit commands use the low
/// bytes.
#[derive(Debug, Copy, Clone, Default)]
pub struct AtaTaskfile {
    pub command: u8,
    pub features: u16,
    pub count: u16,
    pub lba: u64,
    pub device: u8,
    /// Issue as a 48-bit (extended) command.
    pub extended: bool,
    /// Use the DMA variant of the protocol where one exists.
    pub dma: bool,
}

/// ATA register outputs after command completion.
#[derive(Debug, Copy, Clone, Default)]
pub struct AtaRegisters {
    pub status: u8,
    pub error: u8,
    pub count: u16,
    pub lba: u64,
    pub device: u8,
}

/// An NVMe admin command: opcode, namespace, and the command dwords.
#[derive(Debug, Copy, Clone, Default)]
pub struct NvmeCommand {
    pub opcode: u8,
    pub nsid: u32,
    pub cdw10: u32,
    pub cdw11: u32,
    pub cdw12: u32,
    pub cdw13: u32,
    pub cdw14: u32,
    pub cdw15: u32,
}

/// A command-level failure, normalized across transports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The device rejected the command form. Treated as "this command
    /// is not supported" and drives fallback ladders.
    #[error("command form not supported by device")]
    InvalidOpcode,
    /// The transfer length did not match the device's long sector size.
    /// `residue` is requested minus actual, two's complement.
    #[error("illegal length indicator, residue {residue}")]
    IllegalLength { residue: i32 },
    /// Unrecovered medium error.
    #[error("medium error (asc {asc:#04x}, ascq {ascq:#04x})")]
    MediumError { asc: u8, ascq: u8 },
    /// The device aborted the command.
    #[error("command aborted by device")]
    Aborted,
    /// The capability is absent on this device.
    #[error("not supported by device")]
    NotSupported,
    /// The transport facade timed out the command. Never retried.
    #[error("command timed out")]
    Timeout,
    /// A non-command-level transport failure.
    #[error("transport failure")]
    Transport,
}

impl TransportError {
    /// Medium format corrupted: `medium_error(0x31, 0x00)`.
    pub fn is_format_corrupt(&self) -> bool {
        matches!(
            self,
            TransportError::MediumError { asc, ascq: 0 }
                if *asc == AdditionalSenseCode::MEDIUM_FORMAT_CORRUPTED.0
        )
    }
}

/// Maps fixed-format sense data to a [`TransportError`]. Transports call
/// this when a command completes with CHECK CONDITION.
pub fn classify_sense(sense: &SenseData) -> TransportError {
    if sense.incorrect_length() {
        return TransportError::IllegalLength {
            residue: sense.information(),
        };
    }
    match sense.key() {
        SenseKey::ILLEGAL_REQUEST => match sense.additional_sense_code {
            AdditionalSenseCode::INVALID_CDB | AdditionalSenseCode::ILLEGAL_COMMAND => {
                TransportError::InvalidOpcode
            }
            _ => TransportError::NotSupported,
        },
        SenseKey::MEDIUM_ERROR => TransportError::MediumError {
            asc: sense.additional_sense_code.0,
            ascq: sense.additional_sense_code_qualifier,
        },
        SenseKey::ABORTED_COMMAND => TransportError::Aborted,
        SenseKey::NO_SENSE | SenseKey::RECOVERED_ERROR => TransportError::Transport,
        _ => TransportError::Transport,
    }
}

/// Maps an NVMe completion status to a [`TransportError`].
pub fn classify_nvme_status(status: nvme_spec::Status) -> TransportError {
    use nvme_spec::Status;
    match status {
        Status::INVALID_COMMAND_OPCODE | Status::INVALID_FIELD_IN_COMMAND => {
            TransportError::InvalidOpcode
        }
        Status::INVALID_LOG_PAGE => TransportError::NotSupported,
        Status::ABORTED_COMMAND => TransportError::Aborted,
        Status::UNRECOVERED_READ_ERROR => TransportError::MediumError {
            asc: AdditionalSenseCode::UNRECOVERED_ERROR.0,
            ascq: 0,
        },
        _ if status.code_type() == 2 => TransportError::MediumError { asc: 0, ascq: 0 },
        _ => TransportError::Transport,
    }
}

/// A device reachable through one passthrough transport.
///
/// One outstanding command at a time; callers serialize access. A
/// command that moves no data is issued with [`DataDirection::None`]
/// and an empty buffer.
pub trait PassthroughDevice {
    /// The command set this device accepts directly.
    fn protocol(&self) -> Protocol;

    /// Issues an ATA command and returns the completion registers.
    fn ata_command(
        &mut self,
        taskfile: &AtaTaskfile,
        direction: DataDirection,
        data: &mut [u8],
    ) -> Result<AtaRegisters, TransportError>;

    /// Issues a SCSI CDB.
    fn scsi_command(
        &mut self,
        cdb: &[u8],
        direction: DataDirection,
        data: &mut [u8],
    ) -> Result<(), TransportError>;

    /// Issues an NVMe admin command and returns completion dword 0.
    fn nvme_admin_command(
        &mut self,
        command: &NvmeCommand,
        direction: DataDirection,
        data: &mut [u8],
    ) -> Result<u32, TransportError>;

    /// Number of logical units behind the target. One for every device
    /// that does not say otherwise.
    fn lun_count(&mut self) -> Result<u32, TransportError> {
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sense_classification() {
        let sense = SenseData::new(SenseKey::ILLEGAL_REQUEST, AdditionalSenseCode::INVALID_CDB, 0);
        assert_eq!(classify_sense(&sense), TransportError::InvalidOpcode);

        let sense = SenseData::new(
            SenseKey::MEDIUM_ERROR,
            AdditionalSenseCode::MEDIUM_FORMAT_CORRUPTED,
            0,
        );
        let err = classify_sense(&sense);
        assert!(err.is_format_corrupt());

        let mut sense = SenseData::new(SenseKey::ILLEGAL_REQUEST, AdditionalSenseCode::NO_SENSE, 0);
        sense.header.sense_key |= 0x20;
        sense.header.information = (-504i32).to_be_bytes();
        assert_eq!(
            classify_sense(&sense),
            TransportError::IllegalLength { residue: -504 }
        );
    }

    #[test]
    fn nvme_classification() {
        use nvme_spec::Status;
        assert_eq!(
            classify_nvme_status(Status::INVALID_COMMAND_OPCODE),
            TransportError::InvalidOpcode
        );
        assert!(matches!(
            classify_nvme_status(Status::UNRECOVERED_READ_ERROR),
            TransportError::MediumError { .. }
        ));
    }
}
