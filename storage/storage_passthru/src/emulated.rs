// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! An in-memory [`PassthroughDevice`] built from closures, used by unit
//! tests to script device responses.

use crate::AtaRegisters;
use crate::AtaTaskfile;
use crate::DataDirection;
use crate::NvmeCommand;
use crate::PassthroughDevice;
use crate::Protocol;
use crate::TransportError;

pub type AtaHandler =
    Box<dyn FnMut(&AtaTaskfile, DataDirection, &mut [u8]) -> Result<AtaRegisters, TransportError>>;
pub type ScsiHandler =
    Box<dyn FnMut(&[u8], DataDirection, &mut [u8]) -> Result<(), TransportError>>;
pub type NvmeHandler =
    Box<dyn FnMut(&NvmeCommand, DataDirection, &mut [u8]) -> Result<u32, TransportError>>;

/// A scripted device. Handlers default to rejecting every command with
/// [`TransportError::InvalidOpcode`], which reads as "command form not
/// supported" to the layers under test.
pub struct EmulatedDevice {
    protocol: Protocol,
    luns: u32,
    ata: AtaHandler,
    scsi: ScsiHandler,
    nvme: NvmeHandler,
}

impl EmulatedDevice {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            luns: 1,
            ata: Box::new(|_, _, _| Err(TransportError::InvalidOpcode)),
            scsi: Box::new(|_, _, _| Err(TransportError::InvalidOpcode)),
            nvme: Box::new(|_, _, _| Err(TransportError::InvalidOpcode)),
        }
    }

    pub fn with_ata(
        mut self,
        handler: impl FnMut(&AtaTaskfile, DataDirection, &mut [u8]) -> Result<AtaRegisters, TransportError>
        + 'static,
    ) -> Self {
        self.ata = Box::new(handler);
        self
    }

    pub fn with_scsi(
        mut self,
        handler: impl FnMut(&[u8], DataDirection, &mut [u8]) -> Result<(), TransportError> + 'static,
    ) -> Self {
        self.scsi = Box::new(handler);
        self
    }

    pub fn with_nvme(
        mut self,
        handler: impl FnMut(&NvmeCommand, DataDirection, &mut [u8]) -> Result<u32, TransportError>
        + 'static,
    ) -> Self {
        self.nvme = Box::new(handler);
        self
    }

    pub fn with_lun_count(mut self, luns: u32) -> Self {
        self.luns = luns;
        self
    }
}

impl PassthroughDevice for EmulatedDevice {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    fn ata_command(
        &mut self,
        taskfile: &AtaTaskfile,
        direction: DataDirection,
        data: &mut [u8],
    ) -> Result<AtaRegisters, TransportError> {
        (self.ata)(taskfile, direction, data)
    }

    fn scsi_command(
        &mut self,
        cdb: &[u8],
        direction: DataDirection,
        data: &mut [u8],
    ) -> Result<(), TransportError> {
        (self.scsi)(cdb, direction, data)
    }

    fn nvme_admin_command(
        &mut self,
        command: &NvmeCommand,
        direction: DataDirection,
        data: &mut [u8],
    ) -> Result<u32, TransportError> {
        (self.nvme)(command, direction, data)
    }

    fn lun_count(&mut self) -> Result<u32, TransportError> {
        Ok(self.luns)
    }
}
