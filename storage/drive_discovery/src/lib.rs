// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Unified storage device discovery over ATA, SCSI, and NVMe
//! passthrough transports.
//!
//! [`discover`] issues the identification, log, VPD, and mode queries a
//! device's protocol supports and assembles one normalized
//! [`DeviceInformation`] record. Individual page failures never fail
//! discovery — a page the device refuses to serve leaves its fields at
//! their defaults. Only a device that cannot answer its protocol's
//! identification command fails the whole operation.

pub mod info;

mod ata;
mod ata_logs;
mod merge;
mod nvme;
mod quirks;
mod scsi;
mod scsi_logs;
mod scsi_modes;


pub use info::DeviceInformation;

use ata_spec::AtaCommand;
use ata_spec::IdentifyDevice;
use storage_passthru::AtaTaskfile;
use storage_passthru::DataDirection;
use storage_passthru::PassthroughDevice;
use storage_passthru::Protocol;
use storage_passthru::TransportError;
use thiserror::Error;
use zerocopy::FromBytes;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The device did not answer its protocol's identification command.
    #[error("device identification failed")]
    Identify(#[source] TransportError),
}

/// Discovers everything the device is willing to report and returns the
/// assembled record.
pub fn discover(dev: &mut dyn PassthroughDevice) -> Result<DeviceInformation, DiscoveryError> {
    let protocol = dev.protocol();
    tracing::debug!(?protocol, "starting discovery");

    let mut info = DeviceInformation::default();
    let quirks = match protocol {
        Protocol::Ata => {
            let id = ata_identify(dev).map_err(DiscoveryError::Identify)?;
            ata::decode_identify(&id, &mut info);
            let quirks = quirks::lookup(&info.identity);
            ata_logs::collect(dev, &id, &mut info, &quirks);
            quirks
        }
        Protocol::Scsi => {
            let quirks = scsi::collect(dev, &mut info).map_err(DiscoveryError::Identify)?;
            scsi_logs::collect(dev, &mut info);
            scsi_modes::collect(dev, &mut info, &quirks);
            // USB bridges carrying NVMe answer admin passthrough while
            // translating everything else; overlay the native health.
            if !info.ata_behind_sat && nvme::collect(dev, &mut info) {
                info.nvme_behind_scsi = true;
            }
            quirks
        }
        Protocol::Nvme => {
            if !nvme::collect(dev, &mut info) {
                return Err(DiscoveryError::Identify(TransportError::NotSupported));
            }
            quirks::lookup(&info.identity)
        }
    };

    merge::finalize(&mut info, &quirks);
    Ok(info)
}

fn ata_identify(dev: &mut dyn PassthroughDevice) -> Result<IdentifyDevice, TransportError> {
    let mut buf = [0u8; size_of::<IdentifyDevice>()];
    let taskfile = AtaTaskfile {
        command: AtaCommand::IDENTIFY_DEVICE.0,
        count: 1,
        ..Default::default()
    };
    dev.ata_command(&taskfile, DataDirection::FromDevice, &mut buf)?;
    IdentifyDevice::read_from_bytes(&buf[..]).map_err(|_| TransportError::Transport)
}
