// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Scripted-device builders shared by the discovery tests.

use ata_spec::AtaCommand;
use ata_spec::IdentifyDevice;
use scsi_spec::InquiryData;
use storage_passthru::AtaRegisters;
use storage_passthru::AtaTaskfile;
use storage_passthru::DataDirection;
use storage_passthru::EmulatedDevice;
use storage_passthru::Protocol;
use storage_passthru::TransportError;
use zerocopy::FromZeros;
use zerocopy::IntoBytes;

/// Stores `s` into an ATA identify string field: space padded, bytes
/// swapped within each word.
pub(crate) fn store_ata_string(field: &mut [u8], s: &str) {
    field.fill(b' ');
    field[..s.len()].copy_from_slice(s.as_bytes());
    for pair in field.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
}

pub(crate) fn ok_registers() -> AtaRegisters {
    AtaRegisters {
        status: 0x50,
        error: 0,
        count: 0,
        lba: 0,
        device: 0x40,
    }
}

/// An ATA device that answers IDENTIFY DEVICE and aborts everything
/// else.
pub(crate) fn ata_device(id: IdentifyDevice) -> EmulatedDevice {
    EmulatedDevice::new(Protocol::Ata).with_ata(
        move |taskfile: &AtaTaskfile, _, data: &mut [u8]| {
            if taskfile.command == AtaCommand::IDENTIFY_DEVICE.0 {
                data.copy_from_slice(id.as_bytes());
                return Ok(ok_registers());
            }
            Err(TransportError::Aborted)
        },
    )
}

pub(crate) fn inquiry_data(vendor: &[u8; 8], product: &[u8; 16], version: u8) -> Vec<u8> {
    let mut data = InquiryData::new_zeroed();
    data.header.versions = version;
    data.header.additional_length = (size_of::<InquiryData>() - 5) as u8;
    data.vendor_id = *vendor;
    data.product_id = *product;
    data.product_revision_level = *b"E002";
    data.as_bytes().to_vec()
}

pub(crate) fn vpd_page(page: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0, page, 0, 0];
    out[2..4].copy_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Scripts SCSI commands by CDB prefix; unmatched CDBs read as
/// unsupported command forms.
pub(crate) fn scsi_server(
    responses: Vec<(Vec<u8>, Vec<u8>)>,
) -> impl FnMut(&[u8], DataDirection, &mut [u8]) -> Result<(), TransportError> {
    move |cdb, _, data| {
        for (matching, contents) in &responses {
            if cdb.len() >= matching.len() && cdb[..matching.len()] == matching[..] {
                let n = contents.len().min(data.len());
                data[..n].copy_from_slice(&contents[..n]);
                return Ok(());
            }
        }
        Err(TransportError::InvalidOpcode)
    }
}
