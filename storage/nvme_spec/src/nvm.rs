// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! NVM command set structures.

use bitfield_struct::bitfield;
use open_enum::open_enum;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

type U128LE = zerocopy::U128<zerocopy::LE>;

/// Identify Namespace data structure (CNS 00h), 4096 bytes.
#[repr(C)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct IdentifyNamespace {
    pub nsze: u64,
    pub ncap: u64,
    pub nuse: u64,
    pub nsfeat: u8,
    /// Number of LBA formats, zero based.
    pub nlbaf: u8,
    pub flbas: Flbas,
    pub mc: u8,
    pub dpc: DataProtectionCapabilities,
    pub dps: DataProtectionTypeSettings,
    pub nmic: u8,
    pub rescap: u8,
    pub fpi: u8,
    pub dlfeat: u8,
    pub nawun: u16,
    pub nawupf: u16,
    pub nacwu: u16,
    pub nabsn: u16,
    pub nabo: u16,
    pub nabspf: u16,
    pub noiob: u16,
    pub nvmcap: U128LE,
    pub npwg: u16,
    pub npwa: u16,
    pub npdg: u16,
    pub npda: u16,
    pub nows: u16,
    pub mssrl: u16,
    pub mcl: u32,
    pub msrc: u8,
    pub rsvd1: [u8; 11],
    pub anagrpid: u32,
    pub rsvd2: [u8; 3],
    pub nsattr: u8,
    pub nvmsetid: u16,
    pub endgid: u16,
    /// Big-endian byte string.
    pub nguid: [u8; 16],
    /// Big-endian byte string.
    pub eui64: [u8; 8],
    pub lbaf: [Lbaf; 16],
    pub rsvd3: [u8; 192],
    pub vs: [u8; 3712],
}

const _: () = assert!(size_of::<IdentifyNamespace>() == 4096);

impl IdentifyNamespace {
    /// The LBA format selected by FLBAS.
    pub fn formatted_lba_index(&self) -> usize {
        if self.nlbaf >= 16 {
            ((self.flbas.high_index() << 4) | self.flbas.low_index()) as usize
        } else {
            self.flbas.low_index() as usize
        }
    }
}

/// LBA format descriptor.
#[bitfield(u32)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct Lbaf {
    /// Metadata size.
    pub ms: u16,
    /// LBA data size as a power of two.
    pub lbads: u8,
    /// Relative performance: 0 best through 3 degraded.
    #[bits(2)]
    pub rp: u8,
    #[bits(6)]
    pub rsvd: u8,
}

/// Formatted LBA size.
#[bitfield(u8)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct Flbas {
    #[bits(4)]
    pub low_index: u8,
    pub inband_metadata: bool,
    /// High bits of the index, valid only when NLBAF > 16.
    #[bits(2)]
    pub high_index: u8,
    #[bits(1)]
    pub rsvd: u8,
}

#[bitfield(u8)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct DataProtectionCapabilities {
    pub type1: bool,
    pub type2: bool,
    pub type3: bool,
    pub first_eight: bool,
    pub last_eight: bool,
    #[bits(3)]
    pub rsvd: u8,
}

#[bitfield(u8)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct DataProtectionTypeSettings {
    /// 0 = disabled, 1-3 = enabled protection type.
    #[bits(3)]
    pub enabled_type: u8,
    pub pi_first_eight: bool,
    #[bits(4)]
    pub rsvd: u8,
}

open_enum! {
    pub enum NamespaceIdentifierType: u8 {
        RESERVED = 0x00,
        IEEE = 0x01,
        NSGUID = 0x02,
        NSUUID = 0x03,
        CSI = 0x04,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::FromZeros;

    #[test]
    fn formatted_lba_index_selection() {
        let mut id = IdentifyNamespace::new_zeroed();
        id.nlbaf = 3;
        id.flbas = Flbas::new().with_low_index(2);
        assert_eq!(id.formatted_lba_index(), 2);

        id.nlbaf = 20;
        id.flbas = Flbas::new().with_low_index(2).with_high_index(1);
        assert_eq!(id.formatted_lba_index(), 18);
    }
}
