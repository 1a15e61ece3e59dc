// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Final normalization pass over an assembled record.
//!
//! Most merge rules fall out of decode order: the native protocol's
//! decoder runs after the translated one and overwrites identity, while
//! health decoders fill only empty slots. What remains here is the
//! cleanup no single decoder owns.

use crate::info::DeviceInformation;
use crate::info::FORMAT_CORRUPT_FEATURE;
use crate::quirks;
use crate::quirks::Quirks;

pub(crate) fn finalize(info: &mut DeviceInformation, quirks: &Quirks) {
    if quirks.sn_cleanup {
        info.identity.serial = quirks::clean_serial(&info.identity.serial);
    }

    dedup_preserving_order(&mut info.specifications);

    // A corrupted format makes the reported sizes untrustworthy no
    // matter which decoder later filled them in.
    if info.format_corrupt {
        info.geometry.logical_sector_size = None;
        info.geometry.physical_sector_size = None;
        info.geometry.max_lba = None;
        info.features.add(FORMAT_CORRUPT_FEATURE);
    }
}

fn dedup_preserving_order(values: &mut Vec<String>) {
    let mut seen: Vec<String> = Vec::with_capacity(values.len());
    values.retain(|value| {
        if seen.iter().any(|s| s == value) {
            false
        } else {
            seen.push(value.clone());
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specifications_dedup_keeps_order() {
        let mut info = DeviceInformation::default();
        info.specifications = ["ACS-3", "SATA 3.2", "ACS-3", "SAS"]
            .map(String::from)
            .to_vec();
        finalize(&mut info, &Quirks::NONE);
        assert_eq!(info.specifications, vec!["ACS-3", "SATA 3.2", "SAS"]);
    }

    #[test]
    fn serial_cleanup_applies_only_under_quirk() {
        let mut info = DeviceInformation::default();
        info.identity.serial = "NA7Z1234\u{1}\u{1}".to_string();
        finalize(&mut info, &Quirks::NONE);
        assert_eq!(info.identity.serial, "NA7Z1234\u{1}\u{1}");

        let quirks = Quirks {
            sn_cleanup: true,
            ..Quirks::NONE
        };
        finalize(&mut info, &quirks);
        assert_eq!(info.identity.serial, "NA7Z1234");
    }

    #[test]
    fn format_corrupt_suppresses_late_sizes() {
        let mut info = DeviceInformation::default();
        info.format_corrupt = true;
        info.geometry.logical_sector_size = Some(512);
        info.geometry.max_lba = Some(1000);
        finalize(&mut info, &Quirks::NONE);
        assert_eq!(info.geometry.logical_sector_size, None);
        assert_eq!(info.geometry.max_lba, None);
        assert!(info.features.contains(FORMAT_CORRUPT_FEATURE));
    }
}
