// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-vendor and per-bridge decoding deviations.
//!
//! Decoders never branch on model or firmware strings inline; every
//! known deviation lives in this table and is consulted through
//! [`lookup`], keyed on the identity decoded so far.

use crate::info::Identity;

/// Deviations a decoder must honor for a matched device or bridge.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub(crate) struct Quirks {
    /// The bridge pads or mangles the serial number; strip it down to
    /// alphanumerics.
    pub sn_cleanup: bool,
    /// The host-writes SMART attribute counts GiB, not sectors.
    pub endurance_gib: bool,
    /// The host-writes SMART attribute counts 32 MiB units, not
    /// sectors.
    pub endurance_32mib: bool,
    /// Firmware reports wear as a nominal value; percent used is
    /// `100 - nominal * 100 / 255`.
    pub legacy_0004_percent: bool,
    /// The bridge hangs on VPD requests; synthesize the serial from the
    /// vendor-specific standard inquiry bytes instead.
    pub usb_vpd_dummy: bool,
    /// The bridge returns garbage for the ATA information VPD page;
    /// skip it.
    pub usb_no_sat_info: bool,
    /// The device aborts Report Supported Operation Codes; skip the
    /// whole probe phase.
    pub no_report_supported_ops: bool,
}

impl Quirks {
    pub const NONE: Quirks = Quirks {
        sn_cleanup: false,
        endurance_gib: false,
        endurance_32mib: false,
        legacy_0004_percent: false,
        usb_vpd_dummy: false,
        usb_no_sat_info: false,
        no_report_supported_ops: false,
    };

    fn union(self, other: Quirks) -> Quirks {
        Quirks {
            sn_cleanup: self.sn_cleanup || other.sn_cleanup,
            endurance_gib: self.endurance_gib || other.endurance_gib,
            endurance_32mib: self.endurance_32mib || other.endurance_32mib,
            legacy_0004_percent: self.legacy_0004_percent || other.legacy_0004_percent,
            usb_vpd_dummy: self.usb_vpd_dummy || other.usb_vpd_dummy,
            usb_no_sat_info: self.usb_no_sat_info || other.usb_no_sat_info,
            no_report_supported_ops: self.no_report_supported_ops
                || other.no_report_supported_ops,
        }
    }
}

/// One registry row. Empty keys match anything; matching is a
/// case-insensitive prefix test.
struct QuirkEntry {
    vendor: &'static str,
    product_prefix: &'static str,
    firmware_prefix: &'static str,
    quirks: Quirks,
}

const REGISTRY: &[QuirkEntry] = &[
    // Seagate and LaCie USB bridges report the bridge serial with
    // padding bytes appended to the drive serial.
    QuirkEntry {
        vendor: "Seagate",
        product_prefix: "BUP",
        firmware_prefix: "",
        quirks: Quirks {
            sn_cleanup: true,
            usb_no_sat_info: true,
            ..Quirks::NONE
        },
    },
    QuirkEntry {
        vendor: "Seagate",
        product_prefix: "Expansion",
        firmware_prefix: "",
        quirks: Quirks {
            sn_cleanup: true,
            ..Quirks::NONE
        },
    },
    QuirkEntry {
        vendor: "LaCie",
        product_prefix: "",
        firmware_prefix: "",
        quirks: Quirks {
            sn_cleanup: true,
            usb_vpd_dummy: true,
            ..Quirks::NONE
        },
    },
    // Early Seagate SSD firmware reports wear as a 0-255 nominal
    // value rather than a percentage.
    QuirkEntry {
        vendor: "Seagate",
        product_prefix: "ST",
        firmware_prefix: "0004",
        quirks: Quirks {
            legacy_0004_percent: true,
            ..Quirks::NONE
        },
    },
    // Host-writes attribute unit deviations.
    QuirkEntry {
        vendor: "SanDisk",
        product_prefix: "",
        firmware_prefix: "",
        quirks: Quirks {
            endurance_gib: true,
            ..Quirks::NONE
        },
    },
    QuirkEntry {
        vendor: "Kingston",
        product_prefix: "",
        firmware_prefix: "",
        quirks: Quirks {
            endurance_32mib: true,
            ..Quirks::NONE
        },
    },
    // ASMedia 2105 bridges wedge on SAT info and abort the operation
    // code probe.
    QuirkEntry {
        vendor: "ASMT",
        product_prefix: "2105",
        firmware_prefix: "",
        quirks: Quirks {
            usb_no_sat_info: true,
            no_report_supported_ops: true,
            ..Quirks::NONE
        },
    },
    QuirkEntry {
        vendor: "JMicron",
        product_prefix: "",
        firmware_prefix: "",
        quirks: Quirks {
            usb_vpd_dummy: true,
            ..Quirks::NONE
        },
    },
];

fn prefix_matches(key: &str, value: &str) -> bool {
    key.is_empty()
        || value
            .get(..key.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(key))
}

/// Returns the union of every registry row matching the identity.
pub(crate) fn lookup(identity: &Identity) -> Quirks {
    REGISTRY
        .iter()
        .filter(|entry| {
            prefix_matches(entry.vendor, &identity.vendor)
                && prefix_matches(entry.product_prefix, &identity.model)
                && prefix_matches(entry.firmware_prefix, &identity.firmware)
        })
        .fold(Quirks::NONE, |acc, entry| acc.union(entry.quirks))
}

/// Strips bridge padding from a serial: alphanumerics and dashes
/// survive, everything else goes.
pub(crate) fn clean_serial(serial: &str) -> String {
    serial
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(vendor: &str, model: &str, firmware: &str) -> Identity {
        Identity {
            vendor: vendor.to_string(),
            model: model.to_string(),
            firmware: firmware.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn prefix_and_case_insensitive_match() {
        let quirks = lookup(&identity("SEAGATE", "BUP Slim BK", "E001"));
        assert!(quirks.sn_cleanup);
        assert!(quirks.usb_no_sat_info);
        assert!(!quirks.legacy_0004_percent);
    }

    #[test]
    fn firmware_prefix_gates_legacy_percent() {
        let quirks = lookup(&identity("Seagate", "ST480FN0021", "0004"));
        assert!(quirks.legacy_0004_percent);
        let quirks = lookup(&identity("Seagate", "ST480FN0021", "0006"));
        assert!(!quirks.legacy_0004_percent);
    }

    #[test]
    fn unmatched_identity_has_no_quirks() {
        assert_eq!(lookup(&identity("FABRIKAM", "DISK", "1.0")), Quirks::NONE);
    }

    #[test]
    fn serial_cleanup_strips_padding() {
        assert_eq!(clean_serial("  NA7Z\u{7f}1234\0\0"), "NA7Z1234");
        assert_eq!(clean_serial("WD-WCC4N1234567"), "WD-WCC4N1234567");
    }
}
