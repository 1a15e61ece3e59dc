// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Firmware download planning.
//!
//! [`plan_firmware_download`] turns the normalized firmware
//! capabilities of a device into a concrete transfer plan: which
//! download mode to use, the segment size honoring the device's bounds
//! and offset alignment, and (for NVMe) which commit action activates
//! the image. The planner never touches the device; it only reasons
//! about the capability record discovery produced.

use drive_discovery::info::FirmwareCapabilities;
use nvme_spec::FirmwareCommitAction;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    /// No download mode at all is supported.
    #[error("the device does not support firmware download")]
    NotSupported,
    /// The caller forced a mode the device does not implement.
    #[error("the device does not support {0:?} firmware downloads")]
    ModeUnavailable(DownloadMode),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DownloadMode {
    /// One transfer of the whole image.
    Full,
    /// Segmented transfer, activated as part of the final segment.
    Segmented,
    /// Segmented transfer into a staging area, activated later.
    Deferred,
    /// SAS: deferred transfer with an explicit activate command.
    DeferredWithActivate,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum ModeSelection {
    /// Pick the best mode the device supports.
    #[default]
    Automatic,
    Force(DownloadMode),
}

/// How an NVMe image goes live once transferred.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ActivationKind {
    /// Commit and activate the image already downloaded to a slot.
    ActivateInSlot,
    /// Download into the slot and activate in one commit.
    DownloadAndActivate,
    /// Download into the slot without activating.
    ReplaceOnly,
}

#[derive(Debug, Clone, Default)]
pub struct DownloadRequest {
    pub mode: ModeSelection,
    /// Requested segment size in 512-byte blocks; the device's bounds
    /// and alignment still apply.
    pub segment_blocks: Option<u32>,
    /// NVMe: how to activate, when the caller cares.
    pub activation: Option<ActivationKind>,
    /// NVMe: target firmware slot.
    pub slot: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct DownloadPlan {
    pub mode: DownloadMode,
    /// Transfer granularity in 512-byte blocks. Meaningless for full
    /// downloads.
    pub segment_blocks: u32,
    pub min_segment_blocks: Option<u32>,
    pub max_segment_blocks: Option<u32>,
    pub recommended_segment_blocks: Option<u32>,
    /// Offset alignment every segment start must honor, in bytes.
    pub offset_boundary_bytes: u32,
    /// NVMe commit action; `None` for ATA and SCSI devices, whose
    /// activation is part of the download mode itself.
    pub activation: Option<FirmwareCommitAction>,
    pub warnings: Vec<String>,
}

/// Default transfer granularity when neither the caller nor the device
/// expresses a preference.
const DEFAULT_SEGMENT_BLOCKS: u32 = 64;

const BLOCK_BYTES: u32 = 512;

pub fn plan_firmware_download(
    caps: &FirmwareCapabilities,
    request: &DownloadRequest,
) -> Result<DownloadPlan, PlanError> {
    let mut warnings = Vec::new();
    let mode = select_mode(caps, request.mode, &mut warnings)?;
    let (segment_blocks, offset_boundary_bytes) =
        segment_size(caps, request.segment_blocks, &mut warnings);
    let activation = nvme_activation(caps, request, &mut warnings);

    tracing::debug!(?mode, segment_blocks, "planned firmware download");
    Ok(DownloadPlan {
        mode,
        segment_blocks,
        min_segment_blocks: caps.min_segment_blocks,
        max_segment_blocks: caps.max_segment_blocks,
        recommended_segment_blocks: caps.recommended_segment_blocks,
        offset_boundary_bytes,
        activation,
        warnings,
    })
}

fn select_mode(
    caps: &FirmwareCapabilities,
    selection: ModeSelection,
    warnings: &mut Vec<String>,
) -> Result<DownloadMode, PlanError> {
    if let ModeSelection::Force(mode) = selection {
        let supported = match mode {
            DownloadMode::Full => caps.full,
            DownloadMode::Segmented => caps.segmented,
            DownloadMode::Deferred => caps.deferred,
            DownloadMode::DeferredWithActivate => caps.deferred_with_activate,
        };
        if !supported {
            return Err(PlanError::ModeUnavailable(mode));
        }
        if caps.power_cycle_required
            && matches!(mode, DownloadMode::Deferred | DownloadMode::DeferredWithActivate)
        {
            warnings.push("activation requires a power cycle".to_string());
        }
        return Ok(mode);
    }

    // Deferred modes stage the image without disturbing the running
    // firmware, so they win unless activation would strand the device
    // waiting for a power cycle.
    if caps.deferred_with_activate && !caps.power_cycle_required {
        Ok(DownloadMode::DeferredWithActivate)
    } else if caps.deferred && !caps.power_cycle_required {
        Ok(DownloadMode::Deferred)
    } else if caps.segmented {
        Ok(DownloadMode::Segmented)
    } else if caps.full {
        Ok(DownloadMode::Full)
    } else {
        Err(PlanError::NotSupported)
    }
}

fn segment_size(
    caps: &FirmwareCapabilities,
    requested: Option<u32>,
    warnings: &mut Vec<String>,
) -> (u32, u32) {
    let mut segment = requested
        .or(caps.recommended_segment_blocks)
        .unwrap_or(DEFAULT_SEGMENT_BLOCKS)
        .max(1);

    if let Some(min) = caps.min_segment_blocks {
        if segment < min {
            warnings.push(format!("segment raised to the device minimum of {min} blocks"));
            segment = min;
        }
    }
    if let Some(max) = caps.max_segment_blocks {
        if segment > max {
            warnings.push(format!("segment lowered to the device maximum of {max} blocks"));
            segment = max;
        }
    }

    // Segment starts must land on the device's offset boundary, so the
    // segment itself is rounded up to a whole number of boundaries.
    let boundary_bytes = 1u32 << caps.offset_exponent.unwrap_or(9).max(9);
    let boundary_blocks = boundary_bytes / BLOCK_BYTES;
    if segment % boundary_blocks != 0 {
        segment = segment.next_multiple_of(boundary_blocks);
        warnings.push(format!(
            "segment rounded up to the {boundary_bytes}-byte offset boundary"
        ));
        if caps.max_segment_blocks.is_some_and(|max| segment > max) {
            warnings.push(
                "aligned segment exceeds the device maximum; transfers may be rejected"
                    .to_string(),
            );
        }
    }
    (segment, boundary_bytes)
}

/// NVMe images activate through FIRMWARE COMMIT; pick the action the
/// caller asked for, normalized against what the controller can do.
fn nvme_activation(
    caps: &FirmwareCapabilities,
    request: &DownloadRequest,
    warnings: &mut Vec<String>,
) -> Option<FirmwareCommitAction> {
    // Slot bookkeeping only exists for NVMe controllers.
    caps.slots?;

    if caps.slot1_read_only && request.slot == Some(1) {
        warnings.push("firmware slot 1 is read only".to_string());
    }
    let kind = request.activation.unwrap_or(ActivationKind::DownloadAndActivate);
    let action = match kind {
        ActivationKind::ActivateInSlot if caps.activate_without_reset => {
            FirmwareCommitAction::ACTIVATE_IMMEDIATE
        }
        ActivationKind::ActivateInSlot => FirmwareCommitAction::ACTIVATE,
        ActivationKind::DownloadAndActivate => FirmwareCommitAction::REPLACE_AND_ACTIVATE,
        ActivationKind::ReplaceOnly => {
            warnings.push("image will not be active until a later commit".to_string());
            FirmwareCommitAction::REPLACE
        }
    };
    Some(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(segmented: bool, deferred: bool) -> FirmwareCapabilities {
        FirmwareCapabilities {
            full: true,
            segmented,
            deferred,
            ..Default::default()
        }
    }

    #[test]
    fn automatic_prefers_deferred_then_segmented_then_full() {
        let plan = plan_firmware_download(&caps(true, false), &DownloadRequest::default()).unwrap();
        assert_eq!(plan.mode, DownloadMode::Segmented);

        let plan = plan_firmware_download(&caps(true, true), &DownloadRequest::default()).unwrap();
        assert_eq!(plan.mode, DownloadMode::Deferred);

        let plan = plan_firmware_download(&caps(false, false), &DownloadRequest::default()).unwrap();
        assert_eq!(plan.mode, DownloadMode::Full);
    }

    #[test]
    fn no_supported_mode_is_an_error() {
        let caps = FirmwareCapabilities::default();
        match plan_firmware_download(&caps, &DownloadRequest::default()) {
            Err(PlanError::NotSupported) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn deferred_with_activate_wins_on_sas() {
        let caps = FirmwareCapabilities {
            segmented: true,
            deferred: true,
            deferred_with_activate: true,
            ..Default::default()
        };
        let plan = plan_firmware_download(&caps, &DownloadRequest::default()).unwrap();
        assert_eq!(plan.mode, DownloadMode::DeferredWithActivate);
    }

    #[test]
    fn power_cycle_requirement_demotes_deferred() {
        let caps = FirmwareCapabilities {
            segmented: true,
            deferred: true,
            power_cycle_required: true,
            ..Default::default()
        };
        let plan = plan_firmware_download(&caps, &DownloadRequest::default()).unwrap();
        assert_eq!(plan.mode, DownloadMode::Segmented);
    }

    #[test]
    fn forced_mode_must_be_supported() {
        let request = DownloadRequest {
            mode: ModeSelection::Force(DownloadMode::Deferred),
            ..Default::default()
        };
        match plan_firmware_download(&caps(true, false), &request) {
            Err(PlanError::ModeUnavailable(DownloadMode::Deferred)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn segment_defaults_and_boundary_round_up() {
        let caps = FirmwareCapabilities {
            segmented: true,
            min_segment_blocks: Some(16),
            max_segment_blocks: Some(4096),
            offset_exponent: Some(14),
            ..Default::default()
        };
        // 16 KiB boundary is 32 blocks; the 64-block default already
        // fits.
        let plan = plan_firmware_download(&caps, &DownloadRequest::default()).unwrap();
        assert_eq!(plan.segment_blocks, 64);
        assert_eq!(plan.offset_boundary_bytes, 16384);
        assert!(plan.warnings.is_empty());

        // A 40-block request rounds up to the next boundary multiple.
        let request = DownloadRequest {
            segment_blocks: Some(40),
            ..Default::default()
        };
        let plan = plan_firmware_download(&caps, &request).unwrap();
        assert_eq!(plan.segment_blocks, 64);
        assert_eq!(plan.warnings.len(), 1);
    }

    #[test]
    fn segment_clamps_to_device_bounds() {
        let caps = FirmwareCapabilities {
            segmented: true,
            min_segment_blocks: Some(128),
            max_segment_blocks: Some(256),
            ..Default::default()
        };
        let low = DownloadRequest {
            segment_blocks: Some(8),
            ..Default::default()
        };
        let plan = plan_firmware_download(&caps, &low).unwrap();
        assert_eq!(plan.segment_blocks, 128);

        let high = DownloadRequest {
            segment_blocks: Some(1024),
            ..Default::default()
        };
        let plan = plan_firmware_download(&caps, &high).unwrap();
        assert_eq!(plan.segment_blocks, 256);
    }

    #[test]
    fn nvme_activation_normalizes_to_commit_actions() {
        let caps = FirmwareCapabilities {
            deferred: true,
            slots: Some(3),
            active_slot: Some(1),
            activate_without_reset: true,
            ..Default::default()
        };
        let plan = plan_firmware_download(&caps, &DownloadRequest::default()).unwrap();
        assert_eq!(plan.activation, Some(FirmwareCommitAction::REPLACE_AND_ACTIVATE));

        let request = DownloadRequest {
            activation: Some(ActivationKind::ActivateInSlot),
            ..Default::default()
        };
        let plan = plan_firmware_download(&caps, &request).unwrap();
        assert_eq!(plan.activation, Some(FirmwareCommitAction::ACTIVATE_IMMEDIATE));

        let request = DownloadRequest {
            activation: Some(ActivationKind::ReplaceOnly),
            ..Default::default()
        };
        let plan = plan_firmware_download(&caps, &request).unwrap();
        assert_eq!(plan.activation, Some(FirmwareCommitAction::REPLACE));
        assert_eq!(plan.warnings.len(), 1);
    }

    #[test]
    fn read_only_slot_draws_a_warning() {
        let caps = FirmwareCapabilities {
            deferred: true,
            slots: Some(2),
            slot1_read_only: true,
            ..Default::default()
        };
        let request = DownloadRequest {
            slot: Some(1),
            ..Default::default()
        };
        let plan = plan_firmware_download(&caps, &request).unwrap();
        assert!(plan.warnings.iter().any(|w| w.contains("read only")));
    }

    #[test]
    fn ata_plans_carry_no_commit_action() {
        let plan = plan_firmware_download(&caps(true, true), &DownloadRequest::default()).unwrap();
        assert_eq!(plan.activation, None);
    }
}
