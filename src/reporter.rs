use crate::{
    enums::GeometryPolicy,
    geometry::{Mismatch, Tolerance, check_same_space},
    report::{LabelStats, VolumeReport},
    volume::Volume,
};

use log::{debug, warn};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("Label and brain mask images are in a different space: {0}")]
    GeometryMismatch(Mismatch),

    #[error("Brain mask has no non-zero voxels, cannot normalize volumes")]
    DegenerateMask,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ReporterConfig {
    pub policy: GeometryPolicy,
    pub tolerance: Tolerance,
}

/// Turns a label map (and optionally a brain mask) into per-label volumes.
#[derive(Clone, Copy, Debug, Default)]
pub struct VolumeReporter {
    config: ReporterConfig,
}

impl VolumeReporter {
    pub fn new(config: ReporterConfig) -> Self {
        Self { config }
    }

    pub fn with_policy(policy: GeometryPolicy) -> Self {
        Self::new(ReporterConfig {
            policy,
            ..Default::default()
        })
    }

    /// Compute the volume of every non-zero label in `labels`
    ///
    /// Volumes are voxel counts times the voxel volume of `labels`. When a
    /// `brain_mask` is given, each volume is also divided by the number of
    /// non-zero mask voxels.
    ///
    /// # Errors
    ///
    /// Returns [`ReporterError::GeometryMismatch`] if the mask is not in the
    /// label space (unless the policy is [`GeometryPolicy::Warn`]), and
    /// [`ReporterError::DegenerateMask`] if normalization would divide by zero
    pub fn compute(
        &self,
        labels: &Volume,
        brain_mask: Option<&Volume>,
    ) -> Result<VolumeReport, ReporterError> {
        if let Some(mask) = brain_mask {
            self.check_geometry(labels, mask)?;
        }

        let counts = labels.label_counts();
        let voxel_volume = labels.voxel_volume();
        debug!("Found {} labels, voxel volume {voxel_volume}", counts.len());

        let in_mask = match brain_mask {
            Some(mask) if !counts.is_empty() => {
                let in_mask = mask.count_nonzero();
                if in_mask == 0 {
                    return Err(ReporterError::DegenerateMask);
                }
                debug!("Brain mask holds {in_mask} voxels");
                Some(in_mask as f64)
            }
            _ => None,
        };

        Ok(counts
            .into_iter()
            .map(|(label, count)| {
                let volume = count as f64 * voxel_volume;
                let stats = LabelStats {
                    volume,
                    volume_normalized: in_mask.map(|total| volume / total),
                };
                (label, stats)
            })
            .collect())
    }

    fn check_geometry(&self, labels: &Volume, mask: &Volume) -> Result<(), ReporterError> {
        match check_same_space(labels, mask, &self.config.tolerance) {
            Ok(()) => Ok(()),
            Err(mismatch) => match self.config.policy {
                GeometryPolicy::Strict => Err(ReporterError::GeometryMismatch(mismatch)),
                GeometryPolicy::Warn => {
                    warn!("Label and brain mask images are in a different space: {mismatch}");
                    Ok(())
                }
            },
        }
    }
}
