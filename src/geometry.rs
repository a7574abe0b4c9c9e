use crate::volume::{Affine, Volume};

use std::fmt;

/// Element-wise closeness thresholds for comparing affines.
///
/// Two values `a` and `b` are close when `|a - b| <= atol + rtol * |b|`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tolerance {
    pub rtol: f64,
    pub atol: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            rtol: 1e-5,
            atol: 1e-8,
        }
    }
}

impl Tolerance {
    #[inline]
    pub fn is_close(&self, a: f64, b: f64) -> bool {
        if a == b {
            return true;
        }
        (a - b).abs() <= self.atol + self.rtol * b.abs()
    }

    pub fn allclose(&self, a: &Affine, b: &Affine) -> bool {
        a.iter()
            .flatten()
            .zip(b.iter().flatten())
            .all(|(&x, &y)| self.is_close(x, y))
    }
}

/// Which part of the geometry disagreed.
#[derive(Clone, Debug, PartialEq)]
pub enum Mismatch {
    Spacing { label: [f64; 3], mask: [f64; 3] },
    Affine { label: Affine, mask: Affine },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Spacing { label, mask } => {
                write!(f, "voxel spacing {label:?} differs from mask spacing {mask:?}")
            }
            Mismatch::Affine { label, mask } => {
                write!(f, "affine {label:?} differs from mask affine {mask:?}")
            }
        }
    }
}

/// Check that `mask` can be overlaid on `label`: identical spacing and
/// affines equal within `tolerance`.
pub fn check_same_space(
    label: &Volume,
    mask: &Volume,
    tolerance: &Tolerance,
) -> Result<(), Mismatch> {
    if label.spacing != mask.spacing {
        return Err(Mismatch::Spacing {
            label: label.spacing,
            mask: mask.spacing,
        });
    }
    if !tolerance.allclose(&label.affine, &mask.affine) {
        return Err(Mismatch::Affine {
            label: label.affine,
            mask: mask.affine,
        });
    }
    Ok(())
}
