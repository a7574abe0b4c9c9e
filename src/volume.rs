use crate::report::LabelId;

use ndarray::Array3;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};

pub type Affine = [[f64; 4]; 4];

pub const IDENTITY: Affine = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// A 3D image together with the geometry needed to put it in physical space.
#[derive(Clone, Debug)]
pub struct Volume {
    pub data: Array3<f64>,
    pub spacing: [f64; 3],
    pub affine: Affine,
}

impl Volume {
    pub fn new(data: Array3<f64>, spacing: [f64; 3], affine: Affine) -> Self {
        Self {
            data,
            spacing,
            affine,
        }
    }

    /// A volume whose affine is the diagonal spacing matrix.
    pub fn with_spacing(data: Array3<f64>, spacing: [f64; 3]) -> Self {
        let mut affine = IDENTITY;
        for (axis, &step) in spacing.iter().enumerate() {
            affine[axis][axis] = step;
        }
        Self::new(data, spacing, affine)
    }

    /// Get the dimensions of the volume in voxel order (i, j, k)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Physical volume of a single voxel, in the units of the spacing cubed.
    pub fn voxel_volume(&self) -> f64 {
        self.spacing.iter().product()
    }

    /// Number of voxels holding a non-zero value. NaN counts as zero.
    pub fn count_nonzero(&self) -> u64 {
        self.data
            .par_iter()
            .filter(|&&value| is_foreground(value))
            .count() as u64
    }

    /// Voxel count of every distinct non-zero value, in ascending order.
    pub fn label_counts(&self) -> BTreeMap<LabelId, u64> {
        self.data
            .par_iter()
            .filter(|&&value| is_foreground(value))
            .fold(HashMap::new, |mut counts: HashMap<LabelId, u64>, &value| {
                *counts.entry(LabelId::new(value)).or_default() += 1;
                counts
            })
            .reduce(HashMap::new, |mut left, right| {
                for (label, count) in right {
                    *left.entry(label).or_default() += count;
                }
                left
            })
            .into_iter()
            .collect()
    }
}

#[inline]
fn is_foreground(value: f64) -> bool {
    value != 0.0 && !value.is_nan()
}
