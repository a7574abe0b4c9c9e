//! # Label-volume library
//!
//! This crate computes the physical volume of every label of a 3D label map,
//! optionally normalized by the size of a brain mask, and writes the result
//! as a JSON report.

//!
//! Label maps and masks are read from NIfTI-1 (`.nii`, `.nii.gz`) or NRRD
//! (`.nrrd`, `.nhdr`) files into a [`Volume`], which keeps the voxel data
//! together with its spacing and affine. Voxel counting runs in parallel
//! using rayon. The computation itself is done by [`VolumeReporter`]:
//!  - Label 0 is background and never reported
//!  - Every other distinct value gets `volume = voxel count × voxel volume`
//!  - With a brain mask, `volume_normalized = volume / non-zero mask voxels`
//!
//!  A brain mask must share the voxel spacing (exactly) and the affine
//!  (within [`Tolerance`]) of the label map. Library consumers can choose to
//!  only log a warning on mismatch with [`GeometryPolicy::Warn`].
//!
//! # Examples
//!
//! ## Computing normalized label volumes
//!
//! ```no_run
//! # use label_volume::{VolumeLoader, VolumeReporter};
//! let labels = VolumeLoader::load("labels.nrrd").expect("should have loaded the label map");
//! let mask = VolumeLoader::load("brain_mask.nii.gz").expect("should have loaded the mask");
//! let report = VolumeReporter::default()
//!     .compute(&labels, Some(&mask))
//!     .expect("label map and mask should be in the same space");
//! report.write("volumes.json").expect("should have written the report");
//! ```
//!
//! ## Building a volume in memory
//!
//! ```
//! # use label_volume::{Volume, VolumeReporter};
//! # use ndarray::Array3;
//! let mut data = Array3::<f64>::zeros((4, 4, 4));
//! data[[0, 0, 0]] = 1.0;
//! data[[1, 0, 0]] = 1.0;
//! let labels = Volume::with_spacing(data, [0.5, 0.5, 2.0]);
//!
//! let report = VolumeReporter::default().compute(&labels, None).unwrap();
//! assert_eq!(report.get(1).unwrap().volume, 1.0);
//! ```

pub mod cli;
pub mod enums;
pub mod geometry;
pub mod nrrd;
pub mod report;
pub mod reporter;
pub mod volume;
pub mod volume_loader;

pub use enums::{GeometryPolicy, ImageFormat};
pub use geometry::Tolerance;
pub use report::{LabelId, LabelStats, VolumeReport};
pub use reporter::{ReporterConfig, ReporterError, VolumeReporter};
pub use volume::Volume;
pub use volume_loader::{VolumeLoader, VolumeLoaderError};
