use crate::{
    enums::ImageFormat,
    nrrd::{NrrdError, read_nrrd},
    volume::{Affine, IDENTITY, Volume},
};

use log::debug;
use ndarray::{Array3, ShapeBuilder};
use nifti::{NiftiHeader, NiftiObject, ReaderOptions, volume::ndarray::IntoNdArray};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Expected a 3D image, got shape {0:?}")]
    UnsupportedDimensionality(Vec<usize>),

    #[error("Invalid volume shape: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("NIfTI error: {0}")]
    Nifti(#[from] nifti::NiftiError),

    #[error("NRRD error: {0}")]
    Nrrd(#[from] NrrdError),
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a label map or mask, picking the reader from the file extension
    ///
    /// # Errors
    ///
    /// Returns error if the format is unknown, the file cannot be decoded or
    /// the image is not three dimensional
    pub fn load(path: impl AsRef<Path>) -> Result<Volume, VolumeLoaderError> {
        let path = path.as_ref();
        let volume = match ImageFormat::from_path(path) {
            Some(ImageFormat::Nifti) => Self::load_nifti(path)?,
            Some(ImageFormat::Nrrd) => Self::load_nrrd(path)?,
            None => return Err(VolumeLoaderError::UnsupportedFormat(path.to_path_buf())),
        };
        debug!(
            "Loaded {} with shape {:?} and spacing {:?}",
            path.display(),
            volume.dim(),
            volume.spacing
        );
        Ok(volume)
    }

    /// Load a `.nii`, `.nii.gz` or Analyze-style `.hdr` image
    pub fn load_nifti(path: impl AsRef<Path>) -> Result<Volume, VolumeLoaderError> {
        let object = ReaderOptions::new().read_file(path.as_ref())?;
        let header = object.header().clone();

        let array = object.into_volume().into_ndarray::<f64>()?;
        let shape = array.shape().to_vec();
        let values: Vec<f64> = array.iter().copied().collect();

        // Values come out in logical (row-major) index order
        let (i, j, k) = Self::spatial_shape(&shape)?;
        let data = Array3::from_shape_vec((i, j, k), values)?;

        let spacing = Self::nifti_spacing(&header);
        let affine = Self::nifti_affine(&header, (i, j, k));
        Ok(Volume::new(data, spacing, affine))
    }

    /// Load a `.nrrd` image or a `.nhdr` header with detached data
    pub fn load_nrrd(path: impl AsRef<Path>) -> Result<Volume, VolumeLoaderError> {
        let (header, values) = read_nrrd(path)?;

        let axes = header.spatial_axes();
        let extra_axes_are_singleton = (0..header.sizes.len())
            .filter(|axis| !axes.contains(axis))
            .all(|axis| header.sizes[axis] == 1);
        if axes.len() != 3 || !extra_axes_are_singleton {
            return Err(VolumeLoaderError::UnsupportedDimensionality(header.sizes));
        }

        // NRRD stores the first axis fastest
        let shape = (
            header.sizes[axes[0]],
            header.sizes[axes[1]],
            header.sizes[axes[2]],
        );
        let data = Array3::from_shape_vec(shape.f(), values)?;

        let spacing = header.spacing();
        let spacing = [spacing[0], spacing[1], spacing[2]];
        Ok(Volume::new(data, spacing, header.affine()))
    }

    /// Collapse a NIfTI shape to three axes. Missing axes are singleton,
    /// extra axes must be.
    fn spatial_shape(shape: &[usize]) -> Result<(usize, usize, usize), VolumeLoaderError> {
        if shape.iter().skip(3).any(|&n| n != 1) {
            return Err(VolumeLoaderError::UnsupportedDimensionality(shape.to_vec()));
        }
        let axis = |n: usize| shape.get(n).copied().unwrap_or(1);
        Ok((axis(0), axis(1), axis(2)))
    }

    fn nifti_spacing(header: &NiftiHeader) -> [f64; 3] {
        let mut spacing = [1.0; 3];
        for (axis, zoom) in spacing.iter_mut().enumerate() {
            let pixdim = header.pixdim[axis + 1] as f64;
            if pixdim > 0.0 {
                *zoom = pixdim;
            }
        }
        spacing
    }

    /// The "best" affine: sform, then qform, then a centred base affine.
    fn nifti_affine(header: &NiftiHeader, shape: (usize, usize, usize)) -> Affine {
        if header.sform_code > 0 {
            let mut affine = IDENTITY;
            for (row, srow) in [header.srow_x, header.srow_y, header.srow_z]
                .iter()
                .enumerate()
            {
                for (col, &value) in srow.iter().enumerate() {
                    affine[row][col] = value as f64;
                }
            }
            return affine;
        }

        let zooms = Self::nifti_spacing(header);
        if header.qform_code > 0 {
            return Self::qform_affine(header, zooms);
        }

        let origin = [
            (shape.0 as f64 - 1.0) / 2.0,
            (shape.1 as f64 - 1.0) / 2.0,
            (shape.2 as f64 - 1.0) / 2.0,
        ];
        let mut affine = IDENTITY;
        affine[0][0] = -zooms[0];
        affine[1][1] = zooms[1];
        affine[2][2] = zooms[2];
        affine[0][3] = origin[0] * zooms[0];
        affine[1][3] = -origin[1] * zooms[1];
        affine[2][3] = -origin[2] * zooms[2];
        affine
    }

    fn qform_affine(header: &NiftiHeader, zooms: [f64; 3]) -> Affine {
        let b = header.quatern_b as f64;
        let c = header.quatern_c as f64;
        let d = header.quatern_d as f64;
        let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();

        let rotation = [
            [
                a * a + b * b - c * c - d * d,
                2.0 * (b * c - a * d),
                2.0 * (b * d + a * c),
            ],
            [
                2.0 * (b * c + a * d),
                a * a + c * c - b * b - d * d,
                2.0 * (c * d - a * b),
            ],
            [
                2.0 * (b * d - a * c),
                2.0 * (c * d + a * b),
                a * a + d * d - c * c - b * b,
            ],
        ];
        let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
        let scale = [zooms[0], zooms[1], zooms[2] * qfac];
        let offset = [
            header.quatern_x as f64,
            header.quatern_y as f64,
            header.quatern_z as f64,
        ];

        let mut affine = IDENTITY;
        for row in 0..3 {
            for col in 0..3 {
                affine[row][col] = rotation[row][col] * scale[col];
            }
            affine[row][3] = offset[row];
        }
        affine
    }
}
