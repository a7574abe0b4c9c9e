use crate::{
    enums::GeometryPolicy,
    report::{ReportError, VolumeReport},
    reporter::{ReporterConfig, ReporterError, VolumeReporter},
    volume_loader::{VolumeLoader, VolumeLoaderError},
};

use clap::{Parser, ValueEnum};
use log::{LevelFilter, info};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("The input file {0} does not exist")]
    InputNotFound(PathBuf),

    #[error("The output file {0} exists. Use -f to force overwriting")]
    OutputExists(PathBuf),

    #[error("The output path {0} is a directory")]
    OutputIsDirectory(PathBuf),

    #[error("The output directory {0} does not exist")]
    OutputDirectoryMissing(PathBuf),

    #[error(transparent)]
    Load(#[from] VolumeLoaderError),

    #[error(transparent)]
    Reporter(#[from] ReporterError),

    #[error("Could not write report: {0}")]
    Report(#[from] ReportError),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    #[value(name = "DEBUG")]
    Debug,
    #[value(name = "INFO")]
    Info,
    #[default]
    #[value(name = "WARNING")]
    Warning,
    #[value(name = "ERROR")]
    Error,
}

impl LogLevel {
    pub fn filter(&self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
        }
    }
}

/// Compute the volume of every label of a label image and save them to JSON.
///
/// If a brain mask is given, volumes are also normalized by the number of
/// voxels inside the mask. The label image and the mask must share voxel
/// spacing and affine.
#[derive(Parser, Debug)]
#[command(name = "label-volume", version)]
pub struct Args {
    /// Path to the .nii.gz/.nrrd label image.
    pub input_labels: PathBuf,

    /// Path to the json file containing volumes.
    pub output_json: PathBuf,

    /// Path to the .nii.gz/.nrrd brain mask.
    #[arg(long = "brain_mask")]
    pub brain_mask: Option<PathBuf>,

    /// Force overwriting of the output file.
    #[arg(short = 'f')]
    pub overwrite: bool,

    /// Only warn, instead of failing, when the label image and the brain
    /// mask are in different spaces.
    #[arg(long = "warn_only")]
    pub warn_only: bool,

    /// Log level. `-v` alone means INFO. RUST_LOG takes precedence.
    #[arg(
        short = 'v',
        value_enum,
        ignore_case = true,
        num_args = 0..=1,
        default_value = "WARNING",
        default_missing_value = "INFO"
    )]
    pub verbose: LogLevel,
}

impl Args {
    pub fn reporter_config(&self) -> ReporterConfig {
        ReporterConfig {
            policy: if self.warn_only {
                GeometryPolicy::Warn
            } else {
                GeometryPolicy::Strict
            },
            ..Default::default()
        }
    }
}

/// Check every input path is an existing file
pub fn assert_inputs_exist<'a>(
    inputs: impl IntoIterator<Item = &'a Path>,
) -> Result<(), CliError> {
    for input in inputs {
        if !input.is_file() {
            return Err(CliError::InputNotFound(input.to_path_buf()));
        }
    }
    Ok(())
}

/// Check `output` can be written: not a directory, its parent exists, and
/// it is absent unless `overwrite` is set
pub fn assert_outputs_exist(output: &Path, overwrite: bool) -> Result<(), CliError> {
    if output.is_dir() {
        return Err(CliError::OutputIsDirectory(output.to_path_buf()));
    }
    if output.exists() && !overwrite {
        return Err(CliError::OutputExists(output.to_path_buf()));
    }
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            return Err(CliError::OutputDirectoryMissing(parent.to_path_buf()));
        }
    }
    Ok(())
}

/// Run the whole pipeline: check paths, load images, compute and write the
/// report. The report is returned for callers that want to inspect it.
pub fn run(args: &Args) -> Result<VolumeReport, CliError> {
    let inputs = std::iter::once(args.input_labels.as_path()).chain(args.brain_mask.as_deref());
    assert_inputs_exist(inputs)?;
    assert_outputs_exist(&args.output_json, args.overwrite)?;

    info!("Loading label image {}", args.input_labels.display());
    let labels = VolumeLoader::load(&args.input_labels)?;
    let brain_mask = match &args.brain_mask {
        Some(path) => {
            info!("Loading brain mask {}", path.display());
            Some(VolumeLoader::load(path)?)
        }
        None => None,
    };

    let report =
        VolumeReporter::new(args.reporter_config()).compute(&labels, brain_mask.as_ref())?;

    report.write(&args.output_json)?;
    info!(
        "Wrote volumes of {} labels to {}",
        report.len(),
        args.output_json.display()
    );
    Ok(report)
}
