mod common;

use clap::Parser;
use common::{runs, write_nifti_u8, write_nrrd_u8};
use label_volume::{
    ReporterError, VolumeReport,
    cli::{Args, CliError, run},
};
use std::path::Path;

fn args(labels: &Path, output: &Path, extra: &[&str]) -> Args {
    let mut argv = vec![
        "label-volume".to_string(),
        labels.display().to_string(),
        output.display().to_string(),
    ];
    argv.extend(extra.iter().map(|s| s.to_string()));
    Args::try_parse_from(argv).unwrap()
}

#[test]
fn writes_label_volumes() {
    let dir = tempfile::tempdir().unwrap();
    let labels = dir.path().join("labels.nrrd");
    let output = dir.path().join("volumes.json");
    write_nrrd_u8(&labels, [10, 10, 10], [1.0, 1.0, 1.0], &runs(1000, &[(1, 100), (2, 50)]));

    run(&args(&labels, &output, &[])).unwrap();

    let json = std::fs::read_to_string(&output).unwrap();
    assert_eq!(
        json,
        "{\n    \"1\": {\n        \"volume\": 100.0\n    },\n    \"2\": {\n        \"volume\": 50.0\n    }\n}\n"
    );
}

#[test]
fn writes_normalized_volumes_with_brain_mask() {
    let dir = tempfile::tempdir().unwrap();
    let labels = dir.path().join("labels.nrrd");
    let mask = dir.path().join("mask.nrrd");
    let output = dir.path().join("volumes.json");
    write_nrrd_u8(&labels, [10, 10, 10], [1.0, 1.0, 1.0], &runs(1000, &[(1, 100), (2, 50)]));
    write_nrrd_u8(&mask, [10, 10, 10], [1.0, 1.0, 1.0], &runs(1000, &[(1, 500)]));

    let brain_mask = mask.display().to_string();
    let report = run(&args(&labels, &output, &["--brain_mask", &brain_mask])).unwrap();

    let written = VolumeReport::from_json(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written, report);
    assert_eq!(written.get(1).unwrap().volume_normalized, Some(0.2));
    assert_eq!(written.get(2).unwrap().volume_normalized, Some(0.1));
}

#[test]
fn background_only_writes_empty_object() {
    let dir = tempfile::tempdir().unwrap();
    let labels = dir.path().join("labels.nrrd");
    let output = dir.path().join("volumes.json");
    write_nrrd_u8(&labels, [10, 10, 10], [1.0, 1.0, 1.0], &[0; 1000]);

    run(&args(&labels, &output, &[])).unwrap();
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "{}\n");
}

#[test]
fn missing_input_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let labels = dir.path().join("labels.nrrd");
    let output = dir.path().join("volumes.json");

    let err = run(&args(&labels, &output, &[])).unwrap_err();
    assert!(matches!(err, CliError::InputNotFound(path) if path == labels));
    assert!(!output.exists());
}

#[test]
fn missing_brain_mask_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let labels = dir.path().join("labels.nrrd");
    let output = dir.path().join("volumes.json");
    write_nrrd_u8(&labels, [2, 2, 2], [1.0, 1.0, 1.0], &[1; 8]);

    let err = run(&args(&labels, &output, &["--brain_mask", "no-such-mask.nii.gz"])).unwrap_err();
    assert!(matches!(err, CliError::InputNotFound(_)));
}

#[test]
fn existing_output_requires_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let labels = dir.path().join("labels.nrrd");
    let output = dir.path().join("volumes.json");
    write_nrrd_u8(&labels, [2, 2, 2], [1.0, 1.0, 1.0], &[3; 8]);
    std::fs::write(&output, "stale").unwrap();

    let err = run(&args(&labels, &output, &[])).unwrap_err();
    assert!(matches!(err, CliError::OutputExists(_)));
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "stale");

    run(&args(&labels, &output, &["-f"])).unwrap();
    let report = VolumeReport::from_json(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(report.get(3).unwrap().volume, 8.0);
}

#[test]
fn mismatched_spacing_fails_unless_warn_only() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let labels = dir.path().join("labels.nrrd");
    let mask = dir.path().join("mask.nrrd");
    let output = dir.path().join("volumes.json");
    write_nrrd_u8(&labels, [10, 10, 10], [1.0, 1.0, 1.0], &runs(1000, &[(1, 100)]));
    write_nrrd_u8(&mask, [10, 10, 10], [2.0, 2.0, 2.0], &runs(1000, &[(1, 500)]));
    let brain_mask = mask.display().to_string();

    let err = run(&args(&labels, &output, &["--brain_mask", &brain_mask])).unwrap_err();
    assert!(matches!(
        err,
        CliError::Reporter(ReporterError::GeometryMismatch(_))
    ));
    assert!(!output.exists());

    let report = run(&args(
        &labels,
        &output,
        &["--brain_mask", &brain_mask, "--warn_only"],
    ))
    .unwrap();
    assert_eq!(report.get(1).unwrap().volume_normalized, Some(0.2));
}

#[test]
fn mixed_formats_in_different_spaces_are_detected() {
    let dir = tempfile::tempdir().unwrap();
    let labels = dir.path().join("labels.nii");
    let mask = dir.path().join("mask.nrrd");
    let output = dir.path().join("volumes.json");
    write_nifti_u8(&labels, [4, 4, 4], [1.0, 1.0, 1.0], [0.0; 3], &runs(64, &[(5, 10)]));
    write_nrrd_u8(&mask, [4, 4, 4], [1.0, 1.0, 1.0], &[1; 64]);
    let brain_mask = mask.display().to_string();

    let err = run(&args(&labels, &output, &["--brain_mask", &brain_mask])).unwrap_err();
    assert!(matches!(
        err,
        CliError::Reporter(ReporterError::GeometryMismatch(_))
    ));
}

#[test]
fn empty_brain_mask_is_degenerate() {
    let dir = tempfile::tempdir().unwrap();
    let labels = dir.path().join("labels.nrrd");
    let mask = dir.path().join("mask.nrrd");
    let output = dir.path().join("volumes.json");
    write_nrrd_u8(&labels, [10, 10, 10], [1.0, 1.0, 1.0], &runs(1000, &[(1, 100)]));
    write_nrrd_u8(&mask, [10, 10, 10], [1.0, 1.0, 1.0], &[0; 1000]);
    let brain_mask = mask.display().to_string();

    let err = run(&args(&labels, &output, &["--brain_mask", &brain_mask])).unwrap_err();
    assert!(matches!(err, CliError::Reporter(ReporterError::DegenerateMask)));
    assert!(!output.exists());
}

#[test]
fn unsupported_extension_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let labels = dir.path().join("labels.mgz");
    let output = dir.path().join("volumes.json");
    std::fs::write(&labels, [0u8; 16]).unwrap();

    let err = run(&args(&labels, &output, &[])).unwrap_err();
    assert!(matches!(err, CliError::Load(_)));
}

#[test]
fn repeated_runs_write_identical_reports() {
    let dir = tempfile::tempdir().unwrap();
    let labels = dir.path().join("labels.nrrd");
    let first = dir.path().join("first.json");
    let second = dir.path().join("second.json");
    let values: Vec<u8> = (0..1000).map(|n| (n % 7) as u8).collect();
    write_nrrd_u8(&labels, [10, 10, 10], [0.5, 0.5, 1.0], &values);

    run(&args(&labels, &first, &[])).unwrap();
    run(&args(&labels, &second, &[])).unwrap();
    assert_eq!(
        std::fs::read_to_string(first).unwrap(),
        std::fs::read_to_string(second).unwrap()
    );
}
