#![allow(dead_code)]

use std::path::Path;

/// Write an attached, raw, uint8 NRRD file in LPS space with a diagonal
/// spacing. `values` are in file order (first axis fastest).
pub fn write_nrrd_u8(path: &Path, sizes: [usize; 3], spacing: [f64; 3], values: &[u8]) {
    assert_eq!(values.len(), sizes.iter().product::<usize>());
    let header = format!(
        "NRRD0004\n\
         # Complete NRRD file format specification at:\n\
         # http://teem.sourceforge.net/nrrd/format.html\n\
         type: unsigned char\n\
         dimension: 3\n\
         space: left-posterior-superior\n\
         sizes: {} {} {}\n\
         space directions: ({},0,0) (0,{},0) (0,0,{})\n\
         kinds: domain domain domain\n\
         encoding: raw\n\
         space origin: (-10,-20,30)\n\
         \n",
        sizes[0], sizes[1], sizes[2], spacing[0], spacing[1], spacing[2]
    );
    let mut bytes = header.into_bytes();
    bytes.extend_from_slice(values);
    std::fs::write(path, bytes).unwrap();
}

fn put_i16(buf: &mut [u8], at: usize, v: i16) {
    buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

fn put_f32(buf: &mut [u8], at: usize, v: f32) {
    buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

/// Write a single-file NIfTI-1 image of uint8 voxels whose sform is
/// `diag(spacing)` translated by `origin`.
pub fn write_nifti_u8(
    path: &Path,
    sizes: [usize; 3],
    spacing: [f32; 3],
    origin: [f32; 3],
    values: &[u8],
) {
    assert_eq!(values.len(), sizes.iter().product::<usize>());
    let mut buf = vec![0u8; 352];
    buf[0..4].copy_from_slice(&348i32.to_le_bytes());

    put_i16(&mut buf, 40, 3);
    for axis in 0..7 {
        let n = sizes.get(axis).copied().unwrap_or(1);
        put_i16(&mut buf, 42 + 2 * axis, n as i16);
    }
    put_i16(&mut buf, 70, 2); // DT_UINT8
    put_i16(&mut buf, 72, 8);

    put_f32(&mut buf, 76, 1.0);
    for (axis, &step) in spacing.iter().enumerate() {
        put_f32(&mut buf, 80 + 4 * axis, step);
    }
    put_f32(&mut buf, 108, 352.0);
    put_f32(&mut buf, 112, 1.0);

    put_i16(&mut buf, 254, 1);
    for row in 0..3 {
        let srow = 280 + 16 * row;
        put_f32(&mut buf, srow + 4 * row, spacing[row]);
        put_f32(&mut buf, srow + 12, origin[row]);
    }
    buf[344..348].copy_from_slice(b"n+1\0");

    buf.extend_from_slice(values);
    std::fs::write(path, buf).unwrap();
}

/// A buffer of `len` voxels holding each `(label, count)` run in turn,
/// padded with background.
pub fn runs(len: usize, runs: &[(u8, usize)]) -> Vec<u8> {
    let mut values = Vec::with_capacity(len);
    for &(label, count) in runs {
        values.extend(std::iter::repeat(label).take(count));
    }
    values.resize(len, 0);
    values
}
