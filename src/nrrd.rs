//! Minimal NRRD reader.
//!
//! Covers what segmentation tools such as 3D Slicer write: a single header
//! with attached data or a detached `.nhdr` pointing at one data file, raw,
//! gzip or ascii encoding, and any scalar type. Voxel values are widened to
//! `f64` in file order (first axis fastest).

use crate::volume::{Affine, IDENTITY};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use flate2::read::GzDecoder;
use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NrrdError {
    #[error("Not a NRRD file (missing NRRD000x magic)")]
    MissingMagic,

    #[error("Missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Invalid value for `{field}`: {value}")]
    InvalidField { field: String, value: String },

    #[error("Unsupported scalar type `{0}`")]
    UnsupportedType(String),

    #[error("Unsupported encoding `{0}`")]
    UnsupportedEncoding(String),

    #[error("Expected {expected} voxels but found {found}")]
    SizeMismatch { expected: usize, found: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl ScalarType {
    fn parse(value: &str) -> Result<Self, NrrdError> {
        let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
        let kind = match normalized.as_str() {
            "signed char" | "int8" | "int8_t" => ScalarType::Int8,
            "uchar" | "unsigned char" | "uint8" | "uint8_t" => ScalarType::UInt8,
            "short" | "short int" | "signed short" | "signed short int" | "int16"
            | "int16_t" => ScalarType::Int16,
            "ushort" | "unsigned short" | "unsigned short int" | "uint16" | "uint16_t" => {
                ScalarType::UInt16
            }
            "int" | "signed int" | "int32" | "int32_t" => ScalarType::Int32,
            "uint" | "unsigned int" | "uint32" | "uint32_t" => ScalarType::UInt32,
            "longlong" | "long long" | "long long int" | "signed long long"
            | "signed long long int" | "int64" | "int64_t" => ScalarType::Int64,
            "ulonglong" | "unsigned long long" | "unsigned long long int" | "uint64"
            | "uint64_t" => ScalarType::UInt64,
            "float" => ScalarType::Float32,
            "double" => ScalarType::Float64,
            _ => return Err(NrrdError::UnsupportedType(value.to_string())),
        };
        Ok(kind)
    }

    pub fn size_of(&self) -> usize {
        match self {
            ScalarType::Int8 | ScalarType::UInt8 => 1,
            ScalarType::Int16 | ScalarType::UInt16 => 2,
            ScalarType::Int32 | ScalarType::UInt32 | ScalarType::Float32 => 4,
            ScalarType::Int64 | ScalarType::UInt64 | ScalarType::Float64 => 8,
        }
    }

    fn decode<B: ByteOrder>(&self, bytes: &[u8]) -> Vec<f64> {
        let chunks = bytes.chunks_exact(self.size_of());
        match self {
            ScalarType::Int8 => chunks.map(|c| c[0] as i8 as f64).collect(),
            ScalarType::UInt8 => chunks.map(|c| c[0] as f64).collect(),
            ScalarType::Int16 => chunks.map(|c| B::read_i16(c) as f64).collect(),
            ScalarType::UInt16 => chunks.map(|c| B::read_u16(c) as f64).collect(),
            ScalarType::Int32 => chunks.map(|c| B::read_i32(c) as f64).collect(),
            ScalarType::UInt32 => chunks.map(|c| B::read_u32(c) as f64).collect(),
            ScalarType::Int64 => chunks.map(|c| B::read_i64(c) as f64).collect(),
            ScalarType::UInt64 => chunks.map(|c| B::read_u64(c) as f64).collect(),
            ScalarType::Float32 => chunks.map(|c| B::read_f32(c) as f64).collect(),
            ScalarType::Float64 => chunks.map(B::read_f64).collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    Raw,
    Gzip,
    Ascii,
}

impl Encoding {
    fn parse(value: &str) -> Result<Self, NrrdError> {
        match value {
            "raw" => Ok(Encoding::Raw),
            "gzip" | "gz" => Ok(Encoding::Gzip),
            "ascii" | "text" | "txt" => Ok(Encoding::Ascii),
            other => Err(NrrdError::UnsupportedEncoding(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NrrdHeader {
    pub kind: ScalarType,
    pub sizes: Vec<usize>,
    pub encoding: Encoding,
    pub endian: Endian,
    pub space: Option<String>,
    /// One entry per axis, `None` for non-spatial axes.
    pub space_directions: Option<Vec<Option<[f64; 3]>>>,
    pub space_origin: Option<[f64; 3]>,
    pub spacings: Option<Vec<f64>>,
    pub data_file: Option<String>,
    pub line_skip: usize,
    pub byte_skip: i64,
}

impl NrrdHeader {
    /// Parse the header text (everything before the blank separator line).
    pub fn parse(text: &str) -> Result<Self, NrrdError> {
        let mut lines = text.lines();
        if !lines.next().is_some_and(|magic| magic.starts_with("NRRD000")) {
            return Err(NrrdError::MissingMagic);
        }

        let mut kind = None;
        let mut dimension = None;
        let mut sizes = None;
        let mut encoding = None;
        let mut header = NrrdHeader {
            kind: ScalarType::UInt8,
            sizes: Vec::new(),
            encoding: Encoding::Raw,
            endian: Endian::default(),
            space: None,
            space_directions: None,
            space_origin: None,
            spacings: None,
            data_file: None,
            line_skip: 0,
            byte_skip: 0,
        };

        for line in lines {
            let line = line.trim_end();
            if line.starts_with('#') || line.is_empty() {
                continue;
            }
            // key/value pairs carry free-form metadata
            if line.contains(":=") {
                continue;
            }
            let Some((field, value)) = line.split_once(": ") else {
                return Err(invalid("line", line));
            };
            let field = field.trim().to_ascii_lowercase();
            let value = value.trim();

            match field.as_str() {
                "type" => kind = Some(ScalarType::parse(value)?),
                "dimension" => dimension = Some(parse_number::<usize>(&field, value)?),
                "sizes" => sizes = Some(parse_list::<usize>(&field, value)?),
                "encoding" => encoding = Some(Encoding::parse(value)?),
                "endian" => {
                    header.endian = match value {
                        "little" => Endian::Little,
                        "big" => Endian::Big,
                        _ => return Err(invalid(&field, value)),
                    }
                }
                "space" => header.space = Some(value.to_ascii_lowercase()),
                "space directions" => header.space_directions = Some(parse_directions(value)?),
                "space origin" => {
                    header.space_origin = match parse_vectors(&field, value)?.as_slice() {
                        [Some(origin)] if origin.iter().all(|v| v.is_finite()) => Some(*origin),
                        _ => return Err(invalid(&field, value)),
                    };
                }
                "spacings" => header.spacings = Some(parse_list::<f64>(&field, value)?),
                "data file" | "datafile" => header.data_file = Some(value.to_string()),
                "line skip" | "lineskip" => header.line_skip = parse_number(&field, value)?,
                "byte skip" | "byteskip" => header.byte_skip = parse_number(&field, value)?,
                _ => log::debug!("Ignoring NRRD field `{field}`"),
            }
        }

        header.kind = kind.ok_or(NrrdError::MissingField("type"))?;
        header.sizes = sizes.ok_or(NrrdError::MissingField("sizes"))?;
        header.encoding = encoding.ok_or(NrrdError::MissingField("encoding"))?;
        let dimension = dimension.ok_or(NrrdError::MissingField("dimension"))?;

        if header.sizes.len() != dimension {
            return Err(invalid("sizes", &format!("{:?}", header.sizes)));
        }
        if let Some(directions) = &header.space_directions {
            if directions.len() != dimension {
                return Err(invalid("space directions", &format!("{directions:?}")));
            }
        }
        if let Some(spacings) = &header.spacings {
            if spacings.len() != dimension {
                return Err(invalid("spacings", &format!("{spacings:?}")));
            }
        }
        header.byte_count()?;
        Ok(header)
    }

    /// Number of voxels across all axes, rejecting sizes whose product
    /// does not fit in `usize`.
    pub fn voxel_count(&self) -> Result<usize, NrrdError> {
        self.sizes
            .iter()
            .try_fold(1usize, |count, &size| count.checked_mul(size))
            .ok_or_else(|| invalid("sizes", &format!("{:?}", self.sizes)))
    }

    fn byte_count(&self) -> Result<usize, NrrdError> {
        self.voxel_count()?
            .checked_mul(self.kind.size_of())
            .ok_or_else(|| invalid("sizes", &format!("{:?}", self.sizes)))
    }

    /// Indices of the axes that span physical space.
    ///
    /// Axes marked `none` in `space directions` are skipped. Without
    /// directions the first three axes are taken as spatial.
    pub fn spatial_axes(&self) -> Vec<usize> {
        match &self.space_directions {
            Some(directions) => directions
                .iter()
                .enumerate()
                .filter_map(|(axis, dir)| dir.map(|_| axis))
                .collect(),
            None => (0..self.sizes.len().min(3)).collect(),
        }
    }

    /// Physical voxel size along each spatial axis.
    pub fn spacing(&self) -> Vec<f64> {
        let axes = self.spatial_axes();
        if let Some(directions) = &self.space_directions {
            return axes
                .iter()
                .filter_map(|&axis| directions[axis])
                .map(|d| d.iter().map(|x| x * x).sum::<f64>().sqrt())
                .collect();
        }
        axes.iter()
            .map(|&axis| {
                self.spacings
                    .as_ref()
                    .map(|s| s[axis])
                    .filter(|s| s.is_finite())
                    .unwrap_or(1.0)
            })
            .collect()
    }

    /// Voxel-to-world transform in RAS coordinates.
    pub fn affine(&self) -> Affine {
        let mut affine = IDENTITY;
        let axes = self.spatial_axes();

        match &self.space_directions {
            Some(directions) => {
                for (column, dir) in axes.iter().filter_map(|&a| directions[a]).enumerate().take(3)
                {
                    for row in 0..3 {
                        affine[row][column] = dir[row];
                    }
                }
            }
            None => {
                for (column, step) in self.spacing().into_iter().enumerate().take(3) {
                    affine[column][column] = step;
                }
            }
        }
        if let Some(origin) = self.space_origin {
            for row in 0..3 {
                affine[row][3] = origin[row];
            }
        }

        let flip: [bool; 3] = match self.space.as_deref() {
            Some("left-posterior-superior" | "lps") => [true, true, false],
            Some("left-anterior-superior" | "las") => [true, false, false],
            _ => [false, false, false],
        };
        for (row, &flip) in flip.iter().enumerate() {
            if flip {
                for value in affine[row].iter_mut() {
                    *value = -*value;
                }
            }
        }
        affine
    }
}

/// Read a `.nrrd` or `.nhdr` file into its header and voxel values.
pub fn read_nrrd(path: impl AsRef<Path>) -> Result<(NrrdHeader, Vec<f64>), NrrdError> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let (header_len, data_start) = find_header_end(&bytes);
    let header = NrrdHeader::parse(&String::from_utf8_lossy(&bytes[..header_len]))?;

    let payload = match &header.data_file {
        Some(data_file) => {
            let data_path = resolve_data_file(path, data_file);
            log::debug!("Reading detached NRRD data from {}", data_path.display());
            let data = fs::read(&data_path)?;
            skip_lines(&data, header.line_skip)
        }
        None => skip_lines(&bytes[data_start..], header.line_skip),
    };

    let values = decode(&header, payload)?;
    let expected = header.voxel_count()?;
    if values.len() != expected {
        return Err(NrrdError::SizeMismatch {
            expected,
            found: values.len(),
        });
    }
    Ok((header, values))
}

fn decode(header: &NrrdHeader, payload: Vec<u8>) -> Result<Vec<f64>, NrrdError> {
    let bytes = match header.encoding {
        Encoding::Raw => payload,
        Encoding::Gzip => {
            let mut decompressed = Vec::new();
            GzDecoder::new(payload.as_slice()).read_to_end(&mut decompressed)?;
            decompressed
        }
        Encoding::Ascii => {
            return String::from_utf8_lossy(&payload)
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|token| !token.is_empty())
                .map(|token| {
                    token
                        .parse::<f64>()
                        .map_err(|_| invalid("ascii data", token))
                })
                .collect();
        }
    };

    let expected = header.byte_count()?;
    let bytes = match header.byte_skip {
        // -1 means the data sits at the end of the file
        -1 => bytes.get(bytes.len().saturating_sub(expected)..).unwrap_or(&[]),
        skip if skip >= 0 => bytes.get(skip as usize..).unwrap_or(&[]),
        skip => return Err(invalid("byte skip", &skip.to_string())),
    };
    if bytes.len() < expected {
        return Err(NrrdError::SizeMismatch {
            expected: header.voxel_count()?,
            found: bytes.len() / header.kind.size_of(),
        });
    }

    let bytes = &bytes[..expected];
    Ok(match header.endian {
        Endian::Little => header.kind.decode::<LittleEndian>(bytes),
        Endian::Big => header.kind.decode::<BigEndian>(bytes),
    })
}

/// Returns (header length, data offset). A header without a blank line
/// spans the whole file, as detached `.nhdr` files do.
fn find_header_end(bytes: &[u8]) -> (usize, usize) {
    let lf = bytes.windows(2).position(|w| w == b"\n\n").map(|p| (p, p + 2));
    let crlf = bytes
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|p| (p, p + 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) | (None, Some(a)) => a,
        (None, None) => (bytes.len(), bytes.len()),
    }
}

fn resolve_data_file(header_path: &Path, data_file: &str) -> PathBuf {
    let data_path = Path::new(data_file);
    if data_path.is_absolute() {
        return data_path.to_path_buf();
    }
    header_path
        .parent()
        .map(|dir| dir.join(data_path))
        .unwrap_or_else(|| data_path.to_path_buf())
}

fn skip_lines(data: &[u8], lines: usize) -> Vec<u8> {
    let mut start = 0;
    for _ in 0..lines {
        match data[start..].iter().position(|&b| b == b'\n') {
            Some(pos) => start += pos + 1,
            None => return Vec::new(),
        }
    }
    data[start..].to_vec()
}

fn invalid(field: &str, value: &str) -> NrrdError {
    NrrdError::InvalidField {
        field: field.to_string(),
        value: value.to_string(),
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, NrrdError> {
    value.parse().map_err(|_| invalid(field, value))
}

fn parse_list<T: std::str::FromStr>(field: &str, value: &str) -> Result<Vec<T>, NrrdError> {
    value
        .split_whitespace()
        .map(|token| parse_number(field, token))
        .collect()
}

fn parse_directions(value: &str) -> Result<Vec<Option<[f64; 3]>>, NrrdError> {
    parse_vectors("space directions", value)
}

/// Parse `(x,y,z) (x,y,z) none ...`.
fn parse_vectors(field: &str, value: &str) -> Result<Vec<Option<[f64; 3]>>, NrrdError> {
    let mut vectors = Vec::new();
    let mut rest = value.trim();

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('(') {
            let end = after.find(')').ok_or_else(|| invalid(field, value))?;
            let components: Vec<f64> = after[..end]
                .split(',')
                .map(|c| parse_number(field, c.trim()))
                .collect::<Result<_, _>>()?;
            let vector: [f64; 3] = components
                .try_into()
                .map_err(|_| invalid(field, value))?;
            vectors.push(Some(vector));
            rest = after[end + 1..].trim_start();
        } else if let Some(after) = rest.strip_prefix("none") {
            vectors.push(None);
            rest = after.trim_start();
        } else {
            return Err(invalid(field, value));
        }
    }
    Ok(vectors)
}
