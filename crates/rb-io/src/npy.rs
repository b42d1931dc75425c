//! NumPy `.npy` codec for little-endian `f8` arrays.
//!
//! Writes format version 1.0 in C order. Reads versions 1.0 and 2.0 and
//! accepts Fortran order, converting it to C order.

use nalgebra::{DMatrix, DVector};
use rb_core::Real;

use crate::{IoError, IoResult};

const MAGIC: &[u8] = b"\x93NUMPY";
const ALIGN: usize = 64;

/// A dense `f8` array in C (row-major) order.
#[derive(Clone, Debug, PartialEq)]
pub struct NpyArray {
    pub shape: Vec<usize>,
    pub data: Vec<Real>,
}

impl NpyArray {
    pub fn new(shape: Vec<usize>, data: Vec<Real>) -> IoResult<Self> {
        let expected = element_count(&shape)?;
        if expected != data.len() {
            return Err(IoError::format(format!(
                "shape {:?} needs {} values, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn scalar(value: Real) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    pub fn into_scalar(self) -> IoResult<Real> {
        match (self.shape.as_slice(), self.data.as_slice()) {
            ([], [value]) => Ok(*value),
            (shape, _) => Err(IoError::format(format!("expected a scalar, got shape {shape:?}"))),
        }
    }

    pub fn into_vector(self) -> IoResult<DVector<Real>> {
        if self.shape.len() != 1 {
            return Err(IoError::format(format!(
                "expected a 1-d array, got shape {:?}",
                self.shape
            )));
        }
        Ok(DVector::from_vec(self.data))
    }

    pub fn into_matrix(self) -> IoResult<DMatrix<Real>> {
        match self.shape.as_slice() {
            &[rows, cols] => Ok(DMatrix::from_row_slice(rows, cols, &self.data)),
            shape => Err(IoError::format(format!(
                "expected a 2-d array, got shape {shape:?}"
            ))),
        }
    }
}

impl From<&DVector<Real>> for NpyArray {
    fn from(v: &DVector<Real>) -> Self {
        Self {
            shape: vec![v.len()],
            data: v.as_slice().to_vec(),
        }
    }
}

impl From<&DMatrix<Real>> for NpyArray {
    fn from(m: &DMatrix<Real>) -> Self {
        // nalgebra is column-major; the transpose's storage is row-major
        Self {
            shape: vec![m.nrows(), m.ncols()],
            data: m.transpose().as_slice().to_vec(),
        }
    }
}

/// Product of `shape`, or a format error when it does not fit a `usize`.
fn element_count(shape: &[usize]) -> IoResult<usize> {
    shape
        .iter()
        .try_fold(1usize, |acc, &n| acc.checked_mul(n))
        .ok_or_else(|| IoError::format(format!("shape {shape:?} is too large")))
}

fn shape_literal(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({n},)"),
        dims => {
            let parts: Vec<String> = dims.iter().map(usize::to_string).collect();
            format!("({})", parts.join(", "))
        }
    }
}

/// Serialize as `.npy` version 1.0.
pub fn encode(array: &NpyArray) -> Vec<u8> {
    let mut header = format!(
        "{{'descr': '<f8', 'fortran_order': False, 'shape': {}, }}",
        shape_literal(&array.shape)
    );
    // magic + version + u16 length + header + '\n' is a multiple of 64
    let preamble = MAGIC.len() + 2 + 2;
    let padding = (ALIGN - (preamble + header.len() + 1) % ALIGN) % ALIGN;
    header.push_str(&" ".repeat(padding));
    header.push('\n');

    let mut out = Vec::with_capacity(preamble + header.len() + 8 * array.data.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for value in &array.data {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

pub fn decode(bytes: &[u8]) -> IoResult<NpyArray> {
    if bytes.len() < MAGIC.len() + 4 || &bytes[..MAGIC.len()] != MAGIC {
        return Err(IoError::format("missing NUMPY magic"));
    }
    let major = bytes[MAGIC.len()];
    let (header_len, header_start): (usize, usize) = match major {
        1 => {
            let raw = [bytes[8], bytes[9]];
            (u16::from_le_bytes(raw) as usize, 10)
        }
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(IoError::format("truncated header length"));
            }
            let raw = [bytes[8], bytes[9], bytes[10], bytes[11]];
            (u32::from_le_bytes(raw) as usize, 12)
        }
        other => return Err(IoError::format(format!("unsupported format version {other}"))),
    };
    let data_start = header_start.saturating_add(header_len);
    if bytes.len() < data_start {
        return Err(IoError::format("truncated header"));
    }
    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|_| IoError::format("header is not valid text"))?;

    let descr = dict_value(header, "descr")?;
    if !matches!(descr.trim_matches(|c| c == '\'' || c == '"'), "<f8" | "f8") {
        return Err(IoError::format(format!("unsupported dtype {descr}")));
    }
    let fortran_order = match dict_value(header, "fortran_order")?.as_str() {
        "False" => false,
        "True" => true,
        other => return Err(IoError::format(format!("bad fortran_order {other}"))),
    };
    let shape = parse_shape(&dict_value(header, "shape")?)?;

    let byte_count = element_count(&shape)?
        .checked_mul(8)
        .ok_or_else(|| IoError::format(format!("shape {shape:?} is too large")))?;
    let payload = &bytes[data_start..];
    if payload.len() != byte_count {
        return Err(IoError::format(format!(
            "shape {:?} needs {} bytes of data, found {}",
            shape,
            byte_count,
            payload.len()
        )));
    }
    let mut data: Vec<Real> = payload
        .chunks_exact(8)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            Real::from_le_bytes(raw)
        })
        .collect();

    if fortran_order && shape.len() == 2 {
        data = DMatrix::from_column_slice(shape[0], shape[1], &data)
            .transpose()
            .as_slice()
            .to_vec();
    } else if fortran_order && shape.len() > 2 {
        return Err(IoError::format("Fortran order is only supported up to 2-d"));
    }

    NpyArray::new(shape, data)
}

/// Raw text of `key`'s value in the Python dict literal of a header.
fn dict_value(header: &str, key: &str) -> IoResult<String> {
    let missing = || IoError::format(format!("header has no '{key}'"));
    let quoted = format!("'{key}'");
    let start = header.find(&quoted).ok_or_else(missing)? + quoted.len();
    let rest = header[start..].trim_start();
    let rest = rest.strip_prefix(':').ok_or_else(missing)?.trim_start();

    let end = if rest.starts_with('(') {
        rest.find(')').map(|i| i + 1)
    } else {
        rest.find(',').or_else(|| rest.find('}'))
    }
    .ok_or_else(missing)?;
    Ok(rest[..end].trim().to_string())
}

fn parse_shape(literal: &str) -> IoResult<Vec<usize>> {
    let inner = literal
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| IoError::format(format!("bad shape {literal}")))?;
    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.trim_end_matches('L')
                .parse()
                .map_err(|_| IoError::format(format!("bad shape entry {s}")))
        })
        .collect()
}
