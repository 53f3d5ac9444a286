//! Element-level reader for MATLAB v5 files.
//!
//! `matfile` only returns numeric arrays, but a case saved with
//! `save(file, 'mpc')` is a struct, and the bus name and asset extensions are
//! cell arrays. This walks the data elements and keeps structs, cells and
//! char arrays as a value tree.

use std::io::Read;

use libflate::zlib;
use log::debug;

use crate::error::{Error, Result};

const HEADER_LEN: usize = 128;

const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_INT16: u32 = 3;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_SINGLE: u32 = 7;
const MI_DOUBLE: u32 = 9;
const MI_INT64: u32 = 12;
const MI_UINT64: u32 = 13;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;
const MI_UTF8: u32 = 16;
const MI_UTF16: u32 = 17;
const MI_UTF32: u32 = 18;

const MX_CELL: u8 = 1;
const MX_STRUCT: u8 = 2;
const MX_CHAR: u8 = 4;
const MX_DOUBLE: u8 = 6;
const MX_UINT64: u8 = 15;

const COMPLEX_FLAG: u32 = 0x0800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MatValue {
    /// Real part of any numeric class, column-major.
    Numeric { dims: Vec<usize>, values: Vec<f64> },
    Char { rows: Vec<String> },
    Cell { dims: Vec<usize>, items: Vec<MatValue> },
    /// One value list per field, each holding an entry per struct element.
    Struct {
        dims: Vec<usize>,
        fields: Vec<(String, Vec<MatValue>)>,
    },
    /// Sparse, object and function handle arrays.
    Unsupported,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Variable {
    pub name: String,
    pub value: MatValue,
}

fn word<const N: usize>(chunk: &[u8], endian: Endian) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(chunk);
    if endian == Endian::Big {
        out.reverse();
    }
    out
}

fn decode<const N: usize>(data: &[u8], endian: Endian, convert: impl Fn([u8; N]) -> f64) -> Vec<f64> {
    data.chunks_exact(N)
        .map(|chunk| convert(word(chunk, endian)))
        .collect()
}

fn numeric(data_type: u32, data: &[u8], endian: Endian) -> Result<Vec<f64>> {
    let values = match data_type {
        MI_INT8 => data.iter().map(|&b| b as i8 as f64).collect(),
        MI_UINT8 | MI_UTF8 => data.iter().map(|&b| b as f64).collect(),
        MI_INT16 => decode::<2>(data, endian, |w| i16::from_le_bytes(w) as f64),
        MI_UINT16 | MI_UTF16 => decode::<2>(data, endian, |w| u16::from_le_bytes(w) as f64),
        MI_INT32 => decode::<4>(data, endian, |w| i32::from_le_bytes(w) as f64),
        MI_UINT32 | MI_UTF32 => decode::<4>(data, endian, |w| u32::from_le_bytes(w) as f64),
        MI_SINGLE => decode::<4>(data, endian, |w| f32::from_le_bytes(w) as f64),
        MI_DOUBLE => decode::<8>(data, endian, f64::from_le_bytes),
        MI_INT64 => decode::<8>(data, endian, |w| i64::from_le_bytes(w) as f64),
        MI_UINT64 => decode::<8>(data, endian, |w| u64::from_le_bytes(w) as f64),
        other => return Err(Error::Mat(format!("unknown data type {}", other))),
    };
    Ok(values)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    endian: Endian,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8], endian: Endian) -> Self {
        Self { bytes, pos: 0, endian }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| {
                Error::Mat(format!(
                    "element of {} bytes at offset {} runs past the end of the data",
                    len, self.pos
                ))
            })?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32> {
        let chunk = self.take(4)?;
        Ok(u32::from_le_bytes(word(chunk, self.endian)))
    }

    /// Next data element as (data type, payload).
    fn element(&mut self) -> Result<(u32, &'a [u8])> {
        let first = self.u32()?;
        if first >> 16 != 0 {
            // small element: size in the upper half, payload in the next word
            let len = (first >> 16) as usize;
            let payload = self.take(4)?;
            if len > 4 {
                return Err(Error::Mat(format!("small element claims {} bytes", len)));
            }
            return Ok((first & 0xffff, &payload[..len]));
        }

        let len = self.u32()? as usize;
        let payload = self.take(len)?;
        if first != MI_COMPRESSED {
            let padding = (8 - len % 8) % 8;
            self.pos = (self.pos + padding).min(self.bytes.len());
        }
        Ok((first, payload))
    }

    fn values(&mut self) -> Result<Vec<f64>> {
        let (data_type, data) = self.element()?;
        numeric(data_type, data, self.endian)
    }

    fn nested(&mut self) -> Result<MatValue> {
        match self.element()? {
            (MI_MATRIX, data) => Ok(matrix(data, self.endian)?.value),
            (other, _) => Err(Error::Mat(format!(
                "expected a matrix element inside a cell or struct, found type {}",
                other
            ))),
        }
    }
}

/// Reads every variable of a MAT v5 file, inflating compressed ones.
pub(crate) fn read_variables(bytes: &[u8]) -> Result<Vec<Variable>> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::Mat("file is shorter than the 128 byte header".to_string()));
    }
    let endian = match &bytes[126..HEADER_LEN] {
        b"IM" => Endian::Little,
        b"MI" => Endian::Big,
        _ => return Err(Error::Mat("missing endian indicator".to_string())),
    };

    let mut cursor = Cursor::new(&bytes[HEADER_LEN..], endian);
    let mut variables = Vec::new();
    while !cursor.is_empty() {
        match cursor.element()? {
            (MI_MATRIX, data) => variables.push(matrix(data, endian)?),
            (MI_COMPRESSED, data) => {
                let mut inflated = Vec::new();
                zlib::Decoder::new(data)
                    .and_then(|mut decoder| decoder.read_to_end(&mut inflated))
                    .map_err(|e| Error::Mat(format!("cannot inflate variable: {}", e)))?;
                match Cursor::new(&inflated, endian).element()? {
                    (MI_MATRIX, data) => variables.push(matrix(data, endian)?),
                    (other, _) => debug!("Skipping compressed element of type {}", other),
                }
            }
            (other, _) => debug!("Skipping top-level element of type {}", other),
        }
    }
    Ok(variables)
}

fn matrix(data: &[u8], endian: Endian) -> Result<Variable> {
    if data.is_empty() {
        return Ok(Variable {
            name: String::new(),
            value: MatValue::Numeric {
                dims: vec![0, 0],
                values: Vec::new(),
            },
        });
    }

    let mut cursor = Cursor::new(data, endian);
    let flags = cursor.values()?.first().copied().unwrap_or_default() as u32;
    let class = (flags & 0xff) as u8;
    let dims: Vec<usize> = cursor.values()?.iter().map(|&d| d.max(0.0) as usize).collect();
    let (_, name) = cursor.element()?;
    let name = String::from_utf8_lossy(name).into_owned();
    let count: usize = dims.iter().product();

    let value = match class {
        MX_CELL => MatValue::Cell {
            items: (0..count).map(|_| cursor.nested()).collect::<Result<_>>()?,
            dims,
        },
        MX_STRUCT => structure(&mut cursor, dims)?,
        MX_CHAR => MatValue::Char {
            rows: char_rows(&mut cursor, &dims, &name)?,
        },
        MX_DOUBLE..=MX_UINT64 => {
            let values = cursor.values()?;
            if values.len() != count {
                return Err(Error::Mat(format!(
                    "variable '{}' of size {:?} holds {} values",
                    name,
                    dims,
                    values.len()
                )));
            }
            if flags & COMPLEX_FLAG != 0 {
                debug!("Ignoring imaginary part of '{}'", name);
            }
            MatValue::Numeric { dims, values }
        }
        other => {
            debug!("Variable '{}' has unsupported class {}", name, other);
            MatValue::Unsupported
        }
    };
    Ok(Variable { name, value })
}

fn structure(cursor: &mut Cursor<'_>, dims: Vec<usize>) -> Result<MatValue> {
    let width = cursor.values()?.first().copied().unwrap_or_default() as usize;
    let (_, names) = cursor.element()?;
    let mut fields: Vec<(String, Vec<MatValue>)> = if width == 0 {
        Vec::new()
    } else {
        names
            .chunks_exact(width)
            .map(|chunk| {
                let end = chunk.iter().position(|&b| b == 0).unwrap_or(chunk.len());
                (String::from_utf8_lossy(&chunk[..end]).into_owned(), Vec::new())
            })
            .collect()
    };

    for _ in 0..dims.iter().product::<usize>() {
        for (_, values) in fields.iter_mut() {
            values.push(cursor.nested()?);
        }
    }
    Ok(MatValue::Struct { dims, fields })
}

fn char_rows(cursor: &mut Cursor<'_>, dims: &[usize], name: &str) -> Result<Vec<String>> {
    let (data_type, data) = cursor.element()?;
    let units: Vec<u32> = if data_type == MI_UTF8 {
        String::from_utf8_lossy(data).chars().map(u32::from).collect()
    } else {
        numeric(data_type, data, cursor.endian)?
            .into_iter()
            .map(|unit| unit as u32)
            .collect()
    };

    let rows = dims.first().copied().unwrap_or(0);
    if rows == 0 {
        return Ok(Vec::new());
    }
    if units.len() % rows != 0 {
        return Err(Error::Mat(format!(
            "char array '{}' of size {:?} holds {} characters",
            name,
            dims,
            units.len()
        )));
    }
    let cols = units.len() / rows;
    Ok((0..rows)
        .map(|r| {
            (0..cols)
                .map(|c| char::from_u32(units[c * rows + r]).unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        })
        .collect())
}

/// Builders for little-endian MAT v5 byte streams.
#[cfg(test)]
pub(crate) mod fixture {
    use std::io::Write;

    use super::*;

    pub fn element(data_type: u32, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(data_type.to_le_bytes());
        out.extend((data.len() as u32).to_le_bytes());
        out.extend(data);
        while out.len() % 8 != 0 {
            out.push(0);
        }
        out
    }

    pub fn small_element(data_type: u32, data: &[u8]) -> Vec<u8> {
        assert!(data.len() <= 4);
        let mut out = ((data.len() as u32) << 16 | data_type).to_le_bytes().to_vec();
        out.extend(data);
        out.resize(8, 0);
        out
    }

    pub fn matrix(class: u8, dims: &[usize], name: &str, data: &[u8]) -> Vec<u8> {
        let flags: Vec<u8> = [u32::from(class), 0].iter().flat_map(|w| w.to_le_bytes()).collect();
        let dims: Vec<u8> = dims.iter().flat_map(|&d| (d as i32).to_le_bytes()).collect();
        let mut body = element(MI_UINT32, &flags);
        body.extend(element(MI_INT32, &dims));
        body.extend(element(MI_INT8, name.as_bytes()));
        body.extend(data);
        element(MI_MATRIX, &body)
    }

    /// Double array from column-major values.
    pub fn array(name: &str, dims: &[usize], values: &[f64]) -> Vec<u8> {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        matrix(MX_DOUBLE, dims, name, &element(MI_DOUBLE, &data))
    }

    /// Double matrix from rows.
    pub fn double(name: &str, rows: &[&[f64]]) -> Vec<u8> {
        let cols = rows.first().map_or(0, |row| row.len());
        let values: Vec<f64> = (0..cols)
            .flat_map(|c| rows.iter().map(move |row| row[c]))
            .collect();
        array(name, &[rows.len(), cols], &values)
    }

    /// Unnamed 1xN char array stored as UTF-16 code units, as MATLAB writes it.
    pub fn text(s: &str) -> Vec<u8> {
        let units: Vec<u16> = s.encode_utf16().collect();
        let data: Vec<u8> = units.iter().flat_map(|u| u.to_le_bytes()).collect();
        matrix(MX_CHAR, &[1, units.len()], "", &element(MI_UINT16, &data))
    }

    /// Column cell of already encoded matrices.
    pub fn cell(name: &str, items: &[Vec<u8>]) -> Vec<u8> {
        matrix(MX_CELL, &[items.len(), 1], name, &items.concat())
    }

    /// 1x1 struct with the given fields.
    pub fn structure(name: &str, fields: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let width = fields.iter().map(|(field, _)| field.len() + 1).max().unwrap_or(1);
        let mut names = vec![0u8; width * fields.len()];
        for (i, (field, _)) in fields.iter().enumerate() {
            names[i * width..i * width + field.len()].copy_from_slice(field.as_bytes());
        }
        let mut data = small_element(MI_INT32, &(width as i32).to_le_bytes());
        data.extend(element(MI_INT8, &names));
        for (_, value) in fields {
            data.extend(value);
        }
        matrix(MX_STRUCT, &[1, 1], name, &data)
    }

    pub fn compressed(variable: &[u8]) -> Vec<u8> {
        let mut encoder = zlib::Encoder::new(Vec::new()).unwrap();
        encoder.write_all(variable).unwrap();
        let data = encoder.finish().into_result().unwrap();
        let mut out = Vec::new();
        out.extend(MI_COMPRESSED.to_le_bytes());
        out.extend((data.len() as u32).to_le_bytes());
        out.extend(data);
        out
    }

    pub fn file(variables: &[Vec<u8>]) -> Vec<u8> {
        let mut out = vec![b' '; HEADER_LEN];
        let text = b"MATLAB 5.0 MAT-file, Platform: powertopo";
        out[..text.len()].copy_from_slice(text);
        out[116..124].fill(0);
        out[124..126].copy_from_slice(&0x0100u16.to_le_bytes());
        out[126..128].copy_from_slice(b"IM");
        out.extend(variables.concat());
        out
    }
}
