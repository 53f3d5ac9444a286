//! MATLAB v5 binary case files.
//!
//! A case saved as a struct (`save(file, 'mpc')`) is read field by field,
//! including the `bus_names` and `bus_assets` cell arrays. Without a struct of
//! that name the file is read flat (`save(file, '-struct', 'mpc')`), giving
//! top-level numeric variables `baseMVA`, `bus`, `gen`, ... Flat variables
//! named `<struct>_<field>` are accepted as well.

use std::io::Read;

use log::debug;
use matfile::{MatFile, NumericData};

use crate::error::{Error, Result};
use crate::mat5::{self, MatValue};
use crate::parse::{CellEntry, Field, Fields};

pub fn read_fields<R: Read>(mut reader: R, struct_name: &str) -> Result<Fields> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| Error::Mat(format!("cannot read data: {}", e)))?;

    let variables = mat5::read_variables(&bytes)?;
    let named = variables.iter().find(|v| v.name == struct_name);
    if let Some(MatValue::Struct { dims, fields }) = named.map(|v| &v.value) {
        debug!("Reading fields of struct {}", struct_name);
        return struct_fields(struct_name, dims, fields);
    }

    let fields = flat_fields(&bytes, struct_name)?;
    if fields.is_empty() {
        let structs: Vec<&str> = variables
            .iter()
            .filter(|v| matches!(v.value, MatValue::Struct { .. }))
            .map(|v| v.name.as_str())
            .collect();
        if !structs.is_empty() {
            return Err(Error::Mat(format!(
                "no struct named '{}' (found {})",
                struct_name,
                structs.join(", ")
            )));
        }
    }
    Ok(fields)
}

fn flat_fields(bytes: &[u8], struct_name: &str) -> Result<Fields> {
    let file = MatFile::parse(bytes).map_err(|e| Error::Mat(format!("{:?}", e)))?;
    let prefix = format!("{}_", struct_name);
    let mut fields = Fields::new();

    for array in file.arrays() {
        let name = array.name().strip_prefix(&prefix).unwrap_or(array.name());
        if let Some(field) = numeric_field(array.name(), array.size(), &numeric_values(array.data()))? {
            fields.insert(name.to_string(), field);
        }
    }
    Ok(fields)
}

fn struct_fields(struct_name: &str, dims: &[usize], values: &[(String, Vec<MatValue>)]) -> Result<Fields> {
    if dims.iter().product::<usize>() != 1 {
        return Err(Error::Mat(format!(
            "struct '{}' must be 1x1, found {:?}",
            struct_name, dims
        )));
    }

    let mut fields = Fields::new();
    for (name, entries) in values {
        let Some(value) = entries.first() else { continue };
        let field = match value {
            MatValue::Numeric { dims, values } => numeric_field(name, dims, values)?,
            MatValue::Cell { items, .. } => Some(Field::Cell(
                items
                    .iter()
                    .map(|item| cell_entry(name, item))
                    .collect::<Result<_>>()?,
            )),
            _ => None,
        };
        match field {
            Some(field) => {
                fields.insert(name.clone(), field);
            }
            None => debug!("Skipping field {}.{}", struct_name, name),
        }
    }
    Ok(fields)
}

fn numeric_field(name: &str, dims: &[usize], values: &[f64]) -> Result<Option<Field>> {
    let &[rows, cols] = dims else {
        debug!("Skipping {}-dimensional variable {}", dims.len(), name);
        return Ok(None);
    };

    let field = if rows == 1 && cols == 1 {
        let value = values
            .first()
            .copied()
            .ok_or_else(|| Error::Mat(format!("variable {} has no data", name)))?;
        Field::Scalar(value)
    } else {
        Field::Matrix(rows_from_column_major(values, rows, cols)?)
    };
    debug!("Read variable {} ({}x{})", name, rows, cols);
    Ok(Some(field))
}

fn text(field: &str, value: &MatValue) -> Result<String> {
    match value {
        MatValue::Char { rows } if rows.len() <= 1 => Ok(rows.first().cloned().unwrap_or_default()),
        MatValue::Numeric { values, .. } if values.is_empty() => Ok(String::new()),
        _ => Err(Error::MalformedField {
            field: field.to_string(),
            reason: "cell entries must be single-row strings".to_string(),
        }),
    }
}

fn cell_entry(field: &str, value: &MatValue) -> Result<CellEntry> {
    match value {
        MatValue::Cell { items, .. } => items
            .iter()
            .map(|item| text(field, item))
            .collect::<Result<_>>()
            .map(CellEntry::List),
        other => text(field, other).map(CellEntry::Text),
    }
}

fn numeric_values(data: &NumericData) -> Vec<f64> {
    match data {
        NumericData::Double { real, .. } => real.clone(),
        NumericData::Single { real, .. } => real.iter().map(|&x| x as f64).collect(),
        NumericData::Int8 { real, .. } => real.iter().map(|&x| x as f64).collect(),
        NumericData::UInt8 { real, .. } => real.iter().map(|&x| x as f64).collect(),
        NumericData::Int16 { real, .. } => real.iter().map(|&x| x as f64).collect(),
        NumericData::UInt16 { real, .. } => real.iter().map(|&x| x as f64).collect(),
        NumericData::Int32 { real, .. } => real.iter().map(|&x| x as f64).collect(),
        NumericData::UInt32 { real, .. } => real.iter().map(|&x| x as f64).collect(),
        NumericData::Int64 { real, .. } => real.iter().map(|&x| x as f64).collect(),
        NumericData::UInt64 { real, .. } => real.iter().map(|&x| x as f64).collect(),
    }
}

/// MATLAB stores matrices column by column.
pub(crate) fn rows_from_column_major(values: &[f64], rows: usize, cols: usize) -> Result<Vec<Vec<f64>>> {
    if values.len() != rows * cols {
        return Err(Error::Mat(format!(
            "{}x{} matrix holds {} values",
            rows,
            cols,
            values.len()
        )));
    }
    Ok((0..rows)
        .map(|r| (0..cols).map(|c| values[c * rows + r]).collect())
        .collect())
}
