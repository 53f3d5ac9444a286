use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::case::*;
use crate::dyn_case::*;
use crate::error::{Error, Result};
use crate::mat;

/// A value assigned to a case struct field.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Scalar(f64),
    Matrix(Vec<Vec<f64>>),
    Cell(Vec<CellEntry>),
}

/// One element of a cell array: a string, or a nested cell of strings.
#[derive(Debug, Clone, PartialEq)]
pub enum CellEntry {
    Text(String),
    List(Vec<String>),
}

pub type Fields = HashMap<String, Field>;

/// Reads a static case. `.mat` files are read as MATLAB binaries, anything
/// else as MATPOWER text. `struct_name` is the case struct (usually `mpc`).
pub fn read_case(path: &Path, struct_name: &str) -> Result<MpcCase> {
    let fields = read_fields(path, struct_name)?;
    let case = case_from_fields(&fields)?;
    info!(
        "Parsed {} buses, {} generators, {} branches from {}",
        case.buses.len(),
        case.generators.len(),
        case.branches.len(),
        path.display(),
    );
    Ok(case)
}

/// Reads the dynamic companion file.
pub fn read_dyn_case(path: &Path, struct_name: &str) -> Result<DynCase> {
    let fields = read_fields(path, struct_name)?;
    let dyn_case = dyn_case_from_fields(&fields)?;
    info!("Parsed {} from {}", dyn_case, path.display());
    Ok(dyn_case)
}

pub fn parse_case_str(content: &str, struct_name: &str) -> Result<MpcCase> {
    case_from_fields(&parse_fields(content, struct_name)?)
}

pub fn parse_dyn_case_str(content: &str, struct_name: &str) -> Result<DynCase> {
    dyn_case_from_fields(&parse_fields(content, struct_name)?)
}

fn read_fields(path: &Path, struct_name: &str) -> Result<Fields> {
    let is_mat = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mat"));

    if is_mat {
        let file = fs::File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        mat::read_fields(file, struct_name)
    } else {
        let content = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        parse_fields(&content, struct_name)
    }
}

/// drop `%` comments and `...` continuations, leaving quoted text alone
fn strip_comments(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for line in content.lines() {
        let mut quote: Option<char> = None;
        let mut end = line.len();
        let mut continued = false;
        for (i, c) in line.char_indices() {
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None if c == '\'' || c == '"' => quote = Some(c),
                None if c == '%' => {
                    end = i;
                    break;
                }
                None if line[i..].starts_with("...") => {
                    end = i;
                    continued = true;
                    break;
                }
                None => {}
            }
        }
        out.push_str(&line[..end]);
        out.push(if continued { ' ' } else { '\n' });
    }
    out
}

/// Parses every `<struct_name>.<field> = ...;` assignment of a MATPOWER
/// text file.
pub fn parse_fields(content: &str, struct_name: &str) -> Result<Fields> {
    let text = strip_comments(content);
    let bytes = text.as_bytes();
    let prefix = format!("{}.", struct_name);
    let mut fields = Fields::new();

    let mut pos = 0;
    while let Some(offset) = text[pos..].find(&prefix) {
        let start = pos + offset;
        pos = start + prefix.len();

        // the prefix must begin a statement, not sit inside another name
        if start > 0 {
            let before = bytes[start - 1] as char;
            if before.is_alphanumeric() || before == '_' || before == '.' {
                continue;
            }
        }

        let name_len = text[pos..]
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(text.len() - pos);
        let name = &text[pos..pos + name_len];
        pos += name_len;

        let rest = text[pos..].trim_start();
        let Some(rest) = rest.strip_prefix('=') else {
            continue;
        };
        let rest = rest.trim_start();
        let value_start = text.len() - rest.len();

        let (field, consumed) = match rest.chars().next() {
            Some('[') => {
                let end = rest.find(']').ok_or_else(|| Error::MalformedField {
                    field: name.to_string(),
                    reason: "unterminated matrix".to_string(),
                })?;
                (Field::Matrix(parse_matrix(name, &rest[1..end])?), end + 1)
            }
            Some('{') => {
                let (entries, end) = parse_cell(name, rest)?;
                (Field::Cell(entries), end)
            }
            _ => {
                let end = rest.find([';', '\n']).unwrap_or(rest.len());
                match parse_number(rest[..end].trim()) {
                    Some(v) => (Field::Scalar(v), end),
                    None => {
                        // strings such as mpc.version are not needed
                        debug!("Skipping non-numeric field {}", name);
                        pos = value_start + end;
                        continue;
                    }
                }
            }
        };

        debug!("Read field {}.{}", struct_name, name);
        fields.insert(name.to_string(), field);
        pos = value_start + consumed;
    }

    Ok(fields)
}

fn parse_number(token: &str) -> Option<f64> {
    token.to_ascii_lowercase().parse().ok()
}

fn parse_matrix(name: &str, body: &str) -> Result<Vec<Vec<f64>>> {
    let mut rows = Vec::new();
    for row in body.split([';', '\n']) {
        let values = row
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(|s| {
                parse_number(s).ok_or_else(|| Error::MalformedField {
                    field: name.to_string(),
                    reason: format!("'{}' is not a number", s),
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        if !values.is_empty() {
            rows.push(values);
        }
    }
    Ok(rows)
}

/// Parses a cell array starting at the opening brace. Returns the entries
/// and the number of bytes consumed.
fn parse_cell(name: &str, text: &str) -> Result<(Vec<CellEntry>, usize)> {
    let malformed = |reason: &str| Error::MalformedField {
        field: name.to_string(),
        reason: reason.to_string(),
    };

    let mut entries = Vec::new();
    let mut nested: Option<Vec<String>> = None;
    let mut depth = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '{' => {
                depth += 1;
                match depth {
                    1 => {}
                    2 => nested = Some(Vec::new()),
                    _ => return Err(malformed("cells nest at most two levels")),
                }
            }
            '}' => {
                depth -= 1;
                match depth {
                    0 => return Ok((entries, i + 1)),
                    1 => {
                        if let Some(list) = nested.take() {
                            entries.push(CellEntry::List(list));
                        }
                    }
                    _ => return Err(malformed("unbalanced braces")),
                }
            }
            '\'' | '"' => {
                let mut s = String::new();
                loop {
                    match chars.next() {
                        // MATLAB escapes a quote by doubling it
                        Some((_, q)) if q == c => {
                            if chars.peek().is_some_and(|&(_, n)| n == c) {
                                chars.next();
                                s.push(c);
                            } else {
                                break;
                            }
                        }
                        Some((_, other)) => s.push(other),
                        None => return Err(malformed("unterminated string")),
                    }
                }
                match nested.as_mut() {
                    Some(list) => list.push(s),
                    None if depth == 1 => entries.push(CellEntry::Text(s)),
                    None => return Err(malformed("string outside of cell")),
                }
            }
            c if c.is_whitespace() || c == ',' || c == ';' => {}
            other => return Err(malformed(&format!("unexpected character '{}'", other))),
        }
    }

    Err(malformed("unterminated cell array"))
}

fn matrix<'a>(fields: &'a Fields, name: &str) -> Result<Option<&'a Vec<Vec<f64>>>> {
    match fields.get(name) {
        None => Ok(None),
        Some(Field::Matrix(rows)) => Ok(Some(rows)),
        Some(_) => Err(Error::MalformedField {
            field: name.to_string(),
            reason: "expected a numeric matrix".to_string(),
        }),
    }
}

fn required_matrix<'a>(fields: &'a Fields, name: &str) -> Result<&'a Vec<Vec<f64>>> {
    matrix(fields, name)?.ok_or_else(|| Error::MissingField(name.to_string()))
}

fn check_width(table: &'static str, row: usize, values: &[f64], expected: usize) -> Result<()> {
    if values.len() < expected {
        return Err(Error::ShortRow {
            table,
            row,
            expected,
            found: values.len(),
        });
    }
    Ok(())
}

/// Matrix entries are doubles; identifiers and counts must be whole numbers.
fn integer(table: &'static str, row: usize, column: &'static str, value: f64) -> Result<usize> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
        Ok(value as usize)
    } else {
        Err(Error::InvalidInteger {
            table,
            row,
            column,
            value,
        })
    }
}

fn bus_row(row: usize, v: &[f64]) -> Result<Bus> {
    check_width("bus", row, v, 13)?;
    let bus_i = integer("bus", row, "bus_i", v[0])?;
    let code = integer("bus", row, "type", v[1])?;
    Ok(Bus {
        bus_i,
        bus_type: BusType::from_code(bus_i, code)?,
        pd: v[2],
        qd: v[3],
        gs: v[4],
        bs: v[5],
        area: integer("bus", row, "area", v[6])?,
        vm: v[7],
        va: v[8],
        base_kv: v[9],
        zone: integer("bus", row, "zone", v[10])?,
        vmax: v[11],
        vmin: v[12],
    })
}

fn gen_row(row: usize, v: &[f64]) -> Result<Generator> {
    check_width("gen", row, v, 10)?;
    let col = |i: usize| v.get(i).copied().unwrap_or(0.0);
    Ok(Generator {
        bus: integer("gen", row, "bus", v[0])?,
        pg: v[1],
        qg: v[2],
        qmax: v[3],
        qmin: v[4],
        vg: v[5],
        mbase: v[6],
        status: v[7] > 0.0,
        pmax: v[8],
        pmin: v[9],
        pc1: col(10),
        pc2: col(11),
        qc1min: col(12),
        qc1max: col(13),
        qc2min: col(14),
        qc2max: col(15),
        ramp_agc: col(16),
        ramp_10: col(17),
        ramp_30: col(18),
        ramp_q: col(19),
        apf: col(20),
    })
}

fn branch_row(row: usize, v: &[f64]) -> Result<Branch> {
    check_width("branch", row, v, 11)?;
    Ok(Branch {
        fbus: integer("branch", row, "fbus", v[0])?,
        tbus: integer("branch", row, "tbus", v[1])?,
        r: v[2],
        x: v[3],
        b: v[4],
        rate_a: v[5],
        rate_b: v[6],
        rate_c: v[7],
        ratio: v[8],
        angle: v[9],
        status: v[10] > 0.0,
        angmin: v.get(11).copied().unwrap_or(-360.0),
        angmax: v.get(12).copied().unwrap_or(360.0),
    })
}

fn text_cell<'a, 'n>(
    fields: &'a Fields,
    names: &[&'n str],
) -> Result<Option<(&'n str, &'a Vec<CellEntry>)>> {
    for &name in names {
        match fields.get(name) {
            None => continue,
            Some(Field::Cell(entries)) => return Ok(Some((name, entries))),
            Some(_) => {
                return Err(Error::MalformedField {
                    field: name.to_string(),
                    reason: "expected a cell array".to_string(),
                })
            }
        }
    }
    Ok(None)
}

fn check_cell_len(name: &str, entries: &[CellEntry], buses: usize) -> Result<()> {
    if entries.len() != buses {
        return Err(Error::MalformedField {
            field: name.to_string(),
            reason: format!("{} entries for {} buses", entries.len(), buses),
        });
    }
    Ok(())
}

pub(crate) fn case_from_fields(fields: &Fields) -> Result<MpcCase> {
    let base_mva = match fields.get("baseMVA") {
        Some(Field::Scalar(v)) => *v,
        Some(Field::Matrix(rows)) if rows.len() == 1 && rows[0].len() == 1 => rows[0][0],
        Some(_) => {
            return Err(Error::MalformedField {
                field: "baseMVA".to_string(),
                reason: "expected a scalar".to_string(),
            })
        }
        None => return Err(Error::MissingField("baseMVA".to_string())),
    };
    if !(base_mva > 0.0 && base_mva.is_finite()) {
        return Err(Error::InvalidBasePower(base_mva));
    }

    let mut case = MpcCase::new(base_mva);

    for (row, values) in required_matrix(fields, "bus")?.iter().enumerate() {
        case.buses.push(bus_row(row, values)?);
    }
    for (row, values) in required_matrix(fields, "gen")?.iter().enumerate() {
        case.generators.push(gen_row(row, values)?);
    }
    for (row, values) in required_matrix(fields, "branch")?.iter().enumerate() {
        case.branches.push(branch_row(row, values)?);
    }

    if let Some((name, entries)) = text_cell(fields, &["bus_names", "bus_name"])? {
        check_cell_len(name, entries, case.buses.len())?;
        for (bus, entry) in case.buses.iter().zip(entries) {
            let CellEntry::Text(bus_name) = entry else {
                return Err(Error::MalformedField {
                    field: name.to_string(),
                    reason: format!("bus {} name is not a string", bus.bus_i),
                });
            };
            case.bus_names.insert(bus.bus_i, bus_name.clone());
        }
    }

    if let Some((name, entries)) = text_cell(fields, &["bus_assets"])? {
        check_cell_len(name, entries, case.buses.len())?;
        for (bus, entry) in case.buses.iter().zip(entries) {
            let assets = match entry {
                CellEntry::Text(s) if s.is_empty() => continue,
                CellEntry::Text(s) => vec![s.clone()],
                CellEntry::List(list) if list.is_empty() => continue,
                CellEntry::List(list) => list.clone(),
            };
            case.bus_assets.insert(bus.bus_i, assets);
        }
    }

    Ok(case)
}

pub(crate) fn dyn_case_from_fields(fields: &Fields) -> Result<DynCase> {
    let mut dyn_case = DynCase::default();

    if let Some(rows) = matrix(fields, "gen")? {
        for (row, v) in rows.iter().enumerate() {
            check_width("dynamic gen", row, v, 16)?;
            dyn_case.generators.push(DynGenerator {
                bus: integer("dynamic gen", row, "bus", v[0])?,
                model: integer("dynamic gen", row, "model", v[1])? as i64,
                base_s: v[2],
                h: v[3],
                d: v[4],
                xd: v[5],
                xq: v[6],
                xd_t: v[7],
                xq_t: v[8],
                xd_s: v[9],
                xq_s: v[10],
                td0_t: v[11],
                tq0_t: v[12],
                td0_s: v[13],
                tq0_s: v[14],
                ra: v[15],
            });
        }
    }

    if let Some(rows) = matrix(fields, "exc")? {
        for (row, v) in rows.iter().enumerate() {
            check_width("exc", row, v, 9)?;
            dyn_case.exciters.push(ExciterData {
                bus: integer("exc", row, "bus", v[0])?,
                kind: integer("exc", row, "type", v[1])? as i64,
                ka: v[2],
                te: v[3],
                ta: v[4],
                tb: v[5],
                u_min: v[6],
                u_max: v[7],
                kbc: v[8],
            });
        }
    }

    if let Some(rows) = matrix(fields, "pss")? {
        for (row, v) in rows.iter().enumerate() {
            check_width("pss", row, v, 10)?;
            dyn_case.stabilizers.push(PssData {
                bus: integer("pss", row, "bus", v[0])?,
                kind: integer("pss", row, "type", v[1])? as i64,
                tw: v[2],
                t1: v[3],
                t2: v[4],
                t3: v[5],
                t4: v[6],
                ks: v[7],
                u_smin: v[8],
                u_smax: v[9],
            });
        }
    }

    if let Some(rows) = matrix(fields, "gov")? {
        for (row, v) in rows.iter().enumerate() {
            check_width("gov", row, v, 10)?;
            dyn_case.governors.push(GovernorData {
                bus: integer("gov", row, "bus", v[0])?,
                kind: integer("gov", row, "type", v[1])? as i64,
                k: v[2],
                t1: v[3],
                t2: v[4],
                t3: v[5],
                p_up: v[6],
                p_down: v[7],
                p_max: v[8],
                p_min: v[9],
            });
        }
    }

    Ok(dyn_case)
}
