use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid MAT file: {0}")]
    Mat(String),

    #[error("field '{0}' not found in case data")]
    MissingField(String),

    #[error("malformed field '{field}': {reason}")]
    MalformedField { field: String, reason: String },

    #[error("{table} row {row}: expected at least {expected} columns, found {found}")]
    ShortRow {
        table: &'static str,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("{table} row {row}: column '{column}' must be a non-negative integer, got {value}")]
    InvalidInteger {
        table: &'static str,
        row: usize,
        column: &'static str,
        value: f64,
    },

    #[error("bus {bus}: unknown bus type code {code}")]
    InvalidBusType { bus: usize, code: usize },

    #[error("bus {0} is referenced but not defined")]
    UnknownBus(usize),

    #[error("base power must be positive, got {0} MVA")]
    InvalidBasePower(f64),

    #[error("system frequency must be positive, got {0} Hz")]
    InvalidFrequency(f64),

    #[error("bus {0} has no positive base voltage")]
    InvalidBaseVoltage(usize),

    #[error("bus {0} needs a synchronous machine but has no in-service generator")]
    MissingGenerator(usize),

    #[error("bus {0} has no dynamic generator data")]
    MissingDynamicData(usize),

    #[error("generator model {0} is not supported (supported: 3, 4, 5, 6)")]
    UnsupportedGeneratorModel(i64),

    #[error("governor at bus {0} has zero gain K")]
    ZeroGovernorGain(usize),

    #[error("component '{0}' already exists")]
    DuplicateComponent(String),

    #[error("node '{0}' not found")]
    NodeNotFound(String),

    #[error("faults can only be added for dynamic simulations")]
    FaultInPowerFlow,

    #[error("no objects created yet, load the case first")]
    NoObjects,

    #[error("unknown domain '{0}' (expected pf, sp, dp or emt)")]
    UnknownDomain(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}
