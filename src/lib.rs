//! Reads MATPOWER power system cases (with optional dynamic machine data) and
//! builds simulation topologies for power flow, static phasor, dynamic phasor
//! and EMT studies.

pub mod case;
pub mod config;
pub mod controllers;
pub mod dyn_case;
pub mod error;
pub mod export;
mod mapping;
pub mod mat;
mod mat5;
pub mod parse;
pub mod reader;
pub mod server;
pub mod topology;
pub mod units;

pub use config::ReaderConfig;
pub use error::{Error, Result};
pub use reader::Reader;
pub use topology::{Domain, SystemTopology};
