use std::fmt;

use serde::{Deserialize, Serialize};

/// Synchronous machine data, one row of the dynamic `gen` table.
/// Reactances and time constants are in p.u. and seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynGenerator {
    pub bus: usize,
    pub model: i64,
    /// Machine base power (MVA).
    pub base_s: f64,
    pub h: f64,
    pub d: f64,
    pub xd: f64,
    pub xq: f64,
    pub xd_t: f64,
    pub xq_t: f64,
    pub xd_s: f64,
    pub xq_s: f64,
    pub td0_t: f64,
    pub tq0_t: f64,
    pub td0_s: f64,
    pub tq0_s: f64,
    pub ra: f64,
}

/// Static exciter (AVR) data, one row of the `exc` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExciterData {
    pub bus: usize,
    pub kind: i64,
    pub ka: f64,
    pub te: f64,
    pub ta: f64,
    pub tb: f64,
    pub u_min: f64,
    pub u_max: f64,
    pub kbc: f64,
}

/// Power system stabilizer data, one row of the `pss` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PssData {
    pub bus: usize,
    pub kind: i64,
    pub tw: f64,
    pub t1: f64,
    pub t2: f64,
    pub t3: f64,
    pub t4: f64,
    pub ks: f64,
    pub u_smin: f64,
    pub u_smax: f64,
}

/// Turbine governor data, one row of the `gov` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernorData {
    pub bus: usize,
    pub kind: i64,
    pub k: f64,
    pub t1: f64,
    pub t2: f64,
    pub t3: f64,
    pub p_up: f64,
    pub p_down: f64,
    pub p_max: f64,
    pub p_min: f64,
}

/// Companion file with dynamic machine and controller data. Every table is
/// optional and empty when the file does not define it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DynCase {
    pub generators: Vec<DynGenerator>,
    pub exciters: Vec<ExciterData>,
    pub stabilizers: Vec<PssData>,
    pub governors: Vec<GovernorData>,
}

impl DynCase {
    pub fn generator(&self, bus: usize) -> Option<&DynGenerator> {
        self.generators.iter().find(|g| g.bus == bus)
    }

    pub fn exciter(&self, bus: usize) -> Option<&ExciterData> {
        self.exciters.iter().find(|e| e.bus == bus)
    }

    pub fn stabilizer(&self, bus: usize) -> Option<&PssData> {
        self.stabilizers.iter().find(|p| p.bus == bus)
    }

    pub fn governor(&self, bus: usize) -> Option<&GovernorData> {
        self.governors.iter().find(|g| g.bus == bus)
    }
}

impl fmt::Display for DynCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} dynamic generators, {} exciters, {} stabilizers, {} governors",
            self.generators.len(),
            self.exciters.len(),
            self.stabilizers.len(),
            self.governors.len(),
        )
    }
}
