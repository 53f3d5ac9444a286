use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::units::MW_TO_W;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusType {
    PQ,
    PV,
    Ref,
    Isolated,
}

impl BusType {
    pub fn from_code(bus: usize, code: usize) -> Result<Self> {
        match code {
            1 => Ok(BusType::PQ),
            2 => Ok(BusType::PV),
            3 => Ok(BusType::Ref),
            4 => Ok(BusType::Isolated),
            _ => Err(Error::InvalidBusType { bus, code }),
        }
    }

    pub fn code(self) -> usize {
        match self {
            BusType::PQ => 1,
            BusType::PV => 2,
            BusType::Ref => 3,
            BusType::Isolated => 4,
        }
    }
}

impl fmt::Display for BusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BusType::PQ => "PQ",
            BusType::PV => "PV",
            BusType::Ref => "REF",
            BusType::Isolated => "ISO",
        };
        write!(f, "{}", s)
    }
}

/// A row of the MATPOWER `bus` matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bus {
    pub bus_i: usize,
    pub bus_type: BusType,

    // Demand (MW, MVAr)
    pub pd: f64,
    pub qd: f64,

    // Shunt (MW demanded, MVAr injected at V = 1.0 p.u.)
    pub gs: f64,
    pub bs: f64,

    pub area: usize,

    // Voltage (p.u., degrees)
    pub vm: f64,
    pub va: f64,

    pub base_kv: f64,
    pub zone: usize,

    // Limits (p.u.)
    pub vmax: f64,
    pub vmin: f64,
}

impl Bus {
    pub fn new(bus_i: usize, bus_type: BusType, base_kv: f64) -> Self {
        Self {
            bus_i,
            bus_type,
            pd: 0.0,
            qd: 0.0,
            gs: 0.0,
            bs: 0.0,
            area: 1,
            vm: 1.0,
            va: 0.0,
            base_kv,
            zone: 1,
            vmax: 1.1,
            vmin: 0.9,
        }
    }
}

impl fmt::Display for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bus {:>4} {:<4} BaseKV={:>8.2}  Pd={:>9.3}  Qd={:>9.3}  Gs={:>8.3}  Bs={:>8.3}  V={:.4}∠{:.3}°",
            self.bus_i,
            self.bus_type,
            self.base_kv,
            self.pd,
            self.qd,
            self.gs,
            self.bs,
            self.vm,
            self.va,
        )
    }
}

/// A row of the MATPOWER `gen` matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generator {
    pub bus: usize,

    // Setpoints
    pub pg: f64,
    pub qg: f64,
    pub qmax: f64,
    pub qmin: f64,
    pub vg: f64,
    pub mbase: f64,
    pub status: bool,

    // Limits
    pub pmax: f64,
    pub pmin: f64,

    // Capability curve
    pub pc1: f64,
    pub pc2: f64,
    pub qc1min: f64,
    pub qc1max: f64,
    pub qc2min: f64,
    pub qc2max: f64,

    // Ramping
    pub ramp_agc: f64,
    pub ramp_10: f64,
    pub ramp_30: f64,
    pub ramp_q: f64,
    pub apf: f64,
}

impl Generator {
    pub fn new(bus: usize, mbase: f64) -> Self {
        Self {
            bus,
            pg: 0.0,
            qg: 0.0,
            qmax: 0.0,
            qmin: 0.0,
            vg: 1.0,
            mbase,
            status: true,
            pmax: 0.0,
            pmin: 0.0,
            pc1: 0.0,
            pc2: 0.0,
            qc1min: 0.0,
            qc1max: 0.0,
            qc2min: 0.0,
            qc2max: 0.0,
            ramp_agc: 0.0,
            ramp_10: 0.0,
            ramp_30: 0.0,
            ramp_q: 0.0,
            apf: 0.0,
        }
    }
}

impl fmt::Display for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Gen Bus {:>4}  P={:>9.3} MW  Q={:>9.3} MVAR  Vset={:.5}  mBase={:>7.1}  {}",
            self.bus,
            self.pg,
            self.qg,
            self.vg,
            self.mbase,
            if self.status { "on" } else { "off" },
        )
    }
}

/// A row of the MATPOWER `branch` matrix. A ratio of zero marks a line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub fbus: usize,
    pub tbus: usize,

    // Impedance data (p.u.)
    pub r: f64,
    pub x: f64,
    pub b: f64,

    // Ratings (MVA)
    pub rate_a: f64,
    pub rate_b: f64,
    pub rate_c: f64,

    // Transformer data
    pub ratio: f64,
    pub angle: f64,

    pub status: bool,
    pub angmin: f64,
    pub angmax: f64,
}

impl Branch {
    pub fn new(fbus: usize, tbus: usize, r: f64, x: f64, b: f64) -> Self {
        Self {
            fbus,
            tbus,
            r,
            x,
            b,
            rate_a: 0.0,
            rate_b: 0.0,
            rate_c: 0.0,
            ratio: 0.0,
            angle: 0.0,
            status: true,
            angmin: -360.0,
            angmax: 360.0,
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Branch {:>4} -> {:<4}  R={:>10.6}  X={:>10.6}  B={:>10.6}  Ratio={:.4}  Shift={:.3}  {}",
            self.fbus,
            self.tbus,
            self.r,
            self.x,
            self.b,
            self.ratio,
            self.angle,
            if self.status { "on" } else { "off" },
        )
    }
}

/// A static MATPOWER case, including the optional `bus_names` and
/// `bus_assets` extension fields keyed by bus number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MpcCase {
    pub base_mva: f64,
    pub buses: Vec<Bus>,
    pub generators: Vec<Generator>,
    pub branches: Vec<Branch>,
    #[serde(default)]
    pub bus_names: HashMap<usize, String>,
    #[serde(default)]
    pub bus_assets: HashMap<usize, Vec<String>>,
}

impl MpcCase {
    pub fn new(base_mva: f64) -> Self {
        Self {
            base_mva,
            buses: Vec::new(),
            generators: Vec::new(),
            branches: Vec::new(),
            bus_names: HashMap::new(),
            bus_assets: HashMap::new(),
        }
    }

    /// System base power in W.
    pub fn base_power(&self) -> f64 {
        self.base_mva * MW_TO_W
    }

    pub fn bus(&self, bus_i: usize) -> Option<&Bus> {
        self.buses.iter().find(|b| b.bus_i == bus_i)
    }

    pub fn generators_at(&self, bus_i: usize) -> impl Iterator<Item = &Generator> {
        self.generators.iter().filter(move |g| g.bus == bus_i)
    }

    pub fn node_name(&self, bus_i: usize) -> String {
        match self.bus_names.get(&bus_i) {
            Some(name) => name.clone(),
            None => format!("N{}", bus_i),
        }
    }

    pub fn assets_at(&self, bus_i: usize) -> &[String] {
        self.bus_assets
            .get(&bus_i)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl fmt::Display for MpcCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sbase: {} MVA", self.base_mva)?;
        writeln!(
            f,
            "{} buses, {} generators, {} branches\n",
            self.buses.len(),
            self.generators.len(),
            self.branches.len(),
        )?;

        writeln!(f, "=== Buses ===")?;
        for bus in &self.buses {
            writeln!(f, "  {:<12} {}", self.node_name(bus.bus_i), bus)?;
        }

        writeln!(f, "\n=== Generators ===")?;
        for generator in &self.generators {
            writeln!(f, "  {}", generator)?;
        }

        writeln!(f, "\n=== Branches ===")?;
        for branch in &self.branches {
            writeln!(f, "  {}", branch)?;
        }

        if !self.bus_assets.is_empty() {
            writeln!(f, "\n=== Bus Assets ===")?;
            let mut buses: Vec<_> = self.bus_assets.keys().copied().collect();
            buses.sort_unstable();
            for bus in buses {
                writeln!(f, "  {:>4}: {}", bus, self.bus_assets[&bus].join(", "))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_type_codes() {
        assert_eq!(BusType::from_code(1, 1).unwrap(), BusType::PQ);
        assert_eq!(BusType::from_code(1, 3).unwrap(), BusType::Ref);
        assert_eq!(BusType::Isolated.code(), 4);
        assert!(matches!(
            BusType::from_code(7, 5),
            Err(Error::InvalidBusType { bus: 7, code: 5 })
        ));
    }

    #[test]
    fn node_names_fall_back_to_bus_number() {
        let mut case = MpcCase::new(100.0);
        case.buses.push(Bus::new(1, BusType::Ref, 230.0));
        case.buses.push(Bus::new(2, BusType::PQ, 230.0));
        case.bus_names.insert(1, "Slack".to_string());

        assert_eq!(case.node_name(1), "Slack");
        assert_eq!(case.node_name(2), "N2");
        assert_eq!(case.base_power(), 100e6);
        assert!(case.assets_at(2).is_empty());
    }

    #[test]
    fn generators_at_filters_by_bus() {
        let mut case = MpcCase::new(100.0);
        case.generators.push(Generator::new(1, 100.0));
        case.generators.push(Generator::new(2, 100.0));
        case.generators.push(Generator::new(1, 50.0));

        let at_one: Vec<f64> = case.generators_at(1).map(|g| g.mbase).collect();
        assert_eq!(at_one, vec![100.0, 50.0]);
    }
}
