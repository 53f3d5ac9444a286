use std::fmt;
use std::str::FromStr;

use nalgebra::Vector3;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::controllers::{ExciterStatic, Pss1a, SteamTurbineGovernor};
use crate::error::{Error, Result};
use crate::units::Param;

/// Modeling domain the topology is parameterized for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Power flow on static phasors.
    #[default]
    Pf,
    /// Static phasor.
    Sp,
    /// Dynamic phasor.
    Dp,
    /// Three-phase electromagnetic transient.
    Emt,
}

impl Domain {
    pub fn phase_type(self) -> PhaseType {
        match self {
            Domain::Emt => PhaseType::Abc,
            _ => PhaseType::Single,
        }
    }
}

impl FromStr for Domain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pf" => Ok(Domain::Pf),
            "sp" => Ok(Domain::Sp),
            "dp" => Ok(Domain::Dp),
            "emt" => Ok(Domain::Emt),
            _ => Err(Error::UnknownDomain(s.to_string())),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Domain::Pf => "pf",
            Domain::Sp => "sp",
            Domain::Dp => "dp",
            Domain::Emt => "emt",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseType {
    Single,
    Abc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerflowBusType {
    PQ,
    PV,
    VD,
    None,
}

/// Verbosity handed to the simulation objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Off => log::LevelFilter::Off,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub phase_type: PhaseType,
    /// Initial voltage in V.
    pub initial_voltage: Option<Complex64>,
}

impl Node {
    pub fn new(name: String, phase_type: PhaseType) -> Self {
        Self {
            name,
            phase_type,
            initial_voltage: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRef {
    Ground,
    Node(String),
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Ground => write!(f, "gnd"),
            NodeRef::Node(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Terminal {
    pub node: NodeRef,
    /// Power flowing into the terminal (VA).
    pub power: Option<Complex64>,
}

/// Power flow generator: rated values and set points in SI units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerFlowGenerator {
    pub rated_power: f64,
    pub rated_voltage: f64,
    pub active_power: f64,
    pub voltage_set_point: f64,
    pub bus_type: PowerflowBusType,
    pub reactive_power: f64,
}

/// Order of the voltage-behind-reactance machine model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeneratorOrder {
    Third,
    Fourth,
    Fifth,
    SixthB,
}

impl GeneratorOrder {
    pub fn from_model(model: i64) -> Result<Self> {
        match model {
            3 => Ok(GeneratorOrder::Third),
            4 => Ok(GeneratorOrder::Fourth),
            5 => Ok(GeneratorOrder::Fifth),
            6 => Ok(GeneratorOrder::SixthB),
            _ => Err(Error::UnsupportedGeneratorModel(model)),
        }
    }
}

/// Subtransient data used by the fifth and sixth order models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtransientParameters {
    pub ld_s: f64,
    pub lq_s: f64,
    pub td0_s: f64,
    pub tq0_s: f64,
    pub taa: f64,
}

/// Operational machine parameters, reactances in p.u. of the machine base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationalParameters {
    pub nom_power: f64,
    pub nom_voltage: f64,
    pub nom_frequency: f64,
    pub h: f64,
    pub ld: f64,
    pub lq: f64,
    pub l0: f64,
    pub ld_t: f64,
    pub td0_t: f64,
    pub lq_t: Option<f64>,
    pub tq0_t: Option<f64>,
    pub subtransient: Option<SubtransientParameters>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicGenerator {
    pub order: GeneratorOrder,
    pub parameters: OperationalParameters,
    pub exciter: Option<ExciterStatic>,
    pub pss: Option<Pss1a>,
    pub governor: Option<SteamTurbineGovernor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadParameters {
    pub active_power: Param,
    pub reactive_power: Param,
    pub nominal_voltage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiLineParameters {
    pub resistance: Param,
    pub inductance: Param,
    pub capacitance: Param,
    pub conductance: Param,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerParameters {
    pub nominal_voltage_end1: f64,
    pub nominal_voltage_end2: f64,
    pub ratio_abs: f64,
    /// Ratio phase in radians.
    pub ratio_phase: f64,
    pub resistance: Param,
    pub inductance: Param,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoltageRef {
    Scalar(f64),
    ThreePhase(Vector3<Complex64>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ComponentKind {
    SynchronGenerator(PowerFlowGenerator),
    SynchronGeneratorVbr(Box<DynamicGenerator>),
    Load(LoadParameters),
    RxLoad(LoadParameters),
    PiLine(PiLineParameters),
    Transformer(TransformerParameters),
    Shunt { conductance: f64, susceptance: f64 },
    Resistor { resistance: Param },
    Capacitor { capacitance: Param },
    Inductor { inductance: Param },
    NetworkInjection { voltage_ref: VoltageRef },
    Switch {
        open_resistance: f64,
        closed_resistance: f64,
        closed: bool,
    },
}

impl ComponentKind {
    pub fn label(&self) -> &'static str {
        match self {
            ComponentKind::SynchronGenerator(_) => "SynchronGenerator",
            ComponentKind::SynchronGeneratorVbr(_) => "SynchronGeneratorVBR",
            ComponentKind::Load(_) => "Load",
            ComponentKind::RxLoad(_) => "RXLoad",
            ComponentKind::PiLine(_) => "PiLine",
            ComponentKind::Transformer(_) => "Transformer",
            ComponentKind::Shunt { .. } => "Shunt",
            ComponentKind::Resistor { .. } => "Resistor",
            ComponentKind::Capacitor { .. } => "Capacitor",
            ComponentKind::Inductor { .. } => "Inductor",
            ComponentKind::NetworkInjection { .. } => "NetworkInjection",
            ComponentKind::Switch { .. } => "Switch",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub kind: ComponentKind,
    pub terminals: Vec<Terminal>,
    /// Base voltage for the power flow per-unit system (V).
    pub base_voltage: Option<f64>,
    pub pf_bus_type: Option<PowerflowBusType>,
    pub log_level: LogLevel,
}

impl Component {
    pub fn new(name: String, kind: ComponentKind, log_level: LogLevel) -> Self {
        Self {
            name,
            kind,
            terminals: Vec::new(),
            base_voltage: None,
            pf_bus_type: None,
            log_level,
        }
    }

    pub fn connect(&mut self, nodes: Vec<NodeRef>) {
        self.terminals = nodes
            .into_iter()
            .map(|node| Terminal { node, power: None })
            .collect();
    }

    pub fn terminal_mut(&mut self, index: usize) -> Option<&mut Terminal> {
        self.terminals.get_mut(index)
    }

    /// Names of the non-ground nodes this component connects to.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.terminals.iter().filter_map(|t| match &t.node {
            NodeRef::Node(name) => Some(name.as_str()),
            NodeRef::Ground => None,
        })
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes: Vec<String> = self.terminals.iter().map(|t| t.node.to_string()).collect();
        write!(
            f,
            "{:<20} {:<24} [{}]",
            self.kind.label(),
            self.name,
            nodes.join(", ")
        )?;
        if let Some(v) = self.base_voltage {
            write!(f, "  Vbase={:.1} V", v)?;
        }
        if let Some(bus_type) = self.pf_bus_type {
            write!(f, "  {:?}", bus_type)?;
        }
        Ok(())
    }
}

/// Nodes and connected components of a network, ready for simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemTopology {
    pub frequency: f64,
    pub domain: Domain,
    pub nodes: Vec<Node>,
    pub components: Vec<Component>,
}

impl SystemTopology {
    pub fn new(frequency: f64, domain: Domain) -> Self {
        Self {
            frequency,
            domain,
            nodes: Vec::new(),
            components: Vec::new(),
        }
    }

    /// Adds a connected component. Nodes it references that are not yet part
    /// of the topology are taken from `known_nodes`.
    pub fn add_component(&mut self, component: Component, known_nodes: &[Node]) -> Result<()> {
        if self.component(&component.name).is_some() {
            return Err(Error::DuplicateComponent(component.name));
        }
        for name in component.node_names() {
            if self.node(name).is_some() {
                continue;
            }
            let node = known_nodes
                .iter()
                .find(|n| n.name == name)
                .ok_or_else(|| Error::NodeNotFound(name.to_string()))?;
            self.nodes.push(node.clone());
        }
        self.components.push(component);
        Ok(())
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.name == name)
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn component_mut(&mut self, name: &str) -> Option<&mut Component> {
        self.components.iter_mut().find(|c| c.name == name)
    }
}

impl fmt::Display for SystemTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Domain: {}  Frequency: {} Hz  {} nodes, {} components\n",
            self.domain,
            self.frequency,
            self.nodes.len(),
            self.components.len(),
        )?;

        writeln!(f, "=== Nodes ===")?;
        for node in &self.nodes {
            match node.initial_voltage {
                Some(v) => writeln!(
                    f,
                    "  {:<16} {:?}  V0={:.2}∠{:.3}°",
                    node.name,
                    node.phase_type,
                    v.norm(),
                    v.arg().to_degrees()
                )?,
                None => writeln!(f, "  {:<16} {:?}", node.name, node.phase_type)?,
            }
        }

        writeln!(f, "\n=== Components ===")?;
        for component in &self.components {
            writeln!(f, "  {}", component)?;
        }

        Ok(())
    }
}
