//! Per-unit case records to simulation components.

use std::collections::HashSet;

use log::{debug, info};
use num_complex::Complex64;

use crate::case::*;
use crate::config::{GeneratorModel, ReaderConfig, SlackModel};
use crate::controllers::{ExciterStatic, Pss1a, SteamTurbineGovernor};
use crate::dyn_case::{DynCase, DynGenerator};
use crate::error::{Error, Result};
use crate::topology::*;
use crate::units::{KV_TO_V, MW_TO_W, Param, three_phase_parameter, three_phase_variable};

/// Leakage inductance (p.u.) given to every dynamic machine.
const LEAKAGE_INDUCTANCE: f64 = 0.1;

/// Nodes for every bus plus the components created from the case.
#[derive(Debug, Clone, Default)]
pub(crate) struct Objects {
    pub nodes: Vec<Node>,
    pub components: Vec<Component>,
}

pub(crate) struct ObjectBuilder<'a> {
    case: &'a MpcCase,
    dyn_case: Option<&'a DynCase>,
    config: &'a ReaderConfig,
    omega: f64,
    objects: Objects,
    names: HashSet<String>,
    load_count: usize,
    injection_count: usize,
    line_count: usize,
    transformer_count: usize,
}

fn base_voltage(bus: &Bus) -> Result<f64> {
    if bus.base_kv > 0.0 && bus.base_kv.is_finite() {
        Ok(bus.base_kv * KV_TO_V)
    } else {
        Err(Error::InvalidBaseVoltage(bus.bus_i))
    }
}

impl<'a> ObjectBuilder<'a> {
    pub fn new(case: &'a MpcCase, dyn_case: Option<&'a DynCase>, config: &'a ReaderConfig) -> Self {
        Self {
            case,
            dyn_case,
            config,
            omega: config.angular_frequency(),
            objects: Objects::default(),
            names: HashSet::new(),
            load_count: 0,
            injection_count: 0,
            line_count: 0,
            transformer_count: 0,
        }
    }

    fn domain(&self) -> Domain {
        self.config.domain
    }

    fn node_ref(&self, bus_i: usize) -> NodeRef {
        NodeRef::Node(self.case.node_name(bus_i))
    }

    fn param(&self, value: f64) -> Param {
        Param::for_domain(self.domain(), value)
    }

    fn push(&mut self, component: Component) -> Result<()> {
        if !self.names.insert(component.name.clone()) {
            return Err(Error::DuplicateComponent(component.name));
        }
        debug!("Created {}", component);
        self.objects.components.push(component);
        Ok(())
    }

    pub fn build(mut self) -> Result<Objects> {
        let case = self.case;
        self.config.validate()?;
        if !(case.base_mva > 0.0 && case.base_mva.is_finite()) {
            return Err(Error::InvalidBasePower(case.base_mva));
        }

        for bus in &case.buses {
            self.objects
                .nodes
                .push(Node::new(case.node_name(bus.bus_i), self.domain().phase_type()));

            match bus.bus_type {
                BusType::PQ => {
                    match case.assets_at(bus.bus_i).split_first() {
                        None => self.map_energy_consumer(bus, None, PowerflowBusType::PQ)?,
                        Some((first, rest)) => {
                            // the first asset carries the whole bus demand
                            self.map_energy_consumer(bus, Some(first.clone()), PowerflowBusType::PQ)?;
                            for asset in rest {
                                self.map_empty_load(bus, asset)?;
                            }
                        }
                    }
                    self.map_shunt(bus)?;
                }
                BusType::PV => {
                    self.map_synchronous_machine(bus, PowerflowBusType::PV)?;
                    self.map_energy_consumer(bus, None, PowerflowBusType::PV)?;
                    self.map_shunt(bus)?;
                }
                BusType::Ref => {
                    match self.config.slack_model {
                        SlackModel::SynchronousGenerator => {
                            self.map_synchronous_machine(bus, PowerflowBusType::VD)?
                        }
                        SlackModel::NetworkInjection => self.map_network_injection(bus)?,
                    }
                    self.map_energy_consumer(bus, None, PowerflowBusType::VD)?;
                    self.map_shunt(bus)?;
                }
                BusType::Isolated => {
                    info!("Bus {} is isolated, no components created", bus.bus_i);
                }
            }
        }

        for branch in &case.branches {
            if !branch.status {
                debug!(
                    "Skipping out-of-service branch {} -> {}",
                    branch.fbus, branch.tbus
                );
                continue;
            }
            self.map_branch(branch)?;
        }

        info!(
            "Created {} nodes and {} components for domain {}",
            self.objects.nodes.len(),
            self.objects.components.len(),
            self.domain(),
        );
        Ok(self.objects)
    }

    fn in_service_generator(&self, bus: &Bus) -> Result<&'a Generator> {
        let case = self.case;
        let mut generators = case.generators_at(bus.bus_i).filter(|g| g.status);
        let generator = generators.next().ok_or(Error::MissingGenerator(bus.bus_i))?;
        if generators.next().is_some() {
            debug!(
                "Bus {} has several generators, using the first in service",
                bus.bus_i
            );
        }
        Ok(generator)
    }

    fn map_synchronous_machine(&mut self, bus: &Bus, bus_type: PowerflowBusType) -> Result<()> {
        let name = format!("Gen_N{}", bus.bus_i);
        let generator = self.in_service_generator(bus)?;
        let base_v = base_voltage(bus)?;

        let mut component = if self.domain() == Domain::Pf {
            let kind = ComponentKind::SynchronGenerator(PowerFlowGenerator {
                rated_power: generator.mbase * MW_TO_W,
                rated_voltage: base_v,
                active_power: generator.pg * MW_TO_W,
                voltage_set_point: generator.vg * base_v,
                bus_type,
                reactive_power: generator.qg * MW_TO_W,
            });
            let mut component = Component::new(name, kind, self.config.log_level);
            component.base_voltage = Some(base_v);
            component.pf_bus_type = Some(bus_type);
            component
        } else {
            let kind = ComponentKind::SynchronGeneratorVbr(Box::new(self.dynamic_generator(bus, base_v)?));
            Component::new(name, kind, self.config.log_level)
        };

        component.connect(vec![self.node_ref(bus.bus_i)]);
        self.push(component)
    }

    fn dynamic_generator(&self, bus: &Bus, base_v: f64) -> Result<DynamicGenerator> {
        let dyn_case = self
            .dyn_case
            .ok_or(Error::MissingDynamicData(bus.bus_i))?;
        let data = dyn_case
            .generator(bus.bus_i)
            .ok_or(Error::MissingDynamicData(bus.bus_i))?;

        let order = match self.config.generator_model {
            GeneratorModel::FromData => GeneratorOrder::from_model(data.model)?,
            GeneratorModel::Order3 => GeneratorOrder::Third,
            GeneratorModel::Order4 => GeneratorOrder::Fourth,
            GeneratorModel::Order5 => GeneratorOrder::Fifth,
            GeneratorModel::Order6 => GeneratorOrder::SixthB,
        };

        let exciter = match dyn_case.exciter(bus.bus_i) {
            Some(data) if self.config.with_avr => Some(ExciterStatic::from_data(data)),
            _ => None,
        };
        let pss = match dyn_case.stabilizer(bus.bus_i) {
            Some(data) if self.config.with_pss => Some(Pss1a::from_data(data)),
            _ => None,
        };
        let governor = match dyn_case.governor(bus.bus_i) {
            Some(data) if self.config.with_tg => Some(SteamTurbineGovernor::from_data(data)?),
            _ => None,
        };

        Ok(DynamicGenerator {
            order,
            parameters: operational_parameters(order, data, base_v, self.config.frequency),
            exciter,
            pss,
            governor,
        })
    }

    fn map_energy_consumer(
        &mut self,
        bus: &Bus,
        load_name: Option<String>,
        bus_type: PowerflowBusType,
    ) -> Result<()> {
        let p = bus.pd * MW_TO_W;
        let q = bus.qd * MW_TO_W;

        // power flow keeps zero loads on PQ buses so every PQ bus has a load
        let keep_empty = bus_type == PowerflowBusType::PQ && self.domain() == Domain::Pf;
        if !keep_empty && p == 0.0 && q == 0.0 {
            return Ok(());
        }

        let name = match load_name {
            Some(name) => name,
            None => {
                self.load_count += 1;
                format!("load{}", self.load_count)
            }
        };

        let (active_power, reactive_power) = match self.domain() {
            Domain::Emt => (
                Param::ThreePhase(three_phase_parameter(p / 3.0)),
                Param::ThreePhase(three_phase_parameter(q / 3.0)),
            ),
            _ => (Param::Scalar(p), Param::Scalar(q)),
        };
        let parameters = LoadParameters {
            active_power,
            reactive_power,
            nominal_voltage: None,
        };

        let mut component = Component::new(name, self.load_kind(parameters), self.config.log_level);
        if keep_empty {
            component.pf_bus_type = Some(PowerflowBusType::PQ);
        }
        component.connect(vec![self.node_ref(bus.bus_i)]);
        self.push(component)
    }

    /// Additional named loads on a bus start out without demand.
    fn map_empty_load(&mut self, bus: &Bus, name: &str) -> Result<()> {
        let parameters = LoadParameters {
            active_power: self.param(0.0),
            reactive_power: self.param(0.0),
            nominal_voltage: Some(base_voltage(bus)?),
        };
        let mut component = Component::new(
            name.to_string(),
            self.load_kind(parameters),
            self.config.log_level,
        );
        component.connect(vec![self.node_ref(bus.bus_i)]);
        self.push(component)
    }

    fn load_kind(&self, parameters: LoadParameters) -> ComponentKind {
        match self.domain() {
            Domain::Pf | Domain::Sp => ComponentKind::Load(parameters),
            Domain::Dp | Domain::Emt => ComponentKind::RxLoad(parameters),
        }
    }

    fn map_shunt(&mut self, bus: &Bus) -> Result<()> {
        if bus.gs == 0.0 && bus.bs == 0.0 {
            return Ok(());
        }

        // Gs is the MW demanded and Bs the MVAr injected at V = 1.0 p.u.
        let base_v = base_voltage(bus)?;
        let g = bus.gs * MW_TO_W / (base_v * base_v);
        let b = bus.bs * MW_TO_W / (base_v * base_v);
        let node = self.node_ref(bus.bus_i);

        if self.domain() == Domain::Pf {
            let mut shunt = Component::new(
                format!("Shunt_N{}", bus.bus_i),
                ComponentKind::Shunt {
                    conductance: g,
                    susceptance: b,
                },
                self.config.log_level,
            );
            shunt.base_voltage = Some(base_v);
            shunt.connect(vec![node]);
            return self.push(shunt);
        }

        if g != 0.0 {
            let mut resistor = Component::new(
                format!("Shunt_Res_N{}", bus.bus_i),
                ComponentKind::Resistor {
                    resistance: self.param(1.0 / g),
                },
                self.config.log_level,
            );
            resistor.connect(vec![node.clone(), NodeRef::Ground]);
            self.push(resistor)?;
        }

        let reactive = if b > 0.0 {
            Some((
                format!("Shunt_Cap_N{}", bus.bus_i),
                ComponentKind::Capacitor {
                    capacitance: self.param(b / self.omega),
                },
            ))
        } else if b < 0.0 {
            Some((
                format!("Shunt_Ind_N{}", bus.bus_i),
                ComponentKind::Inductor {
                    inductance: self.param(-1.0 / (self.omega * b)),
                },
            ))
        } else {
            None
        };

        if let Some((name, kind)) = reactive {
            let mut component = Component::new(name, kind, self.config.log_level);
            component.connect(vec![node, NodeRef::Ground]);
            self.push(component)?;
        }
        Ok(())
    }

    fn map_network_injection(&mut self, bus: &Bus) -> Result<()> {
        self.injection_count += 1;
        let name = format!("extnet{}", self.injection_count);

        let generator = self.in_service_generator(bus)?;
        let base_v = base_voltage(bus)?;
        let v = generator.vg * base_v;

        let voltage_ref = match self.domain() {
            Domain::Emt => VoltageRef::ThreePhase(three_phase_variable(Complex64::new(v, 0.0))),
            _ => VoltageRef::Scalar(v),
        };

        let mut component = Component::new(
            name,
            ComponentKind::NetworkInjection { voltage_ref },
            self.config.log_level,
        );
        if self.domain() == Domain::Pf {
            component.base_voltage = Some(base_v);
            component.pf_bus_type = Some(PowerflowBusType::VD);
        }
        component.connect(vec![self.node_ref(bus.bus_i)]);
        self.push(component)
    }

    fn map_branch(&mut self, branch: &Branch) -> Result<()> {
        let case = self.case;
        let from = case.bus(branch.fbus).ok_or(Error::UnknownBus(branch.fbus))?;
        let to = case.bus(branch.tbus).ok_or(Error::UnknownBus(branch.tbus))?;
        let from_v = base_voltage(from)?;
        let to_v = base_voltage(to)?;

        // a zero ratio marks a line, unless the ends sit at different voltage
        // levels, in which case it is a transformer with nominal ratio
        if branch.ratio == 0.0 && from_v == to_v {
            self.map_line(branch, to_v)
        } else {
            self.map_transformer(branch, from_v, to_v)
        }
    }

    fn map_line(&mut self, branch: &Branch, base_v: f64) -> Result<()> {
        self.line_count += 1;
        let name = format!("line{}_{}-{}", self.line_count, branch.fbus, branch.tbus);

        let z_base = base_v * base_v / self.case.base_power();
        let resistance = branch.r * z_base;
        let reactance = branch.x * z_base;
        let susceptance = branch.b / z_base;

        let parameters = PiLineParameters {
            resistance: self.param(resistance),
            inductance: self.param(reactance / self.omega),
            capacitance: self.param(susceptance / self.omega),
            // MATPOWER has no line conductance
            conductance: self.param(0.0),
        };

        let mut component = Component::new(
            name,
            ComponentKind::PiLine(parameters),
            self.config.log_level,
        );
        if self.domain() == Domain::Pf {
            component.base_voltage = Some(base_v);
        }
        component.connect(vec![self.node_ref(branch.tbus), self.node_ref(branch.fbus)]);
        self.push(component)
    }

    /// The tap sits at the from bus and the impedance is given on the to-bus
    /// base. Impedances end up referred to the high voltage side.
    fn map_transformer(&mut self, branch: &Branch, from_v: f64, to_v: f64) -> Result<()> {
        self.transformer_count += 1;
        let name = format!(
            "transformer{}_{}-{}",
            self.transformer_count, branch.fbus, branch.tbus
        );

        let ratio = if branch.ratio == 0.0 { 1.0 } else { branch.ratio };
        let z_base = to_v * to_v / self.case.base_power();
        let ratio_abs = ratio * from_v / to_v;

        let (base_v, resistance, reactance) = if from_v > to_v {
            let scale = ratio_abs * ratio_abs * z_base;
            (from_v, branch.r * scale, branch.x * scale)
        } else if self.domain() == Domain::Pf {
            let scale = ratio * ratio * z_base;
            (to_v, branch.r * scale, branch.x * scale)
        } else {
            (to_v, branch.r * z_base, branch.x * z_base)
        };

        let complex_ratio = Complex64::from_polar(ratio_abs, branch.angle.to_radians());
        let parameters = TransformerParameters {
            nominal_voltage_end1: from_v,
            nominal_voltage_end2: to_v,
            ratio_abs: complex_ratio.norm(),
            ratio_phase: complex_ratio.arg(),
            resistance: self.param(resistance),
            inductance: self.param(reactance / self.omega),
        };

        let mut component = Component::new(
            name,
            ComponentKind::Transformer(parameters),
            self.config.log_level,
        );
        if self.domain() == Domain::Pf {
            component.base_voltage = Some(base_v);
        }
        component.connect(vec![self.node_ref(branch.fbus), self.node_ref(branch.tbus)]);
        self.push(component)
    }
}

fn operational_parameters(
    order: GeneratorOrder,
    data: &DynGenerator,
    base_v: f64,
    frequency: f64,
) -> OperationalParameters {
    let with_q_transient = order != GeneratorOrder::Third;
    let subtransient = match order {
        GeneratorOrder::Fifth | GeneratorOrder::SixthB => Some(SubtransientParameters {
            ld_s: data.xd_s,
            lq_s: data.xq_s,
            td0_s: data.td0_s,
            tq0_s: data.tq0_s,
            taa: 0.0,
        }),
        _ => None,
    };

    OperationalParameters {
        nom_power: data.base_s * MW_TO_W,
        nom_voltage: base_v,
        nom_frequency: frequency,
        h: data.h,
        ld: data.xd,
        lq: data.xq,
        l0: LEAKAGE_INDUCTANCE,
        ld_t: data.xd_t,
        td0_t: data.td0_t,
        lq_t: with_q_transient.then_some(data.xq_t),
        tq0_t: with_q_transient.then_some(data.tq0_t),
        subtransient,
    }
}
