use std::collections::HashSet;
use std::path::Path;

use log::{info, warn};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::case::MpcCase;
use crate::config::ReaderConfig;
use crate::dyn_case::DynCase;
use crate::error::{Error, Result};
use crate::mapping::{ObjectBuilder, Objects};
use crate::parse::{read_case, read_dyn_case};
use crate::topology::*;
use crate::units::{KV_TO_V, MW_TO_W};

/// Default closed resistance of a fault switch (Ω).
pub const FAULT_CLOSED_RESISTANCE: f64 = 1e-3;
/// Default open resistance of a fault switch (Ω).
pub const FAULT_OPEN_RESISTANCE: f64 = 1e18;

/// Stored power flow solution of one bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusResult {
    pub bus: String,
    /// Voltage magnitude (p.u.).
    pub vm: f64,
    /// Voltage angle (degrees).
    pub va: f64,
    /// Net injected active power (MW).
    pub p: f64,
    /// Net injected reactive power (MVAr).
    pub q: f64,
}

/// Turns a MATPOWER case, and optionally its dynamic data, into a
/// simulation topology.
#[derive(Debug, Clone)]
pub struct Reader {
    case: MpcCase,
    dyn_case: Option<DynCase>,
    config: ReaderConfig,
    objects: Option<Objects>,
    system: Option<SystemTopology>,
}

impl Reader {
    pub fn from_cases(case: MpcCase, dyn_case: Option<DynCase>) -> Self {
        Self {
            case,
            dyn_case,
            config: ReaderConfig::default(),
            objects: None,
            system: None,
        }
    }

    /// Reads the case (and dynamic data) from `.m` or `.mat` files, using the
    /// struct names from `config`.
    pub fn open(case_path: &Path, dyn_path: Option<&Path>, config: ReaderConfig) -> Result<Self> {
        let case = read_case(case_path, &config.case_name)?;
        info!("Read case {}: {} buses", case_path.display(), case.buses.len());

        let dyn_case = dyn_path
            .map(|path| read_dyn_case(path, &config.dyn_case_name))
            .transpose()?;
        if let Some(dyn_case) = &dyn_case {
            info!("Read dynamic data: {}", dyn_case);
        }

        let mut reader = Self::from_cases(case, dyn_case);
        reader.config = config;
        Ok(reader)
    }

    pub fn case(&self) -> &MpcCase {
        &self.case
    }

    pub fn dyn_case(&self) -> Option<&DynCase> {
        self.dyn_case.as_ref()
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Bus nodes created by the last `create_objects` call.
    pub fn nodes(&self) -> &[Node] {
        self.objects.as_ref().map(|o| o.nodes.as_slice()).unwrap_or(&[])
    }

    /// Components created by the last `create_objects` call.
    pub fn components(&self) -> &[Component] {
        self.objects
            .as_ref()
            .map(|o| o.components.as_slice())
            .unwrap_or(&[])
    }

    pub fn system(&self) -> Option<&SystemTopology> {
        self.system.as_ref()
    }

    /// Creates nodes and components for every bus and branch. Replaces the
    /// objects and topology of earlier calls.
    pub fn create_objects(&mut self, config: &ReaderConfig) -> Result<()> {
        info!(
            "Creating objects for domain {} at {} Hz",
            config.domain, config.frequency
        );
        let objects = ObjectBuilder::new(&self.case, self.dyn_case.as_ref(), config).build()?;

        self.config = config.clone();
        self.objects = Some(objects);
        self.system = None;
        Ok(())
    }

    /// Connects the created components into a topology. Only nodes that some
    /// component references become part of it.
    pub fn create_topology(&mut self) -> Result<&SystemTopology> {
        let objects = self.objects.as_ref().ok_or(Error::NoObjects)?;

        let mut system = SystemTopology::new(self.config.frequency, self.config.domain);
        for component in &objects.components {
            system.add_component(component.clone(), &objects.nodes)?;
        }

        let unused = objects.nodes.len() - system.nodes.len();
        if unused > 0 {
            warn!("{} bus nodes have no connected components", unused);
        }
        info!(
            "Topology created: {} nodes, {} components",
            system.nodes.len(),
            system.components.len()
        );

        Ok(&*self.system.insert(system))
    }

    pub fn load_mpc(&mut self, config: &ReaderConfig) -> Result<&SystemTopology> {
        self.create_objects(config)?;
        self.create_topology()
    }

    /// Initializes node voltages and generator terminal powers from the power
    /// flow solution stored in the case.
    pub fn init_from_pf_results(&mut self) -> Result<()> {
        let system = self.system.as_mut().ok_or(Error::NoObjects)?;

        for bus in &self.case.buses {
            let name = self.case.node_name(bus.bus_i);
            let voltage = Complex64::from_polar(
                bus.base_kv * KV_TO_V * bus.vm,
                bus.va.to_radians(),
            );
            match system.node_mut(&name) {
                Some(node) => node.initial_voltage = Some(voltage),
                None => warn!("Node {} not in topology, skipping initial voltage", name),
            }
        }

        let mut initialized = HashSet::new();
        for generator in self.case.generators.iter().filter(|g| g.status) {
            // only the first in-service generator of a bus is modeled
            if !initialized.insert(generator.bus) {
                continue;
            }
            let name = format!("Gen_N{}", generator.bus);
            let power = -Complex64::new(generator.pg, generator.qg) * MW_TO_W;
            match system
                .component_mut(&name)
                .and_then(|component| component.terminal_mut(0))
            {
                Some(terminal) => terminal.power = Some(power),
                None => warn!("Generator {} not in topology, skipping terminal power", name),
            }
        }

        info!("Initialized topology from power flow results");
        Ok(())
    }

    pub fn pf_results(&self) -> Vec<BusResult> {
        self.case
            .buses
            .iter()
            .map(|bus| {
                let (pg, qg) = self
                    .case
                    .generators_at(bus.bus_i)
                    .next()
                    .map(|g| (g.pg, g.qg))
                    .unwrap_or((0.0, 0.0));
                BusResult {
                    bus: self.case.node_name(bus.bus_i),
                    vm: bus.vm,
                    va: bus.va,
                    p: pg - bus.pd,
                    q: qg - bus.qd,
                }
            })
            .collect()
    }

    /// Adds an open switch between `node` and ground, named `Fault_<node>`.
    /// Returns the switch name.
    pub fn add_three_phase_fault(
        &mut self,
        node: &str,
        closed_resistance: f64,
        open_resistance: f64,
    ) -> Result<String> {
        if self.config.domain == Domain::Pf {
            return Err(Error::FaultInPowerFlow);
        }
        let objects = self.objects.as_mut().ok_or(Error::NoObjects)?;
        if !objects.nodes.iter().any(|n| n.name == node) {
            return Err(Error::NodeNotFound(node.to_string()));
        }

        let name = format!("Fault_{}", node);
        if objects.components.iter().any(|c| c.name == name) {
            return Err(Error::DuplicateComponent(name));
        }

        let mut switch = Component::new(
            name.clone(),
            ComponentKind::Switch {
                open_resistance,
                closed_resistance,
                closed: false,
            },
            self.config.log_level,
        );
        switch.connect(vec![NodeRef::Ground, NodeRef::Node(node.to_string())]);

        if let Some(system) = self.system.as_mut() {
            system.add_component(switch.clone(), &objects.nodes)?;
        }
        objects.components.push(switch);

        info!("Added three-phase fault {}", name);
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{Branch, Bus, BusType, Generator};
    use crate::config::{GeneratorModel, SlackModel};
    use crate::dyn_case::{DynGenerator, ExciterData, GovernorData};
    use crate::units::Param;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * b.abs().max(1.0)
    }

    /// Three 230 kV buses and a 13.8 kV bus behind a transformer.
    fn four_bus_case() -> MpcCase {
        let mut case = MpcCase::new(100.0);

        let mut slack = Bus::new(1, BusType::Ref, 230.0);
        slack.vm = 1.02;
        let mut pv = Bus::new(2, BusType::PV, 230.0);
        pv.pd = 20.0;
        pv.qd = 5.0;
        pv.vm = 1.01;
        pv.va = -2.0;
        let mut pq = Bus::new(3, BusType::PQ, 230.0);
        pq.pd = 50.0;
        pq.qd = 10.0;
        pq.bs = 10.0;
        pq.vm = 0.98;
        pq.va = -5.0;
        let low = Bus::new(4, BusType::PQ, 13.8);
        case.buses = vec![slack, pv, pq, low];

        let mut g1 = Generator::new(1, 100.0);
        g1.pg = 40.0;
        g1.qg = 12.0;
        g1.vg = 1.02;
        let mut g2 = Generator::new(2, 50.0);
        g2.pg = 30.0;
        g2.qg = -3.0;
        g2.vg = 1.01;
        case.generators = vec![g1, g2];

        let mut transformer = Branch::new(3, 4, 0.001, 0.05, 0.0);
        transformer.ratio = 1.0;
        case.branches = vec![
            Branch::new(1, 2, 0.01, 0.1, 0.02),
            Branch::new(2, 3, 0.02, 0.2, 0.04),
            transformer,
        ];
        case
    }

    fn dyn_generator(bus: usize) -> DynGenerator {
        DynGenerator {
            bus,
            model: 6,
            base_s: 100.0,
            h: 6.5,
            d: 0.0,
            xd: 1.8,
            xq: 1.7,
            xd_t: 0.3,
            xq_t: 0.55,
            xd_s: 0.25,
            xq_s: 0.25,
            td0_t: 8.0,
            tq0_t: 0.4,
            td0_s: 0.03,
            tq0_s: 0.05,
            ra: 0.0,
        }
    }

    fn dyn_case() -> DynCase {
        DynCase {
            generators: vec![dyn_generator(1), dyn_generator(2)],
            exciters: vec![ExciterData {
                bus: 1,
                kind: 1,
                ka: 20.0,
                te: 0.5,
                ta: 0.02,
                tb: 1.0,
                u_min: -5.0,
                u_max: 5.0,
                kbc: 0.0,
            }],
            stabilizers: Vec::new(),
            governors: vec![GovernorData {
                bus: 2,
                kind: 1,
                k: 25.0,
                t1: 0.1,
                t2: 0.0,
                t3: 0.3,
                p_up: 0.1,
                p_down: -0.1,
                p_max: 1.0,
                p_min: 0.0,
            }],
        }
    }

    fn config(domain: Domain) -> ReaderConfig {
        ReaderConfig {
            domain,
            ..ReaderConfig::default()
        }
    }

    fn names(reader: &Reader) -> Vec<&str> {
        reader.components().iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn power_flow_objects_in_bus_order() {
        let mut reader = Reader::from_cases(four_bus_case(), None);
        reader.create_objects(&config(Domain::Pf)).unwrap();

        assert_eq!(
            names(&reader),
            vec![
                "Gen_N1",
                "Gen_N2",
                "load1",
                "load2",
                "Shunt_N3",
                "load3",
                "line1_1-2",
                "line2_2-3",
                "transformer1_3-4",
            ]
        );
        assert_eq!(reader.nodes().len(), 4);

        let empty_load = reader.components().iter().find(|c| c.name == "load3").unwrap();
        assert_eq!(empty_load.pf_bus_type, Some(PowerflowBusType::PQ));
        let pv_load = reader.components().iter().find(|c| c.name == "load1").unwrap();
        assert_eq!(pv_load.pf_bus_type, None);
    }

    #[test]
    fn power_flow_generator_in_si_units() {
        let mut reader = Reader::from_cases(four_bus_case(), None);
        let system = reader.load_mpc(&config(Domain::Pf)).unwrap();

        let generator = system.component("Gen_N2").unwrap();
        assert_eq!(generator.pf_bus_type, Some(PowerflowBusType::PV));
        assert_eq!(generator.base_voltage, Some(230e3));
        match &generator.kind {
            ComponentKind::SynchronGenerator(g) => {
                assert_eq!(g.rated_power, 50e6);
                assert_eq!(g.active_power, 30e6);
                assert_eq!(g.reactive_power, -3e6);
                assert!(approx(g.voltage_set_point, 1.01 * 230e3));
            }
            other => panic!("unexpected kind {:?}", other),
        }
        let slack = system.component("Gen_N1").unwrap();
        assert_eq!(slack.pf_bus_type, Some(PowerflowBusType::VD));
    }

    #[test]
    fn line_and_transformer_parameters() {
        let mut reader = Reader::from_cases(four_bus_case(), None);
        let system = reader.load_mpc(&config(Domain::Pf)).unwrap();
        let omega = crate::units::angular_frequency(60.0);
        let z_base = 230e3 * 230e3 / 100e6;

        let line = system.component("line1_1-2").unwrap();
        assert_eq!(line.terminals[0].node, NodeRef::Node("N2".into()));
        assert_eq!(line.terminals[1].node, NodeRef::Node("N1".into()));
        match &line.kind {
            ComponentKind::PiLine(p) => {
                assert!(approx(p.resistance.value(), 0.01 * z_base));
                assert!(approx(p.inductance.value(), 0.1 * z_base / omega));
                assert!(approx(p.capacitance.value(), 0.02 / z_base / omega));
                assert_eq!(p.conductance.value(), 0.0);
            }
            other => panic!("unexpected kind {:?}", other),
        }

        let transformer = system.component("transformer1_3-4").unwrap();
        assert_eq!(transformer.base_voltage, Some(230e3));
        assert_eq!(transformer.terminals[0].node, NodeRef::Node("N3".into()));
        match &transformer.kind {
            ComponentKind::Transformer(t) => {
                let ratio_abs = 230e3 / 13.8e3;
                let z_low = 13.8e3 * 13.8e3 / 100e6;
                assert!(approx(t.ratio_abs, ratio_abs));
                assert_eq!(t.ratio_phase, 0.0);
                assert!(approx(t.resistance.value(), 0.001 * ratio_abs * ratio_abs * z_low));
                assert!(approx(
                    t.inductance.value(),
                    0.05 * ratio_abs * ratio_abs * z_low / omega
                ));
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn out_of_service_branch_is_skipped() {
        let mut case = four_bus_case();
        case.branches[1].status = false;
        let mut reader = Reader::from_cases(case, None);
        reader.create_objects(&config(Domain::Pf)).unwrap();

        assert!(names(&reader).contains(&"line1_1-2"));
        assert!(!names(&reader).iter().any(|n| n.ends_with("2-3")));
        assert!(names(&reader).contains(&"transformer1_3-4"));
    }

    #[test]
    fn dynamic_domain_needs_dynamic_data() {
        let mut reader = Reader::from_cases(four_bus_case(), None);
        assert!(matches!(
            reader.create_objects(&config(Domain::Dp)),
            Err(Error::MissingDynamicData(1))
        ));
    }

    #[test]
    fn dynamic_generators_with_controllers() {
        let mut reader = Reader::from_cases(four_bus_case(), Some(dyn_case()));
        let system = reader.load_mpc(&config(Domain::Dp)).unwrap();

        let slack = system.component("Gen_N1").unwrap();
        match &slack.kind {
            ComponentKind::SynchronGeneratorVbr(g) => {
                assert_eq!(g.order, GeneratorOrder::Fourth);
                assert_eq!(g.parameters.nom_power, 100e6);
                assert_eq!(g.parameters.nom_voltage, 230e3);
                assert_eq!(g.parameters.l0, 0.1);
                assert_eq!(g.parameters.lq_t, Some(0.55));
                assert!(g.parameters.subtransient.is_none());
                assert_eq!(g.exciter.as_ref().unwrap().name, "Exciter_Bus1");
                assert!(g.governor.is_none());
            }
            other => panic!("unexpected kind {:?}", other),
        }
        assert_eq!(slack.pf_bus_type, None);

        match &system.component("Gen_N2").unwrap().kind {
            ComponentKind::SynchronGeneratorVbr(g) => {
                assert_eq!(g.governor.as_ref().unwrap().r, 0.04);
                assert!(g.exciter.is_none());
            }
            other => panic!("unexpected kind {:?}", other),
        }

        // zero demand on bus 4 creates no load outside power flow
        assert!(system.component("load3").is_none());
        assert!(matches!(
            system.component("load2").unwrap().kind,
            ComponentKind::RxLoad(_)
        ));
    }

    #[test]
    fn generator_order_from_data_and_disabled_controllers() {
        let mut config = config(Domain::Sp);
        config.generator_model = GeneratorModel::FromData;
        config.with_avr = false;
        config.with_tg = false;

        let mut reader = Reader::from_cases(four_bus_case(), Some(dyn_case()));
        let system = reader.load_mpc(&config).unwrap();

        match &system.component("Gen_N1").unwrap().kind {
            ComponentKind::SynchronGeneratorVbr(g) => {
                assert_eq!(g.order, GeneratorOrder::SixthB);
                let sub = g.parameters.subtransient.as_ref().unwrap();
                assert_eq!(sub.ld_s, 0.25);
                assert_eq!(sub.taa, 0.0);
                assert!(g.exciter.is_none());
            }
            other => panic!("unexpected kind {:?}", other),
        }
        assert!(matches!(
            system.component("load2").unwrap().kind,
            ComponentKind::Load(_)
        ));
    }

    #[test]
    fn unsupported_model_order() {
        let mut dyn_data = dyn_case();
        dyn_data.generators[0].model = 2;
        let mut config = config(Domain::Dp);
        config.generator_model = GeneratorModel::FromData;

        let mut reader = Reader::from_cases(four_bus_case(), Some(dyn_data));
        assert!(matches!(
            reader.create_objects(&config),
            Err(Error::UnsupportedGeneratorModel(2))
        ));
    }

    #[test]
    fn emt_uses_three_phase_parameters() {
        let mut reader = Reader::from_cases(four_bus_case(), Some(dyn_case()));
        let system = reader.load_mpc(&config(Domain::Emt)).unwrap();

        assert!(system.nodes.iter().all(|n| n.phase_type == PhaseType::Abc));
        match &system.component("load2").unwrap().kind {
            ComponentKind::RxLoad(load) => {
                assert!(matches!(load.active_power, Param::ThreePhase(_)));
                assert!(approx(load.active_power.value(), 50e6 / 3.0));
                assert!(approx(load.reactive_power.value(), 10e6 / 3.0));
            }
            other => panic!("unexpected kind {:?}", other),
        }
        match &system.component("Shunt_Cap_N3").unwrap().kind {
            ComponentKind::Capacitor { capacitance } => {
                let b = 10e6 / (230e3 * 230e3);
                assert!(matches!(capacitance, Param::ThreePhase(_)));
                assert!(approx(capacitance.value(), b / crate::units::angular_frequency(60.0)));
            }
            other => panic!("unexpected kind {:?}", other),
        }
        assert!(system.component("Shunt_Res_N3").is_none());
    }

    #[test]
    fn negative_susceptance_becomes_inductor() {
        let mut case = four_bus_case();
        case.buses[2].bs = -20.0;
        case.buses[2].gs = 5.0;
        let mut reader = Reader::from_cases(case, Some(dyn_case()));
        let system = reader.load_mpc(&config(Domain::Dp)).unwrap();

        let v2 = 230e3 * 230e3;
        match &system.component("Shunt_Res_N3").unwrap().kind {
            ComponentKind::Resistor { resistance } => {
                assert!(approx(resistance.value(), v2 / 5e6));
            }
            other => panic!("unexpected kind {:?}", other),
        }
        match &system.component("Shunt_Ind_N3").unwrap().kind {
            ComponentKind::Inductor { inductance } => {
                let b = -20e6 / v2;
                let omega = crate::units::angular_frequency(60.0);
                assert!(approx(inductance.value(), -1.0 / (omega * b)));
            }
            other => panic!("unexpected kind {:?}", other),
        }
        let shunt = system.component("Shunt_Ind_N3").unwrap();
        assert_eq!(shunt.terminals[1].node, NodeRef::Ground);
    }

    #[test]
    fn slack_as_network_injection() {
        let mut config = config(Domain::Emt);
        config.slack_model = SlackModel::NetworkInjection;
        let mut reader = Reader::from_cases(four_bus_case(), Some(dyn_case()));
        let system = reader.load_mpc(&config).unwrap();

        assert!(system.component("Gen_N1").is_none());
        match &system.component("extnet1").unwrap().kind {
            ComponentKind::NetworkInjection {
                voltage_ref: VoltageRef::ThreePhase(v),
            } => {
                assert!(approx(v[0].re, 1.02 * 230e3));
                assert!(approx(v[1].norm(), 1.02 * 230e3));
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn bus_assets_name_loads() {
        let mut case = four_bus_case();
        case.bus_assets
            .insert(3, vec!["feeder_a".to_string(), "feeder_b".to_string()]);
        case.bus_names.insert(3, "Main".to_string());
        let mut reader = Reader::from_cases(case, None);
        let system = reader.load_mpc(&config(Domain::Pf)).unwrap();

        let first = system.component("feeder_a").unwrap();
        match &first.kind {
            ComponentKind::Load(load) => assert_eq!(load.active_power.value(), 50e6),
            other => panic!("unexpected kind {:?}", other),
        }
        match &system.component("feeder_b").unwrap().kind {
            ComponentKind::Load(load) => {
                assert_eq!(load.active_power.value(), 0.0);
                assert_eq!(load.nominal_voltage, Some(230e3));
            }
            other => panic!("unexpected kind {:?}", other),
        }
        assert!(system.node("Main").is_some());
        assert!(system.component("line2_2-3").unwrap().terminals[0].node == NodeRef::Node("Main".into()));
    }

    #[test]
    fn pv_bus_without_generator() {
        let mut case = four_bus_case();
        case.generators[1].status = false;
        let mut reader = Reader::from_cases(case, None);
        assert!(matches!(
            reader.create_objects(&config(Domain::Pf)),
            Err(Error::MissingGenerator(2))
        ));
    }

    #[test]
    fn branch_to_unknown_bus() {
        let mut case = four_bus_case();
        case.branches.push(Branch::new(1, 9, 0.0, 0.1, 0.0));
        let mut reader = Reader::from_cases(case, None);
        assert!(matches!(
            reader.create_objects(&config(Domain::Pf)),
            Err(Error::UnknownBus(9))
        ));
    }

    #[test]
    fn rejects_non_positive_base_power_and_frequency() {
        let mut case = four_bus_case();
        case.base_mva = 0.0;
        let mut reader = Reader::from_cases(case, None);
        assert!(matches!(
            reader.create_objects(&config(Domain::Pf)),
            Err(Error::InvalidBasePower(_))
        ));

        let mut reader = Reader::from_cases(four_bus_case(), None);
        let mut zero_hz = config(Domain::Pf);
        zero_hz.frequency = 0.0;
        assert!(matches!(
            reader.create_objects(&zero_hz),
            Err(Error::InvalidFrequency(_))
        ));
    }

    #[test]
    fn isolated_bus_gets_no_components() {
        let mut case = four_bus_case();
        let mut isolated = Bus::new(5, BusType::Isolated, 230.0);
        isolated.pd = 10.0;
        case.buses.push(isolated);
        let mut reader = Reader::from_cases(case, None);
        let has_n5 = reader
            .load_mpc(&config(Domain::Pf))
            .unwrap()
            .node("N5")
            .is_some();

        assert!(!has_n5);
        assert_eq!(reader.nodes().len(), 5);
    }

    #[test]
    fn topology_requires_objects() {
        let mut reader = Reader::from_cases(four_bus_case(), None);
        assert!(matches!(reader.create_topology(), Err(Error::NoObjects)));
        assert!(matches!(reader.init_from_pf_results(), Err(Error::NoObjects)));
    }

    #[test]
    fn init_from_power_flow() {
        let mut reader = Reader::from_cases(four_bus_case(), Some(dyn_case()));
        reader.load_mpc(&config(Domain::Dp)).unwrap();
        reader.init_from_pf_results().unwrap();
        let system = reader.system().unwrap();

        let v = system.node("N3").unwrap().initial_voltage.unwrap();
        assert!(approx(v.norm(), 0.98 * 230e3));
        assert!(approx(v.arg(), (-5.0f64).to_radians()));

        let power = system.component("Gen_N2").unwrap().terminals[0].power.unwrap();
        assert!(approx(power.re, -30e6));
        assert!(approx(power.im, 3e6));
    }

    #[test]
    fn power_flow_results_per_bus() {
        let reader = Reader::from_cases(four_bus_case(), None);
        let results = reader.pf_results();

        assert_eq!(results.len(), 4);
        assert_eq!(results[1].bus, "N2");
        assert_eq!(results[1].p, 10.0);
        assert_eq!(results[1].q, -8.0);
        assert_eq!(results[2].p, -50.0);
        assert_eq!(results[2].vm, 0.98);
    }

    #[test]
    fn faults() {
        let mut reader = Reader::from_cases(four_bus_case(), None);
        reader.load_mpc(&config(Domain::Pf)).unwrap();
        assert!(matches!(
            reader.add_three_phase_fault("N3", FAULT_CLOSED_RESISTANCE, FAULT_OPEN_RESISTANCE),
            Err(Error::FaultInPowerFlow)
        ));

        let mut reader = Reader::from_cases(four_bus_case(), Some(dyn_case()));
        reader.load_mpc(&config(Domain::Dp)).unwrap();
        let name = reader
            .add_three_phase_fault("N3", FAULT_CLOSED_RESISTANCE, FAULT_OPEN_RESISTANCE)
            .unwrap();
        assert_eq!(name, "Fault_N3");

        let fault = reader.system().unwrap().component("Fault_N3").unwrap();
        assert_eq!(fault.terminals[0].node, NodeRef::Ground);
        match fault.kind {
            ComponentKind::Switch {
                open_resistance,
                closed_resistance,
                closed,
            } => {
                assert_eq!(open_resistance, 1e18);
                assert_eq!(closed_resistance, 1e-3);
                assert!(!closed);
            }
            ref other => panic!("unexpected kind {:?}", other),
        }

        assert!(matches!(
            reader.add_three_phase_fault("N3", 1e-3, 1e18),
            Err(Error::DuplicateComponent(_))
        ));
        assert!(matches!(
            reader.add_three_phase_fault("N7", 1e-3, 1e18),
            Err(Error::NodeNotFound(_))
        ));
    }

    #[test]
    fn fault_before_topology_is_kept() {
        let mut reader = Reader::from_cases(four_bus_case(), Some(dyn_case()));
        reader.create_objects(&config(Domain::Sp)).unwrap();
        reader.add_three_phase_fault("N4", 1e-3, 1e18).unwrap();
        let system = reader.create_topology().unwrap();

        assert!(system.component("Fault_N4").is_some());
        assert!(system.node("N4").is_some());
    }
}
