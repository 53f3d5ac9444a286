use crate::reader::BusResult;
use crate::topology::SystemTopology;

pub fn topology_to_json(system: &SystemTopology) -> serde_json::Result<String> {
    serde_json::to_string_pretty(system)
}

/// Plain text summary: header, node list and component list.
pub fn topology_summary(system: &SystemTopology) -> String {
    let mut out = String::new();
    out.push_str("# Simulation topology exported by powertopo\n");
    out.push_str(&system.to_string());
    out
}

/// Fixed-width table of the stored power flow solution.
pub fn pf_results_to_table(results: &[BusResult]) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{:<16} {:>10} {:>10} {:>12} {:>12}\n",
        "Bus", "V (pu)", "Va (deg)", "P (MW)", "Q (MVAr)"
    ));
    out.push_str(&format!("{}\n", "-".repeat(64)));

    for result in results {
        out.push_str(&format!(
            "{:<16} {:>10.4} {:>10.4} {:>12.3} {:>12.3}\n",
            result.bus, result.vm, result.va, result.p, result.q,
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{Component, ComponentKind, Domain, LogLevel, Node, NodeRef, PhaseType};
    use crate::units::Param;

    #[test]
    fn results_table_rows() {
        let results = vec![
            BusResult {
                bus: "N1".to_string(),
                vm: 1.04,
                va: 0.0,
                p: 71.641,
                q: 27.046,
            },
            BusResult {
                bus: "N5".to_string(),
                vm: 0.9956,
                va: -3.9888,
                p: -125.0,
                q: -50.0,
            },
        ];
        let table = pf_results_to_table(&results);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Bus"));
        assert!(lines[2].starts_with("N1"));
        assert!(lines[2].contains("1.0400"));
        assert!(lines[3].contains("-3.9888"));
        assert!(lines[3].contains("-125.000"));
    }

    #[test]
    fn topology_json_and_summary() {
        let known = vec![Node::new("N1".to_string(), PhaseType::Single)];
        let mut resistor = Component::new(
            "R1".to_string(),
            ComponentKind::Resistor {
                resistance: Param::Scalar(10.0),
            },
            LogLevel::Info,
        );
        resistor.connect(vec![NodeRef::Node("N1".to_string()), NodeRef::Ground]);
        let mut system = SystemTopology::new(50.0, Domain::Dp);
        system.add_component(resistor, &known).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&topology_to_json(&system).unwrap()).unwrap();
        assert_eq!(json["domain"], "dp");
        assert_eq!(json["nodes"][0]["name"], "N1");
        assert_eq!(json["components"][0]["kind"]["type"], "Resistor");

        let summary = topology_summary(&system);
        assert!(summary.contains("Domain: dp"));
        assert!(summary.contains("R1"));
    }
}
