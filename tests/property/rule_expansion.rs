// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Security Rule Compilation

use cim_landing_zone::domain::{Cidr, SecurityGroupConfig};
use cim_landing_zone::output_bus::OutputBus;
use cim_landing_zone::topology::report::NetworkReport;
use cim_landing_zone::topology::security_group::{compile, IpProtocol, RulePeer, RuleScope};
use proptest::prelude::*;
use serde_json::json;

fn ipv4_block() -> impl Strategy<Value = String> {
    (1u8..=223, 0u8..=255, prop_oneof![Just(8u8), Just(16), Just(24)]).prop_map(|(a, b, prefix)| {
        match prefix {
            8 => format!("{}.0.0.0/8", a),
            16 => format!("{}.{}.0.0/16", a, b),
            _ => format!("{}.{}.7.0/24", a, b),
        }
    })
}

fn compile_rule(ports: &[u16], sources: &[String]) -> (Vec<cim_landing_zone::topology::security_group::RuleEntry>, usize) {
    let configs: Vec<SecurityGroupConfig> = serde_json::from_value(json!([{
        "name": "App",
        "inbound-rules": [{
            "description": "generated",
            "tcp-ports": ports,
            "source": sources
        }]
    }]))
    .unwrap();
    let bus = OutputBus::new();
    let scope = RuleScope {
        account_key: "dev",
        region: "ca-central-1",
        vpc_name: "Dev",
        description_account: "dev",
        resolved: &[],
        bus: &bus,
    };
    let mut report = NetworkReport::new("dev", "ca-central-1", "Dev");
    let compiled = compile(&configs, &scope, &mut report);
    (compiled.entries, report.warnings.len())
}

proptest! {
    /// One entry per (port, source) pair, port-major, sources in declaration order
    #[test]
    fn prop_tcp_ports_expand_per_source(
        ports in prop::collection::vec(1u16..=65535, 1..6),
        sources in prop::collection::vec(ipv4_block(), 1..5),
    ) {
        let (entries, warnings) = compile_rule(&ports, &sources);
        prop_assert_eq!(warnings, 0);
        prop_assert_eq!(entries.len(), ports.len() * sources.len());

        for (i, entry) in entries.iter().enumerate() {
            let port = ports[i / sources.len()];
            let source: Cidr = sources[i % sources.len()].parse().unwrap();
            prop_assert_eq!(&entry.protocol, &IpProtocol::Tcp);
            prop_assert_eq!(entry.from_port, Some(port));
            prop_assert_eq!(entry.to_port, Some(port));
            prop_assert_eq!(&entry.peer, &RulePeer::Cidr(source));
            prop_assert_eq!(entry.logical_id.clone(), format!("App-Ingress-0-{}", i));
        }
    }

    /// Compiling the same rule twice gives the same entries
    #[test]
    fn prop_compilation_is_deterministic(
        ports in prop::collection::vec(1u16..=65535, 1..4),
        sources in prop::collection::vec(ipv4_block(), 1..4),
    ) {
        prop_assert_eq!(compile_rule(&ports, &sources), compile_rule(&ports, &sources));
    }
}
