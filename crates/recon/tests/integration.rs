use std::collections::BTreeSet;

use sibas_recon::config::ReconConfig;
use sibas_recon::engine::{reconcile, run, ReconContext};
use sibas_recon::model::{AuxTable, Diagnostic, ReconInput, SignalKind, SourcePartition};
use sibas_recon::output::{final_partition, shape_groups};

const THREE_SOURCES: &str = r#"
name = "Scenario"
precedence = ["pdb", "rir", "v6"]

[sources.pdb]
kind = "peeringdb"
net = "net.json"
org = "org.json"

[sources.rir]
kind = "rir_delegated"
locations = ["delegated.txt"]

[sources.v6]
kind = "ipv6_launch"
location = "asns.txt"
"#;

fn config() -> ReconConfig {
    ReconConfig::from_toml(THREE_SOURCES).unwrap()
}

// -------------------------------------------------------------------------
// Scenarios
// -------------------------------------------------------------------------

#[test]
fn chain_across_three_sources() {
    let input = ReconInput::from_partitions([
        SourcePartition::new("pdb").with_group("orgA", [100, 200]),
        SourcePartition::new("rir").with_group("batch9", [200, 300]),
        SourcePartition::new("v6").with_group("g1", [300, 400, 500]),
    ]);

    let result = run(&config(), input);

    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].asns, vec![100, 200, 300, 400, 500]);
    assert_eq!(result.groups[0].representative, 100);
    assert_eq!(result.groups[0].sources, vec!["pdb", "rir", "v6"]);
    assert_eq!(result.summary.cross_links, 2);
    assert!(result.diagnostics.is_empty());
    assert_eq!(result.meta.precedence, vec!["pdb", "rir", "v6"]);
}

#[test]
fn input_order_does_not_matter_precedence_does() {
    // Partitions handed over in reverse; config precedence still applies.
    let input = ReconInput::from_partitions([
        SourcePartition::new("v6").with_group("g1", [300, 400, 500]),
        SourcePartition::new("rir").with_group("batch9", [200, 300]),
        SourcePartition::new("pdb").with_group("orgA", [100, 200]),
    ]);
    let result = run(&config(), input);
    let label = result.groups[0].label.as_ref().unwrap();
    assert_eq!(label.source, "pdb");
    assert_eq!(label.key, "orgA");
}

#[test]
fn alias_merge_within_one_source() {
    let mut alias = AuxTable::new(SignalKind::Alias);
    alias.insert("ACME", "orgX");
    alias.insert("ACME", "orgY");

    let pdb = SourcePartition::new("pdb")
        .with_group("orgX", [10])
        .with_group("orgY", [20])
        .with_aux(alias);

    let result = run(&config(), ReconInput::from_partitions([pdb]));
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].asns, vec![10, 20]);
    assert_eq!(result.summary.sources[0].signal_joins, 1);
}

#[test]
fn conflicting_higher_precedence_overlap() {
    let input = ReconInput::from_partitions([SourcePartition::new("pdb")
        .with_group("orgA", [1, 2])
        .with_group("orgB", [2, 3])]);

    let first = run(&config(), input);

    // orgA sorts first, so it keeps AS2; orgB is left with a singleton.
    assert_eq!(first.groups.len(), 1);
    assert_eq!(first.groups[0].asns, vec![1, 2]);
    assert_eq!(
        first.diagnostics,
        vec![Diagnostic::DuplicateMembership {
            source: "pdb".into(),
            asn: 2,
            kept_key: "orgA".into(),
            dropped_key: "orgB".into(),
        }]
    );

    let again = run(
        &config(),
        ReconInput::from_partitions([SourcePartition::new("pdb")
            .with_group("orgA", [1, 2])
            .with_group("orgB", [2, 3])]),
    );
    assert_eq!(first.groups, again.groups);
    assert_eq!(first.diagnostics, again.diagnostics);
}

// -------------------------------------------------------------------------
// Properties on fixed inputs
// -------------------------------------------------------------------------

#[test]
fn transitivity_across_two_sources() {
    let ctx = reconcile(ReconContext::new(vec![
        SourcePartition::new("a").with_group("x", [1, 2]),
        SourcePartition::new("b").with_group("y", [2, 3]),
    ]));
    let groups = shape_groups(&ctx);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].asns, vec![1, 2, 3]);
}

#[test]
fn disjoint_groups_stay_apart_without_signals() {
    let ctx = reconcile(ReconContext::new(vec![SourcePartition::new("a")
        .with_group("x", [1, 2])
        .with_group("y", [3, 4])]));
    let groups = shape_groups(&ctx);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].asns, vec![1, 2]);
    assert_eq!(groups[1].asns, vec![3, 4]);
}

#[test]
fn every_asn_in_exactly_one_final_group() {
    let parts = vec![
        SourcePartition::new("a")
            .with_group("x", [1, 2, 3])
            .with_group("y", [10, 11]),
        SourcePartition::new("b")
            .with_group("p", [3, 4])
            .with_group("q", [11, 12])
            .with_group("r", [50]),
        SourcePartition::new("c").with_group("s", [4, 12, 60]),
    ];
    let seen: BTreeSet<u32> = parts
        .iter()
        .flat_map(|p| p.groups.values().flatten().copied())
        .collect();

    let ctx = reconcile(ReconContext::new(parts));
    let partition = final_partition(&ctx.registry);

    let mut covered = BTreeSet::new();
    for asns in partition.values() {
        for &asn in asns {
            assert!(covered.insert(asn), "AS{asn} in two groups");
        }
    }
    assert_eq!(covered, seen);
}

#[test]
fn singleton_only_sources_emit_nothing() {
    let result = run(
        &config(),
        ReconInput::from_partitions([
            SourcePartition::new("pdb")
                .with_group("1", [7])
                .with_group("2", [8]),
            SourcePartition::new("v6").with_group("1", [9]),
        ]),
    );
    assert!(result.groups.is_empty());
    assert_eq!(result.summary.singletons, 3);
}

#[test]
fn missing_source_is_skipped() {
    let result = run(
        &config(),
        ReconInput::from_partitions([SourcePartition::new("v6").with_group("1", [1, 2])]),
    );
    assert_eq!(result.meta.precedence, vec!["v6"]);
    assert_eq!(result.groups.len(), 1);
}

#[test]
fn result_serializes_to_json() {
    let result = run(
        &config(),
        ReconInput::from_partitions([
            SourcePartition::new("pdb")
                .with_group("orgA", [1, 2])
                .with_group("orgB", [2, 3]),
            SourcePartition::new("v6").with_group("g", [3, 4]),
        ]),
    );
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["meta"]["config_name"], "Scenario");
    assert_eq!(json["diagnostics"][0]["kind"], "duplicate_membership");
    assert_eq!(json["groups"].as_array().unwrap().len(), 2);
    assert_eq!(json["groups"][0]["asns"], serde_json::json!([1, 2]));
    assert_eq!(json["groups"][1]["asns"], serde_json::json!([3, 4]));
}
