// Property-based tests for the reconciliation passes.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use sibas_recon::engine::{reconcile, ReconContext};
use sibas_recon::model::{AuxTable, SignalKind, SourcePartition};
use sibas_recon::output::{final_partition, shape_groups};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Small ASN space so groups from different sources overlap often.
fn arb_group() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(1u32..60, 0..6)
}

fn arb_partition(name: &'static str) -> impl Strategy<Value = SourcePartition> {
    (
        prop::collection::vec(arb_group(), 0..8),
        prop::collection::vec((0usize..8, 0usize..8), 0..3),
    )
        .prop_map(move |(groups, alias_pairs)| {
            let mut p = SourcePartition::new(name);
            for (i, g) in groups.iter().enumerate() {
                p.add_group(&format!("k{i}"), g.iter().copied());
            }
            let mut alias = AuxTable::new(SignalKind::Alias);
            for (n, (a, b)) in alias_pairs.iter().enumerate() {
                alias.insert(&format!("alias{n}"), &format!("k{a}"));
                alias.insert(&format!("alias{n}"), &format!("k{b}"));
            }
            p.with_aux(alias)
        })
}

fn arb_sources() -> impl Strategy<Value = Vec<SourcePartition>> {
    (arb_partition("a"), arb_partition("b"), arb_partition("c"))
        .prop_map(|(a, b, c)| vec![a, b, c])
}

fn all_asns(parts: &[SourcePartition]) -> BTreeSet<u32> {
    parts
        .iter()
        .flat_map(|p| p.groups.values().flatten().copied())
        .collect()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn partition_covers_each_asn_once(parts in arb_sources()) {
        let expected = all_asns(&parts);
        let ctx = reconcile(ReconContext::new(parts));

        let mut covered = BTreeSet::new();
        for (rep, asns) in final_partition(&ctx.registry) {
            prop_assert_eq!(Some(&rep), asns.first());
            prop_assert!(asns.windows(2).all(|w| w[0] < w[1]));
            for asn in asns {
                prop_assert!(covered.insert(asn));
            }
        }
        prop_assert_eq!(covered, expected);
    }

    #[test]
    fn reconciliation_is_idempotent(parts in arb_sources()) {
        let first = reconcile(ReconContext::new(parts.clone()));
        let second = reconcile(ReconContext::new(parts));
        prop_assert_eq!(first.registry.classes(), second.registry.classes());
        prop_assert_eq!(shape_groups(&first), shape_groups(&second));
        prop_assert_eq!(first.diagnostics, second.diagnostics);
    }

    #[test]
    fn sibling_output_has_no_singletons(parts in arb_sources()) {
        let ctx = reconcile(ReconContext::new(parts));
        let groups = shape_groups(&ctx);
        prop_assert!(groups.iter().all(|g| g.asns.len() > 1));
        prop_assert!(groups.windows(2).all(|w| w[0].representative < w[1].representative));
    }

    #[test]
    fn group_members_share_a_final_class(parts in arb_sources()) {
        let ctx = reconcile(ReconContext::new(parts));
        for groups in &ctx.effective {
            for group in groups.values() {
                let reps: BTreeSet<_> = group
                    .iter()
                    .map(|&asn| ctx.registry.representative_of(asn))
                    .collect();
                prop_assert!(reps.len() <= 1);
            }
        }
    }

    #[test]
    fn disjoint_single_source_is_preserved(
        groups in prop::collection::btree_map("[a-z]{1,4}", 0u32..1000, 0..10)
    ) {
        // One ASN range per key, no overlap, no signals: output == input.
        let mut p = SourcePartition::new("only");
        let mut expected = BTreeMap::new();
        for (i, (key, base)) in groups.iter().enumerate() {
            let start = (i as u32) * 10_000 + base;
            p.add_group(key, [start, start + 1]);
            expected.insert(start, vec![start, start + 1]);
        }
        let ctx = reconcile(ReconContext::new(vec![p]));
        prop_assert_eq!(final_partition(&ctx.registry), expected);
    }
}
