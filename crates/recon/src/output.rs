use std::collections::{BTreeMap, BTreeSet};

use crate::engine::ReconContext;
use crate::model::{Asn, GroupLabel, SiblingGroup};
use crate::registry::EquivalenceRegistry;

/// The full quotient, singletons included: representative -> sorted ASNs.
pub fn final_partition(registry: &EquivalenceRegistry) -> BTreeMap<Asn, Vec<Asn>> {
    registry
        .classes()
        .into_iter()
        .map(|(rep, group)| (rep, group.into_iter().collect()))
        .collect()
}

/// Sibling groups sorted by representative, members ascending. Singletons
/// have no siblings and are dropped.
///
/// Each group is labelled by the first contributing source group in
/// precedence order, then key order.
pub fn shape_groups(ctx: &ReconContext) -> Vec<SiblingGroup> {
    let mut labels: BTreeMap<Asn, GroupLabel> = BTreeMap::new();
    let mut sources: BTreeMap<Asn, BTreeSet<usize>> = BTreeMap::new();

    for (i, partition) in ctx.partitions.iter().enumerate() {
        let Some(groups) = ctx.effective.get(i) else { continue };
        for (key, group) in groups {
            let Some(rep) = group
                .first()
                .and_then(|&anchor| ctx.registry.representative_of(anchor))
            else {
                continue;
            };
            sources.entry(rep).or_default().insert(i);
            labels.entry(rep).or_insert_with(|| GroupLabel {
                source: partition.name.clone(),
                key: key.clone(),
                display: partition.label(key).map(str::to_string),
            });
        }
    }

    final_partition(&ctx.registry)
        .into_iter()
        .filter(|(_, asns)| asns.len() > 1)
        .map(|(rep, asns)| SiblingGroup {
            representative: rep,
            asns,
            label: labels.remove(&rep),
            sources: sources
                .remove(&rep)
                .unwrap_or_default()
                .into_iter()
                .map(|i| ctx.partitions[i].name.clone())
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::reconcile;
    use crate::model::SourcePartition;

    #[test]
    fn singletons_are_suppressed() {
        let ctx = reconcile(ReconContext::new(vec![SourcePartition::new("pdb")
            .with_group("a", [5])
            .with_group("b", [9, 8])]));
        let groups = shape_groups(&ctx);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].representative, 8);
        assert_eq!(groups[0].asns, vec![8, 9]);

        let all = final_partition(&ctx.registry);
        assert_eq!(all.len(), 2);
        assert_eq!(all[&5], vec![5]);
    }

    #[test]
    fn groups_sorted_by_representative() {
        let ctx = reconcile(ReconContext::new(vec![SourcePartition::new("pdb")
            .with_group("z", [30, 31])
            .with_group("a", [40, 41])
            .with_group("m", [10, 11])]));
        let reps: Vec<_> = shape_groups(&ctx).iter().map(|g| g.representative).collect();
        assert_eq!(reps, vec![10, 30, 40]);
    }

    #[test]
    fn label_comes_from_highest_precedence_source() {
        let mut pdb = SourcePartition::new("pdb").with_group("17", [100, 200]);
        pdb.set_label("17", "Acme Networks");
        let mut v6 = SourcePartition::new("v6").with_group("000001", [200, 300]);
        v6.set_label("000001", "ACME");

        let ctx = reconcile(ReconContext::new(vec![pdb, v6]));
        let groups = shape_groups(&ctx);
        assert_eq!(groups.len(), 1);
        let label = groups[0].label.as_ref().unwrap();
        assert_eq!(label.source, "pdb");
        assert_eq!(label.key, "17");
        assert_eq!(label.display.as_deref(), Some("Acme Networks"));
        assert_eq!(groups[0].sources, vec!["pdb", "v6"]);
    }

    #[test]
    fn lower_source_labels_groups_it_alone_formed() {
        let ctx = reconcile(ReconContext::new(vec![
            SourcePartition::new("pdb").with_group("1", [1, 2]),
            SourcePartition::new("rir").with_group("ripencc:abc", [7, 8]),
        ]));
        let groups = shape_groups(&ctx);
        assert_eq!(groups[1].display_label(), "rir:ripencc:abc");
        assert_eq!(groups[1].sources, vec!["rir"]);
    }
}
