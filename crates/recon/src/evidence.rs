use crate::engine::ReconContext;
use crate::model::{ReconSummary, SiblingGroup, SourceStats};

/// Compute summary statistics from a reconciled context and its shaped groups.
pub fn compute_summary(ctx: &ReconContext, groups: &[SiblingGroup]) -> ReconSummary {
    let classes = ctx.registry.class_count();

    let sources = ctx
        .partitions
        .iter()
        .enumerate()
        .map(|(i, p)| SourceStats {
            name: p.name.clone(),
            precedence: i,
            groups: p.group_count(),
            memberships: p.membership_count(),
            signal_joins: ctx.signal_joins.get(i).copied().unwrap_or(0),
            merged_into_higher: ctx.consumed.get(i).map_or(0, |c| c.len()),
        })
        .collect();

    ReconSummary {
        asns_seen: ctx.registry.len(),
        classes,
        sibling_groups: groups.len(),
        singletons: classes - groups.len(),
        largest_group: groups.iter().map(|g| g.asns.len()).max().unwrap_or(0),
        cross_links: ctx.links.len(),
        diagnostics: ctx.diagnostics.len(),
        sources,
    }
}
