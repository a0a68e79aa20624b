use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::config::ReconConfig;
use crate::evidence::compute_summary;
use crate::intra::merge_secondary_signals;
use crate::model::{
    Asn, CrossLink, Diagnostic, Group, ReconInput, ReconMeta, ReconResult, SourcePartition,
};
use crate::output::shape_groups;
use crate::registry::EquivalenceRegistry;

/// All state of one reconciliation run. Built fresh per run; nothing
/// survives between runs.
#[derive(Debug, Clone, Default)]
pub struct ReconContext {
    /// Source partitions in precedence order, highest first.
    pub partitions: Vec<SourcePartition>,
    pub registry: EquivalenceRegistry,
    pub diagnostics: Vec<Diagnostic>,
    pub links: Vec<CrossLink>,
    /// Joins made by each partition's secondary signals.
    pub signal_joins: Vec<usize>,
    /// Per partition: group keys absorbed by the next-higher partition.
    pub consumed: Vec<BTreeSet<String>>,
    /// Per partition: membership after first-wins dedup.
    pub effective: Vec<BTreeMap<String, Group>>,
}

impl ReconContext {
    pub fn new(partitions: Vec<SourcePartition>) -> Self {
        Self {
            partitions,
            ..Self::default()
        }
    }

    fn reset(&mut self) {
        let n = self.partitions.len();
        self.registry = EquivalenceRegistry::new();
        self.diagnostics.clear();
        self.links.clear();
        self.signal_joins = vec![0; n];
        self.consumed = vec![BTreeSet::new(); n];
        self.effective = Vec::with_capacity(n);
    }
}

/// Run every pass over the context's partitions and return it holding the
/// reconciled partition. Re-running on the same context starts from scratch.
pub fn reconcile(mut ctx: ReconContext) -> ReconContext {
    ctx.reset();
    seed_partitions(&mut ctx);
    merge_within_sources(&mut ctx);
    merge_across_sources(&mut ctx);

    log::debug!(
        "reconciled {} ASNs into {} classes ({} cross links, {} diagnostics)",
        ctx.registry.len(),
        ctx.registry.class_count(),
        ctx.links.len(),
        ctx.diagnostics.len(),
    );
    ctx
}

/// Order partitions per config precedence, reconcile, shape the output.
pub fn run(config: &ReconConfig, input: ReconInput) -> ReconResult {
    let mut remaining = input.partitions;
    let mut ordered = Vec::with_capacity(config.precedence.len());
    for name in &config.precedence {
        match remaining.remove(name) {
            Some(partition) => ordered.push(partition),
            None => log::warn!("source '{name}' has no data; skipping"),
        }
    }
    let mut unranked: Vec<_> = remaining.into_keys().collect();
    unranked.sort();
    for name in unranked {
        log::warn!("source '{name}' is not in precedence; ignored");
    }

    let ctx = reconcile(ReconContext::new(ordered));
    let groups = shape_groups(&ctx);
    let summary = compute_summary(&ctx, &groups);

    ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            precedence: ctx.partitions.iter().map(|p| p.name.clone()).collect(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        groups,
        diagnostics: ctx.diagnostics,
        links: ctx.links,
    }
}

// ---------------------------------------------------------------------------
// Pass 1: seed each source's groups
// ---------------------------------------------------------------------------

fn seed_partitions(ctx: &mut ReconContext) {
    let ReconContext {
        partitions,
        registry,
        diagnostics,
        effective,
        ..
    } = ctx;

    for partition in partitions.iter() {
        let mut owner: HashMap<Asn, &str> = HashMap::new();
        let mut kept_groups = BTreeMap::new();

        for (key, group) in &partition.groups {
            if group.is_empty() {
                log::warn!("{}: group '{key}' has no ASNs", partition.name);
                diagnostics.push(Diagnostic::EmptyGroup {
                    source: partition.name.clone(),
                    key: key.clone(),
                });
            }

            let mut kept = Group::new();
            for &asn in group {
                match owner.get(&asn) {
                    Some(&first) => {
                        log::warn!(
                            "{}: AS{asn} listed under '{first}' and '{key}', keeping '{first}'",
                            partition.name
                        );
                        diagnostics.push(Diagnostic::DuplicateMembership {
                            source: partition.name.clone(),
                            asn,
                            kept_key: first.to_string(),
                            dropped_key: key.clone(),
                        });
                    }
                    None => {
                        owner.insert(asn, key);
                        kept.insert(asn);
                    }
                }
            }

            if let Some(&anchor) = kept.first() {
                registry.union_all(anchor, kept.iter().copied());
            }
            kept_groups.insert(key.clone(), kept);
        }

        log::debug!(
            "{}: seeded {} groups ({} memberships)",
            partition.name,
            kept_groups.len(),
            partition.membership_count(),
        );
        effective.push(kept_groups);
    }
}

// ---------------------------------------------------------------------------
// Pass 2: alias / url signals inside each source
// ---------------------------------------------------------------------------

fn merge_within_sources(ctx: &mut ReconContext) {
    let ReconContext {
        partitions,
        registry,
        diagnostics,
        effective,
        signal_joins,
        ..
    } = ctx;

    for (i, partition) in partitions.iter().enumerate() {
        signal_joins[i] = merge_secondary_signals(
            &partition.name,
            &partition.aux,
            &effective[i],
            registry,
            diagnostics,
        );
        if signal_joins[i] > 0 {
            log::debug!("{}: {} joins from secondary signals", partition.name, signal_joins[i]);
        }
    }
}

// ---------------------------------------------------------------------------
// Pass 3: adjacent precedence pairs
// ---------------------------------------------------------------------------

fn merge_across_sources(ctx: &mut ReconContext) {
    let ReconContext {
        partitions,
        registry,
        diagnostics,
        links,
        consumed,
        effective,
        ..
    } = ctx;

    for hi in 0..partitions.len().saturating_sub(1) {
        let lo = hi + 1;
        let higher_source = &partitions[hi].name;
        let lower_source = &partitions[lo].name;

        // Effective lower membership is disjoint, so each ASN has one key.
        let lower_index: HashMap<Asn, &str> = effective[lo]
            .iter()
            .flat_map(|(key, group)| group.iter().map(move |&asn| (asn, key.as_str())))
            .collect();

        let mut claimed_by: HashMap<&str, &str> = HashMap::new();
        let mut contested: HashSet<(&str, &str)> = HashSet::new();

        for (higher_key, group) in &effective[hi] {
            let Some(&anchor) = group.first() else { continue };

            for &asn in group {
                let Some(&lower_key) = lower_index.get(&asn) else { continue };

                match claimed_by.get(lower_key) {
                    None => {
                        claimed_by.insert(lower_key, higher_key.as_str());
                        let lower_group = &effective[lo][lower_key];
                        registry.union_all(anchor, lower_group.iter().copied());
                        consumed[lo].insert(lower_key.to_string());
                        links.push(CrossLink {
                            higher_source: higher_source.clone(),
                            higher_key: higher_key.clone(),
                            lower_source: lower_source.clone(),
                            lower_key: lower_key.to_string(),
                            via_asn: asn,
                        });
                    }
                    Some(&owner) if owner == higher_key.as_str() => {}
                    Some(&owner) => {
                        if contested.insert((lower_key, higher_key.as_str())) {
                            log::warn!(
                                "{lower_source} group '{lower_key}' also reached from \
                                 {higher_source} '{higher_key}' via AS{asn}; kept '{owner}'"
                            );
                            diagnostics.push(Diagnostic::ContestedGroup {
                                higher_source: higher_source.clone(),
                                lower_source: lower_source.clone(),
                                lower_key: lower_key.to_string(),
                                kept_key: owner.to_string(),
                                contender_key: higher_key.clone(),
                                via_asn: asn,
                            });
                        }
                    }
                }
            }
        }

        log::debug!(
            "{higher_source} -> {lower_source}: absorbed {} of {} groups",
            consumed[lo].len(),
            effective[lo].len(),
        );
    }
}
