//! World IPv6 Launch self-reported ASN list.
//!
//! One participant per line: `asn,asn,...|Organization`. A participant that
//! lists a single ASN says nothing about siblings and is ignored.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use sibas_recon::{Asn, EquivalenceRegistry, SourcePartition};

use crate::asn;

struct Line<'a> {
    key: String,
    org: Option<&'a str>,
    asns: Vec<Asn>,
}

/// Build the partition for the launch list.
///
/// Lines that share an ASN describe one participant and are folded into a
/// single group. The group key is the zero-padded number of its first line.
pub fn parse(name: &str, text: &str) -> SourcePartition {
    let mut lines = Vec::new();
    let mut rejected = 0usize;

    for (n, raw) in text.lines().enumerate() {
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with('#') {
            continue;
        }
        let (asn_field, org) = match raw.split_once('|') {
            Some((asns, org)) => (asns, Some(org.trim()).filter(|o| !o.is_empty())),
            None => (raw, None),
        };

        let mut asns = Vec::new();
        for field in asn_field.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            match asn::parse(field) {
                Some(asn) if !asns.contains(&asn) => asns.push(asn),
                Some(_) => {}
                None => rejected += 1,
            }
        }
        if asns.len() < 2 {
            continue;
        }
        lines.push(Line {
            key: format!("{:06}", n + 1),
            org,
            asns,
        });
    }
    if rejected > 0 {
        log::warn!("ipv6 launch: skipped {rejected} invalid ASN fields");
    }

    let mut registry = EquivalenceRegistry::new();
    for line in &lines {
        registry.union_all(line.asns[0], line.asns[1..].iter().copied());
    }

    let mut partition = SourcePartition::new(name);
    let mut keys: HashMap<Asn, &str> = HashMap::new();
    for line in &lines {
        let rep = registry.find(line.asns[0]);
        match keys.entry(rep) {
            Entry::Occupied(first) => {
                log::debug!("ipv6 launch: line {} folded into {}", line.key, first.get());
            }
            Entry::Vacant(slot) => {
                slot.insert(&line.key);
                partition.add_group(&line.key, registry.members_of(rep));
                if let Some(org) = line.org {
                    partition.set_label(&line.key, org);
                }
            }
        }
    }

    log::info!(
        "ipv6 launch: {} participants, {} ASNs",
        partition.group_count(),
        partition.membership_count()
    );
    partition
}
