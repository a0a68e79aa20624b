//! CAIDA AS-to-organization snapshots, used to cross-check sibling output.
//!
//! The file holds an org section and an aut section, each introduced by a
//! `# format:` comment. Only the aut section is read:
//! `aut|changed|aut_name|org_id|opaque_id|source`, older snapshots without
//! the opaque column included.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use sibas_recon::Asn;

use crate::asn;
use crate::error::SourceError;

const AUT_HEADER: &str = "# format:aut|";

/// ASN to org mapping from one as2org snapshot.
#[derive(Debug, Default)]
pub struct As2Org {
    org_of: HashMap<Asn, String>,
    members: HashMap<String, BTreeSet<Asn>>,
}

impl As2Org {
    pub fn parse(text: &str) -> Result<Self, SourceError> {
        let mut table = Self::default();
        let mut in_aut = false;
        let mut seen_header = false;
        let mut rejected = 0usize;

        for line in text.lines() {
            if line.starts_with("# format:") {
                in_aut = line.starts_with(AUT_HEADER);
                seen_header |= in_aut;
                continue;
            }
            if !in_aut || line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.trim().split('|').collect();
            let (Some(asn), Some(org)) = (
                fields.first().and_then(|f| asn::parse(f)),
                fields.get(3).map(|f| f.trim()).filter(|f| !f.is_empty()),
            ) else {
                rejected += 1;
                continue;
            };
            table.org_of.insert(asn, org.to_string());
            table.members.entry(org.to_string()).or_default().insert(asn);
        }

        if !seen_header {
            return Err(SourceError::Format {
                source: "as2org".into(),
                message: "missing '# format:aut|...' header".into(),
            });
        }
        if rejected > 0 {
            log::warn!("as2org: skipped {rejected} malformed aut records");
        }
        Ok(table)
    }

    pub fn org_of(&self, asn: Asn) -> Option<&str> {
        self.org_of.get(&asn).map(String::as_str)
    }

    /// Orgs that hold more than one ASN.
    pub fn orgs_with_siblings(&self) -> usize {
        self.members.values().filter(|m| m.len() > 1).count()
    }

    /// True when some member's org does not hold the whole group.
    pub fn disagrees(&self, group: &[Asn]) -> bool {
        group.iter().any(|asn| {
            self.org_of(*asn)
                .and_then(|org| self.members.get(org))
                .is_some_and(|held| group.iter().any(|a| !held.contains(a)))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Agreement {
    pub groups: usize,
    pub disagreeing: usize,
    pub orgs_with_siblings: usize,
}

/// Count sibling groups that as2org splits across orgs.
pub fn compare(as2org: &As2Org, groups: &[Vec<Asn>]) -> Agreement {
    Agreement {
        groups: groups.len(),
        disagreeing: groups.iter().filter(|g| as2org.disagrees(g)).count(),
        orgs_with_siblings: as2org.orgs_with_siblings(),
    }
}
