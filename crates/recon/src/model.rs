use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

/// Autonomous System Number. Adapters normalise raw values into this range.
pub type Asn = u32;

/// A set of ASNs believed to belong to one organization.
pub type Group = BTreeSet<Asn>;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Secondary identity signal reported alongside a source's primary grouping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Alias,
    Website,
    LookingGlass,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alias => write!(f, "alias"),
            Self::Website => write!(f, "website"),
            Self::LookingGlass => write!(f, "looking_glass"),
        }
    }
}

/// Cross-reference table: signal value -> group keys that reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxTable {
    pub signal: SignalKind,
    pub entries: BTreeMap<String, BTreeSet<String>>,
}

impl AuxTable {
    pub fn new(signal: SignalKind) -> Self {
        Self {
            signal,
            entries: BTreeMap::new(),
        }
    }

    /// Record that `key` reported `value`. Blank values never count as a
    /// shared signal and are refused.
    pub fn insert(&mut self, value: &str, key: &str) -> bool {
        let value = value.trim();
        if value.is_empty() || key.is_empty() {
            return false;
        }
        self.entries
            .entry(value.to_string())
            .or_default()
            .insert(key.to_string())
    }

    /// Entries whose value was reported by two or more distinct keys.
    pub fn shared(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.entries
            .iter()
            .filter(|(_, keys)| keys.len() > 1)
            .map(|(value, keys)| (value.as_str(), keys))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One upstream source's local clustering of ASNs.
///
/// Groups are keyed by the source-local group key and iterate in sorted key
/// order. That order is the tie-break order used everywhere in the engine.
#[derive(Debug, Clone, Default)]
pub struct SourcePartition {
    pub name: String,
    pub groups: BTreeMap<String, Group>,
    /// Optional human-readable names for group keys (e.g. organization name).
    pub labels: BTreeMap<String, String>,
    pub aux: Vec<AuxTable>,
    claimed: HashMap<Asn, String>,
}

impl SourcePartition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Extend the group under `key` verbatim. Overlap with other groups is
    /// allowed here; the engine resolves it first-wins.
    pub fn add_group<I>(&mut self, key: &str, asns: I)
    where
        I: IntoIterator<Item = Asn>,
    {
        self.groups.entry(key.to_string()).or_default().extend(asns);
    }

    pub fn with_group<I>(mut self, key: &str, asns: I) -> Self
    where
        I: IntoIterator<Item = Asn>,
    {
        self.add_group(key, asns);
        self
    }

    /// Adapter-level dedup: the first key to claim an ASN keeps it.
    /// Returns false when the ASN already belongs to a different key.
    pub fn assign(&mut self, key: &str, asn: Asn) -> bool {
        match self.claimed.get(&asn) {
            Some(owner) if owner != key => false,
            Some(_) => true,
            None => {
                self.claimed.insert(asn, key.to_string());
                self.groups.entry(key.to_string()).or_default().insert(asn);
                true
            }
        }
    }

    /// Key that won `asn` through [`assign`](Self::assign). Groups built
    /// with `add_group` are not tracked here.
    pub fn claimed_by(&self, asn: Asn) -> Option<&str> {
        self.claimed.get(&asn).map(String::as_str)
    }

    pub fn set_label(&mut self, key: &str, label: impl Into<String>) {
        self.labels.insert(key.to_string(), label.into());
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Get the aux table for `signal`, creating it if absent.
    pub fn aux_table_mut(&mut self, signal: SignalKind) -> &mut AuxTable {
        let pos = match self.aux.iter().position(|t| t.signal == signal) {
            Some(pos) => pos,
            None => {
                self.aux.push(AuxTable::new(signal));
                self.aux.len() - 1
            }
        };
        &mut self.aux[pos]
    }

    pub fn aux_table(&self, signal: SignalKind) -> Option<&AuxTable> {
        self.aux.iter().find(|t| t.signal == signal)
    }

    pub fn with_aux(mut self, table: AuxTable) -> Self {
        self.aux.push(table);
        self
    }

    /// Drop groups that cannot express a sibling relationship on their own.
    pub fn retain_multi_member(&mut self) {
        self.groups.retain(|_, g| g.len() > 1);
        let groups = &self.groups;
        self.labels.retain(|k, _| groups.contains_key(k));
        self.claimed.retain(|_, k| groups.contains_key(k));
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Total memberships across all groups (overlaps counted twice).
    pub fn membership_count(&self) -> usize {
        self.groups.values().map(|g| g.len()).sum()
    }
}

/// Pre-parsed partitions keyed by source name.
#[derive(Debug, Default)]
pub struct ReconInput {
    pub partitions: HashMap<String, SourcePartition>,
}

impl ReconInput {
    pub fn from_partitions(partitions: impl IntoIterator<Item = SourcePartition>) -> Self {
        Self {
            partitions: partitions
                .into_iter()
                .map(|p| (p.name.clone(), p))
                .collect(),
        }
    }

    pub fn insert(&mut self, partition: SourcePartition) {
        self.partitions.insert(partition.name.clone(), partition);
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Non-fatal data-quality findings recorded while reconciling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// An ASN appeared in two groups of one source; the first key kept it.
    DuplicateMembership {
        source: String,
        asn: Asn,
        kept_key: String,
        dropped_key: String,
    },
    /// A lower-precedence group was reached from two different
    /// higher-precedence groups; the first one encountered owns the link.
    ContestedGroup {
        higher_source: String,
        lower_source: String,
        lower_key: String,
        kept_key: String,
        contender_key: String,
        via_asn: Asn,
    },
    /// A group key with no ASNs.
    EmptyGroup { source: String, key: String },
    /// An aux table entry referenced a key with no group in its source.
    UnknownSignalKey {
        source: String,
        signal: SignalKind,
        value: String,
        key: String,
    },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateMembership {
                source,
                asn,
                kept_key,
                dropped_key,
            } => write!(
                f,
                "{source}: AS{asn} listed under '{kept_key}' and '{dropped_key}', kept '{kept_key}'"
            ),
            Self::ContestedGroup {
                higher_source,
                lower_source,
                lower_key,
                kept_key,
                contender_key,
                via_asn,
            } => write!(
                f,
                "{lower_source} group '{lower_key}' reached from {higher_source} '{kept_key}' and \
                 '{contender_key}' (via AS{via_asn}), kept '{kept_key}'"
            ),
            Self::EmptyGroup { source, key } => write!(f, "{source}: group '{key}' has no ASNs"),
            Self::UnknownSignalKey {
                source,
                signal,
                value,
                key,
            } => write!(
                f,
                "{source}: {signal} '{value}' references unknown group '{key}'"
            ),
        }
    }
}

/// A lower-precedence group merged into a higher-precedence one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossLink {
    pub higher_source: String,
    pub higher_key: String,
    pub lower_source: String,
    pub lower_key: String,
    pub via_asn: Asn,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Provenance of a final group: the highest-precedence source group in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupLabel {
    pub source: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiblingGroup {
    pub representative: Asn,
    pub asns: Vec<Asn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<GroupLabel>,
    /// Contributing sources, in precedence order.
    pub sources: Vec<String>,
}

impl SiblingGroup {
    /// Label for text output: display name, else `source:key`, else `AS<rep>`.
    pub fn display_label(&self) -> String {
        match &self.label {
            Some(GroupLabel {
                display: Some(name),
                ..
            }) if !name.trim().is_empty() => name.trim().to_string(),
            Some(label) => format!("{}:{}", label.source, label.key),
            None => format!("AS{}", self.representative),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub name: String,
    pub precedence: usize,
    pub groups: usize,
    pub memberships: usize,
    /// Joins made by this source's alias/url signals.
    pub signal_joins: usize,
    /// Groups of this source absorbed by the next-higher source.
    pub merged_into_higher: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconSummary {
    pub asns_seen: usize,
    pub classes: usize,
    pub sibling_groups: usize,
    pub singletons: usize,
    pub largest_group: usize,
    pub cross_links: usize,
    pub diagnostics: usize,
    pub sources: Vec<SourceStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub precedence: Vec<String>,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub groups: Vec<SiblingGroup>,
    pub diagnostics: Vec<Diagnostic>,
    pub links: Vec<CrossLink>,
}
