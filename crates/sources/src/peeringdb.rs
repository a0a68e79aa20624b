//! PeeringDB `api/net` and `api/org` documents.
//!
//! Networks are grouped by the organization that owns them. The alias,
//! website and looking-glass fields feed the secondary-signal tables.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::Value;

use sibas_recon::config::SignalConfig;
use sibas_recon::{SignalKind, SourcePartition};

use crate::asn;
use crate::error::SourceError;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default = "Vec::new")]
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct NetRecord {
    pub asn: u64,
    pub org_id: u64,
    #[serde(default)]
    pub aka: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub looking_glass: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrgRecord {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

/// Decode `{"data": [...]}`. Records that do not fit `T` are skipped.
fn records<T>(source: &str, json: &str) -> Result<Vec<T>, SourceError>
where
    T: for<'de> Deserialize<'de>,
{
    let envelope: Envelope = serde_json::from_str(json).map_err(|e| SourceError::Json {
        source: source.to_string(),
        message: e.to_string(),
    })?;

    let mut out = Vec::with_capacity(envelope.data.len());
    let mut skipped = 0usize;
    for value in envelope.data {
        match serde_json::from_value(value) {
            Ok(record) => out.push(record),
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        log::warn!("{source}: skipped {skipped} malformed records");
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Field cleanup
// ---------------------------------------------------------------------------

/// A name worth matching on: something other than whitespace and punctuation.
fn meaningful_name(name: &str) -> Option<&str> {
    let name = name.trim();
    name.chars().any(char::is_alphanumeric).then_some(name)
}

/// Keep http(s) URLs that carry a host, in their normalized form.
pub fn normalize_url(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Some(parsed.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Build the partition for one PeeringDB snapshot.
///
/// Group key is the org id, label the org name. Org names of orgs that own
/// at least one network, plus every net `aka`, go into the alias table.
pub fn parse(
    name: &str,
    net_json: &str,
    org_json: &str,
    signals: &SignalConfig,
) -> Result<SourcePartition, SourceError> {
    let nets: Vec<NetRecord> = records("peeringdb net", net_json)?;
    let orgs: Vec<OrgRecord> = records("peeringdb org", org_json)?;

    let mut partition = SourcePartition::new(name);
    let mut rejected = 0usize;

    for net in &nets {
        let Some(asn) = asn::normalize(net.asn) else {
            rejected += 1;
            continue;
        };
        let key = net.org_id.to_string();
        if !partition.assign(&key, asn) {
            log::debug!("peeringdb: AS{asn} listed twice, keeping first org");
            continue;
        }

        if signals.alias {
            if let Some(aka) = net.aka.as_deref().and_then(meaningful_name) {
                partition.aux_table_mut(SignalKind::Alias).insert(aka, &key);
            }
        }
        if signals.website {
            if let Some(url) = net.website.as_deref().and_then(normalize_url) {
                partition.aux_table_mut(SignalKind::Website).insert(&url, &key);
            }
        }
        if signals.looking_glass {
            if let Some(url) = net.looking_glass.as_deref().and_then(normalize_url) {
                partition
                    .aux_table_mut(SignalKind::LookingGlass)
                    .insert(&url, &key);
            }
        }
    }
    if rejected > 0 {
        log::warn!("peeringdb: skipped {rejected} networks with an invalid ASN");
    }

    let mut labelled = BTreeSet::new();
    for org in &orgs {
        let key = org.id.to_string();
        if !partition.groups.contains_key(&key) {
            continue;
        }
        let Some(org_name) = meaningful_name(&org.name) else {
            continue;
        };
        partition.set_label(&key, org_name);
        if signals.alias {
            partition.aux_table_mut(SignalKind::Alias).insert(org_name, &key);
        }
        labelled.insert(key);
    }

    let unlabelled = partition.groups.len() - labelled.len();
    if unlabelled > 0 {
        log::warn!("peeringdb: {unlabelled} orgs own networks but have no usable name");
    }

    log::info!(
        "peeringdb: {} orgs, {} networks",
        partition.group_count(),
        partition.membership_count()
    );
    Ok(partition)
}
