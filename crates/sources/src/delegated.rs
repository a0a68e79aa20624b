//! RIR extended delegation files.
//!
//! Record layout: `registry|cc|type|start|value|date|status|opaque-id|...`.
//! Every resource a registry hands to the same holder carries the same
//! opaque id, so ASN records sharing `registry:opaque-id` are siblings.

use std::collections::HashMap;

use sibas_recon::{Asn, SourcePartition};

use crate::asn;
use crate::error::SourceError;

/// Largest ASN block expanded from a single record.
pub const MAX_BLOCK: u64 = 65_536;

const FIELD_REGISTRY: usize = 0;
const FIELD_TYPE: usize = 2;
const FIELD_START: usize = 3;
const FIELD_VALUE: usize = 4;
const FIELD_STATUS: usize = 6;
const FIELD_OPAQUE_ID: usize = 7;

/// ASN allocations accumulated across one or more delegation files.
#[derive(Debug)]
pub struct DelegatedAsns {
    partition: SourcePartition,
    registry_of: HashMap<Asn, String>,
}

impl DelegatedAsns {
    pub fn new(name: &str) -> Self {
        Self {
            partition: SourcePartition::new(name),
            registry_of: HashMap::new(),
        }
    }

    /// Read one delegation file. Returns the number of ASNs recorded.
    ///
    /// Fails only when the document has no version header, which is what an
    /// error page or a truncated download looks like.
    pub fn read(&mut self, location: &str, text: &str) -> Result<usize, SourceError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'|')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .comment(Some(b'#'))
            .from_reader(text.as_bytes());

        let mut header_seen = false;
        let mut recorded = 0usize;
        let mut skipped = 0usize;

        for record in reader.records() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    log::debug!("{location}: unreadable record: {e}");
                    skipped += 1;
                    continue;
                }
            };

            if !header_seen {
                let version = record.get(0).unwrap_or("");
                if version.parse::<f32>().is_err() {
                    return Err(SourceError::Format {
                        source: location.to_string(),
                        message: "missing delegation version header".into(),
                    });
                }
                header_seen = true;
                continue;
            }

            if record.get(FIELD_TYPE) != Some("asn") {
                continue;
            }
            if !matches!(record.get(FIELD_STATUS), Some("allocated" | "assigned")) {
                continue;
            }
            let opaque = record.get(FIELD_OPAQUE_ID).map(str::trim).unwrap_or("");
            let registry = record.get(FIELD_REGISTRY).map(str::trim).unwrap_or("");
            if opaque.is_empty() || registry.is_empty() {
                skipped += 1;
                continue;
            }
            let Some(start) = record.get(FIELD_START).and_then(asn::parse) else {
                skipped += 1;
                continue;
            };
            let count = match record.get(FIELD_VALUE).and_then(|v| v.parse::<u64>().ok()) {
                Some(n) if (1..=MAX_BLOCK).contains(&n) => n,
                Some(n) => {
                    log::warn!("{location}: AS{start} block of {n} not expanded");
                    1
                }
                None => 1,
            };

            let key = format!("{registry}:{opaque}");
            for raw in u64::from(start)..u64::from(start) + count {
                let Some(asn) = asn::normalize(raw) else { break };
                if self.partition.assign(&key, asn) {
                    self.registry_of.entry(asn).or_insert_with(|| registry.to_string());
                    recorded += 1;
                } else {
                    log::debug!("{location}: AS{asn} already delegated under another id");
                }
            }
        }

        if !header_seen {
            return Err(SourceError::Format {
                source: location.to_string(),
                message: "empty delegation file".into(),
            });
        }
        if skipped > 0 {
            log::warn!("{location}: skipped {skipped} malformed ASN records");
        }
        log::info!("{location}: {recorded} delegated ASNs");
        Ok(recorded)
    }

    /// Registry that delegated `asn`, e.g. `arin` or `ripencc`.
    pub fn registry_of(&self, asn: Asn) -> Option<&str> {
        self.registry_of.get(&asn).map(String::as_str)
    }

    /// Opaque-id groups holding two or more ASNs, plus the registry map.
    pub fn into_parts(mut self) -> (SourcePartition, HashMap<Asn, String>) {
        self.partition.retain_multi_member();
        let partition = self.partition;
        let registry_of = self
            .registry_of
            .into_iter()
            .filter(|(asn, _)| partition.claimed_by(*asn).is_some())
            .collect();
        (partition, registry_of)
    }

    pub fn into_partition(self) -> SourcePartition {
        self.into_parts().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RIPE: &str = "\
2|ripencc|1700000000|5|19830705|20231114|+0100
ripencc|*|asn|*|5|summary
ripencc|FR|asn|100|1|19930901|allocated|abc-1
ripencc|FR|asn|101|2|19930901|allocated|abc-1
ripencc|DE|asn|200|1|19930901|assigned|def-2
ripencc|DE|asn|300|1|19930901|available|def-2
ripencc|DE|asn|400|1|19930901|allocated|
ripencc|NL|ipv4|10.0.0.0|256|19930901|allocated|def-2
ripencc|NL|asn|500|1|19930901|allocated|def-2
";

    #[test]
    fn groups_by_opaque_id() {
        let mut asns = DelegatedAsns::new("rir");
        assert_eq!(asns.read("ripe", RIPE).unwrap(), 5);
        assert_eq!(asns.registry_of(101), Some("ripencc"));

        let (p, registries) = asns.into_parts();
        assert_eq!(p.group_count(), 2);
        assert_eq!(
            p.groups["ripencc:abc-1"].iter().copied().collect::<Vec<_>>(),
            vec![100, 101, 102]
        );
        assert_eq!(
            p.groups["ripencc:def-2"].iter().copied().collect::<Vec<_>>(),
            vec![200, 500]
        );
        assert_eq!(registries.len(), 5);
        assert!(!registries.contains_key(&400));
    }

    #[test]
    fn same_id_in_two_registries_stays_apart() {
        let arin = "2|arin|1700000000|2|19700101|20231114|-0500\n\
                    arin|US|asn|700|1|20010101|assigned|abc-1\n\
                    arin|US|asn|701|1|20010101|assigned|abc-1\n";
        let mut asns = DelegatedAsns::new("rir");
        asns.read("ripe", RIPE).unwrap();
        asns.read("arin", arin).unwrap();
        let p = asns.into_partition();
        assert_eq!(p.group_count(), 3);
        assert_eq!(p.groups["arin:abc-1"].len(), 2);
    }

    #[test]
    fn singleton_holders_are_dropped() {
        let text = "2|lacnic|1|1|1|1|-0300\nlacnic|BR|asn|900|1|20010101|allocated|solo\n";
        let mut asns = DelegatedAsns::new("rir");
        asns.read("lacnic", text).unwrap();
        assert_eq!(asns.into_partition().group_count(), 0);
    }

    #[test]
    fn oversized_block_is_not_expanded() {
        let text = "2|apnic|1|1|1|1|+1000\n\
                    apnic|AU|asn|1000|100000|20010101|allocated|big\n\
                    apnic|AU|asn|5000|1|20010101|allocated|big\n";
        let mut asns = DelegatedAsns::new("rir");
        asns.read("apnic", text).unwrap();
        let p = asns.into_partition();
        assert_eq!(p.groups["apnic:big"].len(), 2);
    }

    #[test]
    fn large_registry_splits_quickly() {
        let mut text = String::from("2|arin|1|1|1|1|-0500\n");
        for id in 0..15_000u32 {
            let start = 100_000 + id * 4;
            text.push_str(&format!("arin|US|asn|{start}|4|20010101|assigned|multi-{id}\n"));
        }
        for id in 0..40_000u32 {
            let asn = 1_000_000 + id;
            text.push_str(&format!("arin|US|asn|{asn}|1|20010101|assigned|solo-{id}\n"));
        }

        let mut asns = DelegatedAsns::new("rir");
        assert_eq!(asns.read("arin", &text).unwrap(), 100_000);

        let started = std::time::Instant::now();
        let (p, registries) = asns.into_parts();
        assert_eq!(p.group_count(), 15_000);
        assert_eq!(registries.len(), 60_000);
        assert!(!registries.contains_key(&1_000_000));
        assert!(
            started.elapsed() < std::time::Duration::from_secs(2),
            "into_parts took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn rejects_documents_without_header() {
        let mut asns = DelegatedAsns::new("rir");
        let err = asns.read("arin", "<html>not found</html>\n").unwrap_err();
        assert!(err.to_string().contains("version header"));
        assert!(asns.read("arin", "").is_err());
    }
}
