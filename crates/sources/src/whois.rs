//! Registry org handles for opaque-id groups.
//!
//! RIPE publishes an aut-num dump that names the `org:` of every ASN, and
//! RIPE ASNs are resolved from it alone. The other registries are asked over
//! whois, reading the fields listed for that registry in priority order.

use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, BufReader};

use flate2::read::GzDecoder;
use sibas_recon::Asn;

use crate::asn;
use crate::error::SourceError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Registries whose whois servers throttle bulk queries. Their ASNs are
/// resolved from the aut-num dump only.
pub const DUMP_ONLY_REGISTRIES: &[&str] = &["ripencc"];

// ---------------------------------------------------------------------------
// Field table
// ---------------------------------------------------------------------------

/// Per-registry whois fields that carry the org handle, lowest priority
/// number first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RirFields {
    fields: BTreeMap<String, Vec<(u32, String)>>,
}

impl RirFields {
    /// Fields used when no table is configured.
    pub fn builtin() -> Self {
        let mut table = Self::default();
        for (rir, field, priority) in [
            ("afrinic", "org", 1),
            ("apnic", "org", 1),
            ("apnic", "admin-c", 2),
            ("arin", "OrgId", 1),
            ("lacnic", "owner-id", 1),
            ("lacnic", "ownerid", 2),
            ("ripencc", "org", 1),
        ] {
            table.insert(rir, field, priority);
        }
        table
    }

    /// Parse `rir,field,priority` lines. `#` starts a comment.
    pub fn parse(text: &str) -> Result<Self, SourceError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(text.as_bytes());

        let mut table = Self::default();
        for (n, record) in reader.records().enumerate() {
            let record = record.map_err(|e| SourceError::Format {
                source: "rir fields".into(),
                message: e.to_string(),
            })?;
            let (Some(rir), Some(field), Some(priority)) =
                (record.get(0), record.get(1), record.get(2))
            else {
                return Err(SourceError::Format {
                    source: "rir fields".into(),
                    message: format!("record {}: expected rir,field,priority", n + 1),
                });
            };
            let priority = priority.parse().map_err(|_| SourceError::Format {
                source: "rir fields".into(),
                message: format!("record {}: bad priority '{priority}'", n + 1),
            })?;
            table.insert(rir, field, priority);
        }
        Ok(table)
    }

    fn insert(&mut self, rir: &str, field: &str, priority: u32) {
        let fields = self.fields.entry(rir.to_lowercase()).or_default();
        fields.push((priority, field.to_string()));
        fields.sort();
    }

    /// Fields for `rir` in the order they should be consulted.
    pub fn ordered(&self, rir: &str) -> impl Iterator<Item = &str> {
        self.fields
            .get(rir)
            .into_iter()
            .flatten()
            .map(|(_, field)| field.as_str())
    }

    pub fn contains(&self, rir: &str, field: &str) -> bool {
        self.ordered(rir).any(|f| f == field)
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Collect values of the wanted `tag: value` attributes from a whois reply.
/// Attributes before the first `aut-num`/`ASNumber` object are ignored.
pub fn parse_whois<F>(text: &str, wanted: F) -> BTreeMap<String, Vec<String>>
where
    F: Fn(&str) -> bool,
{
    let mut found: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut in_object = false;
    for line in text.lines() {
        let Some((tag, value)) = line.split_once(':') else {
            continue;
        };
        let (tag, value) = (tag.trim(), value.trim());
        if tag.eq_ignore_ascii_case("aut-num") || tag == "ASNumber" {
            in_object = true;
        }
        if in_object && !value.is_empty() && wanted(tag) {
            found.entry(tag.to_string()).or_default().push(value.to_string());
        }
    }
    found
}

/// Read a RIPE aut-num dump into `asn -> org handle`.
///
/// Lines are decoded lossily; the split dumps carry Latin-1 in free-text
/// attributes.
pub fn parse_aut_num_dump<R: BufRead>(mut reader: R) -> Result<HashMap<Asn, String>, SourceError> {
    let mut orgs = HashMap::new();
    let mut current: Option<Asn> = None;
    let mut raw = Vec::new();
    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&raw);
        if line.trim().is_empty() {
            current = None;
            continue;
        }
        let Some((tag, value)) = line.split_once(':') else {
            continue;
        };
        match tag.trim() {
            "aut-num" => current = asn::parse(value),
            "org" => {
                if let Some(asn) = current.take() {
                    orgs.insert(asn, value.trim().to_string());
                }
            }
            _ => {}
        }
    }
    Ok(orgs)
}

/// Read an aut-num dump as downloaded, gzipped (`ripe.db.aut-num.gz`) or not.
pub fn read_aut_num_dump(bytes: &[u8]) -> Result<HashMap<Asn, String>, SourceError> {
    if bytes.starts_with(&GZIP_MAGIC) {
        parse_aut_num_dump(BufReader::new(GzDecoder::new(bytes)))
    } else {
        parse_aut_num_dump(bytes)
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Sends one whois query and returns the raw reply.
pub trait WhoisLookup {
    fn query(&self, host: &str, query: &str) -> Option<String>;
}

pub fn whois_host(rir: &str) -> String {
    match rir {
        "ripencc" => "whois.ripe.net".to_string(),
        other => format!("whois.{other}.net"),
    }
}

/// Resolves delegated ASNs to the org handle their registry records.
pub struct OrgResolver {
    fields: RirFields,
    registry_of: HashMap<Asn, String>,
    aut_nums: HashMap<Asn, String>,
    lookup: Option<Box<dyn WhoisLookup>>,
}

impl OrgResolver {
    pub fn new(fields: RirFields, registry_of: HashMap<Asn, String>) -> Self {
        Self {
            fields,
            registry_of,
            aut_nums: HashMap::new(),
            lookup: None,
        }
    }

    pub fn with_aut_nums(mut self, aut_nums: HashMap<Asn, String>) -> Self {
        self.aut_nums = aut_nums;
        self
    }

    pub fn with_lookup(mut self, lookup: Box<dyn WhoisLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// The dump answers first, then the registry's whois server. Registries
    /// in [`DUMP_ONLY_REGISTRIES`] are never queried.
    pub fn find_org_id(&self, asn: Asn) -> Option<String> {
        if let Some(org) = self.aut_nums.get(&asn) {
            return Some(org.clone());
        }
        let rir = self.registry_of.get(&asn)?;
        if DUMP_ONLY_REGISTRIES.contains(&rir.as_str()) {
            return None;
        }
        let lookup = self.lookup.as_ref()?;
        let reply = lookup.query(&whois_host(rir), &format!("AS{asn}"))?;
        let found = parse_whois(&reply, |tag| self.fields.contains(rir, tag));
        let org = self
            .fields
            .ordered(rir)
            .find_map(|field| found.get(field).and_then(|v| v.first()).cloned());
        if org.is_none() {
            log::debug!("AS{asn}: no org field in {rir} whois reply");
        }
        org
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn field_table_orders_by_priority() {
        let text = "# rir,field,priority\napnic, admin-c, 2\napnic,org,1\narin,OrgId,1\n";
        let table = RirFields::parse(text).unwrap();
        assert_eq!(table.ordered("apnic").collect::<Vec<_>>(), vec!["org", "admin-c"]);
        assert!(table.contains("arin", "OrgId"));
        assert_eq!(table.ordered("lacnic").count(), 0);
    }

    #[test]
    fn field_table_rejects_bad_priority() {
        let err = RirFields::parse("arin,OrgId,first\n").unwrap_err();
        assert!(err.to_string().contains("bad priority"));
        assert!(RirFields::parse("arin,OrgId\n").is_err());
    }

    #[test]
    fn whois_reply_fields_after_object_start() {
        let reply = "\
% This is the whois server
OrgId: IGNORED
ASNumber:       701
OrgId:          MCICS
Comment:        http://x.example:8080/path
";
        let found = parse_whois(reply, |tag| tag == "OrgId" || tag == "Comment");
        assert_eq!(found["OrgId"], vec!["MCICS"]);
        assert_eq!(found["Comment"], vec!["http://x.example:8080/path"]);
    }

    #[test]
    fn aut_num_dump() {
        let dump = "\
aut-num:        AS3333
as-name:        RIPE-NCC-AS
org:            ORG-RIEN1-RIPE

aut-num:        AS12
as-name:        NO-ORG

org:            ORG-STRAY
aut-num:        AS13
org:            ORG-THIRTEEN
";
        let orgs = parse_aut_num_dump(dump.as_bytes()).unwrap();
        assert_eq!(orgs.len(), 2);
        assert_eq!(orgs[&3333], "ORG-RIEN1-RIPE");
        assert_eq!(orgs[&13], "ORG-THIRTEEN");
    }

    #[test]
    fn aut_num_dump_tolerates_latin1() {
        let mut dump = b"aut-num: AS3333\ndescr: Soci".to_vec();
        dump.extend_from_slice(&[0xe9, b't', 0xe9]);
        dump.extend_from_slice(b"\norg: ORG-X\n\naut-num: AS12\norg: ORG-Y\n");
        let orgs = parse_aut_num_dump(dump.as_slice()).unwrap();
        assert_eq!(orgs[&3333], "ORG-X");
        assert_eq!(orgs[&12], "ORG-Y");
    }

    #[test]
    fn aut_num_dump_gzipped() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(b"aut-num: AS3333\norg: ORG-RIEN1-RIPE\n")
            .unwrap();
        let gz = encoder.finish().unwrap();

        let orgs = read_aut_num_dump(&gz).unwrap();
        assert_eq!(orgs[&3333], "ORG-RIEN1-RIPE");
        let plain = read_aut_num_dump(b"aut-num: AS12\norg: ORG-Y\n").unwrap();
        assert_eq!(plain[&12], "ORG-Y");
    }

    #[test]
    fn aut_num_dump_truncated_gzip_is_io_error() {
        let err = read_aut_num_dump(&[0x1f, 0x8b, 0x08]).unwrap_err();
        assert!(matches!(err, SourceError::Io(_)));
    }

    #[derive(Clone, Default)]
    struct Canned {
        asked: Rc<RefCell<Vec<(String, String)>>>,
    }

    impl WhoisLookup for Canned {
        fn query(&self, host: &str, query: &str) -> Option<String> {
            self.asked.borrow_mut().push((host.into(), query.into()));
            Some("ASNumber: 701\nOrgId: MCICS\n".into())
        }
    }

    #[test]
    fn resolver_prefers_dump_then_whois() {
        let registry_of = HashMap::from([(701, "arin".to_string()), (3333, "ripencc".to_string())]);
        let canned = Canned::default();
        let resolver = OrgResolver::new(RirFields::builtin(), registry_of)
            .with_aut_nums(HashMap::from([(3333, "ORG-RIEN1-RIPE".to_string())]))
            .with_lookup(Box::new(canned.clone()));
        assert_eq!(resolver.find_org_id(3333).as_deref(), Some("ORG-RIEN1-RIPE"));
        assert_eq!(resolver.find_org_id(701).as_deref(), Some("MCICS"));
        assert_eq!(resolver.find_org_id(9), None);
        assert_eq!(
            *canned.asked.borrow(),
            vec![("whois.arin.net".to_string(), "AS701".to_string())]
        );
    }

    #[test]
    fn resolver_never_queries_ripe_whois() {
        let registry_of = HashMap::from([(3333, "ripencc".to_string()), (12, "ripencc".to_string())]);
        let canned = Canned::default();
        let resolver = OrgResolver::new(RirFields::builtin(), registry_of)
            .with_aut_nums(HashMap::from([(3333, "ORG-RIEN1-RIPE".to_string())]))
            .with_lookup(Box::new(canned.clone()));
        assert_eq!(resolver.find_org_id(3333).as_deref(), Some("ORG-RIEN1-RIPE"));
        assert_eq!(resolver.find_org_id(12), None);
        assert!(canned.asked.borrow().is_empty());
    }

    #[test]
    fn resolver_without_lookup_uses_dump_only() {
        let resolver = OrgResolver::new(RirFields::builtin(), HashMap::from([(1, "arin".into())]));
        assert_eq!(resolver.find_org_id(1), None);
        assert_eq!(whois_host("ripencc"), "whois.ripe.net");
        assert_eq!(whois_host("arin"), "whois.arin.net");
    }
}
