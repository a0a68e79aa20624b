//! Turn configured source locations into engine input.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use sibas_recon::config::{OpaqueReportConfig, ReconConfig, SourceConfig};
use sibas_recon::{Asn, ReconInput, SourcePartition};
use sibas_sources::delegated::DelegatedAsns;
use sibas_sources::whois::{self, OrgResolver, RirFields};
use sibas_sources::{ipv6_launch, peeringdb, SourceError};

use crate::exit_codes::source_exit_code;
use crate::fetch::{read_location, read_location_bytes, FetchClient};
use crate::whois::TcpWhois;
use crate::CliError;

const WHOIS_TIMEOUT_SECS: u64 = 10;

/// Everything `sibas run` needs after the download phase.
pub struct Loaded {
    pub input: ReconInput,
    /// Opaque-id groups and ASN -> registry map of the first delegated source.
    pub delegated: Option<(SourcePartition, HashMap<Asn, String>)>,
}

fn source_err(name: &str, err: SourceError) -> CliError {
    CliError {
        code: source_exit_code(&err),
        message: format!("source '{name}': {err}"),
        hint: None,
    }
}

/// Read and parse every configured source, in precedence order.
pub fn load_sources(
    config: &ReconConfig,
    base_dir: &Path,
    client: &FetchClient,
) -> Result<Loaded, CliError> {
    let mut input = ReconInput::default();
    let mut delegated = None;

    for (name, source) in config.ranked_sources() {
        let partition = match source {
            SourceConfig::Peeringdb { net, org, signals } => {
                let net = read_location(client, base_dir, net)?;
                let org = read_location(client, base_dir, org)?;
                peeringdb::parse(name, &net, &org, signals).map_err(|e| source_err(name, e))?
            }
            SourceConfig::RirDelegated { locations } => {
                let mut asns = DelegatedAsns::new(name);
                for location in locations {
                    let text = read_location(client, base_dir, location)?;
                    asns.read(location, &text).map_err(|e| source_err(name, e))?;
                }
                let (partition, registry_of) = asns.into_parts();
                if delegated.is_none() && config.delegated_source() == Some(name) {
                    delegated = Some((partition.clone(), registry_of));
                }
                partition
            }
            SourceConfig::Ipv6Launch { location } => {
                let text = read_location(client, base_dir, location)?;
                ipv6_launch::parse(name, &text)
            }
        };

        tracing::info!(
            "loaded {name} ({}): {} groups, {} ASNs",
            source.kind(),
            partition.group_count(),
            partition.membership_count(),
        );
        input.insert(partition);
    }

    Ok(Loaded { input, delegated })
}

/// Build the org resolver for the opaque-id report.
pub fn org_resolver(
    report: &OpaqueReportConfig,
    base_dir: &Path,
    client: &FetchClient,
    registry_of: HashMap<Asn, String>,
) -> Result<OrgResolver, CliError> {
    let fields = match &report.rir_fields {
        Some(location) => {
            let text = read_location(client, base_dir, location)?;
            RirFields::parse(&text).map_err(|e| source_err("opaque_report", e))?
        }
        None => RirFields::builtin(),
    };

    let mut resolver = OrgResolver::new(fields, registry_of);
    if let Some(location) = &report.aut_num_dump {
        let bytes = read_location_bytes(client, base_dir, location)?;
        let aut_nums =
            whois::read_aut_num_dump(&bytes).map_err(|e| source_err("opaque_report", e))?;
        tracing::info!("aut-num dump: {} ASNs with an org", aut_nums.len());
        resolver = resolver.with_aut_nums(aut_nums);
    }
    if report.whois {
        resolver = resolver.with_lookup(Box::new(TcpWhois::new(Duration::from_secs(
            WHOIS_TIMEOUT_SECS,
        ))));
    }
    Ok(resolver)
}
