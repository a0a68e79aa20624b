use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReconConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Source names ranked by reliability, highest first.
    pub precedence: Vec<String>,
    pub sources: BTreeMap<String, SourceConfig>,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub opaque_report: Option<OpaqueReportConfig>,
}

fn default_name() -> String {
    "sibling-asns".to_string()
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Where and how to read one upstream source. Locations starting with
/// `http://` or `https://` are fetched; anything else is a file path
/// relative to the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// PeeringDB `api/net` + `api/org` JSON.
    Peeringdb {
        net: String,
        org: String,
        #[serde(default)]
        signals: SignalConfig,
    },
    /// RIR extended delegation files (opaque-id allocation batches).
    RirDelegated { locations: Vec<String> },
    /// World IPv6 Launch self-reported ASN list.
    Ipv6Launch { location: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Peeringdb,
    RirDelegated,
    Ipv6Launch,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Peeringdb => write!(f, "peeringdb"),
            Self::RirDelegated => write!(f, "rir_delegated"),
            Self::Ipv6Launch => write!(f, "ipv6_launch"),
        }
    }
}

impl SourceConfig {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Peeringdb { .. } => SourceKind::Peeringdb,
            Self::RirDelegated { .. } => SourceKind::RirDelegated,
            Self::Ipv6Launch { .. } => SourceKind::Ipv6Launch,
        }
    }

    pub fn locations(&self) -> Vec<&str> {
        match self {
            Self::Peeringdb { net, org, .. } => vec![net.as_str(), org.as_str()],
            Self::RirDelegated { locations } => locations.iter().map(String::as_str).collect(),
            Self::Ipv6Launch { location } => vec![location.as_str()],
        }
    }
}

/// Which PeeringDB secondary signals link organizations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SignalConfig {
    #[serde(default = "enabled")]
    pub alias: bool,
    #[serde(default = "enabled")]
    pub website: bool,
    #[serde(default = "enabled")]
    pub looking_glass: bool,
}

fn enabled() -> bool {
    true
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            alias: true,
            website: true,
            looking_glass: true,
        }
    }
}

/// True if `location` should be fetched over HTTP rather than read from disk.
pub fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_dir")]
    pub dir: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub json: bool,
}

fn default_dir() -> String {
    ".".to_string()
}

fn default_prefix() -> String {
    "SiblingASNs".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            prefix: default_prefix(),
            json: false,
        }
    }
}

/// Optional report of opaque-id ASN groups labelled with registry org handles.
#[derive(Debug, Clone, Deserialize)]
pub struct OpaqueReportConfig {
    #[serde(default = "default_opaque_prefix")]
    pub prefix: String,
    /// `rir,field,priority` table of whois fields naming the org.
    #[serde(default)]
    pub rir_fields: Option<String>,
    /// RIPE aut-num split dump, plain or gzipped.
    #[serde(default)]
    pub aut_num_dump: Option<String>,
    /// Query RIR whois servers for ASNs the dump does not cover. RIPE
    /// ASNs are never queried.
    #[serde(default)]
    pub whois: bool,
}

fn default_opaque_prefix() -> String {
    "OpaqueIdAsnGroups".to_string()
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.precedence.is_empty() {
            return Err(ReconError::ConfigValidation(
                "precedence must name at least one source".into(),
            ));
        }

        let mut seen = HashSet::new();
        for name in &self.precedence {
            if !seen.insert(name.as_str()) {
                return Err(ReconError::ConfigValidation(format!(
                    "source '{name}' appears twice in precedence"
                )));
            }
            if !self.sources.contains_key(name) {
                return Err(ReconError::UnknownSource(name.clone()));
            }
        }

        for (name, source) in &self.sources {
            if !seen.contains(name.as_str()) {
                return Err(ReconError::UnrankedSource(name.clone()));
            }
            if source.locations().iter().any(|l| l.trim().is_empty()) {
                return Err(ReconError::ConfigValidation(format!(
                    "source '{name}': empty location"
                )));
            }
            if let SourceConfig::RirDelegated { locations } = source {
                if locations.is_empty() {
                    return Err(ReconError::ConfigValidation(format!(
                        "source '{name}': rir_delegated needs at least one location"
                    )));
                }
            }
        }

        if self.output.prefix.trim().is_empty() {
            return Err(ReconError::ConfigValidation("output prefix is empty".into()));
        }

        if self.opaque_report.is_some() && self.delegated_source().is_none() {
            return Err(ReconError::ConfigValidation(
                "opaque_report requires an rir_delegated source".into(),
            ));
        }

        Ok(())
    }

    /// Name of the first rir_delegated source in precedence order.
    pub fn delegated_source(&self) -> Option<&str> {
        self.precedence
            .iter()
            .find(|name| {
                matches!(
                    self.sources.get(name.as_str()).map(SourceConfig::kind),
                    Some(SourceKind::RirDelegated)
                )
            })
            .map(String::as_str)
    }

    /// Sources in precedence order.
    pub fn ranked_sources(&self) -> impl Iterator<Item = (&str, &SourceConfig)> {
        self.precedence
            .iter()
            .filter_map(|name| self.sources.get(name).map(|s| (name.as_str(), s)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
