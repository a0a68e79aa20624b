//! Output files for `sibas run`.
//!
//! - `<prefix>_<date>.txt`: one sibling group per line, `label|asn asn ...`
//! - `<prefix>_<date>.json`: the full reconciliation result
//! - opaque-id report: `asn asn ...|org<TAB>org ...`, one org per ASN
//!
//! `parse_sibling_lines` reads the first format back for `validate-output`.

use std::path::{Path, PathBuf};

use sibas_recon::{Asn, ReconResult, SiblingGroup, SourcePartition};
use sibas_sources::whois::OrgResolver;

use crate::exit_codes;
use crate::CliError;

pub fn output_path(dir: &Path, prefix: &str, date: &str, ext: &str) -> PathBuf {
    dir.join(format!("{prefix}_{date}.{ext}"))
}

/// Labels must not break the `|`-separated line format.
fn clean_label(label: &str) -> String {
    label
        .chars()
        .map(|c| if c == '|' || c.is_control() { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

fn join_asns<'a>(asns: impl IntoIterator<Item = &'a u32>) -> String {
    asns.into_iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn sibling_lines(groups: &[SiblingGroup]) -> String {
    let mut out = String::new();
    for group in groups {
        out.push_str(&clean_label(&group.display_label()));
        out.push('|');
        out.push_str(&join_asns(&group.asns));
        out.push('\n');
    }
    out
}

/// Read a sibling file back into ASN groups. Lines without a `|` are
/// skipped, as are tokens that are not ASNs.
pub fn parse_sibling_lines(text: &str) -> Vec<Vec<Asn>> {
    text.lines()
        .filter_map(|line| line.rsplit_once('|'))
        .map(|(_, asns)| asns.split_whitespace().filter_map(|t| t.parse::<Asn>().ok()).collect::<Vec<_>>())
        .filter(|asns| !asns.is_empty())
        .collect()
}

/// One line per opaque-id group, members ascending. ASNs without a known
/// org handle are written as `AS<asn>`.
pub fn opaque_lines(partition: &SourcePartition, resolver: &OrgResolver) -> String {
    let mut out = String::new();
    for group in partition.groups.values() {
        let orgs: Vec<String> = group
            .iter()
            .map(|&asn| {
                resolver
                    .find_org_id(asn)
                    .map(|org| clean_label(&org))
                    .filter(|org| !org.is_empty())
                    .unwrap_or_else(|| format!("AS{asn}"))
            })
            .collect();
        out.push_str(&join_asns(group));
        out.push('|');
        out.push_str(&orgs.join("\t"));
        out.push('\n');
    }
    out
}

fn write_file(path: &Path, contents: &str) -> Result<(), CliError> {
    std::fs::write(path, contents).map_err(|e| CliError {
        code: exit_codes::EXIT_OUTPUT,
        message: format!("cannot write {}: {e}", path.display()),
        hint: None,
    })
}

pub fn ensure_dir(dir: &Path) -> Result<(), CliError> {
    std::fs::create_dir_all(dir).map_err(|e| CliError {
        code: exit_codes::EXIT_OUTPUT,
        message: format!("cannot create {}: {e}", dir.display()),
        hint: None,
    })
}

pub fn write_siblings(path: &Path, result: &ReconResult) -> Result<(), CliError> {
    write_file(path, &sibling_lines(&result.groups))
}

pub fn write_json(path: &Path, result: &ReconResult) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(result).map_err(|e| CliError {
        code: exit_codes::EXIT_ERROR,
        message: format!("JSON serialization error: {e}"),
        hint: None,
    })?;
    write_file(path, &json)
}

pub fn write_opaque_report(
    path: &Path,
    partition: &SourcePartition,
    resolver: &OrgResolver,
) -> Result<(), CliError> {
    write_file(path, &opaque_lines(partition, resolver))
}
