// sibas - sibling ASN collector
// Reconciles PeeringDB orgs, RIR opaque ids and the IPv6 Launch list into
// one set of sibling ASN groups.

mod emit;
mod exit_codes;
mod fetch;
mod load;
mod whois;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sibas_recon::ReconConfig;
use sibas_sources::as2org::{self, As2Org};

use exit_codes::{recon_exit_code, source_exit_code, EXIT_SUCCESS, EXIT_USAGE};
use fetch::read_location;

const DEFAULT_CONFIG: &str = include_str!("default.toml");

#[derive(Parser)]
#[command(name = "sibas")]
#[command(about = "Build sibling ASN groups from PeeringDB, RIR delegations and the IPv6 Launch list")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Log at debug level (otherwise SIBAS_LOG, default warn)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every source, reconcile, and write the output files
    #[command(after_help = "\
Examples:
  sibas run
  sibas run --config sibas.toml --json
  sibas run --config sibas.toml --out-dir out --date 20260101")]
    Run {
        /// TOML config (default: built-in upstream URLs)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Output directory (default: [output].dir, relative to the config)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Also write the full result as JSON
        #[arg(long)]
        json: bool,

        /// Date stamp for output file names, YYYYMMDD (default: today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Validate a config without fetching anything
    #[command(after_help = "\
Examples:
  sibas validate sibas.toml")]
    Validate {
        /// Path to the TOML config
        config: PathBuf,
    },

    /// Compare a sibling file against a CAIDA as2org snapshot
    #[command(after_help = "\
Examples:
  sibas validate-output 20170401.as-org2info.txt out/SiblingASNs_20260101.txt
  sibas validate-output as2org.txt SiblingASNs_20260101.txt --json")]
    ValidateOutput {
        /// as2org snapshot (path or URL)
        as2org: String,

        /// Sibling file written by `sibas run` (path or URL)
        siblings: String,

        /// Print the counts as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the built-in config as a starting point
    DefaultConfig,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("SIBAS_COMMIT"),
        ")",
        "\nengine:  sibas-recon ",
        env!("CARGO_PKG_VERSION"),
        "\ntarget:  ",
        env!("SIBAS_TARGET"),
    )
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("SIBAS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // Also installs the `log` bridge, so library records show up here.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            config,
            out_dir,
            json,
            date,
        } => cmd_run(config, out_dir, json, date),
        Commands::Validate { config } => cmd_validate(config),
        Commands::ValidateOutput {
            as2org,
            siblings,
            json,
        } => cmd_validate_output(&as2org, &siblings, json),
        Commands::DefaultConfig => {
            print!("{DEFAULT_CONFIG}");
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError {
            code,
            message,
            hint,
        }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self {
            code: EXIT_USAGE,
            message: msg.into(),
            hint: None,
        }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn parse_config(text: &str) -> Result<ReconConfig, CliError> {
    ReconConfig::from_toml(text).map_err(|e| CliError {
        code: recon_exit_code(&e),
        message: format!("invalid config: {e}"),
        hint: None,
    })
}

/// Load a config file. Its directory anchors relative locations.
fn read_config(path: &Path) -> Result<(ReconConfig, PathBuf), CliError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        CliError::args(format!("cannot read config {}: {e}", path.display()))
    })?;
    let config = parse_config(&text)?;
    let base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((config, base_dir))
}

fn resolve_date(date: Option<String>) -> Result<String, CliError> {
    match date {
        None => Ok(chrono::Local::now().format("%Y%m%d").to_string()),
        Some(date) => chrono::NaiveDate::parse_from_str(&date, "%Y%m%d")
            .map(|d| d.format("%Y%m%d").to_string())
            .map_err(|_| {
                CliError::args(format!("invalid --date \"{date}\"")).with_hint("expected YYYYMMDD")
            }),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_run(
    config_path: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    json: bool,
    date: Option<String>,
) -> Result<(), CliError> {
    let date = resolve_date(date)?;
    let (config, base_dir) = match config_path {
        Some(path) => read_config(&path)?,
        None => (parse_config(DEFAULT_CONFIG)?, PathBuf::from(".")),
    };
    let out_dir = out_dir.unwrap_or_else(|| base_dir.join(&config.output.dir));

    let client = fetch::FetchClient::new()?;
    let loaded = load::load_sources(&config, &base_dir, &client)?;
    let result = sibas_recon::run(&config, loaded.input);

    emit::ensure_dir(&out_dir)?;
    let txt = emit::output_path(&out_dir, &config.output.prefix, &date, "txt");
    emit::write_siblings(&txt, &result)?;
    eprintln!("wrote {}", txt.display());

    if json || config.output.json {
        let path = emit::output_path(&out_dir, &config.output.prefix, &date, "json");
        emit::write_json(&path, &result)?;
        eprintln!("wrote {}", path.display());
    }

    if let (Some(report), Some((partition, registry_of))) =
        (&config.opaque_report, loaded.delegated)
    {
        let resolver = load::org_resolver(report, &base_dir, &client, registry_of)?;
        let path = emit::output_path(&out_dir, &report.prefix, &date, "txt");
        emit::write_opaque_report(&path, &partition, &resolver)?;
        eprintln!("wrote {} ({} opaque-id groups)", path.display(), partition.group_count());
    }

    let s = &result.summary;
    eprintln!(
        "{}: {} sibling groups over {} ASNs (largest {}), {} cross-source links, {} diagnostics",
        result.meta.config_name,
        s.sibling_groups,
        s.asns_seen - s.singletons,
        s.largest_group,
        s.cross_links,
        s.diagnostics,
    );
    for source in &s.sources {
        tracing::info!(
            "{}: {} groups, {} signal joins, {} merged into higher",
            source.name,
            source.groups,
            source.signal_joins,
            source.merged_into_higher,
        );
    }

    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let (config, _) = read_config(&config_path)?;
    eprintln!(
        "valid: '{}' with {} source(s), precedence {}{}",
        config.name,
        config.sources.len(),
        config.precedence.join(" > "),
        if config.opaque_report.is_some() {
            ", opaque-id report"
        } else {
            ""
        },
    );
    Ok(())
}

fn cmd_validate_output(as2org: &str, siblings: &str, json: bool) -> Result<(), CliError> {
    let client = fetch::FetchClient::new()?;
    let base_dir = Path::new(".");
    let table = read_location(&client, base_dir, as2org)?;
    let table = As2Org::parse(&table).map_err(|e| CliError {
        code: source_exit_code(&e),
        message: e.to_string(),
        hint: Some("expected a CAIDA as-org2info file".into()),
    })?;
    let groups = emit::parse_sibling_lines(&read_location(&client, base_dir, siblings)?);
    let agreement = as2org::compare(&table, &groups);

    if json {
        let text = serde_json::to_string_pretty(&agreement).map_err(|e| CliError {
            code: exit_codes::EXIT_ERROR,
            message: format!("JSON serialization error: {e}"),
            hint: None,
        })?;
        println!("{text}");
    } else {
        println!(
            "{} of {} sibling groups disagree with as2org ({} as2org orgs with siblings)",
            agreement.disagreeing, agreement.groups, agreement.orgs_with_siblings,
        );
    }
    Ok(())
}
