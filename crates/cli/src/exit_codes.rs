//! CLI Exit Code Registry
//!
//! Single source of truth for `sibas` exit codes. Scripts and cron jobs
//! rely on them, so existing values never change meaning.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 1    | General error (unspecified)                          |
//! | 2    | Usage error (bad args, unreadable config file)       |
//! | 3    | Config parsed but failed validation                  |
//! | 4    | A source could not be downloaded or read             |
//! | 5    | A source document was not in the expected format     |
//! | 6    | Output files could not be written                    |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant with the next free value
//! 2. Document what triggers it
//! 3. Update the table above

use sibas_recon::ReconError;
use sibas_sources::SourceError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, config file missing or unreadable.
pub const EXIT_USAGE: u8 = 2;

/// Config is not valid TOML or fails validation.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Download failed after retries, or a local source file is missing.
pub const EXIT_FETCH: u8 = 4;

/// Source document could not be parsed.
pub const EXIT_SOURCE_PARSE: u8 = 5;

/// Output directory or file could not be written.
pub const EXIT_OUTPUT: u8 = 6;

/// Map an engine config error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_)
        | ReconError::ConfigValidation(_)
        | ReconError::UnknownSource(_)
        | ReconError::UnrankedSource(_) => EXIT_INVALID_CONFIG,
    }
}

/// Map an adapter error to its exit code.
pub fn source_exit_code(err: &SourceError) -> u8 {
    match err {
        SourceError::Json { .. } | SourceError::Format { .. } => EXIT_SOURCE_PARSE,
        SourceError::Io(_) => EXIT_FETCH,
    }
}
