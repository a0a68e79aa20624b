use std::fmt;

/// Configuration errors. The engine itself has no failure paths: any
/// well-typed input produces a valid partition.
#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty precedence, missing locations, etc.).
    ConfigValidation(String),
    /// A precedence entry names a source that is not configured.
    UnknownSource(String),
    /// A configured source is missing from the precedence list.
    UnrankedSource(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::UnknownSource(name) => {
                write!(f, "precedence references unknown source '{name}'")
            }
            Self::UnrankedSource(name) => {
                write!(f, "source '{name}' is configured but missing from precedence")
            }
        }
    }
}

impl std::error::Error for ReconError {}
