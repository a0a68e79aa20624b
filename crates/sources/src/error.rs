use std::fmt;

#[derive(Debug)]
pub enum SourceError {
    /// Document is not valid JSON or does not have the expected shape.
    Json { source: String, message: String },
    /// Document is not in the expected delimited text format.
    Format { source: String, message: String },
    /// IO error while reading a local dump.
    Io(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json { source, message } => write!(f, "{source}: invalid JSON: {message}"),
            Self::Format { source, message } => write!(f, "{source}: {message}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<std::io::Error> for SourceError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
