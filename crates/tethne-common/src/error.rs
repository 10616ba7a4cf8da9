use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TethneError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed input file. `line` is 1-based when known.
    #[error("Input format error in {}{}: {message}", .path.display(), .line.map(|l| format!(" (line {l})")).unwrap_or_default())]
    InputFormat {
        path: PathBuf,
        line: Option<usize>,
        message: String,
    },

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Inconsistent data: {0}")]
    Inconsistency(String),

    #[error("Could not construct features for paper {paper}: {message}")]
    Construction { paper: String, message: String },

    #[error("{program} exited with {status}; workdir kept at {}\n{stderr_tail}", .workdir.display())]
    Subprocess {
        program: String,
        status: String,
        stderr_tail: String,
        workdir: PathBuf,
    },

    #[error("Expected output file is missing: {}", .path.display())]
    MissingOutput { path: PathBuf },

    #[error("Citation graph contains a cycle through: {}", .0.join(" -> "))]
    CitationCycle(Vec<String>),

    #[error("Unknown graph algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TethneError {
    pub fn input_format(path: impl Into<PathBuf>, line: Option<usize>, message: impl Into<String>) -> Self {
        TethneError::InputFormat {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TethneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_format_message_includes_line() {
        let err = TethneError::input_format("records.txt", Some(12), "bad tag");
        assert_eq!(err.to_string(), "Input format error in records.txt (line 12): bad tag");
    }

    #[test]
    fn test_input_format_message_without_line() {
        let err = TethneError::input_format("seq.dat", None, "empty");
        assert_eq!(err.to_string(), "Input format error in seq.dat: empty");
    }

    #[test]
    fn test_cycle_message_lists_path() {
        let err = TethneError::CitationCycle(vec!["A".into(), "B".into(), "A".into()]);
        assert!(err.to_string().ends_with("A -> B -> A"));
    }
}
