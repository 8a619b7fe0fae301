use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] msgate_core::ConfigError),

    #[error("command error: {0}")]
    Command(String),

    #[error("could not read bulk jobs from {path}: {source}")]
    BulkInput {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Command(_) | Self::BulkInput { .. } => 2,
            Self::Serialization(_) => 4,
            Self::Config(_) => 7,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_exit_with_dedicated_code() {
        let error = CliError::from(msgate_core::ConfigError::Invalid(String::from("empty")));
        assert_eq!(error.exit_code(), 7);
        assert_eq!(CliError::Command(String::from("bad")).exit_code(), 2);
    }
}
