//! Client error types.

use std::process::ExitStatus;
use thiserror::Error;

/// Failure of one build expression, or of the run that contains it.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no main program found for {expr}; the package needs meta.mainProgram defined")]
    MissingMainProgram { expr: String },

    #[error("{expr} produced {count} outputs; only single-output packages are supported")]
    UnsupportedOutputs { expr: String, count: usize },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`nix {command}` failed ({status})")]
    NixFailed { command: String, status: ExitStatus },

    #[error("unexpected output from `nix {command}`: {source}")]
    Decode {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("build task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;

/// Failure talking to the package registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid registry url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("failed to connect to registry: {0}")]
    Connect(#[source] tonic::transport::Error),

    #[error("registry call failed: {}", .0.message())]
    Status(#[from] tonic::Status),
}

/// Failure to establish the store subscription.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to watch {path}: {source}")]
    Subscribe {
        path: String,
        #[source]
        source: notify::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_expression() {
        let err = BuildError::MissingMainProgram {
            expr: ".#hello".to_string(),
        };
        assert!(err.to_string().contains(".#hello"));
        assert!(err.to_string().contains("mainProgram"));

        let err = BuildError::UnsupportedOutputs {
            expr: ".#multi".to_string(),
            count: 2,
        };
        assert!(err.to_string().contains("2 outputs"));
    }

    #[test]
    fn test_status_message_is_surfaced() {
        let err = BuildError::from(RegistryError::from(tonic::Status::invalid_argument(
            "package hello has no main program",
        )));
        assert_eq!(
            err.to_string(),
            "registry call failed: package hello has no main program"
        );
    }
}
