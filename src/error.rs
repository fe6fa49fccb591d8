use thiserror::Error;

/// Errors raised while generating node-side commands.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("{operation} is not supported for the {runtime} runtime")]
    Unsupported {
        runtime: &'static str,
        operation: &'static str,
    },

    #[error("Invalid {kind} '{value}': refusing to embed it in a shell script")]
    InvalidIdentifier { kind: &'static str, value: String },

    #[error("Failed to extract pid from inspection output: {0}")]
    PidExtraction(String),
}

/// Errors reported by the control-plane client.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Failed to create privileged pod on node '{node}': {reason}")]
    PodCreation { node: String, reason: String },

    #[error("Command in pod '{pod}' failed with exit code {exit_code}")]
    Exec { pod: String, exit_code: i32 },

    #[error("Failed to delete pod '{pod}': {reason}")]
    PodDeletion { pod: String, reason: String },

    #[error("Lookup failed: {0}")]
    Lookup(String),

    #[error("kubectl I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Command cancelled")]
    Cancelled,
}

impl ClientError {
    /// Exit code of the remote process, when one is known.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ClientError::Exec { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}

/// Errors surfaced by a capture session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session setup failed: {0}")]
    Setup(#[source] ClientError),

    #[error("Capture failed: {source}")]
    Capture {
        exit_code: Option<i32>,
        #[source]
        source: ClientError,
    },

    #[error("Failed to build command: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Failed to inspect target container: {source}")]
    PidResolution {
        exit_code: Option<i32>,
        #[source]
        source: ClientError,
    },

    #[error("Failed to remove privileged pod: {0}")]
    Teardown(#[source] ClientError),

    #[error("Invalid session transition: {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
}

impl SessionError {
    /// Exit code attached to a failed remote command.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            SessionError::Capture { exit_code, .. }
            | SessionError::PidResolution { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config error: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
