use thiserror::Error;
use std::io;

/// Generic error type
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The requested primitive is not supplied by the crypto provider
    #[error("Algorithm unavailable: {0}")]
    AlgorithmUnavailable(String),

    /// Extension encoding or decoding failed
    #[error("Malformed extension: {0}")]
    MalformedExtension(String),

    /// Signing operation failed
    #[error("Signature failure: {0}")]
    SignatureFailure(String),

    /// Delta certificate round trip does not reproduce the delta
    #[error("Reconstruction mismatch: {0}")]
    ReconstructionMismatch(String),

    /// DER encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Certificate error
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// Artifact emission error
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Failure while building a named target
    #[error("Failed to build {target}: {source}")]
    Build {
        /// Certificate, strategy or pairing being built
        target: String,
        /// Underlying cause
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap an error with the target that was being built
    pub fn building(target: impl Into<String>) -> impl FnOnce(Error) -> Error {
        let target = target.into();
        move |source| Error::Build {
            target,
            source: Box::new(source),
        }
    }

    /// Innermost error, skipping `Build` wrappers
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Build { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<der::Error> for Error {
    fn from(err: der::Error) -> Self {
        Error::Encoding(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(format!("YAML error: {}", err))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Internal(format!("Build task failed: {}", err))
    }
}
