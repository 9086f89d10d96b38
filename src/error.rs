use std::fmt;

/// Errors produced by the object model, pack ingestion and remote client.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    /// Bytes that do not follow the `"<kind> <size>\0<content>"` layout
    MalformedObject(String),
    /// Stored object that fails to inflate or whose header is inconsistent
    CorruptObject(String),
    TruncatedTree(String),
    ObjectNotFound(String),
    InvalidPackSignature,
    TruncatedPack(String),
    PackChecksumMismatch { expected: String, actual: String },
    DeltaBaseNotFound(String),
    InvalidDelta(String),
    Network(String),
    RefNotFound(String),
    CheckoutError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::MalformedObject(msg) => write!(f, "Malformed object: {}", msg),
            Error::CorruptObject(msg) => write!(f, "Corrupt object: {}", msg),
            Error::TruncatedTree(msg) => write!(f, "Truncated tree: {}", msg),
            Error::ObjectNotFound(id) => write!(f, "Object not found: {}", id),
            Error::InvalidPackSignature => write!(f, "Invalid pack signature"),
            Error::TruncatedPack(msg) => write!(f, "Truncated pack: {}", msg),
            Error::PackChecksumMismatch { expected, actual } => write!(
                f,
                "Pack checksum mismatch: trailer says {}, computed {}",
                expected, actual
            ),
            Error::DeltaBaseNotFound(base) => write!(f, "Delta base not found: {}", base),
            Error::InvalidDelta(msg) => write!(f, "Invalid delta: {}", msg),
            Error::Network(msg) => write!(f, "Network error: {}", msg),
            Error::RefNotFound(msg) => write!(f, "Ref not found: {}", msg),
            Error::CheckoutError(msg) => write!(f, "Checkout error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(e.to_string())
    }
}
