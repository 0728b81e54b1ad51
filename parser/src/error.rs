use thiserror::Error;

/// Broad classification of a replay decoding failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The file is not a replay container at all.
    Format,
    /// The metadata section ends early or holds malformed JSON.
    TruncatedData,
    /// The encrypted tail or the packet stream inside it is damaged.
    CorruptPayload,
    /// The caller supplied an unusable option.
    InvalidInput,
    Io,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("bad replay signature: expected {expected:02x?}, found {found:02x?}")]
    Format { expected: [u8; 4], found: Vec<u8> },
    #[error("replay metadata truncated: {reason}")]
    TruncatedData { reason: String },
    #[error("metadata block {index} is not valid JSON")]
    MalformedMetadata {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("corrupt replay payload: {reason}")]
    CorruptPayload { reason: String },
    #[error("failed to inflate decrypted replay payload")]
    Inflate(#[source] std::io::Error),
    #[error(
        "packet at offset {offset} declares {needed} payload bytes but only {remaining} remain"
    )]
    PacketFraming {
        offset: usize,
        needed: usize,
        remaining: usize,
    },
    #[error("sample interval must be a positive number of seconds, got {0}")]
    InvalidSampleInterval(f32),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Format { .. } => ErrorKind::Format,
            Error::TruncatedData { .. } | Error::MalformedMetadata { .. } => {
                ErrorKind::TruncatedData
            }
            Error::CorruptPayload { .. } | Error::Inflate(_) | Error::PacketFraming { .. } => {
                ErrorKind::CorruptPayload
            }
            Error::InvalidSampleInterval(_) => ErrorKind::InvalidInput,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn truncated(reason: impl Into<String>) -> Self {
        Error::TruncatedData {
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Error::CorruptPayload {
            reason: reason.into(),
        }
    }
}
