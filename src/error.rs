use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported format: {detail}")]
    Unsupported { detail: String },

    #[error("Corrupt container at offset {offset}: {detail}")]
    Corrupt { offset: u64, detail: String },

    #[error("Extraction cancelled")]
    Cancelled,
}

impl MediaError {
    pub fn unsupported(detail: impl Into<String>) -> Self {
        MediaError::Unsupported {
            detail: detail.into(),
        }
    }

    pub fn corrupt(offset: u64, detail: impl Into<String>) -> Self {
        MediaError::Corrupt {
            offset,
            detail: detail.into(),
        }
    }

    /// True for errors that indicate the bytes are not what the parser
    /// expected, as opposed to a failed read or an abort.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            MediaError::Unsupported { .. } | MediaError::Corrupt { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MediaError>;
