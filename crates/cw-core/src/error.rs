use crate::types::Language;

#[derive(thiserror::Error, Debug)]
pub enum WorkerError {
    #[error("Blob '{0}' not found")]
    BlobNotFound(String),

    #[error("Blob '{key}' fetch failed: {message}")]
    BlobFetch { key: String, message: String },

    #[error("Worker serves '{configured}' but the job requests '{requested}'")]
    LanguageMismatch {
        configured: Language,
        requested: Language,
    },
}

impl WorkerError {
    /// Blob-not-found maps to FILE_ERROR; every other failure on the
    /// fetch path is internal.
    pub fn is_blob_not_found(&self) -> bool {
        matches!(self, Self::BlobNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_blob_not_found() {
        let err = WorkerError::BlobNotFound("code/123".into());
        assert_eq!(err.to_string(), "Blob 'code/123' not found");
        assert!(err.is_blob_not_found());
    }

    #[test]
    fn test_display_blob_fetch() {
        let err = WorkerError::BlobFetch {
            key: "in/1".into(),
            message: "connection refused".into(),
        };
        assert_eq!(
            err.to_string(),
            "Blob 'in/1' fetch failed: connection refused"
        );
        assert!(!err.is_blob_not_found());
    }

    #[test]
    fn test_display_language_mismatch() {
        let err = WorkerError::LanguageMismatch {
            configured: Language::C,
            requested: Language::Go,
        };
        assert_eq!(err.to_string(), "Worker serves 'c' but the job requests 'go'");
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WorkerError>();
    }
}
