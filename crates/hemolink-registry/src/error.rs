use thiserror::Error;

/// Errors from the external registry adapter.
///
/// The transient/fatal split drives the retry policy: transient failures
/// (timeouts, transport faults, 5xx) are retried with backoff; fatal
/// failures (auth, 4xx rejections, unparseable responses) fail the sync
/// job immediately with the remote's message captured verbatim.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Registry request timed out: {0}")]
    Timeout(String),

    #[error("Registry transport error: {0}")]
    Transport(String),

    #[error("Registry server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Registry authentication failed ({status}): {message}")]
    Auth { status: u16, message: String },

    #[error("Registry rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid registry response: {0}")]
    InvalidResponse(String),

    #[error("Registry configuration error: {0}")]
    Configuration(String),
}

impl RegistryError {
    /// Transient failures are worth retrying; everything else is not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Transport(_) | Self::Server { .. }
        )
    }

    /// Classifies an HTTP status with the response body captured verbatim.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Auth {
                status,
                message: body,
            },
            400..=499 => Self::Rejected {
                status,
                message: body,
            },
            _ => Self::Server {
                status,
                message: body,
            },
        }
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(RegistryError::Timeout("t".into()).is_transient());
        assert!(RegistryError::Transport("t".into()).is_transient());
        assert!(RegistryError::from_status(503, "down".into()).is_transient());

        assert!(!RegistryError::from_status(400, "bad".into()).is_transient());
        assert!(!RegistryError::from_status(401, "no".into()).is_transient());
        assert!(!RegistryError::InvalidResponse("x".into()).is_transient());
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            RegistryError::from_status(401, "denied".into()),
            RegistryError::Auth { status: 401, .. }
        ));
        assert!(matches!(
            RegistryError::from_status(422, "schema".into()),
            RegistryError::Rejected { status: 422, .. }
        ));
        assert!(matches!(
            RegistryError::from_status(500, "boom".into()),
            RegistryError::Server { status: 500, .. }
        ));
    }

    #[test]
    fn test_remote_message_kept_verbatim() {
        let err = RegistryError::from_status(409, "Conflict: duplicate event".into());
        assert!(err.to_string().contains("Conflict: duplicate event"));
    }
}
