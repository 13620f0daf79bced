use thiserror::Error;

/// Core error types for Hemolink operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("UUID error: {0}")]
    UuidError(#[from] uuid::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    pub fn invalid_timestamp(message: impl Into<String>) -> Self {
        Self::InvalidTimestamp(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Check if this error is a client error (4xx category)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::InvalidTimestamp(_) | Self::JsonError(_)
        )
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::InvalidTimestamp(_) => ErrorCategory::Validation,
            Self::JsonError(_) => ErrorCategory::Serialization,
            Self::UuidError(_) => ErrorCategory::System,
            Self::Configuration(_) => ErrorCategory::Configuration,
        }
    }
}

/// Per-record validation failures.
///
/// These are recoverable: a batch import reports them in its `errors` list
/// and keeps going, so every message must identify the offending record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{record}: missing required field '{field}'")]
    MissingField { record: String, field: &'static str },

    #[error("{record}: {field} {value} out of range ({min}..={max})")]
    OutOfRange {
        record: String,
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{record}: invalid payload: {message}")]
    InvalidPayload { record: String, message: String },

    #[error("Donation {id}: donor {donor_id} not found")]
    DonorNotFound { id: String, donor_id: String },

    #[error("Product {id}: source donation {donation_id} not found")]
    DonationNotFound { id: String, donation_id: String },

    #[error("Screening result for donor {donor_id}: donor not found")]
    ScreeningDonorNotFound { donor_id: String },

    #[error("Donation {id}: future donation date not allowed")]
    FutureDonationDate { id: String },

    #[error("Donation {id}: donation date too old (>{max_age_days} days)")]
    DonationDateTooOld { id: String, max_age_days: i64 },

    #[error("Donation {id}: duplicate donation for donor {donor_id} on {date}")]
    DuplicateDonation {
        id: String,
        donor_id: String,
        date: String,
    },

    #[error("Product {id}: expiry date must be after collection date")]
    ExpiryBeforeCollection { id: String },

    #[error("Product {id}: blood type mismatch with source donation")]
    BloodTypeMismatch { id: String },

    #[error("Product {id}: volume exceeds source donation volume")]
    VolumeExceedsDonation { id: String },

    #[error("Product {id}: invalid temperature {temperature}°C for {product_type}")]
    InvalidTemperature {
        id: String,
        temperature: f64,
        product_type: String,
    },
}

impl ValidationError {
    pub fn missing_field(record: impl Into<String>, field: &'static str) -> Self {
        Self::MissingField {
            record: record.into(),
            field,
        }
    }

    pub fn out_of_range(
        record: impl Into<String>,
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    ) -> Self {
        Self::OutOfRange {
            record: record.into(),
            field,
            value,
            min,
            max,
        }
    }

    pub fn invalid_payload(record: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            record: record.into(),
            message: message.into(),
        }
    }

    /// True for dangling-reference failures.
    pub fn is_reference_failure(&self) -> bool {
        matches!(
            self,
            Self::DonorNotFound { .. }
                | Self::DonationNotFound { .. }
                | Self::ScreeningDonorNotFound { .. }
        )
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Serialization,
    System,
    Configuration,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Serialization => write!(f, "serialization"),
            Self::System => write!(f, "system"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages_name_the_record() {
        let err = ValidationError::DonorNotFound {
            id: "DON001".into(),
            donor_id: "D404".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("DON001"));
        assert!(msg.contains("D404"));
        assert!(msg.contains("not found"));
    }

    #[test]
    fn test_out_of_range_message() {
        let err = ValidationError::out_of_range("Donation DON001", "volume_collected", 299.0, 300.0, 500.0);
        assert_eq!(
            err.to_string(),
            "Donation DON001: volume_collected 299 out of range (300..=500)"
        );
    }

    #[test]
    fn test_reference_failure_classification() {
        assert!(
            ValidationError::ScreeningDonorNotFound {
                donor_id: "D1".into()
            }
            .is_reference_failure()
        );
        assert!(
            !ValidationError::missing_field("Donation DON001", "collection_site")
                .is_reference_failure()
        );
    }

    #[test]
    fn test_core_error_classification() {
        let err: CoreError = ValidationError::missing_field("Donor D001", "id").into();
        assert!(err.is_client_error());
        assert_eq!(err.category(), ErrorCategory::Validation);

        let err = CoreError::configuration("bad config");
        assert!(!err.is_client_error());
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{ nope }").unwrap_err();
        let err: CoreError = json_err.into();
        assert_eq!(err.category(), ErrorCategory::Serialization);
    }
}
