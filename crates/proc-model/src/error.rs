/// Severity levels carried by `processing_errors` rows (spec.md §3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("raw_data is not a JSON object")]
    NotAnObject,
    #[error("unknown shop type {0:?}")]
    UnknownShopType(String),
    #[error("field {0:?} is required but missing")]
    MissingField(String),
    #[error("field {field:?} has the wrong type: expected {expected}, found {found}")]
    TypeError {
        field: String,
        expected: &'static str,
        found: String,
    },
}

/// Tagged error kinds, one per spec.md §7 row. Carried as `error_type` on
/// `processing_errors` rows; no subclass hierarchy (§9 "class inheritance
/// for errors → tagged variants").
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    ValidationError,
    TransformationError,
    StructureViolation,
    BatchProcessingFailure,
    DatabaseError,
    JobLifecycleError,
    WebhookDeliveryFailure,
}

impl ErrorKind {
    /// The `error_type` string stored on `processing_errors` rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::TransformationError => "TRANSFORMATION_ERROR",
            ErrorKind::StructureViolation => "STRUCTURE_VIOLATION",
            ErrorKind::BatchProcessingFailure => "BATCH_PROCESSING_FAILURE",
            ErrorKind::DatabaseError => "DATABASE_ERROR",
            ErrorKind::JobLifecycleError => "JOB_LIFECYCLE_ERROR",
            ErrorKind::WebhookDeliveryFailure => "WEBHOOK_DELIVERY_FAILURE",
        }
    }

    /// Severity mapping (spec.md §4.4 "Severity mapping"). `required_field`
    /// only matters for `ValidationError`, where a missing required field is
    /// `high` rather than `medium`.
    pub fn severity(&self, missing_required_field: bool) -> Severity {
        match self {
            ErrorKind::ValidationError => {
                if missing_required_field {
                    Severity::High
                } else {
                    Severity::Medium
                }
            }
            ErrorKind::StructureViolation => Severity::Critical,
            ErrorKind::TransformationError => Severity::High,
            ErrorKind::BatchProcessingFailure => Severity::High,
            ErrorKind::DatabaseError => Severity::High,
            ErrorKind::JobLifecycleError => Severity::Medium,
            ErrorKind::WebhookDeliveryFailure => Severity::Low,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured, loggable processing error shared across crates (spec.md
/// §7). `details` carries structured context (job id, batch, row id); the
/// raw payload is never placed in `details` when redaction is configured
/// (the caller, not this type, enforces that policy).
#[derive(Debug, Clone, thiserror::Error, serde::Serialize, serde::Deserialize)]
#[error("{kind}: {message}")]
pub struct ProcessingError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default)]
    pub details: serde_json::Value,
    pub severity: Severity,
}

impl ProcessingError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let severity = kind.severity(false);
        ProcessingError {
            kind,
            message: message.into(),
            details: serde_json::Value::Null,
            severity,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}
