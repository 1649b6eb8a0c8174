use thiserror::Error;

/// Errors raised by the strict extraction policy.
///
/// A missing source column or a malformed mandatory field means a structural
/// assumption about the scraped data no longer holds, so these propagate
/// instead of being coerced to null.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("no \"{0}\" column in input data")]
    MissingColumn(String),

    #[error("one or many of these columns are missing: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("cannot parse \"{0}\" as a short-form number")]
    InvalidNumber(String),

    #[error("malformed \"{field}\" value: {value}")]
    InvalidField { field: &'static str, value: String },
}

impl EtlError {
    pub fn missing_column(name: &str) -> Self {
        Self::MissingColumn(name.to_string())
    }

    pub fn invalid_field(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            value: value.into(),
        }
    }
}
