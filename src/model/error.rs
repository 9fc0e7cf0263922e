//! Model error types

use thiserror::Error;

use super::widget::WidgetType;

/// Errors raised while decoding model values
#[derive(Error, Debug)]
pub enum ModelError {
    /// Widget type string is not one of the known variants
    #[error("Unknown widget type: {0}")]
    UnknownWidgetType(String),

    /// Configuration blob does not match the widget type's shape
    #[error("Invalid {widget_type} config: {error}")]
    InvalidConfig {
        widget_type: WidgetType,
        error: String,
    },

    /// Row could not be decoded into a record
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModelError::UnknownWidgetType("gauge".to_string());
        assert_eq!(err.to_string(), "Unknown widget type: gauge");

        let err = ModelError::InvalidConfig {
            widget_type: WidgetType::Kpi,
            error: "expected a number".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid kpi config: expected a number");
    }
}
