use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

/// Domain-specific error types for the pricing desk.
/// Pricing failures are always explicit: bad inputs never turn into NaN prices.
#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    #[error("invalid input: {field} = {value}")]
    InvalidInput { field: &'static str, value: f64 },

    #[error("no convergence: {0}")]
    NoConvergence(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("simulation error: {0}")]
    Simulation(String),

    #[error("channel closed: {0}")]
    ChannelClosed(String),
}

impl DeskError {
    pub fn invalid(field: &'static str, value: f64) -> Self {
        DeskError::InvalidInput { field, value }
    }

    fn status(&self) -> StatusCode {
        match self {
            DeskError::InvalidInput { .. } | DeskError::NoConvergence(_) | DeskError::Parse(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<chrono::ParseError> for DeskError {
    fn from(e: chrono::ParseError) -> Self {
        DeskError::Parse(e.to_string())
    }
}

impl IntoResponse for DeskError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub type DeskResult<T> = Result<T, DeskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_message_names_field() {
        let e = DeskError::invalid("volatility", 0.0);
        assert_eq!(e.to_string(), "invalid input: volatility = 0");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            DeskError::invalid("spot", -1.0).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            DeskError::ChannelClosed("engine".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
