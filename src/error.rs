use thiserror::Error;

/// Every failure between a trigger and a write-back ends up as exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolishError {
    #[error("No editable text field is focused")]
    NoEligibleTarget,

    #[error("Nothing to polish: the text is empty")]
    EmptyInput,

    #[error("API key is not configured")]
    NotConfigured,

    #[error("API endpoint is not a valid URL: {0}")]
    InvalidEndpoint(String),

    #[error("{message}")]
    UpstreamError { status_code: u16, message: String },

    #[error("Request timed out, please retry")]
    Timeout,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("The service returned no usable text")]
    EmptyUpstreamResult,

    #[error("Accessibility access has not been granted to polish-rs")]
    AccessibilityNotGranted,

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl PolishError {
    /// Builds the upstream variant with the message for the status class.
    pub fn upstream(status_code: u16, body: &str) -> Self {
        let message = match status_code {
            401 => "API key is invalid, check your configuration".to_string(),
            429 => "Rate limited by the API, try again shortly".to_string(),
            500 | 502 | 503 => "The completion service is temporarily unavailable".to_string(),
            _ => serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|value| {
                    value
                        .pointer("/error/message")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                })
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| format!("API error ({status_code})")),
        };

        Self::UpstreamError {
            status_code,
            message,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NoEligibleTarget => "no_eligible_target",
            Self::EmptyInput => "empty_input",
            Self::NotConfigured => "not_configured",
            Self::InvalidEndpoint(_) => "invalid_endpoint",
            Self::UpstreamError { .. } => "upstream_error",
            Self::Timeout => "timeout",
            Self::NetworkError(_) => "network_error",
            Self::EmptyUpstreamResult => "empty_upstream_result",
            Self::AccessibilityNotGranted => "accessibility_not_granted",
            Self::Unknown(_) => "unknown",
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::UpstreamError { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Errors the user fixes in settings rather than by retrying.
    pub fn offers_configuration(&self) -> bool {
        matches!(self, Self::NotConfigured | Self::AccessibilityNotGranted)
    }
}
