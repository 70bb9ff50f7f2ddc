use devpulse_core::Platform;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FetchError>;

/// Upper bound on the upstream error body kept in a [`FetchError::Status`].
const MAX_BODY_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{platform} is not configured: missing {missing}")]
    NotConfigured { platform: Platform, missing: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl FetchError {
    pub fn not_configured(platform: Platform, missing: impl Into<String>) -> Self {
        FetchError::NotConfigured {
            platform,
            missing: missing.into(),
        }
    }

    pub(crate) fn status(code: u16, body: String) -> Self {
        let body = if body.chars().count() > MAX_BODY_CHARS {
            let cut: String = body.chars().take(MAX_BODY_CHARS).collect();
            format!("{}...", cut)
        } else {
            body
        };
        FetchError::Status { code, body }
    }

    /// True when the failure is a local configuration problem rather than an
    /// upstream one.
    pub fn is_not_configured(&self) -> bool {
        matches!(self, FetchError::NotConfigured { .. })
    }

    /// True when the request was refused before contacting the platform:
    /// missing configuration or unusable request parameters.
    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            FetchError::NotConfigured { .. } | FetchError::InvalidRequest(_)
        )
    }
}
