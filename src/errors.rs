use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Camera GUID not provided and unable to retrieve camera GUID")]
    CameraNotFound,

    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    #[error("NVR login failed: {message}")]
    Login { message: String },

    #[error("NVR error: {message}")]
    Nvr { message: String },

    /// JSON error document returned by the NVR, passed on untouched.
    #[error("NVR rejected the request: {}", String::from_utf8_lossy(.body))]
    Upstream { body: Bytes },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("URL parse error: {source}")]
    UrlParse {
        #[from]
        source: url::ParseError,
    },

    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("HTTP client error: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },
}

impl ProxyError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter { message: message.into() }
    }

    pub fn login(message: impl Into<String>) -> Self {
        Self::Login { message: message.into() }
    }

    pub fn nvr(message: impl Into<String>) -> Self {
        Self::Nvr { message: message.into() }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::CameraNotFound | ProxyError::Upstream { .. } => StatusCode::NOT_FOUND,
            ProxyError::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
            ProxyError::Login { .. }
            | ProxyError::Nvr { .. }
            | ProxyError::Http { .. }
            | ProxyError::UrlParse { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::warn!(status = %status, "Request failed: {}", self);
        match self {
            ProxyError::Upstream { body } => {
                (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
            }
            other => (status, Json(serde_json::json!({ "error": other.to_string() }))).into_response(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
