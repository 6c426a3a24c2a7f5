use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::errors::Result;

/// Channel index used for every recording request.
pub const DEFAULT_CHANNEL: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingWindow {
    pub pre_period_ms: i64,
    pub post_period_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingRequest {
    pub timestamp_ms: i64,
    pub camera_guid: String,
    pub channel_id: u32,
    /// `None` leaves the window to the NVR's defaults.
    pub window: Option<RecordingWindow>,
}

/// Body and declared content type of an NVR reply, kept as-is.
#[derive(Debug, Clone)]
pub struct NvrResponse {
    pub content_type: Option<String>,
    pub body: Bytes,
}

#[async_trait]
pub trait NvrClient: Send + Sync {
    async fn list_cameras(&self) -> Result<Value>;
    async fn get_recording(&self, request: &RecordingRequest) -> Result<NvrResponse>;

    /// Writes a fetched recording to `path` and returns where it landed.
    async fn save_recording(&self, recording: &NvrResponse, path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, &recording.body).await?;
        Ok(path.to_path_buf())
    }
}

/// Opens one authenticated client handle per call.
#[async_trait]
pub trait NvrConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn NvrClient>>;
}

pub mod qvr_pro {
    use super::*;
    use crate::config::NvrSettings;
    use crate::errors::ProxyError;
    use base64::engine::general_purpose::STANDARD as B64;
    use base64::Engine as _;
    use reqwest::header::CONTENT_TYPE;
    use tracing::{debug, trace};
    use url::Url;

    const LOGIN_PATH: &str = "/cgi-bin/authLogin.cgi";
    const API_PREFIX: &str = "/qvrpro";

    #[derive(Clone)]
    pub struct QvrProConnector {
        settings: NvrSettings,
        client: reqwest::Client,
    }

    impl QvrProConnector {
        pub fn new(settings: NvrSettings) -> Result<Self> {
            let client = reqwest::Client::builder()
                .use_rustls_tls()
                .danger_accept_invalid_certs(!settings.verify_ssl)
                .build()?;
            Ok(Self { settings, client })
        }

        async fn login(&self, base_url: &Url) -> Result<String> {
            let url = base_url.join(LOGIN_PATH)?;
            debug!(target: "qvr_pro", endpoint = %url, user = %self.settings.username, "Logging in to QVR Pro");
            let res = self
                .client
                .get(url)
                .query(&[
                    ("act", "login"),
                    ("user", self.settings.username.as_str()),
                    ("pwd", B64.encode(self.settings.password.as_bytes()).as_str()),
                ])
                .send()
                .await
                .map_err(|e| ProxyError::login(format!("QVR Pro login request failed: {}", e)))?;
            let status = res.status();
            let text = res
                .text()
                .await
                .map_err(|e| ProxyError::login(format!("could not read login response: {}", e)))?;
            trace!(target: "qvr_pro", status = %status, response = %text, "Login response body");
            if !status.is_success() {
                return Err(ProxyError::login(format!("bad status {}", status)));
            }
            extract_auth_sid(&text).ok_or_else(|| ProxyError::login("no session id in login response"))
        }
    }

    #[async_trait]
    impl NvrConnector for QvrProConnector {
        async fn connect(&self) -> Result<Box<dyn NvrClient>> {
            let base_url = base_url(&self.settings)?;
            let sid = self.login(&base_url).await?;
            Ok(Box::new(QvrProClient {
                base_url,
                client: self.client.clone(),
                sid,
            }))
        }
    }

    pub struct QvrProClient {
        base_url: Url,
        client: reqwest::Client,
        sid: String,
    }

    impl QvrProClient {
        fn endpoint(&self, path: &str) -> Result<Url> {
            Ok(self.base_url.join(&format!("{}{}", API_PREFIX, path))?)
        }

        async fn get(&self, url: Url, params: &[(&str, String)]) -> Result<reqwest::Response> {
            debug!(target: "qvr_pro", endpoint = %url, "Sending QVR Pro request");
            let res = self
                .client
                .get(url.clone())
                .query(&[("sid", self.sid.as_str())])
                .query(params)
                .send()
                .await
                .map_err(|e| {
                    debug!(target: "qvr_pro", endpoint = %url, error = %e, "QVR Pro HTTP error");
                    ProxyError::nvr(format!("QVR Pro HTTP error: {}", e))
                })?;
            debug!(target: "qvr_pro", endpoint = %url, status = %res.status(), "QVR Pro response received");
            Ok(res)
        }
    }

    #[async_trait]
    impl NvrClient for QvrProClient {
        async fn list_cameras(&self) -> Result<Value> {
            let res = self.get(self.endpoint("/camera/list")?, &[]).await?;
            let body = res.bytes().await?;
            serde_json::from_slice(&body)
                .map_err(|e| ProxyError::nvr(format!("camera list is not JSON: {}", e)))
        }

        async fn get_recording(&self, request: &RecordingRequest) -> Result<NvrResponse> {
            let url = recording_url(&self.base_url, request)?;
            let res = self.get(url, &recording_params(request)).await?;
            let content_type = res
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = res.bytes().await?;
            trace!(target: "qvr_pro", content_type = ?content_type, len = body.len(), "Recording payload");
            Ok(NvrResponse { content_type, body })
        }
    }

    pub fn base_url(settings: &NvrSettings) -> Result<Url> {
        if settings.host.is_empty() {
            return Err(ProxyError::config("QVRPRO_HOST is not set"));
        }
        Ok(Url::parse(&format!(
            "{}://{}:{}",
            settings.protocol, settings.host, settings.port
        ))?)
    }

    /// `/qvrpro/camera/recordingfile/<guid>/<channel>` with each segment percent-encoded.
    pub fn recording_url(base_url: &Url, request: &RecordingRequest) -> Result<Url> {
        let mut url = base_url.clone();
        let channel = request.channel_id.to_string();
        url.path_segments_mut()
            .map_err(|_| ProxyError::nvr(format!("cannot build a recording path on {}", base_url)))?
            .pop_if_empty()
            .extend([
                API_PREFIX.trim_start_matches('/'),
                "camera",
                "recordingfile",
                request.camera_guid.as_str(),
                channel.as_str(),
            ]);
        Ok(url)
    }

    pub fn recording_params(request: &RecordingRequest) -> Vec<(&'static str, String)> {
        let mut params = vec![("time", request.timestamp_ms.to_string())];
        if let Some(window) = request.window {
            params.push(("pre_period", window.pre_period_ms.to_string()));
            params.push(("post_period", window.post_period_ms.to_string()));
        }
        params
    }

    /// Pulls the session id out of the `authLogin.cgi` XML reply.
    pub fn extract_auth_sid(xml: &str) -> Option<String> {
        let start = xml.find("<authSid>")? + "<authSid>".len();
        let end = start + xml[start..].find("</authSid>")?;
        let raw = xml[start..end].trim();
        let sid = raw
            .strip_prefix("<![CDATA[")
            .and_then(|s| s.strip_suffix("]]>"))
            .unwrap_or(raw)
            .trim();
        (!sid.is_empty()).then(|| sid.to_string())
    }

}
