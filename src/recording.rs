use std::path::PathBuf;
use bytes::Bytes;
use chrono::{Local, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::camera_resolver::CameraResolver;
use crate::errors::{ProxyError, Result};
use crate::nvr::{NvrClient, NvrResponse, RecordingRequest, RecordingWindow, DEFAULT_CHANNEL};
use crate::utils::{local_recording_filename, now_timestamp_ms, offset_timestamp_ms};

pub const DEFAULT_PRE_PERIOD_SECS: i64 = 10;
pub const DEFAULT_POST_PERIOD_SECS: i64 = 1;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_MP4: &str = "video/mp4";

/// Query parameters of a clip request, all in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordingParams {
    pub pre_period: Option<i64>,
    pub post_period: Option<i64>,
    pub offset: Option<i64>,
}

impl RecordingParams {
    pub fn window(&self) -> Result<RecordingWindow> {
        Ok(RecordingWindow {
            pre_period_ms: secs_to_ms("pre_period", self.pre_period.unwrap_or(DEFAULT_PRE_PERIOD_SECS))?,
            post_period_ms: secs_to_ms("post_period", self.post_period.unwrap_or(DEFAULT_POST_PERIOD_SECS))?,
        })
    }

    pub fn offset_secs(&self) -> i64 {
        self.offset.unwrap_or(0)
    }
}

fn secs_to_ms(name: &str, secs: i64) -> Result<i64> {
    secs.checked_mul(1000)
        .ok_or_else(|| ProxyError::invalid_parameter(format!("{} out of range: {}", name, secs)))
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordingOutcome {
    Video(Bytes),
    /// The NVR answered with a JSON error document; the body is kept verbatim.
    UpstreamError(Bytes),
    Unexpected { content_type: Option<String> },
}

/// Sorts an NVR reply by its declared media type, ignoring parameters
/// such as `charset`.
pub fn classify(response: NvrResponse) -> RecordingOutcome {
    let essence = response
        .content_type
        .as_deref()
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());

    match essence.as_deref() {
        Some(CONTENT_TYPE_JSON) => RecordingOutcome::UpstreamError(response.body),
        Some(CONTENT_TYPE_MP4) => RecordingOutcome::Video(response.body),
        _ => RecordingOutcome::Unexpected { content_type: response.content_type },
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GeneratedRecording {
    pub full_path: String,
    pub filename: String,
}

#[derive(Clone)]
pub struct RecordingManager {
    recording_dir: PathBuf,
    cameras: CameraResolver,
}

impl RecordingManager {
    pub fn new(recording_dir: PathBuf, cameras: CameraResolver) -> Self {
        Self { recording_dir, cameras }
    }

    pub fn recording_dir(&self) -> &PathBuf {
        &self.recording_dir
    }

    /// Fetches a clip around `now + offset` for the resolved camera.
    pub async fn fetch_recording(
        &self,
        client: &dyn NvrClient,
        params: RecordingParams,
    ) -> Result<RecordingOutcome> {
        let camera_guid = self
            .cameras
            .resolve(client)
            .await
            .ok_or(ProxyError::CameraNotFound)?;

        let window = params.window()?;
        let offset = params.offset_secs();
        let timestamp = offset_timestamp_ms(Utc::now(), offset)
            .ok_or_else(|| ProxyError::invalid_parameter(format!("offset out of range: {}", offset)))?;

        info!(
            request_time = %Local::now().format("%Y-%m-%d_%H:%M:%S"),
            timestamp,
            pre_period = window.pre_period_ms,
            post_period = window.post_period_ms,
            offset,
            "Requesting recording"
        );

        let response = client
            .get_recording(&RecordingRequest {
                timestamp_ms: timestamp,
                camera_guid,
                channel_id: DEFAULT_CHANNEL,
                window: Some(window),
            })
            .await?;

        let outcome = classify(response);
        match &outcome {
            RecordingOutcome::UpstreamError(body) => {
                error!(
                    error_response = %String::from_utf8_lossy(body),
                    timestamp,
                    pre_period = window.pre_period_ms,
                    post_period = window.post_period_ms,
                    offset,
                    "NVR returned an error instead of a recording"
                );
            }
            RecordingOutcome::Unexpected { content_type } => {
                warn!(content_type = ?content_type, timestamp, "NVR returned an unexpected content type");
            }
            RecordingOutcome::Video(body) => {
                debug!(bytes = body.len(), timestamp, "Recording received");
            }
        }
        Ok(outcome)
    }

    /// Fetches a clip at the current time with the NVR's default window and
    /// stores it under the recording directory.
    pub async fn generate_recording(&self, client: &dyn NvrClient) -> Result<GeneratedRecording> {
        // An unresolved camera is handed to the NVR as-is and its reply is saved unchecked.
        let camera_guid = self.cameras.resolve(client).await.unwrap_or_default();

        let filename = local_recording_filename();
        let filepath = self.recording_dir.join(&filename);
        let timestamp = now_timestamp_ms();

        let recording = client
            .get_recording(&RecordingRequest {
                timestamp_ms: timestamp,
                camera_guid: camera_guid.clone(),
                channel_id: DEFAULT_CHANNEL,
                window: None,
            })
            .await?;

        debug!(content_type = ?recording.content_type, timestamp, "Persisting recording");
        let saved = client.save_recording(&recording, &filepath).await?;
        info!(path = %saved.display(), camera = %camera_guid, "Saved recording");

        Ok(GeneratedRecording {
            full_path: saved.to_string_lossy().into_owned(),
            filename,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeNvr;
    use serde_json::json;

    fn manager(dir: &std::path::Path, guid: Option<&str>) -> RecordingManager {
        RecordingManager::new(dir.to_path_buf(), CameraResolver::new(guid.map(str::to_string)))
    }

    #[test]
    fn test_default_window() {
        let params = RecordingParams::default();
        assert_eq!(
            params.window().unwrap(),
            RecordingWindow { pre_period_ms: 10_000, post_period_ms: 1_000 }
        );
        assert_eq!(params.offset_secs(), 0);
    }

    #[test]
    fn test_window_out_of_range() {
        let params = RecordingParams { pre_period: Some(i64::MAX), ..Default::default() };
        assert!(matches!(params.window(), Err(ProxyError::InvalidParameter { .. })));

        let params = RecordingParams { post_period: Some(i64::MIN), ..Default::default() };
        assert!(matches!(params.window(), Err(ProxyError::InvalidParameter { .. })));
    }

    #[test]
    fn test_classify() {
        let video = NvrResponse { content_type: Some("video/mp4".into()), body: Bytes::from_static(b"mp4") };
        assert_eq!(classify(video), RecordingOutcome::Video(Bytes::from_static(b"mp4")));

        let err = NvrResponse {
            content_type: Some("application/json; charset=utf-8".into()),
            body: Bytes::from_static(b"{\"error\":1}"),
        };
        assert_eq!(classify(err), RecordingOutcome::UpstreamError(Bytes::from_static(b"{\"error\":1}")));

        let html = NvrResponse { content_type: Some("text/html".into()), body: Bytes::new() };
        assert_eq!(
            classify(html),
            RecordingOutcome::Unexpected { content_type: Some("text/html".into()) }
        );

        let missing = NvrResponse { content_type: None, body: Bytes::new() };
        assert_eq!(classify(missing), RecordingOutcome::Unexpected { content_type: None });
    }

    #[tokio::test]
    async fn test_fetch_uses_requested_window() {
        let dir = tempfile::tempdir().unwrap();
        let nvr = FakeNvr::single_camera("CAM-1");
        let manager = manager(dir.path(), None);

        let before = Utc::now().timestamp_millis();
        let outcome = manager
            .fetch_recording(&nvr, RecordingParams { pre_period: Some(5), post_period: Some(2), offset: Some(0) })
            .await
            .unwrap();
        let after = Utc::now().timestamp_millis();

        assert!(matches!(outcome, RecordingOutcome::Video(_)));
        let requests = nvr.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.camera_guid, "CAM-1");
        assert_eq!(request.channel_id, 0);
        assert_eq!(request.window, Some(RecordingWindow { pre_period_ms: 5000, post_period_ms: 2000 }));
        assert!(request.timestamp_ms >= before && request.timestamp_ms <= after);
    }

    #[tokio::test]
    async fn test_fetch_applies_offset() {
        let dir = tempfile::tempdir().unwrap();
        let nvr = FakeNvr::single_camera("CAM-1");
        let manager = manager(dir.path(), None);

        let before = Utc::now().timestamp_millis();
        manager
            .fetch_recording(&nvr, RecordingParams { offset: Some(-30), ..Default::default() })
            .await
            .unwrap();

        let request = &nvr.requests()[0];
        assert_eq!(request.window, Some(RecordingWindow { pre_period_ms: 10_000, post_period_ms: 1_000 }));
        let delta = before - request.timestamp_ms;
        assert!((29_000..=31_000).contains(&delta), "delta was {}", delta);
    }

    #[tokio::test]
    async fn test_fetch_without_camera() {
        let dir = tempfile::tempdir().unwrap();
        let nvr = FakeNvr::with_cameras(json!({"datas": []}));
        let manager = manager(dir.path(), None);

        let err = manager.fetch_recording(&nvr, RecordingParams::default()).await.unwrap_err();
        assert!(matches!(err, ProxyError::CameraNotFound));
        assert!(nvr.requests().is_empty());
    }

    #[tokio::test]
    async fn test_generate_saves_file() {
        let dir = tempfile::tempdir().unwrap();
        let recording_dir = dir.path().join("recording");
        let nvr = FakeNvr::single_camera("CAM-1").respond_with(Some("video/mp4"), &b"clip"[..]);
        let manager = manager(&recording_dir, Some("PINNED"));

        let generated = manager.generate_recording(&nvr).await.unwrap();

        assert!(generated.filename.ends_with(".mp4"));
        assert_eq!(generated.filename.len(), "2024-01-01_000000.mp4".len());
        let path = recording_dir.join(&generated.filename);
        assert_eq!(generated.full_path, path.to_string_lossy());
        assert_eq!(std::fs::read(&path).unwrap(), b"clip");

        let request = &nvr.requests()[0];
        assert_eq!(request.camera_guid, "PINNED");
        assert_eq!(request.window, None);
        assert_eq!(nvr.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_generate_passes_unresolved_camera_through() {
        let dir = tempfile::tempdir().unwrap();
        let nvr = FakeNvr::with_cameras(json!({"datas": []}))
            .respond_with(Some("application/json"), &b"{\"message\":\"no camera\"}"[..]);
        let manager = manager(dir.path(), None);

        let generated = manager.generate_recording(&nvr).await.unwrap();

        assert_eq!(nvr.requests()[0].camera_guid, "");
        let path = dir.path().join(&generated.filename);
        assert_eq!(generated.full_path, path.to_string_lossy());
        assert_eq!(std::fs::read(&path).unwrap(), b"{\"message\":\"no camera\"}");
    }

    #[tokio::test]
    async fn test_fetch_rejects_out_of_range_offset() {
        let dir = tempfile::tempdir().unwrap();
        let nvr = FakeNvr::single_camera("CAM-1");
        let manager = manager(dir.path(), None);

        let err = manager
            .fetch_recording(&nvr, RecordingParams { offset: Some(100_000_000_000_000), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::InvalidParameter { .. }));
        assert!(nvr.requests().is_empty());
    }
}
