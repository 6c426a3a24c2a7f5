//! In-memory NVR used by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};

use crate::errors::{ProxyError, Result};
use crate::nvr::{NvrClient, NvrConnector, NvrResponse, RecordingRequest};

struct Inner {
    cameras: Option<Value>,
    recording: Mutex<NvrResponse>,
    list_calls: AtomicUsize,
    connects: AtomicUsize,
    requests: Mutex<Vec<RecordingRequest>>,
}

#[derive(Clone)]
pub struct FakeNvr {
    inner: Arc<Inner>,
}

impl FakeNvr {
    fn new(cameras: Option<Value>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cameras,
                recording: Mutex::new(NvrResponse {
                    content_type: Some("video/mp4".to_string()),
                    body: Bytes::from_static(b"\x00\x00\x00\x18ftypmp42"),
                }),
                list_calls: AtomicUsize::new(0),
                connects: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn with_cameras(cameras: Value) -> Self {
        Self::new(Some(cameras))
    }

    pub fn single_camera(guid: &str) -> Self {
        Self::with_cameras(json!({"datas": [{"guid": guid}]}))
    }

    pub fn failing_listing() -> Self {
        Self::new(None)
    }

    pub fn respond_with(self, content_type: Option<&str>, body: impl Into<Bytes>) -> Self {
        *self.inner.recording.lock().unwrap() = NvrResponse {
            content_type: content_type.map(str::to_string),
            body: body.into(),
        };
        self
    }

    pub fn list_calls(&self) -> usize {
        self.inner.list_calls.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordingRequest> {
        self.inner.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl NvrClient for FakeNvr {
    async fn list_cameras(&self) -> Result<Value> {
        self.inner.list_calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .cameras
            .clone()
            .ok_or_else(|| ProxyError::nvr("connection refused"))
    }

    async fn get_recording(&self, request: &RecordingRequest) -> Result<NvrResponse> {
        self.inner.requests.lock().unwrap().push(request.clone());
        Ok(self.inner.recording.lock().unwrap().clone())
    }
}

#[async_trait]
impl NvrConnector for FakeNvr {
    async fn connect(&self) -> Result<Box<dyn NvrClient>> {
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.clone()))
    }
}
