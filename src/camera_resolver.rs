use std::sync::Arc;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::nvr::NvrClient;

/// Camera GUID shared by all requests, discovered lazily from the NVR
/// when the options file does not pin one.
#[derive(Clone)]
pub struct CameraResolver {
    guid: Arc<RwLock<Option<String>>>,
}

impl CameraResolver {
    pub fn new(configured: Option<String>) -> Self {
        Self {
            guid: Arc::new(RwLock::new(configured.filter(|g| !g.is_empty()))),
        }
    }

    pub async fn cached(&self) -> Option<String> {
        self.guid.read().await.clone()
    }

    /// Returns the cached GUID, or asks the NVR for its first camera and
    /// caches that. `None` means no camera could be found.
    pub async fn resolve(&self, client: &dyn NvrClient) -> Option<String> {
        if let Some(guid) = self.cached().await {
            return Some(guid);
        }

        info!("Getting new camera guid");
        let cameras = match client.list_cameras().await {
            Ok(cameras) => cameras,
            Err(e) => {
                error!("Camera guid not found, listing cameras failed: {}", e);
                return None;
            }
        };

        match first_camera_guid(&cameras) {
            Some(guid) => {
                info!(camera = %guid, "Resolved camera guid");
                *self.guid.write().await = Some(guid.clone());
                Some(guid)
            }
            None => {
                error!("Camera guid not found cameras: {}", cameras);
                None
            }
        }
    }
}

/// `datas[0].guid` of a camera listing, in the NVR's own order.
pub fn first_camera_guid(cameras: &Value) -> Option<String> {
    let guid = cameras.get("datas")?.as_array()?.first()?.get("guid")?;
    let guid = match guid {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!guid.is_empty()).then_some(guid)
}
