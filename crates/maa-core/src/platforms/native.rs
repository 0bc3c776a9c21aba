use super::adb::{self, AdbController};
use super::tesseract::{TesseractBundle, TesseractTasker};
use super::window::{self, DesktopWindowController};
use super::{
    AutomationEngine, Controller, DeviceControl, EngineConfig, ResourceBundle, TaskRunner,
    WindowControl,
};
use crate::types::{DeviceDescriptor, InputMethod, ScreencapMethod, WindowDescriptor};
use crate::utils::resolve_tool;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Engine backed by the real `adb`, desktop windows and `tesseract`
pub struct NativeEngine {
    adb_path: Option<PathBuf>,
    adb_timeout: Duration,
    tesseract_path: Option<PathBuf>,
    ocr_timeout: Duration,
}

impl NativeEngine {
    pub fn new(config: &EngineConfig) -> Self {
        let adb_path = resolve_tool(config.adb_path.as_deref(), "adb");
        let tesseract_path = resolve_tool(config.tesseract_path.as_deref(), "tesseract");

        match &adb_path {
            Some(path) => info!("[native] Using adb at {}", path.display()),
            None => warn!("[native] adb not found on PATH, device discovery will be empty"),
        }
        match &tesseract_path {
            Some(path) => info!("[native] Using tesseract at {}", path.display()),
            None => warn!("[native] tesseract not found on PATH, OCR taskers will not initialize"),
        }

        Self {
            adb_path,
            adb_timeout: config.adb_timeout,
            tesseract_path,
            ocr_timeout: config.ocr_timeout,
        }
    }
}

#[async_trait]
impl AutomationEngine for NativeEngine {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn enumerate_devices(&self) -> Vec<DeviceDescriptor> {
        match &self.adb_path {
            Some(adb_path) => adb::discover(adb_path, self.adb_timeout).await,
            None => Vec::new(),
        }
    }

    async fn enumerate_windows(&self) -> Vec<WindowDescriptor> {
        match tokio::task::spawn_blocking(window::enumerate).await {
            Ok(Ok(windows)) => windows,
            Ok(Err(e)) => {
                warn!("[native] Window enumeration failed: {}", e);
                Vec::new()
            }
            Err(e) => {
                warn!("[native] Window enumeration task panicked: {}", e);
                Vec::new()
            }
        }
    }

    fn open_device_controller(&self, device: &DeviceDescriptor) -> Arc<dyn DeviceControl> {
        Arc::new(AdbController::new(device, self.adb_timeout))
    }

    fn open_window_controller(
        &self,
        native_handle: u64,
        screencap: ScreencapMethod,
        input: InputMethod,
    ) -> Arc<dyn WindowControl> {
        Arc::new(DesktopWindowController::new(native_handle, screencap, input))
    }

    fn create_resource_bundle(&self, path: &Path) -> Arc<dyn ResourceBundle> {
        Arc::new(TesseractBundle::new(path))
    }

    fn bind_task_runner(
        &self,
        resource: Arc<dyn ResourceBundle>,
        controller: Controller,
    ) -> Arc<dyn TaskRunner> {
        Arc::new(TesseractTasker::new(
            self.tesseract_path.clone(),
            resource,
            controller,
            self.ocr_timeout,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_are_independent() {
        let engine = NativeEngine::new(&EngineConfig {
            adb_timeout: Duration::from_secs(5),
            ocr_timeout: Duration::from_secs(45),
            ..EngineConfig::default()
        });
        assert_eq!(engine.adb_timeout, Duration::from_secs(5));
        assert_eq!(engine.ocr_timeout, Duration::from_secs(45));
    }
}
