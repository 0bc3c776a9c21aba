//! Engine boundary and its adapters
//!
//! The orchestrator never talks to a device or window directly. Everything it
//! needs is expressed as capability traits:
//!
//! - [`AutomationEngine`] discovers targets and creates the live objects
//! - [`DeviceControl`] is what every connected controller can do
//! - [`WindowControl`] adds the desktop-only wheel scroll
//! - [`ResourceBundle`] and [`TaskRunner`] cover recognition
//!
//! Success is reported the way the underlying engine reports it: a flag for
//! connect/bind/actions, an `Option` for captures and recognition. Adapters
//! log their own failure causes.

use crate::types::{
    DeviceDescriptor, InputMethod, RecognitionRequest, RecognitionResult, ScreencapMethod,
    WindowDescriptor,
};
use crate::AutomationError;
use async_trait::async_trait;
use image::RgbaImage;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub mod adb;
pub mod native;
pub mod simulated;
pub mod tesseract;
pub mod window;

#[cfg(target_os = "windows")]
mod win32;

pub use native::NativeEngine;
pub use simulated::{
    sim_device, sim_window, EngineCall, SimFailure, SimulatedEngine, SIM_FRAME_SIZE,
};

#[async_trait]
pub trait AutomationEngine: Send + Sync {
    /// Adapter name used in logs
    fn name(&self) -> &'static str;

    async fn enumerate_devices(&self) -> Vec<DeviceDescriptor>;

    async fn enumerate_windows(&self) -> Vec<WindowDescriptor>;

    fn open_device_controller(&self, device: &DeviceDescriptor) -> Arc<dyn DeviceControl>;

    fn open_window_controller(
        &self,
        native_handle: u64,
        screencap: ScreencapMethod,
        input: InputMethod,
    ) -> Arc<dyn WindowControl>;

    fn create_resource_bundle(&self, path: &Path) -> Arc<dyn ResourceBundle>;

    fn bind_task_runner(
        &self,
        resource: Arc<dyn ResourceBundle>,
        controller: Controller,
    ) -> Arc<dyn TaskRunner>;
}

/// Actions available on every connected controller
#[async_trait]
pub trait DeviceControl: Send + Sync {
    async fn connect(&self) -> bool;

    async fn capture(&self) -> Option<RgbaImage>;

    async fn click(&self, x: i32, y: i32) -> bool;

    async fn swipe(&self, x0: i32, y0: i32, x1: i32, y1: i32, duration_ms: u32) -> bool;

    async fn input_text(&self, text: &str) -> bool;

    async fn press_key(&self, key: i32) -> bool;
}

/// Desktop window controllers additionally support the mouse wheel
#[async_trait]
pub trait WindowControl: DeviceControl {
    async fn scroll(&self, dx: i32, dy: i32) -> bool;
}

#[async_trait]
pub trait ResourceBundle: Send + Sync {
    fn root(&self) -> &Path;

    async fn load(&self) -> bool;

    /// Directory holding OCR model data
    fn ocr_model_dir(&self) -> PathBuf {
        self.root().join("model").join("ocr")
    }

    /// OCR languages discovered by the last successful `load`
    fn ocr_languages(&self) -> Vec<String>;
}

#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Whether the binding produced a usable runner
    fn inited(&self) -> bool;

    async fn capture_and_recognize(&self, request: &RecognitionRequest)
        -> Option<RecognitionResult>;
}

/// A controller plus the gate serializing engine calls against it
pub struct Gated<T: ?Sized> {
    control: Arc<T>,
    gate: Arc<Mutex<()>>,
}

impl<T: ?Sized> Clone for Gated<T> {
    fn clone(&self) -> Self {
        Self {
            control: self.control.clone(),
            gate: self.gate.clone(),
        }
    }
}

impl<T: ?Sized> Gated<T> {
    pub fn new(control: Arc<T>) -> Self {
        Self {
            control,
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn same_as(&self, other: &Gated<T>) -> bool {
        Arc::ptr_eq(&self.gate, &other.gate)
    }
}

pub type DeviceController = Gated<dyn DeviceControl>;
pub type WindowController = Gated<dyn WindowControl>;

impl WindowController {
    pub async fn scroll(&self, dx: i32, dy: i32) -> Result<(), AutomationError> {
        let _guard = self.gate.lock().await;
        flag(self.control.scroll(dx, dy).await, "scroll")
    }
}

/// A live connection to a device or a window
#[derive(Clone)]
pub enum Controller {
    Device(DeviceController),
    Window(WindowController),
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Controller::Device(_) => write!(f, "Controller::Device"),
            Controller::Window(_) => write!(f, "Controller::Window"),
        }
    }
}

// Runs one engine call under the controller gate, whichever variant it is.
macro_rules! gated {
    ($controller:expr, |$control:ident| $call:expr) => {
        match $controller {
            Controller::Device(gated) => {
                let _guard = gated.gate.lock().await;
                let $control = &gated.control;
                $call
            }
            Controller::Window(gated) => {
                let _guard = gated.gate.lock().await;
                let $control = &gated.control;
                $call
            }
        }
    };
}

fn flag(succeeded: bool, action: &str) -> Result<(), AutomationError> {
    if succeeded {
        Ok(())
    } else {
        Err(AutomationError::EngineFailure(format!("{action} reported failure")))
    }
}

impl Controller {
    pub fn same_as(&self, other: &Controller) -> bool {
        match (self, other) {
            (Controller::Device(a), Controller::Device(b)) => a.same_as(b),
            (Controller::Window(a), Controller::Window(b)) => a.same_as(b),
            _ => false,
        }
    }

    pub async fn connect(&self) -> Result<(), AutomationError> {
        let succeeded = gated!(self, |control| control.connect().await);
        flag(succeeded, "connect")
    }

    pub async fn capture(&self) -> Result<RgbaImage, AutomationError> {
        gated!(self, |control| control.capture().await)
            .ok_or_else(|| AutomationError::EngineFailure("screencap returned no image".into()))
    }

    pub async fn click(&self, x: i32, y: i32) -> Result<(), AutomationError> {
        flag(gated!(self, |control| control.click(x, y).await), "click")
    }

    pub async fn swipe(
        &self,
        x0: i32,
        y0: i32,
        x1: i32,
        y1: i32,
        duration_ms: u32,
    ) -> Result<(), AutomationError> {
        let succeeded = gated!(self, |control| control
            .swipe(x0, y0, x1, y1, duration_ms)
            .await);
        flag(succeeded, "swipe")
    }

    pub async fn input_text(&self, text: &str) -> Result<(), AutomationError> {
        flag(
            gated!(self, |control| control.input_text(text).await),
            "input_text",
        )
    }

    pub async fn press_key(&self, key: i32) -> Result<(), AutomationError> {
        flag(
            gated!(self, |control| control.press_key(key).await),
            "press_key",
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineKind {
    #[default]
    Native,
    Simulated,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub kind: EngineKind,
    /// Explicit `adb` executable, looked up on PATH when unset
    pub adb_path: Option<PathBuf>,
    /// Upper bound for a single `adb` invocation
    pub adb_timeout: Duration,
    /// Explicit `tesseract` executable, looked up on PATH when unset
    pub tesseract_path: Option<PathBuf>,
    /// Upper bound for a single `tesseract` recognition
    pub ocr_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::Native,
            adb_path: None,
            adb_timeout: Duration::from_secs(20),
            tesseract_path: None,
            ocr_timeout: Duration::from_secs(30),
        }
    }
}

pub fn create_engine(config: &EngineConfig) -> Arc<dyn AutomationEngine> {
    match config.kind {
        EngineKind::Native => Arc::new(NativeEngine::new(config)),
        EngineKind::Simulated => Arc::new(SimulatedEngine::with_demo_targets()),
    }
}
