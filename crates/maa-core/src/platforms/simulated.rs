//! In-process engine with scripted targets
//!
//! Used by `--engine simulated` and by the test suites. Every call is
//! recorded, and individual engine steps can be made to fail through
//! [`SimFailure`].

use super::{
    AutomationEngine, Controller, DeviceControl, ResourceBundle, TaskRunner, WindowControl,
};
use crate::types::{
    DeviceDescriptor, InputMethod, OcrMatch, RecognitionRequest, RecognitionResult, Rect,
    ScreencapMethod, WindowDescriptor,
};
use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// One call that reached the simulated engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    EnumerateDevices,
    EnumerateWindows,
    OpenDeviceController {
        serial: String,
    },
    OpenWindowController {
        native_handle: u64,
        screencap: ScreencapMethod,
        input: InputMethod,
    },
    Connect {
        target: String,
    },
    Capture {
        target: String,
    },
    Click {
        target: String,
        x: i32,
        y: i32,
    },
    Swipe {
        target: String,
        from: (i32, i32),
        to: (i32, i32),
        duration_ms: u32,
    },
    InputText {
        target: String,
        text: String,
    },
    PressKey {
        target: String,
        key: i32,
    },
    Scroll {
        target: String,
        dx: i32,
        dy: i32,
    },
    CreateResource {
        path: PathBuf,
    },
    LoadResource {
        path: PathBuf,
    },
    BindTasker,
    Recognize,
}

/// Engine steps that should report failure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimFailure {
    pub connect: bool,
    /// click, swipe, input_text, press_key and scroll
    pub action: bool,
    pub capture: bool,
    pub load: bool,
    pub bind: bool,
    pub recognize: bool,
}

#[derive(Default)]
struct SimState {
    devices: Mutex<Vec<DeviceDescriptor>>,
    windows: Mutex<Vec<WindowDescriptor>>,
    ocr_hits: Mutex<Vec<OcrMatch>>,
    failures: Mutex<SimFailure>,
    calls: Mutex<Vec<EngineCall>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl SimState {
    fn record(&self, call: EngineCall) {
        debug!("[simulated] {:?}", call);
        lock(&self.calls).push(call);
    }

    fn failures(&self) -> SimFailure {
        *lock(&self.failures)
    }
}

/// Frame size returned by simulated captures
pub const SIM_FRAME_SIZE: (u32, u32) = (128, 72);

#[derive(Default, Clone)]
pub struct SimulatedEngine {
    state: Arc<SimState>,
}

pub fn sim_device(name: &str, serial: &str) -> DeviceDescriptor {
    DeviceDescriptor {
        name: name.to_string(),
        adb_path: PathBuf::from("adb"),
        serial: serial.to_string(),
        state: "device".to_string(),
        model: None,
        product: None,
        transport_id: None,
    }
}

pub fn sim_window(name: &str, native_handle: u64) -> WindowDescriptor {
    WindowDescriptor {
        name: name.to_string(),
        native_handle,
        app_name: None,
        pid: None,
    }
}

impl SimulatedEngine {
    /// An engine that discovers nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// One emulator, one desktop window and a couple of OCR lines
    pub fn with_demo_targets() -> Self {
        Self::new()
            .with_devices(vec![sim_device("Simulated Phone (emulator-5554)", "emulator-5554")])
            .with_windows(vec![sim_window("Simulated Window", 0x1001)])
            .with_ocr_hits(vec![
                OcrMatch {
                    text: "Start".to_string(),
                    bbox: Rect::new(40, 20, 48, 16),
                    score: 0.98,
                },
                OcrMatch {
                    text: "Settings".to_string(),
                    bbox: Rect::new(40, 48, 64, 16),
                    score: 0.91,
                },
            ])
    }

    pub fn with_devices(self, devices: Vec<DeviceDescriptor>) -> Self {
        self.set_devices(devices);
        self
    }

    pub fn with_windows(self, windows: Vec<WindowDescriptor>) -> Self {
        self.set_windows(windows);
        self
    }

    pub fn with_ocr_hits(self, hits: Vec<OcrMatch>) -> Self {
        *lock(&self.state.ocr_hits) = hits;
        self
    }

    pub fn set_devices(&self, devices: Vec<DeviceDescriptor>) {
        *lock(&self.state.devices) = devices;
    }

    pub fn set_windows(&self, windows: Vec<WindowDescriptor>) {
        *lock(&self.state.windows) = windows;
    }

    pub fn set_failures(&self, failures: SimFailure) {
        *lock(&self.state.failures) = failures;
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        lock(&self.state.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.state.calls).clear();
    }
}

#[async_trait]
impl AutomationEngine for SimulatedEngine {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn enumerate_devices(&self) -> Vec<DeviceDescriptor> {
        self.state.record(EngineCall::EnumerateDevices);
        lock(&self.state.devices).clone()
    }

    async fn enumerate_windows(&self) -> Vec<WindowDescriptor> {
        self.state.record(EngineCall::EnumerateWindows);
        lock(&self.state.windows).clone()
    }

    fn open_device_controller(&self, device: &DeviceDescriptor) -> Arc<dyn DeviceControl> {
        self.state.record(EngineCall::OpenDeviceController {
            serial: device.serial.clone(),
        });
        Arc::new(SimController::new(device.serial.clone(), self.state.clone()))
    }

    fn open_window_controller(
        &self,
        native_handle: u64,
        screencap: ScreencapMethod,
        input: InputMethod,
    ) -> Arc<dyn WindowControl> {
        self.state.record(EngineCall::OpenWindowController {
            native_handle,
            screencap,
            input,
        });
        Arc::new(SimController::new(
            format!("{native_handle:#x}"),
            self.state.clone(),
        ))
    }

    fn create_resource_bundle(&self, path: &Path) -> Arc<dyn ResourceBundle> {
        self.state.record(EngineCall::CreateResource {
            path: path.to_path_buf(),
        });
        Arc::new(SimBundle {
            root: path.to_path_buf(),
            loaded: AtomicBool::new(false),
            state: self.state.clone(),
        })
    }

    fn bind_task_runner(
        &self,
        _resource: Arc<dyn ResourceBundle>,
        controller: Controller,
    ) -> Arc<dyn TaskRunner> {
        self.state.record(EngineCall::BindTasker);
        Arc::new(SimTasker {
            inited: !self.state.failures().bind,
            controller,
            state: self.state.clone(),
        })
    }
}

struct SimController {
    target: String,
    connected: AtomicBool,
    state: Arc<SimState>,
}

impl SimController {
    fn new(target: String, state: Arc<SimState>) -> Self {
        Self {
            target,
            connected: AtomicBool::new(false),
            state,
        }
    }

    fn act(&self, call: EngineCall) -> bool {
        self.state.record(call);
        self.connected.load(Ordering::Relaxed) && !self.state.failures().action
    }
}

#[async_trait]
impl DeviceControl for SimController {
    async fn connect(&self) -> bool {
        self.state.record(EngineCall::Connect {
            target: self.target.clone(),
        });
        let connected = !self.state.failures().connect;
        self.connected.store(connected, Ordering::Relaxed);
        connected
    }

    async fn capture(&self) -> Option<RgbaImage> {
        self.state.record(EngineCall::Capture {
            target: self.target.clone(),
        });
        if !self.connected.load(Ordering::Relaxed) || self.state.failures().capture {
            return None;
        }
        let (width, height) = SIM_FRAME_SIZE;
        Some(RgbaImage::from_pixel(width, height, Rgba([32, 96, 160, 255])))
    }

    async fn click(&self, x: i32, y: i32) -> bool {
        self.act(EngineCall::Click {
            target: self.target.clone(),
            x,
            y,
        })
    }

    async fn swipe(&self, x0: i32, y0: i32, x1: i32, y1: i32, duration_ms: u32) -> bool {
        self.act(EngineCall::Swipe {
            target: self.target.clone(),
            from: (x0, y0),
            to: (x1, y1),
            duration_ms,
        })
    }

    async fn input_text(&self, text: &str) -> bool {
        self.act(EngineCall::InputText {
            target: self.target.clone(),
            text: text.to_string(),
        })
    }

    async fn press_key(&self, key: i32) -> bool {
        self.act(EngineCall::PressKey {
            target: self.target.clone(),
            key,
        })
    }
}

#[async_trait]
impl WindowControl for SimController {
    async fn scroll(&self, dx: i32, dy: i32) -> bool {
        self.act(EngineCall::Scroll {
            target: self.target.clone(),
            dx,
            dy,
        })
    }
}

struct SimBundle {
    root: PathBuf,
    loaded: AtomicBool,
    state: Arc<SimState>,
}

#[async_trait]
impl ResourceBundle for SimBundle {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn load(&self) -> bool {
        self.state.record(EngineCall::LoadResource {
            path: self.root.clone(),
        });
        let loaded = !self.state.failures().load;
        self.loaded.store(loaded, Ordering::Relaxed);
        loaded
    }

    fn ocr_languages(&self) -> Vec<String> {
        if self.loaded.load(Ordering::Relaxed) {
            vec!["sim".to_string()]
        } else {
            Vec::new()
        }
    }
}

struct SimTasker {
    inited: bool,
    controller: Controller,
    state: Arc<SimState>,
}

#[async_trait]
impl TaskRunner for SimTasker {
    fn inited(&self) -> bool {
        self.inited
    }

    async fn capture_and_recognize(
        &self,
        request: &RecognitionRequest,
    ) -> Option<RecognitionResult> {
        let RecognitionRequest::Ocr(params) = request;
        self.controller.capture().await.ok()?;
        self.state.record(EngineCall::Recognize);
        if self.state.failures().recognize {
            return None;
        }
        let hits = lock(&self.state.ocr_hits).clone();
        Some(RecognitionResult {
            algorithm: "ocr".to_string(),
            hits: params.apply(hits),
        })
    }
}
