//! Session orchestration for Android device and desktop window automation
//!
//! This crate keeps track of the live objects an automation session creates
//! (discovered targets, controllers, resource bundles, task runners) behind
//! opaque string handles, and sequences the calls into the automation engine
//! that produce them.

pub mod errors;
pub mod platforms;
pub mod registry;
pub mod screenshot;
pub mod session;
pub mod types;
pub mod utils;

pub use errors::AutomationError;
pub use platforms::{
    create_engine, AutomationEngine, Controller, DeviceControl, EngineConfig, EngineKind,
    NativeEngine, ResourceBundle, SimulatedEngine, TaskRunner, WindowControl,
};
pub use registry::{EntityKind, Entry, Handle, HandleRegistry};
pub use screenshot::{default_screenshot_dir, ScreenshotStore};
pub use session::{Discovery, HandleInfo, SessionOrchestrator};
pub use types::{
    DeviceDescriptor, InputMethod, OcrMatch, OcrParams, Rect, ScreencapMethod, TargetKind,
    WindowDescriptor, DEFAULT_OCR_THRESHOLD,
};
