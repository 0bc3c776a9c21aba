//! Desktop window adapter
//!
//! Windows are enumerated and captured through xcap. Input is posted as
//! window messages, which only exists on Windows; elsewhere every input call
//! logs a warning and reports failure.

use super::{DeviceControl, WindowControl};
use crate::types::{InputMethod, ScreencapMethod, WindowDescriptor};
use crate::AutomationError;
use async_trait::async_trait;
use image::RgbaImage;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use xcap::Window;

/// xcap hands back images from its own `image` dependency; rebuild them from
/// raw RGBA bytes so the rest of the crate only sees one `RgbaImage`.
fn to_rgba(width: u32, height: u32, raw: Vec<u8>) -> Option<RgbaImage> {
    RgbaImage::from_raw(width, height, raw)
}

fn describe(window: &Window) -> Option<WindowDescriptor> {
    let title = window.title().ok()?;
    if title.trim().is_empty() {
        return None;
    }
    if window.is_minimized().unwrap_or(false) {
        debug!("[window] Listing minimized window '{}'", title);
    }
    Some(WindowDescriptor {
        name: title,
        native_handle: u64::from(window.id().ok()?),
        app_name: window.app_name().ok().filter(|name| !name.is_empty()),
        pid: window.pid().ok(),
    })
}

/// Top-level windows with a non-empty title
pub fn enumerate() -> Result<Vec<WindowDescriptor>, AutomationError> {
    let windows = Window::all()
        .map_err(|e| AutomationError::PlatformError(format!("Failed to list windows: {e}")))?;
    let found: Vec<WindowDescriptor> = windows.iter().filter_map(describe).collect();
    info!("[window] Found {} titled window(s)", found.len());
    Ok(found)
}

fn find_window(native_handle: u64) -> Result<Window, AutomationError> {
    let windows = Window::all()
        .map_err(|e| AutomationError::PlatformError(format!("Failed to list windows: {e}")))?;
    windows
        .into_iter()
        .find(|window| window.id().map(u64::from).ok() == Some(native_handle))
        .ok_or_else(|| {
            AutomationError::PlatformError(format!("Window {native_handle:#x} no longer exists"))
        })
}

fn capture_window(
    native_handle: u64,
    method: ScreencapMethod,
) -> Result<RgbaImage, AutomationError> {
    let window = find_window(native_handle)?;
    let platform = |e: xcap::XCapError| AutomationError::PlatformError(e.to_string());

    match method {
        ScreencapMethod::PrintWindow => {
            let image = window.capture_image().map_err(platform)?;
            let (width, height) = (image.width(), image.height());
            to_rgba(width, height, image.into_raw()).ok_or_else(|| {
                AutomationError::PlatformError("Window capture had an unexpected size".into())
            })
        }
        ScreencapMethod::MonitorCrop => {
            let monitor = window.current_monitor().map_err(platform)?;
            let frame = monitor.capture_image().map_err(platform)?;
            let (frame_w, frame_h) = (frame.width(), frame.height());
            let frame = to_rgba(frame_w, frame_h, frame.into_raw()).ok_or_else(|| {
                AutomationError::PlatformError("Monitor capture had an unexpected size".into())
            })?;

            let x = (window.x().map_err(platform)? - monitor.x().map_err(platform)?).max(0) as u32;
            let y = (window.y().map_err(platform)? - monitor.y().map_err(platform)?).max(0) as u32;
            if x >= frame_w || y >= frame_h {
                return Err(AutomationError::PlatformError(
                    "Window lies outside its monitor".into(),
                ));
            }
            let width = window.width().map_err(platform)?.min(frame_w - x);
            let height = window.height().map_err(platform)?.min(frame_h - y);
            Ok(image::imageops::crop_imm(&frame, x, y, width, height).to_image())
        }
    }
}

pub struct DesktopWindowController {
    native_handle: u64,
    screencap: ScreencapMethod,
    #[cfg_attr(not(target_os = "windows"), allow(dead_code))]
    input: InputMethod,
    connected: AtomicBool,
}

impl DesktopWindowController {
    pub fn new(native_handle: u64, screencap: ScreencapMethod, input: InputMethod) -> Self {
        Self {
            native_handle,
            screencap,
            input,
            connected: AtomicBool::new(false),
        }
    }

    fn ready(&self, action: &str) -> bool {
        if !self.connected.load(Ordering::Relaxed) {
            warn!(
                "[window] {} on {:#x} before a successful connect",
                action, self.native_handle
            );
            return false;
        }
        true
    }

    #[cfg(target_os = "windows")]
    async fn post(
        &self,
        action: &'static str,
        send: impl FnOnce(u64, InputMethod) -> Result<(), AutomationError> + Send + 'static,
    ) -> bool {
        if !self.ready(action) {
            return false;
        }
        let (handle, input) = (self.native_handle, self.input);
        match tokio::task::spawn_blocking(move || send(handle, input)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("[window] {} on {:#x} failed: {}", action, handle, e);
                false
            }
            Err(e) => {
                warn!("[window] {} task on {:#x} panicked: {}", action, handle, e);
                false
            }
        }
    }

    #[cfg(not(target_os = "windows"))]
    async fn post<F>(&self, action: &'static str, _send: F) -> bool {
        if self.ready(action) {
            warn!(
                "[window] {} needs window messages, which are only available on Windows",
                action
            );
        }
        false
    }
}

#[async_trait]
impl DeviceControl for DesktopWindowController {
    async fn connect(&self) -> bool {
        let handle = self.native_handle;
        let alive = tokio::task::spawn_blocking(move || find_window(handle).is_ok())
            .await
            .unwrap_or(false);
        self.connected.store(alive, Ordering::Relaxed);
        info!("[window] Connection to {:#x}: {}", handle, alive);
        alive
    }

    async fn capture(&self) -> Option<RgbaImage> {
        if !self.ready("screencap") {
            return None;
        }
        let (handle, method) = (self.native_handle, self.screencap);
        match tokio::task::spawn_blocking(move || capture_window(handle, method)).await {
            Ok(Ok(image)) => Some(image),
            Ok(Err(e)) => {
                warn!("[window] Capture of {:#x} failed: {}", handle, e);
                None
            }
            Err(e) => {
                warn!("[window] Capture task for {:#x} panicked: {}", handle, e);
                None
            }
        }
    }

    async fn click(&self, x: i32, y: i32) -> bool {
        #[cfg(target_os = "windows")]
        let send = move |handle: u64, input: InputMethod| super::win32::click(handle, input, x, y);
        #[cfg(not(target_os = "windows"))]
        let send = (x, y);
        self.post("click", send).await
    }

    async fn swipe(&self, x0: i32, y0: i32, x1: i32, y1: i32, duration_ms: u32) -> bool {
        #[cfg(target_os = "windows")]
        let send = move |handle: u64, input: InputMethod| {
            super::win32::swipe(handle, input, x0, y0, x1, y1, duration_ms)
        };
        #[cfg(not(target_os = "windows"))]
        let send = (x0, y0, x1, y1, duration_ms);
        self.post("swipe", send).await
    }

    async fn input_text(&self, text: &str) -> bool {
        #[cfg(target_os = "windows")]
        let send = {
            let text = text.to_string();
            move |handle: u64, _: InputMethod| super::win32::input_text(handle, &text)
        };
        #[cfg(not(target_os = "windows"))]
        let send = text;
        self.post("input_text", send).await
    }

    async fn press_key(&self, key: i32) -> bool {
        #[cfg(target_os = "windows")]
        let send = move |handle: u64, _: InputMethod| super::win32::press_key(handle, key);
        #[cfg(not(target_os = "windows"))]
        let send = key;
        self.post("click_key", send).await
    }
}

#[async_trait]
impl WindowControl for DesktopWindowController {
    async fn scroll(&self, dx: i32, dy: i32) -> bool {
        #[cfg(target_os = "windows")]
        let send = move |handle: u64, input: InputMethod| super::win32::scroll(handle, input, dx, dy);
        #[cfg(not(target_os = "windows"))]
        let send = (dx, dy);
        self.post("scroll", send).await
    }
}
