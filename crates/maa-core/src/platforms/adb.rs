//! ADB adapter
//!
//! Drives Android devices through the `adb` executable. Discovery parses
//! `adb devices -l`; controllers shell out to `screencap` and `input`.

use super::DeviceControl;
use crate::types::DeviceDescriptor;
use crate::AutomationError;
use async_trait::async_trait;
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Run `adb` with `args`, bounded by `timeout`
pub async fn run_adb(
    adb_path: &Path,
    args: &[String],
    timeout: Duration,
) -> Result<Output, AutomationError> {
    debug!("[adb] {} {}", adb_path.display(), args.join(" "));
    let mut command = Command::new(adb_path);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    match tokio::time::timeout(timeout, command.output()).await {
        Ok(output) => Ok(output?),
        Err(_) => Err(AutomationError::Timeout(format!(
            "adb {} did not finish within {:?}",
            args.join(" "),
            timeout
        ))),
    }
}

/// Display name for a device: model and serial when adb reports a model
fn display_name(serial: &str, model: Option<&str>) -> String {
    match model {
        Some(model) if !model.is_empty() => format!("{} ({})", model.replace('_', " "), serial),
        _ => serial.to_string(),
    }
}

/// Parse `adb devices -l`, keeping only devices in the `device` state
pub fn parse_devices(output: &str, adb_path: &Path) -> Vec<DeviceDescriptor> {
    let mut devices = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("List of devices attached") || line.starts_with('*')
        {
            continue;
        }

        let mut parts = line.split_whitespace();
        let (Some(serial), Some(state)) = (parts.next(), parts.next()) else {
            continue;
        };
        if state != "device" {
            debug!("[adb] Skipping {} in state '{}'", serial, state);
            continue;
        }

        let mut model = None;
        let mut product = None;
        let mut transport_id = None;
        for part in parts {
            if let Some((key, value)) = part.split_once(':') {
                match key {
                    "model" => model = Some(value.to_string()),
                    "product" => product = Some(value.to_string()),
                    "transport_id" => transport_id = Some(value.to_string()),
                    _ => {}
                }
            }
        }

        devices.push(DeviceDescriptor {
            name: display_name(serial, model.as_deref()),
            adb_path: adb_path.to_path_buf(),
            serial: serial.to_string(),
            state: state.to_string(),
            model,
            product,
            transport_id,
        });
    }

    devices
}

pub async fn discover(adb_path: &Path, timeout: Duration) -> Vec<DeviceDescriptor> {
    let args = vec!["devices".to_string(), "-l".to_string()];
    match run_adb(adb_path, &args, timeout).await {
        Ok(output) if output.status.success() => {
            let devices = parse_devices(&String::from_utf8_lossy(&output.stdout), adb_path);
            info!("[adb] Found {} device(s)", devices.len());
            devices
        }
        Ok(output) => {
            warn!(
                "[adb] devices failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            Vec::new()
        }
        Err(e) => {
            warn!("[adb] devices failed: {}", e);
            Vec::new()
        }
    }
}

/// Escape text for `adb shell input text`.
///
/// Spaces become `%s`; characters the device shell would interpret are
/// backslash-escaped.
pub fn escape_input_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        match c {
            ' ' => escaped.push_str("%s"),
            '(' | ')' | '<' | '>' | '|' | ';' | '&' | '*' | '\\' | '~' | '"' | '\'' | '`'
            | '$' | '!' | '?' | '#' | '[' | ']' | '{' | '}' | '%' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

/// A network address (`host:port`) rather than a USB serial
fn is_network_serial(serial: &str) -> bool {
    serial
        .rsplit_once(':')
        .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
        .unwrap_or(false)
}

pub struct AdbController {
    adb_path: PathBuf,
    serial: String,
    timeout: Duration,
    connected: AtomicBool,
}

impl AdbController {
    pub fn new(device: &DeviceDescriptor, timeout: Duration) -> Self {
        Self {
            adb_path: device.adb_path.clone(),
            serial: device.serial.clone(),
            timeout,
            connected: AtomicBool::new(false),
        }
    }

    fn args(&self, rest: &[&str]) -> Vec<String> {
        let mut args = vec!["-s".to_string(), self.serial.clone()];
        args.extend(rest.iter().map(|s| s.to_string()));
        args
    }

    async fn shell(&self, rest: &[&str]) -> bool {
        if !self.connected.load(Ordering::Relaxed) {
            warn!("[adb] {} used before a successful connect", self.serial);
            return false;
        }
        let mut args = vec!["shell"];
        args.extend_from_slice(rest);
        match run_adb(&self.adb_path, &self.args(&args), self.timeout).await {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                warn!(
                    "[adb] shell {} failed on {}: {}",
                    rest.join(" "),
                    self.serial,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                false
            }
            Err(e) => {
                warn!("[adb] shell {} failed on {}: {}", rest.join(" "), self.serial, e);
                false
            }
        }
    }
}

#[async_trait]
impl DeviceControl for AdbController {
    async fn connect(&self) -> bool {
        if is_network_serial(&self.serial) {
            let args = vec!["connect".to_string(), self.serial.clone()];
            match run_adb(&self.adb_path, &args, self.timeout).await {
                Ok(output) => {
                    let combined = format!(
                        "{}{}",
                        String::from_utf8_lossy(&output.stdout),
                        String::from_utf8_lossy(&output.stderr)
                    )
                    .to_lowercase();
                    if !output.status.success()
                        || combined.contains("failed")
                        || combined.contains("unable")
                    {
                        warn!("[adb] connect {} failed: {}", self.serial, combined.trim());
                        return false;
                    }
                }
                Err(e) => {
                    warn!("[adb] connect {} failed: {}", self.serial, e);
                    return false;
                }
            }
        }

        let online = match run_adb(&self.adb_path, &self.args(&["get-state"]), self.timeout).await
        {
            Ok(output) => {
                output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == "device"
            }
            Err(e) => {
                warn!("[adb] get-state {} failed: {}", self.serial, e);
                false
            }
        };
        self.connected.store(online, Ordering::Relaxed);
        info!("[adb] Connection to {}: {}", self.serial, online);
        online
    }

    async fn capture(&self) -> Option<RgbaImage> {
        if !self.connected.load(Ordering::Relaxed) {
            warn!("[adb] {} used before a successful connect", self.serial);
            return None;
        }
        let output = match run_adb(
            &self.adb_path,
            &self.args(&["exec-out", "screencap", "-p"]),
            self.timeout,
        )
        .await
        {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                warn!(
                    "[adb] screencap failed on {}: {}",
                    self.serial,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                return None;
            }
            Err(e) => {
                warn!("[adb] screencap failed on {}: {}", self.serial, e);
                return None;
            }
        };

        match image::load_from_memory(&output.stdout) {
            Ok(decoded) => Some(decoded.to_rgba8()),
            Err(e) => {
                warn!("[adb] Could not decode screencap from {}: {}", self.serial, e);
                None
            }
        }
    }

    async fn click(&self, x: i32, y: i32) -> bool {
        self.shell(&["input", "tap", &x.to_string(), &y.to_string()])
            .await
    }

    async fn swipe(&self, x0: i32, y0: i32, x1: i32, y1: i32, duration_ms: u32) -> bool {
        self.shell(&[
            "input",
            "swipe",
            &x0.to_string(),
            &y0.to_string(),
            &x1.to_string(),
            &y1.to_string(),
            &duration_ms.to_string(),
        ])
        .await
    }

    async fn input_text(&self, text: &str) -> bool {
        if !text.is_ascii() {
            warn!(
                "[adb] input text only handles ASCII reliably, sending anyway to {}",
                self.serial
            );
        }
        self.shell(&["input", "text", &escape_input_text(text)])
            .await
    }

    async fn press_key(&self, key: i32) -> bool {
        self.shell(&["input", "keyevent", &key.to_string()]).await
    }
}
