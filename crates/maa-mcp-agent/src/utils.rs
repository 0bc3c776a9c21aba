//! Tool argument types

use maa_core::{InputMethod, OcrParams, Rect, ScreencapMethod, TargetKind, DEFAULT_OCR_THRESHOLD};
use rmcp::{schemars, schemars::JsonSchema};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TargetKindArg {
    AdbDevice,
    Window,
}

impl From<TargetKindArg> for TargetKind {
    fn from(value: TargetKindArg) -> Self {
        match value {
            TargetKindArg::AdbDevice => TargetKind::AdbDevice,
            TargetKindArg::Window => TargetKind::Window,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SelectTargetArgs {
    /// Which discovery the choice belongs to
    pub kind: TargetKindArg,
    /// The name the user picked, exactly as listed by the discovery tool
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConnectAdbDeviceArgs {
    /// Device name returned by find_adb_device_list
    pub device_name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScreencapMethodArg {
    #[default]
    PrintWindow,
    MonitorCrop,
}

impl From<ScreencapMethodArg> for ScreencapMethod {
    fn from(value: ScreencapMethodArg) -> Self {
        match value {
            ScreencapMethodArg::PrintWindow => ScreencapMethod::PrintWindow,
            ScreencapMethodArg::MonitorCrop => ScreencapMethod::MonitorCrop,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum InputMethodArg {
    #[default]
    PostMessage,
    PostMessageWithCursorPos,
}

impl From<InputMethodArg> for InputMethod {
    fn from(value: InputMethodArg) -> Self {
        match value {
            InputMethodArg::PostMessage => InputMethod::PostMessage,
            InputMethodArg::PostMessageWithCursorPos => InputMethod::PostMessageWithCursorPos,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConnectWindowArgs {
    /// Window title returned by find_window_list
    pub window_name: String,
    /// How frames are captured (default: print_window)
    #[serde(default)]
    pub screencap_method: Option<ScreencapMethodArg>,
    /// How mouse and keyboard input is delivered (default: post_message)
    #[serde(default)]
    pub input_method: Option<InputMethodArg>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LoadResourceArgs {
    /// Root directory of the resource bundle (contains model/ocr)
    pub resource_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateTaskerArgs {
    /// Controller ID returned by connect_adb_device or connect_window
    pub controller_id: String,
    /// Resource ID returned by load_resource
    pub resource_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OcrArgs {
    /// Tasker ID returned by create_tasker
    pub tasker_id: String,
    /// Only return text intersecting this region, as [x, y, width, height]
    #[serde(default)]
    pub roi: Option<[i32; 4]>,
    /// Only return text containing one of these substrings
    #[serde(default)]
    pub expected: Option<Vec<String>>,
    /// Minimum confidence between 0 and 1 (default 0.3)
    #[serde(default)]
    pub threshold: Option<f32>,
}

impl OcrArgs {
    pub fn params(&self) -> OcrParams {
        OcrParams {
            roi: self.roi.map(Rect::from),
            expected: self.expected.clone().unwrap_or_default(),
            threshold: self.threshold.unwrap_or(DEFAULT_OCR_THRESHOLD),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControllerArgs {
    /// Controller ID returned by connect_adb_device or connect_window
    pub controller_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClickArgs {
    pub controller_id: String,
    /// X in pixels from the left edge
    pub x: i32,
    /// Y in pixels from the top edge
    pub y: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwipeArgs {
    pub controller_id: String,
    pub start_x: i32,
    pub start_y: i32,
    pub end_x: i32,
    pub end_y: i32,
    /// Duration of the gesture in milliseconds
    pub duration: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InputTextArgs {
    pub controller_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClickKeyArgs {
    pub controller_id: String,
    /// Android keycode for devices, Windows virtual-key code for windows
    pub key: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScrollArgs {
    /// Window controller ID returned by connect_window
    pub controller_id: String,
    /// Horizontal wheel delta (120 per notch)
    pub x: i32,
    /// Vertical wheel delta (120 per notch, positive scrolls up)
    pub y: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReleaseHandleArgs {
    /// Any ID returned by another tool
    pub handle: String,
}
