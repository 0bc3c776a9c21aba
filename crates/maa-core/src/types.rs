//! Common types shared by the engine adapters and the orchestrator

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Axis-aligned rectangle in screen pixels.
///
/// Serialized as `[x, y, width, height]`, the same layout used for OCR boxes
/// and regions of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Saturates instead of overflowing for caller-supplied extents
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// Smallest rectangle covering both `self` and `other`
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.right().max(other.right()).saturating_sub(x),
            self.bottom().max(other.bottom()).saturating_sub(y),
        )
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

impl From<[i32; 4]> for Rect {
    fn from(value: [i32; 4]) -> Self {
        Rect::new(value[0], value[1], value[2], value[3])
    }
}

impl From<Rect> for [i32; 4] {
    fn from(value: Rect) -> Self {
        [value.x, value.y, value.width, value.height]
    }
}

/// Which discovery call produced a batch of candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    AdbDevice,
    Window,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::AdbDevice => write!(f, "adb_device"),
            TargetKind::Window => write!(f, "window"),
        }
    }
}

/// One device reported by `adb devices -l`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Display name, also the registry key of the descriptor
    pub name: String,
    pub adb_path: PathBuf,
    /// Serial or `host:port` address passed to `adb -s`
    pub serial: String,
    pub state: String,
    pub model: Option<String>,
    pub product: Option<String>,
    pub transport_id: Option<String>,
}

/// One top-level desktop window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowDescriptor {
    /// Window title, also the registry key of the descriptor
    pub name: String,
    /// Platform window id (HWND on Windows)
    pub native_handle: u64,
    pub app_name: Option<String>,
    pub pid: Option<u32>,
}

/// How frames are grabbed from a desktop window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreencapMethod {
    /// Render the window itself, works for occluded windows
    #[default]
    PrintWindow,
    /// Capture the monitor the window sits on and crop to the window bounds
    MonitorCrop,
}

/// How mouse and keyboard input reaches a desktop window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMethod {
    /// Post window messages without touching the real cursor
    #[default]
    PostMessage,
    /// Post window messages after moving the real cursor to the target point
    PostMessageWithCursorPos,
}

/// A line of text found on screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrMatch {
    pub text: String,
    #[serde(rename = "box")]
    pub bbox: Rect,
    /// Confidence in `0.0..=1.0`
    pub score: f32,
}

/// Default minimum score kept in OCR results
pub const DEFAULT_OCR_THRESHOLD: f32 = 0.3;

/// Filters applied to raw OCR output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrParams {
    /// Only keep text intersecting this region
    pub roi: Option<Rect>,
    /// Only keep text containing one of these substrings (empty keeps all)
    pub expected: Vec<String>,
    pub threshold: f32,
}

impl Default for OcrParams {
    fn default() -> Self {
        Self {
            roi: None,
            expected: Vec::new(),
            threshold: DEFAULT_OCR_THRESHOLD,
        }
    }
}

impl OcrParams {
    pub fn accepts(&self, hit: &OcrMatch) -> bool {
        if hit.score < self.threshold {
            return false;
        }
        if let Some(roi) = &self.roi {
            if !roi.intersects(&hit.bbox) {
                return false;
            }
        }
        self.expected.is_empty() || self.expected.iter().any(|e| hit.text.contains(e.as_str()))
    }

    /// Keep the accepted hits, preserving reading order
    pub fn apply(&self, hits: Vec<OcrMatch>) -> Vec<OcrMatch> {
        hits.into_iter().filter(|hit| self.accepts(hit)).collect()
    }
}

/// What a task runner should recognize in the next captured frame
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum RecognitionRequest {
    Ocr(OcrParams),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub algorithm: String,
    pub hits: Vec<OcrMatch>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(text: &str, bbox: Rect, score: f32) -> OcrMatch {
        OcrMatch {
            text: text.to_string(),
            bbox,
            score,
        }
    }

    #[test]
    fn test_rect_serializes_as_array() {
        let rect = Rect::new(10, 20, 30, 40);
        assert_eq!(serde_json::to_string(&rect).unwrap(), "[10,20,30,40]");
        let back: Rect = serde_json::from_str("[1,2,3,4]").unwrap();
        assert_eq!(back, Rect::new(1, 2, 3, 4));
    }

    #[test]
    fn test_rect_union_and_intersection() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(20, 5, 10, 10);
        assert_eq!(a.union(&b), Rect::new(0, 0, 30, 15));
        assert!(!a.intersects(&b));
        assert!(a.intersects(&Rect::new(5, 5, 10, 10)));
    }

    #[test]
    fn test_ocr_match_uses_box_key() {
        let value = serde_json::to_value(hit("Start", Rect::new(1, 2, 3, 4), 0.9)).unwrap();
        assert_eq!(value["box"], serde_json::json!([1, 2, 3, 4]));
        assert_eq!(value["text"], "Start");
    }

    #[test]
    fn test_ocr_params_filtering() {
        let hits = vec![
            hit("Start game", Rect::new(0, 0, 50, 10), 0.95),
            hit("Settings", Rect::new(0, 100, 50, 10), 0.9),
            hit("noise", Rect::new(0, 0, 5, 5), 0.1),
        ];

        assert_eq!(OcrParams::default().apply(hits.clone()).len(), 2);

        let expected = OcrParams {
            expected: vec!["Start".to_string()],
            ..OcrParams::default()
        };
        let kept = expected.apply(hits.clone());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text, "Start game");

        let roi = OcrParams {
            roi: Some(Rect::new(0, 90, 100, 30)),
            ..OcrParams::default()
        };
        let kept = roi.apply(hits);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text, "Settings");
    }

    #[test]
    fn test_oversized_roi_saturates() {
        let full = OcrParams {
            roi: Some(Rect::new(1, 0, i32::MAX, 10)),
            ..OcrParams::default()
        };
        assert_eq!(full.roi.unwrap().right(), i32::MAX);
        assert!(full.accepts(&hit("Start", Rect::new(40, 2, 48, 16), 0.9)));
        assert!(!full.accepts(&hit("Below", Rect::new(40, 50, 48, 16), 0.9)));

        let corner = Rect::new(i32::MAX - 5, i32::MAX - 5, 100, 100);
        assert_eq!(corner.bottom(), i32::MAX);
        let merged = Rect::new(i32::MIN, 0, 10, 10).union(&corner);
        assert_eq!(merged.x, i32::MIN);
        assert_eq!(merged.width, i32::MAX);
    }
}
