//! Text recognition through the `tesseract` executable
//!
//! A resource bundle is a directory holding language data under
//! `model/ocr/*.traineddata`. The task runner captures a frame from its
//! controller, hands it to `tesseract ... tsv` and groups the recognized
//! words into lines.

use super::{Controller, ResourceBundle, TaskRunner};
use crate::types::{OcrMatch, RecognitionRequest, RecognitionResult, Rect};
use crate::AutomationError;
use async_trait::async_trait;
use image::{ImageFormat, RgbaImage};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, info, warn};

pub struct TesseractBundle {
    root: PathBuf,
    languages: Mutex<Vec<String>>,
}

impl TesseractBundle {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            languages: Mutex::new(Vec::new()),
        }
    }
}

async fn scan_languages(model_dir: &Path) -> std::io::Result<Vec<String>> {
    let mut languages = Vec::new();
    let mut entries = tokio::fs::read_dir(model_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("traineddata") {
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                languages.push(stem.to_string());
            }
        }
    }
    languages.sort();
    Ok(languages)
}

#[async_trait]
impl ResourceBundle for TesseractBundle {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn load(&self) -> bool {
        let model_dir = self.ocr_model_dir();
        let languages = match scan_languages(&model_dir).await {
            Ok(languages) => languages,
            Err(e) => {
                warn!("[ocr] Cannot read {}: {}", model_dir.display(), e);
                return false;
            }
        };
        if languages.is_empty() {
            warn!("[ocr] No .traineddata files in {}", model_dir.display());
            return false;
        }

        info!(
            "[ocr] Loaded bundle {} with languages {:?}",
            self.root.display(),
            languages
        );
        *self.languages.lock().unwrap_or_else(|e| e.into_inner()) = languages;
        true
    }

    fn ocr_languages(&self) -> Vec<String> {
        self.languages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[derive(Debug, Default)]
struct LineAccumulator {
    words: Vec<String>,
    bbox: Option<Rect>,
    confidence_sum: f32,
}

impl LineAccumulator {
    fn push(&mut self, word: &str, bbox: Rect, confidence: f32) {
        self.words.push(word.to_string());
        self.bbox = Some(match self.bbox {
            Some(current) => current.union(&bbox),
            None => bbox,
        });
        self.confidence_sum += confidence;
    }

    fn finish(self) -> Option<OcrMatch> {
        let bbox = self.bbox?;
        let score = self.confidence_sum / self.words.len() as f32 / 100.0;
        Some(OcrMatch {
            text: self.words.join(" "),
            bbox,
            score: score.clamp(0.0, 1.0),
        })
    }
}

/// Group word rows of tesseract TSV output into lines, in reading order
pub fn parse_tsv(tsv: &str) -> Vec<OcrMatch> {
    let mut lines = Vec::new();
    let mut current_key: Option<(u32, u32, u32, u32)> = None;
    let mut current = LineAccumulator::default();

    for row in tsv.lines().skip(1) {
        let columns: Vec<&str> = row.split('\t').collect();
        if columns.len() < 12 || columns[0] != "5" {
            continue;
        }
        let text = columns[11].trim();
        if text.is_empty() {
            continue;
        }
        let numbers: Option<Vec<i32>> = columns[1..10].iter().map(|c| c.parse().ok()).collect();
        let Some(numbers) = numbers else {
            debug!("[ocr] Skipping malformed row: {}", row);
            continue;
        };
        let Ok(confidence) = columns[10].parse::<f32>() else {
            continue;
        };
        if confidence < 0.0 {
            continue;
        }

        let key = (
            numbers[0] as u32,
            numbers[1] as u32,
            numbers[2] as u32,
            numbers[3] as u32,
        );
        if current_key != Some(key) {
            if let Some(line) = std::mem::take(&mut current).finish() {
                lines.push(line);
            }
            current_key = Some(key);
        }
        let bbox = Rect::new(numbers[5], numbers[6], numbers[7], numbers[8]);
        current.push(text, bbox, confidence);
    }

    if let Some(line) = current.finish() {
        lines.push(line);
    }
    lines
}

pub struct TesseractTasker {
    tesseract: Option<PathBuf>,
    resource: Arc<dyn ResourceBundle>,
    controller: Controller,
    timeout: Duration,
}

impl TesseractTasker {
    pub fn new(
        tesseract: Option<PathBuf>,
        resource: Arc<dyn ResourceBundle>,
        controller: Controller,
        timeout: Duration,
    ) -> Self {
        Self {
            tesseract,
            resource,
            controller,
            timeout,
        }
    }

    async fn recognize(&self, frame: RgbaImage) -> Result<Vec<OcrMatch>, AutomationError> {
        let tesseract = self.tesseract.as_ref().ok_or_else(|| {
            AutomationError::PreconditionFailed("tesseract executable not found".into())
        })?;
        let languages = self.resource.ocr_languages();
        if languages.is_empty() {
            return Err(AutomationError::PreconditionFailed(
                "resource bundle has no OCR languages loaded".into(),
            ));
        }

        let input = tokio::task::spawn_blocking(move || write_frame(&frame))
            .await
            .map_err(|e| {
                AutomationError::PlatformError(format!("frame encoding task failed: {e}"))
            })??;

        let mut command = Command::new(tesseract);
        command
            .arg(input.path())
            .arg("stdout")
            .arg("--tessdata-dir")
            .arg(self.resource.ocr_model_dir())
            .arg("-l")
            .arg(languages.join("+"))
            .arg("tsv")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                AutomationError::Timeout(format!("tesseract did not finish within {:?}", self.timeout))
            })??;
        if !output.status.success() {
            return Err(AutomationError::EngineFailure(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// PNG copy of `frame` in a temp file that lives as long as the handle
fn write_frame(frame: &RgbaImage) -> Result<NamedTempFile, AutomationError> {
    let file = tempfile::Builder::new()
        .prefix("maa-ocr-")
        .suffix(".png")
        .tempfile()?;
    frame.save_with_format(file.path(), ImageFormat::Png)?;
    Ok(file)
}

#[async_trait]
impl TaskRunner for TesseractTasker {
    fn inited(&self) -> bool {
        self.tesseract.is_some() && !self.resource.ocr_languages().is_empty()
    }

    async fn capture_and_recognize(
        &self,
        request: &RecognitionRequest,
    ) -> Option<RecognitionResult> {
        let RecognitionRequest::Ocr(params) = request;

        let frame = match self.controller.capture().await {
            Ok(frame) => frame,
            Err(e) => {
                warn!("[ocr] Capture failed: {}", e);
                return None;
            }
        };
        match self.recognize(frame).await {
            Ok(hits) => {
                let hits = params.apply(hits);
                debug!("[ocr] {} line(s) kept after filtering", hits.len());
                Some(RecognitionResult {
                    algorithm: "ocr".to_string(),
                    hits,
                })
            }
            Err(e) => {
                warn!("[ocr] Recognition failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t800\t600\t-1\t
4\t1\t1\t1\t1\t0\t10\t10\t120\t20\t-1\t
5\t1\t1\t1\t1\t1\t10\t10\t50\t20\t96.5\tStart
5\t1\t1\t1\t1\t2\t70\t12\t60\t18\t91.5\tGame
5\t1\t2\t1\t1\t1\t10\t100\t80\t20\t40\tSettings
5\t1\t2\t1\t1\t2\t95\t100\t10\t20\t-1\t
";

    #[test]
    fn test_parse_tsv_groups_words_into_lines() {
        let lines = parse_tsv(TSV);
        assert_eq!(lines.len(), 2);

        assert_eq!(lines[0].text, "Start Game");
        assert_eq!(lines[0].bbox, Rect::new(10, 10, 120, 20));
        assert!((lines[0].score - 0.94).abs() < 1e-4);

        assert_eq!(lines[1].text, "Settings");
        assert!((lines[1].score - 0.40).abs() < 1e-4);
    }

    #[test]
    fn test_write_frame_produces_png() {
        let frame = RgbaImage::new(12, 7);
        let file = write_frame(&frame).unwrap();
        let decoded = image::open(file.path()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (12, 7));

        let path = file.path().to_path_buf();
        drop(file);
        assert!(!path.exists());
    }

    #[test]
    fn test_parse_tsv_empty_output() {
        assert!(parse_tsv("").is_empty());
        assert!(parse_tsv("level\tpage_num\n").is_empty());
    }

    #[tokio::test]
    async fn test_bundle_loads_languages() {
        let tmp = tempfile::tempdir().unwrap();
        let model_dir = tmp.path().join("model").join("ocr");
        std::fs::create_dir_all(&model_dir).unwrap();
        std::fs::write(model_dir.join("eng.traineddata"), b"").unwrap();
        std::fs::write(model_dir.join("chi_sim.traineddata"), b"").unwrap();
        std::fs::write(model_dir.join("README.txt"), b"").unwrap();

        let bundle = TesseractBundle::new(tmp.path());
        assert!(bundle.load().await);
        assert_eq!(bundle.ocr_languages(), vec!["chi_sim", "eng"]);
    }

    #[tokio::test]
    async fn test_bundle_without_models_fails_to_load() {
        let tmp = tempfile::tempdir().unwrap();
        let bundle = TesseractBundle::new(tmp.path());
        assert!(!bundle.load().await);
        assert!(bundle.ocr_languages().is_empty());
    }
}
