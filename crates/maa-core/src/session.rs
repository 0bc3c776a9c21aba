//! Session orchestration
//!
//! [`SessionOrchestrator`] sequences the automation workflow:
//!
//! 1. discover devices or windows
//! 2. connect one of them, producing a controller handle
//! 3. load a resource bundle and bind a task runner to the controller
//! 4. operate through the controller or recognize through the task runner
//!
//! Every operation resolves its input handles before touching the engine, so
//! a missing or mistyped handle never results in an engine call. Live objects
//! are only registered after the engine reported success.

use crate::platforms::{AutomationEngine, Controller, Gated};
use crate::registry::{EntityKind, Entry, Handle, HandleRegistry, TaskerBinding};
use crate::screenshot::ScreenshotStore;
use crate::types::{
    InputMethod, OcrMatch, OcrParams, RecognitionRequest, ScreencapMethod, TargetKind,
};
use crate::AutomationError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument};

/// Outcome of a discovery call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Discovery {
    Empty,
    /// Exactly one candidate, usable without asking anyone
    Single { name: String },
    /// Several candidates; a human has to pick one through `select_target`
    SelectionRequired { candidates: Vec<String> },
}

impl Discovery {
    fn from_names(names: Vec<String>) -> Self {
        match names.len() {
            0 => Discovery::Empty,
            1 => Discovery::Single {
                name: names.into_iter().next().unwrap_or_default(),
            },
            _ => Discovery::SelectionRequired { candidates: names },
        }
    }

    pub fn names(&self) -> Vec<String> {
        match self {
            Discovery::Empty => Vec::new(),
            Discovery::Single { name } => vec![name.clone()],
            Discovery::SelectionRequired { candidates } => candidates.clone(),
        }
    }

    pub fn selection_required(&self) -> bool {
        matches!(self, Discovery::SelectionRequired { .. })
    }
}

#[derive(Debug, Clone, Default)]
struct DiscoveryBatch {
    candidates: Vec<String>,
    selected: Option<String>,
}

impl DiscoveryBatch {
    fn ambiguous(&self) -> bool {
        self.candidates.len() > 1
    }
}

/// A live handle and what it refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleInfo {
    pub handle: Handle,
    pub kind: EntityKind,
}

pub struct SessionOrchestrator {
    engine: Arc<dyn AutomationEngine>,
    registry: Arc<HandleRegistry>,
    screenshots: ScreenshotStore,
    batches: Mutex<HashMap<TargetKind, DiscoveryBatch>>,
}

fn dedup_names(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::new();
    for name in names {
        if !unique.contains(&name) {
            unique.push(name);
        }
    }
    unique
}

/// Registry key for each candidate: its display name, or `name [id]` when
/// several candidates of one discovery share that name
fn candidate_keys<T>(
    candidates: &[T],
    name: impl Fn(&T) -> String,
    id: impl Fn(&T) -> String,
) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for candidate in candidates {
        *counts.entry(name(candidate)).or_default() += 1;
    }
    candidates
        .iter()
        .map(|candidate| {
            let base = name(candidate);
            if counts.get(&base).copied().unwrap_or_default() > 1 {
                format!("{base} [{}]", id(candidate))
            } else {
                base
            }
        })
        .collect()
}

impl SessionOrchestrator {
    pub fn new(engine: Arc<dyn AutomationEngine>, screenshots: ScreenshotStore) -> Self {
        Self::with_registry(engine, Arc::new(HandleRegistry::new()), screenshots)
    }

    pub fn with_registry(
        engine: Arc<dyn AutomationEngine>,
        registry: Arc<HandleRegistry>,
        screenshots: ScreenshotStore,
    ) -> Self {
        info!("Session orchestrator using the {} engine", engine.name());
        Self {
            engine,
            registry,
            screenshots,
            batches: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }

    pub fn screenshots(&self) -> &ScreenshotStore {
        &self.screenshots
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    fn batches(&self) -> MutexGuard<'_, HashMap<TargetKind, DiscoveryBatch>> {
        self.batches.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record_batch(&self, kind: TargetKind, names: Vec<String>) -> Discovery {
        let discovery = Discovery::from_names(names.clone());
        self.batches().insert(
            kind,
            DiscoveryBatch {
                candidates: names,
                selected: None,
            },
        );
        if discovery.selection_required() {
            info!(
                "{} candidates of kind {} found, waiting for a selection",
                discovery.names().len(),
                kind
            );
        }
        discovery
    }

    // ---- discovery ----

    /// Enumerate ADB devices and register each under its display name,
    /// suffixed with the serial when two devices share a name
    #[instrument(skip(self))]
    pub async fn find_adb_devices(&self) -> Discovery {
        let devices = self.engine.enumerate_devices().await;
        let keys = candidate_keys(&devices, |d| d.name.clone(), |d| d.serial.clone());
        let names = dedup_names(keys.into_iter().zip(devices).map(|(key, mut device)| {
            device.name = key.clone();
            self.registry.register_by_name(&key, Entry::Device(device));
            key
        }));
        self.record_batch(TargetKind::AdbDevice, names)
    }

    /// Enumerate titled desktop windows and register each under its title,
    /// suffixed with the window id when two windows share a title
    #[instrument(skip(self))]
    pub async fn find_windows(&self) -> Discovery {
        let windows: Vec<_> = self
            .engine
            .enumerate_windows()
            .await
            .into_iter()
            .filter(|window| !window.name.trim().is_empty())
            .collect();
        let keys = candidate_keys(
            &windows,
            |w| w.name.clone(),
            |w| format!("{:#x}", w.native_handle),
        );
        let names = dedup_names(keys.into_iter().zip(windows).map(|(key, mut window)| {
            window.name = key.clone();
            self.registry.register_by_name(&key, Entry::Window(window));
            key
        }));
        self.record_batch(TargetKind::Window, names)
    }

    /// Record the human choice for the latest discovery batch of `kind`
    #[instrument(skip(self))]
    pub fn select_target(&self, kind: TargetKind, name: &str) -> Result<(), AutomationError> {
        let mut batches = self.batches();
        let batch = batches.get_mut(&kind).ok_or_else(|| {
            AutomationError::PreconditionFailed(format!("no {kind} discovery has been run yet"))
        })?;
        if !batch.candidates.iter().any(|candidate| candidate == name) {
            return Err(AutomationError::HandleNotFound(name.to_string()));
        }
        batch.selected = Some(name.to_string());
        info!("Selected {} '{}'", kind, name);
        Ok(())
    }

    /// Name chosen for the latest batch of `kind`, if any
    pub fn selected(&self, kind: TargetKind) -> Option<String> {
        self.batches().get(&kind).and_then(|batch| batch.selected.clone())
    }

    fn check_selection(&self, kind: TargetKind, name: &str) -> Result<(), AutomationError> {
        let batches = self.batches();
        match batches.get(&kind) {
            Some(batch) if batch.ambiguous() && batch.selected.as_deref() != Some(name) => {
                Err(AutomationError::SelectionRequired {
                    kind,
                    candidates: batch.candidates.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    // ---- connect / bind ----

    #[instrument(skip(self))]
    pub async fn connect_adb_device(&self, device_name: &str) -> Result<Handle, AutomationError> {
        let device = self.registry.device(device_name)?;
        self.check_selection(TargetKind::AdbDevice, device_name)?;

        let controller =
            Controller::Device(Gated::new(self.engine.open_device_controller(&device)));
        controller.connect().await?;

        let handle = self.registry.register(Entry::Controller(controller));
        info!("Connected to device '{}' as {}", device_name, handle);
        Ok(handle)
    }

    #[instrument(skip(self))]
    pub async fn connect_window(
        &self,
        window_name: &str,
        screencap: ScreencapMethod,
        input: InputMethod,
    ) -> Result<Handle, AutomationError> {
        let window = self.registry.window(window_name)?;
        self.check_selection(TargetKind::Window, window_name)?;

        let controller = Controller::Window(Gated::new(self.engine.open_window_controller(
            window.native_handle,
            screencap,
            input,
        )));
        controller.connect().await?;

        let handle = self.registry.register(Entry::Controller(controller));
        info!("Connected to window '{}' as {}", window_name, handle);
        Ok(handle)
    }

    #[instrument(skip(self))]
    pub async fn load_resource(&self, path: &Path) -> Result<Handle, AutomationError> {
        if !path.exists() {
            return Err(AutomationError::PreconditionFailed(format!(
                "resource path does not exist: {}",
                path.display()
            )));
        }

        let bundle = self.engine.create_resource_bundle(path);
        if !bundle.load().await {
            return Err(AutomationError::EngineFailure(format!(
                "failed to load resource bundle {}",
                path.display()
            )));
        }

        let handle = self.registry.register(Entry::Resource(bundle));
        info!("Loaded resource {} as {}", path.display(), handle);
        Ok(handle)
    }

    #[instrument(skip(self))]
    pub async fn create_tasker(
        &self,
        controller_id: &str,
        resource_id: &str,
    ) -> Result<Handle, AutomationError> {
        let controller = self.registry.controller(controller_id)?;
        let resource = self.registry.resource(resource_id)?;

        let runner = self.engine.bind_task_runner(resource, controller);
        if !runner.inited() {
            return Err(AutomationError::EngineFailure(
                "task runner did not initialize".into(),
            ));
        }

        let handle = self.registry.register_tasker(TaskerBinding {
            runner,
            controller: Handle::from(controller_id),
            resource: Handle::from(resource_id),
        })?;
        info!("Bound task runner {}", handle);
        Ok(handle)
    }

    // ---- operate ----

    /// Recognize text on the current frame of the tasker's controller
    #[instrument(skip(self, params))]
    pub async fn ocr(
        &self,
        tasker_id: &str,
        params: OcrParams,
    ) -> Result<Vec<OcrMatch>, AutomationError> {
        let binding = self.registry.tasker(tasker_id)?;
        let result = binding
            .runner
            .capture_and_recognize(&RecognitionRequest::Ocr(params))
            .await
            .ok_or_else(|| AutomationError::EngineFailure("recognition produced no result".into()))?;
        debug!("OCR returned {} hit(s)", result.hits.len());
        Ok(result.hits)
    }

    /// Capture a frame and save it as PNG, returning its absolute path
    #[instrument(skip(self))]
    pub async fn screencap(&self, controller_id: &str) -> Result<PathBuf, AutomationError> {
        let controller = self.registry.controller(controller_id)?;
        let frame = controller.capture().await?;
        self.screenshots.save(&frame)
    }

    #[instrument(skip(self))]
    pub async fn click(&self, controller_id: &str, x: i32, y: i32) -> Result<(), AutomationError> {
        self.registry.controller(controller_id)?.click(x, y).await
    }

    #[instrument(skip(self))]
    pub async fn swipe(
        &self,
        controller_id: &str,
        start: (i32, i32),
        end: (i32, i32),
        duration_ms: u32,
    ) -> Result<(), AutomationError> {
        self.registry
            .controller(controller_id)?
            .swipe(start.0, start.1, end.0, end.1, duration_ms)
            .await
    }

    #[instrument(skip(self, text))]
    pub async fn input_text(&self, controller_id: &str, text: &str) -> Result<(), AutomationError> {
        self.registry.controller(controller_id)?.input_text(text).await
    }

    /// `key` is an Android keycode for devices, a virtual-key code for windows
    #[instrument(skip(self))]
    pub async fn click_key(&self, controller_id: &str, key: i32) -> Result<(), AutomationError> {
        self.registry.controller(controller_id)?.press_key(key).await
    }

    /// Mouse wheel on a window controller; devices have no wheel
    #[instrument(skip(self))]
    pub async fn scroll(&self, controller_id: &str, dx: i32, dy: i32) -> Result<(), AutomationError> {
        self.registry
            .window_controller(controller_id)?
            .scroll(dx, dy)
            .await
    }

    // ---- teardown ----

    /// Drop a controller and every task runner bound to it
    #[instrument(skip(self))]
    pub fn disconnect(&self, controller_id: &str) -> Result<(), AutomationError> {
        let cascaded = self.registry.remove_controller(controller_id)?;
        info!(
            "Disconnected {} ({} bound task runner(s) released)",
            controller_id,
            cascaded.len()
        );
        Ok(())
    }

    /// Unregister any single handle; controllers are disconnected
    #[instrument(skip(self))]
    pub fn release(&self, handle: &str) -> bool {
        match self.registry.resolve(handle) {
            Some(Entry::Controller(_)) => self.disconnect(handle).is_ok(),
            Some(_) => self.registry.unregister(handle),
            None => {
                debug!("Release of unknown handle {}", handle);
                false
            }
        }
    }

    pub fn handles(&self) -> Vec<HandleInfo> {
        let mut handles: Vec<HandleInfo> = self
            .registry
            .kinds()
            .into_iter()
            .map(|(handle, kind)| HandleInfo { handle, kind })
            .collect();
        handles.sort_by(|a, b| a.handle.cmp(&b.handle));
        handles
    }

    /// Forget every handle and discovery batch and delete saved screenshots
    pub fn shutdown(&self) -> usize {
        let live = self.registry.len();
        self.registry.clear();
        self.batches().clear();
        let removed = self.screenshots.cleanup();
        if live > 0 {
            info!("Shutdown released {} live handle(s)", live);
        }
        info!("Session shut down, {} screenshot(s) removed", removed);
        removed
    }
}
