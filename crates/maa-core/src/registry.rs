//! Handle registry
//!
//! Maps opaque string handles to the live objects created during a session:
//! discovered devices and windows, connected controllers, loaded resource
//! bundles and bound task runners. Generated handles are random UUIDs;
//! discovered targets are stored under their display name (made unique within
//! one discovery) so a later discovery with the same name replaces the
//! earlier entry.
//!
//! The registry is owned by the orchestrator and shared through an `Arc`.
//! It lives as long as the process unless cleared explicitly.

use crate::platforms::{Controller, DeviceController, ResourceBundle, TaskRunner, WindowController};
use crate::types::{DeviceDescriptor, WindowDescriptor};
use crate::AutomationError;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Opaque identifier of a registered object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(String);

impl Handle {
    /// A fresh handle that has never been issued before
    pub fn random() -> Self {
        Handle(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Handle {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<String> for Handle {
    fn from(value: String) -> Self {
        Handle(value)
    }
}

impl From<&str> for Handle {
    fn from(value: &str) -> Self {
        Handle(value.to_string())
    }
}

/// The kind of object a handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Device,
    Window,
    DeviceController,
    WindowController,
    Resource,
    Tasker,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Device => "device",
            EntityKind::Window => "window",
            EntityKind::DeviceController => "device controller",
            EntityKind::WindowController => "window controller",
            EntityKind::Resource => "resource bundle",
            EntityKind::Tasker => "task runner",
        };
        f.write_str(name)
    }
}

/// A task runner together with the handles it was bound from
#[derive(Clone)]
pub struct TaskerBinding {
    pub runner: Arc<dyn TaskRunner>,
    pub controller: Handle,
    pub resource: Handle,
}

/// A registered object
#[derive(Clone)]
pub enum Entry {
    Device(DeviceDescriptor),
    Window(WindowDescriptor),
    Controller(Controller),
    Resource(Arc<dyn ResourceBundle>),
    Tasker(TaskerBinding),
}

impl Entry {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entry::Device(_) => EntityKind::Device,
            Entry::Window(_) => EntityKind::Window,
            Entry::Controller(Controller::Device(_)) => EntityKind::DeviceController,
            Entry::Controller(Controller::Window(_)) => EntityKind::WindowController,
            Entry::Resource(_) => EntityKind::Resource,
            Entry::Tasker(_) => EntityKind::Tasker,
        }
    }
}

// Descriptors compare by value, live objects by identity.
impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Entry::Device(a), Entry::Device(b)) => a == b,
            (Entry::Window(a), Entry::Window(b)) => a == b,
            (Entry::Controller(a), Entry::Controller(b)) => a.same_as(b),
            (Entry::Resource(a), Entry::Resource(b)) => Arc::ptr_eq(a, b),
            (Entry::Tasker(a), Entry::Tasker(b)) => Arc::ptr_eq(&a.runner, &b.runner),
            _ => false,
        }
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::Device(device) => f.debug_tuple("Device").field(device).finish(),
            Entry::Window(window) => f.debug_tuple("Window").field(window).finish(),
            Entry::Controller(controller) => {
                f.debug_tuple("Controller").field(controller).finish()
            }
            Entry::Resource(resource) => f
                .debug_tuple("Resource")
                .field(&resource.root().display())
                .finish(),
            Entry::Tasker(binding) => f
                .debug_struct("Tasker")
                .field("controller", &binding.controller)
                .field("resource", &binding.resource)
                .finish(),
        }
    }
}

#[derive(Default)]
pub struct HandleRegistry {
    entries: Mutex<HashMap<Handle, Entry>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<Handle, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store under a freshly generated handle
    pub fn register(&self, entry: Entry) -> Handle {
        let handle = Handle::random();
        self.entries().insert(handle.clone(), entry);
        handle
    }

    /// Store under `name`, replacing whatever was registered there
    pub fn register_by_name(&self, name: &str, entry: Entry) -> Handle {
        let handle = Handle::from(name);
        self.entries().insert(handle.clone(), entry);
        handle
    }

    pub fn resolve(&self, handle: &str) -> Option<Entry> {
        self.entries().get(handle).cloned()
    }

    pub fn unregister(&self, handle: &str) -> bool {
        self.entries().remove(handle).is_some()
    }

    /// Removes a controller and every task runner bound to it under one lock,
    /// returning the handles of the removed task runners
    pub fn remove_controller(&self, handle: &str) -> Result<Vec<Handle>, AutomationError> {
        let mut entries = self.entries();
        match entries.get(handle) {
            Some(Entry::Controller(_)) => {}
            Some(other) => {
                return Err(AutomationError::WrongHandleKind {
                    handle: handle.to_string(),
                    expected: EntityKind::DeviceController,
                    actual: other.kind(),
                })
            }
            None => return Err(AutomationError::HandleNotFound(handle.to_string())),
        }
        entries.remove(handle);

        let bound: Vec<Handle> = entries
            .iter()
            .filter(|(_, entry)| {
                matches!(entry, Entry::Tasker(binding) if binding.controller.as_str() == handle)
            })
            .map(|(tasker, _)| tasker.clone())
            .collect();
        for tasker in &bound {
            entries.remove(tasker.as_str());
        }
        Ok(bound)
    }

    /// Stores a task runner only while the controller it is bound to is live
    pub fn register_tasker(&self, binding: TaskerBinding) -> Result<Handle, AutomationError> {
        let mut entries = self.entries();
        if !matches!(
            entries.get(binding.controller.as_str()),
            Some(Entry::Controller(_))
        ) {
            return Err(AutomationError::HandleNotFound(binding.controller.into_string()));
        }
        let handle = Handle::random();
        entries.insert(handle.clone(), Entry::Tasker(binding));
        Ok(handle)
    }

    pub fn list(&self) -> Vec<Handle> {
        self.entries().keys().cloned().collect()
    }

    /// Live handles with the kind of object behind each
    pub fn kinds(&self) -> Vec<(Handle, EntityKind)> {
        self.entries()
            .iter()
            .map(|(handle, entry)| (handle.clone(), entry.kind()))
            .collect()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.entries().contains_key(handle)
    }

    fn resolve_as<T>(
        &self,
        handle: &str,
        expected: EntityKind,
        pick: impl FnOnce(Entry) -> Result<T, Entry>,
    ) -> Result<T, AutomationError> {
        let entry = self
            .resolve(handle)
            .ok_or_else(|| AutomationError::HandleNotFound(handle.to_string()))?;
        pick(entry).map_err(|other| AutomationError::WrongHandleKind {
            handle: handle.to_string(),
            expected,
            actual: other.kind(),
        })
    }

    pub fn device(&self, handle: &str) -> Result<DeviceDescriptor, AutomationError> {
        self.resolve_as(handle, EntityKind::Device, |entry| match entry {
            Entry::Device(device) => Ok(device),
            other => Err(other),
        })
    }

    pub fn window(&self, handle: &str) -> Result<WindowDescriptor, AutomationError> {
        self.resolve_as(handle, EntityKind::Window, |entry| match entry {
            Entry::Window(window) => Ok(window),
            other => Err(other),
        })
    }

    /// Any connected controller, device or window
    pub fn controller(&self, handle: &str) -> Result<Controller, AutomationError> {
        self.resolve_as(handle, EntityKind::DeviceController, |entry| match entry {
            Entry::Controller(controller) => Ok(controller),
            other => Err(other),
        })
    }

    pub fn device_controller(&self, handle: &str) -> Result<DeviceController, AutomationError> {
        self.resolve_as(handle, EntityKind::DeviceController, |entry| match entry {
            Entry::Controller(Controller::Device(controller)) => Ok(controller),
            other => Err(other),
        })
    }

    pub fn window_controller(&self, handle: &str) -> Result<WindowController, AutomationError> {
        self.resolve_as(handle, EntityKind::WindowController, |entry| match entry {
            Entry::Controller(Controller::Window(controller)) => Ok(controller),
            other => Err(other),
        })
    }

    pub fn resource(&self, handle: &str) -> Result<Arc<dyn ResourceBundle>, AutomationError> {
        self.resolve_as(handle, EntityKind::Resource, |entry| match entry {
            Entry::Resource(resource) => Ok(resource),
            other => Err(other),
        })
    }

    pub fn tasker(&self, handle: &str) -> Result<TaskerBinding, AutomationError> {
        self.resolve_as(handle, EntityKind::Tasker, |entry| match entry {
            Entry::Tasker(binding) => Ok(binding),
            other => Err(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::{AutomationEngine, Gated, SimulatedEngine};
    use std::collections::HashSet;
    use std::path::{Path, PathBuf};

    fn device(name: &str) -> DeviceDescriptor {
        DeviceDescriptor {
            name: name.to_string(),
            adb_path: PathBuf::from("adb"),
            serial: format!("{name}-serial"),
            state: "device".to_string(),
            model: None,
            product: None,
            transport_id: None,
        }
    }

    fn window(name: &str, native_handle: u64) -> WindowDescriptor {
        WindowDescriptor {
            name: name.to_string(),
            native_handle,
            app_name: None,
            pid: None,
        }
    }

    #[test]
    fn test_register_then_resolve_returns_same_entry() {
        let registry = HandleRegistry::new();
        let entry = Entry::Device(device("deviceA"));
        let handle = registry.register(entry.clone());
        assert_eq!(registry.resolve(handle.as_str()), Some(entry));
    }

    #[test]
    fn test_generated_handles_are_unique() {
        let registry = HandleRegistry::new();
        let mut seen = HashSet::new();
        for i in 0..500 {
            let handle = registry.register(Entry::Window(window("w", i)));
            assert!(seen.insert(handle), "handle issued twice");
        }
        assert_eq!(registry.len(), 500);
    }

    #[test]
    fn test_register_by_name_overwrites() {
        let registry = HandleRegistry::new();
        let first = registry.register_by_name("emulator", Entry::Window(window("emulator", 1)));
        let second = registry.register_by_name("emulator", Entry::Window(window("emulator", 2)));

        assert_eq!(first.as_str(), "emulator");
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.window("emulator").unwrap().native_handle, 2);
    }

    #[test]
    fn test_resolve_unknown_and_unregistered() {
        let registry = HandleRegistry::new();
        assert!(registry.resolve("never-registered").is_none());

        let handle = registry.register(Entry::Device(device("a")));
        assert!(registry.unregister(handle.as_str()));
        assert!(!registry.unregister(handle.as_str()));
        assert!(registry.resolve(handle.as_str()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_typed_resolution_reports_wrong_kind() {
        let registry = HandleRegistry::new();
        let handle = registry.register_by_name("deviceA", Entry::Device(device("deviceA")));

        match registry.window(handle.as_str()) {
            Err(AutomationError::WrongHandleKind {
                expected, actual, ..
            }) => {
                assert_eq!(expected, EntityKind::Window);
                assert_eq!(actual, EntityKind::Device);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        assert!(matches!(
            registry.controller("missing"),
            Err(AutomationError::HandleNotFound(_))
        ));
    }

    #[test]
    fn test_list_kinds_and_clear() {
        let registry = HandleRegistry::new();
        registry.register_by_name("a", Entry::Device(device("a")));
        registry.register_by_name("b", Entry::Window(window("b", 7)));

        let mut handles: Vec<String> = registry.list().into_iter().map(Handle::into_string).collect();
        handles.sort();
        assert_eq!(handles, vec!["a", "b"]);

        let kinds: HashMap<Handle, EntityKind> = registry.kinds().into_iter().collect();
        assert_eq!(kinds.get("b"), Some(&EntityKind::Window));
        assert!(registry.contains("a"));

        registry.clear();
        assert!(registry.is_empty());
    }

    fn sim_controller() -> (SimulatedEngine, Controller) {
        let engine = SimulatedEngine::new();
        let control = engine.open_device_controller(&device("deviceA"));
        (engine, Controller::Device(Gated::new(control)))
    }

    fn bind(engine: &SimulatedEngine, controller: &Controller, handle: &Handle) -> TaskerBinding {
        let resource = engine.create_resource_bundle(Path::new("bundle"));
        TaskerBinding {
            runner: engine.bind_task_runner(resource, controller.clone()),
            controller: handle.clone(),
            resource: Handle::from("bundle"),
        }
    }

    #[test]
    fn test_remove_controller_takes_bound_taskers() {
        let registry = HandleRegistry::new();
        let (engine, controller) = sim_controller();
        let kept = registry.register(Entry::Controller(controller.clone()));
        let doomed = registry.register(Entry::Controller(controller.clone()));
        let bound = registry
            .register_tasker(bind(&engine, &controller, &doomed))
            .unwrap();
        let other = registry
            .register_tasker(bind(&engine, &controller, &kept))
            .unwrap();

        assert_eq!(registry.remove_controller(doomed.as_str()).unwrap(), vec![bound.clone()]);
        assert!(!registry.contains(doomed.as_str()));
        assert!(!registry.contains(bound.as_str()));
        assert!(registry.contains(kept.as_str()));
        assert!(registry.contains(other.as_str()));

        assert!(matches!(
            registry.remove_controller(doomed.as_str()),
            Err(AutomationError::HandleNotFound(_))
        ));
    }

    #[test]
    fn test_remove_controller_rejects_other_kinds() {
        let registry = HandleRegistry::new();
        registry.register_by_name("deviceA", Entry::Device(device("deviceA")));
        assert!(matches!(
            registry.remove_controller("deviceA"),
            Err(AutomationError::WrongHandleKind {
                actual: EntityKind::Device,
                ..
            })
        ));
        assert!(registry.contains("deviceA"));
    }

    #[test]
    fn test_register_tasker_needs_live_controller() {
        let registry = HandleRegistry::new();
        let (engine, controller) = sim_controller();
        let handle = registry.register(Entry::Controller(controller.clone()));
        registry.remove_controller(handle.as_str()).unwrap();

        assert!(matches!(
            registry.register_tasker(bind(&engine, &controller, &handle)),
            Err(AutomationError::HandleNotFound(_))
        ));
        assert!(registry.is_empty());
    }
}
