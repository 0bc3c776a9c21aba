//! End-to-end session flows against the simulated engine
//!
//! These tests drive the orchestrator through discover → connect → load →
//! bind → operate and check that unresolvable handles never reach the engine
//! and that failed engine calls never register anything.

use maa_core::platforms::{sim_device, sim_window, EngineCall, SimFailure};
use maa_core::registry::Entry;
use maa_core::{
    AutomationError, Discovery, EntityKind, InputMethod, OcrParams, Rect, ScreencapMethod,
    ScreenshotStore, SessionOrchestrator, SimulatedEngine, TargetKind,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    engine: SimulatedEngine,
    session: SessionOrchestrator,
    screenshots: TempDir,
    resource: TempDir,
}

fn fixture(engine: SimulatedEngine) -> Fixture {
    let screenshots = tempfile::tempdir().unwrap();
    let resource = tempfile::tempdir().unwrap();
    let session = SessionOrchestrator::new(
        Arc::new(engine.clone()),
        ScreenshotStore::new(screenshots.path().join("shots")),
    );
    Fixture {
        engine,
        session,
        screenshots,
        resource,
    }
}

fn two_devices() -> SimulatedEngine {
    SimulatedEngine::new().with_devices(vec![
        sim_device("deviceA", "serial-a"),
        sim_device("deviceB", "serial-b"),
    ])
}

fn one_device() -> SimulatedEngine {
    SimulatedEngine::new().with_devices(vec![sim_device("deviceA", "serial-a")])
}

#[tokio::test]
async fn test_discovery_registers_every_candidate() {
    let f = fixture(two_devices());

    let discovery = f.session.find_adb_devices().await;
    assert_eq!(
        discovery,
        Discovery::SelectionRequired {
            candidates: vec!["deviceA".to_string(), "deviceB".to_string()]
        }
    );

    let registry = f.session.registry();
    assert_eq!(registry.device("deviceA").unwrap().serial, "serial-a");
    assert!(registry.resolve("unknown").is_none());
}

#[tokio::test]
async fn test_single_discovery_connects_without_selection() {
    let f = fixture(one_device());

    assert_eq!(
        f.session.find_adb_devices().await,
        Discovery::Single {
            name: "deviceA".to_string()
        }
    );
    let controller = f.session.connect_adb_device("deviceA").await.unwrap();
    assert_eq!(
        f.session.registry().resolve(controller.as_str()).map(|e| e.kind()),
        Some(EntityKind::DeviceController)
    );
}

#[tokio::test]
async fn test_empty_discovery() {
    let f = fixture(SimulatedEngine::new());
    assert_eq!(f.session.find_windows().await, Discovery::Empty);
    assert!(f.session.registry().is_empty());
}

#[tokio::test]
async fn test_ambiguous_discovery_blocks_connect_until_selected() {
    let f = fixture(two_devices());
    f.session.find_adb_devices().await;
    let before = f.session.registry().len();

    match f.session.connect_adb_device("deviceB").await {
        Err(AutomationError::SelectionRequired { kind, candidates }) => {
            assert_eq!(kind, TargetKind::AdbDevice);
            assert_eq!(candidates.len(), 2);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(f.session.registry().len(), before);
    assert!(!f
        .engine
        .calls()
        .iter()
        .any(|call| matches!(call, EngineCall::Connect { .. })));

    f.session
        .select_target(TargetKind::AdbDevice, "deviceB")
        .unwrap();
    assert_eq!(
        f.session.selected(TargetKind::AdbDevice).as_deref(),
        Some("deviceB")
    );

    // Only the selected candidate may be connected.
    assert!(matches!(
        f.session.connect_adb_device("deviceA").await,
        Err(AutomationError::SelectionRequired { .. })
    ));
    assert!(f.session.connect_adb_device("deviceB").await.is_ok());
}

#[tokio::test]
async fn test_duplicate_titles_stay_ambiguous() {
    let f = fixture(SimulatedEngine::new().with_windows(vec![
        sim_window("Untitled - Notepad", 1),
        sim_window("Untitled - Notepad", 2),
        sim_window("Calculator", 3),
    ]));

    let first = "Untitled - Notepad [0x1]".to_string();
    let second = "Untitled - Notepad [0x2]".to_string();
    assert_eq!(
        f.session.find_windows().await,
        Discovery::SelectionRequired {
            candidates: vec![first.clone(), second.clone(), "Calculator".to_string()]
        }
    );

    let registry = f.session.registry();
    assert_eq!(registry.window(&first).unwrap().native_handle, 1);
    assert_eq!(registry.window(&second).unwrap().native_handle, 2);
    assert!(registry.resolve("Untitled - Notepad").is_none());

    assert!(matches!(
        f.session
            .connect_window(&second, ScreencapMethod::default(), InputMethod::default())
            .await,
        Err(AutomationError::SelectionRequired { .. })
    ));

    f.session.select_target(TargetKind::Window, &second).unwrap();
    f.session
        .connect_window(&second, ScreencapMethod::default(), InputMethod::default())
        .await
        .unwrap();
    assert!(f.engine.calls().contains(&EngineCall::OpenWindowController {
        native_handle: 2,
        screencap: ScreencapMethod::default(),
        input: InputMethod::default(),
    }));
}

#[tokio::test]
async fn test_duplicate_device_names_use_serials() {
    let f = fixture(SimulatedEngine::new().with_devices(vec![
        sim_device("Pixel 7", "serial-a"),
        sim_device("Pixel 7", "serial-b"),
    ]));

    assert_eq!(
        f.session.find_adb_devices().await.names(),
        vec!["Pixel 7 [serial-a]".to_string(), "Pixel 7 [serial-b]".to_string()]
    );
    assert_eq!(
        f.session.registry().device("Pixel 7 [serial-b]").unwrap().serial,
        "serial-b"
    );
}

#[tokio::test]
async fn test_select_target_rejects_unknown_names() {
    let f = fixture(two_devices());

    assert!(matches!(
        f.session.select_target(TargetKind::AdbDevice, "deviceA"),
        Err(AutomationError::PreconditionFailed(_))
    ));

    f.session.find_adb_devices().await;
    assert!(matches!(
        f.session.select_target(TargetKind::AdbDevice, "deviceZ"),
        Err(AutomationError::HandleNotFound(_))
    ));
    assert!(f.session.selected(TargetKind::AdbDevice).is_none());
}

#[tokio::test]
async fn test_new_discovery_resets_selection() {
    let f = fixture(two_devices());
    f.session.find_adb_devices().await;
    f.session
        .select_target(TargetKind::AdbDevice, "deviceA")
        .unwrap();

    f.session.find_adb_devices().await;
    assert!(f.session.selected(TargetKind::AdbDevice).is_none());
    assert!(f.session.connect_adb_device("deviceA").await.is_err());
}

#[tokio::test]
async fn test_connect_with_unknown_handle_makes_no_engine_call() {
    let f = fixture(one_device());
    f.session.find_adb_devices().await;
    f.engine.clear_calls();
    let before = f.session.registry().len();

    assert!(matches!(
        f.session.connect_adb_device("ghost").await,
        Err(AutomationError::HandleNotFound(_))
    ));
    assert!(matches!(
        f.session
            .connect_window("deviceA", ScreencapMethod::default(), InputMethod::default())
            .await,
        Err(AutomationError::WrongHandleKind { .. })
    ));
    assert!(f.engine.calls().is_empty());
    assert_eq!(f.session.registry().len(), before);
}

#[tokio::test]
async fn test_failed_connect_registers_nothing() {
    let f = fixture(one_device());
    f.session.find_adb_devices().await;
    f.engine.set_failures(SimFailure {
        connect: true,
        ..SimFailure::default()
    });
    let before = f.session.registry().len();

    assert!(matches!(
        f.session.connect_adb_device("deviceA").await,
        Err(AutomationError::EngineFailure(_))
    ));
    assert_eq!(f.session.registry().len(), before);
    // The descriptor stays resolvable for a retry.
    assert!(f.session.registry().device("deviceA").is_ok());
}

#[tokio::test]
async fn test_load_resource_requires_existing_path() {
    let f = fixture(one_device());

    assert!(matches!(
        f.session
            .load_resource(Path::new("/definitely/not/a/bundle"))
            .await,
        Err(AutomationError::PreconditionFailed(_))
    ));
    assert!(f.engine.calls().is_empty());

    f.engine.set_failures(SimFailure {
        load: true,
        ..SimFailure::default()
    });
    assert!(f.session.load_resource(f.resource.path()).await.is_err());
    assert!(f.session.registry().is_empty());
}

#[tokio::test]
async fn test_failed_bind_keeps_controller_and_resource() {
    let f = fixture(one_device());
    f.session.find_adb_devices().await;
    let controller = f.session.connect_adb_device("deviceA").await.unwrap();
    let resource = f.session.load_resource(f.resource.path()).await.unwrap();

    assert!(matches!(
        f.session
            .create_tasker(controller.as_str(), "bad_resource")
            .await,
        Err(AutomationError::HandleNotFound(_))
    ));

    f.engine.set_failures(SimFailure {
        bind: true,
        ..SimFailure::default()
    });
    let before = f.session.registry().len();
    assert!(f
        .session
        .create_tasker(controller.as_str(), resource.as_str())
        .await
        .is_err());
    assert_eq!(f.session.registry().len(), before);
    assert!(f.session.registry().controller(controller.as_str()).is_ok());
    assert!(f.session.registry().resource(resource.as_str()).is_ok());
}

#[tokio::test]
async fn test_operations_reach_the_engine() {
    let f = fixture(one_device());
    f.session.find_adb_devices().await;
    let c1 = f.session.connect_adb_device("deviceA").await.unwrap();

    f.session.click(c1.as_str(), 100, 200).await.unwrap();
    f.session
        .swipe(c1.as_str(), (10, 20), (30, 40), 300)
        .await
        .unwrap();
    f.session.input_text(c1.as_str(), "hello").await.unwrap();
    f.session.click_key(c1.as_str(), 4).await.unwrap();

    let calls = f.engine.calls();
    assert!(calls.contains(&EngineCall::Click {
        target: "serial-a".to_string(),
        x: 100,
        y: 200
    }));
    assert!(calls.contains(&EngineCall::Swipe {
        target: "serial-a".to_string(),
        from: (10, 20),
        to: (30, 40),
        duration_ms: 300
    }));
    assert!(calls.contains(&EngineCall::InputText {
        target: "serial-a".to_string(),
        text: "hello".to_string()
    }));
    assert!(calls.contains(&EngineCall::PressKey {
        target: "serial-a".to_string(),
        key: 4
    }));
}

#[tokio::test]
async fn test_operation_on_missing_controller_makes_no_engine_call() {
    let f = fixture(one_device());
    f.engine.clear_calls();

    assert!(matches!(
        f.session.click("c1", 100, 200).await,
        Err(AutomationError::HandleNotFound(_))
    ));
    assert!(f.session.screencap("c1").await.is_err());
    assert!(f.session.ocr("t1", OcrParams::default()).await.is_err());
    assert!(f.engine.calls().is_empty());
}

#[tokio::test]
async fn test_engine_action_failure_is_reported() {
    let f = fixture(one_device());
    f.session.find_adb_devices().await;
    let c1 = f.session.connect_adb_device("deviceA").await.unwrap();
    f.engine.set_failures(SimFailure {
        action: true,
        ..SimFailure::default()
    });

    assert!(matches!(
        f.session.click(c1.as_str(), 1, 1).await,
        Err(AutomationError::EngineFailure(_))
    ));
}

#[tokio::test]
async fn test_scroll_is_window_only() {
    let engine = SimulatedEngine::new()
        .with_devices(vec![sim_device("deviceA", "serial-a")])
        .with_windows(vec![sim_window("Notepad", 0x42)]);
    let f = fixture(engine);
    f.session.find_adb_devices().await;
    f.session.find_windows().await;

    let device = f.session.connect_adb_device("deviceA").await.unwrap();
    let window = f
        .session
        .connect_window(
            "Notepad",
            ScreencapMethod::MonitorCrop,
            InputMethod::PostMessageWithCursorPos,
        )
        .await
        .unwrap();

    match f.session.scroll(device.as_str(), 0, -120).await {
        Err(AutomationError::WrongHandleKind {
            expected, actual, ..
        }) => {
            assert_eq!(expected, EntityKind::WindowController);
            assert_eq!(actual, EntityKind::DeviceController);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    f.session.scroll(window.as_str(), 0, -120).await.unwrap();

    let calls = f.engine.calls();
    assert!(calls.contains(&EngineCall::OpenWindowController {
        native_handle: 0x42,
        screencap: ScreencapMethod::MonitorCrop,
        input: InputMethod::PostMessageWithCursorPos,
    }));
    assert!(calls.contains(&EngineCall::Scroll {
        target: "0x42".to_string(),
        dx: 0,
        dy: -120
    }));
}

#[tokio::test]
async fn test_ocr_through_bound_tasker() {
    let f = fixture(SimulatedEngine::with_demo_targets());
    f.session.find_windows().await;
    let controller = f
        .session
        .connect_window(
            "Simulated Window",
            ScreencapMethod::default(),
            InputMethod::default(),
        )
        .await
        .unwrap();
    let resource = f.session.load_resource(f.resource.path()).await.unwrap();
    let tasker = f
        .session
        .create_tasker(controller.as_str(), resource.as_str())
        .await
        .unwrap();

    let all = f
        .session
        .ocr(tasker.as_str(), OcrParams::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].text, "Start");

    let roi = OcrParams {
        roi: Some(Rect::new(0, 40, 200, 40)),
        ..OcrParams::default()
    };
    let filtered = f.session.ocr(tasker.as_str(), roi).await.unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].text, "Settings");

    let nothing = OcrParams {
        expected: vec!["Quit".to_string()],
        ..OcrParams::default()
    };
    assert!(f.session.ocr(tasker.as_str(), nothing).await.unwrap().is_empty());

    f.engine.set_failures(SimFailure {
        recognize: true,
        ..SimFailure::default()
    });
    assert!(f
        .session
        .ocr(tasker.as_str(), OcrParams::default())
        .await
        .is_err());
}

#[tokio::test]
async fn test_screencap_saves_png_and_shutdown_removes_it() {
    let f = fixture(SimulatedEngine::with_demo_targets());
    f.session.find_adb_devices().await;
    let controller = f
        .session
        .connect_adb_device("Simulated Phone (emulator-5554)")
        .await
        .unwrap();

    let path = f.session.screencap(controller.as_str()).await.unwrap();
    assert!(path.is_absolute());
    assert!(path.starts_with(std::path::absolute(f.screenshots.path()).unwrap()));
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("screenshot_") && name.ends_with(".png"));
    assert!(path.exists());

    assert_eq!(f.session.shutdown(), 1);
    assert!(!path.exists());
    assert!(f.session.registry().is_empty());
}

#[tokio::test]
async fn test_disconnect_cascades_to_bound_taskers() {
    let f = fixture(SimulatedEngine::with_demo_targets());
    f.session.find_windows().await;
    let controller = f
        .session
        .connect_window(
            "Simulated Window",
            ScreencapMethod::default(),
            InputMethod::default(),
        )
        .await
        .unwrap();
    let resource = f.session.load_resource(f.resource.path()).await.unwrap();
    let tasker = f
        .session
        .create_tasker(controller.as_str(), resource.as_str())
        .await
        .unwrap();

    f.session.disconnect(controller.as_str()).unwrap();
    let registry = f.session.registry();
    assert!(!registry.contains(controller.as_str()));
    assert!(!registry.contains(tasker.as_str()));
    assert!(registry.contains(resource.as_str()));
    assert!(registry.window("Simulated Window").is_ok());

    assert!(f.session.disconnect(controller.as_str()).is_err());
    assert!(f.session.disconnect(resource.as_str()).is_err());
}

#[tokio::test]
async fn test_release_and_list_handles() {
    let f = fixture(SimulatedEngine::with_demo_targets());
    f.session.find_windows().await;
    let resource = f.session.load_resource(f.resource.path()).await.unwrap();

    let kinds: Vec<(String, EntityKind)> = f
        .session
        .handles()
        .into_iter()
        .map(|info| (info.handle.into_string(), info.kind))
        .collect();
    assert!(kinds.contains(&("Simulated Window".to_string(), EntityKind::Window)));
    assert!(kinds.contains(&(resource.to_string(), EntityKind::Resource)));

    assert!(f.session.release(resource.as_str()));
    assert!(!f.session.release(resource.as_str()));
    assert!(matches!(
        f.session.registry().resolve("Simulated Window"),
        Some(Entry::Window(_))
    ));
}
