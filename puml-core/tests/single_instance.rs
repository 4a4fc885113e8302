//! End-to-end tests for single-instance coordination: lock, IPC hand-off
//! and the registry acting as the UI-affine consumer of the event queue.
//!
//! "Process B" is simulated from the test thread; flock contention works
//! across open file descriptions, so a second open within one process
//! contends exactly like a second process would.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use puml_core::{
    send_to_running_instance, AppContext, AppEvent, InstanceLock, IpcServer, RendererSet,
    SessionRegistry,
};

fn write_diagram(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("@startuml\n{body}\n@enduml\n")).unwrap();
    path.canonicalize().unwrap()
}

fn no_renderer() -> Arc<RendererSet> {
    Arc::new(RendererSet::with_strategies(Vec::new()))
}

#[test]
fn second_launch_forwards_files_to_the_running_instance() {
    let dir = tempfile::tempdir().unwrap();
    let lock_path = dir.path().join("viewer.lock");
    let socket_path = dir.path().join("viewer.sock");

    let x = write_diagram(dir.path(), "x.puml", "A -> B");
    let y = write_diagram(dir.path(), "y.puml", "B -> C");
    let z = write_diagram(dir.path(), "z.puml", "C -> D");

    // Process A: claims the lock, starts the server, opens its file.
    let _lock = InstanceLock::acquire(&lock_path).unwrap();
    let (ctx, events) = AppContext::new();
    let _server = IpcServer::spawn(&socket_path, ctx.clone()).unwrap();
    let mut registry = SessionRegistry::new(ctx.clone(), no_renderer());
    registry.open(&x, true);
    ctx.mark_ready();

    // Process B: sees a running instance, forwards and exits.
    assert!(InstanceLock::is_running(&lock_path));
    send_to_running_instance(&socket_path, &[y.clone(), z.clone()]).unwrap();

    // Process A's UI loop drains the queue.
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    let mut forwarded = None;
    while std::time::Instant::now() < deadline {
        match events.recv_timeout(Duration::from_secs(10)).unwrap() {
            AppEvent::OpenFiles(paths) => {
                forwarded = Some(paths);
                break;
            }
            // Render results for already-open files may interleave.
            AppEvent::Rendered { .. } | AppEvent::FileChanged(_) => continue,
        }
    }
    let forwarded = forwarded.expect("forwarded file list never arrived");
    assert_eq!(forwarded, vec![y.clone(), z.clone()]);

    for path in &forwarded {
        registry.open(path, true);
    }

    // Three entries in launch order, with the last forwarded file selected.
    assert_eq!(registry.slot_of(&x), Some(0));
    assert_eq!(registry.slot_of(&y), Some(1));
    assert_eq!(registry.slot_of(&z), Some(2));
    assert_eq!(registry.selected(), Some(2));
}

#[test]
fn forwarding_is_acknowledged_before_the_session_is_ready() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("viewer.sock");
    let file = write_diagram(dir.path(), "late.puml", "A -> B");

    let (ctx, events) = AppContext::new();
    let _server = IpcServer::spawn(&socket_path, ctx.clone()).unwrap();

    // The client must get its ack even though nothing is ready yet.
    let started = std::time::Instant::now();
    send_to_running_instance(&socket_path, &[file.clone()]).unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));

    // Dispatch is deferred until readiness.
    assert!(events.recv_timeout(Duration::from_millis(200)).is_err());
    ctx.mark_ready();
    match events.recv_timeout(Duration::from_secs(6)).unwrap() {
        AppEvent::OpenFiles(paths) => assert_eq!(paths, vec![file]),
        other => panic!("expected OpenFiles, got {other:?}"),
    }
}

#[test]
fn external_modification_rerenders_and_foregrounds_once() {
    let dir = tempfile::tempdir().unwrap();
    let x = write_diagram(dir.path(), "x.puml", "A -> B");
    let y = write_diagram(dir.path(), "y.puml", "B -> C");

    let (ctx, events) = AppContext::new();
    let mut registry = SessionRegistry::new(ctx.clone(), no_renderer());
    registry.open(&x, true);
    registry.open(&y, true);
    assert_eq!(registry.selected(), Some(1));

    // Drain the initial render results.
    while events.recv_timeout(Duration::from_millis(500)).is_ok() {}

    // Let the watcher cooldown pass, then edit X externally.
    std::thread::sleep(Duration::from_millis(1200));
    std::fs::write(&x, "@startuml\nA -> B : changed\n@enduml\n").unwrap();

    let mut rendered = 0;
    let mut foregrounded = 0;
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while std::time::Instant::now() < deadline {
        match events.recv_timeout(Duration::from_millis(500)) {
            Ok(AppEvent::Rendered { path, .. }) if path == x => rendered += 1,
            Ok(AppEvent::FileChanged(path)) if path == x => {
                registry.select_path(&path);
                foregrounded += 1;
            }
            Ok(_) => {}
            Err(_) => {
                if rendered > 0 && foregrounded > 0 {
                    break;
                }
            }
        }
    }

    assert_eq!(rendered, 1, "exactly one re-render per genuine change");
    assert_eq!(foregrounded, 1, "exactly one foreground callback");
    assert_eq!(registry.selected(), registry.slot_of(&x));
}
