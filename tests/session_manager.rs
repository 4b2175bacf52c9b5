//! Session manager integration tests.
//!
//! These tests drive the public API against an in-memory controller, so no
//! office application is needed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

use docwarden::{
    reaper, CloseOutcome, CloseReason, DocWardenError, GroupId, ManagerConfig, OpenRequest,
    Priority, ProcessController, ProcessHandle, ResourceKey, SessionContext, SessionKind,
    SessionManager, Termination,
};

/// Pretends to run one office process per launch.
#[derive(Default)]
struct FakeOffice {
    next_pid: AtomicU32,
    running: Mutex<HashSet<u32>>,
}

impl FakeOffice {
    fn kill(&self, pid: u32) {
        self.running.lock().unwrap().remove(&pid);
    }

    fn running(&self) -> usize {
        self.running.lock().unwrap().len()
    }
}

impl ProcessController for FakeOffice {
    fn launch(&self, key: &ResourceKey) -> docwarden::Result<ProcessHandle> {
        if !key.as_path().exists() {
            return Err(DocWardenError::ResourceNotFound(key.to_string()));
        }
        let pid = 2000 + self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.running.lock().unwrap().insert(pid);
        Ok(ProcessHandle::detached(pid))
    }

    fn is_alive(&self, handle: &mut ProcessHandle) -> bool {
        self.running.lock().unwrap().contains(&handle.pid())
    }

    fn terminate(&self, handle: &mut ProcessHandle) -> Termination {
        if self.running.lock().unwrap().remove(&handle.pid()) {
            Termination::Graceful
        } else {
            Termination::AlreadyExited
        }
    }
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn doc(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, b"document").unwrap();
        path
    }
}

fn manager(max: usize) -> SessionManager<FakeOffice> {
    SessionManager::new(
        FakeOffice::default(),
        ManagerConfig {
            max_concurrent_docs: max,
            ..ManagerConfig::default()
        },
    )
}

fn automated(path: &Path, priority: Priority) -> OpenRequest {
    OpenRequest::new(path)
        .kind(SessionKind::Background)
        .context(SessionContext::Automated)
        .priority(priority)
}

// ============================================================================
// Open / Close
// ============================================================================

#[test]
fn test_open_missing_file_records_nothing() {
    let m = manager(4);
    let err = assert_err!(m.open(OpenRequest::new("/nonexistent/missing.odt")));
    assert!(matches!(err, DocWardenError::ResourceNotFound(_)));
    assert_eq!(m.active_count().unwrap(), 0);
}

#[test]
fn test_equivalent_paths_share_one_session() {
    let ws = Workspace::new();
    let path = ws.doc("quote.odt");
    let m = manager(4);

    assert!(assert_ok!(m.open(OpenRequest::new(&path))).is_new());
    let dotted = ws.dir.path().join(".").join("quote.odt");
    assert!(!assert_ok!(m.open(OpenRequest::new(dotted))).is_new());

    assert_eq!(m.active_count().unwrap(), 1);
    assert_eq!(m.controller().running(), 1);
}

#[test]
fn test_close_twice_succeeds() {
    let ws = Workspace::new();
    let path = ws.doc("a.odt");
    let m = manager(4);
    let key = m.open(OpenRequest::new(&path)).unwrap().key().clone();

    assert!(matches!(
        assert_ok!(m.close(&key, CloseReason::Manual)),
        CloseOutcome::Closed(_)
    ));
    assert_eq!(
        assert_ok!(m.close(&key, CloseReason::Manual)),
        CloseOutcome::AlreadyClosed
    );
    assert_eq!(m.controller().running(), 0);
}

// ============================================================================
// Capacity and eviction
// ============================================================================

#[test]
fn test_capacity_never_exceeded() {
    let ws = Workspace::new();
    let m = manager(3);
    for i in 0..12 {
        let path = ws.doc(&format!("{i}.odt"));
        let priority = Priority::try_from((i % 5 + 1) as u8).unwrap();
        let _ = m.open(automated(&path, priority));
        assert!(m.active_count().unwrap() <= 3);
    }
}

#[test]
fn test_priority_eviction_scenario() {
    let ws = Workspace::new();
    let m = manager(4);
    for (name, priority) in [
        ("p2.odt", Priority::ActiveClientWork),
        ("p3.odt", Priority::ComparativeAnalysis),
        ("p4.odt", Priority::BatchProcessing),
        ("p5.odt", Priority::BackgroundTasks),
    ] {
        m.open(automated(&ws.doc(name), priority)).unwrap();
    }

    let outcome = m.open(automated(&ws.doc("p1.odt"), Priority::CriticalValidation)).unwrap();
    assert_eq!(outcome.displaced().len(), 1);
    assert_eq!(outcome.displaced()[0].key.file_name(), "p5.odt");

    let status = m.status().unwrap();
    let levels: Vec<u8> = status.sessions.iter().map(|s| s.priority.level()).collect();
    assert_eq!(levels, vec![1, 2, 3, 4]);
}

#[test]
fn test_all_exempt_scenario() {
    let ws = Workspace::new();
    let m = manager(4);
    for i in 0..4 {
        m.open(OpenRequest::new(ws.doc(&format!("review{i}.odt")))).unwrap();
    }

    for priority in [Priority::CriticalValidation, Priority::BackgroundTasks] {
        let err = m
            .open(automated(&ws.doc("extra.odt"), priority))
            .unwrap_err();
        assert!(matches!(err, DocWardenError::CapacityExhausted { active: 4, max: 4 }));
    }
    assert_eq!(m.status().unwrap().active_count, 4);
}

// ============================================================================
// Reaping
// ============================================================================

#[test]
fn test_ttl_expiry_scenario() {
    let ws = Workspace::new();
    let m = manager(4);
    let key = m
        .open(automated(&ws.doc("batch.odt"), Priority::BatchProcessing))
        .unwrap()
        .key()
        .clone();
    m.create_group("conversion", &[key.clone()], "nightly").unwrap();

    let report = m.sweep_at(Instant::now() + Duration::from_secs(11 * 60)).unwrap();
    assert_eq!(report.expired.len(), 1);
    assert_eq!(report.expired[0].reason, CloseReason::Expired(SessionContext::Automated));

    let status = m.status().unwrap();
    assert!(status.sessions.is_empty());
    assert!(status.groups.is_empty());
}

#[test]
fn test_touch_postpones_expiry() {
    let ws = Workspace::new();
    let m = manager(4);
    let key = m
        .open(automated(&ws.doc("batch.odt"), Priority::BatchProcessing))
        .unwrap()
        .key()
        .clone();

    thread::sleep(Duration::from_millis(200));
    assert!(m.touch(&key).unwrap());

    // Ten minutes after the touch, not after the open.
    let at = Instant::now() + Duration::from_secs(10 * 60) - Duration::from_millis(100);
    let report = m.sweep_at(at).unwrap();
    assert!(report.is_empty());
}

#[tokio::test]
async fn test_periodic_sweep_reaps_dead_process() {
    let ws = Workspace::new();
    let m = Arc::new(manager(4));
    m.open(automated(&ws.doc("a.odt"), Priority::BatchProcessing)).unwrap();
    let pid = m.status().unwrap().sessions[0].pid;
    m.controller().kill(pid);

    let task = reaper::spawn_periodic(Arc::clone(&m), Duration::from_millis(20));
    let deadline = Instant::now() + Duration::from_secs(5);
    while m.active_count().unwrap() > 0 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    task.abort();

    assert_eq!(m.active_count().unwrap(), 0);
    let history = m.history().unwrap();
    assert_eq!(history.last().unwrap().reason, Some(CloseReason::ProcessDied));
}

// ============================================================================
// Groups and workflows
// ============================================================================

#[test]
fn test_group_cascade_scenario() {
    let ws = Workspace::new();
    let m = manager(4);
    let report = m
        .open_client_portfolio(&[ws.doc("q1.odt"), ws.doc("q2.odt")], "Acme")
        .unwrap();
    let id = report.group_id().unwrap().clone();

    let closed = m.close_group(&id, CloseReason::Manual).unwrap();
    assert_eq!((closed.closed, closed.total), (2, 2));

    let status = m.status().unwrap();
    assert!(status.groups.iter().all(|g| g.id != id));
    assert!(status.sessions.is_empty());
    assert_err!(m.close_group(&id, CloseReason::Manual));
}

#[test]
fn test_interactive_replacement_scenario() {
    let ws = Workspace::new();
    let m = manager(4);
    let first = ws.doc("a.odt");
    let second = ws.doc("b.odt");

    m.open(OpenRequest::new(&first).exempt(false)).unwrap();
    let outcome = m.open(OpenRequest::new(&second).exempt(false)).unwrap();
    assert_eq!(outcome.displaced().len(), 1);
    assert_eq!(outcome.displaced()[0].reason, CloseReason::SequentialInteractive);

    let grouped = GroupId::from("side_by_side");
    let m = manager(4);
    m.open(OpenRequest::new(&first).exempt(false).group(grouped.clone())).unwrap();
    m.open(OpenRequest::new(&second).exempt(false).group(grouped)).unwrap();
    assert_eq!(m.active_count().unwrap(), 2);
}

#[test]
fn test_comparison_related_sessions() {
    let ws = Workspace::new();
    let m = manager(4);
    let paths = [ws.doc("t1.odt"), ws.doc("t2.odt"), ws.doc("t3.odt")];
    let report = m.open_for_comparison(&paths, "pricing").unwrap();
    assert_eq!(report.opened.len(), 3);

    let related = m.related_sessions(&report.opened[0]).unwrap();
    assert_eq!(related.len(), 2);
    assert!(!related.contains(&report.opened[0]));

    m.close(&report.opened[1], CloseReason::Manual).unwrap();
    assert_eq!(m.related_sessions(&report.opened[0]).unwrap().len(), 1);
}

#[test]
fn test_status_serializes() {
    let ws = Workspace::new();
    let m = manager(4);
    m.open(OpenRequest::new(ws.doc("a.odt")).keep_alive_reason("client call")).unwrap();

    let json = serde_json::to_value(m.status().unwrap()).unwrap();
    assert_eq!(json["active_count"], 1);
    assert_eq!(json["max_concurrent"], 4);
    assert_eq!(json["sessions"][0]["context"], "human_validation");
    assert_eq!(json["sessions"][0]["keep_alive_reason"], "client call");
}

#[test]
fn test_dropping_manager_stops_every_process() {
    let ws = Workspace::new();
    let office = Arc::new(FakeOffice::default());
    let m = SessionManager::new(Arc::clone(&office), ManagerConfig::default());
    m.open(OpenRequest::new(ws.doc("review.odt"))).unwrap();
    m.open(automated(&ws.doc("batch.odt"), Priority::BatchProcessing)).unwrap();
    assert_eq!(office.running(), 2);

    drop(m);
    assert_eq!(office.running(), 0);
}

#[test]
fn test_concurrent_opens_respect_capacity() {
    let ws = Workspace::new();
    let m = Arc::new(manager(3));
    let paths: Vec<PathBuf> = (0..16).map(|i| ws.doc(&format!("{i}.odt"))).collect();

    let handles: Vec<_> = paths
        .into_iter()
        .map(|path| {
            let m = Arc::clone(&m);
            thread::spawn(move || {
                let _ = m.open(automated(&path, Priority::BatchProcessing));
                m.active_count().unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap() <= 3);
    }
    assert_eq!(m.active_count().unwrap(), 3);
    assert_eq!(m.controller().running(), 3);
}
