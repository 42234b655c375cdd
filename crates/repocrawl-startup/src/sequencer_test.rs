use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use repocrawl_notify::NotifyError;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;
use uuid::Uuid;

use super::*;

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<(Level, String)>>>);

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for CapturedLogs {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.0
            .lock()
            .unwrap()
            .push((*event.metadata().level(), visitor.0));
    }
}

impl CapturedLogs {
    fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::registry().with(self.clone());
        tracing::subscriber::set_default(subscriber)
    }

    fn at(&self, level: Level) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    fn count(&self, level: Level, message: &str) -> usize {
        self.at(level).iter().filter(|m| *m == message).count()
    }
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

fn collection(id: i64, setting_id: Option<i64>) -> Collection {
    Collection {
        id,
        public_id: Uuid::new_v4(),
        name: format!("collection-{id}"),
        setting_id,
    }
}

struct FakeStore {
    collections: Option<Vec<Collection>>,
    calls: AtomicUsize,
}

impl FakeStore {
    fn with(collections: Vec<Collection>) -> Self {
        Self {
            collections: Some(collections),
            calls: AtomicUsize::new(0),
        }
    }

    fn unavailable() -> Self {
        Self {
            collections: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CollectionStore for FakeStore {
    async fn list_enabled_collections(&self) -> Result<Vec<Collection>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.collections
            .clone()
            .ok_or_else(|| StoreError::Unavailable("connection refused".to_string()))
    }
}

#[derive(Default)]
struct FakeNotifier {
    fail: bool,
    subjects: Mutex<Vec<String>>,
}

impl FakeNotifier {
    fn failing() -> Self {
        Self {
            fail: true,
            subjects: Mutex::new(Vec::new()),
        }
    }

    fn sends(&self) -> Vec<String> {
        self.subjects.lock().unwrap().clone()
    }
}

#[async_trait]
impl MonitorNotifier for FakeNotifier {
    async fn send_monitor_mail(&self, subject: &str) -> Result<(), NotifyError> {
        self.subjects.lock().unwrap().push(subject.to_string());
        if self.fail {
            return Err(NotifyError::Smtp("connection reset by peer".to_string()));
        }
        Ok(())
    }
}

/// Loader whose autocomplete task records every argument and fails for the
/// setting ids in `failing`.
struct FakeTasks {
    invoked: Arc<Mutex<Vec<String>>>,
    failing: Vec<i64>,
    loads: AtomicUsize,
}

impl FakeTasks {
    fn new(failing: &[i64]) -> Self {
        Self {
            invoked: Arc::new(Mutex::new(Vec::new())),
            failing: failing.to_vec(),
            loads: AtomicUsize::new(0),
        }
    }

    fn invoked(&self) -> Vec<String> {
        self.invoked.lock().unwrap().clone()
    }
}

impl TaskLoader for FakeTasks {
    fn load(&self) -> Result<TaskRegistry, TaskError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let invoked = Arc::clone(&self.invoked);
        let failing: Vec<String> = self.failing.iter().map(ToString::to_string).collect();

        let mut registry = TaskRegistry::new();
        registry.register_fn(AUTOCOMPLETE_TASK, move |args| {
            let invoked = Arc::clone(&invoked);
            let fail = args.first().is_some_and(|id| failing.contains(id));
            async move {
                invoked.lock().unwrap().extend(args);
                if fail {
                    return Err(TaskError::Failed("autocomplete build crashed".to_string()));
                }
                Ok(())
            }
        });
        Ok(registry)
    }
}

// ---------------------------------------------------------------------------
// Boot mode
// ---------------------------------------------------------------------------

#[tokio::test]
async fn warm_boot_skips_everything() {
    for start_from in ["", "1", "supervisor", "false"] {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let tasks = FakeTasks::new(&[]);
        let store = FakeStore::with(vec![collection(1, Some(10))]);
        let notifier = FakeNotifier::default();

        let outcome = StartupSequencer::new(&tasks, &store, &notifier)
            .run(&BootMode::Warm {
                start_from: start_from.to_string(),
            })
            .await
            .unwrap();

        assert_eq!(
            outcome,
            StartupOutcome::Skipped {
                start_from: start_from.to_string()
            }
        );
        assert_eq!(outcome.phase(), StartupPhase::Skipped);
        assert_eq!(tasks.loads.load(Ordering::SeqCst), 0);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        assert!(tasks.invoked().is_empty());
        assert!(notifier.sends().is_empty());
        assert_eq!(logs.count(Level::INFO, "skip initializing"), 1);
        assert_eq!(logs.count(Level::INFO, "done"), 0);
    }
}

// ---------------------------------------------------------------------------
// Cold boot
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cold_boot_invokes_once_per_collection_in_store_order() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let tasks = FakeTasks::new(&[]);
    let store = FakeStore::with(vec![
        collection(5, Some(50)),
        collection(2, Some(20)),
        collection(9, Some(90)),
    ]);
    let notifier = FakeNotifier::default();

    let outcome = StartupSequencer::new(&tasks, &store, &notifier)
        .run(&BootMode::Cold)
        .await
        .unwrap();

    assert_eq!(tasks.invoked(), vec!["50", "20", "90"]);
    assert_eq!(tasks.loads.load(Ordering::SeqCst), 1);
    assert_eq!(notifier.sends(), vec![STARTUP_MAIL_SUBJECT]);
    assert_eq!(
        outcome,
        StartupOutcome::Completed(StartupReport {
            succeeded: vec![50, 20, 90],
            failed: Vec::new(),
            mail_sent: true,
        })
    );
    assert_eq!(outcome.phase(), StartupPhase::Done);
    assert_eq!(
        logs.count(Level::INFO, "initializing application started"),
        1
    );
    assert_eq!(logs.count(Level::INFO, "done"), 1);
}

#[tokio::test]
async fn failing_collection_does_not_stop_the_next_one() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let tasks = FakeTasks::new(&[11]);
    let store = FakeStore::with(vec![collection(1, Some(11)), collection(2, Some(22))]);
    let notifier = FakeNotifier::default();

    let outcome = StartupSequencer::new(&tasks, &store, &notifier)
        .run(&BootMode::Cold)
        .await
        .unwrap();

    assert_eq!(tasks.invoked(), vec!["11", "22"]);

    let errors = logs.at(Level::ERROR);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("id=11"), "got: {errors:?}");

    let infos = logs.at(Level::INFO);
    assert!(infos.iter().any(|m| m.contains("id=22")), "got: {infos:?}");
    assert!(!infos.iter().any(|m| m.contains("id=11")), "got: {infos:?}");

    let StartupOutcome::Completed(report) = outcome else {
        panic!("expected completed outcome");
    };
    assert_eq!(report.succeeded, vec![22]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].collection_id, 1);
    assert_eq!(report.failed[0].setting_id, Some(11));
    assert!(report.mail_sent);
    assert_eq!(logs.count(Level::INFO, "done"), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn catalog_command_task_runs_per_collection() {
    use std::io::Write as _;

    use repocrawl_tasks::CatalogLoader;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
tasks:
  - name: crawl_collections:make_autocomplete
    command: sh
    args: ["-c", 'test "$0" != 11']
"#
    )
    .unwrap();

    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let tasks = CatalogLoader::new(file.path());
    let store = FakeStore::with(vec![collection(1, Some(11)), collection(2, Some(22))]);
    let notifier = FakeNotifier::failing();

    let outcome = StartupSequencer::new(&tasks, &store, &notifier)
        .run(&BootMode::Cold)
        .await
        .unwrap();

    let StartupOutcome::Completed(report) = outcome else {
        panic!("expected completed outcome");
    };
    assert_eq!(report.succeeded, vec![22]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].collection_id, 1);
    assert_eq!(report.failed[0].setting_id, Some(11));
    assert!(
        report.failed[0].reason.starts_with("sh exited with status 1"),
        "got: {}",
        report.failed[0].reason
    );
    assert!(!report.mail_sent);

    let errors = logs.at(Level::ERROR);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("id=11"), "got: {errors:?}");
    assert_eq!(logs.at(Level::WARN).len(), 1);
    assert_eq!(logs.count(Level::INFO, "done"), 1);
}

#[tokio::test]
async fn every_collection_failing_still_sends_mail() {
    let tasks = FakeTasks::new(&[1, 2, 3]);
    let store = FakeStore::with(vec![
        collection(1, Some(1)),
        collection(2, Some(2)),
        collection(3, Some(3)),
    ]);
    let notifier = FakeNotifier::default();

    let outcome = StartupSequencer::new(&tasks, &store, &notifier)
        .run(&BootMode::Cold)
        .await
        .unwrap();

    assert_eq!(tasks.invoked().len(), 3);
    assert_eq!(notifier.sends().len(), 1);
    let StartupOutcome::Completed(report) = outcome else {
        panic!("expected completed outcome");
    };
    assert!(report.succeeded.is_empty());
    assert_eq!(report.failed.len(), 3);
}

#[tokio::test]
async fn collection_without_settings_is_a_soft_failure() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let tasks = FakeTasks::new(&[]);
    let store = FakeStore::with(vec![collection(7, None), collection(8, Some(80))]);
    let notifier = FakeNotifier::default();

    let outcome = StartupSequencer::new(&tasks, &store, &notifier)
        .run(&BootMode::Cold)
        .await
        .unwrap();

    assert_eq!(tasks.invoked(), vec!["80"]);
    let errors = logs.at(Level::ERROR);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("collection 7"), "got: {errors:?}");

    let StartupOutcome::Completed(report) = outcome else {
        panic!("expected completed outcome");
    };
    assert_eq!(report.succeeded, vec![80]);
    assert_eq!(report.failed[0].setting_id, None);
}

#[tokio::test]
async fn missing_autocomplete_task_fails_each_collection_softly() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let tasks = || -> Result<TaskRegistry, TaskError> { Ok(TaskRegistry::new()) };
    let store = FakeStore::with(vec![collection(1, Some(10)), collection(2, Some(20))]);
    let notifier = FakeNotifier::default();

    let outcome = StartupSequencer::new(&tasks, &store, &notifier)
        .run(&BootMode::Cold)
        .await
        .unwrap();

    let StartupOutcome::Completed(report) = outcome else {
        panic!("expected completed outcome");
    };
    assert_eq!(report.failed.len(), 2);
    assert!(report.failed[0].reason.contains("unknown task"));
    assert_eq!(logs.at(Level::ERROR).len(), 2);
    assert_eq!(notifier.sends().len(), 1);
    assert_eq!(logs.count(Level::INFO, "done"), 1);
}

#[tokio::test]
async fn zero_collections_still_sends_mail_once() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let tasks = FakeTasks::new(&[]);
    let store = FakeStore::with(Vec::new());
    let notifier = FakeNotifier::default();

    let outcome = StartupSequencer::new(&tasks, &store, &notifier)
        .run(&BootMode::Cold)
        .await
        .unwrap();

    assert!(tasks.invoked().is_empty());
    assert_eq!(notifier.sends(), vec![STARTUP_MAIL_SUBJECT]);
    assert_eq!(
        outcome,
        StartupOutcome::Completed(StartupReport {
            succeeded: Vec::new(),
            failed: Vec::new(),
            mail_sent: true,
        })
    );
    assert_eq!(logs.count(Level::INFO, "done"), 1);
}

// ---------------------------------------------------------------------------
// Mail failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mail_failure_is_logged_and_sequence_finishes() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let tasks = FakeTasks::new(&[]);
    let store = FakeStore::with(vec![collection(1, Some(10))]);
    let notifier = FakeNotifier::failing();

    let outcome = StartupSequencer::new(&tasks, &store, &notifier)
        .run(&BootMode::Cold)
        .await
        .unwrap();

    assert_eq!(notifier.sends().len(), 1);
    let warnings = logs.at(Level::WARN);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].starts_with("failed to send startup mail"));
    assert!(warnings[0].contains("connection reset by peer"));
    assert_eq!(logs.count(Level::INFO, "done"), 1);

    let StartupOutcome::Completed(report) = outcome else {
        panic!("expected completed outcome");
    };
    assert!(!report.mail_sent);
    assert_eq!(report.succeeded, vec![10]);
}

// ---------------------------------------------------------------------------
// Fatal paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn task_load_failure_propagates() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let tasks = || -> Result<TaskRegistry, TaskError> {
        Err(TaskError::InvalidCatalog("task catalog missing".to_string()))
    };
    let store = FakeStore::with(vec![collection(1, Some(10))]);
    let notifier = FakeNotifier::default();

    let result = StartupSequencer::new(&tasks, &store, &notifier)
        .run(&BootMode::Cold)
        .await;

    assert!(matches!(result, Err(StartupError::Tasks(_))), "got: {result:?}");
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    assert!(notifier.sends().is_empty());
    assert_eq!(logs.count(Level::INFO, "done"), 0);
}

#[tokio::test]
async fn store_failure_propagates() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let tasks = FakeTasks::new(&[]);
    let store = FakeStore::unavailable();
    let notifier = FakeNotifier::default();

    let result = StartupSequencer::new(&tasks, &store, &notifier)
        .run(&BootMode::Cold)
        .await;

    assert!(matches!(result, Err(StartupError::Store(_))), "got: {result:?}");
    assert!(tasks.invoked().is_empty());
    assert!(notifier.sends().is_empty());
    assert_eq!(logs.count(Level::INFO, "done"), 0);
}

#[test]
fn phase_names() {
    assert_eq!(StartupPhase::Running.to_string(), "running");
    assert_eq!(StartupPhase::Skipped.to_string(), "skipped");
    assert_eq!(StartupPhase::Done.to_string(), "done");
}
