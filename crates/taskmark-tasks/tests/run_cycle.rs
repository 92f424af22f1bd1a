//! End-to-end run, skip and re-run cycle against a temporary project

#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use taskmark_core::{Document, DocumentBuilder, RuleContainer, RuleGroup, Script, Task};
use taskmark_tasks::{
    CancellationToken, CollectingReporter, FingerprintStore, SchedulerOptions, TaskEvent,
    TaskOutcome, TaskScheduler,
};

fn sh(body: &str) -> Script {
    Script::new("/bin/sh", body).with_cmd_flag("-c")
}

fn load(root: &Path, store: &FingerprintStore) -> Document {
    let skip = RuleGroup::new().with_container(
        RuleContainer::new().with_unchanged(["src/**/*.txt"], ["src/**/*.tmp.txt"]),
    );
    let require = RuleGroup::new().with_container(RuleContainer::new().with_exists("src/*.txt"));
    let mut document = DocumentBuilder::new(root)
        .unwrap()
        .env("GREETING", "hello")
        .task(
            Task::new("prepare")
                .with_script(sh("mkdir -p out && echo \"$GREETING\" > out/prepared")),
        )
        .unwrap()
        .task(
            Task::new("build")
                .with_depends_on("prepare")
                .with_require(require)
                .with_skip(skip)
                .with_env("GREETING", "overridden")
                .with_script(sh("cat src/*.txt > out/built && echo \"$GREETING\" >> out/built"))
                .with_script(Script::new("/bin/sh", "echo built-from-stdin")),
        )
        .unwrap()
        .build()
        .unwrap();
    store.attach(&mut document);
    document
}

async fn run(root: &Path, store: &FingerprintStore) -> (i32, Vec<TaskEvent>, Document) {
    let mut document = load(root, store);
    let reporter = Arc::new(CollectingReporter::default());
    let scheduler = TaskScheduler::with_processes(SchedulerOptions::default(), reporter.clone());
    let report = scheduler
        .execute(
            &mut document,
            &["build".to_string()],
            &CancellationToken::new(),
        )
        .await;
    store.save(&document).unwrap();
    (report.exit_code, reporter.events(), document)
}

fn stored_digest(document: &Document) -> Option<String> {
    document
        .task("build")
        .and_then(|t| t.skip.content_rules().next())
        .and_then(|r| r.digest.clone())
}

fn skipped(events: &[TaskEvent], call: &str) -> bool {
    events
        .iter()
        .any(|e| matches!(e, TaskEvent::Skipped { call: c, .. } if c == call))
}

#[tokio::test]
async fn test_run_skip_modify_cycle() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join("src/a.txt"), "alpha\n").unwrap();
    let store = FingerprintStore::new(root.join(".taskmark_state.json"));

    let (code, events, _) = run(root, &store).await;
    assert_eq!(code, 0);
    assert!(!skipped(&events, "build"));
    assert_eq!(
        fs::read_to_string(root.join("out/prepared")).unwrap(),
        "hello\n"
    );
    assert_eq!(
        fs::read_to_string(root.join("out/built")).unwrap(),
        "alpha\noverridden\n"
    );
    assert!(events.contains(&TaskEvent::Output {
        call: "build".to_string(),
        line: "built-from-stdin".to_string(),
        is_stderr: false,
    }));
    assert!(store.path().exists());

    // Unchanged content: build is skipped, its dependency still runs.
    let (code, events, document) = run(root, &store).await;
    assert_eq!(code, 0);
    let before = stored_digest(&document).expect("digest recorded by the first run");
    assert!(skipped(&events, "build"));
    assert!(!skipped(&events, "prepare"));

    // Ignored files do not invalidate the fingerprint.
    fs::write(root.join("src/scratch.tmp.txt"), "noise\n").unwrap();
    let (_, events, _) = run(root, &store).await;
    assert!(skipped(&events, "build"));

    // A single byte change forces a re-run.
    fs::write(root.join("src/a.txt"), "alphA\n").unwrap();
    let (code, events, document) = run(root, &store).await;
    assert_eq!(code, 0);
    assert!(!skipped(&events, "build"));
    assert_eq!(
        fs::read_to_string(root.join("out/built")).unwrap(),
        "alphA\nnoise\noverridden\n"
    );
    let after = stored_digest(&document).expect("digest recorded after the change");
    assert_ne!(before, after);
}

#[tokio::test]
async fn test_failure_is_not_fingerprinted() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();
    fs::write(root.join("input.txt"), "data").unwrap();
    let store = FingerprintStore::new(root.join("state.json"));

    let skip = RuleGroup::new()
        .with_container(RuleContainer::new().with_unchanged(["input.txt"], Vec::<String>::new()));
    let mut document = DocumentBuilder::new(root)
        .unwrap()
        .task(
            Task::new("check")
                .with_skip(skip)
                .with_script(sh("exit 4")),
        )
        .unwrap()
        .build()
        .unwrap();

    let scheduler = TaskScheduler::with_processes(
        SchedulerOptions::default(),
        Arc::new(CollectingReporter::default()),
    );
    let report = scheduler
        .execute(
            &mut document,
            &["check".to_string()],
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(report.exit_code, 4);
    assert_eq!(report.outcomes.get("check"), Some(&TaskOutcome::Failed(4)));
    store.save(&document).unwrap();
    assert!(!store.load().unwrap().tasks.contains_key("check"));
}
