mod support;

use std::path::PathBuf;
use std::time::Duration;

use support::{
    FakeArchiver, FakeTransfer, SimulatedTarget, TransferCall, init_logging, ready_session,
};
use ttyconform::error::{Error, TransferError};
use tokio::sync::mpsc;
use ttyconform::{Orchestrator, RunOptions, SuiteProfile};

const CLEANUP: &str = "echo 'Cleanup done'";

fn options(root: &str) -> RunOptions {
    RunOptions::new(root)
        .detect_timeout(Duration::from_secs(1))
        .test_timeout(Duration::from_secs(2))
        .transfer_timeout(Duration::from_secs(2))
}

#[tokio::test]
async fn test_plain_run_returns_runner_exit_code() {
    init_logging();
    let target = SimulatedTarget::at_prompt("ready# ")
        .with_runner(&["Running tests", "[PASS] ntp", "GEISA conformance tests"], 0);
    let log = target.log();
    let mut session = ready_session(target);

    let archiver = FakeArchiver::default();
    let transfer = FakeTransfer::new();
    let orchestrator = Orchestrator::new(
        SuiteProfile::api(),
        archiver.clone(),
        transfer.clone(),
        options("/srv/geisa").reports(false),
    );

    let report = orchestrator.run(&mut session).await.unwrap();
    assert_eq!(report.exit_code, 0);
    assert!(report.report.is_none());
    assert!(report.output.contains("[PASS] ntp"));

    // one cleanup before the run, one after
    assert_eq!(log.count_containing(CLEANUP), 2);
    let lines = log.lines();
    assert!(lines[1].contains(CLEANUP));
    assert!(lines.last().unwrap().contains(CLEANUP));

    assert_eq!(
        archiver.packed(),
        vec![
            (
                PathBuf::from("/srv/geisa/src/cukinia"),
                PathBuf::from("/srv/geisa/cukinia.tar.gz")
            ),
            (
                PathBuf::from("/srv/geisa/src/cukinia-tests"),
                PathBuf::from("/srv/geisa/cukinia-tests.tar.gz")
            ),
        ]
    );
    assert_eq!(
        transfer.calls(),
        vec![
            TransferCall::Send(PathBuf::from("/srv/geisa/cukinia.tar.gz")),
            TransferCall::Send(PathBuf::from("/srv/geisa/cukinia-tests.tar.gz")),
        ]
    );
    assert_eq!(log.count_containing("cd /tmp && rz -y --zmodem"), 2);
    assert_eq!(log.count_containing("mkdir -p /tmp/conformance_tests"), 1);
    assert_eq!(log.count_containing("tar -xzf"), 2);
}

#[tokio::test]
async fn test_runner_failure_is_propagated() {
    let target = SimulatedTarget::at_prompt("ready# ")
        .with_runner(&["[FAIL] mqtt", "GEISA conformance tests"], 3);
    let mut session = ready_session(target);

    let orchestrator = Orchestrator::new(
        SuiteProfile::api(),
        FakeArchiver::default(),
        FakeTransfer::new(),
        options("/srv/geisa").reports(false),
    );

    let report = orchestrator.run(&mut session).await.unwrap();
    assert_eq!(report.exit_code, 3);
}

#[tokio::test]
async fn test_failed_transfer_stops_the_run() {
    let target = SimulatedTarget::at_prompt("ready# ");
    let log = target.log();
    let mut session = ready_session(target);

    let transfer = FakeTransfer::failing();
    let orchestrator = Orchestrator::new(
        SuiteProfile::api(),
        FakeArchiver::default(),
        transfer.clone(),
        options("/srv/geisa").reports(false),
    );

    let err = orchestrator.run(&mut session).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Transfer(TransferError::ToolFailed { .. })
    ));

    assert_eq!(transfer.calls().len(), 1);
    assert_eq!(log.count_containing("rz -y --zmodem"), 1);
    assert_eq!(log.count_containing("tar -xzf"), 0);
    assert_eq!(log.count_containing("cukinia.conf"), 0);
    assert_eq!(log.count_containing("echo $?"), 0);
}

#[tokio::test]
async fn test_report_run_fetches_report() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_str().unwrap();

    let target = SimulatedTarget::at_prompt("ready# ").with_runner(&[], 1);
    let log = target.log();
    let mut session = ready_session(target);

    let transfer = FakeTransfer::receiving("geisa-conformance-report.xml");
    let orchestrator = Orchestrator::new(
        SuiteProfile::api(),
        FakeArchiver::default(),
        transfer.clone(),
        options(root),
    );

    let report = orchestrator.run(&mut session).await.unwrap();
    assert_eq!(report.exit_code, 1);

    let expected = dir.path().join("reports").join("geisa-conformance-report.xml");
    assert_eq!(report.report.as_deref(), Some(expected.as_path()));
    assert!(expected.is_file());

    let lines = log.lines();
    let runner = lines.iter().find(|l| l.contains("cukinia.conf")).unwrap();
    assert!(runner.contains(
        "-f junitxml -o /tmp/conformance_tests/cukinia-tests/geisa-conformance-report.xml"
    ));
    assert_eq!(
        log.count_containing(
            "cd /tmp/conformance_tests/cukinia-tests && sz -vy geisa-conformance-report.xml --zmodem"
        ),
        1
    );
    assert_eq!(log.count_containing("echo 'Transfer complete'"), 1);
    assert_eq!(log.count_containing(CLEANUP), 2);
    assert_eq!(
        transfer.calls().last(),
        Some(&TransferCall::Receive(dir.path().join("reports")))
    );
}

#[tokio::test]
async fn test_lee_display_starts_at_header() {
    let target = SimulatedTarget::at_prompt("ready# ").with_runner(
        &[
            "cukinia 0.6",
            "--- GEISA LEE conformance tests ---",
            "[PASS] container runtime",
            "GEISA LEE conformance tests: 1 passed",
        ],
        0,
    );
    let log = target.log();
    let mut session = ready_session(target);

    let orchestrator = Orchestrator::new(
        SuiteProfile::lee(),
        FakeArchiver::default(),
        FakeTransfer::new(),
        options("/srv/geisa")
            .reports(false)
            .env("GLEE_TESTS", "container"),
    );

    let report = orchestrator.run(&mut session).await.unwrap();
    assert_eq!(report.exit_code, 0);
    assert_eq!(report.displayed[0], "--- GEISA LEE conformance tests ---");
    assert_eq!(
        report.displayed.last().map(String::as_str),
        Some("GEISA LEE conformance tests: 1 passed")
    );

    let runner = log
        .lines()
        .into_iter()
        .find(|l| l.contains("cukinia.conf"))
        .unwrap();
    assert!(runner.starts_with("CURRENT_DATE_UTC=\""));
    assert!(runner.contains("GLEE_TESTS=\"container\""));
}

#[tokio::test]
async fn test_output_streams_to_sink_in_order() {
    let target = SimulatedTarget::at_prompt("ready# ").with_runner(
        &[
            "cukinia 0.6",
            "--- GEISA LEE conformance tests ---",
            "[PASS] container runtime",
            "[FAIL] ntp",
            "GEISA LEE conformance tests: 1 passed, 1 failed",
        ],
        1,
    );
    let mut session = ready_session(target);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let orchestrator = Orchestrator::new(
        SuiteProfile::lee(),
        FakeArchiver::default(),
        FakeTransfer::new(),
        options("/srv/geisa").reports(false),
    )
    .with_output(tx);

    let report = orchestrator.run(&mut session).await.unwrap();
    assert_eq!(report.exit_code, 1);
    drop(orchestrator);

    let mut streamed = Vec::new();
    while let Some(line) = rx.recv().await {
        streamed.push(line);
    }
    assert_eq!(
        streamed,
        vec![
            "--- GEISA LEE conformance tests ---",
            "[PASS] container runtime",
            "[FAIL] ntp",
            "GEISA LEE conformance tests: 1 passed, 1 failed",
        ]
    );
    assert_eq!(streamed, report.displayed);
}

#[tokio::test]
async fn test_report_mode_streams_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let target = SimulatedTarget::at_prompt("ready# ").with_runner(&["noise"], 0);
    let mut session = ready_session(target);

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let orchestrator = Orchestrator::new(
        SuiteProfile::api(),
        FakeArchiver::default(),
        FakeTransfer::receiving("geisa-conformance-report.xml"),
        options(dir.path().to_str().unwrap()),
    )
    .with_output(tx);

    orchestrator.run(&mut session).await.unwrap();
    drop(orchestrator);
    assert!(rx.recv().await.is_none());
}
