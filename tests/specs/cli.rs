//! CLI <-> agent IPC specs (§4.6, §6.5): the three verbs against a mock
//! agent socket, covering the documented exit-code contract (0 ok, 1 remote
//! error, 2 agent not reachable).

use assert_cmd::Command;

use crate::support::MockAgent;

fn e2epool() -> Command {
    Command::cargo_bin("e2epool").expect("e2epool binary should be built by the workspace")
}

#[test]
fn create_prints_checkpoint_name_and_exits_zero() {
    let agent = MockAgent::start(|req| {
        MockAgent::ok_with_id(&req, serde_json::json!({ "name": "job-42-1700000000-ab12cd34" }))
    });

    let output = e2epool()
        .env("E2EPOOL_AGENT_SOCKET", &agent.socket_path)
        .args(["create", "--job-id", "42"])
        .output()
        .expect("spawn e2epool create");

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "job-42-1700000000-ab12cd34"
    );
}

#[test]
fn finalize_exits_zero_on_accepted_queue() {
    let agent =
        MockAgent::start(|req| MockAgent::ok_with_id(&req, serde_json::json!({ "detail": "Queued" })));

    let output = e2epool()
        .env("E2EPOOL_AGENT_SOCKET", &agent.socket_path)
        .args(["finalize", "--checkpoint", "job-42-1700000000-ab12cd34", "--status", "success"])
        .output()
        .expect("spawn e2epool finalize");

    assert!(output.status.success());
}

#[test]
fn finalize_exits_one_and_reports_detail_on_remote_error() {
    let agent = MockAgent::start(|req| MockAgent::error_with_id(&req, 409, "already finalized"));

    let output = e2epool()
        .env("E2EPOOL_AGENT_SOCKET", &agent.socket_path)
        .args(["finalize", "--checkpoint", "job-42-1700000000-ab12cd34", "--status", "failure"])
        .output()
        .expect("spawn e2epool finalize");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("already finalized"));
}

#[test]
fn status_prints_pretty_json_record() {
    let agent = MockAgent::start(|req| {
        MockAgent::ok_with_id(
            &req,
            serde_json::json!({ "name": "job-42-1700000000-ab12cd34", "state": "created" }),
        )
    });

    let output = e2epool()
        .env("E2EPOOL_AGENT_SOCKET", &agent.socket_path)
        .args(["status", "--checkpoint", "job-42-1700000000-ab12cd34"])
        .output()
        .expect("spawn e2epool status");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"state\": \"created\""));
}

#[test]
fn exits_two_when_agent_is_unreachable() {
    let tempdir = tempfile::tempdir().expect("tempdir");
    let missing_socket = tempdir.path().join("nobody-home.sock");

    let output = e2epool()
        .env("E2EPOOL_AGENT_SOCKET", &missing_socket)
        .env("E2EPOOL_IPC_TIMEOUT_MS", "500")
        .args(["status", "--checkpoint", "job-42-1700000000-ab12cd34"])
        .output()
        .expect("spawn e2epool status");

    assert_eq!(output.status.code(), Some(2));
}
