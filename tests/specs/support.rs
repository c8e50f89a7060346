//! Minimal synchronous mock for the agent's local IPC protocol (§4.6): binds
//! a Unix socket, accepts one connection, and answers with whatever
//! `respond` computes from the decoded request envelope. Kept to `std`
//! (no tokio) so this test binary doesn't need its own async runtime just
//! to drive `assert_cmd` against the CLI.

use std::io::{Read, Write};
use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::thread;

pub struct MockAgent {
    pub socket_path: PathBuf,
    _tempdir: tempfile::TempDir,
}

impl MockAgent {
    pub fn start<F>(respond: F) -> Self
    where
        F: Fn(serde_json::Value) -> serde_json::Value + Send + 'static,
    {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let socket_path = tempdir.path().join("agent.sock");
        let listener = UnixListener::bind(&socket_path).expect("bind mock agent socket");

        thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else { return };

            let mut len_buf = [0u8; 4];
            if stream.read_exact(&mut len_buf).is_err() {
                return;
            }
            let len = u32::from_be_bytes(len_buf) as usize;
            let mut body = vec![0u8; len];
            if stream.read_exact(&mut body).is_err() {
                return;
            }
            let Ok(request) = serde_json::from_slice::<serde_json::Value>(&body) else { return };

            let response = respond(request);
            let Ok(response_bytes) = serde_json::to_vec(&response) else { return };
            let _ = stream.write_all(&(response_bytes.len() as u32).to_be_bytes());
            let _ = stream.write_all(&response_bytes);
        });

        Self { socket_path, _tempdir: tempdir }
    }

    pub fn ok_with_id(request: &serde_json::Value, data: serde_json::Value) -> serde_json::Value {
        serde_json::json!({ "id": request["id"], "status": "ok", "data": data })
    }

    pub fn error_with_id(request: &serde_json::Value, code: u16, detail: &str) -> serde_json::Value {
        serde_json::json!({
            "id": request["id"],
            "status": "error",
            "error": { "code": code, "detail": detail },
        })
    }
}
