//! MCP Transport layer implementations

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

/// Transport trait for MCP communication
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&mut self, message: Value) -> io::Result<()>;
    /// Next message from the peer, `None` once the channel is closed
    async fn receive(&mut self) -> io::Result<Option<Value>>;
    async fn close(&mut self) -> io::Result<()>;
}

/// How long a host gets to exit after its stdin is closed
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// Stdio transport for subprocess communication
///
/// Messages are newline-delimited JSON. The child is killed when the
/// transport is dropped, so an early return never leaks the process.
pub struct StdioTransport {
    child: Child,
    stdin: Option<ChildStdin>,
    reader: Option<BufReader<ChildStdout>>,
}

impl StdioTransport {
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> io::Result<Self> {
        debug!(command, ?args, env_vars = env.len(), "Spawning tool host");

        let mut child = Command::new(command)
            .args(args)
            .envs(env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("Failed to capture stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("Failed to capture stdout"))?;

        Ok(Self {
            child,
            stdin: Some(stdin),
            reader: Some(BufReader::new(stdout)),
        })
    }

    /// OS process id of the tool host, if it is still running
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&mut self, message: Value) -> io::Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "Stdin not available"))?;

        let json = serde_json::to_string(&message)?;
        stdin.write_all(json.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;

        Ok(())
    }

    async fn receive(&mut self) -> io::Result<Option<Value>> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "Reader not available"))?;

        loop {
            let mut line = String::new();
            let n = reader.read_line(&mut line).await?;

            if n == 0 {
                return Ok(None);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            // Some hosts print banners to stdout; only JSON lines are protocol traffic.
            match serde_json::from_str(trimmed) {
                Ok(value) => return Ok(Some(value)),
                Err(e) => warn!(error = %e, line = trimmed, "Skipping non-JSON line from tool host"),
            }
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        // EOF on stdin is the MCP stdio shutdown signal; kill only stragglers.
        self.stdin.take();
        self.reader.take();

        match tokio::time::timeout(EXIT_GRACE, self.child.wait()).await {
            Ok(status) => {
                debug!(status = %status?, "Tool host exited");
                Ok(())
            }
            Err(_) => {
                warn!("Tool host did not exit after stdin closed; killing it");
                self.child.kill().await
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_round_trip_through_child() {
        let mut transport = StdioTransport::spawn("cat", &[], &HashMap::new()).await.unwrap();

        transport.send(json!({ "jsonrpc": "2.0", "method": "ping" })).await.unwrap();
        let echoed = transport.receive().await.unwrap();

        assert_eq!(echoed, Some(json!({ "jsonrpc": "2.0", "method": "ping" })));
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_skips_banner_lines() {
        let mut transport = StdioTransport::spawn(
            "sh",
            &sh("echo 'Server running on stdio'; echo; echo '{\"id\":1}'"),
            &HashMap::new(),
        )
        .await
        .unwrap();

        assert_eq!(transport.receive().await.unwrap(), Some(json!({ "id": 1 })));
        assert_eq!(transport.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_env_is_passed_to_child() {
        let mut env = HashMap::new();
        env.insert("TOOLPIPE_TEST_VALUE".to_string(), "42".to_string());

        let mut transport = StdioTransport::spawn(
            "sh",
            &sh("echo \"{\\\"value\\\":\\\"$TOOLPIPE_TEST_VALUE\\\"}\""),
            &env,
        )
        .await
        .unwrap();

        assert_eq!(transport.receive().await.unwrap(), Some(json!({ "value": "42" })));
    }

    #[tokio::test]
    async fn test_spawn_missing_command_fails() {
        let result = StdioTransport::spawn("definitely-not-a-real-binary-xyz", &[], &HashMap::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_close_lets_host_exit_on_eof() {
        let mut transport = StdioTransport::spawn("cat", &[], &HashMap::new()).await.unwrap();
        transport.close().await.unwrap();

        let status = transport.child.try_wait().unwrap().expect("host should have exited");
        assert!(status.success());
    }

    #[tokio::test]
    async fn test_close_kills_host_that_ignores_eof() {
        let mut transport = StdioTransport::spawn("sleep", &["30".to_string()], &HashMap::new())
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(10), transport.close())
            .await
            .expect("close should not wait for the host forever")
            .unwrap();

        let status = transport.child.try_wait().unwrap().expect("host should be gone");
        assert!(!status.success());
    }

    #[tokio::test]
    async fn test_send_after_close_is_broken_pipe() {
        let mut transport = StdioTransport::spawn("cat", &[], &HashMap::new()).await.unwrap();
        transport.close().await.unwrap();

        let err = transport.send(json!({})).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
