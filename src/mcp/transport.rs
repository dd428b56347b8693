//! Newline-delimited JSON over a child process's stdio.

use std::collections::HashMap;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use super::McpError;

/// Stdio transport to a spawned MCP server.
pub struct StdioTransport {
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<BufReader<ChildStdout>>,
    child: Mutex<Child>,
}

impl StdioTransport {
    /// Spawn the server process.
    pub fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<Self, McpError> {
        tracing::info!("Spawning MCP server: {} {:?}", command, args);

        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                McpError::Spawn(format!(
                    "command not found: {}. Is it installed and in PATH?",
                    command
                ))
            } else {
                McpError::Spawn(format!("failed to spawn {}: {}", command, e))
            }
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Spawn("child has no stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Spawn("child has no stdout".to_string()))?;

        Ok(Self {
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
            child: Mutex::new(child),
        })
    }

    /// Write one JSON message followed by a newline.
    pub async fn send(&self, message: &str) -> Result<(), McpError> {
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(message.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        tracing::trace!("MCP sent: {}", message);
        Ok(())
    }

    /// Read the next JSON line, skipping blank and non-JSON output.
    pub async fn receive(&self) -> Result<String, McpError> {
        let mut stdout = self.stdout.lock().await;
        loop {
            let mut line = String::new();
            let bytes = stdout.read_line(&mut line).await?;
            if bytes == 0 {
                let mut child = self.child.lock().await;
                return Err(match child.try_wait() {
                    Ok(Some(status)) => McpError::Closed(format!("server exited with {}", status)),
                    Ok(None) => McpError::Closed("server closed stdout".to_string()),
                    Err(e) => McpError::Closed(format!("error checking server status: {}", e)),
                });
            }

            let line = line.trim();
            if line.starts_with('{') {
                tracing::trace!("MCP received: {}", line);
                return Ok(line.to_string());
            }
            if !line.is_empty() {
                tracing::debug!("Skipping non-JSON line from MCP server: {}", line);
            }
        }
    }

    /// Terminate the server process and reap it.
    pub async fn shutdown(&self) {
        let mut child = self.child.lock().await;
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }
        if let Err(e) = child.kill().await {
            tracing::warn!("Failed to kill MCP server: {}", e);
        }
    }

    pub async fn is_alive(&self) -> bool {
        let mut child = self.child.lock().await;
        matches!(child.try_wait(), Ok(None))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cat_echoes_json_lines_and_skips_noise() {
        let transport = StdioTransport::spawn("cat", &[], &HashMap::new()).expect("spawn cat");
        transport.send("not json").await.expect("send");
        transport.send(r#"{"jsonrpc":"2.0","id":1}"#).await.expect("send");
        let line = transport.receive().await.expect("receive");
        assert_eq!(line, r#"{"jsonrpc":"2.0","id":1}"#);
        assert!(transport.is_alive().await);

        transport.shutdown().await;
        assert!(!transport.is_alive().await);
    }

    #[test]
    fn missing_command_is_reported() {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        let _guard = rt.enter();
        let err = StdioTransport::spawn("definitely-not-a-real-mcp-server", &[], &HashMap::new())
            .err()
            .expect("spawn should fail");
        assert!(err.to_string().contains("command not found"));
    }
}
