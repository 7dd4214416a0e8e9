mod common;

use anyhow::Context as _;
use common::{BIN, start_pets_upstream, write_config};
use serde_json::{Value, json};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

struct StdioSession {
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl StdioSession {
    fn spawn(config_path: &std::path::Path) -> anyhow::Result<Self> {
        let mut child = Command::new(BIN)
            .arg("--config")
            .arg(config_path)
            .arg("--transport")
            .arg("stdio")
            .arg("--log-level")
            .arg("warn")
            .env("PETS_KEY", "stdio-key")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("spawn gateway")?;
        let stdin = child.stdin.take().context("child stdin")?;
        let stdout = child.stdout.take().context("child stdout")?;
        Ok(Self {
            _child: child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        })
    }

    async fn send(&mut self, msg: &Value) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(msg)?;
        line.push(b'\n');
        self.stdin.write_all(&line).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Send a request and wait for the response with the same id, skipping notifications.
    async fn request(&mut self, id: u64, method: &str, params: Value) -> anyhow::Result<Value> {
        self.send(&json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}))
            .await?;
        let wait = async {
            loop {
                let line = self
                    .stdout
                    .next_line()
                    .await?
                    .context("gateway closed stdout")?;
                let msg: Value = serde_json::from_str(&line)
                    .with_context(|| format!("stdout is not JSON-RPC: {line}"))?;
                if msg.get("id") == Some(&json!(id)) {
                    return anyhow::Ok(msg);
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(30), wait)
            .await
            .with_context(|| format!("timed out waiting for {method} response"))?
    }
}

fn tool_text(msg: &Value) -> &str {
    msg["result"]["content"][0]["text"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn stdio_lists_and_calls_tools() -> anyhow::Result<()> {
    let upstream = start_pets_upstream().await?;
    let config = write_config(&upstream)?;
    let mut session = StdioSession::spawn(config.path())?;

    let init = session
        .request(
            1,
            "initialize",
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "integration-test", "version": "0.0.0"}
            }),
        )
        .await?;
    assert!(init["result"]["capabilities"]["tools"].is_object(), "{init}");
    assert_eq!(init["result"]["serverInfo"]["name"], "mcp-api-gateway");
    session
        .send(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .await?;

    let list = session.request(2, "tools/list", json!({})).await?;
    let names: Vec<&str> = list["result"]["tools"]
        .as_array()
        .context("tools array")?
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    assert_eq!(names, ["get_api_info", "execute_api", "pets_get__pets__id_"]);
    let pet_tool = &list["result"]["tools"][2];
    assert_eq!(pet_tool["description"], "Get a pet");
    assert_eq!(pet_tool["inputSchema"]["required"], json!(["id"]));
    assert_eq!(pet_tool["annotations"]["readOnlyHint"], true);

    let call = session
        .request(
            3,
            "tools/call",
            json!({"name": "pets_get__pets__id_", "arguments": {"id": "5"}}),
        )
        .await?;
    assert_ne!(call["result"]["isError"], true, "{call}");
    let body: Value = serde_json::from_str(tool_text(&call))?;
    assert_eq!(body, json!({"id": "5", "name": "Rex", "key": "stdio-key"}));

    let call = session
        .request(4, "tools/call", json!({"name": "no_such_tool", "arguments": {}}))
        .await?;
    assert_eq!(call["result"]["isError"], true);
    assert_eq!(tool_text(&call), "Error: Unknown tool: no_such_tool");

    let call = session
        .request(
            5,
            "tools/call",
            json!({"name": "pets_get__pets__id_", "arguments": {}}),
        )
        .await?;
    assert_eq!(call["result"]["isError"], true);
    assert!(tool_text(&call).starts_with("Error: path template '/pets/{id}'"));

    let call = session
        .request(
            6,
            "tools/call",
            json!({"name": "get_api_info", "arguments": {"api_name": "pets"}}),
        )
        .await?;
    assert!(tool_text(&call).starts_with("# API: pets\n"));

    upstream.stop().await;
    Ok(())
}
