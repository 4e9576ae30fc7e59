//! 进程外代理
//!
//! 通过子进程运行代理程序：任务文本写入 stdin，stdout 的每一行作为执行记录，
//! 以 `FINAL:` 开头的行作为最终结论。代理通过 CDP 地址连接到同一个浏览器。

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::infrastructure::session::BrowserSession;
use crate::services::agent::{AgentCapability, AgentRequest, AgentTranscript};

const FINAL_PREFIX: &str = "FINAL:";

#[derive(Debug, Clone)]
pub struct CommandAgent {
    command: String,
}

impl CommandAgent {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn build_command(&self, request: &AgentRequest, cdp_endpoint: Option<String>) -> Command {
        let files = request
            .available_files
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect::<Vec<_>>();

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&self.command)
            .env("AGENT_MODEL_PROVIDER", request.model.provider().as_str())
            .env("AGENT_MODEL_NAME", request.model.model_name())
            .env("AGENT_MODEL_API_BASE", request.model.api_base())
            .env("AGENT_MODEL_TEMPERATURE", request.model.temperature().to_string())
            .env(request.model.provider().env_key(), request.model.api_key())
            .env(
                "AGENT_AVAILABLE_FILES",
                serde_json::to_string(&files).unwrap_or_else(|_| "[]".to_string()),
            )
            .env("AGENT_ACTIONS", request.actions.to_json())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(endpoint) = cdp_endpoint {
            cmd.env("AGENT_CDP_URL", endpoint);
        }
        cmd
    }
}

#[async_trait]
impl AgentCapability for CommandAgent {
    async fn run(&self, request: AgentRequest, session: &mut dyn BrowserSession) -> Result<AgentTranscript> {
        info!("🤖 启动代理进程: {}", self.command);
        let mut child = self
            .build_command(&request, session.cdp_endpoint())
            .spawn()
            .with_context(|| format!("无法启动代理进程: {}", self.command))?;

        if let Some(mut stdin) = child.stdin.take() {
            // 代理可能不读取 stdin 就退出
            if let Err(e) = stdin.write_all(request.task.as_bytes()).await {
                debug!("写入任务文本失败: {}", e);
            }
            drop(stdin);
        }

        let stdout = child.stdout.take().context("无法读取代理进程输出")?;
        let mut lines = BufReader::new(stdout).lines();
        let mut transcript = AgentTranscript::default();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim_end().to_string();
            if line.is_empty() {
                continue;
            }
            debug!("代理: {}", line);
            match line.strip_prefix(FINAL_PREFIX) {
                Some(rest) => transcript.final_output = Some(rest.trim().to_string()),
                None => transcript.history.push(line),
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            bail!("代理进程异常退出: {}", status);
        }

        info!("✅ 代理进程完成，共 {} 条记录", transcript.history.len());
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::agent::ActionRegistry;
    use crate::services::model_provider::{Credentials, ModelHandle};
    use std::path::Path;

    struct NoopSession;

    #[async_trait]
    impl BrowserSession for NoopSession {
        async fn page_text(&mut self) -> Result<String> {
            Ok(String::new())
        }
        async fn screenshot(&mut self, _path: &Path) -> Result<()> {
            Ok(())
        }
        async fn stop(&mut self) -> Result<()> {
            Ok(())
        }
        fn cdp_endpoint(&self) -> Option<String> {
            Some("ws://127.0.0.1:9222/devtools/browser/x".to_string())
        }
    }

    fn request(task: &str) -> AgentRequest {
        let credentials = Credentials {
            google: Some("g-key".into()),
            ..Default::default()
        };
        AgentRequest {
            task: task.to_string(),
            available_files: vec!["/tmp/cv.pdf".into()],
            actions: ActionRegistry::default(),
            model: ModelHandle::select(&credentials).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_reads_stdout_and_final_line() {
        let agent = CommandAgent::new(
            r#"read task; echo "got: $task"; echo "cdp: $AGENT_CDP_URL"; echo "FINAL: SUCCESS: $AGENT_MODEL_PROVIDER""#,
        );
        let transcript = agent
            .run(request("apply now"), &mut NoopSession)
            .await
            .unwrap();

        assert_eq!(transcript.history[0], "got: apply now");
        assert_eq!(transcript.history[1], "cdp: ws://127.0.0.1:9222/devtools/browser/x");
        assert_eq!(transcript.final_output.as_deref(), Some("SUCCESS: google"));
    }

    #[tokio::test]
    async fn test_passes_files_and_actions() {
        let agent = CommandAgent::new(r#"echo "$AGENT_AVAILABLE_FILES"; echo "$AGENT_ACTIONS" | grep -c upload_file"#);
        let transcript = agent.run(request("x"), &mut NoopSession).await.unwrap();
        assert_eq!(transcript.history[0], r#"["/tmp/cv.pdf"]"#);
        assert_eq!(transcript.history[1], "1");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_error() {
        let agent = CommandAgent::new("echo partial; exit 3");
        let err = agent.run(request("x"), &mut NoopSession).await.unwrap_err();
        assert!(err.to_string().contains("异常退出"));
    }
}
