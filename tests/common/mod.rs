//! 集成测试共用的假会话与假代理
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use job_apply_automation::infrastructure::{BrowserSession, LaunchParams, SessionFactory};
use job_apply_automation::models::{JobData, JobDescriptor, UserProfile, UserProfileData};
use job_apply_automation::services::{AgentCapability, AgentRequest, AgentTranscript, Credentials};
use job_apply_automation::{AutomationEngine, Config};

/// 会话工厂的调用记录
#[derive(Default)]
pub struct SessionLog {
    pub opens: AtomicUsize,
    pub stops: AtomicUsize,
    pub launches: Mutex<Vec<LaunchParams>>,
}

impl SessionLog {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn last_launch(&self) -> Option<LaunchParams> {
        self.launches.lock().unwrap().last().cloned()
    }
}

pub struct FakeSession {
    page_text: String,
    log: Arc<SessionLog>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn page_text(&mut self) -> Result<String> {
        Ok(self.page_text.clone())
    }

    async fn screenshot(&mut self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, b"png")?;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.log.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn cdp_endpoint(&self) -> Option<String> {
        None
    }
}

pub struct FakeSessionFactory {
    pub page_text: String,
    pub fail_open: bool,
    pub log: Arc<SessionLog>,
}

impl FakeSessionFactory {
    pub fn new(page_text: &str) -> Self {
        Self {
            page_text: page_text.to_string(),
            fail_open: false,
            log: Arc::new(SessionLog::default()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::new("")
        }
    }
}

#[async_trait]
impl SessionFactory for FakeSessionFactory {
    async fn open(&self, params: &LaunchParams, _start_url: &str) -> Result<Box<dyn BrowserSession>> {
        self.log.opens.fetch_add(1, Ordering::SeqCst);
        self.log.launches.lock().unwrap().push(params.clone());
        if self.fail_open {
            return Err(anyhow!("Chrome 启动失败"));
        }
        Ok(Box::new(FakeSession {
            page_text: self.page_text.clone(),
            log: Arc::clone(&self.log),
        }))
    }
}

/// 假代理的行为
pub enum AgentScript {
    Lines(Vec<String>),
    Fail(String),
    Panic,
    Hang,
}

pub struct FakeAgent {
    script: AgentScript,
    pub tasks: Mutex<Vec<AgentRequest>>,
}

impl FakeAgent {
    pub fn new(script: AgentScript) -> Self {
        Self {
            script,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn says(lines: &[&str]) -> Self {
        Self::new(AgentScript::Lines(lines.iter().map(|l| l.to_string()).collect()))
    }
}

#[async_trait]
impl AgentCapability for FakeAgent {
    async fn run(&self, request: AgentRequest, _session: &mut dyn BrowserSession) -> Result<AgentTranscript> {
        self.tasks.lock().unwrap().push(request);
        match &self.script {
            AgentScript::Lines(lines) => Ok(AgentTranscript::from_lines(lines.clone())),
            AgentScript::Fail(message) => Err(anyhow!(message.clone())),
            AgentScript::Panic => panic!("代理崩溃"),
            AgentScript::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(AgentTranscript::default())
            }
        }
    }
}

pub fn profile_data() -> UserProfileData {
    UserProfileData {
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        email: "ada@example.com".into(),
        phone: "(555) 123-4567".into(),
        resume_url: None,
        skills: vec!["Rust".into()],
        ..Default::default()
    }
}

pub fn profile() -> UserProfile {
    UserProfile::new(profile_data()).unwrap()
}

pub fn job(url: &str) -> JobDescriptor {
    JobDescriptor::new(JobData {
        job_id: "job-42".into(),
        title: "Backend Engineer".into(),
        company: "Acme".into(),
        apply_url: url.into(),
        ..Default::default()
    })
    .unwrap()
}

pub fn test_config() -> Config {
    Config {
        execute_timeout_secs: 5,
        capture_screenshots: false,
        download_dir: std::env::temp_dir().join("job_apply_automation_tests"),
        credentials: Credentials {
            anthropic: Some("sk-ant-test".into()),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn engine(config: Config, sessions: Arc<FakeSessionFactory>, agent: Arc<FakeAgent>) -> AutomationEngine {
    let _ = tracing_subscriber::fmt::try_init();
    AutomationEngine::new(config, sessions, agent)
}

/// 本地模型接口：应答一次请求，返回 OpenAI 兼容的 API 地址
pub async fn model_api_once(status_line: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 8192];
        let _ = socket.read(&mut buf).await;
        let response = format!(
            "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        let _ = socket.write_all(response.as_bytes()).await;
    });
    format!("http://{}/v1", addr)
}

pub const CHAT_OK: &str = r#"{"id":"c1","object":"chat.completion","created":0,"model":"claude-3-5-sonnet-20241022","choices":[{"index":0,"message":{"role":"assistant","content":"pong"},"finish_reason":"stop"}]}"#;

pub const CHAT_UNAUTHORIZED: &str = r#"{"error":{"message":"invalid x-api-key","type":"authentication_error","param":null,"code":null}}"#;
