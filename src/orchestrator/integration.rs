//! 服务端 / 桌面端集成
//!
//! 把宿主传入的已校验载荷转换成 `AttemptRequest`，并在服务端模式下维护代理池反馈。

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ErrorKind;
use crate::infrastructure::proxy_manager::ProxyManager;
use crate::models::payload::ValidatedPayload;
pub use crate::models::result::HostIds;
use crate::models::result::{ApplicationResult, ApplicationStatus};
use crate::models::AtsKind;
use crate::orchestrator::engine::{AttemptRequest, AutomationEngine};
use crate::workflow::execution_context::ExecutionMode;

fn session_id_from(payload: &ValidatedPayload) -> Option<String> {
    payload
        .automation_config
        .get("session_id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// 服务端模式：代理轮换 + 反馈
pub struct ServerIntegration {
    engine: Arc<AutomationEngine>,
    proxies: Option<Arc<ProxyManager>>,
}

impl ServerIntegration {
    pub fn new(engine: Arc<AutomationEngine>, proxies: Option<Arc<ProxyManager>>) -> Self {
        Self { engine, proxies }
    }

    pub fn proxies(&self) -> Option<&Arc<ProxyManager>> {
        self.proxies.as_ref()
    }

    pub fn is_supported(&self, url: &str) -> bool {
        self.engine.is_supported(url)
    }

    pub fn detect_company_type(&self, url: &str) -> AtsKind {
        self.engine.detect_company_type(url)
    }

    pub fn supported_companies(&self) -> Vec<&'static str> {
        self.engine.supported_companies()
    }

    /// 载荷里显式给出的代理优先，其次从代理池轮换
    pub async fn run(&self, payload: ValidatedPayload, ids: HostIds) -> ApplicationResult {
        let session_id = session_id_from(&payload);
        let from_pool = payload.proxy.is_none();
        let proxy = payload
            .proxy
            .or_else(|| self.proxies.as_ref().and_then(|pool| pool.next()));

        match &proxy {
            Some(p) => info!("[SERVER] 🌐 使用代理 {}", p.server_url()),
            None => warn!("[SERVER] ⚠️ 没有可用代理"),
        }

        let request = AttemptRequest::new(payload.profile, payload.job, ExecutionMode::Server)
            .with_proxy(proxy.clone())
            .with_session_id(session_id)
            .with_application_id(ids.application_id)
            .with_user_id(ids.user_id);
        let result = self.engine.execute(request).await;

        if let (Some(pool), Some(proxy), true) = (&self.proxies, &proxy, from_pool) {
            feed_back(pool, proxy.bare_host(), proxy.port, &result);
        }
        result
    }
}

/// 根据结果调整代理评分；与代理无关的失败不计分
fn feed_back(pool: &ProxyManager, host: &str, port: u16, result: &ApplicationResult) {
    match result.status() {
        ApplicationStatus::Success => pool.mark_success(host, port),
        ApplicationStatus::Timeout
        | ApplicationStatus::RateLimited
        | ApplicationStatus::NetworkError
        | ApplicationStatus::CaptchaRequired => pool.mark_failure(host, port),
        // 登录墙与代理无关
        ApplicationStatus::LoginRequired => {}
        _ if result.error_kind() == Some(ErrorKind::AutomationError) => pool.mark_failure(host, port),
        _ => {}
    }
}

/// 桌面模式：复用本地浏览器配置，从不使用代理
pub struct DesktopIntegration {
    engine: Arc<AutomationEngine>,
    browser_profile: Option<PathBuf>,
}

impl DesktopIntegration {
    pub fn new(engine: Arc<AutomationEngine>, browser_profile: Option<PathBuf>) -> Self {
        Self {
            engine,
            browser_profile,
        }
    }

    pub fn is_supported(&self, url: &str) -> bool {
        self.engine.is_supported(url)
    }

    pub fn detect_company_type(&self, url: &str) -> AtsKind {
        self.engine.detect_company_type(url)
    }

    pub fn supported_companies(&self) -> Vec<&'static str> {
        self.engine.supported_companies()
    }

    /// 配置目录存在时才传给浏览器
    fn usable_profile(&self, from_payload: Option<PathBuf>) -> Option<PathBuf> {
        let candidate = from_payload.or_else(|| self.browser_profile.clone())?;
        if candidate.is_dir() {
            Some(candidate)
        } else {
            warn!("[DESKTOP] ⚠️ 浏览器配置目录不存在，忽略: {}", candidate.display());
            None
        }
    }

    pub async fn run(&self, payload: ValidatedPayload, ids: HostIds) -> ApplicationResult {
        let session_id = session_id_from(&payload);
        if payload.proxy.is_some() {
            warn!("[DESKTOP] 桌面模式不使用代理，已忽略载荷中的代理配置");
        }
        let browser_profile = self.usable_profile(payload.profile.browser_profile_path.clone().map(PathBuf::from));

        let request = AttemptRequest::new(payload.profile, payload.job, ExecutionMode::Desktop)
            .with_browser_profile(browser_profile)
            .with_session_id(session_id)
            .with_application_id(ids.application_id)
            .with_user_id(ids.user_id);
        self.engine.execute(request).await
    }
}
