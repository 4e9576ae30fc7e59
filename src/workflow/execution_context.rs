//! 执行上下文 - 流程层
//!
//! 为单次尝试确定模式相关的配置：代理、模型、浏览器参数。构造后不可变。

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::session::LaunchParams;
use crate::models::proxy::ProxyConfig;
use crate::services::model_provider::{Credentials, ModelHandle};

/// 反自动化检测与稳定性参数
const BASE_ARGS: &[&str] = &[
    "--disable-bfcache",
    "--disable-blink-features=AutomationControlled",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-infobars",
    "--disable-notifications",
    "--disable-web-security",
    "--disable-features=IsolateOrigins,site-per-process",
];

/// 执行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionMode {
    /// 服务器上运行，使用代理轮换
    Server,
    /// 用户本机运行，使用本地浏览器配置
    Desktop,
}

impl ExecutionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionMode::Server => "SERVER",
            ExecutionMode::Desktop => "DESKTOP",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SERVER" => Ok(ExecutionMode::Server),
            "DESKTOP" => Ok(ExecutionMode::Desktop),
            other => Err(format!("未知的执行模式: {}", other)),
        }
    }
}

/// 单次尝试的配置快照
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    mode: ExecutionMode,
    session_id: String,
    proxy: Option<ProxyConfig>,
    model: ModelHandle,
    headless: bool,
    viewport: (u32, u32),
    user_agent: Option<String>,
    user_data_dir: Option<PathBuf>,
    chrome_executable: Option<PathBuf>,
    warnings: Vec<String>,
}

impl ExecutionContext {
    pub fn builder(mode: ExecutionMode) -> ExecutionContextBuilder {
        ExecutionContextBuilder::new(mode)
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn proxy(&self) -> Option<&ProxyConfig> {
        self.proxy.as_ref()
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    pub fn headless(&self) -> bool {
        self.headless
    }

    pub fn user_data_dir(&self) -> Option<&PathBuf> {
        self.user_data_dir.as_ref()
    }

    /// 构造时产生的非致命警告
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn is_server(&self) -> bool {
        self.mode == ExecutionMode::Server
    }

    /// 浏览器启动参数，只由自身字段推导
    pub fn launch_params(&self) -> LaunchParams {
        let (width, height) = self.viewport;
        let mut args: Vec<String> = BASE_ARGS.iter().map(|a| a.to_string()).collect();
        args.insert(1, format!("--window-size={},{}", width, height));

        LaunchParams {
            headless: self.headless,
            window_size: self.viewport,
            args,
            proxy: self.proxy.clone(),
            user_data_dir: self.user_data_dir.clone(),
            user_agent: self.user_agent.clone(),
            chrome_executable: self.chrome_executable.clone(),
        }
    }
}

/// 执行上下文构建器
#[derive(Debug, Clone)]
pub struct ExecutionContextBuilder {
    mode: ExecutionMode,
    session_id: Option<String>,
    proxy: Option<ProxyConfig>,
    browser_profile: Option<PathBuf>,
    server_headless: bool,
    viewport: (u32, u32),
    user_agent: Option<String>,
    chrome_executable: Option<PathBuf>,
    model_api_base: Option<String>,
}

impl ExecutionContextBuilder {
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            session_id: None,
            proxy: None,
            browser_profile: None,
            server_headless: false,
            viewport: (1920, 1080),
            user_agent: None,
            chrome_executable: None,
            model_api_base: None,
        }
    }

    /// 带上配置中的浏览器参数
    pub fn from_config(mode: ExecutionMode, config: &Config) -> Self {
        Self::new(mode)
            .server_headless(config.server_headless)
            .viewport(config.viewport_width, config.viewport_height)
            .user_agent(config.user_agent.clone())
            .chrome_executable(config.chrome_executable.clone())
            .model_api_base(config.model_api_base.clone())
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn proxy(mut self, proxy: Option<ProxyConfig>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn browser_profile(mut self, path: Option<PathBuf>) -> Self {
        self.browser_profile = path;
        self
    }

    pub fn server_headless(mut self, headless: bool) -> Self {
        self.server_headless = headless;
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = (width, height);
        self
    }

    pub fn user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn chrome_executable(mut self, path: Option<PathBuf>) -> Self {
        self.chrome_executable = path;
        self
    }

    pub fn model_api_base(mut self, api_base: Option<String>) -> Self {
        self.model_api_base = api_base;
        self
    }

    /// 选择模型并按模式整理配置；没有任何模型凭证时返回配置错误
    pub fn build(self, credentials: &Credentials) -> AppResult<ExecutionContext> {
        let mut model = ModelHandle::select(credentials)?;
        if let Some(api_base) = self.model_api_base {
            model = model.with_api_base(api_base);
        }
        let mode = self.mode;
        let mut warnings = Vec::new();

        let (proxy, user_data_dir, headless) = match mode {
            ExecutionMode::Server => {
                if self.proxy.is_none() {
                    let message = "服务端模式没有配置代理，可能触发限流".to_string();
                    warn!("[{}] ⚠️ {}", mode, message);
                    warnings.push(message);
                }
                (self.proxy, None, self.server_headless)
            }
            ExecutionMode::Desktop => {
                if self.proxy.is_some() {
                    warn!("[{}] 桌面模式忽略传入的代理", mode);
                }
                (None, self.browser_profile, false)
            }
        };

        let session_id = self.session_id.unwrap_or_else(|| {
            format!(
                "{}-{:08x}",
                mode.as_str().to_lowercase(),
                rand::thread_rng().gen::<u32>()
            )
        });

        info!(
            "[{}] 执行上下文已就绪 (session {}, 模型 {}, {})",
            mode,
            session_id,
            model.model_name(),
            if headless { "无头" } else { "有界面" }
        );

        Ok(ExecutionContext {
            mode,
            session_id,
            proxy,
            model,
            headless,
            viewport: self.viewport,
            user_agent: self.user_agent,
            user_data_dir,
            chrome_executable: self.chrome_executable,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::proxy::ProxyScheme;

    fn credentials() -> Credentials {
        Credentials {
            openai: Some("sk-oai".into()),
            ..Default::default()
        }
    }

    fn proxy() -> ProxyConfig {
        ProxyConfig::new("http://proxy.x.com", 8080, ProxyScheme::Http)
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("server".parse::<ExecutionMode>().unwrap(), ExecutionMode::Server);
        assert_eq!(" DESKTOP ".parse::<ExecutionMode>().unwrap(), ExecutionMode::Desktop);
        assert!("cloud".parse::<ExecutionMode>().is_err());
    }

    #[test]
    fn test_server_without_proxy_warns() {
        let ctx = ExecutionContext::builder(ExecutionMode::Server)
            .build(&credentials())
            .unwrap();
        assert!(ctx.proxy().is_none());
        assert_eq!(ctx.warnings().len(), 1);
        assert!(ctx.session_id().starts_with("server-"));
    }

    #[test]
    fn test_server_with_proxy() {
        let ctx = ExecutionContext::builder(ExecutionMode::Server)
            .proxy(Some(proxy()))
            .browser_profile(Some(PathBuf::from("/home/ada/.chrome")))
            .build(&credentials())
            .unwrap();
        assert!(ctx.warnings().is_empty());
        assert!(ctx.user_data_dir().is_none());

        let params = ctx.launch_params();
        assert!(params
            .chrome_args()
            .contains(&"--proxy-server=http://proxy.x.com:8080".to_string()));
    }

    #[test]
    fn test_desktop_never_carries_proxy() {
        let ctx = ExecutionContext::builder(ExecutionMode::Desktop)
            .proxy(Some(proxy()))
            .browser_profile(Some(PathBuf::from("/home/ada/.chrome")))
            .server_headless(true)
            .build(&credentials())
            .unwrap();
        assert!(ctx.proxy().is_none());
        assert!(!ctx.headless());

        let params = ctx.launch_params();
        assert!(params.proxy.is_none());
        assert_eq!(params.user_data_dir, Some(PathBuf::from("/home/ada/.chrome")));
        assert!(!params.chrome_args().iter().any(|a| a.starts_with("--proxy-server")));
    }

    #[test]
    fn test_headless_policy() {
        let headful = ExecutionContext::builder(ExecutionMode::Server)
            .build(&credentials())
            .unwrap();
        assert!(!headful.launch_params().headless);

        let headless = ExecutionContext::builder(ExecutionMode::Server)
            .server_headless(true)
            .build(&credentials())
            .unwrap();
        assert!(headless.launch_params().headless);
    }

    #[test]
    fn test_launch_params_are_pure() {
        let ctx = ExecutionContext::builder(ExecutionMode::Desktop)
            .viewport(1280, 720)
            .user_agent(Some("UA/1".into()))
            .session_id("fixed")
            .build(&credentials())
            .unwrap();
        let first = ctx.launch_params();
        assert_eq!(first, ctx.launch_params());
        assert_eq!(first.window_size, (1280, 720));
        assert!(first.args.contains(&"--window-size=1280,720".to_string()));
        assert!(first.args.contains(&"--disable-blink-features=AutomationControlled".to_string()));
        assert!(first.chrome_args().contains(&"--user-agent=UA/1".to_string()));
        assert_eq!(ctx.session_id(), "fixed");
    }

    #[test]
    fn test_missing_credentials() {
        let err = ExecutionContext::builder(ExecutionMode::Desktop)
            .build(&Credentials::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
    }
}
