use std::path::PathBuf;
use std::time::Duration;

use crate::services::model_provider::Credentials;
use crate::workflow::execution_context::ExecutionMode;

/// 程序配置
///
/// 所有字段都可以通过环境变量覆盖，模型凭证只从环境读取，不设默认值
#[derive(Clone, Debug)]
pub struct Config {
    /// 执行模式（SERVER / DESKTOP）
    pub mode: ExecutionMode,
    /// 代理池 TOML 文件（仅服务端模式）
    pub proxy_pool_file: Option<PathBuf>,
    /// 本地浏览器配置目录（仅桌面模式）
    pub browser_profile_path: Option<PathBuf>,
    /// 服务端模式是否使用无头浏览器
    pub server_headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub user_agent: Option<String>,
    /// Chrome 可执行文件路径，不设置时自动查找
    pub chrome_executable: Option<PathBuf>,
    /// 代理执行阶段超时（秒）
    pub execute_timeout_secs: u64,
    pub screenshots_dir: PathBuf,
    pub capture_screenshots: bool,
    /// 简历下载目录
    pub download_dir: PathBuf,
    /// 宿主写入的载荷文件
    pub data_file: Option<PathBuf>,
    /// 进程外代理命令
    pub agent_command: Option<String>,
    /// 日志过滤（RUST_LOG 语法）
    pub log_filter: String,
    // --- 模型凭证 ---
    pub credentials: Credentials,
    /// 覆盖模型 API 地址（兼容网关）
    pub model_api_base: Option<String>,
    /// 打开浏览器前预检模型凭证
    pub model_preflight: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Desktop,
            proxy_pool_file: None,
            browser_profile_path: None,
            server_headless: false,
            viewport_width: 1920,
            viewport_height: 1080,
            user_agent: None,
            chrome_executable: None,
            execute_timeout_secs: 300,
            screenshots_dir: PathBuf::from("screenshots"),
            capture_screenshots: true,
            download_dir: PathBuf::from("downloads"),
            data_file: None,
            agent_command: None,
            log_filter: "info".to_string(),
            credentials: Credentials::default(),
            model_api_base: None,
            model_preflight: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取配置，未设置或无法解析的字段使用默认值
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parse_bool = |key: &str, fallback: bool| {
            get(key)
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(fallback)
        };

        Self {
            mode: get("EXECUTION_MODE").and_then(|v| v.parse().ok()).unwrap_or(default.mode),
            proxy_pool_file: get("PROXY_POOL_FILE").map(PathBuf::from),
            browser_profile_path: get("BROWSER_PROFILE_PATH").map(PathBuf::from),
            server_headless: parse_bool("SERVER_HEADLESS", default.server_headless),
            viewport_width: get("VIEWPORT_WIDTH").and_then(|v| v.parse().ok()).unwrap_or(default.viewport_width),
            viewport_height: get("VIEWPORT_HEIGHT").and_then(|v| v.parse().ok()).unwrap_or(default.viewport_height),
            user_agent: get("BROWSER_USER_AGENT"),
            chrome_executable: get("CHROME_EXECUTABLE").map(PathBuf::from),
            execute_timeout_secs: get("AUTOMATION_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .unwrap_or(default.execute_timeout_secs),
            screenshots_dir: get("SCREENSHOTS_DIR").map(PathBuf::from).unwrap_or(default.screenshots_dir),
            capture_screenshots: parse_bool("CAPTURE_SCREENSHOTS", default.capture_screenshots),
            download_dir: get("DOWNLOAD_DIR").map(PathBuf::from).unwrap_or(default.download_dir),
            data_file: get("JOBSWIPE_DATA_FILE").or_else(|| get("JOB_DATA_FILE")).map(PathBuf::from),
            agent_command: get("AGENT_COMMAND"),
            log_filter: get("RUST_LOG").unwrap_or(default.log_filter),
            credentials: Credentials::from_lookup(&lookup),
            model_api_base: get("MODEL_API_BASE"),
            model_preflight: parse_bool("MODEL_PREFLIGHT", default.model_preflight),
        }
    }

    pub fn execute_timeout(&self) -> Duration {
        Duration::from_secs(self.execute_timeout_secs)
    }
}
