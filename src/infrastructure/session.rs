//! 浏览器会话 - 基础设施层
//!
//! 持有稀缺资源（浏览器进程和页面），只暴露读取页面、截图、关闭的能力。
//! 编排层通过 [`SessionFactory`] 获取会话，测试中可以替换为假实现。

use anyhow::Result;
use async_trait::async_trait;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, Page};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::browser::launch_browser;
use crate::models::proxy::ProxyConfig;

/// 浏览器启动参数（由 `ExecutionContext` 纯函数式推导）
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchParams {
    pub headless: bool,
    pub window_size: (u32, u32),
    /// 反自动化检测和稳定性参数
    pub args: Vec<String>,
    pub proxy: Option<ProxyConfig>,
    pub user_data_dir: Option<PathBuf>,
    pub user_agent: Option<String>,
    pub chrome_executable: Option<PathBuf>,
}

impl LaunchParams {
    /// 最终传给 Chrome 的命令行参数
    pub fn chrome_args(&self) -> Vec<String> {
        let mut args = self.args.clone();
        if let Some(proxy) = &self.proxy {
            args.push(format!("--proxy-server={}", proxy.server_url()));
        }
        if let Some(user_agent) = &self.user_agent {
            args.push(format!("--user-agent={}", user_agent));
        }
        args
    }
}

/// 一个已打开的浏览器会话
#[async_trait]
pub trait BrowserSession: Send {
    /// 当前页面的可见文本
    async fn page_text(&mut self) -> Result<String>;

    /// 整页截图保存到指定路径
    async fn screenshot(&mut self, path: &Path) -> Result<()>;

    /// 关闭浏览器并释放资源
    async fn stop(&mut self) -> Result<()>;

    /// CDP WebSocket 地址，供进程外的代理连接
    fn cdp_endpoint(&self) -> Option<String>;
}

/// 会话工厂
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, params: &LaunchParams, start_url: &str) -> Result<Box<dyn BrowserSession>>;
}

/// 基于 chromiumoxide 的会话
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    events: JoinHandle<()>,
    stopped: bool,
}

impl ChromeSession {
    pub async fn launch(params: &LaunchParams, start_url: &str) -> Result<Self> {
        let (browser, page, events) = launch_browser(params, start_url).await?;
        Ok(Self {
            browser,
            page,
            events,
            stopped: false,
        })
    }

    /// 执行 JS 并反序列化结果
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> Result<T> {
        let result = self.page.evaluate(js_code.into()).await?;
        Ok(result.into_value()?)
    }

    pub fn page(&self) -> &Page {
        &self.page
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn page_text(&mut self) -> Result<String> {
        self.eval_as("document.body ? document.body.innerText : ''").await
    }

    async fn screenshot(&mut self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.page
            .save_screenshot(ScreenshotParams::builder().full_page(true).build(), path)
            .await?;
        debug!("截图已保存: {}", path.display());
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;

        let closed = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            warn!("等待浏览器进程退出失败: {}", e);
        }
        self.events.abort();
        closed?;
        info!("🛑 浏览器已关闭");
        Ok(())
    }

    fn cdp_endpoint(&self) -> Option<String> {
        Some(self.browser.websocket_address().clone())
    }
}

/// 启动真实 Chrome 的工厂
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromeSessionFactory;

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn open(&self, params: &LaunchParams, start_url: &str) -> Result<Box<dyn BrowserSession>> {
        let session = ChromeSession::launch(params, start_url).await?;
        Ok(Box::new(session))
    }
}
