use anyhow::Result;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::infrastructure::session::LaunchParams;

/// 按启动参数启动浏览器并打开起始页面
///
/// 返回浏览器、页面以及后台事件循环的句柄，调用方负责在结束时关闭浏览器
pub async fn launch_browser(
    params: &LaunchParams,
    start_url: &str,
) -> Result<(Browser, Page, JoinHandle<()>)> {
    info!(
        "🚀 启动浏览器 ({})...",
        if params.headless { "无头" } else { "有界面" }
    );
    debug!("目标 URL: {}", start_url);

    let (width, height) = params.window_size;
    let mut builder = if params.headless {
        BrowserConfig::builder().new_headless_mode()
    } else {
        BrowserConfig::builder().with_head()
    };
    builder = builder.window_size(width, height).args(params.chrome_args());

    if let Some(dir) = &params.user_data_dir {
        info!("📁 使用浏览器配置目录: {}", dir.display());
        builder = builder.user_data_dir(dir);
    }
    if let Some(executable) = &params.chrome_executable {
        builder = builder.chrome_executable(executable);
    }
    if let Some(proxy) = &params.proxy {
        info!("🌐 使用代理: {}", proxy.server_url());
        if proxy.has_credentials() {
            warn!("⚠️ Chrome 启动参数不支持代理认证，用户名/密码将被忽略");
        }
    }

    let config = builder.build().map_err(|e| {
        error!("配置浏览器失败: {}", e);
        anyhow::anyhow!("配置浏览器失败: {}", e)
    })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        anyhow::anyhow!("启动浏览器失败: {}", e)
    })?;
    debug!("浏览器启动成功");

    // 在后台处理浏览器事件
    let events = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let page = browser.new_page(start_url).await.map_err(|e| {
        error!("创建页面失败: {}", e);
        anyhow::anyhow!("创建页面失败: {}", e)
    })?;

    info!("✅ 浏览器已导航到: {}", start_url);

    Ok((browser, page, events))
}
