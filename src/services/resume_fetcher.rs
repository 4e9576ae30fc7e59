//! 简历下载
//!
//! 简历引用是 URL 时先下载到本地，代理只能上传本地文件

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::AppResult;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

pub struct ResumeFetcher {
    client: reqwest::Client,
    download_dir: PathBuf,
}

impl ResumeFetcher {
    pub fn new(download_dir: impl Into<PathBuf>) -> AppResult<Self> {
        let client = reqwest::Client::builder().timeout(DOWNLOAD_TIMEOUT).build()?;
        Ok(Self {
            client,
            download_dir: download_dir.into(),
        })
    }

    /// 解析简历引用：本地路径直接返回，URL 下载后返回本地路径
    pub async fn resolve(&self, reference: &str) -> AppResult<PathBuf> {
        if is_remote(reference) {
            self.download(reference).await
        } else {
            Ok(PathBuf::from(reference))
        }
    }

    pub async fn download(&self, url: &str) -> AppResult<PathBuf> {
        info!("📥 下载简历: {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;

        tokio::fs::create_dir_all(&self.download_dir).await?;
        let target = self.download_dir.join(file_name_for_url(url));
        tokio::fs::write(&target, &bytes).await?;

        debug!("简历已保存: {} ({} 字节)", target.display(), bytes.len());
        Ok(target)
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }
}

pub fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// 取 URL 最后一段作为文件名，去掉查询参数和不安全字符
fn file_name_for_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.rsplit('/').next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() || !cleaned.contains('.') {
        "resume.pdf".to_string()
    } else {
        cleaned.to_string()
    }
}
