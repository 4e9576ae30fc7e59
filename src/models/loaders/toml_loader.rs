use crate::models::proxy::ProxyConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

#[derive(Debug, Default, Deserialize)]
struct ProxyPoolFile {
    #[serde(default, rename = "proxy")]
    proxies: Vec<ProxyConfig>,
}

/// 解析代理池 TOML 文本（`[[proxy]]` 数组）
pub fn parse_proxy_pool(content: &str) -> Result<Vec<ProxyConfig>> {
    let file: ProxyPoolFile = toml::from_str(content).context("无法解析代理池 TOML")?;
    Ok(file.proxies)
}

/// 从 TOML 文件加载代理池
pub async fn load_proxy_pool(toml_file_path: &Path) -> Result<Vec<ProxyConfig>> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取代理池文件: {}", toml_file_path.display()))?;

    let proxies = parse_proxy_pool(&content)
        .with_context(|| format!("无法解析代理池文件: {}", toml_file_path.display()))?;

    tracing::info!(
        "成功加载 {} 个代理: {}",
        proxies.len(),
        toml_file_path.file_name().unwrap_or_default().to_string_lossy()
    );

    Ok(proxies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::proxy::ProxyScheme;
    use std::io::Write;

    #[test]
    fn test_parse_proxy_pool() {
        let content = r#"
[[proxy]]
host = "http://us1.proxy.io"
port = 8080
country = "US"

[[proxy]]
host = "de1.proxy.io"
port = 1080
scheme = "socks5"
username = "u"
password = "p"
"#;
        let proxies = parse_proxy_pool(content).unwrap();
        assert_eq!(proxies.len(), 2);
        assert_eq!(proxies[0].scheme, ProxyScheme::Http);
        assert_eq!(proxies[0].server_url(), "http://us1.proxy.io:8080");
        assert!(proxies[1].has_credentials());
    }

    #[test]
    fn test_empty_pool_file() {
        assert!(parse_proxy_pool("").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_proxy_pool_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[[proxy]]\nhost = \"p.io\"\nport = 3128").unwrap();

        let proxies = load_proxy_pool(file.path()).await.unwrap();
        assert_eq!(proxies[0].server_url(), "http://p.io:3128");
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        assert!(load_proxy_pool(Path::new("/no/such/pool.toml")).await.is_err());
    }
}
