use serde::{Deserialize, Serialize};
use std::fmt;

/// 代理协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyScheme {
    #[default]
    Http,
    Https,
    Socks5,
}

impl ProxyScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            ProxyScheme::Http => "http",
            ProxyScheme::Https => "https",
            ProxyScheme::Socks5 => "socks5",
        }
    }
}

impl fmt::Display for ProxyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一个出口代理的连接描述
///
/// 宿主传入的 JSON 使用 `type` 表示协议，代理池 TOML 使用 `scheme`，两者都接受
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    #[serde(default, rename = "type", alias = "scheme")]
    pub scheme: ProxyScheme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl ProxyConfig {
    pub fn new(host: impl Into<String>, port: u16, scheme: ProxyScheme) -> Self {
        Self {
            host: host.into(),
            port,
            scheme,
            username: None,
            password: None,
            country: None,
        }
    }

    /// 去掉 host 中已有的协议前缀、路径和结尾斜杠
    pub fn bare_host(&self) -> &str {
        let host = self.host.trim();
        let host = match host.find("://") {
            Some(idx) => &host[idx + 3..],
            None => host,
        };
        let host = host.split('/').next().unwrap_or(host);
        host.trim_end_matches('/')
    }

    /// 组合 `scheme://host:port`，不会出现重复协议
    pub fn server_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.bare_host(), self.port)
    }

    /// `host:port` 形式的键，用于代理池反馈
    pub fn key(&self) -> (String, u16) {
        (self.bare_host().to_string(), self.port)
    }

    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}
