//! 模型选择 - 业务能力层
//!
//! 按固定优先级（Anthropic > OpenAI > Google）从可用凭证中选出唯一的模型。
//! 三家都通过 OpenAI 兼容端点访问，因此统一使用 `async-openai` 客户端。

use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use std::fmt;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};

/// 模型服务商
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelProvider {
    Anthropic,
    OpenAi,
    Google,
}

impl ModelProvider {
    /// 选择优先级，从高到低
    pub const PRIORITY: [ModelProvider; 3] = [
        ModelProvider::Anthropic,
        ModelProvider::OpenAi,
        ModelProvider::Google,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelProvider::Anthropic => "anthropic",
            ModelProvider::OpenAi => "openai",
            ModelProvider::Google => "google",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ModelProvider::Anthropic => "claude-3-5-sonnet-20241022",
            ModelProvider::OpenAi => "gpt-4-turbo-preview",
            ModelProvider::Google => "gemini-2.5-pro",
        }
    }

    /// OpenAI 兼容 API 地址
    pub fn api_base(self) -> &'static str {
        match self {
            ModelProvider::Anthropic => "https://api.anthropic.com/v1",
            ModelProvider::OpenAi => "https://api.openai.com/v1",
            ModelProvider::Google => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }

    /// 凭证对应的环境变量名
    pub fn env_key(self) -> &'static str {
        match self {
            ModelProvider::Anthropic => "ANTHROPIC_API_KEY",
            ModelProvider::OpenAi => "OPENAI_API_KEY",
            ModelProvider::Google => "GOOGLE_API_KEY",
        }
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 模型凭证集合，由调用方注入
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub anthropic: Option<String>,
    pub openai: Option<String>,
    pub google: Option<String>,
}

impl Credentials {
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |provider: ModelProvider| lookup(provider.env_key()).filter(|v| !v.trim().is_empty());
        Self {
            anthropic: get(ModelProvider::Anthropic),
            openai: get(ModelProvider::OpenAi),
            google: get(ModelProvider::Google),
        }
    }

    pub fn key_for(&self, provider: ModelProvider) -> Option<&str> {
        match provider {
            ModelProvider::Anthropic => self.anthropic.as_deref(),
            ModelProvider::OpenAi => self.openai.as_deref(),
            ModelProvider::Google => self.google.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        ModelProvider::PRIORITY.iter().all(|p| self.key_for(*p).is_none())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("anthropic", &mark(&self.anthropic))
            .field("openai", &mark(&self.openai))
            .field("google", &mark(&self.google))
            .finish()
    }
}

/// 选中的模型
#[derive(Clone)]
pub struct ModelHandle {
    provider: ModelProvider,
    model_name: String,
    api_key: String,
    api_base: String,
    temperature: f32,
}

impl ModelHandle {
    pub const DEFAULT_TEMPERATURE: f32 = 0.1;

    /// 按优先级选择第一个有凭证的服务商
    pub fn select(credentials: &Credentials) -> AppResult<Self> {
        let (provider, api_key) = ModelProvider::PRIORITY
            .iter()
            .find_map(|p| credentials.key_for(*p).map(|key| (*p, key.to_string())))
            .ok_or_else(|| {
                AppError::Configuration(
                    "没有可用的模型凭证，请设置 ANTHROPIC_API_KEY、OPENAI_API_KEY 或 GOOGLE_API_KEY"
                        .to_string(),
                )
            })?;

        debug!("选中模型: {} / {}", provider, provider.default_model());

        Ok(Self {
            provider,
            model_name: provider.default_model().to_string(),
            api_key,
            api_base: provider.api_base().to_string(),
            temperature: Self::DEFAULT_TEMPERATURE,
        })
    }

    /// 覆盖 API 地址（代理网关或自建兼容服务）
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn provider(&self) -> ModelProvider {
        self.provider
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// 配置 OpenAI 兼容客户端
    pub fn client(&self) -> Client<OpenAIConfig> {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&self.api_key)
            .with_api_base(&self.api_base);
        Client::with_config(openai_config)
    }

    /// 凭证预检：发送一条最小的对话请求，确认密钥和端点可用
    ///
    /// 在打开浏览器之前调用，失败时不消耗浏览器资源
    pub async fn preflight(&self) -> Result<()> {
        info!("🔑 预检模型凭证: {} @ {}", self.model_name, self.api_base);

        let message = ChatCompletionRequestUserMessageArgs::default()
            .content("ping")
            .build()?;
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![ChatCompletionRequestMessage::User(message)])
            .max_tokens(1u32)
            .build()?;

        self.client().chat().create(request).await.map_err(|e| {
            warn!("模型凭证预检失败: {}", e);
            anyhow::anyhow!("模型凭证预检失败 ({}): {}", self.provider, e)
        })?;

        debug!("模型凭证预检通过");
        Ok(())
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("provider", &self.provider)
            .field("model_name", &self.model_name)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn creds(anthropic: bool, openai: bool, google: bool) -> Credentials {
        let key = |on: bool, v: &str| on.then(|| v.to_string());
        Credentials {
            anthropic: key(anthropic, "sk-ant"),
            openai: key(openai, "sk-oai"),
            google: key(google, "g-key"),
        }
    }

    #[test]
    fn test_priority_order() {
        let handle = ModelHandle::select(&creds(true, true, true)).unwrap();
        assert_eq!(handle.provider(), ModelProvider::Anthropic);
        assert_eq!(handle.model_name(), "claude-3-5-sonnet-20241022");

        let handle = ModelHandle::select(&creds(false, true, true)).unwrap();
        assert_eq!(handle.provider(), ModelProvider::OpenAi);

        let handle = ModelHandle::select(&creds(false, false, true)).unwrap();
        assert_eq!(handle.provider(), ModelProvider::Google);
        assert_eq!(handle.model_name(), "gemini-2.5-pro");
    }

    #[test]
    fn test_no_credentials_is_configuration_error() {
        let err = ModelHandle::select(&Credentials::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
    }

    #[test]
    fn test_blank_keys_are_ignored() {
        let credentials = Credentials::from_lookup(|key| match key {
            "ANTHROPIC_API_KEY" => Some("   ".to_string()),
            "GOOGLE_API_KEY" => Some("g-key".to_string()),
            _ => None,
        });
        assert!(credentials.anthropic.is_none());
        assert_eq!(
            ModelHandle::select(&credentials).unwrap().provider(),
            ModelProvider::Google
        );
    }

    #[test]
    fn test_debug_never_prints_keys() {
        let credentials = creds(true, false, false);
        let handle = ModelHandle::select(&credentials).unwrap();
        assert!(!format!("{:?}", credentials).contains("sk-ant"));
        assert!(!format!("{:?}", handle).contains("sk-ant"));
    }

    #[test]
    fn test_api_base_override() {
        let handle = ModelHandle::select(&creds(false, true, false)).unwrap();
        assert_eq!(handle.api_base(), "https://api.openai.com/v1");

        let handle = handle.with_api_base("http://127.0.0.1:8080/v1/");
        assert_eq!(handle.api_base(), "http://127.0.0.1:8080/v1");
    }

    /// 本地假服务：读取一次请求并返回固定响应
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
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
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{}/v1", addr)
    }

    #[tokio::test]
    async fn test_preflight_accepts_valid_key() {
        let base = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"id":"c1","object":"chat.completion","created":0,"model":"gpt-4-turbo-preview","choices":[{"index":0,"message":{"role":"assistant","content":"pong"},"finish_reason":"stop"}]}"#,
        )
        .await;
        let handle = ModelHandle::select(&creds(false, true, false))
            .unwrap()
            .with_api_base(base);
        handle.preflight().await.unwrap();
    }

    #[tokio::test]
    async fn test_preflight_rejects_bad_key() {
        let base = serve_once(
            "HTTP/1.1 401 Unauthorized",
            r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","param":null,"code":"invalid_api_key"}}"#,
        )
        .await;
        let handle = ModelHandle::select(&creds(false, true, false))
            .unwrap()
            .with_api_base(base);
        let err = handle.preflight().await.unwrap_err();
        assert!(err.to_string().contains("预检失败"));
    }
}
