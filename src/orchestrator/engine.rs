//! 自动化引擎 - 编排层
//!
//! ## 职责
//!
//! 1. **ATS 识别**：根据申请链接判断招聘系统类型
//! 2. **处理器选择**：优先使用专用处理器，否则回退到通用处理器
//! 3. **上下文构建**：为每次尝试构建独立的 `ExecutionContext`
//! 4. **委托执行**：交给 `ApplyFlow` 跑完整生命周期
//!
//! 引擎本身不持有浏览器；会话工厂与代理能力在构造时注入，方便测试替换。

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use crate::companies::{AtsHandler, HandlerRegistry};
use crate::config::Config;
use crate::error::AppError;
use crate::infrastructure::session::SessionFactory;
use crate::models::proxy::ProxyConfig;
use crate::models::result::{ApplicationResult, HostIds};
use crate::models::{AtsKind, JobDescriptor, UserProfile};
use crate::services::agent::AgentCapability;
use crate::utils::logging::{log_attempt_result, log_attempt_start};
use crate::workflow::apply_flow::{ApplyFlow, FlowConfig};
use crate::workflow::execution_context::{ExecutionContextBuilder, ExecutionMode};

/// 一次申请的输入
#[derive(Debug, Clone)]
pub struct AttemptRequest {
    pub profile: UserProfile,
    pub job: JobDescriptor,
    pub mode: ExecutionMode,
    pub proxy: Option<ProxyConfig>,
    pub browser_profile: Option<PathBuf>,
    pub session_id: Option<String>,
    pub ids: HostIds,
}

impl AttemptRequest {
    pub fn new(profile: UserProfile, job: JobDescriptor, mode: ExecutionMode) -> Self {
        Self {
            profile,
            job,
            mode,
            proxy: None,
            browser_profile: None,
            session_id: None,
            ids: HostIds::default(),
        }
    }

    pub fn with_proxy(mut self, proxy: Option<ProxyConfig>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_browser_profile(mut self, path: Option<PathBuf>) -> Self {
        self.browser_profile = path;
        self
    }

    pub fn with_session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn with_application_id(mut self, application_id: Option<String>) -> Self {
        self.ids.application_id = application_id;
        self
    }

    pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.ids.user_id = user_id;
        self
    }
}

/// 自动化引擎（公司分发器）
pub struct AutomationEngine {
    registry: HandlerRegistry,
    sessions: Arc<dyn SessionFactory>,
    agent: Arc<dyn AgentCapability>,
    config: Config,
}

impl AutomationEngine {
    pub fn new(config: Config, sessions: Arc<dyn SessionFactory>, agent: Arc<dyn AgentCapability>) -> Self {
        Self {
            registry: HandlerRegistry::with_defaults(),
            sessions,
            agent,
            config,
        }
    }

    /// 替换处理器注册表
    pub fn with_registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn detect_company_type(&self, url: &str) -> AtsKind {
        AtsKind::detect(url)
    }

    /// 永远有结果，未注册时为通用处理器
    pub fn get_handler(&self, ats: AtsKind) -> Arc<dyn AtsHandler> {
        self.registry.get(ats)
    }

    /// 链接对应的 ATS 是否有专用处理器
    pub fn is_supported(&self, url: &str) -> bool {
        self.registry.has_specific(self.detect_company_type(url))
    }

    pub fn supported_companies(&self) -> Vec<&'static str> {
        self.registry.companies()
    }

    /// 执行一次申请，任何情况下都返回已终结的结果
    pub async fn execute(&self, request: AttemptRequest) -> ApplicationResult {
        let AttemptRequest {
            profile,
            job,
            mode,
            proxy,
            browser_profile,
            session_id,
            ids,
        } = request;

        let handler = self.get_handler(job.ats());
        log_attempt_start(mode.as_str(), handler.company(), &job.title, &job.apply_url);

        let mut builder = ExecutionContextBuilder::from_config(mode, &self.config)
            .proxy(proxy)
            .browser_profile(browser_profile);
        if let Some(session_id) = session_id {
            builder = builder.session_id(session_id);
        }

        let fail_early = |e: AppError| {
            error!("[{}] ❌ {}", mode, e);
            let result = ApplicationResult::failed_before_start(&job.job_id, handler.company(), &ids, &e);
            log_attempt_result(mode.as_str(), &result);
            result
        };

        let ctx = match builder.build(&self.config.credentials) {
            Ok(ctx) => ctx,
            Err(e) => return fail_early(e),
        };

        // 凭证预检在打开浏览器之前
        if self.config.model_preflight {
            if let Err(e) = ctx.model().preflight().await {
                return fail_early(AppError::Configuration(format!("{:#}", e)));
            }
        }

        info!("[{}] 使用处理器 {} ({})", mode, handler.company(), job.ats());
        let result = ApplyFlow::new(
            Arc::clone(&handler),
            Arc::clone(&self.sessions),
            Arc::clone(&self.agent),
            FlowConfig::from_config(&self.config),
        )
        .run(&ctx, &profile, &job, &ids)
        .await;

        log_attempt_result(mode.as_str(), &result);
        result
    }
}
