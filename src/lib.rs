//! # Job Apply Automation
//!
//! 一个用于自动投递职位申请的 Rust 库：识别招聘系统（ATS），把申请任务交给 AI 浏览器代理，
//! 并把执行过程整理成结构化的申请结果。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（浏览器会话、代理池），只暴露能力
//! - `ChromeSession` - 唯一的浏览器 owner，提供页面文本、截图、关闭能力
//! - `ProxyManager` - 线程安全的代理轮换池
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `ModelHandle` - 按凭证优先级选择模型
//! - `AgentCapability` / `CommandAgent` - AI 代理执行能力
//! - `ResumeFetcher` - 简历下载能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一次申请"的完整处理流程
//! - `ExecutionContext` - 按模式整理的单次配置
//! - `ApplyFlow` - 生命周期编排（validate → initialize → execute → confirm）
//! - `classify` - 纯函数结果分类
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/engine` - 公司分发器，选择处理器并执行
//! - `orchestrator/integration` - 服务端 / 桌面端集成
//!
//! ## 模块结构

pub mod browser;
pub mod companies;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use companies::{AtsHandler, HandlerRegistry, ResumePolicy};
pub use config::Config;
pub use error::{AppError, AppResult, ErrorKind};
pub use infrastructure::{BrowserSession, ChromeSessionFactory, ProxyManager, SessionFactory};
pub use models::{
    ApplicationResult, ApplicationStatus, AtsKind, AutomationPayload, BridgeOutput, JobDescriptor,
    ProxyConfig, UserProfile,
};
pub use orchestrator::{AttemptRequest, AutomationEngine, DesktopIntegration, HostIds, ServerIntegration};
pub use services::{AgentCapability, AgentTranscript, CommandAgent, Credentials};
pub use workflow::{ApplyFlow, ExecutionContext, ExecutionMode, FlowConfig};
