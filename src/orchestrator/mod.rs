//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `engine` - 自动化引擎
//! - 识别 ATS 类型，选择处理器
//! - 为每次尝试构建执行上下文
//! - 委托 `ApplyFlow` 执行并补充宿主标识
//!
//! ### `integration` - 宿主集成
//! - `ServerIntegration`：代理轮换与评分反馈
//! - `DesktopIntegration`：本地浏览器配置透传
//!
//! ## 层次关系
//!
//! ```text
//! integration (服务端 / 桌面端)
//!     ↓
//! engine (AutomationEngine)
//!     ↓
//! workflow::ApplyFlow (单次申请)
//!     ↓
//! services (代理能力 / 模型 / 简历下载)
//!     ↓
//! infrastructure (浏览器会话 / 代理池)
//! ```

pub mod engine;
pub mod integration;

pub use engine::{AttemptRequest, AutomationEngine};
pub use integration::{DesktopIntegration, HostIds, ServerIntegration};
