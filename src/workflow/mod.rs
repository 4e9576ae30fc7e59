//! 流程层（Workflow Layer）
//!
//! 定义"一次申请"的完整处理流程：
//! - `execution_context` - 按模式整理代理、模型和浏览器参数
//! - `apply_flow` - 生命周期编排（validate → initialize → execute → confirm）
//! - `outcome` - 纯函数结果分类

pub mod apply_flow;
pub mod execution_context;
pub mod outcome;

pub use apply_flow::{ApplyFlow, FlowConfig, TOTAL_STEPS};
pub use execution_context::{ExecutionContext, ExecutionContextBuilder, ExecutionMode};
pub use outcome::{classify, extract_confirmation_number, Blocker, Evidence, Outcome};
