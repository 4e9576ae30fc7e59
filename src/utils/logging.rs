//! 日志工具模块
//!
//! 提供日志初始化和格式化输出的辅助函数

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::result::ApplicationResult;

/// 初始化日志
///
/// 日志写到 stderr，stdout 只留给结果 JSON。重复调用是无害的。
///
/// # 参数
/// - `filter`: RUST_LOG 语法的过滤规则，解析失败时退回 `info`
pub fn init(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// 记录一次申请开始
///
/// # 参数
/// - `mode`: 执行模式
/// - `company`: 处理器名称
/// - `job_title`: 职位名称
/// - `apply_url`: 申请链接
pub fn log_attempt_start(mode: &str, company: &str, job_title: &str, apply_url: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 [{}] 开始自动申请", mode);
    info!("🏢 处理器: {}", company);
    info!("📄 职位: {}", job_title);
    info!("🌐 链接: {}", apply_url);
    info!("{}", "=".repeat(60));
}

/// 打印一次申请的最终结果
pub fn log_attempt_result(mode: &str, result: &ApplicationResult) {
    info!("\n{}", "=".repeat(60));
    if result.success() {
        info!("✅ [{}] 申请成功: {}", mode, result.job_id());
        info!(
            "🧾 确认号: {}",
            result.confirmation_number().unwrap_or("（无，需要审计）")
        );
    } else {
        info!("❌ [{}] 申请未完成: {} ({})", mode, result.job_id(), result.status());
        if let Some(message) = result.error_message() {
            info!("原因: {}", truncate_text(message, 200));
        }
    }
    info!(
        "步骤: {}/{} | 耗时: {} ms | 验证码: {}",
        result.steps_completed(),
        result.total_steps(),
        result.total_duration_ms().unwrap_or(0),
        result.captcha_count()
    );
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
