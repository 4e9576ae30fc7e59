//! 申请结果模型
//!
//! 一次申请尝试的完整记录：步骤、截图、验证码事件与最终状态。
//! `success` 不单独存储，始终由 `status == Success` 推导。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AppError, AppResult, ErrorKind};

/// 申请状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Success,
    /// 初始占位值，同时也是通用失败状态
    #[default]
    Failed,
    CaptchaRequired,
    LoginRequired,
    Timeout,
    RateLimited,
    FormError,
    NetworkError,
    UnknownError,
}

impl ApplicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Success => "success",
            ApplicationStatus::Failed => "failed",
            ApplicationStatus::CaptchaRequired => "captcha_required",
            ApplicationStatus::LoginRequired => "login_required",
            ApplicationStatus::Timeout => "timeout",
            ApplicationStatus::RateLimited => "rate_limited",
            ApplicationStatus::FormError => "form_error",
            ApplicationStatus::NetworkError => "network_error",
            ApplicationStatus::UnknownError => "unknown_error",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 验证码类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptchaKind {
    Recaptcha,
    Hcaptcha,
    Cloudflare,
    Image,
    Text,
    Unknown,
}

impl CaptchaKind {
    /// 从代理输出中的提示词推断验证码类型
    pub fn from_hint(hint: &str) -> Self {
        let hint = hint.to_lowercase();
        if hint.contains("recaptcha") {
            CaptchaKind::Recaptcha
        } else if hint.contains("hcaptcha") {
            CaptchaKind::Hcaptcha
        } else if hint.contains("cloudflare") || hint.contains("turnstile") {
            CaptchaKind::Cloudflare
        } else if hint.contains("image") {
            CaptchaKind::Image
        } else if hint.contains("text") {
            CaptchaKind::Text
        } else {
            CaptchaKind::Unknown
        }
    }
}

/// 验证码解决方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionMethod {
    Ai,
    Manual,
    Service,
}

/// 生命周期中的一个步骤
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationStep {
    pub step_name: String,
    pub action: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: Option<u64>,
    pub screenshot_path: Option<String>,
    pub error_message: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl AutomationStep {
    pub fn new(step_name: impl Into<String>, action: impl Into<String>, success: bool) -> Self {
        Self {
            step_name: step_name.into(),
            action: action.into(),
            success,
            timestamp: Utc::now(),
            duration_ms: None,
            screenshot_path: None,
            error_message: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_screenshot(mut self, path: impl Into<String>) -> Self {
        self.screenshot_path = Some(path.into());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// 一次验证码事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaEvent {
    pub captcha_type: CaptchaKind,
    pub detected_at: DateTime<Utc>,
    resolved: bool,
    resolution_method: Option<ResolutionMethod>,
    resolution_time_ms: Option<u64>,
    error_message: Option<String>,
}

impl CaptchaEvent {
    pub fn detected(captcha_type: CaptchaKind) -> Self {
        Self {
            captcha_type,
            detected_at: Utc::now(),
            resolved: false,
            resolution_method: None,
            resolution_time_ms: None,
            error_message: None,
        }
    }

    /// 标记为已解决，只能调用一次
    pub fn resolve(&mut self, method: ResolutionMethod) -> bool {
        if self.resolved {
            return false;
        }
        let elapsed = Utc::now() - self.detected_at;
        self.resolved = true;
        self.resolution_method = Some(method);
        self.resolution_time_ms = Some(elapsed.num_milliseconds().max(0) as u64);
        true
    }

    /// 记录解决失败的原因，事件仍保持未解决
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub fn resolution_method(&self) -> Option<ResolutionMethod> {
        self.resolution_method
    }

    pub fn resolution_time_ms(&self) -> Option<u64> {
        self.resolution_time_ms
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

/// 宿主侧的关联标识
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostIds {
    pub application_id: Option<String>,
    pub user_id: Option<String>,
}

/// 一次申请尝试的最终记录
///
/// 创建时状态为 `Failed`（占位），通过 [`set_completed`](Self::set_completed)
/// 或 [`set_failed`](Self::set_failed) 终结，且只能终结一次。终结后所有修改操作
/// 都会返回 [`AppError::AlreadyFinalized`]。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationResult {
    job_id: String,
    company_automation: String,
    status: ApplicationStatus,

    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    total_duration_ms: Option<u64>,

    confirmation_number: Option<String>,
    confirmation_email: Option<String>,
    confirmation_url: Option<String>,

    steps_completed: u32,
    total_steps: u32,

    error_message: Option<String>,
    error_kind: Option<ErrorKind>,
    retry_count: u32,
    needs_audit: bool,

    steps: Vec<AutomationStep>,
    screenshots: Vec<String>,
    captcha_events: Vec<CaptchaEvent>,
    performance_metrics: serde_json::Map<String, serde_json::Value>,
    browser_logs: Vec<String>,
    debug_output: Option<String>,

    user_id: Option<String>,
    application_id: Option<String>,
    automation_version: String,
}

impl ApplicationResult {
    /// 开始一次新的尝试
    pub fn start(job_id: impl Into<String>, company_automation: impl Into<String>, total_steps: u32) -> Self {
        Self {
            job_id: job_id.into(),
            company_automation: company_automation.into(),
            status: ApplicationStatus::Failed,
            started_at: Utc::now(),
            completed_at: None,
            total_duration_ms: None,
            confirmation_number: None,
            confirmation_email: None,
            confirmation_url: None,
            steps_completed: 0,
            total_steps,
            error_message: None,
            error_kind: None,
            retry_count: 0,
            needs_audit: false,
            steps: Vec::new(),
            screenshots: Vec::new(),
            captcha_events: Vec::new(),
            performance_metrics: serde_json::Map::new(),
            browser_logs: Vec::new(),
            debug_output: None,
            user_id: None,
            application_id: None,
            automation_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 生命周期开始前就已失败的结果（载荷或配置错误）
    pub fn failed_before_start(
        job_id: impl Into<String>,
        company_automation: impl Into<String>,
        ids: &HostIds,
        error: &AppError,
    ) -> Self {
        let mut result = Self::start(job_id, company_automation, 0);
        // 新建的结果不可能已经终结
        let _ = result.attach_ids(ids);
        let _ = result.set_failed(error.to_string(), error.kind(), ApplicationStatus::Failed);
        result
    }

    fn ensure_open(&self) -> AppResult<()> {
        if self.is_finalized() {
            return Err(AppError::AlreadyFinalized {
                job_id: self.job_id.clone(),
            });
        }
        Ok(())
    }

    /// 追加步骤；成功的步骤推进计数，但不超过 `total_steps`
    pub fn add_step(&mut self, step: AutomationStep) -> AppResult<()> {
        self.ensure_open()?;
        if step.success && (self.total_steps == 0 || self.steps_completed < self.total_steps) {
            self.steps_completed += 1;
        }
        self.steps.push(step);
        Ok(())
    }

    pub fn add_screenshot(&mut self, path: impl Into<String>) -> AppResult<()> {
        self.ensure_open()?;
        self.screenshots.push(path.into());
        Ok(())
    }

    pub fn add_captcha_event(&mut self, event: CaptchaEvent) -> AppResult<()> {
        self.ensure_open()?;
        self.captcha_events.push(event);
        Ok(())
    }

    /// 解决第 `index` 个验证码事件，返回是否发生了状态变化
    pub fn resolve_captcha(&mut self, index: usize, method: ResolutionMethod) -> AppResult<bool> {
        self.ensure_open()?;
        Ok(self
            .captcha_events
            .get_mut(index)
            .map(|event| event.resolve(method))
            .unwrap_or(false))
    }

    pub fn set_metric(&mut self, key: &str, value: impl Into<serde_json::Value>) -> AppResult<()> {
        self.ensure_open()?;
        self.performance_metrics.insert(key.to_string(), value.into());
        Ok(())
    }

    pub fn add_browser_log(&mut self, line: impl Into<String>) -> AppResult<()> {
        self.ensure_open()?;
        self.browser_logs.push(line.into());
        Ok(())
    }

    pub fn set_debug_output(&mut self, output: impl Into<String>) -> AppResult<()> {
        self.ensure_open()?;
        self.debug_output = Some(output.into());
        Ok(())
    }

    pub fn set_confirmation_details(
        &mut self,
        email: Option<String>,
        url: Option<String>,
    ) -> AppResult<()> {
        self.ensure_open()?;
        self.confirmation_email = email;
        self.confirmation_url = url;
        Ok(())
    }

    pub fn set_user_id(&mut self, user_id: impl Into<String>) -> AppResult<()> {
        self.ensure_open()?;
        self.user_id = Some(user_id.into());
        Ok(())
    }

    pub fn set_application_id(&mut self, application_id: impl Into<String>) -> AppResult<()> {
        self.ensure_open()?;
        self.application_id = Some(application_id.into());
        Ok(())
    }

    /// 写入宿主给出的标识，未给出的字段保持不变
    pub fn attach_ids(&mut self, ids: &HostIds) -> AppResult<()> {
        if let Some(user_id) = &ids.user_id {
            self.set_user_id(user_id.as_str())?;
        }
        if let Some(application_id) = &ids.application_id {
            self.set_application_id(application_id.as_str())?;
        }
        Ok(())
    }

    pub fn set_retry_count(&mut self, retry_count: u32) -> AppResult<()> {
        self.ensure_open()?;
        self.retry_count = retry_count;
        Ok(())
    }

    /// 以指定状态终结（通常为 `Success`）
    ///
    /// 成功但没有确认号时标记为需要审计
    pub fn set_completed(
        &mut self,
        status: ApplicationStatus,
        confirmation_number: Option<String>,
    ) -> AppResult<()> {
        self.ensure_open()?;
        let confirmation_number = confirmation_number.filter(|c| !c.trim().is_empty());
        self.needs_audit = status == ApplicationStatus::Success && confirmation_number.is_none();
        self.confirmation_number = confirmation_number;
        self.status = status;
        self.stamp_completion();
        Ok(())
    }

    /// 以失败状态终结
    pub fn set_failed(
        &mut self,
        error_message: impl Into<String>,
        error_kind: ErrorKind,
        status: ApplicationStatus,
    ) -> AppResult<()> {
        self.ensure_open()?;
        // 失败路径不允许落到 Success
        self.status = if status == ApplicationStatus::Success {
            ApplicationStatus::Failed
        } else {
            status
        };
        self.error_message = Some(error_message.into());
        self.error_kind = Some(error_kind);
        self.needs_audit = false;
        self.stamp_completion();
        Ok(())
    }

    fn stamp_completion(&mut self) {
        let now = Utc::now().max(self.started_at);
        let duration = now - self.started_at;
        self.completed_at = Some(now);
        self.total_duration_ms = Some(duration.num_milliseconds().max(0) as u64);
    }

    /// 审计检查，返回发现的问题列表（为空表示记录一致）
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.job_id.trim().is_empty() {
            issues.push("缺少 job_id".to_string());
        }
        if self.company_automation.trim().is_empty() {
            issues.push("缺少处理器名称".to_string());
        }
        if self.success() && self.confirmation_number.is_none() {
            issues.push("申请成功但没有确认号".to_string());
        }
        if self.is_finalized() && !self.success() && self.error_message.is_none() {
            issues.push("申请失败但没有错误信息".to_string());
        }
        if let Some(completed_at) = self.completed_at {
            if completed_at < self.started_at {
                issues.push("完成时间早于开始时间".to_string());
            }
        }
        if self.total_steps > 0 && self.steps_completed > self.total_steps {
            issues.push(format!(
                "完成步骤数 {} 超过总步骤数 {}",
                self.steps_completed, self.total_steps
            ));
        }

        issues
    }

    pub fn is_finalized(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn success(&self) -> bool {
        self.status == ApplicationStatus::Success
    }

    /// 成功步骤占比
    pub fn success_rate(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        let ok = self.steps.iter().filter(|s| s.success).count();
        ok as f64 / self.steps.len() as f64
    }

    pub fn captcha_count(&self) -> usize {
        self.captcha_events.len()
    }

    pub fn resolved_captcha_count(&self) -> usize {
        self.captcha_events.iter().filter(|e| e.is_resolved()).count()
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn company_automation(&self) -> &str {
        &self.company_automation
    }

    pub fn status(&self) -> ApplicationStatus {
        self.status
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn total_duration_ms(&self) -> Option<u64> {
        self.total_duration_ms
    }

    pub fn confirmation_number(&self) -> Option<&str> {
        self.confirmation_number.as_deref()
    }

    pub fn confirmation_email(&self) -> Option<&str> {
        self.confirmation_email.as_deref()
    }

    pub fn confirmation_url(&self) -> Option<&str> {
        self.confirmation_url.as_deref()
    }

    pub fn steps_completed(&self) -> u32 {
        self.steps_completed
    }

    pub fn total_steps(&self) -> u32 {
        self.total_steps
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error_kind
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn needs_audit(&self) -> bool {
        self.needs_audit
    }

    pub fn steps(&self) -> &[AutomationStep] {
        &self.steps
    }

    pub fn screenshots(&self) -> &[String] {
        &self.screenshots
    }

    pub fn captcha_events(&self) -> &[CaptchaEvent] {
        &self.captcha_events
    }

    pub fn performance_metrics(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.performance_metrics
    }

    pub fn browser_logs(&self) -> &[String] {
        &self.browser_logs
    }

    pub fn debug_output(&self) -> Option<&str> {
        self.debug_output.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn application_id(&self) -> Option<&str> {
        self.application_id.as_deref()
    }

    pub fn automation_version(&self) -> &str {
        &self.automation_version
    }
}
