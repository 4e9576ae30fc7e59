//! 宿主桥接的输入载荷与输出格式

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::job::{JobData, JobDescriptor};
use crate::models::profile::{UserProfile, UserProfileData};
use crate::models::proxy::ProxyConfig;
use crate::models::result::{ApplicationResult, AutomationStep, CaptchaEvent};

/// 宿主写入数据文件的原始载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationPayload {
    pub user_profile: UserProfileData,
    pub job_data: JobData,
    #[serde(default)]
    pub automation_config: serde_json::Map<String, serde_json::Value>,
    /// 服务端模式下宿主指定的代理，优先于代理池
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_config: Option<ProxyConfig>,
}

/// 校验通过的载荷
#[derive(Debug, Clone)]
pub struct ValidatedPayload {
    pub profile: UserProfile,
    pub job: JobDescriptor,
    pub automation_config: serde_json::Map<String, serde_json::Value>,
    pub proxy: Option<ProxyConfig>,
}

impl AutomationPayload {
    pub fn from_json(text: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// 从 `USER_*` / `JOB_*` 环境变量组装载荷
    pub fn from_env_vars<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| {
            get(key).ok_or_else(|| AppError::validation(key, "缺少必需的环境变量"))
        };

        let years_experience = match get("USER_YEARS_EXPERIENCE") {
            Some(raw) => {
                let years: i32 = raw.trim().parse().map_err(|_| {
                    AppError::validation("USER_YEARS_EXPERIENCE", format!("不是整数: {}", raw))
                })?;
                // 0 视为未填写
                (years != 0).then_some(years)
            }
            None => None,
        };
        let skills = match get("USER_SKILLS") {
            Some(raw) => serde_json::from_str(&raw)?,
            None => Vec::new(),
        };

        let user_profile = UserProfileData {
            first_name: require("USER_FIRST_NAME")?,
            last_name: require("USER_LAST_NAME")?,
            email: require("USER_EMAIL")?,
            phone: require("USER_PHONE")?,
            resume_url: get("USER_RESUME_URL"),
            resume_local_path: get("USER_RESUME_LOCAL_PATH"),
            cover_letter: get("USER_COVER_LETTER"),
            current_title: get("USER_CURRENT_TITLE"),
            years_experience,
            skills,
            linkedin_url: get("USER_LINKEDIN_URL"),
            current_location: get("USER_CURRENT_LOCATION"),
            work_authorization: get("USER_WORK_AUTHORIZATION"),
            ..Default::default()
        };

        let job_data = JobData {
            job_id: require("JOB_ID")?,
            title: require("JOB_TITLE")?,
            company: require("JOB_COMPANY")?,
            apply_url: require("JOB_APPLY_URL")?,
            location: get("JOB_LOCATION"),
            description: get("JOB_DESCRIPTION"),
            ..Default::default()
        };

        let proxy_config = match get("PROXY_CONFIG") {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        };

        Ok(Self {
            user_profile,
            job_data,
            automation_config: serde_json::Map::new(),
            proxy_config,
        })
    }

    /// 进入编排层之前的完整校验
    pub fn validate(self) -> AppResult<ValidatedPayload> {
        if self.job_data.title.trim().is_empty() {
            return Err(AppError::validation("title", "不能为空"));
        }
        if self.job_data.company.trim().is_empty() {
            return Err(AppError::validation("company", "不能为空"));
        }
        let job = JobDescriptor::new(self.job_data)?;
        let profile = UserProfile::new(self.user_profile)?;

        Ok(ValidatedPayload {
            profile,
            job,
            automation_config: self.automation_config,
            proxy: self.proxy_config,
        })
    }
}

fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutput {
    pub step_name: String,
    pub action: String,
    pub success: bool,
    pub timestamp: String,
    pub duration_ms: Option<u64>,
    pub error_message: Option<String>,
}

impl From<&AutomationStep> for StepOutput {
    fn from(step: &AutomationStep) -> Self {
        Self {
            step_name: step.step_name.clone(),
            action: step.action.clone(),
            success: step.success,
            timestamp: iso(step.timestamp),
            duration_ms: step.duration_ms,
            error_message: step.error_message.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CaptchaOutput {
    pub captcha_type: String,
    pub detected_at: String,
    pub resolved: bool,
    pub resolution_method: Option<String>,
}

impl From<&CaptchaEvent> for CaptchaOutput {
    fn from(event: &CaptchaEvent) -> Self {
        let as_text = |v: serde_json::Value| v.as_str().map(str::to_string);
        Self {
            captcha_type: serde_json::to_value(event.captcha_type)
                .ok()
                .and_then(as_text)
                .unwrap_or_else(|| "unknown".to_string()),
            detected_at: iso(event.detected_at),
            resolved: event.is_resolved(),
            resolution_method: event
                .resolution_method()
                .and_then(|m| serde_json::to_value(m).ok())
                .and_then(as_text),
        }
    }
}

/// 输出到标准输出的扁平 JSON 对象
#[derive(Debug, Clone, Serialize)]
pub struct BridgeOutput {
    pub success: bool,
    pub status: String,
    pub confirmation_number: Option<String>,
    pub execution_time_ms: u64,
    pub error_message: Option<String>,
    pub steps: Vec<StepOutput>,
    pub screenshots: Vec<String>,
    pub captcha_events: Vec<CaptchaOutput>,
    pub steps_completed: u32,

    pub application_id: String,
    pub company_automation: String,
    pub error_type: Option<String>,
    pub needs_audit: bool,
    pub execution_mode: String,
}

impl BridgeOutput {
    pub fn from_result(result: &ApplicationResult, application_id: &str, execution_mode: &str) -> Self {
        Self {
            success: result.success(),
            status: result.status().as_str().to_string(),
            confirmation_number: result.confirmation_number().map(str::to_string),
            execution_time_ms: result.total_duration_ms().unwrap_or(0),
            error_message: result.error_message().map(str::to_string),
            steps: result.steps().iter().map(StepOutput::from).collect(),
            screenshots: result.screenshots().to_vec(),
            captcha_events: result.captcha_events().iter().map(CaptchaOutput::from).collect(),
            steps_completed: result.steps_completed(),
            application_id: application_id.to_string(),
            company_automation: result.company_automation().to_string(),
            error_type: result.error_kind().map(|k| k.as_str().to_string()),
            needs_audit: result.needs_audit(),
            execution_mode: execution_mode.to_string(),
        }
    }

    /// 没有任何结果可用时的兜底错误对象
    pub fn error(message: impl Into<String>, application_id: &str, execution_mode: &str) -> Self {
        Self {
            success: false,
            status: "failed".to_string(),
            confirmation_number: None,
            execution_time_ms: 0,
            error_message: Some(message.into()),
            steps: Vec::new(),
            screenshots: Vec::new(),
            captcha_events: Vec::new(),
            steps_completed: 0,
            application_id: application_id.to_string(),
            company_automation: "unknown".to_string(),
            error_type: Some("AUTOMATION_ERROR".to_string()),
            needs_audit: false,
            execution_mode: execution_mode.to_string(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            Self::fallback_json(&format!("输出序列化失败: {}", e), &self.application_id, &self.execution_mode)
        })
    }

    /// 序列化失败时的最小输出，消息经过转义，始终是合法 JSON
    fn fallback_json(message: &str, application_id: &str, execution_mode: &str) -> String {
        serde_json::json!({
            "success": false,
            "status": "failed",
            "error_message": message,
            "application_id": application_id,
            "error_type": "AUTOMATION_ERROR",
            "execution_mode": execution_mode,
        })
        .to_string()
    }
}
