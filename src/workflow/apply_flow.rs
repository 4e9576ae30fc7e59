//! 申请流程 - 流程层
//!
//! 核心职责：驱动一次申请尝试，从校验输入到产出终结的 `ApplicationResult`
//!
//! 流程顺序：
//! 1. validate   → URL 与处理器匹配、简历策略
//! 2. initialize → 打开浏览器会话
//! 3. execute    → 交给 AI 代理执行（有超时）
//! 4. confirm    → 分类结果
//!
//! 会话在第 2 步之后的任何退出路径上都会被关闭且只关闭一次，结果只终结一次。

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::companies::{AtsHandler, ResumePolicy};
use crate::config::Config;
use crate::error::{AppError, AppResult, ErrorKind};
use crate::infrastructure::session::{BrowserSession, SessionFactory};
use crate::models::result::{ApplicationResult, ApplicationStatus, AutomationStep, CaptchaEvent, HostIds};
use crate::models::{JobDescriptor, UserProfile};
use crate::services::agent::{is_uploadable, ActionRegistry, AgentCapability, AgentRequest};
use crate::services::resume_fetcher::ResumeFetcher;
use crate::utils::logging::truncate_text;
use crate::workflow::execution_context::ExecutionContext;
use crate::workflow::outcome::{classify, Evidence, Outcome};

/// 生命周期步骤数：validate / initialize / execute / confirm
pub const TOTAL_STEPS: u32 = 4;

/// 流程参数
#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub execute_timeout: Duration,
    pub screenshots_dir: PathBuf,
    pub capture_screenshots: bool,
    pub download_dir: PathBuf,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl FlowConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            execute_timeout: config.execute_timeout(),
            screenshots_dir: config.screenshots_dir.clone(),
            capture_screenshots: config.capture_screenshots,
            download_dir: config.download_dir.clone(),
        }
    }
}

/// 一次申请的流程编排
///
/// - 不持有浏览器资源，会话由工厂按次创建
/// - 处理器只提供数据（URL 模式、简历策略、任务文本）
pub struct ApplyFlow {
    handler: Arc<dyn AtsHandler>,
    sessions: Arc<dyn SessionFactory>,
    agent: Arc<dyn AgentCapability>,
    actions: ActionRegistry,
    config: FlowConfig,
}

impl ApplyFlow {
    pub fn new(
        handler: Arc<dyn AtsHandler>,
        sessions: Arc<dyn SessionFactory>,
        agent: Arc<dyn AgentCapability>,
        config: FlowConfig,
    ) -> Self {
        Self {
            handler,
            sessions,
            agent,
            actions: ActionRegistry::default(),
            config,
        }
    }

    pub fn with_actions(mut self, actions: ActionRegistry) -> Self {
        self.actions = actions;
        self
    }

    fn tag(&self) -> &'static str {
        self.handler.company()
    }

    /// 执行完整流程，任何情况下都返回一个已终结的结果
    pub async fn run(
        &self,
        ctx: &ExecutionContext,
        profile: &UserProfile,
        job: &JobDescriptor,
        ids: &HostIds,
    ) -> ApplicationResult {
        let tag = self.tag();
        let mut result = ApplicationResult::start(&job.job_id, tag, TOTAL_STEPS);
        record(result.attach_ids(ids));
        info!("[{}] 开始申请: {} @ {}", tag, job.title, job.company);
        if !ctx.warnings().is_empty() {
            record(result.set_metric("context_warnings", ctx.warnings().to_vec()));
        }

        // ========== 1. 校验 ==========
        if let Err(e) = self.validate(profile, job, &mut result) {
            warn!("[{}] ❌ 校验失败: {}", tag, e);
            record(result.add_step(AutomationStep::new("validate", "校验输入", false).with_error(e.to_string())));
            finalize(result.set_failed(e.to_string(), e.kind(), ApplicationStatus::Failed));
            return result;
        }
        record(result.add_step(AutomationStep::new("validate", "校验输入", true)));

        // ========== 2. 打开会话 ==========
        let opened = Instant::now();
        let mut session = match self.sessions.open(&ctx.launch_params(), &job.apply_url).await {
            Ok(session) => session,
            Err(e) => {
                let e = AppError::Session(e);
                error!("[{}] ❌ 浏览器会话创建失败: {}", tag, e);
                record(result.add_step(
                    AutomationStep::new("initialize", "打开浏览器会话", false).with_error(e.to_string()),
                ));
                finalize(result.set_failed(e.to_string(), ErrorKind::AutomationError, ApplicationStatus::Failed));
                return result;
            }
        };
        record(result.add_step(
            AutomationStep::new("initialize", "打开浏览器会话", true)
                .with_duration(elapsed_ms(opened))
                .with_metadata("mode", ctx.mode().as_str())
                .with_metadata("session_id", ctx.session_id())
                .with_metadata("model", ctx.model().model_name()),
        ));

        // ========== 3-4. 执行与分类（捕获 panic） ==========
        let driven = AssertUnwindSafe(self.drive(ctx, profile, job, session.as_mut(), &mut result))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(AppError::Agent(anyhow::anyhow!(
                    "执行阶段发生 panic: {}",
                    panic_message(panic.as_ref())
                )))
            });

        // ========== 清理 ==========
        if let Err(e) = session.stop().await {
            warn!("[{}] ⚠️ 关闭浏览器失败: {}", tag, e);
            record(result.add_browser_log(format!("关闭浏览器失败: {}", e)));
        }

        // ========== 终结 ==========
        self.conclude(driven, &mut result);
        info!(
            "[{}] 申请结束: {} (完成 {}/{} 步)",
            tag,
            result.status(),
            result.steps_completed(),
            result.total_steps()
        );
        result
    }

    fn validate(
        &self,
        profile: &UserProfile,
        job: &JobDescriptor,
        result: &mut ApplicationResult,
    ) -> AppResult<()> {
        if !self.handler.can_handle_url(&job.apply_url) {
            return Err(AppError::InvalidUrl {
                url: job.apply_url.clone(),
                company: self.handler.company().to_string(),
            });
        }

        if !profile.has_resume() {
            match self.handler.resume_policy() {
                ResumePolicy::Required => {
                    return Err(AppError::validation("resume", "该招聘系统要求提供简历"));
                }
                ResumePolicy::Optional => {
                    warn!("[{}] ⚠️ 没有可用的简历，继续申请", self.tag());
                    result.set_metric("resume_warning", "没有可用的简历")?;
                }
            }
        }
        if !profile.has_work_authorization_info() {
            result.set_metric("work_authorization_missing", true)?;
        }
        Ok(())
    }

    /// 第 3、4 步：准备简历、运行代理、读取页面、分类、截图
    async fn drive(
        &self,
        ctx: &ExecutionContext,
        profile: &UserProfile,
        job: &JobDescriptor,
        session: &mut dyn BrowserSession,
        result: &mut ApplicationResult,
    ) -> AppResult<Outcome> {
        let tag = self.tag();
        let resume = self.prepare_resume(profile, result).await?;

        let task = self.handler.build_task(profile, job, resume.as_deref());
        let request = AgentRequest {
            task,
            available_files: resume.into_iter().collect(),
            actions: self.actions.clone(),
            model: ctx.model().clone(),
        };

        info!("[{}] 🤖 交给代理执行 (超时 {} 秒)", tag, self.config.execute_timeout.as_secs());
        let started = Instant::now();
        let executed = tokio::time::timeout(self.config.execute_timeout, self.agent.run(request, &mut *session)).await;

        let transcript = match executed {
            Err(_) => {
                let secs = self.config.execute_timeout.as_secs();
                result.add_step(
                    AutomationStep::new("execute", "运行 AI 代理", false)
                        .with_duration(elapsed_ms(started))
                        .with_error(format!("超过 {} 秒未完成", secs)),
                )?;
                return Err(AppError::Timeout(secs));
            }
            Ok(Err(e)) => {
                let e = AppError::Agent(e);
                result.add_step(
                    AutomationStep::new("execute", "运行 AI 代理", false)
                        .with_duration(elapsed_ms(started))
                        .with_error(e.to_string()),
                )?;
                return Err(e);
            }
            Ok(Ok(transcript)) => transcript,
        };

        let text = transcript.text();
        result.add_step(
            AutomationStep::new("execute", "运行 AI 代理", true)
                .with_duration(elapsed_ms(started))
                .with_metadata("history_len", transcript.history.len())
                .with_metadata("agent_result", truncate_text(&text, 2000)),
        )?;
        result.set_debug_output(text.clone())?;

        let page_text = match session.page_text().await {
            Ok(page_text) => page_text,
            Err(e) => {
                warn!("[{}] ⚠️ 读取最终页面失败: {}", tag, e);
                result.add_browser_log(format!("读取最终页面失败: {}", e))?;
                String::new()
            }
        };

        let outcome = classify(&text, &page_text);
        info!("[{}] 分类结果: {:?}", tag, outcome);

        if self.config.capture_screenshots {
            let path = self.config.screenshots_dir.join(format!(
                "final_result_{}_{}.png",
                job.job_id,
                chrono::Utc::now().timestamp()
            ));
            match session.screenshot(&path).await {
                Ok(()) => result.add_screenshot(path.to_string_lossy())?,
                Err(e) => warn!("[{}] ⚠️ 截图失败: {}", tag, e),
            }
        }

        Ok(outcome)
    }

    /// 解析简历引用；URL 会下载到本地
    async fn prepare_resume(
        &self,
        profile: &UserProfile,
        result: &mut ApplicationResult,
    ) -> AppResult<Option<PathBuf>> {
        let Some(reference) = profile.resume_reference() else {
            return Ok(None);
        };

        let resolved = match ResumeFetcher::new(&self.config.download_dir) {
            Ok(fetcher) => fetcher.resolve(reference).await,
            Err(e) => Err(e),
        };

        match resolved {
            Ok(path) if is_uploadable(&path) => Ok(Some(path)),
            Ok(path) => {
                warn!("[{}] ⚠️ 简历格式不支持上传: {}", self.tag(), path.display());
                result.set_metric("resume_warning", "简历格式不支持上传")?;
                Ok(None)
            }
            Err(e) if self.handler.resume_policy() == ResumePolicy::Required => Err(e),
            Err(e) => {
                warn!("[{}] ⚠️ 简历下载失败，继续申请: {}", self.tag(), e);
                result.set_metric("resume_warning", format!("简历下载失败: {}", e))?;
                Ok(None)
            }
        }
    }

    fn conclude(&self, driven: AppResult<Outcome>, result: &mut ApplicationResult) {
        let finalized = match driven {
            Ok(Outcome::Success {
                confirmation,
                confirmation_email,
                evidence,
            }) => {
                let action = match evidence {
                    Evidence::AgentMarker => "代理报告成功",
                    Evidence::PageKeyword => "页面出现成功提示",
                };
                let mut step = AutomationStep::new("confirm", action, true);
                if let Some(id) = &confirmation {
                    step = step.with_metadata("confirmation_id", id.as_str());
                }
                result
                    .add_step(step)
                    .and_then(|_| result.set_confirmation_details(confirmation_email, None))
                    .and_then(|_| result.set_completed(ApplicationStatus::Success, confirmation))
            }
            Ok(Outcome::Captcha { kind }) => result
                .add_captcha_event(CaptchaEvent::detected(kind))
                .and_then(|_| {
                    result.add_step(
                        AutomationStep::new("confirm", "检测到验证码", false).with_metadata(
                            "captcha_type",
                            serde_json::to_value(kind).unwrap_or_default(),
                        ),
                    )
                })
                .and_then(|_| {
                    result.set_failed(
                        "检测到验证码，需要人工处理",
                        ErrorKind::CaptchaRequired,
                        ApplicationStatus::CaptchaRequired,
                    )
                }),
            Ok(Outcome::Blocked { blocker, message }) => {
                warn!("[{}] ⛔ 申请被阻断 ({}): {}", self.tag(), blocker.status(), message);
                result
                    .add_step(
                        AutomationStep::new("confirm", "代理报告被阻断", false)
                            .with_error(message.clone())
                            .with_metadata("blocker", blocker.status().as_str()),
                    )
                    .and_then(|_| result.set_failed(message, ErrorKind::AutomationError, blocker.status()))
            }
            Ok(Outcome::FormError { message }) => result
                .add_step(AutomationStep::new("confirm", "代理报告表单错误", false).with_error(message.clone()))
                .and_then(|_| result.set_failed(message, ErrorKind::FormError, ApplicationStatus::FormError)),
            Ok(Outcome::Unclear) => result
                .add_step(AutomationStep::new("confirm", "未找到成功标记", false))
                .and_then(|_| {
                    result.set_failed(
                        "流程已结束，但没有找到明确的成功标记",
                        ErrorKind::UnclearResult,
                        ApplicationStatus::Failed,
                    )
                }),
            Err(e) => {
                let status = match e {
                    AppError::Timeout(_) => ApplicationStatus::Timeout,
                    _ => ApplicationStatus::Failed,
                };
                error!("[{}] ❌ 自动化失败: {}", self.tag(), e);
                result.set_failed(format!("自动化失败: {}", e), e.kind(), status)
            }
        };
        finalize(finalized);
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "未知 panic".to_string()
    }
}

/// 终结前的修改不会失败；失败说明流程写错了
fn record(outcome: AppResult<()>) {
    if let Err(e) = outcome {
        error!("结果记录失败: {}", e);
    }
}

fn finalize(outcome: AppResult<()>) {
    if let Err(e) = outcome {
        error!("结果终结失败: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("页面崩溃");
        assert_eq!(panic_message(boxed.as_ref()), "页面崩溃");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("格式化的 panic"));
        assert_eq!(panic_message(boxed.as_ref()), "格式化的 panic");
        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "未知 panic");
    }

    #[test]
    fn test_flow_config_from_config() {
        let config = Config {
            execute_timeout_secs: 12,
            capture_screenshots: false,
            ..Default::default()
        };
        let flow = FlowConfig::from_config(&config);
        assert_eq!(flow.execute_timeout, Duration::from_secs(12));
        assert!(!flow.capture_screenshots);
        assert_eq!(flow.download_dir, PathBuf::from("downloads"));
    }
}
