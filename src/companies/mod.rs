//! 各 ATS 的处理器
//!
//! 处理器只是数据：URL 模式、简历策略和任务文本。控制流统一在 `workflow::ApplyFlow` 中。

pub mod generic;
pub mod greenhouse;
pub mod linkedin;
pub mod task;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::models::{AtsKind, JobDescriptor, UserProfile};

pub use generic::GenericHandler;
pub use greenhouse::GreenhouseHandler;
pub use linkedin::LinkedInHandler;

/// 缺少简历时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumePolicy {
    /// 缺少简历只记录警告
    #[default]
    Optional,
    /// 缺少简历视为校验失败
    Required,
}

/// ATS 处理器
pub trait AtsHandler: Send + Sync {
    /// 处理器名称，写入结果的 `company_automation`
    fn company(&self) -> &'static str;

    fn ats(&self) -> AtsKind;

    fn url_patterns(&self) -> &'static [&'static str];

    fn can_handle_url(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        self.url_patterns().iter().any(|p| url.contains(p))
    }

    fn resume_policy(&self) -> ResumePolicy;

    /// 交给代理的自然语言任务
    fn build_task(&self, profile: &UserProfile, job: &JobDescriptor, resume: Option<&Path>) -> String;
}

/// 处理器注册表，构造时注入，查找永远有结果（回退到通用处理器）
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<AtsKind, Arc<dyn AtsHandler>>,
    generic: Arc<dyn AtsHandler>,
}

impl HandlerRegistry {
    /// 只有通用处理器的空注册表
    pub fn new(generic: Arc<dyn AtsHandler>) -> Self {
        Self {
            handlers: HashMap::new(),
            generic,
        }
    }

    /// 内置的 Greenhouse / LinkedIn / 通用处理器
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(GenericHandler::new()))
            .register(Arc::new(GreenhouseHandler::new()))
            .register(Arc::new(LinkedInHandler::new()))
    }

    pub fn register(mut self, handler: Arc<dyn AtsHandler>) -> Self {
        tracing::debug!("注册处理器: {}", handler.company());
        self.handlers.insert(handler.ats(), handler);
        self
    }

    /// 取指定 ATS 的处理器，未注册时返回通用处理器
    pub fn get(&self, ats: AtsKind) -> Arc<dyn AtsHandler> {
        self.handlers
            .get(&ats)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.generic))
    }

    /// 是否注册了专用（非通用）处理器
    pub fn has_specific(&self, ats: AtsKind) -> bool {
        ats != AtsKind::Generic && self.handlers.contains_key(&ats)
    }

    /// 已注册的专用处理器名称，按名称排序
    pub fn companies(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .handlers
            .iter()
            .filter(|(ats, _)| **ats != AtsKind::Generic)
            .map(|(_, h)| h.company())
            .collect();
        names.sort_unstable();
        names
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobData, UserProfileData};
    use std::path::PathBuf;

    fn profile() -> UserProfile {
        UserProfile::new(UserProfileData {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            phone: "5551234567".into(),
            skills: vec!["Rust".into(), "SQL".into()],
            require_sponsorship: Some(false),
            ..Default::default()
        })
        .unwrap()
    }

    fn job(url: &str) -> JobDescriptor {
        JobDescriptor::new(JobData {
            job_id: "1".into(),
            title: "Engineer".into(),
            company: "Acme".into(),
            apply_url: url.into(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_registry_falls_back_to_generic() {
        let registry = HandlerRegistry::with_defaults();
        assert_eq!(registry.get(AtsKind::Greenhouse).company(), "greenhouse");
        assert_eq!(registry.get(AtsKind::Linkedin).company(), "linkedin");
        assert_eq!(registry.get(AtsKind::Lever).company(), "generic");
        assert_eq!(registry.get(AtsKind::Generic).company(), "generic");

        assert!(registry.has_specific(AtsKind::Greenhouse));
        assert!(!registry.has_specific(AtsKind::Workday));
        assert!(!registry.has_specific(AtsKind::Generic));
        assert_eq!(registry.companies(), vec!["greenhouse", "linkedin"]);
    }

    #[test]
    fn test_empty_registry_still_resolves() {
        let registry = HandlerRegistry::new(Arc::new(GenericHandler::new()));
        assert_eq!(registry.get(AtsKind::Greenhouse).company(), "generic");
        assert!(registry.companies().is_empty());
    }

    #[test]
    fn test_url_patterns() {
        let greenhouse = GreenhouseHandler::new();
        assert!(greenhouse.can_handle_url("https://boards.greenhouse.io/acme/jobs/1"));
        assert!(greenhouse.can_handle_url("https://grnh.se/abc"));
        assert!(!greenhouse.can_handle_url("https://www.linkedin.com/jobs/view/1"));

        let linkedin = LinkedInHandler::new();
        assert!(linkedin.can_handle_url("https://www.LinkedIn.com/jobs/view/55"));
        assert!(!linkedin.can_handle_url("https://www.linkedin.com/in/ada"));

        assert!(GenericHandler::new().can_handle_url("https://careers.acme.com/apply/1"));
    }

    #[test]
    fn test_resume_policy_defaults_and_override() {
        assert_eq!(GreenhouseHandler::new().resume_policy(), ResumePolicy::Optional);
        assert_eq!(LinkedInHandler::new().resume_policy(), ResumePolicy::Required);
        assert_eq!(
            GenericHandler::new()
                .with_resume_policy(ResumePolicy::Required)
                .resume_policy(),
            ResumePolicy::Required
        );
    }

    #[test]
    fn test_task_contains_candidate_and_report_format() {
        let handler = GreenhouseHandler::new();
        let resume = PathBuf::from("/tmp/cv.pdf");
        let text = handler.build_task(
            &profile(),
            &job("https://boards.greenhouse.io/acme/jobs/1"),
            Some(&resume),
        );
        assert!(text.contains("Engineer position at Acme on Greenhouse"));
        assert!(text.contains("Ada Lovelace"));
        assert!(text.contains("Skills: Rust, SQL"));
        assert!(text.contains("Requires sponsorship: No"));
        assert!(text.contains("/tmp/cv.pdf"));
        assert!(text.ends_with(task::REPORT_FORMAT));
    }

    #[test]
    fn test_task_lists_blocker_markers() {
        for blocker in crate::workflow::outcome::Blocker::ALL {
            assert!(task::REPORT_FORMAT.contains(blocker.marker()), "{}", blocker.marker());
        }

        let text = LinkedInHandler::new().build_task(
            &profile(),
            &job("https://www.linkedin.com/jobs/view/55"),
            Some(&PathBuf::from("/tmp/cv.pdf")),
        );
        assert!(text.contains("report LOGIN_REQUIRED: sign-in wall"));
        assert!(!text.contains("ERROR: login required"));
    }
}
