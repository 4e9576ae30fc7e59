use std::path::Path;

use super::{task, AtsHandler, ResumePolicy};
use crate::models::{AtsKind, JobDescriptor, UserProfile};

const STEPS: &[&str] = &[
    "Open the application URL and find the application form; it may sit behind an \"Apply\" button or in an iframe.",
    "Fill every required field from the candidate information.",
    "Upload the resume when a file input asks for it.",
    "Complete all pages of a multi-step form, then submit.",
];

/// 通用处理器，接受任何 URL
#[derive(Debug, Clone, Default)]
pub struct GenericHandler {
    resume_policy: ResumePolicy,
}

impl GenericHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resume_policy(mut self, policy: ResumePolicy) -> Self {
        self.resume_policy = policy;
        self
    }
}

impl AtsHandler for GenericHandler {
    fn company(&self) -> &'static str {
        "generic"
    }

    fn ats(&self) -> AtsKind {
        AtsKind::Generic
    }

    fn url_patterns(&self) -> &'static [&'static str] {
        &[]
    }

    fn can_handle_url(&self, _url: &str) -> bool {
        true
    }

    fn resume_policy(&self) -> ResumePolicy {
        self.resume_policy
    }

    fn build_task(&self, profile: &UserProfile, job: &JobDescriptor, resume: Option<&Path>) -> String {
        task::compose(&job.company, profile, job, resume, STEPS)
    }
}
