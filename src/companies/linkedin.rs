use std::path::Path;

use super::{task, AtsHandler, ResumePolicy};
use crate::models::{AtsKind, JobDescriptor, UserProfile};

const URL_PATTERNS: &[&str] = &[
    "linkedin.com/jobs",
    "linkedin.com/jobs/view",
    "linkedin.com/jobs/collections",
    "linkedin.com/jobs/search",
];

const STEPS: &[&str] = &[
    "Open the job URL. If LinkedIn asks to sign in, stop and report LOGIN_REQUIRED: sign-in wall.",
    "Click the \"Easy Apply\" button. If the job only offers an external apply link, report ERROR: external application.",
    "Complete each Easy Apply page: contact info, resume, and screening questions.",
    "Select the uploaded resume or upload the resume file when asked.",
    "Use \"Next\" and \"Review\" until the final page, then click \"Submit application\".",
];

/// LinkedIn Easy Apply
///
/// Easy Apply 几乎总是要求简历，默认把简历视为必需
#[derive(Debug, Clone)]
pub struct LinkedInHandler {
    resume_policy: ResumePolicy,
}

impl Default for LinkedInHandler {
    fn default() -> Self {
        Self {
            resume_policy: ResumePolicy::Required,
        }
    }
}

impl LinkedInHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resume_policy(mut self, policy: ResumePolicy) -> Self {
        self.resume_policy = policy;
        self
    }
}

impl AtsHandler for LinkedInHandler {
    fn company(&self) -> &'static str {
        "linkedin"
    }

    fn ats(&self) -> AtsKind {
        AtsKind::Linkedin
    }

    fn url_patterns(&self) -> &'static [&'static str] {
        URL_PATTERNS
    }

    fn resume_policy(&self) -> ResumePolicy {
        self.resume_policy
    }

    fn build_task(&self, profile: &UserProfile, job: &JobDescriptor, resume: Option<&Path>) -> String {
        task::compose("LinkedIn", profile, job, resume, STEPS)
    }
}
