use std::path::Path;

use super::{task, AtsHandler, ResumePolicy};
use crate::models::{AtsKind, JobDescriptor, UserProfile};

const URL_PATTERNS: &[&str] = &[
    "greenhouse.io",
    "job-boards.greenhouse.io",
    "boards.greenhouse.io",
    "grnh.se",
];

const STEPS: &[&str] = &[
    "Open the application URL and wait for the page to load.",
    "Click \"Apply for this job\" if the form is not already visible.",
    "Fill the basic fields (first name, last name, email, phone) and the location and LinkedIn fields when present.",
    "Upload the resume to the resume/CV field when a file is available.",
    "Answer custom questions using the candidate information; leave optional unknowns blank.",
    "Answer work authorization and sponsorship questions from the candidate information.",
    "Review required fields and click \"Submit Application\".",
];

/// Greenhouse 招聘页面
#[derive(Debug, Clone, Default)]
pub struct GreenhouseHandler {
    resume_policy: ResumePolicy,
}

impl GreenhouseHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resume_policy(mut self, policy: ResumePolicy) -> Self {
        self.resume_policy = policy;
        self
    }
}

impl AtsHandler for GreenhouseHandler {
    fn company(&self) -> &'static str {
        "greenhouse"
    }

    fn ats(&self) -> AtsKind {
        AtsKind::Greenhouse
    }

    fn url_patterns(&self) -> &'static [&'static str] {
        URL_PATTERNS
    }

    fn resume_policy(&self) -> ResumePolicy {
        self.resume_policy
    }

    fn build_task(&self, profile: &UserProfile, job: &JobDescriptor, resume: Option<&Path>) -> String {
        task::compose("Greenhouse", profile, job, resume, STEPS)
    }
}
