//! 任务文本的公共部分：候选人信息块和结果上报格式

use std::fmt::Write;
use std::path::Path;

use crate::models::{JobDescriptor, UserProfile};

/// 代理必须按此格式上报结果，结果分类依赖这些标记
pub const REPORT_FORMAT: &str = "\
When you are done, report exactly one of these lines as your final answer:
SUCCESS: <confirmation number, or NONE if the page shows none>
CAPTCHA_DETECTED: <captcha type>
LOGIN_REQUIRED: <what asked you to sign in>
RATE_LIMITED: <what the site showed>
NETWORK_ERROR: <what failed to load>
ERROR: <what went wrong>";

fn or_unspecified(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("Not specified")
}

/// 候选人信息块
pub fn candidate_block(profile: &UserProfile) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "CANDIDATE:");
    let _ = writeln!(out, "- Full name: {}", profile.full_name());
    let _ = writeln!(out, "- First name: {}", profile.first_name);
    let _ = writeln!(out, "- Last name: {}", profile.last_name);
    let _ = writeln!(out, "- Email: {}", profile.email);
    let _ = writeln!(out, "- Phone: {}", profile.phone);
    let _ = writeln!(out, "- Current title: {}", or_unspecified(profile.current_title.as_deref()));
    let years = profile
        .years_experience
        .map(|y| y.to_string())
        .unwrap_or_else(|| "Not specified".to_string());
    let _ = writeln!(out, "- Years of experience: {}", years);
    let _ = writeln!(out, "- Location: {}", or_unspecified(profile.current_location.as_deref()));
    let _ = writeln!(out, "- LinkedIn: {}", or_unspecified(profile.linkedin_url.as_deref()));
    if !profile.skills.is_empty() {
        let _ = writeln!(out, "- Skills: {}", profile.skills.join(", "));
    }
    let _ = writeln!(
        out,
        "- Work authorization: {}",
        or_unspecified(profile.work_authorization.as_deref())
    );
    if let Some(sponsorship) = profile.require_sponsorship {
        let _ = writeln!(
            out,
            "- Requires sponsorship: {}",
            if sponsorship { "Yes" } else { "No" }
        );
    }
    if let Some(salary) = profile.salary_expectation.as_deref() {
        let _ = writeln!(out, "- Salary expectation: {}", salary);
    }
    if let Some(cover_letter) = profile.cover_letter.as_deref() {
        let _ = writeln!(out, "- Cover letter: {}", cover_letter);
    }
    for (key, value) in &profile.custom_fields {
        let _ = writeln!(out, "- {}: {}", key, value);
    }
    out
}

/// 拼装完整任务：目标、候选人、简历、ATS 专用步骤、上报格式
pub fn compose(
    board: &str,
    profile: &UserProfile,
    job: &JobDescriptor,
    resume: Option<&Path>,
    steps: &[&str],
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Apply to the {} position at {} on {}.",
        job.title, job.company, board
    );
    let _ = writeln!(out, "Application URL: {}\n", job.apply_url);
    out.push_str(&candidate_block(profile));

    match resume {
        Some(path) => {
            let _ = writeln!(
                out,
                "\nResume file: {}\nUse the upload_file action for any resume/CV file input.",
                path.display()
            );
        }
        None => {
            let _ = writeln!(out, "\nNo resume file is available; skip optional resume uploads.");
        }
    }

    let _ = writeln!(out, "\nSTEPS:");
    for (i, step) in steps.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, step);
    }
    let _ = writeln!(
        out,
        "\nUse detect_captcha if a challenge appears and stop if one is present. \
         After submitting, use extract_confirmation on the confirmation page.\n"
    );
    out.push_str(REPORT_FORMAT);
    out
}
