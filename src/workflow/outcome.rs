//! 结果分类
//!
//! 纯函数：输入代理执行记录和最终页面文本，输出分类结果。
//! 优先看代理上报的标记，其次扫描页面上的成功关键词。
//! 标记优先级：SUCCESS > CAPTCHA > 阻断（登录 / 限流 / 网络）> ERROR。

use regex::Regex;
use std::sync::OnceLock;

use crate::models::result::{ApplicationStatus, CaptchaKind};

const SUCCESS_MARKER: &str = "SUCCESS:";
const CAPTCHA_MARKER: &str = "CAPTCHA";
const CAPTCHA_DETECTED_MARKER: &str = "CAPTCHA_DETECTED:";
const ERROR_MARKERS: [&str; 2] = ["ERROR:", "FAILED:"];

/// 页面上表示申请成功的关键词（小写比较）
pub const SUCCESS_KEYWORDS: [&str; 6] = [
    "thank you",
    "application submitted",
    "successfully applied",
    "confirmation",
    "received your application",
    "application complete",
];

/// 代理上报的占位值，表示没有确认号
const EMPTY_TOKENS: [&str; 4] = ["none", "n/a", "null", "unknown"];

/// 标签后面紧跟的普通单词，不能当作确认号
const STOP_WORDS: [&str; 14] = [
    "CONFIRMATION",
    "APPLICATION",
    "REFERENCE",
    "TICKET",
    "TRACKING",
    "NUMBER",
    "SUBMITTED",
    "RECEIVED",
    "COMPLETE",
    "THANK",
    "THANKS",
    "EMAIL",
    "MESSAGE",
    "PENDING",
];

/// 确认号最短长度
const MIN_CONFIRMATION_LEN: usize = 6;

/// 外部阻断：代理无法继续，但问题不在表单本身
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocker {
    LoginRequired,
    RateLimited,
    NetworkError,
}

impl Blocker {
    pub const ALL: [Blocker; 3] = [Blocker::LoginRequired, Blocker::RateLimited, Blocker::NetworkError];

    pub fn marker(self) -> &'static str {
        match self {
            Blocker::LoginRequired => "LOGIN_REQUIRED:",
            Blocker::RateLimited => "RATE_LIMITED:",
            Blocker::NetworkError => "NETWORK_ERROR:",
        }
    }

    /// `ERROR:` 描述里出现这些词（小写）时按阻断处理
    fn keywords(self) -> &'static [&'static str] {
        match self {
            Blocker::LoginRequired => &["login required", "sign in", "sign-in", "log in to apply"],
            Blocker::RateLimited => &["rate limit", "too many requests"],
            Blocker::NetworkError => &["network error", "connection refused", "connection reset", "err_"],
        }
    }

    pub fn status(self) -> ApplicationStatus {
        match self {
            Blocker::LoginRequired => ApplicationStatus::LoginRequired,
            Blocker::RateLimited => ApplicationStatus::RateLimited,
            Blocker::NetworkError => ApplicationStatus::NetworkError,
        }
    }

    fn default_message(self) -> &'static str {
        match self {
            Blocker::LoginRequired => "需要登录才能继续申请",
            Blocker::RateLimited => "目标站点限流",
            Blocker::NetworkError => "网络错误，页面无法加载",
        }
    }

    fn from_error_message(message: &str) -> Option<Self> {
        let lower = message.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|b| b.keywords().iter().any(|k| lower.contains(k)))
    }
}

/// 判定依据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evidence {
    AgentMarker,
    PageKeyword,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success {
        confirmation: Option<String>,
        confirmation_email: Option<String>,
        evidence: Evidence,
    },
    Captcha {
        kind: CaptchaKind,
    },
    /// 被登录墙、限流或网络问题挡住
    Blocked {
        blocker: Blocker,
        message: String,
    },
    FormError {
        message: String,
    },
    Unclear,
}

/// 对一次执行进行分类
pub fn classify(transcript: &str, page_text: &str) -> Outcome {
    if let Some(outcome) = classify_markers(transcript) {
        return outcome;
    }

    let page_lower = page_text.to_lowercase();
    if SUCCESS_KEYWORDS.iter().any(|k| page_lower.contains(k)) {
        return Outcome::Success {
            confirmation: extract_confirmation_number(page_text),
            confirmation_email: extract_confirmation_email(page_text),
            evidence: Evidence::PageKeyword,
        };
    }

    Outcome::Unclear
}

fn classify_markers(transcript: &str) -> Option<Outcome> {
    if let Some(rest) = after_marker(transcript, SUCCESS_MARKER) {
        return Some(Outcome::Success {
            confirmation: confirmation_from_marker(rest),
            confirmation_email: extract_confirmation_email(rest),
            evidence: Evidence::AgentMarker,
        });
    }

    if transcript.contains(CAPTCHA_MARKER) {
        let hint = after_marker(transcript, CAPTCHA_DETECTED_MARKER)
            .map(first_line)
            .unwrap_or_default();
        return Some(Outcome::Captcha {
            kind: CaptchaKind::from_hint(hint),
        });
    }

    // NETWORK_ERROR: 包含 ERROR:，必须先于错误标记检查
    for blocker in Blocker::ALL {
        if let Some(rest) = after_marker(transcript, blocker.marker()) {
            let message = first_line(rest).trim();
            let message = if message.is_empty() { blocker.default_message() } else { message };
            return Some(Outcome::Blocked {
                blocker,
                message: message.to_string(),
            });
        }
    }

    for marker in ERROR_MARKERS {
        if let Some(rest) = after_marker(transcript, marker) {
            let message = first_line(rest).trim();
            if let Some(blocker) = Blocker::from_error_message(message) {
                return Some(Outcome::Blocked {
                    blocker,
                    message: message.to_string(),
                });
            }
            let message = if message.is_empty() { "代理报告了未说明的错误" } else { message };
            return Some(Outcome::FormError {
                message: message.to_string(),
            });
        }
    }

    None
}

fn after_marker<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    text.find(marker).map(|idx| &text[idx + marker.len()..])
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

/// `SUCCESS:` 之后的第一个词像确认号时直接采用，否则在同一行里按模式提取
fn confirmation_from_marker(rest: &str) -> Option<String> {
    let line = first_line(rest);
    let token = line
        .split_whitespace()
        .next()
        .map(|t| t.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-'))
        .unwrap_or_default();

    if looks_like_confirmation(token) {
        return Some(token.to_string());
    }
    extract_confirmation_number(line)
}

fn looks_like_confirmation(token: &str) -> bool {
    if token.is_empty() || EMPTY_TOKENS.contains(&token.to_lowercase().as_str()) {
        return false;
    }
    let alnum = token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    let has_digit = token.chars().any(|c| c.is_ascii_digit());
    let all_upper = token.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-');
    alnum && (has_digit || (all_upper && token.len() >= 3))
}

fn label_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:confirmation|application|reference|ticket|tracking)\b").ok())
        .as_ref()
}

fn generic_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z0-9]{8,}\b").ok()).as_ref()
}

fn email_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:confirmation|email|sent)[^\n]*?\b(?:to|at)\s+([\w.\-+]+@[\w.\-]+\.\w+)").ok()
    })
    .as_ref()
}

/// 从文本中提取确认号
///
/// 先找标签（confirmation / application / reference / ticket / tracking），
/// 取同一行标签之后第一个至少 6 位的大写字母数字串，跳过常见单词。
/// 最后退回到 8 位以上且含数字的大写字母数字串。
pub fn extract_confirmation_number(text: &str) -> Option<String> {
    let labeled = label_pattern().and_then(|re| {
        text.lines().find_map(|line| {
            re.find_iter(line)
                .find_map(|label| first_code_word(&line[label.end()..]))
        })
    });

    labeled
        .or_else(|| {
            generic_pattern().and_then(|re| {
                re.find_iter(text)
                    .map(|m| m.as_str())
                    .find(|token| token.chars().any(|c| c.is_ascii_digit()))
            })
        })
        .map(str::to_string)
}

/// 标签之后第一个像确认号的词
fn first_code_word(rest: &str) -> Option<&str> {
    rest.split(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .map(|word| word.trim_matches('-'))
        .find(|word| {
            word.len() >= MIN_CONFIRMATION_LEN
                && word.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
                && !STOP_WORDS.contains(word)
        })
}

/// 提取确认邮件地址（"confirmation sent to x@y.com" 这类写法）
pub fn extract_confirmation_email(text: &str) -> Option<String> {
    email_pattern()?
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches('.').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(confirmation: Option<&str>, evidence: Evidence) -> Outcome {
        Outcome::Success {
            confirmation: confirmation.map(str::to_string),
            confirmation_email: None,
            evidence,
        }
    }

    #[test]
    fn test_success_marker_with_confirmation() {
        let outcome = classify("filled form\nSUCCESS: CONF123", "");
        assert_eq!(outcome, success(Some("CONF123"), Evidence::AgentMarker));
    }

    #[test]
    fn test_success_marker_variants() {
        assert_eq!(
            classify("SUCCESS: NONE", ""),
            success(None, Evidence::AgentMarker)
        );
        assert_eq!(
            classify("SUCCESS: Application submitted, reference number: AB-99812", ""),
            success(Some("AB-99812"), Evidence::AgentMarker)
        );
        assert_eq!(
            classify("SUCCESS: GH4471.", ""),
            success(Some("GH4471"), Evidence::AgentMarker)
        );
    }

    #[test]
    fn test_success_beats_other_markers() {
        let outcome = classify("ERROR: retrying upload\nSUCCESS: X9Y8Z7", "");
        assert_eq!(outcome, success(Some("X9Y8Z7"), Evidence::AgentMarker));
    }

    #[test]
    fn test_captcha_marker() {
        assert_eq!(
            classify("page shows CAPTCHA, stopping", "thank you"),
            Outcome::Captcha { kind: CaptchaKind::Unknown }
        );
        assert_eq!(
            classify("CAPTCHA_DETECTED: hCaptcha checkbox", ""),
            Outcome::Captcha { kind: CaptchaKind::Hcaptcha }
        );
    }

    #[test]
    fn test_error_markers() {
        assert_eq!(
            classify("ERROR: phone field rejected input\nmore", ""),
            Outcome::FormError { message: "phone field rejected input".into() }
        );
        assert_eq!(
            classify("FAILED:", ""),
            Outcome::FormError { message: "代理报告了未说明的错误".into() }
        );
    }

    #[test]
    fn test_page_keywords() {
        let outcome = classify(
            "clicked submit",
            "Thank you for applying! Your confirmation number is GH-20931. A confirmation email was sent to ada@example.com.",
        );
        assert_eq!(
            outcome,
            Outcome::Success {
                confirmation: Some("GH-20931".into()),
                confirmation_email: Some("ada@example.com".into()),
                evidence: Evidence::PageKeyword,
            }
        );
    }

    #[test]
    fn test_unclear_when_nothing_matches() {
        assert_eq!(classify("clicked submit", "Please fill all required fields"), Outcome::Unclear);
        assert_eq!(classify("", ""), Outcome::Unclear);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let text = "Application ID: 7781-AC. Reference code ZX99TT01";
        let first = extract_confirmation_number(text);
        for _ in 0..5 {
            assert_eq!(extract_confirmation_number(text), first);
        }
        assert_eq!(first.as_deref(), Some("7781-AC"));
    }

    #[test]
    fn test_unlabeled_codes_require_digit() {
        assert_eq!(extract_confirmation_number("confirmation message displayed"), None);
        assert_eq!(extract_confirmation_number("THANKYOUVERYMUCH"), None);
        assert_eq!(
            extract_confirmation_number("Your code: REF 55AB7731Q"),
            Some("55AB7731Q".into())
        );
    }

    #[test]
    fn test_labeled_codes_may_be_letters_only() {
        assert_eq!(
            extract_confirmation_number("Your reference code: ABCDEFGH"),
            Some("ABCDEFGH".into())
        );
        assert_eq!(extract_confirmation_number("Confirmation: QWERTY"), Some("QWERTY".into()));
    }

    #[test]
    fn test_label_and_code_may_be_apart() {
        assert_eq!(
            extract_confirmation_number("Your confirmation number for this role is ZX8812"),
            Some("ZX8812".into())
        );
        // 标签和确认号必须在同一行
        assert_eq!(extract_confirmation_number("Reference\nQWERTY"), None);
    }

    #[test]
    fn test_trimmed_code_must_keep_min_length() {
        assert_eq!(extract_confirmation_number("Reference ABCD1-"), None);
        assert_eq!(
            extract_confirmation_number("Reference ABCD12-"),
            Some("ABCD12".into())
        );
    }

    #[test]
    fn test_label_words_are_not_codes() {
        assert_eq!(extract_confirmation_number("APPLICATION RECEIVED"), None);
        assert_eq!(
            extract_confirmation_number("CONFIRMATION NUMBER: TKT-4471"),
            Some("TKT-4471".into())
        );
    }

    #[test]
    fn test_login_wall_is_blocked() {
        assert_eq!(
            classify("LinkedIn sign-in wall\nERROR: login required", ""),
            Outcome::Blocked {
                blocker: Blocker::LoginRequired,
                message: "login required".into(),
            }
        );
        assert_eq!(
            classify("LOGIN_REQUIRED: sign-in wall", "Sign in to continue"),
            Outcome::Blocked {
                blocker: Blocker::LoginRequired,
                message: "sign-in wall".into(),
            }
        );
    }

    #[test]
    fn test_rate_limit_and_network_markers() {
        assert_eq!(
            classify("RATE_LIMITED: 429 from careers site", ""),
            Outcome::Blocked {
                blocker: Blocker::RateLimited,
                message: "429 from careers site".into(),
            }
        );
        assert_eq!(
            classify("ERROR: Too many requests, try later", ""),
            Outcome::Blocked {
                blocker: Blocker::RateLimited,
                message: "Too many requests, try later".into(),
            }
        );
        assert_eq!(
            classify("NETWORK_ERROR:", ""),
            Outcome::Blocked {
                blocker: Blocker::NetworkError,
                message: "网络错误，页面无法加载".into(),
            }
        );
        assert_eq!(Blocker::NetworkError.status(), ApplicationStatus::NetworkError);
    }

    #[test]
    fn test_marker_priority() {
        // 验证码优先于阻断，阻断优先于普通错误
        assert_eq!(
            classify("LOGIN_REQUIRED: wall\nCAPTCHA_DETECTED: recaptcha", ""),
            Outcome::Captcha { kind: CaptchaKind::Recaptcha }
        );
        assert!(matches!(
            classify("ERROR: upload failed\nRATE_LIMITED: slow down", ""),
            Outcome::Blocked { blocker: Blocker::RateLimited, .. }
        ));
        assert_eq!(
            classify("SUCCESS: QX7781\nLOGIN_REQUIRED: later page", ""),
            success(Some("QX7781"), Evidence::AgentMarker)
        );
    }
}
