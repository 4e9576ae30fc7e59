use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::path::Path;

use crate::error::{AppError, AppResult};

/// 宿主传入的用户资料原始数据
///
/// 只做结构校验（serde），业务校验在 [`UserProfile::new`] 中完成
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserProfileData {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_local_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_letter: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years_experience: Option<i32>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_location: Option<String>,
    #[serde(default)]
    pub willing_to_relocate: bool,
    /// remote / hybrid / onsite
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_work_preference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_expectation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_authorization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_sponsorship: Option<bool>,

    #[serde(default)]
    pub custom_fields: serde_json::Map<String, serde_json::Value>,

    /// 桌面模式下本地浏览器配置目录（旧版数据文件放在用户资料里）
    #[serde(default, skip_serializing)]
    pub browser_profile_path: Option<String>,
}

/// 已校验的用户资料
///
/// 只能通过 [`UserProfile::new`] 构造，构造后不可变；字段通过 `Deref` 只读访问
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct UserProfile {
    data: UserProfileData,
}

impl UserProfile {
    /// 校验并创建用户资料
    pub fn new(data: UserProfileData) -> AppResult<Self> {
        validate_name("first_name", &data.first_name)?;
        validate_name("last_name", &data.last_name)?;
        validate_email(&data.email)?;
        validate_phone(&data.phone)?;

        if let Some(years) = data.years_experience {
            if !(0..=50).contains(&years) {
                return Err(AppError::validation(
                    "years_experience",
                    format!("工作年限必须在 0 到 50 之间，实际为 {}", years),
                ));
            }
        }

        Ok(Self { data })
    }

    /// 从 JSON 值创建（宿主桥接使用）
    pub fn from_value(value: serde_json::Value) -> AppResult<Self> {
        let data: UserProfileData = serde_json::from_value(value)?;
        Self::new(data)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.data.first_name, self.data.last_name)
    }

    /// 简历引用：本地文件存在时优先，否则使用 URL
    pub fn resume_reference(&self) -> Option<&str> {
        if let Some(local) = self.data.resume_local_path.as_deref() {
            if Path::new(local).exists() {
                return Some(local);
            }
        }
        self.data.resume_url.as_deref()
    }

    pub fn has_resume(&self) -> bool {
        self.resume_reference().is_some()
    }

    pub fn has_work_authorization_info(&self) -> bool {
        self.data.work_authorization.is_some() || self.data.require_sponsorship.is_some()
    }

    /// 电话中的数字个数
    pub fn phone_digits(&self) -> usize {
        count_digits(&self.data.phone)
    }

    pub fn data(&self) -> &UserProfileData {
        &self.data
    }
}

impl Deref for UserProfile {
    type Target = UserProfileData;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl TryFrom<UserProfileData> for UserProfile {
    type Error = AppError;

    fn try_from(data: UserProfileData) -> AppResult<Self> {
        Self::new(data)
    }
}

fn count_digits(s: &str) -> usize {
    s.chars().filter(|c| c.is_ascii_digit()).count()
}

fn validate_name(field: &'static str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(field, "不能为空"));
    }
    Ok(())
}

fn validate_phone(phone: &str) -> AppResult<()> {
    if phone.trim().is_empty() {
        return Err(AppError::validation("phone", "电话号码不能为空"));
    }
    let digits = count_digits(phone);
    if digits < 10 {
        return Err(AppError::validation(
            "phone",
            format!("电话号码至少需要 10 位数字，实际只有 {} 位", digits),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> AppResult<()> {
    let invalid = |reason: &str| -> AppResult<()> {
        Err(AppError::validation("email", format!("{}: {}", reason, email)))
    };

    if email.chars().any(char::is_whitespace) {
        return invalid("邮箱不能包含空白字符");
    }
    let mut parts = email.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return invalid("邮箱必须包含且只包含一个 @"),
    };
    if local.is_empty() {
        return invalid("邮箱用户名部分为空");
    }
    if !domain.contains('.') || domain.split('.').any(str::is_empty) {
        return invalid("邮箱域名不合法");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn valid_data() -> UserProfileData {
        UserProfileData {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            phone: "+1 (555) 123-4567".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_profile() {
        let profile = UserProfile::new(valid_data()).unwrap();
        assert_eq!(profile.full_name(), "Ada Lovelace");
        assert_eq!(profile.phone_digits(), 11);
        assert!(!profile.has_resume());
    }

    #[test]
    fn test_short_phone_rejected() {
        let mut data = valid_data();
        data.phone = "555-1234".into();
        let err = UserProfile::new(data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert!(matches!(err, AppError::Validation { field: "phone", .. }));
    }

    #[test]
    fn test_bad_email_rejected() {
        for email in ["ada.example.com", "@example.com", "ada@example", "a b@example.com", "a@b@c.com", "ada@example..com"] {
            let mut data = valid_data();
            data.email = email.into();
            assert!(UserProfile::new(data).is_err(), "应拒绝邮箱 {}", email);
        }
    }

    #[test]
    fn test_experience_out_of_range() {
        let mut data = valid_data();
        data.years_experience = Some(51);
        assert!(UserProfile::new(data).is_err());

        let mut data = valid_data();
        data.years_experience = Some(-1);
        assert!(UserProfile::new(data).is_err());

        let mut data = valid_data();
        data.years_experience = Some(50);
        assert!(UserProfile::new(data).is_ok());
    }

    #[test]
    fn test_resume_prefers_existing_local_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let local = file.path().to_string_lossy().to_string();

        let mut data = valid_data();
        data.resume_local_path = Some(local.clone());
        data.resume_url = Some("https://cdn.example.com/cv.pdf".into());
        let profile = UserProfile::new(data).unwrap();
        assert_eq!(profile.resume_reference(), Some(local.as_str()));
    }

    #[test]
    fn test_resume_falls_back_to_url() {
        let mut data = valid_data();
        data.resume_local_path = Some("/definitely/not/here/cv.pdf".into());
        data.resume_url = Some("https://cdn.example.com/cv.pdf".into());
        let profile = UserProfile::new(data).unwrap();
        assert_eq!(profile.resume_reference(), Some("https://cdn.example.com/cv.pdf"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let value = serde_json::json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email": "ada@example.com",
            "phone": "5551234567",
            "favourite_colour": "green"
        });
        assert!(UserProfile::from_value(value).is_err());
    }
}
