use phf::phf_ordered_map;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

use crate::error::{AppError, AppResult};

/// 招聘系统（ATS）类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtsKind {
    Greenhouse,
    Lever,
    Workday,
    Linkedin,
    Indeed,
    Jobvite,
    Generic,
}

/// 域名子串 → ATS，按声明顺序匹配，先匹配者胜出
static ATS_DOMAINS: phf::OrderedMap<&'static str, AtsKind> = phf_ordered_map! {
    "greenhouse.io" => AtsKind::Greenhouse,
    "lever.co" => AtsKind::Lever,
    "workday" => AtsKind::Workday,
    "linkedin.com" => AtsKind::Linkedin,
    "indeed.com" => AtsKind::Indeed,
    "jobvite.com" => AtsKind::Jobvite,
};

impl AtsKind {
    /// 从 URL 识别 ATS 类型，未知时返回 `Generic`
    pub fn detect(url: &str) -> Self {
        let url_lower = url.to_lowercase();
        ATS_DOMAINS
            .entries()
            .find(|(domain, _)| url_lower.contains(*domain))
            .map(|(_, kind)| *kind)
            .unwrap_or(AtsKind::Generic)
    }

    /// 解析显式指定的 ATS 名称
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "greenhouse" => Some(AtsKind::Greenhouse),
            "lever" => Some(AtsKind::Lever),
            "workday" => Some(AtsKind::Workday),
            "linkedin" => Some(AtsKind::Linkedin),
            "indeed" => Some(AtsKind::Indeed),
            "jobvite" => Some(AtsKind::Jobvite),
            "generic" => Some(AtsKind::Generic),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AtsKind::Greenhouse => "greenhouse",
            AtsKind::Lever => "lever",
            AtsKind::Workday => "workday",
            AtsKind::Linkedin => "linkedin",
            AtsKind::Indeed => "indeed",
            AtsKind::Jobvite => "jobvite",
            AtsKind::Generic => "generic",
        }
    }
}

impl fmt::Display for AtsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 宿主传入的职位原始数据
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobData {
    pub job_id: String,
    pub title: String,
    pub company: String,
    pub apply_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_range: Option<String>,
    /// full-time / part-time / contract / internship
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_option: Option<String>,
    /// 显式指定的 ATS，优先于 URL 识别
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_board: Option<String>,

    #[serde(default)]
    pub custom_fields: serde_json::Map<String, serde_json::Value>,
}

/// 已校验的职位描述，构造时计算 ATS 类型
#[derive(Debug, Clone, Serialize)]
pub struct JobDescriptor {
    #[serde(flatten)]
    data: JobData,
    ats: AtsKind,
}

impl JobDescriptor {
    pub fn new(data: JobData) -> AppResult<Self> {
        if data.job_id.trim().is_empty() {
            return Err(AppError::validation("job_id", "不能为空"));
        }
        if !(data.apply_url.starts_with("http://") || data.apply_url.starts_with("https://")) {
            return Err(AppError::validation(
                "apply_url",
                format!("必须是 http/https 地址: {}", data.apply_url),
            ));
        }

        let ats = match data.job_board.as_deref() {
            Some(board) => AtsKind::parse(board).unwrap_or_else(|| {
                tracing::warn!("未知的 job_board '{}'，按通用 ATS 处理", board);
                AtsKind::Generic
            }),
            None => AtsKind::detect(&data.apply_url),
        };

        Ok(Self { data, ats })
    }

    pub fn from_value(value: serde_json::Value) -> AppResult<Self> {
        let data: JobData = serde_json::from_value(value)?;
        Self::new(data)
    }

    pub fn ats(&self) -> AtsKind {
        self.ats
    }

    pub fn data(&self) -> &JobData {
        &self.data
    }
}

impl Deref for JobDescriptor {
    type Target = JobData;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl TryFrom<JobData> for JobDescriptor {
    type Error = AppError;

    fn try_from(data: JobData) -> AppResult<Self> {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(url: &str) -> JobData {
        JobData {
            job_id: "j-1".into(),
            title: "Engineer".into(),
            company: "Acme".into(),
            apply_url: url.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_detect_known_boards() {
        assert_eq!(
            AtsKind::detect("https://job-boards.greenhouse.io/acme/jobs/1"),
            AtsKind::Greenhouse
        );
        assert_eq!(
            AtsKind::detect("https://www.linkedin.com/jobs/view/55"),
            AtsKind::Linkedin
        );
        assert_eq!(AtsKind::detect("https://jobs.lever.co/acme/1"), AtsKind::Lever);
        assert_eq!(
            AtsKind::detect("https://acme.wd5.myworkdayjobs.com/x"),
            AtsKind::Workday
        );
        assert_eq!(AtsKind::detect("https://careers.acme.com/apply/1"), AtsKind::Generic);
    }

    #[test]
    fn test_detect_first_match_wins() {
        // greenhouse 在表中排在 linkedin 之前
        let url = "https://boards.greenhouse.io/acme?src=linkedin.com";
        assert_eq!(AtsKind::detect(url), AtsKind::Greenhouse);
    }

    #[test]
    fn test_detect_is_case_insensitive() {
        assert_eq!(
            AtsKind::detect("HTTPS://WWW.LINKEDIN.COM/JOBS/VIEW/1"),
            AtsKind::Linkedin
        );
    }

    #[test]
    fn test_job_board_override() {
        let mut data = job("https://careers.acme.com/apply/1");
        data.job_board = Some("Lever".into());
        let descriptor = JobDescriptor::new(data).unwrap();
        assert_eq!(descriptor.ats(), AtsKind::Lever);

        let mut data = job("https://boards.greenhouse.io/acme/1");
        data.job_board = Some("something-else".into());
        assert_eq!(JobDescriptor::new(data).unwrap().ats(), AtsKind::Generic);
    }

    #[test]
    fn test_non_http_url_rejected() {
        let err = JobDescriptor::new(job("ftp://acme.com/jobs")).unwrap_err();
        assert!(matches!(err, AppError::Validation { field: "apply_url", .. }));
    }
}
