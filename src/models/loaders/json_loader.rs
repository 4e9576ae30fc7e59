use crate::error::AppResult;
use crate::models::payload::AutomationPayload;
use std::path::Path;
use tokio::fs;

/// 从宿主写入的数据文件读取载荷
pub async fn load_payload_file(path: &Path) -> AppResult<AutomationPayload> {
    tracing::info!("📄 从数据文件读取载荷: {}", path.display());
    let content = fs::read_to_string(path).await?;
    AutomationPayload::from_json(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Write;

    #[tokio::test]
    async fn test_load_payload_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "user_profile": {{
                    "first_name": "Ada", "last_name": "Lovelace",
                    "email": "ada@example.com", "phone": "555 123 4567",
                    "browser_profile_path": "/tmp/profile"
                }},
                "job_data": {{
                    "job_id": "7", "title": "Engineer", "company": "Acme",
                    "apply_url": "https://www.linkedin.com/jobs/view/7"
                }},
                "proxy_config": {{"host": "p.io", "port": 8080, "type": "http"}}
            }}"#
        )
        .unwrap();

        let payload = load_payload_file(file.path()).await.unwrap();
        assert_eq!(payload.user_profile.browser_profile_path.as_deref(), Some("/tmp/profile"));
        assert_eq!(payload.proxy_config.unwrap().port, 8080);
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"user_profile": {{}}}}"#).unwrap();
        let err = load_payload_file(file.path()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }
}
