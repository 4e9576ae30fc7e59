//! AI 代理能力边界
//!
//! 核心只负责把任务文本和浏览器会话交给代理，拿回执行记录；
//! 代理如何操作页面不在本系统内。

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;

use crate::infrastructure::session::BrowserSession;
use crate::services::model_provider::ModelHandle;

/// 简历上传允许的文件类型
pub const RESUME_EXTENSIONS: [&str; 4] = ["pdf", "doc", "docx", "txt"];

/// 交给代理的一次任务
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub task: String,
    pub available_files: Vec<PathBuf>,
    pub actions: ActionRegistry,
    pub model: ModelHandle,
}

/// 代理返回的执行记录
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentTranscript {
    /// 按时间顺序的记忆/动作记录
    pub history: Vec<String>,
    /// 代理最终给出的结论
    pub final_output: Option<String>,
}

impl AgentTranscript {
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            history: lines.into_iter().map(Into::into).collect(),
            final_output: None,
        }
    }

    pub fn with_final_output(mut self, output: impl Into<String>) -> Self {
        self.final_output = Some(output.into());
        self
    }

    /// 拼接成一段文本用于结果分类，最终结论放在最后
    pub fn text(&self) -> String {
        let mut parts: Vec<&str> = self.history.iter().map(String::as_str).collect();
        if let Some(output) = &self.final_output {
            parts.push(output);
        }
        parts.join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty() && self.final_output.is_none()
    }
}

/// 外部 AI 代理
#[async_trait]
pub trait AgentCapability: Send + Sync {
    async fn run(&self, request: AgentRequest, session: &mut dyn BrowserSession) -> Result<AgentTranscript>;
}

/// 代理可调用的扩展动作（声明式提示，具体实现由代理负责）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_extensions: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ActionRegistry {
    actions: Vec<ActionSpec>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self {
            actions: vec![
                ActionSpec {
                    name: "upload_file",
                    description: "Upload a local file to the file input element at the given index",
                    params: vec!["index", "file_path"],
                    allowed_extensions: RESUME_EXTENSIONS.to_vec(),
                },
                ActionSpec {
                    name: "detect_captcha",
                    description: "Detect whether the current page shows a captcha and report its type",
                    params: Vec::new(),
                    allowed_extensions: Vec::new(),
                },
                ActionSpec {
                    name: "extract_confirmation",
                    description: "Extract the confirmation number, email or URL after submission",
                    params: Vec::new(),
                    allowed_extensions: Vec::new(),
                },
            ],
        }
    }
}

impl ActionRegistry {
    pub fn actions(&self) -> &[ActionSpec] {
        &self.actions
    }

    pub fn get(&self, name: &str) -> Option<&ActionSpec> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.actions.iter().map(|a| a.name).collect()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "[]".to_string())
    }
}

/// 文件扩展名是否允许作为简历上传
pub fn is_uploadable(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| RESUME_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_transcript_text_puts_final_output_last() {
        let transcript = AgentTranscript::from_lines(["opened page", "filled form"])
            .with_final_output("SUCCESS: CONF123");
        assert_eq!(transcript.text(), "opened page\nfilled form\nSUCCESS: CONF123");
        assert!(!transcript.is_empty());
        assert!(AgentTranscript::default().is_empty());
    }

    #[test]
    fn test_default_registry() {
        let registry = ActionRegistry::default();
        assert_eq!(
            registry.names(),
            vec!["upload_file", "detect_captcha", "extract_confirmation"]
        );
        assert_eq!(registry.get("upload_file").unwrap().params, vec!["index", "file_path"]);

        let value: serde_json::Value = serde_json::from_str(&registry.to_json()).unwrap();
        assert_eq!(value[0]["allowed_extensions"][2], "docx");
        assert!(value[1].get("allowed_extensions").is_none());
    }

    #[test]
    fn test_uploadable_extensions() {
        assert!(is_uploadable(Path::new("/tmp/cv.PDF")));
        assert!(is_uploadable(Path::new("cv.docx")));
        assert!(!is_uploadable(Path::new("cv.exe")));
        assert!(!is_uploadable(Path::new("cv")));
    }
}
