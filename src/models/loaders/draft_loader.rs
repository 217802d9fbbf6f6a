use crate::models::{FlowContext, MarkInput, SubmissionContext};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 待补交的页面草稿
///
/// 网络不可用时页面数据会落成 TOML 草稿，恢复后由补交程序逐个提交。
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDraft {
    pub batch_code: String,
    pub exam_no: String,
    #[serde(default)]
    pub flow: Option<FlowContext>,
    pub mark: MarkInput,
    #[serde(skip)]
    pub file_path: Option<PathBuf>,
}

impl PageDraft {
    pub fn context(&self) -> SubmissionContext {
        SubmissionContext::new(self.batch_code.clone(), self.exam_no.clone())
    }

    /// 用于日志显示的页面标识
    pub fn label(&self) -> String {
        match (&self.mark.page_number, &self.mark.page_desc) {
            (serde_json::Value::String(num), serde_json::Value::String(desc)) => {
                format!("{} {}", num, desc)
            }
            (num, _) => num.to_string(),
        }
    }
}

/// 从 TOML 文件加载草稿
pub async fn load_draft(toml_file_path: &Path) -> Result<PageDraft> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let mut draft: PageDraft = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    draft.file_path = Some(toml_file_path.to_path_buf());

    Ok(draft)
}

/// 加载目录下所有 TOML 草稿，按文件名排序
///
/// 单个文件解析失败只记录警告，不影响其余草稿
pub async fn load_all_drafts(folder_path: &str) -> Result<Vec<PageDraft>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut paths = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut drafts = Vec::new();
    for path in paths {
        match load_draft(&path).await {
            Ok(draft) => {
                tracing::info!("已加载草稿: {}", draft.label());
                drafts.push(draft);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {:#}", path.display(), e);
            }
        }
    }

    Ok(drafts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DRAFT: &str = r#"
batchCode = "B1"
examNo = "E1"

[flow]
flowId = "g7a-001"
submoduleId = "g7-experiment"
stepIndex = 0

[mark]
pageNumber = "3"
pageDesc = "材料阅读"
beginTime = "2024-01-01 09:59:00"
endTime = "2024-01-01 10:00:00"

[[mark.operationList]]
eventType = "click"
targetElement = "next"
time = "2024-01-01 10:00:00"
"#;

    #[tokio::test]
    async fn test_load_draft_from_toml() {
        let mut dir = std::env::temp_dir();
        dir.push(format!("assessment_runtime_drafts_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("001.toml"), DRAFT).unwrap();
        std::fs::write(dir.join("002.toml"), "not = [valid").unwrap();
        std::fs::write(dir.join("readme.txt"), "ignored").unwrap();

        let drafts = tokio_test::assert_ok!(load_all_drafts(dir.to_str().unwrap()).await);
        assert_eq!(drafts.len(), 1);

        let draft = &drafts[0];
        assert_eq!(draft.context(), SubmissionContext::new("B1", "E1"));
        assert_eq!(draft.flow.as_ref().and_then(|f| f.step_index), Some(0));
        assert_eq!(draft.mark.operation_list[0]["eventType"], "click");
        assert_eq!(draft.label(), "3 材料阅读");
        assert!(draft.file_path.is_some());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_missing_folder_is_error() {
        tokio_test::assert_err!(load_all_drafts("/definitely/not/here").await);
    }
}
