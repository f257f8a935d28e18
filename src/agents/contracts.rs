//! 能力提供者的输入输出契约
//!
//! LLM 返回的 JSON 先反序列化为这里的类型再交给引擎；字段兼容 `architecture_plan` /
//! `technology_stack` / `files_to_create` / `dependencies` 等旧写法。

use std::collections::{BTreeMap, HashSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::workflow::types::{EvaluationResult, Subtask};

/// Planner 产出的子任务
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PlannedSubtask {
    /// 本次规划内唯一，如 task_1
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// 本任务要创建的文件（相对路径）
    #[serde(alias = "files_to_create")]
    pub target_paths: Vec<String>,
    /// 依赖的子任务 id
    #[serde(default, alias = "dependencies")]
    pub dependency_ids: Vec<String>,
}

/// Planner 的完整输出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Plan {
    /// 架构说明
    #[serde(alias = "architecture_plan")]
    pub plan: String,
    /// 技术选型，如 {"frontend": "HTML/CSS/JS"}
    #[serde(default, alias = "technology_stack")]
    pub technology_choices: BTreeMap<String, String>,
    pub subtasks: Vec<PlannedSubtask>,
}

impl Plan {
    /// 至少一个子任务、id 唯一、每个子任务至少一个目标文件
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.subtasks.is_empty() {
            return Err(AgentError::schema("planning", "plan contains no subtasks"));
        }
        let mut seen = HashSet::new();
        for task in &self.subtasks {
            if task.id.trim().is_empty() {
                return Err(AgentError::schema("planning", "subtask with empty id"));
            }
            if !seen.insert(task.id.as_str()) {
                return Err(AgentError::schema(
                    "planning",
                    format!("duplicate subtask id: {}", task.id),
                ));
            }
            if task.target_paths.iter().all(|p| p.trim().is_empty()) {
                return Err(AgentError::schema(
                    "planning",
                    format!("subtask {} has no target paths", task.id),
                ));
            }
        }
        Ok(())
    }

    /// 转换成首轮 Create 模式子任务，路径统一写法并去掉空路径
    pub fn to_subtasks(&self) -> Vec<Subtask> {
        self.subtasks
            .iter()
            .map(|t| {
                let paths = t
                    .target_paths
                    .iter()
                    .map(|p| crate::tools::normalize_path(p))
                    .filter(|p| !p.is_empty())
                    .collect();
                Subtask::create(
                    t.id.clone(),
                    t.title.clone(),
                    t.description.clone(),
                    paths,
                    t.dependency_ids.clone(),
                )
            })
            .collect()
    }
}

/// Generator 产出的单个文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

/// Generator 的最终回答
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedFiles {
    pub files: Vec<GeneratedFile>,
}

/// 生成过程中请求调用工具：{"tool": "fetch_api_data", "args": {...}}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ToolRequest {
    pub tool: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Generator 一轮回复：要么是最终文件列表，要么是一次工具调用
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum GeneratorReply {
    Files(GeneratedFiles),
    Tool(ToolRequest),
}

/// Evaluator 的完整输出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EvaluationReport {
    pub results: Vec<EvaluationResult>,
    #[serde(default)]
    pub overall_passed: bool,
    #[serde(default)]
    pub summary: String,
}

/// 修改模式的额外上下文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModificationContext {
    pub target_path: String,
    pub current_content: String,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    /// 除目标文件外其它工件的摘要
    pub sibling_summary: String,
}

/// 一次生成调用的输入
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub requirement: String,
    pub plan: String,
    pub technology_choices: BTreeMap<String, String>,
    pub subtask: Subtask,
    /// 1 起的序号与本轮总数
    pub position: (usize, usize),
    pub round_progress: String,
    pub prior_artifacts_summary: String,
    pub modification: Option<ModificationContext>,
}

/// 评估时单个文件的内容预览
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilePreview {
    pub path: String,
    pub preview: String,
}

/// 一次评估调用的输入
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub requirement: String,
    pub subtasks: Vec<Subtask>,
    pub artifact_paths: Vec<String>,
    pub previews: Vec<FilePreview>,
}
