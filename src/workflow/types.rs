//! 工作流类型定义
//!
//! 子任务（含生命周期）、生成的工件、评估结果、终态与引擎阶段

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::core::AgentError;

pub type TaskId = String;

/// 子任务状态：每轮只允许 Pending → Completed 或 Pending → Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    Pending,
    Completed,
    Failed,
}

impl SubtaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubtaskStatus::Pending => "pending",
            SubtaskStatus::Completed => "completed",
            SubtaskStatus::Failed => "failed",
        }
    }

    pub fn can_transition(&self, to: SubtaskStatus) -> bool {
        matches!(
            (self, to),
            (SubtaskStatus::Pending, SubtaskStatus::Completed)
                | (SubtaskStatus::Pending, SubtaskStatus::Failed)
        )
    }
}

impl fmt::Display for SubtaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 子任务模式：规划产生的新建任务，或修复阶段产生的单文件修改任务
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SubtaskMode {
    Create,
    Modify {
        target_path: String,
        issues: Vec<String>,
        suggestions: Vec<String>,
    },
}

/// 子任务
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    /// 本任务负责的文件（去重，保持声明顺序）
    pub target_paths: Vec<String>,
    /// 声明的依赖，仅供生成器参考，引擎不强制
    pub dependency_ids: Vec<TaskId>,
    pub status: SubtaskStatus,
    pub mode: SubtaskMode,
    /// 失败原因（仅 Failed 时存在）
    pub error: Option<String>,
}

impl Subtask {
    /// 新建模式子任务（来自 Planner）
    pub fn create(
        id: impl Into<TaskId>,
        title: impl Into<String>,
        description: impl Into<String>,
        target_paths: Vec<String>,
        dependency_ids: Vec<TaskId>,
    ) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(target_paths.len());
        for path in target_paths {
            if !unique.contains(&path) {
                unique.push(path);
            }
        }
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            target_paths: unique,
            dependency_ids,
            status: SubtaskStatus::Pending,
            mode: SubtaskMode::Create,
            error: None,
        }
    }

    /// 修改模式子任务（来自修复阶段），目标只有一个文件
    pub fn modify(
        id: impl Into<TaskId>,
        target_path: impl Into<String>,
        issues: Vec<String>,
        suggestions: Vec<String>,
    ) -> Self {
        let target_path = target_path.into();
        Self {
            id: id.into(),
            title: format!("Fix {}", target_path),
            description: format!("Modify {} according to evaluation feedback", target_path),
            target_paths: vec![target_path.clone()],
            dependency_ids: Vec::new(),
            status: SubtaskStatus::Pending,
            mode: SubtaskMode::Modify {
                target_path,
                issues,
                suggestions,
            },
            error: None,
        }
    }

    pub fn is_modification(&self) -> bool {
        matches!(self.mode, SubtaskMode::Modify { .. })
    }

    /// 修改模式下的目标文件
    pub fn target_path(&self) -> Option<&str> {
        match &self.mode {
            SubtaskMode::Modify { target_path, .. } => Some(target_path),
            SubtaskMode::Create => None,
        }
    }

    pub fn targets(&self, path: &str) -> bool {
        self.target_paths.iter().any(|p| p == path)
    }

    pub fn complete(&mut self) -> Result<(), AgentError> {
        self.transition(SubtaskStatus::Completed)
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), AgentError> {
        self.transition(SubtaskStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }

    fn transition(&mut self, to: SubtaskStatus) -> Result<(), AgentError> {
        if !self.status.can_transition(to) {
            return Err(AgentError::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }
}

/// 由文件后缀推导工件类型，无后缀时为 txt
pub fn artifact_kind(path: &str) -> String {
    std::path::Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_else(|| "txt".to_string())
}

/// 已持久化的生成文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: String,
    pub content: String,
    pub kind: String,
    pub timestamp: DateTime<Utc>,
}

impl Artifact {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            kind: artifact_kind(&path),
            path,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.content.lines().count()
    }
}

/// 单个子任务的评估结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EvaluationResult {
    /// 必须对应本轮子任务的 id
    pub task_id: TaskId,
    pub passed: bool,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// 运行终态，只设置一次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Undetermined,
    Success,
    Failure,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// 引擎状态机的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Planning,
    Generating,
    Evaluating,
    Fixing,
    Done,
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowPhase::Planning => "planning",
            WorkflowPhase::Generating => "generating",
            WorkflowPhase::Evaluating => "evaluating",
            WorkflowPhase::Fixing => "fixing",
            WorkflowPhase::Done => "done",
        };
        f.write_str(name)
    }
}
