//! 编排层错误类型
//!
//! 所有能力提供者（Planner / Generator / Evaluator）、工件存储与工具调用都返回 AgentError；
//! WorkflowEngine 在阶段内部消化这些错误，只通过终态 outcome / summary 对外暴露。

use thiserror::Error;

/// 运行过程中可能出现的错误（结构校验、LLM、工具、路径逃逸等）
#[derive(Error, Debug)]
pub enum AgentError {
    /// 响应无法解析为预期的结构（JSON 格式错误或字段缺失）
    #[error("Schema error in {phase}: {detail}")]
    Schema { phase: &'static str, detail: String },

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Hallucinated tool: {0}")]
    HallucinatedTool(String),

    /// 生成阶段的工具调用轮数超过上限
    #[error("Tool loop exceeded after {0} rounds")]
    ToolLoopExceeded(usize),

    #[error("Invalid subtask transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Path escape attempt: {0}")]
    PathEscape(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    pub fn schema(phase: &'static str, detail: impl Into<String>) -> Self {
        Self::Schema {
            phase,
            detail: detail.into(),
        }
    }

    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_display() {
        let err = AgentError::schema("planning", "missing field `subtasks`");
        assert!(err.is_schema());
        assert_eq!(
            err.to_string(),
            "Schema error in planning: missing field `subtasks`"
        );
    }

    #[test]
    fn test_tool_loop_display() {
        let err = AgentError::ToolLoopExceeded(5);
        assert!(!err.is_schema());
        assert!(err.to_string().contains("5 rounds"));
    }
}
