//! 能力提供者：Planner / Generator / Evaluator
//!
//! 引擎只依赖这三个 trait；LLM 实现负责拼提示词、提取 JSON 并校验为契约类型，
//! 测试中可换成脚本化的假实现。

pub mod contracts;
pub mod evaluator;
pub mod generator;
pub mod parse;
pub mod planner;
pub mod prompts;
pub mod summary;

use async_trait::async_trait;

pub use contracts::{
    EvaluationReport, EvaluationRequest, FilePreview, GeneratedFile, GeneratedFiles,
    GenerationRequest, GeneratorReply, ModificationContext, Plan, PlannedSubtask, ToolRequest,
};
pub use evaluator::LlmEvaluator;
pub use generator::LlmGenerator;
pub use planner::LlmPlanner;

use crate::core::AgentError;

/// 把需求拆成计划；结构不合法时返回 Schema 错误
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, requirement: &str) -> Result<Plan, AgentError>;

    /// 累计 token 使用 (prompt, completion, total)
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 为单个子任务生成 (路径, 内容) 列表
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<GeneratedFile>, AgentError>;

    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 评估一整轮的产出
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationReport, AgentError>;

    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
