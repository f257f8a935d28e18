//! 引擎构建器
//!
//! 手动装配（测试中注入假实现）或 from_config 按配置装配：每个角色一个 LLM 客户端、
//! 工作目录作为工件存储、生成阶段注册 fetch_api_data 与 read_file 两个工具。

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::agents::{Evaluator, Generator, LlmEvaluator, LlmGenerator, LlmPlanner, Planner};
use crate::config::AppConfig;
use crate::core::AgentError;
use crate::llm::create_client;
use crate::tools::{
    ArtifactStore, FetchTool, ReadFileTool, ToolExecutor, ToolRegistry, WorkspaceStore,
};
use crate::workflow::engine::WorkflowEngine;
use crate::workflow::events::WorkflowEvent;

/// 工作流引擎构建器
pub struct EngineBuilder {
    planner: Option<Arc<dyn Planner>>,
    generator: Option<Arc<dyn Generator>>,
    evaluator: Option<Arc<dyn Evaluator>>,
    store: Option<Arc<dyn ArtifactStore>>,
    max_iterations: u32,
    preview_lines: usize,
    event_log_capacity: usize,
    event_tx: Option<mpsc::UnboundedSender<WorkflowEvent>>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            planner: None,
            generator: None,
            evaluator: None,
            store: None,
            max_iterations: 3,
            preview_lines: 100,
            event_log_capacity: 256,
            event_tx: None,
        }
    }

    /// 按配置装配全部组件
    pub fn from_config(config: &AppConfig) -> Result<Self, AgentError> {
        let workspace = config.workspace_root();
        let store = WorkspaceStore::new(&workspace)?;
        tracing::info!(workspace = %workspace.display(), "workspace ready");

        let planner_llm = create_client(&config.llm, config.llm.planner_model())?;
        let coder_llm = create_client(&config.llm, config.llm.coder_model())?;
        let evaluator_llm = create_client(&config.llm, config.llm.evaluator_model())?;

        let mut tools = ToolRegistry::new();
        tools.register(FetchTool::new(&config.tools.fetch));
        tools.register(ReadFileTool::new(store.fs().clone()));
        let executor = Arc::new(ToolExecutor::new(tools, config.tools.tool_timeout_secs));

        Ok(Self::new()
            .with_planner(Arc::new(LlmPlanner::new(planner_llm)))
            .with_generator(Arc::new(
                LlmGenerator::new(coder_llm).with_tools(executor, config.tools.max_tool_rounds),
            ))
            .with_evaluator(Arc::new(LlmEvaluator::new(evaluator_llm)))
            .with_store(Arc::new(store))
            .with_max_iterations(config.app.max_iterations)
            .with_preview_lines(config.app.preview_lines)
            .with_event_log_capacity(config.app.event_log_capacity))
    }

    pub fn with_planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.planner = Some(planner);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// 评估时每个文件的预览行数
    pub fn with_preview_lines(mut self, lines: usize) -> Self {
        self.preview_lines = lines;
        self
    }

    pub fn with_event_log_capacity(mut self, capacity: usize) -> Self {
        self.event_log_capacity = capacity;
        self
    }

    /// 运行过程中把事件实时发送到该通道
    pub fn with_event_sender(mut self, tx: mpsc::UnboundedSender<WorkflowEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// 构建引擎；缺少任一组件或参数非法时返回 ConfigError
    pub fn build(self) -> Result<WorkflowEngine, AgentError> {
        let missing = |name: &str| AgentError::ConfigError(format!("engine is missing a {}", name));

        if self.preview_lines == 0 {
            return Err(AgentError::ConfigError("preview_lines must be positive".into()));
        }
        if self.event_log_capacity == 0 {
            return Err(AgentError::ConfigError(
                "event_log_capacity must be positive".into(),
            ));
        }

        Ok(WorkflowEngine {
            planner: self.planner.ok_or_else(|| missing("planner"))?,
            generator: self.generator.ok_or_else(|| missing("generator"))?,
            evaluator: self.evaluator.ok_or_else(|| missing("evaluator"))?,
            store: self.store.ok_or_else(|| missing("artifact store"))?,
            max_iterations: self.max_iterations,
            preview_lines: self.preview_lines,
            event_log_capacity: self.event_log_capacity,
            event_tx: self.event_tx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_components() {
        let err = EngineBuilder::new().build().err().map(|e| e.to_string());
        assert_eq!(
            err.as_deref(),
            Some("Config error: engine is missing a planner")
        );
    }

    #[test]
    fn test_from_config_wires_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.app.workspace_root = Some(dir.path().join("out"));
        config.app.max_iterations = 2;

        let engine = EngineBuilder::from_config(&config).unwrap().build().unwrap();
        assert_eq!(engine.max_iterations(), 2);
        assert!(dir.path().join("out").is_dir());
    }

    #[test]
    fn test_zero_preview_lines_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.app.workspace_root = Some(dir.path().to_path_buf());
        let result = EngineBuilder::from_config(&config)
            .unwrap()
            .with_preview_lines(0)
            .build();
        assert!(matches!(result, Err(AgentError::ConfigError(_))));
    }
}
