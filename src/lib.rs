//! code-agent - 多阶段代码生成编排器
//!
//! 模块划分：
//! - **agents**: Planner / Generator / Evaluator 能力抽象、契约类型与 LLM 实现
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **observability**: 日志初始化
//! - **tools**: 工具注册与执行器、沙箱文件系统与工件存储、fetch_api_data
//! - **workflow**: 会话状态、路由、修复任务生成与工作流引擎

pub mod agents;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod tools;
pub mod workflow;

pub use workflow::{EngineBuilder, RunReport, WorkflowEngine};
