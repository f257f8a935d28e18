//! 编排层：会话状态、路由、修复任务生成、事件日志与引擎

pub mod builder;
pub mod engine;
pub mod events;
pub mod fix;
pub mod routers;
pub mod state;
pub mod types;

pub use builder::EngineBuilder;
pub use engine::{OutstandingIssue, RunReport, UsageTotals, WorkflowEngine};
pub use events::{EventLog, WorkflowEvent};
pub use fix::{synthesize_fix_tasks, FixPlan};
pub use routers::{route_after_evaluation, route_after_generation, EvaluationRoute, GenerationRoute};
pub use state::SessionState;
pub use types::*;
