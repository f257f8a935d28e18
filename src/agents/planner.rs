//! LlmPlanner：把需求交给 LLM 拆成子任务计划

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::contracts::Plan;
use crate::agents::parse::parse_structured;
use crate::agents::prompts::{plan_schema, render, PLANNER_SYSTEM, PLANNING_PROMPT};
use crate::agents::Planner;
use crate::core::AgentError;
use crate::llm::{LlmClient, Message};

pub struct LlmPlanner {
    llm: Arc<dyn LlmClient>,
}

impl LlmPlanner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn plan(&self, requirement: &str) -> Result<Plan, AgentError> {
        let schema = plan_schema();
        let prompt = render(
            PLANNING_PROMPT,
            &[("requirement", requirement), ("schema", schema.as_str())],
        );
        let messages = [Message::system(PLANNER_SYSTEM), Message::user(prompt)];

        tracing::debug!(chars = messages[1].content.len(), "planner prompt built");
        let raw = self.llm.complete(&messages).await.map_err(AgentError::LlmError)?;
        tracing::debug!(chars = raw.len(), "planner response received");

        let plan: Plan = parse_structured("planning", &raw)?;
        plan.validate()?;
        tracing::info!(subtasks = plan.subtasks.len(), "plan parsed");
        Ok(plan)
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[tokio::test]
    async fn test_plan_from_fenced_reply() {
        let reply = r#"```json
{"plan": "single page", "technology_choices": {"frontend": "HTML"},
 "subtasks": [{"id": "task_1", "title": "Page", "description": "d", "target_paths": ["index.html"]}]}
```"#;
        let llm = Arc::new(MockLlmClient::new([reply]));
        let planner = LlmPlanner::new(llm.clone());

        let plan = planner.plan("a todo app").await.unwrap();
        assert_eq!(plan.subtasks[0].id, "task_1");

        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0][1].content.contains("a todo app"));
    }

    #[tokio::test]
    async fn test_malformed_plan_is_schema_error() {
        let llm = Arc::new(MockLlmClient::new(["I cannot help with that"]));
        let planner = LlmPlanner::new(llm);
        let err = planner.plan("x").await.unwrap_err();
        assert!(err.is_schema());
    }

    #[tokio::test]
    async fn test_provider_error_is_llm_error() {
        let llm = Arc::new(MockLlmClient::new(Vec::<String>::new()));
        let planner = LlmPlanner::new(llm);
        assert!(matches!(
            planner.plan("x").await,
            Err(AgentError::LlmError(_))
        ));
    }
}
