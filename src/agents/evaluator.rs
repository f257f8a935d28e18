//! LlmEvaluator：一次性评估本轮全部子任务与工件

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::agents::contracts::{EvaluationReport, EvaluationRequest};
use crate::agents::parse::parse_structured;
use crate::agents::prompts::{evaluation_schema, render, EVALUATION_PROMPT, EVALUATOR_SYSTEM};
use crate::agents::Evaluator;
use crate::core::AgentError;
use crate::llm::{LlmClient, Message};

pub struct LlmEvaluator {
    llm: Arc<dyn LlmClient>,
}

impl LlmEvaluator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn build_prompt(request: &EvaluationRequest) -> String {
        let subtasks: Vec<_> = request
            .subtasks
            .iter()
            .map(|t| {
                json!({
                    "id": t.id,
                    "title": t.title,
                    "status": t.status,
                    "files": t.target_paths,
                })
            })
            .collect();
        let contents: serde_json::Map<String, serde_json::Value> = request
            .previews
            .iter()
            .map(|p| (p.path.clone(), serde_json::Value::String(p.preview.clone())))
            .collect();

        let pretty = |v: &serde_json::Value| serde_json::to_string_pretty(v).unwrap_or_default();
        render(
            EVALUATION_PROMPT,
            &[
                ("requirement", &request.requirement),
                ("subtasks", &pretty(&json!(subtasks))),
                ("files", &pretty(&json!(request.artifact_paths))),
                ("contents", &pretty(&serde_json::Value::Object(contents))),
                ("schema", &evaluation_schema()),
            ],
        )
    }
}

#[async_trait]
impl Evaluator for LlmEvaluator {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationReport, AgentError> {
        let messages = [
            Message::system(EVALUATOR_SYSTEM),
            Message::user(Self::build_prompt(request)),
        ];
        let raw = self.llm.complete(&messages).await.map_err(AgentError::LlmError)?;
        tracing::debug!(chars = raw.len(), "evaluator response received");

        let report: EvaluationReport = parse_structured("evaluation", &raw)?;
        let issues: usize = report.results.iter().map(|r| r.issues.len()).sum();
        tracing::info!(
            overall_passed = report.overall_passed,
            results = report.results.len(),
            issues,
            "evaluation parsed"
        );
        Ok(report)
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::contracts::FilePreview;
    use crate::llm::MockLlmClient;
    use crate::workflow::types::Subtask;

    fn request() -> EvaluationRequest {
        EvaluationRequest {
            requirement: "counter page".into(),
            subtasks: vec![Subtask::create(
                "task_1",
                "Page",
                "Build",
                vec!["index.html".into()],
                vec![],
            )],
            artifact_paths: vec!["index.html".into()],
            previews: vec![FilePreview {
                path: "index.html".into(),
                preview: "<html></html>".into(),
            }],
        }
    }

    #[tokio::test]
    async fn test_evaluate_parses_report() {
        let llm = Arc::new(MockLlmClient::new([r#"Result:
```json
{"results": [{"task_id": "task_1", "passed": false, "issues": ["no script"], "suggestions": []}],
 "overall_passed": false, "summary": "needs work"}
```"#]));
        let evaluator = LlmEvaluator::new(llm.clone());

        let report = evaluator.evaluate(&request()).await.unwrap();
        assert!(!report.overall_passed);
        assert_eq!(report.results[0].issues, vec!["no script"]);
        assert_eq!(report.summary, "needs work");

        let prompt = &llm.requests()[0][1].content;
        assert!(prompt.contains("\"task_1\""));
        assert!(prompt.contains("<html></html>"));
        assert!(prompt.contains("\"pending\""));
    }

    #[tokio::test]
    async fn test_malformed_report_is_schema_error() {
        let llm = Arc::new(MockLlmClient::new([r#"{"verdict": "ok"}"#]));
        let evaluator = LlmEvaluator::new(llm);
        assert!(evaluator.evaluate(&request()).await.unwrap_err().is_schema());
    }
}
