//! LlmGenerator：为单个子任务生成文件内容
//!
//! 新建模式使用完整上下文（计划、技术选型、进度、已有文件摘要），修改模式只给目标文件与问题列表。
//! 配置了工具时进入有界的工具循环：LLM 回复 {"tool", "args"} 则执行工具并把结果作为观察发回，
//! 回复 {"files": [...]} 即结束；超过 max_tool_rounds 返回 ToolLoopExceeded。
//! 未配置工具时收到工具请求直接返回 HallucinatedTool。

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::contracts::{GeneratedFile, GenerationRequest, GeneratorReply};
use crate::agents::parse::parse_structured;
use crate::agents::prompts::{
    files_schema, render, tool_call_schema, CODER_SYSTEM, CODING_PROMPT, MODIFICATION_PROMPT,
    TOOLS_SECTION,
};
use crate::agents::Generator;
use crate::core::AgentError;
use crate::llm::{LlmClient, Message};
use crate::tools::ToolExecutor;

/// 工具结果回传给 LLM 时的最大字符数
const OBSERVATION_MAX_CHARS: usize = 8000;

pub struct LlmGenerator {
    llm: Arc<dyn LlmClient>,
    tools: Option<Arc<ToolExecutor>>,
    max_tool_rounds: usize,
}

impl LlmGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            tools: None,
            max_tool_rounds: 0,
        }
    }

    /// 启用工具循环
    pub fn with_tools(mut self, executor: Arc<ToolExecutor>, max_tool_rounds: usize) -> Self {
        self.tools = Some(executor);
        self.max_tool_rounds = max_tool_rounds;
        self
    }

    fn tools_section(&self) -> String {
        match &self.tools {
            Some(executor) if !executor.registry().is_empty() => render(
                TOOLS_SECTION,
                &[
                    ("tools", &executor.registry().describe()),
                    ("schema", &tool_call_schema()),
                ],
            ),
            _ => String::new(),
        }
    }

    fn build_prompt(&self, request: &GenerationRequest) -> String {
        let tools = self.tools_section();
        let schema = files_schema();

        if let Some(modification) = &request.modification {
            return render(
                MODIFICATION_PROMPT,
                &[
                    ("requirement", &request.requirement),
                    ("plan", &request.plan),
                    ("target_path", &modification.target_path),
                    ("current_content", &modification.current_content),
                    ("issues", &modification.issues.join("\n")),
                    ("suggestions", &modification.suggestions.join("\n")),
                    ("other_files", &modification.sibling_summary),
                    ("tools", &tools),
                    ("schema", &schema),
                ],
            );
        }

        let technology_choices =
            serde_json::to_string_pretty(&request.technology_choices).unwrap_or_default();
        let (index, total) = request.position;
        render(
            CODING_PROMPT,
            &[
                ("requirement", &request.requirement),
                ("plan", &request.plan),
                ("technology_choices", &technology_choices),
                ("progress", &request.round_progress),
                ("index", &index.to_string()),
                ("total", &total.to_string()),
                ("title", &request.subtask.title),
                ("description", &request.subtask.description),
                ("target_paths", &request.subtask.target_paths.join(", ")),
                ("existing_files", &request.prior_artifacts_summary),
                ("tools", &tools),
                ("schema", &schema),
            ],
        )
    }

    fn tools_enabled(&self) -> bool {
        self.tools
            .as_ref()
            .is_some_and(|executor| !executor.registry().is_empty())
    }

    async fn observe(&self, tool: &str, args: serde_json::Value) -> String {
        let Some(executor) = &self.tools else {
            return format!("Error: tools are not available (requested {})", tool);
        };
        match executor.execute(tool, args).await {
            Ok(output) => {
                if output.chars().count() > OBSERVATION_MAX_CHARS {
                    let head: String = output.chars().take(OBSERVATION_MAX_CHARS).collect();
                    format!("{}\n...[truncated]", head)
                } else {
                    output
                }
            }
            Err(e) => format!("Error: {}", e),
        }
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<GeneratedFile>, AgentError> {
        let task_id = request.subtask.id.as_str();
        let mut messages = vec![
            Message::system(CODER_SYSTEM),
            Message::user(self.build_prompt(request)),
        ];
        let mut tool_rounds = 0usize;

        loop {
            let raw = self.llm.complete(&messages).await.map_err(AgentError::LlmError)?;
            tracing::debug!(task_id, chars = raw.len(), "generator response received");

            match parse_structured::<GeneratorReply>("generation", &raw)? {
                GeneratorReply::Files(files) => {
                    tracing::info!(task_id, files = files.files.len(), tool_rounds, "generation finished");
                    return Ok(files.files);
                }
                GeneratorReply::Tool(call) => {
                    if !self.tools_enabled() {
                        tracing::warn!(task_id, tool = %call.tool, "tool requested but no tools are configured");
                        return Err(AgentError::HallucinatedTool(call.tool));
                    }
                    tool_rounds += 1;
                    if tool_rounds > self.max_tool_rounds {
                        tracing::warn!(task_id, tool_rounds, "tool loop exceeded");
                        return Err(AgentError::ToolLoopExceeded(self.max_tool_rounds));
                    }
                    tracing::info!(task_id, tool = %call.tool, round = tool_rounds, "generator tool call");
                    let observation = self.observe(&call.tool, call.args).await;
                    messages.push(Message::assistant(raw));
                    messages.push(Message::user(format!(
                        "Tool result ({}):\n{}\n\nContinue. Reply with another tool call or the final files JSON.",
                        call.tool, observation
                    )));
                }
            }
        }
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::contracts::ModificationContext;
    use crate::llm::MockLlmClient;
    use crate::tools::{Tool, ToolRegistry};
    use crate::workflow::types::Subtask;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;

    struct StaticDataTool;

    #[async_trait]
    impl Tool for StaticDataTool {
        fn name(&self) -> &str {
            "fetch_api_data"
        }
        fn description(&self) -> &str {
            "returns fixed data"
        }
        async fn execute(&self, _args: Value) -> Result<String, String> {
            Ok(json!({"success": true, "data": [1, 2, 3]}).to_string())
        }
    }

    fn request(subtask: Subtask, modification: Option<ModificationContext>) -> GenerationRequest {
        GenerationRequest {
            requirement: "show numbers".into(),
            plan: "one page".into(),
            technology_choices: BTreeMap::new(),
            subtask,
            position: (1, 1),
            round_progress: "1. [→] Page".into(),
            prior_artifacts_summary: "None".into(),
            modification,
        }
    }

    fn executor() -> Arc<ToolExecutor> {
        let mut registry = ToolRegistry::new();
        registry.register(StaticDataTool);
        Arc::new(ToolExecutor::new(registry, 5))
    }

    #[tokio::test]
    async fn test_generate_files_directly() {
        let llm = Arc::new(MockLlmClient::new([
            r#"{"files": [{"path": "index.html", "content": "<html></html>"}]}"#,
        ]));
        let generator = LlmGenerator::new(llm.clone());
        let subtask = Subtask::create("task_1", "Page", "Build", vec!["index.html".into()], vec![]);

        let files = generator.generate(&request(subtask, None)).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "index.html");
        let prompt = &llm.requests()[0][1].content;
        assert!(prompt.contains("Files to create: index.html"));
        assert!(!prompt.contains("Available tools"));
    }

    #[tokio::test]
    async fn test_tool_round_then_files() {
        let llm = Arc::new(MockLlmClient::new([
            r#"{"tool": "fetch_api_data", "args": {"url": "https://api.example.com"}}"#,
            r#"```json
{"files": [{"path": "app.js", "content": "const DATA = [1,2,3];"}]}
```"#,
        ]));
        let generator = LlmGenerator::new(llm.clone()).with_tools(executor(), 3);
        let subtask = Subtask::create("task_1", "Logic", "Build", vec!["app.js".into()], vec![]);

        let files = generator.generate(&request(subtask, None)).await.unwrap();
        assert_eq!(files[0].path, "app.js");

        let requests = llm.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0][1].content.contains("Available tools"));
        let observation = &requests[1][3].content;
        assert!(observation.starts_with("Tool result (fetch_api_data)"));
        assert!(observation.contains("\"data\":[1,2,3]"));
    }

    #[tokio::test]
    async fn test_tool_loop_is_bounded() {
        let call = r#"{"tool": "fetch_api_data", "args": {}}"#;
        let llm = Arc::new(MockLlmClient::new([call, call, call]));
        let generator = LlmGenerator::new(llm).with_tools(executor(), 2);
        let subtask = Subtask::create("task_1", "Logic", "Build", vec!["app.js".into()], vec![]);

        let err = generator.generate(&request(subtask, None)).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolLoopExceeded(2)));
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_observation() {
        let llm = Arc::new(MockLlmClient::new([
            r#"{"tool": "shell", "args": {"cmd": "ls"}}"#,
            r#"{"files": []}"#,
        ]));
        let generator = LlmGenerator::new(llm.clone()).with_tools(executor(), 2);
        let subtask = Subtask::create("task_1", "Logic", "Build", vec!["app.js".into()], vec![]);

        let files = generator.generate(&request(subtask, None)).await.unwrap();
        assert!(files.is_empty());
        assert!(llm.requests()[1][3].content.contains("Hallucinated tool: shell"));
    }

    #[tokio::test]
    async fn test_tool_request_without_tools() {
        let llm = Arc::new(MockLlmClient::new([
            r#"{"tool": "fetch_api_data", "args": {"url": "https://api.example.com"}}"#,
        ]));
        let generator = LlmGenerator::new(llm.clone());
        let subtask = Subtask::create("task_1", "Logic", "Build", vec!["app.js".into()], vec![]);

        let err = generator.generate(&request(subtask, None)).await.unwrap_err();
        assert!(matches!(err, AgentError::HallucinatedTool(ref name) if name == "fetch_api_data"));
        assert_eq!(llm.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_modification_prompt() {
        let llm = Arc::new(MockLlmClient::new([
            r#"{"files": [{"path": "app.js", "content": "fixed"}]}"#,
        ]));
        let generator = LlmGenerator::new(llm.clone());
        let subtask = Subtask::modify("fix-0-0", "app.js", vec!["missing defer".into()], vec![]);
        let modification = ModificationContext {
            target_path: "app.js".into(),
            current_content: "const x = `${title}`;".into(),
            issues: vec!["missing defer".into()],
            suggestions: vec!["add defer".into()],
            sibling_summary: "- index.html\nHTML file (3 lines)".into(),
        };

        generator.generate(&request(subtask, Some(modification))).await.unwrap();
        let prompt = &llm.requests()[0][1].content;
        assert!(prompt.contains("File to fix: app.js"));
        assert!(prompt.contains("const x = `${title}`;"));
        assert!(prompt.contains("missing defer"));
        assert!(prompt.contains("- index.html"));
    }

    #[tokio::test]
    async fn test_malformed_reply_is_schema_error() {
        let llm = Arc::new(MockLlmClient::new(["here is your code: <html>"]));
        let generator = LlmGenerator::new(llm);
        let subtask = Subtask::create("task_1", "Page", "Build", vec!["index.html".into()], vec![]);
        assert!(generator
            .generate(&request(subtask, None))
            .await
            .unwrap_err()
            .is_schema());
    }
}
