//! 提示词模板
//!
//! 模板中的 `{name}` 由 render 替换；期望的响应结构用 schemars 生成 JSON Schema 拼入提示，减少格式错误。

use schemars::{schema_for, JsonSchema};

use crate::agents::contracts::{EvaluationReport, GeneratedFiles, Plan, ToolRequest};

pub const PLANNER_SYSTEM: &str = "You are a software architect specializing in web development.";
pub const CODER_SYSTEM: &str = "You are a professional software engineer specializing in web development.";
pub const EVALUATOR_SYSTEM: &str = "You are a thorough code reviewer.";

pub const PLANNING_PROMPT: &str = r#"Analyze the user requirement, design a simple and practical architecture, and decompose it into executable subtasks.

User requirement:
{requirement}

Guidelines:
1. Focus strictly on what is explicitly requested. Do not add unrequested features.
2. Keep the architecture simple and maintainable.
3. Prefer native HTML + CSS + JavaScript unless a framework is requested.
4. Break the work into 2-5 module-level subtasks. A subtask may own several files; declare dependencies between subtasks.
5. Every subtask must list at least one file in target_paths, using relative paths.

Return ONLY valid JSON matching this schema:
{schema}
"#;

pub const CODING_PROMPT: &str = r#"User requirement: {requirement}
Architecture plan: {plan}
Technology choices: {technology_choices}
Subtask progress:
{progress}

Current task: {index}/{total} - {title}
Task description: {description}
Files to create: {target_paths}
Existing files (reference only):
{existing_files}

Requirements:
1. Reuse existing code, styles and components where possible.
2. Write complete, runnable, clean code.
3. Use <script defer> or place scripts at the end of <body>; add null checks for DOM lookups.
4. If real data from an external API is needed, fetch it with a tool and embed it as a static constant instead of calling the API at runtime.
5. Only create the files listed above.
{tools}
Final answer format (pure JSON, no extra text):
{schema}
"#;

pub const MODIFICATION_PROMPT: &str = r#"You are fixing a single file.

User requirement: {requirement}
Architecture plan: {plan}
File to fix: {target_path}
Current content:
{current_content}

Issues:
{issues}
Suggestions:
{suggestions}
Other files:
{other_files}

Make minimal, targeted changes that address only the reported issues, preserve the existing style and stay compatible with the other files.
Return the full modified content of {target_path}.
{tools}
Final answer format (pure JSON, no extra text):
{schema}
"#;

pub const TOOLS_SECTION: &str = r#"
Available tools (call one by replying with only {"tool": "<name>", "args": {...}}; the result is sent back to you):
{tools}
Tool call schema:
{schema}
"#;

pub const EVALUATION_PROMPT: &str = r#"Evaluate whether the generated code meets the requirement and detect integration errors.

Original requirement:
{requirement}

Subtasks:
{subtasks}

Generated files:
{files}

File contents (previews):
{contents}

Check in particular:
1. Script tags use type="module" when files use import/export.
2. HTML classes and ids match CSS selectors and JS lookups.
3. Referenced CSS/JS paths match generated file paths.
4. Scripts run after the DOM is ready (defer, end of body, or DOMContentLoaded).
5. No runtime API calls; data is embedded as static constants.
6. Multi-page sites have navigation in both directions.

Report fatal integration errors as issues with concrete fix suggestions naming the file. Be lenient on style.
Every task_id must be one of the subtask ids above.

Return ONLY JSON matching this schema:
{schema}
"#;

/// 单遍替换模板中的 `{名称}`；替换进来的值不会再被展开
pub fn render<V: AsRef<str>>(template: &str, vars: &[(&str, V)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let value = tail.find('}').and_then(|end| {
            let key = &tail[1..end];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (value.as_ref(), end))
        });
        match value {
            Some((value, end)) => {
                out.push_str(value);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn schema_json<T: JsonSchema>() -> String {
    let schema = schema_for!(T);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

pub fn plan_schema() -> String {
    schema_json::<Plan>()
}

pub fn files_schema() -> String {
    schema_json::<GeneratedFiles>()
}

pub fn tool_call_schema() -> String {
    schema_json::<ToolRequest>()
}

pub fn evaluation_schema() -> String {
    schema_json::<EvaluationReport>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_all_occurrences() {
        let out = render("{a} and {a} then {b}", &[("a", "x"), ("b", "y")]);
        assert_eq!(out, "x and x then y");
    }

    #[test]
    fn test_render_keeps_unknown_placeholders() {
        assert_eq!(render("{missing}", &[("a", "x")]), "{missing}");
        assert_eq!(render(r#"{"tool": 1}"#, &[("tool", "x")]), r#"{"tool": 1}"#);
    }

    #[test]
    fn test_render_does_not_expand_values() {
        let out = render("{content} / {title}", &[("title", "T"), ("content", "`${title}`")]);
        assert_eq!(out, "`${title}` / T");
    }

    #[test]
    fn test_schemas_mention_fields() {
        assert!(plan_schema().contains("subtasks"));
        assert!(plan_schema().contains("target_paths"));
        assert!(files_schema().contains("files"));
        assert!(tool_call_schema().contains("tool"));
        assert!(evaluation_schema().contains("overall_passed"));
    }
}
