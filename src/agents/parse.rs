//! LLM 输出解析：从 ```json 代码块、普通 ``` 代码块或裸文本中提取 JSON，再反序列化为契约类型

use serde::de::{DeserializeOwned, IgnoredAny};

use crate::core::AgentError;

fn is_json(s: &str) -> bool {
    serde_json::from_str::<IgnoredAny>(s).is_ok()
}

/// 代码块内容：从开始标记之后到最后一个 ```，文件内容里嵌套的 ``` 不会截断 JSON
fn fenced_body<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let start = text.find(marker)?;
    let rest = &text[start + marker.len()..];
    Some(rest.rfind("```").map(|end| &rest[..end]).unwrap_or(rest).trim())
}

fn brace_span(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// 提取 JSON 文本：整段回复本身是 JSON 时直接返回；否则依次尝试 ```json 块、``` 块，
/// 最后取首个 `{` 到末个 `}`
pub fn extract_json_block(output: &str) -> &str {
    let trimmed = output.trim();
    if is_json(trimmed) {
        return trimmed;
    }

    let fenced = fenced_body(trimmed, "```json").or_else(|| fenced_body(trimmed, "```"));
    let candidates = fenced
        .into_iter()
        .flat_map(|body| [body, brace_span(body)])
        .chain(std::iter::once(brace_span(trimmed)));
    for candidate in candidates {
        if is_json(candidate) {
            return candidate;
        }
    }
    brace_span(fenced.unwrap_or(trimmed))
}

/// 解析失败统一转为 Schema 错误（带原文片段），调用方不做自动重试
pub fn parse_structured<T: DeserializeOwned>(
    phase: &'static str,
    output: &str,
) -> Result<T, AgentError> {
    let json_str = extract_json_block(output);
    serde_json::from_str(json_str).map_err(|e| {
        let snippet: String = output.chars().take(200).collect();
        AgentError::schema(phase, format!("{}: {}", e, snippet))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::contracts::GeneratorReply;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Probe {
        ok: bool,
    }

    #[test]
    fn test_extract_from_json_fence() {
        let raw = "Here you go:\n```json\n{\"ok\": true}\n```\nthanks";
        assert_eq!(extract_json_block(raw), "{\"ok\": true}");
    }

    #[test]
    fn test_extract_from_plain_fence() {
        let raw = "```\n{\"ok\": false}\n```";
        assert_eq!(extract_json_block(raw), "{\"ok\": false}");
    }

    #[test]
    fn test_extract_bare_json_with_preamble() {
        let raw = "Sure! {\"ok\": true} Hope it helps";
        assert_eq!(extract_json_block(raw), "{\"ok\": true}");
    }

    #[test]
    fn test_bare_reply_with_fenced_file_content() {
        let raw = r#"{"files":[{"path":"README.md","content":"Run:\n```\nnpm start\n```\n"}]}"#;
        assert_eq!(extract_json_block(raw), raw);

        let reply: GeneratorReply = parse_structured("generation", raw).unwrap();
        let GeneratorReply::Files(files) = reply else {
            panic!("expected files reply");
        };
        assert_eq!(files.files[0].path, "README.md");
        assert_eq!(files.files[0].content, "Run:\n```\nnpm start\n```\n");
    }

    #[test]
    fn test_json_fence_with_fenced_file_content() {
        let body = r#"{"files":[{"path":"README.md","content":"Run:\n```\nnpm start\n```\n"}]}"#;
        let raw = format!("Here are the files:\n```json\n{}\n```", body);
        assert_eq!(extract_json_block(&raw), body);

        let reply: GeneratorReply = parse_structured("generation", &raw).unwrap();
        assert!(matches!(reply, GeneratorReply::Files(f) if f.files[0].content.contains("npm start")));
    }

    #[test]
    fn test_parse_structured() {
        let probe: Probe = parse_structured("planning", "```json\n{\"ok\": true}\n```").unwrap();
        assert!(probe.ok);

        let err = parse_structured::<Probe>("planning", "not json at all").unwrap_err();
        assert!(err.is_schema());
        assert!(err.to_string().contains("planning"));
    }
}
