//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）

pub mod deepseek;
pub mod message;
pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

pub use deepseek::{create_deepseek_client, DEEPSEEK_BASE_URL, DEEPSEEK_CHAT};
pub use message::{Message, Role};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::LlmClient;

use crate::config::LlmSection;
use crate::core::AgentError;

/// 按配置创建指定模型的客户端（planner / coder / evaluator 各自调用一次）
pub fn create_client(section: &LlmSection, model: &str) -> Result<Arc<dyn LlmClient>, AgentError> {
    let client = match section.provider.as_str() {
        "openai" => OpenAiClient::new(
            section.base_url.as_deref(),
            model,
            section.api_key.as_deref(),
        ),
        "deepseek" => {
            // 未单独配置模型时沿用 OpenAI 默认名，对 DeepSeek 无效，改用 deepseek-chat
            let model = if model.starts_with("gpt-") {
                DEEPSEEK_CHAT
            } else {
                model
            };
            create_deepseek_client(section.base_url.as_deref(), model, section.api_key.as_deref())
        }
        other => {
            return Err(AgentError::ConfigError(format!(
                "unknown llm provider: {other}"
            )))
        }
    };

    tracing::info!(provider = %section.provider, model = %client.model(), "llm client created");
    Ok(Arc::new(
        client
            .with_temperature(section.temperature)
            .with_timeout(section.timeouts.request),
    ))
}
