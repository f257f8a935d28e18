//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `CODE_AGENT__*` 覆盖（双下划线表示嵌套，如 `CODE_AGENT__LLM__PROVIDER=deepseek`）。
//! 配置只在启动时构造一次，再以引用传给引擎构建器与各能力提供者。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::AgentError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub tools: ToolsSection,
    pub logging: LoggingSection,
}

/// [app] 段：工作目录、迭代上限、评估预览行数、事件日志容量
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    /// 工件根目录，未设置时用 ./workspace
    pub workspace_root: Option<PathBuf>,
    pub max_iterations: u32,
    /// 评估时每个文件最多预览的行数
    pub preview_lines: usize,
    pub event_log_capacity: usize,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            workspace_root: None,
            max_iterations: 3,
            preview_lines: 100,
            event_log_capacity: 256,
        }
    }
}

/// [llm] 段：后端选择、模型（可按角色覆盖）与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai / deepseek
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub planner_model: Option<String>,
    pub coder_model: Option<String>,
    pub evaluator_model: Option<String>,
    pub temperature: f32,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4".to_string(),
            base_url: None,
            api_key: None,
            planner_model: None,
            coder_model: None,
            evaluator_model: None,
            temperature: 0.1,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

impl LlmSection {
    pub fn planner_model(&self) -> &str {
        self.planner_model.as_deref().unwrap_or(&self.model)
    }

    pub fn coder_model(&self) -> &str {
        self.coder_model.as_deref().unwrap_or(&self.model)
    }

    pub fn evaluator_model(&self) -> &str {
        self.evaluator_model.as_deref().unwrap_or(&self.model)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次请求超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 120 }
    }
}

/// [tools] 段：工具超时、生成阶段工具轮数上限、fetch 设置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    /// 单个子任务生成时允许的最大工具调用轮数
    pub max_tool_rounds: usize,
    pub fetch: FetchSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
            max_tool_rounds: 5,
            fetch: FetchSection::default(),
        }
    }
}

/// [tools.fetch] 段：抓取超时、最大字符数、域名白名单（为空表示不限制）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchSection {
    pub timeout_secs: u64,
    pub max_result_chars: usize,
    pub allowed_domains: Vec<String>,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_result_chars: 20_000,
            allowed_domains: Vec::new(),
        }
    }
}

/// [logging] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl AppConfig {
    /// 工件根目录（未配置时为 ./workspace）
    pub fn workspace_root(&self) -> PathBuf {
        self.app
            .workspace_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("workspace"))
    }

    /// 校验取值范围；日志级别统一转小写
    pub fn validate(mut self) -> Result<Self, AgentError> {
        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(AgentError::ConfigError(format!(
                "logging.level must be one of {:?}, got {}",
                LOG_LEVELS, self.logging.level
            )));
        }
        self.logging.level = level;

        if self.app.preview_lines == 0 {
            return Err(AgentError::ConfigError(
                "app.preview_lines must be greater than 0".to_string(),
            ));
        }
        if self.app.event_log_capacity == 0 {
            return Err(AgentError::ConfigError(
                "app.event_log_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(self)
    }
}

/// 从 config 目录加载配置，环境变量 CODE_AGENT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 CODE_AGENT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("CODE_AGENT")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
