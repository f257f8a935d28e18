//! fetch_api_data 工具：生成代码前在服务端抓取外部 API 数据
//!
//! 生成器可先取回真实数据再把它作为静态常量写进页面，避免浏览器端跨域请求。
//! 可选域名白名单（为空则不限制）；请求带超时；响应超过 max_result_chars 时截断并追加 ...[truncated]；
//! HTML 响应使用 html2text 提取可读文本。

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use html2text::from_read;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Url};
use serde_json::{json, Value};

use crate::config::FetchSection;
use crate::tools::Tool;

pub struct FetchTool {
    client: Client,
    allowed_domains: HashSet<String>,
    default_timeout: Duration,
    max_result_chars: usize,
}

/// 用 URL 解析器取 host（小写，不含端口、userinfo 与路径），只接受 http/https
fn extract_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .map(|host| host.to_lowercase())
}

fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("<!") || s.starts_with("<html") || s.starts_with("<HTML")
}

fn truncate_chars(body: String, max_chars: usize) -> String {
    if body.chars().count() > max_chars {
        body.chars().take(max_chars).collect::<String>() + "\n...[truncated]"
    } else {
        body
    }
}

impl FetchTool {
    pub fn new(section: &FetchSection) -> Self {
        let client = Client::builder()
            .user_agent(concat!("code-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            allowed_domains: section
                .allowed_domains
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            default_timeout: Duration::from_secs(section.timeout_secs),
            max_result_chars: section.max_result_chars,
        }
    }

    fn check_allowed(&self, url: &str) -> Result<(), String> {
        let domain = extract_domain(url).ok_or_else(|| "Invalid or missing URL (http or https required)".to_string())?;
        if self.allowed_domains.is_empty() || self.allowed_domains.contains(&domain) {
            Ok(())
        } else {
            Err(format!("Domain not in allowlist: {}", domain))
        }
    }

    fn headers_from(args: &Value) -> Result<HeaderMap, String> {
        let mut headers = HeaderMap::new();
        if let Some(map) = args.get("headers").and_then(|v| v.as_object()) {
            for (name, value) in map {
                let value = value.as_str().ok_or_else(|| format!("Header {} must be a string", name))?;
                let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| e.to_string())?;
                let value = HeaderValue::from_str(value).map_err(|e| e.to_string())?;
                headers.insert(name, value);
            }
        }
        Ok(headers)
    }

    async fn fetch(&self, url: &str, args: &Value) -> Result<Value, String> {
        self.check_allowed(url)?;
        let method = args
            .get("method")
            .and_then(|v| v.as_str())
            .unwrap_or("GET")
            .to_uppercase();
        let method = Method::from_bytes(method.as_bytes()).map_err(|e| e.to_string())?;
        let timeout = args
            .get("timeout")
            .and_then(|v| v.as_u64())
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let resp = self
            .client
            .request(method, url)
            .headers(Self::headers_from(args)?)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    format!("Request timeout after {} seconds", timeout.as_secs())
                } else if e.is_connect() {
                    "Connection error. Check if the URL is correct and accessible".to_string()
                } else {
                    format!("Request failed: {}", e)
                }
            })?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| format!("Read body: {}", e))?;
        let body = body.trim_start_matches('\u{FEFF}').to_string();

        let parsed = serde_json::from_str::<Value>(&body).ok();
        let (content_type, data) = match parsed {
            Some(parsed) if body.len() <= self.max_result_chars => ("json", parsed),
            _ if looks_like_html(&body) => {
                let text = from_read(body.as_bytes(), 120).unwrap_or(body);
                ("text", Value::String(truncate_chars(text, self.max_result_chars)))
            }
            _ => ("text", Value::String(truncate_chars(body, self.max_result_chars))),
        };

        Ok(json!({
            "success": true,
            "data": data,
            "content_type": content_type,
            "status_code": status,
            "url": url,
        }))
    }
}

#[async_trait]
impl Tool for FetchTool {
    fn name(&self) -> &str {
        "fetch_api_data"
    }

    fn description(&self) -> &str {
        "Fetch data from an external API on the server side so it can be embedded as static data in generated code. Args: {\"url\": \"https://...\", \"method\": \"GET\", \"headers\": {}, \"timeout\": 30}"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string" },
                "method": { "type": "string" },
                "headers": { "type": "object" },
                "timeout": { "type": "integer" }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let url = args
            .get("url")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string();
        if url.is_empty() {
            return Err("Missing url".to_string());
        }
        tracing::info!(url = %url, "fetch_api_data tool fetch");
        let result = self.fetch(&url, &args).await?;
        Ok(result.to_string())
    }
}
