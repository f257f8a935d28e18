//! 沙箱文件系统与工件存储
//!
//! SafeFs 绑定 root_dir，所有路径先做词法校验（禁止绝对路径与 ../ 逃逸），
//! 再检查已存在的最深祖先目录规范化后仍在 root 下（防符号链接逃逸）；校验在任何写入之前完成。
//! WorkspaceStore 基于 SafeFs 实现 ArtifactStore；ReadFileTool 供生成阶段读取已有工件。

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::core::AgentError;
use crate::tools::Tool;

/// 单个文件最大写入字节数
const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// 统一路径写法：去空白、反斜杠转 `/`、去掉开头的 `./`
pub fn normalize_path(path: &str) -> String {
    let mut p = path.trim().replace('\\', "/");
    while let Some(rest) = p.strip_prefix("./") {
        p = rest.to_string();
    }
    p
}

/// 沙箱文件系统：绑定根目录，resolve 校验路径在根下，防止路径逃逸
#[derive(Debug, Clone)]
pub struct SafeFs {
    root_dir: PathBuf,
}

impl SafeFs {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        let root = root_dir.as_ref().to_path_buf();
        let root_dir = root.canonicalize().unwrap_or(root);
        Self { root_dir }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// 将相对路径解析为根目录下的绝对路径；目标文件不必存在
    pub fn resolve(&self, path: &str) -> Result<PathBuf, AgentError> {
        let normalized = normalize_path(path);
        let mut clean = PathBuf::new();
        for component in Path::new(&normalized).components() {
            match component {
                Component::Normal(part) => clean.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !clean.pop() {
                        return Err(AgentError::PathEscape(path.to_string())); // 如 ../../etc/passwd
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(AgentError::PathEscape(path.to_string()));
                }
            }
        }
        if clean.as_os_str().is_empty() {
            return Err(AgentError::ToolExecutionFailed(format!(
                "Empty path: {:?}",
                path
            )));
        }

        let full = self.root_dir.join(&clean);
        let mut ancestor = full.as_path();
        while ancestor != self.root_dir && !ancestor.exists() {
            match ancestor.parent() {
                Some(parent) => ancestor = parent,
                None => break,
            }
        }
        if let Ok(canonical) = ancestor.canonicalize() {
            if !canonical.starts_with(&self.root_dir) {
                return Err(AgentError::PathEscape(path.to_string()));
            }
        }
        Ok(full)
    }

    pub fn read_file(&self, path: &str) -> Result<String, AgentError> {
        let resolved = self.resolve(path)?;
        std::fs::read_to_string(&resolved)
            .map_err(|e| AgentError::ToolExecutionFailed(format!("Read failed: {}", e)))
    }

    pub async fn write_file(&self, path: &str, content: &str) -> Result<PathBuf, AgentError> {
        if content.len() > MAX_FILE_SIZE {
            return Err(AgentError::ToolExecutionFailed(format!(
                "Content too large: {} bytes (max: {})",
                content.len(),
                MAX_FILE_SIZE
            )));
        }
        let resolved = self.resolve(path)?;
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&resolved, content).await?;
        Ok(resolved)
    }
}

/// 工件存储单次写入结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    pub success: bool,
    pub message: String,
}

impl WriteOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// 工件存储：按路径持久化生成的文件内容，逐文件返回成功/失败
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn write(&self, path: &str, content: &str) -> WriteOutcome;
}

/// 基于工作目录的工件存储
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    fs: SafeFs,
}

impl WorkspaceStore {
    /// 创建根目录（若不存在）并绑定沙箱
    pub fn new(root_dir: impl AsRef<Path>) -> Result<Self, AgentError> {
        std::fs::create_dir_all(root_dir.as_ref())?;
        Ok(Self {
            fs: SafeFs::new(root_dir),
        })
    }

    pub fn fs(&self) -> &SafeFs {
        &self.fs
    }
}

#[async_trait]
impl ArtifactStore for WorkspaceStore {
    async fn write(&self, path: &str, content: &str) -> WriteOutcome {
        match self.fs.write_file(path, content).await {
            Ok(resolved) => {
                tracing::debug!(path = %path, bytes = content.len(), "artifact written");
                WriteOutcome::ok(format!("File created successfully: {}", resolved.display()))
            }
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "artifact write rejected");
                WriteOutcome::failed(format!("Error creating file {}: {}", path, e))
            }
        }
    }
}

/// read_file 工具：读取工作目录中已生成的文件
pub struct ReadFileTool {
    fs: SafeFs,
}

impl ReadFileTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a file that already exists in the workspace. Args: {\"path\": \"file path relative to workspace\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "path": { "type": "string" } },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or("Missing required parameter: path")?;
        tracing::info!(path = %path, "read_file tool execute");
        self.fs.read_file(path).map_err(|e| e.to_string())
    }
}
