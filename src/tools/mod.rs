pub mod executor;
pub mod fetch;
pub mod filesystem;
pub mod registry;

pub use executor::ToolExecutor;
pub use fetch::FetchTool;
pub use filesystem::{
    normalize_path, ArtifactStore, ReadFileTool, SafeFs, WorkspaceStore, WriteOutcome,
};
pub use registry::{Tool, ToolRegistry};
