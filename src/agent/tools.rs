//! Agent tools: memory access plus a workspace-confined filesystem.
//!
//! Every tool takes JSON input matching its `schemars` schema and produces a
//! [`ToolOutput`]. Failures are reported as error outputs, never propagated.

use anyhow::{bail, ensure, Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Component, Path, PathBuf};

use super::llm::ToolDefinition;
use crate::memory::search::RecallQuery;
use crate::memory::service::MemoryService;
use crate::memory::types::{MemoryType, NewMemory, DEFAULT_IMPORTANCE, MAX_CONTENT_CHARS, MAX_RECALL_LIMIT};

/// Largest file `read_file` will return.
pub const MAX_READ_BYTES: u64 = 256 * 1024;

const DEFAULT_TOOL_RECALL_LIMIT: usize = 5;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryRecallParams {
    #[schemars(description = "Full-text query over stored memories")]
    pub query: String,
    #[schemars(description = "Maximum number of results (1-100). Defaults to 5.")]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryStoreParams {
    #[schemars(description = "The content to remember (at most 10000 characters)")]
    pub content: String,
    #[schemars(
        description = "Memory type: 'factual', 'relational', 'procedural', 'episodic', 'semantic'. Defaults to 'factual'."
    )]
    pub r#type: Option<String>,
    #[schemars(description = "Importance from 0.0 to 1.0. Defaults to 0.5.")]
    pub importance: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ReadFileParams {
    #[schemars(description = "Path relative to the workspace root")]
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct WriteFileParams {
    #[schemars(description = "Path relative to the workspace root")]
    pub path: String,
    #[schemars(description = "Full file content to write")]
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListFilesParams {
    #[schemars(description = "Directory relative to the workspace root. Defaults to the root.")]
    pub path: Option<String>,
}

/// Result of one tool invocation, as handed back to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

fn definition<T: JsonSchema>(name: &str, description: &str) -> ToolDefinition {
    let schema = schemars::schema_for!(T);
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: serde_json::to_value(&schema).unwrap_or(Value::Null),
    }
}

/// Definitions for every tool, in the order offered to the model.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        definition::<MemoryRecallParams>(
            "memory_recall",
            "Search the user's long-term memory. Returns matching memories, most active first.",
        ),
        definition::<MemoryStoreParams>(
            "memory_store",
            "Store a new long-term memory for the user.",
        ),
        definition::<ReadFileParams>("read_file", "Read a UTF-8 text file from the workspace."),
        definition::<WriteFileParams>(
            "write_file",
            "Create or overwrite a file in the workspace. Parent directories are created.",
        ),
        definition::<ListFilesParams>(
            "list_files",
            "List entries of a workspace directory. Directories end with '/'.",
        ),
    ]
}

/// Resolve a model-supplied path inside `workspace`.
///
/// Only plain relative components are accepted: no root, no prefix, no `..`.
pub fn resolve_workspace_path(workspace: &Path, raw: &str) -> Result<PathBuf> {
    let rel = Path::new(raw);
    let mut resolved = workspace.to_path_buf();
    for component in rel.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir => bail!("path must not contain '..': {raw}"),
            Component::RootDir | Component::Prefix(_) => {
                bail!("path must be relative to the workspace: {raw}")
            }
        }
    }
    Ok(resolved)
}

/// Everything a tool needs to run on behalf of one user.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub memory: MemoryService,
    pub user_id: String,
    pub workspace: PathBuf,
}

impl ToolContext {
    /// Run a tool by name. Blocks.
    pub fn execute(&self, name: &str, input: Value) -> ToolOutput {
        let result = match name {
            "memory_recall" => parse(input).and_then(|p| self.memory_recall(p)),
            "memory_store" => parse(input).and_then(|p| self.memory_store(p)),
            "read_file" => parse(input).and_then(|p| self.read_file(p)),
            "write_file" => parse(input).and_then(|p| self.write_file(p)),
            "list_files" => parse(input).and_then(|p| self.list_files(p)),
            other => Err(anyhow::anyhow!("unknown tool: {other}")),
        };

        match result {
            Ok(content) => ToolOutput {
                content,
                is_error: false,
            },
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "tool failed");
                ToolOutput {
                    content: format!("Error: {e:#}"),
                    is_error: true,
                }
            }
        }
    }

    fn memory_recall(&self, params: MemoryRecallParams) -> Result<String> {
        let limit = params.limit.unwrap_or(DEFAULT_TOOL_RECALL_LIMIT);
        ensure!(
            (1..=MAX_RECALL_LIMIT).contains(&limit),
            "limit must be between 1 and {MAX_RECALL_LIMIT}"
        );
        ensure!(!params.query.trim().is_empty(), "query must not be empty");

        let query = RecallQuery::new(params.query.trim()).with_limit(limit);
        let response = self.memory.recall(&self.user_id, &query)?;
        if response.results.is_empty() {
            return Ok("No matching memories.".to_string());
        }
        let results: Vec<Value> = response
            .results
            .iter()
            .map(|m| {
                serde_json::json!({
                    "id": m.id,
                    "type": m.memory_type,
                    "content": m.content,
                    "importance": m.importance,
                    "activation": m.activation,
                })
            })
            .collect();
        Ok(serde_json::to_string_pretty(&results)?)
    }

    fn memory_store(&self, params: MemoryStoreParams) -> Result<String> {
        ensure!(!params.content.trim().is_empty(), "content must not be empty");
        ensure!(
            params.content.chars().count() <= MAX_CONTENT_CHARS,
            "content exceeds {MAX_CONTENT_CHARS} characters"
        );
        let importance = params.importance.unwrap_or(DEFAULT_IMPORTANCE);
        ensure!(
            importance.is_finite() && (0.0..=1.0).contains(&importance),
            "importance must be between 0 and 1"
        );
        let memory_type = match params.r#type.as_deref() {
            Some(raw) => raw.parse::<MemoryType>().map_err(anyhow::Error::msg)?,
            None => MemoryType::default(),
        };

        let new_memory = NewMemory::new(params.content)
            .with_type(memory_type)
            .with_importance(importance);
        let result = self.memory.store(&self.user_id, &new_memory)?;
        Ok(format!("Stored memory {}", result.id))
    }

    fn read_file(&self, params: ReadFileParams) -> Result<String> {
        let path = resolve_workspace_path(&self.workspace, &params.path)?;
        let meta = std::fs::metadata(&path)
            .with_context(|| format!("cannot read {}", params.path))?;
        ensure!(meta.is_file(), "{} is not a file", params.path);
        ensure!(
            meta.len() <= MAX_READ_BYTES,
            "{} is {} bytes, larger than the {MAX_READ_BYTES} byte read limit",
            params.path,
            meta.len()
        );
        std::fs::read_to_string(&path).with_context(|| format!("cannot read {}", params.path))
    }

    fn write_file(&self, params: WriteFileParams) -> Result<String> {
        let path = resolve_workspace_path(&self.workspace, &params.path)?;
        ensure!(path != self.workspace, "path must name a file");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create directory for {}", params.path))?;
        }
        std::fs::write(&path, params.content.as_bytes())
            .with_context(|| format!("cannot write {}", params.path))?;
        Ok(format!(
            "Wrote {} bytes to {}",
            params.content.len(),
            params.path
        ))
    }

    fn list_files(&self, params: ListFilesParams) -> Result<String> {
        let raw = params.path.unwrap_or_default();
        let dir = resolve_workspace_path(&self.workspace, &raw)?;
        if !dir.exists() && dir == self.workspace {
            return Ok("(empty)".to_string());
        }

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&dir).with_context(|| format!("cannot list {raw}"))? {
            let entry = entry?;
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_dir() {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();

        if entries.is_empty() {
            Ok("(empty)".to_string())
        } else {
            Ok(entries.join("\n"))
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(input: Value) -> Result<T> {
    serde_json::from_value(input).context("invalid tool input")
}
