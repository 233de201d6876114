//! Filesystem tools - read, write, list, and manage files.
//!
//! Paths go through [`resolve_path`] so that "desktop" placeholders land
//! in the configured output directory. Read results are capped with an
//! explicit truncation marker.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;

use super::{resolve_path, truncate_output, Tool};
use crate::error::Error;
use crate::Result;

/// Cap on file read results fed back to the model.
const READ_CAP: usize = 10_000;

fn require_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Tool(format!("Missing '{}' parameter", key)))
}

fn human_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / 1024.0 / 1024.0)
    }
}

/// Read file contents (UTF-8, capped)
pub struct ReadFileTool {
    output_dir: PathBuf,
}

impl ReadFileTool {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }
    fn description(&self) -> &str {
        "Read the contents of a text file (txt, py, html, csv, json, etc.)"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path to the file"}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let path = resolve_path(require_str(&params, "path")?, &self.output_dir);
        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Tool(format!("Failed to read {}: {}", path.display(), e)))?;
        Ok(truncate_output(&content, READ_CAP))
    }
}

/// Write content to a file, creating parent directories
pub struct WriteFileTool {
    output_dir: PathBuf,
}

impl WriteFileTool {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }
    fn description(&self) -> &str {
        "Write text content to a file. Creates parent directories if needed"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "content": {"type": "string"}
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let path = resolve_path(require_str(&params, "path")?, &self.output_dir);
        let content = require_str(&params, "content")?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::Tool(format!("Failed to create directory: {}", e)))?;
            }
        }

        std::fs::write(&path, content)
            .map_err(|e| Error::Tool(format!("Failed to write {}: {}", path.display(), e)))?;

        Ok(format!("Saved: {} ({} chars)", path.display(), content.chars().count()))
    }
}

/// List directory contents with sizes
pub struct ListFilesTool {
    output_dir: PathBuf,
}

impl ListFilesTool {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }
    fn description(&self) -> &str {
        "List files and folders in a directory with sizes"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "directory": {
                    "type": "string",
                    "description": "Directory path. Defaults to the output folder."
                }
            },
            "required": []
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let dir = params
            .get("directory")
            .and_then(|v| v.as_str())
            .unwrap_or(".");
        let dir = resolve_path(dir, &self.output_dir);

        let mut entries: Vec<_> = std::fs::read_dir(&dir)
            .map_err(|e| Error::Tool(format!("Failed to read directory {}: {}", dir.display(), e)))?
            .filter_map(|e| e.ok())
            .collect();
        entries.sort_by_key(|e| e.file_name());

        let mut lines = Vec::with_capacity(entries.len());
        for entry in entries {
            let name = entry.file_name().to_string_lossy().to_string();
            let meta = entry.metadata().ok();
            if meta.as_ref().map(|m| m.is_dir()).unwrap_or(false) {
                lines.push(format!("{}/", name));
            } else {
                let size = meta.map(|m| m.len()).unwrap_or(0);
                lines.push(format!("{} ({})", name, human_size(size)));
            }
        }

        if lines.is_empty() {
            Ok("Directory is empty.".to_string())
        } else {
            Ok(lines.join("\n"))
        }
    }
}

/// Open a file in its default application
pub struct OpenFileTool {
    output_dir: PathBuf,
}

impl OpenFileTool {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }
}

#[async_trait]
impl Tool for OpenFileTool {
    fn name(&self) -> &str {
        "open_file"
    }
    fn description(&self) -> &str {
        "Open a file in its default desktop application"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let path = resolve_path(require_str(&params, "path")?, &self.output_dir);
        open::that(&path).map_err(|e| Error::Tool(format!("Failed to open {}: {}", path.display(), e)))?;
        Ok(format!("Opened: {}", path.display()))
    }
}

/// Delete a file or folder
pub struct DeleteFileTool {
    output_dir: PathBuf,
}

impl DeleteFileTool {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }
}

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        "delete_file"
    }
    fn description(&self) -> &str {
        "Delete a file or folder"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let path = resolve_path(require_str(&params, "path")?, &self.output_dir);

        if path.is_file() {
            std::fs::remove_file(&path)
                .map_err(|e| Error::Tool(format!("Delete error: {}", e)))?;
            Ok(format!("Deleted file: {}", path.display()))
        } else if path.is_dir() {
            std::fs::remove_dir_all(&path)
                .map_err(|e| Error::Tool(format!("Delete error: {}", e)))?;
            Ok(format!("Deleted folder: {}", path.display()))
        } else {
            Ok(format!("Not found: {}", path.display()))
        }
    }
}

/// Copy a file
pub struct CopyFileTool {
    output_dir: PathBuf,
}

impl CopyFileTool {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }
}

#[async_trait]
impl Tool for CopyFileTool {
    fn name(&self) -> &str {
        "copy_file"
    }
    fn description(&self) -> &str {
        "Copy a file to a new location"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "src": {"type": "string"},
                "dst": {"type": "string"}
            },
            "required": ["src", "dst"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let src = resolve_path(require_str(&params, "src")?, &self.output_dir);
        let dst = resolve_path(require_str(&params, "dst")?, &self.output_dir);

        if let Some(parent) = dst.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::Tool(format!("Copy error: {}", e)))?;
            }
        }
        std::fs::copy(&src, &dst).map_err(|e| Error::Tool(format!("Copy error: {}", e)))?;
        Ok(format!("Copied: {} -> {}", src.display(), dst.display()))
    }
}

/// Move a file
pub struct MoveFileTool {
    output_dir: PathBuf,
}

impl MoveFileTool {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }
}

#[async_trait]
impl Tool for MoveFileTool {
    fn name(&self) -> &str {
        "move_file"
    }
    fn description(&self) -> &str {
        "Move a file to a new location"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "src": {"type": "string"},
                "dst": {"type": "string"}
            },
            "required": ["src", "dst"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let src = resolve_path(require_str(&params, "src")?, &self.output_dir);
        let dst = resolve_path(require_str(&params, "dst")?, &self.output_dir);

        if let Some(parent) = dst.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::Tool(format!("Move error: {}", e)))?;
            }
        }
        std::fs::rename(&src, &dst).map_err(|e| Error::Tool(format!("Move error: {}", e)))?;
        Ok(format!("Moved: {} -> {}", src.display(), dst.display()))
    }
}

/// Create a folder (recursive)
pub struct CreateDirectoryTool {
    output_dir: PathBuf,
}

impl CreateDirectoryTool {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }
}

#[async_trait]
impl Tool for CreateDirectoryTool {
    fn name(&self) -> &str {
        "create_directory"
    }
    fn description(&self) -> &str {
        "Create a folder (recursive)"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let path = resolve_path(require_str(&params, "path")?, &self.output_dir);
        std::fs::create_dir_all(&path)
            .map_err(|e| Error::Tool(format!("Failed to create {}: {}", path.display(), e)))?;
        Ok(format!("Created folder: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_write_round_trip() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().to_path_buf();
        let file = tmp.path().join("test.txt");

        let write_result = WriteFileTool::new(out.clone())
            .execute(json!({"path": file.to_str().unwrap(), "content": "Hello, World!"}))
            .await
            .unwrap();
        assert!(write_result.contains("Saved:"));

        let read_result = ReadFileTool::new(out)
            .execute(json!({"path": file.to_str().unwrap()}))
            .await
            .unwrap();
        assert_eq!(read_result, "Hello, World!");
    }

    #[tokio::test]
    async fn test_read_caps_large_files() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("big.txt");
        std::fs::write(&file, "a".repeat(30_000)).unwrap();

        let result = ReadFileTool::new(tmp.path().to_path_buf())
            .execute(json!({"path": file.to_str().unwrap()}))
            .await
            .unwrap();
        assert!(result.contains("truncated to 10000 chars"));
    }

    #[tokio::test]
    async fn test_list_files_empty_dir() {
        let tmp = TempDir::new().unwrap();
        let result = ListFilesTool::new(tmp.path().to_path_buf())
            .execute(json!({"directory": tmp.path().to_str().unwrap()}))
            .await
            .unwrap();
        assert_eq!(result, "Directory is empty.");
    }

    #[tokio::test]
    async fn test_list_files_sorted_with_sizes() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("b.txt"), "12345").unwrap();
        std::fs::write(tmp.path().join("a.txt"), "").unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();

        let result = ListFilesTool::new(tmp.path().to_path_buf())
            .execute(json!({"directory": tmp.path().to_str().unwrap()}))
            .await
            .unwrap();

        let lines: Vec<&str> = result.lines().collect();
        assert_eq!(lines[0], "a.txt (0 B)");
        assert_eq!(lines[1], "b.txt (5 B)");
        assert_eq!(lines[2], "sub/");
    }

    #[tokio::test]
    async fn test_desktop_placeholder_resolves_to_output_dir() {
        let tmp = TempDir::new().unwrap();
        WriteFileTool::new(tmp.path().to_path_buf())
            .execute(json!({"path": "~/Desktop/note.txt", "content": "hi"}))
            .await
            .unwrap();
        assert!(tmp.path().join("note.txt").exists());
    }

    #[tokio::test]
    async fn test_copy_move_delete() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().to_path_buf();
        let a = tmp.path().join("a.txt");
        std::fs::write(&a, "data").unwrap();

        let b = tmp.path().join("b.txt");
        CopyFileTool::new(out.clone())
            .execute(json!({"src": a.to_str().unwrap(), "dst": b.to_str().unwrap()}))
            .await
            .unwrap();
        assert!(b.exists());

        let c = tmp.path().join("c.txt");
        MoveFileTool::new(out.clone())
            .execute(json!({"src": b.to_str().unwrap(), "dst": c.to_str().unwrap()}))
            .await
            .unwrap();
        assert!(!b.exists());
        assert!(c.exists());

        let result = DeleteFileTool::new(out.clone())
            .execute(json!({"path": c.to_str().unwrap()}))
            .await
            .unwrap();
        assert!(result.contains("Deleted file"));
        assert!(!c.exists());

        let missing = DeleteFileTool::new(out)
            .execute(json!({"path": c.to_str().unwrap()}))
            .await
            .unwrap();
        assert!(missing.contains("Not found"));
    }

    #[tokio::test]
    async fn test_missing_parameter_is_tool_error() {
        let tmp = TempDir::new().unwrap();
        let result = ReadFileTool::new(tmp.path().to_path_buf())
            .execute(json!({}))
            .await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Missing 'path'"));
    }
}
