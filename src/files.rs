use std::path::{Path, PathBuf};

use base64::Engine as _;
use serde_json::{json, Value};

use crate::error::{AgentError, RuntimeError};

pub const DEFAULT_USE_CASE: &str = "CODE_INTERPRETER";

/// A file attached by the caller and sent with every outbound turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub name: String,
    pub content: Vec<u8>,
    pub media_type: String,
    pub use_case: String,
}

impl InputFile {
    pub fn new(name: impl Into<String>, content: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content,
            media_type: media_type.into(),
            use_case: DEFAULT_USE_CASE.into(),
        }
    }

    pub fn with_use_case(mut self, use_case: impl Into<String>) -> Self {
        self.use_case = use_case.into();
        self
    }

    /// Read a file from disk. The media type is guessed from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                AgentError::Validation(format!("not a file path: {}", path.display()))
            })?;
        let content = tokio::fs::read(path).await?;
        Ok(Self::new(name, content, guess_media_type(path)))
    }

    pub fn to_wire(&self) -> Value {
        json!({
            "name": self.name,
            "source": {
                "byteContent": {
                    "data": base64::engine::general_purpose::STANDARD.encode(&self.content),
                    "mediaType": self.media_type,
                },
                "sourceType": "BYTE_CONTENT",
            },
            "useCase": self.use_case,
        })
    }
}

/// A file generated remotely. Never written to disk unless `save` is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub name: String,
    pub content: Vec<u8>,
    pub media_type: String,
}

impl OutputFile {
    pub fn new(name: impl Into<String>, content: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content,
            media_type: media_type.into(),
        }
    }

    /// Parse `{name, bytes: <base64>, type}`. Missing fields become empty.
    pub fn from_wire(value: &Value) -> Result<Self, RuntimeError> {
        let content = match value["bytes"].as_str() {
            Some(encoded) => base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| RuntimeError::Parse(format!("file bytes: {e}")))?,
            None => Vec::new(),
        };
        Ok(Self {
            name: value["name"].as_str().unwrap_or("").to_string(),
            content,
            media_type: value["type"].as_str().unwrap_or("").to_string(),
        })
    }

    /// Write the file into `dir` under its own name. Returns the written path.
    pub async fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf, AgentError> {
        // Only the final component of a remote-supplied name is trusted.
        let file_name = Path::new(&self.name)
            .file_name()
            .ok_or_else(|| AgentError::Validation(format!("invalid file name: {:?}", self.name)))?;
        let path = dir.as_ref().join(file_name);
        tokio::fs::write(&path, &self.content).await?;
        Ok(path)
    }
}

fn guess_media_type(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => "text/csv",
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "py" => "text/x-python",
        _ => "application/octet-stream",
    }
    .to_string()
}
