//! Response objects.
//!
//! Commands and request handlers fill one of these in; a transmitter then
//! serializes it. The variant decides which transmitter method is used
//! (see [`ResponseObject::method_key`]).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{DispatchError, ErrorKind};

/// The in-progress or finished response for one command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseObject {
    Info(InfoResponse),
    Version(VersionResponse),
    Status(StatusResponse),
    Text(TextResponse),
    Data(DataResponse),
    Error(ErrorResponse),
}

impl ResponseObject {
    /// Transmitter method that serializes this response.
    ///
    /// Data responses use their response type (`dds`, `das`, ...), the rest
    /// use the variant name.
    pub fn method_key(&self) -> &str {
        match self {
            Self::Info(_) => "info",
            Self::Version(_) => "version",
            Self::Status(_) => "status",
            Self::Text(_) => "text",
            Self::Data(data) => &data.kind,
            Self::Error(_) => "error",
        }
    }

    pub fn as_info_mut(&mut self) -> Option<&mut InfoResponse> {
        match self {
            Self::Info(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_version_mut(&mut self) -> Option<&mut VersionResponse> {
        match self {
            Self::Version(version) => Some(version),
            _ => None,
        }
    }

    pub fn as_data_mut(&mut self) -> Option<&mut DataResponse> {
        match self {
            Self::Data(data) => Some(data),
            _ => None,
        }
    }
}

// ============================================================================
// Info
// ============================================================================

/// Generic tagged items grouped into named sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InfoResponse {
    pub title: String,
    pub sections: Vec<InfoSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfoSection {
    pub name: String,
    pub entries: Vec<InfoEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfoEntry {
    pub key: String,
    pub value: String,
}

impl InfoResponse {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            sections: Vec::new(),
        }
    }

    /// Adds an empty section unless one with this name exists.
    pub fn add_section(&mut self, name: &str) {
        if self.section(name).is_none() {
            self.sections.push(InfoSection {
                name: name.to_string(),
                entries: Vec::new(),
            });
        }
    }

    pub fn section(&self, name: &str) -> Option<&InfoSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Appends an entry to a section, creating the section at the end if
    /// absent.
    pub fn add(&mut self, section: &str, key: impl Into<String>, value: impl Into<String>) {
        let entry = InfoEntry {
            key: key.into(),
            value: value.into(),
        };
        match self.sections.iter_mut().find(|s| s.name == section) {
            Some(existing) => existing.entries.push(entry),
            None => self.sections.push(InfoSection {
                name: section.to_string(),
                entries: vec![entry],
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.entries.is_empty())
    }
}

// ============================================================================
// Version
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleVersion {
    pub name: String,
    pub version: String,
}

/// Versions of the server and every module that answered `show.version`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VersionResponse {
    pub modules: Vec<ModuleVersion>,
}

impl VersionResponse {
    pub fn add_module(&mut self, name: impl Into<String>, version: impl Into<String>) {
        self.modules.push(ModuleVersion {
            name: name.into(),
            version: version.into(),
        });
    }
}

// ============================================================================
// Status / Text
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusResponse {
    pub started: DateTime<Utc>,
    pub uptime_secs: u64,
    /// Connections accepted since start, including the current one
    pub connections: u64,
    pub pid: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextResponse {
    pub text: String,
}

// ============================================================================
// Data
// ============================================================================

/// Output of a `get`: one item per container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataResponse {
    /// Response type requested (`dds`, `das`, `dmr`, `data`)
    pub kind: String,
    pub definition: String,
    pub items: Vec<DataItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataItem {
    pub container: String,
    pub content_type: String,
    #[serde(skip)]
    pub content: Vec<u8>,
    pub size: usize,
}

impl DataResponse {
    pub fn new(kind: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            definition: definition.into(),
            items: Vec::new(),
        }
    }

    pub fn push(
        &mut self,
        container: impl Into<String>,
        content_type: impl Into<String>,
        content: Vec<u8>,
    ) {
        let size = content.len();
        self.items.push(DataItem {
            container: container.into(),
            content_type: content_type.into(),
            content,
            size,
        });
    }
}

// ============================================================================
// Error
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation_url: Option<String>,
}

impl ErrorResponse {
    pub fn from_dispatch(error: &DispatchError, annotation_url: Option<&str>) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            annotation_url: annotation_url.map(str::to_string),
        }
    }
}
