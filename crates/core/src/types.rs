use serde::{Deserialize, Serialize};
use std::fmt;

/// One entry of a structure journal.
///
/// Serializes as `{"operation": "UPDATE_OR_APPEND", "contentId": ..., "parentContentId": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamStructure {
    #[serde(rename_all = "camelCase")]
    UpdateOrAppend {
        content_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_content_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Remove {
        content_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_content_id: Option<String>,
    },
    ClearAll,
    #[serde(rename_all = "camelCase")]
    RequiredContent { content_id: String },
}

/// Operation kind without its arguments, used for counters and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    UpdateOrAppend,
    Remove,
    ClearAll,
    RequiredContent,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::UpdateOrAppend => "UPDATE_OR_APPEND",
            Operation::Remove => "REMOVE",
            Operation::ClearAll => "CLEAR_ALL",
            Operation::RequiredContent => "REQUIRED_CONTENT",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StreamStructure {
    pub fn append(content_id: impl Into<String>, parent_content_id: Option<&str>) -> Self {
        StreamStructure::UpdateOrAppend {
            content_id: content_id.into(),
            parent_content_id: parent_content_id.map(str::to_string),
        }
    }

    pub fn remove(content_id: impl Into<String>, parent_content_id: Option<&str>) -> Self {
        StreamStructure::Remove {
            content_id: content_id.into(),
            parent_content_id: parent_content_id.map(str::to_string),
        }
    }

    pub fn required(content_id: impl Into<String>) -> Self {
        StreamStructure::RequiredContent {
            content_id: content_id.into(),
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            StreamStructure::UpdateOrAppend { .. } => Operation::UpdateOrAppend,
            StreamStructure::Remove { .. } => Operation::Remove,
            StreamStructure::ClearAll => Operation::ClearAll,
            StreamStructure::RequiredContent { .. } => Operation::RequiredContent,
        }
    }

    /// `None` only for `CLEAR_ALL`.
    pub fn content_id(&self) -> Option<&str> {
        match self {
            StreamStructure::UpdateOrAppend { content_id, .. }
            | StreamStructure::Remove { content_id, .. }
            | StreamStructure::RequiredContent { content_id } => Some(content_id),
            StreamStructure::ClearAll => None,
        }
    }

    pub fn parent_content_id(&self) -> Option<&str> {
        match self {
            StreamStructure::UpdateOrAppend { parent_content_id, .. }
            | StreamStructure::Remove { parent_content_id, .. } => parent_content_id.as_deref(),
            _ => None,
        }
    }
}

/// Opaque content blob stored against a content id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Vec<u8>);

impl Payload {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadWithId {
    pub content_id: String,
    pub payload: Payload,
}

impl PayloadWithId {
    pub fn new(content_id: impl Into<String>, payload: Payload) -> Self {
        Self {
            content_id: content_id.into(),
            payload,
        }
    }
}

/// Marks the point in a session a page continuation was requested from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamToken {
    pub content_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub next_page_token: String,
}

impl StreamToken {
    pub fn new(content_id: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            parent_id: None,
            next_page_token: String::new(),
        }
    }
}

/// Where an incoming update came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationContext {
    #[serde(default)]
    pub continuation_token: Option<StreamToken>,
    #[serde(default)]
    pub requesting_session_id: Option<String>,
}

impl MutationContext {
    pub fn with_token(token: StreamToken) -> Self {
        Self {
            continuation_token: Some(token),
            requesting_session_id: None,
        }
    }

    pub fn requested_by(mut self, session_id: impl Into<String>) -> Self {
        self.requesting_session_id = Some(session_id.into());
        self
    }
}
