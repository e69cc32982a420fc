use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upload ceiling for knowledge base documents.
pub const MAX_DOCUMENT_BYTES: u64 = 32 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub id: Uuid,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub content_base64: String,
    pub uploaded_at: DateTime<Utc>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub extracted_text: Option<String>,
}

impl KnowledgeDocument {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size_bytes: u64,
        content_base64: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            mime_type: mime_type.into(),
            size_bytes,
            content_base64: content_base64.into(),
            uploaded_at: Utc::now(),
            description: None,
            tags: Vec::new(),
            extracted_text: None,
        }
    }

    /// Case-insensitive substring match over name, description and tags.
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.name.to_lowercase().contains(&query)
            || self
                .description
                .as_deref()
                .is_some_and(|text| text.to_lowercase().contains(&query))
            || self
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(&query))
    }
}

/// Metadata edit; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Bookkeeping row linking a document to the session message that attached it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentReference {
    pub document_id: Uuid,
    pub session_id: Uuid,
    pub message_index: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct KnowledgeStats {
    pub total_documents: usize,
    pub total_size_bytes: u64,
    pub referenced_documents: usize,
}
