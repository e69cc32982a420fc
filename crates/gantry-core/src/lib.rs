pub mod chat;
pub mod document;
pub mod robot;
pub mod settings;

pub use chat::{ChatMessage, ChatSession, MessageContent, MessagePart, MessageRole};
pub use document::{
    DocumentPatch, DocumentReference, KnowledgeDocument, KnowledgeStats, MAX_DOCUMENT_BYTES,
};
pub use robot::{RobotClassification, RobotInformation, RobotProfile};
pub use settings::{LlmProviderKind, LlmSettings};
