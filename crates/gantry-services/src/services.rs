use std::{path::PathBuf, sync::Arc};

use anyhow::{Result, anyhow, bail};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use gantry_ai::{
    ChatCompletionRequest, ChatTurn, CompletionError, OpenAiCompatibleClient, ProviderRegistry,
};
use gantry_core::{
    ChatMessage, ChatSession, DocumentPatch, DocumentReference, KnowledgeDocument, KnowledgeStats,
    LlmProviderKind, LlmSettings, MAX_DOCUMENT_BYTES, MessageContent, MessagePart, MessageRole,
    RobotClassification, RobotInformation, RobotProfile,
};
use gantry_store::WorkbenchStore;
use parking_lot::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Prompt prepended on the first user turn of a session.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant for a cybersecurity robot platform. \
You can help with robot security assessments, classification, and general questions about \
robotics cybersecurity.";

pub struct WorkbenchServicesBuilder {
    pub db_path: PathBuf,
    registry: Option<ProviderRegistry>,
}

impl WorkbenchServicesBuilder {
    pub fn new(db_path: PathBuf) -> Self {
        Self {
            db_path,
            registry: None,
        }
    }

    /// Swap in a custom registry; tests use this to script completions.
    pub fn with_registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Result<WorkbenchServices> {
        let store = WorkbenchStore::open(self.db_path)?;
        let settings = store.load_llm_settings_or_default()?;

        let registry = self.registry.unwrap_or_else(|| {
            let client = Arc::new(OpenAiCompatibleClient::new());
            let mut registry = ProviderRegistry::default();
            registry.register(LlmProviderKind::OpenAi, client.clone());
            registry.register(LlmProviderKind::Azure, client.clone());
            registry.register(LlmProviderKind::Custom, client);
            registry
        });

        Ok(WorkbenchServices {
            store: Arc::new(store),
            settings: Arc::new(Mutex::new(settings)),
            registry: Arc::new(registry),
        })
    }
}

#[derive(Clone)]
pub struct WorkbenchServices {
    store: Arc<WorkbenchStore>,
    settings: Arc<Mutex<LlmSettings>>,
    registry: Arc<ProviderRegistry>,
}

impl WorkbenchServices {
    // ---- LLM settings ----

    pub fn llm_settings(&self) -> LlmSettings {
        self.settings.lock().clone()
    }

    pub fn save_llm_settings(&self, settings: &LlmSettings) -> Result<()> {
        self.store.save_llm_settings(settings)?;
        *self.settings.lock() = settings.clone();
        Ok(())
    }

    pub fn is_llm_configured(&self) -> bool {
        self.settings.lock().is_configured()
    }

    // ---- knowledge base ----

    pub fn add_document(
        &self,
        name: impl Into<String>,
        bytes: &[u8],
        mime_type: impl Into<String>,
    ) -> Result<KnowledgeDocument> {
        let name = name.into();
        let mime_type = mime_type.into();

        if !mime_type.contains("pdf") {
            bail!("only PDF documents can be added to the knowledge base");
        }
        if bytes.len() as u64 > MAX_DOCUMENT_BYTES {
            bail!(
                "document {} exceeds the {} MB upload limit",
                name,
                MAX_DOCUMENT_BYTES / (1024 * 1024)
            );
        }

        let mut document =
            KnowledgeDocument::new(&name, mime_type, bytes.len() as u64, BASE64.encode(bytes));
        document.description = Some(format!(
            "Uploaded to knowledge base on {}",
            document.uploaded_at.format("%Y-%m-%d")
        ));
        document.extracted_text = match pdf_extract::extract_text_from_mem(bytes) {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(error) => {
                // Chat falls back to a placeholder for this document.
                warn!(document = %name, %error, "pdf text extraction failed");
                None
            }
        };

        let mut documents = self.store.load_documents()?;
        documents.push(document.clone());
        self.store.save_documents(&documents)?;

        info!(document = %name, size_bytes = document.size_bytes, "document added");
        Ok(document)
    }

    pub fn list_documents(&self) -> Result<Vec<KnowledgeDocument>> {
        self.store.load_documents()
    }

    pub fn document_by_id(&self, id: Uuid) -> Result<Option<KnowledgeDocument>> {
        Ok(self
            .store
            .load_documents()?
            .into_iter()
            .find(|document| document.id == id))
    }

    pub fn document_by_name(&self, name: &str) -> Result<Option<KnowledgeDocument>> {
        Ok(self
            .store
            .load_documents()?
            .into_iter()
            .find(|document| document.name == name))
    }

    pub fn update_document(&self, id: Uuid, patch: DocumentPatch) -> Result<KnowledgeDocument> {
        let mut documents = self.store.load_documents()?;
        let document = documents
            .iter_mut()
            .find(|document| document.id == id)
            .ok_or_else(|| anyhow!("document not found: {id}"))?;

        if let Some(name) = patch.name {
            document.name = name;
        }
        if let Some(description) = patch.description {
            document.description = Some(description);
        }
        if let Some(tags) = patch.tags {
            document.tags = tags;
        }

        let updated = document.clone();
        self.store.save_documents(&documents)?;
        Ok(updated)
    }

    /// Blank queries return the full list, matching the search box behavior.
    pub fn search_documents(&self, query: &str) -> Result<Vec<KnowledgeDocument>> {
        let documents = self.store.load_documents()?;
        if query.trim().is_empty() {
            return Ok(documents);
        }

        Ok(documents
            .into_iter()
            .filter(|document| document.matches_query(query))
            .collect())
    }

    pub fn document_stats(&self) -> Result<KnowledgeStats> {
        let documents = self.store.load_documents()?;
        let references = self.store.load_document_references()?;

        let mut referenced_ids = references
            .iter()
            .map(|reference| reference.document_id)
            .collect::<Vec<_>>();
        referenced_ids.sort();
        referenced_ids.dedup();

        Ok(KnowledgeStats {
            total_documents: documents.len(),
            total_size_bytes: documents.iter().map(|document| document.size_bytes).sum(),
            referenced_documents: referenced_ids.len(),
        })
    }

    pub fn references_for_document(&self, id: Uuid) -> Result<Vec<DocumentReference>> {
        Ok(self
            .store
            .load_document_references()?
            .into_iter()
            .filter(|reference| reference.document_id == id)
            .collect())
    }

    /// Deletes a document and every current-session message that attached it.
    /// Returns the number of messages removed.
    pub fn delete_document(&self, id: Uuid) -> Result<usize> {
        let mut documents = self.store.load_documents()?;
        let position = documents
            .iter()
            .position(|document| document.id == id)
            .ok_or_else(|| anyhow!("document not found: {id}"))?;
        let document = documents.remove(position);

        let removed = match self.store.load_current_session()? {
            Some(mut session) => {
                let removed = self
                    .remove_messages_referencing(&mut session, &[document.name.clone()])?;
                if removed > 0 {
                    self.save_session(&mut session)?;
                }
                removed
            }
            None => 0,
        };

        self.store.save_documents(&documents)?;
        let references = self
            .store
            .load_document_references()?
            .into_iter()
            .filter(|reference| reference.document_id != id)
            .collect::<Vec<_>>();
        self.store.save_document_references(&references)?;

        info!(document = %document.name, removed_messages = removed, "document deleted");
        Ok(removed)
    }

    /// Clear-all with the same per-document message cascade.
    pub fn clear_documents(&self) -> Result<usize> {
        let documents = self.store.load_documents()?;
        let names = documents
            .iter()
            .map(|document| document.name.clone())
            .collect::<Vec<_>>();

        let removed = match self.store.load_current_session()? {
            Some(mut session) if !names.is_empty() => {
                let removed = self.remove_messages_referencing(&mut session, &names)?;
                if removed > 0 {
                    self.save_session(&mut session)?;
                }
                removed
            }
            _ => 0,
        };

        self.store.save_documents(&[])?;
        self.store.save_document_references(&[])?;
        Ok(removed)
    }

    /// Linear scan/filter removing messages whose file parts name any of the
    /// given documents. Session references are rebuilt afterwards because the
    /// surviving message indexes shift.
    pub fn remove_messages_referencing(
        &self,
        session: &mut ChatSession,
        names: &[String],
    ) -> Result<usize> {
        let before = session.messages.len();
        session.messages.retain(|message| {
            !names
                .iter()
                .any(|name| message.content.references_file(name))
        });
        let removed = before - session.messages.len();

        if removed > 0 {
            self.rebuild_session_references(session)?;
        }
        Ok(removed)
    }

    fn rebuild_session_references(&self, session: &ChatSession) -> Result<()> {
        let documents = self.store.load_documents()?;
        let mut references = self
            .store
            .load_document_references()?
            .into_iter()
            .filter(|reference| reference.session_id != session.id)
            .collect::<Vec<_>>();

        for (index, message) in session.messages.iter().enumerate() {
            for file_name in message.content.file_names() {
                if let Some(document) = documents
                    .iter()
                    .find(|document| document.name == file_name)
                {
                    references.push(DocumentReference {
                        document_id: document.id,
                        session_id: session.id,
                        message_index: index,
                    });
                }
            }
        }

        self.store.save_document_references(&references)
    }

    // ---- chat session ----

    pub fn current_session(&self) -> Result<ChatSession> {
        if let Some(session) = self.store.load_current_session()? {
            return Ok(session);
        }
        self.new_session()
    }

    pub fn new_session(&self) -> Result<ChatSession> {
        let session = ChatSession::new();
        self.store.save_current_session(&session)?;
        Ok(session)
    }

    pub fn save_session(&self, session: &mut ChatSession) -> Result<()> {
        session.updated = chrono::Utc::now();
        self.store.save_current_session(session)
    }

    pub fn append_message(&self, session: &mut ChatSession, message: ChatMessage) -> Result<()> {
        session.messages.push(message);
        self.save_session(session)
    }

    pub fn clear_session(&self) -> Result<()> {
        self.store.clear_current_session()
    }

    // ---- chat flow ----

    /// Sends one user turn. The user message is persisted before the network
    /// call so the front-end can render it while the request is in flight; at
    /// most one assistant message is appended regardless of the outcome.
    pub async fn send_message(
        &self,
        session: &mut ChatSession,
        text: String,
        attachment: Option<Uuid>,
    ) -> Result<ChatMessage> {
        let settings = self.llm_settings();
        if !settings.is_configured() {
            return Err(CompletionError::NotConfigured.into());
        }

        let user_message = match attachment {
            Some(document_id) => {
                let document = self
                    .document_by_id(document_id)?
                    .ok_or_else(|| anyhow!("attached document not found: {document_id}"))?;
                ChatMessage::user_with_file(text, document.name)
            }
            None => ChatMessage::user(text),
        };

        self.append_message(session, user_message)?;

        if let Some(document_id) = attachment {
            let mut references = self.store.load_document_references()?;
            references.push(DocumentReference {
                document_id,
                session_id: session.id,
                message_index: session.messages.len() - 1,
            });
            self.store.save_document_references(&references)?;
        }

        let completion = self.complete_session(&settings, session).await?;
        let assistant_message = ChatMessage::assistant(completion);
        self.append_message(session, assistant_message.clone())?;

        info!(session_id = %session.id, turns = session.messages.len(), "chat completion saved");
        Ok(assistant_message)
    }

    /// Pops the trailing assistant reply and asks for a new one. Fails without
    /// touching the session when there is nothing to regenerate.
    pub async fn regenerate(&self, session: &mut ChatSession) -> Result<ChatMessage> {
        let settings = self.llm_settings();
        if !settings.is_configured() {
            return Err(CompletionError::NotConfigured.into());
        }

        match session.messages.last() {
            Some(message) if message.role == MessageRole::Assistant => {}
            _ => bail!("no assistant reply to regenerate"),
        }

        session.messages.pop();
        self.save_session(session)?;

        let completion = self.complete_session(&settings, session).await?;
        let assistant_message = ChatMessage::assistant(completion);
        self.append_message(session, assistant_message.clone())?;
        Ok(assistant_message)
    }

    async fn complete_session(
        &self,
        settings: &LlmSettings,
        session: &ChatSession,
    ) -> Result<String> {
        let documents = self.store.load_documents()?;

        let turns = session
            .messages
            .iter()
            .map(|message| ChatTurn {
                role: message.role,
                content: flatten_content(&message.content, &documents),
            })
            .collect::<Vec<_>>();

        // The system prompt rides along only on the opening exchange.
        let system_prompt = if turns.len() == 1 {
            Some(build_system_prompt(&documents))
        } else {
            None
        };

        let request = ChatCompletionRequest {
            model: settings.model.clone(),
            system_prompt,
            turns,
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        };

        let completion = self.registry.complete(settings, &request).await?;
        Ok(completion.content)
    }

    // ---- robot capture ----

    pub fn robot_profile(&self) -> Result<RobotProfile> {
        self.store.load_robot_profile()
    }

    pub fn set_robot_classification(
        &self,
        classification: RobotClassification,
    ) -> Result<RobotProfile> {
        let mut profile = self.store.load_robot_profile()?;
        profile.classification = Some(classification);
        self.store.save_robot_profile(&profile)?;
        Ok(profile)
    }

    pub fn set_robot_information(&self, information: RobotInformation) -> Result<RobotProfile> {
        let mut profile = self.store.load_robot_profile()?;
        profile.information = Some(information);
        self.store.save_robot_profile(&profile)?;
        Ok(profile)
    }

    pub fn clear_robot_profile(&self) -> Result<()> {
        self.store.clear_robot_profile()
    }
}

/// Substitutes file parts with the stored extracted text, or a placeholder
/// when extraction produced nothing, so the wire payload is plain text.
fn flatten_content(content: &MessageContent, documents: &[KnowledgeDocument]) -> String {
    match content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                MessagePart::Text { text } => text.clone(),
                MessagePart::File { name } => {
                    let extracted = documents
                        .iter()
                        .find(|document| document.name == *name)
                        .and_then(|document| document.extracted_text.as_deref());
                    match extracted {
                        Some(text) => format!("[Document: {name}]\n{text}"),
                        None => format!("[Attached document: {name} (content unavailable)]"),
                    }
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

fn build_system_prompt(documents: &[KnowledgeDocument]) -> String {
    if documents.is_empty() {
        return SYSTEM_PROMPT.to_owned();
    }

    let summary = documents
        .iter()
        .map(|document| match document.description.as_deref() {
            Some(description) => format!("{} ({})", document.name, description),
            None => document.name.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ");

    format!(
        "{SYSTEM_PROMPT}\n\nThe user maintains a knowledge base of {} document(s): {}. \
Uploaded documents may appear inline in the conversation.",
        documents.len(),
        summary
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gantry_ai::{ChatCompletionResponse, ChatProvider, categorize_failure};

    struct ScriptedProvider {
        reply: Option<String>,
        fail_status: Option<(u16, String)>,
        last_request: Arc<Mutex<Option<ChatCompletionRequest>>>,
    }

    impl ScriptedProvider {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_owned()),
                fail_status: None,
                last_request: Arc::new(Mutex::new(None)),
            }
        }

        fn failing(status: u16, body: &str) -> Self {
            Self {
                reply: None,
                fail_status: Some((status, body.to_owned())),
                last_request: Arc::new(Mutex::new(None)),
            }
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        async fn complete(
            &self,
            _settings: &LlmSettings,
            request: &ChatCompletionRequest,
        ) -> Result<ChatCompletionResponse, CompletionError> {
            *self.last_request.lock() = Some(request.clone());
            if let Some((status, body)) = &self.fail_status {
                return Err(categorize_failure(*status, body));
            }
            Ok(ChatCompletionResponse {
                content: self.reply.clone().unwrap_or_default(),
            })
        }
    }

    fn configured_settings() -> LlmSettings {
        LlmSettings {
            enabled: true,
            api_key: "sk-test".to_owned(),
            ..LlmSettings::default()
        }
    }

    fn scripted_services(
        provider: ScriptedProvider,
    ) -> (
        tempfile::TempDir,
        WorkbenchServices,
        Arc<Mutex<Option<ChatCompletionRequest>>>,
    ) {
        let dir = tempfile::tempdir().expect("tempdir");
        let last_request = provider.last_request.clone();

        let mut registry = ProviderRegistry::default();
        registry.register(LlmProviderKind::OpenAi, Arc::new(provider));

        let services = WorkbenchServicesBuilder::new(dir.path().join("workbench.db"))
            .with_registry(registry)
            .build()
            .expect("build services");
        services
            .save_llm_settings(&configured_settings())
            .expect("save settings");
        (dir, services, last_request)
    }

    fn plain_services() -> (tempfile::TempDir, WorkbenchServices) {
        let dir = tempfile::tempdir().expect("tempdir");
        let services = WorkbenchServicesBuilder::new(dir.path().join("workbench.db"))
            .build()
            .expect("build services");
        (dir, services)
    }

    #[test]
    fn upload_adds_one_document_discoverable_by_name() {
        let (_dir, services) = plain_services();

        let document = services
            .add_document("arm-firmware-audit.pdf", b"%PDF-1.4 stub", "application/pdf")
            .expect("add document");
        assert_eq!(services.list_documents().expect("list").len(), 1);

        let found = services
            .search_documents("arm-firmware-audit.pdf")
            .expect("search by exact name");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, document.id);

        // case-insensitive substring match, and blank query returns everything
        assert_eq!(
            services
                .search_documents("FIRMWARE")
                .expect("search substring")
                .len(),
            1
        );
        assert_eq!(services.search_documents("  ").expect("blank query").len(), 1);
        assert!(
            services
                .search_documents("bluetooth")
                .expect("search miss")
                .is_empty()
        );

        let stats = services.document_stats().expect("stats");
        assert_eq!(stats.total_documents, 1);
        assert_eq!(stats.total_size_bytes, document.size_bytes);
        assert_eq!(stats.referenced_documents, 0);
    }

    #[test]
    fn upload_rejects_wrong_type_and_oversized_files() {
        let (_dir, services) = plain_services();

        assert!(
            services
                .add_document("notes.txt", b"plain text", "text/plain")
                .is_err()
        );

        let oversized = vec![0_u8; (MAX_DOCUMENT_BYTES + 1) as usize];
        assert!(
            services
                .add_document("huge.pdf", &oversized, "application/pdf")
                .is_err()
        );

        assert!(services.list_documents().expect("list").is_empty());
    }

    #[test]
    fn update_and_lookup_documents() {
        let (_dir, services) = plain_services();
        let document = services
            .add_document("manual.pdf", b"%PDF-1.4 stub", "application/pdf")
            .expect("add document");

        let updated = services
            .update_document(
                document.id,
                DocumentPatch {
                    description: Some("Teardown notes".to_owned()),
                    tags: Some(vec!["teardown".to_owned()]),
                    ..DocumentPatch::default()
                },
            )
            .expect("patch document");
        assert_eq!(updated.description.as_deref(), Some("Teardown notes"));

        assert!(
            services
                .document_by_name("manual.pdf")
                .expect("lookup by name")
                .is_some()
        );
        assert_eq!(
            services
                .search_documents("teardown")
                .expect("search by tag")
                .len(),
            1
        );
        assert!(
            services
                .update_document(Uuid::new_v4(), DocumentPatch::default())
                .is_err()
        );
    }

    #[test]
    fn delete_document_removes_only_messages_naming_it() {
        let (_dir, services) = plain_services();
        let doomed = services
            .add_document("doomed.pdf", b"%PDF-1.4 stub", "application/pdf")
            .expect("add doomed");
        services
            .add_document("kept.pdf", b"%PDF-1.4 stub", "application/pdf")
            .expect("add kept");

        let mut session = services.current_session().expect("session");
        services
            .append_message(
                &mut session,
                ChatMessage::user_with_file("summarize", "doomed.pdf"),
            )
            .expect("append referencing message");
        services
            .append_message(&mut session, ChatMessage::user("unrelated question"))
            .expect("append plain message");
        services
            .append_message(
                &mut session,
                ChatMessage::user_with_file("compare", "kept.pdf"),
            )
            .expect("append other reference");

        let removed = services.delete_document(doomed.id).expect("delete");
        assert_eq!(removed, 1);

        let session = services.current_session().expect("reload session");
        assert_eq!(session.messages.len(), 2);
        assert!(
            session
                .messages
                .iter()
                .all(|message| !message.content.references_file("doomed.pdf"))
        );
        assert_eq!(services.list_documents().expect("list").len(), 1);

        assert!(services.delete_document(doomed.id).is_err());
    }

    #[test]
    fn clear_documents_cascades_every_reference() {
        let (_dir, services) = plain_services();
        services
            .add_document("a.pdf", b"%PDF-1.4 stub", "application/pdf")
            .expect("add a");
        services
            .add_document("b.pdf", b"%PDF-1.4 stub", "application/pdf")
            .expect("add b");

        let mut session = services.current_session().expect("session");
        services
            .append_message(&mut session, ChatMessage::user_with_file("x", "a.pdf"))
            .expect("append a");
        services
            .append_message(&mut session, ChatMessage::user_with_file("y", "b.pdf"))
            .expect("append b");
        services
            .append_message(&mut session, ChatMessage::user("plain"))
            .expect("append plain");

        let removed = services.clear_documents().expect("clear all");
        assert_eq!(removed, 2);
        assert!(services.list_documents().expect("list").is_empty());
        assert_eq!(
            services.current_session().expect("session").messages.len(),
            1
        );
    }

    #[test]
    fn send_message_persists_user_turn_even_when_provider_fails() {
        let (_dir, services, _) =
            scripted_services(ScriptedProvider::failing(429, "current quota exceeded"));

        let mut session = services.current_session().expect("session");
        let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
        let error = runtime
            .block_on(services.send_message(&mut session, "hello".to_owned(), None))
            .expect_err("provider failure surfaces");

        assert!(matches!(
            error.downcast_ref::<CompletionError>(),
            Some(CompletionError::QuotaExhausted)
        ));

        // the optimistic user turn survives, with no assistant turn
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, MessageRole::User);
        let persisted = services.current_session().expect("reload session");
        assert_eq!(persisted.messages.len(), 1);
    }

    #[test]
    fn send_message_appends_one_assistant_reply_and_tracks_references() {
        let (_dir, services, last_request) =
            scripted_services(ScriptedProvider::replying("assessment ready"));
        let document = services
            .add_document("threat-model.pdf", b"%PDF-1.4 stub", "application/pdf")
            .expect("add document");

        let mut session = services.current_session().expect("session");
        let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
        let reply = runtime
            .block_on(services.send_message(
                &mut session,
                "what stands out?".to_owned(),
                Some(document.id),
            ))
            .expect("completion");

        assert_eq!(session.messages.len(), 2);
        assert_eq!(reply.role, MessageRole::Assistant);
        assert_eq!(
            reply.content,
            MessageContent::Text("assessment ready".to_owned())
        );

        let request = last_request.lock().clone().expect("request captured");
        let system_prompt = request.system_prompt.expect("first turn system prompt");
        assert!(system_prompt.starts_with(SYSTEM_PROMPT));
        assert!(system_prompt.contains("threat-model.pdf"));
        // the stub is not parseable, so the file part flattens to a placeholder
        assert!(request.turns[0].content.contains("threat-model.pdf"));
        assert!(request.turns[0].content.contains("content unavailable"));

        assert_eq!(
            services
                .references_for_document(document.id)
                .expect("references")
                .len(),
            1
        );
        assert_eq!(
            services
                .document_stats()
                .expect("stats")
                .referenced_documents,
            1
        );

        // follow-up turns carry no system prompt
        runtime
            .block_on(services.send_message(&mut session, "go on".to_owned(), None))
            .expect("second completion");
        let request = last_request.lock().clone().expect("second request");
        assert!(request.system_prompt.is_none());
        assert_eq!(request.turns.len(), 3);
    }

    #[test]
    fn send_message_requires_configuration() {
        let (_dir, services) = plain_services();
        let mut session = services.current_session().expect("session");
        let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
        let error = runtime
            .block_on(services.send_message(&mut session, "hi".to_owned(), None))
            .expect_err("unconfigured send fails");
        assert!(matches!(
            error.downcast_ref::<CompletionError>(),
            Some(CompletionError::NotConfigured)
        ));
        assert!(session.messages.is_empty());
    }

    #[test]
    fn regenerate_fails_without_trailing_assistant_and_keeps_session() {
        let (_dir, services, _) = scripted_services(ScriptedProvider::replying("take two"));
        let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");

        let mut session = services.current_session().expect("session");
        assert!(runtime.block_on(services.regenerate(&mut session)).is_err());
        assert!(session.messages.is_empty());

        services
            .append_message(&mut session, ChatMessage::user("only a question"))
            .expect("append user");
        assert!(runtime.block_on(services.regenerate(&mut session)).is_err());
        assert_eq!(session.messages.len(), 1);

        services
            .append_message(&mut session, ChatMessage::assistant("first answer"))
            .expect("append assistant");
        let reply = runtime
            .block_on(services.regenerate(&mut session))
            .expect("regenerate");
        assert_eq!(session.messages.len(), 2);
        assert_eq!(reply.content, MessageContent::Text("take two".to_owned()));
    }

    #[test]
    fn robot_profile_roundtrip() {
        let (_dir, services) = plain_services();

        services
            .set_robot_classification(RobotClassification {
                category: "industrial".to_owned(),
                kind: "articulated arm".to_owned(),
                description: "six-axis welding arm".to_owned(),
            })
            .expect("set classification");
        let profile = services
            .set_robot_information(RobotInformation {
                name: "WeldMaster 3000".to_owned(),
                firmware_version: "4.2.0".to_owned(),
                main_function: "spot welding".to_owned(),
                description: "line 7 welder".to_owned(),
            })
            .expect("set information");

        assert!(profile.classification.is_some());
        assert!(profile.information.is_some());

        services.clear_robot_profile().expect("clear profile");
        let profile = services.robot_profile().expect("reload profile");
        assert!(profile.classification.is_none());
        assert!(profile.information.is_none());
    }

    #[test]
    fn session_lifecycle_and_flatten() {
        let (_dir, services) = plain_services();

        let session = services.current_session().expect("create session");
        let again = services.current_session().expect("reload session");
        assert_eq!(session.id, again.id);

        let fresh = services.new_session().expect("new session");
        assert_ne!(fresh.id, session.id);

        services.clear_session().expect("clear");
        let replacement = services.current_session().expect("recreate");
        assert_ne!(replacement.id, fresh.id);

        let mut document = KnowledgeDocument::new("spec.pdf", "application/pdf", 3, "YWJj");
        document.extracted_text = Some("torque limits".to_owned());
        let flattened = flatten_content(
            &ChatMessage::user_with_file("check this", "spec.pdf").content,
            &[document],
        );
        assert!(flattened.contains("[Document: spec.pdf]"));
        assert!(flattened.contains("torque limits"));
        assert!(flattened.contains("check this"));
    }
}
