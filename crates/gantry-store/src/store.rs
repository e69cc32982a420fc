use std::path::Path;

use anyhow::{Context, Result};
use gantry_core::{ChatSession, DocumentReference, KnowledgeDocument, LlmSettings, RobotProfile};
use parking_lot::Mutex;
use rusqlite::{Connection, params};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::migrations::MIGRATIONS;

const LLM_SETTINGS_KEY: &str = "llm_settings";
const CURRENT_SESSION_KEY: &str = "current_session";
const DOCUMENTS_KEY: &str = "documents";
const DOCUMENT_REFERENCES_KEY: &str = "document_references";
const ROBOT_PROFILE_KEY: &str = "robot_profile";

/// JSON-blob key-value store backing the workbench. Every value is written
/// wholesale on mutation; the last writer wins.
pub struct WorkbenchStore {
    conn: Mutex<Connection>,
}

impl WorkbenchStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create parent dir for {}", path.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite db {}", path.display()))?;

        for sql in MIGRATIONS {
            conn.execute(sql, [])
                .with_context(|| format!("failed migration sql: {sql}"))?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn save_llm_settings(&self, settings: &LlmSettings) -> Result<()> {
        self.set_json(LLM_SETTINGS_KEY, settings)
    }

    pub fn load_llm_settings_or_default(&self) -> Result<LlmSettings> {
        Ok(self.get_json(LLM_SETTINGS_KEY)?.unwrap_or_default())
    }

    pub fn save_documents(&self, documents: &[KnowledgeDocument]) -> Result<()> {
        self.set_json(DOCUMENTS_KEY, &documents)
    }

    pub fn load_documents(&self) -> Result<Vec<KnowledgeDocument>> {
        Ok(self.get_json(DOCUMENTS_KEY)?.unwrap_or_default())
    }

    pub fn save_document_references(&self, references: &[DocumentReference]) -> Result<()> {
        self.set_json(DOCUMENT_REFERENCES_KEY, &references)
    }

    pub fn load_document_references(&self) -> Result<Vec<DocumentReference>> {
        Ok(self.get_json(DOCUMENT_REFERENCES_KEY)?.unwrap_or_default())
    }

    pub fn save_current_session(&self, session: &ChatSession) -> Result<()> {
        self.set_json(CURRENT_SESSION_KEY, session)
    }

    pub fn load_current_session(&self) -> Result<Option<ChatSession>> {
        self.get_json(CURRENT_SESSION_KEY)
    }

    pub fn clear_current_session(&self) -> Result<()> {
        self.remove(CURRENT_SESSION_KEY)
    }

    pub fn save_robot_profile(&self, profile: &RobotProfile) -> Result<()> {
        self.set_json(ROBOT_PROFILE_KEY, profile)
    }

    pub fn load_robot_profile(&self) -> Result<RobotProfile> {
        Ok(self.get_json(ROBOT_PROFILE_KEY)?.unwrap_or_default())
    }

    pub fn clear_robot_profile(&self) -> Result<()> {
        self.remove(ROBOT_PROFILE_KEY)
    }

    fn set_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO blobs (key, value_json) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
            params![key, serde_json::to_string(value)?],
        )?;
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT value_json FROM blobs WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;

        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let value_json: String = row.get(0)?;
        match serde_json::from_str(&value_json) {
            Ok(value) => Ok(Some(value)),
            Err(error) => {
                // A corrupt blob degrades to the caller's default instead of
                // poisoning every read of this key.
                warn!(key, %error, "discarding unparseable blob");
                Ok(None)
            }
        }
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM blobs WHERE key = ?1", params![key])?;
        Ok(())
    }
}
