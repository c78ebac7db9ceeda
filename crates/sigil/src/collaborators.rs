// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File-backed event sink and link-based credential issuer used by `serve`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use sigil_core::types::EventRecord;
use sigil_core::{ActorId, CredentialIssuer, EventSink, SigilError};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// One line of the events file.
#[derive(Debug, Serialize)]
struct StoredEvent<'a> {
    id: &'a str,
    #[serde(flatten)]
    event: &'a EventRecord,
}

/// Appends each confirmed event as one JSON line.
pub struct JsonlEventSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlEventSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl EventSink for JsonlEventSink {
    async fn create_event(&self, event: &EventRecord) -> Result<String, SigilError> {
        let id = Uuid::new_v4().simple().to_string()[..8].to_string();
        let mut line = serde_json::to_string(&StoredEvent { id: &id, event })
            .map_err(|e| SigilError::Internal(format!("failed to encode event: {e}")))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error(&self.path, e))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| storage_error(&self.path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| storage_error(&self.path, e))?;
        file.flush().await.map_err(|e| storage_error(&self.path, e))?;

        info!(id = %id, name = %event.name, path = %self.path.display(), "event stored");
        Ok(format!("Saved as event {id}."))
    }
}

fn storage_error(path: &Path, e: std::io::Error) -> SigilError {
    SigilError::Internal(format!("could not write {}: {e}", path.display()))
}

/// Hands approved members the configured join link with a one-time code.
pub struct LinkIssuer {
    welcome_link: Option<String>,
}

impl LinkIssuer {
    pub fn new(welcome_link: Option<String>) -> Self {
        Self {
            welcome_link: welcome_link.filter(|l| !l.trim().is_empty()),
        }
    }
}

#[async_trait]
impl CredentialIssuer for LinkIssuer {
    async fn issue(&self, subject: &ActorId, display_name: &str) -> Result<String, SigilError> {
        let Some(link) = &self.welcome_link else {
            debug!(subject = %subject, "no welcome link configured");
            return Ok("An admin will send you the link to the main group shortly.".into());
        };
        let code = Uuid::new_v4().simple().to_string();
        info!(subject = %subject, name = %display_name, "credential issued");
        Ok(format!(
            "Here is your link to the main group: {link}\nYour one-time code: {code}"
        ))
    }
}
