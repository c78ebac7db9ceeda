// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI completion collaborators.

use async_trait::async_trait;

use crate::error::SigilError;
use crate::types::{AiRequest, ProviderTag};

/// A chat-completion backend that answers AI commands and thread follow-ups.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// The tag under which threads remember this provider.
    fn tag(&self) -> ProviderTag;

    /// Produces a reply for the request, including any thread history.
    async fn complete(&self, request: AiRequest) -> Result<String, SigilError>;
}

/// Free-form text generation used to repair partially parsed input.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates text for `prompt` under the given system instructions.
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, SigilError>;
}
