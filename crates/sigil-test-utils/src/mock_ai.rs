// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock AI provider and text generator with scripted replies.
//!
//! Replies are popped from a FIFO queue. When the queue is empty the
//! provider echoes the prompt and the generator fails.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use sigil_core::types::AiRequest;
use sigil_core::{AiProvider, ProviderTag, SigilError, TextGenerator};

/// A scripted [`AiProvider`] that records every request.
pub struct MockAiProvider {
    tag: ProviderTag,
    replies: Arc<Mutex<VecDeque<Result<String, String>>>>,
    requests: Arc<Mutex<Vec<AiRequest>>>,
}

impl MockAiProvider {
    pub fn new(tag: ProviderTag) -> Self {
        Self {
            tag,
            replies: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_replies(tag: ProviderTag, replies: Vec<&str>) -> Self {
        let provider = Self::new(tag);
        if let Ok(mut queue) = provider.replies.try_lock() {
            queue.extend(replies.into_iter().map(|r| Ok(r.to_string())));
        }
        provider
    }

    pub async fn push_reply(&self, reply: &str) {
        self.replies.lock().await.push_back(Ok(reply.to_string()));
    }

    /// The next completion fails with a provider error.
    pub async fn push_failure(&self, message: &str) {
        self.replies.lock().await.push_back(Err(message.to_string()));
    }

    pub async fn requests(&self) -> Vec<AiRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    fn tag(&self) -> ProviderTag {
        self.tag
    }

    async fn complete(&self, request: AiRequest) -> Result<String, SigilError> {
        let prompt = request.prompt.clone();
        self.requests.lock().await.push(request);
        match self.replies.lock().await.pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(SigilError::Provider {
                message,
                source: None,
            }),
            None => Ok(format!("[{}] {prompt}", self.tag)),
        }
    }
}

/// A scripted [`TextGenerator`].
pub struct MockTextGenerator {
    replies: Arc<Mutex<VecDeque<String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockTextGenerator {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn push_reply(&self, reply: &str) {
        self.replies.lock().await.push_back(reply.to_string());
    }

    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

impl Default for MockTextGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, _system: &str, prompt: &str) -> Result<String, SigilError> {
        self.prompts.lock().await.push(prompt.to_string());
        self.replies
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| SigilError::Provider {
                message: "no scripted reply".into(),
                source: None,
            })
    }
}
