// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible chat-completions provider for the Sigil bot runtime.
//!
//! One [`ChatProvider`] serves one configured endpoint. It answers AI
//! commands and thread continuations through [`AiProvider`] and the event
//! extraction fallback through [`TextGenerator`].

pub mod client;
pub mod types;

use async_trait::async_trait;
use sigil_config::model::{AiConfig, ProviderEndpointConfig};
use sigil_core::types::{AiRequest, HealthStatus, TurnRole};
use sigil_core::{AiProvider, PluginAdapter, ProviderTag, SigilError, TextGenerator};
use tracing::{debug, info};

use crate::client::ChatClient;
use crate::types::{ChatMessage, ChatRequest};

pub struct ChatProvider {
    tag: ProviderTag,
    client: ChatClient,
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl ChatProvider {
    /// Creates the provider for `tag`, or `None` when it has no API key.
    pub fn from_config(ai: &AiConfig, tag: ProviderTag) -> Result<Option<Self>, SigilError> {
        let endpoint = ai.endpoint(tag);
        if !endpoint.is_enabled() {
            debug!(provider = %tag, "provider disabled, no API key");
            return Ok(None);
        }
        Self::new(tag, endpoint, &ai.system_prompt).map(Some)
    }

    pub fn new(
        tag: ProviderTag,
        endpoint: &ProviderEndpointConfig,
        system_prompt: &str,
    ) -> Result<Self, SigilError> {
        let api_key = endpoint
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| SigilError::Config(format!("ai.{tag}.api_key is not set")))?;
        let client = ChatClient::new(&endpoint.base_url, api_key)?;
        info!(provider = %tag, model = %endpoint.model, endpoint = client.endpoint(), "AI provider initialized");
        Ok(Self {
            tag,
            client,
            model: endpoint.model.clone(),
            max_tokens: endpoint.max_tokens,
            system_prompt: system_prompt.to_string(),
        })
    }

    fn build_request(&self, request: &AiRequest) -> ChatRequest {
        let mut messages = vec![ChatMessage::system(&self.system_prompt)];
        messages.extend(request.history.iter().map(|turn| match turn.role {
            TurnRole::User => ChatMessage::user(&turn.content),
            TurnRole::Assistant => ChatMessage::assistant(&turn.content),
        }));
        let prompt = match request.quoted.as_deref().filter(|q| !q.trim().is_empty()) {
            Some(quoted) => format!("Quoted message:\n{quoted}\n\n{}", request.prompt),
            None => request.prompt.clone(),
        };
        messages.push(ChatMessage::user(prompt));
        ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
            user: request.requester.clone(),
        }
    }

    async fn send(&self, request: &ChatRequest) -> Result<String, SigilError> {
        let response = self.client.complete(request).await?;
        if let Some(usage) = response.usage {
            debug!(
                provider = %self.tag,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion usage"
            );
        }
        response.text().ok_or_else(|| SigilError::Provider {
            message: "the AI returned an empty answer".into(),
            source: None,
        })
    }
}

#[async_trait]
impl AiProvider for ChatProvider {
    fn tag(&self) -> ProviderTag {
        self.tag
    }

    async fn complete(&self, request: AiRequest) -> Result<String, SigilError> {
        let chat = self.build_request(&request);
        self.send(&chat).await
    }
}

#[async_trait]
impl TextGenerator for ChatProvider {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, SigilError> {
        let chat = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(prompt)],
            max_tokens: self.max_tokens,
            user: None,
        };
        self.send(&chat).await
    }
}

#[async_trait]
impl PluginAdapter for ChatProvider {
    fn name(&self) -> &str {
        match self.tag {
            ProviderTag::OpenAi => "openai",
            ProviderTag::Claude => "claude",
        }
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, SigilError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SigilError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigil_core::types::AiTurn;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn endpoint(base_url: &str) -> ProviderEndpointConfig {
        ProviderEndpointConfig {
            api_key: Some("sk-test".into()),
            base_url: base_url.to_string(),
            model: "test-model".into(),
            max_tokens: 128,
        }
    }

    fn answer(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": text}}]
        }))
    }

    #[test]
    fn disabled_without_api_key() {
        let ai = AiConfig::default();
        assert!(ChatProvider::from_config(&ai, ProviderTag::OpenAi)
            .unwrap()
            .is_none());
    }

    #[test]
    fn request_replays_history_and_quote() {
        let provider =
            ChatProvider::new(ProviderTag::OpenAi, &endpoint("http://localhost"), "be brief")
                .unwrap();
        let chat = provider.build_request(&AiRequest {
            prompt: "and then?".into(),
            history: vec![
                AiTurn {
                    role: TurnRole::User,
                    content: "what is rust".into(),
                },
                AiTurn {
                    role: TurnRole::Assistant,
                    content: "a language".into(),
                },
            ],
            quoted: Some("a language".into()),
            requester: Some("Alice".into()),
        });
        let roles: Vec<&str> = chat.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(chat.messages[0].content, "be brief");
        assert!(chat.messages[3].content.starts_with("Quoted message:\na language"));
        assert!(chat.messages[3].content.ends_with("and then?"));
        assert_eq!(chat.user.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn completes_through_the_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({"model": "test-model", "max_tokens": 128})))
            .respond_with(answer("Rust is a systems language."))
            .mount(&server)
            .await;

        let provider =
            ChatProvider::new(ProviderTag::Claude, &endpoint(&server.uri()), "sys").unwrap();
        let reply = provider
            .complete(AiRequest {
                prompt: "what is rust".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(reply, "Rust is a systems language.");
        assert_eq!(provider.tag(), ProviderTag::Claude);
    }

    #[tokio::test]
    async fn empty_answer_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(answer(""))
            .mount(&server)
            .await;

        let provider =
            ChatProvider::new(ProviderTag::OpenAi, &endpoint(&server.uri()), "sys").unwrap();
        let err = provider.generate("extract", "Meetup").await.unwrap_err();
        assert!(matches!(err, SigilError::Provider { .. }));
    }
}
