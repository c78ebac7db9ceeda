// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Sigil bot runtime.
//!
//! This crate provides the error type, the normalized message model and the
//! trait seams (messenger, AI providers, event sink, credential issuer,
//! usage recorder) that the transport, dispatcher and conversation flows
//! are built against.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::SigilError;
pub use types::{
    ActorId, BotIdentity, ConversationId, HealthStatus, Inbound, Message, OutboundMessage,
    ProviderTag, Reaction,
};

pub use traits::{
    AiProvider, CredentialIssuer, EventSink, Messenger, PluginAdapter, TextGenerator,
    UsageRecorder,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Mention, QuoteRef, Sender, MENTION_PLACEHOLDER};

    fn bot() -> BotIdentity {
        BotIdentity::new("+15550000000", Some("bot-uuid".into()))
    }

    fn message(text: &str) -> Message {
        Message {
            sender: Sender {
                id: ActorId::new("user-uuid"),
                number: Some("+15551112222".into()),
                display_name: Some("Alice".into()),
            },
            conversation: ConversationId::Group("group-1".into()),
            text: text.into(),
            timestamp: 1_700_000_000_000,
            reply_to: None,
            attachments: vec![],
            mentions: vec![],
        }
    }

    #[test]
    fn only_daemon_failures_are_fatal() {
        let fatal = SigilError::ReconnectExhausted { attempts: 5 };
        assert!(fatal.is_fatal());

        let start = SigilError::DaemonStartTimeout {
            endpoint: "/tmp/sock".into(),
            waited: std::time::Duration::from_secs(30),
        };
        assert!(start.is_fatal());

        assert!(!SigilError::ConnectionLost("eof".into()).is_fatal());
        assert!(!SigilError::handler("x", "boom").is_fatal());
        assert!(!SigilError::Parse("bad".into()).is_fatal());
    }

    #[test]
    fn user_message_hides_internal_detail() {
        let err = SigilError::ConnectionLost("broken pipe (os error 32)".into());
        assert!(!err.user_message().contains("os error"));

        let err = SigilError::handler("weather", "city not found");
        assert_eq!(err.user_message(), "city not found");
    }

    #[test]
    fn bot_identity_matches_number_and_uuid() {
        let bot = bot();
        assert!(bot.is_self("+15550000000"));
        assert!(bot.is_self("bot-uuid"));
        assert!(!bot.is_self("+15559999999"));
        assert!(!bot.is_self(""));
    }

    #[test]
    fn quote_of_bot_is_detected_by_uuid_or_number() {
        let mut msg = message("go on");
        assert!(!msg.quotes_identity(&bot()));

        msg.reply_to = Some(QuoteRef {
            timestamp: 1,
            author: Some(ActorId::new("bot-uuid")),
            author_number: None,
            text: Some("earlier answer".into()),
            attachments: vec![],
        });
        assert!(msg.quotes_identity(&bot()));

        msg.reply_to = Some(QuoteRef {
            timestamp: 1,
            author: None,
            author_number: Some("+15550000000".into()),
            text: None,
            attachments: vec![],
        });
        assert!(msg.quotes_identity(&bot()));
    }

    #[test]
    fn mention_detection_and_plain_text() {
        let mut msg = message(&format!("{MENTION_PLACEHOLDER} what is  rust?"));
        msg.mentions.push(Mention {
            actor: ActorId::new("bot-uuid"),
            number: None,
            name: Some("sigil".into()),
            start: 0,
            length: 1,
        });
        assert!(msg.mentions_identity(&bot()));
        assert_eq!(msg.plain_text(), "what is rust?");
    }

    #[test]
    fn reply_targets_origin_conversation() {
        let msg = message("!ping");
        let out = OutboundMessage::reply(&msg, "pong");
        assert_eq!(out.conversation, ConversationId::Group("group-1".into()));
        let quote = out.quote.expect("reply quotes the original");
        assert_eq!(quote.author, "+15551112222");
        assert_eq!(quote.timestamp, msg.timestamp);

        let mut direct = message("!ping");
        direct.conversation = ConversationId::Direct(direct.sender.id.clone());
        let out = OutboundMessage::reply(&direct, "pong");
        assert!(!out.conversation.is_group());
    }

    #[test]
    fn provider_tag_round_trips() {
        use std::str::FromStr;

        for tag in [ProviderTag::OpenAi, ProviderTag::Claude] {
            let parsed = ProviderTag::from_str(&tag.to_string()).expect("should parse back");
            assert_eq!(tag, parsed);
        }
        assert_eq!(ProviderTag::from_str("OpenAI").ok(), Some(ProviderTag::OpenAi));
        assert_eq!(
            serde_json::to_string(&ProviderTag::OpenAi).expect("serialize"),
            "\"openai\""
        );
    }

    #[test]
    fn conversation_keys_are_distinct_per_kind() {
        let group = ConversationId::Group("abc".into());
        let direct = ConversationId::Direct(ActorId::new("abc"));
        assert_ne!(group.key(), direct.key());
        assert_eq!(group.group_id(), Some("abc"));
        assert_eq!(direct.group_id(), None);
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_messenger<T: Messenger>() {}
        fn _assert_ai_provider<T: AiProvider>() {}
        fn _assert_text_generator<T: TextGenerator>() {}
        fn _assert_event_sink<T: EventSink>() {}
        fn _assert_issuer<T: CredentialIssuer>() {}
        fn _assert_usage<T: UsageRecorder>() {}
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
    }
}
