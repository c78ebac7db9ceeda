// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admin authorization predicate consulted by admin-only commands.

use std::collections::HashSet;
use std::sync::Arc;

use sigil_core::{ActorId, ConversationId, Messenger, SigilError};
use tracing::warn;

use crate::command::CommandContext;

/// Global allow-list plus per-group admin membership.
pub struct AdminPolicy {
    admins: HashSet<String>,
    messenger: Arc<dyn Messenger>,
}

impl AdminPolicy {
    pub fn new<I>(admins: I, messenger: Arc<dyn Messenger>) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            admins: admins
                .into_iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            messenger,
        }
    }

    /// Whether the actor is on the global allow-list.
    pub fn is_global_admin(&self, actor: &ActorId, number: Option<&str>) -> bool {
        self.admins.contains(actor.as_str()) || number.is_some_and(|n| self.admins.contains(n))
    }

    /// Allow-list hit, or admin of the group `conversation` refers to.
    ///
    /// A failed group lookup counts as "not an admin".
    pub async fn is_admin(
        &self,
        actor: &ActorId,
        number: Option<&str>,
        conversation: &ConversationId,
    ) -> bool {
        if self.is_global_admin(actor, number) {
            return true;
        }
        let Some(group_id) = conversation.group_id() else {
            return false;
        };
        match self.messenger.list_groups().await {
            Ok(groups) => groups.iter().any(|g| {
                g.id == group_id
                    && (g.has_admin(actor.as_str()) || number.is_some_and(|n| g.has_admin(n)))
            }),
            Err(e) => {
                warn!(error = %e, group = group_id, "admin lookup failed");
                false
            }
        }
    }

    /// [`is_admin`](Self::is_admin) for a command invocation.
    pub async fn check(&self, ctx: &CommandContext) -> bool {
        self.is_admin(&ctx.actor_id, ctx.actor_number.as_deref(), &ctx.conversation)
            .await
    }

    /// Fails with [`SigilError::Unauthorized`] unless the invoker is an admin.
    pub async fn require(&self, ctx: &CommandContext) -> Result<(), SigilError> {
        if self.check(ctx).await {
            Ok(())
        } else {
            Err(SigilError::Unauthorized(format!(
                "!{} is limited to admins",
                ctx.verb
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigil_core::types::GroupInfo;
    use sigil_test_utils::MockMessenger;

    #[tokio::test]
    async fn allow_list_and_group_admins() {
        let messenger = Arc::new(MockMessenger::new());
        messenger
            .set_groups(vec![GroupInfo {
                id: "g1".into(),
                name: None,
                members: vec!["+2".into(), "+3".into()],
                admins: vec!["+2".into()],
            }])
            .await;
        let policy = AdminPolicy::new(vec!["+1".to_string()], messenger);

        let direct = ConversationId::Direct(ActorId::new("x"));
        let group = ConversationId::Group("g1".into());
        let other = ConversationId::Group("g2".into());

        assert!(policy.is_admin(&ActorId::new("u1"), Some("+1"), &direct).await);
        assert!(policy.is_admin(&ActorId::new("u2"), Some("+2"), &group).await);
        assert!(!policy.is_admin(&ActorId::new("u2"), Some("+2"), &other).await);
        assert!(!policy.is_admin(&ActorId::new("u3"), Some("+3"), &group).await);
        assert!(!policy.is_admin(&ActorId::new("u2"), Some("+2"), &direct).await);
    }
}
