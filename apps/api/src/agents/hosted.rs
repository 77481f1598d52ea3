//! Hosted agents: reply providers backed by the agent-hosting service.

use std::sync::Arc;

use async_trait::async_trait;

use crate::agent_client::{AgentClient, AgentError, ChatMessage};
use crate::agents::catalog::{self, AgentProfile, CONVERSATION_ROSTER};
use crate::orchestration::driver::{Participant, ReplyProvider};
use crate::orchestration::transcript::{Message, MessageRole};

pub struct HostedAgent {
    client: AgentClient,
    profile: &'static AgentProfile,
}

impl HostedAgent {
    pub fn new(client: AgentClient, profile: &'static AgentProfile) -> Self {
        Self { client, profile }
    }
}

#[async_trait]
impl ReplyProvider for HostedAgent {
    async fn produce_reply(&self, transcript: &[Message]) -> Result<String, AgentError> {
        let messages = build_chat_messages(self.profile, transcript);
        self.client
            .complete(&messages, self.profile.temperature)
            .await
    }
}

/// Renders the shared transcript from one agent's point of view.
///
/// The agent's own turns become assistant messages; everything else it
/// hears is a user message, prefixed with the speaker for other agents.
/// Error notices are not shown to agents.
pub fn build_chat_messages(profile: &AgentProfile, transcript: &[Message]) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::new("system", profile.instructions)];

    for message in transcript {
        match message.role {
            MessageRole::System => messages.push(ChatMessage::new("user", message.content.as_str())),
            MessageRole::Participant if message.sender == profile.name => {
                messages.push(ChatMessage::new("assistant", message.content.as_str()))
            }
            MessageRole::Participant => messages.push(ChatMessage::new(
                "user",
                format!("[{}]: {}", message.sender, message.content),
            )),
            MessageRole::Error => {}
        }
    }

    messages
}

/// The group-chat roster, each member speaking through the shared client.
pub fn conversation_roster(client: &AgentClient) -> Vec<Participant> {
    CONVERSATION_ROSTER
        .iter()
        .filter_map(|name| catalog::find(name))
        .map(|profile| {
            Participant::new(
                profile.name,
                Arc::new(HostedAgent::new(client.clone(), profile)),
            )
        })
        .collect()
}
