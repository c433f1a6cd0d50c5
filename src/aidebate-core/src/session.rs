//! The debate session state machine.
//!
//! A session owns a copy of its flow definition, the two participant
//! bindings, the position in the flow, and the transcript. It is advanced
//! one speech at a time by [`DebateSession::execute_turn`]; a failed model
//! call leaves the session untouched so the same slot can be retried.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::citation::{Citation, extract_citations};
use crate::error::DebateError;
use crate::flow::{FlowDefinition, Side, SpeechSlot, SpeechType};
use crate::gateway::{ChatMessage, GenerationParams, ModelRegistry};
use crate::sanitize::sanitize;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Complete,
}

/// Binds one side of the debate to a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantBinding {
    pub side: Side,
    /// Registry alias of the model arguing this side.
    pub model_alias: String,
    /// Name shown in transcripts and exports.
    pub display_alias: String,
}

impl ParticipantBinding {
    pub fn new(side: Side, model_alias: impl Into<String>) -> Self {
        let model_alias = model_alias.into();
        Self {
            side,
            display_alias: model_alias.clone(),
            model_alias,
        }
    }
}

/// Per-call token and latency accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelUsage {
    pub model_alias: String,
    pub speech_label: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub latency_ms: u64,
}

/// One entry of the transcript: either a delivered speech or a moderator
/// interjection (which carries no flow slot and no model attribution).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub speech_label: String,
    pub speech_type: Option<SpeechType>,
    pub side: Option<Side>,
    pub model_alias: Option<String>,
    pub speaker_role: Option<String>,
    /// Sanitized text with citation markers replaced by footnotes.
    pub content: String,
    pub citations: Vec<Citation>,
    pub latency_ms: u64,
    pub is_interjection: bool,
    pub created_at: DateTime<Utc>,
}

/// A debate in progress, resumable across requests via the session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateSession {
    session_id: String,
    topic: String,
    flow: FlowDefinition,
    bindings: [ParticipantBinding; 2],
    current_index: usize,
    transcript: Vec<Message>,
    usage_log: Vec<ModelUsage>,
    status: SessionStatus,
}

impl DebateSession {
    /// Create a session in the active state at the start of the flow.
    ///
    /// Fails with a validation error on an empty topic or bindings that do
    /// not cover both sides. Model aliases are validated against the
    /// registry by the manager before the first turn.
    pub fn new(
        topic: impl Into<String>,
        bindings: [ParticipantBinding; 2],
        flow: FlowDefinition,
    ) -> Result<Self, DebateError> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(DebateError::Validation("Debate topic must not be empty".to_string()));
        }
        if bindings[0].side == bindings[1].side {
            return Err(DebateError::Validation(
                "Participant bindings must cover both sides".to_string(),
            ));
        }

        Ok(Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            topic,
            flow,
            bindings,
            current_index: 0,
            transcript: Vec::new(),
            usage_log: Vec::new(),
            status: SessionStatus::Active,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn flow(&self) -> &FlowDefinition {
        &self.flow
    }

    pub fn bindings(&self) -> &[ParticipantBinding; 2] {
        &self.bindings
    }

    pub fn binding(&self, side: Side) -> &ParticipantBinding {
        if self.bindings[0].side == side {
            &self.bindings[0]
        } else {
            &self.bindings[1]
        }
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn usage_log(&self) -> &[ModelUsage] {
        &self.usage_log
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// The slot due next, or None when the debate is complete.
    pub fn next_slot(&self) -> Option<&SpeechSlot> {
        if self.status == SessionStatus::Complete {
            return None;
        }
        self.flow.slot(self.current_index)
    }

    /// Execute one turn.
    ///
    /// With `is_interjection` set, the moderator message is appended
    /// directly to the transcript: no model call, no slot consumed.
    /// Otherwise the slot at the current index is delivered by its side's
    /// model, sanitized, citation-annotated, and appended, and the index
    /// advances. A gateway failure changes nothing and names the failing
    /// side and model.
    pub async fn execute_turn(
        &mut self,
        registry: &ModelRegistry,
        params: &GenerationParams,
        moderator_message: Option<&str>,
        is_interjection: bool,
    ) -> Result<Message, DebateError> {
        if self.status == SessionStatus::Complete {
            return Err(DebateError::InvalidState(
                "Debate is complete. No more speeches.".to_string(),
            ));
        }

        if is_interjection {
            let content = moderator_message.ok_or_else(|| {
                DebateError::Validation(
                    "An interjection requires a moderator message".to_string(),
                )
            })?;
            let message = Message {
                speech_label: "Moderator".to_string(),
                speech_type: None,
                side: None,
                model_alias: None,
                speaker_role: None,
                content: content.to_string(),
                citations: Vec::new(),
                latency_ms: 0,
                is_interjection: true,
                created_at: Utc::now(),
            };
            self.transcript.push(message.clone());
            tracing::info!(session = %self.session_id, "moderator interjection recorded");
            return Ok(message);
        }

        let slot = self
            .flow
            .slot(self.current_index)
            .cloned()
            .ok_or_else(|| {
                DebateError::InvalidState("Flow position out of range".to_string())
            })?;

        let binding = self.binding(slot.side).clone();
        let model = registry.resolve(&binding.model_alias).ok_or_else(|| {
            DebateError::Validation(format!("Unknown model alias: {}", binding.model_alias))
        })?;

        let context = self.build_context(&slot, moderator_message);

        tracing::info!(
            session = %self.session_id,
            slot = %slot.label,
            side = %slot.side,
            model = %binding.model_alias,
            "executing turn"
        );

        let completion = model
            .gateway
            .generate(&model.upstream_id, &context, params)
            .await
            .map_err(|source| DebateError::Gateway {
                side: slot.side,
                model: binding.model_alias.clone(),
                source,
            })?;

        let usage = completion.usage.unwrap_or_default();
        self.usage_log.push(ModelUsage {
            model_alias: binding.model_alias.clone(),
            speech_label: slot.label.clone(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            latency_ms: completion.latency_ms,
        });

        let sanitized = sanitize(&completion.text);
        let (content, citations) = extract_citations(&sanitized);

        let message = Message {
            speech_label: slot.label.clone(),
            speech_type: Some(slot.speech_type),
            side: Some(slot.side),
            model_alias: Some(binding.model_alias.clone()),
            speaker_role: Some(slot.speaker_role.clone()),
            content,
            citations,
            latency_ms: completion.latency_ms,
            is_interjection: false,
            created_at: Utc::now(),
        };

        self.transcript.push(message.clone());
        self.current_index += 1;
        if self.current_index == self.flow.len() {
            self.status = SessionStatus::Complete;
            tracing::info!(session = %self.session_id, "debate complete");
        }

        Ok(message)
    }

    /// Force the session to the complete state. Safe to call repeatedly.
    pub fn end_early(&mut self) {
        self.status = SessionStatus::Complete;
    }

    /// Assemble the generation context for one slot: the system prompt for
    /// this speech, then the prior transcript with same-side speeches as
    /// assistant turns and opposing speeches as labelled user turns.
    fn build_context(&self, slot: &SpeechSlot, moderator_message: Option<&str>) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(
            self.system_prompt(slot, moderator_message),
        )];

        for entry in &self.transcript {
            if entry.is_interjection {
                messages.push(ChatMessage::user(format!("[Moderator]: {}", entry.content)));
                continue;
            }
            match entry.side {
                Some(side) if side == slot.side => {
                    messages.push(ChatMessage::assistant(entry.content.clone()));
                }
                _ => {
                    // Label the opponent's speech except for bare CX answers.
                    let content = match entry.speech_type {
                        Some(SpeechType::CxAnswer) => entry.content.clone(),
                        _ => format!("[{}] {}", entry.speech_label, entry.content),
                    };
                    messages.push(ChatMessage::user(content));
                }
            }
        }

        messages
    }

    fn system_prompt(&self, slot: &SpeechSlot, moderator_message: Option<&str>) -> String {
        let mut prompt = format!(
            "You are the {} team in a policy debate on: '{}'.\n\n\
             Current Speech: {}\n\n",
            slot.side.display_name(),
            self.topic,
            slot.label
        );

        // Local models leak planning scaffolding; forbidding it up front
        // reduces how much the sanitizer has to cut.
        prompt.push_str(
            "IMPORTANT: Output ONLY your debate speech. Do NOT output:\n\
             - Your reasoning process or analysis steps\n\
             - Planning notes like '1. Analyze the Request' or '2. Determine the Stance'\n\
             - Meta-commentary about how you're constructing your argument\n\
             - Any text before your actual debate content\n\n",
        );

        prompt.push_str(slot.instructions());

        if let Some(note) = moderator_message {
            prompt.push_str(&format!(
                "\n\n[MODERATOR INTERJECTION]: {note}\nAcknowledge this and adjust your speech accordingly.\n"
            ));
        }

        prompt
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    use crate::config::BackendFamily;
    use crate::error::GatewayError;
    use crate::gateway::{
        ChatMessage, Completion, GenerationParams, ModelGateway, ModelRegistry, RegisteredModel,
    };

    /// Scripted gateway: pops queued results, then a canned speech.
    pub struct MockGateway {
        script: Mutex<VecDeque<Result<String, GatewayError>>>,
    }

    impl MockGateway {
        pub fn new() -> Self {
            Self { script: Mutex::new(VecDeque::new()) }
        }

        pub fn scripted(results: Vec<Result<String, GatewayError>>) -> Self {
            Self { script: Mutex::new(results.into()) }
        }
    }

    #[async_trait::async_trait]
    impl ModelGateway for MockGateway {
        async fn generate(
            &self,
            _model_id: &str,
            _context: &[ChatMessage],
            _params: &GenerationParams,
        ) -> Result<Completion, GatewayError> {
            let next = self.script.lock().await.pop_front();
            let text = match next {
                Some(Ok(text)) => text,
                Some(Err(e)) => return Err(e),
                None => "We hold that the resolution stands on the evidence presented."
                    .to_string(),
            };
            Ok(Completion { text, latency_ms: 7, usage: None })
        }
    }

    pub fn registry_with(gateway: Arc<dyn ModelGateway>, aliases: &[&str]) -> ModelRegistry {
        ModelRegistry::with_models(
            aliases
                .iter()
                .map(|alias| RegisteredModel {
                    alias: (*alias).to_string(),
                    upstream_id: (*alias).to_string(),
                    display_name: (*alias).to_string(),
                    family: BackendFamily::LmStudio,
                    gateway: Arc::clone(&gateway),
                })
                .collect(),
        )
    }
}
