//! The operation surface consumed by the HTTP boundary or the CLI.
//!
//! `DebateManager` ties the session store, the model registry, and the
//! generation settings together. It enforces the one-in-flight-turn rule by
//! holding the per-session lock across the model call, and caps concurrent
//! generation calls process-wide with a semaphore (default 1: typical local
//! backends serve one request at a time).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::config::Settings;
use crate::error::DebateError;
use crate::export::render_markdown;
use crate::flow::{FlowDefinition, Side, SpeechSlot};
use crate::gateway::{GenerationParams, ModelInfo, ModelRegistry};
use crate::session::{DebateSession, Message, ParticipantBinding, SessionStatus};
use crate::store::SessionStore;

/// Response of `start_debate`.
#[derive(Debug, Clone, Serialize)]
pub struct DebateSummary {
    pub session_id: String,
    pub topic: String,
    pub bindings: [ParticipantBinding; 2],
    pub flow: Vec<SpeechSlot>,
    pub current_slot: SpeechSlot,
}

/// Response of `execute_turn`: the new message plus where the flow stands.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub message: Message,
    pub next_slot: Option<SpeechSlot>,
    pub debate_complete: bool,
}

/// Full transcript view for one session.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryView {
    pub session_id: String,
    pub topic: String,
    pub status: SessionStatus,
    pub transcript: Vec<Message>,
}

/// Aggregated usage for one model across a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelUsageSummary {
    pub model_alias: String,
    pub speeches: Vec<String>,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_calls: u64,
}

/// Usage report for a whole session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageReport {
    pub session_id: String,
    pub topic: String,
    pub total_speeches: usize,
    pub breakdown: Vec<ModelUsageSummary>,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
}

pub struct DebateManager {
    store: Arc<dyn SessionStore>,
    registry: Arc<ModelRegistry>,
    params: GenerationParams,
    generation_slots: Arc<Semaphore>,
}

impl DebateManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        registry: Arc<ModelRegistry>,
        settings: &Settings,
    ) -> Self {
        Self {
            store,
            registry,
            params: settings.generation_params(),
            generation_slots: Arc::new(Semaphore::new(
                settings.max_concurrent_generations.max(1),
            )),
        }
    }

    /// Create and store a new session.
    ///
    /// `side_a` is the side `model_a` argues; `model_b` takes the other.
    pub async fn start_debate(
        &self,
        topic: &str,
        model_a: &str,
        model_b: &str,
        side_a: Side,
        flow_size: usize,
    ) -> Result<DebateSummary, DebateError> {
        for alias in [model_a, model_b] {
            if !self.registry.contains(alias) {
                return Err(DebateError::Validation(format!("Unknown model alias: {alias}")));
            }
        }

        let flow = FlowDefinition::policy(flow_size)?;
        let bindings = [
            ParticipantBinding::new(side_a, model_a),
            ParticipantBinding::new(side_a.opponent(), model_b),
        ];
        let session = DebateSession::new(topic, bindings, flow)?;

        let summary = DebateSummary {
            session_id: session.session_id().to_string(),
            topic: session.topic().to_string(),
            bindings: session.bindings().clone(),
            flow: session.flow().slots().to_vec(),
            current_slot: session
                .next_slot()
                .cloned()
                .ok_or_else(|| DebateError::Config("Flow has no slots".to_string()))?,
        };

        tracing::info!(
            session = %summary.session_id,
            topic = %summary.topic,
            flow_size,
            "debate started"
        );
        self.store.put(session).await;
        Ok(summary)
    }

    /// Execute one turn on a stored session. The session lock is held for
    /// the whole call, so a second request for the same session waits until
    /// this one completes or fails.
    pub async fn execute_turn(
        &self,
        session_id: &str,
        moderator_message: Option<&str>,
        is_interjection: bool,
    ) -> Result<TurnOutcome, DebateError> {
        let handle = self.store.get(session_id).await?;
        let mut session = handle.lock().await;

        // Interjections make no model call, so they bypass the generation
        // cap.
        let _permit = if is_interjection {
            None
        } else {
            Some(self.generation_slots.acquire().await.map_err(|_| {
                DebateError::InvalidState("Generation queue is shut down".to_string())
            })?)
        };

        let message = session
            .execute_turn(&self.registry, &self.params, moderator_message, is_interjection)
            .await?;

        Ok(TurnOutcome {
            next_slot: session.next_slot().cloned(),
            debate_complete: session.status() == SessionStatus::Complete,
            message,
        })
    }

    /// Force a session to the complete state. Idempotent.
    pub async fn end_topic(&self, session_id: &str) -> Result<SessionStatus, DebateError> {
        let handle = self.store.get(session_id).await?;
        let mut session = handle.lock().await;
        session.end_early();
        tracing::info!(session = session_id, "debate ended early");
        Ok(session.status())
    }

    pub async fn get_history(&self, session_id: &str) -> Result<HistoryView, DebateError> {
        let handle = self.store.get(session_id).await?;
        let session = handle.lock().await;
        Ok(HistoryView {
            session_id: session.session_id().to_string(),
            topic: session.topic().to_string(),
            status: session.status(),
            transcript: session.transcript().to_vec(),
        })
    }

    /// Render the full transcript as Markdown.
    pub async fn export(&self, session_id: &str) -> Result<String, DebateError> {
        let handle = self.store.get(session_id).await?;
        let session = handle.lock().await;
        Ok(render_markdown(&session))
    }

    /// Serialize the full session state to pretty-printed JSON, the same
    /// shape a file-backed store would persist.
    pub async fn dump_session(&self, session_id: &str) -> Result<String, DebateError> {
        let handle = self.store.get(session_id).await?;
        let session = handle.lock().await;
        serde_json::to_string_pretty(&*session)
            .map_err(|e| DebateError::Config(format!("Failed to serialize session: {e}")))
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), DebateError> {
        self.store.delete(session_id).await
    }

    /// Configured models, for selection UIs.
    pub fn list_models(&self) -> Vec<ModelInfo> {
        self.registry.list()
    }

    /// Aggregate per-model token usage over a session.
    pub async fn usage_report(&self, session_id: &str) -> Result<UsageReport, DebateError> {
        let handle = self.store.get(session_id).await?;
        let session = handle.lock().await;

        let mut breakdown: BTreeMap<String, ModelUsageSummary> = BTreeMap::new();
        let mut total_input: u64 = 0;
        let mut total_output: u64 = 0;

        for usage in session.usage_log() {
            let entry = breakdown
                .entry(usage.model_alias.clone())
                .or_insert_with(|| ModelUsageSummary {
                    model_alias: usage.model_alias.clone(),
                    speeches: Vec::new(),
                    total_input_tokens: 0,
                    total_output_tokens: 0,
                    total_calls: 0,
                });
            entry.speeches.push(usage.speech_label.clone());
            entry.total_input_tokens += u64::from(usage.input_tokens);
            entry.total_output_tokens += u64::from(usage.output_tokens);
            entry.total_calls += 1;
            total_input += u64::from(usage.input_tokens);
            total_output += u64::from(usage.output_tokens);
        }

        Ok(UsageReport {
            session_id: session.session_id().to_string(),
            topic: session.topic().to_string(),
            total_speeches: session.transcript().len(),
            breakdown: breakdown.into_values().collect(),
            total_input_tokens: total_input,
            total_output_tokens: total_output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::session::test_support::{MockGateway, registry_with};
    use crate::store::MemoryStore;

    fn manager_with(gateway: Arc<MockGateway>) -> DebateManager {
        DebateManager::new(
            Arc::new(MemoryStore::new()),
            Arc::new(registry_with(gateway, &["glm-flash", "qwen3-coder"])),
            &Settings::default(),
        )
    }

    #[tokio::test]
    async fn test_start_reports_first_slot() {
        let manager = manager_with(Arc::new(MockGateway::new()));
        let summary = manager
            .start_debate("Nuclear power is essential", "glm-flash", "qwen3-coder", Side::Affirmative, 12)
            .await
            .unwrap();

        assert_eq!(summary.flow.len(), 12);
        assert_eq!(summary.current_slot.label, "1AC");
        assert_eq!(summary.bindings[0].side, Side::Affirmative);
        assert_eq!(summary.bindings[0].model_alias, "glm-flash");
        assert_eq!(summary.bindings[1].side, Side::Negative);
    }

    #[tokio::test]
    async fn test_start_unknown_model() {
        let manager = manager_with(Arc::new(MockGateway::new()));
        let result = manager
            .start_debate("Topic", "glm-flash", "missing-model", Side::Affirmative, 8)
            .await;
        assert!(matches!(result, Err(DebateError::Validation(_))));
    }

    #[tokio::test]
    async fn test_start_bad_flow_size() {
        let manager = manager_with(Arc::new(MockGateway::new()));
        let result = manager
            .start_debate("Topic", "glm-flash", "qwen3-coder", Side::Affirmative, 10)
            .await;
        assert!(matches!(result, Err(DebateError::Config(_))));
    }

    #[tokio::test]
    async fn test_turn_loop_until_complete() {
        let manager = manager_with(Arc::new(MockGateway::new()));
        let summary = manager
            .start_debate("School uniforms should be mandatory", "glm-flash", "qwen3-coder", Side::Affirmative, 8)
            .await
            .unwrap();

        let mut completed = false;
        for turn in 0..8 {
            let outcome = manager.execute_turn(&summary.session_id, None, false).await.unwrap();
            completed = outcome.debate_complete;
            if turn < 7 {
                assert!(outcome.next_slot.is_some());
            } else {
                assert!(outcome.next_slot.is_none());
            }
        }
        assert!(completed);

        let history = manager.get_history(&summary.session_id).await.unwrap();
        assert_eq!(history.transcript.len(), 8);
        assert_eq!(history.status, SessionStatus::Complete);

        let again = manager.execute_turn(&summary.session_id, None, false).await;
        assert!(matches!(again, Err(DebateError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_unknown_session_id() {
        let manager = manager_with(Arc::new(MockGateway::new()));
        let result = manager.execute_turn("missing", None, false).await;
        assert!(matches!(result, Err(DebateError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_interjection_outcome() {
        let manager = manager_with(Arc::new(MockGateway::new()));
        let summary = manager
            .start_debate("Topic of note", "glm-flash", "qwen3-coder", Side::Affirmative, 8)
            .await
            .unwrap();

        manager.execute_turn(&summary.session_id, None, false).await.unwrap();
        let outcome = manager
            .execute_turn(&summary.session_id, Some("Moderator note"), true)
            .await
            .unwrap();

        assert!(outcome.message.is_interjection);
        assert!(!outcome.debate_complete);
        // The interjection consumed no slot.
        assert_eq!(outcome.next_slot.unwrap().index, 1);
    }

    #[tokio::test]
    async fn test_failed_turn_retries_cleanly() {
        let gateway = Arc::new(MockGateway::scripted(vec![
            Err(GatewayError::Unavailable("connection refused".to_string())),
            Ok("The affirmative opens with a clear case for the resolution today.".to_string()),
        ]));
        let manager = manager_with(gateway);
        let summary = manager
            .start_debate("Topic", "glm-flash", "qwen3-coder", Side::Affirmative, 8)
            .await
            .unwrap();

        let failed = manager.execute_turn(&summary.session_id, None, false).await;
        assert!(matches!(failed, Err(DebateError::Gateway { .. })));

        let outcome = manager.execute_turn(&summary.session_id, None, false).await.unwrap();
        assert_eq!(outcome.message.speech_label, "1AC");
        assert_eq!(outcome.next_slot.unwrap().index, 1);
    }

    #[tokio::test]
    async fn test_end_topic_then_history() {
        let manager = manager_with(Arc::new(MockGateway::new()));
        let summary = manager
            .start_debate("Topic", "glm-flash", "qwen3-coder", Side::Negative, 18)
            .await
            .unwrap();

        manager.execute_turn(&summary.session_id, None, false).await.unwrap();
        let status = manager.end_topic(&summary.session_id).await.unwrap();
        assert_eq!(status, SessionStatus::Complete);
        // Idempotent.
        let status = manager.end_topic(&summary.session_id).await.unwrap();
        assert_eq!(status, SessionStatus::Complete);

        let history = manager.get_history(&summary.session_id).await.unwrap();
        assert_eq!(history.transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_usage_report_totals() {
        let manager = manager_with(Arc::new(MockGateway::new()));
        let summary = manager
            .start_debate("Topic", "glm-flash", "qwen3-coder", Side::Affirmative, 8)
            .await
            .unwrap();

        for _ in 0..3 {
            manager.execute_turn(&summary.session_id, None, false).await.unwrap();
        }

        let report = manager.usage_report(&summary.session_id).await.unwrap();
        assert_eq!(report.total_speeches, 3);
        let calls: u64 = report.breakdown.iter().map(|b| b.total_calls).sum();
        assert_eq!(calls, 3);
        let inputs: u64 = report.breakdown.iter().map(|b| b.total_input_tokens).sum();
        assert_eq!(inputs, report.total_input_tokens);
    }

    #[tokio::test]
    async fn test_session_json_round_trip() {
        let manager = manager_with(Arc::new(MockGateway::new()));
        let summary = manager
            .start_debate("Topic", "glm-flash", "qwen3-coder", Side::Affirmative, 8)
            .await
            .unwrap();

        manager.execute_turn(&summary.session_id, None, false).await.unwrap();
        manager
            .execute_turn(&summary.session_id, Some("Noted for the record."), true)
            .await
            .unwrap();

        let json = manager.dump_session(&summary.session_id).await.unwrap();
        let restored: DebateSession = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.session_id(), summary.session_id);
        assert_eq!(restored.topic(), "Topic");
        assert_eq!(restored.current_index(), 1);
        assert_eq!(restored.transcript().len(), 2);
        assert!(restored.transcript()[1].is_interjection);
        assert_eq!(restored.status(), SessionStatus::Active);
        assert_eq!(restored.flow().len(), 8);
    }

    #[tokio::test]
    async fn test_delete_session() {
        let manager = manager_with(Arc::new(MockGateway::new()));
        let summary = manager
            .start_debate("Topic", "glm-flash", "qwen3-coder", Side::Affirmative, 8)
            .await
            .unwrap();

        manager.delete_session(&summary.session_id).await.unwrap();
        let result = manager.get_history(&summary.session_id).await;
        assert!(matches!(result, Err(DebateError::SessionNotFound(_))));
    }
}
