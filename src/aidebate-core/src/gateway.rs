//! Uniform interface over heterogeneous model backends.
//!
//! Every backend speaks the same contract: given a model id, an ordered
//! context, and generation parameters, return the raw text and the wall
//! clock latency, or fail with a [`GatewayError`]. Backends differ in
//! endpoint, auth, and TLS posture; callers never see those differences.
//!
//! No retries happen on this path. A debate turn is exactly one generation
//! attempt, so a failed call is surfaced immediately and the operator
//! decides whether to retry the slot.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{BackendFamily, Config};
use crate::error::{DebateError, GatewayError};

/// Role of one message in the generation context.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message of prior-turn context handed to a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// Generation parameters applied to every debate-content call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self { temperature: 0.3, max_output_tokens: 2048 }
    }
}

/// Token accounting reported by the backend, when available.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Successful result of one generation call.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub latency_ms: u64,
    pub usage: Option<TokenUsage>,
}

/// The single contract every backend family implements.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn generate(
        &self,
        model_id: &str,
        context: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<Completion, GatewayError>;
}

/// Local OpenAI-compatible inference server (LM Studio and friends).
/// No auth; lenient TLS because local servers often present self-signed
/// certificates.
pub struct LmStudioBackend {
    endpoint: String,
    deadline: Duration,
}

impl LmStudioBackend {
    pub fn new(endpoint: impl Into<String>, deadline: Duration) -> Self {
        Self { endpoint: endpoint.into(), deadline }
    }
}

#[async_trait]
impl ModelGateway for LmStudioBackend {
    async fn generate(
        &self,
        model_id: &str,
        context: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<Completion, GatewayError> {
        chat_completion(
            &self.endpoint,
            "lm-studio",
            true,
            self.deadline,
            model_id,
            context,
            params,
        )
        .await
    }
}

/// Cloud OpenAI-compatible API, authenticated with an API key.
pub struct OpenAiBackend {
    api_base: String,
    api_key: String,
    deadline: Duration,
}

impl OpenAiBackend {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        deadline: Duration,
    ) -> Self {
        Self { api_base: api_base.into(), api_key: api_key.into(), deadline }
    }
}

#[async_trait]
impl ModelGateway for OpenAiBackend {
    async fn generate(
        &self,
        model_id: &str,
        context: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<Completion, GatewayError> {
        chat_completion(
            &self.api_base,
            &self.api_key,
            false,
            self.deadline,
            model_id,
            context,
            params,
        )
        .await
    }
}

/// Shared chat-completion path for both backend families.
async fn chat_completion(
    api_base: &str,
    api_key: &str,
    accept_invalid_certs: bool,
    deadline: Duration,
    model_id: &str,
    context: &[ChatMessage],
    params: &GenerationParams,
) -> Result<Completion, GatewayError> {
    let http_client = reqwest::Client::builder()
        .danger_accept_invalid_certs(accept_invalid_certs)
        .timeout(deadline + Duration::from_secs(5))
        .connect_timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| GatewayError::Unavailable(format!("failed to create HTTP client: {e}")))?;

    let config = OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(api_base);

    let client = Client::with_config(config).with_http_client(http_client);

    let messages: Vec<ChatCompletionRequestMessage> =
        context.iter().map(to_request_message).collect();

    let request = CreateChatCompletionRequestArgs::default()
        .model(model_id)
        .temperature(params.temperature)
        .max_completion_tokens(params.max_output_tokens)
        .messages(messages)
        .build()
        .map_err(|e| GatewayError::Unavailable(format!("failed to build request: {e}")))?;

    tracing::debug!(model = model_id, context_len = context.len(), "generation call");
    let started = Instant::now();

    let response = tokio::time::timeout(deadline, client.chat().create(request))
        .await
        .map_err(|_| GatewayError::Timeout { seconds: deadline.as_secs() })?
        .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

    let latency_ms = started.elapsed().as_millis() as u64;

    let text = response
        .choices
        .first()
        .and_then(|c| c.message.content.clone())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(GatewayError::InvalidResponse(
            "backend returned an empty completion".to_string(),
        ));
    }

    let usage = response.usage.map(|u| TokenUsage {
        input_tokens: u.prompt_tokens,
        output_tokens: u.completion_tokens,
    });

    tracing::debug!(model = model_id, latency_ms, "generation complete");

    Ok(Completion { text, latency_ms, usage })
}

fn to_request_message(message: &ChatMessage) -> ChatCompletionRequestMessage {
    match message.role {
        ChatRole::System => {
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: message.content.clone().into(),
                name: None,
            })
        }
        ChatRole::User => {
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: message.content.clone().into(),
                name: None,
            })
        }
        ChatRole::Assistant => {
            ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                content: Some(message.content.clone().into()),
                name: None,
                tool_calls: None,
                refusal: None,
                audio: None,
                function_call: None,
            })
        }
    }
}

/// One configured model: its alias, upstream id, and the backend that
/// serves it.
pub struct RegisteredModel {
    pub alias: String,
    pub upstream_id: String,
    pub display_name: String,
    pub family: BackendFamily,
    pub gateway: Arc<dyn ModelGateway>,
}

/// Summary of a registered model for listing, without the backend handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub alias: String,
    pub id: String,
    pub name: String,
    pub family: BackendFamily,
}

/// Configuration-driven registry keyed on model alias. New backend families
/// plug in here without touching the session logic.
pub struct ModelRegistry {
    models: HashMap<String, RegisteredModel>,
}

impl ModelRegistry {
    /// Build the registry from configuration. Backends are shared between
    /// models of the same family.
    pub fn from_config(config: &Config, api_key: &str) -> Result<Self, DebateError> {
        let deadline = Duration::from_secs(config.settings.timeout_secs);

        let lm_studio: Arc<dyn ModelGateway> =
            Arc::new(LmStudioBackend::new(&config.lm_studio_endpoint, deadline));
        let cloud: Arc<dyn ModelGateway> =
            Arc::new(OpenAiBackend::new(&config.cloud_api_base, api_key, deadline));

        let mut models = HashMap::new();
        for (alias, entry) in &config.models {
            let gateway = match entry.family {
                BackendFamily::LmStudio => Arc::clone(&lm_studio),
                BackendFamily::OpenAi => Arc::clone(&cloud),
            };
            models.insert(
                alias.clone(),
                RegisteredModel {
                    alias: alias.clone(),
                    upstream_id: entry.id.clone(),
                    display_name: entry
                        .name
                        .clone()
                        .unwrap_or_else(|| alias.replace('-', " ")),
                    family: entry.family,
                    gateway,
                },
            );
        }

        Ok(Self { models })
    }

    /// Registry over explicit entries, used by tests and embedders.
    pub fn with_models(models: Vec<RegisteredModel>) -> Self {
        Self {
            models: models.into_iter().map(|m| (m.alias.clone(), m)).collect(),
        }
    }

    pub fn resolve(&self, alias: &str) -> Option<&RegisteredModel> {
        self.models.get(alias)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.models.contains_key(alias)
    }

    /// Configured models, sorted by alias for stable listings.
    pub fn list(&self) -> Vec<ModelInfo> {
        let mut infos: Vec<ModelInfo> = self
            .models
            .values()
            .map(|m| ModelInfo {
                alias: m.alias.clone(),
                id: m.upstream_id.clone(),
                name: m.display_name.clone(),
                family: m.family,
            })
            .collect();
        infos.sort_by(|a, b| a.alias.cmp(&b.alias));
        infos
    }
}
