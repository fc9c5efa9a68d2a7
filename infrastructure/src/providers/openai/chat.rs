//! Chat completions adapter

use super::dialect::parse_role;
use super::error::{model_status_error, model_transport_error};
use super::settings::{ChatEndpoint, ChatEndpoints};
use super::sse::{SseData, SseDecoder, StreamAccumulator};
use super::types::{ChatRequest, ChatResponse, StreamChunk};
use async_trait::async_trait;
use futures::StreamExt;
use kbchat_application::{ChatModel, ChatModelProvider, ModelError, StreamHandle};
use kbchat_domain::{Message, Model, StreamEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const STREAM_BUFFER: usize = 64;

/// One chat model on an OpenAI-compatible endpoint.
pub struct OpenAiChatModel {
    client: reqwest::Client,
    endpoint: ChatEndpoint,
    api_key: String,
    model: Model,
    temperature: f32,
}

impl OpenAiChatModel {
    pub fn new(
        client: reqwest::Client,
        endpoint: ChatEndpoint,
        api_key: String,
        model: Model,
        temperature: f32,
    ) -> Self {
        Self {
            client,
            endpoint,
            api_key,
            model,
            temperature,
        }
    }

    fn request<'a>(&'a self, messages: &[Message], stream: bool) -> ChatRequest<'a> {
        let prompt = self.endpoint.dialect.encode(messages);
        ChatRequest {
            model: self.endpoint.wire_model(&self.model),
            messages: prompt.messages,
            system: prompt.system,
            temperature: self.temperature,
            stream,
            max_tokens: self.endpoint.max_tokens,
        }
    }

    async fn post(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response, ModelError> {
        debug!(
            model = %self.model,
            url = %self.endpoint.url(),
            messages = body.messages.len(),
            stream = body.stream,
            "Sending chat request"
        );
        let response = self
            .client
            .post(self.endpoint.url())
            .bearer_auth(&self.api_key)
            .timeout(self.endpoint.timeout)
            .json(body)
            .send()
            .await
            .map_err(model_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(model_status_error(status, &text));
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn model(&self) -> &Model {
        &self.model
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    async fn generate(&self, messages: &[Message]) -> Result<String, ModelError> {
        let response = self.post(&self.request(messages, false)).await?;
        let body: ChatResponse = response.json().await.map_err(model_transport_error)?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::InvalidResponse("response has no choices".into()))?;
        if let Some(role) = choice.message.role.as_deref() {
            parse_role(role)?;
        }
        Ok(choice.message.content.unwrap_or_default())
    }

    async fn generate_streaming(&self, messages: &[Message]) -> Result<StreamHandle, ModelError> {
        if !self.endpoint.stream {
            let text = self.generate(messages).await?;
            return Ok(StreamHandle::completed(text));
        }

        // Status errors surface here rather than as a stream event.
        let response = self.post(&self.request(messages, true)).await?;
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let mode = self.endpoint.stream_mode;
        let model = self.model.clone();

        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut decoder = SseDecoder::new();
            let mut accumulator = StreamAccumulator::new(mode);
            let mut finished = false;

            'read: loop {
                let (events, ended) = match body.next().await {
                    Some(Ok(bytes)) => (decoder.push(&bytes), false),
                    Some(Err(e)) => {
                        warn!(model = %model, error = %e, "Chat stream failed");
                        let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                        return;
                    }
                    None => (decoder.finish().into_iter().collect(), true),
                };

                for event in events {
                    let data = match event {
                        SseData::Done => {
                            finished = true;
                            break 'read;
                        }
                        SseData::Payload { data, .. } => data,
                    };
                    match fragments(&data) {
                        Ok((contents, stop)) => {
                            finished |= stop;
                            for content in contents {
                                if let Some(fragment) = accumulator.push(&content)
                                    && tx.send(StreamEvent::Delta(fragment)).await.is_err()
                                {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                            return;
                        }
                    }
                }
                if ended {
                    break;
                }
            }

            // A body cut off before [DONE] or a finish_reason is a truncated answer.
            let last = if finished {
                StreamEvent::Completed(accumulator.into_text())
            } else {
                warn!(model = %model, "Chat stream ended before completion");
                StreamEvent::Error("stream ended before the response was complete".into())
            };
            let _ = tx.send(last).await;
        });

        Ok(StreamHandle::new(rx))
    }
}

/// Text carried by one stream payload, and whether it carried a
/// `finish_reason`.
fn fragments(data: &str) -> Result<(Vec<String>, bool), ModelError> {
    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| ModelError::InvalidResponse(format!("bad stream payload: {}", e)))?;
    let mut out = Vec::new();
    let mut stop = false;
    for choice in chunk.choices {
        if let Some(role) = choice.delta.role.as_deref() {
            parse_role(role)?;
        }
        if let Some(content) = choice.delta.content {
            out.push(content);
        }
        stop |= choice.finish_reason.is_some();
    }
    Ok((out, stop))
}

/// Builds [`OpenAiChatModel`]s from resolved endpoint settings.
pub struct OpenAiModelProvider {
    client: reqwest::Client,
    endpoints: ChatEndpoints,
}

impl OpenAiModelProvider {
    pub fn new(endpoints: ChatEndpoints) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl ChatModelProvider for OpenAiModelProvider {
    async fn build(
        &self,
        model: &Model,
        temperature: f32,
    ) -> Result<Arc<dyn ChatModel>, ModelError> {
        let endpoint = self.endpoints.for_model(model).clone();
        let api_key = endpoint.resolve_api_key().ok_or_else(|| {
            ModelError::Unavailable(format!(
                "no API key for {}; set {}",
                model, endpoint.api_key_env
            ))
        })?;
        debug!(model = %model, temperature, dialect = %endpoint.dialect, "Built chat model");
        Ok(Arc::new(OpenAiChatModel::new(
            self.client.clone(),
            endpoint,
            api_key,
            model.clone(),
            temperature,
        )))
    }
}
