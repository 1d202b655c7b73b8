// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;

use crate::client::{EventStream, LLMClient};
use crate::error::ProviderError;
use crate::types::{ChatRequest, ChatTurn, StreamEvent, ToolInvocation};

/// One scripted transport response.  The outer queue is ordered by call;
/// every transport method pops exactly one step.
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    /// A finished turn: final text plus optional tool invocations.
    Turn(ChatTurn),
    /// A streamed text reply delivered as one delta per element.
    Stream(Vec<String>),
    /// The call fails with the given classified error.
    Fail(ProviderError),
    /// The call never completes.  Used to exercise cancellation: the caller
    /// must abandon the future via its cancel token.
    Hang,
}

impl ScriptedStep {
    /// Convenience: a plain text turn with no tool calls.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Turn(ChatTurn::text_only(text))
    }

    /// Convenience: a turn consisting of a single tool invocation.
    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self::Turn(ChatTurn {
            text: String::new(),
            tool_calls: vec![ToolInvocation { id: id.into(), name: name.into(), arguments }],
        })
    }
}

/// A pre-scripted transport.  Each call pops the next step from the front of
/// the queue, so tests can specify exact sequences — including classified
/// failures and never-resolving calls — without network access.
///
/// Every request is recorded in `requests` so tests can assert on what was
/// sent (message contents, tool subsets, reasoning-effort hints).
pub struct ScriptedClient {
    steps: Mutex<VecDeque<ScriptedStep>>,
    /// Every `ChatRequest` seen, in call order.
    pub requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ScriptedClient {
    pub fn new(steps: Vec<ScriptedStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn pop(&self, req: ChatRequest) -> ScriptedStep {
        self.requests.lock().unwrap().push(req);
        self.steps
            .lock()
            .unwrap()
            .pop_front()
            // Default fallback when all steps are consumed
            .unwrap_or_else(|| ScriptedStep::text("[no more scripts]"))
    }
}

#[async_trait]
impl LLMClient for ScriptedClient {
    fn provider_id(&self) -> &str {
        "scripted-mock"
    }

    fn model_name(&self) -> &str {
        "scripted-mock-model"
    }

    async fn stream_chat(&self, req: ChatRequest) -> Result<EventStream, ProviderError> {
        match self.pop(req) {
            ScriptedStep::Turn(turn) => Ok(deltas_to_stream(vec![turn.text])),
            ScriptedStep::Stream(deltas) => Ok(deltas_to_stream(deltas)),
            ScriptedStep::Fail(e) => Err(e),
            ScriptedStep::Hang => {
                futures::future::pending::<()>().await;
                unreachable!("pending future resolved")
            }
        }
    }

    async fn chat_with_tools(&self, req: ChatRequest) -> Result<ChatTurn, ProviderError> {
        match self.pop(req) {
            ScriptedStep::Turn(turn) => Ok(turn),
            ScriptedStep::Stream(deltas) => Ok(ChatTurn::text_only(deltas.concat())),
            ScriptedStep::Fail(e) => Err(e),
            ScriptedStep::Hang => {
                futures::future::pending::<()>().await;
                unreachable!("pending future resolved")
            }
        }
    }

    async fn stream_chat_with_tools(&self, req: ChatRequest) -> Result<EventStream, ProviderError> {
        // The scripted transport has no separate streaming tool path: reuse
        // the buffered step and replay it as events.
        let turn = self.chat_with_tools(req).await?;
        let mut events: Vec<Result<StreamEvent, ProviderError>> = Vec::new();
        if !turn.text.is_empty() {
            events.push(Ok(StreamEvent::TextDelta(turn.text)));
        }
        for (i, call) in turn.tool_calls.into_iter().enumerate() {
            events.push(Ok(StreamEvent::ToolCall {
                index: i as u32,
                id: call.id,
                name: call.name,
                arguments: call.arguments.to_string(),
            }));
        }
        events.push(Ok(StreamEvent::Done));
        Ok(Box::pin(stream::iter(events)))
    }
}

fn deltas_to_stream(deltas: Vec<String>) -> EventStream {
    let mut events: Vec<Result<StreamEvent, ProviderError>> = deltas
        .into_iter()
        .filter(|d| !d.is_empty())
        .map(|d| Ok(StreamEvent::TextDelta(d)))
        .collect();
    events.push(Ok(StreamEvent::Done));
    Box::pin(stream::iter(events))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::types::ChatMessage;

    fn req() -> ChatRequest {
        ChatRequest { messages: vec![ChatMessage::user("hi")], ..Default::default() }
    }

    #[tokio::test]
    async fn pops_steps_in_order() {
        let c = ScriptedClient::new(vec![
            ScriptedStep::text("first"),
            ScriptedStep::text("second"),
        ]);
        assert_eq!(c.chat_with_tools(req()).await.unwrap().text, "first");
        assert_eq!(c.chat_with_tools(req()).await.unwrap().text, "second");
    }

    #[tokio::test]
    async fn fallback_when_scripts_exhausted() {
        let c = ScriptedClient::new(vec![]);
        let turn = c.chat_with_tools(req()).await.unwrap();
        assert!(turn.text.contains("no more scripts"));
    }

    #[tokio::test]
    async fn fail_step_returns_classified_error() {
        let c = ScriptedClient::new(vec![ScriptedStep::Fail(ProviderError::RateLimited(
            "429".into(),
        ))]);
        let err = c.chat_with_tools(req()).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited(_)));
    }

    #[tokio::test]
    async fn stream_chat_replays_deltas() {
        let c = ScriptedClient::new(vec![ScriptedStep::Stream(vec![
            "Final ".into(),
            "summary.".into(),
        ])]);
        let mut s = c.stream_chat(req()).await.unwrap();
        let mut text = String::new();
        while let Some(ev) = s.next().await {
            if let StreamEvent::TextDelta(d) = ev.unwrap() {
                text.push_str(&d);
            }
        }
        assert_eq!(text, "Final summary.");
    }

    #[tokio::test]
    async fn records_requests_with_effort() {
        use crate::types::ReasoningEffort;
        let c = ScriptedClient::new(vec![ScriptedStep::text("ok")]);
        let mut r = req();
        r.reasoning_effort = Some(ReasoningEffort::High);
        c.chat_with_tools(r).await.unwrap();
        let seen = c.requests.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].reasoning_effort, Some(ReasoningEffort::High));
    }

    #[tokio::test]
    async fn hang_step_never_resolves() {
        let c = ScriptedClient::new(vec![ScriptedStep::Hang]);
        let call = c.chat_with_tools(req());
        let timed = tokio::time::timeout(std::time::Duration::from_millis(50), call).await;
        assert!(timed.is_err(), "hang step must not resolve");
    }
}
