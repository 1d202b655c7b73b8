// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod client;
pub mod error;
pub mod mock;
pub mod types;

pub use client::{EventStream, LLMClient};
pub use error::ProviderError;
pub use types::{
    ChatMessage, ChatRequest, ChatTurn, MessageContent, ReasoningEffort, Role, StreamEvent,
    ToolInvocation, ToolSchema,
};
