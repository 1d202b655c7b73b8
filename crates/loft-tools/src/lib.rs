// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Tool catalog, registry and dispatcher.
//!
//! Tools come in two kinds: local handlers (file listing, text writes,
//! recall) and thin wrappers over the opaque [`worker::ToolWorker`] RPC that
//! owns the office/tabular file formats.  The registry routes a model tool
//! call through a uniform pipeline: validate arguments, lazily create the
//! draft overlay for writes, invoke the handler, append a tool-log entry,
//! derive the receipt returned to the model, and record a focus hint for
//! office writes.

pub mod builtin;
pub mod registry;
pub mod tool;
pub mod worker;

pub use registry::ToolRegistry;
pub use tool::{Tool, ToolCall, ToolError, ToolOutput, ToolSuccess};
pub use worker::{FakeToolWorker, ToolWorker};
