//! # Quill Core
//!
//! Domain types, traits, and error definitions for the Quill coding agent.
//! This crate has **no I/O of its own**: it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the conversation loop is defined as a trait here.
//! Implementations live in their respective crates, so tests can swap in
//! scripted adapters and in-memory sinks.

pub mod chunk;
pub mod display;
pub mod error;
pub mod message;
pub mod plugin;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use chunk::{Chunk, ToolResult, ToolState};
pub use display::{DisplaySink, NullSink};
pub use error::{Error, ProviderError, Result, ToolError};
pub use message::{DisplayEntry, DisplayKind, EntryId, Message, Role};
pub use plugin::{
    ParamType, Plugin, PluginDescriptor, PluginOutput, PluginParameter, PluginRegistry,
};
pub use provider::{
    ChunkReceiver, GenerateRequest, ModelAdapter, Provider, ProviderRequest, StreamChunk,
    StreamReceiver, ToolCallRequest, ToolDefinition, Usage,
};
