//! Model providers and adapters for Quill.
//!
//! Wire-level backends implement `quill_core::Provider`; the conversation
//! loop talks to a `quill_core::ModelAdapter`. [`build_from_config`] picks
//! the adapter for the process.

pub mod mock;
pub mod openai_compat;
pub mod plugin_adapter;
pub mod router;

pub use mock::MockModelAdapter;
pub use openai_compat::OpenAiCompatProvider;
pub use plugin_adapter::PluginModelAdapter;
pub use router::build_from_config;
