//! Data passed between the chat widget, the relay and the upstream providers.
//!
//! The wire shapes are shared by the server and the terminal client, so they
//! serialize exactly as the browser client sent them (`systemPrompt`, `model`
//! as an assistant alias).
pub mod message;
pub mod role;
pub mod search;
