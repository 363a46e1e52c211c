//! Provider adapter layer for external generation backends.
//!
//! Every backend sits behind the [`adapter::Provider`] trait: one
//! `generate` call, a normalized [`adapter::GenerateResult`], and a typed
//! [`error::ProviderError`] channel. Concrete adapters:
//!
//! - [`stability`] -- synchronous image API with model-variant rotation
//!   on transient failure.
//! - [`comfyui`] -- self-hosted ComfyUI instance, submit-then-poll.
//! - [`playht`] -- asynchronous voice API, create-then-poll, audio
//!   returned base64-encoded.
//!
//! [`resolver`] merges server credentials with BYOK overrides into a
//! request-scoped [`adapter::ProviderConfig`] and maps provider names to
//! adapter instances.

pub mod adapter;
pub mod comfyui;
pub mod error;
pub mod playht;
pub mod poll;
pub mod resolver;
pub mod stability;
