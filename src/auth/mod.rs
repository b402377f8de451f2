//! OAuth2 Authorization-Code-with-PKCE authentication
//!
//! Provides the login flow against an OIDC provider:
//! - PKCE verifier/challenge/state generation
//! - Provider endpoint discovery with a 24h per-authority cache
//! - Durable, self-healing session persistence
//! - The flow orchestrator (initialize/login/callback/logout)
//! - An opt-in bounded retry helper for session refresh

pub mod discovery;
pub mod orchestrator;
pub mod pkce;
pub mod retry;
pub mod session;
pub mod types;

pub use orchestrator::{FlowOrchestrator, FlowState};
