//! Mona - Spanish-speaking virtual companion agent
//!
//! This library provides the core functionality for Mona:
//! - Replay of the agent's last spoken utterance
//! - Persona management and rule-based onboarding
//! - Function tools the LLM can call during a session
//! - LiveKit access tokens and the HTTP server for the frontend
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Frontend                         │
//! │     /getToken   │   RPC replay   │   update_ui      │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                      Mona                            │
//! │   Agent  │  Tools  │  Replay  │  Personas  │  API  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │            Host voice session (LiveKit)             │
//! │    AgentSession  │  RpcRegistry  │  RpcPeer         │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod console;
pub mod error;
pub mod monitor;
pub mod persona;
pub mod replay;
pub mod session;
pub mod tools;

pub use agent::{ConversationalAgent, UserData};
pub use config::{Config, IoMode};
pub use error::{Error, Result};
pub use monitor::SessionMonitor;
pub use persona::{Persona, PersonaManager};
pub use replay::{ReplayConfig, ReplayIntegration, ReplayService};
pub use session::{AgentSession, CompletedUtterance, RpcPeer, RpcRegistry};
pub use tools::{ToolContext, ToolExecutor};
