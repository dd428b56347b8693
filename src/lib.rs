//! # Study Agents
//!
//! Two LLM task-turn services, a study planner and a programming exercise
//! generator, served over the A2A task protocol.
//!
//! This library provides:
//! - An HTTP API with the agent card, JSON-RPC task methods and SSE streaming
//! - A reactive tool-use agent loop backed by Gemini
//! - Tools loaded from MCP servers over stdio
//!
//! ## Architecture
//!
//! Each request flows through the same layers:
//! 1. The request handler resolves or creates the task
//! 2. The task executor runs one agent turn through the streaming adapter
//! 3. The agent loop calls the model and tools, then asks for a structured status
//! 4. Turn results become `working`, `input-required` or `completed` task events
//!
//! The two services differ only in their [`profile::AgentProfile`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use study_agents::{cli, profile::AgentProfile};
//!
//! cli::run(AgentProfile::study_planner()).await?;
//! ```

pub mod a2a;
pub mod agent;
pub mod api;
pub mod cli;
pub mod config;
pub mod llm;
pub mod mcp;
pub mod profile;
pub mod tools;

pub use config::Config;
pub use profile::AgentProfile;
