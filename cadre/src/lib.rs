//! Cadre is an autonomous multi-agent orchestration engine: agents are
//! selected from a registry, model calls are routed by prefix, tools execute
//! under governance and autonomy budgets, every execution leaves an
//! append-only trace, and releases advance only through regression gates.
//!
//! The crate is organised around the execution contract:
//!
//! - [`reasoning`] - the bounded model/tool loop and its failure taxonomy
//! - [`governance`] - pre-execution checks and audit logging
//! - [`hooks`] - ordered middleware around every lifecycle event
//! - [`autonomy`] - approvable budgets with runtime enforcement
//! - [`workflow`] - dependency-aware DAG scheduling with retries
//! - [`trace`] - append-only execution records and failure classification
//! - [`gates`] - threshold-based regression gating
//! - [`comparative`] - Elo ratings, percentiles, and leaderboards
//! - [`retrieval`] - BM25 + vector hybrid search fused with RRF
//! - [`engine`] - the root context wiring it all together

pub mod agents;
pub mod autonomy;
pub mod comparative;
pub mod engine;
pub mod gates;
pub mod governance;
pub mod hooks;
pub mod packs;
pub mod prelude;
pub mod reasoning;
pub mod retrieval;
pub mod router;
pub mod skills;
pub mod tools;
pub mod trace;
pub mod workflow;

mod util;

pub use engine::{AgentInvokeResult, Engine, EngineBuilder, EngineError};
