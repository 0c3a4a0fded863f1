//! olla-probe - verification harness for the Olla LLM gateway
//!
//! Discovers the gateway's endpoints and models, reconciles them into
//! per-backend test plans, and verifies protocol mode, response structure and
//! streaming behaviour from headers, decoded stream events and arrival timing.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod gateway;
pub mod logging;
pub mod reconciler;
pub mod report;
pub mod stream;
pub mod suite;
pub mod timing;
pub mod verify;
