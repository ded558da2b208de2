//! # Sensorwatch
//!
//! Async side of the Sensorwatch telemetry dashboard.
//!
//! ```text
//! ┌──────────────┐   RawEvent   ┌──────────────────┐  SeriesSnapshot  ┌───────────┐
//! │ EventSource  │ ───────────▶ │ LifecycleManager │ ───────────────▶ │ renderers │
//! │ (eth_getLogs)│              │ (sensorwatch-core│   (watch chan)   │ table/API │
//! └──────────────┘              │   Lifecycle)     │                  └───────────┘
//!        ▲                      └────────┬─────────┘
//!        │                               │ get_block / accounts / signer
//!        └──────── CapabilityProvider ◀──┘
//! ```
//!
//! The manager owns the only mutable series. Renderers read published
//! snapshots and never touch session state.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod manager;
pub mod provider;
pub mod render;
pub mod rpc;
pub mod source;
