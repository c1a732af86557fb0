//! # cursor-recall
//!
//! Locates the [Cursor](https://cursor.com) IDE's per-workspace SQLite
//! stores, extracts AI chat conversation records from them, and reduces
//! that history to the messages behind a single git commit.
//!
//! ## What it does
//!
//! Cursor keeps chat sessions ("composers") in `state.vscdb` files under
//! its `workspaceStorage` tree, rotating into fresh chunks as history
//! grows. This crate discovers those stores per platform (Windows, macOS,
//! Linux, and WSL mounts), opens them **read-only** — your data is never
//! modified — and reassembles prompts, generations, and per-bubble
//! records into one uniform message list. Given a commit's timestamps it
//! computes the time window the work happened in, pulls every session
//! that overlaps it, caps the result per role, and finally asks a
//! caller-supplied AI capability where this commit's work begins so the
//! list can be trimmed to just that.
//!
//! ## Degradation over failure
//!
//! A corrupt store chunk, a malformed record, or an unavailable model
//! never abort a run: each layer skips what it cannot read and the
//! boundary filter falls back to keeping everything. The one loud failure
//! is finding no workspace at all with no override set.
//!
//! ## Compatibility
//!
//! Tracks Cursor's internal (undocumented) SQLite layout. Schema drift
//! surfaces as a distinct error category rather than a generic failure,
//! so an IDE update that moves the furniture is recognizable from logs.

pub mod boundary;
pub mod config;
pub mod discover;
pub mod error;
pub mod extract;
pub mod limiter;
pub mod locate;
pub mod pipeline;
pub mod reconstruct;
pub mod sessions;
pub mod store;
pub mod telemetry;
pub mod validate;
pub mod window;

pub use boundary::{AiInvoker, BoundaryDecision, CommitContext, FilterPolicy, StreamlinedMessage};
pub use config::RecallConfig;
pub use error::{InvokeError, LocateError, StoreError};
pub use pipeline::{RecallOutcome, recall_for_commit, resolve_workspace};
pub use reconstruct::{ReconstructedMessage, Role};
pub use sessions::SessionProvider;
pub use window::{CommitTimes, TimeWindow, WindowStrategy, window_for};
