//! # Knowledge-base harness
//!
//! A small knowledge-base service: documents of many formats are reduced to
//! text, stored in datasets, chunked, and searched by keyword.
//!
//! ## Architecture
//!
//! ```text
//! bytes + hint ──▶ classify ──▶ extract ──▶ {title, text}
//!                                               │
//!   upload (multipart) ──▶ store ◀──────────────┘ (scrape returns it directly)
//!                            │
//!                  chunk ◀───┴───▶ search
//!                            │
//!                        snapshot (JSON file)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Tracing subscriber setup |
//! | [`models`] | Core data types |
//! | [`classify`] | Format detection from media type and file name |
//! | [`extract`] | Per-format text extraction |
//! | [`fetch`] | Remote fetch and the scrape pipeline |
//! | [`multipart`] | Upload body parsing |
//! | [`chunk`] | Document chunking |
//! | [`search`] | Keyword retrieval |
//! | [`snapshot`] | Snapshot file persistence |
//! | [`store`] | The dataset store |
//! | [`server`] | HTTP API |

pub mod chunk;
pub mod classify;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod logging;
pub mod models;
pub mod multipart;
pub mod search;
pub mod server;
pub mod snapshot;
pub mod store;
