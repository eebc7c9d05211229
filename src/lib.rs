//! # relaysync - Relay Egress List Synchronizer
//!
//! Keeps a Cloudflare Rules IP list identical to the union of two published
//! egress feeds (IPv4 and IPv6). Each run fetches both feeds, normalizes
//! every entry to a canonical CIDR string, compares the result with the list
//! as a set, and replaces the list wholesale only when the sets differ.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        relaysync                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CLI (clap)                                                 │
//! │    └── Commands: serve, run, check, normalize, init         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Config (serde_yaml)  ──►  SyncSettings (per run)           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scheduler (tokio interval)  +  Status endpoint (axum)      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Reconciler                                                 │
//! │    ├── SourceFetcher ── Transport (reqwest, retry)          │
//! │    ├── Normalizer (cidr)                                    │
//! │    └── ListStore ── CloudflareListStore (paginated)         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Alerts (webhook)                                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use relaysync::config::Config;
//! use relaysync::reconciler::{Reconciler, RunOutcome};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("/etc/relaysync/config.yaml")?;
//!     let reconciler = Reconciler::from_settings(config.settings()?)?;
//!
//!     match reconciler.run().await {
//!         RunOutcome::Success(report) => println!("{:?}", report.action),
//!         RunOutcome::Failed(failure) => eprintln!("{}", failure),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`alerts`] - Webhook alerts on failures and list changes
//! - [`cidr`] - Entry normalization to canonical CIDR strings
//! - [`cli`] - Command-line interface definitions
//! - [`commands`] - CLI command implementations
//! - [`config`] - Configuration parsing and validation
//! - [`error`] - Error types
//! - [`fetcher`] - Source feed download and parsing
//! - [`lock`] - File locking for one-shot runs
//! - [`reconciler`] - The fetch, compare, replace run
//! - [`scheduler`] - Periodic trigger with an at-most-one-run guard
//! - [`server`] - Informational HTTP endpoint
//! - [`signal`] - Graceful shutdown signal handling
//! - [`store`] - Remote list store abstraction and Cloudflare client
//! - [`transport`] - HTTP transport with retry
//! - [`utils`] - Common utility functions (formatting, address counting)
//! - [`validation`] - Configuration value validation

pub mod alerts;
pub mod cidr;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod lock;
pub mod reconciler;
pub mod scheduler;
pub mod server;
pub mod signal;
pub mod store;
pub mod transport;
pub mod utils;
pub mod validation;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use error::SyncError;
