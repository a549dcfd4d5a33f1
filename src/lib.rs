//! # Scout Harness
//!
//! A multi-source property search pipeline with feedback-driven re-ranking.
//!
//! A search fans out to every configured listing source, deduplicates the
//! merged candidates by address, enriches each one through an
//! evaluate → argue → compile pipeline, and returns final reports ordered
//! by score. Like/dislike feedback then teaches per-session feature
//! weights that re-rank the results.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌────────────────────────┐
//! │   Sources    │──▶│   Collector   │──▶│        Pipeline        │
//! │ fixture/HTTP │   │ fan-out+dedup │   │ evaluate→argue→compile │
//! └──────────────┘   └───────────────┘   └───────────┬────────────┘
//!                                                    ▼
//!                    ┌───────────────┐   ┌────────────────────────┐
//!                    │    Learner    │◀─▶│      SessionStore      │
//!                    │   feedback    │   │     memory / SQLite    │
//!                    └───────┬───────┘   └────────────────────────┘
//!                            ▼
//!                ┌───────────┐   ┌───────────┐
//!                │    CLI    │   │   HTTP    │
//!                │  (scout)  │   │  (axum)   │
//!                └───────────┘   └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! scout init                                   # create the SQLite schema
//! scout sources                                # check configured sources
//! scout search --preferences ./prefs.json      # run one search inline
//! scout serve                                  # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`traits`] | Collaborator traits and the source registry |
//! | [`collect`] | Concurrent source fan-out and address deduplication |
//! | [`pipeline`] | Session state machine and per-item stage runner |
//! | [`progress`] | Progress arithmetic and terminal reporters |
//! | [`learner`] | Feedback learning and personalized ranking |
//! | [`service`] | Caller-facing search operations |
//! | [`server`] | HTTP server |
//! | [`store`] | Session storage (memory, SQLite) |
//! | [`fixture`] | File-backed listing source |
//! | [`remote`] | HTTP JSON collaborators |
//! | [`heuristics`] | Built-in evaluator, arguer, and compiler |
//! | [`preferences`] | Preference book |
//! | [`search`] | Inline search for the CLI |
//! | [`sources`] | Source health listing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod collect;
pub mod config;
pub mod db;
pub mod fixture;
pub mod heuristics;
pub mod learner;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod preferences;
pub mod progress;
pub mod remote;
pub mod search;
pub mod server;
pub mod service;
pub mod sources;
pub mod store;
pub mod traits;
