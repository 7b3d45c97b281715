//! # Zici
//!
//! Exposure tracking and mastery progress for Chinese reading practice.
//!
//! Zici is the learning-progress core of a document-analysis service: an
//! external pipeline parses uploaded documents (PDF/EPUB/plain text) and
//! counts Han-character and word frequencies; Zici ingests those counts
//! as per-user exposure events, classifies every character and word into
//! a mastery tier, and answers progress, recommendation, and mastered-item
//! queries over HTTP and the CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────┐
//! │ Analysis     │──▶│  Tracker     │──▶│  SQLite    │
//! │ pipeline     │   │ fold + tier  │   │ 1 row/user │
//! └──────────────┘   └──────────────┘   └─────┬─────┘
//!                                             │
//!                         ┌───────────────────┤
//!                         ▼                   ▼
//!                    ┌──────────┐       ┌──────────┐
//!                    │   CLI    │       │   HTTP   │
//!                    │   (zi)   │       │  (axum)  │
//!                    └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! zi init                        # create database
//! zi track --user u1 --counts counts.json --filename book.pdf
//! zi progress --user u1          # full dashboard summary
//! zi recommend --user u1         # items worth drilling
//! zi serve                       # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`mastery`] | Mastery tier classification |
//! | [`store`] | Storage trait and error taxonomy |
//! | [`store_memory`] | In-memory store adapter |
//! | [`store_sqlite`] | SQLite store adapter |
//! | [`tracker`] | Exposure ingestion |
//! | [`progress`] | Progress queries |
//! | [`registry`] | File dedup registry |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`stats`] | Database overview |

pub mod config;
pub mod db;
pub mod mastery;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod registry;
pub mod server;
pub mod stats;
pub mod store;
pub mod store_memory;
pub mod store_sqlite;
pub mod tracker;
