//! Venus Report - periodic aggregated reporting for the dependency-analysis
//! platform
//!
//! Each run aggregates stack-analysis results and ingestion records from the
//! relational store into daily/weekly/monthly JSON reports persisted to
//! object storage, reconciles ingested EPVs against the graph store, and
//! triggers re-ingestion for packages whose latest version is missing there.
//!
//! # Modules
//!
//! - [`config`] — Strongly-typed configuration with TOML and environment variable support
//! - [`domain`] — Report and ingestion entities, value objects, and errors
//! - [`application`] — Normalization, reconciliation, and orchestration services
//! - [`infrastructure`] — Database queries, object storage, and API clients
//! - [`logging`] — Structured logging with tracing
//!
//! # Architecture
//!
//! ```text
//! venus-report/
//! ├── domain/           # Pure business logic
//! │   ├── report/       # Stack records, report documents
//! │   └── ingestion/    # EPV triples, ingestion reports
//! ├── application/      # Normalizer, reconciler, collation, runner
//! ├── infrastructure/   # Postgres, S3, graph/ingestion/EMR/error-tracking clients
//! └── config/           # Configuration management
//! ```
//!
//! # Configuration
//!
//! Environment variables use the `VENUS__` prefix with double underscore
//! separators:
//!
//! ```bash
//! VENUS__OBJECT_STORE__REPORT_BUCKET=developer-analytics-audit-report
//! VENUS__REPORT__TOP_N=5
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;

pub use config::Config;
pub use logging::init_tracing;
