//! # Handle Check Library
//!
//! A resumable, rate-limited engine for checking the availability of many
//! usernames against a remote service.
//!
//! Work is spread over a fixed pool of workers that share one token-issuing
//! rate limiter. When the service signals "slow down", every worker pauses and
//! the limiter's period escalates. Progress lives in a JSON checkpoint that is
//! written atomically, so an interrupted run picks up where it stopped.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use handle_check_lib::{HttpChecker, RunConfig, Runner, ShutdownController};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let checker = HttpChecker::new("https://example.org/users/{username}", Duration::from_secs(10))?;
//!     let config = RunConfig::default().with_workers(2);
//!     let runner = Runner::new(config, Arc::new(checker));
//!
//!     let shutdown = ShutdownController::new();
//!     shutdown.listen_for_signals();
//!
//!     let report = runner.run(&["alice".to_string()], shutdown.token()).await?;
//!     println!("available: {}", report.count(handle_check_lib::Status::Available));
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Shared rate limiting**: one token per period across all workers
//! - **Escalating backoff**: the period doubles on every rate-limit hit
//! - **Resumable runs**: pending identifiers survive interruption
//! - **Pluggable checkers**: implement [`Checker`] for any service
//! - **Interactive mode**: [`InteractiveSession`] checks names as they are typed

// Re-export main public API types and functions
// This makes them available as handle_check_lib::TypeName
pub use aggregator::{ResultAggregator, ResultSet};
pub use checker::{classify_failure, parse_flood_wait, Checker};
pub use checkpoint::{Checkpoint, CheckpointStore};
pub use concurrent::WorkerPool;
pub use config::{
    load_env_config, CheckerConfig, ConfigManager, DefaultsConfig, EnvConfig, FileConfig,
    GenerationDefaults, Settings, DEFAULT_CHECK_TIMEOUT,
};
pub use error::HandleCheckError;
pub use output::{status_file_name, write_results, DETAILED_RESULTS_FILE};
pub use protocols::{classify_response, HttpChecker, USERNAME_PLACEHOLDER};
pub use rate_limit::{escalated_period, RateLimiter};
pub use runner::Runner;
pub use session::InteractiveSession;
pub use shutdown::ShutdownController;
pub use tasks::{assemble_tasks, parse_identifiers, read_identifiers};
pub use types::{Availability, Identifier, Outcome, RunConfig, RunReport, Status};
pub use utils::parse_duration_string;

// Public modules
pub mod generate;

// Re-export generation types for convenience
pub use generate::{apply_affixes, generate_variants, GenerationConfig};

// Internal modules - these are not part of the public API
mod aggregator;
mod checker;
mod checkpoint;
mod concurrent;
mod config;
mod error;
mod output;
mod protocols;
mod rate_limit;
mod runner;
mod session;
mod shutdown;
mod tasks;
mod types;
mod utils;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, HandleCheckError>;

// Library version, shown in the CLI header
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
