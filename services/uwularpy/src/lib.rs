//! uwularpy
//!
//! GitHub App that answers `@uwularpy` mentions in issue comments with a
//! pull request rewriting every markdown file in the repository.
//!
//! ## Flow
//!
//! 1. `POST /webhook` receives an `issue_comment` delivery
//! 2. [`signature`] checks `X-Hub-Signature-256` against the raw body
//! 3. [`dispatcher`] filters for created comments containing the trigger
//! 4. [`auth`] mints an installation token for the delivery
//! 5. [`pipeline`] creates the branch, commits the script, rewrites the
//!    markdown, removes the script, and opens the pull request
//!
//! ## Binaries
//!
//! - `uwularpy`: the webhook server
//! - `health-server`: liveness endpoints only

pub mod auth;
pub mod config;
pub mod dispatcher;
pub mod github;
pub mod pipeline;
pub mod server;
pub mod signature;
pub mod uwu;

pub use config::Config;
pub use dispatcher::{Delivery, DispatchError, Dispatcher};
pub use pipeline::{Pipeline, PipelineError, PipelineOutcome, Step};

/// Install the JSON log subscriber, honouring `RUST_LOG` (default `info`)
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .init();
}
