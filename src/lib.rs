//! # workervet-query - query cache for the Workervet admin console
//!
//! The admin console reads candidates, jobs, questions and dashboard metrics
//! from a REST API and shows them on many screens at once. This crate keeps
//! those reads in one shared cache so that:
//!
//! - screens asking for the same resource and parameters share one request,
//! - cached data is shown at once and refreshed in the background,
//! - a write invalidates exactly the resources it affects,
//! - a search box only queries once the user stops typing.
//!
//! ## Layers
//!
//! 1. [`transport`]: sends requests and normalizes server errors
//! 2. [`query`]: the cache, observers and mutations
//! 3. [`debounce`]: debounced search input with page reset
//! 4. [`api`]: typed resources and mutations of the admin API
//! 5. [`application`], [`command`], [`subscription`], [`runtime`]: an Elm
//!    Architecture loop that delivers query results as messages
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use workervet_query::api::{AdminApi, Skills};
//! use workervet_query::config::ApiConfig;
//! use workervet_query::query::QueryClient;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ApiConfig::from_env()?;
//! let api = AdminApi::from_config(&config, QueryClient::new())?;
//!
//! let mut skills = api.observe::<Skills>(());
//! let result = skills.changed().await;
//! for skill in result.data().into_iter().flatten() {
//!     println!("{}", skill.skill_name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod application;
pub mod command;
pub mod config;
pub mod debounce;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod query;
pub mod runtime;
pub mod subscription;
pub mod timer;
pub mod transport;

pub use command::Command;
pub use error::QueryError;
