//! Prelude module for convenient imports.
//!
//! ```
//! use workervet_query::prelude::*;
//! ```
//!
//! # What's included
//!
//! - [`QueryClient`], [`QueryObserver`], [`QueryOptions`], [`QueryResult`] - Cached reads
//! - [`Mutation`], [`KeyFilter`] - Writes and invalidation
//! - [`PagedFilter`], [`Debouncer`] - Debounced search input
//! - [`AdminApi`], [`Resource`] - The admin API
//! - [`Application`], [`Command`], [`Subscription`], [`Runtime`] - The message loop

pub use crate::api::{AdminApi, Resource};
pub use crate::application::Application;
pub use crate::command::{Action, Command};
pub use crate::debounce::{Debouncer, PagedFilter};
pub use crate::error::QueryError;
pub use crate::query::{KeyFilter, Mutation, QueryClient, QueryKey, QueryObserver, QueryOptions, QueryResult};
pub use crate::runtime::Runtime;
pub use crate::subscription::Subscription;
