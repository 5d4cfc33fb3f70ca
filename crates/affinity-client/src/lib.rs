//! # affinity-client
//!
//! REST implementation of the affinity tag store.
//!
//! This crate provides:
//! - [`HttpTagStore`], a `reqwest`-backed [`TagStore`](affinity_core::TagStore)
//! - [`ClientConfig`], read from `AFFINITY_*` environment variables
//! - Mapping of HTTP status codes onto [`affinity_core::Error`]
//!
//! # Example
//!
//! ```rust,no_run
//! use affinity_client::HttpTagStore;
//! use affinity_core::{TagStore, UserId};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = HttpTagStore::from_env().unwrap();
//!     let tags = store.get_tags(UserId(1), UserId(2)).await.unwrap();
//!     println!("{:?}", tags);
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;

// Re-export core types
pub use affinity_core::*;

pub use config::ClientConfig;
pub use error::StoreErrorCode;
pub use http::HttpTagStore;
