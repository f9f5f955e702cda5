//! Compute inventory API client.
//!
//! This crate is the boundary between the mapping engine and the cloud
//! provider. It focuses on:
//!
//! - The [`InventoryClient`] seam the engine collects records through
//! - A reqwest-backed [`ComputeClient`] for the GCE `aggregated/instances` listing
//! - Discovering an access token ([`Credential`]) from explicit input or the environment
//! - Validating `COMPUTE_API_BASE` for safety
//!
//! # Example
//!
//! ```ignore
//! use nodemap_api::{AggregatedListRequest, ComputeClient, InventoryClient};
//!
//! async fn first_page() -> Result<(), nodemap_api::ApiError> {
//!     let client = ComputeClient::new_from_env()?;
//!     let page = client.aggregated_instances(&AggregatedListRequest::new("my-project")).await?;
//!     println!("zones: {}", page.items.map(|items| items.len()).unwrap_or(0));
//!     Ok(())
//! }
//! ```

mod client;
mod credential;
mod error;
mod model;

use async_trait::async_trait;

pub use client::{COMPUTE_API_BASE_ENV, ComputeClient, DEFAULT_COMPUTE_API_BASE};
pub use credential::Credential;
pub use error::ApiError;
pub use model::{AggregatedInstanceList, AggregatedListRequest, InstancesScopedList, ListWarning};

/// Source of paginated, scope-aggregated resource listings.
///
/// One call returns one page; callers follow `next_page_token` themselves.
#[async_trait]
pub trait InventoryClient: Send + Sync {
    async fn aggregated_instances(&self, request: &AggregatedListRequest) -> Result<AggregatedInstanceList, ApiError>;
}
