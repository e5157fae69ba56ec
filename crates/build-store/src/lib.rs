//! Build Store
//!
//! The narrow object-store interface the package build controller consumes:
//! get/create/replace/delete for the `PackageBuild` resource and its children,
//! plus the status-only write path.
//!
//! # Example
//!
//! ```no_run
//! use build_store::{BuildStore, KubeStore};
//!
//! # async fn example() -> Result<(), build_store::StoreError> {
//! let store = KubeStore::try_default().await?;
//! if let Some(build) = store.get_package_build("default", "pkg1").await? {
//!     println!("pkg1 is {}", build.install_status());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Classified errors**: API failures are mapped onto `NotFound`,
//!   `AlreadyExists`, `Conflict` and `Invalid` so callers can branch on kind
//! - **Optimistic concurrency**: status writes and replaces carry the observed
//!   `resourceVersion` and fail with `Conflict` when it is stale
//! - **Mocking**: `MockStore` (feature `test-util`) keeps objects in memory

pub mod client;
pub mod error;
#[path = "trait.rs"]
pub mod store_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::KubeStore;
pub use error::StoreError;
pub use store_trait::BuildStore;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockStore, StoreOperation};
