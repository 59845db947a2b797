//! # Campaign engine public API
//!
//! * [`campaign_api`] is the administrative surface: defining campaigns and rules, lifecycle
//!   transitions, soft deletion, sync-key upserts, and reporting reads.
//! * [`evaluation_api`] is the order-time surface: evaluating an order against the active
//!   campaigns and reversing an order's committed usage on cancellation.
//!
//! Both APIs are generic over a storage backend implementing the traits in [`crate::traits`];
//! construct them by handing over a backend instance:
//!
//! ```rust,ignore
//! use campaign_engine::{EvaluationApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(&url, 5).await?;
//! let api = EvaluationApi::new(db);
//! let applied = api.evaluate_order(&context).await?;
//! ```

pub mod campaign_api;
pub mod campaign_objects;
pub mod errors;
pub mod evaluation_api;
pub mod evaluation_objects;
