//! Fixed-size async worker pool with a running tally of task results.
//!
//! # Features
//! - Fixed set of persistent workers over one shared FIFO queue
//! - Blocking `submit` and handle-based `spawn` submission
//! - Running sum/count tally with an explicit empty-state error for `average`
//! - Graceful shutdown that drains every accepted task before workers exit
//! - Panic capture per task; workers survive failing task bodies
//! - Pool metrics and an optional periodic monitor
//!
//! ```
//! use tally_pool::WorkerPoolInner;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tally_pool::PoolError> {
//!     let pool = WorkerPoolInner::new(4)?;
//!     for i in 0..6 {
//!         pool.submit(move || f64::from(i * 2)).await?;
//!     }
//!     assert_eq!(pool.average().await?, 5.0);
//!     pool.shutdown().await
//! }
//! ```

pub mod errors;
pub mod handle;
pub mod model;
pub mod pool;
pub mod result;

pub use errors::PoolError;
pub use handle::TaskHandle;
pub use model::{PoolMetrics, Tally};
pub use pool::{Config, WorkerPool, WorkerPoolInner};
pub use result::PoolResult;
