//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Maintenance: expires and evicts near cache entries, prunes access patterns
//! - Warm-up: periodic full cache warm-up, when enabled

mod cleanup;
mod warmup;

pub use cleanup::spawn_maintenance_task;
pub use warmup::spawn_warmup_task;
