//! DMS Engine - rule orchestration and timed execution
//!
//! [`RuleManager`] is the stateless façade over the rule and log stores that
//! both REST handlers and the [`Scheduler`] go through.

pub mod manager;
pub mod scheduler;

pub use manager::RuleManager;
pub use scheduler::{Scheduler, TickReport};
