//! Application services - Broadcast delivery and scheduling

pub mod broadcast_service;
pub mod scheduler;

pub use broadcast_service::Broadcaster;
pub use scheduler::{DailyScheduler, DailyTrigger, SchedulerMessage};
