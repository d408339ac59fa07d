//! Business logic services

pub mod auto_reschedule;
pub mod fuel;
pub mod geo;
pub mod memory;
pub mod notifications;
pub mod planning;
pub mod ports;
pub mod scheduler;
