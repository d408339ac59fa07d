//! Type definitions

pub mod client;
pub mod messages;
pub mod schedule;
pub mod vehicle;

pub use client::*;
pub use messages::*;
pub use schedule::*;
pub use vehicle::*;
