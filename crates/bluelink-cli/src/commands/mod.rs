//! Command implementations for the bluelink CLI

pub mod doors;
pub mod engine;
pub mod session;
pub mod status;

pub use doors::{lock, unlock};
pub use engine::{start, stop};
pub use session::{login, pin};
pub use status::{odometer, status};
