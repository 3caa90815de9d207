pub mod guards;
pub mod tracker;

pub use guards::ConnectionGuard;
pub use tracker::ConnectionTracker;
