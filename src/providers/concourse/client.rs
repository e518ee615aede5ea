mod builds;
mod core;
mod events;
mod listing;

pub use self::core::ConcourseClient;
