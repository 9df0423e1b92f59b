pub mod invitation;
pub mod notification;
pub mod team;

// Re-export all models for easy importing
pub use invitation::*;
pub use notification::*;
pub use team::*;
