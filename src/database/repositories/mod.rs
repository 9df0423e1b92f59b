pub mod invitation;
pub mod membership;
pub mod notification;
pub mod team;

// Re-export all repositories for easy importing
pub use invitation::InvitationAuthority;
pub use membership::MembershipLedger;
pub use notification::NotificationRelay;
pub use team::TeamRegistry;
