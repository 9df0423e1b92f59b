pub mod invitations;
pub mod teams;

pub use invitations::InvitationService;
pub use teams::TeamService;
