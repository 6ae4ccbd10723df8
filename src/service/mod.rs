//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate the database and the external collaborators.

mod directory;
mod invitation;

pub use directory::UserDirectory;
pub use invitation::InvitationService;
