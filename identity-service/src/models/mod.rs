pub mod invite;
pub mod key;
pub mod org;
pub mod page;
pub mod role;

pub use invite::{InviteClosed, InviteState, NewInvite, OrgInvite};
pub use key::{Identity, IssuedKey, Key, KeyType, StoredKey};
pub use org::{Action, Org, OrgMembership, OrgRole, OrgUpdate};
pub use page::{Page, PageParams};
pub use role::{PlatformRole, RoleAssignment};
