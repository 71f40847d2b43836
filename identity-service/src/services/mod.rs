pub mod authz;
pub mod error;
pub mod invites;
pub mod jwt;
pub mod notifier;
pub mod orgs;
pub mod tokens;

pub use authz::{AuthzService, Subject};
pub use error::{ServiceError, ServiceResult};
pub use invites::{CreateInvite, InviteService};
pub use jwt::JwtService;
pub use notifier::{InviteNotifier, LogNotifier, MockNotifier, SmtpNotifier};
pub use orgs::{NewOrg, OrgService};
pub use tokens::{IssueParams, TokenService};
