pub mod health;
pub mod invites;
pub mod rpc;
