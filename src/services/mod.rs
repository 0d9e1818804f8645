pub mod delegate;
pub mod exclusions;
pub mod packer;
pub mod ranking;
pub mod recommendations;
pub mod reconcile;
pub mod resolver;
pub mod store;

pub use delegate::DelegateClient;
pub use recommendations::{Collaborators, Recommender};
pub use resolver::{FederatedResolver, IdentityResolver};
pub use store::{AccountDirectory, FollowGraph, HiddenAccounts, PolicySource};
