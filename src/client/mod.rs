//! Client side of the idea poll: a transport ([api]), the state store every action goes through
//! ([store]) and a text renderer over that state ([view]).
pub mod api;
pub mod store;
pub mod view;

pub use api::{ApiError, HttpApi, IdeaApi, LocalApi};
pub use store::{IdeaStore, Notification, StoreOptions, StoreState};
