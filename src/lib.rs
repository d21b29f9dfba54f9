pub mod analytics;
pub mod api_router;
pub mod auth;
pub mod comments;
pub mod config;
pub mod directory;
pub mod notifications;
pub mod shared;
pub mod tickets;
