pub mod admin;
pub mod auth;
pub mod jobs;
pub mod notifications;
pub mod principals;
pub mod studies;
pub mod tasks;
