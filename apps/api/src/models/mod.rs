pub mod asset;
pub mod chat;
pub mod expense;
pub mod project;
pub mod scene;
pub mod schedule;
