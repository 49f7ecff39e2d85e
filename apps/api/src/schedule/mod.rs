// Production schedule: dated tasks per project, listed by start date.

pub mod handlers;
pub mod store;
