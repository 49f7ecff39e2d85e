// Projects: a saved script analysis that owns expenses, chat history and schedule.

pub mod handlers;
pub mod store;
pub mod upload;
