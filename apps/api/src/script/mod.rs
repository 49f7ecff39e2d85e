// Script breakdown: turns raw screenplay text into characters, locations,
// props and a scene count via the LLM. Stateless; nothing here writes to the store.

pub mod analyzer;
pub mod handlers;
pub mod prompts;
