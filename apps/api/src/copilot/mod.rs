// Budget Copilot: chat over the budget ledger. Each turn may carry one
// structured action, applied server-side before the reply is returned.

pub mod actions;
pub mod dialogue;
pub mod handlers;
pub mod history;
pub mod prompts;
