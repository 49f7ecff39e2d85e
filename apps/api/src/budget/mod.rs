// Budget: expense ledger, ML budget prediction, and LLM-drafted budget lines.

pub mod generator;
pub mod handlers;
pub mod ledger;
pub mod predictor;
pub mod prompts;
