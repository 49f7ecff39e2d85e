// LLM prompt templates for drafting a budget from a script breakdown.

pub const BUDGET_DRAFT_SYSTEM: &str = "\
You are an experienced line producer preparing a first-pass film budget. \
You turn a script breakdown into concrete budget line items.";

/// Replace `{analysis}`, `{forecast}`, `{max_items}` and `{amount_rules}` before sending.
pub const BUDGET_DRAFT_PROMPT: &str = r#"Draft budget line items for the production described by this script breakdown.

SCRIPT BREAKDOWN (JSON):
{analysis}

CURRENT FORECASTED TOTAL: {forecast}
(0 means the producer has not set a forecast yet.)

Return a JSON object with this EXACT structure:
{
  "items": [
    {"description": "Cast - JOHN (3 shoot days)", "amount": 4500}
  ]
}

Rules:
- At most {max_items} items.
- Cover cast, locations, props, crew, equipment and post-production where the breakdown supports it.
- Descriptions are short and name the character, location or prop they budget for.
- {amount_rules}
- When a forecast is set, keep the sum of amounts at or below it."#;
