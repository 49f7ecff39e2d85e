// Shared prompt fragments and prompt-building utilities.
// Each service that needs LLM calls defines its own prompts.rs alongside it.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// A role description followed by the JSON-only rules, for use as a system prompt.
pub fn json_only_system(role: &str) -> String {
    format!("{}\n\n{JSON_ONLY_SYSTEM}", role.trim_end())
}

/// Instruction appended to every prompt that asks for money amounts.
pub const AMOUNT_INSTRUCTION: &str = "\
    All amounts are plain US dollar numbers with no currency symbol, no thousands \
    separators and no units (write 2500, never \"$2,500\"). Amounts are never negative.";

/// Fills `{name}` placeholders in a template in a single pass, so braces inside
/// substituted values (script text, user messages) are never expanded.
/// Unknown placeholders and literal JSON braces are left as-is.
pub fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let value = after
            .find('}')
            .and_then(|end| {
                let key = &after[..end];
                vars.iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| (*v, end))
            });
        match value {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_only_system_appends_rules() {
        let system = json_only_system("You are a line producer. ");
        assert!(system.starts_with("You are a line producer.\n\n"));
        assert!(system.ends_with(JSON_ONLY_SYSTEM));
    }

    #[test]
    fn test_fill_replaces_every_occurrence() {
        let out = fill("{a} and {a} then {b}", &[("a", "x"), ("b", "y")]);
        assert_eq!(out, "x and x then y");
    }

    #[test]
    fn test_fill_does_not_expand_substituted_values() {
        let out = fill("{script} / {budget}", &[("script", "{budget}"), ("budget", "10")]);
        assert_eq!(out, "{budget} / 10");
    }

    #[test]
    fn test_fill_keeps_json_braces() {
        let out = fill(r#"{"reply": "{x}"}"#, &[("x", "hi")]);
        assert_eq!(out, r#"{"reply": "hi"}"#);
    }

    #[test]
    fn test_fill_leaves_unknown_placeholders() {
        let out = fill("{known} {unknown}", &[("known", "1")]);
        assert_eq!(out, "1 {unknown}");
    }
}
