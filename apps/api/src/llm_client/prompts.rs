// Cross-cutting prompt fragments. Feature prompts live next to the code that
// sends them.

/// Appended to system prompts whose answer is parsed as JSON.
pub const JSON_ONLY_INSTRUCTION: &str = "Respond with a single JSON object only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Substitutes `{name}` placeholders in one pass over `template`.
/// Substituted values are never rescanned; unknown `{...}` text is kept as is.
pub fn fill_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
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
