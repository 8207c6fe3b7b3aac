// Shared prompt fragments.
// Each feature that needs model calls keeps its own prompts.rs alongside it;
// this file only holds the pieces every JSON prompt ends with.

/// Output contract appended to every prompt that expects JSON back.
pub const JSON_ONLY_INSTRUCTION: &str = "\
CRITICAL: Return ONLY valid JSON. Do NOT wrap the response in markdown code blocks (```json). \
Do NOT add commentary or explanations. Start the response with { and end it with }.";

/// Rules that keep extraction prompts from inventing content.
pub const NO_INVENTION_INSTRUCTION: &str = "\
Only use what is explicitly present in the input. Do not infer, assume, or add information \
that is not stated. Keep the original phrasing where possible.";

/// Substitutes `{name}` placeholders in a single pass.
///
/// Substituted values are never re-scanned, so user text containing
/// `{job_description}` cannot pull another field into the prompt. Braces that
/// do not name a known variable (JSON examples) are left as they are.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let var = vars
            .iter()
            .find(|(name, _)| tail.starts_with(name) && tail[name.len()..].starts_with('}'));
        match var {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }

    out.push_str(rest);
    out
}
