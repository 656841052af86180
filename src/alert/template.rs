//! Alert template rendering
//!
//! Per-attack-type template files live in the templates directory, named by
//! attack slug. Rendering substitutes the source-IP and percentage
//! placeholders and nothing else, so identical inputs always produce
//! byte-identical output.

/// Placeholder for the offending source IP.
pub const SOURCE_IP_PLACEHOLDER: &str = "{source_ip}";
/// Placeholder for the anomaly percentage (rendered with a trailing `%`).
pub const PERCENTAGE_PLACEHOLDER: &str = "{percentage}";

/// Stable percentage text: two decimals with trailing zeros trimmed.
pub fn format_percentage(pct: f64) -> String {
    let s = format!("{:.2}", pct);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Substitute both placeholders into a template.
pub fn render(template: &str, source_ip: &str, percentage: f64) -> String {
    template
        .replace(SOURCE_IP_PLACEHOLDER, source_ip)
        .replace(
            PERCENTAGE_PLACEHOLDER,
            &format!("{}%", format_percentage(percentage)),
        )
}
