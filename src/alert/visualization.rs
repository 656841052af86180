//! Prediction visualization artifacts
//!
//! A small SVG bar chart of normal vs anomalous verdict counts per attack
//! type, written to the static directory under a name derived from the attack
//! type so the console (and the current-alert copy step) can find it. Output
//! is a pure function of the verdict counts.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::models::{attack_slug, Verdict};

const WIDTH: u32 = 600;
const HEIGHT: u32 = 500;
const BAR_WIDTH: u32 = 160;
const PLOT_HEIGHT: u32 = 380;
const BASELINE: u32 = 440;

/// Path of the chart artifact for an attack type.
pub fn chart_path(attack_type: &str, output_dir: &Path) -> PathBuf {
    output_dir.join(format!("{}.svg", attack_slug(attack_type)))
}

/// Render and write the chart. Returns the artifact path.
pub fn save_visualization(
    attack_type: &str,
    verdicts: &[Verdict],
    output_dir: &Path,
) -> Result<PathBuf> {
    let anomaly = verdicts.iter().filter(|v| v.is_anomaly()).count();
    let normal = verdicts.len() - anomaly;

    let path = chart_path(attack_type, output_dir);
    let svg = render_svg(attack_type, normal, anomaly);
    std::fs::write(&path, svg)
        .with_context(|| format!("failed to write chart: {}", path.display()))?;
    Ok(path)
}

fn render_svg(attack_type: &str, normal: usize, anomaly: usize) -> String {
    let max = normal.max(anomaly).max(1) as f64;
    let anomaly_h = (anomaly as f64 / max * PLOT_HEIGHT as f64).round() as u32;
    let normal_h = (normal as f64 / max * PLOT_HEIGHT as f64).round() as u32;

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}">"#
    ));
    svg.push_str(&format!(
        r#"<rect width="{WIDTH}" height="{HEIGHT}" fill="white"/>"#
    ));
    svg.push_str(&format!(
        r#"<text x="{}" y="36" text-anchor="middle" font-family="sans-serif" font-size="18">Normal and Anomaly ({}) Prediction</text>"#,
        WIDTH / 2,
        attack_type
    ));

    for (label, count, height, x, fill) in [
        ("Anomaly (0)", anomaly, anomaly_h, 110u32, "#c0392b"),
        ("Normal (1)", normal, normal_h, 330u32, "#27ae60"),
    ] {
        svg.push_str(&format!(
            r#"<rect x="{}" y="{}" width="{BAR_WIDTH}" height="{}" fill="{}"/>"#,
            x,
            BASELINE - height,
            height,
            fill
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" text-anchor="middle" font-family="sans-serif" font-size="14">{}</text>"#,
            x + BAR_WIDTH / 2,
            BASELINE - height - 8,
            count
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" text-anchor="middle" font-family="sans-serif" font-size="14">{}</text>"#,
            x + BAR_WIDTH / 2,
            BASELINE + 24,
            label
        ));
    }

    svg.push_str(&format!(
        r#"<line x1="60" y1="{BASELINE}" x2="{}" y2="{BASELINE}" stroke="black"/>"#,
        WIDTH - 60
    ));
    svg.push_str("</svg>\n");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_path_uses_slug() {
        let dir = Path::new("/tmp/static");
        assert_eq!(
            chart_path("DoS GoldenEye", dir),
            dir.join("DoS_GoldenEye.svg")
        );
    }

    #[test]
    fn test_save_visualization() {
        let dir = tempfile::tempdir().unwrap();
        let verdicts = vec![Verdict::Normal, Verdict::Normal, Verdict::Anomaly];
        let path = save_visualization("Port_Scan", &verdicts, dir.path()).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("Port_Scan"));
        assert!(svg.contains("Anomaly (0)"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let verdicts = vec![Verdict::Anomaly; 5];
        let dir = tempfile::tempdir().unwrap();
        let p1 = save_visualization("Bot_Attack", &verdicts, dir.path()).unwrap();
        let first = std::fs::read(&p1).unwrap();
        let p2 = save_visualization("Bot_Attack", &verdicts, dir.path()).unwrap();
        let second = std::fs::read(&p2).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_verdicts_does_not_divide_by_zero() {
        let dir = tempfile::tempdir().unwrap();
        save_visualization("Web Attack", &[], dir.path()).unwrap();
    }
}
