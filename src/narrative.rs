//src/narrative.rs

use std::fmt::Write as FmtWrite;

use colored::Color;

use crate::quality::{Assessment, Quality, QualityThresholds};
use crate::types::{display_float, display_metric, BinSummary};

pub const DEFAULT_CSS: &str = "\
body { font-family: Arial, sans-serif; max-width: 1200px; margin: 20px auto; padding: 0 20px; }
h1, h2 { color: #2c3e50; }
.mag-entry { border: 1px solid #ddd; margin: 10px 0; padding: 15px; border-radius: 5px; }
.good-quality { color: #27ae60; }
.fair-quality { color: #f39c12; }
.midas-found { color: #27ae60; }
.midas-not-found { color: #c0392b; }
.failed-metrics { color: #f39c12; font-style: italic; }
.summary { background-color: #f8f9fa; padding: 15px; border-radius: 5px; margin: 20px 0; }
.parameters { color: #7f8c8d; margin-bottom: 20px; }
";

/// Terminal colours of the plain-text narrative.
#[derive(Debug, Clone, PartialEq)]
pub struct AnsiPalette {
    /// Emit escape codes at all
    pub enabled: bool,
    pub good: Color,
    pub fair: Color,
    pub missing: Color,
}

impl Default for AnsiPalette {
    fn default() -> Self {
        Self {
            enabled: true,
            good: Color::BrightGreen,
            fair: Color::BrightYellow,
            missing: Color::BrightRed,
        }
    }
}

impl AnsiPalette {
    /// Escape codes depend only on `enabled`, never on the terminal.
    fn paint(&self, text: &str, color: Color) -> String {
        if self.enabled {
            format!("\x1b[{}m{}\x1b[0m", color.to_fg_str(), text)
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        if self.enabled {
            format!("\x1b[1m{}\x1b[0m", text)
        } else {
            text.to_string()
        }
    }

    fn quality(&self, text: &str, quality: Quality) -> String {
        match quality {
            Quality::Good => self.paint(text, self.good),
            Quality::Fair => self.paint(text, self.fair),
        }
    }
}

/// Styling for both renderers.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportStyle {
    pub ansi: AnsiPalette,
    /// Stylesheet embedded in the HTML report
    pub css: String,
}

impl Default for ReportStyle {
    fn default() -> Self {
        Self {
            ansi: AnsiPalette::default(),
            css: DEFAULT_CSS.to_string(),
        }
    }
}

/// One bin with its quality verdict.
#[derive(Debug, Clone)]
pub struct NarrativeEntry<'a> {
    pub bin: &'a BinSummary,
    pub assessment: Assessment,
}

impl NarrativeEntry<'_> {
    pub fn midas_status(&self) -> &'static str {
        if self.bin.has_midas_support() { "Found" } else { "Not found" }
    }

    pub fn failed_message(&self) -> Option<String> {
        match self.assessment.quality {
            Quality::Good => None,
            Quality::Fair => Some(format!("(Failed metrics: {})", self.assessment.failed_metrics.join(", "))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryCounts {
    pub total: usize,
    pub good: usize,
    pub fair: usize,
    pub good_with_midas: usize,
    pub fair_with_midas: usize,
}

/// The classified record set shared by the text and HTML renderers.
#[derive(Debug, Clone)]
pub struct Narrative<'a> {
    pub thresholds: QualityThresholds,
    pub summary: SummaryCounts,
    /// Most widely detected bins first
    pub entries: Vec<NarrativeEntry<'a>>,
}

/// Classifies every bin that has a numeric ANI.
pub fn build_narrative<'a>(bins: &'a [BinSummary], thresholds: &QualityThresholds) -> Narrative<'a> {
    let mut entries: Vec<NarrativeEntry<'a>> = bins
        .iter()
        .filter(|b| b.ani.is_some())
        .map(|bin| NarrativeEntry { bin, assessment: bin.assess(thresholds) })
        .collect();
    entries.sort_by_key(|e| std::cmp::Reverse(e.bin.samples));

    let mut summary = SummaryCounts { total: entries.len(), ..Default::default() };
    for entry in &entries {
        let supported = entry.bin.has_midas_support();
        match entry.assessment.quality {
            Quality::Good => {
                summary.good += 1;
                summary.good_with_midas += supported as usize;
            }
            Quality::Fair => {
                summary.fair += 1;
                summary.fair_with_midas += supported as usize;
            }
        }
    }

    Narrative {
        thresholds: thresholds.clone(),
        summary,
        entries,
    }
}

fn thresholds_line(t: &QualityThresholds) -> String {
    format!(
        "Minimum Completeness: {}%, Maximum Contamination: {}%, Minimum ANI: {}%, Minimum AF: {}",
        t.min_completeness, t.max_contamination, t.min_ani, t.min_af
    )
}

/// Plain-text narrative with ANSI colours.
pub fn render_text(narrative: &Narrative, style: &ReportStyle) -> String {
    let p = &style.ansi;
    let s = &narrative.summary;
    let mut out = String::new();

    let _ = writeln!(out, "{}", p.bold("Summary of MAGs Analysis:"));
    let _ = writeln!(out, "({})", thresholds_line(&narrative.thresholds));
    out.push('\n');
    let _ = writeln!(out, "{}", p.bold("Summary Statistics:"));
    let _ = writeln!(out, "- Total MAGs analyzed: {}", s.total);
    let _ = writeln!(out, "- Good quality MAGs: {}", p.paint(&s.good.to_string(), p.good));
    let _ = writeln!(out, "- Fair quality MAGs: {}", p.paint(&s.fair.to_string(), p.fair));
    let _ = writeln!(out, "- Good quality MAGs with MIDAS2 support: {}", p.paint(&s.good_with_midas.to_string(), p.good));
    let _ = writeln!(out, "- Fair quality MAGs with MIDAS2 support: {}", p.paint(&s.fair_with_midas.to_string(), p.fair));
    out.push('\n');
    let _ = writeln!(out, "{}", p.bold("Most Widely Distributed MAGs:"));

    for entry in &narrative.entries {
        let bin = entry.bin;
        let quality = entry.assessment.quality;
        let midas = if bin.has_midas_support() {
            p.paint(entry.midas_status(), p.good)
        } else {
            p.paint(entry.midas_status(), p.missing)
        };
        let failed = entry
            .failed_message()
            .map(|m| format!(" {}", p.paint(&m, p.fair)))
            .unwrap_or_default();

        let _ = writeln!(out, "{}", p.bold(&format!("{}:", bin.bin)));
        let _ = writeln!(
            out,
            "- Taxonomy: {} (ANI: {}%, AF: {})",
            bin.taxonomy(),
            display_metric(bin.ani),
            display_metric(bin.af)
        );
        let _ = writeln!(
            out,
            "- MIDAS2 support: {} in raw reads (Found in {} samples, Average coverage: {})",
            midas,
            bin.midas_samples,
            display_metric(bin.midas_coverage)
        );
        let _ = writeln!(
            out,
            "- MAG detection: Present in {} samples ({})",
            bin.samples,
            bin.present_in.join(", ")
        );
        let _ = writeln!(
            out,
            "- Quality: {}{} (Completeness: {}%, Contamination: {}%)",
            p.quality(quality.label(), quality),
            failed,
            display_float(bin.completeness),
            display_float(bin.contamination)
        );
        let _ = writeln!(
            out,
            "- Characteristics: {} Mbp genome, {}% GC content, {}% strain heterogeneity",
            display_float(bin.genome_size),
            display_float(bin.gc),
            display_float(bin.strain_heterogeneity)
        );
    }
    out
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn quality_class(quality: Quality) -> &'static str {
    match quality {
        Quality::Good => "good-quality",
        Quality::Fair => "fair-quality",
    }
}

/// HTML narrative; same fields and order as `render_text`.
pub fn render_html(narrative: &Narrative, style: &ReportStyle) -> String {
    let s = &narrative.summary;
    let mut out = String::new();

    let _ = write!(
        out,
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Summary of MAGs Analysis</title>
    <style>
{}
    </style>
</head>
<body>
    <h1>Summary of MAGs Analysis</h1>
    <div class="parameters">{}</div>
    <div class="summary">
        <h2>Summary Statistics</h2>
        <ul>
            <li>Total MAGs analyzed: {}</li>
            <li>Good quality MAGs: <span class="good-quality">{}</span></li>
            <li>Fair quality MAGs: <span class="fair-quality">{}</span></li>
            <li>Good quality MAGs with MIDAS2 support: <span class="good-quality">{}</span></li>
            <li>Fair quality MAGs with MIDAS2 support: <span class="fair-quality">{}</span></li>
        </ul>
    </div>
    <h2>Most Widely Distributed MAGs</h2>
"#,
        style.css.trim_end(),
        thresholds_line(&narrative.thresholds),
        s.total,
        s.good,
        s.fair,
        s.good_with_midas,
        s.fair_with_midas
    );

    for entry in &narrative.entries {
        let bin = entry.bin;
        let quality = entry.assessment.quality;
        let midas_class = if bin.has_midas_support() { "midas-found" } else { "midas-not-found" };
        let failed = entry
            .failed_message()
            .map(|m| format!(r#" <span class="failed-metrics">{}</span>"#, escape_html(&m)))
            .unwrap_or_default();

        let _ = write!(
            out,
            r#"    <div class="mag-entry">
        <h2>{}</h2>
        <ul>
            <li><strong>Taxonomy:</strong> {} (ANI: {}%, AF: {})</li>
            <li><strong>MIDAS2 support:</strong> <span class="{}">{}</span> in raw reads (Found in {} samples, Average coverage: {})</li>
            <li><strong>MAG detection:</strong> Present in {} samples ({})</li>
            <li><strong>Quality:</strong> <span class="{}">{}</span>{} (Completeness: {}%, Contamination: {}%)</li>
            <li><strong>Characteristics:</strong> {} Mbp genome, {}% GC content, {}% strain heterogeneity</li>
        </ul>
    </div>
"#,
            escape_html(&bin.bin),
            escape_html(&bin.taxonomy()),
            display_metric(bin.ani),
            display_metric(bin.af),
            midas_class,
            entry.midas_status(),
            bin.midas_samples,
            display_metric(bin.midas_coverage),
            bin.samples,
            escape_html(&bin.present_in.join(", ")),
            quality_class(quality),
            quality.label(),
            failed,
            display_float(bin.completeness),
            display_float(bin.contamination),
            display_float(bin.genome_size),
            display_float(bin.gc),
            display_float(bin.strain_heterogeneity)
        );
    }

    out.push_str("</body>\n</html>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(bin: &str, samples: usize, completeness: f64, ani: Option<f64>, midas_samples: usize) -> BinSummary {
        BinSummary {
            bin: bin.to_string(),
            samples,
            present_in: (0..samples).map(|i| format!("S{}", i + 1)).collect(),
            completeness,
            contamination: 5.0,
            strain_heterogeneity: 0.0,
            genome_size: 2.5,
            gc: 50.1,
            genus: "Escherichia".to_string(),
            species: "Escherichia coli".to_string(),
            ani,
            af: Some(0.9),
            midas_samples,
            midas_coverage: if midas_samples > 0 { Some(0.45) } else { None },
        }
    }

    fn bins() -> Vec<BinSummary> {
        vec![
            summary("bin.2", 3, 70.0, Some(98.0), 0),
            summary("bin.1", 5, 85.0, Some(98.0), 2),
            summary("bin.3", 9, 95.0, None, 1),
        ]
    }

    fn plain() -> ReportStyle {
        ReportStyle {
            ansi: AnsiPalette { enabled: false, ..Default::default() },
            ..Default::default()
        }
    }

    #[test]
    fn test_narrative_skips_bins_without_ani_and_counts() {
        let bins = bins();
        let n = build_narrative(&bins, &QualityThresholds::default());
        let ids: Vec<&str> = n.entries.iter().map(|e| e.bin.bin.as_str()).collect();
        assert_eq!(ids, vec!["bin.1", "bin.2"]);
        assert_eq!(
            n.summary,
            SummaryCounts { total: 2, good: 1, fair: 1, good_with_midas: 1, fair_with_midas: 0 }
        );
    }

    #[test]
    fn test_plain_text_narrative() {
        let bins = bins();
        let n = build_narrative(&bins, &QualityThresholds::default());
        let text = render_text(&n, &plain());

        assert!(text.starts_with("Summary of MAGs Analysis:\n(Minimum Completeness: 80%, Maximum Contamination: 10%, Minimum ANI: 97%, Minimum AF: 0.8)\n"));
        assert!(text.contains("- Total MAGs analyzed: 2\n"));
        assert!(text.contains("bin.1:\n- Taxonomy: Escherichia Escherichia coli (ANI: 98.0%, AF: 0.9)\n"));
        assert!(text.contains("- MIDAS2 support: Found in raw reads (Found in 2 samples, Average coverage: 0.45)\n"));
        assert!(text.contains("- MIDAS2 support: Not found in raw reads (Found in 0 samples, Average coverage: NA)\n"));
        assert!(text.contains("- MAG detection: Present in 5 samples (S1, S2, S3, S4, S5)\n"));
        assert!(text.contains("- Quality: Good quality (Completeness: 85.0%, Contamination: 5.0%)\n"));
        assert!(text.contains("- Quality: Fair quality (Failed metrics: Completeness below 80%) (Completeness: 70.0%"));
        assert!(text.contains("- Characteristics: 2.5 Mbp genome, 50.1% GC content, 0.0% strain heterogeneity\n"));
        assert!(!text.contains('\u{1b}'));
        assert!(text.find("bin.1:").unwrap() < text.find("bin.2:").unwrap());
    }

    #[test]
    fn test_default_style_emits_ansi_codes() {
        let bins = bins();
        let n = build_narrative(&bins, &QualityThresholds::default());
        let text = render_text(&n, &ReportStyle::default());

        assert!(text.contains("\u{1b}[1mSummary of MAGs Analysis:\u{1b}[0m"));
        assert!(text.contains("\u{1b}[92mGood quality\u{1b}[0m"));
        assert!(text.contains("\u{1b}[93mFair quality\u{1b}[0m"));
        assert!(text.contains("\u{1b}[91mNot found\u{1b}[0m"));
    }

    #[test]
    fn test_palette_comes_from_style() {
        let bins = bins();
        let n = build_narrative(&bins, &QualityThresholds::default());
        let style = ReportStyle {
            ansi: AnsiPalette { good: Color::Cyan, missing: Color::Magenta, ..Default::default() },
            ..Default::default()
        };
        let text = render_text(&n, &style);

        assert!(text.contains("\u{1b}[36mGood quality\u{1b}[0m"));
        assert!(text.contains("\u{1b}[35mNot found\u{1b}[0m"));
        assert!(!text.contains("\u{1b}[92m"));
    }

    #[test]
    fn test_html_matches_text_fields() {
        let bins = bins();
        let n = build_narrative(&bins, &QualityThresholds::default());
        let html = render_html(&n, &ReportStyle::default());

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(".mag-entry {"));
        assert!(html.contains("<li>Total MAGs analyzed: 2</li>"));
        assert!(html.contains(r#"<span class="midas-found">Found</span>"#));
        assert!(html.contains(r#"<span class="midas-not-found">Not found</span>"#));
        assert!(html.contains(r#"<span class="failed-metrics">(Failed metrics: Completeness below 80%)</span>"#));
        assert_eq!(html.matches(r#"<div class="mag-entry">"#).count(), n.entries.len());

        let text = render_text(&n, &plain());
        for line in ["ANI: 98.0%, AF: 0.9", "Present in 3 samples (S1, S2, S3)", "Average coverage: 0.45"] {
            assert!(text.contains(line) && html.contains(line), "{}", line);
        }
    }

    #[test]
    fn test_html_escapes_names() {
        let mut bin = summary("bin<1>&", 3, 90.0, Some(99.0), 0);
        bin.present_in = vec!["S\"1".to_string()];
        let bins = vec![bin];
        let html = render_html(&build_narrative(&bins, &QualityThresholds::default()), &ReportStyle::default());
        assert!(html.contains("<h2>bin&lt;1&gt;&amp;</h2>"));
        assert!(html.contains("(S&quot;1)"));
    }

    #[test]
    fn test_empty_report() {
        let n = build_narrative(&[], &QualityThresholds::default());
        let text = render_text(&n, &plain());
        assert!(text.contains("- Total MAGs analyzed: 0\n"));
        assert!(text.ends_with("Most Widely Distributed MAGs:\n"));
        assert!(render_html(&n, &ReportStyle::default()).ends_with("</html>\n"));
    }
}
