// src/lib.rs
pub mod errors;
pub mod tsv;
pub mod types;
pub mod taxonomy;
pub mod midas;
pub mod matrix;
pub mod cluster;
pub mod heatmap;
pub mod bins;
pub mod quality;
pub mod narrative;
pub mod progress;

use std::path::{Path, PathBuf};

use ahash::AHashSet;

use crate::bins::{analyze_bins, read_checkm, read_depths, read_gtdb, AnalysisThresholds, MagAnalysis};
use crate::errors::{Error, Result};
use crate::heatmap::{assign_group_colors, render_clustermap, Clustermap, ClustermapOptions};
use crate::matrix::{pivot_mean, LabeledMatrix, LOG_EPSILON};
use crate::midas::{
    abundance_rows_from_data, abundance_rows_from_table, build_document, common_lineages,
    distinct_samples, lineage_stats, merge_rows, read_document_data, read_midas_reports,
    write_document, MultiqcTable,
};
use crate::narrative::{build_narrative, render_html, render_text, ReportStyle};
use crate::quality::QualityThresholds;
use crate::tsv::{read_rows, read_tsv};

/// Merges MIDAS2 species reports into one keyed table document and writes it as YAML.
pub fn combine_midas2_reports<P: AsRef<Path>, Q: AsRef<Path>>(
    inputs: &[P],
    yaml_out: Q,
) -> Result<MultiqcTable> {
    let table = read_midas_reports(inputs)?;
    let data = merge_rows(&table)?;
    log::info!(
        "{} rows from {} reports merged into {} records",
        table.len(),
        inputs.len(),
        data.len()
    );

    let document = build_document(data);
    write_document(&document, yaml_out.as_ref())?;
    log::info!("Table written to {}", yaml_out.as_ref().display());
    Ok(document)
}

/// The four tables joined by the MAG report.
#[derive(Debug, Clone)]
pub struct ReportInputs {
    pub depth_data: PathBuf,
    pub checkm_data: PathBuf,
    pub gtdb_data: PathBuf,
    pub midas_data: PathBuf,
}

/// Both renderings of one analysis.
pub struct MagReport {
    pub analysis: MagAnalysis,
    pub text: String,
    pub html: String,
}

impl MagReport {
    pub fn write<P: AsRef<Path>, Q: AsRef<Path>>(&self, text_path: P, html_path: Q) -> Result<()> {
        let (text_path, html_path) = (text_path.as_ref(), html_path.as_ref());
        std::fs::write(text_path, &self.text).map_err(|e| Error::file_io(text_path, e))?;
        std::fs::write(html_path, &self.html).map_err(|e| Error::file_io(html_path, e))?;
        log::info!("Reports written to {} and {}", text_path.display(), html_path.display());
        Ok(())
    }
}

/// Joins depths, CheckM, GTDB-Tk and MIDAS2 tables and renders the narrative.
pub fn generate_mag_report(
    inputs: &ReportInputs,
    analysis_thresholds: &AnalysisThresholds,
    quality_thresholds: &QualityThresholds,
    style: &ReportStyle,
) -> Result<MagReport> {
    let depths = read_depths(&inputs.depth_data)?;
    let checkm = read_checkm(&inputs.checkm_data)?;
    let gtdb = read_gtdb(&inputs.gtdb_data)?;
    let midas = abundance_rows_from_table(&read_tsv(&inputs.midas_data)?)?;
    log::info!(
        "Loaded {} bins x {} samples, {} CheckM, {} GTDB-Tk and {} MIDAS2 records",
        depths.n_rows(),
        depths.n_cols(),
        checkm.len(),
        gtdb.len(),
        midas.len()
    );

    let analysis = analyze_bins(&depths, &checkm, &gtdb, &midas, analysis_thresholds);
    let (text, html) = {
        let narrative = build_narrative(&analysis.bins, quality_thresholds);
        log::info!(
            "{} bins reported: {} good, {} fair",
            narrative.summary.total,
            narrative.summary.good,
            narrative.summary.fair
        );
        (render_text(&narrative, style), render_html(&narrative, style))
    };

    Ok(MagReport { analysis, text, html })
}

/// Builds the lineage x sample coverage matrix from a merged MIDAS2 document.
/// Lineages must be seen in more than `threshold * cohort.len()` samples;
/// columns follow `cohort` exactly.
pub fn midas2_lineage_matrix<P: AsRef<Path>>(
    input: P,
    cohort: &[String],
    threshold: f64,
) -> Result<LabeledMatrix> {
    if cohort.is_empty() {
        return Err(Error::EmptyInput("sample list is empty".to_string()));
    }

    let input = input.as_ref();
    let data = read_document_data(input)?;
    let rows = abundance_rows_from_data(&data, &input.display().to_string())?;

    let observed = distinct_samples(&rows);
    let seen: AHashSet<&str> = observed.iter().map(String::as_str).collect();
    let undetected: Vec<&str> = cohort
        .iter()
        .map(String::as_str)
        .filter(|s| !seen.contains(s))
        .collect();
    if !undetected.is_empty() {
        log::info!("Samples with no detectable stats: {}", undetected.join(", "));
    }

    let stats = lineage_stats(&rows);
    let kept = common_lineages(&stats, threshold, cohort.len());
    log::info!(
        "{} of {} lineages are found in more than {} of {} samples",
        kept.len(),
        stats.len(),
        threshold,
        cohort.len()
    );

    let triples = rows.iter().filter_map(|r| {
        r.fraction_covered
            .map(|v| (r.lineage.as_str(), r.sample_name.as_str(), v))
    });
    let matrix = pivot_mean("Lineage", &kept, &observed, triples);
    Ok(matrix.reindex_columns(cohort))
}

/// Writes the MIDAS2 lineage matrix and its clustered heatmap.
pub fn midas2_heatmap<P: AsRef<Path>, M: AsRef<Path>, O: AsRef<Path>>(
    input: P,
    cohort: &[String],
    threshold: f64,
    matrix_out: M,
    plot_out: O,
) -> Result<LabeledMatrix> {
    let matrix = midas2_lineage_matrix(input, cohort, threshold)?;
    matrix.write_rounded_tsv(matrix_out.as_ref())?;
    log::info!("Matrix written to {}", matrix_out.as_ref().display());

    if matrix.n_rows() == 0 {
        log::warn!("No lineage passed the prevalence filter; skipping the heatmap");
        return Ok(matrix);
    }

    let options = ClustermapOptions {
        center: matrix.global_mean(),
        ..Default::default()
    };
    render_clustermap(&matrix, &options, plot_out)?;
    Ok(matrix)
}

/// `<dir>/<stem>_data.txt` next to the image `out`.
pub fn depth_data_path<P: AsRef<Path>>(out: P) -> PathBuf {
    let out = out.as_ref();
    let stem = out
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    out.with_file_name(format!("{}_data.txt", stem))
}

/// Reads the header-less sample -> group table.
pub fn read_groups<P: AsRef<Path>>(path: P) -> Result<Vec<(String, String)>> {
    let path = path.as_ref();
    let mut groups = Vec::new();
    for row in read_rows(path)? {
        match row.as_slice() {
            [sample, group, ..] => groups.push((sample.clone(), group.clone())),
            _ => log::warn!("{}: skipping row without a group: {}", path.display(), row.join("\t")),
        }
    }
    Ok(groups)
}

/// Ranks bins by presence, log-transforms their depths and draws the heatmap
/// with a group strip over the samples. Returns the plotted map.
pub fn plot_mag_depths<D: AsRef<Path>, G: AsRef<Path>, O: AsRef<Path>>(
    bin_depths: D,
    groups: G,
    out: O,
) -> Result<Clustermap> {
    let mut depths = LabeledMatrix::from_tsv(bin_depths)?;
    depths.index_name = "Bins".to_string();
    let depths = depths.sort_rows_by_presence().log10_offset(LOG_EPSILON);

    let groups = read_groups(groups)?;
    let colors = assign_group_colors(&groups);
    log::info!(
        "{} bins x {} samples in {} groups",
        depths.n_rows(),
        depths.n_cols(),
        colors.legend.len()
    );

    let data_path = depth_data_path(out.as_ref());
    depths.write_rounded_tsv(&data_path)?;
    log::info!("Matrix written to {}", data_path.display());

    let options = ClustermapOptions {
        center: 0.0,
        x_label: Some("Samples".to_string()),
        y_label: Some("MAGs".to_string()),
        column_colors: Some(colors.for_columns(&depths.columns)),
        legend: colors.legend,
        ..Default::default()
    };
    render_clustermap(&depths, &options, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MIDAS_HEADER: &str = "sample_name\tspecies_id\tgenome_length\tcovered_bases\ttotal_depth\taligned_reads\tmapped_reads\tfraction_covered\tmean_coverage\tLineage\tContinent\n";

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn merged_document(dir: &Path) -> PathBuf {
        let report = dir.join("report.tsv");
        fs::write(
            &report,
            format!(
                "{}{}{}{}",
                MIDAS_HEADER,
                "S1\t100001\t5000\t2500\t10000\t120\t110\t0.5\t4.0\tg__Bacteroides;s__Bacteroides fragilis\tEurope\n",
                "S3\t100001\t5000\t1000\t3000\t40\t35\t0.25\t3.0\tg__Bacteroides;s__Bacteroides fragilis\tEurope\n",
                "S3\t100002\t4000\t400\t800\t20\t18\t0.1\t2.0\tg__Blautia;s__Blautia obeum\tAsia\n",
            ),
        )
        .unwrap();

        let yaml = dir.join("midas2_mqc.yaml");
        combine_midas2_reports(&[report], &yaml).unwrap();
        yaml
    }

    #[test]
    fn test_combine_writes_document() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = merged_document(dir.path());
        let data = read_document_data(&yaml).unwrap();
        assert_eq!(data.len(), 3);
        assert!(data.contains_key("S3_100002"));
    }

    #[test]
    fn test_lineage_matrix_follows_declared_cohort() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = merged_document(dir.path());

        let cohort = labels(&["S1", "S2", "S3"]);
        let m = midas2_lineage_matrix(&yaml, &cohort, 0.25).unwrap();
        assert_eq!(m.columns, cohort);
        assert_eq!(m.rows, labels(&["g__Bacteroides;s__Bacteroides fragilis", "g__Blautia;s__Blautia obeum"]));
        assert_eq!(m.values[0], vec![0.5, 0.0, 0.25]);
        assert_eq!(m.values[1], vec![0.0, 0.0, 0.1]);

        // 3 * 0.5 = 1.5 samples; only Bacteroides is in two
        let strict = midas2_lineage_matrix(&yaml, &cohort, 0.5).unwrap();
        assert_eq!(strict.n_rows(), 1);
    }

    #[test]
    fn test_midas2_heatmap_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = merged_document(dir.path());
        let matrix_out = dir.path().join("midas2_heatmap_mqc.txt");
        let plot_out = dir.path().join("midas2_heatmap.svg");

        let cohort = labels(&["S1", "S2", "S3"]);
        midas2_heatmap(&yaml, &cohort, 0.25, &matrix_out, &plot_out).unwrap();

        let dump = fs::read_to_string(&matrix_out).unwrap();
        assert!(dump.starts_with("Lineage\tS1\tS2\tS3\n"));
        assert!(fs::metadata(&plot_out).unwrap().len() > 0);
    }

    #[test]
    fn test_empty_cohort_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = merged_document(dir.path());
        assert!(matches!(midas2_lineage_matrix(&yaml, &[], 0.25), Err(Error::EmptyInput(_))));
    }

    #[test]
    fn test_depth_data_path() {
        assert_eq!(depth_data_path("out/mag_depths.png"), PathBuf::from("out/mag_depths_data.txt"));
        assert_eq!(depth_data_path("plot.svg"), PathBuf::from("plot_data.txt"));
    }

    #[test]
    fn test_plot_mag_depths() {
        let dir = tempfile::tempdir().unwrap();
        let depths = dir.path().join("depths.tsv");
        fs::write(
            &depths,
            "bin\tA\tB\tC\nb1\t0\t0\t1.5\nb2\t5\t0\t3\nb3\t2\t1\t4\n",
        )
        .unwrap();
        let groups = dir.path().join("groups.tsv");
        fs::write(&groups, "A\tcontrol\nB\tcase\n").unwrap();
        let out = dir.path().join("mag_depths.svg");

        let map = plot_mag_depths(&depths, &groups, &out).unwrap();
        assert_eq!(map.matrix.rows, labels(&["b3", "b2", "b1"]));
        let colors = map.column_colors.as_ref().unwrap();
        assert_eq!(colors.iter().filter(|c| c.is_none()).count(), 1);

        let dump = LabeledMatrix::from_tsv(dir.path().join("mag_depths_data.txt")).unwrap();
        assert_eq!(dump.index_name, "Bins");
        assert_eq!(dump.rows, map.matrix.rows);
        for (i, row) in dump.values.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                let column = &dump.columns[j];
                let plotted = map.matrix.columns.iter().position(|c| c == column).unwrap();
                assert!((v - map.matrix.values[i][plotted]).abs() <= 1e-6);
            }
        }
    }

    #[test]
    fn test_generate_report_with_no_valid_bins() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, text: &str| {
            let path = dir.path().join(name);
            fs::write(&path, text).unwrap();
            path
        };
        let inputs = ReportInputs {
            depth_data: write("depths.tsv", "bin\tS1\tS2\nbin.1.fa\t1\t0\n"),
            checkm_data: write(
                "checkm.tsv",
                "Bin Id\tCompleteness\tContamination\tStrain heterogeneity\tGenome size (bp)\tGC\nbin.1\t90\t1\t0\t2000000\t40\n",
            ),
            gtdb_data: write("gtdb.tsv", "user_genome\tfastani_taxonomy\tfastani_ani\tfastani_af\n"),
            midas_data: write(
                "midas.tsv",
                "sample_name\tspecies_id\tfraction_covered\tLineage\nS1\t1\t0.5\tg__A;s__A a\n",
            ),
        };

        let report = generate_mag_report(
            &inputs,
            &AnalysisThresholds::default(),
            &QualityThresholds::default(),
            &ReportStyle::default(),
        )
        .unwrap();
        assert!(report.analysis.bins.is_empty());
        assert!(report.html.contains("Total MAGs analyzed: 0"));

        let (txt, html) = (dir.path().join("report.txt"), dir.path().join("report.html"));
        report.write(&txt, &html).unwrap();
        assert!(fs::read_to_string(&html).unwrap().ends_with("</html>\n"));
    }
}
