//src/heatmap.rs

use std::path::Path;
use std::sync::OnceLock;

use ahash::AHashMap;
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::cluster::{average_linkage, Linkage};
use crate::errors::{Error, Result};
use crate::matrix::LabeledMatrix;

/// Row labels are only drawn for matrices with at most this many rows.
pub const MAX_ROW_LABELS: usize = 30;

/// Categorical palette used for sample group strips.
pub const CATEGORICAL_PALETTE: [RGBColor; 10] = [
    RGBColor(76, 114, 176),
    RGBColor(221, 132, 82),
    RGBColor(85, 168, 104),
    RGBColor(196, 78, 82),
    RGBColor(129, 114, 179),
    RGBColor(147, 120, 96),
    RGBColor(218, 139, 195),
    RGBColor(140, 140, 140),
    RGBColor(204, 185, 116),
    RGBColor(100, 181, 205),
];

/// Blue-white-red colour map centred on a chosen value.
#[derive(Debug, Clone, PartialEq)]
pub struct DivergingScale {
    pub center: f64,
    /// Distance from `center` to either end of the scale
    pub half_range: f64,
    pub low: RGBColor,
    pub mid: RGBColor,
    pub high: RGBColor,
}

impl DivergingScale {
    /// Scale spanning the data range symmetrically around `center`.
    pub fn new(center: f64, range: Option<(f64, f64)>) -> Self {
        let half_range = range
            .map(|(lo, hi)| (hi - center).max(center - lo))
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(1.0);
        Self {
            center,
            half_range,
            low: RGBColor(35, 105, 189),
            mid: RGBColor(245, 245, 245),
            high: RGBColor(169, 55, 59),
        }
    }

    /// Position of `value` on the scale, clamped to `0.0..=1.0`.
    pub fn fraction(&self, value: f64) -> f64 {
        let t = (value - self.center) / (2.0 * self.half_range) + 0.5;
        t.clamp(0.0, 1.0)
    }

    pub fn color(&self, value: f64) -> RGBColor {
        let t = self.fraction(value);
        if t < 0.5 {
            lerp(self.low, self.mid, t * 2.0)
        } else {
            lerp(self.mid, self.high, (t - 0.5) * 2.0)
        }
    }

    pub fn min(&self) -> f64 {
        self.center - self.half_range
    }

    pub fn max(&self) -> f64 {
        self.center + self.half_range
    }
}

fn lerp(a: RGBColor, b: RGBColor, t: f64) -> RGBColor {
    let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round() as u8;
    RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

/// `n` distinct colours, cycling the palette when there are more groups than colours.
pub fn group_palette(n: usize) -> Vec<RGBColor> {
    (0..n).map(|i| CATEGORICAL_PALETTE[i % CATEGORICAL_PALETTE.len()]).collect()
}

/// Colour per group (first-appearance order) and per sample.
#[derive(Debug, Clone, Default)]
pub struct GroupColors {
    pub legend: Vec<(String, RGBColor)>,
    pub by_sample: AHashMap<String, RGBColor>,
}

impl GroupColors {
    /// Strip colours aligned with `columns`; ungrouped samples get `None`.
    pub fn for_columns(&self, columns: &[String]) -> Vec<Option<RGBColor>> {
        columns.iter().map(|c| self.by_sample.get(c).copied()).collect()
    }
}

/// Assigns colours from (sample, group) pairs.
pub fn assign_group_colors(groups: &[(String, String)]) -> GroupColors {
    let mut names: Vec<&str> = Vec::new();
    for (_, group) in groups {
        if !names.contains(&group.as_str()) {
            names.push(group);
        }
    }

    let palette = group_palette(names.len());
    let legend: Vec<(String, RGBColor)> = names
        .iter()
        .zip(palette)
        .map(|(name, color)| (name.to_string(), color))
        .collect();

    let by_sample = groups
        .iter()
        .filter_map(|(sample, group)| {
            legend
                .iter()
                .find(|(name, _)| name == group)
                .map(|(_, color)| (sample.clone(), *color))
        })
        .collect();

    GroupColors { legend, by_sample }
}

/// Layout and decoration of a clustered heatmap.
#[derive(Debug, Clone)]
pub struct ClustermapOptions {
    pub width: u32,
    pub height: u32,
    /// Value mapped to the neutral colour
    pub center: f64,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
    /// Column strip colours aligned with the input matrix columns
    pub column_colors: Option<Vec<Option<RGBColor>>>,
    pub legend: Vec<(String, RGBColor)>,
}

impl Default for ClustermapOptions {
    fn default() -> Self {
        Self {
            width: 1600,
            height: 1800,
            center: 0.0,
            x_label: None,
            y_label: None,
            column_colors: None,
            legend: Vec::new(),
        }
    }
}

/// A heatmap with its columns in dendrogram order.
#[derive(Debug, Clone)]
pub struct Clustermap {
    pub linkage: Linkage,
    /// The matrix as plotted: input rows, clustered column order
    pub matrix: LabeledMatrix,
    pub column_colors: Option<Vec<Option<RGBColor>>>,
    pub scale: DivergingScale,
}

/// Clusters the columns of `matrix`; rows keep their order.
pub fn clustermap(matrix: &LabeledMatrix, options: &ClustermapOptions) -> Clustermap {
    let linkage = average_linkage(&matrix.column_vectors());
    let plotted = matrix.select_columns(&linkage.leaves);
    let column_colors = options
        .column_colors
        .as_ref()
        .map(|colors| linkage.leaves.iter().map(|&j| colors.get(j).copied().flatten()).collect());
    let scale = DivergingScale::new(options.center, plotted.value_range());

    Clustermap {
        linkage,
        matrix: plotted,
        column_colors,
        scale,
    }
}

/// Clusters and draws `matrix` to `path`. `.svg` paths get an SVG; any other
/// extension is written as a PNG bitmap.
pub fn render_clustermap<P: AsRef<Path>>(
    matrix: &LabeledMatrix,
    options: &ClustermapOptions,
    path: P,
) -> Result<Clustermap> {
    let path = path.as_ref();
    let map = clustermap(matrix, options);
    let size = (options.width, options.height);

    let is_svg = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("svg"))
        .unwrap_or(false);

    if is_svg {
        let root = SVGBackend::new(path, size).into_drawing_area();
        draw_clustermap(&root, &map, options)?;
        root.present().map_err(|e| Error::Plot(e.to_string()))?;
    } else {
        let root = BitMapBackend::new(path, size).into_drawing_area();
        draw_clustermap(&root, &map, options)?;
        root.present().map_err(|e| Error::Plot(e.to_string()))?;
    }

    log::info!(
        "Heatmap of {} rows x {} columns written to {}",
        map.matrix.n_rows(),
        map.matrix.n_cols(),
        path.display()
    );
    Ok(map)
}

/// Pixel boxes of the heatmap parts on a `width x height` canvas.
#[derive(Debug, Clone, Copy)]
struct Layout {
    heat_x0: i32,
    heat_x1: i32,
    dendro_y0: i32,
    dendro_y1: i32,
    strip_y0: i32,
    strip_y1: i32,
    heat_y0: i32,
    heat_y1: i32,
}

impl Layout {
    fn new(width: u32, height: u32, with_strip: bool) -> Self {
        let (dendro_y0, dendro_y1) = (40, 300);
        let (strip_y0, strip_y1) = (dendro_y1 + 10, dendro_y1 + 40);
        Self {
            heat_x0: 160,
            heat_x1: width as i32 - 280,
            dendro_y0,
            dendro_y1,
            strip_y0,
            strip_y1,
            heat_y0: if with_strip { strip_y1 + 10 } else { dendro_y1 + 10 },
            heat_y1: height as i32 - 260,
        }
    }
}

/// Label font embedded in the binary; bitmap backends rasterise it themselves.
const LABEL_FONT: &str = "sans-serif";
static LABEL_FONT_DATA: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");
static LABEL_FONT_LOADED: OnceLock<bool> = OnceLock::new();

fn register_label_font() -> Result<()> {
    let loaded = *LABEL_FONT_LOADED
        .get_or_init(|| register_font(LABEL_FONT, FontStyle::Normal, LABEL_FONT_DATA).is_ok());
    if loaded {
        Ok(())
    } else {
        Err(Error::Plot("embedded label font could not be loaded".to_string()))
    }
}

fn draw_clustermap<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    map: &Clustermap,
    options: &ClustermapOptions,
) -> Result<()> {
    let plot_err = |e: DrawingAreaErrorKind<DB::ErrorType>| Error::Plot(e.to_string());

    register_label_font()?;
    root.fill(&WHITE).map_err(plot_err)?;

    let (w, h) = (options.width as i32, options.height as i32);
    let Layout {
        heat_x0,
        heat_x1,
        dendro_y0,
        dendro_y1,
        strip_y0,
        strip_y1,
        heat_y0,
        heat_y1,
    } = Layout::new(options.width, options.height, map.column_colors.is_some());

    let matrix = &map.matrix;
    let cell_w = (heat_x1 - heat_x0) as f64 / matrix.n_cols().max(1) as f64;
    let cell_h = (heat_y1 - heat_y0) as f64 / matrix.n_rows().max(1) as f64;
    let col_x = |j: f64| heat_x0 + (j * cell_w).round() as i32;
    let row_y = |i: f64| heat_y0 + (i * cell_h).round() as i32;

    // cells
    for (i, row) in matrix.values.iter().enumerate() {
        for (j, &v) in row.iter().enumerate() {
            root.draw(&Rectangle::new(
                [(col_x(j as f64), row_y(i as f64)), (col_x(j as f64 + 1.0), row_y(i as f64 + 1.0))],
                map.scale.color(v).filled(),
            ))
            .map_err(plot_err)?;
        }
    }

    // column dendrogram
    let linkage = &map.linkage;
    let positions = linkage.positions();
    let max_height = linkage.max_height();
    let dendro_y = |height: f64| {
        if max_height > 0.0 {
            dendro_y1 - (height / max_height * (dendro_y1 - dendro_y0) as f64).round() as i32
        } else {
            dendro_y1
        }
    };
    for (k, m) in linkage.merges.iter().enumerate() {
        let x_left = col_x(positions[m.left] + 0.5);
        let x_right = col_x(positions[m.right] + 0.5);
        let y_top = dendro_y(linkage.height(linkage.n_leaves + k));
        root.draw(&PathElement::new(
            vec![
                (x_left, dendro_y(linkage.height(m.left))),
                (x_left, y_top),
                (x_right, y_top),
                (x_right, dendro_y(linkage.height(m.right))),
            ],
            BLACK.stroke_width(1),
        ))
        .map_err(plot_err)?;
    }

    // group strip
    if let Some(colors) = &map.column_colors {
        for (j, color) in colors.iter().enumerate() {
            if let Some(color) = color {
                root.draw(&Rectangle::new(
                    [(col_x(j as f64), strip_y0), (col_x(j as f64 + 1.0), strip_y1)],
                    color.filled(),
                ))
                .map_err(plot_err)?;
            }
        }
    }

    // colour bar, top of the bar is the scale maximum
    let (bar_x0, bar_x1) = (40, 70);
    let steps = 100;
    let bar_step = (dendro_y1 - dendro_y0) as f64 / steps as f64;
    for s in 0..steps {
        let value = map.scale.max() - (s as f64 + 0.5) / steps as f64 * 2.0 * map.scale.half_range;
        let y0 = dendro_y0 + (s as f64 * bar_step).round() as i32;
        let y1 = dendro_y0 + ((s + 1) as f64 * bar_step).round() as i32;
        root.draw(&Rectangle::new([(bar_x0, y0), (bar_x1, y1)], map.scale.color(value).filled()))
            .map_err(plot_err)?;
    }

    // group legend swatches
    let legend_x = heat_x1 + 30;
    for (k, (_, color)) in options.legend.iter().enumerate() {
        let y = dendro_y0 + 24 * k as i32;
        root.draw(&Rectangle::new([(legend_x, y), (legend_x + 16, y + 16)], color.filled()))
            .map_err(plot_err)?;
    }

    let font = (LABEL_FONT, 14.0).into_font();
    let left_center = || Pos::new(HPos::Left, VPos::Center);

    for (k, (name, _)) in options.legend.iter().enumerate() {
        let y = dendro_y0 + 24 * k as i32 + 8;
        root.draw(&Text::new(name.clone(), (legend_x + 24, y), font.color(&BLACK).pos(left_center())))
            .map_err(plot_err)?;
    }

    for (value, y) in [(map.scale.max(), dendro_y0), (map.scale.center, (dendro_y0 + dendro_y1) / 2), (map.scale.min(), dendro_y1)] {
        root.draw(&Text::new(format!("{:.2}", value), (bar_x1 + 6, y), font.color(&BLACK).pos(left_center())))
            .map_err(plot_err)?;
    }

    if matrix.n_rows() <= MAX_ROW_LABELS {
        for (i, label) in matrix.rows.iter().enumerate() {
            root.draw(&Text::new(
                label.clone(),
                (heat_x1 + 6, row_y(i as f64 + 0.5)),
                font.color(&BLACK).pos(left_center()),
            ))
            .map_err(plot_err)?;
        }
    }

    let column_font = (LABEL_FONT, cell_w.clamp(6.0, 14.0))
        .into_font()
        .transform(FontTransform::Rotate90);
    for (j, label) in matrix.columns.iter().enumerate() {
        root.draw(&Text::new(
            label.clone(),
            (col_x(j as f64 + 0.5), heat_y1 + 6),
            column_font.color(&BLACK).pos(left_center()),
        ))
        .map_err(plot_err)?;
    }

    let axis_font = (LABEL_FONT, 18.0).into_font();
    if let Some(x_label) = &options.x_label {
        root.draw(&Text::new(
            x_label.clone(),
            ((heat_x0 + heat_x1) / 2, h - 30),
            axis_font.color(&BLACK).pos(Pos::new(HPos::Center, VPos::Center)),
        ))
        .map_err(plot_err)?;
    }
    if let Some(y_label) = &options.y_label {
        root.draw(&Text::new(
            y_label.clone(),
            (w - 30, (heat_y0 + heat_y1) / 2),
            axis_font
                .transform(FontTransform::Rotate90)
                .color(&BLACK)
                .pos(Pos::new(HPos::Center, VPos::Center)),
        ))
        .map_err(plot_err)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_scale_is_centered() {
        let scale = DivergingScale::new(0.0, Some((-6.0, 2.0)));
        assert_eq!(scale.half_range, 6.0);
        assert_eq!(scale.fraction(0.0), 0.5);
        assert_eq!(scale.color(0.0), scale.mid);
        assert_eq!(scale.color(-6.0), scale.low);
        assert_eq!(scale.color(100.0), scale.high);
    }

    #[test]
    fn test_constant_matrix_scale() {
        let scale = DivergingScale::new(0.5, Some((0.5, 0.5)));
        assert_eq!(scale.half_range, 1.0);
        assert_eq!(scale.color(0.5), scale.mid);
    }

    #[test]
    fn test_group_colors_follow_first_appearance() {
        let groups = vec![
            ("S1".to_string(), "control".to_string()),
            ("S2".to_string(), "treated".to_string()),
            ("S3".to_string(), "control".to_string()),
        ];
        let colors = assign_group_colors(&groups);
        assert_eq!(colors.legend.len(), 2);
        assert_eq!(colors.legend[0], ("control".to_string(), CATEGORICAL_PALETTE[0]));
        assert_eq!(colors.by_sample["S3"], CATEGORICAL_PALETTE[0]);
        assert_eq!(colors.by_sample["S2"], CATEGORICAL_PALETTE[1]);

        let strip = colors.for_columns(&labels(&["S2", "S9"]));
        assert_eq!(strip, vec![Some(CATEGORICAL_PALETTE[1]), None]);
    }

    #[test]
    fn test_palette_cycles() {
        let palette = group_palette(12);
        assert_eq!(palette.len(), 12);
        assert_eq!(palette[10], palette[0]);
    }

    #[test]
    fn test_clustermap_keeps_rows_and_reorders_columns() {
        let matrix = LabeledMatrix {
            index_name: "Lineage".to_string(),
            rows: labels(&["L1", "L2"]),
            columns: labels(&["S1", "S2", "S3"]),
            values: vec![vec![0.0, 0.9, 0.1], vec![0.0, 0.8, 0.1]],
        };
        let options = ClustermapOptions {
            center: matrix.global_mean(),
            column_colors: Some(vec![None, Some(CATEGORICAL_PALETTE[2]), None]),
            ..Default::default()
        };
        let map = clustermap(&matrix, &options);

        assert_eq!(map.matrix.rows, matrix.rows);
        let s2 = map.matrix.columns.iter().position(|c| c == "S2").unwrap();
        assert_eq!(map.column_colors.as_ref().unwrap()[s2], Some(CATEGORICAL_PALETTE[2]));
        // S1 and S3 are closest and end up adjacent
        let s1 = map.matrix.columns.iter().position(|c| c == "S1").unwrap() as i32;
        let s3 = map.matrix.columns.iter().position(|c| c == "S3").unwrap() as i32;
        assert_eq!((s1 - s3).abs(), 1);
        for (i, row) in map.matrix.values.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                let original = matrix.columns.iter().position(|c| *c == map.matrix.columns[j]).unwrap();
                assert_eq!(*v, matrix.values[i][original]);
            }
        }
    }

    fn draw_to_buffer(matrix: &LabeledMatrix, options: &ClustermapOptions) -> Vec<u8> {
        let mut buf = vec![0u8; (options.width * options.height * 3) as usize];
        {
            let root = BitMapBackend::with_buffer(&mut buf, (options.width, options.height))
                .into_drawing_area();
            draw_clustermap(&root, &clustermap(matrix, options), options).unwrap();
            root.present().unwrap();
        }
        buf
    }

    fn dark_pixels(buf: &[u8], width: u32, (x0, x1): (i32, i32), (y0, y1): (i32, i32)) -> usize {
        let mut n = 0;
        for y in y0..y1 {
            for x in x0..x1 {
                let k = ((y as u32 * width + x as u32) * 3) as usize;
                if buf[k] < 128 && buf[k + 1] < 128 && buf[k + 2] < 128 {
                    n += 1;
                }
            }
        }
        n
    }

    #[test]
    fn test_bitmap_draws_labels() {
        let options = ClustermapOptions {
            width: 900,
            height: 900,
            x_label: Some("Samples".to_string()),
            y_label: Some("MAGs".to_string()),
            ..Default::default()
        };
        let few_rows = LabeledMatrix {
            index_name: "Bins".to_string(),
            rows: labels(&["bin.1", "bin.2"]),
            columns: labels(&["A", "B"]),
            values: vec![vec![-6.0, 0.5], vec![0.2, -6.0]],
        };
        let many_rows = LabeledMatrix {
            index_name: "Bins".to_string(),
            rows: (0..MAX_ROW_LABELS + 1).map(|i| format!("bin.{}", i)).collect(),
            columns: labels(&["A", "B"]),
            values: vec![vec![-6.0, 0.5]; MAX_ROW_LABELS + 1],
        };

        let layout = Layout::new(options.width, options.height, false);
        // between the cells and the rotated y-axis title
        let row_band = (layout.heat_x1 + 6, options.width as i32 - 60);
        let rows = (layout.heat_y0, layout.heat_y1);

        let labelled = draw_to_buffer(&few_rows, &options);
        assert!(dark_pixels(&labelled, options.width, row_band, rows) > 0);
        let title_rows = (options.height as i32 - 45, options.height as i32 - 15);
        assert!(dark_pixels(&labelled, options.width, (layout.heat_x0, layout.heat_x1), title_rows) > 0);

        let unlabelled = draw_to_buffer(&many_rows, &options);
        assert_eq!(dark_pixels(&unlabelled, options.width, row_band, rows), 0);
    }

    #[test]
    fn test_render_svg_and_png() {
        let dir = tempfile::tempdir().unwrap();
        let matrix = LabeledMatrix {
            index_name: "Bins".to_string(),
            rows: labels(&["bin.1", "bin.2"]),
            columns: labels(&["A", "B"]),
            values: vec![vec![-6.0, 0.5], vec![0.2, -6.0]],
        };
        let options = ClustermapOptions {
            width: 900,
            height: 900,
            x_label: Some("Samples".to_string()),
            y_label: Some("MAGs".to_string()),
            ..Default::default()
        };

        let svg = dir.path().join("depths.svg");
        render_clustermap(&matrix, &options, &svg).unwrap();
        let text = std::fs::read_to_string(&svg).unwrap();
        assert!(text.contains("<svg"));
        assert!(text.contains("bin.1"));
        assert!(text.contains("MAGs"));

        let png = dir.path().join("depths.png");
        render_clustermap(&matrix, &options, &png).unwrap();
        let bytes = std::fs::read(&png).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }
}
