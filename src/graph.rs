use crate::dashboard::ChartData;
use crate::error::{DashboardError, Result};
use crate::metrics::GroupRow;
use crate::profile::ChartKind;
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::f64::consts::{FRAC_PI_2, PI};
use std::io::Cursor;
use std::path::Path;

/// Available graph types supported by the dashboard
///
/// Every chart plots one aggregated value per category, so only the
/// categorical chart shapes are offered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphType {
    /// Bar graph - one coloured bar per category, labelled with its value
    Bar,

    /// Pie chart - slices proportional to each category's share of the total
    Pie,
}

impl From<ChartKind> for GraphType {
    fn from(kind: ChartKind) -> Self {
        match kind {
            ChartKind::Bar => GraphType::Bar,
            ChartKind::Pie => GraphType::Pie,
        }
    }
}

/// Configuration options for graph generation
///
/// This structure contains all the customizable properties for generating
/// a chart image.
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Title displayed at the top of the graph
    pub title: String,

    /// Label for the X-axis (the grouping column)
    pub x_label: String,

    /// Label for the Y-axis (the aggregated column)
    pub y_label: String,

    /// Width of the graph in pixels
    pub width: u32,

    /// Height of the graph in pixels
    pub height: u32,

    /// Type of graph to generate
    pub graph_type: GraphType,
}

impl Default for GraphOptions {
    /// Creates a default configuration for graph generation
    ///
    /// # Returns
    /// * `GraphOptions` - Default configuration with:
    ///   - Bar graph type
    ///   - 800x600 pixel dimensions
    ///   - Generic labels
    fn default() -> Self {
        Self {
            title: "Graph".to_string(),
            x_label: "Category".to_string(),
            y_label: "Value".to_string(),
            width: 800,
            height: 600,
            graph_type: GraphType::Bar,
        }
    }
}

impl GraphOptions {
    /// Options matching a dashboard chart, at the default size
    pub fn for_chart(chart: &ChartData) -> Self {
        Self {
            title: chart.title.clone(),
            x_label: chart.x_label.clone(),
            y_label: chart.y_label.clone(),
            graph_type: chart.kind.into(),
            ..Self::default()
        }
    }
}

/// One slice of a pie chart, with angles in radians
///
/// Angles start at twelve o'clock and grow clockwise on screen.
#[derive(Clone, Debug, PartialEq)]
pub struct PieSlice {
    pub key: String,
    pub fraction: f64,
    pub start: f64,
    pub end: f64,
}

/// Creates a PNG chart from an aggregated series
///
/// This is the main entry point for rendering a dashboard chart.
///
/// # Arguments
/// * `series` - One row per category, already aggregated
/// * `options` - Graph styling and type options
///
/// # Returns
/// * A Result containing the PNG image data as bytes or an error
///
/// # Errors
/// * `DashboardError::EmptySeries` when there is nothing to draw
/// * `DashboardError::Chart` when drawing fails, e.g. no usable font is
///   installed
///
/// # Examples
/// ```no_run
/// use fillrate::graph::{GraphOptions, create_graph};
/// use fillrate::metrics::GroupRow;
///
/// let series = vec![GroupRow { key: "Snacks".into(), value: 91.5, count: 12 }];
/// match create_graph(&series, &GraphOptions::default()) {
///     Ok(png_data) => println!("Graph created successfully: {} bytes", png_data.len()),
///     Err(e) => eprintln!("Failed to create graph: {}", e),
/// }
/// ```
pub fn create_graph(series: &[GroupRow], options: &GraphOptions) -> Result<Vec<u8>> {
    let image = create_bitmap(series, options)?;
    let mut png = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
        .map_err(|e| DashboardError::Chart(e.to_string()))?;
    Ok(png)
}

/// Renders a chart into an in-memory RGB image
///
/// Used directly when the image is embedded in a PDF, so that no PNG round
/// trip is needed.
pub fn create_bitmap(series: &[GroupRow], options: &GraphOptions) -> Result<RgbImage> {
    if series.is_empty() {
        return Err(DashboardError::EmptySeries(options.title.clone()));
    }

    let mut buffer = vec![0u8; options.width as usize * options.height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (options.width, options.height))
            .into_drawing_area();

        let drawn = match options.graph_type {
            GraphType::Bar => draw_bar_graph(&root, series, options),
            GraphType::Pie => draw_pie_graph(&root, series, options),
        };
        drawn.map_err(|e| DashboardError::Chart(e.to_string()))?;
        root.present()
            .map_err(|e| DashboardError::Chart(e.to_string()))?;
    }

    RgbImage::from_raw(options.width, options.height, buffer)
        .ok_or_else(|| DashboardError::Chart("bitmap size mismatch".to_string()))
}

/// Saves a chart as a PNG file
///
/// # Arguments
/// * `series` - Aggregated data to plot
/// * `options` - Graph styling options
/// * `path` - File path where the graph should be saved
pub fn save_graph(
    series: &[GroupRow],
    options: &GraphOptions,
    path: impl AsRef<Path>,
) -> Result<()> {
    let png = create_graph(series, options)?;
    std::fs::write(path, png)?;
    Ok(())
}

/// Y-axis range for a bar graph
///
/// Always includes zero so bars grow from the axis, with 10% headroom for
/// the value labels.
pub fn value_range(series: &[GroupRow]) -> (f64, f64) {
    let min = series.iter().map(|g| g.value).fold(0.0, f64::min);
    let max = series.iter().map(|g| g.value).fold(0.0, f64::max);
    if max == min {
        return (0.0, 1.0);
    }
    let pad = (max - min) * 0.1;
    (if min < 0.0 { min - pad } else { 0.0 }, max + pad)
}

/// Split a circle among the non-negative values of a series
///
/// Negative values are treated as zero. Returns no slices when the total is
/// zero.
pub fn pie_slices(series: &[GroupRow]) -> Vec<PieSlice> {
    let total: f64 = series.iter().map(|g| g.value.max(0.0)).sum();
    if total <= 0.0 {
        return Vec::new();
    }

    let mut angle = -FRAC_PI_2;
    series
        .iter()
        .map(|g| {
            let fraction = g.value.max(0.0) / total;
            let start = angle;
            angle += fraction * 2.0 * PI;
            PieSlice {
                key: g.key.clone(),
                fraction,
                start,
                end: angle,
            }
        })
        .collect()
}

/// Draws a bar graph: one coloured bar per category
///
/// # Implementation Notes
/// * Categories are laid out on a segmented axis so each label sits under
///   its bar
/// * Each bar carries its value with two decimals
fn draw_bar_graph(
    root: &DrawingArea<BitMapBackend<'_>, Shift>,
    series: &[GroupRow],
    options: &GraphOptions,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    root.fill(&WHITE)?;

    let (y_min, y_max) = value_range(series);
    let n = series.len() as i32;

    let mut chart = ChartBuilder::on(root)
        .caption(&options.title, ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d((0..n).into_segmented(), y_min..y_max)?;

    let label_for = |v: &SegmentValue<i32>| match v {
        SegmentValue::CenterOf(i) => series
            .get(*i as usize)
            .map(|g| g.key.clone())
            .unwrap_or_default(),
        _ => String::new(),
    };

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(series.len())
        .x_label_formatter(&label_for)
        .x_desc(&options.x_label)
        .y_desc(&options.y_label)
        .draw()?;

    chart.draw_series(series.iter().enumerate().map(|(i, g)| {
        let i = i as i32;
        let mut bar = Rectangle::new(
            [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), g.value)],
            Palette99::pick(i as usize).filled(),
        );
        bar.set_margin(0, 0, 8, 8);
        bar
    }))?;

    chart.draw_series(series.iter().enumerate().map(|(i, g)| {
        Text::new(
            format!("{:.2}", g.value),
            (SegmentValue::CenterOf(i as i32), g.value),
            ("sans-serif", 14).into_font(),
        )
    }))?;

    root.present()?;
    Ok(())
}

/// Draws a pie chart with a legend on the right
///
/// # Implementation Notes
/// * Slices are polygons approximating the arc every two degrees
/// * The legend lists each category with its share of the total
fn draw_pie_graph(
    root: &DrawingArea<BitMapBackend<'_>, Shift>,
    series: &[GroupRow],
    options: &GraphOptions,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    root.fill(&WHITE)?;

    let slices = pie_slices(series);
    if slices.is_empty() {
        return Err(format!("{}: all values are zero", options.title).into());
    }

    let area = root.titled(&options.title, ("sans-serif", 30).into_font())?;
    let (w, h) = area.dim_in_pixel();
    let (w, h) = (w as i32, h as i32);
    let centre = (w / 3, h / 2);
    let radius = (w.min(h) as f64) * 0.4;

    for (i, slice) in slices.iter().enumerate() {
        if slice.fraction == 0.0 {
            continue;
        }
        let steps = ((slice.end - slice.start) / (PI / 90.0)).ceil().max(1.0) as usize;
        let mut points = Vec::with_capacity(steps + 2);
        points.push(centre);
        for s in 0..=steps {
            let theta = slice.start + (slice.end - slice.start) * s as f64 / steps as f64;
            points.push((
                centre.0 + (radius * theta.cos()).round() as i32,
                centre.1 + (radius * theta.sin()).round() as i32,
            ));
        }
        area.draw(&Polygon::new(points, Palette99::pick(i).filled()))?;
    }

    let legend_x = w * 2 / 3;
    for (i, slice) in slices.iter().enumerate() {
        let y = 20 + i as i32 * 24;
        area.draw(&Rectangle::new(
            [(legend_x, y), (legend_x + 14, y + 14)],
            Palette99::pick(i).filled(),
        ))?;
        area.draw(&Text::new(
            format!("{} ({:.1}%)", slice.key, slice.fraction * 100.0),
            (legend_x + 20, y),
            ("sans-serif", 16).into_font(),
        ))?;
    }

    root.present()?;
    Ok(())
}
