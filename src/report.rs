use crate::dashboard::{ChartData, DashboardView};
use crate::error::{DashboardError, Result};
use crate::graph::{self, GraphOptions};
use chrono::Local;
use image::{DynamicImage, RgbImage};
use log::warn;
use printpdf::{BuiltinFont, Image, ImageTransform, Mm, PdfDocument};

/// Download name for the PDF summary
pub const PDF_FILENAME: &str = "dashboard_summary.pdf";

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 10.0;
const LINE_HEIGHT: f32 = 10.0;
const CHART_TOP: f32 = 30.0;
const CHART_WIDTH: f32 = 180.0;

/// A rendered chart ready to be placed on a page
pub struct ChartImage {
    pub title: String,
    pub image: RgbImage,
}

/// Render every chart of a view, keeping the ones that succeed
///
/// Failures are logged and returned as messages so the report can mention
/// them instead of failing as a whole.
pub fn render_charts(charts: &[ChartData]) -> (Vec<ChartImage>, Vec<String>) {
    let mut images = Vec::new();
    let mut failures = Vec::new();
    for chart in charts {
        match graph::create_bitmap(&chart.series, &GraphOptions::for_chart(chart)) {
            Ok(image) => images.push(ChartImage {
                title: chart.title.clone(),
                image,
            }),
            Err(e) => {
                warn!("Chart {} left out of the report: {}", chart.name, e);
                failures.push(format!("{}: {}", chart.title, e));
            }
        }
    }
    (images, failures)
}

/// Build the PDF summary of a dashboard view
///
/// Page one lists the active filters, every KPI and fill rate, and any chart
/// that could not be rendered, continuing on extra pages when the list is
/// long. Each chart image follows on its own page, 180mm wide, 30mm below
/// the top edge.
///
/// # Arguments
/// * `view` - The dashboard as currently filtered
/// * `charts` - Chart images, usually from `render_charts`
/// * `chart_failures` - Messages for charts that could not be drawn
///
/// # Returns
/// * `Result<Vec<u8>>` - The PDF file content
pub fn generate_pdf(
    view: &DashboardView,
    charts: &[ChartImage],
    chart_failures: &[String],
) -> Result<Vec<u8>> {
    let (doc, page, layer) =
        PdfDocument::new(view.title.as_str(), Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Summary");
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_err)?;
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(pdf_err)?;

    let mut summary = doc.get_page(page).get_layer(layer);
    let mut y = PAGE_HEIGHT - 20.0;
    summary.use_text("Fill Rate Summary", 16.0, Mm(75.0), Mm(y), &bold);
    y -= LINE_HEIGHT;
    summary.use_text(
        pdf_text(&format!(
            "{} | {} of {} rows | generated {}",
            view.title,
            view.filtered_row_count,
            view.row_count,
            Local::now().format("%Y-%m-%d %H:%M")
        )),
        10.0,
        Mm(MARGIN),
        Mm(y),
        &regular,
    );

    let pages = paginate(summary_lines(view, chart_failures));
    for (i, lines) in pages.iter().enumerate() {
        if i == 0 {
            y -= LINE_HEIGHT;
        } else {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Summary");
            summary = doc.get_page(page).get_layer(layer);
            y = PAGE_HEIGHT - 20.0;
        }
        for line in lines {
            summary.use_text(pdf_text(line), 12.0, Mm(MARGIN), Mm(y), &regular);
            y -= LINE_HEIGHT;
        }
    }

    for chart in charts {
        let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), chart.title.as_str());
        let current = doc.get_page(page).get_layer(layer);
        current.use_text(pdf_text(&chart.title), 14.0, Mm(MARGIN), Mm(PAGE_HEIGHT - 20.0), &bold);

        let (width_px, height_px) = chart.image.dimensions();
        // dots per inch that make the image exactly CHART_WIDTH wide
        let dpi = width_px as f32 * 25.4 / CHART_WIDTH;
        let height_mm = height_px as f32 * 25.4 / dpi;

        let image = Image::from_dynamic_image(&DynamicImage::ImageRgb8(chart.image.clone()));
        image.add_to_layer(
            current,
            ImageTransform {
                translate_x: Some(Mm(MARGIN)),
                translate_y: Some(Mm(PAGE_HEIGHT - CHART_TOP - height_mm)),
                dpi: Some(dpi),
                ..Default::default()
            },
        );
    }

    doc.save_to_bytes().map_err(pdf_err)
}

/// Active filters, then every metric, then chart failures
fn summary_lines(view: &DashboardView, chart_failures: &[String]) -> Vec<String> {
    let filter_lines = view
        .filters
        .iter()
        .filter(|f| !f.selection.is_all())
        .map(|f| format!("{}: {}", f.label, f.selection.describe()));
    let metric_lines = view
        .metrics()
        .map(|m| format!("{}: {}", m.label, m.report_value()));
    let failure_lines = chart_failures
        .iter()
        .map(|f| format!("Chart unavailable - {}", f));
    filter_lines.chain(metric_lines).chain(failure_lines).collect()
}

/// Lines that fit between `top` and the bottom margin
fn lines_per_page(top: f32) -> usize {
    ((top - MARGIN) / LINE_HEIGHT) as usize + 1
}

/// Split summary lines into pages
///
/// The first page holds fewer lines because of the heading. Overflow goes
/// on continuation pages; nothing is dropped.
fn paginate(lines: Vec<String>) -> Vec<Vec<String>> {
    let first = lines_per_page(PAGE_HEIGHT - 20.0 - 2.0 * LINE_HEIGHT);
    let rest = lines_per_page(PAGE_HEIGHT - 20.0);

    let mut pages = Vec::new();
    let mut lines = lines.into_iter();
    pages.push(lines.by_ref().take(first).collect::<Vec<_>>());
    loop {
        let page: Vec<String> = lines.by_ref().take(rest).collect();
        if page.is_empty() {
            break;
        }
        pages.push(page);
    }
    pages
}

/// Render the charts of a view and build its PDF in one go
pub fn dashboard_pdf(view: &DashboardView) -> Result<Vec<u8>> {
    let (images, failures) = render_charts(&view.charts);
    generate_pdf(view, &images, &failures)
}

fn pdf_err<E: std::fmt::Debug>(e: E) -> DashboardError {
    DashboardError::Pdf(format!("{:?}", e))
}

/// Builtin PDF fonts only cover Latin-1; replace anything else
fn pdf_text(text: &str) -> String {
    text.chars()
        .map(|c| if (c as u32) < 0x100 { c } else { '?' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{Metric, MetricKind};

    fn view() -> DashboardView {
        DashboardView {
            title: "Fill Rate Dashboard".into(),
            row_count: 10,
            filtered_row_count: 4,
            kpis: vec![Metric {
                label: "Total SKU PO Qty".into(),
                value: 1200.0,
                kind: MetricKind::Total,
            }],
            fill_rates: vec![Metric {
                label: "QFR (%)".into(),
                value: 91.25,
                kind: MetricKind::Rate,
            }],
            filters: Vec::new(),
            charts: Vec::new(),
        }
    }

    #[test]
    fn pdf_without_charts() {
        let bytes = generate_pdf(&view(), &[], &["QFR by Category: no font".into()]).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn pdf_with_a_chart_image() {
        let chart = ChartImage {
            title: "QFR by Category".into(),
            image: RgbImage::from_pixel(80, 60, image::Rgb([200, 30, 30])),
        };
        let bytes = generate_pdf(&view(), &[chart], &[]).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_summaries_continue_on_new_pages() {
        let lines: Vec<String> = (0..60).map(|i| format!("line {}", i)).collect();
        let pages = paginate(lines);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].len(), 25);
        assert_eq!(pages[1].len(), 27);
        assert_eq!(pages.iter().map(Vec::len).sum::<usize>(), 60);
        assert_eq!(pages[2].last().map(String::as_str), Some("line 59"));
    }

    #[test]
    fn every_metric_and_failure_is_listed() {
        let mut v = view();
        v.kpis = (0..30)
            .map(|i| Metric {
                label: format!("KPI {}", i),
                value: i as f64,
                kind: MetricKind::Total,
            })
            .collect();
        let failures: Vec<String> = (0..5).map(|i| format!("chart {}: no font", i)).collect();

        let lines = summary_lines(&v, &failures);
        assert_eq!(lines.len(), 36);
        assert_eq!(lines[30], "QFR (%): 91.25");
        assert_eq!(lines[35], "Chart unavailable - chart 4: no font");

        let bytes = generate_pdf(&v, &[], &failures).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn non_latin_text_is_replaced() {
        assert_eq!(pdf_text("Fill → rate"), "Fill ? rate");
        assert_eq!(pdf_text("Café"), "Café");
    }
}

