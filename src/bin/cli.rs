use clap::Parser;
use fillrate::config::AppConfig;
use fillrate::dashboard::{self, Dashboard, DashboardView};
use fillrate::filter::{FilterSet, Selection};
use fillrate::graph::{self, GraphOptions};
use fillrate::{downloader, loader, report};
use std::path::PathBuf;

/// Compute fill rate KPIs for a CSV or Excel file and export the results
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// CSV or Excel file to analyse
    file: PathBuf,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Built-in dashboard profile
    #[arg(short, long)]
    profile: Option<String>,

    /// JSON dashboard profile file
    #[arg(long)]
    profile_file: Option<PathBuf>,

    /// Filter as COLUMN=VALUE or COLUMN=A|B|C; may be repeated
    #[arg(short, long = "filter", value_parser = parse_filter)]
    filters: Vec<(String, Selection)>,

    /// Write the filtered rows as CSV
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write the filtered rows as Excel
    #[arg(long)]
    xlsx: Option<PathBuf>,

    /// Write the PDF summary
    #[arg(long)]
    pdf: Option<PathBuf>,

    /// Write a chart's aggregated series as Excel, given as CHART=FILE
    #[arg(long, value_parser = parse_summary)]
    summary: Vec<(String, PathBuf)>,

    /// Directory to write every chart into as PNG
    #[arg(long)]
    charts: Option<PathBuf>,

    /// Mail every chart to this address
    #[cfg(feature = "web")]
    #[arg(long)]
    email: Option<String>,
}

fn parse_filter(arg: &str) -> Result<(String, Selection), String> {
    FilterSet::parse_arg(arg).ok_or_else(|| format!("expected COLUMN=VALUE, got {:?}", arg))
}

fn parse_summary(arg: &str) -> Result<(String, PathBuf), String> {
    match arg.split_once('=') {
        Some((chart, path)) if !chart.is_empty() && !path.is_empty() => {
            Ok((chart.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected CHART=FILE, got {:?}", arg)),
    }
}

fn print_view(view: &DashboardView) {
    println!("{}", view.title);
    println!("{} of {} rows", view.filtered_row_count, view.row_count);
    for widget in &view.filters {
        if !widget.selection.is_all() {
            println!("  {}: {}", widget.label, widget.selection.describe());
        }
    }
    println!();
    for metric in view.metrics() {
        println!("{:<32} {:>16}", metric.label, metric.display());
    }
    for chart in &view.charts {
        println!();
        println!("{}", chart.title);
        for row in &chart.series {
            println!("  {:<30} {:>12.2} ({} rows)", row.key, row.value, row.count);
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(profile) = args.profile {
        config.profile = profile;
    }
    if let Some(profile_file) = args.profile_file {
        config.profile_file = Some(profile_file);
    }
    let profile = config.dashboard_profile()?;

    let loaded = loader::load_table(&args.file)?;
    let table = dashboard::prepare_table(loaded.table, &profile)?;
    let dash = Dashboard::new(&table, &profile)?;

    let mut filters = FilterSet::new();
    for (column, selection) in args.filters {
        if !table.has_column(&column) {
            eprintln!("Warning: no column {:?}; filter ignored", column);
        }
        filters.set(column, selection);
    }

    let view = dash.build(&filters);
    print_view(&view);

    if let Some(path) = &args.csv {
        std::fs::write(path, downloader::to_csv(&dash.filtered(&filters))?)?;
        println!("Wrote {}", path.display());
    }
    if let Some(path) = &args.xlsx {
        std::fs::write(path, downloader::to_xlsx(&dash.filtered(&filters), "Filtered")?)?;
        println!("Wrote {}", path.display());
    }
    for (chart, path) in &args.summary {
        let summary = dashboard::summary_table(view.chart(chart)?);
        std::fs::write(path, downloader::to_xlsx(&summary, "Summary")?)?;
        println!("Wrote {}", path.display());
    }
    if let Some(dir) = &args.charts {
        std::fs::create_dir_all(dir)?;
        for chart in &view.charts {
            let path = dir.join(format!("{}.png", chart.name));
            match graph::save_graph(&chart.series, &GraphOptions::for_chart(chart), &path) {
                Ok(()) => println!("Wrote {}", path.display()),
                Err(e) => eprintln!("Chart {} skipped: {}", chart.name, e),
            }
        }
    }
    if let Some(path) = &args.pdf {
        std::fs::write(path, report::dashboard_pdf(&view)?)?;
        println!("Wrote {}", path.display());
    }

    #[cfg(feature = "web")]
    if let Some(to) = &args.email {
        email_charts(&config, &view, to)?;
    }

    Ok(())
}

#[cfg(feature = "web")]
fn email_charts(config: &AppConfig, view: &DashboardView, to: &str) -> fillrate::Result<()> {
    use fillrate::mailer::{MailAttachment, Mailer};

    let mailer = Mailer::new(&config.smtp)?;
    let mut attachments = Vec::new();
    for chart in &view.charts {
        attachments.push(MailAttachment {
            filename: format!("{}.png", chart.name),
            content_type: "image/png".to_string(),
            data: graph::create_graph(&chart.series, &GraphOptions::for_chart(chart))?,
        });
    }
    mailer.send_report(
        to,
        &view.title,
        &format!("{} of {} rows.", view.filtered_row_count, view.row_count),
        &attachments,
    )?;
    println!("Sent {} charts to {}", attachments.len(), to);
    Ok(())
}
