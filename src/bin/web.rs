use clap::Parser;
use fillrate::app;
use fillrate::config::AppConfig;
use std::path::PathBuf;

/// Serve the fill rate dashboard
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:3000
    #[arg(short, long)]
    bind: Option<String>,

    /// Built-in dashboard profile
    #[arg(short, long)]
    profile: Option<String>,

    /// JSON dashboard profile file
    #[arg(long)]
    profile_file: Option<PathBuf>,

    /// Data file shown before anything is uploaded
    #[arg(short, long)]
    data: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(profile) = args.profile {
        config.profile = profile;
    }
    if let Some(profile_file) = args.profile_file {
        config.profile_file = Some(profile_file);
    }
    if let Some(data) = args.data {
        config.data_path = Some(data);
    }

    println!("Starting fill rate dashboard on http://{}", config.bind);
    app::run(config).await
}
