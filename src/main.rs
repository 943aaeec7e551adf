// Entrypoint for the upload task.
// - Loads the options file and applies command line overrides.
// - Runs everything on a single-threaded runtime; all work is network/file I/O.
// - Exits non-zero when the run fails.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use gentics_upload::api::HttpTransport;
use gentics_upload::ui::TerminalPrompt;
use gentics_upload::{RunCoordinator, UploadOptions};
use tracing::{error, info};

/// Upload local asset folders into a Gentics CMS.
#[derive(Parser, Debug)]
#[command(name = "gentics-upload")]
#[command(about = "Upload images, scripts, fonts and stylesheets to a Gentics CMS", long_about = None)]
struct Args {
    /// Options file (default: ./upload.json, then ~/.gentics-upload.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    /// CMS application root (default: CNPortletapp)
    #[arg(long)]
    app_root: Option<String>,

    #[arg(long)]
    node_id: Option<String>,

    /// Template for newly created style pages
    #[arg(long)]
    template_id: Option<String>,

    #[arg(long)]
    images: Option<PathBuf>,
    #[arg(long)]
    images_folder_id: Option<String>,
    #[arg(long)]
    scripts: Option<PathBuf>,
    #[arg(long)]
    scripts_folder_id: Option<String>,
    #[arg(long)]
    fonts: Option<PathBuf>,
    #[arg(long)]
    fonts_folder_id: Option<String>,
    #[arg(long)]
    styles: Option<PathBuf>,
    #[arg(long)]
    styles_folder_id: Option<String>,

    /// File receiving the raw body of each response
    #[arg(long)]
    response_log: Option<PathBuf>,

    /// Keep the CMS session open after the run
    #[arg(long)]
    no_logout: bool,

    /// Log filter; RUST_LOG takes precedence
    #[arg(long, default_value = "info,gentics_upload=info")]
    log_level: String,
}

impl Args {
    fn apply(self, options: &mut UploadOptions) {
        fn set<T>(target: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *target = v;
            }
        }
        fn set_opt<T>(target: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *target = value;
            }
        }

        set(&mut options.host, self.host);
        set(&mut options.app_root, self.app_root);
        set_opt(&mut options.node_id, self.node_id);
        set_opt(&mut options.template_id, self.template_id);
        set_opt(&mut options.images, self.images);
        set_opt(&mut options.images_folder_id, self.images_folder_id);
        set_opt(&mut options.scripts, self.scripts);
        set_opt(&mut options.scripts_folder_id, self.scripts_folder_id);
        set_opt(&mut options.fonts, self.fonts);
        set_opt(&mut options.fonts_folder_id, self.fonts_folder_id);
        set_opt(&mut options.styles, self.styles);
        set_opt(&mut options.styles_folder_id, self.styles_folder_id);
        set_opt(&mut options.response_log, self.response_log);
        if self.no_logout {
            options.logout = false;
        }
    }
}

fn init_logger(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(&args.log_level);

    let mut options = match &args.config {
        Some(path) => UploadOptions::load(path)?,
        None => UploadOptions::load_default()?,
    };
    args.apply(&mut options);

    let transport = HttpTransport::new(&options.host).context("Failed to set up HTTP transport")?;
    let coordinator = RunCoordinator::new(options, Arc::new(transport));

    let report = coordinator.run(&TerminalPrompt).await?;
    let uploaded = report.uploaded();
    if let Err(e) = report.into_result() {
        error!("Upload failed: {}", e);
        return Err(e.into());
    }
    info!("Done, {} files pushed.", uploaded);
    Ok(())
}
