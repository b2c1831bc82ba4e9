//! Command-line client: submit a BVH clip, follow the render, download the videos.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mocap_client::{ClientConfig, JobSubmission, LogReporter, RenderClient};
use mocap_models::RotationMode;

#[derive(Debug, Parser)]
#[command(name = "mocap-render", version, about = "Render a BVH motion clip to video")]
struct Args {
    /// BVH motion file to render
    bvh_file: PathBuf,

    /// Render server base URL
    #[arg(
        short = 's',
        long,
        env = "RENDER_SERVER_URL",
        default_value = "http://localhost:5001"
    )]
    server_url: String,

    /// Audio track to combine with the rendered videos
    #[arg(short = 'a', long)]
    audio_file: Option<PathBuf>,

    /// Avatar rotation: default, cw, ccw or flip
    #[arg(short = 'r', long, default_value_t = RotationMode::Default)]
    rotate: RotationMode,

    /// Directory the videos are written to [default: <exe dir>/output]
    #[arg(short = 'o', long)]
    output_dir: Option<PathBuf>,

    /// API token sent as a bearer credential
    #[arg(long, env = "RENDER_API_TOKEN", hide_env_values = true, default_value = "")]
    token: String,

    /// Seconds between status requests
    #[arg(long, env = "RENDER_POLL_INTERVAL_SECS", default_value_t = 5)]
    poll_interval: u64,

    /// Give up after this many seconds without a terminal status
    #[arg(long, env = "RENDER_DEADLINE_SECS")]
    deadline: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long, env = "RENDER_REQUEST_TIMEOUT_SECS")]
    request_timeout: Option<u64>,

    /// Extra attempts for requests that fail to connect or time out
    #[arg(long, env = "RENDER_MAX_RETRIES", default_value_t = 0)]
    retries: u32,
}

impl Args {
    /// Flags win over their environment variables, which win over defaults.
    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.server_url.clone(),
            token: self.token.clone(),
            poll_interval: Duration::from_secs(self.poll_interval),
            deadline: self.deadline.map(Duration::from_secs),
            request_timeout: self.request_timeout.map(Duration::from_secs),
            max_retries: self.retries,
            ..ClientConfig::default()
        }
    }

    fn destination(&self) -> std::io::Result<PathBuf> {
        if let Some(dir) = &self.output_dir {
            return Ok(dir.clone());
        }
        let exe = std::env::current_exe()?;
        let base = exe
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(base.join("output"))
    }

    fn submission(&self) -> JobSubmission {
        let mut submission = JobSubmission::new(&self.bvh_file).with_rotation(self.rotate);
        if let Some(audio) = &self.audio_file {
            submission = submission.with_audio(audio);
        }
        submission
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mocap_client=info,mocap_render=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(false))
            .with(env_filter)
            .init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();

    let destination = match args.destination() {
        Ok(dir) => dir,
        Err(e) => {
            error!("Cannot determine output directory: {}", e);
            std::process::exit(1);
        }
    };

    let client = match RenderClient::new(args.client_config()) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create render client: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Rendering {} with rotation {} into {}",
        args.bvh_file.display(),
        args.rotate,
        destination.display()
    );

    let mut reporter = LogReporter;
    match client
        .render(&args.submission(), &destination, &mut reporter)
        .await
    {
        Ok(written) => {
            for path in &written {
                info!("Wrote {}", path.display());
            }
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}
