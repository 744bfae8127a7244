use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use assist_core::traits::transport::HttpTransport;
use assist_core::{AssistConfig, Assistant, CameraArbiter, ImageStreamer, ShutdownSignal};
use assist_host::config_file::{load_config, rebase_paths};
use assist_host::{
    DirectoryCamera, LineWakeWord, LogIndicator, ReqwestTransport, WavFileMicrophone,
    WavFileSpeaker,
};

/// Wake-word voice and vision assistant, running against fixture peripherals.
///
/// Press Enter to "say" the wake phrase; type `quit` or close stdin to stop.
#[derive(Debug, Parser)]
#[command(name = "vision-assist", version)]
struct Args {
    /// TOML file overlaying the built-in configuration.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the recording, stills and response (overrides the config).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory of JPEG images served by the camera.
    #[arg(long)]
    camera_dir: PathBuf,

    /// 16-bit WAV played into the microphone. Silence when omitted.
    #[arg(long)]
    mic_wav: Option<PathBuf>,

    /// Pace the microphone fixture at its real sample rate.
    #[arg(long)]
    realtime: bool,

    /// Where played responses are written.
    #[arg(long, default_value = "playback")]
    speaker_dir: PathBuf,

    /// Length of one wake-word listening window in milliseconds.
    #[arg(long, default_value_t = 500)]
    detect_window_ms: u64,

    /// Do not start the background image streamer.
    #[arg(long)]
    no_stream: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(ref dir) = args.data_dir {
        rebase_paths(&mut config, dir);
    }
    prepare_dirs(&config)?;
    let config = Arc::new(config);

    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new()?);
    let camera = Arc::new(CameraArbiter::new(DirectoryCamera::open(&args.camera_dir)?));
    let shutdown = ShutdownSignal::new();

    let streamer = if args.no_stream {
        None
    } else {
        let streamer = ImageStreamer::new(Arc::clone(&config), Arc::clone(&camera), Arc::clone(&transport));
        Some(streamer.spawn(shutdown.clone())?)
    };

    let mic = match args.mic_wav {
        Some(ref path) => WavFileMicrophone::open(path, args.realtime)?,
        None => WavFileMicrophone::silence(config.pcm_format()),
    };
    let detector = LineWakeWord::stdin(Duration::from_millis(args.detect_window_ms), shutdown.clone())?;

    let mut assistant = Assistant::new(
        Arc::clone(&config),
        detector,
        mic,
        WavFileSpeaker::new(&args.speaker_dir),
        Arc::clone(&camera),
        transport,
        Box::new(LogIndicator::default()),
    );

    log::info!(
        "Posting queries to {}; press Enter to trigger, type quit to stop",
        config.server.query_url
    );
    assistant.run(&shutdown);

    shutdown.trigger();
    if let Some(handle) = streamer {
        match handle.join() {
            Ok(stats) => log::info!(
                "Image streamer: {} iterations, {} failures",
                stats.iterations,
                stats.failures
            ),
            Err(_) => log::error!("Image streamer thread panicked"),
        }
    }
    Ok(())
}

/// Create the parent directory of every file the tasks write.
fn prepare_dirs(config: &AssistConfig) -> std::io::Result<()> {
    for path in [
        &config.paths.recording,
        &config.paths.still_image,
        &config.paths.response,
        &config.paths.stream_image,
    ] {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
