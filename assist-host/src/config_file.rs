//! TOML overlay for [`AssistConfig`].
//!
//! Every key is optional; whatever is present replaces the built-in default.
//!
//! ```toml
//! chunk_size = 1024
//!
//! [audio]
//! sample_rate = 16000
//! record_duration_secs = 5
//!
//! [server]
//! query_url = "http://192.168.1.100:5000/query"
//! image_stream_url = "http://192.168.1.100:5000/image_stream"
//! request_timeout_ms = 30000
//! device_id = "kitchen"
//!
//! [paths]
//! data_dir = "./data"
//!
//! [streamer]
//! interval_ms = 1000
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use assist_core::models::config::AssistConfig;

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub audio: AudioSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub assistant: AssistantSection,
    #[serde(default)]
    pub streamer: StreamerSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AudioSection {
    pub sample_rate: Option<u32>,
    pub bits_per_sample: Option<u16>,
    pub channels: Option<u16>,
    pub record_duration_secs: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub query_url: Option<String>,
    pub image_stream_url: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub boundary: Option<String>,
    pub device_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsSection {
    /// Moves all four files into this directory, keeping their names.
    pub data_dir: Option<PathBuf>,
    pub recording: Option<PathBuf>,
    pub still_image: Option<PathBuf>,
    pub response: Option<PathBuf>,
    pub stream_image: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssistantSection {
    pub poll_interval_ms: Option<u64>,
    pub attach_image: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamerSection {
    pub interval_ms: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigFileError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Overlay the keys that are set onto `config`.
    pub fn apply(self, config: &mut AssistConfig) {
        let Self {
            chunk_size,
            audio,
            server,
            paths,
            assistant,
            streamer,
        } = self;

        set(&mut config.chunk_size, chunk_size);

        set(&mut config.audio.sample_rate, audio.sample_rate);
        set(&mut config.audio.bits_per_sample, audio.bits_per_sample);
        set(&mut config.audio.channels, audio.channels);
        set(&mut config.audio.record_duration_secs, audio.record_duration_secs);

        set(&mut config.server.query_url, server.query_url);
        set(&mut config.server.image_stream_url, server.image_stream_url);
        set(
            &mut config.server.request_timeout,
            server.request_timeout_ms.map(Duration::from_millis),
        );
        set(&mut config.server.boundary, server.boundary);
        if server.device_id.is_some() {
            config.server.device_id = server.device_id;
        }

        if let Some(dir) = paths.data_dir {
            rebase_paths(config, &dir);
        }
        set(&mut config.paths.recording, paths.recording);
        set(&mut config.paths.still_image, paths.still_image);
        set(&mut config.paths.response, paths.response);
        set(&mut config.paths.stream_image, paths.stream_image);

        set(
            &mut config.assistant.poll_interval,
            assistant.poll_interval_ms.map(Duration::from_millis),
        );
        set(&mut config.assistant.attach_image, assistant.attach_image);

        set(
            &mut config.streamer.interval,
            streamer.interval_ms.map(Duration::from_millis),
        );
    }
}

/// Defaults, overlaid with `path` if given, then validated.
pub fn load_config(path: Option<&Path>) -> Result<AssistConfig, ConfigFileError> {
    let mut config = AssistConfig::default();
    if let Some(path) = path {
        FileConfig::load(path)?.apply(&mut config);
        log::info!("Configuration loaded from {}", path.display());
    }
    config.validate().map_err(ConfigFileError::Invalid)?;
    Ok(config)
}

/// Keep each file name but move it under `dir`.
pub fn rebase_paths(config: &mut AssistConfig, dir: &Path) {
    for path in [
        &mut config.paths.recording,
        &mut config.paths.still_image,
        &mut config.paths.response,
        &mut config.paths.stream_image,
    ] {
        if let Some(name) = path.file_name() {
            *path = dir.join(name);
        }
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}
