use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::session::SessionConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub channel: ChannelConfig,
    pub session: SessionDefaults,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    pub capture_sample_rate: u32,
    pub playback_sample_rate: u32,
    pub frame_duration_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct ChannelConfig {
    pub nats_url: String,
    pub subject_prefix: String,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct SessionDefaults {
    pub source_language: String,
    pub target_language: String,
    pub system_instruction: String,
    pub transcript_grace_secs: u64,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Session defaults assembled from the file sections.
    pub fn session_defaults(&self) -> SessionConfig {
        SessionConfig {
            source_language: self.session.source_language.clone(),
            target_language: self.session.target_language.clone(),
            system_instruction: self.session.system_instruction.clone(),
            capture_sample_rate: self.audio.capture_sample_rate,
            playback_sample_rate: self.audio.playback_sample_rate,
            frame_duration_ms: self.audio.frame_duration_ms,
            connect_timeout: Duration::from_secs(self.channel.connect_timeout_secs),
            transcript_grace: Duration::from_secs(self.session.transcript_grace_secs),
            ..SessionConfig::default()
        }
    }
}
