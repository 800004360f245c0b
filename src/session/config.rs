use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::CaptureConfig;
use crate::channel::ChannelSetup;

/// Configuration for one live translation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (e.g. "session-7f9d…")
    pub session_id: String,

    /// BCP-47 tag of the language being spoken
    pub source_language: String,

    /// BCP-47 tag to translate into
    pub target_language: String,

    /// Free-form text steering the remote model
    pub system_instruction: String,

    /// Capture sample rate in Hz (the relay expects 16kHz)
    pub capture_sample_rate: u32,

    /// Sample rate of the synthesized audio in Hz
    pub playback_sample_rate: u32,

    /// Size of each captured frame
    pub frame_duration_ms: u64,

    /// How long `Connecting` may take before the attempt fails
    pub connect_timeout: Duration,

    /// How long completed-turn transcripts stay visible
    pub transcript_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            source_language: "en-US".to_string(),
            target_language: "es-ES".to_string(),
            system_instruction:
                "Translate the speaker's words into the target language and reply with spoken audio only."
                    .to_string(),
            capture_sample_rate: 16000,
            playback_sample_rate: 24000,
            frame_duration_ms: 100,
            connect_timeout: Duration::from_secs(10),
            transcript_grace: Duration::from_secs(5),
        }
    }
}

impl SessionConfig {
    /// Fresh configuration for a new `start()`: new session id, caller
    /// overrides applied on top of these defaults.
    pub fn for_start(&self, opts: StartOptions) -> SessionConfig {
        let mut config = self.clone();
        config.session_id = format!("session-{}", uuid::Uuid::new_v4());
        if let Some(instruction) = opts.system_instruction {
            config.system_instruction = instruction;
        }
        if let Some(source) = opts.source_language {
            config.source_language = source;
        }
        if let Some(target) = opts.target_language {
            config.target_language = target;
        }
        config
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            sample_rate: self.capture_sample_rate,
            channels: 1,
            frame_duration_ms: self.frame_duration_ms,
        }
    }

    pub fn channel_setup(&self) -> ChannelSetup {
        ChannelSetup {
            session_id: self.session_id.clone(),
            system_instruction: self.system_instruction.clone(),
            source_language: self.source_language.clone(),
            target_language: self.target_language.clone(),
            transcribe_input: true,
            transcribe_output: true,
        }
    }
}

/// Caller overrides for one `start()` call
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub system_instruction: Option<String>,
    pub source_language: Option<String>,
    pub target_language: Option<String>,
}
