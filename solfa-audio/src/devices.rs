//! Output device enumeration and persisted audio configuration.

use std::path::PathBuf;

use cpal::traits::{DeviceTrait, HostTrait};
use serde::{Deserialize, Serialize};

/// Output buffer size options for the cpal stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BufferSize {
    B64 = 64,
    B128 = 128,
    B256 = 256,
    #[default]
    B512 = 512,
    B1024 = 1024,
    B2048 = 2048,
}

impl BufferSize {
    pub const ALL: [BufferSize; 6] = [
        BufferSize::B64,
        BufferSize::B128,
        BufferSize::B256,
        BufferSize::B512,
        BufferSize::B1024,
        BufferSize::B2048,
    ];

    pub fn as_samples(&self) -> u32 {
        *self as u32
    }

    /// Calculate latency in milliseconds for a given sample rate
    pub fn latency_ms(&self, sample_rate: u32) -> f32 {
        (self.as_samples() as f32 / sample_rate as f32) * 1000.0
    }
}

/// User-selected audio output configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub output_device: Option<String>, // None = system default
    pub buffer_size: BufferSize,
    pub sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            output_device: None,
            buffer_size: BufferSize::default(),
            sample_rate: 48000,
        }
    }
}

/// Enumerate output device names on the default cpal host.
pub fn output_device_names() -> Vec<String> {
    let host = cpal::default_host();
    match host.output_devices() {
        Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
        Err(e) => {
            log::warn!(target: "audio", "Failed to enumerate output devices: {}", e);
            Vec::new()
        }
    }
}

fn config_path() -> PathBuf {
    if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home)
            .join(".config")
            .join("solfa")
            .join("audio.json")
    } else {
        PathBuf::from("audio.json")
    }
}

/// Load the audio config from ~/.config/solfa/audio.json.
/// Missing or malformed files fall back to defaults, field by field.
pub fn load_config() -> AudioConfig {
    let path = config_path();
    let content = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(_) => return AudioConfig::default(),
    };
    let parsed: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(_) => return AudioConfig::default(),
    };

    let buffer_size = parsed
        .get("buffer_size")
        .and_then(|v| v.as_u64())
        .and_then(|bs| match bs {
            64 => Some(BufferSize::B64),
            128 => Some(BufferSize::B128),
            256 => Some(BufferSize::B256),
            512 => Some(BufferSize::B512),
            1024 => Some(BufferSize::B1024),
            2048 => Some(BufferSize::B2048),
            _ => None,
        })
        .unwrap_or_default();

    let sample_rate = parsed
        .get("sample_rate")
        .and_then(|v| v.as_u64())
        .map(|sr| sr as u32)
        .unwrap_or(48000);

    AudioConfig {
        output_device: parsed
            .get("output_device")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        buffer_size,
        sample_rate,
    }
}

/// Save the audio config to ~/.config/solfa/audio.json
pub fn save_config(config: &AudioConfig) {
    let path = config_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let obj = serde_json::json!({
        "output_device": config.output_device,
        "buffer_size": config.buffer_size.as_samples(),
        "sample_rate": config.sample_rate,
    });
    let _ = std::fs::write(&path, serde_json::to_string_pretty(&obj).unwrap_or_default());
}
