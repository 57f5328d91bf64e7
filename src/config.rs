use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{PipelineError, Result};

/// Which acquisition front end the pipeline runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Local ALSA capture with playback, 16-bit samples, accumulating hand-off.
    Software,
    /// Remote DSP board over a serial link, 24-bit samples, single-slot hand-off.
    Hardware,
}

impl FromStr for Variant {
    type Err = &'static str;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "software" | "sw" => Ok(Variant::Software),
            "hardware" | "hw" => Ok(Variant::Hardware),
            _ => Err("Failed to parse PIPELINE_VARIANT"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    // 流水线配置
    pub variant: Variant,
    pub sample_rate: u32,
    pub channels: u32,
    pub chunk_size: usize,
    pub frame_size: usize,
    pub queue_capacity: usize,
    pub visualization: bool,
    pub tick_interval_ms: u64,

    // 本地声卡
    pub capture_device: String,
    pub playback_device: String,
    pub playback_buffer_chunks: usize,

    // 串口配置
    pub serial_port: String,
    pub baud_rate: u32,
    pub request_code: u8,
    pub block_bytes: usize,
    pub read_timeout_ms: u64,
    pub poll_interval_us: u64,

    // FIR 滤波器
    pub filter_enabled: bool,
    pub filter_coefficients: Vec<i32>,
    pub filter_shift: u32,

    // GUI进程配置
    pub gui_local_port: u16,
    pub gui_remote_port: u16,
}

impl Config {
    /// 从编译时设置的环境变量创建配置
    /// 所有参数都在编译时从 config.toml 中读取
    pub fn new() -> std::result::Result<Self, &'static str> {
        Ok(Self {
            variant: env!("PIPELINE_VARIANT").parse()?,
            sample_rate: env!("PIPELINE_SAMPLE_RATE").parse()
                .map_err(|_| "Failed to parse PIPELINE_SAMPLE_RATE")?,
            channels: 1,
            chunk_size: env!("PIPELINE_CHUNK_SIZE").parse()
                .map_err(|_| "Failed to parse PIPELINE_CHUNK_SIZE")?,
            frame_size: env!("PIPELINE_FRAME_SIZE").parse()
                .map_err(|_| "Failed to parse PIPELINE_FRAME_SIZE")?,
            queue_capacity: env!("PIPELINE_QUEUE_CAPACITY").parse()
                .map_err(|_| "Failed to parse PIPELINE_QUEUE_CAPACITY")?,
            visualization: env!("PIPELINE_VISUALIZATION").parse()
                .map_err(|_| "Failed to parse PIPELINE_VISUALIZATION")?,
            tick_interval_ms: env!("PIPELINE_TICK_INTERVAL_MS").parse()
                .map_err(|_| "Failed to parse PIPELINE_TICK_INTERVAL_MS")?,

            capture_device: env!("CAPTURE_DEVICE").to_string(),
            playback_device: env!("PLAYBACK_DEVICE").to_string(),
            playback_buffer_chunks: env!("PLAYBACK_BUFFER_CHUNKS").parse()
                .map_err(|_| "Failed to parse PLAYBACK_BUFFER_CHUNKS")?,

            serial_port: env!("SERIAL_PORT").to_string(),
            baud_rate: env!("SERIAL_BAUD_RATE").parse()
                .map_err(|_| "Failed to parse SERIAL_BAUD_RATE")?,
            request_code: env!("SERIAL_REQUEST_CODE").parse()
                .map_err(|_| "Failed to parse SERIAL_REQUEST_CODE")?,
            block_bytes: env!("SERIAL_BLOCK_BYTES").parse()
                .map_err(|_| "Failed to parse SERIAL_BLOCK_BYTES")?,
            read_timeout_ms: env!("SERIAL_READ_TIMEOUT_MS").parse()
                .map_err(|_| "Failed to parse SERIAL_READ_TIMEOUT_MS")?,
            poll_interval_us: env!("SERIAL_POLL_INTERVAL_US").parse()
                .map_err(|_| "Failed to parse SERIAL_POLL_INTERVAL_US")?,

            filter_enabled: env!("FILTER_ENABLED").parse()
                .map_err(|_| "Failed to parse FILTER_ENABLED")?,
            filter_coefficients: parse_coefficients(env!("FILTER_COEFFICIENTS"))
                .ok_or("Failed to parse FILTER_COEFFICIENTS")?,
            filter_shift: env!("FILTER_SHIFT").parse()
                .map_err(|_| "Failed to parse FILTER_SHIFT")?,

            gui_local_port: env!("GUI_LOCAL_PORT").parse()
                .map_err(|_| "Failed to parse GUI_LOCAL_PORT")?,
            gui_remote_port: env!("GUI_REMOTE_PORT").parse()
                .map_err(|_| "Failed to parse GUI_REMOTE_PORT")?,
        })
    }

    /// Number of chunks that make up one visualization frame.
    pub fn num_chunks(&self) -> usize {
        self.frame_size / self.chunk_size
    }

    /// Reject combinations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(PipelineError::Config("chunk_size must be non-zero".into()));
        }
        if self.frame_size == 0 || self.frame_size % self.chunk_size != 0 {
            return Err(PipelineError::Config(format!(
                "frame_size {} is not a multiple of chunk_size {}",
                self.frame_size, self.chunk_size
            )));
        }
        if self.queue_capacity < self.num_chunks() {
            return Err(PipelineError::Config(format!(
                "queue_capacity {} cannot hold {} chunks",
                self.queue_capacity,
                self.num_chunks()
            )));
        }
        if self.filter_coefficients.is_empty() {
            return Err(PipelineError::Config("filter needs at least one coefficient".into()));
        }
        if self.filter_shift >= 32 {
            return Err(PipelineError::Config(format!(
                "filter shift {} is out of range",
                self.filter_shift
            )));
        }
        if self.block_bytes == 0 || self.block_bytes % 3 != 0 {
            return Err(PipelineError::Config(format!(
                "serial block of {} bytes is not a whole number of 24-bit samples",
                self.block_bytes
            )));
        }
        if self.channels != 1 {
            return Err(PipelineError::Config("only mono is supported".into()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new().expect("Failed to create default Config from build-time environment variables")
    }
}

/// Parse a comma-separated list of integer taps, e.g. `"0,2,4,6"`.
pub fn parse_coefficients(s: &str) -> Option<Vec<i32>> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| t.parse().ok())
        .collect()
}
