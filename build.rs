use std::fs;
use std::path::Path;
use serde::Deserialize;

#[derive(Deserialize)]
struct Config {
    application: Application,
    pipeline: Pipeline,
    capture: Capture,
    playback: Playback,
    serial: Serial,
    filter: Filter,
    gui: Gui,
}

#[derive(Deserialize)]
struct Application {
    name: String,
    version: String,
}

#[derive(Deserialize)]
struct Pipeline {
    variant: String,
    sample_rate: u32,
    chunk_size: usize,
    frame_size: usize,
    queue_capacity: usize,
    visualization: bool,
    tick_interval_ms: u64,
}

#[derive(Deserialize)]
struct Capture {
    device: String,
}

#[derive(Deserialize)]
struct Playback {
    device: String,
    buffer_chunks: usize,
}

#[derive(Deserialize)]
struct Serial {
    port: String,
    baud_rate: u32,
    request_code: u8,
    block_bytes: usize,
    read_timeout_ms: u64,
    poll_interval_us: u64,
}

#[derive(Deserialize)]
struct Filter {
    enabled: bool,
    coefficients: String,
    shift: u32,
}

#[derive(Deserialize)]
struct Gui {
    local_port: u16,
    remote_port: u16,
}

// 在编译时读取 config.toml 并设置环境变量
fn main() {
    println!("cargo:rerun-if-changed=config.toml");

    let config_path = Path::new("config.toml");
    if !config_path.exists() {
        panic!("config.toml not found!");
    }

    let config_str = fs::read_to_string(config_path).expect("Failed to read config.toml");
    let config: Config = toml::from_str(&config_str).expect("Failed to parse config.toml");

    println!("cargo:rustc-env=APP_NAME={}", config.application.name);
    println!("cargo:rustc-env=APP_VERSION={}", config.application.version);

    // 流水线配置
    println!("cargo:rustc-env=PIPELINE_VARIANT={}", config.pipeline.variant);
    println!("cargo:rustc-env=PIPELINE_SAMPLE_RATE={}", config.pipeline.sample_rate);
    println!("cargo:rustc-env=PIPELINE_CHUNK_SIZE={}", config.pipeline.chunk_size);
    println!("cargo:rustc-env=PIPELINE_FRAME_SIZE={}", config.pipeline.frame_size);
    println!("cargo:rustc-env=PIPELINE_QUEUE_CAPACITY={}", config.pipeline.queue_capacity);
    println!("cargo:rustc-env=PIPELINE_VISUALIZATION={}", config.pipeline.visualization);
    println!("cargo:rustc-env=PIPELINE_TICK_INTERVAL_MS={}", config.pipeline.tick_interval_ms);

    // 本地声卡
    println!("cargo:rustc-env=CAPTURE_DEVICE={}", config.capture.device);
    println!("cargo:rustc-env=PLAYBACK_DEVICE={}", config.playback.device);
    println!("cargo:rustc-env=PLAYBACK_BUFFER_CHUNKS={}", config.playback.buffer_chunks);

    // 串口
    println!("cargo:rustc-env=SERIAL_PORT={}", config.serial.port);
    println!("cargo:rustc-env=SERIAL_BAUD_RATE={}", config.serial.baud_rate);
    println!("cargo:rustc-env=SERIAL_REQUEST_CODE={}", config.serial.request_code);
    println!("cargo:rustc-env=SERIAL_BLOCK_BYTES={}", config.serial.block_bytes);
    println!("cargo:rustc-env=SERIAL_READ_TIMEOUT_MS={}", config.serial.read_timeout_ms);
    println!("cargo:rustc-env=SERIAL_POLL_INTERVAL_US={}", config.serial.poll_interval_us);

    // FIR 滤波器
    println!("cargo:rustc-env=FILTER_ENABLED={}", config.filter.enabled);
    println!("cargo:rustc-env=FILTER_COEFFICIENTS={}", config.filter.coefficients);
    println!("cargo:rustc-env=FILTER_SHIFT={}", config.filter.shift);

    // GUI 进程
    println!("cargo:rustc-env=GUI_LOCAL_PORT={}", config.gui.local_port);
    println!("cargo:rustc-env=GUI_REMOTE_PORT={}", config.gui.remote_port);
}
