use std::fs;
use std::path::Path;
use serde::Deserialize;

#[derive(Deserialize)]
struct Config {
    application: Application,
    audio: Audio,
    pipeline: Pipeline,
    network: Network,
    hello_message: HelloMessage,
}

#[derive(Deserialize)]
struct Application {
    name: String,
    version: String,
}

#[derive(Deserialize)]
struct Audio {
    capture_device: String,
    playback_device: String,
    sample_rate: u32,
    mixer_card: String,
    mixer_control: String,
    volume: u8,
}

#[derive(Deserialize)]
struct Pipeline {
    decode_sample_rate: u32,
    encode_queue_depth: usize,
    decode_queue_depth: usize,
    playback_queue_depth: usize,
}

#[derive(Deserialize)]
struct Network {
    ws_url: String,
    ws_token: String,
    device_id: String,
    client_id: String,
}

#[derive(Deserialize)]
struct HelloMessage {
    format: String,
    sample_rate: u32,
    channels: u8,
    frame_duration: u32,
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

    // 音频设备
    println!("cargo:rustc-env=AUDIO_CAPTURE_DEVICE={}", config.audio.capture_device);
    println!("cargo:rustc-env=AUDIO_PLAYBACK_DEVICE={}", config.audio.playback_device);
    println!("cargo:rustc-env=AUDIO_SAMPLE_RATE={}", config.audio.sample_rate);
    println!("cargo:rustc-env=AUDIO_MIXER_CARD={}", config.audio.mixer_card);
    println!("cargo:rustc-env=AUDIO_MIXER_CONTROL={}", config.audio.mixer_control);
    println!("cargo:rustc-env=AUDIO_VOLUME={}", config.audio.volume);

    // 流水线队列深度
    println!("cargo:rustc-env=PIPELINE_DECODE_SAMPLE_RATE={}", config.pipeline.decode_sample_rate);
    println!("cargo:rustc-env=PIPELINE_ENCODE_QUEUE_DEPTH={}", config.pipeline.encode_queue_depth);
    println!("cargo:rustc-env=PIPELINE_DECODE_QUEUE_DEPTH={}", config.pipeline.decode_queue_depth);
    println!("cargo:rustc-env=PIPELINE_PLAYBACK_QUEUE_DEPTH={}", config.pipeline.playback_queue_depth);

    // 网络配置
    println!("cargo:rustc-env=WS_URL={}", config.network.ws_url);
    println!("cargo:rustc-env=WS_TOKEN={}", config.network.ws_token);
    println!("cargo:rustc-env=DEVICE_ID={}", config.network.device_id);
    println!("cargo:rustc-env=CLIENT_ID={}", config.network.client_id);

    // Hello 消息配置
    println!("cargo:rustc-env=HELLO_FORMAT={}", config.hello_message.format);
    println!("cargo:rustc-env=HELLO_SAMPLE_RATE={}", config.hello_message.sample_rate);
    println!("cargo:rustc-env=HELLO_CHANNELS={}", config.hello_message.channels);
    println!("cargo:rustc-env=HELLO_FRAME_DURATION={}", config.hello_message.frame_duration);
}
