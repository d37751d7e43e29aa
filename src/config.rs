use serde::Serialize;

use crate::audio::AudioConfig;

#[derive(Debug, Serialize, Clone)]
pub struct Config {
    pub app_name: &'static str,
    pub app_version: &'static str,

    // 音频设备配置
    pub capture_device: &'static str,
    pub playback_device: &'static str,
    pub sample_rate: u32,
    pub mixer_card: &'static str,
    pub mixer_control: &'static str,
    pub volume: u8,

    // 流水线配置
    pub decode_sample_rate: u32,
    pub encode_queue_depth: usize,
    pub decode_queue_depth: usize,
    pub playback_queue_depth: usize,

    // 网络配置（静态部分）
    pub ws_url: &'static str,
    pub ws_token: &'static str,

    // 设备标识（动态部分，可在运行时修改）
    pub device_id: String,
    pub client_id: String,

    // Hello消息参数
    pub hello_format: &'static str,
    pub hello_sample_rate: u32,
    pub hello_channels: u8,
    pub hello_frame_duration: u32,
}

impl Config {
    /// 从编译时设置的环境变量创建配置
    /// 所有参数都在编译时从 config.toml 中读取
    pub fn new() -> Result<Self, &'static str> {
        let config = Self {
            app_name: env!("APP_NAME"),
            app_version: env!("APP_VERSION"),

            capture_device: env!("AUDIO_CAPTURE_DEVICE"),
            playback_device: env!("AUDIO_PLAYBACK_DEVICE"),
            sample_rate: env!("AUDIO_SAMPLE_RATE").parse()
                .map_err(|_| "Failed to parse AUDIO_SAMPLE_RATE")?,
            mixer_card: env!("AUDIO_MIXER_CARD"),
            mixer_control: env!("AUDIO_MIXER_CONTROL"),
            volume: env!("AUDIO_VOLUME").parse()
                .map_err(|_| "Failed to parse AUDIO_VOLUME")?,

            decode_sample_rate: env!("PIPELINE_DECODE_SAMPLE_RATE").parse()
                .map_err(|_| "Failed to parse PIPELINE_DECODE_SAMPLE_RATE")?,
            encode_queue_depth: env!("PIPELINE_ENCODE_QUEUE_DEPTH").parse()
                .map_err(|_| "Failed to parse PIPELINE_ENCODE_QUEUE_DEPTH")?,
            decode_queue_depth: env!("PIPELINE_DECODE_QUEUE_DEPTH").parse()
                .map_err(|_| "Failed to parse PIPELINE_DECODE_QUEUE_DEPTH")?,
            playback_queue_depth: env!("PIPELINE_PLAYBACK_QUEUE_DEPTH").parse()
                .map_err(|_| "Failed to parse PIPELINE_PLAYBACK_QUEUE_DEPTH")?,

            ws_url: env!("WS_URL"),
            ws_token: env!("WS_TOKEN"),

            // 设备标识初始化为config.toml中的值
            device_id: env!("DEVICE_ID").to_string(),
            client_id: env!("CLIENT_ID").to_string(),

            hello_format: env!("HELLO_FORMAT"),
            hello_sample_rate: env!("HELLO_SAMPLE_RATE").parse()
                .map_err(|_| "Failed to parse HELLO_SAMPLE_RATE")?,
            hello_channels: env!("HELLO_CHANNELS").parse()
                .map_err(|_| "Failed to parse HELLO_CHANNELS")?,
            hello_frame_duration: env!("HELLO_FRAME_DURATION").parse()
                .map_err(|_| "Failed to parse HELLO_FRAME_DURATION")?,
        };

        if config.encode_queue_depth == 0
            || config.decode_queue_depth == 0
            || config.playback_queue_depth == 0
        {
            return Err("Pipeline queue depths must be at least 1");
        }
        if config.volume > 100 {
            return Err("AUDIO_VOLUME must be within 0..=100");
        }
        Ok(config)
    }

    /// 流水线参数，时间常量保持默认值
    pub fn pipeline_config(&self) -> AudioConfig {
        AudioConfig {
            encode_queue_depth: self.encode_queue_depth,
            decode_queue_depth: self.decode_queue_depth,
            playback_queue_depth: self.playback_queue_depth,
            ..Default::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new().expect("Failed to create default Config from build-time environment variables")
    }
}
