mod controller;
mod net_link;

use anyhow::Context;
use controller::CoreController;
use mac_address::get_mac_address;
use net_link::{NetCommand, NetEvent, NetLink};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use uuid::Uuid;
use voice_pipeline::audio::{AlsaConfig, AlsaPort, AudioPort, AudioSystem, OpusCodecs};
use voice_pipeline::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 加载配置
    let mut config = Config::new().map_err(anyhow::Error::msg)?;
    log::info!("{} v{}", config.app_name, config.app_version);

    // 设备id和客户端id的处理
    if config.device_id == "unknown-device" {
        config.device_id = match get_mac_address() {
            Ok(Some(mac)) => mac.to_string().to_lowercase(),
            _ => Uuid::new_v4().to_string(),
        };
    }

    // 客户端UUID，先从本地文件读取以保持重启间身份一致，如果不存在则生成新的并保存
    let uuid_file_path = "voice_pipeline_uuid.txt";
    if config.client_id == "unknown-client" {
        if let Ok(content) = std::fs::read_to_string(uuid_file_path) {
            let trimmed = content.trim();
            if !trimmed.is_empty() {
                config.client_id = trimmed.to_string();
                log::info!("Loaded Client ID from file: {}", config.client_id);
            }
        }
    }
    if config.client_id == "unknown-client" {
        config.client_id = Uuid::new_v4().to_string();
        log::info!("Generated new Client ID: {}", config.client_id);
        if let Err(e) = std::fs::write(uuid_file_path, &config.client_id) {
            log::warn!("Failed to save Client ID to file: {}", e);
        }
    }

    // 打开音频硬件
    let port = AlsaPort::open(&AlsaConfig {
        capture_device: config.capture_device.to_string(),
        playback_device: config.playback_device.to_string(),
        sample_rate: config.sample_rate,
        mixer_card: config.mixer_card.to_string(),
        mixer_control: config.mixer_control.to_string(),
    })
    .context("Failed to open audio port")?;
    port.set_volume(config.volume);

    let audio = Arc::new(AudioSystem::new(
        Arc::new(port),
        Arc::new(OpusCodecs),
        config.pipeline_config(),
    ));
    audio.start(config.decode_sample_rate)?;

    // 网络事件/命令通道
    let (tx_net_event, mut rx_net_event) = mpsc::channel::<NetEvent>(100);
    let (tx_net_cmd, rx_net_cmd) = mpsc::channel::<NetCommand>(100);

    // 编码线程上行的音频包：链路拥塞时直接丢弃，不阻塞编码线程
    let uplink = tx_net_cmd.clone();
    audio.set_outgoing_packet_callback(move |packet| {
        if uplink.try_send(NetCommand::SendBinary(packet.to_vec())).is_err() {
            log::debug!("Uplink congested, dropped {} byte packet", packet.len());
        }
    });

    let net_link = NetLink::new(config.clone(), tx_net_event, rx_net_cmd);
    tokio::spawn(async move {
        net_link.run().await;
    });

    let mut controller = CoreController::new(audio.clone(), tx_net_cmd);
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    log::info!("Ready. Press Enter to start/stop recording, Ctrl+C to quit.");

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                log::info!("Received Ctrl+C, shutting down...");
                break;
            }
            Some(event) = rx_net_event.recv() => {
                controller.handle_net_event(event).await;
            }
            line = stdin.next_line(), if stdin_open => {
                match line {
                    Ok(Some(_)) => controller.toggle_recording().await,
                    // stdin 关闭后只保留网络与播放
                    Ok(None) | Err(_) => stdin_open = false,
                }
            }
        }
    }

    audio.stop();
    if let Some(stats) = audio.last_session_stats() {
        log::info!("Last playback session: {}", stats);
    }
    Ok(())
}
