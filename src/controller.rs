use crate::net_link::{NetCommand, NetEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use voice_pipeline::audio::AudioSystem;
use voice_pipeline::protocol::{ClientMessage, ServerMessage};

/// 控制面：按键录音、服务端信令与音频流之间的协调
pub struct CoreController {
    audio: Arc<AudioSystem>,
    net_tx: mpsc::Sender<NetCommand>,
    connected: bool,
    // 收到 STT 后锁定录音，直到 TTS 播放结束
    processing: bool,
}

impl CoreController {
    pub fn new(audio: Arc<AudioSystem>, net_tx: mpsc::Sender<NetCommand>) -> Self {
        Self {
            audio,
            net_tx,
            connected: false,
            processing: false,
        }
    }

    pub async fn handle_net_event(&mut self, event: NetEvent) {
        match event {
            NetEvent::Text(text) => self.process_server_text(&text).await,
            NetEvent::Binary(data) => self.audio.push_compressed_for_decode(&data),
            NetEvent::Connected => {
                log::info!("WebSocket Connected");
                self.connected = true;
            }
            NetEvent::Disconnected => {
                log::warn!("WebSocket Disconnected");
                self.connected = false;
                self.processing = false;
                if self.audio.is_recording() {
                    self.audio.stop_recording();
                }
            }
        }
    }

    async fn process_server_text(&mut self, text: &str) {
        let msg: ServerMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(_) => {
                log::debug!("Ignoring non-JSON text: {}", text);
                return;
            }
        };

        match msg.msg_type.as_str() {
            "stt" => {
                if let Some(t) = msg.text {
                    log::info!("STT Result: {}", t);
                }
                self.processing = true;
            }
            "tts_start" => {
                log::info!("TTS Started");
                if self.audio.is_recording() {
                    self.stop_recording().await;
                }
            }
            "tts_end" => {
                log::info!("TTS Ended, recording unlocked");
                self.processing = false;
            }
            "status" => {
                log::info!(
                    "Server status: {} {}",
                    msg.stage.as_deref().unwrap_or("-"),
                    msg.detail.as_deref().unwrap_or(""),
                );
            }
            other => {
                log::debug!("Unhandled message type: {}", other);
            }
        }
    }

    /// 按键（此处为标准输入的一行）切换录音状态
    pub async fn toggle_recording(&mut self) {
        if self.audio.is_recording() {
            self.stop_recording().await;
            return;
        }
        if self.processing {
            log::info!("Button ignored: processing in progress");
            return;
        }
        if !self.connected {
            log::warn!("Button ignored: not connected");
            return;
        }

        let audio = self.audio.clone();
        tokio::task::block_in_place(move || audio.start_recording());
        log::info!("=== RECORDING ===");
        self.send(ClientMessage::RecordStart).await;
    }

    async fn stop_recording(&mut self) {
        self.audio.stop_recording();
        log::info!("=== RECORDING STOPPED ===");
        self.send(ClientMessage::RecordStop).await;
    }

    async fn send(&self, msg: ClientMessage) {
        if let Err(e) = self.net_tx.send(NetCommand::SendText(msg.to_json())).await {
            log::error!("Failed to send {:?}: {}", msg, e);
        }
    }
}
