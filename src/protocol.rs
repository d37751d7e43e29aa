use serde::{Deserialize, Serialize};

/// 服务端下发的 JSON 信令
#[derive(Deserialize, Debug, Clone)]
pub struct ServerMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub text: Option<String>,
    /// status 消息的阶段 (thinking / tool_call / tool_result)
    pub stage: Option<String>,
    pub detail: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AudioParams {
    pub format: String,
    pub sample_rate: u32,
    pub channels: u8,
    pub frame_duration: u32,
}

/// 设备端上行的 JSON 信令
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Hello { audio: AudioParams },
    RecordStart,
    RecordStop,
}

impl ClientMessage {
    pub fn to_json(&self) -> String {
        // 所有字段都是简单类型，序列化不会失败
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_messages_wire_format() {
        let hello = ClientMessage::Hello {
            audio: AudioParams {
                format: "opus".into(),
                sample_rate: 16000,
                channels: 1,
                frame_duration: 60,
            },
        };
        assert_eq!(
            hello.to_json(),
            r#"{"type":"hello","audio":{"format":"opus","sample_rate":16000,"channels":1,"frame_duration":60}}"#
        );
        assert_eq!(ClientMessage::RecordStart.to_json(), r#"{"type":"record_start"}"#);
        assert_eq!(ClientMessage::RecordStop.to_json(), r#"{"type":"record_stop"}"#);
    }

    #[test]
    fn test_server_message_parsing() {
        let msg: ServerMessage = serde_json::from_str(r#"{"type":"stt","text":"hello"}"#).unwrap();
        assert_eq!(msg.msg_type, "stt");
        assert_eq!(msg.text.as_deref(), Some("hello"));

        let msg: ServerMessage =
            serde_json::from_str(r#"{"type":"status","stage":"thinking","detail":"..."}"#).unwrap();
        assert_eq!(msg.stage.as_deref(), Some("thinking"));

        let msg: ServerMessage = serde_json::from_str(r#"{"type":"tts_end"}"#).unwrap();
        assert!(msg.text.is_none());
    }
}
