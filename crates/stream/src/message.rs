use serde::{de, Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

/// Discriminators decoded into their own variants.
const KNOWN_TYPES: [&str; 5] = ["log", "output_chunk", "data", "keep_alive", "done"];

/// One record of an NDJSON job stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(remote = "Self", tag = "type", rename_all = "snake_case")]
pub enum Message {
    Log {
        #[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
        time: Option<OffsetDateTime>,
        #[serde(default)]
        level: LogLevel,
        #[serde(default)]
        message: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tags: Vec<String>,
    },
    OutputChunk {
        #[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
        time: Option<OffsetDateTime>,
        #[serde(default)]
        message: String,
    },
    Data {
        #[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
        time: Option<OffsetDateTime>,
        #[serde(default)]
        key: String,
        #[serde(default)]
        data: serde_json::Value,
    },
    KeepAlive {
        #[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
        time: Option<OffsetDateTime>,
    },
    Done {
        #[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
        time: Option<OffsetDateTime>,
    },
    /// A type this client does not know, with its discriminator.
    #[serde(skip)]
    Unknown { kind: String },
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| de::Error::missing_field("type"))?;
        if !KNOWN_TYPES.contains(&kind) {
            return Ok(Message::Unknown {
                kind: kind.to_owned(),
            });
        }
        Message::deserialize(value).map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl Message {
    pub fn is_keep_alive(&self) -> bool {
        matches!(self, Message::KeepAlive { .. })
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Message::Done { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_each_variant() {
        let log: Message = serde_json::from_str(
            r#"{"type":"log","time":"2024-05-01T10:00:00Z","level":"warn","message":"careful","tags":["spin"]}"#,
        )
        .unwrap();
        match log {
            Message::Log {
                time,
                level,
                message,
                tags,
            } => {
                assert_eq!(time.map(|t| t.unix_timestamp()), Some(1_714_557_600));
                assert_eq!(level, LogLevel::Warn);
                assert_eq!(message, "careful");
                assert_eq!(tags, vec!["spin"]);
            }
            other => panic!("unexpected {other:?}"),
        }

        let data: Message =
            serde_json::from_str(r#"{"type":"data","key":"output","data":{"valid":true}}"#)
                .unwrap();
        assert_eq!(
            data,
            Message::Data {
                time: None,
                key: "output".into(),
                data: serde_json::json!({"valid": true}),
            }
        );

        let chunk: Message =
            serde_json::from_str(r#"{"type":"output_chunk","message":"abc"}"#).unwrap();
        assert!(matches!(chunk, Message::OutputChunk { message, .. } if message == "abc"));

        assert!(serde_json::from_str::<Message>(r#"{"type":"keep_alive"}"#)
            .unwrap()
            .is_keep_alive());
        assert!(serde_json::from_str::<Message>(r#"{"type":"done"}"#)
            .unwrap()
            .is_done());
    }

    #[test]
    fn log_level_defaults_to_info() {
        let log: Message = serde_json::from_str(r#"{"type":"log","message":"hi"}"#).unwrap();
        assert!(matches!(log, Message::Log { level: LogLevel::Info, .. }));
    }

    #[test]
    fn unknown_type_is_tolerated() {
        let msg: Message = serde_json::from_str(r#"{"type":"progress","percent":5}"#).unwrap();
        assert_eq!(
            msg,
            Message::Unknown {
                kind: "progress".into()
            }
        );
    }

    #[test]
    fn missing_type_is_an_error() {
        assert!(serde_json::from_str::<Message>(r#"{"message":"hi"}"#).is_err());
        assert!(serde_json::from_str::<Message>(r#"{"type":7}"#).is_err());
    }

    #[test]
    fn known_type_with_bad_fields_is_an_error() {
        assert!(serde_json::from_str::<Message>(r#"{"type":"log","level":"loud"}"#).is_err());
    }
}
