//! Incoming chat events and the button-payload grammar.
//!
//! The chat transport delivers each user interaction as one [`ChatEvent`]:
//! free text or a command, an uploaded document, or the payload of a
//! previously rendered button. Payloads are compact `action[:argument]`
//! strings; [`Callback`] is the typed view of that grammar, and
//! [`Callback::encode`] is the only place payloads are produced, so the
//! grammar cannot drift between rendering and parsing.

use serde::{Deserialize, Serialize};

use hostbot_core::intake::{ExtraKind, FlowKind};
use hostbot_core::target::TargetId;
use hostbot_core::types::UserId;

/// One user interaction, as posted by the chat transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEvent {
    pub user_id: UserId,
    /// Free text or a `/command`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// An uploaded file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentUpload>,
    /// Payload of a pressed button.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<String>,
}

impl ChatEvent {
    pub fn text(user_id: UserId, text: impl Into<String>) -> Self {
        ChatEvent {
            user_id,
            text: Some(text.into()),
            document: None,
            callback: None,
        }
    }

    pub fn document(user_id: UserId, file_name: impl Into<String>, content: Vec<u8>) -> Self {
        ChatEvent {
            user_id,
            text: None,
            document: Some(DocumentUpload {
                file_name: file_name.into(),
                content,
            }),
            callback: None,
        }
    }

    pub fn callback(user_id: UserId, callback: &Callback) -> Self {
        ChatEvent {
            user_id,
            text: None,
            document: None,
            callback: Some(callback.encode()),
        }
    }
}

/// File attached to a chat event. The transport ships the bytes base64
/// encoded in a `content_base64` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentUpload {
    pub file_name: String,
    #[serde(rename = "content_base64", with = "base64_bytes")]
    pub content: Vec<u8>,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Typed button payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Callback {
    StartFlow(FlowKind),
    ShowApps,
    ShowStats,
    ShowHelp,
    Cancel,
    /// Announce a sidecar upload during the extras stage.
    AddExtra(ExtraKind),
    /// Launch the claimed target and end the flow.
    RunNow,
    /// Choice index into the stored entry-file list.
    PickEntry(usize),
    Manage(TargetId),
    StopTarget(TargetId),
    RerunTarget(TargetId),
    ShowLogs(TargetId),
    ShowUrl(TargetId),
    DeleteTarget(TargetId),
}

impl Callback {
    /// Render the wire payload for this action.
    pub fn encode(&self) -> String {
        match self {
            Callback::StartFlow(FlowKind::Upload) => "flow:upload".to_string(),
            Callback::StartFlow(FlowKind::Clone) => "flow:clone".to_string(),
            Callback::StartFlow(FlowKind::DeployLink) => "flow:deploy".to_string(),
            Callback::ShowApps => "apps".to_string(),
            Callback::ShowStats => "stats".to_string(),
            Callback::ShowHelp => "help".to_string(),
            Callback::Cancel => "cancel".to_string(),
            Callback::AddExtra(ExtraKind::DependencyFile) => "extra:deps".to_string(),
            Callback::AddExtra(ExtraKind::EnvFile) => "extra:env".to_string(),
            Callback::RunNow => "run".to_string(),
            Callback::PickEntry(index) => format!("pick:{index}"),
            Callback::Manage(t) => format!("manage:{t}"),
            Callback::StopTarget(t) => format!("stop:{t}"),
            Callback::RerunTarget(t) => format!("rerun:{t}"),
            Callback::ShowLogs(t) => format!("logs:{t}"),
            Callback::ShowUrl(t) => format!("url:{t}"),
            Callback::DeleteTarget(t) => format!("delete:{t}"),
        }
    }

    /// Parse a wire payload. `None` means the payload is not part of the
    /// grammar (stale button from an old deployment, or garbage).
    pub fn parse(payload: &str) -> Option<Callback> {
        match payload {
            "apps" => return Some(Callback::ShowApps),
            "stats" => return Some(Callback::ShowStats),
            "help" => return Some(Callback::ShowHelp),
            "cancel" => return Some(Callback::Cancel),
            "run" => return Some(Callback::RunNow),
            _ => {}
        }
        let (action, arg) = payload.split_once(':')?;
        match action {
            "flow" => match arg {
                "upload" => Some(Callback::StartFlow(FlowKind::Upload)),
                "clone" => Some(Callback::StartFlow(FlowKind::Clone)),
                "deploy" => Some(Callback::StartFlow(FlowKind::DeployLink)),
                _ => None,
            },
            "extra" => match arg {
                "deps" => Some(Callback::AddExtra(ExtraKind::DependencyFile)),
                "env" => Some(Callback::AddExtra(ExtraKind::EnvFile)),
                _ => None,
            },
            "pick" => arg.parse().ok().map(Callback::PickEntry),
            "manage" => Some(Callback::Manage(TargetId::parse(arg))),
            "stop" => Some(Callback::StopTarget(TargetId::parse(arg))),
            "rerun" => Some(Callback::RerunTarget(TargetId::parse(arg))),
            "logs" => Some(Callback::ShowLogs(TargetId::parse(arg))),
            "url" => Some(Callback::ShowUrl(TargetId::parse(arg))),
            "delete" => Some(Callback::DeleteTarget(TargetId::parse(arg))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trip() {
        let cases = [
            Callback::StartFlow(FlowKind::Upload),
            Callback::StartFlow(FlowKind::Clone),
            Callback::StartFlow(FlowKind::DeployLink),
            Callback::ShowApps,
            Callback::ShowStats,
            Callback::ShowHelp,
            Callback::Cancel,
            Callback::AddExtra(ExtraKind::DependencyFile),
            Callback::AddExtra(ExtraKind::EnvFile),
            Callback::RunNow,
            Callback::PickEntry(7),
            Callback::Manage(TargetId::file("bot.py")),
            Callback::StopTarget(TargetId::repo_entry("tool", "src/main.py")),
            Callback::RerunTarget(TargetId::file("bot.py")),
            Callback::ShowLogs(TargetId::file("bot.py")),
            Callback::ShowUrl(TargetId::file("bot.py")),
            Callback::DeleteTarget(TargetId::file("bot.py")),
        ];
        for case in cases {
            assert_eq!(Callback::parse(&case.encode()), Some(case));
        }
    }

    #[test]
    fn target_ids_with_separators_survive() {
        let target = TargetId::repo_entry("tool", "a:b|c.py");
        let parsed = Callback::parse(&Callback::Manage(target.clone()).encode());
        assert_eq!(parsed, Some(Callback::Manage(target)));
    }

    #[test]
    fn unknown_payloads_rejected() {
        assert_eq!(Callback::parse(""), None);
        assert_eq!(Callback::parse("bogus"), None);
        assert_eq!(Callback::parse("flow:teleport"), None);
        assert_eq!(Callback::parse("pick:notanumber"), None);
        assert_eq!(Callback::parse("sel_py_old_style"), None);
    }

    #[test]
    fn document_content_is_base64_on_the_wire() {
        let event = ChatEvent::document(5, "bot.py", b"print(1)".to_vec());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["document"]["file_name"], "bot.py");
        assert_eq!(json["document"]["content_base64"], "cHJpbnQoMSk=");

        let parsed: ChatEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.document.unwrap().content, b"print(1)");
    }

    #[test]
    fn bad_base64_rejected() {
        let raw = r#"{"user_id":5,"document":{"file_name":"a.py","content_base64":"%%%"}}"#;
        assert!(serde_json::from_str::<ChatEvent>(raw).is_err());
    }
}
