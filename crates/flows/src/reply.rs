//! Outgoing replies and menu construction.
//!
//! A reply is plain text plus an optional button menu; the transport
//! renders the menu however the chat network likes. All menus used by the
//! engine are built here so button labels and payloads stay in one place.

use serde::{Deserialize, Serialize};

use hostbot_core::intake::{ExtraKind, FlowKind};
use hostbot_core::target::TargetId;

use crate::event::Callback;

/// One outgoing chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu: Option<Menu>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply {
            text: text.into(),
            menu: None,
        }
    }

    pub fn with_menu(text: impl Into<String>, menu: Menu) -> Self {
        Reply {
            text: text.into(),
            menu: Some(menu),
        }
    }
}

/// Button grid attached to a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Menu {
    pub rows: Vec<Vec<Button>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub callback: String,
}

impl Button {
    pub(crate) fn new(label: impl Into<String>, callback: &Callback) -> Self {
        Button {
            label: label.into(),
            callback: callback.encode(),
        }
    }
}

/// Top-level action menu shown to idle users.
pub(crate) fn main_menu() -> Menu {
    Menu {
        rows: vec![
            vec![
                Button::new("Upload script", &Callback::StartFlow(FlowKind::Upload)),
                Button::new("Clone repository", &Callback::StartFlow(FlowKind::Clone)),
            ],
            vec![
                Button::new("Deploy link", &Callback::StartFlow(FlowKind::DeployLink)),
                Button::new("My apps", &Callback::ShowApps),
            ],
            vec![
                Button::new("Server stats", &Callback::ShowStats),
                Button::new("Help", &Callback::ShowHelp),
            ],
        ],
    }
}

/// Single cancel button, shown while a flow waits for input.
pub(crate) fn cancel_menu() -> Menu {
    Menu {
        rows: vec![vec![Button::new("Cancel", &Callback::Cancel)]],
    }
}

/// Extras-stage menu: attach sidecars, run, or bail out.
pub(crate) fn extras_menu() -> Menu {
    Menu {
        rows: vec![
            vec![
                Button::new(
                    "Add dependency file",
                    &Callback::AddExtra(ExtraKind::DependencyFile),
                ),
                Button::new("Add env file", &Callback::AddExtra(ExtraKind::EnvFile)),
            ],
            vec![Button::new("Run now", &Callback::RunNow)],
            vec![Button::new("Cancel", &Callback::Cancel)],
        ],
    }
}

/// One button per candidate entry file, plus cancel.
pub(crate) fn entry_choice_menu(choices: &[String]) -> Menu {
    let mut rows: Vec<Vec<Button>> = choices
        .iter()
        .enumerate()
        .map(|(index, path)| vec![Button::new(path, &Callback::PickEntry(index))])
        .collect();
    rows.push(vec![Button::new("Cancel", &Callback::Cancel)]);
    Menu { rows }
}

/// Per-target management menu.
pub(crate) fn manage_menu(target: &TargetId, running: bool) -> Menu {
    let first_row = if running {
        vec![
            Button::new("Stop", &Callback::StopTarget(target.clone())),
            Button::new("Status link", &Callback::ShowUrl(target.clone())),
        ]
    } else {
        vec![Button::new("Rerun", &Callback::RerunTarget(target.clone()))]
    };
    Menu {
        rows: vec![
            first_row,
            vec![
                Button::new("Logs", &Callback::ShowLogs(target.clone())),
                Button::new("Delete", &Callback::DeleteTarget(target.clone())),
            ],
            vec![Button::new("My apps", &Callback::ShowApps)],
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payloads(menu: &Menu) -> Vec<String> {
        menu.rows
            .iter()
            .flatten()
            .map(|b| b.callback.clone())
            .collect()
    }

    #[test]
    fn every_main_menu_button_parses() {
        for payload in payloads(&main_menu()) {
            assert!(Callback::parse(&payload).is_some(), "bad payload {payload}");
        }
    }

    #[test]
    fn entry_menu_indexes_choices_in_order() {
        let menu = entry_choice_menu(&["main.py".to_string(), "sub/tool.py".to_string()]);
        assert_eq!(
            payloads(&menu),
            vec!["pick:0", "pick:1", "cancel"]
        );
        assert_eq!(menu.rows[1][0].label, "sub/tool.py");
    }

    #[test]
    fn manage_menu_depends_on_running_state() {
        let target = TargetId::file("bot.py");
        let running = payloads(&manage_menu(&target, true));
        assert!(running.contains(&"stop:bot.py".to_string()));
        assert!(!running.iter().any(|p| p.starts_with("rerun:")));

        let stopped = payloads(&manage_menu(&target, false));
        assert!(stopped.contains(&"rerun:bot.py".to_string()));
        assert!(!stopped.iter().any(|p| p.starts_with("stop:")));
    }

    #[test]
    fn menu_serialization_shape() {
        let reply = Reply::with_menu("Pick:", cancel_menu());
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["text"], "Pick:");
        assert_eq!(json["menu"]["rows"][0][0]["label"], "Cancel");
        assert_eq!(json["menu"]["rows"][0][0]["callback"], "cancel");

        let bare = serde_json::to_value(Reply::text("hi")).unwrap();
        assert!(bare.get("menu").is_none());
    }
}
