//! Interactive dialog definitions.
//!
//! An integration that received a trigger id may answer by asking the server
//! to open a dialog. The server relays the definition to the user's client,
//! which renders it as a form and submits the result to `url`.

use serde::{Deserialize, Serialize};

/// Request to open a dialog in the client that fired an action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenDialogRequest {
    /// Signed trigger id received in the action request.
    pub trigger_id: String,
    /// Where the client submits the completed dialog.
    pub url: String,
    pub dialog: Dialog,
}

/// A form rendered client-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dialog {
    pub callback_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub introduction_text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub icon_url: String,
    pub elements: Vec<DialogElement>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub submit_label: String,
    pub notify_on_cancel: bool,
    /// Opaque state echoed back on submission.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub state: String,
}

/// A single input in a dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogElement {
    pub display_name: String,
    pub name: String,
    /// `text`, `textarea`, `select`, `bool` or `radio`.
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subtype: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub default: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub placeholder: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub help_text: String,
    pub optional: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub data_source: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<DialogOption>,
}

/// A choice in a `select` or `radio` element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogOption {
    pub text: String,
    pub value: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_open_dialog_request_parses() {
        let request: OpenDialogRequest = serde_json::from_str(
            r#"{
                "trigger_id": "abc",
                "url": "http://localhost/plugins/foo/submit",
                "dialog": {
                    "callback_id": "cb",
                    "title": "Survey",
                    "elements": [
                        {"display_name": "Name", "name": "name", "type": "text"},
                        {"display_name": "Pick", "name": "pick", "type": "select",
                         "options": [{"text": "A", "value": "a"}]}
                    ]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(request.trigger_id, "abc");
        assert_eq!(request.dialog.elements.len(), 2);
        assert_eq!(request.dialog.elements.get(1).unwrap().options.len(), 1);
        assert!(!request.dialog.notify_on_cancel);
    }
}
