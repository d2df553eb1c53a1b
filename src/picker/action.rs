//! Picker callback actions
//!
//! Payloads are whitespace-delimited: the `gdq` namespace tag, an action
//! name, then action-specific arguments. Encoding and decoding live
//! together so button payloads always round-trip.

use std::fmt;
use thiserror::Error;

use crate::chat::CALLBACK_NAMESPACE;
use crate::providers::ItemType;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionParseError {
    #[error("Not a picker payload: {0}")]
    WrongNamespace(String),
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("Missing argument for {0}")]
    MissingArgument(&'static str),
    #[error("Invalid argument for {action}: {value}")]
    InvalidArgument { action: &'static str, value: String },
}

/// Kind of entry a selection button points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectKind {
    Folder,
    File,
}

impl SelectKind {
    fn tag(&self) -> &'static str {
        match self {
            SelectKind::Folder => "fo",
            SelectKind::File => "fi",
        }
    }
}

/// Every action a picker button can trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerAction {
    Cancel,
    PagePrev,
    PageNext,
    /// Back from the drive list to the credential menu
    BackToDrives,
    /// Back one folder (or to the drive list from a drive root)
    BackToParent,
    ChooseDrive(usize),
    Select { kind: SelectKind, index: usize },
    SetPageStep(usize),
    JumpToRoot,
    SetItemType(ItemType),
    ConfirmCurrent,
    SetAsDefault,
    UseOwnerCredential,
    UseUserCredential,
}

fn parse_index(action: &'static str, value: Option<&str>) -> Result<usize, ActionParseError> {
    let value = value.ok_or(ActionParseError::MissingArgument(action))?;
    value.parse().map_err(|_| ActionParseError::InvalidArgument {
        action,
        value: value.to_string(),
    })
}

impl PickerAction {
    pub fn decode(data: &str) -> Result<Self, ActionParseError> {
        let mut tokens = data.split_whitespace();
        if tokens.next() != Some(CALLBACK_NAMESPACE) {
            return Err(ActionParseError::WrongNamespace(data.to_string()));
        }
        let name = tokens.next().ok_or(ActionParseError::MissingArgument("action"))?;

        let action = match name {
            "cancel" => PickerAction::Cancel,
            "pre" => PickerAction::PagePrev,
            "nex" => PickerAction::PageNext,
            "back" => match tokens.next() {
                Some("dr") => PickerAction::BackToDrives,
                Some("pa") => PickerAction::BackToParent,
                Some(other) => {
                    return Err(ActionParseError::InvalidArgument {
                        action: "back",
                        value: other.to_string(),
                    })
                }
                None => return Err(ActionParseError::MissingArgument("back")),
            },
            "dr" => PickerAction::ChooseDrive(parse_index("dr", tokens.next())?),
            "pa" => {
                let kind = match tokens.next() {
                    Some("fo") => SelectKind::Folder,
                    Some("fi") => SelectKind::File,
                    Some(other) => {
                        return Err(ActionParseError::InvalidArgument {
                            action: "pa",
                            value: other.to_string(),
                        })
                    }
                    None => return Err(ActionParseError::MissingArgument("pa")),
                };
                PickerAction::Select {
                    kind,
                    index: parse_index("pa", tokens.next())?,
                }
            }
            "ps" => {
                let step = parse_index("ps", tokens.next())?;
                if step == 0 {
                    return Err(ActionParseError::InvalidArgument {
                        action: "ps",
                        value: "0".to_string(),
                    });
                }
                PickerAction::SetPageStep(step)
            }
            "root" => PickerAction::JumpToRoot,
            "itype" => {
                let value = tokens.next().ok_or(ActionParseError::MissingArgument("itype"))?;
                let item_type = value.parse().map_err(|_| ActionParseError::InvalidArgument {
                    action: "itype",
                    value: value.to_string(),
                })?;
                PickerAction::SetItemType(item_type)
            }
            "cur" => PickerAction::ConfirmCurrent,
            "def" => PickerAction::SetAsDefault,
            "owner" => PickerAction::UseOwnerCredential,
            "user" => PickerAction::UseUserCredential,
            other => return Err(ActionParseError::UnknownAction(other.to_string())),
        };
        Ok(action)
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PickerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", CALLBACK_NAMESPACE)?;
        match self {
            PickerAction::Cancel => write!(f, "cancel"),
            PickerAction::PagePrev => write!(f, "pre"),
            PickerAction::PageNext => write!(f, "nex"),
            PickerAction::BackToDrives => write!(f, "back dr"),
            PickerAction::BackToParent => write!(f, "back pa"),
            PickerAction::ChooseDrive(i) => write!(f, "dr {}", i),
            PickerAction::Select { kind, index } => write!(f, "pa {} {}", kind.tag(), index),
            PickerAction::SetPageStep(n) => write!(f, "ps {}", n),
            PickerAction::JumpToRoot => write!(f, "root"),
            PickerAction::SetItemType(t) => write!(f, "itype {}", t),
            PickerAction::ConfirmCurrent => write!(f, "cur"),
            PickerAction::SetAsDefault => write!(f, "def"),
            PickerAction::UseOwnerCredential => write!(f, "owner"),
            PickerAction::UseUserCredential => write!(f, "user"),
        }
    }
}
