//! Drive filter construction for name searches

use serde::{Deserialize, Serialize};

use crate::providers::{DriveQuery, ItemType, QueryScope, ROOT_ID};

/// Ids longer than this are folders rather than drives and are never
/// searched recursively
pub const MAX_DRIVE_ID_LEN: usize = 23;

/// How a search term is matched against each root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Match the whole name exactly instead of word by word
    pub exact: bool,
    /// Stop at the first root with results
    pub no_multi: bool,
    /// Search the whole drive instead of the root's direct children
    pub recursive: bool,
    /// Only applies to word matching
    pub item_type: ItemType,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            exact: false,
            no_multi: false,
            recursive: true,
            item_type: ItemType::Both,
        }
    }
}

/// Escape a term for use inside a quoted Drive query literal
pub fn escape_term(term: &str) -> String {
    term.trim()
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('"', "\\\"")
}

/// Whether `root_id` is searched recursively under `options`
pub fn is_recursive(root_id: &str, options: &SearchOptions) -> bool {
    options.recursive && root_id.len() <= MAX_DRIVE_ID_LEN
}

/// Build the `files.list` request for one root; `term` must already be escaped
pub fn build_query(root_id: &str, term: &str, options: &SearchOptions) -> DriveQuery {
    let recursive = is_recursive(root_id, options);

    let mut filter = String::new();
    if !recursive {
        filter.push_str(&format!("'{}' in parents and ", root_id));
    }
    if options.exact {
        filter.push_str(&format!("name = '{}' and ", term));
    } else {
        for word in term.split_whitespace() {
            filter.push_str(&format!("name contains '{}' and ", word));
        }
        if let Some(clause) = options.item_type.mime_clause() {
            filter.push_str(&clause);
        }
    }
    filter.push_str("trashed = false");

    let scope = if !recursive {
        QueryScope::AllDrives
    } else if root_id == ROOT_ID {
        filter.push_str(" and 'me' in owners");
        QueryScope::MyDrive
    } else {
        QueryScope::SharedDrive(root_id.to_string())
    };

    DriveQuery { filter, scope }
}
