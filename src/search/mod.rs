//! Multi-drive search
//!
//! Runs one name query per configured root, in order, and renders the
//! matches as HTML into byte-capped pages. A failing root is logged and
//! contributes nothing; the search carries on with the next one.

pub mod pages;
pub mod query;

pub use pages::{PageBuffer, SearchResults, PAGE_BYTE_LIMIT};
pub use query::{build_query, escape_term, is_recursive, SearchOptions, MAX_DRIVE_ID_LEN};

use tracing::{error, info};

use crate::credential_store::CredentialSource;
use crate::format::{readable_size, strip_angle_brackets};
use crate::picker::PERSONAL_PREFIX;
use crate::providers::{DriveEntry, DriveService, EntryKind, SearchRoot};
use crate::user_data::UserDataStore;

const FOLDER_URL: &str = "https://drive.google.com/drive/folders/";
const DOWNLOAD_URL: &str = "https://drive.google.com/uc?id=";

/// Roots and credential a user's search runs with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPlan {
    pub credential: CredentialSource,
    pub roots: Vec<SearchRoot>,
}

impl SearchPlan {
    /// A personal (`mtp:`) default destination searches only that folder
    /// with the user's own token; anything else searches the configured roots
    pub async fn for_user(
        user_id: i64,
        store: &dyn UserDataStore,
        configured: &[SearchRoot],
    ) -> Self {
        let destination = store.default_destination(user_id).await;
        match destination.as_deref().and_then(|id| id.strip_prefix(PERSONAL_PREFIX)) {
            Some(id) => {
                let index_url = store.index_url(user_id).await;
                Self {
                    credential: CredentialSource::User(user_id),
                    roots: vec![SearchRoot::new("User Choice", id, index_url.as_deref())],
                }
            }
            None => Self {
                credential: CredentialSource::Owner,
                roots: configured.to_vec(),
            },
        }
    }
}

pub struct DriveSearch {
    options: SearchOptions,
}

impl DriveSearch {
    pub fn new(options: SearchOptions) -> Self {
        Self { options }
    }

    /// Search every root for `term`
    pub async fn drive_list(
        &self,
        service: &dyn DriveService,
        roots: &[SearchRoot],
        term: &str,
    ) -> SearchResults {
        let term = escape_term(term);
        let mut buffer = PageBuffer::new();
        let mut titled = false;

        for root in roots {
            let query = build_query(&root.id, &term, &self.options);
            let entries = match service.query(&query).await {
                Ok(entries) => entries,
                Err(e) => {
                    error!("{}", strip_angle_brackets(&e.to_string()));
                    Vec::new()
                }
            };

            if entries.is_empty() {
                if self.options.no_multi {
                    break;
                }
                continue;
            }

            if !titled {
                buffer.push_str(&format!("<h4>Search Result For {}</h4>", term));
                titled = true;
            }
            if !root.name.is_empty() {
                buffer.push_str(&format!(
                    "╾────────────╼<br><b>{}</b><br>╾────────────╼<br>",
                    root.name
                ));
            }
            for entry in &entries {
                buffer.push_entry(&render_entry(entry, root.index_url.as_deref()));
            }

            if self.options.no_multi {
                break;
            }
        }

        let results = buffer.finish();
        info!(
            "Search for {} matched {} entries across {} pages",
            term,
            results.count,
            results.pages.len()
        );
        results
    }
}

fn index_links(out: &mut String, index_url: Option<&str>, entry: &DriveEntry, viewable: bool) {
    let Some(index) = index_url else {
        return;
    };
    let url = format!("{}findpath?id={}", index, entry.id);
    out.push_str(&format!(" <b>| <a href=\"{}\">Index Link</a></b>", url));
    if viewable {
        out.push_str(&format!(" <b>| <a href=\"{}&?a=view\">View Link</a></b>", url));
    }
}

/// One search hit as HTML, terminated by a blank line
pub fn render_entry(entry: &DriveEntry, index_url: Option<&str>) -> String {
    let mut out = String::new();
    match entry.kind() {
        EntryKind::Folder => {
            out.push_str(&format!("📁 <code>{}<br>(folder)</code><br>", entry.name));
            out.push_str(&format!("<b><a href={}{}>Drive Link</a></b>", FOLDER_URL, entry.id));
            index_links(&mut out, index_url, entry, false);
        }
        EntryKind::Shortcut => {
            out.push_str(&format!(
                "⁍<a href='{}{}'>{}</a> (shortcut)",
                FOLDER_URL, entry.id, entry.name
            ));
        }
        EntryKind::File => {
            out.push_str(&format!(
                "📄 <code>{}<br>({})</code><br>",
                entry.name,
                readable_size(entry.size.unwrap_or(0))
            ));
            out.push_str(&format!(
                "<b><a href={}{}&export=download>Drive Link</a></b>",
                DOWNLOAD_URL, entry.id
            ));
            index_links(&mut out, index_url, entry, entry.is_viewable_media());
        }
    }
    out.push_str("<br><br>");
    out
}
