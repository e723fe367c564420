//! Local-id helpers and sync-pixel templating (grounded on the teacher's
//! `core/usersync/utils.rs`).

use crate::cookiesync::constants::{LOCAL_ID_MACRO, LOCAL_ID_PREFIX};

pub fn generate_local_id() -> String {
    format!("{LOCAL_ID_PREFIX}{}", uuid::Uuid::new_v4())
}

pub fn validate_local_id(id: &str) -> bool {
    id.starts_with(LOCAL_ID_PREFIX) && id.len() > LOCAL_ID_PREFIX.len()
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;").replace('<', "&lt;").replace('>', "&gt;")
}

/// The pixel or iframe kind a bidder's sync URL expects to be rendered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    Pixel,
    Iframe,
}

/// Substitutes [`LOCAL_ID_MACRO`] in `sync_url` with `local_id` and wraps the
/// result in the markup the bidder's sync kind expects.
pub fn build_sync_pixel(sync_url: &str, local_id: &str, kind: SyncKind) -> String {
    let substituted = sync_url.replace(LOCAL_ID_MACRO, local_id);
    let escaped = html_escape(&substituted);
    match kind {
        SyncKind::Pixel => format!(r#"<img src="{escaped}" width="1" height="1" border="0" style="display:none">"#),
        SyncKind::Iframe => format!(r#"<iframe src="{escaped}" width="0" height="0" style="display:none"></iframe>"#),
    }
}

/// Builds the combined sync markup for a set of bidder sync URLs, used by
/// the iframe-based `/cookie_sync` redirect flow.
pub fn generate_sync_iframe_html(local_id: &str, syncs: &[(String, String, SyncKind)]) -> String {
    let body: String = syncs.iter().map(|(_, url, kind)| build_sync_pixel(url, local_id, *kind)).collect();
    format!("<!doctype html><html><body>{body}</body></html>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_carry_the_prefix_and_validate() {
        let id = generate_local_id();
        assert!(id.starts_with("rx-"));
        assert!(validate_local_id(&id));
    }

    #[test]
    fn bare_prefix_is_not_a_valid_id() {
        assert!(!validate_local_id("rx-"));
        assert!(!validate_local_id("not-prefixed"));
    }

    #[test]
    fn macro_is_substituted_and_output_is_escaped() {
        let markup = build_sync_pixel("https://bidder.example/sync?uid={RXID}&r=1", "rx-abc", SyncKind::Pixel);
        assert!(markup.contains("uid=rx-abc&amp;r=1"));
        assert!(markup.starts_with("<img"));
    }

    #[test]
    fn iframe_kind_wraps_in_iframe_tag() {
        let markup = build_sync_pixel("https://bidder.example/sync?uid={RXID}", "rx-abc", SyncKind::Iframe);
        assert!(markup.starts_with("<iframe"));
    }
}
