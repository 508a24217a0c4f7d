//! Pure message rendering.
//!
//! Formatting is deterministic over its inputs and performs no I/O.
//! Notification bodies use a small HTML subset (the transport is told
//! via [`FormatHint::Html`]); direct messages are plain text.

use crate::dispatch::FormatHint;
use crate::event::{NotifyRow, PmRow};
use crate::notify_types::{self, NotifyKindConfig};
use crate::store::{ActorProfile, FieldInfo};

/// A rendered message body plus its format hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    /// Message body, possibly containing HTML spans.
    pub text: String,
    /// How the transport should interpret the body.
    pub hint: FormatHint,
}

/// Escapes the five HTML-significant characters in user-provided text.
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Builds the target URL for a notification.
///
/// The template's trailing slash, if any, is stripped before the
/// subject id is appended; the anchor fragment is only added when the
/// event references a concrete post.
fn build_url(cfg: &NotifyKindConfig, rid: u64, related_id: u64) -> String {
    let base = cfg.url.trim_end_matches('/');
    let mut url = format!("{base}/{rid}");
    if related_id != 0 {
        url.push_str(cfg.anchor);
        url.push_str(&related_id.to_string());
    }
    url
}

/// Renders a notification event, or `None` for unknown kinds.
///
/// Kinds with a non-empty suffix wrap the escaped title in bold between
/// prefix and suffix; kinds without one (friend requests) append the
/// prefix directly after the actor name.
#[must_use]
pub fn render_notification(
    row: &NotifyRow,
    actor: &ActorProfile,
    field: &FieldInfo,
) -> Option<RenderedMessage> {
    let cfg = notify_types::for_kind(row.nt_type)?;
    let nickname = escape_html(&actor.nickname);
    let url = build_url(cfg, field.rid, row.nt_related_id);

    let text = if cfg.suffix.is_empty() {
        format!("<code>{nickname}</code>{prefix}\n\n{url}", prefix = cfg.prefix)
    } else {
        format!(
            "<code>{nickname}</code> {prefix} <b>{title}</b> {suffix}\n\n{url}",
            prefix = cfg.prefix,
            title = escape_html(&field.title),
            suffix = cfg.suffix,
        )
    };

    Some(RenderedMessage {
        text,
        hint: FormatHint::Html,
    })
}

/// Renders the fixed new-direct-message text.
#[must_use]
pub fn render_direct_message(row: &PmRow) -> RenderedMessage {
    RenderedMessage {
        text: format!("你有一条来自 {} 的新私信", row.msg_sid),
        hint: FormatHint::Plain,
    }
}
