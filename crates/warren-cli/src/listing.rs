//! Entity listings and the "current list" used to resolve numeric shortcuts.

use std::io::{self, Write};

use serde::Deserialize;

use crate::client::escape_segment;
use crate::structure::index_width;

/// Entity categories exposed by the management API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntityKind {
    Node,
    Connection,
    Channel,
    Exchange,
    Queue,
    Vhost,
    User,
}

impl EntityKind {
    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Connection => "connection",
            Self::Channel => "channel",
            Self::Exchange => "exchange",
            Self::Queue => "queue",
            Self::Vhost => "vhost",
            Self::User => "user",
        }
    }

    /// Exchanges and queues live inside a vhost; everything else is global.
    pub(crate) const fn is_vhost_scoped(self) -> bool {
        matches!(self, Self::Exchange | Self::Queue)
    }

    fn collection(self) -> String {
        format!("{}s", self.name())
    }
}

/// One row of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct Entry {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) vhost: Option<String>,
}

/// Path and column selection for listing `kind`, scoped to `vhost` when given.
pub(crate) fn collection_request(kind: EntityKind, vhost: Option<&str>) -> (String, &'static str) {
    match vhost {
        Some(vhost) => (
            format!("{}/{}", kind.collection(), escape_segment(vhost)),
            "columns=name,vhost",
        ),
        None => (kind.collection(), "columns=name"),
    }
}

/// The most recent successful listing.
#[derive(Debug, Clone)]
pub(crate) struct ListContext {
    kind: EntityKind,
    entries: Vec<Entry>,
}

impl ListContext {
    pub(crate) const fn new(kind: EntityKind, entries: Vec<Entry>) -> Self {
        Self { kind, entries }
    }

    pub(crate) const fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Look up a zero-based index typed by the user.
    pub(crate) fn resolve(&self, index: i64) -> Option<&Entry> {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.entries.get(index))
    }

    /// Detail path for `entry`: `<kind>s[/<vhost>]/<name>`, segments escaped.
    pub(crate) fn detail_path(&self, entry: &Entry) -> String {
        let mut path = self.kind.collection();
        if let Some(vhost) = entry.vhost.as_deref().filter(|vhost| !vhost.is_empty()) {
            path.push('/');
            path.push_str(&escape_segment(vhost));
        }
        path.push('/');
        path.push_str(&escape_segment(&entry.name));
        path
    }

    pub(crate) fn title(&self, entry: &Entry) -> String {
        format!("{} {}", self.kind.name(), entry.name)
    }

    /// Print every entry behind a zero-padded index.
    pub(crate) fn render(&self, out: &mut dyn Write) -> io::Result<()> {
        if self.entries.is_empty() {
            return writeln!(out, "(none)");
        }
        let width = index_width(self.entries.len()).max(1);
        for (index, entry) in self.entries.iter().enumerate() {
            writeln!(out, "{index:0width$}: {}", entry.name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, vhost: Option<&str>) -> Entry {
        Entry {
            name: name.to_string(),
            vhost: vhost.map(str::to_string),
        }
    }

    fn rendered(list: &ListContext) -> String {
        let mut out = Vec::new();
        list.render(&mut out).expect("render to buffer");
        String::from_utf8(out).expect("utf8 output")
    }

    #[test]
    fn entries_decode_with_and_without_vhost() {
        let entries: Vec<Entry> =
            serde_json::from_str(r#"[{"name": "jobs", "vhost": "/"}, {"name": "rabbit@a"}]"#)
                .expect("valid payload");
        assert_eq!(entries[0], entry("jobs", Some("/")));
        assert_eq!(entries[1], entry("rabbit@a", None));
    }

    #[test]
    fn collection_request_scopes_by_vhost() {
        assert_eq!(
            collection_request(EntityKind::Queue, Some("/")),
            ("queues/%2f".to_string(), "columns=name,vhost")
        );
        assert_eq!(
            collection_request(EntityKind::Node, None),
            ("nodes".to_string(), "columns=name")
        );
    }

    #[test]
    fn twelve_entries_use_two_digit_indices() {
        let entries = (0..12).map(|i| entry(&format!("q{i}"), None)).collect();
        let text = rendered(&ListContext::new(EntityKind::Queue, entries));
        assert!(text.starts_with("00: q0\n"));
        assert!(text.contains("\n09: q9\n"));
        assert!(text.ends_with("11: q11\n"));
    }

    #[test]
    fn single_entry_uses_one_digit_index() {
        let list = ListContext::new(EntityKind::User, vec![entry("guest", None)]);
        assert_eq!(rendered(&list), "0: guest\n");
    }

    #[test]
    fn empty_listing_says_so() {
        let list = ListContext::new(EntityKind::Channel, Vec::new());
        assert_eq!(rendered(&list), "(none)\n");
    }

    #[test]
    fn resolve_rejects_out_of_range_indices() {
        let list = ListContext::new(
            EntityKind::Queue,
            vec![entry("a", None), entry("b", None), entry("c", None)],
        );
        assert_eq!(list.resolve(2).map(|e| e.name.as_str()), Some("c"));
        assert!(list.resolve(3).is_none());
        assert!(list.resolve(5).is_none());
        assert!(list.resolve(-1).is_none());
    }

    #[test]
    fn detail_path_escapes_vhost_and_name() {
        let list = ListContext::new(EntityKind::Queue, Vec::new());
        assert_eq!(
            list.detail_path(&entry("my queue/1", Some("/"))),
            "queues/%2f/my%20queue%2f1"
        );

        let nodes = ListContext::new(EntityKind::Node, Vec::new());
        assert_eq!(
            nodes.detail_path(&entry("rabbit@host", Some(""))),
            "nodes/rabbit%40host"
        );
        assert_eq!(nodes.title(&entry("rabbit@host", None)), "node rabbit@host");
    }
}
