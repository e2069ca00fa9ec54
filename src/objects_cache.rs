//! Enrichment loaded from the monitoring core's object cache.
//!
//! The core writes its resolved configuration as `define <type> {` blocks of
//! `key<whitespace>value` lines closed by `}`. Only host and service blocks are
//! read, and only their `notes` and `icon_image` attributes are kept.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, info};

use crate::diag::bounded_line;
use crate::enrichment::{EnrichmentRecord, InMemoryEnrichment};
use crate::entity::EntityKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Host,
    Service,
    Ignored,
}

#[derive(Debug, Default)]
struct Block {
    host_name: Option<String>,
    service_description: Option<String>,
    record: EnrichmentRecord,
}

impl Block {
    fn set(&mut self, key: &str, value: &str) {
        let slot = match key {
            "host_name" => &mut self.host_name,
            "service_description" => &mut self.service_description,
            "notes" => &mut self.record.notes,
            "icon_image" => &mut self.record.icon_image,
            _ => return,
        };
        *slot = Some(value.to_string());
    }

    fn finish(self, kind: BlockKind) -> Option<(EntityKey, EnrichmentRecord)> {
        if self.record.is_empty() {
            return None;
        }
        let host_name = self.host_name.filter(|h| !h.is_empty())?;
        let key = match kind {
            BlockKind::Host => EntityKey::host(host_name),
            BlockKind::Service => {
                let svc = self.service_description.filter(|s| !s.is_empty())?;
                EntityKey::service(host_name, svc)
            }
            BlockKind::Ignored => return None,
        };
        Some((key, self.record))
    }
}

/// Parse object cache text into an enrichment table.
///
/// Unknown block types, unknown attributes, comments and malformed lines are
/// skipped. Entities without notes or icon image are left out.
#[must_use]
pub fn parse(text: &str) -> HashMap<EntityKey, EnrichmentRecord> {
    let mut table = HashMap::new();
    let mut current: Option<(BlockKind, Block)> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(rest) = line.strip_prefix("define") {
            let kind = match rest.trim().trim_end_matches('{').trim() {
                "host" => BlockKind::Host,
                "service" => BlockKind::Service,
                _ => BlockKind::Ignored,
            };
            current = Some((kind, Block::default()));
            continue;
        }

        if line == "}" {
            if let Some((kind, block)) = current.take() {
                if let Some((key, record)) = block.finish(kind) {
                    table.insert(key, record);
                }
            }
            continue;
        }

        let Some((kind, block)) = current.as_mut() else {
            continue;
        };
        if *kind == BlockKind::Ignored {
            continue;
        }
        let (key, value) = match line.split_once(|c: char| c.is_whitespace()) {
            Some((k, v)) => (k, v.trim()),
            None => (line, ""),
        };
        block.set(key, value);
    }

    if current.is_some() {
        debug!("object cache ends inside an unterminated block");
    }

    table
}

/// Read an object cache file into an [`InMemoryEnrichment`].
pub fn load(path: impl AsRef<Path>) -> io::Result<InMemoryEnrichment> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let table = parse(&text);
    let msg = format!("loaded enrichment for {} entities from {}", table.len(), path.display());
    info!("{}", bounded_line(&msg));
    Ok(table.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::EnrichmentLookup;

    const SAMPLE: &str = "\
########################################
#       NAGIOS OBJECT CACHE FILE
########################################

define timeperiod {
\ttimeperiod_name\t24x7
\tnotes\tnot an entity
\t}

define host {
\thost_name\tweb01
\talias\tWeb server
\tnotes\tRack 4, row B
\ticon_image\tserver.png
\t}

define host {
\thost_name\tdb01
\tnotes\t
\t}

define service {
\thost_name\tweb01
\tservice_description\tHTTP
\ticon_image\thttp.png
\t}

define service {
\thost_name\tweb01
\tservice_description\tSSH
\t}
";

    #[test]
    fn test_parse_host_and_service_blocks() {
        let table = parse(SAMPLE);
        assert_eq!(table.len(), 2);

        let web = &table[&EntityKey::host("web01")];
        assert_eq!(web.notes(), Some("Rack 4, row B"));
        assert_eq!(web.icon_image(), Some("server.png"));

        let http = &table[&EntityKey::service("web01", "HTTP")];
        assert_eq!(http.notes(), None);
        assert_eq!(http.icon_image(), Some("http.png"));
    }

    #[test]
    fn test_entities_without_metadata_are_skipped() {
        let table = parse(SAMPLE);
        assert!(!table.contains_key(&EntityKey::host("db01")));
        assert!(!table.contains_key(&EntityKey::service("web01", "SSH")));
    }

    #[test]
    fn test_unterminated_block_is_dropped() {
        let table = parse("define host {\n host_name x\n notes y\n");
        assert!(table.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.cache");
        fs::write(&path, SAMPLE).unwrap();

        let lookup = load(&path).unwrap();
        assert_eq!(lookup.len(), 2);
        assert!(lookup.lookup(&EntityKey::host("web01")).is_some());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(dir.path().join("absent.cache")).is_err());
    }
}
