//! Line-delimited JSON event feed.
//!
//! One event per line:
//!
//! ```text
//! {"callback":"host_check","phase":"processed","data":{"host_name":"web01","timestamp":1700000000,"state":1}}
//! ```
//!
//! A line whose envelope cannot be read is skipped. A line whose `data` cannot
//! be read becomes an event without payload, which the gate ignores as
//! malformed.

use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::diag::bounded_line;
use crate::event::{BrokerEvent, CallbackKind, CheckEvent, CheckPhase};

use super::ChannelSender;

#[derive(Deserialize)]
struct Envelope {
    callback: CallbackKind,
    phase: CheckPhase,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// Decode one line. Blank lines yield `Ok(None)`.
pub fn decode_line(line: &str) -> serde_json::Result<Option<BrokerEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let env: Envelope = serde_json::from_str(line)?;
    let data = match env.data {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => match serde_json::from_value::<CheckEvent>(v) {
            Ok(d) => Some(d),
            Err(e) => {
                debug!("{}", bounded_line(&format!("undecodable event payload: {e}")));
                None
            }
        },
    };
    Ok(Some(BrokerEvent {
        callback: env.callback,
        phase: env.phase,
        data,
    }))
}

/// Encode an event as one line including the trailing newline.
pub fn encode_line(event: &BrokerEvent) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(event)?;
    line.push('\n');
    Ok(line)
}

/// Counters from a finished line reader.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReaderStats {
    /// Lines read, blank ones included.
    pub lines: u64,
    /// Events handed to the channel.
    pub events: u64,
    /// Lines whose envelope could not be decoded.
    pub skipped: u64,
}

/// Read events from `reader` into `sender` on a dedicated thread.
///
/// The thread ends at end of input, on a read error, or when the consumer
/// side of the channel is gone. Dropping its sender lets
/// [`super::ChannelSource::run`] return once the queue is drained.
pub fn spawn_line_reader<R>(reader: R, sender: ChannelSender) -> io::Result<JoinHandle<ReaderStats>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("snapgate-reader".to_string())
        .spawn(move || read_lines(reader, &sender))
}

fn read_lines<R: BufRead>(reader: R, sender: &ChannelSender) -> ReaderStats {
    let mut stats = ReaderStats::default();
    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!("{}", bounded_line(&format!("event input read failed: {e}")));
                break;
            }
        };
        stats.lines += 1;
        match decode_line(&line) {
            Ok(Some(event)) => {
                if sender.push(event).is_err() {
                    debug!("event consumer gone; stopping reader");
                    break;
                }
                stats.events += 1;
            }
            Ok(None) => {}
            Err(e) => {
                stats.skipped += 1;
                warn!("{}", bounded_line(&format!("skipping undecodable event line {}: {e}", stats.lines)));
            }
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::source::ChannelSource;

    #[test]
    fn test_decode_processed_host_check() {
        let ev = decode_line(
            r#"{"callback":"host_check","phase":"processed","data":{"host_name":"web01","timestamp":1700000000,"state":1,"state_type":1}}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(ev.callback, CallbackKind::HostCheck);
        assert_eq!(ev.phase, CheckPhase::Processed);
        let data = ev.data.unwrap();
        assert_eq!(data.timestamp, Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        assert_eq!(data.state, 1);
    }

    #[test]
    fn test_bad_payload_degrades_to_no_data() {
        let ev = decode_line(r#"{"callback":"service_check","phase":"processed","data":{"state":"broken"}}"#)
            .unwrap()
            .unwrap();
        assert!(ev.data.is_none());
        assert!(ev.entity_key().is_none());
    }

    #[test]
    fn test_bad_envelope_is_error_and_blank_is_none() {
        assert!(decode_line("not json").is_err());
        assert!(decode_line(r#"{"phase":"processed"}"#).is_err());
        assert!(decode_line("   ").unwrap().is_none());
    }

    #[test]
    fn test_encode_decode() {
        let ev = BrokerEvent::processed(
            CheckEvent::service("web01", "HTTP", Utc.timestamp_opt(7, 0).unwrap()).with_state(2, 1),
        );
        let line = encode_line(&ev).unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(decode_line(&line).unwrap(), Some(ev));
    }

    #[test]
    fn test_line_reader_counts() {
        let input = concat!(
            r#"{"callback":"host_check","phase":"initiate","data":{"host_name":"a","timestamp":1}}"#,
            "\n\ngarbage\n",
            r#"{"callback":"host_check","phase":"processed","data":{"host_name":"a","timestamp":2}}"#,
            "\n",
        );
        let (source, tx) = ChannelSource::bounded(16);
        let stats = spawn_line_reader(Cursor::new(input.to_string()), tx)
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(stats, ReaderStats { lines: 4, events: 2, skipped: 1 });
        assert_eq!(source.queued(), 2);
    }
}
