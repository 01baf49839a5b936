//! Append-only CSV audit streams for client contacts and consents.
//!
//! Two streams exist: every distinguishable client contact goes to the
//! connections stream, successful consent submissions go to the
//! acceptances stream. Each stream is a CSV file whose header row is
//! written exactly once, lazily, before the first data row.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Column header shared by both streams.
pub const HEADER: &str = "timestamp_utc,ip,mac,user_agent";

/// A single immutable audit row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRecord {
    pub timestamp_utc: String,
    pub ip: String,
    pub mac: String,
    pub user_agent: String,
}

impl ContactRecord {
    /// Build a record timestamped with the current UTC time.
    pub fn now(ip: impl Into<String>, mac: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            timestamp_utc: now_iso8601(),
            ip: ip.into(),
            mac: mac.into(),
            user_agent: user_agent.into(),
        }
    }

    fn to_row(&self) -> String {
        [
            &self.timestamp_utc,
            &self.ip,
            &self.mac,
            &self.user_agent,
        ]
        .iter()
        .map(|f| encode_field(f.as_str()))
        .collect::<Vec<_>>()
        .join(",")
    }
}

/// Returns the current UTC time as an ISO 8601 / RFC 3339 string.
pub fn now_iso8601() -> String {
    let now = time::OffsetDateTime::now_utc();
    now.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Quote a field if it contains a delimiter, a quote, or a line break.
fn encode_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Split one CSV row back into its fields. Inverse of the row encoding.
pub fn decode_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    let mut quoted = false;

    while let Some(ch) = chars.next() {
        if quoted {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    quoted = false;
                }
            } else {
                current.push(ch);
            }
        } else if ch == '"' && current.is_empty() {
            quoted = true;
        } else if ch == ',' {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    fields.push(current);
    fields
}

/// One append-only audit stream backed by a CSV file.
///
/// The file is opened lazily on first append. The existence check, the
/// header write and every row write all happen under the same lock, so
/// concurrent first-writers can neither duplicate the header nor
/// interleave partial rows.
pub struct AuditStream {
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl AuditStream {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, creating the file and writing the header first
    /// if the file does not exist yet.
    pub fn append(&self, record: &ContactRecord) -> std::io::Result<()> {
        let mut guard = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if guard.is_none() {
            *guard = Some(self.open_stream()?);
        }

        let writer = guard.as_mut().expect("writer opened above");
        writeln!(writer, "{}", record.to_row())?;
        writer.flush()
    }

    /// Open the backing file in append mode, writing the header when the
    /// file is new. Must be called with the stream lock held.
    fn open_stream(&self) -> std::io::Result<BufWriter<File>> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let is_new = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);

        if is_new {
            writeln!(writer, "{}", HEADER)?;
            writer.flush()?;
        }

        Ok(writer)
    }
}

/// The two audit streams the gateway writes to.
pub struct AuditSink {
    connections: AuditStream,
    acceptances: AuditStream,
}

impl AuditSink {
    pub fn new(connections_log: impl Into<PathBuf>, acceptances_log: impl Into<PathBuf>) -> Self {
        Self {
            connections: AuditStream::new(connections_log),
            acceptances: AuditStream::new(acceptances_log),
        }
    }

    /// Record a client contact, consented or not.
    pub fn record_connection(&self, record: &ContactRecord) -> std::io::Result<()> {
        self.connections.append(record)
    }

    /// Record a successful consent submission.
    pub fn record_acceptance(&self, record: &ContactRecord) -> std::io::Result<()> {
        self.acceptances.append(record)
    }

    pub fn connections(&self) -> &AuditStream {
        &self.connections
    }

    pub fn acceptances(&self) -> &AuditStream {
        &self.acceptances
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_report;

    fn record(ip: &str, ua: &str) -> ContactRecord {
        ContactRecord {
            timestamp_utc: "2026-08-30T12:00:00Z".to_string(),
            ip: ip.to_string(),
            mac: "aa:bb:cc:dd:ee:ff".to_string(),
            user_agent: ua.to_string(),
        }
    }

    #[test]
    fn test_header_written_once_before_first_row() {
        let t = test_report!("Header row written exactly once, before the first data row");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clients.csv");

        let stream = AuditStream::new(&path);
        stream.append(&record("10.0.0.5", "curl/8.0")).unwrap();
        stream.append(&record("10.0.0.6", "curl/8.0")).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        t.assert_eq("line count", &lines.len(), &3usize);
        t.assert_eq("header first", &lines[0], &HEADER);
        t.assert_true("no repeated header", !lines[1..].contains(&HEADER));
    }

    #[test]
    fn test_header_not_rewritten_for_existing_file() {
        let t = test_report!("Existing stream keeps its single header across re-opens");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clients.csv");

        AuditStream::new(&path)
            .append(&record("10.0.0.5", "probe"))
            .unwrap();
        // A fresh stream handle simulates a process restart.
        AuditStream::new(&path)
            .append(&record("10.0.0.6", "probe"))
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let headers = content.lines().filter(|l| *l == HEADER).count();
        t.assert_eq("header count", &headers, &1usize);
        t.assert_eq("total lines", &content.lines().count(), &3usize);
    }

    #[test]
    fn test_fields_with_delimiters_round_trip() {
        let t = test_report!("Fields containing delimiters survive a re-parse");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clients.csv");

        let ua = "Mozilla/5.0 (X11; Linux, \"x86_64\")\nline2";
        let stream = AuditStream::new(&path);
        stream.append(&record("10.0.0.5", ua)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let data = content.strip_prefix(HEADER).unwrap().trim_start_matches('\n');
        let fields = decode_row(data.trim_end());
        t.assert_eq("field count", &fields.len(), &4usize);
        t.assert_eq("ip", &fields[1].as_str(), &"10.0.0.5");
        t.assert_eq("user agent", &fields[3].as_str(), &ua);
    }

    #[test]
    fn test_plain_row_encoding() {
        let t = test_report!("Plain fields encode without quoting");
        let row = record("10.0.0.5", "curl/8.0").to_row();
        t.assert_eq(
            "row",
            &row.as_str(),
            &"2026-08-30T12:00:00Z,10.0.0.5,aa:bb:cc:dd:ee:ff,curl/8.0",
        );
    }

    #[test]
    fn test_decode_row_plain_and_quoted() {
        let t = test_report!("decode_row handles plain and quoted fields");
        let fields = decode_row("a,\"b,c\",\"d\"\"e\",f");
        t.assert_eq(
            "fields",
            &fields,
            &vec![
                "a".to_string(),
                "b,c".to_string(),
                "d\"e".to_string(),
                "f".to_string(),
            ],
        );
    }

    #[test]
    fn test_empty_mac_field_kept_in_place() {
        let t = test_report!("Empty MAC still yields four columns");
        let rec = ContactRecord::now("10.0.0.5", "", "curl/8.0");
        let fields = decode_row(&rec.to_row());
        t.assert_eq("field count", &fields.len(), &4usize);
        t.assert_eq("mac empty", &fields[2].as_str(), &"");
    }

    #[test]
    fn test_sink_streams_are_separate_files() {
        let t = test_report!("Sink writes connections and acceptances to separate files");
        let dir = tempfile::tempdir().unwrap();
        let conn_path = dir.path().join("clients.csv");
        let acc_path = dir.path().join("accepts.csv");

        let sink = AuditSink::new(&conn_path, &acc_path);
        sink.record_connection(&record("10.0.0.5", "probe")).unwrap();
        sink.record_acceptance(&record("10.0.0.5", "browser")).unwrap();

        let conn = std::fs::read_to_string(&conn_path).unwrap();
        let acc = std::fs::read_to_string(&acc_path).unwrap();
        t.assert_eq("connection rows", &conn.lines().count(), &2usize);
        t.assert_eq("acceptance rows", &acc.lines().count(), &2usize);
        t.assert_contains("connection ua", &conn, "probe");
        t.assert_contains("acceptance ua", &acc, "browser");
    }

    #[test]
    fn test_now_iso8601_format() {
        let t = test_report!("now_iso8601 returns valid RFC 3339 timestamp");
        let ts = now_iso8601();
        t.assert_contains("contains T", &ts, "T");
        t.assert_true("ends with Z", ts.ends_with('Z'));
        let parsed =
            time::OffsetDateTime::parse(&ts, &time::format_description::well_known::Rfc3339);
        t.assert_true("parses as RFC 3339", parsed.is_ok());
    }

    #[test]
    fn test_missing_parent_directory_created() {
        let t = test_report!("Stream creates its parent directory on first write");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log").join("deep").join("clients.csv");

        AuditStream::new(&path)
            .append(&record("10.0.0.5", "probe"))
            .unwrap();
        t.assert_true("file exists", path.exists());
    }
}
