//! Snapshot files
//!
//! A snapshot is plain text, four lines per interval: id, low endpoint,
//! high endpoint, rank. Writes go to a sibling `.tmp` file that is renamed
//! over the target once flushed, so a crash mid-write leaves the previous
//! snapshot intact.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::Error;
use crate::interval::Interval;

/// Key types the index can persist: ordered, cloneable, and round-trippable
/// through text.
pub trait Endpoint: Ord + Clone + fmt::Display + FromStr<Err: fmt::Display> {}

impl<T> Endpoint for T where T: Ord + Clone + fmt::Display + FromStr<Err: fmt::Display> {}

/// Lines per persisted record
pub const FIELDS_PER_RECORD: usize = 4;

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn has_line_break(text: &str) -> bool {
    text.contains(['\n', '\r'])
}

/// Reject ids that would not survive a snapshot round trip.
pub fn check_id(id: &str) -> Result<(), Error> {
    if has_line_break(id) {
        return Err(Error::InvalidId(id.to_string()));
    }
    Ok(())
}

/// Reject endpoints whose text form spans more than one line. Returns the
/// text form.
pub fn check_endpoint<K: fmt::Display>(endpoint: &K) -> Result<String, Error> {
    let text = endpoint.to_string();
    if has_line_break(&text) {
        return Err(Error::InvalidEndpoint(text));
    }
    Ok(text)
}

/// Write `records` to `path`, replacing any previous snapshot.
///
/// A record that cannot be represented fails the whole write and leaves
/// the previous snapshot in place.
pub fn write_snapshot<'a, K, I>(path: &Path, records: I) -> Result<usize, Error>
where
    K: fmt::Display + 'a,
    I: IntoIterator<Item = &'a Interval<K>>,
{
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }

    let tmp = tmp_path(path);
    let count = match write_records(&tmp, records) {
        Ok(count) => count,
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
    };
    fs::rename(&tmp, path)?;

    debug!(path = %path.display(), records = count, "snapshot written");
    Ok(count)
}

fn write_records<'a, K, I>(tmp: &Path, records: I) -> Result<usize, Error>
where
    K: fmt::Display + 'a,
    I: IntoIterator<Item = &'a Interval<K>>,
{
    let mut out = BufWriter::new(File::create(tmp)?);
    let mut count = 0;
    for interval in records {
        check_id(&interval.id)?;
        let low = check_endpoint(&interval.low)?;
        let high = check_endpoint(&interval.high)?;
        writeln!(out, "{}", interval.id)?;
        writeln!(out, "{}", low)?;
        writeln!(out, "{}", high)?;
        writeln!(out, "{}", interval.rank)?;
        count += 1;
    }
    let file = out.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(count)
}

/// Read every complete record from `path`.
///
/// A trailing partial record is ignored. A value that does not parse is
/// reported with its 1-based line number.
pub fn read_snapshot<K: Endpoint>(path: &Path) -> Result<Vec<Interval<K>>, Error> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    let mut fields: Vec<String> = Vec::with_capacity(FIELDS_PER_RECORD);
    let mut line_no = 0;

    for line in reader.lines() {
        let line = line?;
        line_no += 1;
        fields.push(line);
        if fields.len() < FIELDS_PER_RECORD {
            continue;
        }

        let first_line = line_no - (FIELDS_PER_RECORD - 1);
        let rank_raw = fields.pop().unwrap_or_default();
        let high_raw = fields.pop().unwrap_or_default();
        let low_raw = fields.pop().unwrap_or_default();
        let id = fields.pop().unwrap_or_default();

        let low = parse_field::<K>(&low_raw, first_line + 1)?;
        let high = parse_field::<K>(&high_raw, first_line + 2)?;
        let rank = parse_field::<u64>(&rank_raw, first_line + 3)?;
        records.push(Interval::new(id, low, high, rank));
    }

    if !fields.is_empty() {
        warn!(
            path = %path.display(),
            lines = fields.len(),
            "ignoring truncated record at end of snapshot"
        );
    }
    debug!(path = %path.display(), records = records.len(), "snapshot read");
    Ok(records)
}

fn parse_field<T>(raw: &str, line: usize) -> Result<T, Error>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.parse::<T>().map_err(|e| Error::CorruptSnapshot {
        line,
        reason: format!("{:?}: {}", raw, e),
    })
}
