use crate::index::{Insertion, KeyIndex};
use crate::memory::{batch_keys, derive_batch, InMemoryRepository};
use async_trait::async_trait;
use parking_lot::Mutex;
use pinhole_core::error::Result;
use pinhole_core::{BatchKey, BatchRequest, KeyDeriver, Repository, ShortCode, StorageError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// One line of the append-only log.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct LogRecord<'a> {
    key: &'a str,
    value: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OwnedLogRecord {
    key: String,
    value: String,
}

/// File-backed implementation of the [`Repository`] trait.
///
/// Every mapping is appended as a JSON line to a log that is never rewritten.
/// On open the log is replayed into an in-memory index, later lines winning
/// over earlier ones, and all reads are served from that index.
///
/// Writers are serialized by the log mutex and publish into the index only
/// after the line is synced, so readers never observe a mapping that is not
/// yet durable.
#[derive(Debug)]
pub struct FileRepository {
    path: PathBuf,
    memory: InMemoryRepository,
    log: Mutex<Option<LogWriter>>,
}

/// Append handle of the log.
#[derive(Debug)]
struct LogWriter {
    file: File,
    /// The log may end with a partial record that the next append must
    /// terminate first.
    torn: bool,
}

impl LogWriter {
    fn append(&mut self, bytes: &[u8]) -> Result<()> {
        if self.torn {
            self.write_synced(b"\n")?;
            self.torn = false;
        }
        self.write_synced(bytes)
    }

    fn write_synced(&mut self, bytes: &[u8]) -> Result<()> {
        let start = self.file.metadata().map(|meta| meta.len());
        let written = self
            .file
            .write_all(bytes)
            .and_then(|_| self.file.sync_data());

        if let Err(e) = written {
            // drop whatever part of the record reached the file
            let restored = start.and_then(|len| self.file.set_len(len)).is_ok();
            if !restored {
                warn!(error = %e, "cannot truncate partial record, log marked torn");
            }
            self.torn |= !restored;
            return Err(StorageError::Unavailable(format!(
                "cannot append to url log: {e}"
            )));
        }
        Ok(())
    }
}

impl FileRepository {
    /// Opens (creating if needed) the log at `path` and replays it.
    ///
    /// Lines that cannot be read or parsed are skipped. Failing to open the
    /// file is an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut log = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                StorageError::Unavailable(format!("cannot open log '{}': {e}", path.display()))
            })?;

        let index = replay(&path)?;

        // a torn last line must not swallow the next append
        let torn = ends_mid_line(&mut log).map_err(|e| {
            StorageError::Unavailable(format!("cannot inspect log '{}': {e}", path.display()))
        })?;
        if torn {
            warn!(path = %path.display(), "log ends mid-line");
        }
        info!(path = %path.display(), entries = index.len(), "replayed url log");

        Ok(Self {
            path,
            memory: InMemoryRepository::from_index(index),
            log: Mutex::new(Some(LogWriter { file: log, torn })),
        })
    }

    /// Returns the path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn index(&self) -> &KeyIndex {
        self.memory.index()
    }
}

fn replay(path: &Path) -> Result<KeyIndex> {
    let file = File::open(path).map_err(|e| {
        StorageError::Unavailable(format!("cannot read log '{}': {e}", path.display()))
    })?;

    let mut links = HashMap::new();
    let mut skipped = 0usize;

    for (number, line) in BufReader::new(file).split(b'\n').enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(line = number + 1, error = %e, "stopping replay on unreadable log");
                break;
            }
        };
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let parsed = serde_json::from_slice::<OwnedLogRecord>(&line)
            .ok()
            .and_then(|record| Some((ShortCode::parse(record.key).ok()?, record.value)));
        match parsed {
            Some((code, url)) => {
                links.insert(code, url);
            }
            None => {
                skipped += 1;
                debug!(line = number + 1, "skipping malformed log line");
            }
        }
    }

    if skipped > 0 {
        warn!(path = %path.display(), skipped, "skipped malformed log lines during replay");
    }

    Ok(KeyIndex::from(links))
}

fn ends_mid_line(file: &mut File) -> std::io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

fn encode_line(code: &ShortCode, url: &str, buf: &mut Vec<u8>) -> Result<()> {
    let record = LogRecord {
        key: code.as_str(),
        value: url,
    };
    serde_json::to_writer(&mut *buf, &record)
        .map_err(|e| StorageError::Encoding(e.to_string()))?;
    buf.push(b'\n');
    Ok(())
}

fn writer(log: &mut Option<LogWriter>) -> Result<&mut LogWriter> {
    log.as_mut()
        .ok_or_else(|| StorageError::Unavailable("url log is closed".to_string()))
}

#[async_trait]
impl Repository for FileRepository {
    async fn add(&self, url: &str) -> Result<ShortCode> {
        let code = KeyDeriver::derive(url);

        let mut log = self.log.lock();
        if self.index().check(&code, url)? == Insertion::Existing {
            return Ok(code);
        }

        let mut line = Vec::new();
        encode_line(&code, url, &mut line)?;
        writer(&mut log)?.append(&line)?;
        self.index().publish([(code.clone(), url.to_owned())]);
        drop(log);

        debug!(code = %code, "appended url to log");
        Ok(code)
    }

    async fn get(&self, code: &ShortCode) -> Result<String> {
        self.memory.get(code).await
    }

    async fn add_batch(&self, requests: &[BatchRequest]) -> Result<Vec<BatchKey>> {
        let derived = derive_batch(requests);

        let mut log = self.log.lock();
        let fresh = self.index().plan_batch(&derived)?;
        if !fresh.is_empty() {
            let mut lines = Vec::new();
            for (code, url) in &fresh {
                encode_line(code, url, &mut lines)?;
            }
            writer(&mut log)?.append(&lines)?;
            self.index().publish(fresh);
        }
        drop(log);

        Ok(batch_keys(requests, derived))
    }

    async fn ping(&self, _timeout: Duration) -> Result<()> {
        File::open(&self.path).map(drop).map_err(|e| {
            StorageError::Unavailable(format!("cannot open log '{}': {e}", self.path.display()))
        })
    }

    async fn close(&self) -> Result<()> {
        let Some(writer) = self.log.lock().take() else {
            return Ok(());
        };
        writer
            .file
            .sync_all()
            .map_err(|e| StorageError::Unavailable(format!("cannot sync url log: {e}")))
    }
}
