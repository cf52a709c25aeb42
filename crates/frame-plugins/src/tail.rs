// # Tail Value
//
// The last `lines` lines (default 100) of the file at `path`. The file is
// re-read only when its modification time advances; otherwise the previous
// text is returned.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use async_trait::async_trait;
use frame_core::{Error, Result, Settings, ValueSource};
use serde_json::Value;
use tracing::trace;

const DEFAULT_LINES: usize = 100;
const CHUNK: u64 = 8 * 1024;

#[derive(Default)]
struct TailCache {
    modified: Option<SystemTime>,
    text: String,
}

pub struct TailValue {
    path: PathBuf,
    lines: usize,
    cache: Mutex<TailCache>,
}

impl TailValue {
    pub fn new(path: impl Into<PathBuf>, lines: usize) -> Self {
        Self {
            path: path.into(),
            lines,
            cache: Mutex::new(TailCache::default()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let path = settings.require_str("path")?;
        let lines = match settings.get("lines") {
            None => DEFAULT_LINES,
            Some(_) => settings
                .get_u64("lines")
                .ok_or_else(|| Error::invalid_settings("'lines' must be a non-negative integer"))?
                as usize,
        };
        Ok(Self::new(path, lines))
    }
}

#[async_trait]
impl ValueSource for TailValue {
    async fn fetch(&self) -> Result<Value> {
        let modified = tokio::fs::metadata(&self.path).await?.modified()?;

        {
            let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if cache.modified.is_some_and(|seen| seen >= modified) {
                return Ok(Value::String(cache.text.clone()));
            }
        }

        trace!("Re-reading {}", self.path.display());
        let path = self.path.clone();
        let lines = self.lines;
        let text = tokio::task::spawn_blocking(move || tail_lines(&path, lines))
            .await
            .map_err(|e| Error::fetch(format!("tail task failed: {}", e)))??;

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.modified = Some(modified);
        cache.text = text.clone();
        Ok(Value::String(text))
    }
}

/// Read the last `lines` lines of a file, scanning backwards from the end
pub fn tail_lines(path: &Path, lines: usize) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut pointer = file.seek(SeekFrom::End(0))?;
    let mut buffer: Vec<u8> = Vec::new();

    loop {
        if let Some(start) = cut_point(&buffer, lines, pointer == 0) {
            return Ok(String::from_utf8_lossy(&buffer[start..]).into_owned());
        }

        let step = CHUNK.min(pointer);
        pointer -= step;
        file.seek(SeekFrom::Start(pointer))?;

        let mut chunk = vec![0; step as usize];
        file.read_exact(&mut chunk)?;
        chunk.extend_from_slice(&buffer);
        buffer = chunk;
    }
}

/// Offset in `buffer` (a suffix of the file) where the last `lines` lines
/// begin, or None when more of the file is needed
fn cut_point(buffer: &[u8], lines: usize, at_file_start: bool) -> Option<usize> {
    if lines == 0 {
        return Some(buffer.len());
    }

    let body = buffer.strip_suffix(b"\n").unwrap_or(buffer);
    let mut seen = 0;
    for (index, byte) in body.iter().enumerate().rev() {
        if *byte == b'\n' {
            seen += 1;
            if seen == lines {
                return Some(index + 1);
            }
        }
    }

    at_file_start.then_some(0)
}
