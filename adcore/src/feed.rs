use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::{InMemoryCatalog, Item, ItemCreate};

/// One record in a line-item feed: either a fully specified item (with id)
/// or a create payload that goes through catalog validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeedRecord {
    Item(Item),
    Create(ItemCreate),
}

/// Collect `.json` / `.jsonl` feed files under `path` (a file or a directory).
pub fn feed_files(path: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if path.is_dir() {
        for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
        files.sort();
    } else if path.is_file() {
        files.push(path.to_path_buf());
    }
    files
}

/// Read every feed record under `path`. JSON files hold an array or a single
/// object; anything else is read as JSON lines.
pub fn load_records(path: &Path) -> Result<Vec<FeedRecord>> {
    let mut records = Vec::new();
    for file in feed_files(path) {
        if file.extension().and_then(|s| s.to_str()) == Some("json") {
            let f = File::open(&file).with_context(|| format!("opening {}", file.display()))?;
            let json: serde_json::Value = serde_json::from_reader(BufReader::new(f))
                .with_context(|| format!("parsing {}", file.display()))?;
            match json {
                serde_json::Value::Array(arr) => {
                    for v in arr {
                        records.push(serde_json::from_value(v)?);
                    }
                }
                serde_json::Value::Object(_) => records.push(serde_json::from_value(json)?),
                _ => bail!("{}: expected an array or object of line items", file.display()),
            }
        } else {
            let f = File::open(&file).with_context(|| format!("opening {}", file.display()))?;
            for (n, line) in BufReader::new(f).lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() { continue; }
                let rec = serde_json::from_str(&line)
                    .with_context(|| format!("{}:{}", file.display(), n + 1))?;
                records.push(rec);
            }
        }
    }
    Ok(records)
}

/// Load feeds into `catalog`. Invalid create payloads are logged and skipped;
/// returns the number of items stored.
pub fn load_into_catalog(catalog: &InMemoryCatalog, path: &Path) -> Result<usize> {
    let mut stored = 0;
    for rec in load_records(path)? {
        match rec {
            FeedRecord::Item(item) => {
                catalog.insert(item);
                stored += 1;
            }
            FeedRecord::Create(create) => match catalog.create(create) {
                Ok(_) => stored += 1,
                Err(err) => tracing::warn!(%err, "skipping feed record"),
            },
        }
    }
    tracing::info!(stored, path = %path.display(), "catalog loaded");
    Ok(stored)
}

/// Write records as JSON lines, creating parent directories as needed.
pub fn save_records(path: &Path, records: &[FeedRecord]) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    for rec in records {
        serde_json::to_writer(&mut out, rec)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}
