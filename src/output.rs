//! Output files: enriched documents, recaps and summaries.
//!
//! Every file is written to a temporary sibling first and renamed into
//! place, so a reader never sees a half-written document.
use crate::cli::RecapFormat;
use crate::report::{write_recap_csv, write_recap_json, RecapRow};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    write_atomic_with(path, |file| {
        file.write_all(bytes)?;
        Ok(())
    })
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut json = serde_json::to_vec_pretty(value).context("serialize JSON")?;
    json.push(b'\n');
    write_atomic(path, &json)
}

pub fn write_recap(path: &Path, rows: &[RecapRow], format: RecapFormat) -> Result<()> {
    write_atomic_with(path, |file| match format {
        RecapFormat::Csv => write_recap_csv(rows, file),
        RecapFormat::Json => write_recap_json(rows, file),
    })
    .with_context(|| format!("write recap {}", path.display()))
}

/// `<dir>/<stem>.enriched.xml` beside `input`.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("document");
    input.with_file_name(format!("{stem}.enriched.xml"))
}

fn write_atomic_with<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut fs::File) -> Result<()>,
{
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    let mut temp = NamedTempFile::new_in(parent)
        .with_context(|| format!("create temporary file in {}", parent.display()))?;
    fill(temp.as_file_mut()).with_context(|| format!("write {}", path.display()))?;
    temp.as_file()
        .sync_all()
        .with_context(|| format!("sync {}", path.display()))?;
    temp.persist(path)
        .with_context(|| format!("publish {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_sits_beside_input() {
        assert_eq!(
            default_output_path(Path::new("/data/in/batch-17.xml")),
            PathBuf::from("/data/in/batch-17.enriched.xml")
        );
        assert_eq!(
            default_output_path(Path::new("contract.xml")),
            PathBuf::from("contract.enriched.xml")
        );
    }

    #[test]
    fn atomic_write_replaces_and_creates_parents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("out.xml");
        write_atomic(&path, b"first").expect("write");
        write_atomic(&path, b"second").expect("overwrite");
        assert_eq!(fs::read(&path).expect("read"), b"second");
        let leftovers = fs::read_dir(path.parent().expect("parent"))
            .expect("list")
            .count();
        assert_eq!(leftovers, 1);
    }
}
