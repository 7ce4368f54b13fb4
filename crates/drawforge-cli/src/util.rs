use std::{
    fs::File,
    io::{self, BufWriter, StdoutLock, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context;
use drawforge_engine::{DrawRecord, RawDrawRecord};
use tracing::{info, warn};

#[derive(Debug)]
pub enum Output {
    Stdout {
        writer: StdoutLock<'static>,
    },
    File {
        writer: BufWriter<File>,
        path: PathBuf,
    },
}

impl Output {
    pub fn save_json<T>(value: &T, output_path: Option<PathBuf>) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        let mut output = Output::from_output_path(output_path)?;
        output.write_json(value)
    }

    pub fn from_output_path(output_path: Option<PathBuf>) -> anyhow::Result<Self> {
        match output_path {
            Some(path) => Output::open(path),
            None => Ok(Output::stdout()),
        }
    }

    pub fn stdout() -> Self {
        Output::Stdout {
            writer: io::stdout().lock(),
        }
    }

    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Output::File {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn display_path(&self) -> String {
        match self {
            Output::Stdout { .. } => "stdout".to_string(),
            Output::File { path, .. } => path.display().to_string(),
        }
    }

    pub fn write_json<T>(&mut self, value: T) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        serde_json::to_writer_pretty(&mut *self, &value)
            .with_context(|| format!("Failed to write JSON to {}", self.display_path()))?;
        writeln!(&mut *self).with_context(|| {
            format!(
                "Failed to write newline after JSON to {}",
                self.display_path()
            )
        })?;
        self.flush()
            .with_context(|| format!("Failed to flush output to {}", self.display_path()))?;
        Ok(())
    }
}

impl io::Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout { writer } => writer.write(buf),
            Output::File { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout { writer } => writer.flush(),
            Output::File { writer, .. } => writer.flush(),
        }
    }
}

pub fn read_json_file<T, P>(file_kind: &str, path: P) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} file: {}", file_kind, path.display()))?;

    let reader = io::BufReader::new(file);
    let value = serde_json::from_reader(reader).with_context(|| {
        format!(
            "Failed to parse {} JSON file: {}",
            file_kind,
            path.display()
        )
    })?;

    Ok(value)
}

/// Reads a draws file, skipping records whose numbers are invalid.
///
/// Valid records are returned sorted by draw index; a repeated index keeps the
/// first occurrence.
pub fn read_draws_file<P>(path: P) -> anyhow::Result<Vec<DrawRecord>>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let raw: Vec<RawDrawRecord> = read_json_file("draws", path)?;
    let total = raw.len();
    let mut draws = raw
        .into_iter()
        .filter_map(|record| {
            let draw_index = record.draw_index;
            DrawRecord::try_from(record)
                .inspect_err(|e| warn!(draw_index, "skipping malformed draw: {e}"))
                .ok()
        })
        .collect::<Vec<_>>();
    draws.sort_by_key(|d| d.draw_index);
    draws.dedup_by_key(|d| d.draw_index);
    info!(
        path = %path.display(),
        loaded = draws.len(),
        skipped = total - draws.len(),
        "draws loaded"
    );
    Ok(draws)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_read_draws_skips_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("draws.json");
        fs::write(
            &path,
            r#"[
                { "draw_index": 2, "date": "2024-01-03", "numbers": [1, 2, 3] },
                { "draw_index": 1, "numbers": [4, 5, 6] },
                { "draw_index": 3, "numbers": [0, 26] },
                { "draw_index": 4, "numbers": [7, 7] }
            ]"#,
        )
        .unwrap();
        let draws = read_draws_file(&path).unwrap();
        assert_eq!(
            draws.iter().map(|d| d.draw_index).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert!(draws[1].date.is_some());
    }

    #[test]
    fn test_read_draws_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_draws_file(dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("draws"));
    }
}
