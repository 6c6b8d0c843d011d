//! Destinations for the condensed summary.

use parking_lot::Mutex;
use propmark_model::SinkError;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

pub trait SummarySink: Send + Sync {
    fn write_summary(&self, text: &str) -> Result<(), SinkError>;
}

/// Writes to any `io::Write`, e.g. stdout.
pub struct WriterSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> SummarySink for WriterSink<W> {
    fn write_summary(&self, text: &str) -> Result<(), SinkError> {
        let mut writer = self.writer.lock();
        writeln!(writer, "{text}")?;
        writer.flush()?;
        Ok(())
    }
}

/// Replaces the file's contents with the summary.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SummarySink for FileSink {
    fn write_summary(&self, text: &str) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(SinkError::Unavailable(format!(
                    "directory {} does not exist",
                    parent.display()
                )));
            }
        }
        fs::write(&self.path, format!("{text}\n"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writer_sink_appends_newline() {
        let sink = WriterSink::new(Vec::new());
        sink.write_summary("A - 2tk").unwrap();
        assert_eq!(sink.into_inner(), b"A - 2tk\n");
    }

    #[test]
    fn file_sink_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.txt");
        let sink = FileSink::new(&path);
        sink.write_summary("old").unwrap();
        sink.write_summary("A - 2tk\nB - 1tk").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "A - 2tk\nB - 1tk\n");
    }

    #[test]
    fn missing_directory_is_unavailable() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("nope").join("summary.txt"));
        assert!(matches!(
            sink.write_summary("x"),
            Err(SinkError::Unavailable(_))
        ));
    }
}
