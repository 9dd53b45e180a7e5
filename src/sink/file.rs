use crate::feed::FeedEntry;
use crate::sink::{DeliveryError, Sink};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

/// Render one entry as an output line.
///
/// The format is fixed: `《{title}》 {link}` followed by CRLF, UTF-8.
pub fn format_line(entry: &FeedEntry) -> String {
    format!("《{}》 {}\r\n", entry.title, entry.link)
}

/// Appends formatted entry lines to a fixed file path.
///
/// The file is created on first write. The sink is the file's only writer;
/// each batch is written line by line in arrival order and flushed before
/// `deliver` returns.
pub struct FileAppendSink {
    name: String,
    path: PathBuf,
}

impl FileAppendSink {
    pub fn new(name: String, path: PathBuf) -> Self {
        Self { name, path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl Sink for FileAppendSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&mut self, batch: Vec<FeedEntry>) -> Result<(), DeliveryError> {
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await?;

        for entry in &batch {
            file.write_all(format_line(entry).as_bytes()).await?;
        }
        file.flush().await?;

        tracing::debug!(
            sink = %self.name,
            path = %self.path.display(),
            entries = batch.len(),
            "Appended entries"
        );
        Ok(())
    }
}
