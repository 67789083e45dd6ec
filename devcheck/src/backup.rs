//! Running-configuration backups.
//!
//! Layout: `<root>/<hostname>/<hostname>-<timestamp>.txt`.

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use log::debug;

use crate::error::BackupError;

/// Timestamp shared by every device in one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunTimestamp(String);

impl RunTimestamp {
    pub const FORMAT: &'static str = "%Y_%m_%d-%H_%M_%S";

    /// Local wall-clock time, to the second.
    pub fn now() -> Self {
        Self(Local::now().format(Self::FORMAT).to_string())
    }

    pub fn from_naive(time: NaiveDateTime) -> Self {
        Self(time.format(Self::FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted running configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub hostname: String,
    pub timestamp: RunTimestamp,
    pub path: PathBuf,
    pub config: String,
}

/// Writes backups under a root directory.
#[derive(Debug, Clone)]
pub struct BackupWriter {
    root: PathBuf,
}

impl BackupWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if needed.
    pub async fn ensure_root(&self) -> Result<(), BackupError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| BackupError::CreateDir {
                path: self.root.clone(),
                source,
            })
    }

    /// Where the backup for `hostname` at `timestamp` lives.
    pub fn artifact_path(
        &self,
        hostname: &str,
        timestamp: &RunTimestamp,
    ) -> Result<PathBuf, BackupError> {
        validate_hostname(hostname)?;
        Ok(self
            .root
            .join(hostname)
            .join(format!("{hostname}-{timestamp}.txt")))
    }

    /// Persist `config` verbatim.
    ///
    /// The text goes to a hidden temporary file of its own first and is
    /// renamed into place, so a failed write never leaves a partial backup
    /// behind and concurrent writes to the same path never interleave.
    pub async fn write(
        &self,
        hostname: &str,
        timestamp: &RunTimestamp,
        config: String,
    ) -> Result<BackupArtifact, BackupError> {
        let path = self.artifact_path(hostname, timestamp)?;
        let dir = self.root.join(hostname);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| BackupError::CreateDir {
                path: dir.clone(),
                source,
            })?;

        let prefix = format!(".{hostname}-{timestamp}.");
        let target = path.clone();
        let written = tokio::task::spawn_blocking(move || {
            write_staged(&dir, &prefix, &target, config.as_bytes()).map(|()| config)
        })
        .await
        .unwrap_or_else(|e| Err(io::Error::other(e)));
        let config = written.map_err(|source| BackupError::Write {
            path: path.clone(),
            source,
        })?;

        debug!("{}: wrote {} bytes to {}", hostname, config.len(), path.display());
        Ok(BackupArtifact {
            hostname: hostname.to_string(),
            timestamp: timestamp.clone(),
            path,
            config,
        })
    }
}

/// Write through a uniquely named temporary file in `dir`, then rename it
/// over `target`. The temporary file is removed if any step fails.
fn write_staged(dir: &Path, prefix: &str, target: &Path, contents: &[u8]) -> io::Result<()> {
    let mut staged = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".tmp")
        .tempfile_in(dir)?;
    staged.write_all(contents)?;
    staged.as_file().sync_all()?;
    staged.persist(target)?;
    Ok(())
}

/// A hostname must name exactly one directory below the root.
fn validate_hostname(hostname: &str) -> Result<(), BackupError> {
    let bytes = hostname.as_bytes();
    if hostname.is_empty()
        || hostname == "."
        || hostname == ".."
        || memchr::memchr3(b'/', b'\\', 0, bytes).is_some()
    {
        return Err(BackupError::InvalidHostname {
            hostname: hostname.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tokio_test::assert_err;

    use super::*;

    fn at(hour: u32, min: u32, sec: u32) -> RunTimestamp {
        RunTimestamp::from_naive(
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(hour, min, sec)
                .unwrap(),
        )
    }

    #[test]
    fn test_timestamp_format() {
        assert_eq!(at(9, 5, 7).as_str(), "2024_03_01-09_05_07");
        assert_eq!(RunTimestamp::now().as_str().len(), "2024_03_01-09_05_07".len());
    }

    #[test]
    fn test_artifact_path_layout() {
        let writer = BackupWriter::new("backups");
        let path = writer.artifact_path("r1", &at(10, 0, 0)).unwrap();
        assert_eq!(
            path,
            Path::new("backups/r1/r1-2024_03_01-10_00_00.txt")
        );
    }

    #[tokio::test]
    async fn test_two_timestamps_two_files() {
        let root = tempfile::tempdir().unwrap();
        let writer = BackupWriter::new(root.path().join("backups"));
        writer.ensure_root().await.unwrap();

        let first = writer
            .write("r1", &at(10, 0, 0), "hostname r1\n!\nend\n".to_string())
            .await
            .unwrap();
        let second = writer
            .write("r1", &at(11, 0, 0), "hostname r1\nntp server 10.0.0.1\nend\n".to_string())
            .await
            .unwrap();

        assert_ne!(first.path, second.path);
        assert_eq!(
            std::fs::read_to_string(&first.path).unwrap(),
            "hostname r1\n!\nend\n"
        );
        assert_eq!(
            std::fs::read_to_string(&second.path).unwrap(),
            "hostname r1\nntp server 10.0.0.1\nend\n"
        );

        // No staging files left behind
        let entries = std::fs::read_dir(root.path().join("backups/r1")).unwrap();
        assert_eq!(entries.count(), 2);
    }

    #[tokio::test]
    async fn test_same_timestamp_overwrites() {
        let root = tempfile::tempdir().unwrap();
        let writer = BackupWriter::new(root.path());

        writer.write("r1", &at(10, 0, 0), "old".to_string()).await.unwrap();
        let artifact = writer.write("r1", &at(10, 0, 0), "new".to_string()).await.unwrap();

        assert_eq!(std::fs::read_to_string(&artifact.path).unwrap(), "new");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_same_hostname_never_mixes() {
        let root = tempfile::tempdir().unwrap();
        let writer = BackupWriter::new(root.path());
        let ts = at(10, 0, 0);
        let long_a = "A".repeat(200_000);
        let long_b = "B".repeat(100_000);

        for _ in 0..20 {
            let (a, b) = tokio::join!(
                tokio::spawn({
                    let (writer, ts, text) = (writer.clone(), ts.clone(), long_a.clone());
                    async move { writer.write("r1", &ts, text).await }
                }),
                tokio::spawn({
                    let (writer, ts, text) = (writer.clone(), ts.clone(), long_b.clone());
                    async move { writer.write("r1", &ts, text).await }
                }),
            );
            let path = a.unwrap().unwrap().path;
            assert_eq!(path, b.unwrap().unwrap().path);

            let text = std::fs::read_to_string(&path).unwrap();
            assert!(text == long_a || text == long_b, "mixed backup of {} bytes", text.len());
        }

        let entries = std::fs::read_dir(root.path().join("r1")).unwrap();
        assert_eq!(entries.count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_hostnames() {
        let root = tempfile::tempdir().unwrap();
        let writer = BackupWriter::new(root.path());

        for hostname in ["", ".", "..", "../etc", "a/b", "a\\b"] {
            let result = writer.write(hostname, &at(10, 0, 0), String::new()).await;
            assert!(
                matches!(result, Err(BackupError::InvalidHostname { .. })),
                "{hostname:?} accepted"
            );
        }
    }

    #[tokio::test]
    async fn test_unwritable_root() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let writer = BackupWriter::new(&blocker);
        assert_err!(writer.write("r1", &at(10, 0, 0), String::new()).await);
    }
}
