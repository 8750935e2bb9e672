use std::path::PathBuf;

use chunkcast_common::protocol::error::{ChunkcastError, Result};
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

/// Size of one video chunk in bytes.
pub const VIDEO_CHUNK_SIZE: u64 = 64 * 1024;

/// Authoritative source of chunk data for a root node.
///
/// Content lives as plain files in a directory; chunk `i` of a file is the
/// `i`-th [`VIDEO_CHUNK_SIZE`] slice of its bytes. A chunk index at or past
/// the end of the file yields `None`, the end-of-content signal.
pub struct VideoStore {
    dir: PathBuf,
}

impl VideoStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(ChunkcastError::InvalidRequest(format!(
                "Video store directory does not exist: {}",
                dir.display()
            )));
        }
        Ok(Self { dir })
    }

    /// Reads one chunk of `filename`.
    ///
    /// Returns `None` for a missing file or an offset past end-of-file;
    /// consumers treat both as end-of-content.
    pub async fn read(&self, filename: &str, chunk: u64) -> Result<Option<String>> {
        // Content names are bare file names; anything path-like is a
        // contract breach, not a lookup miss.
        if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
            return Err(ChunkcastError::InvalidRequest(format!(
                "Invalid content name: {}",
                filename
            )));
        }

        let path = self.dir.join(filename);
        let mut file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let len = file.metadata().await?.len();
        let offset = chunk.saturating_mul(VIDEO_CHUNK_SIZE);
        if offset >= len {
            return Ok(None);
        }

        file.seek(SeekFrom::Start(offset)).await?;
        let to_read = VIDEO_CHUNK_SIZE.min(len - offset) as usize;
        let mut buf = vec![0u8; to_read];
        file.read_exact(&mut buf).await?;

        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store_with(files: &[(&str, Vec<u8>)]) -> (TempDir, VideoStore) {
        let dir = TempDir::new().unwrap();
        for (name, contents) in files {
            std::fs::write(dir.path().join(name), contents).unwrap();
        }
        let store = VideoStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_read_first_chunk() {
        let (_dir, store) = store_with(&[("movie", b"hello world".to_vec())]).await;
        let data = store.read("movie", 0).await.unwrap();
        assert_eq!(data, Some("hello world".to_string()));
    }

    #[tokio::test]
    async fn test_read_past_end_is_end_of_content() {
        let (_dir, store) = store_with(&[("movie", b"hello".to_vec())]).await;
        assert_eq!(store.read("movie", 1).await.unwrap(), None);
        assert_eq!(store.read("movie", 1000).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_chunk_boundaries() {
        let contents = vec![b'x'; VIDEO_CHUNK_SIZE as usize + 10];
        let (_dir, store) = store_with(&[("movie", contents)]).await;

        let first = store.read("movie", 0).await.unwrap().unwrap();
        assert_eq!(first.len(), VIDEO_CHUNK_SIZE as usize);

        let second = store.read("movie", 1).await.unwrap().unwrap();
        assert_eq!(second.len(), 10);

        assert_eq!(store.read("movie", 2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_file_is_end_of_content() {
        let (_dir, store) = store_with(&[]).await;
        assert_eq!(store.read("nope", 0).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let (_dir, store) = store_with(&[]).await;
        assert!(store.read("../etc/passwd", 0).await.is_err());
    }

    #[test]
    fn test_missing_directory_rejected() {
        assert!(VideoStore::new("/definitely/not/a/dir").is_err());
    }
}
