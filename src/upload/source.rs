//! Part byte sources
//!
//! Part workers read their segments concurrently. `FileSource` opens a
//! separate handle for every read so no seek cursor is shared between
//! workers; at most one part-sized buffer is held per in-flight part.

use super::planner::PartSegment;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Positioned, concurrently readable object data
#[async_trait]
pub trait PartSource: Send + Sync {
    /// Total object size in bytes
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read exactly the bytes covered by `segment`.
    ///
    /// A source that cannot supply every byte fails with
    /// [`io::ErrorKind::UnexpectedEof`]; it never pads or truncates.
    async fn read_segment(&self, segment: &PartSegment) -> io::Result<Bytes>;
}

fn segment_len(segment: &PartSegment) -> io::Result<usize> {
    usize::try_from(segment.length).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "part {} is {} bytes, too large for this platform",
                segment.part_number, segment.length
            ),
        )
    })
}

fn out_of_range(segment: &PartSegment, len: u64) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!(
            "part {} needs bytes {}..{} but the source has {} bytes",
            segment.part_number,
            segment.offset,
            segment.end(),
            len
        ),
    )
}

/// A file on local disk
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    len: u64,
}

impl FileSource {
    /// Open `path` and record its current size
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }

        Ok(Self {
            path,
            len: metadata.len(),
        })
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PartSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    async fn read_segment(&self, segment: &PartSegment) -> io::Result<Bytes> {
        if segment.end() > self.len {
            return Err(out_of_range(segment, self.len));
        }
        let len = segment_len(segment)?;

        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(segment.offset)).await?;

        let mut buffer = vec![0u8; len];
        // Fails with UnexpectedEof if the file shrank since it was opened
        file.read_exact(&mut buffer).await?;

        Ok(Bytes::from(buffer))
    }
}

/// Object data already in memory
#[derive(Debug, Clone)]
pub struct BytesSource {
    data: Bytes,
}

impl BytesSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl PartSource for BytesSource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    async fn read_segment(&self, segment: &PartSegment) -> io::Result<Bytes> {
        if segment.end() > self.len() {
            return Err(out_of_range(segment, self.len()));
        }
        // Both bounds fit in usize: they are within self.data
        let start = segment.offset as usize;
        let end = segment.end() as usize;
        Ok(self.data.slice(start..end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn segment(part_number: u32, offset: u64, length: u64) -> PartSegment {
        PartSegment {
            part_number,
            offset,
            length,
        }
    }

    #[tokio::test]
    async fn test_bytes_source_slices() {
        let source = BytesSource::new(&b"hello world"[..]);

        assert_eq!(source.len(), 11);
        let part = source.read_segment(&segment(2, 6, 5)).await.unwrap();
        assert_eq!(&part[..], b"world");
    }

    #[tokio::test]
    async fn test_bytes_source_out_of_range() {
        let source = BytesSource::new(&b"short"[..]);
        let err = source.read_segment(&segment(1, 2, 10)).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_file_source_reads_disjoint_ranges_concurrently() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        let source = FileSource::open(file.path()).await.unwrap();
        assert_eq!(source.len(), 10_000);

        let (s1, s2, s3) = (
            segment(1, 0, 4096),
            segment(2, 4096, 4096),
            segment(3, 8192, 1808),
        );
        let (a, b, c) = tokio::join!(
            source.read_segment(&s1),
            source.read_segment(&s2),
            source.read_segment(&s3),
        );

        assert_eq!(&a.unwrap()[..], &data[0..4096]);
        assert_eq!(&b.unwrap()[..], &data[4096..8192]);
        assert_eq!(&c.unwrap()[..], &data[8192..10_000]);
    }

    #[tokio::test]
    async fn test_file_source_short_read_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[7u8; 100]).unwrap();
        file.flush().unwrap();

        let source = FileSource::open(file.path()).await.unwrap();
        // Shrink the file after its size was recorded
        file.as_file().set_len(50).unwrap();

        let err = source.read_segment(&segment(1, 0, 100)).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_file_source_rejects_directories() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileSource::open(dir.path()).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
