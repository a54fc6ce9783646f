use super::{FileStat, FileSystem};
use crate::error::AppResult;
use std::io::ErrorKind;
use std::path::Path;
use tokio::{fs, io::AsyncReadExt};

/// 基于本地磁盘的文件系统实现
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl FileSystem for LocalFileSystem {
    async fn stat(&self, path: &Path) -> AppResult<FileStat> {
        match fs::metadata(path).await {
            Ok(metadata) => Ok(FileStat {
                exists: true,
                is_file: metadata.is_file(),
                size_bytes: metadata.len(),
            }),
            Err(e) if is_unreachable_path(e.kind()) => Ok(FileStat::missing()),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_header(&self, path: &Path, len: usize) -> AppResult<Vec<u8>> {
        let file = fs::File::open(path).await?;
        let mut header = Vec::with_capacity(len);
        file.take(len as u64).read_to_end(&mut header).await?;
        Ok(header)
    }
}

/// 路径本身不可能存在时的错误：不存在、上级不是目录、名称过长或非法
pub(crate) fn is_unreachable_path(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::NotFound
            | ErrorKind::NotADirectory
            | ErrorKind::InvalidFilename
            | ErrorKind::InvalidInput
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, tempdir};

    #[tokio::test]
    async fn test_stat_missing_path() {
        let dir = tempdir().unwrap();
        let stat = LocalFileSystem::new()
            .stat(&dir.path().join("chrome"))
            .await
            .unwrap();

        assert_eq!(stat, FileStat::missing());
    }

    #[tokio::test]
    async fn test_stat_directory_and_file() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem::new();

        let dir_stat = fs.stat(dir.path()).await.unwrap();
        assert!(dir_stat.exists);
        assert!(!dir_stat.is_file);

        let mut file = NamedTempFile::new_in(dir.path()).unwrap();
        file.write_all(b"hello").unwrap();
        let file_stat = fs.stat(file.path()).await.unwrap();
        assert!(file_stat.is_file);
        assert_eq!(file_stat.size_bytes, 5);
    }

    #[tokio::test]
    async fn test_stat_unreachable_paths_are_missing() {
        let file = NamedTempFile::new().unwrap();
        let fs = LocalFileSystem::new();

        // 上级路径是普通文件
        let under_file = fs.stat(&file.path().join("chrome")).await.unwrap();
        assert_eq!(under_file, FileStat::missing());

        let dir = tempdir().unwrap();
        let too_long = fs.stat(&dir.path().join("a".repeat(300))).await.unwrap();
        assert_eq!(too_long, FileStat::missing());

        let with_nul = fs.stat(Path::new("/usr/bin/chrome\0")).await.unwrap();
        assert_eq!(with_nul, FileStat::missing());
    }

    #[tokio::test]
    async fn test_read_header_truncates() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0x7F, b'E', b'L', b'F', 2, 1, 1, 0, 0, 0]).unwrap();

        let header = LocalFileSystem::new()
            .read_header(file.path(), 4)
            .await
            .unwrap();
        assert_eq!(header, vec![0x7F, b'E', b'L', b'F']);

        let whole = LocalFileSystem::new()
            .read_header(file.path(), 262)
            .await
            .unwrap();
        assert_eq!(whole.len(), 10);
    }
}
