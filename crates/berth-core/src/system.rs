//! Filesystem helpers.

use std::fs::{File, FileTimes};
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Latest instant a 64-bit nanosecond timespec can represent.
fn max_file_time() -> SystemTime {
    UNIX_EPOCH + Duration::from_nanos(i64::MAX as u64)
}

/// Times outside `[UNIX_EPOCH, max]` are replaced by the epoch.
fn clamp_file_time(time: SystemTime) -> SystemTime {
    if time < UNIX_EPOCH || time > max_file_time() {
        UNIX_EPOCH
    } else {
        time
    }
}

/// Set the access and modification times of `path`.
pub fn chtimes(path: &Path, atime: SystemTime, mtime: SystemTime) -> io::Result<()> {
    let times = FileTimes::new()
        .set_accessed(clamp_file_time(atime))
        .set_modified(clamp_file_time(mtime));
    File::open(path)?.set_times(times)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_chtimes_sets_mtime() {
        let file = NamedTempFile::new().unwrap();
        let mtime = UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        chtimes(file.path(), mtime, mtime).unwrap();
        let modified = std::fs::metadata(file.path()).unwrap().modified().unwrap();
        assert_eq!(modified, mtime);
    }

    #[test]
    fn test_chtimes_clamps_pre_epoch() {
        let file = NamedTempFile::new().unwrap();
        let before_epoch = UNIX_EPOCH - Duration::from_secs(3600);
        chtimes(file.path(), before_epoch, before_epoch).unwrap();
        let modified = std::fs::metadata(file.path()).unwrap().modified().unwrap();
        assert_eq!(modified, UNIX_EPOCH);
    }

    #[test]
    fn test_clamp_bounds() {
        assert_eq!(clamp_file_time(UNIX_EPOCH), UNIX_EPOCH);
        assert_eq!(clamp_file_time(max_file_time()), max_file_time());
        assert_eq!(
            clamp_file_time(max_file_time() + Duration::from_secs(1)),
            UNIX_EPOCH
        );
    }

    #[test]
    fn test_chtimes_missing_file() {
        let err = chtimes(Path::new("/no/such/file"), UNIX_EPOCH, UNIX_EPOCH).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
