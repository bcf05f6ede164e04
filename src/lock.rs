//! Whole-file advisory locking for potfile appends.
//!
//! Every cooperating writer takes an exclusive `fcntl` write lock over the
//! whole file around a single record, the same lock hashcat takes on its
//! potfile. On Linux the lock belongs to the open file description, so two
//! handles in one process exclude each other as well. Other unix targets
//! fall back to process-wide `F_SETLKW` locks. Off unix the guard is a no-op.
use std::fs::File;
use std::io;
use std::path::Path;

use log::error;

/// Exclusive lock held until the guard is dropped.
pub struct FileLock<'a> {
    file: &'a File,
    path: &'a Path,
}

impl<'a> FileLock<'a> {
    pub fn exclusive(file: &'a File, path: &'a Path) -> io::Result<Self> {
        sys::lock(file)?;
        Ok(Self { file, path })
    }
}

impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        if let Err(e) = sys::unlock(self.file) {
            error!("{}: Failed to unlock file: {}", self.path.display(), e);
        }
    }
}

#[cfg(unix)]
mod sys {
    use std::fs::File;
    use std::io;
    use std::os::unix::io::AsRawFd;

    #[cfg(target_os = "linux")]
    const SET_LOCK_WAIT: libc::c_int = libc::F_OFD_SETLKW;
    #[cfg(not(target_os = "linux"))]
    const SET_LOCK_WAIT: libc::c_int = libc::F_SETLKW;

    /// Whole-file lock request of the given type.
    pub(super) fn whole_file(kind: libc::c_short) -> libc::flock {
        // l_start = l_len = 0 covers the file however far it grows; l_pid
        // must stay zero for open-file-description locks
        let mut fl: libc::flock = unsafe { std::mem::zeroed() };
        fl.l_type = kind;
        fl.l_whence = libc::SEEK_SET as libc::c_short;
        fl
    }

    fn set_lock(file: &File, kind: libc::c_short) -> io::Result<()> {
        let mut fl = whole_file(kind);
        loop {
            let rc = unsafe {
                libc::fcntl(file.as_raw_fd(), SET_LOCK_WAIT, &mut fl as *mut libc::flock)
            };
            if rc != -1 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    pub fn lock(file: &File) -> io::Result<()> {
        set_lock(file, libc::F_WRLCK as libc::c_short)
    }

    pub fn unlock(file: &File) -> io::Result<()> {
        set_lock(file, libc::F_UNLCK as libc::c_short)
    }
}

#[cfg(not(unix))]
mod sys {
    use std::fs::File;
    use std::io;

    pub fn lock(_file: &File) -> io::Result<()> {
        Ok(())
    }

    pub fn unlock(_file: &File) -> io::Result<()> {
        Ok(())
    }
}
