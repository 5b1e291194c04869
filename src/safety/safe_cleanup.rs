/// Tree removal that never follows symlinks and never leaves the filesystem
/// of the tree root, using openat/fstatat/unlinkat.
use crate::config::types::{Result, TmpdirError};
use std::ffi::{CStr, CString, OsStr};
use std::fs;
use std::io;
use std::os::fd::RawFd;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

/// What happened to a removal target
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Removal {
    Removed,
    /// Nothing existed at the path
    Absent,
}

struct FdGuard(RawFd);

impl FdGuard {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

impl Drop for FdGuard {
    fn drop(&mut self) {
        if self.0 >= 0 {
            unsafe {
                libc::close(self.0);
            }
        }
    }
}

struct DirStream(*mut libc::DIR);

impl Drop for DirStream {
    fn drop(&mut self) {
        unsafe {
            libc::closedir(self.0);
        }
    }
}

fn cstring(path: &Path, bytes: &[u8]) -> Result<CString> {
    CString::new(bytes).map_err(|_| {
        TmpdirError::Cleanup(format!(
            "Path contains NUL byte and cannot be removed safely: {}",
            path.display()
        ))
    })
}

fn context(path: &Path) -> impl FnOnce(io::Error) -> TmpdirError + '_ {
    move |e| TmpdirError::Cleanup(format!("{}: {}", path.display(), e))
}

fn open_dir(path: &Path) -> Result<FdGuard> {
    let path_c = cstring(path, path.as_os_str().as_bytes())?;
    // The base may legitimately be a symlink (/dev/shm -> /run/shm)
    let fd = unsafe {
        libc::open(
            path_c.as_ptr(),
            libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC,
        )
    };
    if fd < 0 {
        return Err(context(path)(io::Error::last_os_error()));
    }
    Ok(FdGuard(fd))
}

fn open_dir_at(parent_fd: RawFd, name: &CStr) -> io::Result<FdGuard> {
    let fd = unsafe {
        libc::openat(
            parent_fd,
            name.as_ptr(),
            libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC | libc::O_NOFOLLOW,
        )
    };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(FdGuard(fd))
}

fn fstatat_nofollow(parent_fd: RawFd, name: &CStr) -> io::Result<libc::stat> {
    let mut st = std::mem::MaybeUninit::<libc::stat>::zeroed();
    let rc = unsafe {
        libc::fstatat(
            parent_fd,
            name.as_ptr(),
            st.as_mut_ptr(),
            libc::AT_SYMLINK_NOFOLLOW,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { st.assume_init() })
}

fn unlink_at(parent_fd: RawFd, name: &CStr, flags: libc::c_int) -> io::Result<()> {
    let rc = unsafe { libc::unlinkat(parent_fd, name.as_ptr(), flags) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn is_dir(st: &libc::stat) -> bool {
    st.st_mode & libc::S_IFMT == libc::S_IFDIR
}

fn list_entries(dir_fd: RawFd) -> io::Result<Vec<CString>> {
    // fdopendir takes ownership of the descriptor it is given
    let iter_fd = unsafe { libc::dup(dir_fd) };
    if iter_fd < 0 {
        return Err(io::Error::last_os_error());
    }
    let dir = unsafe { libc::fdopendir(iter_fd) };
    if dir.is_null() {
        let err = io::Error::last_os_error();
        unsafe {
            libc::close(iter_fd);
        }
        return Err(err);
    }
    let stream = DirStream(dir);

    let mut names = Vec::new();
    loop {
        unsafe {
            *libc::__errno_location() = 0;
        }
        let entry = unsafe { libc::readdir(stream.0) };
        if entry.is_null() {
            let errno = unsafe { *libc::__errno_location() };
            if errno != 0 {
                return Err(io::Error::from_raw_os_error(errno));
            }
            break;
        }

        let name = unsafe { CStr::from_ptr((*entry).d_name.as_ptr()) };
        let bytes = name.to_bytes();
        if bytes == b"." || bytes == b".." {
            continue;
        }
        names.push(name.to_owned());
    }

    Ok(names)
}

struct TreeWalk {
    root_dev: libc::dev_t,
    refused: Vec<PathBuf>,
}

impl TreeWalk {
    /// Empty the directory open at `dir_fd`. Returns false when some entry
    /// had to be left behind because it lives on another filesystem.
    fn clear_dir(&mut self, dir_fd: RawFd, dir_path: &Path) -> Result<bool> {
        let mut cleared = true;

        for name in list_entries(dir_fd).map_err(context(dir_path))? {
            let child_path = dir_path.join(OsStr::from_bytes(name.to_bytes()));

            let st = match fstatat_nofollow(dir_fd, &name) {
                Ok(st) => st,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(context(&child_path)(e)),
            };

            if !is_dir(&st) {
                unlink_at(dir_fd, &name, 0).map_err(context(&child_path))?;
                continue;
            }

            if st.st_dev != self.root_dev {
                log::warn!(
                    "Not crossing filesystem boundary at {}",
                    child_path.display()
                );
                self.refused.push(child_path);
                cleared = false;
                continue;
            }

            let child = open_dir_at(dir_fd, &name).map_err(context(&child_path))?;
            if self.clear_dir(child.as_raw_fd(), &child_path)? {
                drop(child);
                unlink_at(dir_fd, &name, libc::AT_REMOVEDIR).map_err(context(&child_path))?;
            } else {
                cleared = false;
            }
        }

        Ok(cleared)
    }
}

/// Remove `path` recursively, staying on the filesystem `path` lives on.
///
/// Directories on another filesystem (something still mounted inside the
/// tree) are left untouched together with their ancestors; everything else
/// is removed and the refusal is returned as an error. A missing path is
/// not an error.
pub fn remove_tree_one_fs(path: &Path) -> Result<Removal> {
    match fs::symlink_metadata(path) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Removal::Absent),
        Err(e) => return Err(context(path)(e)),
    }

    let parent = path.parent().ok_or_else(|| {
        TmpdirError::Cleanup(format!("Cannot remove path without parent: {}", path.display()))
    })?;
    let name = path.file_name().ok_or_else(|| {
        TmpdirError::Cleanup(format!(
            "Cannot remove path without file name: {}",
            path.display()
        ))
    })?;
    let name_c = cstring(path, name.as_bytes())?;

    let parent_fd = open_dir(parent)?;
    let st = match fstatat_nofollow(parent_fd.as_raw_fd(), &name_c) {
        Ok(st) => st,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Removal::Absent),
        Err(e) => return Err(context(path)(e)),
    };

    if !is_dir(&st) {
        unlink_at(parent_fd.as_raw_fd(), &name_c, 0).map_err(context(path))?;
        return Ok(Removal::Removed);
    }

    let dir_fd = open_dir_at(parent_fd.as_raw_fd(), &name_c).map_err(context(path))?;
    let mut walk = TreeWalk {
        root_dev: st.st_dev,
        refused: Vec::new(),
    };

    if walk.clear_dir(dir_fd.as_raw_fd(), path)? {
        drop(dir_fd);
        unlink_at(parent_fd.as_raw_fd(), &name_c, libc::AT_REMOVEDIR).map_err(context(path))?;
        return Ok(Removal::Removed);
    }

    let refused: Vec<String> = walk
        .refused
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    Err(TmpdirError::Cleanup(format!(
        "{} only partially removed: refused to cross filesystem boundary at {}",
        path.display(),
        refused.join(", ")
    )))
}
