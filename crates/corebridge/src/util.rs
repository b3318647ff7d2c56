use std::{
    ffi::{CStr, CString, c_char},
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};

/// Copies a C string into an owned `String`, replacing invalid UTF-8.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
pub(crate) unsafe fn c_str_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }

    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

pub(crate) fn path_to_cstring(path: &Path) -> Result<CString> {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        CString::new(path.as_os_str().as_bytes()).map_err(|_| Error::InvalidPath(path.into()))
    }
    #[cfg(not(unix))]
    {
        path.to_str()
            .and_then(|s| CString::new(s).ok())
            .ok_or_else(|| Error::InvalidPath(PathBuf::from(path)))
    }
}

pub(crate) fn string_to_cstring(s: &str) -> Result<CString> {
    CString::new(s).map_err(|_| Error::InvalidString)
}

/// Strips trailing separators so directories are reported in one canonical form.
pub(crate) fn trim_dir(path: &Path) -> PathBuf {
    path.components().collect()
}
