use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::models::{CoreError, CoreErrorKind, PackageManagerFamily};

pub const MAX_BUILD_JOBS: usize = 16;
pub const MIN_FREE_DISK_MB: u64 = 2000;

const SYSTEM_BIN_DIRS: &[&str] = &[
    "/usr/local/sbin",
    "/usr/local/bin",
    "/usr/sbin",
    "/usr/bin",
    "/sbin",
    "/bin",
];

/// Finds the first supported package manager on `PATH` or in the standard
/// system directories.
pub fn detect_package_manager() -> Result<PackageManagerFamily, CoreError> {
    let dirs = search_dirs();
    match detect_package_manager_in(&dirs) {
        Some(family) => {
            tracing::debug!(package_manager = %family, "detected package manager");
            Ok(family)
        }
        None => Err(CoreError::new(
            CoreErrorKind::UnsupportedHost,
            "no supported package manager found (apt-get, dnf, yum, pacman, zypper)",
        )),
    }
}

pub fn detect_package_manager_in(dirs: &[PathBuf]) -> Option<PackageManagerFamily> {
    PackageManagerFamily::ALL
        .into_iter()
        .find(|family| dirs.iter().any(|dir| dir.join(family.binary()).is_file()))
}

fn search_dirs() -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut dirs = Vec::new();

    let from_path = std::env::var_os("PATH")
        .map(|path| std::env::split_paths(&path).collect::<Vec<_>>())
        .unwrap_or_default();

    for dir in from_path
        .into_iter()
        .chain(SYSTEM_BIN_DIRS.iter().map(PathBuf::from))
    {
        let rendered = dir.to_string_lossy().to_string();
        if !rendered.is_empty() && seen.insert(rendered) {
            dirs.push(dir);
        }
    }

    dirs
}

/// Parallel jobs for the compile step: one per processing unit, capped.
pub fn build_jobs() -> usize {
    num_cpus::get().clamp(1, MAX_BUILD_JOBS)
}

pub fn free_disk_mb(path: &Path) -> Result<u64, CoreError> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        CoreError::new(
            CoreErrorKind::InvalidInput,
            format!("path '{}' contains a NUL byte", path.display()),
        )
    })?;

    let mut stats = std::mem::MaybeUninit::<libc::statvfs>::uninit();
    // SAFETY: c_path is NUL-terminated and stats points to writable memory of
    // the right type for the duration of the call.
    let result = unsafe { libc::statvfs(c_path.as_ptr(), stats.as_mut_ptr()) };
    if result != 0 {
        return Err(CoreError::io(
            &format!("failed to query free space of '{}'", path.display()),
            std::io::Error::last_os_error(),
        ));
    }

    // SAFETY: statvfs returned 0, so the struct is initialised.
    let stats = unsafe { stats.assume_init() };
    #[allow(clippy::unnecessary_cast)]
    let available = (stats.f_bavail as u64).saturating_mul(stats.f_frsize as u64);
    Ok(available / (1024 * 1024))
}

/// Fails with [`CoreErrorKind::InsufficientDiskSpace`] below `minimum_mb`.
/// Returns the available megabytes otherwise.
pub fn ensure_disk_space(path: &Path, minimum_mb: u64) -> Result<u64, CoreError> {
    let available = free_disk_mb(path)?;
    if available < minimum_mb {
        return Err(CoreError::new(
            CoreErrorKind::InsufficientDiskSpace,
            format!("insufficient disk space: required {minimum_mb}MB, available {available}MB"),
        ));
    }
    Ok(available)
}
