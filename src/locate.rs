//! Platform-specific discovery of Cursor's workspace-storage roots.
//!
//! Cursor keeps one directory per opened workspace under
//! `<config>/Cursor/User/workspaceStorage`, where `<config>` is
//! `%APPDATA%` on Windows, `~/Library/Application Support` on macOS and
//! `~/.config` on Linux. Under WSL the IDE usually runs on the Windows
//! side, so every reachable profile under `/mnt/c/Users` is a candidate
//! too.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::LocateError;

/// Path from a per-user config dir down to the workspace stores.
const STORAGE_SUBDIR: [&str; 3] = ["Cursor", "User", "workspaceStorage"];

/// Path from a Windows profile dir down to the workspace stores.
const WINDOWS_PROFILE_SUBDIR: [&str; 5] =
    ["AppData", "Roaming", "Cursor", "User", "workspaceStorage"];

/// Profile directories under `C:\Users` that never hold a real user.
const SYSTEM_PROFILES: [&str; 4] = ["All Users", "Default", "Default User", "Public"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
    Wsl,
}

impl Platform {
    /// Identify the running platform, probing `/proc/version` to tell WSL
    /// apart from native Linux.
    pub fn detect() -> Result<Platform, LocateError> {
        Platform::from_os_name(std::env::consts::OS, is_wsl())
    }

    fn from_os_name(os: &str, wsl: bool) -> Result<Platform, LocateError> {
        match os {
            "windows" => Ok(Platform::Windows),
            "macos" => Ok(Platform::MacOs),
            "linux" if wsl => Ok(Platform::Wsl),
            "linux" => Ok(Platform::Linux),
            other => Err(LocateError::UnsupportedPlatform(other.to_string())),
        }
    }
}

fn is_wsl() -> bool {
    fs::read_to_string("/proc/version")
        .map(|v| v.to_lowercase().contains("microsoft"))
        .unwrap_or(false)
}

fn join_all(base: PathBuf, parts: &[&str]) -> PathBuf {
    parts.iter().fold(base, |acc, part| acc.join(part))
}

/// Ordered candidate workspace-storage roots, most specific first.
///
/// The explicit env-var override is handled a level up (it bypasses
/// discovery entirely, see [`crate::config::RecallConfig`]); this returns
/// only the platform-derived candidates. None of them are guaranteed to
/// exist; validation is the [`crate::validate`] module's job.
pub fn candidate_roots(platform: Platform) -> Result<Vec<PathBuf>, LocateError> {
    match platform {
        Platform::Windows | Platform::MacOs | Platform::Linux => {
            let base = dirs::config_dir().ok_or(LocateError::NoConfigDir)?;
            Ok(vec![join_all(base, &STORAGE_SUBDIR)])
        }
        Platform::Wsl => {
            // Windows-side profiles first: that is where Cursor itself runs.
            let mut roots = windows_profile_roots(Path::new("/mnt/c/Users"));
            if let Some(base) = dirs::config_dir() {
                roots.push(join_all(base, &STORAGE_SUBDIR));
            }
            if roots.is_empty() {
                return Err(LocateError::NoConfigDir);
            }
            Ok(roots)
        }
    }
}

/// One candidate root per discoverable Windows user profile.
///
/// Unreadable profile listings yield an empty set rather than an error;
/// a WSL mount that is absent simply means no Windows-side candidates.
pub(crate) fn windows_profile_roots(users_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(users_dir) else {
        return Vec::new();
    };
    let mut roots: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            !SYSTEM_PROFILES
                .iter()
                .any(|sys| name.eq_ignore_ascii_case(sys))
        })
        .map(|entry| join_all(entry.path(), &WINDOWS_PROFILE_SUBDIR))
        .collect();
    roots.sort();
    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn unsupported_os_is_an_error() {
        let err = Platform::from_os_name("freebsd", false).unwrap_err();
        assert!(matches!(err, LocateError::UnsupportedPlatform(ref os) if os == "freebsd"));
    }

    #[test]
    fn linux_vs_wsl_split() {
        assert_eq!(Platform::from_os_name("linux", false).unwrap(), Platform::Linux);
        assert_eq!(Platform::from_os_name("linux", true).unwrap(), Platform::Wsl);
        assert_eq!(Platform::from_os_name("macos", false).unwrap(), Platform::MacOs);
        assert_eq!(Platform::from_os_name("windows", false).unwrap(), Platform::Windows);
    }

    #[test]
    fn profile_roots_skip_system_profiles() {
        let users = TempDir::new().unwrap();
        for name in ["alice", "bob", "Public", "Default", "All Users"] {
            std::fs::create_dir(users.path().join(name)).unwrap();
        }
        std::fs::write(users.path().join("desktop.ini"), "").unwrap();

        let roots = windows_profile_roots(users.path());
        assert_eq!(roots.len(), 2);
        assert!(roots[0].starts_with(users.path().join("alice")));
        assert!(roots[1].starts_with(users.path().join("bob")));
        for root in &roots {
            assert!(root.ends_with("AppData/Roaming/Cursor/User/workspaceStorage"));
        }
    }

    #[test]
    fn profile_roots_tolerate_missing_mount() {
        let roots = windows_profile_roots(Path::new("/definitely/not/a/mount"));
        assert!(roots.is_empty());
    }

    #[test]
    fn candidate_roots_end_in_workspace_storage() {
        let platform = Platform::detect().expect("test platforms are supported");
        let roots = candidate_roots(platform).unwrap();
        assert!(!roots.is_empty());
        assert!(roots.iter().any(|r| r.ends_with("workspaceStorage")));
    }
}
