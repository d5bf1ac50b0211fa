//! Permission bits and group ownership for files the collector creates.

use crate::error::FatalError;
use nix::unistd::{chown, Gid, Group};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Mode and optional group applied to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    mode: u32,
    group: Option<Gid>,
}

impl Ownership {
    /// Ownership that only sets permission bits.
    pub fn new(mode: u32) -> Self {
        Self { mode, group: None }
    }

    /// Look up `group_name` (if any) and pair it with `mode`.
    ///
    /// An unknown group is an error rather than being silently skipped.
    pub fn resolve(mode: u32, group_name: Option<&str>) -> Result<Self, FatalError> {
        let group = match group_name.filter(|name| !name.is_empty()) {
            None => None,
            Some(name) => match Group::from_name(name) {
                Ok(Some(group)) => Some(group.gid),
                Ok(None) => {
                    return Err(FatalError::Group {
                        name: name.to_string(),
                        reason: "no such group".to_string(),
                    })
                }
                Err(errno) => {
                    return Err(FatalError::Group {
                        name: name.to_string(),
                        reason: errno.to_string(),
                    })
                }
            },
        };

        Ok(Self { mode, group })
    }

    /// Permission bits to apply.
    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// Group to assign, if configured.
    pub fn group(&self) -> Option<Gid> {
        self.group
    }

    /// Set the permission bits and, when configured, the group of `path`.
    pub fn apply(&self, path: &Path) -> Result<(), FatalError> {
        fs::set_permissions(path, fs::Permissions::from_mode(self.mode)).map_err(|source| {
            FatalError::Ownership {
                path: path.to_path_buf(),
                source,
            }
        })?;
        self.apply_group(path)
    }

    /// Set only the group of `path`. No-op without a configured group.
    pub fn apply_group(&self, path: &Path) -> Result<(), FatalError> {
        if let Some(gid) = self.group {
            chown(path, None, Some(gid)).map_err(|errno| FatalError::Ownership {
                path: path.to_path_buf(),
                source: errno.into(),
            })?;
        }
        Ok(())
    }
}
