//! Path resolution confined to the extraction root
//!
//! Paths named by an archive's `manifest.json` are attacker-controlled. They
//! are resolved one component at a time, following symlinks, and the load is
//! rejected as soon as the walk would leave the root. Nothing outside the
//! root is ever read.

use crate::error::{PusherError, Result};
use std::collections::VecDeque;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

const MAX_SYMLINK_HOPS: usize = 255;

enum Step {
    Current,
    Parent,
    Name(OsString),
}

/// Resolve `relative` against `root`, following symlinks, without escaping `root`
pub fn resolve_in_scope(root: &Path, relative: &str) -> Result<PathBuf> {
    let root = root.canonicalize().map_err(|e| {
        PusherError::Load(format!("Cannot resolve archive root {}: {}", root.display(), e))
    })?;

    let mut pending = split_relative(Path::new(relative), relative)?;
    let mut resolved: Vec<OsString> = Vec::new();
    let mut hops = 0usize;

    while let Some(step) = pending.pop_front() {
        match step {
            Step::Current => {}
            Step::Parent => {
                if resolved.pop().is_none() {
                    return Err(escape_error(relative));
                }
            }
            Step::Name(name) => {
                let candidate = join_all(&root, &resolved).join(&name);
                let metadata = match std::fs::symlink_metadata(&candidate) {
                    Ok(metadata) => metadata,
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        resolved.push(name);
                        continue;
                    }
                    Err(e) => {
                        return Err(PusherError::Load(format!(
                            "Cannot inspect {}: {}",
                            candidate.display(),
                            e
                        )))
                    }
                };

                if !metadata.file_type().is_symlink() {
                    resolved.push(name);
                    continue;
                }

                hops += 1;
                if hops > MAX_SYMLINK_HOPS {
                    return Err(PusherError::Load(format!(
                        "Too many symlinks while resolving '{}'",
                        relative
                    )));
                }

                let target = std::fs::read_link(&candidate).map_err(|e| {
                    PusherError::Load(format!("Cannot read link {}: {}", candidate.display(), e))
                })?;

                let mut next = if target.is_absolute() {
                    let inside = target
                        .strip_prefix(&root)
                        .map_err(|_| escape_error(relative))?;
                    resolved.clear();
                    split_relative(inside, relative)?
                } else {
                    split_relative(&target, relative)?
                };

                next.extend(pending.drain(..));
                pending = next;
            }
        }
    }

    Ok(join_all(&root, &resolved))
}

fn split_relative(path: &Path, original: &str) -> Result<VecDeque<Step>> {
    path.components()
        .map(|component| match component {
            Component::CurDir => Ok(Step::Current),
            Component::ParentDir => Ok(Step::Parent),
            Component::Normal(name) => Ok(Step::Name(name.to_os_string())),
            Component::RootDir | Component::Prefix(_) => Err(escape_error(original)),
        })
        .collect()
}

fn join_all(root: &Path, parts: &[OsString]) -> PathBuf {
    parts.iter().fold(root.to_path_buf(), |path, part| path.join(part))
}

fn escape_error(path: &str) -> PusherError {
    PusherError::Load(format!("Path '{}' resolves outside the archive root", path))
}
