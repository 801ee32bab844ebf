use std::path::{Component, Path, PathBuf};

/// Canonicalize a resource URI.
///
/// Non-`file` schemes pass through verbatim. File references (with or
/// without a `file://` prefix) resolve to a symlink-free absolute path,
/// then:
/// - under `root`: `file://<path-relative-to-root>`
/// - otherwise: `file://<absolute-path>`
///
/// A relative `file://` reference (the relative form emitted above)
/// resolves against `root` rather than the process cwd, so the function is
/// idempotent: `canonicalize(canonicalize(u, r), r) == canonicalize(u, r)`.
pub fn canonicalize(uri: &str, root: Option<&Path>) -> String {
    let path_str = match uri.split_once("://") {
        Some(("file", rest)) => rest,
        Some((_, _)) => return uri.to_string(),
        None => uri,
    };

    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match root {
            Some(root) => root.join(path),
            None => std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf()),
        }
    };
    let resolved = normalize_path(&absolute);

    if let Some(root) = root
        && let Ok(relative) = resolved.strip_prefix(normalize_path(root))
    {
        return format!("file://{}", relative.display());
    }

    format!("file://{}", resolved.display())
}

/// Resolve symlinks when the path exists; fall back to a lexical
/// normalization (squashing `.` and `..`) when it does not.
fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| lexical_normalize(path))
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}
