//! Rights service session saved between invocations

use anyhow::{Context as _, Result};
use std::io::ErrorKind;
use std::path::Path;

/// Saved session id, if any
pub fn load(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let id = content.trim();
            Ok((!id.is_empty()).then(|| id.to_string()))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Cannot read session from {}", path.display())),
    }
}

/// Write the session id, readable by its owner only
pub fn save(path: &Path, session_id: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create {}", dir.display()))?;
    }
    std::fs::write(path, session_id)
        .with_context(|| format!("Cannot save session to {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Cannot restrict {}", path.display()))?;
    }
    Ok(())
}

/// Forget the saved session; false when there was none
pub fn clear(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Cannot remove {}", path.display())),
    }
}
