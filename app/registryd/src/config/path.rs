//! Shell-like path expansion for configured paths.

use std::path::PathBuf;

/// Expands a leading `~` to the home directory.
///
/// Absolute and relative paths are returned unchanged; an empty or blank
/// string yields an empty path.
#[must_use]
pub fn expand(path: &str) -> PathBuf {
    let path = path.trim();

    if path.is_empty() {
        return PathBuf::new();
    }

    let expanded = shellexpand::tilde(path);
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand("~/registryd.sock"), home.join("registryd.sock"));
        }
    }

    #[test]
    fn test_absolute_and_relative_unchanged() {
        assert_eq!(expand("/run/user/1000/a.sock"), PathBuf::from("/run/user/1000/a.sock"));
        assert_eq!(expand("a.sock"), PathBuf::from("a.sock"));
    }

    #[test]
    fn test_blank_is_empty() {
        assert_eq!(expand("   "), PathBuf::new());
    }
}
