//! Utility functions.
use std::path::{Path, PathBuf};

use camino::Utf8Path;
use web_time::{SystemTime, UNIX_EPOCH};

/// This function searches upward from `start` for directories or files matching `item`. It returns
/// a `Vec<PathBuf>` to all found instances in order of closest to furthest away. The function only
/// searches up within subdirectories of `end`.
pub fn search_upward(
    start: impl AsRef<Path>,
    end: impl AsRef<Path>,
    item: impl AsRef<Path>,
) -> Vec<PathBuf> {
    start
        .as_ref()
        .ancestors()
        .take_while(|p| p.starts_with(end.as_ref()))
        .map(|p| p.join(&item))
        .filter(|p| p.try_exists().is_ok_and(std::convert::identity))
        .collect()
}

/// Get the full extension of a path, including all extensions.
/// For example, for "graph.tgraph.ron", this function returns "tgraph.ron".
#[must_use]
pub fn get_multi_extension(path: &Utf8Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.find('.').map(|pos| name[pos + 1..].to_string()))
}

/// Wall clock time in seconds since the unix epoch.
#[must_use]
pub fn unix_now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    use camino::Utf8PathBuf;

    #[test]
    fn multi_extension() {
        assert_eq!(
            get_multi_extension(&Utf8PathBuf::from("/tmp/run3.tgraph.ron")),
            Some("tgraph.ron".to_string())
        );
        assert_eq!(get_multi_extension(&Utf8PathBuf::from("noext")), None);
    }

    #[test]
    fn search_upward_finds_nothing_for_missing_item() {
        let dir = std::env::temp_dir();
        assert!(search_upward(&dir, "/", "surely-not-a-telegraph-dir-6f1e").is_empty());
    }

    #[test]
    fn wall_clock_is_after_2020() {
        assert!(unix_now_seconds() > 1_577_836_800.0);
    }
}
