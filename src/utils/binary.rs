use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::settings::Settings;

const YTDLP: &str = "yt-dlp";

fn executable_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

/// Where a bundled copy of yt-dlp is expected to live.
pub fn bundled_ytdlp_path(bin_dir: &Path) -> PathBuf {
    bin_dir.join(executable_name(YTDLP))
}

/// Picks the yt-dlp executable: explicit override, then the bundled
/// binary, then whatever `yt-dlp` resolves to on the search path.
pub fn resolve_ytdlp(settings: &Settings) -> PathBuf {
    if let Some(path) = settings.ytdlp_path.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        info!("Using yt-dlp from YTDLP_PATH: {}", path);
        return PathBuf::from(path);
    }

    let bundled = bundled_ytdlp_path(&settings.bin_dir);
    if bundled.is_file() {
        info!("Using bundled yt-dlp at {}", bundled.display());
        return bundled;
    }

    debug!(
        "No bundled yt-dlp at {}, falling back to search path",
        bundled.display()
    );
    PathBuf::from(YTDLP)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(ytdlp_path: Option<&str>, bin_dir: &Path) -> Settings {
        Settings {
            ytdlp_path: ytdlp_path.map(String::from),
            bin_dir: bin_dir.to_path_buf(),
            ..Settings::default()
        }
    }

    #[test]
    fn override_wins_over_bundled_binary() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(bundled_ytdlp_path(dir.path()), b"").unwrap();

        let resolved = resolve_ytdlp(&settings(Some("/opt/tools/yt-dlp"), dir.path()));
        assert_eq!(resolved, PathBuf::from("/opt/tools/yt-dlp"));
    }

    #[test]
    fn bundled_binary_is_used_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let bundled = bundled_ytdlp_path(dir.path());
        std::fs::write(&bundled, b"").unwrap();

        assert_eq!(resolve_ytdlp(&settings(None, dir.path())), bundled);
    }

    #[test]
    fn falls_back_to_bare_command() {
        let dir = tempfile::tempdir().unwrap();

        assert_eq!(resolve_ytdlp(&settings(None, dir.path())), PathBuf::from("yt-dlp"));
        assert_eq!(resolve_ytdlp(&settings(Some("  "), dir.path())), PathBuf::from("yt-dlp"));
    }
}
