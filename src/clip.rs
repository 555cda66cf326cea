//! Download, transcode and trim one clip.
//!
//! [`YtDlpFetcher`] drives three external tools:
//! 1. `yt-dlp` downloads the best audio stream and transcodes it to mp3 at
//!    `temp_{name}.mp3.mp3` in the destination folder
//! 2. `ffprobe` reads the source duration
//! 3. `ffmpeg` cuts the first `min(duration, clip_secs)` seconds into
//!    `{name}.mp3`
//!
//! The temp file is removed when the fetch ends, whether it succeeded or not.

use crate::error::ClipError;
use crate::reconcile::temp_file_name;
use crate::utils::{clip_length, sanitize_filename, truncate_for_log};
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Default clip length in seconds.
pub const CLIP_SECONDS: u64 = 40;

/// Default download size cap in MiB.
pub const MAX_FILESIZE_MB: u64 = 50;

/// Fetches a clip for a resolved link into a destination folder.
pub trait ClipFetcher {
    /// Returns the path of the final clip.
    async fn fetch_clip(&self, link: &str, folder: &Path, display_name: &str) -> Result<PathBuf, ClipError>;
}

/// Where the intermediate and final files for a display name live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipPaths {
    pub temp: PathBuf,
    pub clip: PathBuf,
}

impl ClipPaths {
    pub fn new(folder: &Path, display_name: &str) -> Self {
        let name = sanitize_filename(display_name);
        Self {
            temp: folder.join(temp_file_name(&name)),
            clip: folder.join(format!("{name}.mp3")),
        }
    }
}

/// Deletes the wrapped file when dropped.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed temp artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Could not remove temp artifact"),
        }
    }
}

/// Tunables for [`YtDlpFetcher`].
#[derive(Debug, Clone)]
pub struct ClipSettings {
    pub clip_secs: f64,
    pub max_filesize_mb: u64,
    pub socket_timeout: Duration,
}

impl Default for ClipSettings {
    fn default() -> Self {
        Self {
            clip_secs: CLIP_SECONDS as f64,
            max_filesize_mb: MAX_FILESIZE_MB,
            socket_timeout: Duration::from_secs(30),
        }
    }
}

/// [`ClipFetcher`] backed by yt-dlp, ffprobe and ffmpeg.
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    pub yt_dlp: PathBuf,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub settings: ClipSettings,
}

/// yt-dlp output template producing exactly `temp` once `%(ext)s` is `mp3`.
///
/// `%` in the name is doubled so yt-dlp does not read it as a field.
pub fn output_template(temp: &Path) -> String {
    let raw = temp.to_string_lossy().into_owned();
    let stem = raw.strip_suffix(".mp3").unwrap_or(&raw[..]);
    format!("{}.%(ext)s", stem.replace('%', "%%"))
}

/// Parse ffprobe's `format=duration` output.
pub fn parse_duration(stdout: &str) -> Option<f64> {
    stdout.trim().lines().next()?.trim().parse::<f64>().ok()
}

fn stderr_of(output: &Output) -> String {
    truncate_for_log(String::from_utf8_lossy(&output.stderr).trim(), 300)
}

impl YtDlpFetcher {
    async fn download(&self, link: &str, temp: &Path) -> Result<(), ClipError> {
        let output = Command::new(&self.yt_dlp)
            .args(["-f", "bestaudio/best"])
            .args(["-x", "--audio-format", "mp3", "--audio-quality", "192K"])
            .arg("--max-filesize")
            .arg(format!("{}M", self.settings.max_filesize_mb))
            .arg("--socket-timeout")
            .arg(self.settings.socket_timeout.as_secs().to_string())
            .args(["--no-playlist", "--quiet", "--no-warnings"])
            .arg("-o")
            .arg(output_template(temp))
            .arg(link)
            .kill_on_drop(true)
            .output()
            .await?;
        if !output.status.success() {
            return Err(ClipError::Download(stderr_of(&output)));
        }
        Ok(())
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64, ClipError> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-show_entries", "format=duration", "-of", "csv=p=0"])
            .arg(path)
            .output()
            .await?;
        if !output.status.success() {
            return Err(ClipError::Probe(stderr_of(&output)));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_duration(&stdout).ok_or_else(|| ClipError::Probe(format!("unexpected output: {}", stdout.trim())))
    }

    async fn trim(&self, source: &Path, dest: &Path, secs: f64) -> Result<(), ClipError> {
        let output = Command::new(&self.ffmpeg)
            .args(["-y", "-v", "error", "-i"])
            .arg(source)
            .arg("-t")
            .arg(format!("{secs:.3}"))
            .args(["-codec:a", "libmp3lame", "-b:a", "192k"])
            .arg(dest)
            .output()
            .await?;
        if !output.status.success() {
            let _ = tokio::fs::remove_file(dest).await;
            return Err(ClipError::Trim(stderr_of(&output)));
        }
        Ok(())
    }
}

impl ClipFetcher for YtDlpFetcher {
    #[instrument(level = "info", skip(self, folder), fields(folder = %folder.display()))]
    async fn fetch_clip(&self, link: &str, folder: &Path, display_name: &str) -> Result<PathBuf, ClipError> {
        let paths = ClipPaths::new(folder, display_name);
        let temp = TempArtifact::new(paths.temp.clone());

        self.download(link, temp.path()).await?;
        if !tokio::fs::try_exists(temp.path()).await.unwrap_or(false) {
            return Err(ClipError::MissingArtifact(paths.temp));
        }

        let source_secs = self.probe_duration(temp.path()).await?;
        let secs = clip_length(source_secs, self.settings.clip_secs).ok_or(ClipError::ZeroDuration)?;

        self.trim(temp.path(), &paths.clip, secs).await?;
        info!(path = %paths.clip.display(), source_secs, clip_secs = secs, "Saved clip");
        Ok(paths.clip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_paths_sanitized() {
        let paths = ClipPaths::new(Path::new("busca_completa"), "What's New? - Bob Haggart");
        assert_eq!(paths.clip, PathBuf::from("busca_completa/What's New - Bob Haggart.mp3"));
        assert_eq!(paths.temp, PathBuf::from("busca_completa/temp_What's New - Bob Haggart.mp3.mp3"));
    }

    #[test]
    fn test_output_template() {
        let temp = PathBuf::from("busca_por_titulo/temp_100% Nardis.mp3.mp3");
        assert_eq!(output_template(&temp), "busca_por_titulo/temp_100%% Nardis.mp3.%(ext)s");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("187.402000\n"), Some(187.402));
        assert_eq!(parse_duration("N/A\n"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_temp_artifact_removed_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("temp_x.mp3.mp3");
        std::fs::write(&path, b"data").unwrap();
        {
            let _guard = TempArtifact::new(path.clone());
        }
        assert!(!path.exists());

        // dropping a guard for a file that never appeared is fine
        drop(TempArtifact::new(tmp.path().join("never.mp3.mp3")));
    }

    #[test]
    fn test_clip_settings_default() {
        let settings = ClipSettings::default();
        assert_eq!(settings.clip_secs, 40.0);
        assert_eq!(settings.max_filesize_mb, 50);
    }

    /// Writes an executable shell script into `dir`.
    #[cfg(unix)]
    fn stub(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// yt-dlp stand-in that writes the file named by its `-o` template.
    #[cfg(unix)]
    const YT_DLP_WRITES: &str = r#"out=""
prev=""
for a in "$@"; do
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
done
out=$(printf '%s' "$out" | sed -e 's/%(ext)s/mp3/' -e 's/%%/%/g')
printf 'audio' > "$out""#;

    /// Fetcher wired to stub tools in `bin`, reporting `duration` from ffprobe.
    #[cfg(unix)]
    fn stub_fetcher(bin: &Path, yt_dlp_body: &str, duration: &str) -> YtDlpFetcher {
        let args_log = bin.join("ffmpeg.args");
        YtDlpFetcher {
            yt_dlp: stub(bin, "yt-dlp", yt_dlp_body),
            ffprobe: stub(bin, "ffprobe", &format!("echo '{duration}'")),
            ffmpeg: stub(
                bin,
                "ffmpeg",
                &format!("echo \"$@\" > '{}'\nfor a in \"$@\"; do last=\"$a\"; done\nprintf 'clip' > \"$last\"", args_log.display()),
            ),
            settings: ClipSettings::default(),
        }
    }

    #[cfg(unix)]
    fn dir_listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_clip_trims_to_limit_and_removes_temp() {
        let bin = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let fetcher = stub_fetcher(bin.path(), YT_DLP_WRITES, "187.400000");

        let clip = fetcher
            .fetch_clip("https://video/1", out.path(), "What 100% - A")
            .await
            .unwrap();
        assert_eq!(clip, out.path().join("What 100% - A.mp3"));
        assert_eq!(dir_listing(out.path()), vec!["What 100% - A.mp3".to_string()]);

        let ffmpeg_args = std::fs::read_to_string(bin.path().join("ffmpeg.args")).unwrap();
        assert!(ffmpeg_args.contains("-t 40.000"), "ffmpeg args: {ffmpeg_args}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_clip_keeps_short_source_length() {
        let bin = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let fetcher = stub_fetcher(bin.path(), YT_DLP_WRITES, "12.5");

        fetcher.fetch_clip("https://video/2", out.path(), "Short").await.unwrap();
        let ffmpeg_args = std::fs::read_to_string(bin.path().join("ffmpeg.args")).unwrap();
        assert!(ffmpeg_args.contains("-t 12.500"), "ffmpeg args: {ffmpeg_args}");
        assert_eq!(dir_listing(out.path()), vec!["Short.mp3".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_clip_zero_duration_leaves_nothing() {
        let bin = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let fetcher = stub_fetcher(bin.path(), YT_DLP_WRITES, "0.000000");

        let err = fetcher.fetch_clip("https://video/3", out.path(), "Silence").await.unwrap_err();
        assert!(matches!(err, ClipError::ZeroDuration));
        assert!(dir_listing(out.path()).is_empty());
        assert!(!bin.path().join("ffmpeg.args").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_clip_missing_artifact() {
        let bin = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let fetcher = stub_fetcher(bin.path(), "exit 0", "187.4");

        let err = fetcher.fetch_clip("https://video/4", out.path(), "Ghost").await.unwrap_err();
        assert!(matches!(err, ClipError::MissingArtifact(path) if path == out.path().join("temp_Ghost.mp3.mp3")));
        assert!(dir_listing(out.path()).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_clip_download_failure_cleans_up() {
        let bin = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let body = format!("{YT_DLP_WRITES}\necho 'HTTP Error 403' >&2\nexit 1");
        let fetcher = stub_fetcher(bin.path(), &body, "187.4");

        let err = fetcher.fetch_clip("https://video/5", out.path(), "Blocked").await.unwrap_err();
        assert!(matches!(&err, ClipError::Download(msg) if msg.contains("403")));
        assert!(dir_listing(out.path()).is_empty());
    }
}
