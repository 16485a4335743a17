//! External-tool delivery through `yt-dlp` (or anything with the same CLI).

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::error::ToolError;
use super::tool::{DownloadTool, ToolOutcome, ToolRequest};

/// Marker yt-dlp prints when the output file is already present.
const ALREADY_DOWNLOADED: &str = " has already been downloaded";

/// Runs an external downloader once per attempt.
///
/// Invocation: `<program> [extra args] [--ffmpeg-location <ffmpeg>] -P <dir> -o <template> <url>`.
#[derive(Debug, Clone)]
pub struct YtDlpTool {
    program: PathBuf,
    ffmpeg: Option<PathBuf>,
    extra_args: Vec<String>,
}

impl YtDlpTool {
    /// Creates a tool running `program` with the default impersonation args.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ffmpeg: None,
            extra_args: vec![
                "--extractor-args".to_string(),
                "generic:impersonate=chrome".to_string(),
            ],
        }
    }

    /// Passes `--ffmpeg-location`.
    #[must_use]
    pub fn with_ffmpeg(mut self, ffmpeg: impl Into<PathBuf>) -> Self {
        self.ffmpeg = Some(ffmpeg.into());
        self
    }

    /// Replaces the extra arguments placed before the output options.
    #[must_use]
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// The full argument list for `request`.
    #[must_use]
    pub fn args(&self, request: &ToolRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.extra_args.iter().map(OsString::from).collect();
        if let Some(ffmpeg) = &self.ffmpeg {
            args.push("--ffmpeg-location".into());
            args.push(ffmpeg.into());
        }
        args.push("-P".into());
        args.push(request.output_dir.clone().into());
        args.push("-o".into());
        args.push(request.name_template.clone().into());
        args.push(request.url.clone().into());
        args
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

#[async_trait]
impl DownloadTool for YtDlpTool {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    #[instrument(level = "debug", skip(self, request), fields(url = %request.url))]
    async fn fetch(&self, request: &ToolRequest) -> Result<ToolOutcome, ToolError> {
        tokio::fs::create_dir_all(&request.output_dir)
            .await
            .map_err(|e| ToolError::io(&request.output_dir, e))?;

        let output = Command::new(&self.program)
            .args(self.args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ToolError::Spawn {
                program: self.program_name(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ToolError::Exited {
                program: self.program_name(),
                code: output.status.code(),
                stderr: last_line(&stderr).to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(path) = already_downloaded_path(&stdout) {
            return Ok(ToolOutcome::AlreadyStored(path));
        }
        debug!("external download finished");
        Ok(ToolOutcome::Stored(None))
    }
}

fn last_line(text: &str) -> &str {
    text.lines().rev().map(str::trim).find(|l| !l.is_empty()).unwrap_or("")
}

fn already_downloaded_path(stdout: &str) -> Option<PathBuf> {
    stdout.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("[download] ")?;
        let path = rest.strip_suffix(ALREADY_DOWNLOADED)?;
        Some(Path::new(path).to_path_buf())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request(dir: &Path) -> ToolRequest {
        ToolRequest {
            url: "https://tube.example/watch/1".to_string(),
            output_dir: dir.join("cats - Tube"),
            name_template: "[Tube] [cats] [%(channel)s] %(title)s [%(id)s].%(ext)s".to_string(),
        }
    }

    #[test]
    fn test_args_order() {
        let tool = YtDlpTool::new("yt-dlp").with_ffmpeg("/opt/ffmpeg/bin");
        let req = request(Path::new("/dl"));
        let args: Vec<String> = tool
            .args(&req)
            .into_iter()
            .map(|a| a.into_string().unwrap())
            .collect();
        assert_eq!(
            args,
            vec![
                "--extractor-args",
                "generic:impersonate=chrome",
                "--ffmpeg-location",
                "/opt/ffmpeg/bin",
                "-P",
                "/dl/cats - Tube",
                "-o",
                "[Tube] [cats] [%(channel)s] %(title)s [%(id)s].%(ext)s",
                "https://tube.example/watch/1",
            ]
        );
    }

    #[test]
    fn test_already_downloaded_path() {
        let stdout = "[generic] Extracting URL\n[download] /dl/a [x].mp4 has already been downloaded\n";
        assert_eq!(
            already_downloaded_path(stdout),
            Some(PathBuf::from("/dl/a [x].mp4"))
        );
        assert_eq!(already_downloaded_path("[download] 100%"), None);
    }

    #[test]
    fn test_last_line_skips_blank_tail() {
        assert_eq!(last_line("first\nERROR: boom\n\n"), "ERROR: boom");
        assert_eq!(last_line(""), "");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let tool = YtDlpTool::new(dir.path().join("no-such-downloader"));
        let result = tool.fetch(&request(dir.path())).await;
        assert!(matches!(result, Err(ToolError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_zero_exit_is_stored() {
        let dir = TempDir::new().unwrap();
        let tool = YtDlpTool::new("true").with_extra_args(Vec::new());
        let result = tool.fetch(&request(dir.path())).await.unwrap();
        assert_eq!(result, ToolOutcome::Stored(None));
        assert!(dir.path().join("cats - Tube").is_dir());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_exited_error() {
        let dir = TempDir::new().unwrap();
        let tool = YtDlpTool::new("false");
        let result = tool.fetch(&request(dir.path())).await;
        assert!(matches!(result, Err(ToolError::Exited { code: Some(1), .. })));
    }
}
