// External rasterizer fallback using pdftoppm
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::RasterizeError;

/// Rasterizes a whole PDF into numbered page images on disk, independently
/// of the in-process renderer.
pub trait ExternalRasterizer {
    /// Writes `<output_prefix>-N.png` files and returns them in page order.
    fn rasterize(
        &self,
        input: &Path,
        output_prefix: &Path,
        dpi: u32,
    ) -> Result<Vec<PathBuf>, RasterizeError>;
}

const STDERR_SUMMARY_LINES: usize = 5;

/// Drives the poppler `pdftoppm` tool as a subprocess.
#[derive(Debug, Clone)]
pub struct SystemPdfRenderer {
    program: String,
    timeout: Duration,
}

impl SystemPdfRenderer {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl ExternalRasterizer for SystemPdfRenderer {
    fn rasterize(
        &self,
        input: &Path,
        output_prefix: &Path,
        dpi: u32,
    ) -> Result<Vec<PathBuf>, RasterizeError> {
        debug!(program = %self.program, dpi, "rasterizing {}", input.display());

        // poppler can warn at length on damaged files; an unread pipe would
        // stall the tool once its buffer fills, so stderr goes to a file.
        let mut stderr_log = tempfile::tempfile()?;
        let spawned = Command::new(&self.program)
            .arg("-png")
            .args(["-r", &dpi.to_string()])
            .arg(input)
            .arg(output_prefix)
            .stdout(Stdio::null())
            .stderr(stderr_log.try_clone()?)
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RasterizeError::ExternalToolUnavailable(self.program.clone()))
            }
            Err(e) => return Err(e.into()),
        };

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RasterizeError::TimedOut(self.timeout));
            }
            thread::sleep(Duration::from_millis(50));
        };

        if !status.success() {
            let mut stderr = Vec::new();
            stderr_log.seek(SeekFrom::Start(0))?;
            stderr_log.read_to_end(&mut stderr)?;
            let stderr = String::from_utf8_lossy(&stderr);
            let summary: Vec<&str> = stderr.lines().take(STDERR_SUMMARY_LINES).collect();
            return Err(RasterizeError::Failed(format!("{} {}", status, summary.join("; "))));
        }

        collect_page_images(output_prefix)
    }
}

/// pdftoppm names pages `<prefix>-1.png`, zero-padded for long documents.
pub fn collect_page_images(output_prefix: &Path) -> Result<Vec<PathBuf>, RasterizeError> {
    let dir = output_prefix.parent().unwrap_or_else(|| Path::new("."));
    let stem = output_prefix
        .file_name()
        .map(|s| format!("{}-", s.to_string_lossy()))
        .unwrap_or_default();

    let mut pages: Vec<(u32, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(number) = name
            .strip_prefix(stem.as_str())
            .and_then(|rest| rest.strip_suffix(".png"))
            .and_then(|n| n.parse::<u32>().ok())
        else {
            continue;
        };
        pages.push((number, path));
    }
    pages.sort_by_key(|(number, _)| *number);
    Ok(pages.into_iter().map(|(_, path)| path).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = SystemPdfRenderer::new("no-such-rasterizer-binary", Duration::from_secs(5));
        let result = renderer.rasterize(&dir.path().join("in.pdf"), &dir.path().join("page"), 200);
        assert!(matches!(result, Err(RasterizeError::ExternalToolUnavailable(_))));
    }

    #[cfg(unix)]
    fn fake_tool(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-pdftoppm");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[test]
    fn test_noisy_stderr_does_not_stall_the_tool() {
        let dir = tempfile::tempdir().unwrap();
        // Arguments: -png -r DPI INPUT PREFIX
        let tool = fake_tool(dir.path(), "head -c 262144 /dev/zero >&2\n: > \"$5-1.png\"");
        let renderer = SystemPdfRenderer::new(tool, Duration::from_secs(10));

        let pages = renderer
            .rasterize(&dir.path().join("in.pdf"), &dir.path().join("page"), 200)
            .unwrap();
        assert_eq!(pages, vec![dir.path().join("page-1.png")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_tool_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(dir.path(), "echo 'Syntax Error: broken xref' >&2\nexit 3");
        let renderer = SystemPdfRenderer::new(tool, Duration::from_secs(10));

        let result = renderer.rasterize(&dir.path().join("in.pdf"), &dir.path().join("page"), 200);
        match result {
            Err(RasterizeError::Failed(message)) => assert!(message.contains("broken xref"), "{}", message),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_tool_is_killed_at_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(dir.path(), "exec sleep 30");
        let renderer = SystemPdfRenderer::new(tool, Duration::from_secs(1));

        let started = Instant::now();
        let result = renderer.rasterize(&dir.path().join("in.pdf"), &dir.path().join("page"), 200);
        assert!(matches!(result, Err(RasterizeError::TimedOut(t)) if t == Duration::from_secs(1)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_collects_pages_in_numeric_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["page-10.png", "page-02.png", "page-1.png", "other-3.png", "page-x.png"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let pages = collect_page_images(&dir.path().join("page")).unwrap();
        let names: Vec<_> = pages
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["page-1.png", "page-02.png", "page-10.png"]);
    }
}
