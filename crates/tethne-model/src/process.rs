//! Running external model binaries (MALLET, DTM).

use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use regex::Regex;
use tethne_common::{Result, TethneError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Lines of stderr kept for error reports.
pub const STDERR_TAIL: usize = 40;

/// One external invocation. Stdout is discarded; stderr is read line by
/// line, matched against the progress regex, and its tail kept for errors.
#[derive(Debug, Clone)]
pub struct ExternalProcess {
    program: PathBuf,
    args: Vec<OsString>,
    progress: Option<Regex>,
    tail: usize,
}

impl ExternalProcess {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            progress: None,
            tail: STDERR_TAIL,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Stderr lines matching `regex` are returned by [`run`](Self::run) as
    /// their capture groups.
    pub fn progress(mut self, regex: Regex) -> Self {
        self.progress = Some(regex);
        self
    }

    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    fn failure(&self, workdir: &Path, status: String, tail: &VecDeque<String>) -> TethneError {
        TethneError::Subprocess {
            program: self.program_name(),
            status,
            stderr_tail: tail.iter().cloned().collect::<Vec<_>>().join("\n"),
            workdir: workdir.to_path_buf(),
        }
    }

    /// Run to completion in `workdir`. The child is killed if the returned
    /// future is dropped.
    pub async fn run(&self, workdir: &Path) -> Result<Vec<Vec<String>>> {
        info!(program = %self.program.display(), args = ?self.args, "starting external process");
        let mut tail: VecDeque<String> = VecDeque::with_capacity(self.tail);
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.failure(workdir, format!("failed to start: {e}"), &tail))?;

        let mut matches = Vec::new();
        if let Some(stderr) = child.stderr.take() {
            let mut lines = BufReader::new(stderr).lines();
            while let Some(line) = lines.next_line().await? {
                if let Some(caps) = self.progress.as_ref().and_then(|re| re.captures(&line)) {
                    matches.push(
                        caps.iter()
                            .skip(1)
                            .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                            .collect(),
                    );
                }
                if tail.len() == self.tail {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            warn!(program = %self.program.display(), %status, "external process failed");
            return Err(self.failure(workdir, status.to_string(), &tail));
        }
        debug!(program = %self.program.display(), progress_lines = matches.len(), "external process finished");
        Ok(matches)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_progress_lines_are_captured() {
        let dir = tempfile::tempdir().unwrap();
        let process = ExternalProcess::new("sh")
            .arg("-c")
            .arg("echo '<10> LL/token: -9.5' >&2; echo noise >&2; echo '<20> LL/token: -8.25' >&2")
            .progress(Regex::new(r"<(\d+)> LL/token: (-?[\d.]+)").unwrap());
        let matches = process.run(dir.path()).await.unwrap();
        assert_eq!(matches, vec![vec!["10".to_string(), "-9.5".into()], vec!["20".into(), "-8.25".into()]]);
    }

    #[tokio::test]
    async fn test_failure_reports_stderr_tail() {
        let dir = tempfile::tempdir().unwrap();
        let err = ExternalProcess::new("sh")
            .args(["-c", "echo 'out of memory' >&2; exit 3"])
            .run(dir.path())
            .await
            .unwrap_err();
        match err {
            TethneError::Subprocess { stderr_tail, workdir, .. } => {
                assert_eq!(stderr_tail, "out of memory");
                assert_eq!(workdir, dir.path());
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let err = ExternalProcess::new("/nonexistent/mallet").run(dir.path()).await.unwrap_err();
        assert!(matches!(err, TethneError::Subprocess { .. }));
    }
}
