use std::io::Write;
use std::process::{Child, Command, Stdio};

use log::{debug, trace};

use super::definitions::EXPECTED_VERSION;
use super::types::{GitError, GitOutput};

fn spawn_git_command(args: &[&str], working_dir: Option<&std::path::Path>) -> Result<Child, GitError> {
    debug!("git {}", args.join(" "));

    // Maintenance and gc could fire mid-rebase; neither benefits this
    // crate's work and both are a pure source of flakiness.
    let mut cmd = Command::new("git");
    cmd.env("LANG", "C.UTF-8")
        .env("LC_ALL", "C.UTF-8")
        .args(["-c", "gc.auto=0", "-c", "maintenance.auto=0"])
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }

    Ok(cmd.spawn()?)
}

/// Run a git command to completion, capturing stdout/stderr. No stdin is
/// written; callers needing to feed stdin use [`feed_git_command`].
pub fn capture_git_output(args: &[&str]) -> Result<GitOutput, GitError> {
    let child = spawn_git_command(args, None)?;
    let out = child.wait_with_output()?;
    let output = GitOutput {
        stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
    };
    trace!("stdout: {}", output.stdout);
    trace!("stderr: {}", output.stderr);
    if !out.status.success() {
        return Err(map_git_error(out.status.code(), output));
    }
    Ok(output)
}

/// Run a git command, writing `stdin` to the child before reading its
/// output. Used for `update-ref --stdin`, `notes --stdin`-style batches.
pub fn feed_git_command(args: &[&str], stdin: &str) -> Result<GitOutput, GitError> {
    let mut child = spawn_git_command(args, None)?;
    {
        let pipe = child.stdin.as_mut().expect("stdin was piped");
        pipe.write_all(stdin.as_bytes())?;
    }
    let out = child.wait_with_output()?;
    let output = GitOutput {
        stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
    };
    if !out.status.success() {
        return Err(map_git_error(out.status.code(), output));
    }
    Ok(output)
}

/// git's exit codes are not reliably distinct across commands, so error
/// classification falls back to matching known stderr phrasing. Fragile,
/// but no more reliable signal exists short of parsing porcelain output
/// that most of these commands don't offer.
fn map_git_error(code: Option<i32>, output: GitOutput) -> GitError {
    let stderr = output.stderr.to_lowercase();
    if stderr.contains("cannot lock ref") {
        GitError::RefFailedToLock { output }
    } else if stderr.contains("but expected") {
        GitError::RefConcurrentModification { output }
    } else if stderr.contains("bad object") || stderr.contains("bad revision") {
        GitError::BadObject {
            object: output.stderr.trim().to_string(),
        }
    } else {
        GitError::ExecError { code, output }
    }
}

fn parse_git_version(raw: &str) -> Option<(u32, u32, u32)> {
    let version_str = raw.trim().strip_prefix("git version ")?;
    let mut parts = version_str.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts
        .next()
        .and_then(|p| p.split(|c: char| !c.is_ascii_digit()).next())
        .and_then(|p| p.parse().ok())
        .unwrap_or(0);
    Some((major, minor, patch))
}

pub fn get_git_version() -> Result<(u32, u32, u32), GitError> {
    let output = capture_git_output(&["version"])?;
    parse_git_version(&output.stdout).ok_or(GitError::ExecError {
        code: None,
        output: GitOutput {
            stdout: "could not parse git version".to_string(),
            stderr: String::new(),
        },
    })
}

/// Refuses to proceed against a git older than [`EXPECTED_VERSION`].
pub fn check_git_version() -> Result<(u32, u32, u32), GitError> {
    let version = get_git_version()?;
    if version < EXPECTED_VERSION {
        return Err(GitError::ExecError {
            code: None,
            output: GitOutput {
                stdout: format!(
                    "git {}.{}.{} or newer is required, found {}.{}.{}",
                    EXPECTED_VERSION.0,
                    EXPECTED_VERSION.1,
                    EXPECTED_VERSION.2,
                    version.0,
                    version.1,
                    version.2
                ),
                stderr: String::new(),
            },
        });
    }
    Ok(version)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_git_version() {
        assert_eq!(parse_git_version("git version 2.39.2"), Some((2, 39, 2)));
        assert_eq!(
            parse_git_version("git version 2.45.0.windows.1"),
            Some((2, 45, 0))
        );
        assert_eq!(parse_git_version("nonsense"), None);
    }

    #[test]
    fn test_version_ordering() {
        assert!((1, 7, 5) < (1, 7, 8));
        assert!((2, 6, 0) > (1, 7, 8));
    }
}
