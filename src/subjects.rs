//! Subject discovery and pipeline housekeeping
//!
//! Listing subject folders, checking output directories, turning free text
//! into file names and running external commands.

use std::path::Path;
use std::process::Command;

use log::{debug, error};

use crate::error::{Error, Result};

/// Characters stripped from both ends of a name by [`mangle_string`]
const MANGLE_STRIP: &str = ",./;'[]\\|_=+<>?:{}!@#$%^&*()`~";

/// Captured output of a successful command
#[derive(Clone, Debug)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Sorted names of the subdirectories of `dir`, including hidden ones
pub fn list_dirs(dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Subject folder names in a directory of subjects
///
/// Sorted, with hidden (dot-prefixed) folders removed.
pub fn get_subjects(dir: &Path) -> Result<Vec<String>> {
    let subjects: Vec<String> = list_dirs(dir)?
        .into_iter()
        .filter(|name| !name.starts_with('.'))
        .collect();
    debug!("found {} subject(s) in '{}'", subjects.len(), dir.display());
    Ok(subjects)
}

/// Print the subdirectories of `dir`, one per line
pub fn print_dirs(dir: &Path) -> Result<()> {
    let dirs = list_dirs(dir)?;
    if dirs.is_empty() {
        println!("None found.");
    }
    for d in dirs {
        println!("    + {}", d);
    }
    Ok(())
}

/// Whether `dir` is a directory the current user can list and create files in
///
/// Access is decided by the kernel: a scratch file is created in `dir` and
/// removed again, so ownership, group bits and privileges all count.
pub fn has_permissions(dir: &Path) -> bool {
    let ok = dir.is_dir() && std::fs::read_dir(dir).is_ok() && tempfile::tempfile_in(dir).is_ok();
    if !ok {
        error!("no write access to directory {}", dir.display());
    }
    ok
}

/// Turn an arbitrary string into a usable folder or file name
///
/// Spaces become dashes, then punctuation (including underscores) and
/// double quotes are trimmed from both ends.
pub fn mangle_string(s: &str) -> String {
    s.replace(' ', "-")
        .trim_matches(|c: char| MANGLE_STRIP.contains(c))
        .trim_matches('"')
        .to_string()
}

/// Run a command through the shell
///
/// A non-zero exit status is returned as [`Error::CommandFailed`] carrying
/// the captured output; the caller decides whether to abort.
pub fn run(cmd: &str) -> Result<CommandOutput> {
    debug!("running `{}`", cmd);
    let output = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .output()
        .map_err(|e| Error::io("sh", e))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        let code = output.status.code();
        error!(
            "{} failed with returncode {:?}.\nSTDOUT: {}\nSTDERR: {}",
            cmd, code, stdout, stderr
        );
        return Err(Error::CommandFailed {
            cmd: cmd.to_string(),
            code,
            stdout,
            stderr,
        });
    }

    Ok(CommandOutput { stdout, stderr })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mangle_string() {
        assert_eq!(mangle_string("rest state scan"), "rest-state-scan");
        assert_eq!(mangle_string("__task_1__"), "task_1");
        assert_eq!(mangle_string("\"quoted\""), "quoted");
        assert_eq!(mangle_string("(a b)!"), "a-b");
    }

    #[test]
    fn test_mangle_strips_quotes_after_punctuation() {
        // Trailing punctuation goes first, exposing the quotes
        assert_eq!(mangle_string("\"name\"."), "name");
    }

    #[test]
    fn test_run_success() {
        let out = run("echo hello").unwrap();
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn test_run_failure() {
        match run("echo oops >&2; exit 3") {
            Err(Error::CommandFailed { code, stderr, .. }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr.trim(), "oops");
            }
            other => panic!("expected CommandFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_has_permissions_missing_dir() {
        assert!(!has_permissions(Path::new("/tmp/qcmon_missing_dir_12345")));
    }

    #[test]
    fn test_has_permissions_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(has_permissions(dir.path()));
    }

    #[test]
    fn test_has_permissions_not_a_directory() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(!has_permissions(file.path()));
    }

    #[cfg(unix)]
    #[test]
    fn test_has_permissions_follows_actual_access() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();

        // Privileged users may still write here; the answer must agree either way
        let writable = std::fs::File::create(locked.join("x")).is_ok();
        std::fs::remove_file(locked.join("x")).ok();
        assert_eq!(has_permissions(&locked), writable);

        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}
