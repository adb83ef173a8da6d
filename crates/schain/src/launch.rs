//! Hand off to the target command
//!
//! On Unix the target replaces this process (`execve`): same pid, same
//! standard streams, and nothing of schain left running to hold decrypted
//! secrets. Elsewhere the target is spawned and its exit status becomes
//! ours.

use std::convert::Infallible;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::env::Environment;
use crate::error::{ChainError, Result};

/// Find `command` on the executable search path.
pub fn resolve(command: impl AsRef<OsStr>) -> Result<PathBuf> {
    let command = command.as_ref();
    which::which(command)
        .map_err(|_| ChainError::CommandNotFound(command.to_string_lossy().into_owned()))
}

/// Build the target command: `argv[0]` as typed, the remaining arguments,
/// and exactly the variables in `env`.
pub fn command(path: &Path, argv: &[OsString], env: &Environment) -> Command {
    let mut cmd = Command::new(path);

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        if let Some(arg0) = argv.first() {
            cmd.arg0(arg0);
        }
    }

    cmd.args(argv.iter().skip(1));
    cmd.env_clear();
    cmd.envs(env.vars().iter().map(|(name, value)| (name, value)));
    cmd
}

/// Replace the current process with the target command.
///
/// Only returns on failure.
#[cfg(unix)]
pub fn launch(path: &Path, argv: &[OsString], env: &Environment) -> Result<Infallible> {
    use std::os::unix::process::CommandExt;

    debug!(path = %path.display(), args = argv.len(), vars = env.len(), "exec");
    let err = command(path, argv, env).exec();

    Err(ChainError::Launch {
        path: path.to_path_buf(),
        source: err,
    })
}

/// Run the target command to completion and exit with its status.
#[cfg(not(unix))]
pub fn launch(path: &Path, argv: &[OsString], env: &Environment) -> Result<Infallible> {
    debug!(path = %path.display(), args = argv.len(), vars = env.len(), "spawn");
    let status = command(path, argv, env)
        .status()
        .map_err(|source| ChainError::Launch {
            path: path.to_path_buf(),
            source,
        })?;

    std::process::exit(status.code().unwrap_or(1));
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_finds_sh() {
        let path = resolve("sh").unwrap();
        assert!(path.is_absolute());
    }

    #[test]
    fn test_resolve_unknown_command() {
        assert!(matches!(
            resolve("schain-definitely-not-a-command"),
            Err(ChainError::CommandNotFound(name)) if name == "schain-definitely-not-a-command"
        ));
    }

    #[test]
    fn test_command_gets_exact_environment() {
        let mut env = Environment::new();
        env.push("PATH", "/usr/bin:/bin");
        env.push("FOO", "first");
        env.push("FOO", "bar");

        let argv = vec![OsString::from("env")];
        let output = command(&resolve("env").unwrap(), &argv, &env)
            .output()
            .unwrap();
        assert!(output.status.success());

        let stdout = String::from_utf8(output.stdout).unwrap();
        let lines: Vec<&str> = stdout.lines().collect();
        assert!(lines.contains(&"FOO=bar"));
        assert!(!lines.contains(&"FOO=first"));
        assert!(!lines.iter().any(|l| l.starts_with("HOME=")));
    }

    #[test]
    fn test_command_passes_arguments() {
        let argv: Vec<OsString> = ["sh", "-c", "echo \"$0:$1\"", "zero", "one"]
            .iter()
            .map(OsString::from)
            .collect();
        let output = command(&resolve("sh").unwrap(), &argv, &Environment::new())
            .output()
            .unwrap();

        assert_eq!(String::from_utf8(output.stdout).unwrap(), "zero:one\n");
    }
}
