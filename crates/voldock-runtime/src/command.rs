use crate::error::{Result, RuntimeError};
use tracing::debug;

/// Output from a command execution
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

fn command_line(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Execute a command and fail on non-zero exit code
pub async fn exec(program: &str, args: &[&str]) -> Result<CommandOutput> {
    let output = exec_unchecked(program, args).await?;

    if !output.success() {
        return Err(RuntimeError::command_failed(
            command_line(program, args),
            output.exit_code,
            output.stderr.trim(),
        ));
    }

    Ok(output)
}

/// Execute a command and return output regardless of exit code
///
/// The child is killed if the returned future is dropped, so an enclosing
/// timeout does not leave it running.
pub async fn exec_unchecked(program: &str, args: &[&str]) -> Result<CommandOutput> {
    let line = command_line(program, args);
    debug!("Executing: {}", line);

    let output = tokio::process::Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| RuntimeError::command_failed(&line, -1, e.to_string()))?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code().unwrap_or(-1);

    debug!("Command exited with code {}: {}", exit_code, line);

    Ok(CommandOutput {
        stdout,
        stderr,
        exit_code,
    })
}

/// Execute a whitespace-separated command line such as a rendered format
/// command (`mkfs.ext4 -m0 /dev/rbd0`)
pub async fn exec_line(line: &str) -> Result<CommandOutput> {
    let mut parts = line.split_whitespace();
    let program = parts.next().ok_or_else(|| {
        RuntimeError::invalid_config(
            "empty command",
            "Provide a format command such as \"mkfs.ext4 -m0 %\"",
        )
    })?;
    let args: Vec<&str> = parts.collect();
    exec(program, &args).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exec_captures_stdout() {
        let output = exec("echo", &["hello"]).await.unwrap();
        assert_eq!(output.stdout.trim(), "hello");
        assert!(output.success());
    }

    #[tokio::test]
    async fn test_exec_fails_on_nonzero_exit() {
        let err = exec("false", &[]).await.unwrap_err();
        assert!(matches!(err, RuntimeError::CommandFailed { exit_code: 1, .. }));
    }

    #[tokio::test]
    async fn test_exec_unchecked_reports_exit_code() {
        let output = exec_unchecked("false", &[]).await.unwrap();
        assert_eq!(output.exit_code, 1);
    }

    #[tokio::test]
    async fn test_exec_missing_program() {
        let err = exec("voldock-no-such-binary", &[]).await.unwrap_err();
        assert!(matches!(err, RuntimeError::CommandFailed { exit_code: -1, .. }));
    }

    #[tokio::test]
    async fn test_exec_line() {
        let output = exec_line("echo -n formatted").await.unwrap();
        assert_eq!(output.stdout, "formatted");
        assert!(exec_line("   ").await.is_err());
    }
}
