use anyhow::{Result, anyhow};
use log::{debug, error};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

// @module: Running external media tools with a timeout

// @const: Lines of ffmpeg/ffprobe stderr that carry no diagnostic value
const NOISE_PREFIXES: [&str; 14] = [
    "ffmpeg version",
    "ffprobe version",
    "  built with",
    "  configuration:",
    "  lib",
    "Input #",
    "  Metadata:",
    "  Duration:",
    "  Stream #",
    "      Metadata:",
    "Output #",
    "Stream mapping:",
    "Press [q]",
    "size=",
];

/// Run `program` with `args`, failing on a non-zero exit or when `timeout`
/// elapses. The child is killed when the future is dropped.
pub async fn run_command(program: &str, args: &[String], timeout: Duration) -> Result<Output> {
    debug!("Running {} {}", program, args.join(" "));

    let future = Command::new(program).args(args).kill_on_drop(true).output();
    let output = tokio::select! {
        result = future => {
            result.map_err(|e| anyhow!("Failed to execute {}: {}", program, e))?
        },
        _ = tokio::time::sleep(timeout) => {
            return Err(anyhow!("{} timed out after {} seconds", program, timeout.as_secs()));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let filtered = filter_tool_stderr(&stderr);
        error!("{} failed: {}", program, filtered);
        return Err(anyhow!("{} failed: {}", program, filtered));
    }

    Ok(output)
}

/// Keep only the meaningful lines of a media tool's stderr
pub fn filter_tool_stderr(stderr: &str) -> String {
    let meaningful: Vec<&str> = stderr
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !NOISE_PREFIXES.iter().any(|p| line.starts_with(p)))
        .collect();

    if meaningful.is_empty() {
        stderr.trim().to_string()
    } else {
        meaningful.join("\n")
    }
}
