use circbuf::capture::run_command;
use circbuf::config::{load_config, Config};
use clap::Parser;
use log::{error, info, warn};
use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

/// Run a command and keep at most a fixed number of bytes of its output.
#[derive(Debug, Parser)]
#[command(name = "circbuf", version)]
struct Args {
    /// Config file (defaults to ~/.config/circbuf/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Byte budget per stream
    #[arg(long, allow_negative_numbers = true)]
    capacity: Option<i64>,

    /// Kill the command after this many milliseconds (0 = never)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Leave stderr attached instead of capturing it
    #[arg(long)]
    no_stderr: bool,

    /// Command to run, followed by its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn get_config_path() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(format!("{}/.config/circbuf/config.toml", home))
    } else {
        PathBuf::from("/etc/circbuf/config.toml")
    }
}

fn resolve_config(args: &Args, default_path: &Path) -> Result<Config, Box<dyn Error>> {
    let mut cfg = match &args.config {
        Some(path) => load_config(path)?,
        None => {
            if default_path.exists() {
                load_config(default_path)?
            } else {
                info!("No config at {}, using defaults", default_path.display());
                Config::default()
            }
        }
    };

    if let Some(capacity) = args.capacity {
        cfg.capacity = capacity;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        cfg.timeout_ms = timeout_ms;
    }
    if args.no_stderr {
        cfg.capture_stderr = false;
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();
    let cfg = resolve_config(&args, &get_config_path())?;

    let (program, rest) = args
        .command
        .split_first()
        .ok_or("no command given")?;

    let captured = match run_command(program, rest, &cfg).await {
        Ok(captured) => captured,
        Err(e) => {
            error!("Failed to run '{}': {}", program, e);
            std::process::exit(e.exit_code());
        }
    };

    std::io::stdout().write_all(&captured.stdout.captured())?;
    if captured.stdout.truncated() {
        warn!(
            "stdout truncated: dropped {} of {} bytes",
            captured.stdout.dropped_bytes, captured.stdout.total_bytes
        );
    }
    if let Some(stderr) = &captured.stderr {
        std::io::stderr().write_all(&stderr.captured())?;
        if stderr.truncated() {
            warn!(
                "stderr truncated: dropped {} of {} bytes",
                stderr.dropped_bytes, stderr.total_bytes
            );
        }
    }
    std::io::stdout().flush()?;

    std::process::exit(exit_code(captured.status));
}

/// Shell-style status: the child's code, 128 + signal if it was killed by
/// one, 124 if we killed it at the deadline.
fn exit_code(status: Option<ExitStatus>) -> i32 {
    let Some(status) = status else {
        return 124;
    };
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return 128 + sig;
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use circbuf::Error as CaptureError;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_flags_override_config_file() {
        let file = write_config("capacity = 1024\ntimeout_ms = 500\ncapture_stderr = true");
        let path = file.path().to_str().unwrap();
        let args = Args::try_parse_from([
            "circbuf",
            "--config",
            path,
            "--capacity",
            "16",
            "--timeout-ms",
            "20",
            "--no-stderr",
            "--",
            "echo",
            "hi",
        ])
        .unwrap();

        let cfg = resolve_config(&args, Path::new("/nonexistent")).unwrap();
        assert_eq!(cfg.capacity, 16);
        assert_eq!(cfg.timeout_ms, 20);
        assert!(!cfg.capture_stderr);
        assert_eq!(args.command, ["echo", "hi"]);
    }

    #[test]
    fn test_config_file_used_without_flags() {
        let file = write_config("capacity = 1024\ntimeout_ms = 500");
        let args =
            Args::try_parse_from(["circbuf", "--config", file.path().to_str().unwrap(), "true"])
                .unwrap();

        let cfg = resolve_config(&args, Path::new("/nonexistent")).unwrap();
        assert_eq!(cfg.capacity, 1024);
        assert_eq!(cfg.timeout_ms, 500);
        assert!(cfg.capture_stderr);
    }

    #[test]
    fn test_missing_default_config_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args::try_parse_from(["circbuf", "true"]).unwrap();

        let cfg = resolve_config(&args, &dir.path().join("config.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn test_default_config_path_is_loaded() {
        let file = write_config("capacity = 8");
        let args = Args::try_parse_from(["circbuf", "true"]).unwrap();

        let cfg = resolve_config(&args, file.path()).unwrap();
        assert_eq!(cfg.capacity, 8);
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let args =
            Args::try_parse_from(["circbuf", "--config", "/nonexistent/circbuf.toml", "true"])
                .unwrap();
        assert!(resolve_config(&args, Path::new("/nonexistent")).is_err());
    }

    #[test]
    fn test_negative_capacity_parses_then_fails_validation() {
        let args = Args::try_parse_from(["circbuf", "--capacity", "-5", "true"]).unwrap();
        assert_eq!(args.capacity, Some(-5));

        let mut cfg = resolve_config(&args, Path::new("/nonexistent")).unwrap();
        assert!(matches!(cfg.validate(), Err(CaptureError::InvalidCapacity(-5))));
    }

    #[test]
    fn test_command_is_required() {
        assert!(Args::try_parse_from(["circbuf"]).is_err());
    }

    #[test]
    fn test_exit_code_timeout() {
        assert_eq!(exit_code(None), 124);
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_code_from_status() {
        use std::os::unix::process::ExitStatusExt;

        assert_eq!(exit_code(Some(ExitStatus::from_raw(0))), 0);
        // Exited with 3
        assert_eq!(exit_code(Some(ExitStatus::from_raw(3 << 8))), 3);
        // Killed by SIGKILL
        assert_eq!(exit_code(Some(ExitStatus::from_raw(9))), 137);
    }
}
