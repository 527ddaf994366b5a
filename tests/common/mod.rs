#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

use tempfile::TempDir;

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

/// Throwaway HOME with its own preferences file and activity log.
pub struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create sandbox dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn preferences_file(&self) -> PathBuf {
        self.root().join("preferences.json")
    }

    pub fn activity_log(&self) -> PathBuf {
        self.root().join("activity.jsonl")
    }

    /// Run `crv` with HOME and every CRV path pointed into the sandbox.
    pub fn run(&self, case_name: &str, args: &[&str]) -> CmdResult {
        self.run_with_env(case_name, args, &[])
    }

    pub fn run_with_env(&self, case_name: &str, args: &[&str], env: &[(&str, &str)]) -> CmdResult {
        let mut cmd = Command::new(resolve_bin_path());
        cmd.args(args)
            .env("HOME", self.root())
            .env("CRV_PREFERENCES_FILE", self.preferences_file())
            .env("CRV_ACTIVITY_LOG", self.activity_log())
            .env("RUST_BACKTRACE", "1")
            .env_remove("CRV_OUTPUT_FORMAT")
            .env_remove("CRV_SESSION_ROLE")
            .env_remove("CRV_SERVER_TOKEN");
        for (key, value) in env {
            cmd.env(key, value);
        }
        execute(case_name, args, &mut cmd)
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_crv") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "crv.exe" } else { "crv" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve crv binary path for integration test"),
    }
}

fn execute(case_name: &str, args: &[&str], cmd: &mut Command) -> CmdResult {
    let root = std::env::temp_dir().join("crv-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");
    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));

    let output = cmd.output().expect("execute crv command");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}
