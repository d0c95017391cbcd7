use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::config::AppConfig;
use crate::error::AppError;

/// One line per model-calling transition.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationTrace {
    pub timestamp_ms: u64,
    pub action: String,
    pub request_hash: String,
    pub model: String,
    pub success: bool,
    pub menu_name: Option<String>,
    pub menu_count: Option<usize>,
    pub violations: usize,
    pub warnings: usize,
    pub contradictions: usize,
    pub error: Option<String>,
}

impl GenerationTrace {
    pub fn new(action: &str, prompt: &str, model: &str) -> Self {
        Self {
            timestamp_ms: now_ms(),
            action: action.to_string(),
            request_hash: hash_request(prompt),
            model: model.to_string(),
            success: false,
            menu_name: None,
            menu_count: None,
            violations: 0,
            warnings: 0,
            contradictions: 0,
            error: None,
        }
    }
}

fn fnv1a64(input: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in input.as_bytes() {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

pub fn hash_request(text: &str) -> String {
    format!("{:016x}", fnv1a64(text))
}

pub fn telemetry_dir() -> Result<PathBuf, AppError> {
    Ok(AppConfig::app_dir()?.join("telemetry"))
}

pub fn write_trace(trace: &GenerationTrace) -> Result<(), AppError> {
    write_trace_to(&telemetry_dir()?, trace)
}

pub fn write_trace_to(dir: &Path, trace: &GenerationTrace) -> Result<(), AppError> {
    fs::create_dir_all(dir)?;
    let path = dir.join("generation_traces.jsonl");

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    let line = serde_json::to_string(trace)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_request_stable() {
        assert_eq!(hash_request("トマト"), hash_request("トマト"));
        assert_ne!(hash_request("トマト"), hash_request("豚肉"));
        assert_eq!(hash_request("").len(), 16);
    }

    #[test]
    fn test_traces_append_as_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut trace = GenerationTrace::new("propose_menus", "prompt", "m");
        trace.success = true;
        trace.menu_count = Some(6);
        write_trace_to(dir.path(), &trace).unwrap();
        write_trace_to(dir.path(), &GenerationTrace::new("expand_steps", "p2", "m")).unwrap();

        let contents =
            std::fs::read_to_string(dir.path().join("generation_traces.jsonl")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["action"], "propose_menus");
        assert_eq!(first["menu_count"], 6);
        assert_eq!(first["success"], true);
    }
}
