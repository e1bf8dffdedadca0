use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Each line type in the run JSONL file.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunLine {
    RunStart {
        timestamp: DateTime<Utc>,
        initial_prompt: String,
        dataset: Option<PathBuf>,
        samples: usize,
        agent_provider: String,
        mentor_provider: String,
        agent_model: Option<String>,
        mentor_model: Option<String>,
        loop_count: usize,
        window_size: usize,
    },
    Iteration {
        record: Value,
    },
    RunEnd {
        termination: String,
        iterations: usize,
        best_iteration: Option<usize>,
        best_accuracy: Option<f64>,
        duration_secs: f64,
        timestamp: DateTime<Utc>,
    },
}

/// Run settings captured in the `run_start` line
#[derive(Debug, Clone, Default)]
pub struct RunStart<'a> {
    pub initial_prompt: &'a str,
    pub dataset: Option<&'a Path>,
    pub samples: usize,
    pub agent_provider: &'a str,
    pub mentor_provider: &'a str,
    pub agent_model: Option<&'a str>,
    pub mentor_model: Option<&'a str>,
    pub loop_count: usize,
    pub window_size: usize,
}

/// Writes run data as JSONL to a file in ~/.local/share/promptloops/runs/.
pub struct RunWriter {
    file: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl RunWriter {
    /// Create a writer under the user data directory. The file name is the
    /// current UTC timestamp plus a short hash of the initial prompt.
    pub fn new(initial_prompt: &str) -> io::Result<Self> {
        Self::in_dir(&Self::runs_dir()?, initial_prompt)
    }

    /// Create a writer in an explicit directory
    pub fn in_dir(dir: &Path, initial_prompt: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;

        let timestamp_str = Utc::now().format("%Y-%m-%dT%H-%M-%SZ").to_string();

        let mut hasher = Sha256::new();
        hasher.update(initial_prompt.as_bytes());
        let hash = hex::encode(hasher.finalize());
        let short_hash = &hash[..6];

        let path = dir.join(format!("{}_{}.jsonl", timestamp_str, short_hash));
        let file = File::create(&path)?;

        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    /// Returns the path to the run file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_start(&self, start: &RunStart<'_>) {
        let line = RunLine::RunStart {
            timestamp: Utc::now(),
            initial_prompt: start.initial_prompt.to_string(),
            dataset: start.dataset.map(Path::to_path_buf),
            samples: start.samples,
            agent_provider: start.agent_provider.to_string(),
            mentor_provider: start.mentor_provider.to_string(),
            agent_model: start.agent_model.map(String::from),
            mentor_model: start.mentor_model.map(String::from),
            loop_count: start.loop_count,
            window_size: start.window_size,
        };
        self.write_line(&line);
    }

    /// Write an iteration line. Takes any serializable record so this crate
    /// stays independent of the scoring types.
    pub fn write_iteration<T: Serialize>(&self, record: &T) {
        match serde_json::to_value(record) {
            Ok(record) => self.write_line(&RunLine::Iteration { record }),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize iteration record"),
        }
    }

    pub fn write_end(
        &self,
        termination: &str,
        iterations: usize,
        best: Option<(usize, f64)>,
        duration_secs: f64,
    ) {
        let line = RunLine::RunEnd {
            termination: termination.to_string(),
            iterations,
            best_iteration: best.map(|(iteration, _)| iteration),
            best_accuracy: best.map(|(_, accuracy)| accuracy),
            duration_secs,
            timestamp: Utc::now(),
        };
        self.write_line(&line);
    }

    fn write_line(&self, line: &RunLine) {
        if let Ok(json) = serde_json::to_string(line) {
            if let Ok(mut writer) = self.file.lock() {
                let _ = writeln!(writer, "{}", json);
                let _ = writer.flush();
            }
        }
    }

    fn runs_dir() -> io::Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine data directory",
            )
        })?;
        Ok(data_dir.join("promptloops").join("runs"))
    }
}
