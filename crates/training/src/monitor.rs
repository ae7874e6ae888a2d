//! Run logs: `train.txt` / `validation.txt` rows and `summaries.jsonl` scalars.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use models::WeightKey;
use serde::Serialize;

use crate::error::{ScaffoldError, ScaffoldResult};

pub const TRAIN_LOG: &str = "train.txt";
pub const VALIDATION_LOG: &str = "validation.txt";
pub const SUMMARIES: &str = "summaries.jsonl";

/// Loss and accuracy as a fraction of the samples seen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScalarSummary {
    pub loss: f64,
    pub accuracy: f64,
}

/// Monitored state of one run directory, created by `Session::create_monitor_variables`.
#[derive(Debug)]
pub struct Monitor {
    dir: PathBuf,
    output_track: String,
    weight_keys: Vec<WeightKey>,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ScaffoldError + '_ {
    move |source| ScaffoldError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn append_line(path: &Path, line: &str) -> ScaffoldResult<()> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err(path))?;
    writeln!(file, "{line}").map_err(io_err(path))
}

impl Monitor {
    /// Creates `dir` and starts fresh logs, each row file beginning with
    /// `Loss\t<output>_Accuracy`.
    pub fn create(
        dir: &Path,
        output_track: &str,
        weight_keys: Vec<WeightKey>,
    ) -> ScaffoldResult<Self> {
        fs::create_dir_all(dir).map_err(io_err(dir))?;
        let header = format!("Loss\t{output_track}_Accuracy\n");
        for name in [TRAIN_LOG, VALIDATION_LOG] {
            let path = dir.join(name);
            fs::write(&path, &header).map_err(io_err(&path))?;
        }
        let summaries = dir.join(SUMMARIES);
        fs::write(&summaries, "").map_err(io_err(&summaries))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            output_track: output_track.to_string(),
            weight_keys,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn output_track(&self) -> &str {
        &self.output_track
    }

    pub fn weight_keys(&self) -> &[WeightKey] {
        &self.weight_keys
    }

    pub fn record_train(&self, summary: &ScalarSummary) -> ScaffoldResult<()> {
        self.append_row(TRAIN_LOG, summary)
    }

    pub fn record_validation(&self, summary: &ScalarSummary) -> ScaffoldResult<()> {
        self.append_row(VALIDATION_LOG, summary)
    }

    fn append_row(&self, name: &str, summary: &ScalarSummary) -> ScaffoldResult<()> {
        append_line(
            &self.dir.join(name),
            &format!("{}\t{}", summary.loss, summary.accuracy),
        )
    }

    pub(crate) fn write_summary(
        &self,
        step: u64,
        train: &ScalarSummary,
        validation: &ScalarSummary,
        weight_norms: BTreeMap<String, f64>,
    ) -> ScaffoldResult<()> {
        let accuracy_key = format!("{}_accuracy", self.output_track);
        let scalars = |summary: &ScalarSummary| {
            let mut map = serde_json::Map::new();
            map.insert("loss".to_string(), summary.loss.into());
            map.insert(accuracy_key.clone(), summary.accuracy.into());
            serde_json::Value::Object(map)
        };
        let record = serde_json::json!({
            "step": step,
            "train": scalars(train),
            "validation": scalars(validation),
            "weight_norms": weight_norms,
        });
        append_line(&self.dir.join(SUMMARIES), &record.to_string())
    }
}
