//! Per-modality checkpoint files.
//!
//! Layout: `<dir>/<modality>_model.bin` for each modality and `<dir>/scaffold_head.bin`
//! for the fusion stage and output head, written with Burn's full-precision
//! `BinFileRecorder`.

use std::fs;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use models::{FiddleNet, ModalityNet, ScaffoldHead};
use tracing::{debug, info};

use crate::error::{ScaffoldError, ScaffoldResult};

pub const HEAD_CHECKPOINT: &str = "scaffold_head";

/// Recorder file stem for one modality; the recorder appends `.bin`.
pub fn modality_stem(dir: &Path, modality: &str) -> PathBuf {
    dir.join(format!("{modality}_model"))
}

pub fn modality_file(dir: &Path, modality: &str) -> PathBuf {
    modality_stem(dir, modality).with_extension("bin")
}

pub fn head_file(dir: &Path) -> PathBuf {
    dir.join(HEAD_CHECKPOINT).with_extension("bin")
}

fn recorder() -> BinFileRecorder<FullPrecisionSettings> {
    BinFileRecorder::<FullPrecisionSettings>::new()
}

pub fn save_network<B: Backend>(model: &FiddleNet<B>, dir: &Path) -> ScaffoldResult<()> {
    fs::create_dir_all(dir).map_err(|source| ScaffoldError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for name in model.modality_names() {
        let net = model
            .modality(name)
            .ok_or_else(|| ScaffoldError::UnknownModality(name.clone()))?;
        let stem = modality_stem(dir, name);
        net.clone()
            .save_file(stem.clone(), &recorder())
            .map_err(|source| ScaffoldError::Checkpoint { path: stem, source })?;
    }
    let stem = dir.join(HEAD_CHECKPOINT);
    model
        .head()
        .clone()
        .save_file(stem.clone(), &recorder())
        .map_err(|source| ScaffoldError::Checkpoint { path: stem, source })?;
    info!(dir = %dir.display(), modalities = model.modality_names().len(), "saved checkpoints");
    Ok(())
}

/// Overwrite one modality's parameters from `<dir>/<modality>_model.bin`.
pub fn load_modality<B: Backend>(
    model: &mut FiddleNet<B>,
    modality: &str,
    dir: &Path,
    device: &B::Device,
) -> ScaffoldResult<()> {
    let current: ModalityNet<B> = model
        .modality(modality)
        .cloned()
        .ok_or_else(|| ScaffoldError::UnknownModality(modality.to_string()))?;
    let stem = modality_stem(dir, modality);
    let restored = current
        .load_file(stem.clone(), &recorder(), device)
        .map_err(|source| ScaffoldError::Checkpoint { path: stem, source })?;
    model.replace_modality(modality, restored);
    debug!(modality, dir = %dir.display(), "restored modality parameters");
    Ok(())
}

pub fn load_head<B: Backend>(
    model: &mut FiddleNet<B>,
    dir: &Path,
    device: &B::Device,
) -> ScaffoldResult<()> {
    let current: ScaffoldHead<B> = model.head().clone();
    let stem = dir.join(HEAD_CHECKPOINT);
    let restored = current
        .load_file(stem.clone(), &recorder(), device)
        .map_err(|source| ScaffoldError::Checkpoint { path: stem, source })?;
    model.replace_head(restored);
    Ok(())
}

/// Modalities of `model` that have a checkpoint file under `dir`.
pub fn available_modalities<B: Backend>(model: &FiddleNet<B>, dir: &Path) -> Vec<String> {
    model
        .modality_names()
        .iter()
        .filter(|name| modality_file(dir, name).is_file())
        .cloned()
        .collect()
}
