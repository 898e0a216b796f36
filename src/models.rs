//! Voice model discovery
//!
//! Finds one `.onnx` model and one `.json` config, pairing them by name.

use crate::error::{MouthError, MouthResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// The model/config pair handed to Piper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceFiles {
    pub model: PathBuf,
    pub config: PathBuf,
    /// False when the pair was picked by the first-found fallback
    pub matched: bool,
}

/// Files in `dir` with the given extension, sorted by name
fn files_with_extension(dir: &Path, extension: &str) -> MouthResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| {
            MouthError::ModelDiscovery(format!("Cannot read {}: {}", dir.display(), e))
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(extension))
        .collect();
    files.sort();
    Ok(files)
}

/// Config names Piper voices ship with for `model`, best first
fn config_candidates(model: &Path) -> Vec<PathBuf> {
    let mut candidates = Vec::with_capacity(2);
    if let Some(name) = model.file_name().and_then(|n| n.to_str()) {
        candidates.push(model.with_file_name(format!("{}.json", name)));
    }
    candidates.push(model.with_extension("json"));
    candidates
}

/// Pick a model and config from `dir`.
///
/// `<base>.onnx` pairs with `<base>.onnx.json` first, then `<base>.json`.
/// When nothing pairs up, the first model and first config are used.
pub fn discover(dir: &Path) -> MouthResult<VoiceFiles> {
    let models = files_with_extension(dir, "onnx")?;
    let configs = files_with_extension(dir, "json")?;

    let Some(first_model) = models.first() else {
        return Err(MouthError::ModelDiscovery(format!(
            "No .onnx model file found in {}",
            dir.display()
        )));
    };
    let Some(first_config) = configs.first() else {
        return Err(MouthError::ModelDiscovery(format!(
            "No .json config file found in {}",
            dir.display()
        )));
    };

    for model in &models {
        if let Some(config) = config_candidates(model)
            .into_iter()
            .find(|c| configs.contains(c))
        {
            info!("🗣️ Using model: {}", model.display());
            info!("   Using config: {}", config.display());
            return Ok(VoiceFiles {
                model: model.clone(),
                config,
                matched: true,
            });
        }
    }

    warn!(
        "⚠️ No matching model/config pair found. Using {} and {}",
        first_model.display(),
        first_config.display()
    );
    Ok(VoiceFiles {
        model: first_model.clone(),
        config: first_config.clone(),
        matched: false,
    })
}

/// Find the model in `dir` that an explicit config belongs to
fn pair_with_config(config: &Path, dir: &Path) -> MouthResult<VoiceFiles> {
    if !config.is_file() {
        return Err(MouthError::ModelDiscovery(format!(
            "Config file not found: {}",
            config.display()
        )));
    }
    let models = files_with_extension(dir, "onnx")?;
    let config_name = config.file_name();

    let paired = models.iter().find(|model| {
        config_candidates(model)
            .iter()
            .any(|c| c.file_name() == config_name)
    });
    let (model, matched) = match (paired, models.first()) {
        (Some(model), _) => (model.clone(), true),
        (None, Some(first)) => {
            warn!(
                "⚠️ No model named after {}. Using {}",
                config.display(),
                first.display()
            );
            (first.clone(), false)
        }
        (None, None) => {
            return Err(MouthError::ModelDiscovery(format!(
                "No .onnx model file found in {}",
                dir.display()
            )))
        }
    };

    info!("🗣️ Using model: {}", model.display());
    Ok(VoiceFiles {
        model,
        config: config.to_path_buf(),
        matched,
    })
}

/// Use explicit paths when given, otherwise discover in `dir`
pub fn resolve(
    model: Option<&Path>,
    config: Option<&Path>,
    dir: &Path,
) -> MouthResult<VoiceFiles> {
    let Some(model) = model else {
        return match config {
            Some(config) => pair_with_config(config, dir),
            None => discover(dir),
        };
    };

    if !model.is_file() {
        return Err(MouthError::ModelDiscovery(format!(
            "Model file not found: {}",
            model.display()
        )));
    }

    let config = match config {
        Some(c) if c.is_file() => c.to_path_buf(),
        Some(c) => {
            return Err(MouthError::ModelDiscovery(format!(
                "Config file not found: {}",
                c.display()
            )))
        }
        None => config_candidates(model)
            .into_iter()
            .find(|c| c.is_file())
            .ok_or_else(|| {
                MouthError::ModelDiscovery(format!(
                    "No config found next to {}",
                    model.display()
                ))
            })?,
    };

    Ok(VoiceFiles {
        model: model.to_path_buf(),
        config,
        matched: true,
    })
}
