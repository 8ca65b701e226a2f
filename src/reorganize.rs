//! Splits a labelled image folder into train and validation folders
//!
//! Expects `data_dir/labels.csv` (a header line, then one `name,...,label` row per file) and the
//! files themselves in `data_dir/train`. Produces
//! `data_dir/train_and_valid/{train,valid,train_valid}/<label>/<file>` by copying, so the
//! original files are left untouched. A failed copy leaves whatever was already copied in place.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;

/// Name of the folder created next to `train`
pub const OUTPUT_DIR: &str = "train_and_valid";

/// Errors for the dataset reorganization
#[derive(Debug, Error)]
pub enum ReorganizeError {
    #[error("I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("{}:{line}: expected at least two comma separated columns", path.display())]
    MalformedRow { path: PathBuf, line: usize },
    #[error("No label found for {0}")]
    MissingLabel(String),
    #[error("Label map is empty")]
    NoLabels,
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> ReorganizeError + '_ {
    move |source| ReorganizeError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Reads the `file name -> label` map from a CSV file, skipping the header row.
/// The name is the first column and the label the last one; later rows win on duplicate names.
pub fn read_csv_labels(
    path: impl AsRef<Path>,
) -> Result<HashMap<String, String>, ReorganizeError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(io_err(path))?;
    let mut labels = HashMap::new();
    for (idx, line) in content.lines().enumerate().skip(1) {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let Some((name, rest)) = line.split_once(',') else {
            return Err(ReorganizeError::MalformedRow {
                path: path.to_path_buf(),
                line: idx + 1,
            });
        };
        let label = rest.rsplit(',').next().unwrap_or(rest);
        labels.insert(name.to_string(), label.to_string());
    }
    log::debug!("Read {} labels from '{}'.", labels.len(), path.display());
    Ok(labels)
}

/// Copies `file` into `target_dir`, creating the directory if needed
pub fn copy_file(
    file: impl AsRef<Path>,
    target_dir: impl AsRef<Path>,
) -> Result<(), ReorganizeError> {
    let (file, target_dir) = (file.as_ref(), target_dir.as_ref());
    fs::create_dir_all(target_dir).map_err(io_err(target_dir))?;
    let Some(name) = file.file_name() else {
        return Err(ReorganizeError::Io {
            path: file.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
        });
    };
    fs::copy(file, target_dir.join(name)).map_err(io_err(file))?;
    Ok(())
}

/// Number of validation examples taken from every label: the smallest class size times
/// `valid_ratio`, rounded down, but at least one
pub fn valid_quota(
    labels: &HashMap<String, String>,
    valid_ratio: f64,
) -> Result<usize, ReorganizeError> {
    let mut counts = HashMap::<&str, usize>::new();
    for label in labels.values() {
        *counts.entry(label.as_str()).or_default() += 1;
    }
    let n_min = counts.values().copied().min().ok_or(ReorganizeError::NoLabels)?;
    Ok(((n_min as f64 * valid_ratio).floor() as usize).max(1))
}

/// Copies every file of `data_dir/train` into `train_valid/<label>`, plus either
/// `valid/<label>` (until the label has its quota of validation files) or `train/<label>`.
/// Files are visited in name order. Returns the per-label validation quota.
pub fn reorganize_train_valid(
    data_dir: impl AsRef<Path>,
    labels: &HashMap<String, String>,
    valid_ratio: f64,
) -> Result<usize, ReorganizeError> {
    let data_dir = data_dir.as_ref();
    let n_valid_per_label = valid_quota(labels, valid_ratio)?;
    let out_dir = data_dir.join(OUTPUT_DIR);

    let train_dir = data_dir.join("train");
    let mut train_files = fs::read_dir(&train_dir)
        .map_err(io_err(&train_dir))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err(&train_dir))?;
    train_files.retain(|p| p.is_file());
    train_files.sort();

    let mut label_count = HashMap::<&str, usize>::new();
    for file in &train_files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let label = labels
            .get(&name)
            .ok_or_else(|| ReorganizeError::MissingLabel(name.clone()))?;

        copy_file(file, out_dir.join("train_valid").join(label))?;
        let count = label_count.entry(label.as_str()).or_default();
        if *count < n_valid_per_label {
            copy_file(file, out_dir.join("valid").join(label))?;
            *count += 1;
        } else {
            copy_file(file, out_dir.join("train").join(label))?;
        }
    }
    log::info!(
        "Copied {} files into '{}', {} per label held out for validation.",
        train_files.len(),
        out_dir.display(),
        n_valid_per_label
    );
    Ok(n_valid_per_label)
}

/// Reads `data_dir/labels.csv` and splits `data_dir/train` into train and validation sets
pub fn reorganize_data(
    data_dir: impl AsRef<Path>,
    valid_ratio: f64,
) -> Result<usize, ReorganizeError> {
    let data_dir = data_dir.as_ref();
    let labels = read_csv_labels(data_dir.join("labels.csv"))?;
    reorganize_train_valid(data_dir, &labels, valid_ratio)
}
