use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::DetectError;

/// Extensions the detector uses for its annotated overlay output.
pub(crate) const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg"];
/// Extension of the per-object result file.
pub(crate) const RESULT_EXTENSION: &str = "csv";

/// One detected object above the confidence threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRecord {
    pub source_file: String,
    pub object_class: String,
    pub confidence: f32,
}

/// Everything one detector run produced for one image.
#[derive(Debug, Clone)]
pub struct DetectionBatch {
    pub records: Vec<DetectionRecord>,
    pub annotated_image: Option<PathBuf>,
    pub run_dir: PathBuf,
}

impl DetectionBatch {
    /// Number of objects the run reported.
    pub fn count(&self) -> u32 {
        self.records.len() as u32
    }
}

/// Reads the result file and annotated image out of one run directory.
///
/// A run without a result file means the detector saw nothing: the batch is
/// empty and carries no image reference. A result file that is present but
/// unreadable breaks the output contract and fails, as does more than one
/// annotated image candidate.
pub fn parse_run_dir(run_dir: &Path) -> Result<DetectionBatch, DetectError> {
    let mut result_file = None;
    let mut images = Vec::new();

    for entry in fs::read_dir(run_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        match extension_of(&path) {
            Some(ext) if ext == RESULT_EXTENSION => result_file = Some(path),
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => images.push(path),
            _ => {}
        }
    }

    let Some(file) = result_file else {
        debug!("no result file in {}, zero detections", run_dir.display());
        return Ok(DetectionBatch {
            records: Vec::new(),
            annotated_image: None,
            run_dir: run_dir.to_path_buf(),
        });
    };

    let records = parse_result_file(&file)?;
    let annotated_image = match images.len() {
        0 => None,
        1 => images.pop(),
        n => {
            return Err(DetectError::AmbiguousImage {
                run_dir: run_dir.to_path_buf(),
                count: n,
            })
        }
    };

    Ok(DetectionBatch {
        records,
        annotated_image,
        run_dir: run_dir.to_path_buf(),
    })
}

/// Columns are positional: source file, object class, confidence. A fourth
/// frame-index column appears for video sources and is ignored.
fn parse_result_file(file: &Path) -> Result<Vec<DetectionRecord>, DetectError> {
    let text = fs::read_to_string(file)?;
    let mut records = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 3 || fields.len() > 4 {
            return Err(malformed(
                file,
                line_no,
                format!("expected 3 or 4 columns, got {}", fields.len()),
            ));
        }
        let confidence: f32 = fields[2].parse().map_err(|_| {
            malformed(file, line_no, format!("confidence {:?} is not numeric", fields[2]))
        })?;

        records.push(DetectionRecord {
            source_file: fields[0].to_string(),
            object_class: fields[1].to_string(),
            confidence,
        });
    }

    if records.is_empty() {
        return Err(DetectError::MalformedOutput {
            file: file.to_path_buf(),
            detail: "result file has no rows".to_string(),
        });
    }
    Ok(records)
}

fn malformed(file: &Path, line_no: usize, detail: String) -> DetectError {
    DetectError::MalformedOutput {
        file: file.to_path_buf(),
        detail: format!("line {}: {}", line_no + 1, detail),
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}
