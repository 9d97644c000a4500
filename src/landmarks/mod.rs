//! Landmark files in the two textual layouts used by the benchmark.
//!
//! A landmark set is an ordered list of 2D points. It is stored either as a
//! CSV table with an unnamed index column followed by `Y` and `X` columns, or
//! as a plain text file:
//!
//! ```text
//! point
//! 3
//! 1 2
//! 3 4
//! 5 6
//! ```
//!
//! [`save_landmarks`] always writes both layouts next to each other.

use crate::util::{self, UtilError};
use log::{debug, error, info};
use nalgebra::Point2;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Column names of the CSV layout, in file order.
pub const LANDMARK_COORDS: [&str; 2] = ["Y", "X"];

/// First line of the text layout.
const TXT_MAGIC: &str = "point";

#[derive(thiserror::Error, Debug)]
pub enum LandmarkError {
    #[error("Missing file: {0}")]
    MissingFile(PathBuf),
    #[error("Missing directory: {0}")]
    MissingDirectory(PathBuf),
    #[error("Not supported landmarks file: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("Number of declared ({declared}) and found ({found}) points does not match")]
    CountMismatch { declared: usize, found: usize },
    #[error("Invalid landmarks format: {0}")]
    Format(String),
    #[error("CSV Error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
}

impl From<UtilError> for LandmarkError {
    fn from(err: UtilError) -> Self {
        match err {
            UtilError::MissingDirectory(dir) => LandmarkError::MissingDirectory(dir),
            other => LandmarkError::Format(other.to_string()),
        }
    }
}

/// On-disk layout of a landmark file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkFormat {
    Csv,
    Txt,
}

impl LandmarkFormat {
    /// Pick the layout from the path's extension (`csv` or `txt`).
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("csv") => Some(LandmarkFormat::Csv),
            Some("txt") => Some(LandmarkFormat::Txt),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            LandmarkFormat::Csv => "csv",
            LandmarkFormat::Txt => "txt",
        }
    }
}

#[derive(Debug, Deserialize)]
struct CsvLandmark {
    #[serde(rename = "X")]
    x: f64,
    #[serde(rename = "Y")]
    y: f64,
}

/// Load landmarks from a `.csv` or `.txt` file.
///
/// # Errors
///
/// * [`LandmarkError::MissingFile`] if `path` does not exist
/// * [`LandmarkError::UnsupportedFormat`] for any other extension
/// * whatever the layout specific loader reports
pub fn load_landmarks<P: AsRef<Path>>(path: P) -> Result<Vec<Point2<f64>>, LandmarkError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LandmarkError::MissingFile(path.to_path_buf()));
    }
    match LandmarkFormat::from_path(path) {
        Some(LandmarkFormat::Csv) => load_landmarks_csv(path),
        Some(LandmarkFormat::Txt) => load_landmarks_txt(path),
        None => {
            error!("Not supported landmarks file: {}", path.display());
            Err(LandmarkError::UnsupportedFormat(path.to_path_buf()))
        }
    }
}

/// Load landmarks stored in the text layout.
///
/// Line 2 holds the declared number of points, every following non-empty
/// line holds one `x y` pair.
pub fn load_landmarks_txt<P: AsRef<Path>>(path: P) -> Result<Vec<Point2<f64>>, LandmarkError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LandmarkError::MissingFile(path.to_path_buf()));
    }
    let contents = fs::read_to_string(path)?;
    let points = parse_landmarks_txt(&contents)?;
    debug!("Loaded {} landmarks from {}", points.len(), path.display());
    Ok(points)
}

fn parse_landmarks_txt(contents: &str) -> Result<Vec<Point2<f64>>, LandmarkError> {
    let lines: Vec<&str> = contents.lines().collect();
    if lines.len() < 2 {
        return Err(LandmarkError::Format(format!(
            "file has less than 2 lines: {lines:?}"
        )));
    }

    let declared = lines[1].trim().parse::<usize>().map_err(|e| {
        LandmarkError::Format(format!("invalid point count {:?}: {e}", lines[1]))
    })?;

    let points = lines[2..]
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse_point_line(line))
        .collect::<Result<Vec<_>, _>>()?;

    if declared != points.len() {
        return Err(LandmarkError::CountMismatch {
            declared,
            found: points.len(),
        });
    }
    Ok(points)
}

fn parse_point_line(line: &str) -> Result<Point2<f64>, LandmarkError> {
    let coords = line
        .split_whitespace()
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|e| LandmarkError::Format(format!("invalid coordinate {token:?}: {e}")))
        })
        .collect::<Result<Vec<f64>, _>>()?;

    match coords.as_slice() {
        [x, y] => Ok(Point2::new(*x, *y)),
        _ => Err(LandmarkError::Format(format!(
            "expected 2 coordinates, found {} in {line:?}",
            coords.len()
        ))),
    }
}

/// Load landmarks stored in the CSV layout.
///
/// Columns are matched by name, the leading index column is ignored.
pub fn load_landmarks_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Point2<f64>>, LandmarkError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LandmarkError::MissingFile(path.to_path_buf()));
    }
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;

    let mut points = Vec::new();
    for record in reader.deserialize() {
        let landmark: CsvLandmark = record?;
        points.push(Point2::new(landmark.x, landmark.y));
    }
    debug!("Loaded {} landmarks from {}", points.len(), path.display());
    Ok(points)
}

/// Save landmarks in both layouts.
///
/// The extension of `path` is replaced, so `case/moving.csv`, `case/moving.txt`
/// and `case/moving` all produce `case/moving.csv` and `case/moving.txt`.
///
/// # Errors
///
/// Returns [`LandmarkError::MissingDirectory`] if the destination folder does
/// not exist.
pub fn save_landmarks<P: AsRef<Path>>(
    path: P,
    landmarks: &[Point2<f64>],
) -> Result<(), LandmarkError> {
    let path = path.as_ref();
    check_parent_dir(path)?;
    save_landmarks_csv(path.with_extension(LandmarkFormat::Csv.extension()), landmarks)?;
    save_landmarks_txt(path.with_extension(LandmarkFormat::Txt.extension()), landmarks)?;
    Ok(())
}

/// Save landmarks in the text layout.
pub fn save_landmarks_txt<P: AsRef<Path>>(
    path: P,
    landmarks: &[Point2<f64>],
) -> Result<(), LandmarkError> {
    let path = path.as_ref();
    check_parent_dir(path)?;

    let mut lines = vec![TXT_MAGIC.to_string(), landmarks.len().to_string()];
    lines.extend(landmarks.iter().map(|p| format!("{} {}", p.x, p.y)));
    fs::write(path, lines.join("\n"))?;

    info!("Saved {} landmarks to {}", landmarks.len(), path.display());
    Ok(())
}

/// Save landmarks in the CSV layout.
///
/// # Errors
///
/// [`LandmarkError::UnsupportedFormat`] if `path` does not end in `.csv`.
pub fn save_landmarks_csv<P: AsRef<Path>>(
    path: P,
    landmarks: &[Point2<f64>],
) -> Result<(), LandmarkError> {
    let path = path.as_ref();
    check_parent_dir(path)?;
    if LandmarkFormat::from_path(path) != Some(LandmarkFormat::Csv) {
        return Err(LandmarkError::UnsupportedFormat(path.to_path_buf()));
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["", LANDMARK_COORDS[0], LANDMARK_COORDS[1]])?;
    for (i, p) in landmarks.iter().enumerate() {
        writer.write_record([i.to_string(), p.y.to_string(), p.x.to_string()])?;
    }
    writer.flush()?;

    info!("Saved {} landmarks to {}", landmarks.len(), path.display());
    Ok(())
}

fn check_parent_dir(path: &Path) -> Result<(), LandmarkError> {
    util::ensure_parent_dir(path).map_err(|e| {
        error!("Missing folder for {}: {e}", path.display());
        LandmarkError::from(e)
    })
}
