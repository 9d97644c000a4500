//! Parser for bUnwarpJ raw displacement fields.
//!
//! The text file holds the image size followed by two stacked scalar grids,
//! first the new X coordinate of every pixel, then the new Y coordinate:
//!
//! ```text
//! Width=5
//! Height=4
//!
//! X Trans -----------------------------------
//! 11 12 13 14 15
//! ...                (Height rows of Width values)
//!
//! Y Trans -----------------------------------
//! 20 20 20 20 20
//! ...
//! ```
//!
//! [`warp_points`] reads the file once, line by line, and only tokenizes the
//! rows that contain at least one query point. Neither grid is ever held in
//! memory.

use log::debug;
use nalgebra::Point2;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum DisplacementError {
    #[error("Missing file: {0}")]
    MissingFile(PathBuf),
    #[error("Invalid header line {line:?}: expected `<key>=<integer>`")]
    InvalidHeader { line: String },
    #[error(
        "Point {index} at ({x}, {y}) is outside of the image of size {width}x{height}"
    )]
    OutOfBounds {
        index: usize,
        x: f64,
        y: f64,
        width: usize,
        height: usize,
    },
    #[error("Row {row} of the {channel} channel has {found} values, expected {expected}")]
    RowWidthMismatch {
        channel: Channel,
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Invalid value {token:?} in row {row} of the {channel} channel")]
    InvalidValue {
        channel: Channel,
        row: usize,
        token: String,
    },
    #[error("Unexpected end of file while reading {0}")]
    Truncated(String),
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
}

/// Size of the displacement grid as declared in the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSize {
    pub width: usize,
    pub height: usize,
}

/// One of the two scalar grids of a displacement field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    X,
    Y,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::X => write!(f, "X"),
            Channel::Y => write!(f, "Y"),
        }
    }
}

/// Query point snapped to the displacement grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GridCell {
    col: usize,
    row: usize,
}

/// Load a displacement field and return the new position of every point.
///
/// Points are rounded to the nearest grid cell; no interpolation is done.
/// The output has one point per input point, in the same order.
///
/// # Errors
///
/// * [`DisplacementError::MissingFile`] if `path` is not a file
/// * [`DisplacementError::OutOfBounds`] if a point lies outside the declared
///   size (checked before any grid row is read)
/// * [`DisplacementError::RowWidthMismatch`] if a selected row does not hold
///   exactly `width` values
/// * [`DisplacementError::Truncated`] if the file ends early
pub fn warp_points<P: AsRef<Path>>(
    path: P,
    points: &[Point2<f64>],
) -> Result<Vec<Point2<f64>>, DisplacementError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(DisplacementError::MissingFile(path.to_path_buf()));
    }
    let file = File::open(path)?;
    warp_points_from_reader(BufReader::new(file), points)
}

/// Same as [`warp_points`] for an already opened displacement field.
pub fn warp_points_from_reader<R: BufRead>(
    reader: R,
    points: &[Point2<f64>],
) -> Result<Vec<Point2<f64>>, DisplacementError> {
    let mut lines = reader.lines();

    let width = parse_header_value(next_line(&mut lines, "the width header")?)?;
    let height = parse_header_value(next_line(&mut lines, "the height header")?)?;
    debug!("Loaded displacement field size: {} x {}", width, height);
    let size = FieldSize { width, height };

    let cells = snap_to_grid(points, size)?;
    let rows = rows_lookup(&cells);

    skip_section_title(&mut lines, Channel::X)?;
    let new_x = read_channel(&mut lines, Channel::X, size, &cells, &rows)?;
    skip_section_title(&mut lines, Channel::Y)?;
    let new_y = read_channel(&mut lines, Channel::Y, size, &cells, &rows)?;

    Ok(new_x
        .into_iter()
        .zip(new_y)
        .map(|(x, y)| Point2::new(x, y))
        .collect())
}

fn next_line<I>(lines: &mut I, what: &str) -> Result<String, DisplacementError>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    match lines.next() {
        Some(line) => Ok(line?),
        None => Err(DisplacementError::Truncated(what.to_string())),
    }
}

/// Parse `Width=512`-like lines, keeping whatever follows the last `=`.
fn parse_header_value(line: String) -> Result<usize, DisplacementError> {
    let value = line
        .rsplit('=')
        .next()
        .and_then(|value| value.trim().parse::<usize>().ok());
    match value {
        Some(value) => Ok(value),
        None => Err(DisplacementError::InvalidHeader { line }),
    }
}

/// Skip the blank separator line and the `X Trans ---` / `Y Trans ---` title.
fn skip_section_title<I>(lines: &mut I, channel: Channel) -> Result<(), DisplacementError>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    let what = format!("the {channel} channel title");
    next_line(lines, &what)?;
    next_line(lines, &what)?;
    Ok(())
}

/// Round points to grid cells, ties go to the even cell (`0.5 -> 0`, `1.5 -> 2`).
fn snap_to_grid(
    points: &[Point2<f64>],
    size: FieldSize,
) -> Result<Vec<GridCell>, DisplacementError> {
    points
        .iter()
        .enumerate()
        .map(|(index, p)| {
            let (col, row) = (p.x.round_ties_even(), p.y.round_ties_even());
            let inside = |v: f64, limit: usize| v.is_finite() && v >= 0.0 && v < limit as f64;
            if inside(col, size.width) && inside(row, size.height) {
                Ok(GridCell {
                    col: col as usize,
                    row: row as usize,
                })
            } else {
                Err(DisplacementError::OutOfBounds {
                    index,
                    x: p.x,
                    y: p.y,
                    width: size.width,
                    height: size.height,
                })
            }
        })
        .collect()
}

/// Map each selected row to the indices of the points lying on it.
fn rows_lookup(cells: &[GridCell]) -> HashMap<usize, Vec<usize>> {
    let mut rows: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, cell) in cells.iter().enumerate() {
        rows.entry(cell.row).or_default().push(i);
    }
    rows
}

/// Stream the `height` rows of one channel and pick the values under the
/// query points. Rows without points are read but not tokenized.
fn read_channel<I>(
    lines: &mut I,
    channel: Channel,
    size: FieldSize,
    cells: &[GridCell],
    rows: &HashMap<usize, Vec<usize>>,
) -> Result<Vec<f64>, DisplacementError>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    let mut values = vec![0.0; cells.len()];
    for row in 0..size.height {
        let line = match lines.next() {
            Some(line) => line?,
            None => {
                return Err(DisplacementError::Truncated(format!(
                    "row {row} of the {channel} channel"
                )))
            }
        };
        let Some(indices) = rows.get(&row) else {
            continue;
        };

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != size.width {
            return Err(DisplacementError::RowWidthMismatch {
                channel,
                row,
                expected: size.width,
                found: tokens.len(),
            });
        }
        for &i in indices {
            let token = tokens[cells[i].col];
            values[i] = token
                .parse::<f64>()
                .map_err(|_| DisplacementError::InvalidValue {
                    channel,
                    row,
                    token: token.to_string(),
                })?;
        }
    }
    debug!("Extracted {} values from the {} channel", cells.len(), channel);
    Ok(values)
}
