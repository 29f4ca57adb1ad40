// THEORY:
// The `mapping` module answers one question: which linear pixel of the serial
// chain sits at grid cell `(x, y)`? A physical strip is a single daisy-chained
// series of pixels, but it is installed folded across a 2D panel in one of
// several wiring topologies. `StripMapping` turns a topology description into
// a lookup table once, at construction, and is immutable afterwards.
//
// Key architectural principles:
// 1.  **Bijection invariant**: every generated table maps the index range
//     `0..width*height` onto the grid cells exactly once. User-supplied
//     tables may leave cells unmapped, but their present indices must still
//     form the contiguous range `0..pixel_count` with no duplicates; anything
//     else fails construction loudly instead of corrupting lookups later.
// 2.  **Immutable sharing**: after construction the table never changes, so
//     it is shared across tasks behind an `Arc` with no locking.
// 3.  **Both directions**: the inverse table `index -> (x, y)` is built at
//     construction, so painting code can walk the chain while display code
//     walks the grid.

use std::collections::HashSet;

use thiserror::Error;

use crate::core_modules::pixel::PixelIndex;

/// Which grid corner holds linear pixel index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroLocation {
    #[default]
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl ZeroLocation {
    /// Decomposes the corner into `(cardinal, left_to_right)`: `cardinal`
    /// flips the vertical origin to the bottom edge, `left_to_right` sets the
    /// horizontal scan direction.
    fn orientation(self) -> (bool, bool) {
        match self {
            ZeroLocation::TopLeft => (false, true),
            ZeroLocation::TopRight => (false, false),
            ZeroLocation::BottomLeft => (true, true),
            ZeroLocation::BottomRight => (true, false),
        }
    }
}

/// A `ZeroLocation` or `Pattern` name that matches no known variant.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown name {name:?}, expected one of: {expected}")]
pub struct UnknownNameError {
    name: String,
    expected: &'static str,
}

impl std::str::FromStr for ZeroLocation {
    type Err = UnknownNameError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "top-left" => Ok(ZeroLocation::TopLeft),
            "top-right" => Ok(ZeroLocation::TopRight),
            "bottom-left" => Ok(ZeroLocation::BottomLeft),
            "bottom-right" => Ok(ZeroLocation::BottomRight),
            _ => Err(UnknownNameError {
                name: name.to_string(),
                expected: "top-left, top-right, bottom-left, bottom-right",
            }),
        }
    }
}

/// How the physical chain folds across the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pattern {
    /// Column-major scan; every column runs in the same direction.
    #[default]
    Vertical,
    /// Column-major scan; every other column reverses (daisy-chained strip).
    VerticalSerpentine,
    /// Row-major scan; every row runs in the same direction.
    Horizontal,
    /// Row-major scan; every other row reverses.
    HorizontalSerpentine,
}

impl std::str::FromStr for Pattern {
    type Err = UnknownNameError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "vertical" => Ok(Pattern::Vertical),
            "vertical-serpentine" => Ok(Pattern::VerticalSerpentine),
            "horizontal" => Ok(Pattern::Horizontal),
            "horizontal-serpentine" => Ok(Pattern::HorizontalSerpentine),
            _ => Err(UnknownNameError {
                name: name.to_string(),
                expected: "vertical, vertical-serpentine, horizontal, horizontal-serpentine",
            }),
        }
    }
}

/// Source of the mapping table: generated from a topology, or supplied by the
/// user as rows of optional indices.
#[derive(Debug, Clone)]
pub enum Layout {
    Generated {
        zero_location: ZeroLocation,
        pattern: Pattern,
    },
    Custom(Vec<Vec<Option<PixelIndex>>>),
}

/// Configuration for a `StripMapping`, plain fields constructed by the caller.
#[derive(Debug, Clone)]
pub struct MappingConfig {
    pub grid_width: usize,
    pub grid_height: usize,
    pub layout: Layout,
}

/// Construction failures for user-supplied tables. All are fatal: the process
/// must not start with a malformed mapping.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    /// The supplied rows do not match the configured grid dimensions.
    #[error(
        "custom mapping is {found_rows} rows x {found_columns} columns, \
         grid is {grid_height} rows x {grid_width} columns"
    )]
    GridSizeMismatch {
        grid_width: usize,
        grid_height: usize,
        found_rows: usize,
        found_columns: usize,
    },
    /// The same pixel index appears in more than one cell.
    #[error("custom mapping has duplicate pixel index {0}")]
    DuplicateIndex(PixelIndex),
    /// The present indices skip a value; the chain would have a hole.
    #[error("custom mapping values are not continuous, index {0} is missing")]
    NonContiguousIndex(PixelIndex),
}

/// Immutable lookup table between grid coordinates and linear pixel indices.
#[derive(Debug)]
pub struct StripMapping {
    grid_width: usize,
    grid_height: usize,
    /// Flat row-major cells, `y * grid_width + x`.
    cells: Vec<Option<PixelIndex>>,
    /// Inverse table, `index -> (x, y)`.
    positions: Vec<(usize, usize)>,
    pixel_count: usize,
}

impl StripMapping {
    pub fn new(config: MappingConfig) -> Result<Self, MappingError> {
        let (cells, pixel_count) = match config.layout {
            Layout::Generated {
                zero_location,
                pattern,
            } => {
                let cells = generate(
                    config.grid_width,
                    config.grid_height,
                    zero_location,
                    pattern,
                );
                let pixel_count = config.grid_width * config.grid_height;
                (cells, pixel_count)
            }
            Layout::Custom(rows) => {
                validate_custom(config.grid_width, config.grid_height, &rows)?
            }
        };

        // Contiguity is guaranteed above, so every index lands exactly once.
        let mut positions = vec![(0, 0); pixel_count];
        for y in 0..config.grid_height {
            for x in 0..config.grid_width {
                if let Some(index) = cells[y * config.grid_width + x] {
                    positions[index] = (x, y);
                }
            }
        }

        Ok(Self {
            grid_width: config.grid_width,
            grid_height: config.grid_height,
            cells,
            positions,
            pixel_count,
        })
    }

    /// Returns the linear pixel index at grid cell `(x, y)`, or `None` if the
    /// coordinate is outside the grid or the cell is unmapped.
    pub fn get(&self, x: usize, y: usize) -> Option<PixelIndex> {
        if x >= self.grid_width || y >= self.grid_height {
            return None;
        }
        self.cells[y * self.grid_width + x]
    }

    /// Returns the grid cell holding `index`, or `None` past the chain end.
    pub fn index_to_xy(&self, index: PixelIndex) -> Option<(usize, usize)> {
        self.positions.get(index).copied()
    }

    /// Number of addressable pixels in the chain.
    pub fn pixel_count(&self) -> usize {
        self.pixel_count
    }

    pub fn grid_width(&self) -> usize {
        self.grid_width
    }

    pub fn grid_height(&self) -> usize {
        self.grid_height
    }
}

fn generate(
    grid_width: usize,
    grid_height: usize,
    zero_location: ZeroLocation,
    pattern: Pattern,
) -> Vec<Option<PixelIndex>> {
    let (cardinal, left_to_right) = zero_location.orientation();
    match pattern {
        Pattern::Vertical => vertical(grid_width, grid_height, cardinal, left_to_right),
        Pattern::VerticalSerpentine => {
            vertical_serpentine(grid_width, grid_height, cardinal, left_to_right)
        }
        Pattern::Horizontal => horizontal(grid_width, grid_height, cardinal, left_to_right),
        Pattern::HorizontalSerpentine => {
            horizontal_serpentine(grid_width, grid_height, cardinal, left_to_right)
        }
    }
}

fn scan_order(count: usize, forward: bool) -> Vec<usize> {
    if forward {
        (0..count).collect()
    } else {
        (0..count).rev().collect()
    }
}

/// Column-major scan. For a 4x4 grid, zero at the top left:
///
/// ```text
/// 00 04 08 12
/// 01 05 09 13
/// 02 06 10 14
/// 03 07 11 15
/// ```
fn vertical(
    grid_width: usize,
    grid_height: usize,
    cardinal: bool,
    left_to_right: bool,
) -> Vec<Option<PixelIndex>> {
    let mut cells = vec![None; grid_width * grid_height];
    let mut index = 0;
    for x in scan_order(grid_width, left_to_right) {
        for y in scan_order(grid_height, !cardinal) {
            cells[y * grid_width + x] = Some(index);
            index += 1;
        }
    }
    cells
}

/// Column-major scan with every other column reversed, the layout of a
/// single strip folded back on itself vertically. For a 4x4 grid, zero at
/// the top left:
///
/// ```text
/// 00 07 08 15
/// 01 06 09 14
/// 02 05 10 13
/// 03 04 11 12
/// ```
fn vertical_serpentine(
    grid_width: usize,
    grid_height: usize,
    cardinal: bool,
    left_to_right: bool,
) -> Vec<Option<PixelIndex>> {
    let mut cells = vec![None; grid_width * grid_height];
    let mut index = 0;
    for (x_ordinal, x) in scan_order(grid_width, left_to_right).into_iter().enumerate() {
        // The zig alternates on the scan ordinal, not the physical column,
        // and flips with the vertical origin.
        let zig = if cardinal {
            x_ordinal % 2 == 0
        } else {
            x_ordinal % 2 == 1
        };
        for y in scan_order(grid_height, !zig) {
            cells[y * grid_width + x] = Some(index);
            index += 1;
        }
    }
    cells
}

/// Row-major scan. For a 4x4 grid, zero at the top left:
///
/// ```text
/// 00 01 02 03
/// 04 05 06 07
/// 08 09 10 11
/// 12 13 14 15
/// ```
fn horizontal(
    grid_width: usize,
    grid_height: usize,
    cardinal: bool,
    left_to_right: bool,
) -> Vec<Option<PixelIndex>> {
    let mut cells = vec![None; grid_width * grid_height];
    let mut index = 0;
    for y in scan_order(grid_height, !cardinal) {
        for x in scan_order(grid_width, left_to_right) {
            cells[y * grid_width + x] = Some(index);
            index += 1;
        }
    }
    cells
}

/// Row-major scan with every other row reversed. For a 4x4 grid, zero at the
/// top left:
///
/// ```text
/// 00 01 02 03
/// 07 06 05 04
/// 08 09 10 11
/// 15 14 13 12
/// ```
fn horizontal_serpentine(
    grid_width: usize,
    grid_height: usize,
    cardinal: bool,
    left_to_right: bool,
) -> Vec<Option<PixelIndex>> {
    let mut cells = vec![None; grid_width * grid_height];
    let mut index = 0;
    for (y_ordinal, y) in scan_order(grid_height, !cardinal).into_iter().enumerate() {
        let zig = if left_to_right {
            y_ordinal % 2 == 1
        } else {
            y_ordinal % 2 == 0
        };
        for x in scan_order(grid_width, !zig) {
            cells[y * grid_width + x] = Some(index);
            index += 1;
        }
    }
    cells
}

type CustomTable = (Vec<Option<PixelIndex>>, usize);

fn validate_custom(
    grid_width: usize,
    grid_height: usize,
    rows: &[Vec<Option<PixelIndex>>],
) -> Result<CustomTable, MappingError> {
    let size_mismatch = |found_rows: usize, found_columns: usize| MappingError::GridSizeMismatch {
        grid_width,
        grid_height,
        found_rows,
        found_columns,
    };

    if rows.len() != grid_height {
        let found_columns = rows.first().map_or(0, Vec::len);
        return Err(size_mismatch(rows.len(), found_columns));
    }
    for row in rows {
        if row.len() != grid_width {
            return Err(size_mismatch(rows.len(), row.len()));
        }
    }

    let mut cells = vec![None; grid_width * grid_height];
    let mut seen = HashSet::new();
    for (y, row) in rows.iter().enumerate() {
        for (x, cell) in row.iter().enumerate() {
            if let Some(index) = *cell {
                if !seen.insert(index) {
                    return Err(MappingError::DuplicateIndex(index));
                }
                cells[y * grid_width + x] = Some(index);
            }
        }
    }

    // Sorted positional check: the present indices must be exactly 0..N.
    let mut values: Vec<PixelIndex> = seen.into_iter().collect();
    values.sort_unstable();
    for (expected, &value) in values.iter().enumerate() {
        if value != expected {
            return Err(MappingError::NonContiguousIndex(expected));
        }
    }

    let pixel_count = values.len();
    Ok((cells, pixel_count))
}
