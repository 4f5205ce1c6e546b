//! Raster decoding into in-memory elevation grids.
//!
//! A [`RasterTile`] is the decoded form of one tile file: a row-major grid of
//! samples (row 0 is the northern edge), a nodata sentinel and the affine
//! [`GeoTransform`] that maps grid cells to world coordinates. Tiles are
//! immutable once built and are shared between threads as `Arc<RasterTile>`.
//!
//! [`GeoTiffReader`] is the default [`RasterReader`]. It reads single-band
//! GeoTIFF files and takes georeferencing from the standard GeoTIFF tags.

use std::fs::File;
use std::io::{Cursor, ErrorKind, Read, Seek};
use std::path::Path;

use memmap2::Mmap;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::ColorType;

use crate::error::{Result, TileError};

/// `ModelPixelScaleTag`
const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
/// `ModelTiepointTag`
const TAG_MODEL_TIEPOINT: u16 = 33922;
/// `ModelTransformationTag`
const TAG_MODEL_TRANSFORMATION: u16 = 34264;
/// `GeoKeyDirectoryTag`
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
/// `GDAL_NODATA`, stored as an ASCII string.
const TAG_GDAL_NODATA: u16 = 42113;

/// `GTRasterTypeGeoKey` inside the GeoKey directory.
const GEO_KEY_RASTER_TYPE: u16 = 1025;
/// `RasterPixelIsPoint`
const RASTER_PIXEL_IS_POINT: u16 = 2;

/// Nodata sentinel assumed when a file does not declare one (ASTER GDEM).
pub const DEFAULT_NO_DATA: f64 = -9999.0;

/// Affine mapping between grid space and world space.
///
/// Coefficients follow the GDAL layout. For a grid position `(col, row)`
/// measured from the outer corner of the first cell:
///
/// ```text
/// x = c[0] + col * c[1] + row * c[2]
/// y = c[3] + col * c[4] + row * c[5]
/// ```
///
/// `x` is longitude and `y` latitude for geographic tiles. A north-up tile has
/// `c[2] == c[4] == 0` and a negative `c[5]`, so rows increase southward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    coefficients: [f64; 6],
}

impl GeoTransform {
    /// Build a transform from GDAL-ordered coefficients.
    ///
    /// Returns `None` if a coefficient is not finite or the linear part is
    /// singular.
    pub fn new(coefficients: [f64; 6]) -> Option<Self> {
        let transform = Self { coefficients };
        transform.is_invertible().then_some(transform)
    }

    /// North-up transform with its outer corner at `(west, north)` and cells
    /// of `x_res` by `y_res` degrees (both positive).
    pub fn north_up(west: f64, north: f64, x_res: f64, y_res: f64) -> Option<Self> {
        Self::new([west, x_res, 0.0, north, 0.0, -y_res])
    }

    /// Build a transform from a GeoTIFF `ModelTiepoint` / `ModelPixelScale` pair.
    ///
    /// Only the first tiepoint is used. The pixel scale's Y component is
    /// positive for north-up images, so it is negated here.
    pub fn from_tiepoint_scale(tiepoint: &[f64], scale: &[f64]) -> Option<Self> {
        if tiepoint.len() < 6 || scale.len() < 2 {
            return None;
        }
        let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
        let (sx, sy) = (scale[0], scale[1]);

        Self::new([x - i * sx, sx, 0.0, y + j * sy, 0.0, -sy])
    }

    /// Build a transform from a GeoTIFF `ModelTransformation` 4x4 matrix
    /// (row-major, 16 values).
    pub fn from_model_transformation(matrix: &[f64]) -> Option<Self> {
        if matrix.len() < 16 {
            return None;
        }
        Self::new([
            matrix[3], matrix[0], matrix[1], matrix[7], matrix[4], matrix[5],
        ])
    }

    /// GDAL-ordered coefficients.
    pub fn coefficients(&self) -> [f64; 6] {
        self.coefficients
    }

    /// Size of one cell along x and y (y is negative for north-up tiles).
    pub fn resolution(&self) -> (f64, f64) {
        (self.coefficients[1], self.coefficients[5])
    }

    /// Move the origin by half a cell toward negative grid indices.
    ///
    /// Converts a transform anchored on the first cell's center (GeoTIFF
    /// `PixelIsPoint`) into one anchored on its outer corner.
    pub fn shifted_half_cell(&self) -> Self {
        let [x0, dx, rx, y0, ry, dy] = self.coefficients;
        Self {
            coefficients: [x0 - 0.5 * (dx + rx), dx, rx, y0 - 0.5 * (ry + dy), ry, dy],
        }
    }

    /// World position of a fractional grid position.
    pub fn grid_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        let [x0, dx, rx, y0, ry, dy] = self.coefficients;
        (x0 + col * dx + row * rx, y0 + col * ry + row * dy)
    }

    /// World position of the center of cell `(col, row)`.
    pub fn cell_center(&self, col: i64, row: i64) -> (f64, f64) {
        self.grid_to_world(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Fractional grid position of a world point.
    pub fn world_to_grid(&self, x: f64, y: f64) -> (f64, f64) {
        let [x0, dx, rx, y0, ry, dy] = self.coefficients;
        let det = dx * dy - rx * ry;
        let (ox, oy) = (x - x0, y - y0);
        ((dy * ox - rx * oy) / det, (dx * oy - ry * ox) / det)
    }

    /// Cell containing a world point, which is also the cell whose center is
    /// nearest to it. May lie outside any particular grid.
    pub fn cell_containing(&self, x: f64, y: f64) -> Option<(i64, i64)> {
        let (col, row) = self.world_to_grid(x, y);
        let (col, row) = (col.floor(), row.floor());
        if !col.is_finite() || !row.is_finite() {
            return None;
        }
        // Saturating casts keep absurd inputs out of range instead of wrapping.
        Some((col as i64, row as i64))
    }

    fn is_invertible(&self) -> bool {
        let [_, dx, rx, _, ry, dy] = self.coefficients;
        let det = dx * dy - rx * ry;
        self.coefficients.iter().all(|c| c.is_finite()) && det != 0.0 && det.is_finite()
    }
}

/// A decoded elevation tile.
#[derive(Debug, Clone)]
pub struct RasterTile {
    width: usize,
    height: usize,
    no_data: f64,
    transform: GeoTransform,
    samples: Vec<f32>,
}

impl RasterTile {
    /// Build a tile from row-major samples.
    ///
    /// Returns `None` if the grid is empty or `samples.len()` is not
    /// `width * height`.
    pub fn new(
        width: usize,
        height: usize,
        no_data: f64,
        transform: GeoTransform,
        samples: Vec<f32>,
    ) -> Option<Self> {
        if width == 0 || height == 0 || width.checked_mul(height)? != samples.len() {
            return None;
        }
        Some(Self {
            width,
            height,
            no_data,
            transform,
            samples,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// The nodata sentinel.
    pub fn no_data(&self) -> f64 {
        self.no_data
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Sample at `(col, row)`, or `None` outside the grid.
    ///
    /// Nodata samples are returned as stored; see [`RasterTile::is_no_data`].
    pub fn get(&self, col: i64, row: i64) -> Option<f64> {
        let col = usize::try_from(col).ok().filter(|&c| c < self.width)?;
        let row = usize::try_from(row).ok().filter(|&r| r < self.height)?;
        Some(f64::from(self.samples[row * self.width + col]))
    }

    /// Whether a sample value equals the nodata sentinel.
    pub fn is_no_data(&self, value: f64) -> bool {
        if self.no_data.is_nan() {
            value.is_nan()
        } else {
            value == self.no_data || value as f32 == self.no_data as f32
        }
    }

    /// World extent as `(west, south, east, north)`.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let corners = [
            self.transform.grid_to_world(0.0, 0.0),
            self.transform.grid_to_world(self.width as f64, 0.0),
            self.transform.grid_to_world(0.0, self.height as f64),
            self.transform
                .grid_to_world(self.width as f64, self.height as f64),
        ];
        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(w, s, e, n), &(x, y)| (w.min(x), s.min(y), e.max(x), n.max(y)),
        )
    }

    /// Smallest and largest valid sample, or `None` if every sample is void.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.samples
            .iter()
            .map(|&v| f64::from(v))
            .filter(|&v| !self.is_no_data(v))
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Number of nodata samples.
    pub fn void_count(&self) -> usize {
        self.samples
            .iter()
            .filter(|&&v| self.is_no_data(f64::from(v)))
            .count()
    }
}

/// Decodes a tile file into a [`RasterTile`].
///
/// Implementations either return a complete tile or an error; they never
/// return a partially built one.
pub trait RasterReader: Send + Sync {
    fn load(&self, path: &Path) -> Result<RasterTile>;
}

/// Reads single-band GeoTIFF tiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffReader;

impl GeoTiffReader {
    pub fn new() -> Self {
        Self
    }
}

impl RasterReader for GeoTiffReader {
    fn load(&self, path: &Path) -> Result<RasterTile> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TileError::FileNotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        // SAFETY: Memory mapping is safe as long as the file is not modified
        // while mapped. The mapping is read-only and dropped before returning.
        let mmap = unsafe { Mmap::map(&file)? };

        // A 1 arc-second tile is 3601 x 3601 samples, well inside these limits
        let mut limits = Limits::default();
        limits.decoding_buffer_size = 1024 * 1024 * 1024;
        limits.intermediate_buffer_size = 1024 * 1024 * 1024;
        limits.ifd_value_size = 64 * 1024 * 1024;
        let mut decoder = Decoder::new(Cursor::new(&mmap[..]))?.with_limits(limits);

        let (width, height) = decoder.dimensions()?;
        match decoder.colortype()? {
            ColorType::Gray(_) => {}
            other => {
                return Err(TileError::UnsupportedRaster {
                    path: path.to_path_buf(),
                    reason: format!("expected a single band, found {other:?}"),
                })
            }
        }

        let transform = read_transform(&mut decoder).ok_or_else(|| TileError::InvalidRaster {
            path: path.to_path_buf(),
            reason: "missing or singular georeferencing".to_string(),
        })?;
        let no_data = read_no_data(&mut decoder);
        let samples = decode_samples(&mut decoder, path)?;

        RasterTile::new(
            width as usize,
            height as usize,
            no_data,
            transform,
            samples,
        )
        .ok_or_else(|| TileError::InvalidRaster {
            path: path.to_path_buf(),
            reason: format!("sample count does not match {width}x{height}"),
        })
    }
}

/// Read the affine transform, preferring `ModelTransformation` over a
/// tiepoint/scale pair.
fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let transform = match decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_MODEL_TRANSFORMATION)) {
        Ok(matrix) => GeoTransform::from_model_transformation(&matrix)?,
        Err(_) => {
            let tiepoint = decoder
                .get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_MODEL_TIEPOINT))
                .ok()?;
            let scale = decoder
                .get_tag_f64_vec(Tag::from_u16_exhaustive(TAG_MODEL_PIXEL_SCALE))
                .ok()?;
            GeoTransform::from_tiepoint_scale(&tiepoint, &scale)?
        }
    };

    if is_pixel_is_point(decoder) {
        Some(transform.shifted_half_cell())
    } else {
        Some(transform)
    }
}

/// Whether the GeoKey directory declares `RasterPixelIsPoint`.
fn is_pixel_is_point<R: Read + Seek>(decoder: &mut Decoder<R>) -> bool {
    let Ok(directory) = decoder.get_tag_u16_vec(Tag::from_u16_exhaustive(TAG_GEO_KEY_DIRECTORY)) else {
        return false;
    };

    // Header is 4 shorts, then one 4-short entry per key:
    // [key id, tag location, count, value]
    directory
        .get(4..)
        .unwrap_or_default()
        .chunks_exact(4)
        .any(|entry| {
            entry[0] == GEO_KEY_RASTER_TYPE && entry[1] == 0 && entry[3] == RASTER_PIXEL_IS_POINT
        })
}

fn read_no_data<R: Read + Seek>(decoder: &mut Decoder<R>) -> f64 {
    decoder
        .get_tag_ascii_string(Tag::from_u16_exhaustive(TAG_GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse().ok())
        .unwrap_or(DEFAULT_NO_DATA)
}

#[allow(unreachable_patterns)]
fn decode_samples<R: Read + Seek>(decoder: &mut Decoder<R>, path: &Path) -> Result<Vec<f32>> {
    let unsupported = |kind: &str| TileError::UnsupportedRaster {
        path: path.to_path_buf(),
        reason: format!("{kind} samples"),
    };

    match decoder.read_image()? {
        DecodingResult::I16(data) => Ok(data.into_iter().map(f32::from).collect()),
        DecodingResult::U16(data) => Ok(data.into_iter().map(f32::from).collect()),
        DecodingResult::I8(data) => Ok(data.into_iter().map(f32::from).collect()),
        DecodingResult::U8(data) => Ok(data.into_iter().map(f32::from).collect()),
        DecodingResult::F32(data) => Ok(data),
        DecodingResult::F64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I32(_) => Err(unsupported("32-bit integer")),
        DecodingResult::U32(_) => Err(unsupported("32-bit unsigned integer")),
        DecodingResult::I64(_) => Err(unsupported("64-bit integer")),
        DecodingResult::U64(_) => Err(unsupported("64-bit unsigned integer")),
        _ => Err(unsupported("unknown")),
    }
}
