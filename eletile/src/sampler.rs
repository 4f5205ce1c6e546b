//! Bilinear interpolation over a [`RasterTile`].
//!
//! The four samples used for a query are chosen relative to the center of the
//! cell containing the point: the query's position north/south and east/west
//! of that center picks which neighbours complete the 2x2 block. Points that
//! fall exactly on a center row or column are treated as north and east
//! respectively.

use crate::raster::RasterTile;

/// Grid position as `(col, row)`; rows increase southward.
type Cell = (i64, i64);

/// Position of the query relative to the nearest cell center.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quadrant {
    SouthEast,
    SouthWest,
    NorthEast,
    NorthWest,
}

impl Quadrant {
    fn select(lat: f64, lon: f64, center_lat: f64, center_lon: f64) -> Self {
        if lat < center_lat && lon >= center_lon {
            Quadrant::SouthEast
        } else if lat < center_lat && lon < center_lon {
            Quadrant::SouthWest
        } else if lat >= center_lat && lon >= center_lon {
            Quadrant::NorthEast
        } else {
            Quadrant::NorthWest
        }
    }

    /// The 2x2 block as `[upper-left, upper-right, lower-left, lower-right]`.
    fn block(self, (col, row): Cell) -> [Cell; 4] {
        match self {
            Quadrant::SouthEast => [
                (col, row),
                (col + 1, row),
                (col, row + 1),
                (col + 1, row + 1),
            ],
            Quadrant::SouthWest => [
                (col - 1, row),
                (col, row),
                (col - 1, row + 1),
                (col, row + 1),
            ],
            Quadrant::NorthEast => [
                (col, row - 1),
                (col + 1, row - 1),
                (col, row),
                (col + 1, row),
            ],
            Quadrant::NorthWest => [
                (col - 1, row - 1),
                (col, row - 1),
                (col - 1, row),
                (col, row),
            ],
        }
    }
}

/// Interpolate the elevation at `(lat, lon)`.
///
/// Returns `None` (void) when any of the four samples lies outside the grid or
/// equals the tile's nodata value. A sample of `0` is a valid elevation.
///
/// # Examples
///
/// ```
/// use eletile::raster::{GeoTransform, RasterTile};
/// use eletile::sampler::sample;
///
/// let transform = GeoTransform::north_up(0.0, 2.0, 1.0, 1.0).unwrap();
/// let tile = RasterTile::new(2, 2, -9999.0, transform, vec![10.0, 20.0, 30.0, 40.0]).unwrap();
///
/// assert_eq!(sample(&tile, 1.0, 1.0), Some(25.0));
/// ```
pub fn sample(tile: &RasterTile, lat: f64, lon: f64) -> Option<f64> {
    let transform = tile.transform();

    let nearest = transform.cell_containing(lon, lat)?;
    if !is_near_grid(tile, nearest) {
        return None;
    }
    let (center_lon, center_lat) = transform.cell_center(nearest.0, nearest.1);
    let [ul, ur, dl, dr] = Quadrant::select(lat, lon, center_lat, center_lon).block(nearest);

    let ul_value = tile.get(ul.0, ul.1)?;
    let ur_value = tile.get(ur.0, ur.1)?;
    let dl_value = tile.get(dl.0, dl.1)?;
    let dr_value = tile.get(dr.0, dr.1)?;

    if [ul_value, ur_value, dl_value, dr_value]
        .into_iter()
        .any(|v| tile.is_no_data(v))
    {
        return None;
    }

    let (ul_lon, ul_lat) = transform.cell_center(ul.0, ul.1);
    let (ur_lon, _) = transform.cell_center(ur.0, ur.1);
    let (_, dl_lat) = transform.cell_center(dl.0, dl.1);

    let xfrac = (lon - ul_lon) / (ur_lon - ul_lon);
    let yfrac = (ul_lat - lat) / (ul_lat - dl_lat);

    Some(
        ul_value * (1.0 - xfrac) * (1.0 - yfrac)
            + ur_value * xfrac * (1.0 - yfrac)
            + dl_value * (1.0 - xfrac) * yfrac
            + dr_value * xfrac * yfrac,
    )
}

/// Whether `cell` is inside the grid or one cell outside it, so that every
/// block built around it stays within `i64`.
fn is_near_grid(tile: &RasterTile, (col, row): Cell) -> bool {
    let width = i64::try_from(tile.width()).unwrap_or(i64::MAX - 1);
    let height = i64::try_from(tile.height()).unwrap_or(i64::MAX - 1);
    (-1..=width).contains(&col) && (-1..=height).contains(&row)
}
