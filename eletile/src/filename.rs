//! Tile filename utilities.
//!
//! This module converts between coordinates and DEM tile filenames.
//!
//! # Filename Format
//!
//! Tiles follow the naming convention `{prefix}{N|S}{lat}{E|W}{lon}{suffix}.{ext}`,
//! by default the ASTER GDEM v2 one: `ASTGTM2_N47E010_dem.tif`.
//!
//! - Latitude: 2 digits with N/S prefix (e.g., N47, S04)
//! - Longitude: 3 digits with E/W prefix (e.g., E010, W071)
//!
//! The digits are the magnitude of the **southwest corner** of the 1° × 1°
//! cell. The hemisphere letter is taken from the sign of the *queried*
//! coordinate, not of the corner, and is `N`/`E` only for strictly positive
//! values. A query on the equator or on the prime meridian therefore yields
//! `S`/`W`: `(0.0, 0.0)` maps to `ASTGTM2_S00W000_dem.tif`.

use std::fmt;

/// Default filename prefix (ASTER GDEM v2).
pub const DEFAULT_PREFIX: &str = "ASTGTM2_";

/// Default filename suffix, placed before the extension.
pub const DEFAULT_SUFFIX: &str = "_dem";

/// Default raster file extension.
pub const DEFAULT_EXTENSION: &str = "tif";

/// Canonical identifier of a 1° × 1° tile.
///
/// The key is the tile's filename; it also remembers the lower-left corner of
/// the cell it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    name: String,
    lat: i32,
    lon: i32,
}

impl TileKey {
    /// Create a key from a filename and the lower-left corner of its cell.
    pub fn new(name: impl Into<String>, lat: i32, lon: i32) -> Self {
        Self {
            name: name.into(),
            lat,
            lon,
        }
    }

    /// The tile filename, e.g. `ASTGTM2_N47E010_dem.tif`.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Latitude of the cell's lower-left corner.
    pub fn lower_left_lat(&self) -> i32 {
        self.lat
    }

    /// Longitude of the cell's lower-left corner.
    pub fn lower_left_lon(&self) -> i32 {
        self.lon
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl AsRef<str> for TileKey {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

/// Naming scheme for tile files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileNaming {
    prefix: String,
    suffix: String,
    extension: String,
}

impl Default for TileNaming {
    fn default() -> Self {
        Self::aster()
    }
}

impl TileNaming {
    /// Create a naming scheme.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Text before the hemisphere letter (e.g. `ASTGTM2_`)
    /// * `suffix` - Text between the longitude digits and the extension (e.g. `_dem`)
    /// * `extension` - File extension without the dot (e.g. `tif`)
    pub fn new(
        prefix: impl Into<String>,
        suffix: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        let extension = extension.into();
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// ASTER GDEM v2 naming: `ASTGTM2_N47E010_dem.tif`.
    pub fn aster() -> Self {
        Self::new(DEFAULT_PREFIX, DEFAULT_SUFFIX, DEFAULT_EXTENSION)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Build the filename of the tile containing `(lat, lon)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use eletile::filename::TileNaming;
    ///
    /// let naming = TileNaming::aster();
    /// assert_eq!(naming.filename(47.5, 10.5), "ASTGTM2_N47E010_dem.tif");
    /// assert_eq!(naming.filename(-3.2, -70.9), "ASTGTM2_S04W071_dem.tif");
    /// assert_eq!(naming.filename(0.0, 0.0), "ASTGTM2_S00W000_dem.tif");
    /// ```
    pub fn filename(&self, lat: f64, lon: f64) -> String {
        let (lat_int, lon_int) = lower_left(lat, lon);

        format!(
            "{}{}{:02}{}{:03}{}.{}",
            self.prefix,
            north_south(lat),
            lat_int.unsigned_abs(),
            east_west(lon),
            lon_int.unsigned_abs(),
            self.suffix,
            self.extension
        )
    }

    /// Build the [`TileKey`] of the tile containing `(lat, lon)`.
    pub fn key_for(&self, lat: f64, lon: f64) -> TileKey {
        let (lat_int, lon_int) = lower_left(lat, lon);
        let name = self.filename(lat, lon);
        tracing::trace!(lat, lon, key = %name, "generated tile filename");
        TileKey::new(name, lat_int, lon_int)
    }

    /// Parse a tile filename to extract the lower-left corner.
    ///
    /// Accepts a bare filename or a path. Returns `None` if the name does not
    /// follow this naming scheme.
    ///
    /// # Examples
    ///
    /// ```
    /// use eletile::filename::TileNaming;
    ///
    /// let naming = TileNaming::aster();
    /// assert_eq!(naming.parse("ASTGTM2_N47E010_dem.tif"), Some((47, 10)));
    /// assert_eq!(naming.parse("/data/ASTGTM2_S04W071_dem.tif"), Some((-4, -71)));
    /// assert_eq!(naming.parse("N47E010.hgt"), None);
    /// ```
    pub fn parse(&self, filename: &str) -> Option<(i32, i32)> {
        // Extract just the filename if a path is given
        let name = filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(filename);

        let name = name.strip_prefix(self.prefix.as_str())?;
        let name = name
            .strip_suffix(self.extension.as_str())
            .and_then(|n| n.strip_suffix('.'))
            .unwrap_or(name);
        let name = name.strip_suffix(self.suffix.as_str())?;

        parse_cell(name)
    }
}

/// Convert latitude and longitude to a tile filename using the default
/// ASTER GDEM naming.
///
/// # Examples
///
/// ```
/// use eletile::filename::lat_lon_to_filename;
///
/// assert_eq!(lat_lon_to_filename(47.5, 10.5), "ASTGTM2_N47E010_dem.tif");
/// ```
pub fn lat_lon_to_filename(lat: f64, lon: f64) -> String {
    TileNaming::aster().filename(lat, lon)
}

/// Lower-left corner of the 1° cell containing `(lat, lon)`.
pub fn lower_left(lat: f64, lon: f64) -> (i32, i32) {
    (lat.floor() as i32, lon.floor() as i32)
}

/// Hemisphere letter for a latitude: `N` when strictly positive, `S` otherwise.
pub fn north_south(lat: f64) -> char {
    if lat > 0.0 {
        'N'
    } else {
        'S'
    }
}

/// Hemisphere letter for a longitude: `E` when strictly positive, `W` otherwise.
pub fn east_west(lon: f64) -> char {
    if lon > 0.0 {
        'E'
    } else {
        'W'
    }
}

/// Parse the `N47E010` part of a tile name.
fn parse_cell(name: &str) -> Option<(i32, i32)> {
    // Must be exactly 7 ASCII characters: N00E000
    if name.len() != 7 || !name.is_ascii() {
        return None;
    }

    let bytes = name.as_bytes();

    let lat_sign = match bytes[0] {
        b'N' | b'n' => 1,
        b'S' | b's' => -1,
        _ => return None,
    };
    let lat: i32 = name[1..3].parse().ok()?;

    let lon_sign = match bytes[3] {
        b'E' | b'e' => 1,
        b'W' | b'w' => -1,
        _ => return None,
    };
    let lon: i32 = name[4..7].parse().ok()?;

    Some((lat * lat_sign, lon * lon_sign))
}
