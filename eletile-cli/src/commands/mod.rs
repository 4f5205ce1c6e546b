pub mod batch;
pub mod info;
pub mod list;
pub mod query;

use anyhow::{Context, Result};
use eletile::{download::DownloadConfig, ElevationEngine, ElevationEngineBuilder, TileNaming};
use std::path::PathBuf;

use crate::EngineArgs;

impl EngineArgs {
    pub fn naming(&self) -> TileNaming {
        TileNaming::new(&self.prefix, &self.suffix, &self.extension)
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        self.data_dir.clone().context(
            "ELETILE_DATA_DIR environment variable not set. Use --data-dir or set ELETILE_DATA_DIR",
        )
    }

    pub fn build_engine(&self) -> Result<ElevationEngine> {
        let mut builder = ElevationEngineBuilder::new(self.data_dir()?)
            .cache_size(self.cache_size)
            .naming(self.naming());

        if let Some(url) = &self.download_url {
            let mut config = DownloadConfig::with_url_template(url.clone());
            if let (Some(user), Some(password)) = (&self.download_user, &self.download_password) {
                config = config.with_basic_auth(user.clone(), password.clone());
            }
            builder = builder.auto_download(config);
        }

        builder.build().context("Failed to create elevation engine")
    }
}

/// `N47 to N48, E010 to E011` for the 1 degree cell at `(lat, lon)`.
pub fn format_coverage(lat: i32, lon: i32) -> String {
    let lat_prefix = if lat >= 0 { "N" } else { "S" };
    let lon_prefix = if lon >= 0 { "E" } else { "W" };
    let lat_end_prefix = if lat + 1 >= 0 { "N" } else { "S" };
    let lon_end_prefix = if lon + 1 >= 0 { "E" } else { "W" };
    format!(
        "{}{:02} to {}{:02}, {}{:03} to {}{:03}",
        lat_prefix,
        lat.abs(),
        lat_end_prefix,
        (lat + 1).abs(),
        lon_prefix,
        lon.abs(),
        lon_end_prefix,
        (lon + 1).abs()
    )
}

pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_coverage() {
        assert_eq!(format_coverage(47, 10), "N47 to N48, E010 to E011");
        assert_eq!(format_coverage(-1, -1), "S01 to N00, W001 to E000");
        assert_eq!(format_coverage(-34, -71), "S34 to S33, W071 to W070");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(25 * 1024 * 1024), "25.00 MB");
    }
}
