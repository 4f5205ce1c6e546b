//! Synthetic GeoTIFF fixtures for unit tests.

use std::fs::File;
use std::path::Path;

use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

enum Georef {
    TiepointScale { west: f64, north: f64, res: f64 },
    ModelTransformation { west: f64, north: f64, res: f64 },
    Absent,
}

/// Builder for a small single-band GeoTIFF written to disk.
pub(crate) struct GeoTiffFixture {
    width: u32,
    height: u32,
    samples: Vec<f32>,
    georef: Georef,
    no_data: Option<String>,
    pixel_is_point: bool,
    unsigned: bool,
}

impl GeoTiffFixture {
    /// North-up grid with square cells of `res` degrees, outer corner at
    /// `(west, north)`, filled with 100.0 and declaring nodata `-9999`.
    pub(crate) fn north_up(width: u32, height: u32, west: f64, north: f64, res: f64) -> Self {
        Self {
            width,
            height,
            samples: vec![100.0; (width * height) as usize],
            georef: Georef::TiepointScale { west, north, res },
            no_data: Some("-9999".to_string()),
            pixel_is_point: false,
            unsigned: false,
        }
    }

    /// `size` x `size` grid covering the 1 degree cell with lower-left corner
    /// `(lat, lon)`.
    pub(crate) fn cell(lat: i32, lon: i32, size: u32) -> Self {
        Self::north_up(
            size,
            size,
            f64::from(lon),
            f64::from(lat + 1),
            1.0 / f64::from(size),
        )
    }

    pub(crate) fn samples(mut self, samples: Vec<f32>) -> Self {
        assert_eq!(samples.len(), (self.width * self.height) as usize);
        self.samples = samples;
        self
    }

    pub(crate) fn no_data(mut self, no_data: Option<&str>) -> Self {
        self.no_data = no_data.map(str::to_string);
        self
    }

    pub(crate) fn model_transformation(mut self, west: f64, north: f64, res: f64) -> Self {
        self.georef = Georef::ModelTransformation { west, north, res };
        self
    }

    pub(crate) fn without_georeferencing(mut self) -> Self {
        self.georef = Georef::Absent;
        self
    }

    pub(crate) fn pixel_is_point(mut self, pixel_is_point: bool) -> Self {
        self.pixel_is_point = pixel_is_point;
        self
    }

    /// Store samples as 16-bit unsigned integers instead of 32-bit floats.
    pub(crate) fn unsigned_16bit(mut self) -> Self {
        self.unsigned = true;
        self
    }

    pub(crate) fn write(&self, path: &Path) {
        macro_rules! write_geo_tags {
            ($dir:expr) => {{
                let dir = $dir;
                match self.georef {
                    Georef::TiepointScale { west, north, res } => {
                        dir.write_tag(
                            Tag::Unknown(33922),
                            &[0.0, 0.0, 0.0, west, north, 0.0][..],
                        )
                        .unwrap();
                        dir.write_tag(Tag::Unknown(33550), &[res, res, 0.0][..])
                            .unwrap();
                    }
                    Georef::ModelTransformation { west, north, res } => {
                        #[rustfmt::skip]
                        let matrix = [
                            res, 0.0, 0.0, west,
                            0.0, -res, 0.0, north,
                            0.0, 0.0, 0.0, 0.0,
                            0.0, 0.0, 0.0, 1.0,
                        ];
                        dir.write_tag(Tag::Unknown(34264), &matrix[..]).unwrap();
                    }
                    Georef::Absent => {}
                }
                let raster_type: u16 = if self.pixel_is_point { 2 } else { 1 };
                dir.write_tag(
                    Tag::Unknown(34735),
                    &[1u16, 1, 0, 1, 1025, 0, 1, raster_type][..],
                )
                .unwrap();
                if let Some(no_data) = &self.no_data {
                    dir.write_tag(Tag::Unknown(42113), no_data.as_str()).unwrap();
                }
            }};
        }

        let file = File::create(path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();

        if self.unsigned {
            let data: Vec<u16> = self.samples.iter().map(|&v| v as u16).collect();
            let mut image = encoder
                .new_image::<colortype::Gray16>(self.width, self.height)
                .unwrap();
            write_geo_tags!(image.encoder());
            image.write_data(&data).unwrap();
        } else {
            let mut image = encoder
                .new_image::<colortype::Gray32Float>(self.width, self.height)
                .unwrap();
            write_geo_tags!(image.encoder());
            image.write_data(&self.samples).unwrap();
        }
    }
}

/// Write a three-band RGB image.
pub(crate) fn write_rgb_tiff(path: &Path, width: u32, height: u32) {
    let file = File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(file).unwrap();
    let data = vec![0u8; (width * height * 3) as usize];
    encoder
        .write_image::<colortype::RGB8>(width, height, &data)
        .unwrap();
}
