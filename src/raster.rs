//! In-memory raster grids and the codec contract
//!
//! A [`Raster`] is a stack of `bands` grids of `height` x `width` `f32` cells,
//! band-major, with NaN as the no-data marker once loaded. Reading GeoTIFF
//! and NetCDF files is the job of a [`RasterCodec`]; [`GridCodec`] is the
//! built-in codec, a self-describing binary grid used for derived artifacts
//! and tests.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::key::catalog::{LOCA, NEXGDDP};

pub const WGS84: &str = "EPSG:4326";

/// Geospatial metadata carried through a computation unchanged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Affine transform `(a, b, c, d, e, f)`: x = a*col + b*row + c, y = d*col + e*row + f
    pub transform: [f64; 6],
    pub crs: Option<String>,
    /// Sentinel replaced by NaN on load; `None` once masked
    pub nodata: Option<f32>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            transform: [1.0, 0.0, 0.0, 0.0, -1.0, 0.0],
            crs: None,
            nodata: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    bands: usize,
    height: usize,
    width: usize,
    data: Vec<f32>,
    pub profile: Profile,
}

impl Raster {
    pub fn new(
        bands: usize,
        height: usize,
        width: usize,
        data: Vec<f32>,
        profile: Profile,
    ) -> Result<Self, CodecError> {
        if data.len() != bands * height * width {
            return Err(CodecError::Shape(format!(
                "{} values for {}x{}x{}",
                data.len(),
                bands,
                height,
                width
            )));
        }
        Ok(Self {
            bands,
            height,
            width,
            data,
            profile,
        })
    }

    pub fn filled(bands: usize, height: usize, width: usize, value: f32) -> Self {
        Self {
            bands,
            height,
            width,
            data: vec![value; bands * height * width],
            profile: Profile::default(),
        }
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Cells per band
    pub fn pixels(&self) -> usize {
        self.height * self.width
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn band(&self, band: usize) -> &[f32] {
        let n = self.pixels();
        &self.data[band * n..(band + 1) * n]
    }

    pub fn get(&self, band: usize, row: usize, col: usize) -> f32 {
        self.data[band * self.pixels() + row * self.width + col]
    }

    /// Values of every band at one cell, in band order
    pub fn column(&self, pixel: usize) -> impl Iterator<Item = f32> + '_ {
        let n = self.pixels();
        (0..self.bands).map(move |b| self.data[b * n + pixel])
    }

    /// Raster of the same grid and profile from band-major cell values
    ///
    /// `data` must hold `bands * pixels()` values.
    pub fn with_bands(&self, bands: usize, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), bands * self.pixels());
        Self {
            bands,
            height: self.height,
            width: self.width,
            data,
            profile: self.profile.clone(),
        }
    }

    /// Stack rasters along the band axis; the first one's profile is kept
    pub fn concat(rasters: Vec<Raster>) -> Result<Raster, CodecError> {
        let mut iter = rasters.into_iter();
        let Some(mut stacked) = iter.next() else {
            return Err(CodecError::Shape("nothing to concatenate".to_string()));
        };
        for raster in iter {
            if raster.height != stacked.height || raster.width != stacked.width {
                return Err(CodecError::Shape(format!(
                    "{}x{} grid cannot be stacked on {}x{}",
                    raster.height, raster.width, stacked.height, stacked.width
                )));
            }
            stacked.bands += raster.bands;
            stacked.data.extend(raster.data);
        }
        Ok(stacked)
    }

    /// Replace the no-data sentinel with NaN
    pub fn mask_nodata(&mut self) {
        if let Some(nodata) = self.profile.nodata.take() {
            for value in self.data.iter_mut() {
                if *value == nodata {
                    *value = f32::NAN;
                }
            }
        }
    }

    /// Rotate every row right by `shift` columns
    pub fn roll_x(&mut self, shift: usize) {
        if self.width == 0 {
            return;
        }
        let shift = shift % self.width;
        for row in self.data.chunks_mut(self.width) {
            row.rotate_right(shift);
        }
    }

    /// Bring a raw source grid onto the common lon/lat frame for its dataset
    ///
    /// NEX-GDDP files are 0..360 longitude; they are re-centred on a 180W
    /// origin with a 90N top edge. LOCA grids only need their CRS set.
    pub fn normalize_source(&mut self, dataset: &str) {
        self.mask_nodata();
        match dataset {
            NEXGDDP => {
                let (h, w) = (self.height as f64, self.width as f64);
                self.roll_x(self.width / 2);
                self.profile.transform = [360.0 / w, 0.0, -180.0, 0.0, -180.0 / h, 90.0];
                self.profile.crs = Some(WGS84.to_string());
            }
            LOCA => self.profile.crs = Some(WGS84.to_string()),
            _ => {}
        }
    }
}

/// Reads and writes raster files
pub trait RasterCodec: Send + Sync {
    fn read(&self, path: &Path) -> Result<Raster, CodecError>;
    fn write(&self, raster: &Raster, path: &Path) -> Result<(), CodecError>;
}

const MAGIC: &[u8; 8] = b"GDDPGRID";
const VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct GridHeader {
    bands: usize,
    height: usize,
    width: usize,
    profile: Profile,
}

/// Built-in codec: magic, version, JSON header, little-endian `f32` cells
#[derive(Debug, Clone, Copy, Default)]
pub struct GridCodec;

impl RasterCodec for GridCodec {
    fn read(&self, path: &Path) -> Result<Raster, CodecError> {
        let io = |source| CodecError::Io {
            path: path.to_path_buf(),
            source,
        };
        let format = |reason: String| CodecError::Format {
            path: path.to_path_buf(),
            reason,
        };

        let mut reader = BufReader::new(File::open(path).map_err(io)?);

        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic).map_err(io)?;
        if &magic != MAGIC {
            return Err(format("not a grid file".to_string()));
        }
        let mut word = [0u8; 4];
        reader.read_exact(&mut word).map_err(io)?;
        let version = u32::from_le_bytes(word);
        if version != VERSION {
            return Err(format(format!("unsupported version {}", version)));
        }

        let mut len = [0u8; 8];
        reader.read_exact(&mut len).map_err(io)?;
        let mut header = vec![0u8; u64::from_le_bytes(len) as usize];
        reader.read_exact(&mut header).map_err(io)?;
        let header: GridHeader =
            serde_json::from_slice(&header).map_err(|e| format(e.to_string()))?;

        let cells = header.bands * header.height * header.width;
        let mut bytes = vec![0u8; cells * 4];
        reader.read_exact(&mut bytes).map_err(io)?;
        let data = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        let mut raster = Raster::new(header.bands, header.height, header.width, data, header.profile)?;
        raster.mask_nodata();
        Ok(raster)
    }

    fn write(&self, raster: &Raster, path: &Path) -> Result<(), CodecError> {
        let io = |source| CodecError::Io {
            path: path.to_path_buf(),
            source,
        };

        let header = serde_json::to_vec(&GridHeader {
            bands: raster.bands,
            height: raster.height,
            width: raster.width,
            profile: raster.profile.clone(),
        })
        .map_err(|e| CodecError::Format {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut writer = BufWriter::new(File::create(path).map_err(io)?);
        writer.write_all(MAGIC).map_err(io)?;
        writer.write_all(&VERSION.to_le_bytes()).map_err(io)?;
        writer
            .write_all(&(header.len() as u64).to_le_bytes())
            .map_err(io)?;
        writer.write_all(&header).map_err(io)?;
        for value in &raster.data {
            writer.write_all(&value.to_le_bytes()).map_err(io)?;
        }
        writer.flush().map_err(io)?;
        Ok(())
    }
}
