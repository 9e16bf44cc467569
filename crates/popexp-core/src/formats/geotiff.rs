//! Single-band GeoTIFF population rasters read with the `tiff` crate.
//!
//! The file is opened once to read its georeferencing and again for every window
//! read; each handle is dropped before the call returns, on success or error.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tiff::ColorType;

use crate::error::{ExposureError, Result};
use crate::models::Crs;
use crate::ports::PopulationGrid;
use crate::raster::{GeoTransform, PixelWindow, RasterMetadata, RasterWindow};

// GeoKey ids
const GT_RASTER_TYPE_GEOKEY: u32 = 1025;
const GEOGRAPHIC_TYPE_GEOKEY: u32 = 2048;
const PROJECTED_CS_TYPE_GEOKEY: u32 = 3072;
const RASTER_PIXEL_IS_POINT: u32 = 2;
const USER_DEFINED: u32 = 32767;

type TiffDecoder = Decoder<BufReader<File>>;

/// Population raster backed by a GeoTIFF file
#[derive(Debug, Clone)]
pub struct GeoTiffRaster {
    path: PathBuf,
    metadata: RasterMetadata,
}

impl GeoTiffRaster {
    /// Read the georeferencing of `path`. `fallback_crs` is used when the file
    /// declares no EPSG-coded CRS.
    pub fn open(path: impl AsRef<Path>, fallback_crs: &Crs) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut decoder = open_decoder(&path)?;
        let metadata = read_metadata(&mut decoder, &path, fallback_crs)?;

        tracing::info!(
            path = %path.display(),
            width = metadata.width,
            height = metadata.height,
            crs = %metadata.crs,
            nodata = ?metadata.nodata,
            "Opened population raster"
        );

        Ok(Self { path, metadata })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PopulationGrid for GeoTiffRaster {
    fn metadata(&self) -> &RasterMetadata {
        &self.metadata
    }

    fn read_window(&self, window: PixelWindow) -> Result<RasterWindow> {
        let meta = &self.metadata;
        if window.col_off + window.width > meta.width || window.row_off + window.height > meta.height {
            return Err(ExposureError::ConfigInvalid {
                key: "window".to_string(),
                reason: format!("{:?} exceeds the {}x{} raster", window, meta.width, meta.height),
            });
        }

        let mut values = vec![f64::NAN; window.len()];
        if window.is_empty() {
            return Ok(RasterWindow { window, values });
        }

        let mut decoder = open_decoder(&self.path)?;
        let (chunk_width, chunk_height) = decoder.chunk_dimensions();
        let (chunk_width, chunk_height) = (chunk_width as usize, chunk_height as usize);
        let chunks_across = meta.width.div_ceil(chunk_width);

        let first_chunk_row = window.row_off / chunk_height;
        let last_chunk_row = (window.row_off + window.height - 1) / chunk_height;
        let first_chunk_col = window.col_off / chunk_width;
        let last_chunk_col = (window.col_off + window.width - 1) / chunk_width;

        for chunk_row in first_chunk_row..=last_chunk_row {
            for chunk_col in first_chunk_col..=last_chunk_col {
                let index = (chunk_row * chunks_across + chunk_col) as u32;
                let (data_width, data_height) = decoder.chunk_data_dimensions(index);
                let chunk = decoder
                    .read_chunk(index)
                    .map_err(|e| self.decode_error(format!("read_chunk({}): {}", index, e)))?;
                let chunk = samples_as_f64(chunk).ok_or_else(|| self.decode_error("unsupported sample type".into()))?;

                let chunk_x0 = chunk_col * chunk_width;
                let chunk_y0 = chunk_row * chunk_height;
                let col_start = window.col_off.max(chunk_x0);
                let col_end = (window.col_off + window.width).min(chunk_x0 + data_width as usize);
                let row_start = window.row_off.max(chunk_y0);
                let row_end = (window.row_off + window.height).min(chunk_y0 + data_height as usize);

                for row in row_start..row_end {
                    for col in col_start..col_end {
                        let src = (row - chunk_y0) * data_width as usize + (col - chunk_x0);
                        let dst = (row - window.row_off) * window.width + (col - window.col_off);
                        if let Some(value) = chunk.get(src) {
                            values[dst] = *value;
                        }
                    }
                }
            }
        }

        Ok(RasterWindow { window, values })
    }
}

impl GeoTiffRaster {
    fn decode_error(&self, reason: String) -> ExposureError {
        ExposureError::UnsupportedFileFormat { path: self.path.clone(), reason }
    }
}

fn open_decoder(path: &Path) -> Result<TiffDecoder> {
    let file = File::open(path)?;
    Decoder::new(BufReader::new(file)).map_err(|e| ExposureError::UnsupportedFileFormat {
        path: path.to_path_buf(),
        reason: format!("Failed to initialise TIFF decoder: {}", e),
    })
}

fn read_metadata(decoder: &mut TiffDecoder, path: &Path, fallback_crs: &Crs) -> Result<RasterMetadata> {
    let unsupported = |reason: String| ExposureError::UnsupportedFileFormat { path: path.to_path_buf(), reason };

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| unsupported(format!("cannot read dimensions: {}", e)))?;

    match decoder.colortype() {
        Ok(ColorType::Gray(_)) => {}
        Ok(other) => return Err(unsupported(format!("expected a single-band raster, found {:?}", other))),
        Err(e) => return Err(unsupported(format!("cannot read color type: {}", e))),
    }

    let geo_keys = decoder
        .find_tag(Tag::GeoKeyDirectoryTag)
        .ok()
        .flatten()
        .and_then(|v| v.into_u32_vec().ok())
        .map(|keys| parse_geo_keys(&keys))
        .unwrap_or_default();

    let mut transform = read_transform(decoder).map_err(unsupported)?;
    if geo_key(&geo_keys, GT_RASTER_TYPE_GEOKEY) == Some(RASTER_PIXEL_IS_POINT) {
        transform.origin_x -= transform.pixel_width / 2.0;
        transform.origin_y += transform.pixel_height / 2.0;
    }

    let nodata = decoder
        .find_tag(Tag::GdalNodata)
        .ok()
        .flatten()
        .and_then(|v| v.into_string().ok())
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok());

    let crs = [PROJECTED_CS_TYPE_GEOKEY, GEOGRAPHIC_TYPE_GEOKEY]
        .iter()
        .filter_map(|key| geo_key(&geo_keys, *key))
        .find(|code| *code != 0 && *code != USER_DEFINED)
        .map(Crs::epsg)
        .unwrap_or_else(|| {
            tracing::warn!(
                path = %path.display(),
                fallback = %fallback_crs,
                "Raster declares no EPSG CRS, using configured raster CRS"
            );
            fallback_crs.clone()
        });

    Ok(RasterMetadata { width: width as usize, height: height as usize, transform, nodata, crs })
}

/// Geotransform from ModelPixelScale + ModelTiepoint, or a north-up ModelTransformation
fn read_transform(decoder: &mut TiffDecoder) -> std::result::Result<GeoTransform, String> {
    let scale = f64_tag(decoder, Tag::ModelPixelScaleTag);
    let tiepoint = f64_tag(decoder, Tag::ModelTiepointTag);

    if let (Some(scale), Some(tiepoint)) = (scale, tiepoint) {
        if scale.len() < 2 || tiepoint.len() < 6 {
            return Err("malformed ModelPixelScale/ModelTiepoint tags".to_string());
        }
        let (sx, sy) = (scale[0], scale[1]);
        let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
        return Ok(GeoTransform::new(x - i * sx, y + j * sy, sx, sy));
    }

    if let Some(m) = f64_tag(decoder, Tag::ModelTransformationTag) {
        if m.len() < 8 {
            return Err("malformed ModelTransformation tag".to_string());
        }
        if m[1] != 0.0 || m[4] != 0.0 {
            return Err("rotated rasters are not supported".to_string());
        }
        if m[0] <= 0.0 || m[5] >= 0.0 {
            return Err("only north-up rasters are supported".to_string());
        }
        return Ok(GeoTransform::new(m[3], m[7], m[0], -m[5]));
    }

    Err("raster is not georeferenced (no ModelPixelScale/ModelTiepoint or ModelTransformation)".to_string())
}

fn f64_tag(decoder: &mut TiffDecoder, tag: Tag) -> Option<Vec<f64>> {
    decoder.find_tag(tag).ok().flatten().and_then(|v| v.into_f64_vec().ok())
}

/// Inline `(key id, value)` pairs of a GeoKeyDirectory
fn parse_geo_keys(directory: &[u32]) -> Vec<(u32, u32)> {
    let Some(&count) = directory.get(3) else {
        return Vec::new();
    };
    directory[4..]
        .chunks_exact(4)
        .take(count as usize)
        .filter(|entry| entry[1] == 0)
        .map(|entry| (entry[0], entry[3]))
        .collect()
}

fn geo_key(keys: &[(u32, u32)], id: u32) -> Option<u32> {
    keys.iter().find(|(key, _)| *key == id).map(|(_, value)| *value)
}

fn samples_as_f64(result: DecodingResult) -> Option<Vec<f64>> {
    Some(match result {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|s| s as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|s| s as f64).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        #[allow(unreachable_patterns)]
        _ => return None,
    })
}
