//! Well-Known Binary decoding for GeoParquet geometry columns.

use std::io::{Cursor, Read};

use geo::{Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};

const WKB_POINT: u32 = 1;
const WKB_LINESTRING: u32 = 2;
const WKB_POLYGON: u32 = 3;
const WKB_MULTIPOINT: u32 = 4;
const WKB_MULTILINESTRING: u32 = 5;
const WKB_MULTIPOLYGON: u32 = 6;
const WKB_GEOMETRYCOLLECTION: u32 = 7;

/// WKB byte order: little endian
const WKB_LE: u8 = 1;

// EWKB flag bits
const EWKB_Z: u32 = 0x8000_0000;
const EWKB_M: u32 = 0x4000_0000;
const EWKB_SRID: u32 = 0x2000_0000;

/// Decode a WKB (ISO or EWKB) blob into a 2D geometry; Z and M ordinates are dropped.
pub fn geometry_from_wkb(bytes: &[u8]) -> Result<Geometry<f64>, String> {
    let mut reader = WkbReader { cursor: Cursor::new(bytes), little_endian: true };
    reader.geometry()
}

struct WkbReader<'a> {
    cursor: Cursor<&'a [u8]>,
    little_endian: bool,
}

impl WkbReader<'_> {
    fn geometry(&mut self) -> Result<Geometry<f64>, String> {
        let byte_order = self.read_u8()?;
        self.little_endian = byte_order == WKB_LE;

        let raw_type = self.read_u32()?;
        let (geom_type, dims) = self.split_type(raw_type)?;

        Ok(match geom_type {
            WKB_POINT => Geometry::Point(Point::from(self.coord(dims)?)),
            WKB_LINESTRING => Geometry::LineString(self.line_string(dims)?),
            WKB_POLYGON => Geometry::Polygon(self.polygon(dims)?),
            WKB_MULTIPOINT => {
                let points = self.members(|g| match g {
                    Geometry::Point(p) => Some(p),
                    _ => None,
                })?;
                Geometry::MultiPoint(MultiPoint::new(points))
            }
            WKB_MULTILINESTRING => {
                let lines = self.members(|g| match g {
                    Geometry::LineString(l) => Some(l),
                    _ => None,
                })?;
                Geometry::MultiLineString(MultiLineString::new(lines))
            }
            WKB_MULTIPOLYGON => {
                let polygons = self.members(|g| match g {
                    Geometry::Polygon(p) => Some(p),
                    _ => None,
                })?;
                Geometry::MultiPolygon(MultiPolygon::new(polygons))
            }
            WKB_GEOMETRYCOLLECTION => {
                let members = self.members(Some)?;
                Geometry::GeometryCollection(GeometryCollection::new_from(members))
            }
            other => return Err(format!("unsupported WKB geometry type {}", other)),
        })
    }

    /// Base type and number of ordinates per coordinate
    fn split_type(&mut self, raw_type: u32) -> Result<(u32, usize), String> {
        let mut dims = 2;
        if raw_type & EWKB_Z != 0 {
            dims += 1;
        }
        if raw_type & EWKB_M != 0 {
            dims += 1;
        }
        if raw_type & EWKB_SRID != 0 {
            // SRID is carried by the GeoParquet metadata instead
            self.read_u32()?;
        }

        let code = raw_type & 0x0FFF_FFFF;
        dims += match code / 1000 {
            0 => 0,
            1 | 2 => 1,
            3 => 2,
            _ => return Err(format!("unsupported WKB geometry type {}", code)),
        };
        Ok((code % 1000, dims))
    }

    /// Sub-geometries of a multi geometry, each with its own byte order header
    fn members<T>(&mut self, pick: impl Fn(Geometry<f64>) -> Option<T>) -> Result<Vec<T>, String> {
        let count = self.read_u32()?;
        let mut members = Vec::with_capacity(count.min(1 << 16) as usize);
        for _ in 0..count {
            let member = self.geometry()?;
            members.push(pick(member).ok_or("unexpected member type in WKB multi geometry")?);
        }
        Ok(members)
    }

    fn polygon(&mut self, dims: usize) -> Result<Polygon<f64>, String> {
        let num_rings = self.read_u32()?;
        if num_rings == 0 {
            return Ok(Polygon::new(LineString::new(vec![]), vec![]));
        }
        let exterior = self.line_string(dims)?;
        let interiors = (1..num_rings).map(|_| self.line_string(dims)).collect::<Result<Vec<_>, _>>()?;
        Ok(Polygon::new(exterior, interiors))
    }

    fn line_string(&mut self, dims: usize) -> Result<LineString<f64>, String> {
        let len = self.read_u32()?;
        let coords = (0..len).map(|_| self.coord(dims)).collect::<Result<Vec<_>, _>>()?;
        Ok(LineString::new(coords))
    }

    fn coord(&mut self, dims: usize) -> Result<Coord<f64>, String> {
        let x = self.read_f64()?;
        let y = self.read_f64()?;
        for _ in 2..dims {
            self.read_f64()?;
        }
        Ok(Coord { x, y })
    }

    fn read_u8(&mut self) -> Result<u8, String> {
        let mut buf = [0u8; 1];
        self.cursor.read_exact(&mut buf).map_err(|e| format!("truncated WKB: {}", e))?;
        Ok(buf[0])
    }

    fn read_u32(&mut self) -> Result<u32, String> {
        let mut buf = [0u8; 4];
        self.cursor.read_exact(&mut buf).map_err(|e| format!("truncated WKB: {}", e))?;
        Ok(if self.little_endian { u32::from_le_bytes(buf) } else { u32::from_be_bytes(buf) })
    }

    fn read_f64(&mut self) -> Result<f64, String> {
        let mut buf = [0u8; 8];
        self.cursor.read_exact(&mut buf).map_err(|e| format!("truncated WKB: {}", e))?;
        Ok(if self.little_endian { f64::from_le_bytes(buf) } else { f64::from_be_bytes(buf) })
    }
}

/// Encode a polygon as little-endian WKB
#[cfg(test)]
pub(crate) fn polygon_to_wkb(polygon: &Polygon<f64>) -> Vec<u8> {
    let mut out = vec![WKB_LE];
    out.extend_from_slice(&WKB_POLYGON.to_le_bytes());
    let rings: Vec<&LineString<f64>> = std::iter::once(polygon.exterior()).chain(polygon.interiors()).collect();
    out.extend_from_slice(&(rings.len() as u32).to_le_bytes());
    for ring in rings {
        out.extend_from_slice(&(ring.0.len() as u32).to_le_bytes());
        for c in &ring.0 {
            out.extend_from_slice(&c.x.to_le_bytes());
            out.extend_from_slice(&c.y.to_le_bytes());
        }
    }
    out
}
