//! Minimal EXIF reader for JPEG and TIFF files.
//!
//! Extracts the handful of tags the journal needs:
//! - DateTimeOriginal (Exif IFD `0x9003`): capture time, `YYYY:MM:DD HH:MM:SS`
//! - OffsetTimeOriginal (Exif IFD `0x9011`): UTC offset of the above, if the camera wrote one
//! - GPSLatitude/GPSLongitude (GPS IFD `0x0002`/`0x0004`) with their N/S/E/W refs
//!
//! For JPEG: reads the TIFF structure embedded in the APP1 `Exif\0\0` segment.
//! For TIFF: the file itself is the TIFF structure.
//!
//! All reads are bounds-checked; a truncated or hostile file yields whatever
//! was readable before the damage, never a panic.

use std::path::Path;

const TAG_EXIF_IFD: u16 = 0x8769;
const TAG_GPS_IFD: u16 = 0x8825;
const TAG_DATE_TIME_ORIGINAL: u16 = 0x9003;
const TAG_OFFSET_TIME_ORIGINAL: u16 = 0x9011;
const TAG_GPS_LATITUDE_REF: u16 = 0x0001;
const TAG_GPS_LATITUDE: u16 = 0x0002;
const TAG_GPS_LONGITUDE_REF: u16 = 0x0003;
const TAG_GPS_LONGITUDE: u16 = 0x0004;

const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Raw EXIF values, still as the camera wrote them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifData {
    pub date_time_original: Option<String>,
    pub offset_time_original: Option<String>,
    /// Signed decimal degrees (south is negative).
    pub gps_latitude: Option<f64>,
    /// Signed decimal degrees (west is negative).
    pub gps_longitude: Option<f64>,
}

/// Read EXIF from a file, dispatching by extension.
/// Returns default (empty) data on any read or parse failure.
pub fn read_exif(path: &Path) -> ExifData {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(_) => return ExifData::default(),
    };

    match ext.as_str() {
        "jpg" | "jpeg" => find_jpeg_exif(&bytes)
            .map(parse_tiff)
            .unwrap_or_default(),
        "tif" | "tiff" => parse_tiff(&bytes),
        _ => ExifData::default(),
    }
}

// ---------------------------------------------------------------------------
// JPEG: locate the APP1 Exif segment
// ---------------------------------------------------------------------------

/// Find the TIFF bytes inside a JPEG's APP1 `Exif` segment.
fn find_jpeg_exif(data: &[u8]) -> Option<&[u8]> {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        // Fill bytes before a marker
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        // SOS (image data) or EOI: no more metadata segments
        if marker == 0xDA || marker == 0xD9 {
            return None;
        }
        // Markers without a length field
        if (0xD0..=0xD7).contains(&marker) || marker == 0x01 {
            pos += 2;
            continue;
        }
        let seg_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let seg_end = pos + 2 + seg_len;
        if seg_len < 2 || seg_end > data.len() {
            return None;
        }
        let segment = &data[pos + 4..seg_end];
        if marker == 0xE1 && segment.starts_with(EXIF_HEADER) {
            return Some(&segment[EXIF_HEADER.len()..]);
        }
        pos = seg_end;
    }
    None
}

// ---------------------------------------------------------------------------
// TIFF IFD walking
// ---------------------------------------------------------------------------

struct Tiff<'a> {
    data: &'a [u8],
    big_endian: bool,
}

#[derive(Debug, Clone, Copy)]
struct IfdEntry {
    tag: u16,
    typ: u16,
    count: usize,
    /// Position of the 4-byte value/offset field.
    value_pos: usize,
}

impl<'a> Tiff<'a> {
    fn new(data: &'a [u8]) -> Option<Self> {
        let big_endian = match data.get(0..2)? {
            b"MM" => true,
            b"II" => false,
            _ => return None,
        };
        let tiff = Self { data, big_endian };
        // TIFF magic (42)
        (tiff.u16_at(2)? == 42).then_some(tiff)
    }

    fn u16_at(&self, offset: usize) -> Option<u16> {
        let b = self.data.get(offset..offset + 2)?;
        Some(if self.big_endian {
            u16::from_be_bytes([b[0], b[1]])
        } else {
            u16::from_le_bytes([b[0], b[1]])
        })
    }

    fn u32_at(&self, offset: usize) -> Option<u32> {
        let b = self.data.get(offset..offset + 4)?;
        Some(if self.big_endian {
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        } else {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        })
    }

    fn first_ifd(&self) -> Option<usize> {
        self.u32_at(4).map(|o| o as usize)
    }

    fn entries(&self, ifd_offset: usize) -> Vec<IfdEntry> {
        let Some(count) = self.u16_at(ifd_offset) else {
            return Vec::new();
        };
        (0..count as usize)
            .map_while(|i| {
                let at = ifd_offset + 2 + i * 12;
                Some(IfdEntry {
                    tag: self.u16_at(at)?,
                    typ: self.u16_at(at + 2)?,
                    count: self.u32_at(at + 4)? as usize,
                    value_pos: at + 8,
                })
            })
            .collect()
    }

    /// Raw value bytes: inline when they fit in 4 bytes, else at the offset.
    fn value_bytes(&self, entry: &IfdEntry) -> Option<&'a [u8]> {
        let byte_len = entry.count.checked_mul(type_size(entry.typ))?;
        let start = if byte_len <= 4 {
            entry.value_pos
        } else {
            self.u32_at(entry.value_pos)? as usize
        };
        self.data.get(start..start.checked_add(byte_len)?)
    }

    fn ascii(&self, entry: &IfdEntry) -> Option<String> {
        let bytes = self.value_bytes(entry)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        let s = String::from_utf8_lossy(&bytes[..end]).trim().to_string();
        (!s.is_empty()).then_some(s)
    }

    fn offset(&self, entry: &IfdEntry) -> Option<usize> {
        match entry.typ {
            3 => self.u16_at(entry.value_pos).map(|v| v as usize),
            _ => self.u32_at(entry.value_pos).map(|v| v as usize),
        }
    }

    fn rationals(&self, entry: &IfdEntry) -> Option<Vec<f64>> {
        if entry.typ != 5 {
            return None;
        }
        let start = self.u32_at(entry.value_pos)? as usize;
        (0..entry.count)
            .map(|i| {
                let num = self.u32_at(start + i * 8)?;
                let den = self.u32_at(start + i * 8 + 4)?;
                (den != 0).then(|| num as f64 / den as f64)
            })
            .collect()
    }
}

/// TIFF type sizes: count is number of values, not bytes.
fn type_size(typ: u16) -> usize {
    match typ {
        1 | 2 | 6 | 7 => 1, // BYTE, ASCII, SBYTE, UNDEFINED
        3 | 8 => 2,         // SHORT, SSHORT
        4 | 9 | 11 => 4,    // LONG, SLONG, FLOAT
        5 | 10 | 12 => 8,   // RATIONAL, SRATIONAL, DOUBLE
        _ => 1,
    }
}

/// Degrees/minutes/seconds rationals plus a hemisphere ref to signed degrees.
fn to_signed_degrees(dms: &[f64], hemisphere: Option<&str>) -> Option<f64> {
    let degrees = dms.first()? + dms.get(1).unwrap_or(&0.0) / 60.0 + dms.get(2).unwrap_or(&0.0) / 3600.0;
    match hemisphere {
        Some("S") | Some("W") => Some(-degrees),
        _ => Some(degrees),
    }
}

fn parse_tiff(data: &[u8]) -> ExifData {
    let mut result = ExifData::default();
    let Some(tiff) = Tiff::new(data) else {
        return result;
    };
    let Some(ifd0) = tiff.first_ifd() else {
        return result;
    };

    let mut exif_ifd = None;
    let mut gps_ifd = None;
    for entry in tiff.entries(ifd0) {
        match entry.tag {
            TAG_EXIF_IFD => exif_ifd = tiff.offset(&entry),
            TAG_GPS_IFD => gps_ifd = tiff.offset(&entry),
            _ => {}
        }
    }

    if let Some(offset) = exif_ifd {
        for entry in tiff.entries(offset) {
            match entry.tag {
                TAG_DATE_TIME_ORIGINAL => result.date_time_original = tiff.ascii(&entry),
                TAG_OFFSET_TIME_ORIGINAL => result.offset_time_original = tiff.ascii(&entry),
                _ => {}
            }
        }
    }

    if let Some(offset) = gps_ifd {
        let (mut lat, mut lat_ref, mut lon, mut lon_ref) = (None, None, None, None);
        for entry in tiff.entries(offset) {
            match entry.tag {
                TAG_GPS_LATITUDE_REF => lat_ref = tiff.ascii(&entry),
                TAG_GPS_LATITUDE => lat = tiff.rationals(&entry),
                TAG_GPS_LONGITUDE_REF => lon_ref = tiff.ascii(&entry),
                TAG_GPS_LONGITUDE => lon = tiff.rationals(&entry),
                _ => {}
            }
        }
        // A position needs both coordinates
        if let (Some(lat), Some(lon)) = (lat, lon) {
            result.gps_latitude = to_signed_degrees(&lat, lat_ref.as_deref());
            result.gps_longitude = to_signed_degrees(&lon, lon_ref.as_deref());
        }
    }

    result
}
