//! Binary format for links and unlinked points.
//!
//! ```text
//! LinkCount: i32, then per link: name, old PointRecord, new PointRecord
//! UnlinkedOldCount: i32, then PointRecords
//! UnlinkedNewCount: i32, then PointRecords
//! PointRecord: name, x: f64, y: f64, selected: u8
//! name: u16 byte length + UTF-8
//! ```
//! All numbers are big-endian. The whole stream may be gzip-compressed;
//! [`decode`] detects compression from the gzip magic bytes.
//!
//! Names are standard UTF-8, not the modified UTF-8 of Java's `writeUTF`.
//! The two agree except for NUL, written here as a single `00` byte rather
//! than `C0 80`, and characters outside the BMP, written as one four-byte
//! sequence rather than an encoded surrogate pair. Names using either
//! modified form fail to decode with [`Error::MalformedStream`].

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::point::Point;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compression {
    None,
    #[default]
    Gzip,
}

pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

const POINT_RECORD_MIN_LEN: usize = 2 + 8 + 8 + 1;
const LINK_RECORD_MIN_LEN: usize = 2 + 2 * POINT_RECORD_MIN_LEN;

#[derive(Clone, Debug, PartialEq)]
pub struct PointRecord {
    /// Empty for unnamed points.
    pub name: String,
    pub position: DVec2,
    pub selected: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LinkRecord {
    /// Empty if the writer had no name; readers generate one.
    pub name: String,
    pub old: PointRecord,
    pub new: PointRecord,
}

/// Everything one stream carries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkSnapshot {
    pub links: Vec<LinkRecord>,
    pub unlinked_old: Vec<PointRecord>,
    pub unlinked_new: Vec<PointRecord>,
}

impl LinkSnapshot {
    pub fn record_count(&self) -> usize {
        self.links.len() + self.unlinked_old.len() + self.unlinked_new.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }
}

impl PointRecord {
    pub fn into_point(self) -> Point {
        Point::new(self.name, self.position).with_selected(self.selected)
    }
}

impl From<&Point> for PointRecord {
    fn from(point: &Point) -> Self {
        PointRecord {
            name: point.name.clone(),
            position: point.position,
            selected: point.selected,
        }
    }
}

pub fn encode(snapshot: &LinkSnapshot, compression: Compression) -> Result<Vec<u8>> {
    let mut raw = Vec::with_capacity(
        12 + snapshot.links.len() * LINK_RECORD_MIN_LEN
            + (snapshot.unlinked_old.len() + snapshot.unlinked_new.len()) * POINT_RECORD_MIN_LEN,
    );
    write_snapshot(&mut raw, snapshot)?;

    match compression {
        Compression::None => Ok(raw),
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&raw)?;
            Ok(encoder.finish()?)
        }
    }
}

pub fn decode(bytes: &[u8]) -> Result<LinkSnapshot> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut raw = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut raw)
            .map_err(|err| Error::MalformedStream(format!("gzip: {err}")))?;
        read_snapshot(&raw)
    } else {
        read_snapshot(bytes)
    }
}

fn write_snapshot<W: Write>(writer: &mut W, snapshot: &LinkSnapshot) -> Result<()> {
    write_count(writer, snapshot.links.len())?;
    for link in snapshot.links.iter() {
        write_name(writer, &link.name)?;
        write_point(writer, &link.old)?;
        write_point(writer, &link.new)?;
    }

    for points in [&snapshot.unlinked_old, &snapshot.unlinked_new] {
        write_count(writer, points.len())?;
        for point in points.iter() {
            write_point(writer, point)?;
        }
    }

    Ok(())
}

fn write_count<W: Write>(writer: &mut W, count: usize) -> Result<()> {
    let count = i32::try_from(count)
        .map_err(|_| Error::MalformedStream(format!("{count} records exceed the i32 range")))?;
    writer.write_all(&count.to_be_bytes())?;
    Ok(())
}

fn write_name<W: Write>(writer: &mut W, name: &str) -> Result<()> {
    let len = u16::try_from(name.len()).map_err(|_| Error::StringTooLong(name.len()))?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(name.as_bytes())?;
    Ok(())
}

fn write_point<W: Write>(writer: &mut W, point: &PointRecord) -> Result<()> {
    write_name(writer, &point.name)?;
    writer.write_all(&point.position.x.to_be_bytes())?;
    writer.write_all(&point.position.y.to_be_bytes())?;
    writer.write_all(&[u8::from(point.selected)])?;
    Ok(())
}

fn read_snapshot(bytes: &[u8]) -> Result<LinkSnapshot> {
    let mut reader = StreamReader { bytes, pos: 0 };

    let link_count = reader.read_count(LINK_RECORD_MIN_LEN)?;
    let mut links = Vec::with_capacity(link_count);
    for _ in 0..link_count {
        let name = reader.read_name()?;
        let old = reader.read_point()?;
        let new = reader.read_point()?;
        links.push(LinkRecord { name, old, new });
    }

    let unlinked_old = reader.read_points()?;
    let unlinked_new = reader.read_points()?;

    if reader.remaining() != 0 {
        return Err(Error::MalformedStream(format!(
            "{} unexpected trailing bytes",
            reader.remaining()
        )));
    }

    Ok(LinkSnapshot {
        links,
        unlinked_old,
        unlinked_new,
    })
}

struct StreamReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> StreamReader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Error::MalformedStream(format!(
                "unexpected end of stream at byte {}, {len} more bytes expected",
                self.pos
            )));
        }
        let bytes = self.bytes;
        let slice = &bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    /// Reads a record count and rejects counts the remaining bytes cannot hold.
    fn read_count(&mut self, min_record_len: usize) -> Result<usize> {
        let count = i32::from_be_bytes(self.take_array()?);
        let count = usize::try_from(count)
            .map_err(|_| Error::MalformedStream(format!("negative record count {count}")))?;
        if count.saturating_mul(min_record_len) > self.remaining() {
            return Err(Error::MalformedStream(format!(
                "record count {count} exceeds the stream length"
            )));
        }
        Ok(count)
    }

    fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(self.take_array()?))
    }

    fn read_name(&mut self) -> Result<String> {
        let len = u16::from_be_bytes(self.take_array()?) as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|err| Error::MalformedStream(format!("invalid UTF-8 in name: {err}")))
    }

    fn read_point(&mut self) -> Result<PointRecord> {
        let name = self.read_name()?;
        let x = self.read_f64()?;
        let y = self.read_f64()?;
        let [selected] = self.take_array::<1>()?;
        Ok(PointRecord {
            name,
            position: DVec2::new(x, y),
            selected: selected != 0,
        })
    }

    fn read_points(&mut self) -> Result<Vec<PointRecord>> {
        let count = self.read_count(POINT_RECORD_MIN_LEN)?;
        (0..count).map(|_| self.read_point()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, x: f64, y: f64, selected: bool) -> PointRecord {
        PointRecord {
            name: name.to_string(),
            position: DVec2::new(x, y),
            selected,
        }
    }

    fn sample() -> LinkSnapshot {
        LinkSnapshot {
            links: vec![
                LinkRecord {
                    name: "church".to_string(),
                    old: record("church", 120.5, -33.25, true),
                    new: record("", 2_600_000.123456789, 1_200_000.5, false),
                },
                LinkRecord {
                    name: "Brücke".to_string(),
                    old: record("b", 0.1 + 0.2, 1e-300, false),
                    new: record("b", -0.0, f64::MAX, false),
                },
            ],
            unlinked_old: vec![record("lonely", 7.0, 8.0, false)],
            unlinked_new: vec![],
        }
    }

    #[test]
    fn layout_is_big_endian_with_u16_names() -> anyhow::Result<()> {
        let snapshot = LinkSnapshot {
            links: vec![],
            unlinked_old: vec![record("A", 1.0, -2.0, true)],
            unlinked_new: vec![],
        };
        let bytes = encode(&snapshot, Compression::None)?;

        let mut expected = Vec::new();
        expected.extend_from_slice(&0i32.to_be_bytes());
        expected.extend_from_slice(&1i32.to_be_bytes());
        expected.extend_from_slice(&[0, 1, b'A']);
        expected.extend_from_slice(&1.0f64.to_be_bytes());
        expected.extend_from_slice(&(-2.0f64).to_be_bytes());
        expected.push(1);
        expected.extend_from_slice(&0i32.to_be_bytes());
        assert_eq!(bytes, expected);

        assert_eq!(decode(&bytes)?, snapshot);
        Ok(())
    }

    #[test]
    fn decode_detects_gzip() -> anyhow::Result<()> {
        let snapshot = sample();

        let plain = encode(&snapshot, Compression::None)?;
        let zipped = encode(&snapshot, Compression::Gzip)?;
        assert!(zipped.starts_with(&GZIP_MAGIC));
        assert!(!plain.starts_with(&GZIP_MAGIC));

        let from_plain = decode(&plain)?;
        let from_zipped = decode(&zipped)?;
        assert_eq!(from_plain, snapshot);
        assert_eq!(from_zipped, snapshot);
        assert_eq!(
            from_zipped.links[0].new.position.x.to_bits(),
            2_600_000.123456789f64.to_bits()
        );
        assert_eq!(from_zipped.record_count(), 3);
        Ok(())
    }

    #[test]
    fn truncated_streams_are_malformed() -> anyhow::Result<()> {
        let bytes = encode(&sample(), Compression::None)?;
        for len in [0, 3, 4, 10, bytes.len() - 1] {
            let result = decode(&bytes[..len]);
            assert!(
                matches!(result, Err(Error::MalformedStream(_))),
                "length {len} decoded as {result:?}"
            );
        }

        let zipped = encode(&sample(), Compression::Gzip)?;
        assert!(matches!(
            decode(&zipped[..zipped.len() / 2]),
            Err(Error::MalformedStream(_))
        ));
        Ok(())
    }

    #[test]
    fn corrupt_counts_and_trailing_bytes_are_malformed() -> anyhow::Result<()> {
        let mut negative = Vec::new();
        negative.extend_from_slice(&(-1i32).to_be_bytes());
        assert!(matches!(decode(&negative), Err(Error::MalformedStream(_))));

        let mut huge = Vec::new();
        huge.extend_from_slice(&i32::MAX.to_be_bytes());
        huge.extend_from_slice(&[0u8; 64]);
        assert!(matches!(decode(&huge), Err(Error::MalformedStream(_))));

        let mut trailing = encode(&LinkSnapshot::default(), Compression::None)?;
        trailing.push(0);
        assert!(matches!(decode(&trailing), Err(Error::MalformedStream(_))));

        let mut bad_utf8 = Vec::new();
        bad_utf8.extend_from_slice(&0i32.to_be_bytes());
        bad_utf8.extend_from_slice(&1i32.to_be_bytes());
        bad_utf8.extend_from_slice(&[0, 2, 0xc3, 0x28]);
        bad_utf8.extend_from_slice(&[0u8; 17]);
        bad_utf8.extend_from_slice(&0i32.to_be_bytes());
        assert!(matches!(decode(&bad_utf8), Err(Error::MalformedStream(_))));
        Ok(())
    }

    #[test]
    fn names_longer_than_u16_are_rejected() {
        let snapshot = LinkSnapshot {
            unlinked_new: vec![record(&"x".repeat(70_000), 0.0, 0.0, false)],
            ..LinkSnapshot::default()
        };
        assert!(matches!(
            encode(&snapshot, Compression::None),
            Err(Error::StringTooLong(70_000))
        ));
    }

    #[test]
    fn names_are_standard_utf8() -> anyhow::Result<()> {
        let snapshot = LinkSnapshot {
            unlinked_old: vec![record("a\0\u{1F5FA}", 0.0, 0.0, false)],
            ..LinkSnapshot::default()
        };
        let bytes = encode(&snapshot, Compression::None)?;
        assert_eq!(&bytes[8..10], &6u16.to_be_bytes());
        assert_eq!(&bytes[10..16], "a\0\u{1F5FA}".as_bytes());
        assert_eq!(decode(&bytes)?, snapshot);

        // modified UTF-8 NUL
        let mut modified = Vec::new();
        modified.extend_from_slice(&0i32.to_be_bytes());
        modified.extend_from_slice(&1i32.to_be_bytes());
        modified.extend_from_slice(&[0, 2, 0xc0, 0x80]);
        modified.extend_from_slice(&[0u8; 17]);
        modified.extend_from_slice(&0i32.to_be_bytes());
        assert!(matches!(decode(&modified), Err(Error::MalformedStream(_))));
        Ok(())
    }

    #[test]
    fn nonzero_selection_byte_reads_as_selected() -> anyhow::Result<()> {
        let snapshot = LinkSnapshot {
            unlinked_new: vec![record("n", 1.0, 1.0, true)],
            ..LinkSnapshot::default()
        };
        let mut bytes = encode(&snapshot, Compression::None)?;
        let flag = bytes.len() - 1;
        bytes[flag] = 7;
        assert!(decode(&bytes)?.unlinked_new[0].selected);
        Ok(())
    }
}
