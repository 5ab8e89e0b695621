//! Fixed-width text table of links.

use glam::DVec2;

pub const DEFAULT_SEPARATOR: &str = ",\t";

const NUMBER_WIDTH: usize = 20;
const DECIMALS: usize = 6;
const MIN_NAME_WIDTH: usize = 10;
const CAPTION_WIDTH: usize = NUMBER_WIDTH + 1;

/// Maps a point of the old map into the new map.
pub trait Transformation {
    fn transform(&self, point: DVec2) -> DVec2;
}

impl<F> Transformation for F
where
    F: Fn(DVec2) -> DVec2,
{
    fn transform(&self, point: DVec2) -> DVec2 {
        self(point)
    }
}

/// Converts new-map points in place into another coordinate frame.
pub trait Projector {
    fn project(&self, points: &mut [DVec2]);
}

impl<F> Projector for F
where
    F: Fn(&mut [DVec2]),
{
    fn project(&self, points: &mut [DVec2]) {
        self(points)
    }
}

/// Georeference of the old map image: map coordinates of its top-left
/// corner and the size of one pixel in map units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelReference {
    pub origin: DVec2,
    pub pixel_size: DVec2,
}

impl PixelReference {
    /// Image column/row of a map coordinate. Rows grow downwards.
    pub fn to_pixels(&self, point: DVec2) -> DVec2 {
        DVec2::new(
            (point.x - self.origin.x) / self.pixel_size.x,
            (self.origin.y - point.y) / self.pixel_size.y,
        )
    }
}

#[derive(Clone, Copy, Default)]
pub struct ReportOptions<'a> {
    /// Defaults to [`DEFAULT_SEPARATOR`].
    pub separator: Option<&'a str>,
    pub with_header: bool,
    /// Report old-map coordinates in pixels instead of map units.
    pub pixel_reference: Option<PixelReference>,
    /// Adds displacement length and azimuth columns.
    pub transform: Option<&'a dyn Transformation>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReportRow<'a> {
    pub name: &'a str,
    pub old: DVec2,
    pub new: DVec2,
}

/// Right-aligned, six decimals, always `.` as decimal separator.
pub fn format_number(value: f64) -> String {
    format!("{value:>width$.prec$}", width = NUMBER_WIDTH, prec = DECIMALS)
}

/// Length and azimuth (degrees clockwise from north, in `[0, 360)`) of the
/// vector from `target` to `transformed`.
pub fn displacement(transformed: DVec2, target: DVec2) -> (f64, f64) {
    let d = transformed - target;
    let length = d.x.hypot(d.y);
    let mut azimuth = -d.y.atan2(d.x).to_degrees() + 90.0;
    if azimuth < 0.0 {
        azimuth += 360.0;
    }
    if azimuth >= 360.0 {
        azimuth -= 360.0;
    }
    (length, azimuth)
}

pub fn format_report(rows: &[ReportRow<'_>], options: &ReportOptions<'_>) -> String {
    let separator = options.separator.unwrap_or(DEFAULT_SEPARATOR);
    let name_width = rows
        .iter()
        .map(|row| row.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(MIN_NAME_WIDTH);

    let mut out = String::with_capacity(128 * (rows.len() + 1));

    if options.with_header {
        out.push_str(&format!("{:<name_width$}\t", "Link Name"));
        let unit = if options.pixel_reference.is_some() {
            "[px]"
        } else {
            "[m]"
        };
        let mut captions = vec![
            format!("X Old Map {unit}"),
            format!("Y Old Map {unit}"),
            "X New Map".to_string(),
            "Y New Map".to_string(),
        ];
        if options.transform.is_some() {
            captions.push("Vector Length".to_string());
            captions.push("Vector Azimuth".to_string());
        }
        let last = captions.len() - 1;
        for (idx, caption) in captions.iter().enumerate() {
            out.push_str(&format!("{caption:<CAPTION_WIDTH$}"));
            // the azimuth caption closes the line without a tab
            if idx != last || options.transform.is_none() {
                out.push('\t');
            }
        }
        out.push('\n');
    }

    for row in rows {
        out.push_str(&format!("{:<name_width$}", row.name));
        out.push_str(separator);

        let old = match &options.pixel_reference {
            Some(reference) => reference.to_pixels(row.old),
            None => row.old,
        };
        let mut columns = vec![old.x, old.y, row.new.x, row.new.y];
        if let Some(transform) = options.transform {
            let (length, azimuth) = displacement(transform.transform(row.old), row.new);
            columns.push(length);
            columns.push(azimuth);
        }

        for value in columns {
            out.push_str(&format_number(value));
            out.push_str(separator);
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<ReportRow<'static>> {
        vec![
            ReportRow {
                name: "A",
                old: DVec2::new(100.0, 50.0),
                new: DVec2::new(1.5, -2.25),
            },
            ReportRow {
                name: "tower_north_1",
                old: DVec2::new(110.0, 40.0),
                new: DVec2::new(3.0, 4.0),
            },
        ]
    }

    #[test]
    fn numbers_are_fixed_width_with_dot() {
        assert_eq!(format_number(1.5), "            1.500000");
        assert_eq!(format_number(-1234.0000004), "        -1234.000000");
        assert_eq!(format_number(0.1234565).len(), 20);
    }

    #[test]
    fn names_are_padded_to_the_longest() {
        let report = format_report(&rows(), &ReportOptions::default());
        let lines: Vec<&str> = report.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("A            ,\t"));
        assert!(lines[1].starts_with("tower_north_1,\t"));
        assert!(lines[0].ends_with(",\t"));
        assert_eq!(
            lines[0],
            format!(
                "A            ,\t{},\t{},\t{},\t{},\t",
                format_number(100.0),
                format_number(50.0),
                format_number(1.5),
                format_number(-2.25)
            )
        );
    }

    #[test]
    fn short_names_use_minimum_width() {
        let row = [ReportRow {
            name: "p",
            old: DVec2::ZERO,
            new: DVec2::ZERO,
        }];
        let report = format_report(
            &row,
            &ReportOptions {
                separator: Some(";"),
                ..ReportOptions::default()
            },
        );
        assert!(report.starts_with("p         ;"));
    }

    #[test]
    fn header_captions() {
        let transform = |p: DVec2| p;
        let plain = format_report(
            &rows(),
            &ReportOptions {
                with_header: true,
                ..ReportOptions::default()
            },
        );
        assert_eq!(
            plain.lines().next().unwrap(),
            "Link Name    \tX Old Map [m]        \tY Old Map [m]        \t\
             X New Map            \tY New Map            \t"
        );

        let full = format_report(
            &rows(),
            &ReportOptions {
                with_header: true,
                pixel_reference: Some(PixelReference {
                    origin: DVec2::ZERO,
                    pixel_size: DVec2::ONE,
                }),
                transform: Some(&transform),
                ..ReportOptions::default()
            },
        );
        assert_eq!(
            full.lines().next().unwrap(),
            "Link Name    \tX Old Map [px]       \tY Old Map [px]       \t\
             X New Map            \tY New Map            \t\
             Vector Length        \tVector Azimuth       "
        );
    }

    #[test]
    fn pixel_reference_inverts_rows() {
        let reference = PixelReference {
            origin: DVec2::new(100.0, 60.0),
            pixel_size: DVec2::new(2.0, 0.5),
        };
        assert_eq!(reference.to_pixels(DVec2::new(110.0, 40.0)), DVec2::new(5.0, 40.0));

        let report = format_report(
            &rows()[1..],
            &ReportOptions {
                pixel_reference: Some(reference),
                ..ReportOptions::default()
            },
        );
        assert!(report.contains(&format!(
            ",\t{},\t{},\t",
            format_number(5.0),
            format_number(40.0)
        )));
    }

    #[test]
    fn azimuth_is_clockwise_from_north() {
        let cases = [
            (DVec2::new(0.0, 1.0), 0.0),
            (DVec2::new(1.0, 0.0), 90.0),
            (DVec2::new(0.0, -1.0), 180.0),
            (DVec2::new(-1.0, 0.0), 270.0),
            (DVec2::new(-1.0, 1.0), 315.0),
        ];
        for (delta, expected) in cases {
            let origin = DVec2::new(10.0, 10.0);
            let (length, azimuth) = displacement(origin + delta, origin);
            assert!((azimuth - expected).abs() < 1e-9, "{delta:?}: {azimuth}");
            assert!((length - delta.length()).abs() < 1e-12);
            assert!((0.0..360.0).contains(&azimuth));
        }
    }

    #[test]
    fn transform_adds_length_and_azimuth() {
        let shift_east = |p: DVec2| p + DVec2::new(3.0, 4.0);
        let row = [ReportRow {
            name: "t",
            old: DVec2::ZERO,
            new: DVec2::ZERO,
        }];
        let report = format_report(
            &row,
            &ReportOptions {
                transform: Some(&shift_east),
                ..ReportOptions::default()
            },
        );
        let (_, azimuth) = displacement(DVec2::new(3.0, 4.0), DVec2::ZERO);
        assert!(report.ends_with(&format!(
            "{},\t{},\t\n",
            format_number(5.0),
            format_number(azimuth)
        )));
    }
}
