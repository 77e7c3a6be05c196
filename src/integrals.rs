//! # Bruker 2D Integral File Parser
//!
//! Interactive integration in the host software writes an `int2d` text file
//! into the processed-data directory. After a header ending in a column
//! line that names `SI_F1`, each region occupies a pair of rows, the first
//! describing the F1 extent and the integral value, the second the F2
//! extent:
//!
//! ```text
//! # integral  SI_F1  row1  row2  row1_ppm  row2_ppm  abs_intensity  integral  mode
//!   1  1024  100  120  77.40  76.90  1.23e+07  1.000  V
//!      1024  200  220   7.40   7.10
//! ```
//!
//! Integration is how multiplicity-edited experiments recover the peak
//! sign, so the integral value's sign is preserved exactly. Malformed row
//! pairs are skipped and counted like malformed peak rows.

use serde::Serialize;

/// Errors that can occur while parsing an integral resource
#[derive(Debug, thiserror::Error)]
pub enum IntegralError {
    /// The header/data boundary could not be located
    #[error("Could not find data section in integral file")]
    MissingDataSection,

    /// I/O error reading the resource
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// One integrated region.
///
/// The F2 extent is absent for 1D-style regions; Bruker `int2d` files
/// always carry both dimensions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrationRegion {
    /// F1 range start, ppm (as written, may exceed `f1_end_ppm`)
    pub f1_start_ppm: f64,
    /// F1 range end, ppm
    pub f1_end_ppm: f64,
    /// F2 range start, ppm
    pub f2_start_ppm: Option<f64>,
    /// F2 range end, ppm
    pub f2_end_ppm: Option<f64>,
    /// F1 center shift, ppm
    pub f1_ppm: f64,
    /// F2 center shift, ppm
    pub f2_ppm: Option<f64>,
    /// Signed integral value; the sign encodes multiplicity for edited experiments
    pub integral: f64,
    /// Absolute intensity reported by the integrator
    pub abs_intensity: Option<f64>,
}

impl IntegrationRegion {
    /// Whether a 2D coordinate falls inside this region's ranges.
    pub fn contains(&self, f1_ppm: f64, f2_ppm: f64) -> bool {
        let (f1_lo, f1_hi) = ordered(self.f1_start_ppm, self.f1_end_ppm);
        let f1_in = f1_ppm >= f1_lo && f1_ppm <= f1_hi;
        let f2_in = match (self.f2_start_ppm, self.f2_end_ppm) {
            (Some(a), Some(b)) => {
                let (lo, hi) = ordered(a, b);
                f2_ppm >= lo && f2_ppm <= hi
            }
            _ => false,
        };
        f1_in && f2_in
    }

    /// Sign of the integral: `-1` for negative regions, `1` otherwise.
    pub fn sign(&self) -> i8 {
        if self.integral < 0.0 {
            -1
        } else {
            1
        }
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// A parsed integral list with its malformed-row count
#[derive(Debug, Clone, Default, Serialize)]
pub struct IntegralList {
    /// Well-formed regions, sorted by descending F2 center
    pub regions: Vec<IntegrationRegion>,
    /// Row pairs that were present but could not be interpreted
    pub skipped_rows: usize,
}

impl IntegralList {
    /// Number of well-formed regions
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether the list has no well-formed regions
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Parse the content of a Bruker `int2d` file.
pub fn parse_int2d(content: &str) -> Result<IntegralList, IntegralError> {
    let lines: Vec<&str> = content.lines().collect();
    let data_start = lines
        .iter()
        .position(|l| l.contains('#') && l.contains("SI_F1"))
        .ok_or(IntegralError::MissingDataSection)?;

    let mut list = IntegralList::default();
    let mut i = data_start + 1;
    while i < lines.len() {
        let line = lines[i].trim();
        if line.is_empty() {
            i += 1;
            continue;
        }

        match parse_f1_row(line) {
            Some(f1) => {
                let f2 = lines.get(i + 1).and_then(|l| parse_f2_row(l.trim()));
                match f2 {
                    Some(f2) => {
                        list.regions.push(IntegrationRegion {
                            f1_start_ppm: f1.start_ppm,
                            f1_end_ppm: f1.end_ppm,
                            f2_start_ppm: Some(f2.start_ppm),
                            f2_end_ppm: Some(f2.end_ppm),
                            f1_ppm: (f1.start_ppm + f1.end_ppm) / 2.0,
                            f2_ppm: Some((f2.start_ppm + f2.end_ppm) / 2.0),
                            integral: f1.integral,
                            abs_intensity: Some(f1.abs_intensity),
                        });
                        i += 2;
                        continue;
                    }
                    None => {
                        // F1 row without its F2 partner
                        list.skipped_rows += 1;
                    }
                }
            }
            None => {
                list.skipped_rows += 1;
            }
        }
        i += 1;
    }

    list.regions.sort_by(|a, b| {
        b.f2_ppm
            .unwrap_or(f64::NEG_INFINITY)
            .total_cmp(&a.f2_ppm.unwrap_or(f64::NEG_INFINITY))
    });

    Ok(list)
}

struct F1Row {
    start_ppm: f64,
    end_ppm: f64,
    abs_intensity: f64,
    integral: f64,
}

struct F2Row {
    start_ppm: f64,
    end_ppm: f64,
}

/// F1 rows: `num SI row1 row2 row1_ppm row2_ppm abs_intensity integral mode`
fn parse_f1_row(line: &str) -> Option<F1Row> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 9 || parts[0].parse::<u64>().is_err() || parts[1].parse::<u64>().is_err() {
        return None;
    }
    Some(F1Row {
        start_ppm: parts[4].parse().ok()?,
        end_ppm: parts[5].parse().ok()?,
        abs_intensity: parts[6].parse().ok()?,
        integral: parts[7].parse().ok()?,
    })
}

/// F2 rows: `SI col1 col2 col1_ppm col2_ppm`
fn parse_f2_row(line: &str) -> Option<F2Row> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 5
        || parts[0].parse::<u64>().is_err()
        || parts[1].parse::<i64>().is_err()
        || parts[2].parse::<i64>().is_err()
    {
        return None;
    }
    Some(F2Row {
        start_ppm: parts[3].parse().ok()?,
        end_ppm: parts[4].parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const INT2D: &str = "\
SI units\n\
# integral  SI_F1  row1  row2  row1_ppm  row2_ppm  abs_intensity  integral  mode\n\
  1  1024  100  120  77.40  76.90  1.23e+07  1.000  V\n\
     1024  200  220   7.40   7.10\n\
  2  1024  300  320  39.80  39.20  8.00e+06  -0.540  V\n\
     1024  400  420   2.60   2.40\n";

    #[test]
    fn parses_region_pairs() {
        let list = parse_int2d(INT2D).expect("parse");
        assert_eq!(list.len(), 2);
        assert_eq!(list.skipped_rows, 0);

        // sorted by descending F2 center: the 7.25 region comes first
        let first = &list.regions[0];
        assert!((first.f1_ppm - 77.15).abs() < 1e-9);
        assert_eq!(first.f2_ppm, Some(7.25));
        assert_eq!(first.integral, 1.0);
        assert_eq!(first.sign(), 1);

        let second = &list.regions[1];
        assert_eq!(second.integral, -0.54);
        assert_eq!(second.sign(), -1);
    }

    #[test]
    fn region_containment() {
        let list = parse_int2d(INT2D).expect("parse");
        let negative = &list.regions[1];
        assert!(negative.contains(39.5, 2.5));
        assert!(!negative.contains(39.5, 7.2));
        assert!(!negative.contains(120.0, 2.5));
    }

    #[test]
    fn malformed_pair_is_counted() {
        let content = "\
# SI_F1 header\n\
  1  1024  100  120  77.40  76.90  1.23e+07  1.000  V\n\
  not a data row at all\n";
        let list = parse_int2d(content).expect("parse");
        assert_eq!(list.len(), 0);
        // the orphaned F1 row and the garbage row are both counted
        assert_eq!(list.skipped_rows, 2);
    }

    #[test]
    fn missing_header_is_an_error() {
        let err = parse_int2d("no data here\n").expect_err("no header");
        assert!(matches!(err, IntegralError::MissingDataSection));
    }

    #[test]
    fn blank_lines_are_ignored() {
        let content = format!("{}\n\n\n", INT2D);
        let list = parse_int2d(&content).expect("parse");
        assert_eq!(list.len(), 2);
        assert_eq!(list.skipped_rows, 0);
    }
}
