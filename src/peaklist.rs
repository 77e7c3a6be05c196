//! # Bruker Peak List Parser
//!
//! Interactive peak picking in the host software writes a `peaklist.xml`
//! file into each processed-data directory:
//!
//! ```text
//! <PeakList modified="...">
//!   <PeakList1D>
//!     <PeakList1DHeader .../>
//!     <Peak1D F1="7.26" intensity="1000.0" annotation="CHCl3" type="0"/>
//!   </PeakList1D>
//! </PeakList>
//! ```
//!
//! 2D experiments use `<Peak2D F1="..." F2="..." .../>` rows instead. Rows
//! that cannot be interpreted (missing or non-numeric shifts) are skipped
//! and counted, never fatal: the skipped-row count is surfaced so a strict
//! caller can flag "many peaks were malformed" without this parser
//! inventing a threshold.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

/// Errors that can occur while parsing a peak list resource
#[derive(Debug, thiserror::Error)]
pub enum PeakListError {
    /// The XML document itself is unreadable
    #[error("XML parsing error: {0}")]
    XmlError(#[from] quick_xml::Error),

    /// An attribute could not be decoded
    #[error("XML attribute error: {0}")]
    AttrError(#[from] quick_xml::events::attributes::AttrError),

    /// I/O error reading the resource
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Number of chemical-shift coordinates a peak row carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimensionality {
    /// One shift coordinate per peak
    OneD,
    /// Two shift coordinates per peak
    TwoD,
}

impl Dimensionality {
    /// XML element name for peak rows of this dimensionality
    fn element(&self) -> &'static [u8] {
        match self {
            Dimensionality::OneD => b"Peak1D",
            Dimensionality::TwoD => b"Peak2D",
        }
    }
}

/// One picked peak.
///
/// Invariant: `f2_ppm` is `Some` exactly when the peak came from a 2D peak
/// list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakEntry {
    /// Chemical shift in the F1 (direct for 1D, indirect for 2D) dimension, ppm
    pub f1_ppm: f64,
    /// Chemical shift in the F2 dimension, ppm; present for 2D peaks only
    pub f2_ppm: Option<f64>,
    /// Peak amplitude, when the picker recorded one
    pub intensity: Option<f64>,
    /// Free-form annotation attached during picking
    pub annotation: Option<String>,
}

/// A parsed peak list with its malformed-row count
#[derive(Debug, Clone, Default, Serialize)]
pub struct PeakList {
    /// Well-formed peaks, sorted by descending shift
    pub peaks: Vec<PeakEntry>,
    /// Rows that were present but could not be interpreted
    pub skipped_rows: usize,
}

impl PeakList {
    /// Number of well-formed peaks
    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    /// Whether the list has no well-formed peaks
    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }
}

/// Parse a `peaklist.xml` document.
///
/// Only rows matching the requested dimensionality are read; a 1D pass over
/// a 2D peak list yields an empty result, not an error. The returned peaks
/// are sorted by descending shift (F1 for 1D, F2 for 2D), matching the
/// vendor's display convention.
pub fn parse_peaklist_xml(xml: &str, dim: Dimensionality) -> Result<PeakList, PeakListError> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(true);

    let mut list = PeakList::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == dim.element() {
                    match read_peak(e, dim)? {
                        Some(peak) => list.peaks.push(peak),
                        None => list.skipped_rows += 1,
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(PeakListError::XmlError(e)),
            _ => {}
        }
        buf.clear();
    }

    match dim {
        Dimensionality::OneD => {
            list.peaks
                .sort_by(|a, b| b.f1_ppm.total_cmp(&a.f1_ppm));
        }
        Dimensionality::TwoD => {
            list.peaks.sort_by(|a, b| {
                b.f2_ppm
                    .unwrap_or(f64::NEG_INFINITY)
                    .total_cmp(&a.f2_ppm.unwrap_or(f64::NEG_INFINITY))
            });
        }
    }

    Ok(list)
}

/// Interpret one peak element. Returns `None` for malformed rows.
fn read_peak(e: &BytesStart<'_>, dim: Dimensionality) -> Result<Option<PeakEntry>, PeakListError> {
    let mut f1: Option<f64> = None;
    let mut f2: Option<f64> = None;
    let mut intensity: Option<f64> = None;
    let mut annotation: Option<String> = None;

    for attr in e.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?;
        match attr.key.as_ref() {
            b"F1" => f1 = value.trim().parse::<f64>().ok(),
            b"F2" => f2 = value.trim().parse::<f64>().ok(),
            b"intensity" => intensity = value.trim().parse::<f64>().ok(),
            b"annotation" => {
                let v = value.trim();
                if !v.is_empty() {
                    annotation = Some(v.to_string());
                }
            }
            _ => {}
        }
    }

    let Some(f1_ppm) = f1 else {
        return Ok(None);
    };
    let f2_ppm = match dim {
        Dimensionality::OneD => None,
        Dimensionality::TwoD => match f2 {
            Some(v) => Some(v),
            // a 2D row without a second coordinate is malformed
            None => return Ok(None),
        },
    };

    Ok(Some(PeakEntry {
        f1_ppm,
        f2_ppm,
        intensity,
        annotation,
    }))
}
