//! # Canonical JSON Converter
//!
//! Builds the [`CanonicalDocument`] submitted to the remote
//! structure-assignment service from an [`Inventory`] and a
//! [`UserSelection`]. The converter performs no I/O and no network calls;
//! submission is the caller's concern.
//!
//! Selection-level problems are fatal and synchronous: a role naming a
//! directory without a peak list, or two directories claiming the same
//! singular role, raise [`SelectionError`] before any document is
//! produced, so a GUI can re-prompt the user instead of silently losing
//! data during submission. HMBC is the one mergeable role — repeated HMBC
//! acquisitions combine into a single peak list.
//!
//! ## Document shape
//!
//! ```json
//! {
//!   "molecule": "c1ccccc1",
//!   "HSQC_EDITED": {
//!     "peaks": [{"delta1": 77.2, "delta2": 7.26, "intensity": 1.0, "sign": 1}],
//!     "integrations": [{"rangeMax1": 77.4, "rangeMin1": 76.9, ...}],
//!     "sourceDirectory": "5",
//!     "pulseSequence": "hsqcedetgpsisp2.3",
//!     "nuclei": ["1H", "13C"]
//!   },
//!   "manifest": {
//!     "documentId": "…uuid…",
//!     "createdAt": "…",
//!     "roles": {"HSQC_EDITED": ["5"]}
//!   }
//! }
//! ```
//!
//! Unselected roles are absent keys, never null.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use log::info;
use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classify::ExperimentKind;
use crate::integrals::{IntegralList, IntegrationRegion};
use crate::peaklist::PeakEntry;
use crate::reader::{ExperimentDirectory, Inventory, ProcData};

/// Errors fatal to a conversion call
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    /// The selection names a directory the inventory does not contain
    #[error("unknown experiment directory: {0}")]
    UnknownDirectory(String),

    /// The selection names a processing number the directory does not have
    #[error("experiment {dir} has no processed data {procno}")]
    UnknownProcno {
        /// Directory id
        dir: String,
        /// Requested processing number
        procno: String,
    },

    /// The selected role points at a directory/procno without peaks
    #[error("no peak list for role {role} (experiment {dir}, procno {procno})")]
    NoPeakList {
        /// Canonical label of the selected role
        role: String,
        /// Directory id
        dir: String,
        /// Requested processing number
        procno: String,
    },

    /// Two directories claim a role the schema treats as singular
    #[error("duplicate role assignment: {role} selected for experiments {first} and {second}")]
    DuplicateRole {
        /// Canonical label of the contested role
        role: String,
        /// First claiming directory id
        first: String,
        /// Second claiming directory id
        second: String,
    },
}

/// A declared role for one experiment directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Exclude the directory from the document
    Skip,
    /// Contribute the directory under a canonical label
    Assign(ExperimentKind),
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Role::Skip => serializer.serialize_str("SKIP"),
            Role::Assign(kind) => serializer.serialize_str(kind.label()),
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RoleVisitor;

        impl Visitor<'_> for RoleVisitor {
            type Value = Role;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a canonical experiment-type label or \"SKIP\"")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Role, E> {
                // The GUI emits "Unknown" for experiments the classifier
                // could not label; treat those like explicit skips.
                if v.eq_ignore_ascii_case("skip")
                    || v.eq_ignore_ascii_case("unknown")
                    || v.eq_ignore_ascii_case("unrecognized")
                {
                    return Ok(Role::Skip);
                }
                ExperimentKind::from_label(v)
                    .map(Role::Assign)
                    .ok_or_else(|| E::custom(format!("unknown experiment type label: {v}")))
            }
        }

        deserializer.deserialize_str(RoleVisitor)
    }
}

/// One entry of the user's selection mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionEntry {
    /// Declared role, or SKIP
    #[serde(rename = "experimentType")]
    pub role: Role,
    /// Chosen processing number
    pub procno: String,
}

/// The per-directory role selection supplied by the host GUI.
///
/// Directories absent from the mapping are treated exactly like explicit
/// SKIP entries; a partial or empty selection is legal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSelection(
    /// Directory id to its declared role and chosen procno
    pub BTreeMap<String, SelectionEntry>,
);

impl UserSelection {
    /// Parse a selection from its JSON form:
    /// `{"5": {"experimentType": "HSQC_EDITED", "procno": "1"}, ...}`
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Auto-select every classified experiment with peaks at its first
    /// procno that has them. For singular roles only the first directory
    /// (in inventory order) is taken; later duplicates are left out so the
    /// resulting selection always converts cleanly.
    pub fn auto_select(inventory: &Inventory) -> Self {
        let mut entries = BTreeMap::new();
        let mut claimed: Vec<ExperimentKind> = Vec::new();

        for exp in inventory.selectable() {
            let Some(kind) = exp.kind else { continue };
            if kind.is_singular() && claimed.contains(&kind) {
                info!(
                    "auto-select: {} already has a source, leaving out experiment {}",
                    kind, exp.id
                );
                continue;
            }
            let Some(proc) = exp.first_procno_with_peaks() else {
                continue;
            };
            claimed.push(kind);
            entries.insert(
                exp.id.clone(),
                SelectionEntry {
                    role: Role::Assign(kind),
                    procno: proc.procno.clone(),
                },
            );
        }

        UserSelection(entries)
    }
}

/// One peak row of the canonical document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakRow {
    /// First chemical shift, ppm
    pub delta1: f64,
    /// Second chemical shift, ppm; 2D experiments only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta2: Option<f64>,
    /// Peak amplitude
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f64>,
    /// Annotation carried over from peak picking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    /// Multiplicity sign recovered from the matched integration region;
    /// HSQC-type experiments only, absent when no region matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign: Option<i8>,
}

/// One integration row of the canonical document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationRow {
    /// F1 range upper bound, ppm
    #[serde(rename = "rangeMax1")]
    pub range_max1: f64,
    /// F1 range lower bound, ppm
    #[serde(rename = "rangeMin1")]
    pub range_min1: f64,
    /// F2 range upper bound, ppm
    #[serde(rename = "rangeMax2", skip_serializing_if = "Option::is_none")]
    pub range_max2: Option<f64>,
    /// F2 range lower bound, ppm
    #[serde(rename = "rangeMin2", skip_serializing_if = "Option::is_none")]
    pub range_min2: Option<f64>,
    /// F1 center shift, ppm
    pub delta1: f64,
    /// F2 center shift, ppm
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta2: Option<f64>,
    /// Signed integral value
    pub intensity: f64,
}

/// Spectrum-level metadata attached to each document block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpectrumMeta {
    /// Pulse program the data was acquired with
    #[serde(rename = "pulseSequence", skip_serializing_if = "Option::is_none")]
    pub pulse_sequence: Option<String>,
    /// Nucleus per dimension
    pub nuclei: Vec<String>,
    /// Spectrometer base frequency per dimension, MHz
    #[serde(rename = "specFrequency", skip_serializing_if = "Vec::is_empty")]
    pub spec_frequency: Vec<f64>,
    /// Sample temperature, Kelvin
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Probe description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe: Option<String>,
}

/// One experiment block of the canonical document
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentBlock {
    /// Extracted peaks, shaped for the experiment type
    pub peaks: Vec<PeakRow>,
    /// Integration regions, when the source procno carried any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrations: Option<Vec<IntegrationRow>>,
    /// Contributing source directory; for merged roles, the first one
    #[serde(rename = "sourceDirectory")]
    pub source_directory: String,
    /// Spectrum-level metadata
    #[serde(flatten)]
    pub meta: SpectrumMeta,
}

/// Provenance manifest of the document
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    /// Unique id for this conversion
    #[serde(rename = "documentId")]
    pub document_id: Uuid,
    /// Creation timestamp
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// Canonical label → every contributing source directory, in
    /// selection order
    pub roles: BTreeMap<String, Vec<String>>,
}

/// The canonical JSON document submitted downstream
#[derive(Debug, Clone, Serialize)]
pub struct CanonicalDocument {
    /// Opaque molecule reference (molfile path or SMILES), pass-through
    #[serde(skip_serializing_if = "Option::is_none")]
    pub molecule: Option<String>,
    /// One block per selected canonical label
    #[serde(flatten)]
    pub experiments: BTreeMap<String, ExperimentBlock>,
    /// Provenance manifest
    pub manifest: Manifest,
}

impl CanonicalDocument {
    /// Serialize to pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Build the canonical document.
///
/// Validation runs to completion before any block is constructed, so a
/// `SelectionError` never leaves a partial document behind.
pub fn build_document(
    inventory: &Inventory,
    selection: &UserSelection,
    molecule: Option<&str>,
) -> Result<CanonicalDocument, SelectionError> {
    // Resolve every non-SKIP entry to its directory and procno first.
    let mut resolved: Vec<(ExperimentKind, &ExperimentDirectory, &ProcData)> = Vec::new();
    for (dir_id, entry) in &selection.0 {
        let Role::Assign(kind) = entry.role else {
            continue;
        };
        let exp = inventory
            .get(dir_id)
            .ok_or_else(|| SelectionError::UnknownDirectory(dir_id.clone()))?;
        let proc = exp.proc(&entry.procno).ok_or_else(|| SelectionError::UnknownProcno {
            dir: dir_id.clone(),
            procno: entry.procno.clone(),
        })?;
        if !proc.has_peaks() {
            return Err(SelectionError::NoPeakList {
                role: kind.label().to_string(),
                dir: dir_id.clone(),
                procno: entry.procno.clone(),
            });
        }
        resolved.push((kind, exp, proc));
    }

    // Singular roles may have at most one contributing directory.
    let mut by_role: BTreeMap<ExperimentKind, Vec<(&ExperimentDirectory, &ProcData)>> =
        BTreeMap::new();
    for (kind, exp, proc) in resolved {
        let sources = by_role.entry(kind).or_default();
        if kind.is_singular() && !sources.is_empty() {
            return Err(SelectionError::DuplicateRole {
                role: kind.label().to_string(),
                first: sources[0].0.id.clone(),
                second: exp.id.clone(),
            });
        }
        sources.push((exp, proc));
    }

    // Validation is complete; building the blocks cannot fail.
    let mut experiments = BTreeMap::new();
    let mut roles = BTreeMap::new();
    for (kind, sources) in &by_role {
        let block = build_block(*kind, sources);
        info!(
            "role {}: {} peaks from {} source(s)",
            kind,
            block.peaks.len(),
            sources.len()
        );
        experiments.insert(kind.label().to_string(), block);
        roles.insert(
            kind.label().to_string(),
            sources.iter().map(|(exp, _)| exp.id.clone()).collect(),
        );
    }

    Ok(CanonicalDocument {
        molecule: molecule.map(str::to_string),
        experiments,
        manifest: Manifest {
            document_id: Uuid::new_v4(),
            created_at: Utc::now(),
            roles,
        },
    })
}

fn build_block(
    kind: ExperimentKind,
    sources: &[(&ExperimentDirectory, &ProcData)],
) -> ExperimentBlock {
    let mut peaks: Vec<PeakRow> = Vec::new();
    for (_, proc) in sources {
        let integrals = if kind.carries_multiplicity_sign() {
            proc.integrals.as_ref()
        } else {
            None
        };
        if let Some(list) = proc.peaks.as_ref() {
            peaks.extend(list.peaks.iter().map(|p| shape_peak(p, integrals)));
        }
    }
    if sources.len() > 1 {
        // merged lists are re-sorted into one descending-shift sequence
        peaks.sort_by(|a, b| {
            b.delta2
                .unwrap_or(b.delta1)
                .total_cmp(&a.delta2.unwrap_or(a.delta1))
        });
    }

    // Integrations come from the primary source only; merged roles (HMBC)
    // carry none.
    let (primary, primary_proc) = sources[0];
    let integrations = if sources.len() == 1 {
        primary_proc
            .integrals
            .as_ref()
            .filter(|l| !l.is_empty())
            .map(shape_integrals)
    } else {
        None
    };

    ExperimentBlock {
        peaks,
        integrations,
        source_directory: primary.id.clone(),
        meta: SpectrumMeta {
            pulse_sequence: Some(primary.pulse_program.clone()),
            nuclei: primary.nuclei.clone(),
            spec_frequency: primary.spectrometer_frequencies(),
            temperature: primary.temperature(),
            probe: primary.probe().map(str::to_string),
        },
    }
}

/// Shape one peak for the document, attaching the multiplicity sign for
/// HSQC-type peaks that fall inside an integration region.
fn shape_peak(peak: &PeakEntry, integrals: Option<&IntegralList>) -> PeakRow {
    let sign = match (integrals, peak.f2_ppm) {
        (Some(list), Some(f2)) => match_sign(&list.regions, peak.f1_ppm, f2),
        _ => None,
    };
    PeakRow {
        delta1: peak.f1_ppm,
        delta2: peak.f2_ppm,
        intensity: peak.intensity,
        annotation: peak.annotation.clone(),
        sign,
    }
}

/// The sign of the first region containing the coordinate, if any
fn match_sign(regions: &[IntegrationRegion], f1_ppm: f64, f2_ppm: f64) -> Option<i8> {
    regions
        .iter()
        .find(|r| r.contains(f1_ppm, f2_ppm))
        .map(IntegrationRegion::sign)
}

fn shape_integrals(list: &IntegralList) -> Vec<IntegrationRow> {
    list.regions
        .iter()
        .map(|r| IntegrationRow {
            range_max1: r.f1_start_ppm.max(r.f1_end_ppm),
            range_min1: r.f1_start_ppm.min(r.f1_end_ppm),
            range_max2: match (r.f2_start_ppm, r.f2_end_ppm) {
                (Some(a), Some(b)) => Some(a.max(b)),
                _ => None,
            },
            range_min2: match (r.f2_start_ppm, r.f2_end_ppm) {
                (Some(a), Some(b)) => Some(a.min(b)),
                _ => None,
            },
            delta1: r.f1_ppm,
            delta2: r.f2_ppm,
            intensity: r.integral,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrals::IntegralList;
    use crate::peaklist::{PeakEntry, PeakList};
    use crate::params::ParamMap;
    use std::path::PathBuf;

    fn peak(f1: f64, f2: Option<f64>, intensity: f64) -> PeakEntry {
        PeakEntry {
            f1_ppm: f1,
            f2_ppm: f2,
            intensity: Some(intensity),
            annotation: None,
        }
    }

    fn region(f1: (f64, f64), f2: (f64, f64), integral: f64) -> IntegrationRegion {
        IntegrationRegion {
            f1_start_ppm: f1.0,
            f1_end_ppm: f1.1,
            f2_start_ppm: Some(f2.0),
            f2_end_ppm: Some(f2.1),
            f1_ppm: (f1.0 + f1.1) / 2.0,
            f2_ppm: Some((f2.0 + f2.1) / 2.0),
            integral,
            abs_intensity: None,
        }
    }

    fn experiment(
        id: &str,
        kind: Option<ExperimentKind>,
        dims: usize,
        peaks: Option<PeakList>,
        integrals: Option<IntegralList>,
    ) -> ExperimentDirectory {
        let has_peaks = peaks.as_ref().is_some_and(|p| !p.is_empty());
        let has_integrals = integrals.as_ref().is_some_and(|i| !i.is_empty());
        ExperimentDirectory {
            id: id.to_string(),
            path: PathBuf::from(format!("/data/{id}")),
            dimensions: dims,
            pulse_program: "test_pp".to_string(),
            nuclei: if dims == 2 {
                vec!["1H".to_string(), "13C".to_string()]
            } else {
                vec!["1H".to_string()]
            },
            kind,
            acqu: ParamMap::default(),
            acqu2: None,
            procs: vec![ProcData {
                procno: "1".to_string(),
                path: PathBuf::from(format!("/data/{id}/pdata/1")),
                params: ParamMap::default(),
                peaks,
                integrals,
            }],
            has_peaks,
            has_integrals,
            skipped_peak_rows: 0,
            skipped_integral_rows: 0,
        }
    }

    fn inventory(experiments: Vec<ExperimentDirectory>) -> Inventory {
        Inventory {
            root: PathBuf::from("/data"),
            experiments,
        }
    }

    fn select(entries: &[(&str, Role)]) -> UserSelection {
        UserSelection(
            entries
                .iter()
                .map(|(id, role)| {
                    (
                        id.to_string(),
                        SelectionEntry {
                            role: *role,
                            procno: "1".to_string(),
                        },
                    )
                })
                .collect(),
        )
    }

    fn peaks_1d() -> PeakList {
        PeakList {
            peaks: vec![peak(7.26, None, 1000.0), peak(2.5, None, 800.0)],
            skipped_rows: 0,
        }
    }

    fn peaks_2d() -> PeakList {
        PeakList {
            peaks: vec![peak(77.2, Some(7.26), 1000.0), peak(39.5, Some(2.5), -800.0)],
            skipped_rows: 0,
        }
    }

    #[test]
    fn document_contains_exactly_the_selected_roles() {
        let inv = inventory(vec![
            experiment("1", Some(ExperimentKind::H1_1D), 1, Some(peaks_1d()), None),
            experiment("5", Some(ExperimentKind::Hsqc), 2, Some(peaks_2d()), None),
            experiment("7", Some(ExperimentKind::Hmbc), 2, Some(peaks_2d()), None),
            experiment("9", Some(ExperimentKind::Cosy), 2, None, None),
        ]);
        let sel = select(&[
            ("1", Role::Skip),
            ("5", Role::Assign(ExperimentKind::Hsqc)),
            ("7", Role::Assign(ExperimentKind::Hmbc)),
        ]);

        let doc = build_document(&inv, &sel, None).expect("conversion succeeds");
        let labels: Vec<&str> = doc.experiments.keys().map(String::as_str).collect();
        assert_eq!(labels, vec!["HMBC", "HSQC"]);
        assert_eq!(doc.experiments["HSQC"].source_directory, "5");
        assert_eq!(doc.experiments["HMBC"].source_directory, "7");
        assert_eq!(doc.manifest.roles["HSQC"], vec!["5".to_string()]);
    }

    #[test]
    fn selecting_directory_without_peaks_fails() {
        let inv = inventory(vec![experiment(
            "9",
            Some(ExperimentKind::Cosy),
            2,
            None,
            None,
        )]);
        let sel = select(&[("9", Role::Assign(ExperimentKind::Cosy))]);

        let err = build_document(&inv, &sel, None).expect_err("no peak list");
        assert!(matches!(err, SelectionError::NoPeakList { .. }));
    }

    #[test]
    fn duplicate_singular_role_fails() {
        let inv = inventory(vec![
            experiment("5", Some(ExperimentKind::Hsqc), 2, Some(peaks_2d()), None),
            experiment("6", Some(ExperimentKind::Hsqc), 2, Some(peaks_2d()), None),
        ]);
        let sel = select(&[
            ("5", Role::Assign(ExperimentKind::Hsqc)),
            ("6", Role::Assign(ExperimentKind::Hsqc)),
        ]);

        let err = build_document(&inv, &sel, None).expect_err("duplicate HSQC");
        match err {
            SelectionError::DuplicateRole { role, first, second } => {
                assert_eq!(role, "HSQC");
                assert_eq!((first.as_str(), second.as_str()), ("5", "6"));
            }
            other => panic!("expected DuplicateRole, got {other}"),
        }
    }

    #[test]
    fn repeated_hmbc_merges_into_one_block() {
        let inv = inventory(vec![
            experiment("7", Some(ExperimentKind::Hmbc), 2, Some(peaks_2d()), None),
            experiment("8", Some(ExperimentKind::Hmbc), 2, Some(peaks_2d()), None),
        ]);
        let sel = select(&[
            ("7", Role::Assign(ExperimentKind::Hmbc)),
            ("8", Role::Assign(ExperimentKind::Hmbc)),
        ]);

        let doc = build_document(&inv, &sel, None).expect("HMBC merges");
        let block = &doc.experiments["HMBC"];
        assert_eq!(block.peaks.len(), 4);
        assert_eq!(block.source_directory, "7");
        assert_eq!(
            doc.manifest.roles["HMBC"],
            vec!["7".to_string(), "8".to_string()]
        );
        // merged peaks keep the descending-shift convention
        let f2s: Vec<f64> = block.peaks.iter().filter_map(|p| p.delta2).collect();
        assert!(f2s.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn hsqc_peaks_carry_matched_integration_sign() {
        let integrals = IntegralList {
            regions: vec![
                region((77.4, 76.9), (7.4, 7.1), 1.0),
                region((39.8, 39.2), (2.6, 2.4), -0.54),
            ],
            skipped_rows: 0,
        };
        let inv = inventory(vec![experiment(
            "5",
            Some(ExperimentKind::HsqcEdited),
            2,
            Some(peaks_2d()),
            Some(integrals),
        )]);
        let sel = select(&[("5", Role::Assign(ExperimentKind::HsqcEdited))]);

        let doc = build_document(&inv, &sel, None).expect("conversion succeeds");
        let block = &doc.experiments["HSQC_EDITED"];
        assert_eq!(block.peaks[0].sign, Some(1));
        assert_eq!(block.peaks[1].sign, Some(-1));
        let integrations = block.integrations.as_ref().expect("integrations present");
        assert_eq!(integrations.len(), 2);
        assert!(integrations[0].range_max1 >= integrations[0].range_min1);
    }

    #[test]
    fn unknown_directory_and_procno_fail() {
        let inv = inventory(vec![experiment(
            "5",
            Some(ExperimentKind::Hsqc),
            2,
            Some(peaks_2d()),
            None,
        )]);

        let err = build_document(
            &inv,
            &select(&[("99", Role::Assign(ExperimentKind::Hsqc))]),
            None,
        )
        .expect_err("unknown directory");
        assert!(matches!(err, SelectionError::UnknownDirectory(ref d) if d == "99"));

        let mut sel = select(&[("5", Role::Assign(ExperimentKind::Hsqc))]);
        if let Some(entry) = sel.0.get_mut("5") {
            entry.procno = "3".to_string();
        }
        let err = build_document(&inv, &sel, None).expect_err("unknown procno");
        assert!(matches!(err, SelectionError::UnknownProcno { .. }));
    }

    #[test]
    fn empty_selection_yields_empty_document() {
        let inv = inventory(vec![experiment(
            "1",
            Some(ExperimentKind::H1_1D),
            1,
            Some(peaks_1d()),
            None,
        )]);
        let doc =
            build_document(&inv, &UserSelection::default(), Some("c1ccccc1")).expect("empty ok");
        assert!(doc.experiments.is_empty());
        assert_eq!(doc.molecule.as_deref(), Some("c1ccccc1"));
    }

    #[test]
    fn selection_round_trips_through_json() {
        let json = r#"{
            "1": {"experimentType": "SKIP", "procno": "1"},
            "5": {"experimentType": "HSQC_EDITED", "procno": "2"}
        }"#;
        let sel = UserSelection::from_json_str(json).expect("valid selection");
        assert_eq!(sel.0["1"].role, Role::Skip);
        assert_eq!(sel.0["5"].role, Role::Assign(ExperimentKind::HsqcEdited));
        assert_eq!(sel.0["5"].procno, "2");

        let err = UserSelection::from_json_str(r#"{"1": {"experimentType": "BOGUS", "procno": "1"}}"#);
        assert!(err.is_err());
    }

    #[test]
    fn auto_select_takes_first_of_duplicate_singular_roles() {
        let inv = inventory(vec![
            experiment("5", Some(ExperimentKind::Hsqc), 2, Some(peaks_2d()), None),
            experiment("6", Some(ExperimentKind::Hsqc), 2, Some(peaks_2d()), None),
            experiment("7", Some(ExperimentKind::Hmbc), 2, Some(peaks_2d()), None),
            experiment("8", Some(ExperimentKind::Hmbc), 2, Some(peaks_2d()), None),
            experiment("9", Some(ExperimentKind::Cosy), 2, None, None),
        ]);
        let sel = UserSelection::auto_select(&inv);
        assert!(sel.0.contains_key("5"));
        assert!(!sel.0.contains_key("6"));
        // HMBC is mergeable, both stay
        assert!(sel.0.contains_key("7") && sel.0.contains_key("8"));
        // no peaks, not selectable
        assert!(!sel.0.contains_key("9"));

        build_document(&inv, &sel, None).expect("auto-selection always converts");
    }

    #[test]
    fn document_serializes_with_flattened_blocks() {
        let inv = inventory(vec![experiment(
            "1",
            Some(ExperimentKind::H1_1D),
            1,
            Some(peaks_1d()),
            None,
        )]);
        let sel = select(&[("1", Role::Assign(ExperimentKind::H1_1D))]);
        let doc = build_document(&inv, &sel, None).expect("conversion succeeds");

        let value: serde_json::Value =
            serde_json::from_str(&doc.to_json_pretty().expect("serializes")).expect("valid json");
        assert!(value.get("H1_1D").is_some());
        assert!(value.get("manifest").is_some());
        assert!(value.get("molecule").is_none());
        let peaks = value["H1_1D"]["peaks"].as_array().expect("peaks array");
        assert_eq!(peaks.len(), 2);
        // 1D rows have no second coordinate and no sign
        assert!(peaks[0].get("delta2").is_none());
        assert!(peaks[0].get("sign").is_none());
    }
}
