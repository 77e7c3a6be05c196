//! # Experiment Classifier
//!
//! Maps an experiment's acquisition signature (pulse program, nucleus set,
//! dimensionality) to a canonical experiment-type label via an ordered rule
//! table. Classification is a pure function of the signature and the table:
//! the first matching rule wins, so more specific rules (multiplicity-edited
//! HSQC) must precede generic ones (plain HSQC).
//!
//! The rule table is deliberately data, not a type hierarchy: new experiment
//! types are added by appending rules, and an alternate table can be loaded
//! from TOML and passed in explicitly, keeping classification deterministic
//! under test. No global state is consulted.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Canonical experiment-type labels understood by the downstream
/// assignment service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExperimentKind {
    /// Multiplicity-edited HSQC; peak sign encodes CH/CH2/CH3
    #[serde(rename = "HSQC_EDITED")]
    HsqcEdited,
    /// Plain (non-edited) HSQC
    #[serde(rename = "HSQC")]
    Hsqc,
    /// HSQC-CLIP-COSY combination experiment
    #[serde(rename = "HSQC_CLIPCOSY")]
    HsqcClipCosy,
    /// 2D DEPT-edited experiment selecting CH3 groups
    #[serde(rename = "DDEPT_CH3_ONLY")]
    DdeptCh3Only,
    /// Long-range heteronuclear correlation
    #[serde(rename = "HMBC")]
    Hmbc,
    /// Homonuclear correlation
    #[serde(rename = "COSY")]
    Cosy,
    /// Through-space homonuclear correlation
    #[serde(rename = "NOESY")]
    Noesy,
    /// Pure-shift proton experiment (acquired as pseudo-2D, peaks are 1D)
    #[serde(rename = "PURESHIFT_1D")]
    Pureshift1D,
    /// 1D carbon experiment
    #[serde(rename = "C13_1D")]
    C13_1D,
    /// 1D proton experiment
    #[serde(rename = "H1_1D")]
    H1_1D,
    /// DEPT-135; sign-encoded multiplicity in 1D carbon form
    #[serde(rename = "DEPT135")]
    Dept135,
}

impl ExperimentKind {
    /// All canonical kinds, in rule-priority order
    pub const ALL: [ExperimentKind; 11] = [
        ExperimentKind::HsqcEdited,
        ExperimentKind::Hsqc,
        ExperimentKind::HsqcClipCosy,
        ExperimentKind::DdeptCh3Only,
        ExperimentKind::Hmbc,
        ExperimentKind::Cosy,
        ExperimentKind::Noesy,
        ExperimentKind::Pureshift1D,
        ExperimentKind::C13_1D,
        ExperimentKind::H1_1D,
        ExperimentKind::Dept135,
    ];

    /// The canonical label used in selections and the output document
    pub fn label(&self) -> &'static str {
        match self {
            ExperimentKind::HsqcEdited => "HSQC_EDITED",
            ExperimentKind::Hsqc => "HSQC",
            ExperimentKind::HsqcClipCosy => "HSQC_CLIPCOSY",
            ExperimentKind::DdeptCh3Only => "DDEPT_CH3_ONLY",
            ExperimentKind::Hmbc => "HMBC",
            ExperimentKind::Cosy => "COSY",
            ExperimentKind::Noesy => "NOESY",
            ExperimentKind::Pureshift1D => "PURESHIFT_1D",
            ExperimentKind::C13_1D => "C13_1D",
            ExperimentKind::H1_1D => "H1_1D",
            ExperimentKind::Dept135 => "DEPT135",
        }
    }

    /// Look up a kind from its canonical label
    pub fn from_label(label: &str) -> Option<ExperimentKind> {
        ExperimentKind::ALL.iter().copied().find(|k| k.label() == label)
    }

    /// Whether the document schema allows only one source for this role.
    ///
    /// Repeated HMBC acquisitions (e.g. different long-range delays) merge
    /// into one peak list; every other role is singular.
    pub fn is_singular(&self) -> bool {
        !matches!(self, ExperimentKind::Hmbc)
    }

    /// Whether peaks of this kind carry an integration-derived sign
    pub fn carries_multiplicity_sign(&self) -> bool {
        matches!(self, ExperimentKind::HsqcEdited | ExperimentKind::Hsqc)
    }
}

impl fmt::Display for ExperimentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The acquisition signature classification operates on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentSignature {
    /// Pulse program name (PULPROG)
    pub pulse_program: String,
    /// Nucleus per dimension (NUC1 of acqu, then acqu2)
    pub nuclei: Vec<String>,
    /// Acquisition dimensionality
    pub dimensions: usize,
}

/// One classification rule: pattern set → canonical label
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentRule {
    /// Label assigned when the rule matches
    pub label: ExperimentKind,
    /// Pulse-program substring patterns; any match suffices
    pub pulse_programs: Vec<String>,
    /// Required nucleus set (order and repetition insignificant)
    pub nuclei: Vec<String>,
    /// Required acquisition dimensionality
    pub dimensions: usize,
}

impl ExperimentRule {
    /// Whether this rule matches a signature.
    ///
    /// Pulse-program patterns match as case-insensitive substrings, so one
    /// pattern covers a family of vendor variants (`hsqced` matches
    /// `hsqcedetgpsisp2.3`, `hsqcedetgpsp.3`, ...).
    pub fn matches(&self, sig: &ExperimentSignature) -> bool {
        if sig.dimensions != self.dimensions {
            return false;
        }
        let want: BTreeSet<String> = self.nuclei.iter().map(|n| n.to_ascii_uppercase()).collect();
        let have: BTreeSet<String> = sig.nuclei.iter().map(|n| n.to_ascii_uppercase()).collect();
        if want != have {
            return false;
        }
        let pp = sig.pulse_program.to_ascii_lowercase();
        self.pulse_programs
            .iter()
            .any(|pat| pp.contains(&pat.to_ascii_lowercase()))
    }
}

/// Errors that can occur loading a rule table
#[derive(Debug, thiserror::Error)]
pub enum RuleTableError {
    /// I/O error reading a rule file
    #[error("Failed to read rule file: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML document could not be deserialized
    #[error("Invalid rule table: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// An ordered set of classification rules; earlier rules take priority
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleTable {
    /// Rules in priority order
    #[serde(rename = "rule")]
    rules: Vec<ExperimentRule>,
}

impl RuleTable {
    /// Build a table from explicit rules, preserving their order
    pub fn new(rules: Vec<ExperimentRule>) -> Self {
        RuleTable { rules }
    }

    /// The builtin rule table covering the pulse programs the original
    /// acquisition setups are known to use. Edited-HSQC patterns come
    /// before plain HSQC so the multiplicity-edited variant is never
    /// misfiled as generic 2D correlation.
    pub fn builtin() -> Self {
        fn rule(
            label: ExperimentKind,
            pulse_programs: &[&str],
            nuclei: &[&str],
            dimensions: usize,
        ) -> ExperimentRule {
            ExperimentRule {
                label,
                pulse_programs: pulse_programs.iter().map(|s| s.to_string()).collect(),
                nuclei: nuclei.iter().map(|s| s.to_string()).collect(),
                dimensions,
            }
        }

        RuleTable::new(vec![
            rule(
                ExperimentKind::HsqcEdited,
                &["hsqced", "gHSQCAD"],
                &["1H", "13C"],
                2,
            ),
            rule(
                ExperimentKind::HsqcClipCosy,
                &["hsqc_clip_cosy", "gns_noah3-BSScc"],
                &["1H", "13C"],
                2,
            ),
            rule(
                ExperimentKind::DdeptCh3Only,
                &["hcdeptedetgpzf"],
                &["1H", "13C"],
                2,
            ),
            rule(
                ExperimentKind::Hsqc,
                &["hsqcetgp", "gHSQC", "inv4gp"],
                &["1H", "13C"],
                2,
            ),
            rule(
                ExperimentKind::Hmbc,
                &["hmbc", "gHMBC", "shmbcctetgpl2nd"],
                &["1H", "13C"],
                2,
            ),
            rule(
                ExperimentKind::Cosy,
                &["cosygp", "gcosy", "gCOSY", "cosyqf45"],
                &["1H", "1H"],
                2,
            ),
            rule(ExperimentKind::Noesy, &["noesygp"], &["1H", "1H"], 2),
            rule(
                ExperimentKind::Pureshift1D,
                &["ja_PSYCHE", "psychetse"],
                &["1H"],
                2,
            ),
            rule(
                ExperimentKind::Dept135,
                &["dept135", "deptsp135", "DEPT"],
                &["13C"],
                1,
            ),
            rule(
                ExperimentKind::C13_1D,
                &["zgdc30", "zgpg30", "zgzrse", "zg0dc", "s2pul"],
                &["13C"],
                1,
            ),
            rule(
                ExperimentKind::H1_1D,
                &["zg30", "zgcppr", "zg", "s2pul"],
                &["1H"],
                1,
            ),
        ])
    }

    /// Load a rule table from a TOML document:
    ///
    /// ```toml
    /// [[rule]]
    /// label = "HSQC_EDITED"
    /// pulse_programs = ["hsqced"]
    /// nuclei = ["1H", "13C"]
    /// dimensions = 2
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self, RuleTableError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a rule table from a TOML file on disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RuleTableError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// The rules, in priority order
    pub fn rules(&self) -> &[ExperimentRule] {
        &self.rules
    }

    /// Classify a signature. Returns `None` when no rule matches; callers
    /// keep such experiments in the inventory as unrecognized rather than
    /// dropping them.
    pub fn classify(&self, sig: &ExperimentSignature) -> Option<ExperimentKind> {
        self.rules.iter().find(|r| r.matches(sig)).map(|r| r.label)
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::builtin()
    }
}
