//! # Dataset Directory Reader
//!
//! Walks a Bruker dataset root and assembles an [`Inventory`] of classified,
//! parsed experiments. The expected on-disk layout is one numeric
//! subdirectory per experiment:
//!
//! ```text
//! dataset/
//! ├── 1/
//! │   ├── acqu, acqus              # acquisition parameters (one pair per dimension)
//! │   └── pdata/
//! │       └── 1/
//! │           ├── proc, procs      # processing parameters
//! │           ├── peaklist.xml     # picked peaks (optional)
//! │           └── int2d            # integration regions (optional, 2D)
//! └── 5/ ...
//! ```
//!
//! Error posture, in line with the rest of the pipeline:
//!
//! - directories without a readable `acqu` resource are skipped silently —
//!   many numeric subdirectories in this vendor layout are not experiments;
//! - directories whose parameters cannot determine nucleus or
//!   dimensionality are excluded and logged, never raised;
//! - missing peak lists or integrals leave the experiment in the inventory
//!   flagged `has_peaks = false` / `has_integrals = false`; the converter
//!   refuses such directories as contributing sources.
//!
//! The reader performs no cross-experiment consistency validation (e.g.
//! HSQC vs. carbon peak-count agreement); that is deliberately left to the
//! user and the downstream analysis service.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Serialize;

use crate::classify::{ExperimentKind, ExperimentSignature, RuleTable};
use crate::integrals::{parse_int2d, IntegralList};
use crate::params::{ParamError, ParamMap};
use crate::peaklist::{parse_peaklist_xml, Dimensionality, PeakList};

/// One processed-data (`pdata/<procno>`) directory of an experiment
#[derive(Debug, Clone, Serialize)]
pub struct ProcData {
    /// Processing number (directory name)
    pub procno: String,
    /// Absolute path of the procno directory
    pub path: PathBuf,
    /// Processing parameters (`procs`, falling back to `proc`)
    pub params: ParamMap,
    /// Picked peaks, when a `peaklist.xml` resource exists and parsed
    pub peaks: Option<PeakList>,
    /// Integration regions, when an `int2d` resource exists and parsed
    pub integrals: Option<IntegralList>,
}

impl ProcData {
    /// Whether this procno has a non-empty peak list
    pub fn has_peaks(&self) -> bool {
        self.peaks.as_ref().is_some_and(|p| !p.is_empty())
    }

    /// Whether this procno has a non-empty integral list
    pub fn has_integrals(&self) -> bool {
        self.integrals.as_ref().is_some_and(|i| !i.is_empty())
    }
}

/// One experiment subdirectory, after parsing and classification.
///
/// Immutable once built; the reader produces a fresh inventory on every
/// pass and nothing is persisted between runs.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentDirectory {
    /// Directory name (typically numeric)
    pub id: String,
    /// Absolute path of the experiment directory
    pub path: PathBuf,
    /// Acquisition dimensionality (number of `acqu*` file pairs)
    pub dimensions: usize,
    /// Pulse program name (PULPROG), `unknown` when absent
    pub pulse_program: String,
    /// Nucleus per dimension (NUC1 of `acqu`, then `acqu2`)
    pub nuclei: Vec<String>,
    /// Canonical experiment type; `None` means unrecognized, the
    /// experiment is still listed so a user can classify it manually
    pub kind: Option<ExperimentKind>,
    /// Direct-dimension acquisition parameters
    pub acqu: ParamMap,
    /// Indirect-dimension acquisition parameters, for 2D experiments
    pub acqu2: Option<ParamMap>,
    /// Processed-data directories, in ascending procno order
    pub procs: Vec<ProcData>,
    /// Whether any procno carries a non-empty peak list
    pub has_peaks: bool,
    /// Whether any procno carries a non-empty integral list
    pub has_integrals: bool,
    /// Malformed peak rows encountered across all procnos
    pub skipped_peak_rows: usize,
    /// Malformed integral rows encountered across all procnos
    pub skipped_integral_rows: usize,
}

impl ExperimentDirectory {
    /// The signature classification operates on
    pub fn signature(&self) -> ExperimentSignature {
        ExperimentSignature {
            pulse_program: self.pulse_program.clone(),
            nuclei: self.nuclei.clone(),
            dimensions: self.dimensions,
        }
    }

    /// Look up a procno by name
    pub fn proc(&self, procno: &str) -> Option<&ProcData> {
        self.procs.iter().find(|p| p.procno == procno)
    }

    /// The first procno (ascending order) that has peaks
    pub fn first_procno_with_peaks(&self) -> Option<&ProcData> {
        self.procs.iter().find(|p| p.has_peaks())
    }

    /// Shift-coordinate count of this experiment's peak rows.
    ///
    /// Pure-shift experiments are acquired as pseudo-2D but their peak
    /// lists are 1D, so the kind overrides the acquisition dimensionality.
    pub fn peak_dimensionality(&self) -> Dimensionality {
        if self.kind == Some(ExperimentKind::Pureshift1D) || self.dimensions < 2 {
            Dimensionality::OneD
        } else {
            Dimensionality::TwoD
        }
    }

    /// Spectrometer base frequency per dimension (BF1 of each `acqu*`), MHz
    pub fn spectrometer_frequencies(&self) -> Vec<f64> {
        let mut freqs = Vec::with_capacity(2);
        if let Some(bf1) = self.acqu.get_f64("BF1") {
            freqs.push(bf1);
        }
        if let Some(bf1) = self.acqu2.as_ref().and_then(|a| a.get_f64("BF1")) {
            freqs.push(bf1);
        }
        freqs
    }

    /// Sample temperature (TE), Kelvin
    pub fn temperature(&self) -> Option<f64> {
        self.acqu.get_f64("TE")
    }

    /// Probe description (PROBHD)
    pub fn probe(&self) -> Option<&str> {
        self.acqu.get_str("PROBHD")
    }
}

/// The complete inventory of one dataset root
#[derive(Debug, Clone, Serialize)]
pub struct Inventory {
    /// Dataset root path
    pub root: PathBuf,
    /// Experiments in ascending numeric-id order
    pub experiments: Vec<ExperimentDirectory>,
}

impl Inventory {
    /// Read a dataset root, classifying each experiment against `rules`.
    ///
    /// Only failure to enumerate the root itself is an error; individual
    /// directories degrade as documented in the module header.
    pub fn read(root: &Path, rules: &RuleTable) -> Result<Inventory, std::io::Error> {
        let mut dirs: Vec<PathBuf> = fs::read_dir(root)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort_by_key(|p| sort_key(p));

        let mut experiments = Vec::new();
        for dir in dirs {
            match read_experiment(&dir, rules) {
                Ok(Some(exp)) => {
                    debug!(
                        "experiment {}: {} ({}D {}), peaks={}",
                        exp.id,
                        exp.kind.map_or("unrecognized", |k| k.label()),
                        exp.dimensions,
                        exp.pulse_program,
                        exp.has_peaks
                    );
                    experiments.push(exp);
                }
                Ok(None) => {
                    debug!("skipping {}: no acquisition parameters", dir.display());
                }
                Err(e) => {
                    warn!("excluding {}: {}", dir.display(), e);
                }
            }
        }

        Ok(Inventory {
            root: root.to_path_buf(),
            experiments,
        })
    }

    /// Look up an experiment by directory id
    pub fn get(&self, id: &str) -> Option<&ExperimentDirectory> {
        self.experiments.iter().find(|e| e.id == id)
    }

    /// Experiments a user may select as contributing sources (peak list present)
    pub fn selectable(&self) -> impl Iterator<Item = &ExperimentDirectory> {
        self.experiments.iter().filter(|e| e.has_peaks)
    }

    /// Summaries of every experiment, for GUI display or JSON export
    pub fn summaries(&self) -> Vec<ExperimentSummary> {
        self.experiments.iter().map(ExperimentSummary::from).collect()
    }
}

/// Numeric directory names sort ascending before non-numeric ones.
fn sort_key(path: &Path) -> (u8, u64, String) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    match name.parse::<u64>() {
        Ok(n) => (0, n, name),
        Err(_) => (1, 0, name),
    }
}

/// Read one candidate experiment directory.
///
/// `Ok(None)` means "not an experiment" (no `acqu` resource); `Err` means
/// the parameters were present but structurally unusable.
fn read_experiment(
    dir: &Path,
    rules: &RuleTable,
) -> Result<Option<ExperimentDirectory>, ParamError> {
    let acqu_files = acqu_file_names(dir)?;
    if acqu_files.is_empty() {
        return Ok(None);
    }

    let id = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    // One status/current pair per dimension.
    let dimensions = (acqu_files.len() / 2).max(1);

    let acqu = read_param_file(dir, &["acqu", "acqus"])?
        .ok_or_else(|| ParamError::MissingRequiredParameter("acqu".to_string()))?;
    let acqu2 = if dimensions >= 2 {
        read_param_file(dir, &["acqu2", "acqu2s"])?
    } else {
        None
    };

    let pulse_program = acqu.get_str("PULPROG").unwrap_or("unknown").to_string();

    // NUC1 per dimension is required: without it neither classification nor
    // the canonical document's nucleus metadata can be produced.
    let mut nuclei = vec![acqu.require_str("NUC1")?.to_string()];
    if dimensions >= 2 {
        let acqu2 = acqu2
            .as_ref()
            .ok_or_else(|| ParamError::MissingRequiredParameter("acqu2".to_string()))?;
        nuclei.push(acqu2.require_str("NUC1")?.to_string());
    }

    let mut exp = ExperimentDirectory {
        id,
        path: dir.to_path_buf(),
        dimensions,
        pulse_program,
        nuclei,
        kind: None,
        acqu,
        acqu2,
        procs: Vec::new(),
        has_peaks: false,
        has_integrals: false,
        skipped_peak_rows: 0,
        skipped_integral_rows: 0,
    };
    exp.kind = rules.classify(&exp.signature());

    read_pdata(&mut exp);

    exp.has_peaks = exp.procs.iter().any(ProcData::has_peaks);
    exp.has_integrals = exp.procs.iter().any(ProcData::has_integrals);
    exp.skipped_peak_rows = exp
        .procs
        .iter()
        .filter_map(|p| p.peaks.as_ref())
        .map(|p| p.skipped_rows)
        .sum();
    exp.skipped_integral_rows = exp
        .procs
        .iter()
        .filter_map(|p| p.integrals.as_ref())
        .map(|i| i.skipped_rows)
        .sum();

    Ok(Some(exp))
}

/// Names of `acqu*` files present in an experiment directory.
fn acqu_file_names(dir: &Path) -> Result<Vec<String>, ParamError> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with("acqu") && entry.path().is_file() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Read the first of `candidates` that exists in `dir`.
fn read_param_file(dir: &Path, candidates: &[&str]) -> Result<Option<ParamMap>, ParamError> {
    for name in candidates {
        let path = dir.join(name);
        if path.is_file() {
            return ParamMap::from_file(&path).map(Some);
        }
    }
    Ok(None)
}

/// Scan `pdata/<procno>` directories for processing parameters, peak
/// lists, and integrals. All failures here degrade: an unreadable peak
/// list is logged and treated as absent.
fn read_pdata(exp: &mut ExperimentDirectory) {
    let pdata = exp.path.join("pdata");
    let entries = match fs::read_dir(&pdata) {
        Ok(entries) => entries,
        Err(_) => return,
    };

    let mut proc_dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.is_dir()
                && p.file_name()
                    .map(|n| {
                        let n = n.to_string_lossy();
                        !n.is_empty() && n.chars().all(|c| c.is_ascii_digit())
                    })
                    .unwrap_or(false)
        })
        .collect();
    proc_dirs.sort_by_key(|p| sort_key(p));

    let peak_dim = exp.peak_dimensionality();

    for proc_dir in proc_dirs {
        let procno = proc_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let params = match read_param_file(&proc_dir, &["procs", "proc"]) {
            Ok(Some(map)) => map,
            Ok(None) => ParamMap::default(),
            Err(e) => {
                warn!(
                    "unreadable processing parameters in {}: {}",
                    proc_dir.display(),
                    e
                );
                ParamMap::default()
            }
        };

        let peaks = read_peaklist(&proc_dir, peak_dim);
        let integrals = if exp.dimensions >= 2 {
            read_integrals(&proc_dir)
        } else {
            None
        };

        exp.procs.push(ProcData {
            procno,
            path: proc_dir,
            params,
            peaks,
            integrals,
        });
    }
}

fn read_peaklist(proc_dir: &Path, dim: Dimensionality) -> Option<PeakList> {
    let path = proc_dir.join("peaklist.xml");
    if !path.is_file() {
        return None;
    }
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("unreadable peak list {}: {}", path.display(), e);
            return None;
        }
    };
    let xml = String::from_utf8_lossy(&bytes);
    match parse_peaklist_xml(&xml, dim) {
        Ok(list) => {
            if list.skipped_rows > 0 {
                warn!(
                    "{}: skipped {} malformed peak rows",
                    path.display(),
                    list.skipped_rows
                );
            }
            Some(list)
        }
        Err(e) => {
            warn!("unparseable peak list {}: {}", path.display(), e);
            None
        }
    }
}

fn read_integrals(proc_dir: &Path) -> Option<IntegralList> {
    let path = proc_dir.join("int2d");
    if !path.is_file() {
        return None;
    }
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("unreadable integral file {}: {}", path.display(), e);
            return None;
        }
    };
    let content = String::from_utf8_lossy(&bytes);
    match parse_int2d(&content) {
        Ok(list) => {
            if list.skipped_rows > 0 {
                warn!(
                    "{}: skipped {} malformed integral rows",
                    path.display(),
                    list.skipped_rows
                );
            }
            Some(list)
        }
        Err(e) => {
            warn!("unparseable integral file {}: {}", path.display(), e);
            None
        }
    }
}

/// Flat, GUI-facing view of one inventory entry
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentSummary {
    /// Directory id
    pub id: String,
    /// Canonical label, or `"unrecognized"`; used as the dialog's
    /// best-guess pre-selection
    pub label: String,
    /// Pulse program name
    #[serde(rename = "pulseProgram")]
    pub pulse_program: String,
    /// Nucleus per dimension
    pub nuclei: Vec<String>,
    /// Acquisition dimensionality
    pub dimensions: usize,
    /// Whether the experiment may be selected as a contributing source
    #[serde(rename = "hasPeakList")]
    pub has_peaks: bool,
    /// Whether any procno carries integration regions
    #[serde(rename = "hasIntegrals")]
    pub has_integrals: bool,
    /// Available processing numbers
    pub procnos: Vec<String>,
    /// Malformed peak rows across all procnos
    #[serde(rename = "skippedPeakRows")]
    pub skipped_peak_rows: usize,
    /// Malformed integral rows across all procnos
    #[serde(rename = "skippedIntegralRows")]
    pub skipped_integral_rows: usize,
}

impl From<&ExperimentDirectory> for ExperimentSummary {
    fn from(exp: &ExperimentDirectory) -> Self {
        ExperimentSummary {
            id: exp.id.clone(),
            label: exp
                .kind
                .map_or_else(|| "unrecognized".to_string(), |k| k.label().to_string()),
            pulse_program: exp.pulse_program.clone(),
            nuclei: exp.nuclei.clone(),
            dimensions: exp.dimensions,
            has_peaks: exp.has_peaks,
            has_integrals: exp.has_integrals,
            procnos: exp.procs.iter().map(|p| p.procno.clone()).collect(),
            skipped_peak_rows: exp.skipped_peak_rows,
            skipped_integral_rows: exp.skipped_integral_rows,
        }
    }
}
