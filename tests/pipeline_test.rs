//! End-to-end pipeline test over a synthetic Bruker dataset tree:
//! directory discovery, classification, parsing, and canonical document
//! construction.

use std::fs;
use std::path::Path;

use nmrjson::classify::{ExperimentKind, RuleTable};
use nmrjson::convert::{build_document, Role, SelectionEntry, SelectionError, UserSelection};
use nmrjson::reader::Inventory;
use tempfile::TempDir;

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(path, content).expect("write fixture file");
}

fn acqu_pair(dir: &Path, pulprog: &str, nuc: &str, bf1: f64) {
    let content = format!(
        "##$PULPROG= <{pulprog}>\n##$NUC1= <{nuc}>\n##$BF1= {bf1}\n##$TE= 298.0\n##$PROBHD= <5 mm PABBO BB/>\n##END\n"
    );
    write_file(&dir.join("acqu"), &content);
    write_file(&dir.join("acqus"), &content);
}

fn acqu2_pair(dir: &Path, nuc: &str, bf1: f64) {
    let content = format!("##$NUC1= <{nuc}>\n##$BF1= {bf1}\n##END\n");
    write_file(&dir.join("acqu2"), &content);
    write_file(&dir.join("acqu2s"), &content);
}

fn procs(dir: &Path, procno: &str) {
    write_file(
        &dir.join("pdata").join(procno).join("procs"),
        "##$SI= 65536\n##END\n",
    );
}

const PEAKS_1D_WITH_MALFORMED_ROW: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<PeakList modified="2024-02-01T10:00:00">
  <PeakList1D>
    <Peak1D F1="7.26" intensity="1000.0" annotation="CHCl3" type="0"/>
    <Peak1D F1="2.50" intensity="800.0" type="0"/>
    <Peak1D F1="oops" intensity="1.0" type="0"/>
  </PeakList1D>
</PeakList>"#;

const PEAKS_2D: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<PeakList modified="2024-02-01T10:00:00">
  <PeakList2D>
    <Peak2D F1="77.2" F2="7.26" intensity="1000.0" type="0"/>
    <Peak2D F1="39.5" F2="2.50" intensity="-800.0" type="0"/>
  </PeakList2D>
</PeakList>"#;

const INT2D: &str = "\
# integral  SI_F1  row1  row2  row1_ppm  row2_ppm  abs_intensity  integral  mode\n\
  1  1024  100  120  77.40  76.90  1.23e+07  1.000  V\n\
     1024  200  220   7.40   7.10\n\
  2  1024  300  320  39.80  39.20  8.00e+06  -0.540  V\n\
     1024  400  420   2.60   2.40\n";

/// Dataset from the acceptance scenario: `1` proton 1D with peaks, `5`
/// edited HSQC with peaks and integrals, `7` HMBC with peaks, `9` COSY
/// without a peak list, plus two non-experiment/broken directories.
fn build_dataset() -> TempDir {
    let tmp = TempDir::new().expect("create temp dir");
    let root = tmp.path();

    let d1 = root.join("1");
    acqu_pair(&d1, "zg30", "1H", 400.13);
    procs(&d1, "1");
    write_file(
        &d1.join("pdata").join("1").join("peaklist.xml"),
        PEAKS_1D_WITH_MALFORMED_ROW,
    );

    let d5 = root.join("5");
    acqu_pair(&d5, "hsqcedetgpsisp2.3", "1H", 400.13);
    acqu2_pair(&d5, "13C", 100.61);
    procs(&d5, "1");
    write_file(&d5.join("pdata").join("1").join("peaklist.xml"), PEAKS_2D);
    write_file(&d5.join("pdata").join("1").join("int2d"), INT2D);

    let d7 = root.join("7");
    acqu_pair(&d7, "hmbcetgpl3nd", "1H", 400.13);
    acqu2_pair(&d7, "13C", 100.61);
    procs(&d7, "1");
    write_file(&d7.join("pdata").join("1").join("peaklist.xml"), PEAKS_2D);

    // acquisition parameters but no picked peaks
    let d9 = root.join("9");
    acqu_pair(&d9, "cosygpqf", "1H", 400.13);
    acqu2_pair(&d9, "1H", 400.13);
    procs(&d9, "1");

    // structurally broken: parameters without NUC1
    let d42 = root.join("42");
    write_file(&d42.join("acqu"), "##$PULPROG= <zg30>\n##END\n");
    write_file(&d42.join("acqus"), "##$PULPROG= <zg30>\n##END\n");

    // non-experiment artifact directory
    write_file(&root.join("99").join("notes.txt"), "not an experiment\n");

    tmp
}

fn selection(entries: &[(&str, Role)]) -> UserSelection {
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

#[test]
fn inventory_discovers_and_classifies_experiments() {
    let tmp = build_dataset();
    let inventory = Inventory::read(tmp.path(), &RuleTable::builtin()).expect("read dataset");

    // 42 is excluded (missing NUC1), 99 is skipped (no acqu), rest in
    // ascending numeric order
    let ids: Vec<&str> = inventory.experiments.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "5", "7", "9"]);

    let exp1 = inventory.get("1").expect("experiment 1");
    assert_eq!(exp1.kind, Some(ExperimentKind::H1_1D));
    assert_eq!(exp1.dimensions, 1);
    assert!(exp1.has_peaks);
    assert_eq!(exp1.skipped_peak_rows, 1);
    assert_eq!(exp1.spectrometer_frequencies(), vec![400.13]);
    assert_eq!(exp1.temperature(), Some(298.0));

    let exp5 = inventory.get("5").expect("experiment 5");
    assert_eq!(exp5.kind, Some(ExperimentKind::HsqcEdited));
    assert_eq!(exp5.nuclei, vec!["1H", "13C"]);
    assert!(exp5.has_peaks && exp5.has_integrals);
    assert_eq!(exp5.spectrometer_frequencies(), vec![400.13, 100.61]);

    assert_eq!(
        inventory.get("7").and_then(|e| e.kind),
        Some(ExperimentKind::Hmbc)
    );

    let exp9 = inventory.get("9").expect("experiment 9");
    assert_eq!(exp9.kind, Some(ExperimentKind::Cosy));
    assert!(!exp9.has_peaks);

    // only directories with peak lists are selectable
    let selectable: Vec<&str> = inventory.selectable().map(|e| e.id.as_str()).collect();
    assert_eq!(selectable, vec!["1", "5", "7"]);
}

#[test]
fn acceptance_scenario_produces_expected_document() {
    let tmp = build_dataset();
    let inventory = Inventory::read(tmp.path(), &RuleTable::builtin()).expect("read dataset");

    let sel = selection(&[
        ("1", Role::Skip),
        ("5", Role::Assign(ExperimentKind::HsqcEdited)),
        ("7", Role::Assign(ExperimentKind::Hmbc)),
    ]);
    let doc = build_document(&inventory, &sel, Some("CCO")).expect("conversion succeeds");

    let labels: Vec<&str> = doc.experiments.keys().map(String::as_str).collect();
    assert_eq!(labels, vec!["HMBC", "HSQC_EDITED"]);
    assert_eq!(doc.experiments["HSQC_EDITED"].source_directory, "5");
    assert_eq!(doc.experiments["HMBC"].source_directory, "7");
    assert_eq!(doc.molecule.as_deref(), Some("CCO"));

    // HSQC peaks carry the sign recovered from the matched integral region
    let hsqc = &doc.experiments["HSQC_EDITED"];
    assert_eq!(hsqc.peaks.len(), 2);
    assert_eq!(hsqc.peaks[0].sign, Some(1));
    assert_eq!(hsqc.peaks[1].sign, Some(-1));
    assert!(hsqc.integrations.is_some());

    // HMBC peaks have two coordinates but no sign
    let hmbc = &doc.experiments["HMBC"];
    assert!(hmbc.peaks.iter().all(|p| p.delta2.is_some() && p.sign.is_none()));
    assert!(hmbc.integrations.is_none() || hmbc.integrations.as_ref().is_some_and(|i| !i.is_empty()));

    // the JSON form keeps roles as top-level keys and skips omitted ones
    let value: serde_json::Value =
        serde_json::from_str(&doc.to_json_pretty().expect("serializes")).expect("valid json");
    assert!(value.get("HSQC_EDITED").is_some());
    assert!(value.get("HMBC").is_some());
    assert!(value.get("H1_1D").is_none());
    assert!(value.get("COSY").is_none());
    assert_eq!(value["HSQC_EDITED"]["sourceDirectory"], "5");
    assert_eq!(value["manifest"]["roles"]["HMBC"][0], "7");
}

#[test]
fn selecting_peakless_directory_is_a_selection_error() {
    let tmp = build_dataset();
    let inventory = Inventory::read(tmp.path(), &RuleTable::builtin()).expect("read dataset");

    let sel = selection(&[("9", Role::Assign(ExperimentKind::Cosy))]);
    let err = build_document(&inventory, &sel, None).expect_err("directory 9 has no peaks");
    assert!(matches!(err, SelectionError::NoPeakList { .. }));
}

#[test]
fn auto_selection_converts_cleanly() {
    let tmp = build_dataset();
    let inventory = Inventory::read(tmp.path(), &RuleTable::builtin()).expect("read dataset");

    let sel = UserSelection::auto_select(&inventory);
    assert!(sel.0.contains_key("1") && sel.0.contains_key("5") && sel.0.contains_key("7"));
    assert!(!sel.0.contains_key("9"));

    let doc = build_document(&inventory, &sel, None).expect("auto-selection converts");
    assert_eq!(doc.experiments.len(), 3);
    assert_eq!(doc.manifest.roles.len(), 3);
}

#[test]
fn rerun_produces_identical_inventory() {
    let tmp = build_dataset();
    let rules = RuleTable::builtin();
    let first = Inventory::read(tmp.path(), &rules).expect("first pass");
    let second = Inventory::read(tmp.path(), &rules).expect("second pass");

    let kinds = |inv: &Inventory| -> Vec<(String, Option<ExperimentKind>, bool)> {
        inv.experiments
            .iter()
            .map(|e| (e.id.clone(), e.kind, e.has_peaks))
            .collect()
    };
    assert_eq!(kinds(&first), kinds(&second));
}
