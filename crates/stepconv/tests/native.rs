//! End-to-end conversion through the native kernel.

use std::fs;
use std::path::Path;

use approx::assert_relative_eq;
use stepconv::{ConvertConfig, Converter, StlFormat};

const BLOCK: &str = include_str!("fixtures/block.stp");
const CYLINDER: &str = include_str!("fixtures/cylinder.stp");
const ASSEMBLY: &str = include_str!("fixtures/assembly.stp");

fn setup(files: &[(&str, &str)]) -> (tempfile::TempDir, ConvertConfig) {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("in");
    fs::create_dir(&input).unwrap();
    for (name, text) in files {
        fs::write(input.join(name), text).unwrap();
    }
    let config = ConvertConfig {
        input_dir: input,
        output_dir: root.path().join("out"),
        ..ConvertConfig::default()
    };
    (root, config)
}

fn vertices(stl: &Path) -> Vec<[f64; 3]> {
    fs::read_to_string(stl)
        .unwrap()
        .lines()
        .filter_map(|line| line.trim().strip_prefix("vertex "))
        .map(|rest| {
            let v: Vec<f64> = rest.split_whitespace().map(|t| t.parse().unwrap()).collect();
            [v[0], v[1], v[2]]
        })
        .collect()
}

#[test]
fn converts_good_files_and_reports_bad_ones() {
    let (_root, config) = setup(&[
        ("Block.STP", BLOCK),
        ("Pin Ø5.STP", CYLINDER),
        ("Truncated.STP", &BLOCK[..BLOCK.len() / 2]),
    ]);
    let out_dir = config.output_dir.clone();
    let mut out = Vec::new();
    let report = Converter::native(config).run(&mut out).unwrap();
    let out = String::from_utf8(out).unwrap();

    assert_eq!(report.converted.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert!(out.contains("Converted Block.STP → "));
    assert!(out.contains("Converted Pin Ø5.STP → "));
    assert!(out.contains("[ERROR] Truncated.STP: Failed to read STEP file "));
    assert!(out_dir.join("block.stl").is_file());
    assert!(out_dir.join("pin-5.stl").is_file());
    assert!(!out_dir.join("truncated.stl").exists());

    let block = vertices(&out_dir.join("block.stl"));
    assert_eq!(block.len(), 36);
    let max_x = block.iter().map(|v| v[0]).fold(f64::MIN, f64::max);
    assert_relative_eq!(max_x, 0.02, epsilon = 1e-9);
}

#[test]
fn keep_millimetres_changes_coordinates_by_a_thousand() {
    let (_root, config) = setup(&[("Block.STP", BLOCK)]);
    let target = config.output_dir.join("block.stl");

    Converter::native(config.clone()).run(&mut std::io::sink()).unwrap();
    let metres = vertices(&target);

    let keep = ConvertConfig {
        keep_millimetres: true,
        ..config
    };
    Converter::native(keep).run(&mut std::io::sink()).unwrap();
    let millimetres = vertices(&target);

    assert_eq!(metres.len(), millimetres.len());
    for (m, mm) in metres.iter().zip(&millimetres) {
        for axis in 0..3 {
            assert_relative_eq!(m[axis], mm[axis] * 0.001, epsilon = 1e-9);
        }
    }
}

#[test]
fn repeated_runs_are_byte_identical() {
    let (_root, config) = setup(&[("Pin.STP", CYLINDER)]);
    let target = config.output_dir.join("pin.stl");
    let converter = Converter::native(config);

    converter.run(&mut std::io::sink()).unwrap();
    let first = fs::read(&target).unwrap();
    converter.run(&mut std::io::sink()).unwrap();
    assert_eq!(fs::read(&target).unwrap(), first);
}

#[test]
fn binary_output_has_consistent_length() {
    let (_root, config) = setup(&[("Block.STP", BLOCK)]);
    let config = ConvertConfig {
        stl_format: StlFormat::Binary,
        ..config
    };
    let target = config.output_dir.join("block.stl");
    Converter::native(config).run(&mut std::io::sink()).unwrap();

    let data = fs::read(&target).unwrap();
    let count = u32::from_le_bytes(data[80..84].try_into().unwrap());
    assert_eq!(count, 12);
    assert_eq!(data.len(), 84 + 50 * count as usize);
}

#[test]
fn assembly_instances_are_written_in_place() {
    let (_root, config) = setup(&[("Block pair.STP", ASSEMBLY)]);
    let target = config.output_dir.join("block-pair.stl");
    Converter::native(config).run(&mut std::io::sink()).unwrap();

    let mesh = vertices(&target);
    assert_eq!(mesh.len(), 72);
    let max_x = mesh.iter().map(|v| v[0]).fold(f64::MIN, f64::max);
    let max_y = mesh.iter().map(|v| v[1]).fold(f64::MIN, f64::max);
    assert_relative_eq!(max_x, 0.05, epsilon = 1e-9);
    assert_relative_eq!(max_y, 0.02, epsilon = 1e-9);
    // Nothing of the second block lands on the first.
    assert!(mesh.iter().all(|v| v[0] <= 0.02 + 1e-9 || v[0] >= 0.04 - 1e-9));
}

#[test]
fn spline_faces_are_meshed_with_the_rest() {
    let spline = BLOCK.replace(
        "#78 = PLANE('',#77);",
        "#78 = B_SPLINE_SURFACE_WITH_KNOTS('',1,1,((#5,#6),(#7,#8)),.PLANE_SURF.,.F.,.F.,.F.,\
         (2,2),(2,2),(0.,1.),(0.,1.),.UNSPECIFIED.);",
    );
    assert_ne!(spline, BLOCK);
    let (_root, config) = setup(&[("Block.STP", &spline)]);
    let target = config.output_dir.join("block.stl");
    let report = Converter::native(config).run(&mut std::io::sink()).unwrap();
    assert_eq!(report.converted.len(), 1);

    let mesh = vertices(&target);
    assert_eq!(mesh.len(), 36);
    let volume: f64 = mesh
        .chunks(3)
        .map(|t| {
            let [a, b, c] = [t[0], t[1], t[2]];
            (a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
                + a[2] * (b[0] * c[1] - b[1] * c[0]))
                / 6.0
        })
        .sum();
    assert_relative_eq!(volume, 0.02 * 0.01 * 0.005, epsilon = 1e-12);
}

#[test]
fn unmeshable_faces_fail_the_file() {
    let offset = BLOCK.replace("#78 = PLANE('',#77);", "#78 = OFFSET_SURFACE('',#89,1.,.F.);");
    let (_root, config) = setup(&[("Block.STP", &offset)]);
    let out_dir = config.output_dir.clone();
    let mut out = Vec::new();
    let report = Converter::native(config).run(&mut out).unwrap();

    assert!(report.converted.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert!(String::from_utf8(out).unwrap().contains("OFFSET_SURFACE"));
    assert!(!out_dir.join("block.stl").exists());
}
