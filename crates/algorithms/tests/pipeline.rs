//! End-to-end pipeline tests over synthetic imagery
//!
//! Builds a small source scene on disk, extracts chips around a catalog
//! target, rasterizes labels against the chips, and checks the grid
//! invariants the pipeline guarantees.

use fieldchip_algorithms::chip::{extract_chip, ChipConfig};
use fieldchip_algorithms::geometry::{round_bounds, template_grid};
use fieldchip_algorithms::label::{rasterize_label, LabelConfig};
use fieldchip_core::catalog::{parse_catalog, ColumnSpec};
use fieldchip_core::io::{read_label, read_stack, write_stack};
use fieldchip_core::{BandStack, CatalogRow, FieldCollection, GeoTransform, CRS};
use ndarray::Array2;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Two-band 400x400 scene covering (9.99, 19.99)-(10.01, 20.01), with a
/// smooth gradient so resampling has structure to interpolate
fn write_source_scene(dir: &Path, name: &str) {
    let band0 = Array2::from_shape_fn((400, 400), |(r, c)| (r + c) as f32 * 0.01);
    let band1 = Array2::from_shape_fn((400, 400), |(r, c)| (r as f32 - c as f32) * 0.01);
    let mut stack = BandStack::from_bands(vec![band0, band1]).unwrap();
    stack.set_transform(GeoTransform::from_bounds(9.99, 19.99, 10.01, 20.01, 400, 400));
    stack.set_crs(Some(CRS::wgs84()));
    write_stack(&stack, dir.join(name)).unwrap();
}

fn test_rows() -> Vec<CatalogRow> {
    let text = r#"[
        {
            "name": "site1", "x": 10.0, "y": 20.0, "date": "2021-07-15",
            "assignment_id": "A1", "source_image": "scene.tif", "nflds": 1
        },
        {
            "name": "site2", "x": 10.0, "y": 20.0, "date": "2021-07-15",
            "assignment_id": "A2", "source_image": "scene.tif", "nflds": 0
        }
    ]"#;
    parse_catalog(text, &ColumnSpec::default()).unwrap()
}

/// One square field centered on the target, well inside the chip
fn test_fields() -> FieldCollection {
    let text = r#"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [9.999, 19.999], [10.001, 19.999],
                    [10.001, 20.001], [9.999, 20.001],
                    [9.999, 19.999]
                ]]
            },
            "properties": {"assignment_id": "A1"}
        }]
    }"#;
    FieldCollection::from_geojson_str(text).unwrap()
}

struct Pipeline {
    _tmp: TempDir,
    chip_cfg: ChipConfig,
    label_cfg: LabelConfig,
    rows: Vec<CatalogRow>,
}

fn setup() -> Pipeline {
    let tmp = TempDir::new().unwrap();
    let src_dir = tmp.path().join("src");
    let chip_dir = tmp.path().join("chips");
    let label_dir = tmp.path().join("labels");
    fs::create_dir_all(&src_dir).unwrap();
    fs::create_dir_all(&chip_dir).unwrap();
    fs::create_dir_all(&label_dir).unwrap();

    write_source_scene(&src_dir, "scene.tif");

    let chip_cfg = ChipConfig::new(&src_dir, &chip_dir, 256, 256);
    let label_cfg = LabelConfig::new(&chip_dir, &label_dir);

    Pipeline {
        _tmp: tmp,
        chip_cfg,
        label_cfg,
        rows: test_rows(),
    }
}

#[test]
fn chip_matches_template_exactly() {
    let p = setup();
    let row = extract_chip(&p.rows[0], &p.chip_cfg).unwrap();

    assert_eq!(row.image.as_deref(), Some("site1_2021-07.tif"));

    let chip = read_stack(p.chip_cfg.dst_dir.join("site1_2021-07.tif")).unwrap();
    assert_eq!(chip.band_count(), 2);
    assert_eq!(chip.shape(), (256, 256));

    // The documented example: w = 0.0025 at (10, 20) with 4 decimals
    let bounds = round_bounds((10.0 - 0.0025, 20.0 - 0.0025, 10.0 + 0.0025, 20.0 + 0.0025), 4);
    assert_eq!(bounds, (9.9975, 19.9975, 10.0025, 20.0025));

    let template = template_grid(bounds, 256, 256, CRS::wgs84());
    assert_eq!(chip.transform(), template.transform());
    assert_eq!(chip.bounds(), template.bounds());

    // Interior of the source: no NaN fill anywhere
    assert!(chip.band(0).unwrap().iter().all(|v| v.is_finite()));
}

#[test]
fn chip_skip_is_idempotent() {
    let p = setup();
    let dst = p.chip_cfg.dst_dir.join("site1_2021-07.tif");

    extract_chip(&p.rows[0], &p.chip_cfg).unwrap();
    let first = fs::read(&dst).unwrap();

    // Second pass without overwrite only logs and returns the named row
    let row = extract_chip(&p.rows[0], &p.chip_cfg).unwrap();
    assert_eq!(row.image.as_deref(), Some("site1_2021-07.tif"));
    let second = fs::read(&dst).unwrap();
    assert_eq!(first, second);

    // Forced overwrite regenerates the same content for the same inputs
    let mut overwrite_cfg = p.chip_cfg.clone();
    overwrite_cfg.overwrite = true;
    extract_chip(&p.rows[0], &overwrite_cfg).unwrap();
    let third = fs::read(&dst).unwrap();
    assert_eq!(first, third);
}

#[test]
fn chip_missing_source_fails() {
    let p = setup();
    let mut row = p.rows[0].clone();
    row.source_image = "missing.tif".to_string();
    assert!(extract_chip(&row, &p.chip_cfg).is_err());
}

#[test]
fn label_aligns_to_chip() {
    let p = setup();
    let fields = test_fields();

    let row = extract_chip(&p.rows[0], &p.chip_cfg).unwrap();
    let row = rasterize_label(&row, &p.label_cfg, &fields).unwrap();
    assert_eq!(row.label.as_deref(), Some("site1_A1_2021-07.tif"));

    let chip = read_stack(p.chip_cfg.dst_dir.join("site1_2021-07.tif")).unwrap();
    let label = read_label(p.label_cfg.label_dir.join("site1_A1_2021-07.tif")).unwrap();

    assert_eq!(label.shape(), chip.shape());
    assert_eq!(label.bounds(), chip.bounds());

    // Classes stay in {0, 1, 2} and all three appear: background, a
    // field interior, and its boundary ring
    assert!(label.data().iter().all(|&v| v <= 2));
    assert!(label.data().iter().any(|&v| v == 0));
    assert!(label.data().iter().any(|&v| v == 1));
    assert!(label.data().iter().any(|&v| v == 2));

    // The chip center sits in the middle of the field
    assert_eq!(label.get(128, 128).unwrap(), 1);
    // The corners are outside it
    assert_eq!(label.get(0, 0).unwrap(), 0);
    assert_eq!(label.get(255, 255).unwrap(), 0);
}

#[test]
fn label_zero_fields_is_all_zero() {
    let p = setup();
    let fields = test_fields();

    let row = extract_chip(&p.rows[1], &p.chip_cfg).unwrap();
    let row = rasterize_label(&row, &p.label_cfg, &fields).unwrap();
    assert_eq!(row.label.as_deref(), Some("site2_A2_2021-07.tif"));

    let label = read_label(p.label_cfg.label_dir.join("site2_A2_2021-07.tif")).unwrap();
    assert_eq!(label.shape(), (256, 256));
    assert!(label.data().iter().all(|&v| v == 0));
}

#[test]
fn label_skip_is_idempotent() {
    let p = setup();
    let fields = test_fields();

    let row = extract_chip(&p.rows[0], &p.chip_cfg).unwrap();
    rasterize_label(&row, &p.label_cfg, &fields).unwrap();

    let dst = p.label_cfg.label_dir.join("site1_A1_2021-07.tif");
    let first = fs::read(&dst).unwrap();

    rasterize_label(&row, &p.label_cfg, &fields).unwrap();
    let second = fs::read(&dst).unwrap();
    assert_eq!(first, second);
}

#[test]
fn label_requires_chip_name() {
    let p = setup();
    let fields = test_fields();

    // A row that never went through chip extraction has no image name
    assert!(rasterize_label(&p.rows[0], &p.label_cfg, &fields).is_err());
}
