use approx::assert_relative_eq;
use rsice::pipeline;
use rsice::render::{render_svg, SeriesRole};
use rsice_core::config::PipelineConfig;
use rsice_core::dataset::Dataset;
use rsice_core::errors::RSIceError;
use rsice_core::labeled::LabeledArray;
use rsice_core::loader::{dataset_path, write_json};
use std::path::Path;
use tempfile::tempdir;

const DAYS_PER_MONTH: [f64; 12] = [
    31.0, 28.0, 31.0, 30.0, 31.0, 30.0, 31.0, 31.0, 30.0, 31.0, 30.0, 31.0,
];

/// 3 members × 5 years × 12 months in m². September of year `y` for member
/// `m` is `9e12 + 1e10·y + 1e9·m` m².
fn month_indexed(members: usize, years: usize) -> Dataset {
    let mut data = Vec::with_capacity(members * years * 12);
    for m in 0..members {
        for y in 0..years {
            for k in 0..12 {
                data.push(1.0e12 * (k + 1) as f64 + 1.0e10 * y as f64 + 1.0e9 * m as f64);
            }
        }
    }
    let aice = LabeledArray::from_shape_vec(
        "aice_monthly",
        ["n_members", "time", "nmonth"],
        &[members, years, 12],
        data,
    )
    .unwrap()
    .with_coord("time", (0..years).map(|y| 1979.0 + y as f64).collect())
    .unwrap()
    .with_attr("units", "m^2");
    Dataset::new().with_variable(aice)
}

/// Monthly means on a noleap calendar, already in km².
fn calendar_time(members: usize, years: usize) -> Dataset {
    let mut days = Vec::new();
    let mut start = 0.0;
    for _ in 0..years {
        for len in DAYS_PER_MONTH {
            days.push(start + len / 2.0);
            start += len;
        }
    }
    let steps = days.len();
    let time = LabeledArray::from_shape_vec("time", ["time"], &[steps], days.clone())
        .unwrap()
        .with_attr("units", "days since 2000-01-01 00:00:00")
        .with_attr("calendar", "noleap");

    let data = (0..members * steps)
        .map(|i| 5.0e6 + 100.0 * (i % steps) as f64 + 10.0 * (i / steps) as f64)
        .collect();
    let aice = LabeledArray::from_shape_vec(
        "aice_monthly",
        ["member_id", "time"],
        &[members, steps],
        data,
    )
    .unwrap()
    .with_coord("time", days)
    .unwrap()
    .with_attr("units", "km2");

    Dataset::new().with_variable(time).with_variable(aice)
}

fn write(dir: &Path, name: &str, ds: &Dataset) {
    write_json(ds, &dataset_path(dir, name)).unwrap();
}

fn config(dir: &Path, month: Option<u32>) -> PipelineConfig {
    let month = month.map(|m| format!("month = {}\n", m)).unwrap_or_default();
    let text = format!(
        r#"{month}
[[datasets]]
label = "LE"
directory = "{dir}"
filename = "le.json"
convention = "month-indexed"

[[datasets]]
label = "SMBB"
directory = "{dir}"
filename = "smbb.json"
convention = "calendar-time"

[plot]
title = "Sea-ice area"
y_label = "Area (km^2)"
"#,
        month = month,
        dir = dir.display()
    );
    PipelineConfig::from_toml(&text).unwrap()
}

fn setup() -> tempfile::TempDir {
    let dir = tempdir().unwrap();
    write(dir.path(), "le.json", &month_indexed(3, 5));
    write(dir.path(), "smbb.json", &calendar_time(2, 4));
    dir
}

#[test]
fn september_statistics_in_km2() {
    let dir = setup();
    let out = pipeline::run(&config(dir.path(), Some(9)), None).unwrap();
    let le = &out.datasets[0];

    assert_eq!(le.statistics.members, 3);
    assert_eq!(le.members.dims(), ["n_members", "time"]);
    let mean = le.statistics.mean.to_vec1().unwrap();
    let std = le.statistics.std.to_vec1().unwrap();
    assert_eq!(mean.len(), 5);
    for (y, (m, s)) in mean.iter().zip(&std).enumerate() {
        assert_relative_eq!(*m, 9.0e6 + 1.0e4 * y as f64 + 1.0e3, max_relative = 1e-12);
        assert_relative_eq!(*s, (2.0e6_f64 / 3.0).sqrt(), max_relative = 1e-9);
    }
}

#[test]
fn calendar_selection_keeps_one_step_per_year() {
    let dir = setup();
    let out = pipeline::run(&config(dir.path(), Some(3)), None).unwrap();
    let smbb = &out.datasets[1];

    assert_eq!(smbb.statistics.members, 2);
    assert_eq!(
        smbb.statistics.mean.coord("time").unwrap(),
        &[2000.0, 2001.0, 2002.0, 2003.0]
    );
    // March is step 2 of each year; members differ by 10 km^2
    let mean = smbb.statistics.mean.to_vec1().unwrap();
    assert_relative_eq!(mean[0], 5.0e6 + 200.0 + 5.0);
    assert_relative_eq!(mean[1], 5.0e6 + 1400.0 + 5.0);
    assert!(smbb
        .statistics
        .std
        .to_vec1()
        .unwrap()
        .iter()
        .all(|s| (s - 5.0).abs() < 1e-9));
}

#[test]
fn plot_has_seven_series_per_dataset() {
    let dir = setup();
    let cfg = config(dir.path(), Some(9));
    let out = pipeline::run(&cfg, None).unwrap();
    let spec = out.plot_spec(&cfg).unwrap();

    // SMBB has two members: 2 + 1 + 3
    assert_eq!(spec.series.len(), 7 + 6);
    let le: Vec<_> = spec.series.iter().filter(|s| s.group == 0).collect();
    assert_eq!(le.len(), 7);
    assert_eq!(le.iter().filter(|s| s.role == SeriesRole::Member).count(), 3);
    assert_eq!(le.iter().filter(|s| s.label.is_none()).count(), 3);
    assert_eq!(le.iter().filter(|s| s.role.is_aggregate()).count(), 3);
    assert_eq!(
        le.iter()
            .filter(|s| s.role == SeriesRole::Representative)
            .count(),
        1
    );

    let svg = render_svg(&spec).unwrap();
    assert!(svg.contains("Sea-ice area"));
    assert!(svg.contains("SMBB mean"));
}

#[test]
fn command_line_month_overrides_config() {
    let dir = setup();
    let out = pipeline::run(&config(dir.path(), Some(9)), Some(1)).unwrap();
    assert_eq!(out.month.number(), 1);
    let mean = out.datasets[0].statistics.mean.to_vec1().unwrap();
    assert_relative_eq!(mean[0], 1.0e6 + 1.0e3, max_relative = 1e-12);
}

#[test]
fn unset_month_fails_before_loading() {
    let missing = Path::new("/definitely/not/here");
    assert!(matches!(
        pipeline::run(&config(missing, None), None),
        Err(RSIceError::MonthNotSet)
    ));
    assert!(matches!(
        pipeline::run(&config(missing, Some(13)), None),
        Err(RSIceError::InvalidMonth(13))
    ));
}

#[test]
fn missing_file_is_fatal() {
    let dir = tempdir().unwrap();
    write(dir.path(), "le.json", &month_indexed(3, 5));
    assert!(matches!(
        pipeline::run(&config(dir.path(), Some(9)), None),
        Err(RSIceError::Io { .. })
    ));
}

#[test]
fn stats_table_lists_every_year() {
    let dir = setup();
    let out = pipeline::run(&config(dir.path(), Some(9)), None).unwrap();
    let table = out.stats_table().unwrap();
    assert!(table.contains("# LE (September, 3 members"));
    assert!(table.contains("# SMBB (September, 2 members"));
    assert!(table.contains("1983"));
    assert_eq!(table.lines().count(), 2 * 2 + 5 + 4);
}
