use anyhow::{bail, Context, Result};
use eletile::{ElevationResult, TagAction, TagPolicy};
use geojson::{Feature, GeoJson};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value as JsonValue;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::EngineArgs;

/// Counts of what happened to the records of one file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct TagSummary {
    records: u64,
    written: u64,
    void: u64,
    missing: u64,
    /// Records without a point to look up.
    skipped: u64,
}

impl TagSummary {
    fn record(&mut self, result: ElevationResult, action: &TagAction) {
        self.records += 1;
        match result {
            ElevationResult::Void => self.void += 1,
            ElevationResult::Missing => self.missing += 1,
            ElevationResult::Value(_) => {}
        }
        if matches!(action, TagAction::Write(_)) {
            self.written += 1;
        }
    }

    fn skip(&mut self) {
        self.records += 1;
        self.skipped += 1;
    }
}

impl fmt::Display for TagSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tagged {} of {} records (void: {}, missing tile: {}, no point: {})",
            self.written, self.records, self.void, self.missing, self.skipped
        )
    }
}

/// Names of the coordinate columns of a CSV file.
struct CsvColumns<'a> {
    lat: &'a str,
    lon: &'a str,
}

pub fn run(
    args: &EngineArgs,
    input: PathBuf,
    output: Option<PathBuf>,
    lat_col: &str,
    lon_col: &str,
    tag: &str,
    keep_existing: bool,
) -> Result<()> {
    let engine = args.build_engine()?;
    let policy = TagPolicy::new(tag).replace_existing(!keep_existing);
    let lookup = |lat: f64, lon: f64| engine.lookup(lat, lon);

    // Detect file format
    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let output_path = output.unwrap_or_else(|| default_output_path(&input));

    let file = File::open(&input).context("Failed to open input file")?;
    let reader = BufReader::new(file);
    let pb = progress_bar()?;

    let summary = match extension.as_str() {
        "csv" => {
            let output_file =
                File::create(&output_path).context("Failed to create output file")?;
            let columns = CsvColumns {
                lat: lat_col,
                lon: lon_col,
            };
            tag_csv(
                reader,
                BufWriter::new(output_file),
                &columns,
                &policy,
                lookup,
                &pb,
            )?
        }
        "geojson" | "json" => {
            let mut geojson: GeoJson =
                serde_json::from_reader(reader).context("Failed to parse GeoJSON")?;
            let summary = tag_geojson(&mut geojson, &policy, lookup, &pb);

            let output_file =
                File::create(&output_path).context("Failed to create output file")?;
            let mut writer = BufWriter::new(output_file);
            serde_json::to_writer_pretty(&mut writer, &geojson)?;
            writer.flush()?;
            summary
        }
        _ => bail!(
            "Unsupported file format: {}. Use .csv or .geojson",
            extension
        ),
    };
    pb.finish_with_message("done");

    tracing::info!(
        records = summary.records,
        written = summary.written,
        cache_hit_rate = engine.cache_stats().hit_rate(),
        "batch finished"
    );

    println!("Output written to: {}", output_path.display());
    println!("{}", summary);
    print!("{}", engine.missing_tiles_report());
    Ok(())
}

/// `<stem>_elevation.<ext>` next to the input.
fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    match input.extension() {
        Some(ext) => input.with_file_name(format!("{}_elevation.{}", stem, ext.to_string_lossy())),
        None => input.with_file_name(format!("{}_elevation", stem)),
    }
}

fn progress_bar() -> Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Tag every row of a CSV file, adding the tag column if it is not there.
fn tag_csv<R: Read, W: Write>(
    input: R,
    output: W,
    columns: &CsvColumns<'_>,
    policy: &TagPolicy,
    lookup: impl Fn(f64, f64) -> ElevationResult,
    pb: &ProgressBar,
) -> Result<TagSummary> {
    let mut reader = csv::Reader::from_reader(input);

    // Find column indices
    let mut headers = reader.headers()?.clone();
    let lat_idx = headers
        .iter()
        .position(|h| h == columns.lat)
        .with_context(|| format!("Column '{}' not found in CSV", columns.lat))?;
    let lon_idx = headers
        .iter()
        .position(|h| h == columns.lon)
        .with_context(|| format!("Column '{}' not found in CSV", columns.lon))?;
    let existing_tag = policy
        .find_key(headers.iter())
        .and_then(|key| headers.iter().position(|h| h == key));
    let tag_idx = match existing_tag {
        Some(idx) => idx,
        None => {
            headers.push_field(&policy.tag_name);
            headers.len() - 1
        }
    };

    // Collect records for progress bar
    let records: Vec<_> = reader.records().collect::<Result<_, _>>()?;
    pb.set_length(records.len() as u64);

    let mut writer = csv::Writer::from_writer(output);
    writer.write_record(&headers)?;

    let mut summary = TagSummary::default();
    for (row, record) in records.iter().enumerate() {
        let lat = parse_coordinate(record.get(lat_idx), "latitude", row)?;
        let lon = parse_coordinate(record.get(lon_idx), "longitude", row)?;
        let result = lookup(lat, lon);

        let mut fields: Vec<&str> = record.iter().collect();
        if fields.len() <= tag_idx {
            fields.resize(tag_idx + 1, "");
        }
        let existing = Some(fields[tag_idx]).filter(|v| !v.is_empty());
        let action = policy.decide(existing, result);
        if let TagAction::Write(value) = &action {
            fields[tag_idx] = value;
        }
        writer.write_record(&fields)?;

        summary.record(result, &action);
        pb.inc(1);
    }

    writer.flush()?;
    Ok(summary)
}

fn parse_coordinate(field: Option<&str>, name: &str, row: usize) -> Result<f64> {
    field
        .with_context(|| format!("Missing {} in row {}", name, row + 1))?
        .trim()
        .parse()
        .with_context(|| format!("Invalid {} in row {}", name, row + 1))
}

/// Tag every point feature of a GeoJSON document.
///
/// Features whose geometry is not a point pass through untouched, as does a
/// bare geometry.
fn tag_geojson(
    geojson: &mut GeoJson,
    policy: &TagPolicy,
    lookup: impl Fn(f64, f64) -> ElevationResult,
    pb: &ProgressBar,
) -> TagSummary {
    let mut summary = TagSummary::default();
    match geojson {
        GeoJson::Geometry(_) => {}
        GeoJson::Feature(feature) => {
            pb.set_length(1);
            tag_feature(feature, policy, &lookup, &mut summary);
            pb.inc(1);
        }
        GeoJson::FeatureCollection(fc) => {
            pb.set_length(fc.features.len() as u64);
            for feature in &mut fc.features {
                tag_feature(feature, policy, &lookup, &mut summary);
                pb.inc(1);
            }
        }
    }
    summary
}

fn tag_feature(
    feature: &mut Feature,
    policy: &TagPolicy,
    lookup: &impl Fn(f64, f64) -> ElevationResult,
    summary: &mut TagSummary,
) {
    let Some((lat, lon)) = point_of(feature) else {
        summary.skip();
        return;
    };
    let result = lookup(lat, lon);

    let key = feature
        .properties
        .as_ref()
        .and_then(|properties| policy.find_key(properties.keys().map(String::as_str)))
        .unwrap_or(&policy.tag_name)
        .to_string();
    let existing = feature.property(&key).and_then(|value| match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    });

    let action = policy.decide(existing.as_deref(), result);
    if let TagAction::Write(value) = &action {
        feature.set_property(key, value.clone());
    }
    summary.record(result, &action);
}

/// `(lat, lon)` of a point feature.
fn point_of(feature: &Feature) -> Option<(f64, f64)> {
    match &feature.geometry.as_ref()?.value {
        geojson::Value::Point(pos) if pos.len() >= 2 => Some((pos[1], pos[0])),
        _ => None,
    }
}
