use anyhow::Result;
use eletile::ElevationResult;
use serde::Serialize;

use crate::EngineArgs;

#[derive(Serialize)]
struct ElevationResponse {
    lat: f64,
    lon: f64,
    elevation: Option<f64>,
    status: &'static str,
}

impl ElevationResponse {
    fn new(lat: f64, lon: f64, result: ElevationResult) -> Self {
        let status = match result {
            ElevationResult::Value(_) => "ok",
            ElevationResult::Void => "void",
            ElevationResult::Missing => "missing",
        };
        Self {
            lat,
            lon,
            elevation: result.value(),
            status,
        }
    }
}

pub fn run(args: &EngineArgs, lat: f64, lon: f64, json: bool) -> Result<()> {
    let engine = args.build_engine()?;
    let result = engine.lookup(lat, lon);

    if json {
        let response = ElevationResponse::new(lat, lon, result);
        println!("{}", serde_json::to_string(&response)?);
    } else {
        println!("{}", result);
    }

    if result.is_missing() {
        eprint!("{}", engine.missing_tiles_report());
    }

    Ok(())
}
