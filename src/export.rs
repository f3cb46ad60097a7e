use crate::core::db::{Route, SamplePoint};
use crate::scoring::ScoreBand;
use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::fs::File;
use std::path::Path;

/// Build a GeoJSON FeatureCollection for a surveyed route: one LineString
/// for the geometry plus one Point per sample with heading and illumination.
pub fn route_feature_collection(
    route: &Route,
    geometry: &[(f64, f64)],
    points: &[SamplePoint],
) -> Value {
    let coordinates: Vec<Value> = geometry
        .iter()
        .map(|&(lng, lat)| json!([lng, lat]))
        .collect();

    let mut features = vec![json!({
        "type": "Feature",
        "geometry": {
            "type": "LineString",
            "coordinates": coordinates,
        },
        "properties": {
            "name": route.name,
            "profile": route.profile,
            "distance_m": route.distance_m,
            "duration_s": route.duration_s,
            "light_score": route.light_score,
            "band": route.light_score.map(|s| ScoreBand::from_score(s).as_str()),
            "coverage": route.coverage,
        },
    })];

    for point in points {
        features.push(json!({
            "type": "Feature",
            "geometry": {
                "type": "Point",
                "coordinates": [point.position.lng, point.position.lat],
            },
            "properties": {
                "seq": point.seq,
                "heading": point.heading,
                "illumination": point.illumination,
            },
        }));
    }

    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

/// Write a GeoJSON value to a file.
pub fn write_geojson<P: AsRef<Path>>(path: P, value: &Value) -> Result<()> {
    let file = File::create(path.as_ref())
        .with_context(|| format!("Failed to create {:?}", path.as_ref()))?;
    serde_json::to_writer_pretty(file, value)
        .with_context(|| format!("Failed to write GeoJSON to {:?}", path.as_ref()))?;
    Ok(())
}
