use crate::models::GeoPoint;
use anyhow::Result;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two WGS84 points.
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Forward azimuth from `from` to `to` as an integer compass bearing.
///
/// Range is 1..=360 with 360 meaning due north: a bearing that rounds to 0
/// is reported as 360 so that "no heading" stays representable as absence.
pub fn compass_bearing(from: GeoPoint, to: GeoPoint) -> u16 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let d_lng = (to.lng - from.lng).to_radians();

    let x = d_lng.sin() * lat2.cos();
    let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lng.cos();

    let degrees = (x.atan2(y).to_degrees() + 360.0) % 360.0;
    let rounded = degrees.round() as i64 % 360;
    if rounded <= 0 { 360 } else { rounded as u16 }
}

/// A resolved route geometry with precomputed arc lengths, supporting
/// evenly spaced sampling along the path.
#[derive(Debug, Clone)]
pub struct RoutePath {
    points: Vec<GeoPoint>,
    /// cumulative[i] = distance in meters from the start to points[i].
    cumulative: Vec<f64>,
}

impl RoutePath {
    /// Build a path from provider-order (lng, lat) coordinate pairs.
    pub fn from_lnglat(coords: &[(f64, f64)]) -> Result<Self> {
        if coords.len() < 2 {
            anyhow::bail!("route geometry requires at least 2 coordinates, got {}", coords.len());
        }
        let points: Vec<GeoPoint> = coords
            .iter()
            .map(|&(lng, lat)| GeoPoint { lat, lng })
            .collect();

        let mut cumulative = Vec::with_capacity(points.len());
        cumulative.push(0.0);
        for window in points.windows(2) {
            let last = *cumulative.last().unwrap_or(&0.0);
            cumulative.push(last + haversine_m(window[0], window[1]));
        }

        Ok(Self { points, cumulative })
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn length_m(&self) -> f64 {
        *self.cumulative.last().unwrap_or(&0.0)
    }

    /// Point at a normalized arc-length fraction of the path, clamped to [0, 1].
    pub fn point_at(&self, fraction: f64) -> GeoPoint {
        let total = self.length_m();
        if total <= 0.0 {
            return self.points[0];
        }
        let target = fraction.clamp(0.0, 1.0) * total;

        let idx = match self
            .cumulative
            .iter()
            .position(|&d| d >= target)
        {
            Some(0) => return self.points[0],
            Some(i) => i,
            None => return self.points[self.points.len() - 1],
        };

        let seg_start = self.cumulative[idx - 1];
        let seg_len = self.cumulative[idx] - seg_start;
        if seg_len <= 0.0 {
            return self.points[idx];
        }
        let t = (target - seg_start) / seg_len;
        let a = self.points[idx - 1];
        let b = self.points[idx];
        GeoPoint {
            lat: a.lat + (b.lat - a.lat) * t,
            lng: a.lng + (b.lng - a.lng) * t,
        }
    }

    /// `n` evenly spaced points at fractions 0, 1/n, ..., (n-1)/n.
    pub fn sample(&self, n: usize) -> Result<Vec<GeoPoint>> {
        if n < 2 {
            anyhow::bail!("sampling requires at least 2 points, got {}", n);
        }
        Ok((0..n)
            .map(|i| self.point_at(i as f64 / n as f64))
            .collect())
    }

    /// Evenly spaced points paired with the compass bearing toward the next
    /// sample. The final point has no heading.
    pub fn sample_with_headings(&self, n: usize) -> Result<Vec<(GeoPoint, Option<u16>)>> {
        let points = self.sample(n)?;
        let mut out = Vec::with_capacity(points.len());
        for i in 0..points.len() {
            let heading = if i + 1 < points.len() {
                Some(compass_bearing(points[i], points[i + 1]))
            } else {
                None
            };
            out.push((points[i], heading));
        }
        Ok(out)
    }
}
