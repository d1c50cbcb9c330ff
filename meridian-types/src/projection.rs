//! Conversion between geographic and projected coordinates.
//!
//! A [`Projection`] is created from a PROJ-style parameter string, e.g. `+proj=merc +lon_0=0` or
//! `+init=epsg:3857`. Geographic definitions (`+proj=latlong`, `+init=epsg:4326`) don't need any
//! engine: their coordinates are already in degrees. Everything else is delegated to the `geodesy`
//! crate.
//!
//! The geodesy context is shared by the whole process and guarded by a mutex. The lock is held only
//! while an operator is created or while a single coordinate is converted.

use std::fmt::{Debug, Display, Formatter};

use crate::error::TypesError;

/// Parameters of the geographic WGS84 coordinate system.
pub const WGS84_GEOGRAPHIC: &str = "+proj=latlong +datum=WGS84";

/// Parameters of the spherical web mercator.
pub const WEB_MERCATOR: &str =
    "+proj=merc +a=6378137 +b=6378137 +lat_ts=0.0 +lon_0=0.0 +x_0=0.0 +y_0=0 +k=1.0 +units=m +nadgrids=@null +wktext +no_defs +over";

#[derive(Clone, Copy)]
enum Kind {
    Geographic,
    #[cfg(feature = "geodesy")]
    Projected(geodesy::prelude::OpHandle),
}

/// Central meridian and false origin applied around the engine call.
///
/// The engine's mercator takes `lon_0` in the wrong unit and applies the false origin with the
/// wrong sign, so for mercator these parameters are kept out of the engine definition.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Shift {
    lon_0: f64,
    x_0: f64,
    y_0: f64,
}

#[cfg_attr(not(feature = "geodesy"), allow(dead_code))]
impl Shift {
    fn before_forward(&self, x: &mut f64) {
        if self.lon_0 != 0.0 {
            *x = normalize_longitude(*x - self.lon_0);
        }
    }

    fn after_forward(&self, x: &mut f64, y: &mut f64) {
        *x += self.x_0;
        *y += self.y_0;
    }

    fn before_inverse(&self, x: &mut f64, y: &mut f64) {
        *x -= self.x_0;
        *y -= self.y_0;
    }

    fn after_inverse(&self, x: &mut f64) {
        if self.lon_0 != 0.0 {
            *x = normalize_longitude(*x + self.lon_0);
        }
    }
}

/// Wraps the longitude into `-180..=180`.
#[cfg_attr(not(feature = "geodesy"), allow(dead_code))]
fn normalize_longitude(lon: f64) -> f64 {
    if (-180.0..=180.0).contains(&lon) {
        lon
    } else {
        (lon + 180.0).rem_euclid(360.0) - 180.0
    }
}

/// Projection created from a parameter string.
///
/// Immutable once created. Two projections are equal if their parameter strings are equal.
#[derive(Clone)]
pub struct Projection {
    params: String,
    kind: Kind,
    #[cfg_attr(not(feature = "geodesy"), allow(dead_code))]
    shift: Shift,
}

impl Projection {
    /// Creates a projection from the parameter string.
    ///
    /// Fails with [`TypesError::ProjectionInit`] if the definition is not understood.
    pub fn new(params: &str) -> Result<Self, TypesError> {
        let (kind, shift) = match translate(params)? {
            Definition::Geographic => (Kind::Geographic, Shift::default()),
            Definition::Engine(definition) => (engine_kind(params, &definition)?, Shift::default()),
            Definition::Shifted(definition, shift) => (engine_kind(params, &definition)?, shift),
        };

        Ok(Self {
            params: params.to_string(),
            kind,
            shift,
        })
    }

    /// Parameter string the projection was created from.
    pub fn params(&self) -> &str {
        &self.params
    }

    /// Always true: a projection that failed to initialize is never constructed.
    pub fn is_initialized(&self) -> bool {
        true
    }

    /// Returns true if the coordinates of this projection are longitude and latitude in degrees.
    pub fn is_geographic(&self) -> bool {
        matches!(self.kind, Kind::Geographic)
    }

    /// Converts longitude/latitude in degrees into projected coordinates in place.
    pub fn forward(&self, x: &mut f64, y: &mut f64) -> Result<(), TypesError> {
        match self.kind {
            Kind::Geographic => Ok(()),
            #[cfg(feature = "geodesy")]
            Kind::Projected(op) => {
                let (mut px, mut py) = (*x, *y);
                self.shift.before_forward(&mut px);
                engine::forward(op, &mut px, &mut py).ok_or_else(|| self.transform_error(*x, *y))?;
                self.shift.after_forward(&mut px, &mut py);
                *x = px;
                *y = py;
                Ok(())
            }
        }
    }

    /// Converts projected coordinates into longitude/latitude in degrees in place.
    pub fn inverse(&self, x: &mut f64, y: &mut f64) -> Result<(), TypesError> {
        match self.kind {
            Kind::Geographic => Ok(()),
            #[cfg(feature = "geodesy")]
            Kind::Projected(op) => {
                let (mut px, mut py) = (*x, *y);
                self.shift.before_inverse(&mut px, &mut py);
                engine::inverse(op, &mut px, &mut py).ok_or_else(|| self.transform_error(*x, *y))?;
                self.shift.after_inverse(&mut px);
                *x = px;
                *y = py;
                Ok(())
            }
        }
    }

    #[allow(dead_code)]
    fn transform_error(&self, x: f64, y: f64) -> TypesError {
        TypesError::Transform {
            params: self.params.clone(),
            x,
            y,
        }
    }
}

impl PartialEq for Projection {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params
    }
}

impl Debug for Projection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projection")
            .field("params", &self.params)
            .field("geographic", &self.is_geographic())
            .finish()
    }
}

impl Display for Projection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.params)
    }
}

#[derive(Debug, PartialEq)]
enum Definition {
    Geographic,
    Engine(String),
    /// Engine definition with the shift applied outside of the engine.
    Shifted(String, Shift),
}

/// Parameters passed through to the engine. `k` is renamed to `k_0`.
const PASSED_PARAMS: &[&str] = &[
    "lon_0", "lat_0", "lat_1", "lat_2", "lat_ts", "x_0", "y_0", "k_0", "zone", "south", "ellps",
];

/// Mercator parameters applied by [`Shift`] instead of the engine. `lat_0` has no effect on a
/// mercator.
const MERCATOR_SHIFTED: &[&str] = &["lon_0", "x_0", "y_0", "lat_0"];

fn translate(params: &str) -> Result<Definition, TypesError> {
    let trimmed = params.trim();
    if trimmed.is_empty() {
        return Err(TypesError::ProjectionInit {
            params: params.to_string(),
            reason: "empty definition".into(),
        });
    }

    let pairs: Vec<(String, Option<String>)> = trimmed
        .split_whitespace()
        .map(|token| {
            let token = token.trim_start_matches('+');
            match token.split_once('=') {
                Some((key, value)) => (key.to_lowercase(), Some(value.to_string())),
                None => (token.to_lowercase(), None),
            }
        })
        .collect();
    let get = |name: &str| {
        pairs
            .iter()
            .find(|(key, _)| key == name)
            .and_then(|(_, value)| value.as_deref())
    };

    if let Some(init) = get("init") {
        return match init.to_lowercase().as_str() {
            "epsg:4326" => Ok(Definition::Geographic),
            "epsg:3857" | "epsg:900913" | "epsg:3785" => Ok(Definition::Engine("webmerc".into())),
            other => Err(TypesError::ProjectionInit {
                params: params.to_string(),
                reason: format!("unknown init code '{other}'"),
            }),
        };
    }

    let Some(proj) = get("proj") else {
        // Not a PROJ string, hand it to the engine as is.
        return Ok(Definition::Engine(trimmed.to_string()));
    };

    let mercator = proj == "merc";
    let shift = if mercator {
        let number = |name: &str| -> Result<f64, TypesError> {
            get(name).map_or(Ok(0.0), |value| {
                value.parse().map_err(|_| TypesError::ProjectionInit {
                    params: params.to_string(),
                    reason: format!("invalid value '{value}' of '{name}'"),
                })
            })
        };
        Shift {
            lon_0: number("lon_0")?,
            x_0: number("x_0")?,
            y_0: number("y_0")?,
        }
    } else {
        Shift::default()
    };
    let with_shift = |definition: String| {
        if shift == Shift::default() {
            Definition::Engine(definition)
        } else {
            Definition::Shifted(definition, shift)
        }
    };

    match proj {
        "latlong" | "longlat" | "lonlat" | "latlon" => return Ok(Definition::Geographic),
        "merc" if get("a") == Some("6378137") && get("b") == Some("6378137") => {
            return Ok(with_shift("webmerc".into()))
        }
        _ => {}
    }

    let mut definition = proj.to_string();
    for (key, value) in &pairs {
        let key = if key == "k" { "k_0" } else { key.as_str() };
        if !PASSED_PARAMS.contains(&key) || (mercator && MERCATOR_SHIFTED.contains(&key)) {
            continue;
        }
        match value {
            Some(value) => definition.push_str(&format!(" {key}={value}")),
            None => definition.push_str(&format!(" {key}")),
        }
    }
    if get("ellps").is_none() && get("datum").is_some_and(|d| d.eq_ignore_ascii_case("wgs84")) {
        definition.push_str(" ellps=WGS84");
    }

    Ok(with_shift(definition))
}

#[cfg(feature = "geodesy")]
fn engine_kind(params: &str, definition: &str) -> Result<Kind, TypesError> {
    engine::create(definition)
        .map(Kind::Projected)
        .map_err(|reason| TypesError::ProjectionInit {
            params: params.to_string(),
            reason,
        })
}

#[cfg(not(feature = "geodesy"))]
fn engine_kind(params: &str, _definition: &str) -> Result<Kind, TypesError> {
    Err(TypesError::ProjectionInit {
        params: params.to_string(),
        reason: "only geographic coordinates are supported without the `geodesy` feature".into(),
    })
}

#[cfg(feature = "geodesy")]
mod engine {
    use ahash::HashMap;
    use geodesy::prelude::*;
    use lazy_static::lazy_static;
    use parking_lot::Mutex;

    struct ProjectionEngine {
        context: Minimal,
        operators: HashMap<String, OpHandle>,
    }

    lazy_static! {
        static ref ENGINE: Mutex<ProjectionEngine> = Mutex::new(ProjectionEngine {
            context: Minimal::new(),
            operators: HashMap::default(),
        });
    }

    pub(super) fn create(definition: &str) -> Result<OpHandle, String> {
        let mut engine = ENGINE.lock();
        if let Some(op) = engine.operators.get(definition) {
            return Ok(*op);
        }

        let op = engine.context.op(definition).map_err(|err| err.to_string())?;
        log::debug!("Created projection operator '{definition}'");
        engine.operators.insert(definition.to_string(), op);
        Ok(op)
    }

    pub(super) fn forward(op: OpHandle, x: &mut f64, y: &mut f64) -> Option<()> {
        let mut data = [Coor2D::geo(*y, *x)];
        apply(op, Fwd, &mut data)?;

        *x = data[0].0[0];
        *y = data[0].0[1];
        Some(())
    }

    pub(super) fn inverse(op: OpHandle, x: &mut f64, y: &mut f64) -> Option<()> {
        let mut data = [Coor2D([*x, *y])];
        apply(op, Inv, &mut data)?;

        *x = data[0].0[0].to_degrees();
        *y = data[0].0[1].to_degrees();
        Some(())
    }

    fn apply(op: OpHandle, direction: Direction, data: &mut [Coor2D; 1]) -> Option<()> {
        {
            let engine = ENGINE.lock();
            engine.context.apply(op, direction, data).ok()?;
        }

        if !data[0].0[0].is_finite() || !data[0].0[1].is_finite() {
            return None;
        }

        Some(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn geographic_is_identity() {
        let projection = Projection::new(WGS84_GEOGRAPHIC).unwrap();
        assert!(projection.is_geographic());
        assert!(projection.is_initialized());

        let (mut x, mut y) = (37.6, 55.7);
        projection.forward(&mut x, &mut y).unwrap();
        assert_eq!((x, y), (37.6, 55.7));
    }

    #[test]
    fn translates_proj_strings() {
        assert_eq!(
            translate("+init=epsg:4326").unwrap(),
            Definition::Geographic
        );
        assert_eq!(
            translate(WEB_MERCATOR).unwrap(),
            Definition::Engine("webmerc".into())
        );
        assert_eq!(
            translate("+proj=utm +zone=32 +datum=WGS84 +units=m").unwrap(),
            Definition::Engine("utm zone=32 ellps=WGS84".into())
        );
        assert_eq!(
            translate("+proj=tmerc +lon_0=9 +k=0.9996").unwrap(),
            Definition::Engine("tmerc lon_0=9 k_0=0.9996".into())
        );
        assert_matches!(translate("  "), Err(TypesError::ProjectionInit { .. }));
    }

    #[test]
    fn equality_by_params() {
        let a = Projection::new("+proj=latlong +datum=WGS84").unwrap();
        let b = Projection::new("+proj=latlong +datum=WGS84").unwrap();
        let c = Projection::new("+proj=longlat +datum=WGS84").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[cfg(feature = "geodesy")]
    #[test]
    fn web_mercator_round_trip() {
        let projection = Projection::new("+init=epsg:3857").unwrap();
        assert!(!projection.is_geographic());

        let (mut x, mut y) = (37.6, 55.7);
        projection.forward(&mut x, &mut y).unwrap();
        assert_abs_diff_eq!(x, 4185612.85, epsilon = 0.01);

        projection.inverse(&mut x, &mut y).unwrap();
        assert_abs_diff_eq!(x, 37.6, epsilon = 1e-9);
        assert_abs_diff_eq!(y, 55.7, epsilon = 1e-9);
    }

    #[test]
    fn mercator_origin_is_kept_out_of_the_engine() {
        assert_eq!(
            translate("+proj=merc +ellps=WGS84 +lon_0=10 +x_0=500 +lat_ts=30").unwrap(),
            Definition::Shifted(
                "merc ellps=WGS84 lat_ts=30".into(),
                Shift {
                    lon_0: 10.0,
                    x_0: 500.0,
                    y_0: 0.0
                }
            )
        );
        assert_eq!(
            translate("+proj=merc +ellps=WGS84 +k=0.5").unwrap(),
            Definition::Engine("merc ellps=WGS84 k_0=0.5".into())
        );
        assert_matches!(
            translate("+proj=merc +lon_0=east"),
            Err(TypesError::ProjectionInit { .. })
        );
    }

    #[test]
    fn longitudes_are_wrapped() {
        assert_eq!(normalize_longitude(170.0), 170.0);
        assert_abs_diff_eq!(normalize_longitude(190.0), -170.0, epsilon = 1e-12);
        assert_abs_diff_eq!(normalize_longitude(-200.0), 160.0, epsilon = 1e-12);
    }

    #[cfg(feature = "geodesy")]
    fn forward(params: &str, lon: f64, lat: f64) -> (f64, f64) {
        let projection = Projection::new(params).unwrap();
        let (mut x, mut y) = (lon, lat);
        projection.forward(&mut x, &mut y).unwrap();
        (x, y)
    }

    #[cfg(feature = "geodesy")]
    fn assert_round_trip(params: &str, lon: f64, lat: f64) {
        let projection = Projection::new(params).unwrap();
        let (mut x, mut y) = (lon, lat);
        projection.forward(&mut x, &mut y).unwrap();
        projection.inverse(&mut x, &mut y).unwrap();
        assert_abs_diff_eq!(x, lon, epsilon = 1e-8);
        assert_abs_diff_eq!(y, lat, epsilon = 1e-8);
    }

    #[cfg(feature = "geodesy")]
    #[test]
    fn ellipsoidal_mercator_round_trip() {
        for params in [
            "+proj=merc +ellps=WGS84",
            "+proj=merc +ellps=WGS84 +lon_0=10",
            "+proj=merc +ellps=WGS84 +lat_ts=30",
            "+proj=merc +ellps=WGS84 +x_0=500000 +y_0=-100000",
            "+proj=merc +ellps=WGS84 +k_0=0.9",
            "+proj=merc +ellps=WGS84 +k=0.9 +lon_0=-75 +x_0=1000",
        ] {
            assert_round_trip(params, 12.5, -33.25);
            assert_round_trip(params, 12.5, 45.25);
        }
    }

    #[cfg(feature = "geodesy")]
    #[test]
    fn mercator_parameters() {
        let plain = forward("+proj=merc +ellps=WGS84", 12.5, 45.25);

        let (x, y) = forward("+proj=merc +ellps=WGS84 +lon_0=10", 10.0, 45.25);
        assert_abs_diff_eq!(x, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(y, plain.1, epsilon = 1e-6);
        let (x, _) = forward("+proj=merc +ellps=WGS84 +lon_0=10", 12.5, 45.25);
        assert!(x > 0.0 && x < plain.0);

        let (x, y) = forward("+proj=merc +ellps=WGS84 +x_0=500000 +y_0=-100000", 12.5, 45.25);
        assert_abs_diff_eq!(x, plain.0 + 500000.0, epsilon = 1e-6);
        assert_abs_diff_eq!(y, plain.1 - 100000.0, epsilon = 1e-6);

        let (x, y) = forward("+proj=merc +ellps=WGS84 +k_0=0.5", 12.5, 45.25);
        assert_abs_diff_eq!(x, plain.0 * 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(y, plain.1 * 0.5, epsilon = 1e-6);

        let (x, _) = forward("+proj=merc +ellps=WGS84 +lat_ts=60", 12.5, 45.25);
        assert!(x < plain.0 * 0.51 && x > plain.0 * 0.49);
    }

    #[cfg(feature = "geodesy")]
    #[test]
    fn transverse_mercator_round_trip() {
        for params in [
            "+proj=tmerc +ellps=WGS84 +lon_0=9 +k=0.9996 +x_0=500000",
            "+proj=tmerc +lat_0=49 +lon_0=-2 +k_0=0.9996012717 +x_0=400000 +y_0=-100000 +ellps=airy",
            "+proj=utm +zone=32 +datum=WGS84",
        ] {
            assert_round_trip(params, 9.5, 50.25);
        }
    }

    #[cfg(feature = "geodesy")]
    #[test]
    fn unknown_projection_fails() {
        assert_matches!(
            Projection::new("+proj=no_such_projection"),
            Err(TypesError::ProjectionInit { .. })
        );
    }

    #[cfg(feature = "geodesy")]
    #[test]
    fn shared_between_threads() {
        let projection = Projection::new("+init=epsg:3857").unwrap();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let projection = projection.clone();
                std::thread::spawn(move || {
                    let lon = i as f64 * 10.0;
                    let (mut x, mut y) = (lon, 45.0);
                    projection.forward(&mut x, &mut y).unwrap();
                    projection.inverse(&mut x, &mut y).unwrap();
                    (lon, x)
                })
            })
            .collect();

        for handle in handles {
            let (expected, actual) = handle.join().unwrap();
            assert_abs_diff_eq!(expected, actual, epsilon = 1e-9);
        }
    }
}
