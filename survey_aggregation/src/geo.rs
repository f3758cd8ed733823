//! Turning free-text coordinate answers into points that can be drawn.

use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::config::{GeoPoint, ResponseRecord};

/// Points sharing a location at this many decimals (~0.11 m) are considered overlapping.
pub const LOCATION_KEY_DECIMALS: i32 = 6;

/// Maximum offset, in degrees, applied to each axis of an overlapping point.
pub const JITTER_DEGREES: f64 = 0.00005;

/// A coordinate answer as delivered by the map endpoint.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct CoordinateAnswer {
    pub survey_id: Option<u64>,
    /// Expected to read "lat,lng".
    pub value: Option<String>,
}

/// Why a coordinate answer was left out of the map.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum RejectReason {
    MissingSurveyId,
    MissingValue,
    MissingSeparator,
    Unparseable,
    OutOfRange,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RejectedAnswer {
    pub index: usize,
    pub survey_id: Option<u64>,
    pub reason: RejectReason,
}

#[derive(PartialEq, Debug, Clone, Default)]
pub struct NormalizedCoordinates {
    pub points: Vec<GeoPoint>,
    pub rejected: Vec<RejectedAnswer>,
}

fn fold(s: &str) -> String {
    s.trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Questions whose answers hold a location ("Coordenadas GPS", "Ubicación de la vivienda").
pub fn is_coordinate_question(question: &str) -> bool {
    let q = fold(question);
    q.contains("coordenada") || q.contains("ubicaci")
}

/// The coordinate answers found among loaded records.
///
/// With `answered`, only the surveys that gave that answer to that question are kept. Both are
/// compared without regard to case or accents.
pub fn coordinate_answers(
    records: &[ResponseRecord],
    answered: Option<(&str, &str)>,
) -> Vec<CoordinateAnswer> {
    let allowed: Option<HashSet<u64>> = answered.map(|(question, answer)| {
        let (question, answer) = (fold(question), fold(answer));
        records
            .iter()
            .filter(|r| fold(&r.question) == question && fold(&r.answer) == answer)
            .filter_map(|r| r.survey_id)
            .collect()
    });
    let res: Vec<CoordinateAnswer> = records
        .iter()
        .filter(|r| is_coordinate_question(&r.question))
        .filter(|r| match (&allowed, r.survey_id) {
            (None, _) => true,
            (Some(ids), Some(id)) => ids.contains(&id),
            (Some(_), None) => false,
        })
        .map(|r| CoordinateAnswer {
            survey_id: r.survey_id,
            value: Some(r.answer.clone()),
        })
        .collect();
    debug!(
        "coordinate_answers: {:?} coordinate answers among {:?} records",
        res.len(),
        records.len()
    );
    res
}

/// Parses "lat,lng". Only the first comma separates: "1,2,3" reads "2,3" as the longitude
/// and fails.
pub fn parse_coordinate(survey_id: u64, value: &str) -> Result<GeoPoint, RejectReason> {
    let (lat_s, lng_s) = value.split_once(',').ok_or(RejectReason::MissingSeparator)?;
    let latitude = lat_s
        .trim()
        .parse::<f64>()
        .map_err(|_| RejectReason::Unparseable)?;
    let longitude = lng_s
        .trim()
        .parse::<f64>()
        .map_err(|_| RejectReason::Unparseable)?;
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err(RejectReason::Unparseable);
    }
    GeoPoint::new(survey_id, latitude, longitude).ok_or(RejectReason::OutOfRange)
}

/// Keeps the answers that hold a valid coordinate. Nothing here fails: bad answers are
/// listed in `rejected` and otherwise ignored.
pub fn normalize_coordinates(answers: &[CoordinateAnswer]) -> NormalizedCoordinates {
    let mut res = NormalizedCoordinates::default();
    for (index, a) in answers.iter().enumerate() {
        let parsed = match (a.survey_id, a.value.as_deref()) {
            (None, _) => Err(RejectReason::MissingSurveyId),
            (Some(_), None) => Err(RejectReason::MissingValue),
            (Some(id), Some(v)) => parse_coordinate(id, v),
        };
        match parsed {
            Ok(p) => res.points.push(p),
            Err(reason) => {
                debug!(
                    "normalize_coordinates: answer {:?} (survey {:?}, value {:?}) rejected: {:?}",
                    index, a.survey_id, a.value, reason
                );
                res.rejected.push(RejectedAnswer {
                    index,
                    survey_id: a.survey_id,
                    reason,
                });
            }
        }
    }
    if !res.rejected.is_empty() {
        warn!(
            "normalize_coordinates: {:?} of {:?} coordinate answers could not be used",
            res.rejected.len(),
            answers.len()
        );
    }
    res
}

/// A point ready to be drawn. Possibly moved a little from its recorded position, so it is a
/// distinct type from [`GeoPoint`] and never goes back into the data.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct DisplayPoint {
    pub survey_id: u64,
    pub latitude: f64,
    pub longitude: f64,
    pub jittered: bool,
}

impl From<&GeoPoint> for DisplayPoint {
    fn from(p: &GeoPoint) -> Self {
        DisplayPoint {
            survey_id: p.survey_id(),
            latitude: p.latitude(),
            longitude: p.longitude(),
            jittered: false,
        }
    }
}

fn location_key(p: &GeoPoint) -> (i64, i64) {
    let factor = 10f64.powi(LOCATION_KEY_DECIMALS);
    (
        (p.latitude() * factor).round() as i64,
        (p.longitude() * factor).round() as i64,
    )
}

fn random_offset<R: Rng + ?Sized>(rng: &mut R) -> (f64, f64) {
    loop {
        let d_lat = rng.gen_range(-JITTER_DEGREES..=JITTER_DEGREES);
        let d_lng = rng.gen_range(-JITTER_DEGREES..=JITTER_DEGREES);
        if d_lat != 0.0 || d_lng != 0.0 {
            return (d_lat, d_lng);
        }
    }
}

// An offset that would leave [-limit, limit] is applied the other way.
fn shift_within(value: f64, offset: f64, limit: f64) -> f64 {
    let moved = value + offset;
    if moved.abs() > limit {
        value - offset
    } else {
        moved
    }
}

/// Spreads points recorded at the same location so each survey stays clickable.
///
/// The first point seen at a location is left where it is; every later one gets an
/// independent offset of at most [`JITTER_DEGREES`] on each axis. Output order follows input.
pub fn jitter_overlapping<R: Rng + ?Sized>(points: &[GeoPoint], rng: &mut R) -> Vec<DisplayPoint> {
    let mut seen: HashSet<(i64, i64)> = HashSet::new();
    let mut moved = 0;
    let res: Vec<DisplayPoint> = points
        .iter()
        .map(|p| {
            let mut dp = DisplayPoint::from(p);
            if !seen.insert(location_key(p)) {
                let (d_lat, d_lng) = random_offset(rng);
                dp.latitude = shift_within(dp.latitude, d_lat, 90.0);
                dp.longitude = shift_within(dp.longitude, d_lng, 180.0);
                dp.jittered = true;
                moved += 1;
            }
            dp
        })
        .collect();
    info!(
        "jitter_overlapping: {:?} points, {:?} locations, {:?} moved",
        points.len(),
        seen.len(),
        moved
    );
    res
}

/// [`jitter_overlapping`] with a reproducible generator.
pub fn jitter_overlapping_seeded(points: &[GeoPoint], seed: u64) -> Vec<DisplayPoint> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    jitter_overlapping(points, &mut rng)
}
