//! Map layers built from display points: pins, proximity clusters, or a heat field.
//!
//! The layers are plain descriptors. Drawing them is left to a [`MapRenderer`], so no tile or
//! cluster library leaks into this crate.

use log::{debug, info};
use std::collections::HashMap;
use std::f64::consts::PI;

use crate::geo::DisplayPoint;

/// Initial view when there is nothing to fit: La Plata.
pub const DEFAULT_CENTER: (f64, f64) = (-34.9215, -57.9545);
pub const DEFAULT_ZOOM: u8 = 13;
pub const MAX_ZOOM: u8 = 19;
/// Extra margin around the points when fitting the view, as a fraction of each side.
pub const FIT_PADDING: f64 = 0.1;

const TILE_SIZE: f64 = 256.0;

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct LatLngBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl LatLngBounds {
    /// The smallest box holding all the points, or `None` for no points.
    pub fn from_points<'a, I>(points: I) -> Option<LatLngBounds>
    where
        I: IntoIterator<Item = &'a DisplayPoint>,
    {
        let mut res: Option<LatLngBounds> = None;
        for p in points {
            res = Some(match res {
                None => LatLngBounds {
                    south: p.latitude,
                    west: p.longitude,
                    north: p.latitude,
                    east: p.longitude,
                },
                Some(b) => LatLngBounds {
                    south: b.south.min(p.latitude),
                    west: b.west.min(p.longitude),
                    north: b.north.max(p.latitude),
                    east: b.east.max(p.longitude),
                },
            });
        }
        res
    }

    /// Grows the box by `ratio` of its height and width on every side.
    pub fn pad(&self, ratio: f64) -> LatLngBounds {
        let d_lat = (self.north - self.south).abs() * ratio;
        let d_lng = (self.east - self.west).abs() * ratio;
        LatLngBounds {
            south: self.south - d_lat,
            west: self.west - d_lng,
            north: self.north + d_lat,
            east: self.east + d_lng,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct ClusterOptions {
    /// Points closer than this many screen pixels at the current zoom share a cluster.
    pub radius_px: f64,
    /// From this zoom on, every point is drawn on its own.
    pub disable_clustering_at_zoom: u8,
    /// Clusters up to this size list their surveys when clicked; bigger ones zoom in.
    pub max_expanded: usize,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        ClusterOptions {
            radius_px: 80.0,
            disable_clustering_at_zoom: 18,
            max_expanded: 5,
        }
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct HeatOptions {
    /// The same weight for every point.
    pub intensity: f64,
}

impl Default for HeatOptions {
    fn default() -> Self {
        HeatOptions { intensity: 1.0 }
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum MapMode {
    Pins,
    Clusters(ClusterOptions),
    Heat(HeatOptions),
}

impl MapMode {
    pub fn kind(&self) -> MapModeKind {
        match self {
            MapMode::Pins => MapModeKind::Pins,
            MapMode::Clusters(_) => MapModeKind::Clusters,
            MapMode::Heat(_) => MapModeKind::Heat,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum MapModeKind {
    Pins,
    Clusters,
    Heat,
}

impl MapModeKind {
    pub fn parse(s: &str) -> Option<MapModeKind> {
        match s.to_lowercase().as_str() {
            "pins" => Some(MapModeKind::Pins),
            "clusters" => Some(MapModeKind::Clusters),
            "heat" => Some(MapModeKind::Heat),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MapModeKind::Pins => "pins",
            MapModeKind::Clusters => "clusters",
            MapModeKind::Heat => "heat",
        }
    }
}

/// A clickable marker for one survey.
#[derive(PartialEq, Debug, Clone)]
pub struct Pin {
    pub survey_id: u64,
    pub latitude: f64,
    pub longitude: f64,
    pub popup: String,
}

impl From<&DisplayPoint> for Pin {
    fn from(p: &DisplayPoint) -> Self {
        Pin {
            survey_id: p.survey_id,
            latitude: p.latitude,
            longitude: p.longitude,
            popup: format!(
                "Encuesta ID: {}\nLatitud: {}\nLongitud: {}",
                p.survey_id, p.latitude, p.longitude
            ),
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct Cluster {
    /// Mean position of the members.
    pub latitude: f64,
    pub longitude: f64,
    pub survey_ids: Vec<u64>,
    pub bounds: LatLngBounds,
}

/// What clicking a cluster does. Spiderfying is never used.
#[derive(PartialEq, Debug, Clone)]
pub enum ClusterClick {
    Expand(Vec<u64>),
    ZoomTo(LatLngBounds),
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.survey_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.survey_ids.is_empty()
    }

    pub fn on_click(&self, options: &ClusterOptions) -> ClusterClick {
        if self.len() <= options.max_expanded {
            ClusterClick::Expand(self.survey_ids.clone())
        } else {
            ClusterClick::ZoomTo(self.bounds)
        }
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct HeatPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub intensity: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub enum MapLayer {
    Pins(Vec<Pin>),
    /// Points that ended up alone are drawn as ordinary pins.
    Clusters {
        clusters: Vec<Cluster>,
        singles: Vec<Pin>,
    },
    Heat(Vec<HeatPoint>),
}

impl MapLayer {
    pub fn kind(&self) -> MapModeKind {
        match self {
            MapLayer::Pins(_) => MapModeKind::Pins,
            MapLayer::Clusters { .. } => MapModeKind::Clusters,
            MapLayer::Heat(_) => MapModeKind::Heat,
        }
    }
}

pub fn project_pins(points: &[DisplayPoint]) -> Vec<Pin> {
    points.iter().map(Pin::from).collect()
}

pub fn project_heat(points: &[DisplayPoint], options: &HeatOptions) -> Vec<HeatPoint> {
    points
        .iter()
        .map(|p| HeatPoint {
            latitude: p.latitude,
            longitude: p.longitude,
            intensity: options.intensity,
        })
        .collect()
}

/// Web Mercator position in screen pixels at the given zoom.
fn to_pixels(latitude: f64, longitude: f64, zoom: u8) -> (f64, f64) {
    let scale = TILE_SIZE * 2f64.powi(zoom as i32);
    // Mercator is undefined at the poles.
    let lat = latitude.clamp(-85.051_128_78, 85.051_128_78).to_radians();
    let x = (longitude + 180.0) / 360.0 * scale;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * scale;
    (x, y)
}

// Work state of a cluster while grouping: the position of its first member anchors it.
struct ClusterSeed {
    anchor: (f64, f64),
    members: Vec<usize>,
}

/// Greedy proximity clustering in screen space.
///
/// Points are visited in order; each joins the first existing cluster whose anchor is within
/// the radius, or starts a new one. Candidate clusters are found through a grid of
/// radius-sized cells.
pub fn project_clusters(points: &[DisplayPoint], zoom: u8, options: &ClusterOptions) -> MapLayer {
    if zoom >= options.disable_clustering_at_zoom || options.radius_px <= 0.0 {
        debug!(
            "project_clusters: zoom {:?} at or past {:?}, no clustering",
            zoom, options.disable_clustering_at_zoom
        );
        return MapLayer::Clusters {
            clusters: Vec::new(),
            singles: project_pins(points),
        };
    }

    let radius = options.radius_px;
    let radius_sq = radius * radius;
    let cell_of = |(x, y): (f64, f64)| ((x / radius).floor() as i64, (y / radius).floor() as i64);

    let mut seeds: Vec<ClusterSeed> = Vec::new();
    let mut grid: HashMap<(i64, i64), Vec<usize>> = HashMap::new();

    for (idx, p) in points.iter().enumerate() {
        let px = to_pixels(p.latitude, p.longitude, zoom);
        let (cx, cy) = cell_of(px);
        let mut found: Option<usize> = None;
        for gx in (cx - 1)..=(cx + 1) {
            for gy in (cy - 1)..=(cy + 1) {
                if let Some(candidates) = grid.get(&(gx, gy)) {
                    for &sid in candidates {
                        let (ax, ay) = seeds[sid].anchor;
                        let d_sq = (ax - px.0).powi(2) + (ay - px.1).powi(2);
                        // Lowest seed id first keeps the result independent of cell order.
                        if d_sq <= radius_sq && found.map_or(true, |f| sid < f) {
                            found = Some(sid);
                        }
                    }
                }
            }
        }
        match found {
            Some(sid) => seeds[sid].members.push(idx),
            None => {
                grid.entry((cx, cy)).or_default().push(seeds.len());
                seeds.push(ClusterSeed {
                    anchor: px,
                    members: vec![idx],
                });
            }
        }
    }

    let mut clusters: Vec<Cluster> = Vec::new();
    let mut singles: Vec<Pin> = Vec::new();
    for seed in seeds {
        if seed.members.len() == 1 {
            singles.push(Pin::from(&points[seed.members[0]]));
            continue;
        }
        let members: Vec<&DisplayPoint> = seed.members.iter().map(|&i| &points[i]).collect();
        let n = members.len() as f64;
        let bounds = match LatLngBounds::from_points(members.iter().copied()) {
            Some(b) => b,
            None => continue,
        };
        clusters.push(Cluster {
            latitude: members.iter().map(|p| p.latitude).sum::<f64>() / n,
            longitude: members.iter().map(|p| p.longitude).sum::<f64>() / n,
            survey_ids: members.iter().map(|p| p.survey_id).collect(),
            bounds,
        });
    }
    info!(
        "project_clusters: {:?} points at zoom {:?}: {:?} clusters, {:?} single pins",
        points.len(),
        zoom,
        clusters.len(),
        singles.len()
    );
    MapLayer::Clusters { clusters, singles }
}

pub fn project_layer(points: &[DisplayPoint], mode: &MapMode, zoom: u8) -> MapLayer {
    match mode {
        MapMode::Pins => MapLayer::Pins(project_pins(points)),
        MapMode::Clusters(options) => project_clusters(points, zoom, options),
        MapMode::Heat(options) => MapLayer::Heat(project_heat(points, options)),
    }
}

/// Where the map is looking.
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum Viewport {
    Centered { center: (f64, f64), zoom: u8 },
    Fitted(LatLngBounds),
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport::Centered {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
        }
    }
}

/// The drawing side of the map, implemented by whatever library shows the tiles.
pub trait MapRenderer {
    /// Removes everything drawn for the given mode.
    fn teardown(&mut self, mode: MapModeKind);
    fn draw(&mut self, layer: &MapLayer);
    fn set_view(&mut self, viewport: Viewport);
}

/// Keeps exactly one layer on the map at a time.
pub struct MapController<R: MapRenderer> {
    renderer: R,
    active: Option<MapModeKind>,
    viewport: Viewport,
}

impl<R: MapRenderer> MapController<R> {
    pub fn new(mut renderer: R) -> MapController<R> {
        let viewport = Viewport::default();
        renderer.set_view(viewport);
        MapController {
            renderer,
            active: None,
            viewport,
        }
    }

    pub fn active_mode(&self) -> Option<MapModeKind> {
        self.active
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }

    /// Tears down the current layer, draws the new one, then fits the view to the points.
    pub fn show(&mut self, points: &[DisplayPoint], mode: &MapMode, zoom: u8) -> MapLayer {
        self.clear();
        let layer = project_layer(points, mode, zoom);
        self.renderer.draw(&layer);
        self.active = Some(layer.kind());
        self.viewport = match LatLngBounds::from_points(points) {
            Some(b) => Viewport::Fitted(b.pad(FIT_PADDING)),
            None => Viewport::default(),
        };
        self.renderer.set_view(self.viewport);
        layer
    }

    pub fn clear(&mut self) {
        if let Some(kind) = self.active.take() {
            debug!("MapController: tearing down {:?}", kind);
            self.renderer.teardown(kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: u64, latitude: f64, longitude: f64) -> DisplayPoint {
        DisplayPoint {
            survey_id: id,
            latitude,
            longitude,
            jittered: false,
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl MapRenderer for Recorder {
        fn teardown(&mut self, mode: MapModeKind) {
            self.events.push(format!("teardown {}", mode.label()));
        }
        fn draw(&mut self, layer: &MapLayer) {
            self.events.push(format!("draw {}", layer.kind().label()));
        }
        fn set_view(&mut self, _viewport: Viewport) {
            self.events.push("view".to_string());
        }
    }

    #[test]
    fn pins_carry_survey_ids() {
        let pins = project_pins(&[point(7, -34.9, -57.9)]);
        assert_eq!(pins[0].survey_id, 7);
        assert!(pins[0].popup.contains("Encuesta ID: 7"));
    }

    #[test]
    fn close_points_cluster_below_the_zoom_threshold() {
        let points = vec![
            point(1, -34.9215, -57.9545),
            point(2, -34.9216, -57.9546),
            point(3, -34.9217, -57.9544),
            // About 60 km away.
            point(4, -34.6, -58.4),
        ];
        let options = ClusterOptions::default();
        match project_clusters(&points, 10, &options) {
            MapLayer::Clusters { clusters, singles } => {
                assert_eq!(clusters.len(), 1);
                assert_eq!(clusters[0].survey_ids, vec![1, 2, 3]);
                assert_eq!(singles.len(), 1);
                assert_eq!(singles[0].survey_id, 4);
            }
            other => panic!("unexpected layer {:?}", other),
        }
        match project_clusters(&points, 18, &options) {
            MapLayer::Clusters { clusters, singles } => {
                assert!(clusters.is_empty());
                assert_eq!(singles.len(), 4);
            }
            other => panic!("unexpected layer {:?}", other),
        }
    }

    #[test]
    fn small_clusters_expand_large_ones_zoom() {
        let options = ClusterOptions::default();
        let points: Vec<DisplayPoint> = (0..8)
            .map(|i| point(i, -34.9215 + i as f64 * 0.00001, -57.9545))
            .collect();
        let small = match project_clusters(&points[..5], 12, &options) {
            MapLayer::Clusters { clusters, .. } => clusters,
            other => panic!("unexpected layer {:?}", other),
        };
        assert_eq!(
            small[0].on_click(&options),
            ClusterClick::Expand(vec![0, 1, 2, 3, 4])
        );
        let large = match project_clusters(&points, 12, &options) {
            MapLayer::Clusters { clusters, .. } => clusters,
            other => panic!("unexpected layer {:?}", other),
        };
        assert_eq!(large[0].len(), 8);
        assert!(matches!(large[0].on_click(&options), ClusterClick::ZoomTo(_)));
    }

    #[test]
    fn heat_has_uniform_intensity() {
        let heat = project_heat(
            &[point(1, 1.0, 1.0), point(2, 2.0, 2.0)],
            &HeatOptions { intensity: 0.5 },
        );
        assert!(heat.iter().all(|h| h.intensity == 0.5));
    }

    #[test]
    fn bounds_and_padding() {
        let points = vec![point(1, -35.0, -58.0), point(2, -34.0, -57.0)];
        let b = LatLngBounds::from_points(&points).unwrap();
        assert_eq!((b.south, b.west, b.north, b.east), (-35.0, -58.0, -34.0, -57.0));
        let p = b.pad(0.5);
        assert_eq!((p.south, p.west, p.north, p.east), (-35.5, -58.5, -33.5, -56.5));
        assert_eq!(b.center(), (-34.5, -57.5));
        assert_eq!(p.center(), b.center());
        assert!(LatLngBounds::from_points(&[]).is_none());
    }

    #[test]
    fn switching_modes_tears_down_first() {
        let points = vec![point(1, -34.9, -57.9), point(2, -34.8, -57.8)];
        let mut map = MapController::new(Recorder::default());
        map.show(&points, &MapMode::Pins, DEFAULT_ZOOM);
        map.show(&points, &MapMode::Heat(HeatOptions::default()), DEFAULT_ZOOM);
        assert_eq!(map.active_mode(), Some(MapModeKind::Heat));
        assert!(matches!(map.viewport(), Viewport::Fitted(_)));
        assert_eq!(
            map.into_renderer().events,
            vec![
                "view",
                "draw pins",
                "view",
                "teardown pins",
                "draw heat",
                "view"
            ]
        );
    }

    #[test]
    fn empty_map_keeps_the_default_view() {
        let mut map = MapController::new(Recorder::default());
        map.show(&[], &MapMode::Pins, DEFAULT_ZOOM);
        assert_eq!(map.viewport(), Viewport::default());
        assert_eq!(map.renderer().events, vec!["view", "draw pins", "view"]);
        map.clear();
        assert_eq!(map.active_mode(), None);
        assert_eq!(
            map.renderer().events,
            vec!["view", "draw pins", "view", "teardown pins"]
        );
    }
}
