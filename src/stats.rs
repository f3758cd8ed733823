use log::{debug, info, warn};
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use survey_aggregation::builder::Builder;
use survey_aggregation::facets::{chart_buckets, compute_facets, ChartBuckets, Facets};
use survey_aggregation::geo::{
    coordinate_answers, jitter_overlapping_seeded, normalize_coordinates, CoordinateAnswer,
    NormalizedCoordinates, RejectReason,
};
use survey_aggregation::map::*;
use survey_aggregation::request::FilterRequest;
use survey_aggregation::store::{InMemorySource, ResponseStore};
use survey_aggregation::table::{SortColumn, SortDirection, TablePage, TableView, DEFAULT_PAGE_SIZE};
use survey_aggregation::*;

use crate::args::Args;
use crate::stats::config_reader::*;
use crate::stats::io_backend::{BackendClient, DEFAULT_TIMEOUT_SECONDS};

mod config_reader;
mod io_backend;
mod io_common;
mod io_csv;
mod io_json;
mod io_xlsx;
mod wire;

#[derive(Debug, Snafu)]
pub enum ReportError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading CSV line {lineno}"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Missing column {column} in {path}"))]
    MissingColumn { column: String, path: String },
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("No worksheet to read in {path}"))]
    EmptyExcel { path: String },
    #[snafu(display("Unexpected cell at line {lineno}, column {column}: {content}"))]
    ExcelWrongCellType {
        lineno: usize,
        column: usize,
        content: String,
    },
    #[snafu(display("Request to {url} failed"))]
    Http { source: reqwest::Error, url: String },
    #[snafu(display("Could not start the HTTP runtime"))]
    Runtime { source: std::io::Error },
    #[snafu(display("Loading the responses failed"))]
    Fetch { source: FetchError },
    #[snafu(display("Invalid configuration: {message}"))]
    InvalidConfig { message: String },
    #[snafu(display("Error writing the report to {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("The report differs from the reference {path}"))]
    ReferenceMismatch { path: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

type ReportResult<T> = Result<T, ReportError>;
type BReportResult<T> = Result<T, Box<ReportError>>;

const PROVIDERS: [&str; 4] = ["backend", "json", "csv", "xlsx"];

// ********* Configuration checks *********

fn validate_source(source: &SourceSettings) -> ReportResult<()> {
    match source.provider.as_str() {
        "backend" if source.url.is_none() => {
            whatever!("The backend provider requires a url")
        }
        "json" | "csv" | "xlsx" if source.file_path.is_none() => {
            whatever!("The {} provider requires a filePath", source.provider)
        }
        p if PROVIDERS.contains(&p) => Ok(()),
        p => {
            whatever!("Unknown provider {:?}: expected one of {:?}", p, PROVIDERS)
        }
    }
}

fn validate_filters(filters: &FilterSettings) -> ReportResult<FilterRequest> {
    if let (Some(from), Some(to)) = (filters.edad_desde, filters.edad_hasta) {
        if from > to {
            whatever!("edadDesde ({}) is greater than edadHasta ({})", from, to)
        }
    }
    let mut builder = Builder::new();
    for c in filters.filtros_multiples.iter().flatten() {
        builder = match builder.clause(&c.categoria, &c.pregunta, &c.respuesta) {
            Ok(b) => b,
            Err(e) => {
                whatever!("Invalid filtrosMultiples: {}", e)
            }
        };
    }
    let request = FilterRequest {
        category: filters.categoria.clone(),
        question: filters.pregunta.clone(),
        answer_type: filters.tipo_respuesta.clone(),
        age_from: filters.edad_desde,
        age_to: filters.edad_hasta,
        clauses: builder.build(),
    };
    Ok(request.normalized())
}

fn validate_table(table: &TableSettings) -> ReportResult<TableView> {
    let page_size = match table.page_size {
        Some(0) => {
            whatever!("pageSize must be at least 1")
        }
        Some(x) => x,
        None => DEFAULT_PAGE_SIZE,
    };
    let mut view = TableView::new(page_size);
    if let Some(term) = &table.search {
        view.set_search(term);
    }
    if let Some(column) = &table.sort_column {
        let column = match SortColumn::parse(column) {
            Some(c) => c,
            None => {
                whatever!("Cannot sort on column {:?}", column)
            }
        };
        let direction = match table.sort_direction.as_deref() {
            None | Some("asc") | Some("ascending") => SortDirection::Ascending,
            Some("desc") | Some("descending") => SortDirection::Descending,
            Some(x) => {
                whatever!("Unknown sort direction {:?}", x)
            }
        };
        view.set_sort(column, direction);
    }
    // Last: the other settings go back to the first page.
    if let Some(page) = table.page {
        view.set_page(page);
    }
    Ok(view)
}

/// How to build the map layer of the report.
#[derive(PartialEq, Debug, Clone)]
struct MapPlan {
    mode: MapMode,
    zoom: u8,
    jitter_seed: u64,
    answered: Option<(String, String)>,
}

impl MapPlan {
    fn answered(&self) -> Option<(&str, &str)> {
        self.answered
            .as_ref()
            .map(|(q, a)| (q.as_str(), a.as_str()))
    }
}

fn validate_map(map: &MapSettings) -> ReportResult<MapPlan> {
    let mode = match MapModeKind::parse(&map.mode) {
        Some(MapModeKind::Pins) => MapMode::Pins,
        Some(MapModeKind::Clusters) => {
            let defaults = ClusterOptions::default();
            let radius_px = map.cluster_radius.unwrap_or(defaults.radius_px);
            if !(radius_px.is_finite() && radius_px > 0.0) {
                whatever!("clusterRadius must be a positive number, got {}", radius_px)
            }
            MapMode::Clusters(ClusterOptions {
                radius_px,
                disable_clustering_at_zoom: map
                    .disable_clustering_at_zoom
                    .unwrap_or(defaults.disable_clustering_at_zoom),
                max_expanded: map.max_expanded_cluster.unwrap_or(defaults.max_expanded),
            })
        }
        Some(MapModeKind::Heat) => MapMode::Heat(HeatOptions {
            intensity: map
                .heat_intensity
                .unwrap_or_else(|| HeatOptions::default().intensity),
        }),
        None => {
            whatever!(
                "Unknown map mode {:?}: expected pins, clusters or heat",
                map.mode
            )
        }
    };
    let zoom = map.zoom.unwrap_or(DEFAULT_ZOOM);
    if zoom > MAX_ZOOM {
        whatever!("zoom must be at most {}, got {}", MAX_ZOOM, zoom)
    }
    let answered = match (&map.coordinate_question, &map.coordinate_answer) {
        (Some(q), Some(a)) => Some((q.clone(), a.clone())),
        (None, None) => None,
        _ => {
            whatever!("coordinateQuestion and coordinateAnswer go together")
        }
    };
    Ok(MapPlan {
        mode,
        zoom,
        jitter_seed: map.jitter_seed.unwrap_or(0),
        answered,
    })
}

// ********* Loading *********

struct LoadedData {
    available: bool,
    total_answers: u64,
    snapshot: Arc<[ResponseRecord]>,
    coordinates: Vec<CoordinateAnswer>,
}

fn read_local_records(root: &Path, source: &SourceSettings) -> BReportResult<Vec<ResponseRecord>> {
    let file_path = source.file_path.as_ref().context(InvalidConfigSnafu {
        message: format!("the {} provider requires a filePath", source.provider),
    })?;
    let p: PathBuf = root.join(file_path);
    let p2 = p.as_path().display().to_string();
    info!("Attempting to read responses from {:?}", p2);
    match source.provider.as_str() {
        "json" => io_json::read_json_records(p2),
        "csv" => io_csv::read_csv_records(p2),
        "xlsx" => io_xlsx::read_xlsx_records(p2, source.worksheet_name.clone()),
        x => Err(Box::new(ReportError::InvalidConfig {
            message: format!("{:?} is not a file provider", x),
        })),
    }
}

fn load_data(
    root: &Path,
    source: &SourceSettings,
    request: &FilterRequest,
    map: Option<&MapPlan>,
) -> BReportResult<LoadedData> {
    let mut store = ResponseStore::new();
    let answered = map.and_then(|m| m.answered());

    if source.provider == "backend" {
        let url = source.url.as_deref().context(InvalidConfigSnafu {
            message: "the backend provider requires a url",
        })?;
        let timeout =
            Duration::from_secs(source.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS));
        let client = BackendClient::new(url, timeout)?;
        let existence = client.data_exists()?;
        if !existence.existen_datos {
            warn!("load_data: the backend holds no answers, producing an empty report");
            return Ok(LoadedData {
                available: false,
                total_answers: existence.total_respuestas,
                snapshot: store.snapshot(),
                coordinates: Vec::new(),
            });
        }
        let update = store.load(&client, request).context(FetchSnafu {})?;
        debug!("load_data: {:?}", update);
        let coordinates: Vec<CoordinateAnswer> = match map {
            Some(_) => client
                .coordinates(answered)?
                .into_iter()
                .map(CoordinateAnswer::from)
                .collect(),
            None => Vec::new(),
        };
        return Ok(LoadedData {
            available: true,
            total_answers: existence.total_respuestas,
            snapshot: store.snapshot(),
            coordinates,
        });
    }

    let source = InMemorySource::new(read_local_records(root, source)?);
    let update = store.load(&source, request).context(FetchSnafu {})?;
    debug!("load_data: {:?}", update);
    let coordinates = match map {
        Some(_) => coordinate_answers(source.records(), answered),
        None => Vec::new(),
    };
    Ok(LoadedData {
        available: !source.records().is_empty(),
        total_answers: source.records().len() as u64,
        snapshot: store.snapshot(),
        coordinates,
    })
}

// ********* Output *********

fn row_to_json(row: &AggregatedRow) -> JSValue {
    json!({
        "answerLabel": row.answer_label,
        "count": row.count,
        "percentage": row.percentage,
        "categories": row.categories,
        "distinctQuestions": row.distinct_questions,
        "rank": row.rank,
    })
}

fn table_to_json(page: &TablePage) -> JSValue {
    json!({
        "page": page.page,
        "pageSize": page.page_size,
        "totalPaginas": page.total_pages,
        "totalRows": page.total_rows,
        "rows": page.rows.iter().map(row_to_json).collect::<Vec<JSValue>>(),
    })
}

fn facets_to_json(facets: &Facets) -> JSValue {
    json!({
        "zonas": facets.zones,
        "barrios": facets.neighborhoods,
        "campanias": facets.campaigns,
        "sexos": facets.sexes,
        "categorias": facets.categories,
        "preguntas": facets.questions,
        "edades": facets.ages,
    })
}

fn reject_label(reason: RejectReason) -> &'static str {
    match reason {
        RejectReason::MissingSurveyId => "missingSurveyId",
        RejectReason::MissingValue => "missingValue",
        RejectReason::MissingSeparator => "missingSeparator",
        RejectReason::Unparseable => "unparseable",
        RejectReason::OutOfRange => "outOfRange",
    }
}

fn pin_to_json(pin: &Pin) -> JSValue {
    json!({
        "encuestaId": pin.survey_id,
        "latitude": pin.latitude,
        "longitude": pin.longitude,
        "popup": pin.popup,
    })
}

fn map_to_json(plan: &MapPlan, layer: &MapLayer, normalized: &NormalizedCoordinates) -> JSValue {
    let rejected: Vec<JSValue> = normalized
        .rejected
        .iter()
        .map(|r| {
            json!({
                "index": r.index,
                "encuestaId": r.survey_id,
                "reason": reject_label(r.reason),
            })
        })
        .collect();
    let mut res = json!({
        "mode": layer.kind().label(),
        "zoom": plan.zoom,
        "rejected": rejected,
    });
    match layer {
        MapLayer::Pins(pins) => {
            res["pins"] = json!(pins.iter().map(pin_to_json).collect::<Vec<JSValue>>());
        }
        MapLayer::Clusters { clusters, singles } => {
            let options = match plan.mode {
                MapMode::Clusters(o) => o,
                _ => ClusterOptions::default(),
            };
            let clusters_js: Vec<JSValue> = clusters
                .iter()
                .map(|c| {
                    let on_click = match c.on_click(&options) {
                        ClusterClick::Expand(_) => "expand",
                        ClusterClick::ZoomTo(_) => "zoom",
                    };
                    json!({"encuestaIds": c.survey_ids, "size": c.len(), "onClick": on_click})
                })
                .collect();
            res["clusters"] = json!(clusters_js);
            res["pins"] = json!(singles.iter().map(pin_to_json).collect::<Vec<JSValue>>());
        }
        MapLayer::Heat(points) => {
            let heat: Vec<JSValue> = points
                .iter()
                .map(|h| {
                    json!({
                        "latitude": h.latitude,
                        "longitude": h.longitude,
                        "intensity": h.intensity,
                    })
                })
                .collect();
            res["heat"] = json!(heat);
        }
    }
    res
}

// Collects the layer handed over by the map controller.
#[derive(Default)]
struct LayerCapture {
    layer: Option<MapLayer>,
}

impl MapRenderer for LayerCapture {
    fn teardown(&mut self, _mode: MapModeKind) {
        self.layer = None;
    }

    fn draw(&mut self, layer: &MapLayer) {
        self.layer = Some(layer.clone());
    }

    fn set_view(&mut self, viewport: Viewport) {
        debug!("set_view: {:?}", viewport);
    }
}

fn build_map_js(plan: &MapPlan, coordinates: &[CoordinateAnswer]) -> JSValue {
    let normalized = normalize_coordinates(coordinates);
    let points = jitter_overlapping_seeded(&normalized.points, plan.jitter_seed);
    let mut map = MapController::new(LayerCapture::default());
    let layer = map.show(&points, &plan.mode, plan.zoom);
    map_to_json(plan, &layer, &normalized)
}

fn build_summary_js(
    config: &ReportConfig,
    data: &LoadedData,
    aggregation: &AggregationResult,
    page: &TablePage,
    chart: &ChartBuckets,
    facets: &Facets,
    map: Option<JSValue>,
) -> JSValue {
    let c = OutputConfig {
        report_name: config.output_settings.report_name.clone(),
        provider: config.source.provider.clone(),
    };
    json!({
        "config": c,
        "dataAvailable": data.available,
        "totalRespuestas": data.total_answers,
        "mode": aggregation.mode.label(),
        "totalMatched": aggregation.total_matched,
        "totalRecords": aggregation.total_records,
        "respuestasInvalidas": aggregation.invalid_count,
        "tasaRespuestaValida": aggregation.valid_response_rate,
        "rows": aggregation.rows.iter().map(row_to_json).collect::<Vec<JSValue>>(),
        "table": table_to_json(page),
        "chart": {"labels": chart.labels, "data": chart.counts},
        "facets": facets_to_json(facets),
        "map": map.unwrap_or(JSValue::Null),
    })
}

fn write_output(pretty_js: &str, output_path: Option<&str>) -> BReportResult<()> {
    match output_path {
        None | Some("stdout") | Some("") => {
            println!("{}", pretty_js);
        }
        Some(path) => {
            fs::write(path, pretty_js).context(WritingOutputSnafu { path })?;
            info!("Report written to {:?}", path);
        }
    }
    Ok(())
}

/// Computes the report described by `config`, writes it out, and checks it against the reference
/// summary when one is given.
///
/// Relative file paths in the configuration are read from `root`.
pub fn run_report(
    config: &ReportConfig,
    root: &Path,
    check_summary_path: Option<String>,
) -> BReportResult<JSValue> {
    info!("config: {:?}", config);
    validate_source(&config.source)?;
    let request = validate_filters(&config.filters)?;
    let view = validate_table(&config.table)?;
    let map_plan = match &config.map {
        Some(m) => Some(validate_map(m)?),
        None => None,
    };

    let data = load_data(root, &config.source, &request, map_plan.as_ref())?;
    info!(
        "run_report: {:?} records loaded (data available: {:?})",
        data.snapshot.len(),
        data.available
    );

    let aggregation = run_aggregation(
        &data.snapshot,
        &request.clauses,
        &AggregationRules::DEFAULT_RULES,
    );
    let page = view.project(&aggregation.rows);
    // The snapshot is already restricted to the selected question, if any.
    let chart = chart_buckets(&data.snapshot, None);
    let facets = compute_facets(&data.snapshot);
    let map_js = map_plan
        .as_ref()
        .map(|plan| build_map_js(plan, &data.coordinates));

    let result_js = build_summary_js(config, &data, &aggregation, &page, &chart, &facets, map_js);

    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;
    write_output(&pretty_js_stats, config.output_settings.output_path.as_deref())?;

    // The reference summary, if provided for comparison
    if let Some(summary_p) = check_summary_path {
        let summary_ref = read_summary(summary_p.clone())?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
        }
        ensure!(
            pretty_js_summary_ref == pretty_js_stats,
            ReferenceMismatchSnafu { path: summary_p }
        );
    }

    Ok(result_js)
}

fn default_config(args: &Args) -> ReportResult<ReportConfig> {
    let input = match &args.input {
        Some(x) => x.clone(),
        None => {
            whatever!("Either --config or --input must be provided")
        }
    };
    Ok(ReportConfig {
        output_settings: OutputSettings {
            report_name: io_common::simplify_file_name(&input),
            output_path: None,
        },
        source: SourceSettings {
            provider: "json".to_string(),
            url: None,
            file_path: None,
            worksheet_name: None,
            timeout_seconds: None,
        },
        filters: FilterSettings::default(),
        table: TableSettings::default(),
        map: None,
    })
}

/// Command-line options take precedence over the configuration file.
fn apply_args(config: &mut ReportConfig, args: &Args) {
    if let Some(input_type) = &args.input_type {
        config.source.provider = input_type.clone();
    }
    if let Some(input) = &args.input {
        if config.source.provider == "backend" {
            config.source.url = Some(input.clone());
        } else {
            config.source.file_path = Some(input.clone());
        }
    }
    if let Some(out) = &args.out {
        config.output_settings.output_path = Some(out.clone());
    }
    if let Some(search) = &args.search {
        config.table.search = Some(search.clone());
    }
    if let Some(page) = args.page {
        config.table.page = Some(page);
    }
    if let Some(page_size) = args.page_size {
        config.table.page_size = Some(page_size);
    }
    if let Some(mode) = &args.map_mode {
        config.map.get_or_insert_with(MapSettings::default).mode = mode.clone();
    }
}

pub fn run_report_from_args(args: &Args) -> BReportResult<()> {
    let (mut config, root) = match &args.config {
        Some(config_path) => {
            let config = read_config(config_path)?;
            let root = Path::new(config_path)
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            (config, root)
        }
        None => (default_config(args)?, PathBuf::new()),
    };
    apply_args(&mut config, args);
    run_report(&config, &root, args.reference.clone())?;
    Ok(())
}

#[cfg(test)]
fn run_report_test(test_name: &str, config_lpath: &str, summary_lpath: &str) {
    let test_dir = option_env!("SURVEY_TEST_DIR")
        .unwrap_or(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data"));
    info!("Running test {}", test_name);
    let dir = format!("{}/{}", test_dir, test_name);
    let res = read_config(&format!("{}/{}", dir, config_lpath)).and_then(|config| {
        run_report(
            &config,
            Path::new(&dir),
            Some(format!("{}/{}", dir, summary_lpath)),
        )
    });
    if let Err(e) = res {
        warn!("Error occured {:?}", e);
        panic!("report {} failed: {}", test_name, e);
    }
}

#[cfg(test)]
pub fn test_wrapper(test_name: &str) {
    run_report_test(
        test_name,
        format!("{}_config.json", test_name).as_str(),
        format!("{}_expected_summary.json", test_name).as_str(),
    )
}
