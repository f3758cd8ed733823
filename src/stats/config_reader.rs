use crate::stats::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "reportName")]
    pub report_name: String,
    #[serde(rename = "outputPath")]
    pub output_path: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    pub provider: String,
    /// Base URL of the API, for the backend provider.
    pub url: Option<String>,
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
    #[serde(rename = "worksheetName")]
    pub worksheet_name: Option<String>,
    #[serde(rename = "timeoutSeconds")]
    pub timeout_seconds: Option<u64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ClauseSettings {
    pub categoria: String,
    pub pregunta: String,
    pub respuesta: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterSettings {
    pub categoria: Option<String>,
    pub pregunta: Option<String>,
    #[serde(rename = "tipoRespuesta")]
    pub tipo_respuesta: Option<String>,
    #[serde(rename = "edadDesde")]
    pub edad_desde: Option<i64>,
    #[serde(rename = "edadHasta")]
    pub edad_hasta: Option<i64>,
    #[serde(rename = "filtrosMultiples")]
    pub filtros_multiples: Option<Vec<ClauseSettings>>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSettings {
    pub search: Option<String>,
    #[serde(rename = "sortColumn")]
    pub sort_column: Option<String>,
    #[serde(rename = "sortDirection")]
    pub sort_direction: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<usize>,
    pub page: Option<usize>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapSettings {
    pub mode: String,
    pub zoom: Option<u8>,
    #[serde(rename = "clusterRadius")]
    pub cluster_radius: Option<f64>,
    #[serde(rename = "disableClusteringAtZoom")]
    pub disable_clustering_at_zoom: Option<u8>,
    #[serde(rename = "maxExpandedCluster")]
    pub max_expanded_cluster: Option<usize>,
    #[serde(rename = "jitterSeed")]
    pub jitter_seed: Option<u64>,
    #[serde(rename = "coordinateQuestion")]
    pub coordinate_question: Option<String>,
    #[serde(rename = "coordinateAnswer")]
    pub coordinate_answer: Option<String>,
    #[serde(rename = "heatIntensity")]
    pub heat_intensity: Option<f64>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    pub source: SourceSettings,
    #[serde(default)]
    pub filters: FilterSettings,
    #[serde(default)]
    pub table: TableSettings,
    pub map: Option<MapSettings>,
}

/// The part of the configuration echoed at the top of the report.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(rename = "reportName")]
    pub report_name: String,
    pub provider: String,
}

pub fn read_config(path: &str) -> BReportResult<ReportConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: ReportConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

pub fn read_summary(path: String) -> BReportResult<JSValue> {
    let contents = fs::read_to_string(path.clone()).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}
