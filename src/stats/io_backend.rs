// Client for the survey API.

use std::time::Duration;

use log::{debug, info};
use reqwest::Client;
use serde::de::DeserializeOwned;
use snafu::ResultExt;
use tokio::runtime::Runtime;

use survey_aggregation::request::FilterRequest;
use survey_aggregation::store::ResponseSource;
use survey_aggregation::FetchError;

use crate::stats::{wire::*, *};

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

const FILTER_PATH: &str = "respuestas-encuesta/filtrar-preguntas-respuestas";
const EXISTENCE_PATH: &str = "respuestas-encuesta/existe-datos";
const COORDINATES_PATH: &str = "respuestas-encuesta/coordenadas-mapa";

/// A blocking front to the API. Each call runs to completion on an owned runtime.
pub struct BackendClient {
    base_url: String,
    client: Client,
    runtime: Runtime,
}

fn to_fetch_error(e: reqwest::Error) -> FetchError {
    if e.is_decode() {
        FetchError::InvalidPayload(e.to_string())
    } else {
        FetchError::Network(e.to_string())
    }
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> BReportResult<BackendClient> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context(HttpSnafu { url: base_url })?;
        let runtime = Runtime::new().context(RuntimeSnafu {})?;
        Ok(BackendClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            runtime,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, reqwest::Error> {
        debug!("get_json: {:?} {:?}", url, query);
        self.runtime.block_on(async {
            self.client
                .get(url)
                .query(query)
                .send()
                .await?
                .error_for_status()?
                .json::<T>()
                .await
        })
    }

    /// Whether the API holds any answer at all.
    pub fn data_exists(&self) -> BReportResult<ExistenceDto> {
        let url = self.url(EXISTENCE_PATH);
        let res: ExistenceDto = self
            .get_json(&url, &[])
            .context(HttpSnafu { url: url.clone() })?;
        info!(
            "data_exists: {:?} ({:?} answers)",
            res.existen_datos, res.total_respuestas
        );
        Ok(res)
    }

    /// The coordinate answers, optionally limited to the surveys that answered
    /// `(question, answer)`.
    pub fn coordinates(
        &self,
        answered: Option<(&str, &str)>,
    ) -> BReportResult<Vec<CoordinateDto>> {
        let url = self.url(COORDINATES_PATH);
        let query: Vec<(&str, &str)> = match answered {
            Some((question, answer)) => vec![("pregunta", question), ("respuesta", answer)],
            None => Vec::new(),
        };
        let res: Vec<CoordinateDto> = self
            .get_json(&url, &query)
            .context(HttpSnafu { url: url.clone() })?;
        info!("coordinates: {:?} coordinate answers", res.len());
        Ok(res)
    }
}

impl ResponseSource for BackendClient {
    fn fetch(&self, request: &FilterRequest) -> Result<Vec<ResponseRecord>, FetchError> {
        let url = self.url(FILTER_PATH);
        let body = FilterBody::from(request);
        debug!("fetch: POST {:?} {:?}", url, body);
        let dtos: Vec<RecordDto> = self
            .runtime
            .block_on(async {
                self.client
                    .post(&url)
                    .json(&body)
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<Vec<RecordDto>>()
                    .await
            })
            .map_err(to_fetch_error)?;
        Ok(records_from_dtos(dtos))
    }
}
