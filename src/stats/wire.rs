// The JSON shapes exchanged with the survey API. The JSON provider reads the same record shape.

use serde::{Deserialize, Serialize};

use survey_aggregation::geo::CoordinateAnswer;
use survey_aggregation::request::FilterRequest;
use survey_aggregation::ResponseRecord;

/// One answer, as returned by the filter endpoint.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordDto {
    #[serde(rename = "encuestaId", alias = "encuesta_id")]
    pub encuesta_id: Option<u64>,
    pub pregunta: Option<String>,
    pub respuesta: Option<String>,
    pub categoria: Option<String>,
    #[serde(rename = "tipoRespuesta")]
    pub tipo_respuesta: Option<String>,
    pub zona: Option<String>,
    pub barrio: Option<String>,
    pub campania: Option<String>,
    pub sexo: Option<String>,
}

impl RecordDto {
    /// `None` when the record has no question: such records carry nothing to tally.
    pub fn into_record(self) -> Option<ResponseRecord> {
        let question = self.pregunta?;
        Some(ResponseRecord {
            survey_id: self.encuesta_id,
            question,
            answer: self.respuesta.unwrap_or_default(),
            category: self.categoria.unwrap_or_default(),
            answer_type: self.tipo_respuesta,
            zone: self.zona,
            neighborhood: self.barrio,
            campaign: self.campania,
            sex: self.sexo,
        })
    }
}

/// Keeps the records that have a question, logging the others.
pub fn records_from_dtos(dtos: Vec<RecordDto>) -> Vec<ResponseRecord> {
    let total = dtos.len();
    let res: Vec<ResponseRecord> = dtos
        .into_iter()
        .filter_map(RecordDto::into_record)
        .collect();
    if res.len() < total {
        log::warn!(
            "records_from_dtos: dropped {:?} of {:?} records without a question",
            total - res.len(),
            total
        );
    }
    res
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ExistenceDto {
    #[serde(rename = "existenDatos")]
    pub existen_datos: bool,
    #[serde(rename = "totalRespuestas")]
    pub total_respuestas: u64,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CoordinateDto {
    #[serde(rename = "encuestaId")]
    pub encuesta_id: Option<u64>,
    #[serde(rename = "respuestaId")]
    pub respuesta_id: Option<u64>,
    pub valor: Option<String>,
    #[serde(rename = "preguntaId")]
    pub pregunta_id: Option<u64>,
    #[serde(rename = "textoPregunta")]
    pub texto_pregunta: Option<String>,
}

impl From<CoordinateDto> for CoordinateAnswer {
    fn from(dto: CoordinateDto) -> Self {
        CoordinateAnswer {
            survey_id: dto.encuesta_id,
            value: dto.valor,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ClauseBody {
    pub categoria: String,
    pub pregunta: String,
    pub respuesta: String,
}

/// The body of the filter request. Absent keys are left out, as the dashboard does.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categoria: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pregunta: Option<String>,
    #[serde(rename = "tipoRespuesta", skip_serializing_if = "Option::is_none")]
    pub tipo_respuesta: Option<String>,
    #[serde(rename = "edadDesde", skip_serializing_if = "Option::is_none")]
    pub edad_desde: Option<i64>,
    #[serde(rename = "edadHasta", skip_serializing_if = "Option::is_none")]
    pub edad_hasta: Option<i64>,
    #[serde(rename = "filtrosMultiples", skip_serializing_if = "Vec::is_empty", default)]
    pub filtros_multiples: Vec<ClauseBody>,
}

impl From<&FilterRequest> for FilterBody {
    fn from(request: &FilterRequest) -> Self {
        let request = request.normalized();
        FilterBody {
            categoria: request.category,
            pregunta: request.question,
            tipo_respuesta: request.answer_type,
            edad_desde: request.age_from,
            edad_hasta: request.age_to,
            filtros_multiples: request
                .clauses
                .iter()
                .map(|c| ClauseBody {
                    categoria: c.category.as_str().to_string(),
                    pregunta: c.question.as_str().to_string(),
                    respuesta: c.answer.as_str().to_string(),
                })
                .collect(),
        }
    }
}
