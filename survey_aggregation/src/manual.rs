/*!

This is the long-form manual for `survey_aggregation` and `surveystat`.

## Filter modes

A filter set is a list of `(category, question, answer)` clauses. Each field is
either an exact value or the wildcard `ALL`. The set selects one of three modes:

* `WILDCARD`: the set is empty, or every clause is `ALL` / `ALL` / `ALL`. Every
  loaded record is tallied by answer.
* `SPECIFIC`: no clause has a wildcard. The result is a single row counting the
  distinct surveys (respondents) that match at least one clause. A survey that
  matches several clauses counts once.
* `MIXED`: anything else. The records matching a clause that contains a
  wildcard are tallied by answer. Fully specific clauses in a mixed set do not
  narrow the tally.

## Tallies

Answers are trimmed before grouping, and empty answers are grouped under `-`.
Rows are sorted by descending count; answers with the same count keep the order
in which they first appeared. Percentages are rounded half away from zero to two
decimals and are not adjusted to add up to exactly 100.

## Non-responses

An answer counts as a non-response when, after trimming, lowercasing and
removing accents, it:

* is one of the known non-responses (`""`, `-`, `n/a`, `ns/nc`, `no sabe`,
  `sin dato`...),
* or equals one of them once punctuation and spaces are removed (`N.S./N.C.`),
* or is one edit away from one of the longer entries (`no contsta`),
* or contains both `no sabe` and `contesta`,
* or contains both the words `ns` and `nc`.

The valid response rate is `(total - invalid) / total` in percent.

## Input formats

`surveystat` reads response records from:

* `backend` the REST API of the survey system. The data-existence probe is
  called first; when it reports no data, an empty report is produced.
* `json` a list of records in the same shape as the API returns them.
* `csv` a file with a header row. Recognized columns: `encuestaId`,
  `categoria`, `pregunta`, `respuesta`, `tipoRespuesta`, `zona`, `barrio`,
  `campania`, `sexo`. Only `pregunta` and `respuesta` are required.
* `xlsx` the same columns in the first row of a worksheet.

For local formats, the category, question, answer type and age filters are
applied the same way the API applies them.

## Coordinates

Coordinate answers read `lat,lng`. Answers without a survey id, without a
separator, with numbers that do not parse or that are out of range are dropped
and listed in the report. Surveys recorded at the same location are moved apart
by at most 0.00005 degrees so that each one remains clickable.

## Map modes

* `pins` one marker per survey, with a popup showing its id and coordinates.
* `clusters` nearby markers are grouped while the map is zoomed out. Clicking a
  cluster of up to 5 surveys lists them; clicking a larger one zooms in.
* `heat` a density layer where every survey weighs the same.

*/
