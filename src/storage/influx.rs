//! InfluxDB v2 storage implementation.
//!
//! Writes use line protocol against `/api/v2/write` with second precision;
//! reads run a Flux query against `/api/v2/query` and parse the CSV reply.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use csv::StringRecord;
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Reading, StoreConfig, Terminal, TrendPoint};
use crate::storage::{ChartSource, ReadingStore};
use crate::utils::http::{create_api_client, error_body};

/// InfluxDB v2 backend.
pub struct InfluxStorage {
    client: Client,
    base_url: String,
    missing: Vec<&'static str>,
    org: String,
    bucket: String,
    token: String,
    measurement: String,
}

impl InfluxStorage {
    /// Create a new store from configuration.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        Ok(Self {
            client: create_api_client()?,
            base_url: config.url.clone(),
            missing: config.missing_influx_settings(),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
            token: config.token.clone(),
            measurement: config.measurement.clone(),
        })
    }

    /// Blank settings are reported when the store is used, not when it is built.
    fn check_settings(&self) -> std::result::Result<(), String> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(format!("influx store is missing: {}", self.missing.join(", ")))
        }
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?.join(path)?;
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.token)
    }

    /// Flux query for every point of the measurement in `[start, stop]`.
    fn window_query(&self, start: DateTime<Utc>, stop: DateTime<Utc>) -> String {
        // Flux range stop is exclusive.
        let stop = stop + chrono::Duration::seconds(1);
        format!(
            "from(bucket: \"{bucket}\")\n  \
             |> range(start: {start}, stop: {stop})\n  \
             |> filter(fn: (r) => r._measurement == \"{measurement}\")\n  \
             |> filter(fn: (r) => r._field == \"T1\" or r._field == \"T2\")",
            bucket = flux_string(&self.bucket),
            start = start.to_rfc3339_opts(SecondsFormat::Secs, true),
            stop = stop.to_rfc3339_opts(SecondsFormat::Secs, true),
            measurement = flux_string(&self.measurement),
        )
    }
}

#[async_trait]
impl ReadingStore for InfluxStorage {
    async fn write(&self, reading: &Reading) -> Result<()> {
        self.check_settings().map_err(AppError::write)?;
        let url = self
            .endpoint(
                "api/v2/write",
                &[
                    ("org", self.org.as_str()),
                    ("bucket", self.bucket.as_str()),
                    ("precision", "s"),
                ],
            )
            .map_err(AppError::write)?;
        let body = line_protocol(&self.measurement, reading);
        log::debug!("Influx write: {body}");

        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, self.auth_header())
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(AppError::write)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::write(format!(
                "{status}: {}",
                error_body(response).await
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ChartSource for InfluxStorage {
    async fn query_window(
        &self,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    ) -> Result<Vec<TrendPoint>> {
        self.check_settings().map_err(AppError::chart_query)?;
        let url = self
            .endpoint("api/v2/query", &[("org", self.org.as_str())])
            .map_err(AppError::chart_query)?;
        let payload = serde_json::json!({
            "query": self.window_query(start, stop),
            "type": "flux",
            "dialect": { "header": true, "annotations": [], "delimiter": "," },
        });

        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, self.auth_header())
            .header(ACCEPT, "application/csv")
            .json(&payload)
            .send()
            .await
            .map_err(AppError::chart_query)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::chart_query(format!(
                "{status}: {}",
                error_body(response).await
            )));
        }

        let body = response.text().await.map_err(AppError::chart_query)?;
        parse_flux_csv(&body)
    }
}

/// Encode a reading as one line of InfluxDB line protocol.
pub fn line_protocol(measurement: &str, reading: &Reading) -> String {
    format!(
        "{} {}={}i,{}={}i {}",
        escape_measurement(measurement),
        Terminal::T1.field(),
        reading.terminal1_minutes,
        Terminal::T2.field(),
        reading.terminal2_minutes,
        reading.observed_at.timestamp()
    )
}

fn escape_measurement(name: &str) -> String {
    name.replace(',', "\\,").replace(' ', "\\ ")
}

fn flux_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Column positions within one CSV table.
struct Columns {
    time: usize,
    value: usize,
    field: usize,
}

impl Columns {
    /// Every table in the reply opens with its own header row.
    fn is_header(record: &StringRecord) -> bool {
        record.iter().any(|c| c == "_time") && record.iter().any(|c| c == "_value")
    }

    fn from_header(record: &StringRecord) -> Result<Self> {
        let find = |name: &str| {
            record.iter().position(|c| c == name).ok_or_else(|| {
                AppError::chart_query(format!("query response has no '{name}' column"))
            })
        };
        Ok(Self {
            time: find("_time")?,
            value: find("_value")?,
            field: find("_field")?,
        })
    }
}

/// Parse the CSV body of a Flux query into chart points.
///
/// Rows for fields other than `T1`/`T2` are skipped.
pub fn parse_flux_csv(body: &str) -> Result<Vec<TrendPoint>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut points = Vec::new();
    let mut columns: Option<Columns> = None;

    for record in reader.records() {
        let record = record.map_err(AppError::chart_query)?;
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        if columns.is_none() || Columns::is_header(&record) {
            columns = Some(Columns::from_header(&record)?);
            continue;
        }
        let Some(cols) = &columns else {
            continue;
        };

        let row = || record.iter().collect::<Vec<_>>().join(",");
        let cell = |idx: usize| {
            record
                .get(idx)
                .ok_or_else(|| AppError::chart_query(format!("short CSV row: {}", row())))
        };

        let Some(terminal) = Terminal::from_field(cell(cols.field)?) else {
            continue;
        };
        let timestamp = DateTime::parse_from_rfc3339(cell(cols.time)?)
            .map_err(|e| AppError::chart_query(format!("bad _time in '{}': {e}", row())))?
            .with_timezone(&Utc);
        let value: f64 = cell(cols.value)?
            .parse()
            .map_err(|e| AppError::chart_query(format!("bad _value in '{}': {e}", row())))?;

        points.push(TrendPoint {
            timestamp,
            terminal,
            minutes: value.max(0.0).round() as u32,
        });
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn store() -> InfluxStorage {
        let config = StoreConfig {
            url: "http://localhost:8086".to_string(),
            org: "daa".to_string(),
            bucket: "security \"times\"".to_string(),
            token: "secret".to_string(),
            ..StoreConfig::default()
        };
        InfluxStorage::new(&config).unwrap()
    }

    #[test]
    fn test_line_protocol() {
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 8, 30, 0).unwrap();
        let reading = Reading::new(12, 15, at);
        assert_eq!(
            line_protocol("terminals", &reading),
            format!("terminals T1=12i,T2=15i {}", at.timestamp())
        );
        assert!(line_protocol("dub airport,x", &reading).starts_with("dub\\ airport\\,x T1="));
    }

    #[test]
    fn test_endpoint_encodes_params() {
        let url = store()
            .endpoint("api/v2/write", &[("bucket", "a b"), ("precision", "s")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8086/api/v2/write?bucket=a+b&precision=s"
        );
    }

    #[test]
    fn test_window_query() {
        let stop = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();
        let start = stop - chrono::Duration::hours(24);
        let query = store().window_query(start, stop);
        assert!(query.starts_with("from(bucket: \"security \\\"times\\\"\")"));
        assert!(query.contains("range(start: 2024-03-03T12:00:00Z, stop: 2024-03-04T12:00:01Z)"));
        assert!(query.contains("r._measurement == \"terminals\""));
    }

    #[test]
    fn test_parse_flux_csv_multiple_tables() {
        let body = "\
,result,table,_start,_stop,_time,_value,_field,_measurement\r
,_result,0,2024-03-03T12:00:00Z,2024-03-04T12:00:01Z,2024-03-04T08:00:00Z,12,T1,terminals\r
,_result,0,2024-03-03T12:00:00Z,2024-03-04T12:00:01Z,2024-03-04T08:15:00Z,14,T1,terminals\r
\r
,result,table,_start,_stop,_time,_value,_field,_measurement\r
,_result,1,2024-03-03T12:00:00Z,2024-03-04T12:00:01Z,2024-03-04T08:00:00Z,20,T2,terminals\r
\r
";
        let points = parse_flux_csv(body).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].terminal, Terminal::T1);
        assert_eq!(points[1].minutes, 14);
        assert_eq!(points[2].terminal, Terminal::T2);
        assert_eq!(
            points[2].timestamp,
            Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_flux_csv_empty() {
        assert!(parse_flux_csv("").unwrap().is_empty());
        assert!(parse_flux_csv("\r\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_flux_csv_skips_other_fields() {
        let body = ",result,table,_time,_value,_field\n,_result,0,2024-03-04T08:00:00Z,3,T3\n";
        assert!(parse_flux_csv(body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_flux_csv_quoted_cells() {
        let body = "\
,result,table,site,_time,_value,_field\r
,_result,0,\"Dublin, T1\",2024-03-04T08:00:00Z,12,T1\r
,_result,1,\"Dublin, T2\",2024-03-04T08:00:00Z,15,T2\r
";
        let points = parse_flux_csv(body).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].minutes, 12);
        assert_eq!(points[1].terminal, Terminal::T2);
        assert_eq!(points[1].minutes, 15);
    }

    #[tokio::test]
    async fn test_missing_settings_fail_at_use() {
        let storage = InfluxStorage::new(&StoreConfig::default()).unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 8, 30, 0).unwrap();

        let err = storage.write(&Reading::new(1, 2, at)).await.unwrap_err();
        assert!(matches!(err, AppError::Write(_)));
        assert!(err.to_string().contains("url, org, bucket, token"));

        let err = storage
            .query_window(at - chrono::Duration::hours(24), at)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ChartQuery(_)));
    }

    #[test]
    fn test_parse_flux_csv_rejects_bad_header() {
        let body = "error,reference\nfailed to parse query,\n";
        assert!(matches!(parse_flux_csv(body), Err(AppError::ChartQuery(_))));
    }
}
