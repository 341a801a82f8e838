use std::time::Duration;

use reqwest::blocking::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{
    BatchJob, BatchSearchClient, JobStatus, MassBankError, RawHit, RecordInfo, RecordInfoSource,
    ResultSet, SpectrumSearchClient, SpectrumSearchRequest,
};

pub const DEFAULT_ENDPOINT: &str = "https://massbank.jp/api/services/MassBankAPI";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "return")]
    value: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JobRequest<'a> {
    job_id: &'a str,
}

#[derive(Debug, Serialize)]
struct RecordInfoRequest<'a> {
    ids: &'a [String],
}

#[derive(Debug, Serialize)]
struct EmptyRequest {}

#[derive(Debug, Deserialize)]
struct StatusRecord {
    status: String,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    results: Option<Vec<RawHit>>,
}

/// A blocking JSON-over-HTTP client for the MassBank service. Each operation is
/// a `POST` to `<endpoint>/<operation>` whose answer is wrapped in a
/// `{"return": ...}` envelope.
#[derive(Debug, Clone)]
pub struct MassBankHttpClient {
    endpoint: String,
    client: Client,
}

impl MassBankHttpClient {
    pub fn new<S: Into<String>>(endpoint: S) -> Result<Self, MassBankError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MassBankError::transport("connect", e))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url_for(&self, operation: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), operation)
    }

    fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        operation: &'static str,
        body: &B,
    ) -> Result<T, MassBankError> {
        let url = self.url_for(operation);
        log::trace!("POST {url}");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| MassBankError::transport(operation, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(MassBankError::Status {
                operation,
                status: status.as_u16(),
            });
        }
        let envelope: Envelope<T> = response
            .json()
            .map_err(|e| MassBankError::malformed(operation, e))?;
        Ok(envelope.value)
    }
}

impl RecordInfoSource for MassBankHttpClient {
    fn record_info(&self, ids: &[String]) -> Result<Vec<RecordInfo>, MassBankError> {
        self.post("getRecordInfo", &RecordInfoRequest { ids })
    }
}

impl BatchSearchClient for MassBankHttpClient {
    fn submit_batch(&self, job: &BatchJob) -> Result<String, MassBankError> {
        self.post("execBatchJob", job)
    }

    fn job_status(&self, job_id: &str) -> Result<JobStatus, MassBankError> {
        let record: StatusRecord = self.post("getJobStatus", &JobRequest { job_id })?;
        Ok(JobStatus::from(record.status.as_str()))
    }

    fn job_result(&self, job_id: &str) -> Result<Vec<ResultSet>, MassBankError> {
        let sets: Option<Vec<ResultSet>> = self.post("getJobResult", &JobRequest { job_id })?;
        Ok(sets.unwrap_or_default())
    }
}

impl SpectrumSearchClient for MassBankHttpClient {
    fn search_spectrum(&self, request: &SpectrumSearchRequest) -> Result<Vec<RawHit>, MassBankError> {
        let result: SearchResult = self.post("searchSpectrum", request)?;
        Ok(result.results.unwrap_or_default())
    }

    fn instrument_types(&self) -> Result<Vec<String>, MassBankError> {
        self.post("getInstrumentTypes", &EmptyRequest {})
    }
}
