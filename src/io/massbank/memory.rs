use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    BatchJob, BatchSearchClient, JobStatus, MassBankError, RawHit, RecordInfo, RecordInfoSource,
    ResultSet, SpectrumSearchClient, SpectrumSearchRequest,
};

/// The remote operations a client performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SubmitBatch,
    JobStatus,
    JobResult,
    RecordInfo,
    SearchSpectrum,
    InstrumentTypes,
}

impl Operation {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SubmitBatch => "execBatchJob",
            Self::JobStatus => "getJobStatus",
            Self::JobResult => "getJobResult",
            Self::RecordInfo => "getRecordInfo",
            Self::SearchSpectrum => "searchSpectrum",
            Self::InstrumentTypes => "getInstrumentTypes",
        }
    }
}

/// The requests a [`MemoryClient`] has received
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallLog {
    pub submit_batch: usize,
    pub job_status: usize,
    pub job_result: usize,
    pub record_info: usize,
    pub search_spectrum: usize,
    pub instrument_types: usize,
    pub submitted_jobs: Vec<BatchJob>,
    pub record_requests: Vec<Vec<String>>,
    pub spectrum_requests: Vec<SpectrumSearchRequest>,
}

#[derive(Debug, Default)]
struct SharedState {
    statuses: VecDeque<JobStatus>,
    calls: CallLog,
}

/**
A client that answers from canned responses instead of a remote service.

Job status requests pop from a queue of statuses and report
[`JobStatus::Completed`] once the queue is exhausted. Spectrum searches are
answered by matching the request's m/z values against registered spectra,
falling back to a default hit list. Any [`Operation`] can be made to fail.

Clones share their status queue and [`CallLog`], so a client handed to several
workers records every call in one place.
*/
#[derive(Debug, Clone)]
pub struct MemoryClient {
    job_id: String,
    result_sets: Vec<ResultSet>,
    records: HashMap<String, String>,
    spectrum_hits: Vec<(Vec<f64>, Vec<RawHit>)>,
    default_hits: Vec<RawHit>,
    failing_spectra: Vec<Vec<f64>>,
    instruments: Vec<String>,
    failures: HashMap<Operation, MassBankError>,
    state: Arc<Mutex<SharedState>>,
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self {
            job_id: "memory-job".to_string(),
            result_sets: Vec::new(),
            records: HashMap::new(),
            spectrum_hits: Vec::new(),
            default_hits: Vec::new(),
            failing_spectra: Vec::new(),
            instruments: Vec::new(),
            failures: HashMap::new(),
            state: Arc::default(),
        }
    }
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job_id<S: Into<String>>(mut self, job_id: S) -> Self {
        self.job_id = job_id.into();
        self
    }

    pub fn with_result_set(mut self, result_set: ResultSet) -> Self {
        self.result_sets.push(result_set);
        self
    }

    pub fn with_record(mut self, record: RecordInfo) -> Self {
        self.records.insert(record.id, record.info);
        self
    }

    /// Queue statuses to report before the job completes
    pub fn with_statuses<I: IntoIterator<Item = JobStatus>>(self, statuses: I) -> Self {
        self.lock().statuses.extend(statuses);
        self
    }

    /// Answer searches whose m/z values equal `mzs` with `hits`
    pub fn with_spectrum_hits(mut self, mzs: Vec<f64>, hits: Vec<RawHit>) -> Self {
        self.spectrum_hits.push((mzs, hits));
        self
    }

    /// Answer searches that match no registered spectrum with `hits`
    pub fn with_default_hits(mut self, hits: Vec<RawHit>) -> Self {
        self.default_hits = hits;
        self
    }

    /// Fail searches whose m/z values equal `mzs`
    pub fn with_failing_spectrum(mut self, mzs: Vec<f64>) -> Self {
        self.failing_spectra.push(mzs);
        self
    }

    pub fn with_instruments<I: IntoIterator<Item = S>, S: Into<String>>(mut self, instruments: I) -> Self {
        self.instruments = instruments.into_iter().map(Into::into).collect();
        self
    }

    /// Make every call to `operation` fail
    pub fn failing(mut self, operation: Operation) -> Self {
        self.failures.insert(
            operation,
            MassBankError::Transport {
                operation: operation.name(),
                message: "connection refused".to_string(),
                source: None,
            },
        );
        self
    }

    /// A snapshot of the calls received so far by this client and its clones
    pub fn calls(&self) -> CallLog {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self, operation: Operation) -> Result<(), MassBankError> {
        match self.failures.get(&operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl RecordInfoSource for MemoryClient {
    fn record_info(&self, ids: &[String]) -> Result<Vec<RecordInfo>, MassBankError> {
        {
            let mut state = self.lock();
            state.calls.record_info += 1;
            state.calls.record_requests.push(ids.to_vec());
        }
        self.check(Operation::RecordInfo)?;
        Ok(ids
            .iter()
            .filter_map(|id| self.records.get(id).map(|info| RecordInfo::new(id.as_str(), info.as_str())))
            .collect())
    }
}

impl BatchSearchClient for MemoryClient {
    fn submit_batch(&self, job: &BatchJob) -> Result<String, MassBankError> {
        {
            let mut state = self.lock();
            state.calls.submit_batch += 1;
            state.calls.submitted_jobs.push(job.clone());
        }
        self.check(Operation::SubmitBatch)?;
        Ok(self.job_id.clone())
    }

    fn job_status(&self, _job_id: &str) -> Result<JobStatus, MassBankError> {
        let status = {
            let mut state = self.lock();
            state.calls.job_status += 1;
            state.statuses.pop_front()
        };
        self.check(Operation::JobStatus)?;
        Ok(status.unwrap_or(JobStatus::Completed))
    }

    fn job_result(&self, _job_id: &str) -> Result<Vec<ResultSet>, MassBankError> {
        self.lock().calls.job_result += 1;
        self.check(Operation::JobResult)?;
        Ok(self.result_sets.clone())
    }
}

impl SpectrumSearchClient for MemoryClient {
    fn search_spectrum(&self, request: &SpectrumSearchRequest) -> Result<Vec<RawHit>, MassBankError> {
        {
            let mut state = self.lock();
            state.calls.search_spectrum += 1;
            state.calls.spectrum_requests.push(request.clone());
        }
        self.check(Operation::SearchSpectrum)?;
        if self.failing_spectra.iter().any(|mzs| *mzs == request.mzs) {
            return Err(MassBankError::Malformed {
                operation: Operation::SearchSpectrum.name(),
                message: "truncated response".to_string(),
                source: None,
            });
        }
        let hits = self
            .spectrum_hits
            .iter()
            .find(|(mzs, _)| *mzs == request.mzs)
            .map(|(_, hits)| hits)
            .unwrap_or(&self.default_hits);
        Ok(hits.iter().take(request.max_results).cloned().collect())
    }

    fn instrument_types(&self) -> Result<Vec<String>, MassBankError> {
        self.lock().calls.instrument_types += 1;
        self.check(Operation::InstrumentTypes)?;
        Ok(self.instruments.clone())
    }
}
