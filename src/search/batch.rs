use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use super::output::OutputAssembler;
use super::params::{ParameterError, SearchParameters};
use super::reconcile::{AddressingStrategy, FlatAddressing, NestedAddressing, Reconciler};
use super::{BatchState, SearchError};
use crate::features::FeatureSetContainer;
use crate::io::{
    resolve_notations, BatchJob, BatchSearchClient, JobStatus, MassBankError, QueryBuilder,
    ResultSet, SEARCH_SPECTRUM_JOB,
};

/// A flag shared between a running search and whoever may want to stop it
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What happened during one batch search
#[derive(Debug)]
pub struct SearchReport {
    /// The last state reached, [`BatchState::Done`] or [`BatchState::Failed`]
    pub state: BatchState,
    /// The state the search was in when it failed
    pub failed_during: Option<BatchState>,
    pub error: Option<SearchError>,
    pub job_id: Option<String>,
    /// The number of spectra submitted
    pub queries: usize,
    /// The number of hits accepted across all queries
    pub accepted: usize,
    /// The number of identities attached to features
    pub identities: usize,
}

impl Default for SearchReport {
    fn default() -> Self {
        Self {
            state: BatchState::BuildingQueries,
            failed_during: None,
            error: None,
            job_id: None,
            queries: 0,
            accepted: 0,
            identities: 0,
        }
    }
}

impl SearchReport {
    pub fn is_success(&self) -> bool {
        self.state == BatchState::Done
    }

    fn transition(&mut self, state: BatchState) {
        log::debug!("Batch search moving from {} to {}", self.state, state);
        self.state = state;
    }

    fn fail(&mut self, error: SearchError) {
        self.failed_during = Some(self.state);
        self.state = BatchState::Failed;
        self.error = Some(error);
    }
}

/// The annotated container produced by a search, and the report of how the
/// search went
#[derive(Debug)]
pub struct SearchOutcome {
    pub container: FeatureSetContainer,
    pub report: SearchReport,
}

/**
Annotates a [`FeatureSetContainer`] by submitting all of its spectra to MassBank
as a single batch job.

The search builds one query per MS1 feature set, or per product spectrum at the
configured MS level, submits them together, polls the job until it completes,
and reconciles the returned hits onto the features they were built from. Record
notations are then fetched in one request and attached along with the
identities.

[`MassBankBatchSearch::run`] never fails. The output container is named after
the input with the suffix `DMB` and is always finalized. When any step fails the
output holds no feature sets and the error is recorded in the
[`SearchReport`].
*/
#[derive(Debug)]
pub struct MassBankBatchSearch<C: BatchSearchClient> {
    params: SearchParameters,
    client: C,
    cancellation: CancellationToken,
}

impl<C: BatchSearchClient> MassBankBatchSearch<C> {
    pub fn new(params: SearchParameters, client: C) -> Result<Self, ParameterError> {
        params.validate()?;
        Ok(Self {
            params,
            client,
            cancellation: CancellationToken::new(),
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// A handle that stops the poll loop of a running search
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn params(&self) -> &SearchParameters {
        &self.params
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn run(&self, input: &FeatureSetContainer) -> SearchOutcome {
        let mut report = SearchReport::default();
        let mut assembler = OutputAssembler::new(input);

        match self.execute(input, &mut report) {
            Ok(working) => match assembler.extend(working) {
                Ok(_) => report.transition(BatchState::Done),
                Err(err) => report.fail(err.into()),
            },
            Err(err) => report.fail(err),
        }

        let (container, finalized) = assembler.finish();
        if let Err(err) = finalized {
            if report.error.is_none() {
                report.fail(err.into());
            } else {
                log::error!("Failed to finalize {}: {err}", container.id);
            }
        }

        match (&report.error, report.failed_during) {
            (Some(err), Some(state)) => log::error!(
                "MassBank batch search of {} failed during {state}: {err}",
                input.id
            ),
            _ => log::info!(
                "MassBank batch search of {} attached {} identities from {} queries",
                input.id,
                report.identities,
                report.queries
            ),
        }

        SearchOutcome { container, report }
    }

    fn execute(
        &self,
        input: &FeatureSetContainer,
        report: &mut SearchReport,
    ) -> Result<FeatureSetContainer, SearchError> {
        let mut working = OutputAssembler::working_copy(input)?;
        let queries = QueryBuilder::new(self.params.ms_level, self.params.min_profiles).build(&working);
        report.queries = queries.len();
        if queries.is_empty() {
            log::warn!("{} has no spectra with at least {} features to search", input.id, self.params.min_profiles);
            return Ok(working);
        }

        report.transition(BatchState::Submitted);
        let job = BatchJob {
            job_type: SEARCH_SPECTRUM_JOB.to_string(),
            mail_address: self.params.contact.clone(),
            query_strings: queries.into_iter().map(|q| q.text).collect(),
            instrument_types: self.params.instruments.clone(),
            ion_mode: self.params.ion_mode.label().to_string(),
        };
        let job_id = self.client.submit_batch(&job)?;
        log::info!("Submitted MassBank job {job_id} with {} queries", report.queries);
        report.job_id = Some(job_id.clone());

        report.transition(BatchState::Polling);
        self.wait_for(&job_id)?;
        let result_sets = self.client.job_result(&job_id)?;
        report.transition(BatchState::Fetched);
        log::debug!("Job {job_id} returned {} result sets", result_sets.len());

        if self.params.ms_level <= 1 {
            self.reconcile(FlatAddressing::default(), result_sets, &mut working, report)?;
        } else {
            let addressing = NestedAddressing::new(self.params.ms_level, self.params.ppm);
            self.reconcile(addressing, result_sets, &mut working, report)?;
        }
        Ok(working)
    }

    fn reconcile<A: AddressingStrategy>(
        &self,
        addressing: A,
        result_sets: Vec<ResultSet>,
        working: &mut FeatureSetContainer,
        report: &mut SearchReport,
    ) -> Result<(), SearchError> {
        report.transition(BatchState::Reconciling(A::MODE));
        let mut reconciler = Reconciler::new(&self.params, addressing);
        for result_set in result_sets {
            reconciler.add_result_set(working, result_set)?;
        }
        report.accepted = reconciler.accepted();

        report.transition(BatchState::ResolvingNotation);
        let notations = resolve_notations(&self.client, reconciler.record_ids())?;
        report.identities = reconciler.attach(working, &notations);
        Ok(())
    }

    /// Poll `job_id` until it completes, the deadline passes or the search is cancelled
    fn wait_for(&self, job_id: &str) -> Result<(), MassBankError> {
        let started = Instant::now();
        let deadline = self.params.timeout.map(|timeout| started + timeout);
        loop {
            if self.cancellation.is_cancelled() {
                return Err(MassBankError::Cancelled {
                    job_id: job_id.to_string(),
                });
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(MassBankError::Timeout {
                    job_id: job_id.to_string(),
                    elapsed: started.elapsed(),
                });
            }
            match self.client.job_status(job_id)? {
                JobStatus::Completed => {
                    log::info!("MassBank job {job_id} completed after {:?}", started.elapsed());
                    return Ok(());
                }
                JobStatus::Waiting | JobStatus::Running => {}
                JobStatus::Other(status) => {
                    return Err(MassBankError::UnknownStatus {
                        job_id: job_id.to_string(),
                        status,
                    })
                }
            }
            let pause = match deadline {
                Some(deadline) => self
                    .params
                    .poll_interval
                    .min(deadline.saturating_duration_since(Instant::now())),
                None => self.params.poll_interval,
            };
            thread::sleep(pause);
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;
    use crate::features::{Feature, FeatureSet};
    use crate::io::{CorrelationKey, MemoryClient, Operation, RawHit, RecordInfo};
    use crate::meta::IonMode;
    use crate::search::{ReconcileMode, ResultLimit};

    fn ms1_input() -> FeatureSetContainer {
        let mut container = FeatureSetContainer::new("run", None, IonMode::Positive);
        let sets = [
            (0, vec![(1, 181.0700, 800.0), (2, 150.0, 200.0)]),
            (1, vec![(3, 220.1, 100.0), (4, 250.2, 50.0), (5, 300.3, 10.0)]),
            (2, vec![(6, 181.0700, 50.0)]),
        ];
        for (index, features) in sets {
            let features = features
                .into_iter()
                .map(|(id, mz, intensity)| Feature::new(id, mz, intensity))
                .collect();
            container
                .add_feature_set(FeatureSet::new(index, 1, IonMode::Positive, features))
                .unwrap();
        }
        container.finalize().unwrap();
        container
    }

    fn params() -> SearchParameters {
        SearchParameters {
            ppm: 10.0,
            min_score: 0.5,
            ion_mode: IonMode::Positive,
            max_results: 5,
            min_profiles: 2,
            instruments: vec!["ESI-QTOF".to_string()],
            ms_level: 1,
            poll_interval: Duration::from_millis(1),
            ..Default::default()
        }
    }

    fn hit(id: &str, mass: &str, score: &str) -> RawHit {
        RawHit::new(id, format!("{id}; LC-ESI-QTOF; MS").as_str(), mass, score)
    }

    fn ms1_client() -> MemoryClient {
        MemoryClient::new()
            .with_job_id("job-1")
            .with_statuses([JobStatus::Waiting, JobStatus::Running])
            .with_result_set(ResultSet::new(
                "0",
                vec![
                    hit("PR000001", "180.0634", "0.91"),
                    hit("PR000002", "149.0", "0.3"),
                ],
            ))
            .with_result_set(ResultSet::new("1", vec![hit("PR000003", "219.09", "0.75")]))
            .with_record(RecordInfo::new(
                "PR000001",
                "ACCESSION: PR000001\nCH$NAME: Glucose\nCH$IUPAC: InChI=1S/C6H12O6\nCH$LINK: x\n",
            ))
            .with_record(RecordInfo::new("PR000003", "ACCESSION: PR000003\n"))
    }

    #[test_log::test]
    fn test_ms1_batch() {
        let input = ms1_input();
        let search = MassBankBatchSearch::new(params(), ms1_client()).unwrap();
        let SearchOutcome { container, report } = search.run(&input);

        assert!(report.is_success(), "{report:?}");
        assert_eq!(report.job_id.as_deref(), Some("job-1"));
        assert_eq!(report.queries, 2);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.identities, 2);

        assert_eq!(container.id, "runDMB");
        assert!(container.is_finalized());
        let order: Vec<usize> = container.iter().map(|s| s.index).collect();
        assert_eq!(order, vec![0, 1, 2]);

        let feature = container.get_feature_set(0).unwrap().get_feature(1).unwrap();
        assert_eq!(feature.identities().len(), 1);
        let identity = &feature.identities()[0];
        assert_eq!(identity.id, "PR000001");
        assert_eq!(identity.name, "PR000001");
        assert_eq!(identity.notation, "InChI=1S/C6H12O6");
        assert_eq!(identity.source, "MassBank");
        assert_eq!(identity.score, 0.91);

        let set = container.get_feature_set(1).unwrap();
        let annotated: Vec<u32> = set.iter().filter(|f| f.is_annotated()).map(|f| f.id).collect();
        assert_eq!(annotated, vec![3]);
        assert_eq!(set.get_feature(3).unwrap().identities()[0].notation, "");

        // Set 2 was too small to query, so its matching m/z stays bare
        assert!(!container.get_feature_set(2).unwrap()[0].is_annotated());
        assert!(input.iter().all(|s| s.iter().all(|f| !f.is_annotated())));

        let calls = search.client().calls();
        assert_eq!(calls.submit_batch, 1);
        assert_eq!(calls.job_status, 3);
        assert_eq!(calls.job_result, 1);
        assert_eq!(calls.record_info, 1);
        assert_eq!(calls.record_requests[0], vec!["PR000001", "PR000003"]);
        let job = &calls.submitted_jobs[0];
        assert_eq!(job.job_type, "searchSpectrum");
        assert_eq!(job.ion_mode, "positive");
        assert_eq!(job.instrument_types, vec!["ESI-QTOF"]);
        assert_eq!(job.query_strings.len(), 2);
        assert!(job.query_strings[0].starts_with("Name: 0;150,250;181.07,1000;"));
    }

    #[test_log::test]
    fn test_submission_failure() {
        let input = ms1_input();
        let client = ms1_client().failing(Operation::SubmitBatch);
        let search = MassBankBatchSearch::new(params(), client).unwrap();
        let outcome = search.run(&input);

        assert!(outcome.container.is_finalized());
        assert!(outcome.container.is_empty());
        assert_eq!(outcome.container.id, "runDMB");
        assert_eq!(outcome.report.state, BatchState::Failed);
        assert_eq!(outcome.report.failed_during, Some(BatchState::Submitted));
        assert!(matches!(
            outcome.report.error,
            Some(SearchError::Service(MassBankError::Transport { .. }))
        ));
        assert_eq!(outcome.report.identities, 0);
        assert_eq!(search.client().calls().job_status, 0);
    }

    #[test_log::test]
    fn test_notation_failure() {
        let client = ms1_client().failing(Operation::RecordInfo);
        let search = MassBankBatchSearch::new(params(), client).unwrap();
        let outcome = search.run(&ms1_input());
        assert!(outcome.container.is_empty());
        assert_eq!(outcome.report.failed_during, Some(BatchState::ResolvingNotation));
    }

    #[test]
    fn test_idempotent() {
        let input = ms1_input();
        let search = MassBankBatchSearch::new(params(), ms1_client()).unwrap();
        let first = search.run(&input);
        let second = search.run(&input);
        assert!(first.report.is_success());
        assert!(second.report.is_success());
        let collect = |c: &FeatureSetContainer| -> Vec<(u32, Vec<_>)> {
            c.iter()
                .flat_map(|s| s.iter())
                .map(|f| (f.id, f.identities().to_vec()))
                .collect()
        };
        assert_eq!(collect(&first.container), collect(&second.container));
        assert_eq!(
            first.container.get_feature_set(0).unwrap().get_feature(1).unwrap().identities().len(),
            1
        );
    }

    #[cfg(feature = "serde")]
    #[test_log::test]
    fn test_unsorted_json_input() -> Result<(), Box<dyn std::error::Error>> {
        let text = r#"{
            "id": "run",
            "ion_mode": "positive",
            "feature_sets": [[0, {
                "index": 0,
                "ms_level": 1,
                "ion_mode": "positive",
                "features": [
                    {"id": 1, "mz": 300.0, "intensity": 100.0},
                    {"id": 2, "mz": 181.07, "intensity": 800.0},
                    {"id": 3, "mz": 100.0, "intensity": 50.0}
                ]
            }]]
        }"#;
        let input = FeatureSetContainer::from_reader(text.as_bytes())?;
        let client = MemoryClient::new()
            .with_result_set(ResultSet::new("0", vec![hit("PR000010", "180.0630", "0.9")]));
        let search = MassBankBatchSearch::new(params(), client)?;
        let outcome = search.run(&input);
        assert!(outcome.report.is_success(), "{:?}", outcome.report);

        let set = outcome.container.get_feature_set(0).unwrap();
        let annotated: Vec<u32> = set.iter().filter(|f| f.is_annotated()).map(|f| f.id).collect();
        assert_eq!(annotated, vec![2]);
        assert_eq!(set.get_feature(2).unwrap().identities()[0].id, "PR000010");
        Ok(())
    }

    fn ranked_client() -> MemoryClient {
        MemoryClient::new().with_result_set(ResultSet::new(
            "0",
            vec![
                hit("D", "180.0634", "0.6"),
                hit("B", "180.0634", "0.8"),
                hit("A", "180.0634", "0.9"),
                hit("C", "180.0634", "0.7"),
            ],
        ))
    }

    #[test]
    fn test_max_results_policy() {
        let input = ms1_input();
        let mut strict = params();
        strict.max_results = 2;
        let search = MassBankBatchSearch::new(strict.clone(), ranked_client()).unwrap();
        let outcome = search.run(&input);
        let feature = outcome.container.get_feature_set(0).unwrap().get_feature(1).unwrap();
        let ids: Vec<&str> = feature.identities().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);

        let legacy = SearchParameters {
            result_limit: ResultLimit::Legacy,
            ..strict
        };
        let search = MassBankBatchSearch::new(legacy, ranked_client()).unwrap();
        let outcome = search.run(&input);
        let feature = outcome.container.get_feature_set(0).unwrap().get_feature(1).unwrap();
        let ids: Vec<&str> = feature.identities().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C", "D"]);
        assert_eq!(outcome.report.accepted, 4);
    }

    fn msn_input() -> FeatureSetContainer {
        let ms3 = FeatureSet::new(
            40,
            3,
            IonMode::Positive,
            vec![Feature::new(400, 60.02, 10.0), Feature::new(401, 72.04, 30.0)],
        );
        let fragment = Feature::new(3, 120.0651, 40.0).with_msn_spectrum(ms3);
        let ms2 = FeatureSet::new(
            30,
            2,
            IonMode::Positive,
            vec![fragment, Feature::new(4, 90.0, 80.0)],
        );
        let parent = Feature::new(12, 181.0707, 1000.0).with_msn_spectrum(ms2);
        let mut container = FeatureSetContainer::new("msn", None, IonMode::Positive);
        container
            .add_feature_set(FeatureSet::new(
                5,
                1,
                IonMode::Positive,
                vec![parent, Feature::new(13, 250.0, 10.0)],
            ))
            .unwrap();
        container
    }

    #[test_log::test]
    fn test_msn_batch() {
        let input = msn_input();
        let client = MemoryClient::new()
            .with_result_set(ResultSet::new("5-12-3", vec![hit("F1", "119.0578", "0.66")]))
            .with_record(RecordInfo::new("F1", "CH$IUPAC: InChI=1S/C8H9N\r\n"));
        let params = SearchParameters {
            ms_level: 3,
            ..params()
        };
        let search = MassBankBatchSearch::new(params, client).unwrap();
        let outcome = search.run(&input);
        assert!(outcome.report.is_success(), "{:?}", outcome.report);
        assert_eq!(outcome.report.queries, 1);

        let job = &search.client().calls().submitted_jobs[0];
        assert!(job.query_strings[0].starts_with(&format!(
            "Name: {};",
            CorrelationKey::Nested(crate::io::NestedKey::new(5, 12, 3))
        )));

        let parent = outcome.container.get_feature_set(5).unwrap().get_feature(12).unwrap();
        assert!(!parent.is_annotated());
        let fragment = parent.msn_spectra(2)[0].get_feature(3).unwrap();
        assert_eq!(fragment.identities().len(), 1);
        assert_eq!(fragment.identities()[0].score, 660.0);
        assert_eq!(fragment.identities()[0].notation, "InChI=1S/C8H9N");
        assert_eq!(fragment.identities()[0].ms_level, 3);
    }

    #[test]
    fn test_unknown_feature_set() {
        let client = MemoryClient::new().with_result_set(ResultSet::new("7", vec![hit("X", "100.0", "0.9")]));
        let search = MassBankBatchSearch::new(params(), client).unwrap();
        let outcome = search.run(&ms1_input());
        assert!(outcome.container.is_empty());
        assert_eq!(
            outcome.report.failed_during,
            Some(BatchState::Reconciling(ReconcileMode::Flat))
        );
        assert!(matches!(
            outcome.report.error,
            Some(SearchError::UnknownFeatureSet { index: 7, .. })
        ));
    }

    #[test]
    fn test_malformed_score() {
        let client = MemoryClient::new().with_result_set(ResultSet::new("0", vec![hit("X", "100.0", "n/a")]));
        let search = MassBankBatchSearch::new(params(), client).unwrap();
        let outcome = search.run(&ms1_input());
        assert!(matches!(outcome.report.error, Some(SearchError::Hit(_))));
    }

    #[test]
    fn test_cancelled() {
        let token = CancellationToken::new();
        let search = MassBankBatchSearch::new(params(), ms1_client())
            .unwrap()
            .with_cancellation(token.clone());
        token.cancel();
        assert!(search.cancellation_token().is_cancelled());
        let outcome = search.run(&ms1_input());
        assert_eq!(outcome.report.failed_during, Some(BatchState::Polling));
        assert!(matches!(
            outcome.report.error,
            Some(SearchError::Service(MassBankError::Cancelled { .. }))
        ));
        assert_eq!(search.client().calls().job_status, 0);
        assert!(outcome.container.is_finalized());
    }

    #[test]
    fn test_timeout() {
        let client = ms1_client().with_statuses(std::iter::repeat(JobStatus::Running).take(100_000));
        let params = SearchParameters {
            timeout: Some(Duration::from_millis(20)),
            ..params()
        };
        let search = MassBankBatchSearch::new(params, client).unwrap();
        let outcome = search.run(&ms1_input());
        assert!(matches!(
            outcome.report.error,
            Some(SearchError::Service(MassBankError::Timeout { .. }))
        ));
        assert_eq!(search.client().calls().job_result, 0);
    }

    #[test]
    fn test_unknown_status() {
        let client = MemoryClient::new().with_statuses([JobStatus::from("Aborted")]);
        let search = MassBankBatchSearch::new(params(), client).unwrap();
        let outcome = search.run(&ms1_input());
        assert!(matches!(
            outcome.report.error,
            Some(SearchError::Service(MassBankError::UnknownStatus { .. }))
        ));
    }

    #[test]
    fn test_nothing_to_query() {
        let params = SearchParameters {
            min_profiles: 10,
            ..params()
        };
        let search = MassBankBatchSearch::new(params, ms1_client()).unwrap();
        let outcome = search.run(&ms1_input());
        assert!(outcome.report.is_success());
        assert_eq!(outcome.report.queries, 0);
        assert_eq!(outcome.container.len(), 3);
        assert_eq!(search.client().calls().submit_batch, 0);
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        let params = SearchParameters {
            instruments: Vec::new(),
            ..params()
        };
        assert!(matches!(
            MassBankBatchSearch::new(params, MemoryClient::new()),
            Err(ParameterError::NoInstruments)
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_output_persisted() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let mut input = FeatureSetContainer::new("run", Some(dir.path().to_path_buf()), IonMode::Positive);
        for set in ms1_input().into_feature_sets() {
            input.add_feature_set(set)?;
        }
        let search = MassBankBatchSearch::new(params(), ms1_client())?;
        let outcome = search.run(&input);
        assert!(outcome.report.is_success());

        let path = dir.path().join("runDMB.json");
        let restored = FeatureSetContainer::from_reader(std::fs::File::open(path)?)?;
        assert_eq!(restored.len(), 3);
        assert!(restored.get_feature_set(0).unwrap().get_feature(1).unwrap().is_annotated());
        Ok(())
    }
}
