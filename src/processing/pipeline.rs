use std::fs::File;
use std::io::{BufReader, BufWriter};

use futures::future;

use crate::models::config::PipelineConfig;
use crate::processing::collector::Collector;
use crate::processing::reader::Reader;
use crate::processing::stop::{StopOnDrop, StopSignal};
use crate::processing::worker::{Worker, WorkerStats};
use crate::processing::{PipelineError, PipelineSummary};
use crate::scoring::{Scorer, ScoringResult};
use crate::transport::{TransportFactory, ZmqReceiver, ZmqSender};

type FileReader = Reader<BufReader<File>, ZmqSender>;
type FileCollector = Collector<ZmqReceiver, BufWriter<File>>;

/// Components of one run, fully wired and ready to spawn.
struct Startup<S> {
    reader: FileReader,
    workers: Vec<Worker<S, ZmqReceiver, ZmqSender>>,
    collector: FileCollector,
}

/// Runs the reader, `config.workers` workers and the collector until the
/// collector declares the input exhausted or `stop` is set from outside.
///
/// `make_scorer` is called once per worker id before anything starts. All
/// files are opened and all endpoints bound up front, so any startup failure
/// is returned before a single record moves. Startup runs on the blocking
/// pool since model loading and file access block.
pub async fn run_pipeline<S, F>(
    config: &PipelineConfig,
    stop: StopSignal,
    make_scorer: F,
) -> Result<PipelineSummary, PipelineError>
where
    S: Scorer + Send + 'static,
    F: FnMut(usize) -> ScoringResult<S> + Send + 'static,
{
    config.validate()?;

    let startup_config = config.clone();
    let startup_stop = stop.clone();
    let Startup {
        reader,
        workers,
        collector,
    } = tokio::task::spawn_blocking(move || prepare(&startup_config, startup_stop, make_scorer))
        .await??;

    log::info!(
        "Starting pipeline: input={}, output={}, workers={}",
        config.input_path.display(),
        config.output_path.display(),
        config.workers
    );

    let worker_tasks = workers
        .into_iter()
        .map(|worker| tokio::task::spawn_blocking(move || worker.run()))
        .collect::<Vec<_>>();
    let reader_task = tokio::task::spawn_blocking(move || reader.run());
    // Set the stop signal even if the collector panics, otherwise the reader
    // and workers poll forever.
    let collector_guard = StopOnDrop(stop.clone());
    let collector_task = tokio::task::spawn_blocking(move || {
        let _guard = collector_guard;
        collector.run()
    });

    let (records_read, worker_stats, collector_stats) = tokio::join!(
        reader_task,
        future::join_all(worker_tasks),
        collector_task
    );
    let worker_stats = worker_stats
        .into_iter()
        .collect::<Result<Vec<WorkerStats>, _>>()?;

    let summary = PipelineSummary::from_parts(records_read?, &worker_stats, collector_stats?);
    log::info!(
        "Pipeline finished: records_read={}, results_written={}, decode_failures={}, scoring_failures={}",
        summary.records_read,
        summary.results_written,
        summary.decode_failures,
        summary.scoring_failures
    );
    Ok(summary)
}

fn prepare<S, F>(
    config: &PipelineConfig,
    stop: StopSignal,
    mut make_scorer: F,
) -> Result<Startup<S>, PipelineError>
where
    S: Scorer,
    F: FnMut(usize) -> ScoringResult<S>,
{
    let input = File::open(&config.input_path).map_err(|source| PipelineError::OpenInput {
        path: config.input_path.clone(),
        source,
    })?;

    let mut scorers = Vec::with_capacity(config.workers);
    for worker in 0..config.workers {
        log::debug!("Building scorer for worker {worker}");
        let scorer =
            make_scorer(worker).map_err(|source| PipelineError::Scorer { worker, source })?;
        scorers.push(scorer);
    }

    let factory = TransportFactory::new(config.poll_interval(), config.drain_grace());
    let dispatch = factory.bind_sender(&config.dispatch_endpoint)?;
    let results = factory.bind_receiver(&config.results_endpoint)?;

    let mut workers = Vec::with_capacity(config.workers);
    for (id, scorer) in scorers.into_iter().enumerate() {
        let inbound = factory.connect_receiver(&config.dispatch_endpoint)?;
        let outbound = factory.connect_sender(&config.results_endpoint)?;
        workers.push(Worker::new(
            id,
            scorer,
            inbound,
            outbound,
            stop.clone(),
            config.poll_interval(),
        ));
    }

    let output = File::create(&config.output_path).map_err(|source| PipelineError::CreateOutput {
        path: config.output_path.clone(),
        source,
    })?;

    let reader = Reader::new(
        BufReader::new(input),
        dispatch,
        stop.clone(),
        config.poll_interval(),
    );
    let collector = Collector::new(
        results,
        BufWriter::new(output),
        stop,
        config.collector_timings(),
    );

    Ok(Startup {
        reader,
        workers,
        collector,
    })
}
