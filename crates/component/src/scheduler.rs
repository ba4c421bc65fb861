use crate::{Emitter, StatusSource};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, trace};

#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, strum::Display)]
pub enum PollState {
    #[strum(serialize = "idle")]
    Idle,
    #[strum(serialize = "polling")]
    Polling,
    #[strum(serialize = "stopped")]
    Stopped,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Emitted { gauges: usize },
    /// The server answered without identifying itself.
    Discarded,
    FetchFailed,
    EmitFailed,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PollStats {
    pub ticks: usize,
    pub emitted: usize,
    pub discarded: usize,
    pub fetch_errors: usize,
    pub emit_errors: usize,
}

impl PollStats {
    fn record(&mut self, outcome: CycleOutcome) {
        match outcome {
            CycleOutcome::Emitted { .. } => self.emitted += 1,
            CycleOutcome::Discarded => self.discarded += 1,
            CycleOutcome::FetchFailed => self.fetch_errors += 1,
            CycleOutcome::EmitFailed => self.emit_errors += 1,
        }
    }
}

/// Polls a single server on its own timer.
#[derive(Debug)]
pub struct PollTask {
    index: usize,
    source: Box<dyn StatusSource>,
    emitter: Arc<dyn Emitter>,
    interval: Duration,
    verbose: bool,
    state: PollState,
    stats: PollStats,
}

impl PollTask {
    pub fn new(
        index: usize,
        source: Box<dyn StatusSource>,
        emitter: Arc<dyn Emitter>,
        interval: Duration,
        verbose: bool,
    ) -> Self {
        Self {
            index,
            source,
            emitter,
            interval,
            verbose,
            state: PollState::Idle,
            stats: PollStats::default(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn address(&self) -> &str {
        self.source.address()
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn stats(&self) -> PollStats {
        self.stats
    }

    fn transition(&mut self, state: PollState) {
        trace!(
            index = self.index,
            address = self.source.address(),
            "{} -> {}",
            self.state,
            state
        );
        self.state = state;
    }

    /// Runs a single fetch and emit cycle.
    pub async fn poll(&mut self) -> CycleOutcome {
        self.transition(PollState::Polling);
        self.stats.ticks += 1;
        let outcome = self.cycle().await;
        self.stats.record(outcome);
        self.transition(PollState::Idle);
        outcome
    }

    async fn cycle(&self) -> CycleOutcome {
        let index = self.index;
        let address = self.source.address();
        if self.verbose {
            info!(index, address, "starting stats");
        }

        let document = match self.source.fetch().await {
            Ok(document) => document,
            Err(err) => {
                error!(index, address, "{err}");
                return CycleOutcome::FetchFailed;
            }
        };
        if document.is_empty() {
            debug!(index, address, "discarding serverStatus without host");
            return CycleOutcome::Discarded;
        }
        if self.verbose {
            info!(index, address, "mongo serverStatus:\n{document:#?}");
        }

        let outcome = match self.emitter.emit(&document).await {
            Ok(gauges) => {
                debug!(index, address, gauges, "pushed gauges");
                CycleOutcome::Emitted { gauges }
            }
            Err(err) => {
                error!(index, address, "failed to push stats: {err}");
                CycleOutcome::EmitFailed
            }
        };
        if self.verbose {
            info!(index, address, "done pushing stats");
        }
        outcome
    }

    /// Polls every `interval` until shutdown is signalled.
    ///
    /// The first poll happens one interval after start. Ticks missed while a
    /// cycle is still running are skipped, and an in-flight cycle is dropped
    /// as soon as shutdown is observed.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) -> PollStats {
        let start = tokio::time::Instant::now() + self.interval;
        let mut interval = tokio::time::interval_at(start, self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut ticks = IntervalStream::new(interval);

        info!(
            index = self.index,
            address = self.source.address(),
            interval = ?self.interval,
            "starting poll task"
        );

        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            let tick = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => None,
                tick = ticks.next() => tick,
            };
            if tick.is_none() {
                break;
            }
            let outcome = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => None,
                outcome = self.poll() => Some(outcome),
            };
            if outcome.is_none() {
                debug!(index = self.index, "cycle cancelled by shutdown");
                break;
            }
        }

        self.transition(PollState::Stopped);
        let stats = self.stats;
        info!(
            index = self.index,
            address = self.source.address(),
            ticks = stats.ticks,
            emitted = stats.emitted,
            discarded = stats.discarded,
            fetch_errors = stats.fetch_errors,
            emit_errors = stats.emit_errors,
            "poll task stopped"
        );
        stats
    }
}

/// Runs one [`PollTask`] per server until shutdown.
#[derive(Debug, Default)]
pub struct PollScheduler {
    tasks: Vec<PollTask>,
}

impl PollScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task(mut self, task: PollTask) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Spawns every task and waits for all of them to stop.
    ///
    /// Returns the final statistics ordered by server index.
    pub async fn run(self, shutdown_rx: watch::Receiver<bool>) -> Vec<(usize, PollStats)> {
        let mut task_handles: FuturesUnordered<JoinHandle<(usize, PollStats)>> =
            FuturesUnordered::new();

        for task in self.tasks {
            let shutdown_rx_clone = shutdown_rx.clone();
            let index = task.index();
            task_handles.push(tokio::spawn(async move {
                let stats = task.run(shutdown_rx_clone).await;
                (index, stats)
            }));
        }

        let mut summary = Vec::with_capacity(task_handles.len());
        while let Some(res) = task_handles.next().await {
            match res {
                Ok(entry) => summary.push(entry),
                Err(err) => error!("poll task exited abnormally: {err}"),
            }
        }
        summary.sort_by_key(|(index, _)| *index);
        summary
    }
}
