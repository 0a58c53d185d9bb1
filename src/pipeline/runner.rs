//! Rank scheduler: runs every (topic, variant) column on a worker pool.
//!
//! A run is a batch of [`RankTask`]s, one per output column. The scheduler
//! splits the [`RankOutputs`] matrices into disjoint `&mut [f64]` columns,
//! hands each task exactly one of them, and runs the tasks on a rayon pool.
//! Graph adjacency and priors are shared read-only. No task can reach
//! another task's column, so a failure stays contained to its own output.
//!
//! [`RankRun`] wraps the whole flow for a [`RankSpec`]: plan the tasks,
//! execute them, and export [`FeatureVector`]s.

use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;

use crate::errors::{RankError, Result};
use crate::graph::csr::{ArticleGraph, RankOutputs};
use crate::pagerank::{ranker_for, ColumnOutcome, ColumnRanker, Convergence};
use crate::pipeline::spec::{AnchorRef, RankSpec, RuntimeSpec};
use crate::types::{FeatureVector, RankConfig, RankVariant, VariantKind};

/// Which rank matrix a task writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputSlot {
    Global,
    Personalized,
}

/// One unit of work: a single topic column for a single variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankTask {
    pub topic: usize,
    pub variant: RankVariant,
    pub slot: OutputSlot,
}

impl RankTask {
    pub fn new(topic: usize, variant: RankVariant, slot: OutputSlot) -> Self {
        Self {
            topic,
            variant,
            slot,
        }
    }

    /// One task per topic for a variant writing into `slot`
    pub fn for_all_topics(
        num_topics: usize,
        variant: RankVariant,
        slot: OutputSlot,
    ) -> impl Iterator<Item = RankTask> {
        (0..num_topics).map(move |topic| RankTask::new(topic, variant, slot))
    }
}

/// Per-column outcomes of a completed run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub outcomes: Vec<ColumnOutcome>,
}

impl RunReport {
    /// Columns that hit the iteration cap before the threshold
    pub fn unconverged(&self) -> impl Iterator<Item = &ColumnOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.convergence == Convergence::NotReached)
    }

    pub fn all_converged(&self) -> bool {
        self.unconverged().next().is_none()
    }

    /// The first unconverged column as [`RankError::ConvergenceNotReached`]
    pub fn ensure_converged(&self) -> Result<()> {
        self.outcomes.iter().try_for_each(ColumnOutcome::ensure_converged)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Fixed-size worker pool for rank tasks
pub struct RankScheduler {
    pool: rayon::ThreadPool,
    threads: usize,
}

impl RankScheduler {
    /// Pool with exactly `threads` workers
    pub fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(RankError::Scheduler("worker count must be positive".into()));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("wikirank-rank-{i}"))
            .build()
            .map_err(|e| RankError::Scheduler(e.to_string()))?;
        Ok(Self { pool, threads })
    }

    /// Pool sized to available parallelism plus `headroom`
    pub fn with_headroom(headroom: usize) -> Result<Self> {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(cores + headroom)
    }

    /// Pool sized from the runtime section of a spec
    pub fn from_runtime(runtime: &RuntimeSpec) -> Result<Self> {
        match runtime.threads {
            Some(threads) => Self::new(threads),
            None => Self::with_headroom(runtime.headroom),
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run every task and block until all of them finish
    ///
    /// Each task gets exclusive access to its `(slot, topic)` column. If any
    /// task fails, the first failure (in task order) is returned as
    /// [`RankError::TaskFailed`] and the rest are logged. Columns of tasks
    /// that succeeded are complete either way.
    pub fn run_all(
        &self,
        graph: &ArticleGraph,
        config: &RankConfig,
        tasks: &[RankTask],
        outputs: &mut RankOutputs,
    ) -> Result<RunReport> {
        self.run_with(graph, tasks, outputs, |task| ranker_for(task.variant, *config))
    }

    /// Like [`run_all`](Self::run_all), with a caller-supplied ranker per task
    pub fn run_with<F>(
        &self,
        graph: &ArticleGraph,
        tasks: &[RankTask],
        outputs: &mut RankOutputs,
        make_ranker: F,
    ) -> Result<RunReport>
    where
        F: Fn(&RankTask) -> Box<dyn ColumnRanker + Send + Sync> + Sync,
    {
        check_outputs(graph, outputs)?;

        let RankOutputs {
            global,
            personalized,
        } = outputs;
        let mut global_cols: Vec<Option<&mut [f64]>> =
            global.columns_mut().into_iter().map(Some).collect();
        let mut personalized_cols: Vec<Option<&mut [f64]>> =
            personalized.columns_mut().into_iter().map(Some).collect();

        // Hand out each column at most once
        let mut jobs = Vec::with_capacity(tasks.len());
        for task in tasks {
            let cols = match task.slot {
                OutputSlot::Global => &mut global_cols,
                OutputSlot::Personalized => &mut personalized_cols,
            };
            let slot = cols.get_mut(task.topic).ok_or(RankError::UnknownTopic {
                topic: task.topic,
                num_topics: graph.num_topics(),
            })?;
            let column = slot.take().ok_or_else(|| {
                RankError::Scheduler(format!(
                    "{:?} column for topic {} assigned to more than one task",
                    task.slot, task.topic
                ))
            })?;
            jobs.push((*task, column));
        }

        tracing::info!(tasks = jobs.len(), threads = self.threads, "starting rank run");

        let results: Vec<(RankTask, Result<ColumnOutcome>)> = self.pool.install(|| {
            jobs.into_par_iter()
                .map(|(task, column)| {
                    let ranker = make_ranker(&task);
                    (task, run_task(graph, ranker.as_ref(), &task, column))
                })
                .collect()
        });

        let mut outcomes = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (task, result) in results {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => failures.push((task, err)),
            }
        }

        let mut failures = failures.into_iter();
        if let Some((task, err)) = failures.next() {
            for (other, other_err) in failures {
                tracing::warn!(
                    topic = other.topic,
                    variant = %other.variant.kind(),
                    error = %other_err,
                    "rank task failed"
                );
            }
            return Err(RankError::TaskFailed {
                variant: task.variant.kind(),
                topic: task.topic,
                source: Box::new(err),
                succeeded: outcomes.iter().map(|o| (o.variant, o.topic)).collect(),
            });
        }

        let report = RunReport { outcomes };
        for outcome in report.unconverged() {
            tracing::warn!(
                topic = outcome.topic,
                variant = %outcome.variant,
                iterations = outcome.iterations,
                delta = outcome.delta,
                "rank column did not converge"
            );
        }
        Ok(report)
    }
}

impl std::fmt::Debug for RankScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankScheduler")
            .field("threads", &self.threads)
            .finish()
    }
}

fn check_outputs(graph: &ArticleGraph, outputs: &RankOutputs) -> Result<()> {
    for matrix in [&outputs.global, &outputs.personalized] {
        if matrix.num_nodes() != graph.num_nodes() || matrix.num_topics() != graph.num_topics() {
            return Err(RankError::Scheduler(format!(
                "output matrix is {}x{}, graph is {}x{}",
                matrix.num_nodes(),
                matrix.num_topics(),
                graph.num_nodes(),
                graph.num_topics()
            )));
        }
    }
    Ok(())
}

/// Run one task, turning a panic into an error
fn run_task(
    graph: &ArticleGraph,
    ranker: &(dyn ColumnRanker + Send + Sync),
    task: &RankTask,
    column: &mut [f64],
) -> Result<ColumnOutcome> {
    let _span = tracing::info_span!(
        "rank_task",
        topic = task.topic,
        variant = %task.variant.kind()
    )
    .entered();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        ranker.rank_column(graph, task.topic, column)
    }))
    .unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(RankError::Scheduler(format!("task panicked: {message}")))
    });

    if let Ok(outcome) = &result {
        tracing::debug!(
            iterations = outcome.iterations,
            delta = outcome.delta,
            converged = outcome.is_converged(),
            "rank task finished"
        );
    }
    result
}

// ============================================================================
// RankRun
// ============================================================================

/// A completed rank run over one graph
#[derive(Debug)]
pub struct RankRun<'g> {
    graph: &'g ArticleGraph,
    outputs: RankOutputs,
    report: RunReport,
}

impl<'g> RankRun<'g> {
    /// Tasks for every topic: the global slot, then the personalized slot
    pub fn plan(graph: &ArticleGraph, spec: &RankSpec) -> Result<Vec<RankTask>> {
        let num_topics = graph.num_topics();
        let global = resolve_variant(graph, spec, spec.global)?;
        let mut tasks: Vec<RankTask> =
            RankTask::for_all_topics(num_topics, global, OutputSlot::Global).collect();
        if let Some(kind) = spec.personalized {
            let variant = resolve_variant(graph, spec, kind)?;
            tasks.extend(RankTask::for_all_topics(num_topics, variant, OutputSlot::Personalized));
        }
        Ok(tasks)
    }

    /// Plan and run every column with a scheduler built from the spec
    pub fn execute(graph: &'g ArticleGraph, spec: &RankSpec) -> Result<Self> {
        let scheduler = RankScheduler::from_runtime(&spec.runtime)?;
        Self::execute_with(graph, spec, &scheduler)
    }

    /// Plan and run every column on an existing scheduler
    ///
    /// On [`RankError::TaskFailed`] the outputs are dropped. Use
    /// [`execute_into`](Self::execute_into) to keep the completed columns.
    pub fn execute_with(
        graph: &'g ArticleGraph,
        spec: &RankSpec,
        scheduler: &RankScheduler,
    ) -> Result<Self> {
        let mut outputs = RankOutputs::for_graph(graph);
        let report = Self::execute_into(graph, spec, scheduler, &mut outputs)?;
        Ok(Self {
            graph,
            outputs,
            report,
        })
    }

    /// Plan and run every column into caller-owned outputs
    ///
    /// If some tasks fail, the columns listed in `TaskFailed.succeeded`
    /// still hold their final values in `outputs`.
    pub fn execute_into(
        graph: &ArticleGraph,
        spec: &RankSpec,
        scheduler: &RankScheduler,
        outputs: &mut RankOutputs,
    ) -> Result<RunReport> {
        let tasks = Self::plan(graph, spec)?;
        scheduler.run_all(graph, &spec.rank_config(), &tasks, outputs)
    }

    pub fn graph(&self) -> &'g ArticleGraph {
        self.graph
    }

    pub fn outputs(&self) -> &RankOutputs {
        &self.outputs
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn into_outputs(self) -> RankOutputs {
        self.outputs
    }

    /// Feature vectors for every article, in dense-index order
    pub fn features(&self) -> impl Iterator<Item = FeatureVector> + '_ {
        (0..self.graph.num_nodes() as u32).map(move |node| FeatureVector {
            id: self.graph.id(node),
            title: self.graph.title(node).to_string(),
            category: self.graph.category(node).map(str::to_string),
            topics: self.graph.prior_row(node),
            global_rank: self.outputs.global.row(node),
            personalized_rank: self.outputs.personalized.row(node),
        })
    }
}

fn resolve_variant(graph: &ArticleGraph, spec: &RankSpec, kind: VariantKind) -> Result<RankVariant> {
    match kind {
        VariantKind::TopicSensitive => Ok(RankVariant::TopicSensitive),
        VariantKind::LinkWeighted => Ok(RankVariant::LinkWeighted),
        VariantKind::Anchored => {
            let anchor = match &spec.anchor {
                Some(AnchorRef::Id(id)) => graph
                    .index_of(*id)
                    .map(|_| *id)
                    .ok_or(RankError::UnknownNode(*id))?,
                Some(AnchorRef::Title(title)) => graph
                    .index_of_title(title)
                    .map(|node| graph.id(node))
                    .ok_or_else(|| RankError::unsupported("anchor", title.as_str()))?,
                None => return Err(RankError::unsupported("anchor", "")),
            };
            Ok(RankVariant::Anchored { anchor })
        }
    }
}
