//! Matrix expansion across the runtime axis.
//!
//! Expansion fans one package descriptor out over every entry of the
//! runtime axis and drives each entry through the full pipeline: build
//! the artifact, rewrite its provenance record, provision its
//! environment. Entries are independent of each other and can run in
//! parallel; no state flows between them.
//!
//! The failure policy decides what a failing entry means for the rest
//! of the matrix: fail-fast stops scheduling further entries, continue
//! processes them all and collects the failures.

pub mod events;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::builder::{ArtifactBuilder, BuildEngine, BuildError};
use crate::core::artifact::BuildResult;
use crate::core::descriptor::{DescriptorError, PackageDescriptor};
use crate::core::runtime::{Runtime, RuntimeAxis};
use crate::metadata::{rewrite_provenance, MetadataError};
use crate::provision::{EnvironmentDescriptor, ProvisionError, Provisioner, SearchPathResolver};
use crate::util::context::ProjectLayout;

pub use events::MatrixEvent;

/// Selector that always resolves to the axis's designated default
/// entry.
pub const LATEST_ALIAS: &str = "latest";

/// What a failing entry means for the rest of the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureMode {
    /// Stop scheduling entries after the first failure.
    #[default]
    FailFast,

    /// Process every entry and collect the failures.
    Continue,
}

/// Pipeline stage an entry failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Build,
    Metadata,
    Provision,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Build => "build",
            Stage::Metadata => "metadata",
            Stage::Provision => "provision",
        })
    }
}

/// The error behind a failed entry, by stage.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),
}

impl StageError {
    /// The stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            StageError::Build(_) => Stage::Build,
            StageError::Metadata(_) => Stage::Metadata,
            StageError::Provision(_) => Stage::Provision,
        }
    }
}

/// One failed axis entry: which runtime, which stage, and why.
#[derive(Debug, Error)]
#[error("runtime {runtime} failed during {stage}")]
pub struct EntryFailure {
    /// Axis entry id
    pub runtime: String,

    /// Stage the entry failed in
    pub stage: Stage,

    #[source]
    pub source: StageError,
}

/// Errors from matrix expansion.
#[derive(Debug, Error)]
pub enum ExpandError {
    #[error("invalid package descriptor")]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Entry(#[from] EntryFailure),
}

/// The outcome of expanding a matrix.
///
/// Builds and environments are keyed by axis entry id. Under the
/// continue policy a result can carry failures next to its successes;
/// under fail-fast a returned result never does.
#[derive(Debug)]
pub struct MatrixResult {
    /// Successful builds, keyed by entry id.
    pub builds: BTreeMap<String, BuildResult>,

    /// Provisioned environments, keyed by entry id.
    pub environments: BTreeMap<String, EnvironmentDescriptor>,

    /// Entry id the `latest` alias resolves to. `None` only when the
    /// designated default entry itself failed.
    pub latest: Option<String>,

    /// Failed entries, in axis order.
    pub failures: Vec<EntryFailure>,
}

impl MatrixResult {
    /// Look up a build by entry id or the `latest` alias.
    pub fn get(&self, selector: &str) -> Option<&BuildResult> {
        self.builds.get(self.resolve_alias(selector)?)
    }

    /// Look up an environment by entry id or the `latest` alias.
    pub fn environment(&self, selector: &str) -> Option<&EnvironmentDescriptor> {
        self.environments.get(self.resolve_alias(selector)?)
    }

    /// Whether every scheduled entry succeeded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn resolve_alias<'s>(&'s self, selector: &'s str) -> Option<&'s str> {
        if selector == LATEST_ALIAS {
            self.latest.as_deref()
        } else {
            Some(selector)
        }
    }
}

type EntryOutcome = (
    String,
    Result<(BuildResult, EnvironmentDescriptor), EntryFailure>,
);

/// Expands a package descriptor across a runtime axis.
pub struct MatrixExpander<'a> {
    descriptor: &'a PackageDescriptor,
    axis: &'a RuntimeAxis,
    engine: &'a dyn BuildEngine,
    layout: &'a ProjectLayout,
    resolver: &'a dyn SearchPathResolver,
    failure_mode: FailureMode,
    jobs: usize,
    verbose: bool,
}

impl<'a> MatrixExpander<'a> {
    /// Create an expander over a descriptor and axis.
    pub fn new(
        descriptor: &'a PackageDescriptor,
        axis: &'a RuntimeAxis,
        engine: &'a dyn BuildEngine,
        layout: &'a ProjectLayout,
        resolver: &'a dyn SearchPathResolver,
    ) -> Self {
        MatrixExpander {
            descriptor,
            axis,
            engine,
            layout,
            resolver,
            failure_mode: FailureMode::default(),
            jobs: 1,
            verbose: false,
        }
    }

    /// Set the failure policy.
    pub fn failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Set how many entries run at once.
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Enable verbose engine output.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Expand the whole matrix.
    pub fn expand(&self) -> Result<MatrixResult, ExpandError> {
        self.expand_with(&mut |_| {})
    }

    /// Expand the whole matrix, reporting progress to an observer.
    pub fn expand_with(
        &self,
        observer: &mut (dyn FnMut(&MatrixEvent) + Send),
    ) -> Result<MatrixResult, ExpandError> {
        self.descriptor.validate()?;

        let start = Instant::now();
        observer(&MatrixEvent::started(
            self.descriptor.name(),
            self.descriptor.version(),
            self.axis.entries().iter().map(Runtime::id).collect(),
        ));

        let fail_fast = self.failure_mode == FailureMode::FailFast;
        let outcomes = if self.jobs > 1 {
            self.run_parallel(observer, fail_fast)
        } else {
            self.run_sequential(observer, fail_fast)
        };

        let mut builds = BTreeMap::new();
        let mut environments = BTreeMap::new();
        let mut failures = Vec::new();
        for (id, outcome) in outcomes {
            match outcome {
                Ok((build, environment)) => {
                    builds.insert(id.clone(), build);
                    environments.insert(id, environment);
                }
                Err(failure) => failures.push(failure),
            }
        }

        let latest = builds
            .contains_key(self.axis.default_id())
            .then(|| self.axis.default_id().to_string());

        observer(&MatrixEvent::finished(
            failures.is_empty(),
            builds.len() as u64,
            failures.len() as u64,
            start.elapsed().as_millis() as u64,
        ));

        if fail_fast && !failures.is_empty() {
            return Err(ExpandError::Entry(failures.remove(0)));
        }

        Ok(MatrixResult {
            builds,
            environments,
            latest,
            failures,
        })
    }

    fn run_sequential(
        &self,
        observer: &mut (dyn FnMut(&MatrixEvent) + Send),
        fail_fast: bool,
    ) -> Vec<EntryOutcome> {
        let mut outcomes = Vec::with_capacity(self.axis.len());
        for runtime in self.axis.entries() {
            let outcome = self.run_entry(runtime, observer);
            let failed = outcome.1.is_err();
            outcomes.push(outcome);
            if failed && fail_fast {
                break;
            }
        }
        outcomes
    }

    fn run_parallel(
        &self,
        observer: &mut (dyn FnMut(&MatrixEvent) + Send),
        fail_fast: bool,
    ) -> Vec<EntryOutcome> {
        // Entries already running when one fails are left to finish;
        // under fail-fast, entries that have not started are skipped.
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build_global()
            .ok(); // Ignore if already set

        let aborted = AtomicBool::new(false);
        let observer = Mutex::new(observer);
        self.axis
            .entries()
            .par_iter()
            .filter_map(|runtime| {
                if fail_fast && aborted.load(Ordering::SeqCst) {
                    return None;
                }
                let outcome = self.run_entry(runtime, &mut |event| {
                    if let Ok(mut sink) = observer.lock() {
                        (*sink)(event);
                    }
                });
                if outcome.1.is_err() {
                    aborted.store(true, Ordering::SeqCst);
                }
                Some(outcome)
            })
            .collect()
    }

    /// Drive one entry through build, rewrite, and provisioning.
    fn run_entry(
        &self,
        runtime: &Runtime,
        observer: &mut dyn FnMut(&MatrixEvent),
    ) -> EntryOutcome {
        let id = runtime.id();
        let entry_start = Instant::now();

        let outcome = self.pipeline(runtime);
        let elapsed = entry_start.elapsed().as_millis() as u64;
        match &outcome {
            Ok((build, _)) => observer(&MatrixEvent::built(
                &build.runtime,
                &build.tag,
                build.artifact.clone(),
                elapsed,
            )),
            Err(failure) => observer(&MatrixEvent::failed(
                &failure.runtime,
                failure.stage.to_string(),
                failure.source.to_string(),
            )),
        }

        (id, outcome)
    }

    fn pipeline(
        &self,
        runtime: &Runtime,
    ) -> Result<(BuildResult, EnvironmentDescriptor), EntryFailure> {
        let id = runtime.id();

        let build = ArtifactBuilder::new(self.engine, self.layout)
            .jobs(Some(self.jobs))
            .verbose(self.verbose)
            .build(self.descriptor, runtime)
            .map_err(|source| EntryFailure {
                runtime: id.clone(),
                stage: Stage::Build,
                source: source.into(),
            })?;

        rewrite_provenance(&build, self.descriptor).map_err(|source| EntryFailure {
            runtime: id.clone(),
            stage: Stage::Metadata,
            source: source.into(),
        })?;

        let environment = Provisioner::new(self.axis.identity(), self.resolver)
            .provision(&build, runtime, self.descriptor)
            .map_err(|source| EntryFailure {
                runtime: id,
                stage: Stage::Provision,
                source: source.into(),
            })?;

        Ok((build, environment))
    }
}
