//! Runs a filter over a single file or every image in a directory.

use std::{
    any::Any,
    panic::{catch_unwind, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, Context, Result};
use rand::{random, rngs::StdRng, SeedableRng};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, error, info};

use crate::{codec, filter::Filter};

/// Outcome of one file in a batch.
#[derive(Debug)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub outcome: Result<()>,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub reports: Vec<FileReport>,
}

impl BatchSummary {
    pub fn processed(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.len() - self.processed()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Pairs every image directly inside `input_dir` with its destination in
/// `output_dir`, sorted by file name.
pub fn collect_jobs(input_dir: &Path, output_dir: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
    let entries = std::fs::read_dir(input_dir)
        .with_context(|| format!("failed to read directory {}", input_dir.display()))?;

    let mut jobs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && codec::is_image_path(&path) {
            if let Some(name) = path.file_name() {
                let output = output_dir.join(name);
                jobs.push((path, output));
            }
        }
    }
    jobs.sort();

    Ok(jobs)
}

/// Decode, filter and encode one image. The grain seed is drawn at random
/// unless one is given.
pub fn process_file(
    filter: &dyn Filter,
    input: &Path,
    output: &Path,
    seed: Option<u64>,
) -> Result<()> {
    let seed = seed.unwrap_or_else(random);
    debug!(input = %input.display(), seed, filter = filter.name(), "processing");

    let mut rng = StdRng::seed_from_u64(seed);
    let buffer = codec::decode(input)?;
    let result = filter.transform_buffer(&buffer, &mut rng)?;
    codec::encode(&result, output)?;

    Ok(())
}

/// Single-file mode. Errors propagate to the caller.
pub fn run_file(filter: &dyn Filter, input: &Path, output: &Path, seed: Option<u64>) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    process_file(filter, input, output, seed)
        .with_context(|| format!("failed to apply {} to {}", filter.name(), input.display()))?;
    println!("Saved {} image to {}", filter.name(), output.display());

    Ok(())
}

/// Directory mode. Each file runs on the blocking pool, at most `jobs` at a
/// time; a failing or panicking file is reported and the rest continue.
pub async fn run_directory(
    filter: Arc<dyn Filter>,
    input_dir: &Path,
    output_dir: &Path,
    jobs: usize,
    seed: Option<u64>,
) -> Result<BatchSummary> {
    if jobs == 0 {
        return Err(anyhow!("job count must be at least 1"));
    }

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let files = collect_jobs(input_dir, output_dir)?;
    info!(files = files.len(), jobs, filter = filter.name(), "starting batch");

    let semaphore = Arc::new(Semaphore::new(jobs));
    let mut set = JoinSet::new();

    for (input, output) in files {
        let permit = semaphore.clone().acquire_owned().await?;
        let filter = filter.clone();

        set.spawn_blocking(move || {
            let _permit = permit;
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                process_file(filter.as_ref(), &input, &output, seed)
            }))
            .unwrap_or_else(|payload| {
                Err(anyhow!("worker panicked: {}", panic_message(&*payload)))
            });
            FileReport {
                input,
                output,
                outcome,
            }
        });
    }

    let mut summary = BatchSummary::default();
    while let Some(res) = set.join_next().await {
        let report = match res {
            Ok(report) => report,
            Err(e) => {
                // panics are caught inside the task, so only cancellation lands here
                error!("batch task did not complete: {e}");
                continue;
            }
        };
        let name = file_name(&report.input);
        match &report.outcome {
            Ok(()) => println!("Processed {name}"),
            Err(e) => {
                error!(file = %name, "{e:#}");
                eprintln!("Error processing {name}: {e:#}");
            }
        }
        summary.reports.push(report);
    }
    summary.reports.sort_by(|a, b| a.input.cmp(&b.input));

    Ok(summary)
}
