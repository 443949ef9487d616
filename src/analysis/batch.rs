//! Analysis of several Jenkinsfiles with a bounded number of workers.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use log::{info, warn};
use tokio::sync::Semaphore;

use super::{AnalysisResult, Analyzer};

/// Result of one batch member, in input order.
pub struct BatchOutcome {
    pub path: PathBuf,
    pub result: Result<AnalysisResult>,
}

/// Pipeline name for a file: its stem, or the file name when there is none.
pub fn pipeline_name(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map_or_else(|| "pipeline".to_string(), |s| s.to_string_lossy().into_owned())
}

/// One output sub-directory per input file, named after the stem.
///
/// Repeated stems (several `Jenkinsfile`s) get the first free `-2`, `-3`, ...
/// suffix, skipping names another input already claims.
pub fn output_dir_names(paths: &[PathBuf]) -> Vec<String> {
    let stems: Vec<String> = paths.iter().map(|path| pipeline_name(path)).collect();
    let mut taken: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(stems.len());
    for (index, stem) in stems.iter().enumerate() {
        let mut name = stem.clone();
        let mut suffix = 1;
        // Later plain stems keep their own name, so earlier duplicates step around them.
        while taken.contains(&name) || (name != *stem && stems[index + 1..].contains(&name)) {
            suffix += 1;
            name = format!("{stem}-{suffix}");
        }
        taken.insert(name.clone());
        names.push(name);
    }
    names
}

async fn analyze_file(
    path: &Path,
    analyzer: Arc<Analyzer>,
    semaphore: &Semaphore,
) -> Result<AnalysisResult> {
    let _permit = semaphore
        .acquire()
        .await
        .context("Worker pool closed unexpectedly")?;

    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;
    let name = pipeline_name(path);

    // Extraction and scoring are CPU-bound.
    let result = tokio::task::spawn_blocking(move || analyzer.analyze_source(&name, &text))
        .await
        .context("Analysis worker panicked")?
        .with_context(|| format!("Failed to analyze {}", path.display()))?;

    Ok(result)
}

/// Analyzes every file with at most `workers` analyses in flight.
///
/// A failing file never aborts its siblings; `on_done` is called as each
/// member finishes, in completion order. Outcomes come back in input order.
pub async fn analyze_files<F>(
    paths: &[PathBuf],
    analyzer: Arc<Analyzer>,
    workers: usize,
    on_done: F,
) -> Vec<BatchOutcome>
where
    F: Fn(&Path, &Result<AnalysisResult>),
{
    let workers = workers.max(1);
    info!("Analyzing {} pipelines with {workers} workers", paths.len());

    let semaphore = Arc::new(Semaphore::new(workers));
    let on_done = &on_done;

    let futures: Vec<_> = paths
        .iter()
        .map(|path| {
            let analyzer = Arc::clone(&analyzer);
            let semaphore = Arc::clone(&semaphore);
            async move {
                let result = analyze_file(path, analyzer, &semaphore).await;
                if let Err(e) = &result {
                    warn!("{}: {e:#}", path.display());
                }
                on_done(path.as_path(), &result);
                BatchOutcome {
                    path: path.clone(),
                    result,
                }
            }
        })
        .collect();

    join_all(futures).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const VALID: &str = "pipeline {\n  agent any\n  stages {\n    stage('Build') {\n      steps { sh 'make' }\n    }\n  }\n}\n";

    #[test]
    fn test_pipeline_name_uses_file_stem() {
        assert_eq!(pipeline_name(Path::new("ci/payments.groovy")), "payments");
        assert_eq!(pipeline_name(Path::new("Jenkinsfile")), "Jenkinsfile");
    }

    #[test]
    fn test_output_dir_names_are_unique() {
        let paths = vec![
            PathBuf::from("a/Jenkinsfile"),
            PathBuf::from("b/Jenkinsfile"),
            PathBuf::from("web.groovy"),
        ];
        assert_eq!(
            output_dir_names(&paths),
            vec!["Jenkinsfile", "Jenkinsfile-2", "web"]
        );
    }

    #[test]
    fn test_suffix_skips_names_already_in_use() {
        let paths = vec![
            PathBuf::from("web.groovy"),
            PathBuf::from("web-2.groovy"),
            PathBuf::from("old/web.groovy"),
        ];
        assert_eq!(output_dir_names(&paths), vec!["web", "web-2", "web-3"]);

        let paths = vec![
            PathBuf::from("a/web.groovy"),
            PathBuf::from("b/web.groovy"),
            PathBuf::from("web-2.groovy"),
        ];
        let names = output_dir_names(&paths);
        assert_eq!(names, vec!["web", "web-3", "web-2"]);
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.groovy");
        let broken = dir.path().join("broken.groovy");
        let missing = dir.path().join("missing.groovy");
        std::fs::write(&good, VALID).unwrap();
        std::fs::write(&broken, "pipeline {\n  stages {\n").unwrap();

        let finished = AtomicUsize::new(0);
        let paths = vec![broken.clone(), good.clone(), missing.clone()];
        let outcomes = analyze_files(&paths, Arc::new(Analyzer::default()), 2, |_, _| {
            finished.fetch_add(1, Ordering::SeqCst);
        })
        .await;

        assert_eq!(finished.load(Ordering::SeqCst), 3);
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].path, broken);
        assert!(outcomes[0].result.is_err());
        let analysis = outcomes[1].result.as_ref().unwrap();
        assert_eq!(analysis.pipeline.name, "good");
        assert_eq!(analysis.stage_count(), 1);
        assert!(outcomes[2].result.is_err());
    }

    #[tokio::test]
    async fn test_worker_count_does_not_change_results() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = (0..4)
            .map(|i| {
                let path = dir.path().join(format!("p{i}.groovy"));
                std::fs::write(&path, VALID).unwrap();
                path
            })
            .collect();

        let analyzer = Arc::new(Analyzer::default());
        let serial = analyze_files(&paths, Arc::clone(&analyzer), 1, |_, _| {}).await;
        let parallel = analyze_files(&paths, analyzer, 4, |_, _| {}).await;

        for (a, b) in serial.iter().zip(&parallel) {
            assert_eq!(a.result.as_ref().unwrap(), b.result.as_ref().unwrap());
        }
    }
}
