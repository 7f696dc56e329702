//! Experiment result logging.
//!
//! The executor reports one row per estimation run plus a closing summary;
//! the estimator only ever supplies the numeric estimate and its parameter
//! mapping. Files are opened in append mode so repeated invocations of the
//! same experiment accumulate into one log.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CrawlResult;

/// Sink for experiment progress and results.
pub trait ExperimentLogger: Send {
    fn write_header(&mut self) -> CrawlResult<()>;

    fn write_experiment_details(&mut self, details: &[(String, String)]) -> CrawlResult<()>;

    fn write_result_iteration(
        &mut self,
        iteration: usize,
        estimate: f64,
        duration: Duration,
        downloads: u64,
    ) -> CrawlResult<()>;

    fn write_final_result(
        &mut self,
        estimates: &[f64],
        total_duration: Duration,
        total_downloads: u64,
    ) -> CrawlResult<()>;
}

/// CSV results file plus a free-form details file, with relative errors
/// computed against the known corpus size.
pub struct CsvLogger {
    details_path: PathBuf,
    results_path: PathBuf,
    data_set_size: u64,
    limit_results: u64,
}

impl CsvLogger {
    pub fn new(
        details_path: impl Into<PathBuf>,
        results_path: impl Into<PathBuf>,
        data_set_size: u64,
        limit_results: u64,
    ) -> Self {
        Self {
            details_path: details_path.into(),
            results_path: results_path.into(),
            data_set_size,
            limit_results,
        }
    }

    fn append(&self, path: &PathBuf, text: &str) -> CrawlResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(text.as_bytes())?;
        Ok(())
    }

    fn relative_error(&self, estimate: f64) -> f64 {
        (self.data_set_size as f64 - estimate).abs() / self.data_set_size as f64
    }
}

impl ExperimentLogger for CsvLogger {
    fn write_header(&mut self) -> CrawlResult<()> {
        self.append(
            &self.results_path,
            &format!(
                "Reference = {},\nIteration,Estimate,Error,Duration,Downloads,\n",
                self.data_set_size
            ),
        )
    }

    fn write_experiment_details(&mut self, details: &[(String, String)]) -> CrawlResult<()> {
        let mut text = format!("Engine result cap: {}\n", self.limit_results);
        for (name, value) in details {
            text.push_str(&format!("{name}: {value}\n"));
        }
        self.append(&self.details_path, &text)
    }

    fn write_result_iteration(
        &mut self,
        iteration: usize,
        estimate: f64,
        duration: Duration,
        downloads: u64,
    ) -> CrawlResult<()> {
        self.append(
            &self.results_path,
            &format!(
                "{iteration},{estimate:.3},{:.3},{:.3},{downloads},\n",
                self.relative_error(estimate),
                duration.as_secs_f64(),
            ),
        )
    }

    fn write_final_result(
        &mut self,
        estimates: &[f64],
        total_duration: Duration,
        total_downloads: u64,
    ) -> CrawlResult<()> {
        let average = mean(estimates);
        let coefficient_of_variation = if average == 0.0 {
            0.0
        } else {
            population_std_dev(estimates, average) / average
        };
        self.append(
            &self.results_path,
            &format!(
                "Coefficient of Variation,Mean Estimate,Error of the Mean,Total Duration,Total Downloads,\n\
                 {coefficient_of_variation:.3},{average:.3},{:.3},{:.3},{total_downloads},\n",
                self.relative_error(average),
                total_duration.as_secs_f64(),
            ),
        )
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance =
        values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
