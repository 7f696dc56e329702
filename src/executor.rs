//! Drives repeated estimation runs and feeds the experiment log.
//!
//! The executor is where fatal crawl errors surface: an estimator aborts
//! mid-run by returning the error, and the executor logs it and stops
//! instead of attempting recovery.

use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::error::CrawlResult;
use crate::estimator::Estimator;
use crate::logger::ExperimentLogger;

/// Runs one estimator for a fixed number of iterations.
pub struct Executor {
    estimator: std::sync::Arc<dyn Estimator>,
    logger: Box<dyn ExperimentLogger>,
    number_iterations: usize,
}

impl Executor {
    pub fn new(
        estimator: std::sync::Arc<dyn Estimator>,
        logger: Box<dyn ExperimentLogger>,
        number_iterations: usize,
    ) -> Self {
        Self {
            estimator,
            logger,
            number_iterations,
        }
    }

    /// Run every iteration, logging one row each, plus a summary row when
    /// more than one iteration ran. Returns the collected estimates.
    pub async fn execute(&mut self) -> CrawlResult<Vec<f64>> {
        self.logger.write_header()?;
        self.logger
            .write_experiment_details(&self.estimator.experiment_details())?;

        let mut estimates = Vec::with_capacity(self.number_iterations);
        let mut total_duration = Duration::ZERO;
        let mut total_downloads = 0u64;
        for iteration in 0..self.number_iterations {
            let start = Instant::now();
            let estimate = match self.estimator.estimate().await {
                Ok(estimate) => estimate,
                Err(err) => {
                    error!(iteration = iteration + 1, %err, "estimation aborted");
                    return Err(err);
                }
            };
            let duration = start.elapsed();
            let downloads = self.estimator.download_count();
            info!(
                iteration = iteration + 1,
                estimate,
                downloads,
                duration_secs = duration.as_secs_f64(),
                "iteration finished"
            );
            self.logger
                .write_result_iteration(iteration + 1, estimate, duration, downloads)?;
            estimates.push(estimate);
            total_duration += duration;
            total_downloads += downloads;
        }
        if self.number_iterations > 1 {
            self.logger
                .write_final_result(&estimates, total_duration, total_downloads)?;
        }
        Ok(estimates)
    }
}
