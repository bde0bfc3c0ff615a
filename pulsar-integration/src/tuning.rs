//! Auto-tuning support: candidate enumeration, throughput model, and the
//! textual output of a tuning run.
//!
//! Timing kernels on a device is the driver's job. This module decides which
//! configurations are worth timing and turns measurements into report lines
//! and tuning-file entries.

use core::fmt;

use tracing::trace;

use pulsar_core::{PulsarError, Result};

use crate::conf::IntegrationConf;
use crate::mode::IntegrationMode;
use crate::scalar::IntType;
use crate::shape::ObservationShape;

/// Bounds of the configuration search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TuningSpace {
    pub min_threads: u32,
    pub max_threads: u32,
    pub max_items: u32,
    /// Thread counts must be a multiple of this.
    pub vector_width: u32,
}

impl TuningSpace {
    pub fn new(min_threads: u32, max_threads: u32, max_items: u32, vector_width: u32) -> Result<Self> {
        if min_threads == 0 {
            return Err(PulsarError::InvalidInput(
                "minimum number of threads must be positive".to_string(),
            ));
        }
        if vector_width == 0 {
            return Err(PulsarError::InvalidInput(
                "vector width must be positive".to_string(),
            ));
        }
        Ok(Self {
            min_threads,
            max_threads,
            max_items,
            vector_width,
        })
    }

    fn thread_counts(&self, mode: IntegrationMode) -> Vec<u32> {
        let mut counts = Vec::new();
        let mut threads = self.min_threads;
        while threads <= self.max_threads {
            if threads % self.vector_width == 0 {
                counts.push(threads);
            }
            let next = match mode {
                IntegrationMode::SamplesDms => threads.checked_add(1),
                _ => threads.checked_mul(2),
            };
            match next {
                Some(next) => threads = next,
                None => break,
            }
        }
        counts
    }

    /// Configurations worth timing for `mode` over `shape`, in search order.
    ///
    /// Every admissible (threads, items) pair is produced once per index
    /// width.
    pub fn candidates(
        &self,
        mode: IntegrationMode,
        shape: &ObservationShape,
        integration: u32,
        subband_dedispersion: bool,
    ) -> Result<Vec<IntegrationConf>> {
        if integration == 0 {
            return Err(PulsarError::InvalidInput(
                "integration factor must be positive".to_string(),
            ));
        }
        let samples = u64::from(mode.nr_samples(shape));
        let rows = u64::from(mode.nr_rows(shape));
        let f = u64::from(integration);
        let mut out = Vec::new();

        for threads in self.thread_counts(mode) {
            let t = u64::from(threads);
            for items in 1..=self.max_items {
                let i = u64::from(items);
                match mode {
                    IntegrationMode::InPlaceBeforeDedispersion
                    | IntegrationMode::InPlaceAfterDedispersion => {
                        if i + 2 >= u64::from(self.max_items) || t * i * f > samples {
                            break;
                        }
                        if samples % (f * i) != 0 {
                            continue;
                        }
                    }
                    IntegrationMode::DmsSamples => {
                        if samples % (f * i) != 0 {
                            continue;
                        }
                    }
                    IntegrationMode::SamplesDms => {
                        if rows % (t * i) != 0 {
                            continue;
                        }
                    }
                }
                for int_type in [IntType::U32, IntType::U64] {
                    let conf = IntegrationConf::new(threads, items)
                        .with_int_type(int_type)
                        .with_subband_dedispersion(subband_dedispersion);
                    trace!(mode = %mode, conf = %conf, "tuning candidate");
                    out.push(conf);
                }
            }
        }
        Ok(out)
    }
}

/// Work and traffic of one integration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformanceModel {
    operations: u64,
    bytes: u64,
}

impl PerformanceModel {
    pub fn new(
        mode: IntegrationMode,
        shape: &ObservationShape,
        integration: u32,
        element_size: usize,
    ) -> Result<Self> {
        if integration == 0 {
            return Err(PulsarError::InvalidInput(
                "integration factor must be positive".to_string(),
            ));
        }
        let beams = u64::from(mode.nr_beams(shape));
        let rows = u64::from(mode.nr_rows(shape));
        let samples = u64::from(mode.nr_samples(shape));
        let operations = beams.saturating_mul(rows).saturating_mul(samples);
        let integrated = samples / u64::from(integration);
        let elements =
            operations.saturating_add(beams.saturating_mul(rows).saturating_mul(integrated));
        Ok(Self {
            operations,
            bytes: elements.saturating_mul(element_size as u64),
        })
    }

    /// One addition per input sample.
    pub fn operations(&self) -> u64 {
        self.operations
    }

    /// Bytes read plus bytes written.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn gflops(&self, seconds: f64) -> f64 {
        rate(self.operations, seconds)
    }

    pub fn gbs(&self, seconds: f64) -> f64 {
        rate(self.bytes, seconds)
    }
}

fn rate(amount: u64, seconds: f64) -> f64 {
    if seconds > 0.0 {
        amount as f64 / 1e9 / seconds
    } else {
        0.0
    }
}

/// Mean and spread of repeated timings, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub mean: f64,
    pub std_dev: f64,
}

impl Timing {
    /// Population statistics of `samples`, or `None` when empty.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            mean,
            std_dev: var.sqrt(),
        })
    }

    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean > 0.0 {
            self.std_dev / self.mean
        } else {
            0.0
        }
    }
}

/// Column header of a tuning report.
pub fn header(mode: IntegrationMode) -> String {
    let rows = match mode {
        IntegrationMode::InPlaceBeforeDedispersion => "nrChannels",
        _ => "nrDMs",
    };
    format!(
        "# nrBeams {rows} nrSamples integration *configuration* GFLOP/s GB/s time stdDeviation COV"
    )
}

/// One timed configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TuningRecord {
    pub nr_beams: u32,
    pub nr_rows: u32,
    pub nr_samples: u32,
    pub integration: u32,
    pub conf: IntegrationConf,
    pub gflops: f64,
    pub gbs: f64,
    pub timing: Timing,
}

impl TuningRecord {
    pub fn new(
        mode: IntegrationMode,
        shape: &ObservationShape,
        integration: u32,
        conf: IntegrationConf,
        model: &PerformanceModel,
        timing: Timing,
    ) -> Self {
        Self {
            nr_beams: mode.nr_beams(shape),
            nr_rows: mode.nr_rows(shape),
            nr_samples: mode.nr_samples(shape),
            integration,
            conf,
            gflops: model.gflops(timing.mean),
            gbs: model.gbs(timing.mean),
            timing,
        }
    }
}

impl fmt::Display for TuningRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {:.3} {:.3} {:.6} {:.6} {:.6}",
            self.nr_beams,
            self.nr_rows,
            self.nr_samples,
            self.integration,
            self.conf,
            self.gflops,
            self.gbs,
            self.timing.mean,
            self.timing.std_dev,
            self.timing.coefficient_of_variation()
        )
    }
}

/// The record with the highest GFLOP/s.
pub fn best(records: &[TuningRecord]) -> Option<&TuningRecord> {
    records.iter().max_by(|a, b| a.gflops.total_cmp(&b.gflops))
}

/// Tuning-file line of the best configuration, without the device name.
pub fn best_line(
    mode: IntegrationMode,
    shape: &ObservationShape,
    integration: u32,
    conf: &IntegrationConf,
) -> String {
    format!("{} {} {}", mode.problem_size(shape), integration, conf)
}
