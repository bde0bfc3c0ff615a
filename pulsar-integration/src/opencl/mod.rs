//! OpenCL kernel generation for every integration mode.
//!
//! Each generator derives a [`KernelGeometry`] (layouts, extents, tuning
//! values) and renders kernel text from it. The geometry is kept on the
//! returned [`IntegrationKernel`] so a driver can size its NDRange and the
//! simulator can execute the same algorithm on the host.

mod dms_samples;
mod in_place;
mod samples_dms;

use pulsar_core::{hash, ContentAddressable, PulsarError, Result, Summarizable};

use crate::conf::IntegrationConf;
use crate::layout::{ModeLayouts, Padding};
use crate::mode::IntegrationMode;
use crate::scalar::{IntType, ScalarType};
use crate::shape::ObservationShape;

/// Global and local NDRange of a kernel launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkSize {
    pub global: [usize; 3],
    pub local: [usize; 3],
}

impl WorkSize {
    /// Number of work-groups along each dimension.
    pub fn nr_groups(&self) -> [usize; 3] {
        let mut groups = [0; 3];
        for (dim, g) in groups.iter_mut().enumerate() {
            *g = if self.local[dim] == 0 {
                0
            } else {
                self.global[dim] / self.local[dim]
            };
        }
        groups
    }
}

/// Everything the renderer embeds into kernel text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelGeometry {
    pub mode: IntegrationMode,
    pub layouts: ModeLayouts,
    pub nr_beams: usize,
    /// DMs (or channels for the before-dedispersion mode).
    pub nr_rows: usize,
    pub nr_samples: usize,
    pub nr_integrated_samples: usize,
    pub integration: u32,
    pub nr_threads: u32,
    pub nr_items: u32,
    pub int_type: IntType,
    pub scalar: ScalarType,
}

impl KernelGeometry {
    pub fn new(
        mode: IntegrationMode,
        conf: &IntegrationConf,
        shape: &ObservationShape,
        scalar: &ScalarType,
        integration: u32,
        padding: usize,
    ) -> Result<Self> {
        shape.validate()?;
        if scalar.size_bytes() == 0 {
            return Err(PulsarError::InvalidInput(format!(
                "scalar type '{}' has zero size",
                scalar.name()
            )));
        }
        let layouts = ModeLayouts::new(
            mode,
            shape,
            integration,
            Padding::new(padding, scalar.size_bytes()),
        )?;
        let nr_integrated_samples = layouts.nr_integrated_samples();
        Ok(Self {
            mode,
            nr_beams: mode.nr_beams(shape) as usize,
            nr_rows: mode.nr_rows(shape) as usize,
            nr_samples: mode.nr_samples(shape) as usize,
            nr_integrated_samples,
            layouts,
            integration,
            nr_threads: conf.nr_threads_d0(),
            nr_items: conf.nr_items_d0(),
            int_type: conf.int_type(),
            scalar: scalar.clone(),
        })
    }

    /// Samples consumed by one in-place chunk (`threads * items * integration`).
    pub fn chunk_len(&self) -> usize {
        (self.nr_threads as usize)
            .saturating_mul(self.nr_items as usize)
            .saturating_mul(self.integration as usize)
    }

    /// Elements of `__local` memory the kernel declares.
    pub fn local_memory_elements(&self) -> usize {
        match self.mode {
            IntegrationMode::DmsSamples => {
                (self.nr_threads as usize).saturating_mul(self.nr_items as usize)
            }
            IntegrationMode::SamplesDms => 0,
            IntegrationMode::InPlaceBeforeDedispersion
            | IntegrationMode::InPlaceAfterDedispersion => self.chunk_len(),
        }
    }

    pub fn local_memory_bytes(&self) -> usize {
        self.local_memory_elements()
            .saturating_mul(self.scalar.size_bytes())
    }

    /// NDRange the kernel must be launched with.
    pub fn work_size(&self) -> WorkSize {
        let threads = self.nr_threads as usize;
        let items = (self.nr_items as usize).max(1);
        let global = match self.mode {
            IntegrationMode::DmsSamples => [
                threads.saturating_mul(self.nr_integrated_samples / items),
                self.nr_rows,
                self.nr_beams,
            ],
            IntegrationMode::SamplesDms => [
                self.nr_rows / items,
                self.nr_integrated_samples,
                self.nr_beams,
            ],
            IntegrationMode::InPlaceBeforeDedispersion
            | IntegrationMode::InPlaceAfterDedispersion => {
                [threads, self.nr_rows, self.nr_beams]
            }
        };
        WorkSize {
            global,
            local: [threads, 1, 1],
        }
    }
}

/// A generated kernel: entry point, source text, and launch geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrationKernel {
    name: String,
    source: String,
    geometry: KernelGeometry,
}

impl IntegrationKernel {
    /// Kernel entry-point name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Complete kernel source.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn mode(&self) -> IntegrationMode {
        self.geometry.mode
    }

    pub fn geometry(&self) -> &KernelGeometry {
        &self.geometry
    }

    pub fn work_size(&self) -> WorkSize {
        self.geometry.work_size()
    }

    pub fn local_memory_bytes(&self) -> usize {
        self.geometry.local_memory_bytes()
    }

    /// Consumes the kernel and returns its source.
    pub fn into_source(self) -> String {
        self.source
    }
}

impl Summarizable for IntegrationKernel {
    fn summary(&self) -> String {
        let ws = self.work_size();
        format!(
            "{} ({}, {} bytes of source, global {:?}, local {:?})",
            self.name,
            self.geometry.mode,
            self.source.len(),
            ws.global,
            ws.local
        )
    }
}

impl ContentAddressable for IntegrationKernel {
    fn content_hash(&self) -> String {
        hash::sha256_str(&self.source)
    }
}

/// Generates the kernel for any integration mode.
pub fn generate(
    mode: IntegrationMode,
    conf: &IntegrationConf,
    shape: &ObservationShape,
    scalar: &ScalarType,
    integration: u32,
    padding: usize,
) -> Result<IntegrationKernel> {
    let geometry = KernelGeometry::new(mode, conf, shape, scalar, integration, padding)?;
    let name = mode.kernel_name(integration);
    let source = match mode {
        IntegrationMode::DmsSamples => dms_samples::render(&name, &geometry)?,
        IntegrationMode::SamplesDms => samples_dms::render(&name, &geometry)?,
        IntegrationMode::InPlaceBeforeDedispersion
        | IntegrationMode::InPlaceAfterDedispersion => in_place::render(&name, &geometry)?,
    };
    tracing::debug!(
        kernel = %name,
        mode = %mode,
        integration,
        conf = %conf,
        data_type = %scalar,
        source_len = source.len(),
        "generated integration kernel"
    );
    Ok(IntegrationKernel {
        name,
        source,
        geometry,
    })
}

/// Generates the DMs-major kernel (`input`, `output` arguments).
pub fn integration_dms_samples_opencl(
    conf: &IntegrationConf,
    shape: &ObservationShape,
    scalar: &ScalarType,
    integration: u32,
    padding: usize,
) -> Result<IntegrationKernel> {
    generate(IntegrationMode::DmsSamples, conf, shape, scalar, integration, padding)
}

/// Generates the samples-major kernel (`input`, `output` arguments).
pub fn integration_samples_dms_opencl(
    conf: &IntegrationConf,
    shape: &ObservationShape,
    scalar: &ScalarType,
    integration: u32,
    padding: usize,
) -> Result<IntegrationKernel> {
    generate(IntegrationMode::SamplesDms, conf, shape, scalar, integration, padding)
}

/// Generates the in-place kernel over the dispersed buffer (`data` argument).
pub fn integration_before_dedispersion_in_place_opencl(
    conf: &IntegrationConf,
    shape: &ObservationShape,
    scalar: &ScalarType,
    integration: u32,
    padding: usize,
) -> Result<IntegrationKernel> {
    generate(
        IntegrationMode::InPlaceBeforeDedispersion,
        conf,
        shape,
        scalar,
        integration,
        padding,
    )
}

/// Generates the in-place kernel over the dedispersed buffer (`data` argument).
pub fn integration_after_dedispersion_in_place_opencl(
    conf: &IntegrationConf,
    shape: &ObservationShape,
    scalar: &ScalarType,
    integration: u32,
    padding: usize,
) -> Result<IntegrationKernel> {
    generate(
        IntegrationMode::InPlaceAfterDedispersion,
        conf,
        shape,
        scalar,
        integration,
        padding,
    )
}
