//! Sample integration for the pulsar search pipeline.
//!
//! Integration averages every `F` consecutive time samples of each row of a
//! beam-major buffer. This crate generates specialized OpenCL kernels for it
//! at runtime, in four data layouts ([`IntegrationMode`]), and provides a
//! sequential [`reference`] implementation that defines the expected output.
//! The [`simulate`] module executes a generated kernel's algorithm on the
//! host, so a configuration can be checked against the reference without a
//! device.
//!
//! # Quick start
//!
//! ```
//! use pulsar_integration::{
//!     generate, reference, IntegrationConf, IntegrationMode, ObservationShape, ScalarType,
//! };
//!
//! let shape = ObservationShape::new(4, 1024).with_beams(2);
//! let conf = IntegrationConf::new(64, 2);
//! conf.validate_for(IntegrationMode::DmsSamples, &shape, 8).unwrap();
//!
//! let kernel = generate(
//!     IntegrationMode::DmsSamples,
//!     &conf,
//!     &shape,
//!     &ScalarType::of::<f32>(),
//!     8,
//!     128,
//! )
//! .unwrap();
//! assert_eq!(kernel.name(), "integrationDMsSamples8");
//! assert_eq!(kernel.work_size().local, [64, 1, 1]);
//!
//! let input = vec![2.0f32; kernel.geometry().layouts.input.len()];
//! let output = reference::integrate(IntegrationMode::DmsSamples, &shape, 8, 128, &input).unwrap();
//! assert_eq!(output[0], 2.0);
//! ```
//!
//! # Tuning tables
//!
//! ```
//! use pulsar_integration::TunedIntegrationConf;
//!
//! let table = TunedIntegrationConf::parse_str("Titan 2048 8 0 256 1 1 4 1 1 0\n").unwrap();
//! assert_eq!(table.lookup("Titan", 2048, 8).unwrap().nr_threads_d0(), 256);
//! ```

pub mod conf;
pub mod layout;
pub mod mode;
pub mod opencl;
pub mod reference;
pub mod scalar;
pub mod shape;
pub mod simulate;
pub mod template;
pub mod tuned;
pub mod tuning;

pub use conf::IntegrationConf;
pub use layout::{pad, Layout, ModeLayouts, Padding};
pub use mode::IntegrationMode;
pub use opencl::{
    generate, integration_after_dedispersion_in_place_opencl,
    integration_before_dedispersion_in_place_opencl, integration_dms_samples_opencl,
    integration_samples_dms_opencl, IntegrationKernel, KernelGeometry, WorkSize,
};
pub use scalar::{IntType, Sample, ScalarKind, ScalarType};
pub use shape::ObservationShape;
pub use tuned::TunedIntegrationConf;
pub use tuning::{PerformanceModel, Timing, TuningRecord, TuningSpace};
