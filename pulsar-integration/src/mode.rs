//! Integration modes: which buffer layout a kernel operates on.

use core::fmt;

use pulsar_core::{PulsarError, Result};

use crate::shape::ObservationShape;

/// The four mutually exclusive integration variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IntegrationMode {
    /// Beam → DM → sample, samples innermost and reduced.
    DmsSamples,
    /// Beam → sample → DM, DMs innermost, samples reduced across rows.
    SamplesDms,
    /// In-place over the dispersed buffer: beam → channel → sample.
    InPlaceBeforeDedispersion,
    /// In-place over the dedispersed buffer: beam → DM → sample.
    InPlaceAfterDedispersion,
}

impl IntegrationMode {
    pub const ALL: [IntegrationMode; 4] = [
        Self::DmsSamples,
        Self::SamplesDms,
        Self::InPlaceBeforeDedispersion,
        Self::InPlaceAfterDedispersion,
    ];

    /// Selects a mode from driver switches.
    ///
    /// With `in_place` set, exactly one of `before` / `after` must be set;
    /// otherwise exactly one of `dms_samples` / `samples_dms` must be set.
    pub fn from_flags(
        in_place: bool,
        before: bool,
        after: bool,
        dms_samples: bool,
        samples_dms: bool,
    ) -> Result<Self> {
        if in_place {
            match (before, after) {
                (true, false) => Ok(Self::InPlaceBeforeDedispersion),
                (false, true) => Ok(Self::InPlaceAfterDedispersion),
                _ => Err(PulsarError::InvalidInput(
                    "-before_dedispersion and -after_dedispersion are mutually exclusive".into(),
                )),
            }
        } else {
            match (dms_samples, samples_dms) {
                (true, false) => Ok(Self::DmsSamples),
                (false, true) => Ok(Self::SamplesDms),
                _ => Err(PulsarError::InvalidInput(
                    "-dms_samples and -samples_dms are mutually exclusive".into(),
                )),
            }
        }
    }

    pub fn is_in_place(&self) -> bool {
        matches!(
            self,
            Self::InPlaceBeforeDedispersion | Self::InPlaceAfterDedispersion
        )
    }

    /// Kernel entry-point name for an integration factor.
    pub fn kernel_name(&self, integration: u32) -> String {
        match self {
            Self::DmsSamples => format!("integrationDMsSamples{integration}"),
            Self::SamplesDms => format!("integrationSamplesDMs{integration}"),
            Self::InPlaceBeforeDedispersion | Self::InPlaceAfterDedispersion => {
                format!("integration{integration}")
            }
        }
    }

    /// Extent of the beam axis.
    pub fn nr_beams(&self, shape: &ObservationShape) -> u32 {
        match self {
            Self::InPlaceBeforeDedispersion => shape.nr_beams(),
            _ => shape.nr_synthesized_beams(),
        }
    }

    /// Extent of the non-reduced, non-beam axis (DMs or channels).
    pub fn nr_rows(&self, shape: &ObservationShape) -> u32 {
        match self {
            Self::InPlaceBeforeDedispersion => shape.nr_channels(),
            _ => shape.nr_total_dms(),
        }
    }

    /// Extent of the reduced (sample) axis.
    pub fn nr_samples(&self, shape: &ObservationShape) -> u32 {
        match self {
            Self::InPlaceBeforeDedispersion => shape.nr_samples_per_dispersed_batch(),
            _ => shape.nr_samples_per_batch(),
        }
    }

    /// Problem-size key used by tuning tables.
    pub fn problem_size(&self, shape: &ObservationShape) -> u32 {
        match self {
            Self::InPlaceBeforeDedispersion => shape.nr_samples_per_dispersed_batch(),
            _ => shape.nr_total_dms(),
        }
    }
}

impl fmt::Display for IntegrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DmsSamples => write!(f, "DMsSamples"),
            Self::SamplesDms => write!(f, "SamplesDMs"),
            Self::InPlaceBeforeDedispersion => write!(f, "InPlaceBeforeDedispersion"),
            Self::InPlaceAfterDedispersion => write!(f, "InPlaceAfterDedispersion"),
        }
    }
}
