//! Observation shape: the extents of one processing batch.

use pulsar_core::{PulsarError, Result, Summarizable};

/// Immutable per-run description of the data being integrated.
///
/// Constructed once with [`ObservationShape::new`] and the `with_*` builders,
/// then read-only. Two-stage (subband) dedispersion splits the DM axis into
/// `nr_subbanding_dms * nr_dms`; without it `nr_subbanding_dms` is 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObservationShape {
    nr_beams: u32,
    nr_synthesized_beams: u32,
    nr_channels: u32,
    nr_subbanding_dms: u32,
    nr_dms: u32,
    nr_samples_per_batch: u32,
    nr_samples_per_dispersed_batch: u32,
    downsampling: u32,
}

impl ObservationShape {
    /// Creates a single-beam, single-channel shape with `nr_dms` DMs and
    /// `nr_samples_per_batch` samples.
    pub fn new(nr_dms: u32, nr_samples_per_batch: u32) -> Self {
        Self {
            nr_beams: 1,
            nr_synthesized_beams: 1,
            nr_channels: 1,
            nr_subbanding_dms: 1,
            nr_dms,
            nr_samples_per_batch,
            nr_samples_per_dispersed_batch: nr_samples_per_batch,
            downsampling: 1,
        }
    }

    /// Sets both the number of input beams and of synthesized beams.
    pub fn with_beams(mut self, beams: u32) -> Self {
        self.nr_beams = beams;
        self.nr_synthesized_beams = beams;
        self
    }

    /// Sets the number of synthesized beams (the beam axis after beam forming).
    pub fn with_synthesized_beams(mut self, beams: u32) -> Self {
        self.nr_synthesized_beams = beams;
        self
    }

    /// Sets the number of frequency channels.
    pub fn with_channels(mut self, channels: u32) -> Self {
        self.nr_channels = channels;
        self
    }

    /// Enables subband dedispersion with `subbanding_dms` outer DMs.
    pub fn with_subbanding(mut self, subbanding_dms: u32) -> Self {
        self.nr_subbanding_dms = subbanding_dms;
        self
    }

    /// Sets the number of samples in a dispersed (pre-dedispersion) batch.
    pub fn with_dispersed_samples(mut self, samples: u32) -> Self {
        self.nr_samples_per_dispersed_batch = samples;
        self
    }

    /// Sets the downsampling factor applied to the dedispersed batch.
    pub fn with_downsampling(mut self, downsampling: u32) -> Self {
        self.downsampling = downsampling;
        self
    }

    pub fn nr_beams(&self) -> u32 {
        self.nr_beams
    }

    pub fn nr_synthesized_beams(&self) -> u32 {
        self.nr_synthesized_beams
    }

    pub fn nr_channels(&self) -> u32 {
        self.nr_channels
    }

    /// Outer DM count of subband dedispersion (1 when not subbanding).
    pub fn nr_subbanding_dms(&self) -> u32 {
        self.nr_subbanding_dms
    }

    pub fn nr_dms(&self) -> u32 {
        self.nr_dms
    }

    /// `nr_subbanding_dms * nr_dms`.
    pub fn nr_total_dms(&self) -> u32 {
        self.nr_subbanding_dms.saturating_mul(self.nr_dms)
    }

    pub fn is_subbanding(&self) -> bool {
        self.nr_subbanding_dms > 1
    }

    /// Samples per dedispersed batch after downsampling.
    pub fn nr_samples_per_batch(&self) -> u32 {
        self.nr_samples_per_batch / self.downsampling.max(1)
    }

    pub fn nr_samples_per_dispersed_batch(&self) -> u32 {
        self.nr_samples_per_dispersed_batch
    }

    pub fn downsampling(&self) -> u32 {
        self.downsampling
    }

    /// Rejects shapes with a zero extent.
    pub fn validate(&self) -> Result<()> {
        let extents = [
            ("beams", self.nr_beams),
            ("synthesized beams", self.nr_synthesized_beams),
            ("channels", self.nr_channels),
            ("subbanding DMs", self.nr_subbanding_dms),
            ("DMs", self.nr_dms),
            ("samples per batch", self.nr_samples_per_batch),
            ("samples per dispersed batch", self.nr_samples_per_dispersed_batch),
            ("downsampling factor", self.downsampling),
        ];
        for (name, value) in extents {
            if value == 0 {
                return Err(PulsarError::InvalidInput(format!(
                    "observation shape: number of {name} must be positive"
                )));
            }
        }
        if self.nr_subbanding_dms.checked_mul(self.nr_dms).is_none() {
            return Err(PulsarError::InvalidInput(format!(
                "observation shape: {} x {} DMs overflow a 32-bit count",
                self.nr_subbanding_dms, self.nr_dms
            )));
        }
        Ok(())
    }
}

impl Summarizable for ObservationShape {
    fn summary(&self) -> String {
        format!(
            "Observation({} beams, {} synthesized, {} channels, {}x{} DMs, {} samples, {} dispersed)",
            self.nr_beams,
            self.nr_synthesized_beams,
            self.nr_channels,
            self.nr_subbanding_dms,
            self.nr_dms,
            self.nr_samples_per_batch(),
            self.nr_samples_per_dispersed_batch
        )
    }
}
