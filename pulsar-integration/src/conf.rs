//! Tuning configuration of an integration kernel.

use core::fmt;
use core::str::FromStr;

use pulsar_core::{PulsarError, Result, Summarizable};

use crate::mode::IntegrationMode;
use crate::scalar::IntType;
use crate::shape::ObservationShape;

/// Work-group geometry and code-generation switches of one kernel.
///
/// Only dimension 0 drives the integration kernels; dimensions 1 and 2 are
/// carried so tuning files written by other kernels' tools stay compatible.
///
/// The textual form is a single line of whitespace-separated fields:
///
/// ```text
/// subband threadsD0 threadsD1 threadsD2 itemsD0 itemsD1 itemsD2 intType
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntegrationConf {
    subband_dedispersion: bool,
    nr_threads: [u32; 3],
    nr_items: [u32; 3],
    int_type: IntType,
}

impl Default for IntegrationConf {
    fn default() -> Self {
        Self {
            subband_dedispersion: false,
            nr_threads: [1; 3],
            nr_items: [1; 3],
            int_type: IntType::U32,
        }
    }
}

impl IntegrationConf {
    /// Number of fields in the textual form.
    pub const FIELD_COUNT: usize = 8;

    /// Creates a configuration with `threads` work-items per group and
    /// `items` outputs per work-item along dimension 0.
    pub fn new(threads: u32, items: u32) -> Self {
        let mut conf = Self::default();
        conf.nr_threads[0] = threads;
        conf.nr_items[0] = items;
        conf
    }

    pub fn with_int_type(mut self, int_type: IntType) -> Self {
        self.int_type = int_type;
        self
    }

    pub fn with_subband_dedispersion(mut self, subband: bool) -> Self {
        self.subband_dedispersion = subband;
        self
    }

    pub fn subband_dedispersion(&self) -> bool {
        self.subband_dedispersion
    }

    pub fn nr_threads_d0(&self) -> u32 {
        self.nr_threads[0]
    }

    pub fn nr_threads_d1(&self) -> u32 {
        self.nr_threads[1]
    }

    pub fn nr_threads_d2(&self) -> u32 {
        self.nr_threads[2]
    }

    pub fn nr_items_d0(&self) -> u32 {
        self.nr_items[0]
    }

    pub fn nr_items_d1(&self) -> u32 {
        self.nr_items[1]
    }

    pub fn nr_items_d2(&self) -> u32 {
        self.nr_items[2]
    }

    pub fn int_type(&self) -> IntType {
        self.int_type
    }

    pub fn set_subband_dedispersion(&mut self, subband: bool) {
        self.subband_dedispersion = subband;
    }

    pub fn set_nr_threads_d0(&mut self, threads: u32) {
        self.nr_threads[0] = threads;
    }

    pub fn set_nr_threads_d1(&mut self, threads: u32) {
        self.nr_threads[1] = threads;
    }

    pub fn set_nr_threads_d2(&mut self, threads: u32) {
        self.nr_threads[2] = threads;
    }

    pub fn set_nr_items_d0(&mut self, items: u32) {
        self.nr_items[0] = items;
    }

    pub fn set_nr_items_d1(&mut self, items: u32) {
        self.nr_items[1] = items;
    }

    pub fn set_nr_items_d2(&mut self, items: u32) {
        self.nr_items[2] = items;
    }

    pub fn set_int_type(&mut self, int_type: IntType) {
        self.int_type = int_type;
    }

    /// Parses the fields of the textual form.
    pub fn from_fields(fields: &[&str]) -> Result<Self> {
        if fields.len() != Self::FIELD_COUNT {
            return Err(PulsarError::Parse(format!(
                "integration configuration needs {} fields, found {}",
                Self::FIELD_COUNT,
                fields.len()
            )));
        }
        let number = |name: &str, field: &str| -> Result<u32> {
            field.parse().map_err(|_| {
                PulsarError::Parse(format!("invalid {name} '{field}'"))
            })
        };
        let subband_dedispersion = match fields[0] {
            "0" | "false" => false,
            "1" | "true" => true,
            other => {
                return Err(PulsarError::Parse(format!(
                    "invalid subband dedispersion flag '{other}'"
                )))
            }
        };
        let int_code = number("integer type", fields[7])?;
        let int_type = u8::try_from(int_code)
            .map_err(|_| PulsarError::Parse(format!("invalid integer type '{}'", fields[7])))
            .and_then(|code| {
                IntType::from_code(code).map_err(|e| PulsarError::Parse(e.to_string()))
            })?;
        Ok(Self {
            subband_dedispersion,
            nr_threads: [
                number("threads D0", fields[1])?,
                number("threads D1", fields[2])?,
                number("threads D2", fields[3])?,
            ],
            nr_items: [
                number("items D0", fields[4])?,
                number("items D1", fields[5])?,
                number("items D2", fields[6])?,
            ],
            int_type,
        })
    }

    /// Checks the documented preconditions of the generated kernel.
    ///
    /// Generation itself never calls this; drivers that accept
    /// configurations from outside should.
    pub fn validate_for(
        &self,
        mode: IntegrationMode,
        shape: &ObservationShape,
        integration: u32,
    ) -> Result<()> {
        let threads = self.nr_threads_d0();
        let items = self.nr_items_d0();
        if threads == 0 || items == 0 {
            return Err(PulsarError::InvalidInput(format!(
                "threads ({threads}) and items ({items}) per work-item must be positive"
            )));
        }
        if integration == 0 {
            return Err(PulsarError::InvalidInput(
                "integration factor must be positive".to_string(),
            ));
        }
        let samples = mode.nr_samples(shape);
        let rows = mode.nr_rows(shape);
        match mode {
            IntegrationMode::DmsSamples => {
                if !threads.is_power_of_two() {
                    return Err(PulsarError::InvalidInput(format!(
                        "tree reduction needs a power-of-two thread count, got {threads}"
                    )));
                }
                if items > threads {
                    return Err(PulsarError::InvalidInput(format!(
                        "{items} items cannot be stored by {threads} threads"
                    )));
                }
                if (samples / integration) % items != 0 {
                    return Err(PulsarError::InvalidInput(format!(
                        "{} integrated samples are not divisible by {items} items",
                        samples / integration
                    )));
                }
            }
            IntegrationMode::SamplesDms => {
                if u64::from(rows) % (u64::from(threads) * u64::from(items)) != 0 {
                    return Err(PulsarError::InvalidInput(format!(
                        "{rows} DMs are not divisible by {threads} threads x {items} items"
                    )));
                }
            }
            IntegrationMode::InPlaceBeforeDedispersion
            | IntegrationMode::InPlaceAfterDedispersion => {}
        }
        Ok(())
    }
}

impl fmt::Display for IntegrationConf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {} {}",
            u8::from(self.subband_dedispersion),
            self.nr_threads[0],
            self.nr_threads[1],
            self.nr_threads[2],
            self.nr_items[0],
            self.nr_items[1],
            self.nr_items[2],
            self.int_type.code()
        )
    }
}

impl FromStr for IntegrationConf {
    type Err = PulsarError;

    fn from_str(s: &str) -> Result<Self> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        Self::from_fields(&fields)
    }
}

impl Summarizable for IntegrationConf {
    fn summary(&self) -> String {
        format!(
            "IntegrationConf({} threads, {} items, {}{})",
            self.nr_threads_d0(),
            self.nr_items_d0(),
            self.int_type.name(),
            if self.subband_dedispersion {
                ", subband"
            } else {
                ""
            }
        )
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn printed_form_parses_back(
            subband in any::<bool>(),
            threads in proptest::array::uniform3(1u32..2048),
            items in proptest::array::uniform3(1u32..64),
            wide in any::<bool>(),
        ) {
            let mut conf = IntegrationConf::new(threads[0], items[0])
                .with_subband_dedispersion(subband)
                .with_int_type(if wide { IntType::U64 } else { IntType::U32 });
            conf.set_nr_threads_d1(threads[1]);
            conf.set_nr_threads_d2(threads[2]);
            conf.set_nr_items_d1(items[1]);
            conf.set_nr_items_d2(items[2]);
            let parsed: IntegrationConf = conf.to_string().parse().unwrap();
            prop_assert_eq!(parsed, conf);
        }
    }
}
