//! Tuned configuration tables.
//!
//! A tuning file holds one configuration per line:
//!
//! ```text
//! device problemSize integration subband threadsD0 threadsD1 threadsD2 itemsD0 itemsD1 itemsD2 intType
//! ```
//!
//! Lines that do not start with an ASCII letter (blank lines, `#` comments,
//! numeric output of a tuning run) are skipped. Lines with too few fields are
//! skipped with a warning.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use tracing::{debug, warn};

use pulsar_core::{PulsarError, Result};

use crate::conf::IntegrationConf;

/// Fields of one tuning-file line.
pub const LINE_FIELDS: usize = 3 + IntegrationConf::FIELD_COUNT;

type ByIntegration = BTreeMap<u32, IntegrationConf>;
type ByProblemSize = BTreeMap<u32, ByIntegration>;

/// Lookup table: device → problem size → integration factor → configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TunedIntegrationConf {
    table: BTreeMap<String, ByProblemSize>,
}

impl TunedIntegrationConf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a configuration, returning the one it replaced.
    pub fn insert(
        &mut self,
        device: impl Into<String>,
        problem_size: u32,
        integration: u32,
        conf: IntegrationConf,
    ) -> Option<IntegrationConf> {
        self.table
            .entry(device.into())
            .or_default()
            .entry(problem_size)
            .or_default()
            .insert(integration, conf)
    }

    pub fn get(&self, device: &str, problem_size: u32, integration: u32) -> Option<&IntegrationConf> {
        self.table.get(device)?.get(&problem_size)?.get(&integration)
    }

    /// Like [`get`](Self::get), but a miss is a [`PulsarError::NotFound`].
    pub fn lookup(
        &self,
        device: &str,
        problem_size: u32,
        integration: u32,
    ) -> Result<&IntegrationConf> {
        self.get(device, problem_size, integration).ok_or_else(|| {
            PulsarError::NotFound(format!(
                "no integration configuration for device '{device}', \
                 problem size {problem_size}, integration {integration}"
            ))
        })
    }

    /// Number of configurations in the table.
    pub fn len(&self) -> usize {
        self.table
            .values()
            .flat_map(BTreeMap::values)
            .map(BTreeMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    /// All entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, u32, u32, &IntegrationConf)> {
        self.table.iter().flat_map(|(device, sizes)| {
            sizes.iter().flat_map(move |(&size, integrations)| {
                integrations
                    .iter()
                    .map(move |(&integration, conf)| (device.as_str(), size, integration, conf))
            })
        })
    }

    /// Reads a tuning file into a new table.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut table = Self::new();
        table.read_file(path)?;
        Ok(table)
    }

    /// Merges a tuning file into the table, returning the number of lines read.
    pub fn read_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            PulsarError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        let origin = path.display().to_string();
        let mut inserted = 0;
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                PulsarError::Io(std::io::Error::new(
                    e.kind(),
                    format!("{}: line {}: {}", origin, line_num + 1, e),
                ))
            })?;
            if self.merge_line(&line, line_num + 1, &origin)? {
                inserted += 1;
            }
        }
        debug!(path = %origin, entries = inserted, total = self.len(), "loaded tuned integration configurations");
        Ok(inserted)
    }

    /// Parses tuning-file text into a new table.
    pub fn parse_str(text: &str) -> Result<Self> {
        let mut table = Self::new();
        for (line_num, line) in text.lines().enumerate() {
            table.merge_line(line, line_num + 1, "<string>")?;
        }
        Ok(table)
    }

    fn merge_line(&mut self, line: &str, line_num: usize, origin: &str) -> Result<bool> {
        if !line.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Ok(false);
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < LINE_FIELDS {
            warn!(
                origin,
                line = line_num,
                fields = fields.len(),
                expected = LINE_FIELDS,
                "skipping short tuning line"
            );
            return Ok(false);
        }
        let located = |reason: String| {
            PulsarError::Parse(format!("{origin}: line {line_num}: {reason}"))
        };
        let number = |name: &str, field: &str| -> Result<u32> {
            field
                .parse()
                .map_err(|_| located(format!("invalid {name} '{field}'")))
        };
        let problem_size = number("problem size", fields[1])?;
        let integration = number("integration", fields[2])?;
        let conf = IntegrationConf::from_fields(&fields[3..]).map_err(|e| match e {
            PulsarError::Parse(reason) => located(reason),
            other => other,
        })?;
        self.insert(fields[0], problem_size, integration, conf);
        Ok(true)
    }

    /// Writes every entry as a tuning-file line.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        for (device, size, integration, conf) in self.entries() {
            writeln!(writer, "{}", entry_line(device, size, integration, conf))?;
        }
        Ok(())
    }

    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            PulsarError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        let mut writer = std::io::BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn to_file_string(&self) -> String {
        self.entries()
            .map(|(device, size, integration, conf)| {
                let mut line = entry_line(device, size, integration, conf);
                line.push('\n');
                line
            })
            .collect()
    }
}

/// Formats one tuning-file line.
pub fn entry_line(device: &str, problem_size: u32, integration: u32, conf: &IntegrationConf) -> String {
    format!("{device} {problem_size} {integration} {conf}")
}
