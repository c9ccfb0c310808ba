//! The control files of a group.
//!
//! Each group exposes three files: the rate and burst, which can be read and written as
//! unsigned integers, and a read-only statistics report.

use std::{fmt, str::FromStr};

use tracing::debug;

use crate::{Error, GroupId, Hierarchy, Result};

pub const RATE_FILE: &str = "cgroup.net_shaper.rate";
pub const BURST_FILE: &str = "cgroup.net_shaper.burst";
pub const STATS_FILE: &str = "cgroup.net_shaper.stats";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFile {
    /// Bytes per second.
    Rate,
    /// Bytes allowed above the rate within one interval.
    Burst,
    Stats,
}

impl ControlFile {
    pub const ALL: [ControlFile; 3] = [Self::Rate, Self::Burst, Self::Stats];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Rate => RATE_FILE,
            Self::Burst => BURST_FILE,
            Self::Stats => STATS_FILE,
        }
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self, Self::Stats)
    }
}

impl fmt::Display for ControlFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ControlFile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|file| file.name() == s)
            .ok_or_else(|| Error::UnknownFile(s.to_string()))
    }
}

/// Parses a limit the way the kernel parses a `u64` control file, then checks that it fits the
/// 32-bit limits of a group.
fn parse_limit(file: ControlFile, value: &str) -> Result<u32> {
    let invalid = || Error::InvalidValue { file: file.name(), value: value.to_string() };

    let parsed: u64 = value.trim().parse().map_err(|_| invalid())?;
    u32::try_from(parsed).map_err(|_| invalid())
}

impl Hierarchy {
    /// Reads a control file of a group.
    pub fn read_file(&self, group: GroupId, name: &str) -> Result<String> {
        let file: ControlFile = name.parse()?;
        let shaper = self.shaper(group)?;

        Ok(match file {
            ControlFile::Rate => format!("{}\n", shaper.rate()),
            ControlFile::Burst => format!("{}\n", shaper.burst()),
            ControlFile::Stats => shaper.snapshot().to_string(),
        })
    }

    /// Writes a control file of a group. Any value that fits is accepted, including zero.
    pub fn write_file(&self, group: GroupId, name: &str, value: &str) -> Result<()> {
        let file: ControlFile = name.parse()?;
        let shaper = self.shaper(group)?;

        let limit = match file {
            ControlFile::Rate => {
                let rate = parse_limit(file, value)?;
                shaper.set_rate(rate);
                rate
            }
            ControlFile::Burst => {
                let burst = parse_limit(file, value)?;
                shaper.set_burst(burst);
                burst
            }
            ControlFile::Stats => return Err(Error::ReadOnly(file.name())),
        };

        debug!(%group, %file, limit, "Updated limit");
        Ok(())
    }
}
