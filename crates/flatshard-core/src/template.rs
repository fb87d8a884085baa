//! Numbered shard filenames
//!
//! A template such as `index/index_%d.shard` carries exactly one `%d`
//! placeholder, replaced by the 1-based shard sequence number.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

pub const PLACEHOLDER: &str = "%d";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Shard filename template \"{template}\" must contain exactly one %d, found {found}")]
    Placeholder { template: String, found: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardTemplate {
    prefix: String,
    suffix: String,
}

impl ShardTemplate {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let found = template.matches(PLACEHOLDER).count();
        match template.split_once(PLACEHOLDER) {
            Some((prefix, suffix)) if found == 1 => Ok(Self {
                prefix: prefix.to_string(),
                suffix: suffix.to_string(),
            }),
            _ => Err(TemplateError::Placeholder {
                template: template.to_string(),
                found,
            }),
        }
    }

    /// Path of shard number `sequence` (1-based)
    pub fn path_for(&self, sequence: u32) -> PathBuf {
        PathBuf::from(format!("{}{}{}", self.prefix, sequence, self.suffix))
    }

    /// Existence probe used to detect the end of a shard sequence
    pub fn exists(&self, sequence: u32) -> bool {
        self.path_for(sequence).is_file()
    }

    /// Number of contiguous shards present on disk, starting at 1
    pub fn count_existing(&self) -> u32 {
        (1..).take_while(|&n| self.exists(n)).count() as u32
    }
}

impl fmt::Display for ShardTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.prefix, PLACEHOLDER, self.suffix)
    }
}

impl FromStr for ShardTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
