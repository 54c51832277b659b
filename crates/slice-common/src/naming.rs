//! Title and output file naming for rendered slices.
//!
//! A pattern is literal text around a single `{index}` placeholder, which may
//! carry a zero-pad width: `level_{index:03}` turns slice 7 into `level_007`.
//! Indices wider than the pad simply grow (`level_1000`).

use crate::error::{SliceError, SliceResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default pattern, matching `level_000.png`, `level_001.png`, ...
pub const DEFAULT_TITLE_PATTERN: &str = "level_{index:03}";

/// Extension of every output file.
pub const OUTPUT_EXTENSION: &str = "png";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TitlePattern {
    prefix: String,
    suffix: String,
    width: usize,
}

impl TitlePattern {
    pub fn parse(pattern: &str) -> SliceResult<Self> {
        let start = pattern.find("{index").ok_or_else(|| {
            SliceError::invalid_input(format!("title pattern '{}' has no {{index}} placeholder", pattern))
        })?;
        let close = pattern[start..]
            .find('}')
            .map(|off| start + off)
            .ok_or_else(|| SliceError::invalid_input(format!("unclosed placeholder in '{}'", pattern)))?;

        let spec = &pattern[start + "{index".len()..close];
        let width = match spec {
            "" => 0,
            s if s.starts_with(':') => s[1..].trim_start_matches('0').parse::<usize>().or_else(|_| {
                // ":0" and ":" both mean no padding
                if s[1..].chars().all(|c| c == '0') {
                    Ok(0)
                } else {
                    Err(SliceError::invalid_input(format!("bad pad width '{}' in '{}'", &s[1..], pattern)))
                }
            })?,
            other => {
                return Err(SliceError::invalid_input(format!(
                    "unexpected '{}' in placeholder of '{}'",
                    other, pattern
                )))
            }
        };

        let suffix = &pattern[close + 1..];
        if suffix.contains("{index") {
            return Err(SliceError::invalid_input(format!(
                "title pattern '{}' has more than one placeholder",
                pattern
            )));
        }

        let prefix = &pattern[..start];
        let is_separator = |c: char| c == '/' || c == '\\';
        if prefix.contains(is_separator) || suffix.contains(is_separator) {
            return Err(SliceError::invalid_input(format!(
                "title pattern '{}' must not contain path separators",
                pattern
            )));
        }

        Ok(Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            width,
        })
    }

    /// Title for the slice at `index`.
    pub fn title(&self, index: usize) -> String {
        format!("{}{:0width$}{}", self.prefix, index, self.suffix, width = self.width)
    }

    /// `{dir}/{title}.png` for the slice at `index`.
    pub fn output_path(&self, dir: &Path, index: usize) -> PathBuf {
        output_path_for_title(dir, &self.title(index))
    }
}

/// `{dir}/{title}.png`.
pub fn output_path_for_title(dir: &Path, title: &str) -> PathBuf {
    dir.join(format!("{}.{}", title, OUTPUT_EXTENSION))
}

impl Default for TitlePattern {
    fn default() -> Self {
        Self {
            prefix: "level_".to_string(),
            suffix: String::new(),
            width: 3,
        }
    }
}

impl fmt::Display for TitlePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.width == 0 {
            write!(f, "{}{{index}}{}", self.prefix, self.suffix)
        } else {
            write!(f, "{}{{index:0{}}}{}", self.prefix, self.width, self.suffix)
        }
    }
}

impl FromStr for TitlePattern {
    type Err = SliceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TitlePattern {
    type Error = SliceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TitlePattern> for String {
    fn from(pattern: TitlePattern) -> Self {
        pattern.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_titles() {
        let pattern = TitlePattern::default();
        assert_eq!(pattern.title(0), "level_000");
        assert_eq!(pattern.title(42), "level_042");
        assert_eq!(pattern.title(999), "level_999");
        assert_eq!(pattern.title(1000), "level_1000");
    }

    #[test]
    fn test_default_matches_constant() {
        assert_eq!(TitlePattern::parse(DEFAULT_TITLE_PATTERN).unwrap(), TitlePattern::default());
        assert_eq!(TitlePattern::default().to_string(), DEFAULT_TITLE_PATTERN);
    }

    #[test]
    fn test_custom_patterns() {
        assert_eq!(TitlePattern::parse("frame_{index:05}").unwrap().title(12), "frame_00012");
        assert_eq!(TitlePattern::parse("z{index}_slice").unwrap().title(7), "z7_slice");
        assert_eq!(TitlePattern::parse("{index:0}").unwrap().title(7), "7");
    }

    #[test]
    fn test_rejects_bad_patterns() {
        assert!(TitlePattern::parse("level").is_err());
        assert!(TitlePattern::parse("level_{index").is_err());
        assert!(TitlePattern::parse("{index:x}").is_err());
        assert!(TitlePattern::parse("{index}_{index}").is_err());
        assert!(TitlePattern::parse("../{index}").is_err());
    }

    #[test]
    fn test_output_path() {
        let path = TitlePattern::default().output_path(Path::new("/tmp/figs"), 3);
        assert_eq!(path, PathBuf::from("/tmp/figs/level_003.png"));
    }
}
