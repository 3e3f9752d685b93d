//! Channel List and Progress Bookkeeping.
//!
pub mod scheduler;
pub mod score;

use std::fs;
use std::path::Path;

use crate::module::error::{Result, TvcapError};

/// One addressable broadcast source.
///
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub index: usize,     // Position in channels.map
    pub label: String,    // Classifier label and snapshot directory name
    pub tune_key: String, // Argument handed to the tune command
}

/// Parse `channels.map`.
///
/// One channel per line: `<label> [<tune-key>]`. Blank lines and `#`
/// comments are skipped. The tune key defaults to the label.
pub fn parse(text: &str) -> Result<Vec<Channel>> {
    let mut channels: Vec<Channel> = vec![];
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let label = match fields.next() {
            Some(label) => label.to_string(),
            None => continue,
        };
        if label.contains(std::path::is_separator) || label == "." || label == ".." {
            return Err(TvcapError::ChannelList(format!(
                "line {}: label {:?} is not a valid directory name",
                lineno + 1,
                label
            )));
        }
        if channels.iter().any(|c| c.label == label) {
            return Err(TvcapError::ChannelList(format!(
                "line {}: duplicate label {:?}",
                lineno + 1,
                label
            )));
        }
        let tune_key = fields.next().unwrap_or(&label).to_string();
        channels.push(Channel {
            index: channels.len(),
            label,
            tune_key,
        });
    }
    Ok(channels)
}

/// Load and parse a channel list file.
pub fn load(path: &Path) -> Result<Vec<Channel>> {
    let text = fs::read_to_string(path)?;
    let channels = parse(&text)?;
    log::info!("{} channels loaded from {}", channels.len(), path.display());
    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_test() {
        let text = "# label key\n101 0x65\n\n102\n  bs1   7 trailing\n";
        let channels = parse(text).unwrap();
        assert_eq!(channels.len(), 3);
        assert_eq!(
            channels[0],
            Channel {
                index: 0,
                label: "101".to_string(),
                tune_key: "0x65".to_string()
            }
        );
        assert_eq!(channels[1].tune_key, "102");
        assert_eq!(channels[2].index, 2);
        assert_eq!(channels[2].label, "bs1");
        assert_eq!(channels[2].tune_key, "7");
    }

    #[test]
    fn parse_rejects_bad_labels() {
        assert!(parse("101\n101\n").is_err());
        assert!(parse("../x\n").is_err());
        assert!(parse("..\n").is_err());
    }

    #[test]
    fn load_test() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("channels.map");
        fs::write(&file, "1\n2\n").unwrap();
        assert_eq!(load(&file).unwrap().len(), 2);
        assert!(load(&tmp.path().join("missing.map")).is_err());
    }
}
