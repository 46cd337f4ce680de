//! Log categories
//!
//! Every log line the runtime emits carries a `tag` field with one of these
//! 4-character categories so hosts can filter script output from VM chatter.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    Error,
    Warn,
    Info,
    Vm,
}

impl LogTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogTag::Error => "ERR_",
            LogTag::Warn => "WARN",
            LogTag::Info => "INFO",
            LogTag::Vm => "BSVM",
        }
    }
}

impl fmt::Display for LogTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_four_chars() {
        for tag in [LogTag::Error, LogTag::Warn, LogTag::Info, LogTag::Vm] {
            assert_eq!(tag.as_str().len(), 4);
            assert_eq!(tag.to_string(), tag.as_str());
        }
    }
}
