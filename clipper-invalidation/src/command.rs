//! Line-oriented command protocol for the `clipper-invalidator` binary.
//!
//! ```text
//! job:deleted                 invalidate with the rule's keys
//! job:deleted job:42,jobs:7   invalidate with extra keys
//! force dashboard:stats       delete keys immediately
//! stats                       print a JSON stats snapshot
//! flush                       execute every pending burst now
//! ```

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Invalidate { event: String, extra_keys: Vec<String> },
    Force { keys: Vec<String> },
    Stats,
    Flush,
}

impl Command {
    /// Parse one line. Blank lines and `#` comments yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let mut parts = line.split_whitespace();
        let head = parts.next()?;
        let keys: Vec<String> = parts.flat_map(split_keys).collect();

        Some(match head {
            "stats" => Command::Stats,
            "flush" => Command::Flush,
            "force" => Command::Force { keys },
            event => Command::Invalidate {
                event: event.to_string(),
                extra_keys: keys,
            },
        })
    }
}

fn split_keys(token: &str) -> impl Iterator<Item = String> + '_ {
    token
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}
