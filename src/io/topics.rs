//! Reader for topic-model document-topic output
//!
//! One document per line, tab separated:
//!
//! ```text
//! doc<TAB>title<TAB>topic<TAB>weight<TAB>topic<TAB>weight...
//! ```
//!
//! Lines starting with `#` and blank lines are skipped. Fields are trimmed
//! and empty fields dropped. A line with `P` (topic, weight) pairs yields a
//! vector of `P + 1` components: the weights at their topic ids, then the
//! background component fixed at `1.0`.

use std::io::BufRead;

use rustc_hash::FxHashMap;

use crate::errors::{RankError, Result};

/// Weight of the background component appended to every vector
pub const BACKGROUND_WEIGHT: f64 = 1.0;

/// One parsed document line
#[derive(Debug, Clone, PartialEq)]
pub struct TopicLine {
    pub doc: String,
    pub title: String,
    /// Topic weights, background component last
    pub topics: Vec<f64>,
}

/// Streams [`TopicLine`]s, checking every line has the same vector length
pub struct TopicMapReader<R> {
    inner: R,
    line_no: usize,
    expected_len: Option<usize>,
    buf: String,
    done: bool,
}

impl<R: BufRead> TopicMapReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line_no: 0,
            expected_len: None,
            buf: String::new(),
            done: false,
        }
    }

    /// Vector length fixed by the first data line
    pub fn topic_len(&self) -> Option<usize> {
        self.expected_len
    }

    fn format_error(&self, message: impl std::fmt::Display) -> RankError {
        RankError::Format(format!("topic map line {}: {message}", self.line_no))
    }

    fn parse_line(&mut self, line: &str) -> Result<TopicLine> {
        let fields: Vec<&str> = line
            .split('\t')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .collect();
        if fields.len() < 2 {
            return Err(self.format_error("expected document and title fields"));
        }
        if fields.len() % 2 != 0 {
            return Err(self.format_error("topic id without a weight"));
        }

        let len = (fields.len() - 2) / 2 + 1;
        let expected_len = self.expected_len;
        match expected_len {
            None => self.expected_len = Some(len),
            Some(expected) if expected != len => {
                return Err(self.format_error(format!(
                    "{} has {len} topic components, expected {expected}",
                    fields[1]
                )));
            }
            Some(_) => {}
        }

        let mut topics = vec![0.0; len];
        topics[len - 1] = BACKGROUND_WEIGHT;
        for pair in fields[2..].chunks_exact(2) {
            let topic: usize = pair[0]
                .parse()
                .map_err(|_| self.format_error(format!("bad topic id {:?}", pair[0])))?;
            let weight: f64 = pair[1]
                .parse()
                .map_err(|_| self.format_error(format!("bad weight {:?}", pair[1])))?;
            if topic >= len - 1 {
                return Err(self.format_error(format!(
                    "topic {topic} out of range for {} topics",
                    len - 1
                )));
            }
            topics[topic] = weight;
        }

        Ok(TopicLine {
            doc: fields[0].to_string(),
            title: fields[1].to_string(),
            topics,
        })
    }
}

impl<R: BufRead> Iterator for TopicMapReader<R> {
    type Item = Result<TopicLine>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            self.buf.clear();
            match self.inner.read_line(&mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => self.line_no += 1,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }

            let line = std::mem::take(&mut self.buf);
            if line.starts_with('#') || line.trim().is_empty() {
                self.buf = line;
                continue;
            }
            let parsed = self.parse_line(&line);
            self.buf = line;
            if parsed.is_err() {
                self.done = true;
            }
            return Some(parsed);
        }
    }
}

/// Read a whole topic map keyed by title. A repeated title keeps the last line.
pub fn read_topic_map<R: BufRead>(reader: R) -> Result<FxHashMap<String, Vec<f64>>> {
    let mut map = FxHashMap::default();
    let mut lines = TopicMapReader::new(reader);
    for line in lines.by_ref() {
        let line = line?;
        map.insert(line.title, line.topics);
    }
    tracing::info!(
        documents = map.len(),
        topics = lines.topic_len().unwrap_or(0),
        "loaded topic map"
    );
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "#doc name topic proportion ...\n\
        0\tAda Lovelace\t1\t0.75\t0\t0.25\n\
        \n\
        1\tLondon\t0\t0.5\t1\t0.5\n\
        2\t Analytical Engine \t\t0\t0.9\t1\t0.1\n";

    #[test]
    fn test_reads_lines_with_background() {
        let lines: Vec<TopicLine> = TopicMapReader::new(Cursor::new(SAMPLE))
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].doc, "0");
        assert_eq!(lines[0].title, "Ada Lovelace");
        assert_eq!(lines[0].topics, vec![0.25, 0.75, 1.0]);
        // Trimmed title, empty field dropped
        assert_eq!(lines[2].title, "Analytical Engine");
        assert_eq!(lines[2].topics, vec![0.9, 0.1, 1.0]);
    }

    #[test]
    fn test_read_topic_map() {
        let map = read_topic_map(Cursor::new(SAMPLE)).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map["London"], vec![0.5, 0.5, 1.0]);
    }

    #[test]
    fn test_length_mismatch_names_line() {
        let input = "0\tA\t0\t1.0\n1\tB\t0\t0.5\t1\t0.5\n";
        let err = read_topic_map(Cursor::new(input)).unwrap_err();
        match err {
            RankError::Format(message) => {
                assert!(message.contains("line 2"), "{message}");
                assert!(message.contains('B'), "{message}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_topic_out_of_range() {
        let input = "0\tA\t2\t1.0\t0\t0.0\n";
        assert!(matches!(
            read_topic_map(Cursor::new(input)),
            Err(RankError::Format(_))
        ));
    }

    #[test]
    fn test_malformed_fields() {
        for input in ["0\tA\t0\n", "0\n", "0\tA\tx\t0.5\n", "0\tA\t0\tnope\n"] {
            assert!(
                matches!(read_topic_map(Cursor::new(input)), Err(RankError::Format(_))),
                "{input:?}"
            );
        }
    }

    #[test]
    fn test_stops_after_error() {
        let input = "0\tA\t0\n1\tB\t0\t0.5\n";
        let mut reader = TopicMapReader::new(Cursor::new(input));
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_title_only_line_is_background_only() {
        let lines: Vec<TopicLine> = TopicMapReader::new(Cursor::new("7\tOrphan\n"))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(lines[0].topics, vec![1.0]);
    }
}
