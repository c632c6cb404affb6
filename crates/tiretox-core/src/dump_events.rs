use std::io::Read;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::Deserialize;
use tiretox_parser::frame::naive_to_micros;
use tiretox_parser::parse_timestamp_text;

use crate::error::{PipelineError, Result};
use crate::saltwave::SaltwaveSelection;

/// Supplies salt-dump times for a site, used to annotate selections.
pub trait DumpEventSource {
    fn dump_times(&self, site: &str) -> Result<Vec<NaiveDateTime>>;
}

#[derive(Debug, Deserialize)]
struct DumpRow {
    site: String,
    dump_time: String,
}

/// Dump log exported as CSV with a `site,dump_time` header.
#[derive(Debug, Clone, Default)]
pub struct CsvDumpEvents {
    events: Vec<(String, NaiveDateTime)>,
}

impl CsvDumpEvents {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut events = Vec::new();
        for (idx, row) in csv_reader.deserialize::<DumpRow>().enumerate() {
            let row = row?;
            let time = parse_timestamp_text(&row.dump_time).ok_or_else(|| {
                PipelineError::Selection(format!(
                    "dump log row {}: invalid dump_time '{}'",
                    idx + 2,
                    row.dump_time
                ))
            })?;
            events.push((row.site, time));
        }
        Ok(Self { events })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|source| PipelineError::io(path, source))?;
        Self::from_reader(file)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl DumpEventSource for CsvDumpEvents {
    fn dump_times(&self, site: &str) -> Result<Vec<NaiveDateTime>> {
        let mut times: Vec<NaiveDateTime> = self
            .events
            .iter()
            .filter(|(event_site, _)| event_site == site)
            .map(|(_, time)| *time)
            .collect();
        times.sort();
        Ok(times)
    }
}

/// Dump times falling inside the selected window.
pub fn events_within(events: &[NaiveDateTime], selection: &SaltwaveSelection) -> Vec<NaiveDateTime> {
    events
        .iter()
        .copied()
        .filter(|time| {
            let ts = naive_to_micros(*time);
            ts >= selection.start && ts <= selection.end
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_events_filter_by_site_and_window() {
        let log = "site,dump_time\nQQM,2024-12-17 11:05:00\nQQM,2024-12-17 10:55:00\nCH2,2024-12-17 11:00:00\n";
        let source = CsvDumpEvents::from_reader(log.as_bytes()).expect("dump log");
        assert_eq!(source.len(), 3);

        let times = source.dump_times("QQM").unwrap();
        assert_eq!(times.len(), 2);
        assert!(times[0] < times[1]);

        let selection = SaltwaveSelection {
            start: naive_to_micros(times[0]),
            end: naive_to_micros(times[0]) + 60_000_000,
            dump: 1,
        };
        assert_eq!(events_within(&times, &selection), vec![times[0]]);
    }

    #[test]
    fn invalid_dump_time_is_rejected() {
        let log = "site,dump_time\nQQM,yesterday\n";
        assert!(CsvDumpEvents::from_reader(log.as_bytes()).is_err());
    }
}
