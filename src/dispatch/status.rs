use std::fmt;

use parking_lot::Mutex;
use parking_lot::MutexGuard;
use serde::Serialize;
use serde::Serializer;

use crate::runtime::Error;
use crate::runtime::Result;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SegmentStatus {
    Untouched,
    Busy,
    Done,
    Error,
}

impl SegmentStatus {
    /// Name used in status records and logs
    pub const fn as_str(&self) -> &'static str {
        match self {
            SegmentStatus::Untouched => "UNTOUCHED",
            SegmentStatus::Busy => "BUSY",
            SegmentStatus::Done => "DONE",
            SegmentStatus::Error => "ERROR",
        }
    }

    /// Done and Error are final; nothing transitions out of them
    pub fn is_terminal(&self) -> bool {
        matches!(self, SegmentStatus::Done | SegmentStatus::Error)
    }
}

impl fmt::Display for SegmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SegmentStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

struct TableState {
    statuses: Vec<SegmentStatus>,
    finalized: bool,
}

///////////////////////////////
/// Status of every segment of one sample. All mutation goes through the guard
/// returned by lock(), which covers the whole array
pub struct SegmentStatusTable {
    sample: usize,
    segments: Vec<String>,
    state: Mutex<TableState>,
}

impl SegmentStatusTable {
    pub fn new(sample: usize, segments: Vec<String>) -> SegmentStatusTable {
        let statuses = vec![SegmentStatus::Untouched; segments.len()];
        SegmentStatusTable {
            sample,
            segments,
            state: Mutex::new(TableState {
                statuses,
                finalized: false,
            }),
        }
    }

    pub fn sample(&self) -> usize {
        self.sample
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn lock(&self) -> StatusGuard<'_> {
        StatusGuard {
            table: self,
            state: self.state.lock(),
        }
    }

    /// Point read. Takes the lock only for the duration of the read; callers
    /// doing compare-and-set must use lock() instead
    pub fn get(&self, index: usize) -> Result<(&str, SegmentStatus)> {
        let status = self.lock().status(index)?;
        Ok((self.segments[index].as_str(), status))
    }

    pub fn set(&self, index: usize, status: SegmentStatus) -> Result<()> {
        self.lock().set(index, status)
    }

    pub fn snapshot(&self) -> Vec<SegmentStatus> {
        self.state.lock().statuses.clone()
    }

    pub fn is_finalized(&self) -> bool {
        self.state.lock().finalized
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.segments.len() {
            Ok(())
        } else {
            Err(Error::out_of_range(self.sample, index, self.segments.len()))
        }
    }
}

impl fmt::Debug for SegmentStatusTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentStatusTable")
            .field("sample", &self.sample)
            .field("segments", &self.segments)
            .field("statuses", &self.snapshot())
            .finish()
    }
}

/// Held lock over a whole status table. Dropping it unlocks
pub struct StatusGuard<'a> {
    table: &'a SegmentStatusTable,
    state: MutexGuard<'a, TableState>,
}

impl<'a> StatusGuard<'a> {
    pub fn get(&self, index: usize) -> Result<(&'a str, SegmentStatus)> {
        let status = self.status(index)?;
        Ok((self.table.segments[index].as_str(), status))
    }

    pub fn status(&self, index: usize) -> Result<SegmentStatus> {
        self.table.check_index(index)?;
        Ok(self.state.statuses[index])
    }

    pub fn set(&mut self, index: usize, status: SegmentStatus) -> Result<()> {
        self.table.check_index(index)?;
        self.state.statuses[index] = status;
        Ok(())
    }

    /// Untouched -> Busy. Returns false if someone else got there first
    pub fn try_claim(&mut self, index: usize) -> Result<bool> {
        if self.status(index)? != SegmentStatus::Untouched {
            return Ok(false);
        }
        self.state.statuses[index] = SegmentStatus::Busy;
        Ok(true)
    }

    /// First Untouched index strictly after `index`
    pub fn next_untouched_from(&self, index: usize) -> Option<usize> {
        let start = index.saturating_add(1);
        self.state
            .statuses
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, s)| **s == SegmentStatus::Untouched)
            .map(|(i, _)| i)
    }

    pub fn all_terminal(&self) -> bool {
        self.state.statuses.iter().all(|s| s.is_terminal())
    }

    /// Sets the finalized flag if every segment is terminal and nobody has
    /// finalized yet. At most one caller per table ever gets true
    pub fn try_mark_finalized(&mut self) -> bool {
        if self.state.finalized || !self.all_terminal() {
            return false;
        }
        self.state.finalized = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(names: &[&str]) -> SegmentStatusTable {
        SegmentStatusTable::new(0, names.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn starts_untouched() {
        let t = table(&["chr1", "chr2", "chr3"]);
        assert_eq!(t.len(), 3);
        for i in 0..3 {
            assert_eq!(t.get(i).unwrap().1, SegmentStatus::Untouched);
        }
        assert_eq!(t.get(1).unwrap().0, "chr2");
    }

    #[test]
    fn out_of_range_leaves_table_alone() {
        let t = table(&["chr1", "chr2"]);
        t.set(0, SegmentStatus::Done).unwrap();

        let err = t.set(2, SegmentStatus::Error).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { index: 2, len: 2, .. }));
        assert!(matches!(t.get(5), Err(Error::OutOfRange { index: 5, .. })));
        assert!(t.get(usize::MAX).is_err());

        assert_eq!(t.snapshot(), vec![SegmentStatus::Done, SegmentStatus::Untouched]);
    }

    #[test]
    fn claim_only_once() {
        let t = table(&["chr1"]);
        let mut g = t.lock();
        assert!(g.try_claim(0).unwrap());
        assert!(!g.try_claim(0).unwrap());
        assert_eq!(g.status(0).unwrap(), SegmentStatus::Busy);
    }

    #[test]
    fn next_untouched_scans_strictly_ahead() {
        let t = table(&["a", "b", "c", "d", "e"]);
        let mut g = t.lock();
        g.set(2, SegmentStatus::Busy).unwrap();
        g.set(3, SegmentStatus::Done).unwrap();

        assert_eq!(g.next_untouched_from(0), Some(1));
        assert_eq!(g.next_untouched_from(1), Some(4));
        assert_eq!(g.next_untouched_from(4), None);
        assert_eq!(g.next_untouched_from(100), None);
        assert_eq!(g.next_untouched_from(usize::MAX), None);
    }

    #[test]
    fn all_terminal_needs_every_segment() {
        let t = table(&["chr1", "chr2"]);
        let mut g = t.lock();
        g.set(0, SegmentStatus::Done).unwrap();
        assert!(!g.all_terminal());
        g.set(1, SegmentStatus::Busy).unwrap();
        assert!(!g.all_terminal());
        g.set(1, SegmentStatus::Error).unwrap();
        assert!(g.all_terminal());
    }

    #[test]
    fn finalized_flag_is_set_once() {
        let t = table(&["chr1"]);
        {
            let mut g = t.lock();
            assert!(!g.try_mark_finalized());
            g.set(0, SegmentStatus::Done).unwrap();
            assert!(g.try_mark_finalized());
            assert!(!g.try_mark_finalized());
        }
        assert!(t.is_finalized());
    }

    #[test]
    fn display_matches_record_format() {
        assert_eq!(SegmentStatus::Done.to_string(), "DONE");
        assert_eq!(SegmentStatus::Busy.to_string(), SegmentStatus::Busy.as_str());
        assert_eq!(SegmentStatus::Error.to_string(), "ERROR");
        assert!(!SegmentStatus::Busy.is_terminal());
    }
}
