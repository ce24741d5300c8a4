//! Advertisement parsing and target matching for the central role

use crate::advertising::{ad_type, AdError};
use crate::host::{Address, AdvReportKind, CentralHost, ConnHandle, HostError};

/// One `[len][type][data]` record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdRecord<'a> {
    pub ad_type: u8,
    pub data: &'a [u8],
}

/// Iterator over the records of an advertising payload
///
/// Stops at a zero length byte or when fewer than two bytes remain. A record
/// claiming more bytes than remain yields [`AdError::Malformed`] once and
/// ends iteration.
#[derive(Debug, Clone)]
pub struct AdIter<'a> {
    buf: &'a [u8],
}

impl<'a> AdIter<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }
}

impl<'a> Iterator for AdIter<'a> {
    type Item = Result<AdRecord<'a>, AdError>;

    fn next(&mut self) -> Option<Self::Item> {
        let buf: &'a [u8] = self.buf;
        let (&len, rest) = match buf {
            [len, rest @ ..] if !rest.is_empty() => (len, rest),
            _ => return None,
        };
        let len = usize::from(len);
        if len == 0 {
            self.buf = &[];
            return None;
        }
        if len > rest.len() {
            self.buf = &[];
            return Some(Err(AdError::Malformed));
        }

        let (record, tail) = rest.split_at(len);
        self.buf = tail;
        Some(Ok(AdRecord {
            ad_type: record[0],
            data: &record[1..],
        }))
    }
}

/// Whether a 128-bit UUID list in `data` contains `target`
pub fn contains_uuid128(data: &[u8], target: &[u8; 16]) -> bool {
    for record in AdIter::new(data) {
        let record = match record {
            Ok(record) => record,
            Err(_) => {
                log::warn!("[scan] AD malformed");
                return false;
            }
        };
        if record.ad_type != ad_type::UUID128_INCOMPLETE && record.ad_type != ad_type::UUID128_COMPLETE {
            continue;
        }
        if record.data.len() % 16 != 0 {
            log::warn!("[scan] AD malformed UUID list ({} bytes)", record.data.len());
            continue;
        }
        if record.data.chunks_exact(16).any(|uuid| uuid == target) {
            return true;
        }
    }
    false
}

/// Connects to the first connectable advertiser carrying the target UUID
///
/// Once a connection is initiated the scanner stays latched until
/// [`TargetScanner::rearm`], so repeated reports cannot start a second one.
#[derive(Debug, Clone)]
pub struct TargetScanner {
    target: [u8; 16],
    latched: bool,
}

impl TargetScanner {
    pub const fn new(target: [u8; 16]) -> Self {
        Self { target, latched: false }
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }

    /// Allow another connection attempt
    pub fn rearm(&mut self) {
        self.latched = false;
    }

    /// Whether a report of `kind` with payload `data` is a candidate
    pub fn matches(&self, kind: AdvReportKind, data: &[u8]) -> bool {
        kind.is_connectable() && contains_uuid128(data, &self.target)
    }

    /// Handle an advertising report.
    ///
    /// On a match the scan is stopped and a connection created. Returns the
    /// new connection, or `None` when the report was not used.
    pub fn on_report<H: CentralHost>(
        &mut self,
        host: &mut H,
        addr: &Address,
        kind: AdvReportKind,
        data: &[u8],
    ) -> Result<Option<ConnHandle>, HostError> {
        if self.latched || !self.matches(kind, data) {
            return Ok(None);
        }

        if let Err(e) = host.stop_scan() {
            log::warn!("[scan] Stop LE scan failed ({})", e);
            return Ok(None);
        }

        let conn = host.create_connection(addr)?;
        self.latched = true;
        log::info!("[scan] connecting to {}", addr);
        Ok(Some(conn))
    }
}
