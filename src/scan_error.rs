use std::{error::Error, fmt, io};

pub type GenericError = Box<dyn Error + Send + Sync + 'static>;

pub type ScanResult<T> = std::result::Result<T, ScanError>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScanErrorKind {
    /// `Scanner::start` was called while a run was in progress.
    AlreadyRunning,
    /// The configured thread count is below one.
    InvalidThreadCount,
    /// The selected probe strategy cannot run at all on this host, e.g. the raw
    /// ICMP socket could not be created because of missing privileges.
    ProbeUnavailable,
    /// Bytes on the wire could not be decoded.
    MalformedPacket,
    Io,
}

#[derive(Debug)]
pub struct ScanError {
    pub kind: ScanErrorKind,
    pub message: String,
    // no chained error
}

impl ScanError {
    pub fn new(kind: ScanErrorKind, message: impl Into<String>) -> Self {
        ScanError { kind, message: message.into() }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::MalformedPacket, message)
    }

    pub(crate) fn probe_unavailable(error: &io::Error) -> Self {
        Self::new(ScanErrorKind::ProbeUnavailable, error.to_string())
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "ScanError")?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

impl Error for ScanError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}

impl From<io::Error> for ScanError {
    fn from(error: io::Error) -> ScanError {
        ScanError { kind: ScanErrorKind::Io, message: error.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;

    use super::*;

    #[test]
    fn derive_debug() {
        let scan_error = ScanError::new(ScanErrorKind::Io, "testing std::fmt::Debug");
        let fmt_debug_str = format!("{scan_error:?}");
        assert_eq!("ScanError { kind: Io, message: \"testing std::fmt::Debug\" }", fmt_debug_str);
    }

    #[test]
    fn fmt_without_message() {
        let scan_error = ScanError::new(ScanErrorKind::AlreadyRunning, "");
        assert_eq!("ScanError", format!("{scan_error}"));
    }

    #[test]
    fn fmt_with_message() {
        let scan_error = ScanError::malformed("truncated ICMP header");
        assert_eq!("ScanError: truncated ICMP header", format!("{scan_error}"));
    }

    #[test]
    fn source() {
        assert!(ScanError::new(ScanErrorKind::Io, String::new()).source().is_none());
    }

    #[test]
    fn scan_error_from_std_io_error() {
        let scan_error = ScanError::from(std::io::Error::from(ErrorKind::Other));
        assert_eq!(ScanErrorKind::Io, scan_error.kind);
        assert!(scan_error.source().is_none());
    }

    #[test]
    fn probe_unavailable_keeps_io_message() {
        let io_error = std::io::Error::new(ErrorKind::PermissionDenied, "operation not permitted");
        let scan_error = ScanError::probe_unavailable(&io_error);
        assert_eq!(ScanErrorKind::ProbeUnavailable, scan_error.kind);
        assert_eq!("ScanError: operation not permitted", scan_error.to_string());
    }
}
