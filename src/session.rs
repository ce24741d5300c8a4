//! Default connection tracking
//!
//! A role works with at most one connection at a time. The [`Session`]
//! owns the host reference to it and the security level it has reached.

use core::fmt;

use crate::host::{ConnHandle, ConnectionRefs, HostError};
use crate::security::SecurityLevel;

/// Session errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// A different connection is already the default
    Busy,
    /// Host refused the reference
    Host(HostError),
}

impl From<HostError> for SessionError {
    fn from(e: HostError) -> Self {
        Self::Host(e)
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => f.write_str("another connection is active"),
            Self::Host(e) => write!(f, "host: {}", e),
        }
    }
}

/// The default connection and its security level
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    conn: Option<ConnHandle>,
    security: SecurityLevel,
}

impl Session {
    pub const fn new() -> Self {
        Self {
            conn: None,
            security: SecurityLevel::None,
        }
    }

    /// Take a reference on `conn` and make it the default
    pub fn attach<H: ConnectionRefs>(&mut self, host: &mut H, conn: ConnHandle) -> Result<(), SessionError> {
        match self.conn {
            Some(current) if current == conn => return Ok(()),
            Some(_) => return Err(SessionError::Busy),
            None => {}
        }
        let conn = host.conn_ref(conn)?;
        self.conn = Some(conn);
        self.security = SecurityLevel::None;
        Ok(())
    }

    /// Make an already referenced `conn` the default
    pub fn adopt(&mut self, conn: ConnHandle) -> Result<(), SessionError> {
        if self.conn.is_some() {
            return Err(SessionError::Busy);
        }
        self.conn = Some(conn);
        self.security = SecurityLevel::None;
        Ok(())
    }

    /// Drop the reference if `conn` is the default; returns whether it was
    pub fn release<H: ConnectionRefs>(&mut self, host: &mut H, conn: ConnHandle) -> bool {
        if !self.is_default(conn) {
            return false;
        }
        host.conn_unref(conn);
        self.conn = None;
        self.security = SecurityLevel::None;
        true
    }

    pub fn is_default(&self, conn: ConnHandle) -> bool {
        self.conn == Some(conn)
    }

    pub fn conn(&self) -> Option<ConnHandle> {
        self.conn
    }

    pub fn security(&self) -> SecurityLevel {
        self.security
    }

    /// Record a security change; ignored for anything but the default
    pub fn update_security(&mut self, conn: ConnHandle, level: SecurityLevel) -> bool {
        if !self.is_default(conn) {
            return false;
        }
        self.security = level;
        true
    }

    /// Whether the default connection has reached `required`
    pub fn is_secure(&self, required: SecurityLevel) -> bool {
        self.conn.is_some() && self.security.satisfies(required)
    }
}
