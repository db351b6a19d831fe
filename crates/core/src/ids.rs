//! Identifier newtypes for sites, variables, and transactions.
//!
//! Each identifier is a thin wrapper over its natural representation so that
//! site ids, variable ids, and transaction ids can't be swapped for one
//! another at a call site by accident.

use std::fmt;

/// A site identifier, 1..=10.
///
/// Stored as `u8`; validity against a given [`crate::SimulatorConfig`] is the
/// caller's responsibility — this type just prevents mixing a site id up with
/// a variable index or a commit timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SiteId(u8);

impl SiteId {
    /// Wrap a raw site number.
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// The raw site number.
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A variable identifier, e.g. `x4`.
///
/// Stored as the bare index (`4` for `x4`) rather than the formatted string so
/// replication/location lookups (`i % 2`, `i % 10 + 1`) stay arithmetic instead
/// of string parsing at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariableId(u32);

impl VariableId {
    /// Wrap a raw variable index (the `i` in `xi`).
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// The raw variable index.
    pub const fn index(self) -> u32 {
        self.0
    }

    /// Whether this variable is replicated at every site (even index).
    pub const fn is_replicated(self) -> bool {
        self.0 % 2 == 0
    }

    /// The single site hosting this variable under the canonical 10-site
    /// layout, if it is not replicated.
    ///
    /// Returns `None` for replicated variables, which live at every site.
    pub fn home_site(self) -> Option<SiteId> {
        self.home_site_for(10)
    }

    /// The single site hosting this variable under a `site_count`-site
    /// layout: `(i mod site_count) + 1`.
    ///
    /// Returns `None` for replicated variables, which live at every site.
    pub fn home_site_for(self, site_count: u8) -> Option<SiteId> {
        if self.is_replicated() {
            None
        } else {
            Some(SiteId::new(((self.0 % site_count as u32) + 1) as u8))
        }
    }

    /// Parse a variable name like `x4` into a `VariableId(4)`.
    pub fn parse(name: &str) -> Option<Self> {
        let digits = name.strip_prefix('x')?;
        digits.parse().ok().map(Self)
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// A transaction identifier, e.g. `T1`.
///
/// Kept as an owned `String` (not interned) — scripts never run with enough
/// concurrently live transactions for the allocation to matter, and owning the
/// string keeps `Transaction` and `Waiter` free of lifetime parameters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(String);

impl TransactionId {
    /// Wrap a transaction name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The transaction name as written in the script (e.g. `"T1"`).
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
