use serde::Serialize;
use thiserror::Error;

use crate::gas::Schedule;

/// Hard forks with distinct opcode sets or gas pricing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Revision {
    Istanbul,
    Berlin,
    #[default]
    London,
    Shanghai,
    Cancun,
}

#[derive(Error, Debug)]
#[error("Unknown revision: '{0}'")]
pub struct UnknownRevision(String);

impl Revision {
    pub const ALL: [Revision; 5] = [
        Revision::Istanbul,
        Revision::Berlin,
        Revision::London,
        Revision::Shanghai,
        Revision::Cancun,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Revision::Istanbul => "istanbul",
            Revision::Berlin => "berlin",
            Revision::London => "london",
            Revision::Shanghai => "shanghai",
            Revision::Cancun => "cancun",
        }
    }

    pub fn schedule(&self) -> &'static Schedule {
        Schedule::of(*self)
    }

    /// Whether `opcode` exists in this revision.
    pub fn supports(&self, opcode: u8) -> bool {
        match opcode {
            // BASEFEE
            0x48 => *self >= Revision::London,
            // PUSH0
            0x5f => *self >= Revision::Shanghai,
            // BLOBHASH, BLOBBASEFEE, TLOAD, TSTORE, MCOPY
            0x49 | 0x4a | 0x5c | 0x5d | 0x5e => *self >= Revision::Cancun,
            _ => true,
        }
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Revision {
    type Err = UnknownRevision;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Revision::ALL
            .into_iter()
            .find(|revision| revision.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownRevision(s.to_string()))
    }
}
