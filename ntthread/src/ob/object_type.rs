//! Object Type Tags
//!
//! The type tag every handle carries. Values follow the well-known NT
//! object type indices.

use core::fmt;

/// Object type index values (well-known types)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObjectType {
    /// Thread object
    Thread = 5,
    /// Event object
    Event = 6,
}

impl ObjectType {
    /// NT type name
    pub fn name(self) -> &'static str {
        match self {
            ObjectType::Thread => "Thread",
            ObjectType::Event => "Event",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
