mod event;
mod prefix;
mod raw_message;

pub use event::{GeoPoint, PrefixEvent, PrimaryKind, SecondaryKind};
pub use prefix::Prefix;
pub use raw_message::{Announcement, MessageKind, RawMessage, RisEnvelope};
