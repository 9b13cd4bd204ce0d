mod lpm;
mod seen;

pub use lpm::{decode_key, encode_key, LongestPrefixStore};
pub use seen::SeenStore;
