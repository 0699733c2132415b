pub mod provider;

pub use provider::{PageMap, PageProvider};
