pub mod assess;
pub mod error;
pub mod filter;
pub mod record;
pub mod window;

pub use record::Record;
