pub mod bounded;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod hashlist;
pub mod hexify;
pub mod io;
pub mod lock;
pub mod mode;
pub mod pot;
pub mod report;
pub mod sink;
pub mod writer;

pub mod prelude {
    pub use crate::catalog::{Catalog, HashEntry};
    pub use crate::config::{Potfile, RunOptions};
    pub use crate::error::PotfileError;
    pub use crate::mode::{HashMode, builtin};
    pub use crate::sink::{OutputSink, ReportKind};
    pub use crate::writer::PotfileWriter;
}
