//! Document-level search: payload binding, index strategies and the
//! background build that swaps a fresh index in per document.

mod facade;
mod payload;
mod session;
mod strategy;

pub use facade::{BatchReport, SearchFacade, SearchHit};
pub use payload::{Embeddable, Rect, TextSpan};
pub use session::{DocumentIndexer, IndexEvent, SearchSession};
pub use strategy::{IndexKind, IndexStrategy, build_strategy};
