//! Document model types shared by every stage.
//!
//! Loaders produce [`LoadedDocument`]s made of [`Block`]s, the normalizer
//! turns them into [`NormalizedDocument`]s, and the aligner pairs blocks
//! of two documents into [`AlignedUnit`]s.

mod aligned;
mod block;
mod document;
mod resource;

pub use aligned::{is_monotone_cover, AlignMethod, AlignedUnit, BlockRef};
pub use block::{
    Alignment, Block, BlockKind, BlockPayload, BlockStyle, CellPosition, Direction, ImageRef,
    KindClass, SourceAnchor, TextRun, TextStyle,
};
pub use document::{DocumentMetadata, LoadedDocument, NormalizedDocument, SourceDocument};
pub use resource::{mime_from_name, ImageResource};
