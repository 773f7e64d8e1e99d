//! Bilingual layout composition.
//!
//! The [`Composer`] turns aligned units into a [`LayoutTree`]: pages of
//! sections holding side-by-side rows, interleaved blocks and image frames,
//! each carrying resolved fonts and sizes. The tree is target-agnostic;
//! encoders only read it.

mod composer;
mod config;
mod images;
pub mod metrics;
mod node;
mod paginate;

pub use composer::Composer;
pub use config::{
    FormatConfig, ImagePlacement, ImageQuality, Language, LayoutMode, Margins, PageGeometry,
    PageSize, PT_PER_CM,
};
pub use images::{ImageStore, ProcessedImage, QualityPolicy};
pub use node::{Cell, CellContent, FontSpec, ImageFrame, LayoutNode, LayoutTree, NodeKind};
pub use paginate::paginate;

#[cfg(test)]
pub(crate) use images::test_png;
