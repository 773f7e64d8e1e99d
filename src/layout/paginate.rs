//! Greedy pagination.

use super::node::{LayoutNode, NodeKind};

/// Distribute sections of leaf rows over pages of `content_height` points.
///
/// A row moves to a new page when it does not fit in the remaining space
/// of a page that already holds content; a row taller than a whole page
/// occupies a page of its own. Sections that cross a page boundary
/// continue on the next page. Rows are never split or reordered, so the
/// same input always yields the same pages.
pub fn paginate(sections: Vec<Vec<LayoutNode>>, content_height: f32) -> Vec<LayoutNode> {
    let mut pages: Vec<LayoutNode> = Vec::new();
    let mut page_sections: Vec<LayoutNode> = Vec::new();
    let mut used = 0.0f32;

    for rows in sections {
        let mut current: Vec<LayoutNode> = Vec::new();
        let mut continued = false;
        for row in rows {
            if used > 0.0 && used + row.height_pt > content_height {
                if !current.is_empty() {
                    page_sections.push(section(std::mem::take(&mut current), continued));
                    continued = true;
                }
                close_page(&mut pages, &mut page_sections);
                used = 0.0;
            }
            used += row.height_pt;
            current.push(row);
        }
        if !current.is_empty() {
            page_sections.push(section(current, continued));
        }
    }
    if !page_sections.is_empty() || pages.is_empty() {
        close_page(&mut pages, &mut page_sections);
    }
    pages
}

fn section(rows: Vec<LayoutNode>, continued: bool) -> LayoutNode {
    LayoutNode::container(NodeKind::Section { continued }, rows)
}

fn close_page(pages: &mut Vec<LayoutNode>, sections: &mut Vec<LayoutNode>) {
    let number = pages.len() as u32 + 1;
    pages.push(LayoutNode::container(
        NodeKind::Page { number },
        std::mem::take(sections),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::config::Language;
    use crate::layout::node::{Cell, CellContent, FontSpec};
    use crate::model::{Alignment, BlockKind, Direction, TextRun};

    fn row(unit: usize, height: f32) -> LayoutNode {
        let cell = Cell {
            source: Language::First,
            ordinal: unit,
            kind: BlockKind::Paragraph,
            direction: Direction::Ltr,
            alignment: Alignment::Start,
            list_level: 0,
            ordered: false,
            font: FontSpec {
                family: "Serif".into(),
                size_pt: 12.0,
            },
            content: CellContent::Text {
                runs: vec![TextRun::new("x")],
            },
            height_pt: height,
        };
        LayoutNode::leaf(NodeKind::InterleavedBlock(cell), unit, height)
    }

    fn page_units(page: &LayoutNode) -> Vec<usize> {
        page.leaves().iter().filter_map(|l| l.unit).collect()
    }

    #[test]
    fn test_rows_fill_pages_in_order() {
        let rows: Vec<_> = (0..10).map(|i| row(i, 30.0)).collect();
        let pages = paginate(vec![rows], 100.0);
        assert_eq!(pages.len(), 4);
        assert_eq!(page_units(&pages[0]), vec![0, 1, 2]);
        assert_eq!(page_units(&pages[3]), vec![9]);
        assert_eq!(pages[1].kind, NodeKind::Page { number: 2 });
        assert_eq!(
            pages[1].children[0].kind,
            NodeKind::Section { continued: true }
        );
    }

    #[test]
    fn test_oversized_row_gets_own_page() {
        let pages = paginate(vec![vec![row(0, 10.0), row(1, 500.0), row(2, 10.0)]], 100.0);
        assert_eq!(pages.len(), 3);
        assert_eq!(page_units(&pages[1]), vec![1]);
    }

    #[test]
    fn test_sections_share_pages() {
        let pages = paginate(
            vec![vec![row(0, 20.0)], vec![row(1, 20.0)], vec![row(2, 20.0)]],
            100.0,
        );
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].children.len(), 3);
        assert!(pages[0]
            .children
            .iter()
            .all(|s| s.kind == NodeKind::Section { continued: false }));
    }

    #[test]
    fn test_deterministic() {
        let build = || (0..7).map(|i| row(i, 12.5 + i as f32 * 9.0)).collect::<Vec<_>>();
        let first = paginate(vec![build()], 120.0);
        let second = paginate(vec![build()], 120.0);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_input_one_page() {
        assert_eq!(paginate(Vec::new(), 100.0).len(), 1);
    }
}
