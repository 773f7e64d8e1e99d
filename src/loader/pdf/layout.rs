//! Layout analysis for PDF pages.
//!
//! Content streams are decoded into positioned text spans and image
//! placements. Spans are grouped into lines and lines into blocks; pages
//! with a clear gutter are read column by column.

use std::collections::{BTreeMap, HashMap};

use lopdf::{Document as LopdfDocument, Object, ObjectId};

use crate::error::{Error, Result};

/// A text span with position and style information.
#[derive(Debug, Clone)]
pub struct TextSpan {
    /// The text content
    pub text: String,
    /// X position (left edge)
    pub x: f32,
    /// Y position (baseline)
    pub y: f32,
    /// Estimated advance width
    pub width: f32,
    /// Font size in points
    pub font_size: f32,
    /// Whether the font appears to be bold
    pub is_bold: bool,
    /// Whether the font appears to be italic
    pub is_italic: bool,
    /// Position in the content stream
    pub seq: usize,
}

impl TextSpan {
    /// Create a new text span; the width is estimated from the glyph count.
    pub fn new(text: String, x: f32, y: f32, font_size: f32, font_name: &str) -> Self {
        let lower = font_name.to_lowercase();
        let is_bold = lower.contains("bold") || lower.contains("black") || lower.contains("heavy");
        let is_italic = lower.contains("italic") || lower.contains("oblique");
        let width = text
            .chars()
            .map(|c| if is_spaceless_script_char(c) { 1.0 } else { 0.5 })
            .sum::<f32>()
            * font_size;

        Self {
            text,
            x,
            y,
            width,
            font_size,
            is_bold,
            is_italic,
            seq: 0,
        }
    }

    /// Approximate top edge.
    pub fn top(&self) -> f32 {
        self.y + self.font_size * 0.8
    }

    fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }
}

/// An image drawn on the page with the `Do` operator.
#[derive(Debug, Clone)]
pub struct ImagePlacement {
    /// XObject resource name
    pub name: Vec<u8>,
    /// Object id of the image stream
    pub object_id: Option<ObjectId>,
    /// Left edge
    pub x: f32,
    /// Top edge
    pub top: f32,
    /// Drawn width
    pub width: f32,
    /// Position in the content stream
    pub seq: usize,
}

/// Decoded content of one page.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    pub spans: Vec<TextSpan>,
    pub images: Vec<ImagePlacement>,
}

/// A text line composed of multiple spans on the same baseline.
#[derive(Debug, Clone)]
pub struct TextLine {
    /// The spans in this line, sorted by X position
    pub spans: Vec<TextSpan>,
    /// Y position (baseline)
    pub y: f32,
    /// Leftmost X position
    pub x: f32,
    /// Dominant font size in this line
    pub font_size: f32,
    /// Detected heading level (1-6, or 0 for non-heading)
    pub heading_level: u8,
}

impl TextLine {
    /// Create a line from spans.
    pub fn from_spans(mut spans: Vec<TextSpan>, sort: bool) -> Self {
        if sort {
            spans.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
        }

        let total_chars: usize = spans.iter().map(|s| s.text.len()).sum();
        let weighted_size: f32 = spans
            .iter()
            .map(|s| s.font_size * s.text.len() as f32)
            .sum();
        let font_size = match (total_chars, spans.first()) {
            (0, Some(first)) => first.font_size,
            (0, None) => 0.0,
            _ => weighted_size / total_chars as f32,
        };
        let (x, y) = spans
            .iter()
            .fold((f32::MAX, None), |(x, y), s| (x.min(s.x), y.or(Some(s.y))));

        Self {
            y: y.unwrap_or(0.0),
            x: if spans.is_empty() { 0.0 } else { x },
            spans,
            font_size,
            heading_level: 0,
        }
    }

    pub fn is_heading(&self) -> bool {
        self.heading_level > 0
    }

    /// Combined text of all spans.
    ///
    /// Inserts spaces between spans based on their X gaps, except between
    /// characters of scripts written without word spaces.
    pub fn text(&self) -> String {
        let mut result = String::new();
        for (i, span) in self.spans.iter().enumerate() {
            if i > 0 {
                let prev = &self.spans[i - 1];
                let gap = span.x - (prev.x + prev.width);
                let char_count = span.text.chars().count().max(1);
                let threshold = span.width / char_count as f32 * 0.2;

                let prev_last = prev.text.chars().last();
                let curr_first = span.text.chars().next();
                let both_spaceless = prev_last.is_some_and(is_spaceless_script_char)
                    && curr_first.is_some_and(is_spaceless_script_char);
                let has_space = prev.text.ends_with([' ', '\u{00A0}'])
                    || span.text.starts_with([' ', '\u{00A0}']);

                if gap > threshold && !both_spaceless && !has_space {
                    result.push(' ');
                }
            }
            result.push_str(&span.text);
        }
        result
    }

    /// Check if the line is predominantly bold.
    pub fn is_bold(&self) -> bool {
        self.style_share(|s| s.is_bold) > 0.5
    }

    /// Check if the line is predominantly italic.
    pub fn is_italic(&self) -> bool {
        self.style_share(|s| s.is_italic) > 0.5
    }

    fn style_share(&self, pred: impl Fn(&TextSpan) -> bool) -> f32 {
        let total: usize = self.spans.iter().map(|s| s.text.len()).sum();
        if total == 0 {
            return 0.0;
        }
        let matching: usize = self
            .spans
            .iter()
            .filter(|s| pred(s))
            .map(|s| s.text.len())
            .sum();
        matching as f32 / total as f32
    }

    fn min_seq(&self) -> usize {
        self.spans.iter().map(|s| s.seq).min().unwrap_or(0)
    }
}

/// A text block (paragraph or heading) built from lines.
#[derive(Debug, Clone)]
pub struct TextBlock {
    /// The lines in this block
    pub lines: Vec<TextLine>,
    /// Heading level (1-6 for headings, 0 otherwise)
    pub heading_level: u8,
}

impl TextBlock {
    fn new(lines: Vec<TextLine>) -> Self {
        let heading_level = lines
            .iter()
            .filter(|l| l.is_heading())
            .map(|l| l.heading_level)
            .min()
            .unwrap_or(0);
        Self {
            lines,
            heading_level,
        }
    }

    /// Top edge of the first line.
    pub fn top(&self) -> f32 {
        self.lines
            .first()
            .map(|l| l.y + l.font_size * 0.8)
            .unwrap_or(0.0)
    }

    /// Earliest content-stream position of any span.
    pub fn min_seq(&self) -> usize {
        self.lines.iter().map(|l| l.min_seq()).min().unwrap_or(0)
    }

    /// Combined text, joining hyphenated line breaks.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            let text = line.text();
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            let next_lower = text.chars().next().is_some_and(|c| c.is_lowercase());
            if out.ends_with('-') && next_lower {
                out.pop();
            } else if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(text);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.text().trim().is_empty()
    }
}

/// A detected column in the page layout.
#[derive(Debug, Clone)]
pub struct Column {
    /// Left boundary X coordinate
    pub left: f32,
    /// Right boundary X coordinate
    pub right: f32,
}

impl Column {
    /// Check if an X coordinate falls within this column.
    pub fn contains(&self, x: f32) -> bool {
        x >= self.left && x <= self.right
    }
}

/// Column structure of a page.
#[derive(Debug, Clone)]
pub enum ColumnLayout {
    /// Columns found, left to right
    Columns(Vec<Column>),
    /// A gutter-like valley that some spans cross; reading order is unclear
    Ambiguous,
}

/// Font statistics for heading detection.
#[derive(Debug, Clone, Default)]
pub struct FontStatistics {
    /// Body text font size (most common)
    pub body_size: f32,
    /// Font sizes larger than body, largest first
    pub heading_sizes: Vec<f32>,
    /// Observed font sizes (0.1pt buckets) weighted by character count
    pub size_histogram: HashMap<i32, usize>,
}

impl FontStatistics {
    /// Add a font size observation weighted by the number of characters.
    pub fn add_size(&mut self, size: f32, chars: usize) {
        let key = (size * 10.0).round() as i32;
        *self.size_histogram.entry(key).or_insert(0) += chars.max(1);
    }

    /// Calculate body size and heading sizes.
    pub fn analyze(&mut self) {
        let Some(body_key) = self
            .size_histogram
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(k, _)| *k)
        else {
            self.body_size = 12.0;
            return;
        };
        self.body_size = body_key as f32 / 10.0;

        let mut larger: Vec<f32> = self
            .size_histogram
            .keys()
            .map(|k| *k as f32 / 10.0)
            .filter(|s| *s > self.body_size + 0.5)
            .collect();
        larger.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        self.heading_sizes = larger;
    }

    /// Heading level for a font size (1-6, or 0 for body text).
    pub fn heading_level(&self, font_size: f32) -> u8 {
        if font_size < self.body_size + 1.5 {
            return 0;
        }
        self.heading_sizes
            .iter()
            .position(|&h| font_size >= h - 0.5)
            .map(|i| (i + 1).min(6) as u8)
            .unwrap_or(5)
    }
}

/// Extracts positioned content from PDF pages.
pub struct LayoutAnalyzer<'a> {
    doc: &'a LopdfDocument,
}

impl<'a> LayoutAnalyzer<'a> {
    pub fn new(doc: &'a LopdfDocument) -> Self {
        Self { doc }
    }

    /// Decode spans and image placements for a page.
    pub fn extract_page(&self, page_id: ObjectId) -> Result<PageContent> {
        let lopdf_fonts = self
            .doc
            .get_page_fonts(page_id)
            .map_err(|e| Error::CorruptInput(format!("PDF fonts: {}", e)))?;

        let mut font_names = HashMap::new();
        for (name, font) in &lopdf_fonts {
            let base_font = font
                .get(b"BaseFont")
                .ok()
                .and_then(|o| o.as_name().ok())
                .map(|n| String::from_utf8_lossy(n).to_string())
                .unwrap_or_else(|| "Unknown".to_string());
            font_names.insert(name.clone(), base_font);
        }

        let xobjects = self.page_xobjects(page_id);
        let content = self.page_content(page_id)?;
        self.parse_content(&content, &font_names, &lopdf_fonts, &xobjects)
    }

    fn page_content(&self, page_id: ObjectId) -> Result<Vec<u8>> {
        let page_dict = self.doc.get_dictionary(page_id)?;
        let contents = match page_dict.get(b"Contents") {
            Ok(contents) => contents,
            Err(_) => return Ok(Vec::new()),
        };

        let mut content = Vec::new();
        let streams: Vec<&Object> = match contents {
            Object::Array(arr) => arr.iter().collect(),
            other => vec![other],
        };
        for obj in streams {
            if let Some(Object::Stream(s)) = self.resolve(obj) {
                let data = s
                    .decompressed_content()
                    .unwrap_or_else(|_| s.content.clone());
                content.extend_from_slice(&data);
                content.push(b' ');
            }
        }
        Ok(content)
    }

    fn resolve(&self, obj: &'a Object) -> Option<&'a Object> {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).ok(),
            other => Some(other),
        }
    }

    /// Map of XObject names to object ids from the page resources,
    /// following inherited resources up the page tree.
    fn page_xobjects(&self, page_id: ObjectId) -> HashMap<Vec<u8>, ObjectId> {
        let mut map = HashMap::new();
        let mut node = self.doc.get_dictionary(page_id).ok();
        while let Some(dict) = node {
            let resources = dict
                .get(b"Resources")
                .ok()
                .and_then(|r| self.resolve(r))
                .and_then(|r| r.as_dict().ok());
            if let Some(resources) = resources {
                let xobjects = resources
                    .get(b"XObject")
                    .ok()
                    .and_then(|x| self.resolve(x))
                    .and_then(|x| x.as_dict().ok());
                if let Some(xobjects) = xobjects {
                    for (name, obj) in xobjects.iter() {
                        if let Object::Reference(id) = obj {
                            map.entry(name.clone()).or_insert(*id);
                        }
                    }
                }
                break;
            }
            node = dict
                .get(b"Parent")
                .ok()
                .and_then(|p| self.resolve(p))
                .and_then(|p| p.as_dict().ok());
        }
        map
    }

    fn decode(
        &self,
        lopdf_fonts: &BTreeMap<Vec<u8>, &lopdf::Dictionary>,
        font: &[u8],
        bytes: &[u8],
    ) -> String {
        let encoding = lopdf_fonts
            .get(font)
            .and_then(|f| f.get_font_encoding(self.doc).ok());
        match encoding {
            Some(ref enc) => LopdfDocument::decode_text(enc, bytes)
                .unwrap_or_else(|_| decode_text_simple(bytes)),
            None => decode_text_simple(bytes),
        }
    }

    fn parse_content(
        &self,
        content: &[u8],
        font_names: &HashMap<Vec<u8>, String>,
        lopdf_fonts: &BTreeMap<Vec<u8>, &lopdf::Dictionary>,
        xobjects: &HashMap<Vec<u8>, ObjectId>,
    ) -> Result<PageContent> {
        let content = lopdf::content::Content::decode(content)
            .map_err(|e| Error::CorruptInput(format!("PDF content stream: {}", e)))?;

        let mut page = PageContent::default();
        let mut font_key: Vec<u8> = Vec::new();
        let mut font_name = String::new();
        let mut font_size: f32 = 12.0;
        let mut leading: f32 = 0.0;
        let mut text_matrix = TextMatrix::default();
        let mut ctm = Matrix::IDENTITY;
        let mut ctm_stack: Vec<Matrix> = Vec::new();
        let mut in_text = false;
        let mut seq = 0usize;

        for op in content.operations {
            let num = |i: usize| op.operands.get(i).and_then(get_number);
            match op.operator.as_str() {
                "q" => ctm_stack.push(ctm),
                "Q" => ctm = ctm_stack.pop().unwrap_or(Matrix::IDENTITY),
                "cm" if op.operands.len() >= 6 => {
                    let m = Matrix([
                        num(0).unwrap_or(1.0),
                        num(1).unwrap_or(0.0),
                        num(2).unwrap_or(0.0),
                        num(3).unwrap_or(1.0),
                        num(4).unwrap_or(0.0),
                        num(5).unwrap_or(0.0),
                    ]);
                    ctm = m.multiply(&ctm);
                }
                "Do" => {
                    if let Some(Object::Name(name)) = op.operands.first() {
                        let [a, _, _, d, e, f] = ctm.0;
                        page.images.push(ImagePlacement {
                            name: name.clone(),
                            object_id: xobjects.get(name).copied(),
                            x: e,
                            top: f + d.abs(),
                            width: a.abs(),
                            seq,
                        });
                        seq += 1;
                    }
                }
                "BT" => {
                    in_text = true;
                    text_matrix = TextMatrix::default();
                }
                "ET" => in_text = false,
                "Tf" if op.operands.len() >= 2 => {
                    if let Object::Name(name) = &op.operands[0] {
                        font_key = name.clone();
                        font_name = font_names
                            .get(name.as_slice())
                            .cloned()
                            .unwrap_or_else(|| String::from_utf8_lossy(name).to_string());
                    }
                    font_size = num(1).unwrap_or(12.0);
                }
                "TL" => leading = num(0).unwrap_or(0.0),
                "Td" | "TD" if op.operands.len() >= 2 => {
                    let ty = num(1).unwrap_or(0.0);
                    if op.operator == "TD" {
                        leading = -ty;
                    }
                    text_matrix.translate(num(0).unwrap_or(0.0), ty);
                }
                "Tm" if op.operands.len() >= 6 => text_matrix.set(
                    num(0).unwrap_or(1.0),
                    num(1).unwrap_or(0.0),
                    num(2).unwrap_or(0.0),
                    num(3).unwrap_or(1.0),
                    num(4).unwrap_or(0.0),
                    num(5).unwrap_or(0.0),
                ),
                "T*" => text_matrix.next_line(leading_or(leading, font_size)),
                "Tj" | "TJ" | "'" | "\"" if in_text => {
                    if matches!(op.operator.as_str(), "'" | "\"") {
                        text_matrix.next_line(leading_or(leading, font_size));
                    }
                    let text = match op.operator.as_str() {
                        "TJ" => match op.operands.first() {
                            Some(Object::Array(items)) => {
                                self.decode_tj(items, lopdf_fonts, &font_key)
                            }
                            _ => String::new(),
                        },
                        "\"" => match op.operands.get(2) {
                            Some(Object::String(bytes, _)) => {
                                self.decode(lopdf_fonts, &font_key, bytes)
                            }
                            _ => String::new(),
                        },
                        _ => match op.operands.first() {
                            Some(Object::String(bytes, _)) => {
                                self.decode(lopdf_fonts, &font_key, bytes)
                            }
                            _ => String::new(),
                        },
                    };

                    if !text.trim().is_empty() {
                        let (x, y) = ctm.apply(text_matrix.position());
                        let size = font_size * text_matrix.scale() * ctm.scale();
                        let mut span = TextSpan::new(text, x, y, size, &font_name);
                        span.seq = seq;
                        seq += 1;
                        page.spans.push(span);
                    }
                }
                _ => {}
            }
        }

        Ok(page)
    }

    /// Decode a TJ array; large negative adjustments become word spaces.
    fn decode_tj(
        &self,
        items: &[Object],
        lopdf_fonts: &BTreeMap<Vec<u8>, &lopdf::Dictionary>,
        font: &[u8],
    ) -> String {
        let mut combined = String::new();
        for item in items {
            let adjustment = match item {
                Object::String(bytes, _) => {
                    combined.push_str(&self.decode(lopdf_fonts, font, bytes));
                    continue;
                }
                Object::Integer(n) => -(*n as f32),
                Object::Real(n) => -n,
                _ => continue,
            };
            if adjustment > 200.0
                && !combined.ends_with([' ', '\u{00A0}'])
                && combined
                    .chars()
                    .last()
                    .is_some_and(|c| !is_spaceless_script_char(c))
            {
                combined.push(' ');
            }
        }
        combined
    }
}

fn leading_or(leading: f32, font_size: f32) -> f32 {
    if leading > 0.0 {
        leading
    } else {
        font_size * 1.2
    }
}

/// Detect columns from a gutter in the horizontal span occupancy.
///
/// A fully empty gutter yields two columns; a gutter crossed by a few spans
/// yields [`ColumnLayout::Ambiguous`].
pub fn detect_columns(spans: &[TextSpan]) -> ColumnLayout {
    let single = |min_x: f32, max_x: f32| {
        ColumnLayout::Columns(vec![Column {
            left: min_x - 10.0,
            right: max_x + 10.0,
        }])
    };
    if spans.is_empty() {
        return ColumnLayout::Columns(Vec::new());
    }

    let min_x = spans.iter().map(|s| s.x).fold(f32::MAX, f32::min);
    let max_x = spans.iter().map(|s| s.x + s.width).fold(f32::MIN, f32::max);
    let page_width = max_x - min_x;
    if page_width < 250.0 {
        return single(min_x, max_x);
    }

    const SLICE: f32 = 3.0;
    let num_slices = (page_width / SLICE) as usize + 1;
    let mut occupancy = vec![0usize; num_slices];
    for span in spans {
        let start = ((span.x - min_x) / SLICE) as usize;
        let end = (((span.x + span.width) - min_x) / SLICE) as usize;
        for slot in occupancy
            .iter_mut()
            .take(end.min(num_slices - 1) + 1)
            .skip(start)
        {
            *slot += 1;
        }
    }

    let search = (num_slices * 15 / 100)..(num_slices * 85 / 100);
    let peak = occupancy.iter().copied().max().unwrap_or(0);
    let clear = widest_gap(&occupancy, search.clone(), 0);
    let valley = widest_gap(&occupancy, search, (peak / 20).max(1));

    let (gap, ambiguous) = match (clear, valley) {
        (Some(gap), _) if gap.1 as f32 * SLICE >= 12.0 => (gap, false),
        (_, Some(gap)) if gap.1 as f32 * SLICE >= 12.0 => (gap, true),
        _ => return single(min_x, max_x),
    };

    let gutter = min_x + (gap.0 as f32 + gap.1 as f32 / 2.0) * SLICE;
    if gutter - min_x < 80.0 || max_x - gutter < 80.0 {
        return single(min_x, max_x);
    }

    let left = spans.iter().filter(|s| s.center_x() < gutter).count();
    let right = spans.len() - left;
    let min_spans = (spans.len() / 10).max(2);
    if left < min_spans || right < min_spans {
        return single(min_x, max_x);
    }

    log::debug!(
        "Gutter at x={:.1} ({}), left={} right={}",
        gutter,
        if ambiguous { "crossed" } else { "clear" },
        left,
        right
    );
    if ambiguous {
        return ColumnLayout::Ambiguous;
    }
    ColumnLayout::Columns(vec![
        Column {
            left: min_x - 10.0,
            right: gutter,
        },
        Column {
            left: gutter,
            right: max_x + 10.0,
        },
    ])
}

/// Widest run of slices with occupancy at most `limit`, preferring runs
/// near the center. Returns (start, length).
fn widest_gap(
    occupancy: &[usize],
    range: std::ops::Range<usize>,
    limit: usize,
) -> Option<(usize, usize)> {
    let center = occupancy.len() / 2;
    let mut best: Option<(usize, usize)> = None;
    let mut run_start = None;

    let consider = |start: usize, len: usize, best: &mut Option<(usize, usize)>| {
        let dist = |s: usize, l: usize| (s + l / 2).abs_diff(center);
        let better = match *best {
            None => true,
            Some((bs, bl)) => {
                len * 2 > bl * 3 || (len * 10 >= bl * 7 && dist(start, len) < dist(bs, bl))
            }
        };
        if better {
            *best = Some((start, len));
        }
    };

    for i in range.clone() {
        if occupancy.get(i).copied().unwrap_or(0) <= limit {
            run_start.get_or_insert(i);
        } else if let Some(start) = run_start.take() {
            consider(start, i - start, &mut best);
        }
    }
    if let Some(start) = run_start {
        consider(start, range.end - start, &mut best);
    }
    best
}

/// Group spans into lines by baseline proximity.
///
/// With `sort` the spans are ordered top to bottom first; without it the
/// content-stream order is kept and only consecutive spans are merged.
pub fn group_spans_into_lines(mut spans: Vec<TextSpan>, sort: bool) -> Vec<TextLine> {
    if sort {
        spans.sort_by(|a, b| {
            b.y.partial_cmp(&a.y)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
        });
    }

    let mut lines = Vec::new();
    let mut current: Vec<TextSpan> = Vec::new();
    let mut current_y: Option<f32> = None;
    for span in spans {
        let tolerance = span.font_size * 0.3;
        match current_y {
            Some(y) if (span.y - y).abs() <= tolerance => current.push(span),
            _ => {
                if !current.is_empty() {
                    lines.push(TextLine::from_spans(std::mem::take(&mut current), sort));
                }
                current_y = Some(span.y);
                current.push(span);
            }
        }
    }
    if !current.is_empty() {
        lines.push(TextLine::from_spans(current, sort));
    }
    lines
}

/// Mark heading lines using document font statistics.
pub fn detect_headings(lines: &mut [TextLine], stats: &FontStatistics) {
    for line in lines {
        line.heading_level = stats.heading_level(line.font_size);
    }
}

/// Group lines into blocks (paragraphs) based on spacing.
pub fn group_lines_into_blocks(lines: Vec<TextLine>) -> Vec<TextBlock> {
    let avg_spacing = average_line_spacing(&lines);
    let mut blocks = Vec::new();
    let mut current: Vec<TextLine> = Vec::new();

    for line in lines {
        let should_break = current
            .last()
            .is_some_and(|prev| should_break_block(prev, &line, avg_spacing));
        if should_break {
            blocks.push(TextBlock::new(std::mem::take(&mut current)));
        }
        current.push(line);
    }
    if !current.is_empty() {
        blocks.push(TextBlock::new(current));
    }
    blocks
}

fn average_line_spacing(lines: &[TextLine]) -> f32 {
    let spacings: Vec<f32> = lines
        .windows(2)
        .map(|w| (w[0].y - w[1].y).abs())
        .filter(|s| *s > 0.1)
        .collect();
    if spacings.is_empty() {
        return 12.0;
    }
    spacings.iter().sum::<f32>() / spacings.len() as f32
}

fn should_break_block(prev: &TextLine, curr: &TextLine, avg_spacing: f32) -> bool {
    if curr.is_heading() != prev.is_heading() || (curr.is_heading() && curr.heading_level != prev.heading_level) {
        return true;
    }
    if (prev.y - curr.y).abs() > avg_spacing * 1.5 {
        return true;
    }
    if (prev.font_size - curr.font_size).abs() > 1.0 {
        return true;
    }
    (prev.x - curr.x).abs() > 20.0
}

/// 2D affine matrix `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    /// `self × other` in PDF row-vector convention.
    fn multiply(&self, other: &Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    fn apply(&self, (x, y): (f32, f32)) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    fn scale(&self) -> f32 {
        let [_, _, c, d, _, _] = self.0;
        (c * c + d * d).sqrt()
    }
}

/// Text matrix for tracking position in a text object.
#[derive(Debug, Clone)]
struct TextMatrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
    line_e: f32,
    line_f: f32,
}

impl Default for TextMatrix {
    fn default() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
            line_e: 0.0,
            line_f: 0.0,
        }
    }
}

impl TextMatrix {
    fn set(&mut self, a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) {
        *self = Self {
            a,
            b,
            c,
            d,
            e,
            f,
            line_e: e,
            line_f: f,
        };
    }

    /// `Td`: offset from the start of the current line.
    fn translate(&mut self, tx: f32, ty: f32) {
        self.line_e += tx * self.a + ty * self.c;
        self.line_f += tx * self.b + ty * self.d;
        self.e = self.line_e;
        self.f = self.line_f;
    }

    fn next_line(&mut self, leading: f32) {
        self.translate(0.0, -leading);
    }

    fn position(&self) -> (f32, f32) {
        (self.e, self.f)
    }

    fn scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

/// Helper to extract a number from a PDF object.
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Check if a character belongs to a script written without word spaces.
///
/// Chinese and Japanese are; Korean uses word spaces like English.
pub fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;
    (0x4E00..=0x9FFF).contains(&code)
        || (0x3400..=0x4DBF).contains(&code)
        || (0x20000..=0x2EBEF).contains(&code)
        || (0x3040..=0x30FF).contains(&code)
        || (0x3000..=0x303F).contains(&code)
        || (0xFF00..=0xFFEF).contains(&code)
}

/// Decode PDF string bytes when no font encoding is available.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(b"\xFE\xFF") {
        let utf16: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, x: f32, y: f32, size: f32) -> TextSpan {
        TextSpan::new(text.to_string(), x, y, size, "Helvetica")
    }

    #[test]
    fn test_font_statistics() {
        let mut stats = FontStatistics::default();
        stats.add_size(12.0, 1000);
        stats.add_size(18.0, 40);
        stats.add_size(24.0, 20);
        stats.analyze();

        assert!((stats.body_size - 12.0).abs() < 0.1);
        assert_eq!(stats.heading_level(12.0), 0);
        assert_eq!(stats.heading_level(24.0), 1);
        assert_eq!(stats.heading_level(18.0), 2);
    }

    #[test]
    fn test_span_style_from_font_name() {
        let bold = TextSpan::new("Test".into(), 0.0, 0.0, 12.0, "Helvetica-Bold");
        assert!(bold.is_bold);
        assert!(!bold.is_italic);
        let oblique = TextSpan::new("Test".into(), 0.0, 0.0, 12.0, "Helvetica-Oblique");
        assert!(oblique.is_italic);
        assert!((bold.width - 24.0).abs() < 0.01);
    }

    #[test]
    fn test_line_text_spacing() {
        let line = TextLine::from_spans(vec![span("World", 140.0, 700.0, 12.0), span("Hello", 100.0, 700.0, 12.0)], true);
        assert_eq!(line.text(), "Hello World");

        let cjk = TextLine::from_spans(vec![span("中文", 100.0, 700.0, 12.0), span("文本", 130.0, 700.0, 12.0)], true);
        assert_eq!(cjk.text(), "中文文本");
    }

    #[test]
    fn test_two_clear_columns() {
        let mut spans = Vec::new();
        for i in 0..20 {
            let y = 700.0 - i as f32 * 14.0;
            spans.push(span("left column text here", 50.0, y, 10.0));
            spans.push(span("right column text here", 330.0, y, 10.0));
        }
        match detect_columns(&spans) {
            ColumnLayout::Columns(cols) => {
                assert_eq!(cols.len(), 2);
                assert!(cols[0].contains(60.0));
                assert!(cols[1].contains(340.0));
            }
            ColumnLayout::Ambiguous => panic!("expected clear columns"),
        }
    }

    #[test]
    fn test_crossed_gutter_is_ambiguous() {
        let mut spans = Vec::new();
        for i in 0..40 {
            let y = 700.0 - i as f32 * 14.0;
            spans.push(span("left column text here", 50.0, y, 10.0));
            spans.push(span("right column text here", 330.0, y, 10.0));
        }
        spans.push(span("A full width title that crosses the middle gutter", 100.0, 740.0, 10.0));
        assert!(matches!(detect_columns(&spans), ColumnLayout::Ambiguous));
    }

    #[test]
    fn test_single_column() {
        let spans: Vec<_> = (0..10)
            .map(|i| span("a single column of body text that runs wide", 50.0, 700.0 - i as f32 * 14.0, 12.0))
            .collect();
        match detect_columns(&spans) {
            ColumnLayout::Columns(cols) => assert_eq!(cols.len(), 1),
            ColumnLayout::Ambiguous => panic!("expected one column"),
        }
    }

    #[test]
    fn test_blocks_break_on_spacing_and_headings() {
        let mut lines = group_spans_into_lines(
            vec![
                span("Title", 50.0, 760.0, 20.0),
                span("first line", 50.0, 720.0, 12.0),
                span("second line", 50.0, 706.0, 12.0),
                span("new para", 50.0, 640.0, 12.0),
            ],
            true,
        );
        let mut stats = FontStatistics::default();
        for l in &lines {
            stats.add_size(l.font_size, l.text().len());
        }
        stats.analyze();
        detect_headings(&mut lines, &stats);

        let blocks = group_lines_into_blocks(lines);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].heading_level, 1);
        assert_eq!(blocks[1].text(), "first line second line");
    }

    #[test]
    fn test_hyphenated_line_join() {
        let block = TextBlock::new(vec![
            TextLine::from_spans(vec![span("inter-", 50.0, 700.0, 12.0)], true),
            TextLine::from_spans(vec![span("national", 50.0, 686.0, 12.0)], true),
        ]);
        assert_eq!(block.text(), "international");
    }

    #[test]
    fn test_matrix_multiply() {
        let scale = Matrix([2.0, 0.0, 0.0, 2.0, 0.0, 0.0]);
        let translate = Matrix([1.0, 0.0, 0.0, 1.0, 10.0, 20.0]);
        let m = scale.multiply(&translate);
        assert_eq!(m.apply((1.0, 1.0)), (12.0, 22.0));
    }

    #[test]
    fn test_decode_text_simple() {
        assert_eq!(decode_text_simple(b"\xFE\xFF\x00A\x00B"), "AB");
        assert_eq!(decode_text_simple(b"plain"), "plain");
        assert_eq!(decode_text_simple(&[0xE9]), "é");
    }
}
