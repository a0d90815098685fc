use std::collections::HashMap;

use thiserror::Error;

pub type SubtreeId = u64;
pub type CellId = u64;

pub const INSTRUCTOR_CELL_MARKER: &str = r#"data-property="instructor""#;
pub const NAME_LINK_CLASS: &str = "email";
pub const INSTRUCTOR_HEADER_MARKER: &str = "instructor-col";
pub const INSTRUCTOR_COL_STYLE: &str = "width: 19%; min-width: 240px;";

#[derive(Debug, Error)]
pub enum PageError {
    #[error("unknown subtree {0}")]
    UnknownSubtree(SubtreeId),
}

struct Subtree {
    html: String,
    scanned: bool,
    cells: Vec<CellId>,
}

struct Cell {
    subtree: SubtreeId,
    // inner content range within the subtree's html
    span: (usize, usize),
    raw_text: Option<String>,
    replacement: Option<String>,
}

/// Mutable model of the results page: HTML fragments inserted in batches,
/// instructor cells addressed by identity. Ids are never reused, so a stale
/// `CellId` held by an in-flight fetch can only miss, never alias.
pub struct PageDocument {
    subtrees: HashMap<SubtreeId, Subtree>,
    order: Vec<SubtreeId>,
    cells: HashMap<CellId, Cell>,
    next_id: u64,
    widened: bool,
}

impl PageDocument {
    pub fn new() -> Self {
        Self {
            subtrees: HashMap::new(),
            order: Vec::new(),
            cells: HashMap::new(),
            next_id: 1,
            widened: false,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn insert_fragment(&mut self, html: impl Into<String>) -> SubtreeId {
        let id = self.next_id();
        self.subtrees.insert(
            id,
            Subtree {
                html: html.into(),
                scanned: false,
                cells: Vec::new(),
            },
        );
        self.order.push(id);
        id
    }

    pub fn remove_subtree(&mut self, id: SubtreeId) {
        if self.subtrees.remove(&id).is_some() {
            self.order.retain(|s| *s != id);
            self.cells.retain(|_, cell| cell.subtree != id);
        }
    }

    pub fn subtree_ids(&self) -> Vec<SubtreeId> {
        self.order.clone()
    }

    /// Instructor cells within one subtree. The scan runs once per subtree;
    /// asking again returns the same identities.
    pub fn instructor_cells(&mut self, subtree: SubtreeId) -> Result<Vec<CellId>, PageError> {
        let tree = self
            .subtrees
            .get(&subtree)
            .ok_or(PageError::UnknownSubtree(subtree))?;
        if tree.scanned {
            return Ok(tree.cells.clone());
        }

        let html = tree.html.clone();
        let mut found = Vec::new();
        let mut pos = 0usize;
        while let Some((start, inner_start, end)) = tag_block(&html, "td", pos) {
            pos = end;
            let open_tag = &html[start..inner_start];
            if !ascii_lower(open_tag).contains(INSTRUCTOR_CELL_MARKER) {
                continue;
            }
            let span = (inner_start, end - "</td>".len());
            let raw_text = name_link_text(&html[span.0..span.1]);
            let id = self.next_id();
            self.cells.insert(
                id,
                Cell {
                    subtree,
                    span,
                    raw_text,
                    replacement: None,
                },
            );
            found.push(id);
        }

        let tree = self
            .subtrees
            .get_mut(&subtree)
            .ok_or(PageError::UnknownSubtree(subtree))?;
        tree.scanned = true;
        tree.cells = found.clone();
        Ok(found)
    }

    pub fn cell_exists(&self, id: CellId) -> bool {
        self.cells.contains_key(&id)
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn enriched_count(&self) -> usize {
        self.cells
            .values()
            .filter(|c| c.replacement.is_some())
            .count()
    }

    pub fn cell_text(&self, id: CellId) -> Option<String> {
        self.cells.get(&id).and_then(|c| c.raw_text.clone())
    }

    pub fn is_enriched(&self, id: CellId) -> bool {
        self.cells
            .get(&id)
            .map(|c| c.replacement.is_some())
            .unwrap_or(false)
    }

    /// Replaces a cell's content wholesale. Returns false when the cell is
    /// gone, which callers treat as a silent no-op.
    pub fn replace_content(&mut self, id: CellId, html: String) -> bool {
        match self.cells.get_mut(&id) {
            Some(cell) => {
                cell.replacement = Some(html);
                true
            }
            None => false,
        }
    }

    /// Widens the instructor column header so the widget fits. Safe to call
    /// once per enriched row; the width is a fixed value, not an increment.
    pub fn widen_instructor_column(&mut self) {
        self.widened = true;
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        let mut header_styled = false;
        let style_attr = format!(" style=\"{}\"", INSTRUCTOR_COL_STYLE);
        for subtree_id in &self.order {
            let tree = &self.subtrees[subtree_id];
            let mut edits: Vec<(usize, usize, &str)> = self
                .cells
                .values()
                .filter(|c| c.subtree == *subtree_id)
                .filter_map(|c| {
                    c.replacement
                        .as_deref()
                        .map(|r| (c.span.0, c.span.1, r))
                })
                .collect();
            if self.widened && !header_styled {
                if let Some(at) = instructor_header_attr_pos(&tree.html) {
                    edits.push((at, at, style_attr.as_str()));
                    header_styled = true;
                }
            }
            edits.sort_by_key(|e| e.0);

            let mut pos = 0usize;
            for (start, end, replacement) in edits {
                out.push_str(&tree.html[pos..start]);
                out.push_str(replacement);
                pos = end;
            }
            out.push_str(&tree.html[pos..]);
        }
        out
    }
}

// Position just before the closing '>' of the first instructor column
// header's open tag, where a style attribute can be spliced in.
fn instructor_header_attr_pos(html: &str) -> Option<usize> {
    let mut pos = 0usize;
    while let Some((start, inner_start, end)) = tag_block(html, "th", pos) {
        pos = end;
        let open_tag = &html[start..inner_start];
        let classes = attr_value(open_tag, "class").unwrap_or("");
        if classes
            .split_whitespace()
            .any(|c| c.eq_ignore_ascii_case(INSTRUCTOR_HEADER_MARKER))
        {
            return Some(inner_start - 1);
        }
    }
    None
}

fn name_link_text(cell_inner: &str) -> Option<String> {
    let mut pos = 0usize;
    while let Some((start, inner_start, end)) = tag_block(cell_inner, "a", pos) {
        pos = end;
        let open_tag = &cell_inner[start..inner_start];
        let classes = attr_value(open_tag, "class").unwrap_or("");
        if !classes
            .split_whitespace()
            .any(|c| c.eq_ignore_ascii_case(NAME_LINK_CLASS))
        {
            continue;
        }
        let inner = &cell_inner[inner_start..end - "</a>".len()];
        let text = normalize_ws(&decode_entities(&strip_tags(inner)));
        if text.is_empty() {
            return None;
        }
        return Some(text);
    }
    None
}

fn ascii_lower(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii() { c.to_ascii_lowercase() } else { c })
        .collect()
}

// Finds the next `<tag ...>...</tag>` block at or after `from`, case
// insensitive. Returns (start, inner_start, end) where inner_start is just
// past the open tag's '>' and end is just past the close tag.
fn tag_block(s: &str, tag: &str, from: usize) -> Option<(usize, usize, usize)> {
    let lc = ascii_lower(s);
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);

    let mut search = from;
    loop {
        let start = lc.get(search..)?.find(&open)? + search;
        let after_name = start + open.len();
        // require a real tag boundary so "a" cannot match "<abbr"
        match lc.as_bytes().get(after_name) {
            Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') | Some(b'>') | Some(b'/') => {}
            _ => {
                search = after_name;
                continue;
            }
        }
        let inner_start = s[start..].find('>')? + start + 1;
        let end_rel = lc[inner_start..].find(&close)?;
        let end = inner_start + end_rel + close.len();
        return Some((start, inner_start, end));
    }
}

fn attr_value<'a>(open_tag: &'a str, name: &str) -> Option<&'a str> {
    let lc = ascii_lower(open_tag);
    let pat = format!("{}=\"", name);
    let start = lc.find(&pat)? + pat.len();
    let end = open_tag[start..].find('"')? + start;
    Some(&open_tag[start..end])
}

fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROW: &str = concat!(
        r#"<tr><td data-property="courseTitle">Intro to Parsing</td>"#,
        r#"<td data-property="instructor">"#,
        r#"<a class="email" href="mailto:jdoe4@gmu.edu">Doe, Jane (she/her)</a>"#,
        r#"</td></tr>"#,
    );

    #[test]
    fn finds_only_marked_cells() {
        let mut doc = PageDocument::new();
        let subtree = doc.insert_fragment(ROW);
        let cells = doc.instructor_cells(subtree).unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(
            doc.cell_text(cells[0]),
            Some("Doe, Jane (she/her)".to_string())
        );
    }

    #[test]
    fn rescan_returns_same_identities() {
        let mut doc = PageDocument::new();
        let subtree = doc.insert_fragment(ROW);
        let first = doc.instructor_cells(subtree).unwrap();
        let second = doc.instructor_cells(subtree).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_subtree_is_an_error() {
        let mut doc = PageDocument::new();
        assert!(doc.instructor_cells(999).is_err());
    }

    #[test]
    fn cell_without_name_link_has_no_text() {
        let mut doc = PageDocument::new();
        let subtree =
            doc.insert_fragment(r#"<td data-property="instructor">Staff</td>"#);
        let cells = doc.instructor_cells(subtree).unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(doc.cell_text(cells[0]), None);
    }

    #[test]
    fn link_must_carry_the_email_class() {
        let mut doc = PageDocument::new();
        let subtree = doc.insert_fragment(concat!(
            r#"<td data-property="instructor">"#,
            r##"<a class="profile" href="#">Doe, Jane</a></td>"##,
        ));
        let cells = doc.instructor_cells(subtree).unwrap();
        assert_eq!(doc.cell_text(cells[0]), None);
    }

    #[test]
    fn link_text_entities_are_decoded() {
        let mut doc = PageDocument::new();
        let subtree = doc.insert_fragment(concat!(
            r#"<td data-property="instructor">"#,
            r##"<a class="email bold" href="#">O&#39;Brien,&nbsp;Conan</a></td>"##,
        ));
        let cells = doc.instructor_cells(subtree).unwrap();
        assert_eq!(doc.cell_text(cells[0]), Some("O'Brien, Conan".to_string()));
    }

    #[test]
    fn replacement_is_spliced_into_html() {
        let mut doc = PageDocument::new();
        let subtree = doc.insert_fragment(ROW);
        let cells = doc.instructor_cells(subtree).unwrap();
        assert!(doc.replace_content(cells[0], "<div>widget</div>".to_string()));

        let html = doc.to_html();
        assert!(html.contains("<div>widget</div>"));
        assert!(!html.contains("Doe, Jane"));
        assert!(html.contains("Intro to Parsing"));
    }

    #[test]
    fn removed_subtree_makes_render_a_miss() {
        let mut doc = PageDocument::new();
        let subtree = doc.insert_fragment(ROW);
        let cells = doc.instructor_cells(subtree).unwrap();
        doc.remove_subtree(subtree);
        assert!(!doc.cell_exists(cells[0]));
        assert!(!doc.replace_content(cells[0], "<div>widget</div>".to_string()));
    }

    #[test]
    fn widening_styles_the_header_once() {
        let mut doc = PageDocument::new();
        doc.insert_fragment(r#"<tr><th class="instructor-col">Instructor</th></tr>"#);
        doc.widen_instructor_column();
        doc.widen_instructor_column();

        let html = doc.to_html();
        assert_eq!(html.matches(INSTRUCTOR_COL_STYLE).count(), 1);
        assert!(html.contains(r#"<th class="instructor-col" style="width: 19%; min-width: 240px;">"#));
    }

    #[test]
    fn tag_boundary_rejects_prefix_matches() {
        assert!(tag_block("<abbr>x</abbr>", "a", 0).is_none());
        assert!(tag_block("<a href=\"#\">x</a>", "a", 0).is_some());
    }
}
