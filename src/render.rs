use std::fmt::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::EnrichError;
use crate::models::RatingRecord;
use crate::page::{CellId, PageDocument};

pub const PROFILE_URL_BASE: &str = "https://www.ratemyprofessors.com/professor/";
const PROFILE_ID_PREFIX: &str = "Teacher-";

/// Replaces the cell's original content with the rating widget and widens
/// the instructor column to fit it. A cell that vanished while the fetch was
/// in flight comes back as `TargetGone`, which callers drop silently.
pub fn mount(
    doc: &mut PageDocument,
    cell: CellId,
    record: &RatingRecord,
) -> Result<(), EnrichError> {
    if !doc.cell_exists(cell) {
        return Err(EnrichError::TargetGone);
    }
    let markup = widget_markup(record);
    if !doc.replace_content(cell, markup) {
        return Err(EnrichError::TargetGone);
    }
    doc.widen_instructor_column();
    Ok(())
}

/// Self-contained widget markup for one professor. Every numeric field
/// degrades to "N/A" on its own; a record with nothing but a name still
/// renders.
pub fn widget_markup(record: &RatingRecord) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        r#"<div class="rmp-widget" style="position: relative; padding: 16px; border-radius: 8px; background-color: #ffffff; border: 1px solid #e0e0e0; width: 240px; color: #333333;">"#
    );

    // header: color-coded rating badge next to the name
    let _ = write!(
        out,
        r#"<div class="rmp-header" style="display: flex; gap: 8px; margin-bottom: 12px;">"#
    );
    match record.avg_rating {
        Some(rating) => {
            let _ = write!(
                out,
                r#"<div class="rmp-rating" style="width: 40px; height: 40px; border-radius: 6px; background-color: hsl({:.0}, 70%, 40%); color: white; font-weight: 600; display: flex; align-items: center; justify-content: center;">{:.1}</div>"#,
                rating_hue(rating),
                rating
            );
        }
        None => {
            let _ = write!(
                out,
                r#"<div class="rmp-rating rmp-na" style="width: 40px; height: 40px; border-radius: 6px; background-color: #999999; color: white; display: flex; align-items: center; justify-content: center;">N/A</div>"#
            );
        }
    }
    let _ = write!(
        out,
        r#"<div class="rmp-name" style="font-size: 16px; font-weight: 600; align-self: center;">{}</div></div>"#,
        escape_html(&record.full_name())
    );

    // stats
    let _ = write!(out, r#"<div class="rmp-stats" style="font-size: 12px;">"#);
    let _ = write!(
        out,
        r#"<div class="rmp-difficulty">DIFFICULTY {}</div>"#,
        match record.avg_difficulty {
            Some(d) => format!("{:.1}", d),
            None => "N/A".to_string(),
        }
    );
    if let Some(d) = record.avg_difficulty {
        let _ = write!(
            out,
            r#"<div class="rmp-difficulty-bar" style="height: 4px; background-color: #eeeeee; border-radius: 2px;"><div style="width: {:.0}%; height: 100%; background-color: hsl({:.0}, 70%, 40%);"></div></div>"#,
            (d / 5.0) * 100.0,
            difficulty_hue(d)
        );
    }
    let _ = write!(
        out,
        r#"<div class="rmp-take-again">TAKE AGAIN {}</div>"#,
        match record.would_take_again_percent {
            Some(p) => format!("{}%", p.round() as i64),
            None => "N/A".to_string(),
        }
    );
    let _ = write!(
        out,
        r#"<div class="rmp-reviews">REVIEWS {}</div>"#,
        match record.num_ratings {
            Some(n) => n.to_string(),
            None => "N/A".to_string(),
        }
    );
    let _ = write!(out, "</div>");

    // outbound profile link; an undecodable id costs only the link
    if let Some(url) = profile_url(&record.id) {
        let _ = write!(
            out,
            r#"<a class="rmp-link" href="{}" target="_blank" rel="noopener">View Profile</a>"#,
            escape_html(&url)
        );
    }

    let _ = write!(out, "</div>");
    out
}

/// External profile URL recovered from the reversibly encoded record id.
pub fn profile_url(id: &str) -> Option<String> {
    let decoded = STANDARD.decode(id).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let numeric = decoded.strip_prefix(PROFILE_ID_PREFIX).unwrap_or(&decoded);
    Some(format!("{}{}", PROFILE_URL_BASE, numeric))
}

// green at 5.0, red at 0.0
fn rating_hue(rating: f64) -> f64 {
    (rating / 5.0) * 120.0
}

// inverse scale: low difficulty is green
fn difficulty_hue(difficulty: f64) -> f64 {
    ((5.0 - difficulty) / 5.0) * 120.0
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::School;
    use crate::page::PageDocument;

    fn record() -> RatingRecord {
        RatingRecord {
            id: "VGVhY2hlci0yMjk2MDE=".to_string(),
            first_name: "John".to_string(),
            last_name: "Smith".to_string(),
            avg_rating: Some(4.2),
            avg_difficulty: Some(2.8),
            num_ratings: Some(57),
            would_take_again_percent: Some(79.6),
            school: School {
                name: "Target U".to_string(),
            },
        }
    }

    #[test]
    fn widget_shows_every_field() {
        let markup = widget_markup(&record());
        assert!(markup.contains("John Smith"));
        assert!(markup.contains(">4.2<"));
        assert!(markup.contains("DIFFICULTY 2.8"));
        assert!(markup.contains("TAKE AGAIN 80%"));
        assert!(markup.contains("REVIEWS 57"));
        assert!(markup.contains("https://www.ratemyprofessors.com/professor/229601"));
    }

    #[test]
    fn absent_rating_renders_na_marker() {
        let mut r = record();
        r.avg_rating = None;
        let markup = widget_markup(&r);
        assert!(markup.contains("rmp-na"));
        assert!(markup.contains("N/A"));
        assert!(markup.contains("John Smith"));
    }

    #[test]
    fn each_numeric_field_degrades_independently() {
        let mut r = record();
        r.avg_rating = None;
        r.avg_difficulty = None;
        r.num_ratings = None;
        r.would_take_again_percent = None;
        let markup = widget_markup(&r);
        assert!(markup.contains("DIFFICULTY N/A"));
        assert!(markup.contains("TAKE AGAIN N/A"));
        assert!(markup.contains("REVIEWS N/A"));
        assert!(!markup.contains("rmp-difficulty-bar"));
    }

    #[test]
    fn difficulty_bar_is_proportional() {
        let markup = widget_markup(&record());
        assert!(markup.contains("width: 56%"));
    }

    #[test]
    fn hues_span_red_to_green() {
        assert_eq!(rating_hue(5.0), 120.0);
        assert_eq!(rating_hue(0.0), 0.0);
        assert!((rating_hue(4.2) - 100.8).abs() < 1e-9);
        assert_eq!(difficulty_hue(5.0), 0.0);
        assert_eq!(difficulty_hue(0.0), 120.0);
    }

    #[test]
    fn profile_url_strips_the_teacher_prefix() {
        assert_eq!(
            profile_url("VGVhY2hlci0yMjk2MDE=").as_deref(),
            Some("https://www.ratemyprofessors.com/professor/229601")
        );
    }

    #[test]
    fn profile_url_without_prefix_uses_decoded_id() {
        // base64 of "Professor-42"
        assert_eq!(
            profile_url("UHJvZmVzc29yLTQy").as_deref(),
            Some("https://www.ratemyprofessors.com/professor/Professor-42")
        );
    }

    #[test]
    fn undecodable_id_only_costs_the_link() {
        let mut r = record();
        r.id = "not base64!!".to_string();
        let markup = widget_markup(&r);
        assert!(!markup.contains("rmp-link"));
        assert!(markup.contains("John Smith"));
    }

    #[test]
    fn mount_replaces_cell_content() {
        let mut doc = PageDocument::new();
        let subtree = doc.insert_fragment(concat!(
            r#"<td data-property="instructor">"#,
            r##"<a class="email" href="#">Smith, John</a></td>"##,
        ));
        let cell = doc.instructor_cells(subtree).unwrap()[0];
        mount(&mut doc, cell, &record()).unwrap();
        assert!(doc.is_enriched(cell));
        assert!(doc.to_html().contains("John Smith"));
    }

    #[test]
    fn mount_on_a_vanished_cell_is_target_gone() {
        let mut doc = PageDocument::new();
        let subtree = doc.insert_fragment(concat!(
            r#"<td data-property="instructor">"#,
            r##"<a class="email" href="#">Smith, John</a></td>"##,
        ));
        let cell = doc.instructor_cells(subtree).unwrap()[0];
        doc.remove_subtree(subtree);
        assert!(matches!(
            mount(&mut doc, cell, &record()),
            Err(EnrichError::TargetGone)
        ));
    }

    #[test]
    fn name_is_html_escaped() {
        let mut r = record();
        r.last_name = "<script>".to_string();
        let markup = widget_markup(&r);
        assert!(!markup.contains("<script>"));
        assert!(markup.contains("&lt;script&gt;"));
    }
}
