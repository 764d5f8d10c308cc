mod common;

use common::synthetic_image::{
    blank_page, draw_glyph, draw_glyph_run, draw_inverted_panel, draw_ring,
};
use column_detector::refine::MergeParams;
use column_detector::{
    ColumnDetector, DetectOptions, DetectionReport, DetectorParams, Orientation, Rect,
};

fn detect(page: &column_detector::image::RgbImage) -> DetectionReport {
    let detector = ColumnDetector::new(DetectorParams::default()).unwrap();
    detector.detect(page, &DetectOptions::default()).unwrap()
}

fn detect_with(
    page: &column_detector::image::RgbImage,
    orientation: Orientation,
) -> DetectionReport {
    let detector = ColumnDetector::new(DetectorParams::default()).unwrap();
    let options = DetectOptions {
        orientation,
        ..Default::default()
    };
    detector.detect(page, &options).unwrap()
}

/// Every column rect must be exactly the union of its member areas, and the
/// reading-order links must form chains without cycles.
fn check_report_invariants(report: &DetectionReport) {
    for col in &report.columns {
        assert!(!col.areas.is_empty(), "column without areas: {:?}", col.rect);
        let union = col
            .areas
            .iter()
            .skip(1)
            .fold(col.areas[0].rect, |acc, a| acc.union(&a.rect));
        assert_eq!(col.rect, union, "column rect is not the union of its areas");
    }
    for start in 0..report.columns.len() {
        let mut visited = vec![false; report.columns.len()];
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            assert!(!visited[id], "link cycle through column {id}");
            visited[id] = true;
            cursor = report.columns[id].next;
        }
    }
    let rects: Vec<Rect> = report
        .columns
        .iter()
        .flat_map(|c| c.areas.iter().map(|a| a.rect))
        .collect();
    for (i, a) in rects.iter().enumerate() {
        for b in &rects[i + 1..] {
            assert!(
                a.intersection(b).is_none(),
                "areas overlap: {a:?} and {b:?}"
            );
        }
    }
}

#[test]
fn blank_page_has_no_columns() {
    let page = blank_page(200, 200);
    let report = detect(&page);
    assert!(report.columns.is_empty());
    assert_eq!(report.trace.areas_extracted, 0);
}

#[test]
fn single_glyph_is_one_exact_column() {
    let mut page = blank_page(100, 100);
    draw_glyph(&mut page, Rect::new(40, 40, 20, 20));
    let report = detect(&page);

    assert_eq!(report.columns.len(), 1);
    assert_eq!(report.columns[0].rect, Rect::new(40, 40, 20, 20));
    assert_eq!(report.trace.areas_extracted, 1);
    assert_eq!(report.trace.columns_final, 1);
    check_report_invariants(&report);
}

#[test]
fn two_vertical_columns_link_right_to_left() {
    let mut page = blank_page(150, 150);
    draw_glyph_run(&mut page, 90, 10, 20, 5, 3, true);
    draw_glyph_run(&mut page, 40, 10, 20, 5, 3, true);
    let report = detect(&page);

    assert_eq!(report.columns.len(), 2);
    assert!(report.columns.iter().all(|c| c.vertical));
    for col in &report.columns {
        if let Some(next) = col.next {
            assert!(
                report.columns[next].rect.x < col.rect.x,
                "vertical text must continue to the left"
            );
        }
    }
    assert!(
        report.columns.iter().any(|c| c.next.is_some()),
        "adjacent columns should be linked"
    );
    check_report_invariants(&report);
}

#[test]
fn glyph_row_reads_horizontal_and_stack_reads_vertical() {
    let mut row_page = blank_page(150, 150);
    draw_glyph_run(&mut row_page, 10, 40, 20, 5, 4, false);
    let row = detect(&row_page);
    assert_eq!(row.columns.len(), 1);
    assert!(!row.columns[0].vertical);
    assert_eq!(row.columns[0].areas.len(), 4);

    let mut stack_page = blank_page(150, 150);
    draw_glyph_run(&mut stack_page, 40, 10, 20, 5, 4, true);
    let stack = detect(&stack_page);
    assert_eq!(stack.columns.len(), 1);
    assert!(stack.columns[0].vertical);
    assert_eq!(stack.columns[0].areas.len(), 4);
}

#[test]
fn forced_runs_keep_areas_in_reading_order() {
    let mut row_page = blank_page(150, 150);
    draw_glyph_run(&mut row_page, 10, 40, 20, 5, 4, false);
    let row = detect_with(&row_page, Orientation::Horizontal);
    assert_eq!(row.columns.len(), 1);
    let xs: Vec<i32> = row.columns[0].areas.iter().map(|a| a.rect.x).collect();
    assert!(xs.windows(2).all(|w| w[0] < w[1]), "row must read left to right");

    let mut stack_page = blank_page(150, 150);
    draw_glyph_run(&mut stack_page, 40, 10, 20, 5, 4, true);
    let stack = detect_with(&stack_page, Orientation::Vertical);
    assert_eq!(stack.columns.len(), 1);
    let ys: Vec<i32> = stack.columns[0].areas.iter().map(|a| a.rect.y).collect();
    assert!(ys.windows(2).all(|w| w[0] < w[1]), "stack must read top down");
}

#[test]
fn forced_orientation_is_respected() {
    let mut page = blank_page(150, 150);
    draw_glyph_run(&mut page, 40, 10, 20, 5, 4, true);

    let report = detect_with(&page, Orientation::Horizontal);
    assert!(!report.columns.is_empty());
    assert!(report.columns.iter().all(|c| !c.vertical));
    check_report_invariants(&report);
}

#[test]
fn bubble_outline_never_becomes_a_column() {
    let mut page = blank_page(120, 120);
    draw_ring(&mut page, Rect::new(15, 15, 90, 90), 3);
    draw_glyph(&mut page, Rect::new(50, 50, 20, 20));
    let report = detect(&page);

    assert_eq!(report.trace.areas_extracted, 1);
    assert_eq!(report.columns.len(), 1);
    assert_eq!(report.columns[0].rect, Rect::new(50, 50, 20, 20));
}

#[test]
fn thin_neighbor_column_is_flagged_as_furigana() {
    let mut page = blank_page(150, 150);
    // main column of four characters with a run of small ruby glyphs on its
    // right side
    draw_glyph_run(&mut page, 40, 10, 20, 5, 4, true);
    draw_glyph_run(&mut page, 62, 12, 8, 4, 6, true);
    let report = detect(&page);

    assert_eq!(report.columns.len(), 2);
    assert!(report.columns.iter().all(|c| c.vertical));
    let furigana: Vec<_> = report.columns.iter().filter(|c| c.furigana).collect();
    assert_eq!(furigana.len(), 1);
    assert_eq!(furigana[0].rect.w, 8);
    let host = report.columns.iter().find(|c| !c.furigana).unwrap();
    assert_eq!(host.rect, Rect::new(40, 10, 20, 95));
    check_report_invariants(&report);
}

#[test]
fn light_on_dark_panel_is_detected() {
    let mut page = blank_page(150, 150);
    draw_inverted_panel(
        &mut page,
        Rect::new(0, 0, 90, 90),
        &[Rect::new(30, 30, 20, 20)],
    );
    let report = detect(&page);

    assert!(report.trace.inverted_blocks > 0);
    assert_eq!(report.columns.len(), 1);
    assert_eq!(report.columns[0].rect, Rect::new(30, 30, 20, 20));
}

#[test]
fn params_deserialize_with_defaults() {
    let params: DetectorParams = serde_json::from_str(
        r#"{ "merge": { "max_chunk_size": 8 }, "binarize": { "black_threshold": 120 } }"#,
    )
    .unwrap();
    assert_eq!(params.merge.max_chunk_size, 8);
    assert_eq!(params.binarize.black_threshold, 120);
    // untouched fields keep their defaults
    assert_eq!(params.merge.max_area_size, MergeParams::default().max_area_size);
    assert!(params.validate().is_ok());

    let page = {
        let mut p = blank_page(100, 100);
        draw_glyph(&mut p, Rect::new(40, 40, 20, 20));
        p
    };
    let detector = ColumnDetector::new(params).unwrap();
    let report = detector.detect(&page, &DetectOptions::default()).unwrap();
    assert_eq!(report.columns.len(), 1);
}
