//! End-to-end worksheet scenarios

use calcgraph::prelude::*;
use calcgraph::CIRCULAR_REFERENCE;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn addr(s: &str) -> CellAddress {
    CellAddress::parse(s).unwrap()
}

#[test]
fn test_dependent_updates_without_touching_siblings() {
    let mut sheet = Worksheet::new("Sheet1");
    sheet.set_cell_input("A1", "1").unwrap();
    sheet.set_cell_input("B1", "2").unwrap();
    sheet.set_cell_input("C1", "=A1+B1").unwrap();
    assert_eq!(sheet.value("C1"), Some(&CellValue::Number(3.0)));

    let b1_version = sheet.version(addr("B1"));
    let stats = sheet.set_cell_input("A1", "5").unwrap();

    assert_eq!(sheet.value("C1"), Some(&CellValue::Number(7.0)));
    assert_eq!(stats.cells_calculated, 1);
    assert_eq!(sheet.version(addr("B1")), b1_version);
    assert_eq!(sheet.value("B1"), Some(&CellValue::Number(2.0)));
}

#[test]
fn test_self_reference_is_rejected() {
    let mut sheet = Worksheet::new("Sheet1");
    let stats = sheet.set_cell_input("A1", "=A1").unwrap();

    assert_eq!(stats.circular_references, 1);
    assert_eq!(
        sheet.value("A1"),
        Some(&CellValue::error(CIRCULAR_REFERENCE))
    );
    assert_eq!(sheet.formula("A1"), Some("=A1"));
    assert!(sheet.value("A1").unwrap().is_error());
    assert!(!sheet.dependency_graph().has_cycle());
}

#[test]
fn test_plot_truncates_to_shorter_range() {
    let mut sheet = Worksheet::new("Sheet1");
    for row in 1..=4 {
        sheet
            .set_cell_input_at(row, 1, &row.to_string())
            .unwrap();
        sheet
            .set_cell_input_at(row, 2, &(row * 10).to_string())
            .unwrap();
    }
    sheet.define_name("X", "A1:A4").unwrap();
    sheet.define_name("Y", "B1:B4").unwrap();
    sheet.set_cell_input("D1", "=PLOT(X,Y)").unwrap();

    let id = GraphId::Cell(addr("D1"));
    let sampled = sheet.sample_graph(id).unwrap();
    assert_eq!(
        sampled.points,
        (1..=4)
            .map(|i| Point::new(i as f64, i as f64 * 10.0))
            .collect::<Vec<_>>()
    );

    sheet.define_name("Y", "B1:B2").unwrap();
    let sampled = sheet.sample_graph(id).unwrap();
    assert_eq!(
        sampled.points,
        vec![Point::new(1.0, 10.0), Point::new(2.0, 20.0)]
    );
}

#[test]
fn test_division_by_zero_is_a_marker() {
    let mut sheet = Worksheet::new("Sheet1");
    let stats = sheet.set_cell_input("A1", "=1/0").unwrap();

    assert_eq!(stats.errors, 1);
    let value = sheet.value("A1").unwrap();
    assert!(value.is_error());
    assert_ne!(value.to_number(), f64::INFINITY);
}

#[test]
fn test_delete_row_shifts_cells_and_edges() {
    let mut sheet = Worksheet::new("Sheet1");
    for row in 1..=5 {
        sheet
            .set_cell_input_at(row, 1, &row.to_string())
            .unwrap();
    }
    sheet.set_cell_input("B5", "=A1*2").unwrap();
    sheet.set_cell_input("C6", "=SUM(A1:A5)").unwrap();
    assert_eq!(sheet.value("C6"), Some(&CellValue::Number(15.0)));

    sheet.delete_row(3).unwrap();

    // Rows 4 and 5 moved up, row 3 is gone
    assert_eq!(sheet.value("A3"), Some(&CellValue::Number(4.0)));
    assert_eq!(sheet.value("A4"), Some(&CellValue::Number(5.0)));
    assert_eq!(sheet.value("A5"), None);

    // Formula text is kept and edges follow the new addresses
    assert_eq!(sheet.formula("B4"), Some("=A1*2"));
    assert_eq!(sheet.formula("B5"), None);
    assert_eq!(sheet.value("B4"), Some(&CellValue::Number(2.0)));
    assert_eq!(sheet.dependents(addr("A1")), vec![addr("B4"), addr("C5")]);
    assert_eq!(sheet.formula("C5"), Some("=SUM(A1:A5)"));
    assert_eq!(sheet.value("C5"), Some(&CellValue::Number(12.0)));
}

#[test]
fn test_noop_write_keeps_cached_points() {
    let mut sheet = Worksheet::new("Sheet1");
    sheet.set_cell_input("A1", "2").unwrap();
    sheet.set_cell_input("B1", "7").unwrap();
    let graph = sheet.add_graph("A1*x").unwrap();

    let first = sheet.sample_graph(graph).unwrap();

    // Same value, and a cell the graph does not read
    sheet.set_cell_input("A1", "2").unwrap();
    sheet.set_cell_input("B1", "8").unwrap();
    let second = sheet.sample_graph(graph).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    sheet.set_cell_input("A1", "3").unwrap();
    let third = sheet.sample_graph(graph).unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_ne!(first.versions, third.versions);
    assert_eq!(
        third.points.last(),
        Some(&Point::new(10.0, 30.0))
    );
}

#[test]
fn test_cache_follows_formula_dependents() {
    let mut sheet = Worksheet::new("Sheet1");
    sheet.set_cell_input("A1", "1").unwrap();
    sheet.set_cell_input("B1", "=A1*2").unwrap();
    let graph = sheet.add_graph("B1 + x*0").unwrap();

    let before = sheet.sample_graph(graph).unwrap();
    sheet.set_cell_input("A1", "4").unwrap();
    let after = sheet.sample_graph(graph).unwrap();

    assert!(!Arc::ptr_eq(&before, &after));
    assert!(after.points.iter().all(|p| p.y == 8.0));
    assert_eq!(sheet.render_cache().stats().hits, 0);
}

#[test]
fn test_sampling_kinds() {
    let mut sheet = Worksheet::new("Sheet1");
    sheet.set_options(CalculationOptions {
        sampling: SamplingOptions {
            resolution: 5,
            implicit_grid: 5,
            ..Default::default()
        },
        ..Default::default()
    });

    let line = sheet.add_graph("1/x").unwrap();
    sheet
        .set_graph_domain(line, Some(Bounds::new(-2.0, 2.0).unwrap()))
        .unwrap();
    let sampled = sheet.sample_graph(line).unwrap();
    // x = 0 is skipped and splits the curve
    assert_eq!(sampled.len(), 4);
    assert_eq!(sampled.segments().len(), 2);

    let circle = sheet.add_graph("POINT(cos(t), sin(t))").unwrap();
    assert_eq!(sheet.sample_graph(circle).unwrap().len(), 5);

    let diagonal = sheet.add_graph("x - y").unwrap();
    sheet
        .set_graph_domain(diagonal, Some(Bounds::new(-1.0, 1.0).unwrap()))
        .unwrap();
    sheet
        .set_graph_range(diagonal, Some(Bounds::new(-1.0, 1.0).unwrap()))
        .unwrap();
    let points = &sheet.sample_graph(diagonal).unwrap().points;
    assert_eq!(points.len(), 5);
    assert!(points.iter().all(|p| p.x == p.y));

    sheet.set_cell_input("A1", "1").unwrap();
    sheet.set_cell_input("B1", "2").unwrap();
    sheet.set_cell_input("A2", "3").unwrap();
    sheet.set_cell_input("B2", "4").unwrap();
    let scatter = sheet.add_graph("A1:B2").unwrap();
    assert_eq!(sheet.graph(scatter).unwrap().kind, GraphKind::Scatter);
    assert_eq!(
        sheet.sample_graph(scatter).unwrap().points,
        vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)]
    );
}

#[test]
fn test_workbook_keeps_one_sheet() {
    let mut workbook = Workbook::new();
    workbook.add_worksheet_with_name("Data").unwrap();
    workbook.remove_worksheet(0).unwrap();

    assert_eq!(workbook.active_worksheet().name(), "Data");
    assert!(matches!(
        workbook.remove_worksheet(0),
        Err(Error::LastWorksheet)
    ));
}

#[test]
fn test_whole_column_sum_tracks_writes() {
    let mut sheet = Worksheet::new("Sheet1");
    sheet.set_cell_input("B1", "=SUM(A1:A1048576)").unwrap();
    sheet.set_cell_input("C1", "=B1*2").unwrap();
    assert_eq!(sheet.value("B1"), Some(&CellValue::Number(0.0)));

    sheet.set_cell_input("A500000", "3").unwrap();
    sheet.set_cell_input("A7", "=A500000+1").unwrap();
    assert_eq!(sheet.value("B1"), Some(&CellValue::Number(7.0)));
    assert_eq!(sheet.value("C1"), Some(&CellValue::Number(14.0)));
    assert_eq!(sheet.dependents(addr("A900000")), vec![addr("B1")]);

    // A cell inside the column cannot read the sum
    let stats = sheet.set_cell_input("A2", "=C1").unwrap();
    assert_eq!(stats.circular_references, 1);
    assert!(!sheet.dependency_graph().has_cycle());
}

#[test]
fn test_non_finite_results_settle_as_markers() {
    let mut sheet = Worksheet::new("Sheet1");
    sheet.set_cell_input("A1", "=ROUND(1.5,400)").unwrap();
    sheet.set_cell_input("A2", "=1E308*10").unwrap();
    sheet.set_cell_input("A3", "=A1=0").unwrap();
    assert!(sheet.value("A1").unwrap().is_error());
    assert!(sheet.value("A2").unwrap().is_error());
    assert_eq!(sheet.value("A3"), sheet.value("A1"));

    let graph = sheet.add_graph("A1 + x").unwrap();
    let first = sheet.sample_graph(graph).unwrap();
    let version = sheet.version(addr("A1"));

    // Recalculating an unchanged sheet keeps versions and cached points
    sheet.recalculate_all().unwrap();
    assert_eq!(sheet.version(addr("A1")), version);
    assert!(Arc::ptr_eq(&first, &sheet.sample_graph(graph).unwrap()));
}
