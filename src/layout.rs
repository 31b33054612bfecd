//! Flattening of the nested row/column/group configuration into the grids
//! the renderer walks.

use crate::types::{Row, SizeLabel, Widget};

/// `widgets[row][col]` holds every widget of a column in order and
/// `sizes[row]` holds one size per column, so both grids have the same shape.
#[derive(Debug, Default, PartialEq)]
pub struct Grid<'a> {
    pub widgets: Vec<Vec<Vec<&'a Widget>>>,
    pub sizes: Vec<Vec<SizeLabel>>,
}

impl<'a> Grid<'a> {
    pub fn rows(&self) -> usize {
        self.widgets.len()
    }

    /// Every widget in render order: rows top to bottom, columns left to right.
    pub fn iter(&self) -> impl Iterator<Item = &'a Widget> + '_ {
        self.widgets.iter().flatten().flatten().copied()
    }
}

/// Columns without a widget group are skipped; a group without elements
/// still occupies its column.
pub fn flatten(rows: &[Row]) -> Grid<'_> {
    let mut grid = Grid::default();

    for row in rows {
        let mut widget_row = Vec::with_capacity(row.row.len());
        let mut size_row = Vec::with_capacity(row.row.len());

        for group in row.row.iter().filter_map(|c| c.col.as_ref()) {
            widget_row.push(group.elements.iter().collect());
            size_row.push(group.size);
        }

        grid.widgets.push(widget_row);
        grid.sizes.push(size_row);
    }

    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Column, WidgetGroup};
    use proptest::prelude::*;

    fn group(size: SizeLabel, names: &[&str]) -> Column {
        Column {
            col: Some(WidgetGroup {
                size,
                elements: names.iter().map(|n| Widget::new(n)).collect(),
            }),
        }
    }

    #[test]
    fn flattens_rows_and_columns_in_order() {
        let rows = vec![
            Row {
                row: vec![
                    group(SizeLabel::M, &["ga.box_real_time", "ga.bar_sessions"]),
                    group(SizeLabel::S, &["lh.box_uptime"]),
                ],
            },
            Row {
                row: vec![group(SizeLabel::Xxl, &["git.table_commits"])],
            },
        ];

        let grid = flatten(&rows);
        assert_eq!(grid.rows(), 2);
        assert_eq!(grid.sizes, vec![vec![SizeLabel::M, SizeLabel::S], vec![SizeLabel::Xxl]]);
        assert_eq!(grid.widgets[0][0].len(), 2);
        assert_eq!(grid.widgets[0][0][1].name.as_str(), "ga.bar_sessions");

        let order: Vec<_> = grid.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(
            order,
            vec!["ga.box_real_time", "ga.bar_sessions", "lh.box_uptime", "git.table_commits"]
        );
    }

    #[test]
    fn columns_without_a_group_are_skipped() {
        let rows = vec![Row {
            row: vec![Column { col: None }, group(SizeLabel::L, &[]), Column::default()],
        }];
        let grid = flatten(&rows);
        assert_eq!(grid.sizes[0], vec![SizeLabel::L]);
        assert_eq!(grid.widgets[0].len(), 1);
        assert!(grid.widgets[0][0].is_empty());
    }

    #[test]
    fn empty_configuration_yields_empty_grids() {
        let grid = flatten(&[]);
        assert!(grid.widgets.is_empty());
        assert!(grid.sizes.is_empty());
    }

    fn arb_rows() -> impl Strategy<Value = Vec<Row>> {
        let column = prop::option::of(0usize..4).prop_map(|widgets| Column {
            col: widgets.map(|n| WidgetGroup {
                size: SizeLabel::M,
                elements: (0..n).map(|i| Widget::new(&format!("display.box_{}", i))).collect(),
            }),
        });
        prop::collection::vec(prop::collection::vec(column, 0..5).prop_map(|row| Row { row }), 0..5)
    }

    proptest! {
        #[test]
        fn grids_always_share_their_shape(rows in arb_rows()) {
            let grid = flatten(&rows);
            prop_assert_eq!(grid.widgets.len(), grid.sizes.len());
            for (r, row) in rows.iter().enumerate() {
                let groups = row.row.iter().filter(|c| c.col.is_some()).count();
                prop_assert_eq!(grid.sizes[r].len(), groups);
                prop_assert_eq!(grid.widgets[r].len(), groups);
            }
            let total: usize = rows.iter()
                .flat_map(|r| r.row.iter())
                .filter_map(|c| c.col.as_ref())
                .map(|g| g.elements.len())
                .sum();
            prop_assert_eq!(grid.iter().count(), total);
        }
    }
}
