use super::age::{age_from_age_cell, age_from_birth_date, parse_birth_date};
use super::header::HeaderInfo;
use super::sheet::{Cell, Grid};
use chrono::NaiveDate;

/// A student as read from one sheet row, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub row_number: usize,
    pub name: String,
    pub age: Option<u32>,
    pub birth_date: Option<NaiveDate>,
}

fn cell_at(row: &[Cell], col: Option<usize>) -> Option<&Cell> {
    col.and_then(|c| row.get(c)).filter(|c| !c.is_empty())
}

pub fn display_name(row: &[Cell], header: &HeaderInfo) -> String {
    let cols = &header.columns;
    [cols.first_name, cols.last_name, cols.full_name]
        .into_iter()
        .filter_map(|col| cell_at(row, col))
        .map(Cell::display)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn map_row(
    row: &[Cell],
    row_number: usize,
    header: &HeaderInfo,
    today: NaiveDate,
) -> Candidate {
    let cols = &header.columns;
    let name = display_name(row, header);

    // A filled birth date decides the age on its own, even when unreadable.
    let (age, birth_date) = match cell_at(row, cols.birth_date) {
        Some(cell) => (age_from_birth_date(cell, today), parse_birth_date(cell)),
        None => (cell_at(row, cols.age).and_then(age_from_age_cell), None),
    };

    Candidate {
        row_number,
        name,
        age,
        birth_date,
    }
}

/// Maps every non-blank row below the header.
pub fn map_rows(grid: &Grid, header: &HeaderInfo, today: NaiveDate) -> Vec<Candidate> {
    grid.rows
        .iter()
        .enumerate()
        .skip(header.row_index + 1)
        .filter(|(_, row)| !row.iter().all(Cell::is_empty))
        .map(|(idx, row)| map_row(row, grid.sheet_row_number(idx), header, today))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::header::locate_header;

    fn grid(rows: &[&[&str]]) -> Grid {
        Grid::from_rows(
            rows.iter()
                .map(|r| r.iter().map(|s| Cell::text(s)).collect())
                .collect(),
        )
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn first_name_comes_before_last_name() {
        let g = grid(&[
            &["Nom", "Prénom", "Date de naissance"],
            &["Ben Ali", "Ahmed", "15/06/2019"],
        ]);
        let header = locate_header(&g.rows).expect("header");

        let after = map_rows(&g, &header, date(2026, 10, 19));
        assert_eq!(
            after,
            vec![Candidate {
                row_number: 2,
                name: "Ahmed Ben Ali".into(),
                age: Some(7),
                birth_date: Some(date(2019, 6, 15)),
            }]
        );

        let before = map_rows(&g, &header, date(2026, 6, 14));
        assert_eq!(before[0].age, Some(6));
    }

    #[test]
    fn age_column_is_used_only_without_a_birth_date() {
        let g = grid(&[
            &["Name", "Date de naissance", "Age"],
            &["Omar Haddad", "", "9"],
            &["Sara Khelifi", "bientôt", "9"],
        ]);
        let header = locate_header(&g.rows).expect("header");
        let rows = map_rows(&g, &header, date(2026, 10, 19));
        assert_eq!(rows[0].age, Some(9));
        assert_eq!(rows[1].age, None);
    }

    #[test]
    fn blank_rows_are_skipped_but_keep_sheet_numbering() {
        let g = grid(&[
            &["Titre"],
            &["Nom", "Âge"],
            &["", ""],
            &["Trabelsi", "8"],
        ]);
        let header = locate_header(&g.rows).expect("header");
        let rows = map_rows(&g, &header, date(2026, 10, 19));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row_number, 4);
        assert_eq!(rows[0].name, "Trabelsi");
    }

    #[test]
    fn short_rows_read_missing_cells_as_blank() {
        let g = grid(&[&["Prénom", "Nom", "Âge"], &["Yasmine"]]);
        let header = locate_header(&g.rows).expect("header");
        let rows = map_rows(&g, &header, date(2026, 10, 19));
        assert_eq!(rows[0].name, "Yasmine");
        assert_eq!(rows[0].age, None);
    }
}
