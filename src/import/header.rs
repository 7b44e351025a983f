use super::sheet::Cell;
use super::ImportError;

/// Header labels that mark the start of the student list.
pub const NAME_HEADERS: [&str; 3] = ["nom", "prénom", "name"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub first_name: Option<usize>,
    pub last_name: Option<usize>,
    pub full_name: Option<usize>,
    pub birth_date: Option<usize>,
    pub age: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderInfo {
    /// Index into `Grid::rows`.
    pub row_index: usize,
    pub columns: ColumnMap,
}

fn normalize(label: &str) -> String {
    label.trim().to_lowercase()
}

fn header_label(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Text(s) => Some(normalize(s)),
        _ => None,
    }
}

fn is_name_header(label: &str) -> bool {
    NAME_HEADERS.contains(&label)
}

fn is_birth_date_header(label: &str) -> bool {
    label.contains("naissance") || label.contains("birth") || label.starts_with("date")
}

fn is_age_header(label: &str) -> bool {
    label == "âge" || label == "age"
}

pub fn locate_header(rows: &[Vec<Cell>]) -> Result<HeaderInfo, ImportError> {
    let row_index = rows
        .iter()
        .position(|row| {
            row.iter()
                .filter_map(header_label)
                .any(|label| is_name_header(&label))
        })
        .ok_or(ImportError::HeaderNotFound)?;

    Ok(HeaderInfo {
        row_index,
        columns: map_columns(&rows[row_index]),
    })
}

fn map_columns(header: &[Cell]) -> ColumnMap {
    let mut map = ColumnMap::default();
    for (idx, cell) in header.iter().enumerate() {
        let Some(label) = header_label(cell) else {
            continue;
        };
        // First matching column wins for each role.
        let slot = match label.as_str() {
            "prénom" => &mut map.first_name,
            "nom" => &mut map.last_name,
            "name" => &mut map.full_name,
            l if is_age_header(l) => &mut map.age,
            l if is_birth_date_header(l) => &mut map.birth_date,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(idx);
        }
    }
    map
}
