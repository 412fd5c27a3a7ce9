//! Bulk marker import from CSV.
//!
//! Expected layout: a header row whose first cell is `layer`, then rows of
//! `layerName, timeMs, ..., annotation`. Columns between the time and the last
//! cell are ignored. Quoted cells may contain commas and `""` escapes.

use crate::{LayerId, ProjectError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedMarker {
    pub layer: LayerId,
    pub timestamp_ms: u64,
    pub annotation: Option<String>,
}

/// Result of parsing a CSV export. Nothing has been applied yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvImport {
    pub markers: Vec<ImportedMarker>,
    /// Layer names that did not map to a known layer, one per skipped row.
    pub unknown_layers: Vec<String>,
}

impl CsvImport {
    pub fn skipped_rows(&self) -> usize {
        self.unknown_layers.len()
    }
}

fn split_line(line: &str) -> Result<Vec<String>, &'static str> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    cell.push('"');
                } else {
                    in_quotes = false;
                }
            }
            ('"', false) if cell.trim().is_empty() => {
                cell.clear();
                in_quotes = true;
            }
            (',', false) => cells.push(std::mem::take(&mut cell)),
            (c, _) => cell.push(c),
        }
    }

    if in_quotes {
        return Err("unterminated quoted field");
    }
    cells.push(cell);
    Ok(cells)
}

fn parse_time(cell: &str) -> Option<u64> {
    let value: f64 = cell.trim().parse().ok()?;
    if value.is_finite() && value >= 0.0 {
        Some(value.round() as u64)
    } else {
        None
    }
}

/// Parse a marker CSV. The whole input is validated before anything is
/// returned, so a malformed row rejects the import as a unit.
pub fn parse_marker_csv(text: &str) -> Result<CsvImport, ProjectError> {
    let mut rows = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty());

    let (header_line, header) = rows.next().ok_or(ProjectError::Csv {
        line: 1,
        reason: "empty input".to_string(),
    })?;
    let header_cells = split_line(header).map_err(|reason| ProjectError::Csv {
        line: header_line,
        reason: reason.to_string(),
    })?;
    if !header_cells
        .first()
        .is_some_and(|c| c.trim().eq_ignore_ascii_case("layer"))
    {
        return Err(ProjectError::Csv {
            line: header_line,
            reason: "missing header row starting with 'Layer'".to_string(),
        });
    }

    let mut import = CsvImport::default();

    for (line, row) in rows {
        let cells = split_line(row).map_err(|reason| ProjectError::Csv {
            line,
            reason: reason.to_string(),
        })?;
        if cells.len() < 2 {
            return Err(ProjectError::Csv {
                line,
                reason: "expected at least layer and time columns".to_string(),
            });
        }

        let layer_name = cells[0].trim();
        let Ok(layer) = layer_name.parse::<LayerId>() else {
            import.unknown_layers.push(layer_name.to_string());
            continue;
        };

        let timestamp_ms = parse_time(&cells[1]).ok_or_else(|| ProjectError::Csv {
            line,
            reason: format!("invalid time '{}'", cells[1].trim()),
        })?;

        let annotation = if cells.len() >= 3 {
            cells
                .last()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .map(str::to_string)
        } else {
            None
        };

        import.markers.push(ImportedMarker {
            layer,
            timestamp_ms,
            annotation,
        });
    }

    tracing::debug!(
        markers = import.markers.len(),
        skipped = import.skipped_rows(),
        "parsed marker csv"
    );

    Ok(import)
}
