use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

pub struct Column {
    header: &'static str,
    align: Align,
}

/// Left-aligned column for names, phases and other text.
pub fn col(header: &'static str) -> Column {
    Column {
        header,
        align: Align::Left,
    }
}

/// Right-aligned column for revisions, counts and ports.
pub fn num(header: &'static str) -> Column {
    Column {
        header,
        align: Align::Right,
    }
}

pub fn print_table(columns: &[Column], rows: Vec<Vec<String>>) {
    print!("{}", render_table(columns, &rows));
}

fn render_table(columns: &[Column], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = columns.iter().map(|c| c.header.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.len());
            }
        }
    }

    let headers: Vec<&str> = columns.iter().map(|c| c.header).collect();
    let mut out = String::new();
    out.push_str(&render_row(columns, &widths, &headers));
    out.push('\n');

    let rules: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    out.push_str(&rules.join("  "));
    out.push('\n');

    for row in rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push_str(&render_row(columns, &widths, &cells));
        out.push('\n');
    }
    out
}

fn render_row(columns: &[Column], widths: &[usize], cells: &[&str]) -> String {
    let mut line = String::new();
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            line.push_str("  ");
        }
        let width = widths.get(i).copied().unwrap_or(0);
        let align = columns.get(i).map(|c| c.align).unwrap_or(Align::Left);
        match align {
            Align::Left => line.push_str(&format!("{cell:<width$}")),
            Align::Right => line.push_str(&format!("{cell:>width$}")),
        }
    }
    line.truncate(line.trim_end().len());
    line
}
