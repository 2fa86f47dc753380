use crate::segment::{Segment, display_width, item_label};

const MAX_WIDTH: f64 = 80.0;
const STRIP_HEIGHT: usize = 4;
const MIN_CELL: f64 = 6.0;
const CLIENT_CHARS: usize = 12;

/// ASCII preview of one print segment: the substrate as a strip with one
/// box per cut roll, followed by its usage line.
pub fn render_segment(segment: &Segment, max_allowed_width: f64) -> String {
    let canvas = MAX_WIDTH.round() as usize;
    let cells: Vec<usize> = segment
        .items
        .iter()
        .map(|i| display_width(i.width_inches, max_allowed_width, MAX_WIDTH, MIN_CELL).round() as usize)
        .collect();
    let drawn: usize = cells.iter().sum();
    let grid_w = canvas.max(drawn);

    let mut grid = vec![vec![' '; grid_w + 1]; STRIP_HEIGHT + 1];

    // Substrate border first
    draw_rect(&mut grid, 0, 0, canvas, STRIP_HEIGHT);

    let mut x = 0;
    for (item, &w) in segment.items.iter().zip(&cells) {
        draw_rect(&mut grid, x, 0, w, STRIP_HEIGHT);
        let label = item_label(item, CLIENT_CHARS);
        write_centered(&mut grid, x, w, 1, &label.code);
        write_centered(&mut grid, x, w, 2, &label.width);
        if !label.client.is_empty() {
            write_centered(&mut grid, x, w, 3, &label.client);
        }
        x += w;
    }

    let mut result = String::new();
    for row in &grid {
        let line: String = row.iter().collect();
        result.push_str(line.trim_end());
        result.push('\n');
    }
    result.push_str(&format!(
        "used {}\" | waste {}\" | {:.1}%{}\n",
        segment.used_width,
        segment.waste,
        segment.efficiency * 100.0,
        if segment.oversized { " | oversized" } else { "" }
    ));
    result
}

fn write_centered(grid: &mut [Vec<char>], x: usize, w: usize, row: usize, text: &str) {
    if w < 2 || row >= grid.len() {
        return;
    }
    let chars: Vec<char> = text.chars().take(w - 1).collect();
    let start = x + 1 + (w - 1 - chars.len()) / 2;
    for (i, &ch) in chars.iter().enumerate() {
        let col = start + i;
        if col > x && col < x + w && col < grid[row].len() {
            grid[row][col] = ch;
        }
    }
}

#[allow(clippy::needless_range_loop)]
fn draw_rect(grid: &mut [Vec<char>], x: usize, y: usize, w: usize, h: usize) {
    let rows = grid.len();
    let cols = if rows > 0 { grid[0].len() } else { return };

    // Horizontal edges
    for i in x..=x + w {
        if i < cols {
            for edge in [y, y + h] {
                if edge < rows {
                    grid[edge][i] = if grid[edge][i] == '|' || grid[edge][i] == '+' {
                        '+'
                    } else {
                        '-'
                    };
                }
            }
        }
    }

    // Vertical edges
    for j in y..=y + h {
        if j < rows {
            for edge in [x, x + w] {
                if edge < cols {
                    grid[j][edge] = if grid[j][edge] == '-' || grid[j][edge] == '+' {
                        '+'
                    } else {
                        '|'
                    };
                }
            }
        }
    }

    for &cx in &[x, x + w] {
        for &cy in &[y, y + h] {
            if cy < rows && cx < cols {
                grid[cy][cx] = '+';
            }
        }
    }
}
