//! Text chunking module
//!
//! Splits page text into `table` chunks for row-structured blocks and
//! `text` chunks for prose.

use crate::pdf::PageText;
use lectern_common::config::ChunkingSettings;
use lectern_common::models::{ChunkType, NewChunk};
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::debug;

/// Configuration for text chunking
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Prose chunks shorter than this are dropped
    pub min_chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            min_chunk_size: 40,
        }
    }
}

impl From<&ChunkingSettings> for ChunkingConfig {
    fn from(settings: &ChunkingSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size.max(1),
            min_chunk_size: settings.min_chunk_size,
        }
    }
}

enum Block {
    Prose(Vec<String>),
    Table(Vec<Vec<String>>),
}

/// Split a line into table cells on `|`, tabs, or runs of two or more
/// spaces. Fewer than two cells means the line is not a table row.
pub fn split_cells(line: &str) -> Option<Vec<String>> {
    let cells: Vec<String> = if line.contains('|') {
        line.split('|').map(|c| c.trim().to_string()).collect()
    } else if line.contains('\t') {
        line.split('\t').map(|c| c.trim().to_string()).collect()
    } else {
        line.trim().split("  ").map(|c| c.trim().to_string()).collect()
    };

    let cells: Vec<String> = cells.into_iter().filter(|c| !c.is_empty()).collect();
    (cells.len() >= 2).then_some(cells)
}

fn blocks(text: &str) -> Vec<Block> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let rows: Vec<Option<Vec<String>>> = lines.iter().map(|l| split_cells(l)).collect();

    let mut blocks = Vec::new();
    let mut prose: Vec<String> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        // a table needs at least two consecutive row-shaped lines
        let run = rows[i..].iter().take_while(|r| r.is_some()).count();
        if run >= 2 {
            if !prose.is_empty() {
                blocks.push(Block::Prose(std::mem::take(&mut prose)));
            }
            let table = rows[i..i + run].iter().flatten().cloned().collect();
            blocks.push(Block::Table(table));
            i += run;
        } else {
            prose.push(lines[i].trim().to_string());
            i += 1;
        }
    }

    if !prose.is_empty() {
        blocks.push(Block::Prose(prose));
    }
    blocks
}

/// Render table rows, splitting oversized tables into row groups that each
/// repeat the header
fn table_chunks(rows: &[Vec<String>], chunk_size: usize) -> Vec<String> {
    let rendered: Vec<String> = rows.iter().map(|cells| cells.join(" | ")).collect();
    let Some((header, body)) = rendered.split_first() else {
        return Vec::new();
    };

    let mut chunks = Vec::new();
    let mut current = header.clone();
    let mut has_rows = false;

    for row in body {
        if has_rows && current.len() + 1 + row.len() > chunk_size {
            chunks.push(std::mem::replace(&mut current, header.clone()));
        }
        current.push('\n');
        current.push_str(row);
        has_rows = true;
    }

    chunks.push(current);
    chunks
}

/// Chunk one page
pub fn chunk_page(page: &PageText, config: &ChunkingConfig) -> Vec<NewChunk> {
    let splitter = TextSplitter::new(ChunkConfig::new(config.chunk_size.max(1)));
    let mut result = Vec::new();

    for block in blocks(&page.text) {
        match block {
            Block::Table(rows) => {
                for content in table_chunks(&rows, config.chunk_size) {
                    result.push(NewChunk {
                        page: page.number,
                        chunk_type: ChunkType::Table,
                        content,
                    });
                }
            }
            Block::Prose(lines) => {
                let text = lines.join("\n");
                for piece in splitter.chunks(&text) {
                    let piece = piece.trim();
                    if piece.chars().count() < config.min_chunk_size {
                        continue;
                    }
                    result.push(NewChunk {
                        page: page.number,
                        chunk_type: ChunkType::Text,
                        content: piece.to_string(),
                    });
                }
            }
        }
    }

    result
}

/// Chunk every page, in page order
pub fn chunk_pages(pages: &[PageText], config: &ChunkingConfig) -> Vec<NewChunk> {
    let chunks: Vec<NewChunk> = pages.iter().flat_map(|p| chunk_page(p, config)).collect();

    debug!(
        pages = pages.len(),
        chunk_count = chunks.len(),
        tables = chunks.iter().filter(|c| c.chunk_type == ChunkType::Table).count(),
        chunk_size = config.chunk_size,
        "Pages chunked"
    );

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: u32, text: &str) -> PageText {
        PageText {
            number,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_split_cells() {
        assert_eq!(
            split_cells("| Physics | 1200 |"),
            Some(vec!["Physics".to_string(), "1200".to_string()])
        );
        assert_eq!(
            split_cells("Physics\t1200\tYes"),
            Some(vec!["Physics".to_string(), "1200".to_string(), "Yes".to_string()])
        );
        assert_eq!(
            split_cells("Physics    1200"),
            Some(vec!["Physics".to_string(), "1200".to_string()])
        );
        assert_eq!(split_cells("A normal sentence with single spaces."), None);
    }

    #[test]
    fn test_table_and_prose_separated() {
        let text = "The fee structure for the current year is listed below in full.\n\
                    Course    Semester    Fee\n\
                    Physics    1    1200\n\
                    Chemistry    1    1100\n\
                    Fees must be paid before the start of each semester to avoid penalties.";
        let config = ChunkingConfig {
            chunk_size: 1000,
            min_chunk_size: 10,
        };

        let chunks = chunk_page(&page(4, text), &config);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chunk_type, ChunkType::Text);
        assert_eq!(chunks[1].chunk_type, ChunkType::Table);
        assert_eq!(
            chunks[1].content,
            "Course | Semester | Fee\nPhysics | 1 | 1200\nChemistry | 1 | 1100"
        );
        assert_eq!(chunks[2].chunk_type, ChunkType::Text);
        assert!(chunks.iter().all(|c| c.page == 4));
    }

    #[test]
    fn test_single_row_shaped_line_is_prose() {
        let text = "Contact    Office\nThe office is open on weekdays from nine to five.";
        let config = ChunkingConfig {
            chunk_size: 1000,
            min_chunk_size: 5,
        };

        let chunks = chunk_page(&page(1, text), &config);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type, ChunkType::Text);
    }

    #[test]
    fn test_large_table_repeats_header() {
        let rows: Vec<Vec<String>> = std::iter::once(vec!["Name".to_string(), "Room".to_string()])
            .chain((0..20).map(|i| vec![format!("Student {i}"), format!("{}", 100 + i)]))
            .collect();

        let chunks = table_chunks(&rows, 60);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.starts_with("Name | Room\n")));
        let total_rows: usize = chunks.iter().map(|c| c.lines().count() - 1).sum();
        assert_eq!(total_rows, 20);
    }

    #[test]
    fn test_short_prose_dropped() {
        let chunks = chunk_pages(&[page(1, "Page 1"), page(2, "Too short")], &ChunkingConfig::default());
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_long_prose_split() {
        let text = "Students must register for courses each semester. ".repeat(60);
        let config = ChunkingConfig {
            chunk_size: 200,
            min_chunk_size: 10,
        };

        let chunks = chunk_page(&page(2, &text), &config);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.content.chars().count() <= 200));
    }
}
