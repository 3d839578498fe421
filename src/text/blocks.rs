//! Grouping text runs into blocks.

use std::cmp::Ordering;

use serde::Serialize;

use super::interpreter::TextRun;
use crate::model::Rect;

/// Runs closer than this many font heights (sideways) join one block.
const HORIZONTAL_GAP: f64 = 1.0;

/// Runs closer than this many font heights (vertically) join one block.
const VERTICAL_GAP: f64 = 0.5;

/// A visually contiguous region of text on a page.
#[derive(Debug, Clone, Serialize)]
pub struct TextBlock {
    /// Union of the run boxes
    pub rect: Rect,
    /// Text in reading order, lines separated by `\n`
    pub text: String,
    /// The operations that produced the text
    pub runs: Vec<TextRun>,
}

impl TextBlock {
    /// Content-stream indices of the operations in this block.
    pub fn op_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.runs.iter().map(|r| r.op_index)
    }
}

/// Group runs into blocks by proximity.
///
/// Two runs belong to the same block when one, grown by a font height
/// sideways and half a font height vertically, overlaps the other. Blocks
/// come back in reading order (top to bottom, then left to right).
pub fn group_runs(runs: &[TextRun]) -> Vec<TextBlock> {
    let n = runs.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    let grown: Vec<Rect> = runs
        .iter()
        .map(|r| {
            let h = r.rect.height().max(r.font_size).max(1.0);
            r.rect.expand(h * HORIZONTAL_GAP, h * VERTICAL_GAP)
        })
        .collect();

    for i in 0..n {
        for j in (i + 1)..n {
            if grown[i].intersects(&runs[j].rect) || grown[j].intersects(&runs[i].rect) {
                let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                if a != b {
                    parent[b] = a;
                }
            }
        }
    }

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut slot_of_root: Vec<Option<usize>> = vec![None; n];
    for i in 0..n {
        let root = find(&mut parent, i);
        match slot_of_root[root] {
            Some(slot) => groups[slot].push(i),
            None => {
                slot_of_root[root] = Some(groups.len());
                groups.push(vec![i]);
            }
        }
    }

    let mut blocks: Vec<TextBlock> = groups
        .into_iter()
        .map(|members| build_block(members.into_iter().map(|i| runs[i].clone()).collect()))
        .collect();

    blocks.sort_by(|a, b| {
        b.rect
            .y1
            .partial_cmp(&a.rect.y1)
            .unwrap_or(Ordering::Equal)
            .then(a.rect.x0.partial_cmp(&b.rect.x0).unwrap_or(Ordering::Equal))
    });
    blocks
}

fn build_block(runs: Vec<TextRun>) -> TextBlock {
    let rect = runs
        .iter()
        .skip(1)
        .fold(runs[0].rect, |acc, r| acc.union(&r.rect));

    // Reading order: lines top to bottom, runs left to right.
    let mut ordered: Vec<&TextRun> = runs.iter().collect();
    ordered.sort_by(|a, b| {
        b.rect
            .y0
            .partial_cmp(&a.rect.y0)
            .unwrap_or(Ordering::Equal)
            .then(a.rect.x0.partial_cmp(&b.rect.x0).unwrap_or(Ordering::Equal))
    });

    let mut lines: Vec<Vec<&TextRun>> = Vec::new();
    for run in ordered {
        let tolerance = run.font_size.max(1.0) * 0.3;
        match lines.last_mut() {
            Some(line) if (line[0].rect.y0 - run.rect.y0).abs() <= tolerance => line.push(run),
            _ => lines.push(vec![run]),
        }
    }

    let text = lines
        .iter_mut()
        .map(|line| {
            line.sort_by(|a, b| a.rect.x0.partial_cmp(&b.rect.x0).unwrap_or(Ordering::Equal));
            let mut out = String::new();
            let mut prev_end: Option<f64> = None;
            for run in line.iter() {
                if let Some(end) = prev_end {
                    let gap = run.rect.x0 - end;
                    if gap > run.font_size * 0.15 && !out.ends_with(' ') {
                        out.push(' ');
                    }
                }
                out.push_str(&run.text);
                prev_end = Some(run.rect.x1);
            }
            out
        })
        .collect::<Vec<_>>()
        .join("\n");

    TextBlock { rect, text, runs }
}
