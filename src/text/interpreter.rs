//! Content stream interpretation: locating every text-showing operation.

use lopdf::content::{Content, Operation};
use lopdf::Object;
use serde::Serialize;

use super::font::{FontMetrics, FontSet};
use crate::model::{Matrix, Rect};
use crate::pdf::number;

/// Fraction of the font size above the baseline covered by a glyph box.
const ASCENT: f64 = 0.8;

/// Fraction of the font size below the baseline covered by a glyph box.
const DESCENT: f64 = 0.2;

/// Which text-showing operator produced a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ShowOp {
    /// `Tj`
    Show,
    /// `TJ`
    ShowArray,
    /// `'`
    NextLineShow,
    /// `"`
    SpacedNextLineShow,
}

/// One text-showing operation and where it lands on the page.
#[derive(Debug, Clone, Serialize)]
pub struct TextRun {
    /// Index of the operation in the decoded content
    pub op_index: usize,
    /// Operator that produced the run
    pub op: ShowOp,
    /// Bounding box in page space
    pub rect: Rect,
    /// Decoded text
    pub text: String,
    /// Font size after scaling by the text and current transformation matrices
    pub font_size: f64,
    /// Horizontal text-space displacement of the whole operation
    pub advance: f64,
    /// Tf size times horizontal scaling, the divisor for `TJ` adjustments
    pub scale: f64,
}

impl TextRun {
    /// Operations that move the text position exactly like this run did,
    /// without painting anything.
    pub fn positioning_ops(&self, operation: &Operation) -> Vec<Operation> {
        let mut ops = Vec::new();
        match self.op {
            ShowOp::Show | ShowOp::ShowArray => {}
            ShowOp::NextLineShow => ops.push(Operation::new("T*", vec![])),
            ShowOp::SpacedNextLineShow => {
                let mut operands = operation.operands.iter();
                if let (Some(aw), Some(ac)) = (operands.next(), operands.next()) {
                    ops.push(Operation::new("Tw", vec![aw.clone()]));
                    ops.push(Operation::new("Tc", vec![ac.clone()]));
                }
                ops.push(Operation::new("T*", vec![]));
            }
        }
        if self.scale.abs() > f64::EPSILON && self.advance.abs() > f64::EPSILON {
            let shift = -self.advance / self.scale * 1000.0;
            ops.push(Operation::new(
                "TJ",
                vec![Object::Array(vec![crate::pdf::real(shift)])],
            ));
        }
        ops
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Vec<u8>,
    font_size: f64,
    char_spacing: f64,
    word_spacing: f64,
    horiz_scaling: f64,
    leading: f64,
    rise: f64,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            font: Vec::new(),
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horiz_scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

/// Walks decoded operations, tracking graphics and text state.
pub struct TextInterpreter<'a> {
    fonts: &'a FontSet,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    runs: Vec<TextRun>,
}

impl<'a> TextInterpreter<'a> {
    pub fn new(fonts: &'a FontSet) -> Self {
        Self {
            fonts,
            state: GraphicsState::default(),
            stack: Vec::new(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            runs: Vec::new(),
        }
    }

    /// Collect the text runs of a decoded content stream.
    pub fn run(mut self, content: &Content) -> Vec<TextRun> {
        for (index, op) in content.operations.iter().enumerate() {
            self.step(index, op);
        }
        self.runs
    }

    fn step(&mut self, index: usize, op: &Operation) {
        let nums: Vec<f64> = op.operands.iter().filter_map(number).collect();

        match op.operator.as_str() {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(prev) = self.stack.pop() {
                    self.state = prev;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(&op.operands) {
                    self.state.ctm = m.multiply(&self.state.ctm);
                }
            }
            "BT" => {
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(Object::Name(name)) = op.operands.first() {
                    self.state.font = name.clone();
                }
                if let Some(size) = op.operands.get(1).and_then(number) {
                    self.state.font_size = size;
                }
            }
            "Tc" => set_first(&nums, &mut self.state.char_spacing),
            "Tw" => set_first(&nums, &mut self.state.word_spacing),
            "Tz" => {
                if let Some(z) = nums.first() {
                    self.state.horiz_scaling = z / 100.0;
                }
            }
            "TL" => set_first(&nums, &mut self.state.leading),
            "Ts" => set_first(&nums, &mut self.state.rise),
            "Td" => {
                if nums.len() >= 2 {
                    self.move_line(nums[0], nums[1]);
                }
            }
            "TD" => {
                if nums.len() >= 2 {
                    self.state.leading = -nums[1];
                    self.move_line(nums[0], nums[1]);
                }
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(&op.operands) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(s @ Object::String(..)) = op.operands.first() {
                    self.show(index, ShowOp::Show, std::slice::from_ref(s));
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    self.show(index, ShowOp::ShowArray, items);
                }
            }
            "'" => {
                self.next_line();
                if let Some(s @ Object::String(..)) = op.operands.first() {
                    self.show(index, ShowOp::NextLineShow, std::slice::from_ref(s));
                }
            }
            "\"" => {
                if let (Some(aw), Some(ac)) = (
                    op.operands.first().and_then(number),
                    op.operands.get(1).and_then(number),
                ) {
                    self.state.word_spacing = aw;
                    self.state.char_spacing = ac;
                }
                self.next_line();
                if let Some(s @ Object::String(..)) = op.operands.get(2) {
                    self.show(index, ShowOp::SpacedNextLineShow, std::slice::from_ref(s));
                }
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = Matrix::translate(tx, ty).multiply(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.state.leading;
        self.move_line(0.0, -leading);
    }

    /// Advance through a `TJ`-style array and record one run for it.
    fn show(&mut self, index: usize, op: ShowOp, items: &[Object]) {
        let fonts = self.fonts;
        let font: &FontMetrics = fonts.get(&self.state.font);
        let size = self.state.font_size;
        let th = self.state.horiz_scaling;

        let mut advance = 0.0;
        let mut text = String::new();
        let mut glyphs = 0usize;

        for item in items {
            match item {
                Object::String(bytes, _) => {
                    for code in font.codes(bytes) {
                        let w0 = font.width(code) / 1000.0;
                        let mut tx = w0 * size + self.state.char_spacing;
                        if font.is_word_space(bytes.len(), code) {
                            tx += self.state.word_spacing;
                        }
                        advance += tx * th;
                        glyphs += 1;
                    }
                    text.push_str(&font.decode(bytes));
                }
                other => {
                    if let Some(adj) = number(other) {
                        advance -= adj / 1000.0 * size * th;
                    }
                }
            }
        }

        let start = self.text_matrix;
        self.text_matrix = Matrix::translate(advance, 0.0).multiply(&self.text_matrix);

        if glyphs == 0 {
            return;
        }

        let rise = self.state.rise;
        let local = Rect::new(
            advance.min(0.0),
            rise - DESCENT * size,
            advance.max(0.0),
            rise + ASCENT * size,
        );
        let to_page = start.multiply(&self.state.ctm);
        let rect = to_page.transform_rect(&local);
        let vertical_scale = (to_page.c * to_page.c + to_page.d * to_page.d).sqrt();

        self.runs.push(TextRun {
            op_index: index,
            op,
            rect,
            text,
            font_size: size * vertical_scale,
            advance,
            scale: size * th,
        });
    }
}

fn set_first(nums: &[f64], slot: &mut f64) {
    if let Some(v) = nums.first() {
        *slot = *v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::Document;

    fn runs_of(content: &[u8]) -> Vec<TextRun> {
        let doc = Document::with_version("1.5");
        let fonts = FontSet::from_resources(&doc, &lopdf::Dictionary::new());
        let content = Content::decode(content).unwrap();
        TextInterpreter::new(&fonts).run(&content)
    }

    #[test]
    fn test_tj_position_and_advance() {
        // default width 500 => 5 glyphs * 0.5 * 10 = 25pt
        let runs = runs_of(b"BT /F1 10 Tf 100 700 Td (Hello) Tj ET");
        assert_eq!(runs.len(), 1);
        let run = &runs[0];
        assert_eq!(run.text, "Hello");
        assert_eq!(run.op_index, 3);
        assert!((run.advance - 25.0).abs() < 1e-9);
        assert!(run.rect.approx_eq(&Rect::new(100.0, 698.0, 125.0, 708.0)));
    }

    #[test]
    fn test_text_position_carries_between_runs() {
        let runs = runs_of(b"BT /F1 10 Tf 100 700 Td (ab) Tj [(cd) -1000 (e)] TJ ET");
        assert_eq!(runs.len(), 2);
        assert!((runs[1].rect.x0 - 110.0).abs() < 1e-9);
        // 2 glyphs (10pt) + 1000/1000 * 10 + 1 glyph (5pt)
        assert!((runs[1].advance - 25.0).abs() < 1e-9);
        assert_eq!(runs[1].text, "cde");
    }

    #[test]
    fn test_ctm_and_leading() {
        let runs = runs_of(b"q 2 0 0 2 0 0 cm BT /F1 10 Tf 14 TL 10 100 Td (a) Tj T* (b) Tj ET Q");
        assert_eq!(runs.len(), 2);
        assert!((runs[0].rect.x0 - 20.0).abs() < 1e-9);
        assert!((runs[0].font_size - 20.0).abs() < 1e-9);
        // second line is 14 units lower, scaled by 2
        let dy = runs[0].rect.y0 - runs[1].rect.y0;
        assert!((dy - 28.0).abs() < 1e-9);
    }

    #[test]
    fn test_quote_operators_move_to_next_line() {
        let runs = runs_of(b"BT /F1 10 Tf 12 TL 0 500 Td (a) Tj (b) ' 1 0 (c) \" ET");
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[1].op, ShowOp::NextLineShow);
        assert_eq!(runs[2].op, ShowOp::SpacedNextLineShow);
        assert!((runs[0].rect.y0 - runs[2].rect.y0 - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_positioning_ops_preserve_advance() {
        let runs = runs_of(b"BT /F1 10 Tf 12 TL 0 500 Td (ab) ' ET");
        let op = Operation::new("'", vec![Object::string_literal("ab")]);
        let ops = runs[0].positioning_ops(&op);
        assert_eq!(ops[0].operator, "T*");
        assert_eq!(ops[1].operator, "TJ");
        assert_eq!(
            ops[1].operands,
            vec![Object::Array(vec![Object::Integer(-1000)])]
        );
    }
}
