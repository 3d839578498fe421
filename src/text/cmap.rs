//! ToUnicode CMap parsing.

use std::collections::HashMap;

/// Character-code to Unicode mapping read from a font's `/ToUnicode` stream.
#[derive(Debug, Clone, Default)]
pub struct ToUnicodeMap {
    map: HashMap<u32, String>,
    code_len: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Hex(Vec<u8>),
    Keyword(String),
    ArrayStart,
    ArrayEnd,
}

impl ToUnicodeMap {
    /// Parse the `bfchar` and `bfrange` sections of a CMap program.
    ///
    /// Anything else in the program (`usecmap`, `cidrange`, PostScript
    /// boilerplate) is ignored.
    pub fn parse(data: &[u8]) -> Self {
        let tokens = tokenize(data);
        let mut cmap = ToUnicodeMap::default();
        let mut i = 0;

        while i < tokens.len() {
            match &tokens[i] {
                Token::Keyword(k) if k == "begincodespacerange" => {
                    if let Some(Token::Hex(lo)) = tokens.get(i + 1) {
                        cmap.code_len.get_or_insert(lo.len());
                    }
                    i += 1;
                }
                Token::Keyword(k) if k == "beginbfchar" => {
                    i += 1;
                    while let (Some(Token::Hex(src)), Some(Token::Hex(dst))) =
                        (tokens.get(i), tokens.get(i + 1))
                    {
                        cmap.code_len.get_or_insert(src.len());
                        cmap.map.insert(code_value(src), utf16be(dst));
                        i += 2;
                    }
                }
                Token::Keyword(k) if k == "beginbfrange" => {
                    i += 1;
                    loop {
                        let (Some(Token::Hex(lo)), Some(Token::Hex(hi))) =
                            (tokens.get(i), tokens.get(i + 1))
                        else {
                            break;
                        };
                        cmap.code_len.get_or_insert(lo.len());
                        let (lo, hi) = (code_value(lo), code_value(hi));
                        match tokens.get(i + 2) {
                            Some(Token::Hex(dst)) => {
                                cmap.insert_incrementing(lo, hi, dst);
                                i += 3;
                            }
                            Some(Token::ArrayStart) => {
                                i += 3;
                                let mut code = lo;
                                while let Some(Token::Hex(dst)) = tokens.get(i) {
                                    if code <= hi {
                                        cmap.map.insert(code, utf16be(dst));
                                    }
                                    code = code.saturating_add(1);
                                    i += 1;
                                }
                                if tokens.get(i) == Some(&Token::ArrayEnd) {
                                    i += 1;
                                }
                            }
                            _ => break,
                        }
                    }
                }
                _ => i += 1,
            }
        }

        cmap
    }

    fn insert_incrementing(&mut self, lo: u32, hi: u32, dst: &[u8]) {
        // Guard against absurd ranges in broken files.
        let hi = hi.min(lo.saturating_add(0xFFFF));
        let base = code_value(dst);
        for (offset, code) in (lo..=hi).enumerate() {
            let value = base.wrapping_add(offset as u32);
            let mut bytes = value.to_be_bytes().to_vec();
            let keep = dst.len().clamp(2, 4);
            bytes.drain(..4 - keep);
            self.map.insert(code, utf16be(&bytes));
        }
    }

    /// Byte length of a character code, when the CMap states one.
    pub fn code_len(&self) -> Option<usize> {
        self.code_len
    }

    pub fn get(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn code_value(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

fn utf16be(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|c| {
            if c.len() == 2 {
                u16::from_be_bytes([c[0], c[1]])
            } else {
                c[0] as u16
            }
        })
        .collect();
    String::from_utf16_lossy(&units)
}

fn tokenize(data: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let b = data[i];
        match b {
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b'<' if data.get(i + 1) == Some(&b'<') => i += 2,
            b'>' if data.get(i + 1) == Some(&b'>') => i += 2,
            b'<' => {
                let start = i + 1;
                let end = data[start..]
                    .iter()
                    .position(|&c| c == b'>')
                    .map_or(data.len(), |p| start + p);
                tokens.push(Token::Hex(parse_hex(&data[start..end])));
                i = end + 1;
            }
            b'[' => {
                tokens.push(Token::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(Token::ArrayEnd);
                i += 1;
            }
            b'(' => {
                // Literal strings never appear in bf sections; skip them.
                let mut depth = 0usize;
                while i < data.len() {
                    match data[i] {
                        b'\\' => i += 1,
                        b'(' => depth += 1,
                        b')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                i += 1;
            }
            c if c.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len()
                    && !data[i].is_ascii_whitespace()
                    && !b"<>[]()/%".contains(&data[i])
                {
                    i += 1;
                }
                if i == start {
                    i += 1;
                } else {
                    tokens.push(Token::Keyword(
                        String::from_utf8_lossy(&data[start..i]).into_owned(),
                    ));
                }
            }
        }
    }

    tokens
}

fn parse_hex(digits: &[u8]) -> Vec<u8> {
    let nibbles: Vec<u8> = digits
        .iter()
        .filter_map(|&c| (c as char).to_digit(16).map(|d| d as u8))
        .collect();
    nibbles
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}
