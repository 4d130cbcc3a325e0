use crate::failure::ModuleFailure;
use crate::span::Span;

/// A module declaration found by [`scan_declarations`], before it is bound
/// to a file identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScannedDeclaration {
    pub symbol: String,
    pub path: Result<String, ModuleFailure>,
    pub span: Span,
}

/// Quick scan of a source file for module declarations.
///
/// Does not fully parse: it only looks for lines of the form
/// `module <symbol> '<path>' ...`. Everything else in the file is ignored.
pub fn scan_declarations(source: &str) -> Vec<ScannedDeclaration> {
    let mut found = Vec::new();
    let mut offset = 0usize;

    for line in source.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        let content = line.trim_end_matches(['\n', '\r']);
        let trimmed = content.trim_start();
        let indent = content.len() - trimmed.len();

        let Some(rest) = trimmed.strip_prefix("module") else {
            continue;
        };
        if !rest.starts_with(|c: char| c.is_whitespace()) {
            continue;
        }

        let after_keyword = rest.trim_start();
        let symbol_len = after_keyword
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(after_keyword.len());
        if symbol_len == 0 {
            continue;
        }
        let symbol = after_keyword[..symbol_len].to_string();

        // Every slice below is a suffix of `trimmed`, so its position in the
        // line follows from the length difference.
        let at = |suffix: &str| (line_start + indent + trimmed.len() - suffix.len()) as u32;

        let path_part = after_keyword[symbol_len..].trim_start();
        let path_start = at(path_part);

        let (path, span) = if path_part.starts_with('\'') {
            match find_closing_quote(path_part) {
                Some(close) => {
                    let inner = &path_part[1..close];
                    let span = Span::new(path_start, path_start + close as u32 + 1);
                    if inner.contains("${") {
                        (Err(ModuleFailure::PathInterpolated), span)
                    } else {
                        (Ok(unescape(inner)), span)
                    }
                }
                None => {
                    let span = Span::new(path_start, path_start + path_part.len() as u32);
                    (Err(ModuleFailure::PathNotString), span)
                }
            }
        } else {
            let token_len = path_part
                .find(char::is_whitespace)
                .unwrap_or(path_part.len());
            let span = if token_len == 0 {
                Span::new(at(trimmed), at(&after_keyword[symbol_len..]))
            } else {
                Span::new(path_start, path_start + token_len as u32)
            };
            (Err(ModuleFailure::PathNotString), span)
        };

        found.push(ScannedDeclaration { symbol, path, span });
    }

    found
}

/// Byte index of the quote closing the literal that opens at index 0.
fn find_closing_quote(literal: &str) -> Option<usize> {
    let bytes = literal.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\'' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
