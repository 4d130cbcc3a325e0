use super::*;
use crate::diagnostic::Diagnostic as ModlinkDiagnostic;

#[test]
fn test_position_counts_lines_and_columns() {
    let source = "module a './a'\nmodule b 'oci:x'\n";
    assert_eq!(byte_offset_to_position(source, 0), Position::new(0, 0));
    assert_eq!(byte_offset_to_position(source, 9), Position::new(0, 9));
    assert_eq!(byte_offset_to_position(source, 15), Position::new(1, 0));
    assert_eq!(byte_offset_to_position(source, 24), Position::new(1, 9));
}

#[test]
fn test_position_uses_utf16_columns() {
    // 'é' is two bytes and one UTF-16 unit, '𝔸' is four bytes and two units.
    let source = "é𝔸x";
    assert_eq!(byte_offset_to_position(source, 2), Position::new(0, 1));
    assert_eq!(byte_offset_to_position(source, 6), Position::new(0, 3));
}

#[test]
fn test_position_clamps_past_end() {
    let source = "ab\ncd";
    assert_eq!(byte_offset_to_position(source, 100), Position::new(1, 2));
}

#[test]
fn test_diagnostic_carries_code_and_help() {
    let source = "module x 'br:nope'\n";
    let diag = ModlinkDiagnostic::error(
        "module-unknown-scheme",
        "unknown module scheme 'br'".to_string(),
        Span::new(9, 18),
    )
    .with_note("available schemes: oci".to_string())
    .with_help("use a relative path or 'oci:'".to_string());

    let lsp = to_lsp_diagnostic(&diag, source);
    assert_eq!(lsp.range, Range::new(Position::new(0, 9), Position::new(0, 18)));
    assert_eq!(lsp.severity, Some(DiagnosticSeverity::ERROR));
    assert_eq!(
        lsp.code,
        Some(NumberOrString::String("module-unknown-scheme".to_string()))
    );
    assert_eq!(lsp.source.as_deref(), Some("modlink"));
    insta::assert_snapshot!(lsp.message, @r"
    unknown module scheme 'br'
    note: available schemes: oci
    help: use a relative path or 'oci:'
    ");
}
