use super::*;

fn uri(path: &str) -> Url {
    Url::parse(&format!("file:///work{}", path)).unwrap()
}

fn slice(source: &str, span: Span) -> &str {
    &source[span.range()]
}

#[test]
fn test_scan_single_declaration() {
    let source = "param x int\nmodule storage './storage.cfg' = {\n  name: 'st'\n}\n";
    let decls = scan_declarations(source);
    assert_eq!(decls.len(), 1);
    assert_eq!(decls[0].symbol, "storage");
    assert_eq!(decls[0].path.as_deref(), Ok("./storage.cfg"));
    assert_eq!(slice(source, decls[0].span), "'./storage.cfg'");
}

#[test]
fn test_scan_multiple_and_indented() {
    let source = "module a 'a.cfg' = {}\n    module b   'oci:r.io/x/y:v1' = {}\n";
    let decls = scan_declarations(source);
    assert_eq!(decls.len(), 2);
    assert_eq!(decls[1].symbol, "b");
    assert_eq!(decls[1].path.as_deref(), Ok("oci:r.io/x/y:v1"));
    assert_eq!(slice(source, decls[1].span), "'oci:r.io/x/y:v1'");
}

#[test]
fn test_scan_ignores_non_declarations() {
    let source = "// module a 'a.cfg'\nmodules = 3\nvar module_name = 'x'\nmodule\n";
    assert!(scan_declarations(source).is_empty());
}

#[test]
fn test_scan_crlf_line_endings() {
    let source = "param p string\r\nmodule m './m.cfg' = {}\r\n";
    let decls = scan_declarations(source);
    assert_eq!(decls.len(), 1);
    assert_eq!(slice(source, decls[0].span), "'./m.cfg'");
}

#[test]
fn test_scan_interpolated_path_fails() {
    let source = "module m './${name}.cfg' = {}\n";
    let decls = scan_declarations(source);
    assert_eq!(decls[0].path, Err(ModuleFailure::PathInterpolated));
    assert_eq!(slice(source, decls[0].span), "'./${name}.cfg'");
}

#[test]
fn test_scan_non_literal_path_fails() {
    let source = "module m modulePath = {}\nmodule n\n";
    let decls = scan_declarations(source);
    assert_eq!(decls.len(), 2);
    assert_eq!(decls[0].path, Err(ModuleFailure::PathNotString));
    assert_eq!(slice(source, decls[0].span), "modulePath");
    assert_eq!(decls[1].path, Err(ModuleFailure::PathNotString));
    assert_eq!(slice(source, decls[1].span), "module n");
}

#[test]
fn test_scan_unterminated_literal_fails() {
    let source = "module m './m.cfg\n";
    let decls = scan_declarations(source);
    assert_eq!(decls[0].path, Err(ModuleFailure::PathNotString));
    assert_eq!(slice(source, decls[0].span), "'./m.cfg");
}

#[test]
fn test_scan_escaped_quote() {
    let source = r"module m './it\'s.cfg' = {}";
    let decls = scan_declarations(source);
    assert_eq!(decls[0].path.as_deref(), Ok("./it's.cfg"));
}

#[test]
fn test_source_file_declaration_ids() {
    let file = SourceFile::parse(uri("/main.cfg"), "module a 'a.cfg'\nmodule b 'b.cfg'\n");
    let decls = file.declarations();
    assert_eq!(decls.len(), 2);
    assert_eq!(decls[0].id.index, 0);
    assert_eq!(decls[1].id.index, 1);
    assert_eq!(decls[0].id.uri, *file.uri());
    assert_eq!(decls[0].id.digest, file.digest());
    assert_eq!(file.declaration(&decls[1].id), Some(&decls[1]));
}

#[test]
fn test_changed_text_changes_identity() {
    let before = SourceFile::parse(uri("/main.cfg"), "module a 'a.cfg'\n");
    let after = SourceFile::parse(uri("/main.cfg"), "module a 'b.cfg'\n");
    assert_ne!(before.digest(), after.digest());
    assert_ne!(before.declarations()[0].id, after.declarations()[0].id);
    assert!(after.declaration(&before.declarations()[0].id).is_none());
}

#[test]
fn test_display_path() {
    assert_eq!(display_path(&uri("/dir/a.cfg")), "/work/dir/a.cfg");
    let remote = Url::parse("untitled:Untitled-1").unwrap();
    assert_eq!(display_path(&remote), "untitled:Untitled-1");
}
