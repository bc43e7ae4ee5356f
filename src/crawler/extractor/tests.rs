use super::*;

#[test]
fn strips_script_and_style_content() {
    let html = r#"
        <html><head>
            <style>body { color: red; }</style>
            <script>console.log("hidden");</script>
        </head>
        <body>
            <h1>Catan Rules</h1>
            <noscript>Enable JavaScript</noscript>
            <p>Each player starts with two settlements.</p>
        </body></html>
    "#;

    let text = html_to_text(html);
    assert!(text.contains("Catan Rules"));
    assert!(text.contains("two settlements"));
    assert!(!text.contains("color: red"));
    assert!(!text.contains("console.log"));
    assert!(!text.contains("Enable JavaScript"));
}

#[test]
fn collapses_runs_of_blank_lines() {
    let html = "<body><p>one</p><div></div><div></div><div></div><p>two</p></body>";
    let text = html_to_text(html);
    assert!(!text.contains("\n\n\n"));
    assert!(text.starts_with("one"));
    assert!(text.ends_with("two"));
}

#[test]
fn empty_document_yields_empty_text() {
    assert_eq!(html_to_text(""), "");
    assert_eq!(html_to_text("<html><body></body></html>"), "");
}

#[test]
fn title_extraction() {
    let html = "<html><head><title>  Azul - Rules  </title></head><body>x</body></html>";
    assert_eq!(html_title(html).as_deref(), Some("Azul - Rules"));
    assert_eq!(html_title("<body>no title</body>"), None);
}
