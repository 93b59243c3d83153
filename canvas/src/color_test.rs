use super::*;

#[test]
fn parses_short_and_long_hex() {
    assert_eq!(parse("#fff"), Some(Rgba::opaque(255, 255, 255)));
    assert_eq!(parse("#1E90FF"), Some(Rgba::opaque(30, 144, 255)));
    assert_eq!(parse("  #000000 "), Some(Rgba::BLACK));
}

#[test]
fn parses_hex_with_alpha() {
    assert_eq!(parse("#ff000080"), Some(Rgba { r: 255, g: 0, b: 0, a: 128 }));
}

#[test]
fn rejects_malformed_hex() {
    assert_eq!(parse("#12"), None);
    assert_eq!(parse("#12345"), None);
    assert_eq!(parse("#gggggg"), None);
    assert_eq!(parse("#"), None);
}

#[test]
fn parses_functional_notation() {
    assert_eq!(parse("rgb(10, 20, 30)"), Some(Rgba::opaque(10, 20, 30)));
    assert_eq!(parse("RGBA(255,0,0,0.5)"), Some(Rgba { r: 255, g: 0, b: 0, a: 128 }));
    assert_eq!(parse("rgb(300, -5, 12.4)"), Some(Rgba::opaque(255, 0, 12)));
}

#[test]
fn rejects_wrong_arity() {
    assert_eq!(parse("rgb(1, 2)"), None);
    assert_eq!(parse("rgba(1, 2, 3)"), None);
    assert_eq!(parse("rgb(a, b, c)"), None);
}

#[test]
fn parses_named_colors_case_insensitively() {
    assert_eq!(parse("red"), Some(Rgba::opaque(255, 0, 0)));
    assert_eq!(parse("DodgerBlue"), Some(Rgba::opaque(30, 144, 255)));
    assert_eq!(parse("grey"), parse("gray"));
    assert_eq!(parse("transparent"), Some(Rgba::TRANSPARENT));
}

#[test]
fn resolve_falls_back_to_black() {
    assert_eq!(resolve("not-a-color"), Rgba::BLACK);
    assert_eq!(resolve(""), Rgba::BLACK);
    assert_eq!(resolve("blue"), Rgba::opaque(0, 0, 255));
}
