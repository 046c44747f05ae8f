use super::*;

fn style(size_px: f64) -> TextStyle<'static> {
    TextStyle {
        family: "Arial",
        size_px,
        bold: false,
        italic: false,
    }
}

#[test]
fn no_fonts_means_no_shape() {
    let mut shaper = TextShaper::new(FontBook::empty());
    assert!(shaper.shape("Ada", style(24.0)).unwrap().is_none());
}

#[test]
fn invalid_size_is_rejected() {
    let mut shaper = TextShaper::new(FontBook::empty());
    assert!(shaper.shape("Ada", style(0.0)).is_err());
    assert!(shaper.shape("Ada", style(f64::NAN)).is_err());
}

#[test]
fn longer_text_is_wider_and_size_scales_height() {
    let mut shaper = TextShaper::new(FontBook::system(&[]));
    let Some(short) = shaper.shape("Ada", style(24.0)).unwrap() else {
        return;
    };
    let long = shaper.shape("Ada Lovelace", style(24.0)).unwrap().unwrap();
    let big = shaper.shape("Ada", style(48.0)).unwrap().unwrap();

    assert!(short.width > 0.0);
    assert!(long.width > short.width);
    assert!(big.height > short.height);
    assert!(short.baseline > 0.0 && short.baseline <= short.height);
}
