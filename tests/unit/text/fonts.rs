use super::*;

#[test]
fn empty_book_resolves_nothing() {
    let mut book = FontBook::empty();
    assert_eq!(book.face_count(), 0);
    assert!(book.resolve("Arial", false, false).is_none());
    // cached miss stays a miss
    assert!(book.resolve("Arial", false, false).is_none());
}

#[test]
fn unknown_family_falls_back_to_any_installed_face() {
    let mut book = FontBook::system(&[]);
    if book.face_count() == 0 {
        return;
    }
    let font = book
        .resolve("No Such Family 123", true, false)
        .expect("fallback face");
    assert!(!font.bytes.is_empty());
    assert!(!font.family.is_empty());

    let again = book.resolve("No Such Family 123", true, false).unwrap();
    assert!(Arc::ptr_eq(&font, &again));
}

#[test]
fn missing_font_dir_is_tolerated() {
    let book = FontBook::system(&[PathBuf::from("/definitely/not/here")]);
    let _ = book.face_count();
}

fn family_has(book: &FontBook, family: &str, pred: impl Fn(&fontdb::FaceInfo) -> bool) -> bool {
    book.db
        .faces()
        .any(|f| f.families.iter().any(|(n, _)| n == family) && pred(f))
}

#[test]
fn default_family_keeps_requested_weight_and_style() {
    let mut book = FontBook::system(&[]);
    let Some(regular) = book.resolve("Arial", false, false) else {
        return;
    };

    let bold = book.resolve("Arial", true, false).unwrap();
    if family_has(&book, &bold.family, |f| f.weight.0 >= 600) {
        assert!(bold.weight >= 600, "{} resolved at weight {}", bold.family, bold.weight);
    }
    let italic = book.resolve("Arial", false, true).unwrap();
    if family_has(&book, &italic.family, |f| f.style != fontdb::Style::Normal) {
        assert!(italic.italic, "{} resolved upright", italic.family);
    }
    assert!(regular.weight < 600);
    assert!(!regular.italic);
}

#[test]
fn generic_sans_serif_points_at_an_installed_family() {
    let mut book = FontBook::system(&[]);
    if !family_has(&book, "DejaVu Sans", |_| true) || family_has(&book, "Arial", |_| true) {
        return;
    }
    let font = book.resolve("Arial", true, false).unwrap();
    assert!(
        SANS_SERIF_CANDIDATES.contains(&font.family.as_str()),
        "got {}",
        font.family
    );
    if family_has(&book, "DejaVu Sans", |f| f.weight.0 >= 600) && font.family == "DejaVu Sans" {
        assert!(font.weight >= 600);
    }
}

#[test]
fn fallback_family_prefers_the_largest_family() {
    let mut db = fontdb::Database::new();
    assert_eq!(configure_generic_families(&mut db), None);

    let mut system = fontdb::Database::new();
    system.load_system_fonts();
    let Some(name) = configure_generic_families(&mut system) else {
        return;
    };
    let count = |family: &str| {
        system
            .faces()
            .filter(|f| f.families.first().is_some_and(|(n, _)| n == family))
            .count()
    };
    let best = count(&name);
    assert!(system
        .faces()
        .filter_map(|f| f.families.first())
        .all(|(n, _)| count(n) <= best));
}
