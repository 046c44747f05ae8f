use std::io::Cursor;

use super::*;
use crate::model::template::TemplateImage;

fn png(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba(px));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

#[test]
fn normalize_rel_path_rules() {
    assert_eq!(normalize_rel_path("a/./b.png").unwrap(), "a/b.png");
    assert_eq!(normalize_rel_path("a\\b.png").unwrap(), "a/b.png");
    assert!(normalize_rel_path("/etc/passwd").is_err());
    assert!(normalize_rel_path("../x.png").is_err());
    assert!(normalize_rel_path("./").is_err());
}

#[test]
fn bad_sticker_is_skipped_not_fatal() {
    let mut t = Template::new("t", TemplateImage::new(png(8, 6, [0, 0, 0, 255]), 8, 6));
    let good = t.add_image_element(ImageSource::from_bytes(png(2, 2, [255, 0, 0, 255])));
    let bad = t.add_image_element(ImageSource::from_bytes(b"garbage".to_vec()));

    let prepared = PreparedTemplate::prepare(&t, &FsResolver::new(".")).unwrap();
    assert!(prepared.image(good.id).is_some());
    assert!(prepared.image(bad.id).is_none());
    assert_eq!(prepared.skipped().len(), 1);
    assert!(matches!(
        prepared.skipped()[0],
        StampError::ImageDecode { element, .. } if element == bad.id
    ));
    assert_eq!((prepared.base().width, prepared.base().height), (8, 6));
}

#[test]
fn missing_file_is_reported_per_element() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("star.png"), png(3, 3, [1, 2, 3, 255])).unwrap();

    let mut t = Template::new("t", TemplateImage::new(png(8, 6, [0, 0, 0, 255]), 8, 6));
    let star = t.add_image_element(ImageSource::File("star.png".into()));
    let gone = t.add_image_element(ImageSource::File("missing.png".into()));

    let prepared = PreparedTemplate::prepare(&t, &FsResolver::new(dir.path())).unwrap();
    assert_eq!(prepared.image(star.id).unwrap().intrinsic_size(), (3, 3));
    assert!(prepared.image(gone.id).is_none());
    assert_eq!(prepared.skipped().len(), 1);
}

#[test]
fn url_sticker_without_fetching_resolver_is_skipped() {
    let mut t = Template::new("t", TemplateImage::new(png(8, 6, [0, 0, 0, 255]), 8, 6));
    let star = t.add_image_element(ImageSource::sticker("star").unwrap());

    let prepared = PreparedTemplate::prepare(&t, &FsResolver::new(".")).unwrap();
    assert!(prepared.image(star.id).is_none());
    let [StampError::ImageDecode { element, reason }] = prepared.skipped() else {
        panic!("expected one image decode skip: {:?}", prepared.skipped());
    };
    assert_eq!(*element, star.id);
    assert!(reason.contains("2b50.svg"), "{reason}");
}

#[test]
fn undecodable_template_fails_prepare() {
    let t = Template::new("t", TemplateImage::new(b"nope".to_vec(), 8, 6));
    assert!(PreparedTemplate::prepare(&t, &FsResolver::new(".")).is_err());
}
