use std::io::Cursor;

use super::*;
use crate::{
    assets::store::FsResolver,
    geometry::scale::PreviewBox,
    model::element::ImageSource,
    model::template::TemplateImage,
    text::fonts::FontBook,
};

fn png(w: u32, h: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba([240, 240, 240, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn template(name: &str, fields: &[&str]) -> Template {
    let mut t = Template::new(name, TemplateImage::new(png(32, 24), 32, 24))
        .with_preview_box(PreviewBox {
            width: 32.0,
            height: 24.0,
        });
    for f in fields {
        t.add_text_element(f).unwrap();
    }
    t
}

fn names(n: usize) -> Dataset {
    Dataset::from_records(
        (0..n)
            .map(|i| Record::from_pairs([("Name", format!("P{i}"))]))
            .collect(),
    )
}

fn run(templates: &[Template], data: &Dataset) -> (BatchOutput, Vec<BatchProgress>) {
    let mut compositor = Compositor::with_fonts(FontBook::empty());
    let resolver = FsResolver::new(".");
    let mut seen = Vec::new();
    let out = BatchRenderer::new(&mut compositor, &resolver)
        .run(templates, data, |p| seen.push(p))
        .unwrap();
    (out, seen)
}

#[test]
fn safe_file_name_rules() {
    let rec = Record::from_pairs([("Name", "Jo@hn Doe!")]);
    assert_eq!(safe_file_name(&rec, 0), "Jo_hn_Doe_");

    let lower = Record::from_pairs([("name", "ada")]);
    assert_eq!(safe_file_name(&lower, 0), "ada");

    let empty_name = Record::from_pairs([("Name", ""), ("name", "lin")]);
    assert_eq!(safe_file_name(&empty_name, 0), "lin");

    assert_eq!(safe_file_name(&Record::new(), 4), "certificate_5");
    assert_eq!(safe_file_name(&Record::from_pairs([("Name", "Zoë")]), 0), "Zo_");
}

#[test]
fn only_templates_with_text_take_part() {
    let templates = [template("A", &["Name", "Course"]), template("B", &[])];
    let (out, progress) = run(&templates, &names(5));

    assert_eq!(out.images_generated, 5);
    assert_eq!(out.entries.len(), 5);
    assert_eq!(progress.len(), 5);
    assert_eq!(progress.last().unwrap().fraction(), 1.0);
    assert!(progress.iter().all(|p| p.total == 5));
    // one eligible template: flat layout
    assert_eq!(out.entries[0], "P0.png");
}

#[test]
fn several_templates_get_folders_in_order() {
    let templates = [template("Gold/Award", &["Name"]), template("Silver", &["Name"])];
    let (out, progress) = run(&templates, &names(2));

    assert_eq!(
        out.entries,
        [
            "Gold_Award/P0.png",
            "Gold_Award/P1.png",
            "Silver/P0.png",
            "Silver/P1.png"
        ]
    );
    let fractions: Vec<f64> = progress.iter().map(BatchProgress::fraction).collect();
    assert_eq!(fractions, [0.25, 0.5, 0.75, 1.0]);
}

#[test]
fn nothing_to_do_is_not_an_error() {
    let (out, progress) = run(&[template("A", &["Name"])], &Dataset::default());
    assert_eq!(out.images_generated, 0);
    assert!(out.entries.is_empty());
    assert!(progress.is_empty());
    assert!(!out.archive.is_empty());

    let (out, progress) = run(&[template("A", &[])], &names(3));
    assert_eq!(out.images_generated, 0);
    assert!(progress.is_empty());
}

#[test]
fn colliding_names_overwrite() {
    let data = Dataset::from_records(vec![
        Record::from_pairs([("Name", "Ann Lee")]),
        Record::from_pairs([("Name", "Ann_Lee")]),
    ]);
    let (out, _) = run(&[template("A", &["Name"])], &data);
    assert_eq!(out.images_generated, 2);
    assert_eq!(out.entries, ["Ann_Lee.png"]);
}

#[test]
fn bad_sticker_is_reported_and_batch_continues() {
    let mut t = template("A", &["Name"]);
    let bad = t.add_image_element(ImageSource::from_bytes(b"broken".to_vec()));
    let (out, _) = run(&[t], &names(2));
    assert_eq!(out.images_generated, 2);
    assert_eq!(out.skipped.len(), 1);
    assert_eq!(out.skipped[0].element, Some(bad.id));
}

#[test]
fn zero_size_template_is_skipped_and_reported() {
    let mut t = Template::new("Empty", TemplateImage::new(Vec::new(), 0, 0));
    t.add_text_element("Name").unwrap();
    let (out, progress) = run(&[t], &names(2));
    assert_eq!(out.images_generated, 0);
    assert!(progress.is_empty());
    assert_eq!(out.skipped.len(), 1);
}

#[test]
fn paint_cache_is_released_after_the_batch() {
    let mut compositor = Compositor::with_fonts(FontBook::empty());
    let resolver = FsResolver::new(".");
    let templates = [template("A", &["Name"]), template("B", &["Name"])];

    let prepared = PreparedTemplate::prepare(&templates[0], &resolver).unwrap();
    compositor.render_preview(&prepared).unwrap();
    assert_eq!(compositor.cached_templates(), 1);

    let out = BatchRenderer::new(&mut compositor, &resolver)
        .run(&templates, &names(2), |_| {})
        .unwrap();
    assert_eq!(out.images_generated, 4);
    assert_eq!(compositor.cached_templates(), 0);
}
