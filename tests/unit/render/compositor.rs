use std::io::Cursor;

use super::*;
use crate::{
    assets::store::FsResolver,
    geometry::scale::PreviewBox,
    model::element::ImageSource,
    model::patch::ElementPatch,
    model::template::{Template, TemplateImage},
};

fn png(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba(px));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn template(w: u32, h: u32, preview: PreviewBox) -> Template {
    Template::new("t", TemplateImage::new(png(w, h, [0, 0, 255, 255]), w, h))
        .with_preview_box(preview)
}

fn pixel(frame: &FrameRGBA, x: u32, y: u32) -> [u8; 4] {
    let i = ((y * frame.width + x) * 4) as usize;
    [
        frame.data[i],
        frame.data[i + 1],
        frame.data[i + 2],
        frame.data[i + 3],
    ]
}

#[track_caller]
fn assert_px(frame: &FrameRGBA, x: u32, y: u32, want: [u8; 4]) {
    let got = pixel(frame, x, y);
    let close = got
        .iter()
        .zip(want.iter())
        .all(|(g, w)| (i16::from(*g) - i16::from(*w)).abs() <= 2);
    assert!(close, "pixel ({x},{y}) = {got:?}, want {want:?}");
}

fn compositor() -> Compositor {
    Compositor::with_fonts(FontBook::empty())
}

fn prepare(t: &Template) -> PreparedTemplate {
    PreparedTemplate::prepare(t, &FsResolver::new(".")).unwrap()
}

#[test]
fn display_text_falls_back_to_field_name() {
    let el = TextElement::new(ElementId::from_u64(1), "Score", Point::ZERO);
    assert_eq!(resolve_display_text(&el, &Record::new()), "Score");

    let rec = Record::from_pairs([("Score", "97")]);
    assert_eq!(resolve_display_text(&el, &rec), "97");

    let empty = Record::from_pairs([("Score", "")]);
    assert_eq!(resolve_display_text(&el, &empty), "");
}

#[test]
fn output_is_native_size_with_template_as_base() {
    let t = template(1600, 1200, PreviewBox::default());
    let frame = compositor().render(&prepare(&t), &Record::new()).unwrap();
    assert_eq!((frame.width, frame.height), (1600, 1200));
    assert!(frame.premultiplied);
    assert_px(&frame, 0, 0, [0, 0, 255, 255]);
    assert_px(&frame, 1599, 1199, [0, 0, 255, 255]);
}

#[test]
fn image_positions_and_sizes_divide_by_fit_scale() {
    // 1600x1200 in an 800x600 box: fit scale 0.5
    let mut t = template(1600, 1200, PreviewBox::default());
    let el = t.add_image_element(ImageSource::from_bytes(png(10, 10, [255, 0, 0, 255])));
    t.update_element(el.id, ElementPatch::moved_to(Point::new(100.0, 100.0)))
        .unwrap();

    let frame = compositor().render(&prepare(&t), &Record::new()).unwrap();
    // preview box (100..110) lands on (200..220) natively
    assert_px(&frame, 205, 205, [255, 0, 0, 255]);
    assert_px(&frame, 215, 215, [255, 0, 0, 255]);
    assert_px(&frame, 195, 210, [0, 0, 255, 255]);
    assert_px(&frame, 225, 210, [0, 0, 255, 255]);
}

#[test]
fn zero_opacity_image_is_invisible() {
    let mut t = template(40, 30, PreviewBox { width: 40.0, height: 30.0 });
    let el = t.add_image_element(ImageSource::from_bytes(png(10, 10, [255, 0, 0, 255])));
    t.update_element(
        el.id,
        ElementPatch {
            position: Some(Point::new(5.0, 5.0)),
            opacity: Some(0.0),
            ..ElementPatch::default()
        },
    )
    .unwrap();

    let frame = compositor().render(&prepare(&t), &Record::new()).unwrap();
    assert_px(&frame, 10, 10, [0, 0, 255, 255]);
}

#[test]
fn rotation_turns_about_the_element_center() {
    let mut t = template(40, 40, PreviewBox { width: 40.0, height: 40.0 });
    let el = t.add_image_element(ImageSource::from_bytes(png(20, 6, [255, 0, 0, 255])));
    t.update_element(el.id, ElementPatch::moved_to(Point::new(10.0, 17.0)))
        .unwrap();

    let flat = compositor().render(&prepare(&t), &Record::new()).unwrap();
    assert_px(&flat, 12, 20, [255, 0, 0, 255]);
    assert_px(&flat, 20, 12, [0, 0, 255, 255]);

    t.update_element(el.id, ElementPatch::rotated_to(90.0)).unwrap();
    let turned = compositor().render(&prepare(&t), &Record::new()).unwrap();
    // center (20,20) stays put; the long side is now vertical
    assert_px(&turned, 20, 12, [255, 0, 0, 255]);
    assert_px(&turned, 12, 20, [0, 0, 255, 255]);
}

#[test]
fn svg_sticker_is_rasterized_at_draw_size() {
    let svg = br##"<svg xmlns="http://www.w3.org/2000/svg" width="2" height="2">
<rect width="2" height="2" fill="#00ff00"/></svg>"##;
    let mut t = template(40, 30, PreviewBox { width: 40.0, height: 30.0 });
    let el = t.add_image_element(ImageSource::from_bytes(svg.to_vec()));
    t.update_element(
        el.id,
        ElementPatch {
            position: Some(Point::new(0.0, 0.0)),
            scale: Some(Vec2::new(5.0, 5.0)),
            ..ElementPatch::default()
        },
    )
    .unwrap();

    let frame = compositor().render(&prepare(&t), &Record::new()).unwrap();
    assert_px(&frame, 5, 5, [0, 255, 0, 255]);
    assert_px(&frame, 15, 15, [0, 0, 255, 255]);
}

#[test]
fn undecodable_sticker_is_skipped() {
    let mut t = template(40, 30, PreviewBox { width: 40.0, height: 30.0 });
    t.add_image_element(ImageSource::from_bytes(b"junk".to_vec()));
    let prepared = prepare(&t);
    assert_eq!(prepared.skipped().len(), 1);
    let frame = compositor().render(&prepared, &Record::new()).unwrap();
    for (x, y) in [(0, 0), (20, 15), (39, 29)] {
        assert_px(&frame, x, y, [0, 0, 255, 255]);
    }
}

#[test]
fn text_without_fonts_is_skipped_not_fatal() {
    let mut t = template(40, 30, PreviewBox { width: 40.0, height: 30.0 });
    t.add_text_element("Name").unwrap();
    let frame = compositor()
        .render(&prepare(&t), &Record::from_pairs([("Name", "Ada")]))
        .unwrap();
    assert_px(&frame, 0, 0, [0, 0, 255, 255]);
}

#[test]
fn preview_is_template_downscaled_to_fit() {
    let mut t = template(1600, 1200, PreviewBox::default());
    let el = t.add_image_element(ImageSource::from_bytes(png(10, 10, [255, 0, 0, 255])));
    t.update_element(el.id, ElementPatch::moved_to(Point::new(100.0, 100.0)))
        .unwrap();

    let frame = compositor().render_preview(&prepare(&t)).unwrap();
    assert_eq!((frame.width, frame.height), (800, 600));
    assert_px(&frame, 105, 105, [255, 0, 0, 255]);
    assert_px(&frame, 50, 50, [0, 0, 255, 255]);
}

#[test]
fn rendering_is_deterministic() {
    let mut t = template(64, 48, PreviewBox { width: 64.0, height: 48.0 });
    let a = t.add_image_element(ImageSource::from_bytes(png(7, 5, [200, 10, 10, 180])));
    t.update_element(
        a.id,
        ElementPatch {
            position: Some(Point::new(3.3, 4.7)),
            rotation_degrees: Some(33.0),
            opacity: Some(0.6),
            ..ElementPatch::default()
        },
    )
    .unwrap();
    t.add_text_element("Name").unwrap();

    let prepared = prepare(&t);
    let rec = Record::from_pairs([("Name", "Ada")]);
    let mut c = Compositor::with_fonts(FontBook::system(&[]));
    let first = c.render(&prepared, &rec).unwrap();
    let second = c.render(&prepared, &rec).unwrap();
    let fresh = Compositor::with_fonts(FontBook::system(&[]))
        .render(&prepared, &rec)
        .unwrap();
    assert_eq!(first.data, second.data);
    assert_eq!(first.data, fresh.data);
}

#[test]
fn text_alignment_anchors_at_left() {
    let mut shaper = TextShaper::new(FontBook::system(&[]));
    let Some(shaped) = shaper
        .shape(
            "Ada",
            TextStyle {
                family: "Arial",
                size_px: 24.0,
                bold: false,
                italic: false,
            },
        )
        .unwrap()
    else {
        return;
    };
    let mut el = TextElement::new(ElementId::from_u64(1), "Name", Point::new(100.0, 40.0));
    assert_eq!(text_origin(&el, &shaped, 1.0).x, 100.0);
    el.align = TextAlign::Center;
    assert_eq!(text_origin(&el, &shaped, 1.0).x, 100.0 - shaped.width / 2.0);
    el.align = TextAlign::Right;
    assert_eq!(text_origin(&el, &shaped, 2.0), Point::new(200.0 - shaped.width, 80.0));
}

#[test]
fn oversized_surface_is_a_render_error() {
    assert!(surface_dims(70_000.0, 10.0).is_err());
    assert!(surface_dims(0.0, 10.0).is_err());
    assert_eq!(surface_dims(10.0, 20.0).unwrap(), (10, 20));
}

const WHITE: [u8; 4] = [255, 255, 255, 255];

struct TextFixture {
    compositor: Compositor,
    template: Template,
    shaped: ShapedText,
}

/// "Name" at preview (20, 20), 20px, black, on a 400x300 white template shown at fit 0.5,
/// so export draws it at (40, 40) with 40px glyphs. `None` without system fonts.
fn text_fixture(patch: ElementPatch) -> Option<TextFixture> {
    let mut compositor = Compositor::with_fonts(FontBook::system(&[]));
    let shaped = compositor
        .shaper_mut()
        .shape(
            "HHHH",
            TextStyle {
                family: "Arial",
                size_px: 40.0,
                bold: false,
                italic: false,
            },
        )
        .unwrap()?;

    let mut template = Template::new("t", TemplateImage::new(png(400, 300, WHITE), 400, 300))
        .with_preview_box(PreviewBox {
            width: 200.0,
            height: 150.0,
        });
    let el = template.add_text_element("Name").unwrap();
    template
        .update_element(
            el.id,
            ElementPatch {
                position: Some(Point::new(20.0, 20.0)),
                font_size: Some(20.0),
                color: Some(Color::rgb(0, 0, 0)),
                ..ElementPatch::default()
            },
        )
        .unwrap();
    if !patch.is_empty() {
        template.update_element(el.id, patch).unwrap();
    }
    Some(TextFixture {
        compositor,
        template,
        shaped,
    })
}

impl TextFixture {
    fn render(&mut self, name: &str) -> FrameRGBA {
        let prepared = prepare(&self.template);
        self.compositor
            .render(&prepared, &Record::from_pairs([("Name", name)]))
            .unwrap()
    }
}

fn pixels(frame: &FrameRGBA) -> impl Iterator<Item = (u32, u32, [u8; 4])> + '_ {
    (0..frame.height)
        .flat_map(move |y| (0..frame.width).map(move |x| (x, y)))
        .map(|(x, y)| (x, y, pixel(frame, x, y)))
}

fn is_ink(px: [u8; 4]) -> bool {
    px[..3].iter().any(|c| *c < 250)
}

/// `(min_x, min_y, max_x, max_y)` of pixels matching `pred`.
fn bounds(frame: &FrameRGBA, pred: impl Fn([u8; 4]) -> bool) -> Option<(u32, u32, u32, u32)> {
    pixels(frame)
        .filter(|(_, _, px)| pred(*px))
        .fold(None, |acc, (x, y, _)| {
            Some(match acc {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            })
        })
}

fn count(frame: &FrameRGBA, pred: impl Fn([u8; 4]) -> bool) -> usize {
    pixels(frame).filter(|(_, _, px)| pred(*px)).count()
}

fn near(px: [u8; 4], want: [u8; 4], tol: u8) -> bool {
    px.iter().zip(want).all(|(g, w)| g.abs_diff(w) <= tol)
}

#[test]
fn text_ink_sits_inside_the_line_box_below_top() {
    let Some(mut fx) = text_fixture(ElementPatch {
        color: Some(Color::rgb(255, 0, 0)),
        ..ElementPatch::default()
    }) else {
        return;
    };
    let frame = fx.render("HHHH");

    let (x0, y0, x1, y1) = bounds(&frame, is_ink).expect("text ink");
    // top/fit = 40: nothing above the line box top
    assert!(y0 >= 40, "ink starts at row {y0}");
    assert!(f64::from(y1) <= 40.0 + fx.shaped.height, "ink ends at row {y1}");
    assert!(x0 >= 39, "ink starts at column {x0}");
    assert!(f64::from(x1) <= 41.0 + fx.shaped.width, "ink ends at column {x1}");
    assert!(count(&frame, |px| near(px, [255, 0, 0, 255], 2)) > 20);
}

#[test]
fn missing_field_draws_the_field_name_itself() {
    let Some(mut fx) = text_fixture(ElementPatch::default()) else {
        return;
    };
    let prepared = prepare(&fx.template);
    let fallback = fx.compositor.render(&prepared, &Record::new()).unwrap();
    let literal = fx.render("Name");
    assert!(count(&fallback, is_ink) > 0);
    assert_eq!(fallback.data, literal.data);
}

#[test]
fn stroke_is_painted_under_the_fill() {
    let red = |px: [u8; 4]| near(px, [255, 0, 0, 255], 2);
    let blue = |px: [u8; 4]| px[2] > 200 && px[0] < 60 && px[1] < 60;

    let Some(mut plain) = text_fixture(ElementPatch {
        color: Some(Color::rgb(255, 0, 0)),
        ..ElementPatch::default()
    }) else {
        return;
    };
    let plain = plain.render("HHHH");

    let mut stroked = text_fixture(ElementPatch {
        color: Some(Color::rgb(255, 0, 0)),
        stroke_color: Some(Some(Color::rgb(0, 0, 255))),
        stroke_width: Some(Some(2.0)),
        ..ElementPatch::default()
    })
    .unwrap();
    let stroked = stroked.render("HHHH");

    let plain_red = count(&plain, red);
    let stroked_red = count(&stroked, red);
    assert!(count(&stroked, blue) > 0, "no stroke pixels");
    // the fill keeps its full area when drawn over the stroke
    assert!(
        stroked_red * 10 >= plain_red * 9,
        "fill shrank from {plain_red} to {stroked_red} pixels"
    );
    // the stroke's outer half widens the ink
    let (px0, _, px1, _) = bounds(&plain, is_ink).unwrap();
    let (sx0, _, sx1, _) = bounds(&stroked, is_ink).unwrap();
    assert!(sx0 < px0 && sx1 > px1);
}

#[test]
fn underline_runs_one_thickness_below_the_baseline() {
    let Some(mut plain) = text_fixture(ElementPatch::default()) else {
        return;
    };
    let baseline = 40.0 + plain.shaped.baseline;
    let width = plain.shaped.width;
    let plain = plain.render("HHHH");

    let mut underlined = text_fixture(ElementPatch {
        underline: Some(true),
        ..ElementPatch::default()
    })
    .unwrap();
    let underlined = underlined.render("HHHH");

    // thickness max(1, 40 / 15); the band spans [baseline + t, baseline + 2t]
    let t = (40.0_f64 / 15.0).max(1.0);
    let row = (baseline + t).ceil() as u32;
    assert!(f64::from(row + 1) <= baseline + 2.0 * t);

    let mut x = 42.0;
    while x < 38.0 + width {
        let col = x as u32;
        assert!(
            near(pixel(&underlined, col, row), [0, 0, 0, 255], 40),
            "underline missing at ({col},{row})"
        );
        assert!(
            near(pixel(&plain, col, row), WHITE, 5),
            "unexpected ink at ({col},{row}) without underline"
        );
        x += 4.0;
    }
    assert!(near(pixel(&underlined, 42, row + 4), WHITE, 5));
}

#[test]
fn shadow_is_grey_and_offset_down_right() {
    let Some(mut plain) = text_fixture(ElementPatch::default()) else {
        return;
    };
    let plain = plain.render("HHHH");
    let mut shadowed = text_fixture(ElementPatch {
        shadow: Some(true),
        ..ElementPatch::default()
    })
    .unwrap();
    let shadowed = shadowed.render("HHHH");

    let added: Vec<(u32, u32, [u8; 4])> = pixels(&shadowed)
        .filter(|(x, y, px)| pixel(&plain, *x, *y)[0].saturating_sub(px[0]) > 8)
        .collect();
    assert!(!added.is_empty(), "no shadow pixels");
    assert!(added.iter().any(|(_, _, px)| {
        (100..=245).contains(&px[0]) && px[0].abs_diff(px[1]) <= 2 && px[0].abs_diff(px[2]) <= 2
    }));

    let centroid = |pts: &[(u32, u32)]| {
        let n = pts.len() as f64;
        (
            pts.iter().map(|p| f64::from(p.0)).sum::<f64>() / n,
            pts.iter().map(|p| f64::from(p.1)).sum::<f64>() / n,
        )
    };
    let ink: Vec<(u32, u32)> = pixels(&plain)
        .filter(|(_, _, px)| is_ink(*px))
        .map(|(x, y, _)| (x, y))
        .collect();
    let shadow: Vec<(u32, u32)> = added.iter().map(|(x, y, _)| (*x, *y)).collect();
    let (ix, iy) = centroid(&ink);
    let (sx, sy) = centroid(&shadow);
    assert!(sx > ix && sy > iy, "shadow centroid ({sx},{sy}) vs ink ({ix},{iy})");

    // offset (2, 2) / fit = (4, 4) plus blur reaches past the glyph box
    let (_, _, ix1, iy1) = bounds(&plain, is_ink).unwrap();
    let sx1 = shadow.iter().map(|p| p.0).max().unwrap();
    let sy1 = shadow.iter().map(|p| p.1).max().unwrap();
    assert!(sx1 > ix1 + 4 && sy1 > iy1 + 4);
}

#[test]
fn oversized_svg_is_rejected_before_rasterizing() {
    let svg = br##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10">
<rect width="10" height="10" fill="#00ff00"/></svg>"##;
    let mut t = template(40, 30, PreviewBox { width: 40.0, height: 30.0 });
    let el = t.add_image_element(ImageSource::from_bytes(svg.to_vec()));
    t.update_element(el.id, ElementPatch::scaled_to(Vec2::new(7_000.0, 1.0)))
        .unwrap();

    let err = compositor().render(&prepare(&t), &Record::new()).unwrap_err();
    assert!(matches!(err, StampError::Render(_)), "{err}");
}
