//! SVG snapshot of the map surface.

use std::collections::HashMap;

use crate::icons::IconHandle;
use crate::interaction::{OverlayContent, OverlayState};
use crate::scene::{Shape, ShapeKind};
use crate::viewport::Viewport;

const OVERLAY_WIDTH: f64 = 260.0;
const OVERLAY_LINE: f64 = 18.0;

/// File name an icon is written under. Keys may carry arbitrary person ids.
pub fn icon_file_name(key: &str) -> String {
    let stem: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{stem}.png")
}

/// Build an SVG document for the current camera.
///
/// Icons are referenced as `{icon_dir}/{icon_file_name(key)}` so a registry
/// update only needs the PNG rewritten, not the document.
pub fn render_snapshot(
    view: &Viewport,
    shapes: &[Shape],
    images: &HashMap<String, IconHandle>,
    overlay: &OverlayState,
    icon_dir: &str,
) -> String {
    let (w, h) = (view.width, view.height);
    let mut svg = String::with_capacity(4096);
    svg.push_str(&format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"##
    ));
    svg.push_str(&format!(r##"<rect width="{w}" height="{h}" fill="#f3f2f1"/>"##));
    build_shapes(&mut svg, view, shapes, images, icon_dir);
    build_overlay(&mut svg, view, overlay);
    svg.push_str("</svg>");
    svg
}

fn build_shapes(
    svg: &mut String,
    view: &Viewport,
    shapes: &[Shape],
    images: &HashMap<String, IconHandle>,
    icon_dir: &str,
) {
    for shape in shapes {
        let at = view.to_screen(shape.coordinate);
        let (iw, ih) = images
            .get(&shape.icon_key)
            .map(|icon| (icon.image.width() as f64, icon.image.height() as f64))
            .unwrap_or((96.0, 96.0));
        let (iw, ih) = (iw * shape.icon_scale, ih * shape.icon_scale);
        let file = escape(&icon_file_name(&shape.icon_key));
        let id = escape(&shape.id);

        match &shape.kind {
            ShapeKind::Cluster { member_count, .. } => {
                let (x, y) = (at.x - iw / 2.0, at.y - ih / 2.0);
                svg.push_str(&format!(
                    r##"<g role="img" data-shape="{id}"><title>{member_count} Team Members</title>"##
                ));
                svg.push_str(&format!(
                    r##"<image href="{icon_dir}/{file}" x="{x:.1}" y="{y:.1}" width="{iw:.1}" height="{ih:.1}"/>"##
                ));
            }
            ShapeKind::Point { label } => {
                // Pins stand on their tail tip
                let (x, y) = (at.x - iw / 2.0, at.y - ih);
                let label = escape(label);
                let ty = at.y + 14.0;
                svg.push_str(&format!(
                    r##"<g role="img" data-shape="{id}"><title>{label}</title>"##
                ));
                svg.push_str(&format!(
                    r##"<image href="{icon_dir}/{file}" x="{x:.1}" y="{y:.1}" width="{iw:.1}" height="{ih:.1}"/>"##
                ));
                svg.push_str(&format!(
                    r##"<text x="{:.1}" y="{ty:.1}" fill="#323130" font-size="12" font-family="Segoe UI, sans-serif" text-anchor="middle" stroke="white" stroke-width="3" paint-order="stroke">{label}</text>"##,
                    at.x
                ));
            }
        }
        svg.push_str("</g>");
    }
}

fn build_overlay(svg: &mut String, view: &Viewport, overlay: &OverlayState) {
    let Some(anchor) = overlay.anchor else {
        return;
    };
    let lines: Vec<String> = match &overlay.content {
        OverlayContent::Empty => return,
        OverlayContent::Point(d) => {
            let mut lines = vec![d.name.clone()];
            lines.extend(d.title.iter().map(|t| format!("Title: {t}")));
            lines.extend(d.department.iter().map(|t| format!("Department: {t}")));
            lines.extend(d.email.iter().map(|t| format!("Email: {t}")));
            lines.extend(d.address.iter().map(|t| format!("Location: {t}")));
            lines.push(d.badge.to_string());
            lines
        }
        OverlayContent::Cluster(d) => {
            let mut lines = vec![d.header.clone()];
            lines.extend(d.members.iter().map(|m| match &m.secondary {
                Some(s) => format!("{} ({s})", m.name),
                None => m.name.clone(),
            }));
            lines.push(d.footer.to_string());
            lines
        }
    };

    let at = view.to_screen(anchor);
    let height = OVERLAY_LINE * lines.len() as f64 + 12.0;
    // Bottom edge sits at the anchor plus the fixed offset
    let x = at.x + overlay.pixel_offset.0 - OVERLAY_WIDTH / 2.0;
    let y = at.y + overlay.pixel_offset.1 - height;
    svg.push_str(r##"<g class="overlay">"##);
    svg.push_str(&format!(
        r##"<rect x="{x:.1}" y="{y:.1}" width="{OVERLAY_WIDTH}" height="{height:.1}" rx="4" fill="white" stroke="#6264a7" stroke-width="2"/>"##
    ));
    for (i, line) in lines.iter().enumerate() {
        let ty = y + 6.0 + OVERLAY_LINE * (i as f64 + 0.75);
        let weight = if i == 0 { "700" } else { "400" };
        svg.push_str(&format!(
            r##"<text x="{:.1}" y="{ty:.1}" fill="#323130" font-size="12" font-weight="{weight}" font-family="Segoe UI, sans-serif">{}</text>"##,
            x + 8.0,
            escape(line)
        ));
    }
    svg.push_str("</g>");
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinate;

    fn view() -> Viewport {
        Viewport::new(Coordinate::new(40.0, -75.0), 8.0, (800.0, 600.0))
    }

    fn pin(id: &str, label: &str) -> Shape {
        Shape {
            id: id.into(),
            coordinate: Coordinate::new(40.0, -75.0),
            icon_key: format!("user-photo-{id}"),
            icon_scale: 0.8,
            kind: ShapeKind::Point { label: label.into() },
        }
    }

    #[test]
    fn test_snapshot_references_icons_by_key() {
        let shapes = vec![
            pin("u1", "Ada"),
            Shape {
                id: "c1".into(),
                coordinate: Coordinate::new(40.1, -75.1),
                icon_key: "cluster-3".into(),
                icon_scale: 1.0,
                kind: ShapeKind::Cluster {
                    member_count: 3,
                    same_location: false,
                },
            },
        ];
        let closed = OverlayState::closed();
        let svg = render_snapshot(&view(), &shapes, &HashMap::new(), &closed, "icons");
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains(r#"href="icons/user-photo-u1.png""#));
        assert!(svg.contains(r#"href="icons/cluster-3.png""#));
        assert!(svg.contains("3 Team Members"));
        assert!(!svg.contains("class=\"overlay\""));
    }

    #[test]
    fn test_pin_stands_on_its_coordinate() {
        let shapes = [pin("u1", "Ada")];
        let svg = render_snapshot(&view(), &shapes, &HashMap::new(), &OverlayState::closed(), "i");
        // Centre of an 800x600 view, 96px icon at 0.8 scale
        assert!(svg.contains(r#"x="361.6" y="223.2""#));
    }

    #[test]
    fn test_icon_file_names_are_sanitized() {
        assert_eq!(icon_file_name("cluster-large"), "cluster-large.png");
        assert_eq!(icon_file_name("user-photo-../x y"), "user-photo-___x_y.png");
    }

    #[test]
    fn test_labels_are_escaped() {
        let shapes = [pin("u1", "Tom & <Jerry>")];
        let svg = render_snapshot(&view(), &shapes, &HashMap::new(), &OverlayState::closed(), "i");
        assert!(svg.contains("Tom &amp; &lt;Jerry&gt;"));
        assert!(!svg.contains("<Jerry>"));
    }
}
