use std::sync::Arc;

use image::RgbaImage;
use shader_tilemap::layer::{CompositeLayer, OverlayLayer, TileLayer, VertexMode};
use shader_tilemap::quad::{FillRect, QuadRecord};
use shader_tilemap::tileset::Tileset;

fn quad(dx: f32, dy: f32) -> QuadRecord {
    QuadRecord::new([48.0, 0.0], [dx, dy], [48.0, 48.0])
}

fn fill(layer: &mut TileLayer) {
    layer.add_rect(quad(0.0, 0.0));
    layer.add_rect(quad(48.0, 0.0).with_anim(2.0, 0.0));
    layer.add_rect(QuadRecord::new([0.0, 24.0], [0.0, 48.0], [24.0, 12.0]));
}

#[test]
fn test_wide_rect_is_split_on_add() {
    let mut layer = TileLayer::new(None);
    layer.add_rect(QuadRecord::new([0.0, 0.0], [0.0, 0.0], [48.0, 24.0]));
    assert_eq!(layer.len(), 2);
    assert!(layer.records().iter().all(|r| r.width == 24.0 && r.height == 24.0));
}

#[test]
fn test_clear_and_readd_packs_identical_bytes() {
    for mode in [VertexMode::Square, VertexMode::Rect] {
        let mut layer = TileLayer::new(None);
        fill(&mut layer);
        assert!(layer.prepare_vertices(mode));
        let first = layer.vertex_bytes().to_vec();
        assert_eq!(first.len(), layer.len() * mode.record_stride());

        layer.clear();
        assert!(layer.is_empty());
        fill(&mut layer);
        assert!(layer.prepare_vertices(mode));
        assert_eq!(layer.vertex_bytes(), first.as_slice());
    }
}

#[test]
fn test_growth_doubles_and_preserves_bytes() {
    let stride = VertexMode::Square.record_stride();
    let mut layer = TileLayer::new(None);
    layer.add_rect(quad(0.0, 0.0));
    layer.prepare_vertices(VertexMode::Square);
    assert_eq!(layer.capacity_bytes(), stride);
    let head = layer.vertex_bytes().to_vec();

    layer.add_rect(quad(48.0, 0.0));
    layer.add_rect(quad(96.0, 0.0));
    layer.prepare_vertices(VertexMode::Square);
    assert_eq!(layer.capacity_bytes(), stride * 4);
    assert_eq!(&layer.vertex_bytes()[..stride], head.as_slice());
}

#[test]
fn test_upload_range_policy() {
    let stride = VertexMode::Square.record_stride();
    let mut layer = TileLayer::new(None);
    for i in 0..3 {
        layer.add_rect(quad(i as f32 * 48.0, 0.0));
    }
    layer.prepare_vertices(VertexMode::Square);
    // 84 of 112 bytes populated: send the whole store.
    assert_eq!(layer.upload_range(), 0..stride * 4);

    layer.clear();
    layer.add_rect(quad(0.0, 0.0));
    layer.prepare_vertices(VertexMode::Square);
    // The store never shrinks; a small prefix is sent alone.
    assert_eq!(layer.capacity_bytes(), stride * 4);
    assert_eq!(layer.upload_range(), 0..stride);
    assert_eq!(layer.upload_bytes().len(), stride);
}

#[test]
fn test_animation_flag_is_sticky_until_clear() {
    let mut layer = TileLayer::new(None);
    layer.add_rect(quad(0.0, 0.0).with_anim(0.0, 1.0));
    layer.add_rect(quad(48.0, 0.0));
    layer.clear_modify();

    assert!(layer.has_animation());
    assert!(!layer.is_modified(false));
    assert!(layer.is_modified(true));

    layer.clear();
    assert!(!layer.has_animation());
    // Emptied layers still need one repaint to wipe what was drawn.
    assert!(layer.is_modified(false));
    layer.clear_modify();
    assert!(!layer.is_modified(true));
}

#[test]
fn test_composite_tracks_modifications() {
    let sheet = Tileset::pending("B");
    let mut composite = CompositeLayer::new(VertexMode::Square);
    composite.set_tilesets(&[Some(Arc::clone(&sheet)), None]);

    // New children count as a change.
    assert!(composite.is_modified(false));
    composite.clear_modify();
    assert!(!composite.is_modified(false));
    assert!(!composite.is_modified(true));

    assert!(composite.add_rect(0, quad(0.0, 0.0)));
    assert!(composite.is_modified(false));
    composite.clear_modify();

    // Slot without a tileset, and a slot that does not exist.
    assert!(!composite.add_rect(1, quad(0.0, 0.0)));
    assert!(!composite.add_rect(7, quad(0.0, 0.0)));
    assert!(!composite.is_modified(false));
    assert_eq!(composite.quad_count(), 1);

    composite.clear();
    assert_eq!(composite.children().len(), 2);
    assert!(composite.is_modified(false));
    composite.clear_modify();

    // Rebuilding with the same slot count still counts as a change.
    composite.set_tilesets(&[None, None]);
    assert!(composite.is_modified(false));
    composite.clear_modify();
    assert!(!composite.is_modified(false));
}

#[test]
fn test_deferred_child_reports_modified_once_ready() {
    let sheet = Tileset::pending("B");
    let mut layer = TileLayer::new(Some(Arc::clone(&sheet)));
    layer.add_rect(quad(0.0, 0.0));
    layer.set_deferred(true);
    layer.clear_modify();
    assert!(!layer.is_modified(false));

    assert!(sheet.fulfil(RgbaImage::new(96, 96)));
    assert!(layer.is_modified(false));
}

#[test]
fn test_overlay_tracks_rects_and_color() {
    let mut overlay = OverlayLayer::new([0.0, 0.0, 0.0, 0.5]);
    assert!(overlay.is_modified());
    overlay.clear_modify();
    assert!(!overlay.is_modified());

    overlay.add_rect(FillRect { x: 0.0, y: 0.0, width: 24.0, height: 24.0 });
    assert!(overlay.is_modified());
    overlay.clear_modify();

    overlay.set_color([0.0, 0.0, 0.0, 0.25]);
    assert!(overlay.is_modified());
    overlay.clear_modify();

    overlay.clear();
    assert!(overlay.is_empty());
    assert!(overlay.is_modified());
}
