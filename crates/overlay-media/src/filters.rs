//! Filter-graph construction for the three-label composition (§4.2).
//!
//! Every variant produces exactly three filter-graph labels: the padded source canvas
//! (`[src]`), the scaled template (`[tpl]`), and the overlaid result (`[vout]`).

use overlay_models::Variant;

/// Built filter_complex graph plus the label to `-map` for video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterGraph {
    pub filter_complex: String,
    pub video_label: String,
}

const LANCZOS: &str = "flags=lanczos";

fn source_chain(variant: Variant) -> String {
    let (cw, ch) = variant.canvas();
    match variant {
        Variant::Vertical => format!(
            "scale={cw}:{ch}:force_original_aspect_ratio=decrease:{LANCZOS},\
             pad={cw}:{ch}:(ow-iw)/2:(oh-ih)/2,setsar=1,format=rgba[src]"
        ),
        // Left-aligned horizontal offset 0, vertical center — a deliberate product contract,
        // not a bug: see SPEC_FULL.md's Open Questions resolution.
        Variant::Square => format!(
            "scale=-2:{ch}:{LANCZOS},pad={cw}:{ch}:0:(oh-ih)/2,setsar=1,format=rgba[src]"
        ),
        Variant::Landscape => format!(
            "scale=-2:{ch}:{LANCZOS},pad={cw}:{ch}:(ow-iw)/2:(oh-ih)/2,setsar=1,format=rgba[src]"
        ),
    }
}

fn template_chain(variant: Variant) -> String {
    let (cw, ch) = variant.canvas();
    format!("scale={cw}:{ch}:force_original_aspect_ratio=decrease:{LANCZOS},setsar=1,format=rgba[tpl]")
}

/// Builds the filter_complex graph for one (source, template, variant) render.
///
/// `source_has_alpha` is always false in practice (sources are opaque video), but the
/// overlay ordering is driven entirely by `template_has_alpha`: if the template carries
/// transparency it is the top layer, otherwise the source is on top (§4.2 Overlay ordering).
pub fn build_filter_graph(variant: Variant, template_has_alpha: bool) -> FilterGraph {
    let source = source_chain(variant);
    let template = template_chain(variant);

    let overlay = if template_has_alpha {
        "[src][tpl]overlay=0:0:format=auto[vout]"
    } else {
        "[tpl][src]overlay=0:0[vout]"
    };

    let filter_complex = format!("[0:v]{source};[1:v]{template};{overlay}");

    FilterGraph {
        filter_complex,
        video_label: "[vout]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertical_pads_centered() {
        let graph = build_filter_graph(Variant::Vertical, true);
        assert!(graph.filter_complex.contains("pad=1080:1920:(ow-iw)/2:(oh-ih)/2"));
        assert!(graph.filter_complex.contains("[src][tpl]overlay"));
    }

    #[test]
    fn square_pads_left_aligned_not_centered() {
        let graph = build_filter_graph(Variant::Square, true);
        assert!(graph.filter_complex.contains("pad=1080:1080:0:(oh-ih)/2"));
        assert!(!graph.filter_complex.contains("pad=1080:1080:(ow-iw)/2"));
    }

    #[test]
    fn landscape_pads_centered_at_1920x1080() {
        let graph = build_filter_graph(Variant::Landscape, false);
        assert!(graph.filter_complex.contains("pad=1920:1080:(ow-iw)/2:(oh-ih)/2"));
    }

    #[test]
    fn opaque_template_puts_source_on_top() {
        let graph = build_filter_graph(Variant::Vertical, false);
        assert!(graph.filter_complex.contains("[tpl][src]overlay"));
    }

    #[test]
    fn alpha_template_puts_template_on_top() {
        let graph = build_filter_graph(Variant::Vertical, true);
        assert!(graph.filter_complex.contains("[src][tpl]overlay"));
    }

    #[test]
    fn all_scaling_uses_lanczos() {
        for variant in Variant::ORDERED {
            let graph = build_filter_graph(variant, true);
            assert_eq!(graph.filter_complex.matches("flags=lanczos").count(), 2);
        }
    }
}
