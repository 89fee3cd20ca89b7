//! Job payload: source videos plus the templates to overlay onto them.

use serde::{Deserialize, Serialize};

use crate::variant::Variant;

/// A source video reference, already downloaded into scratch storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceVideoRef {
    pub scratch_path: String,
    pub original_name: String,
}

/// Metadata extracted from a template asset by `probeTemplate`.
///
/// Defaults used on probe failure: `has_alpha_channel = true`, everything else `None` —
/// probing is best-effort and must never block ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateMetadata {
    pub has_alpha_channel: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub pixel_format: Option<String>,
}

impl Default for TemplateMetadata {
    fn default() -> Self {
        Self {
            has_alpha_channel: true,
            width: None,
            height: None,
            pixel_format: None,
        }
    }
}

/// A template asset reference, tagged with the variant it targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRef {
    pub scratch_path: String,
    pub original_name: String,
    pub variant: Variant,
    pub metadata: TemplateMetadata,
}

impl TemplateRef {
    pub fn new(scratch_path: String, original_name: String, variant: Variant) -> Self {
        Self {
            scratch_path,
            original_name,
            variant,
            metadata: TemplateMetadata::default(),
        }
    }

    /// Whether the scratch asset is a still image rather than a moving picture,
    /// judged by its original filename extension.
    pub fn is_image(&self) -> bool {
        let lower = self.original_name.to_ascii_lowercase();
        [".png", ".jpg", ".jpeg", ".webp", ".bmp", ".gif"]
            .iter()
            .any(|ext| lower.ends_with(ext))
    }
}

/// Up to three templates, keyed by variant. At least one must be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical: Option<TemplateRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub square: Option<TemplateRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landscape: Option<TemplateRef>,
}

impl TemplateSet {
    pub fn get(&self, variant: Variant) -> Option<&TemplateRef> {
        match variant {
            Variant::Vertical => self.vertical.as_ref(),
            Variant::Square => self.square.as_ref(),
            Variant::Landscape => self.landscape.as_ref(),
        }
    }

    pub fn count_present(&self) -> usize {
        Variant::ORDERED.iter().filter(|v| self.get(**v).is_some()).count()
    }

    /// Templates present, in the fixed insertion order {vertical, square, landscape}.
    pub fn iter_present(&self) -> impl Iterator<Item = &TemplateRef> {
        Variant::ORDERED.iter().filter_map(move |v| self.get(*v))
    }
}

/// A job's full input: the sources to render and the templates to overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    pub sources: Vec<SourceVideoRef>,
    pub templates: TemplateSet,
}

impl JobPayload {
    /// `totalVariants = len(sources) x len(templates_present)`, per the spec's worker-loop formula.
    pub fn total_variants(&self) -> u32 {
        (self.sources.len() * self.templates.count_present()) as u32
    }

    pub fn is_valid(&self) -> bool {
        !self.sources.is_empty() && self.templates.count_present() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceVideoRef {
        SourceVideoRef {
            scratch_path: "/tmp/s.mp4".into(),
            original_name: "s.mp4".into(),
        }
    }

    #[test]
    fn default_template_metadata_defaults_alpha_true() {
        let meta = TemplateMetadata::default();
        assert!(meta.has_alpha_channel);
        assert!(meta.width.is_none());
    }

    #[test]
    fn total_variants_multiplies_sources_by_present_templates() {
        let payload = JobPayload {
            sources: vec![source(), source()],
            templates: TemplateSet {
                vertical: Some(TemplateRef::new("/tmp/v.png".into(), "v.png".into(), Variant::Vertical)),
                square: Some(TemplateRef::new("/tmp/sq.mp4".into(), "sq.mp4".into(), Variant::Square)),
                landscape: None,
            },
        };
        assert_eq!(payload.total_variants(), 4);
    }

    #[test]
    fn validation_requires_source_and_template() {
        let empty = JobPayload {
            sources: vec![],
            templates: TemplateSet::default(),
        };
        assert!(!empty.is_valid());

        let no_templates = JobPayload {
            sources: vec![source()],
            templates: TemplateSet::default(),
        };
        assert!(!no_templates.is_valid());
    }

    #[test]
    fn iter_present_follows_fixed_order() {
        let templates = TemplateSet {
            vertical: None,
            square: Some(TemplateRef::new("/tmp/sq.mp4".into(), "sq.mp4".into(), Variant::Square)),
            landscape: Some(TemplateRef::new("/tmp/l.jpg".into(), "l.jpg".into(), Variant::Landscape)),
        };
        let order: Vec<Variant> = templates.iter_present().map(|t| t.variant).collect();
        assert_eq!(order, vec![Variant::Square, Variant::Landscape]);
    }

    #[test]
    fn is_image_detects_still_picture_extensions() {
        let png = TemplateRef::new("/tmp/a.png".into(), "a.PNG".into(), Variant::Vertical);
        assert!(png.is_image());
        let mp4 = TemplateRef::new("/tmp/a.mp4".into(), "a.mp4".into(), Variant::Vertical);
        assert!(!mp4.is_image());
    }
}
