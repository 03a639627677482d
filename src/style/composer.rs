use std::fmt::Write as _;

use crate::style::catalog::PlatformCatalog;
use crate::style::medium::ImageMediumType;

const GENERIC_DIRECTIVE: &str = r#"You are an expert at analyzing images and extracting their transferable visual style.

ANALYZE THESE SPECIFIC ELEMENTS:
- Medium and technique: how the image was made and what tools it implies
- Lighting: quality, direction, contrast and mood
- Color: palette, saturation, temperature and grading
- Texture and surface: grain, brushwork, line quality, finish
- Composition habits: framing, depth, negative space
- Era or movement the style evokes"#;

fn medium_directive(medium: ImageMediumType) -> &'static str {
    match medium {
        ImageMediumType::Photography => {
            r#"You are an expert at analyzing photographs and extracting their technical and aesthetic characteristics.

ANALYZE THESE SPECIFIC ELEMENTS:

CAMERA & FORMAT:
- Camera feel (DSLR, mirrorless, medium or large format, 35mm or 120 film, phone, instant)
- Visible sensor or film size traits such as depth of field and tonal roll-off

FILM VS DIGITAL:
- For film, name the stock character (warm portrait negative, cool lifted-shadow negative, punchy slide, grainy black and white)
- For digital, describe the sensor look, highlight handling and noise pattern

LENS CHARACTER:
- Focal length feel, from wide and environmental to compressed telephoto
- Bokeh quality, flare, vintage softness or modern clinical sharpness

ERA & GRADING:
- Decade the image evokes and its color grading (film emulation, faded blacks, high contrast)

LIGHTING:
- Hard or soft, natural or artificial, direction and mood"#
        }
        ImageMediumType::TraditionalIllustration => {
            r#"You are an expert at analyzing hand-drawn illustrations and extracting their technique and material characteristics.

ANALYZE THESE SPECIFIC ELEMENTS:

LINE CHARACTER:
- Weight variation, taper and pressure
- Confidence of the stroke: decisive, sketchy, broken or gestural
- Edge treatment and the amount of hand irregularity

TOOLS:
- Pen, brush pen, dip nib, marker, ballpoint, pencil grade, charcoal or conte
- Ink behavior: dense opaque black, translucent layering, sepia tones

HATCHING & SHADING:
- Crosshatching, parallel hatching, stippling, scribble or contour hatching
- Spacing, regularity, direction and layering of the marks

SURFACE:
- Paper tooth and tone, and how untouched paper is used for highlights"#
        }
        ImageMediumType::Painting => {
            r#"You are an expert at analyzing paintings and extracting their medium and technique characteristics.

ANALYZE THESE SPECIFIC ELEMENTS:

MEDIUM:
- Oil, watercolor, acrylic, gouache, pastel, tempera or encaustic
- How the paint sits on the surface: transparency, opacity, buildup

APPLICATION:
- Stroke visibility, from impasto to invisible blending
- Brush or tool feel: flat, round, filbert, palette knife, sponge
- Technique: wet-on-wet, glazing, alla prima, scumbling, dry brush
- Edge quality: lost, found, or a mix of both

COLOR:
- Palette range, mixing approach, temperature shifts and value structure

SURFACE:
- Canvas weave, paper texture or panel smoothness showing through"#
        }
        ImageMediumType::DigitalArt => {
            r#"You are an expert at analyzing digital artwork and extracting its rendering and stylistic characteristics.

ANALYZE THESE SPECIFIC ELEMENTS:

STYLE CATEGORY:
- Digital painting, vector or flat design, cel shading, pixel art, concept art, matte painting, anime or comic styles

RENDERING:
- Brush engine feel: hard round, textured, airbrush, custom textures
- Shading model: flat fills, soft gradients, painterly blending, hard-edged cel shading
- Line work: clean vector strokes, textured digital ink, or lineless

EFFECTS & FINISH:
- Glow, bloom, chromatic aberration, noise overlays, halftone, gradient maps
- Level of polish from loose sketch to fully rendered illustration

COLOR:
- Palette, saturation, lighting color and any limited or duotone schemes"#
        }
        ImageMediumType::Render3d => {
            r#"You are an expert at analyzing 3D renders and extracting their rendering and material characteristics.

ANALYZE THESE SPECIFIC ELEMENTS:

RENDER STYLE:
- Photoreal, stylized, toon-shaded, clay, low-poly, isometric or voxel

MATERIALS:
- Surface response: matte, glossy, subsurface scattering, metallic, translucent
- Texture detail and wear

LIGHTING:
- Studio three-point, HDRI environment, global illumination, volumetrics, rim light

CAMERA & POST:
- Lens feel, depth of field, ambient occlusion, bloom, color grading"#
        }
        ImageMediumType::MixedMedia => {
            r#"You are an expert at analyzing mixed media artwork and extracting how its techniques combine.

ANALYZE THESE SPECIFIC ELEMENTS:

COMPONENTS:
- The dominant medium and each secondary medium present
- Collage elements, photographic fragments, paint, ink, digital overlays

INTEGRATION:
- How layers meet: hard cut edges, blended transitions, torn paper, masks
- Texture contrast between components

UNIFYING TREATMENT:
- Shared palette, grain or finish that ties the pieces together"#
        }
    }
}

/// Inputs for one analysis instruction.
#[derive(Debug, Clone, Copy)]
pub struct CompositionRequest<'a> {
    pub image_count: usize,
    pub guidance: Option<&'a str>,
    pub medium: Option<ImageMediumType>,
}

/// Builds the full instruction text sent to the vision model.
///
/// The output contract is stated three times: an enumeration of labels with
/// their hints, a literal skeleton of the response, and explicit label rules.
pub fn compose_analysis_prompt(catalog: &PlatformCatalog, request: &CompositionRequest<'_>) -> String {
    let mut prompt = String::new();

    let directive = request
        .medium
        .map(medium_directive)
        .unwrap_or(GENERIC_DIRECTIVE);
    prompt.push_str(directive);
    prompt.push_str("\n\nOUTPUT FORMAT:\n");
    let _ = writeln!(
        prompt,
        "Output {} platform-optimized prompts, in this exact order, using EXACTLY this format:\n",
        catalog.len()
    );
    for platform in &catalog.platforms {
        let _ = writeln!(
            prompt,
            "{} [{}, {}]",
            platform.label,
            platform.hint_for(request.medium),
            platform.word_band
        );
    }

    prompt.push_str("\nYour complete response must look like this:\n\n");
    for platform in &catalog.platforms {
        let _ = writeln!(prompt, "{} <prompt text>\n", platform.label);
    }

    prompt.push_str("LABEL RULES:\n");
    let labels = catalog
        .platforms
        .iter()
        .map(|platform| platform.label.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(
        prompt,
        "- Begin each section with its label exactly as written: {labels}"
    );
    prompt.push_str("- Put the prompt text on the same line as its label\n");
    prompt.push_str("- Do not use markdown, bold, headings or numbering around the labels\n");
    prompt.push_str("- Do not write anything before the first label or after the last prompt\n");
    prompt.push_str("\nFocus ONLY on transferable style characteristics, not subject matter.\n\n");

    prompt.push_str(&task_section(request));
    prompt
}

fn task_section(request: &CompositionRequest<'_>) -> String {
    let mut task = String::new();
    if request.image_count <= 1 {
        task.push_str("Analyze this image and extract its visual style characteristics.\n");
    } else {
        let _ = writeln!(
            task,
            "Analyze these {} images and extract their COMMON style characteristics.",
            request.image_count
        );
    }

    if let Some(medium) = request.medium {
        let _ = writeln!(task, "Detected medium: {medium}");
    }

    if let Some(guidance) = request.guidance.filter(|value| !value.trim().is_empty()) {
        let _ = writeln!(task, "\nUser notes: \"{guidance}\"");
        task.push_str(
            "Pay special attention to the aspects the user mentioned while keeping the focus on style over content.\n",
        );
    }

    if request.image_count > 1 {
        task.push_str(
            "\nDescribe only the style patterns shared across the images, not traits of a single one.\n",
        );
    }
    task
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::catalog::builtin_catalog;

    fn request(image_count: usize) -> CompositionRequest<'static> {
        CompositionRequest {
            image_count,
            guidance: None,
            medium: None,
        }
    }

    #[test]
    fn enumerates_labels_in_catalog_order() {
        let catalog = builtin_catalog();
        let prompt = compose_analysis_prompt(&catalog, &request(1));
        let positions: Vec<usize> = ["GPT_IMAGE: [", "FLUX: [", "NANO_BANANA: [", "SEEDREAM: ["]
            .iter()
            .map(|label| prompt.find(label).unwrap())
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(prompt.contains("~60-80 words"));
        assert!(prompt.contains("30-100 words"));
        assert!(prompt.contains("SEEDREAM: <prompt text>"));
    }

    #[test]
    fn generic_prompt_has_no_medium_context() {
        let catalog = builtin_catalog();
        let prompt = compose_analysis_prompt(&catalog, &request(1));
        assert!(prompt.starts_with(GENERIC_DIRECTIVE));
        assert!(!prompt.contains("Detected medium"));
        assert!(!prompt.contains("User notes"));
        assert!(prompt.contains("not subject matter"));
    }

    #[test]
    fn medium_specializes_directive_and_hints() {
        let catalog = builtin_catalog();
        let prompt = compose_analysis_prompt(
            &catalog,
            &CompositionRequest {
                image_count: 1,
                guidance: None,
                medium: Some(ImageMediumType::Photography),
            },
        );
        assert!(prompt.starts_with("You are an expert at analyzing photographs"));
        assert!(prompt.contains("Detected medium: PHOTOGRAPHY"));
        assert!(prompt.contains("camera-first: shot type, focal length feel"));
    }

    #[test]
    fn includes_guidance_and_common_style_for_several_images() {
        let catalog = builtin_catalog();
        let prompt = compose_analysis_prompt(
            &catalog,
            &CompositionRequest {
                image_count: 3,
                guidance: Some("focus on the grain"),
                medium: None,
            },
        );
        assert!(prompt.contains("Analyze these 3 images and extract their COMMON style"));
        assert!(prompt.contains("User notes: \"focus on the grain\""));
        assert!(prompt.contains("style over content"));
    }

    #[test]
    fn blank_guidance_is_ignored() {
        let catalog = builtin_catalog();
        let prompt = compose_analysis_prompt(
            &catalog,
            &CompositionRequest {
                image_count: 1,
                guidance: Some("   "),
                medium: None,
            },
        );
        assert!(!prompt.contains("User notes"));
    }

    #[test]
    fn every_medium_has_its_own_directive() {
        let mut seen = std::collections::HashSet::new();
        for medium in ImageMediumType::ALL {
            assert!(seen.insert(medium_directive(medium)));
        }
    }
}
