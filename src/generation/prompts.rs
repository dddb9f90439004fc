//! Text instructions sent alongside the images.

/// Instruction for fitting existing garments onto the subject.
pub fn try_on_prompt(palette: Option<&str>, has_background: bool) -> String {
    let mut lines = vec![
        "TASK: High-Fidelity Editorial Fashion Try-On.".to_string(),
        "1. ANATOMY MAPPING: Accurately fit all garments onto the subject, respecting body contours and perspective.".to_string(),
        "2. TRADITIONAL CRAFT: For sarees, lehengas, or sherwanis, render realistic silk luster, zari embroidery, and traditional draping folds (pleats, falls, dupatta).".to_string(),
        "3. PHYSICS: Simulate realistic fabric weight and texture interactions between layers.".to_string(),
        "4. IDENTITY: Retain 100% subject identity, face, and skin tone.".to_string(),
    ];
    if let Some(color) = palette {
        lines.push(format!(
            "5. PALETTE: Integrate \"{}\" as the dominant lighting/accent theme.",
            color
        ));
    }
    lines.push(if has_background {
        "6. ENVIRONMENT: Seamlessly integrate the subject into the provided background.".to_string()
    } else {
        "6. ENVIRONMENT: Clean professional studio.".to_string()
    });
    lines.push("7. STYLE ADVICE: Provide 2 sentences of professional editorial feedback.".to_string());
    lines.push("OUTPUT: base64 image + advice text.".to_string());
    lines.join("\n")
}

/// Instruction for synthesising a garment from a free-text description.
pub fn custom_prompt(description: &str, palette: Option<&str>) -> String {
    let mut lines = vec![
        "TASK: AI Couture Synthesis & Fitting.".to_string(),
        format!(
            "1. SYNTHESIS: Generate a high-fashion piece based on: \"{}\".",
            description.trim()
        ),
        "2. INTEGRATION: Combine synthesized piece with any reference garments provided.".to_string(),
        "3. DRAPING: Follow high-end tailoring standards for the fit.".to_string(),
    ];
    if let Some(color) = palette {
        lines.push(format!("4. PALETTE: Integrate \"{}\".", color));
    }
    lines.push("5. STYLE ADVICE: Provide 2 sentences of professional feedback on the design.".to_string());
    lines.join("\n")
}

/// Fixed instruction for the 360° orbit video.
pub const VIDEO_PROMPT: &str = "A cinematic 360-degree slow-motion orbit around a high-fashion model wearing this outfit. Detailed fabric textures, studio lighting, professional 4k camera movement.";
