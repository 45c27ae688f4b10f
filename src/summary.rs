/*!
 * Consolidation of a playlist's subtitles and study-material generation.
 *
 * Subtitle files named `<index>. <Title>.<lang>.srt` are parsed, flattened to
 * plain text and ordered by index. The consolidated document is either the
 * final output (`skip_remote`) or the input to one text-generation call that
 * produces structured study material.
 */

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use log::{info, warn};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::app_config::SummaryConfig;
use crate::file_utils::FileManager;
use crate::language_utils::{LanguageTag, SubtitleFileInfo, select_subtitles_for_playlist};
use crate::providers::{GenerationRequest, TextGenerator};
use crate::subtitle_processor::SubtitleTrack;

/// Input size above which a warning suggests splitting the playlist
pub const LARGE_INPUT_TOKENS: usize = 120_000;

const SYSTEM_PROMPT: &str = "You are an expert educational content creator.";

const STUDY_PROMPT_EN: &str = "You are an educational expert. Analyze the transcribed content from a video playlist and create comprehensive, structured study material.

The material should include:

1. **Executive Summary** (2-3 paragraphs): Overview of topics and playlist objectives
2. **Key Concepts**: List of main concepts with concise explanations
3. **Content by Video**: For each video:
   - Content summary (3-5 sentences)
   - Main points (bullet points)
   - Practical examples mentioned
   - Relationship with previous/next videos
4. **Examples and Practical Cases**: Consolidation of all examples presented
5. **Action Points**: Checklist of suggested tasks/exercises
6. **Glossary**: Technical terms and definitions
7. **References**: Resources mentioned with approximate timestamps

**Format:** Markdown, with headings, subheadings, lists and emphasis.
**Tone:** Educational, clear and objective.

**Subtitle content:**

";

const STUDY_PROMPT_PT: &str = "Você é um especialista educacional. Analise o conteúdo transcrito de uma playlist de vídeos e crie um material de estudo completo e estruturado.

O material deve incluir:

1. **Resumo Executivo** (2-3 parágrafos): Visão geral dos tópicos e objetivos da playlist
2. **Conceitos-Chave**: Lista de conceitos principais com explicações concisas
3. **Conteúdo por Vídeo**: Para cada vídeo:
   - Resumo do conteúdo (3-5 frases)
   - Pontos principais (bullet points)
   - Exemplos práticos mencionados
   - Relação com vídeos anteriores/posteriores
4. **Exemplos e Casos Práticos**: Consolidação de todos os exemplos apresentados
5. **Pontos de Ação**: Checklist de tarefas/exercícios sugeridos
6. **Glossário**: Termos técnicos e definições
7. **Referências**: Recursos mencionados com timestamps aproximados

**Formato:** Markdown, com títulos, subtítulos, listas e ênfases.
**Tom:** Educacional, claro e objetivo.

**Conteúdo das legendas:**

";

/// Output shape of the consolidated document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsolidationFormat {
    #[default]
    Markdown,
    Json,
}

impl ConsolidationFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ConsolidationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl FromStr for ConsolidationFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            _ => Err(anyhow!("Invalid consolidation format: {}", s)),
        }
    }
}

/// Text of one video's subtitle file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoContent {
    pub file: String,
    pub index: usize,
    pub title: String,
    pub language: String,
    pub segment_count: usize,
    pub full_text: String,
    pub word_count: usize,
}

/// Rough token count: three quarters of the word count
pub fn estimate_tokens(text: &str) -> usize {
    text.split_whitespace().count() * 3 / 4
}

/// Study-material prompt for a language; Portuguese variants get the
/// Portuguese prompt, everything else the English one
pub fn study_prompt(language: &str) -> &'static str {
    if LanguageTag::parse(language).language() == "pt" {
        STUDY_PROMPT_PT
    } else {
        STUDY_PROMPT_EN
    }
}

/// Read every `.srt` file in `dir`, optionally one per video chosen by
/// `preferences`, ordered by video index
pub fn collect_videos(dir: &Path, preferences: Option<&[LanguageTag]>) -> Result<Vec<VideoContent>> {
    if !FileManager::dir_exists(dir) {
        return Err(anyhow!("Subtitle directory not found: {}", dir.display()));
    }
    let paths = FileManager::find_files(dir, "srt")?;
    if paths.is_empty() {
        return Err(anyhow!("No SRT files found in {}", dir.display()));
    }

    let names: Vec<String> = paths
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .collect();
    let selected: Vec<String> = match preferences {
        Some(preferences) => select_subtitles_for_playlist(&names, preferences)
            .into_iter()
            .map(|s| s.file_name)
            .collect(),
        None => names,
    };
    info!("Consolidating {} subtitle file(s)", selected.len());

    let mut videos = Vec::new();
    for name in selected {
        let track = SubtitleTrack::read_from_file(dir.join(&name))?;
        if track.is_empty() {
            warn!("Empty or invalid subtitle file: {}", name);
            continue;
        }
        let info = SubtitleFileInfo::parse(&name);
        let full_text = track.plain_text();
        videos.push(VideoContent {
            index: info.index.unwrap_or(0),
            title: info.title.clone(),
            language: info
                .language
                .map(|l| l.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            segment_count: track.len(),
            word_count: full_text.split_whitespace().count(),
            full_text,
            file: name,
        });
    }

    videos.sort_by_key(|v| v.index);
    Ok(videos)
}

/// Render collected videos as one document
pub fn render_consolidated(videos: &[VideoContent], format: ConsolidationFormat) -> Result<String> {
    if format == ConsolidationFormat::Json {
        return serde_json::to_string_pretty(videos).context("Failed to serialize consolidated subtitles");
    }

    let mut lines = vec![
        "# Consolidated Study Material".to_string(),
        format!("\n**Total videos:** {}", videos.len()),
        format!("**Generated at:** {}", Local::now().format("%Y-%m-%d %H:%M:%S")),
        "\n---\n".to_string(),
    ];
    for video in videos {
        lines.push(format!("\n## {}. {}", video.index, video.title));
        lines.push(format!(
            "\n**Language:** {} | **Words:** {}",
            video.language, video.word_count
        ));
        lines.push("\n### Content\n".to_string());
        lines.push(video.full_text.clone());
        lines.push("\n---\n".to_string());
    }
    Ok(lines.join("\n"))
}

/// `collect_videos` followed by `render_consolidated`
pub fn consolidate(dir: &Path, format: ConsolidationFormat, preferences: Option<&[LanguageTag]>) -> Result<String> {
    let videos = collect_videos(dir, preferences)?;
    if videos.is_empty() {
        return Err(anyhow!("No readable subtitles in {}", dir.display()));
    }
    render_consolidated(&videos, format)
}

/// Generates study material from consolidated text
#[derive(Debug, Clone)]
pub struct SummaryGenerator {
    generator: Arc<dyn TextGenerator>,
    config: SummaryConfig,
}

impl SummaryGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, config: SummaryConfig) -> Self {
        Self { generator, config }
    }

    /// One request with the study prompt followed by the consolidated text
    pub async fn generate(&self, consolidated: &str, language: &str) -> Result<String> {
        let prompt = format!("{}{}", study_prompt(language), consolidated);
        let tokens = estimate_tokens(&prompt);
        info!("Estimated input tokens: ~{}", tokens);
        if tokens > LARGE_INPUT_TOKENS {
            warn!("Input is very long ({} tokens); consider summarizing in parts", tokens);
        }

        let request = GenerationRequest::new(SYSTEM_PROMPT, prompt)
            .temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens)
            .model(self.config.model.clone());

        info!("Generating study material with {}", self.generator.name());
        let content = self
            .generator
            .generate(request)
            .await
            .context("Study material generation failed")?;
        if content.trim().is_empty() {
            return Err(anyhow!("Study material generation returned no content"));
        }
        Ok(content)
    }
}

/// Options for `generate_study_material`
#[derive(Debug, Clone)]
pub struct StudyMaterialOptions {
    pub language: String,
    pub format: ConsolidationFormat,
    pub preferences: Option<Vec<LanguageTag>>,
    /// Stop after writing the consolidated document
    pub skip_remote: bool,
}

/// `<stem>_consolidated.<ext>` next to `output`
pub fn consolidated_path(output: &Path, format: ConsolidationFormat) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "study_material".to_string());
    output.with_file_name(format!("{}_consolidated.{}", stem, format.extension()))
}

/// Consolidate `subtitle_dir`, save the intermediate document and, unless
/// `skip_remote`, write generated study material to `output`.
/// Returns the path of the last file written.
pub async fn generate_study_material(
    subtitle_dir: &Path,
    output: &Path,
    options: &StudyMaterialOptions,
    generator: Option<&SummaryGenerator>,
) -> Result<PathBuf> {
    let consolidated = consolidate(subtitle_dir, options.format, options.preferences.as_deref())?;
    info!(
        "Consolidated text: {} characters, ~{} tokens",
        consolidated.chars().count(),
        estimate_tokens(&consolidated)
    );

    let intermediate = consolidated_path(output, options.format);
    FileManager::write_to_file(&intermediate, &consolidated)?;
    info!("Consolidated document saved: {}", intermediate.display());

    if options.skip_remote {
        info!("Skipping remote generation");
        return Ok(intermediate);
    }
    let generator = generator.ok_or_else(|| anyhow!("No text generator configured for summary generation"))?;

    let content = generator.generate(&consolidated, &options.language).await?;
    let header = format!(
        "# Study Material - Playlist\n**Generated at:** {}\n**Source:** {}\n\n---\n\n",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        subtitle_dir.display()
    );
    FileManager::write_to_file(output, &format!("{}{}", header, content))?;
    info!("Study material saved: {} ({} characters)", output.display(), content.chars().count());
    Ok(output.to_path_buf())
}
