/// Parser for recipes exported from Google Drive as HTML
///
/// The export is a flat run of paragraphs: a title, a marker paragraph
/// introducing the ingredient list, one paragraph per ingredient, a marker
/// paragraph introducing the instructions, then free text. Pictures may
/// appear anywhere as `<img alt=NAME src=URL>`.
///
/// Parsing is one forward pass over the tokenizer output. Pictures are
/// downloaded afterwards, and only when the document was well formed.
use crate::{
    config::DriveConfig,
    error::{AppError, AppResult},
    recipes::{Ingredient, Recipe, RecipeId, RecipePicture},
    sources::images::ImageFetcher,
};
use html5gum::{Token, Tokenizer};
use lazy_static::lazy_static;
use regex::Regex;
use std::{borrow::Cow, collections::HashMap, io::Read, sync::Arc};
use tracing::{debug, warn};

lazy_static! {
    static ref LEADING_AMOUNT: Regex = Regex::new(r"^[0-9]+(?:[.,][0-9]+)?").unwrap();
    static ref WORD: Regex = Regex::new(r"[a-zA-ZßäöüÄÖÜ]+").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Title,
    Ingredients,
    Description,
}

/// Picture referenced by the document, not yet downloaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub name: String,
    pub url: String,
}

/// Recipe structure recovered from the document
#[derive(Debug)]
pub struct ParsedDocument {
    pub recipe: Recipe,
    pub images: Vec<ImageRef>,
}

struct DocumentBuilder<'a> {
    markers: &'a DriveConfig,
    section: Section,
    recipe: Recipe,
    description: String,
    images: Vec<ImageRef>,
    /// Inside <style> or <script>
    raw_text_depth: usize,
}

impl<'a> DocumentBuilder<'a> {
    fn new(markers: &'a DriveConfig, id: RecipeId) -> Self {
        Self {
            markers,
            section: Section::Title,
            recipe: Recipe::new(id),
            description: String::new(),
            images: Vec::new(),
            raw_text_depth: 0,
        }
    }

    fn enter(&mut self, section: Section) {
        debug!("Drive parser: {:?} -> {:?}", self.section, section);
        self.section = section;
    }

    fn start_tag(&mut self, name: &str, alt: Option<String>, src: Option<String>) {
        match name {
            "style" | "script" => self.raw_text_depth += 1,
            "p" if self.section == Section::Description && !self.description.is_empty() => {
                self.description.push('\n');
            }
            "img" => self.image(alt, src),
            _ => {}
        }
    }

    fn end_tag(&mut self, name: &str) {
        if matches!(name, "style" | "script") {
            self.raw_text_depth = self.raw_text_depth.saturating_sub(1);
        }
    }

    fn text(&mut self, raw: &str) {
        if self.raw_text_depth > 0 {
            return;
        }

        let text = raw.trim();
        if text.is_empty() {
            return;
        }

        if text.starts_with(self.markers.ingredients_marker.as_str()) {
            self.enter(Section::Ingredients);
            return;
        }
        if text.starts_with(self.markers.instructions_marker.as_str()) {
            self.enter(Section::Description);
            return;
        }

        match self.section {
            // Last text run before the ingredients marker wins
            Section::Title => self.recipe.name = text.to_string(),
            Section::Ingredients => self.recipe.ingredients.push(parse_ingredient(text)),
            Section::Description => self.description.push_str(raw),
        }
    }

    fn image(&mut self, alt: Option<String>, src: Option<String>) {
        let Some(url) = src.filter(|s| !s.trim().is_empty()) else {
            debug!("Drive parser: skipping <img> without src");
            return;
        };

        let name = alt
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| format!("image-{}", self.images.len() + 1));

        // A repeated name keeps one entry in pictureLink; the later image wins
        if let Some(existing) = self.images.iter_mut().find(|i| i.name == name) {
            existing.url = url;
            return;
        }

        self.recipe.picture_links.push(name.clone());
        self.images.push(ImageRef { name, url });
    }

    fn finish(mut self) -> AppResult<ParsedDocument> {
        self.recipe.description = self.description;

        if self.section != Section::Description {
            debug!("Drive parser: document ended in {:?}", self.section);
            return Err(AppError::MalformedRecipe);
        }

        Ok(ParsedDocument {
            recipe: self.recipe,
            images: self.images,
        })
    }
}

fn lossy(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// Split one ingredient line into amount, unit and name
///
/// "150g Something" gives 150 / "g" / "Something"; "Flour" has neither
/// amount nor unit.
pub fn parse_ingredient(line: &str) -> Ingredient {
    let line = line.trim();
    let amount = LEADING_AMOUNT
        .find(line)
        .and_then(|m| m.as_str().replace(',', ".").parse::<f64>().ok());

    let words: Vec<&str> = WORD.find_iter(line).map(|m| m.as_str()).collect();
    let (unit, name) = match words.as_slice() {
        [] => (String::new(), String::new()),
        [name] => (String::new(), name.to_string()),
        [unit, rest @ ..] => (unit.to_string(), rest.join(" ")),
    };

    Ingredient { name, amount, unit }
}

/// Drive export parser bound to a marker configuration and picture source
pub struct DriveRecipeParser {
    markers: DriveConfig,
    fetcher: Arc<dyn ImageFetcher>,
}

impl DriveRecipeParser {
    pub fn new(markers: DriveConfig, fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self { markers, fetcher }
    }

    /// Recover the recipe structure without downloading pictures
    ///
    /// Input is tokenized as bytes; text that is not UTF-8 is decoded lossily.
    pub fn parse_document(&self, html: &[u8], id: RecipeId) -> AppResult<ParsedDocument> {
        let mut builder = DocumentBuilder::new(&self.markers, id);

        for token in Tokenizer::new(html).infallible() {
            match token {
                Token::StartTag(tag) => {
                    let attribute = |key: &str| {
                        tag.attributes
                            .iter()
                            .find(|(k, _)| k.as_slice() == key.as_bytes())
                            .map(|(_, v)| lossy(v).into_owned())
                    };
                    let alt = attribute("alt");
                    let src = attribute("src");
                    builder.start_tag(&lossy(&tag.name), alt, src);
                }
                Token::EndTag(tag) => builder.end_tag(&lossy(&tag.name)),
                Token::String(text) => builder.text(&lossy(&text)),
                Token::Error(e) => debug!("Drive parser: recoverable HTML error: {:?}", e),
                _ => {}
            }
        }

        builder.finish()
    }

    /// Parse a document and download its pictures
    ///
    /// A failed download leaves that picture's payload empty instead of
    /// failing the import. Only failures of the reader itself discard the
    /// document.
    pub async fn parse_recipe<R: Read>(
        &self,
        mut input: R,
        id: RecipeId,
    ) -> AppResult<(Recipe, HashMap<String, RecipePicture>)> {
        let mut html = Vec::new();
        input.read_to_end(&mut html)?;

        let ParsedDocument { recipe, images } = self.parse_document(&html, id)?;

        let mut pictures = HashMap::with_capacity(images.len());
        for image in images {
            let payload = match self.fetcher.fetch_data_uri(&image.url).await {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("Failed to download picture {}: {}", image.name, e);
                    String::new()
                }
            };

            pictures.insert(
                image.name.clone(),
                RecipePicture {
                    id: recipe.id.clone(),
                    name: image.name,
                    picture: payload,
                },
            );
        }

        Ok((recipe, pictures))
    }
}
