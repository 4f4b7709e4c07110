use serde::{Deserialize, Serialize};

/// One slide of a deck.
///
/// `number` is the slide's position. Decks produced by a merge always carry
/// the integers `1..=len`; decks handed in from outside may not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideRecord {
    #[serde(rename = "slide_number")]
    pub number: f64,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_keyword: Option<String>,
}

impl SlideRecord {
    pub fn new(number: f64, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            number,
            title: title.into(),
            content: content.into(),
            narration: None,
            image_keyword: None,
        }
    }

    pub fn with_narration(mut self, narration: impl Into<String>) -> Self {
        self.narration = Some(narration.into());
        self
    }
}

/// Ordered slides, ascending by `number`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlideDeck {
    slides: Vec<SlideRecord>,
}

impl SlideDeck {
    pub fn new(slides: Vec<SlideRecord>) -> Self {
        Self { slides }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn slides(&self) -> &[SlideRecord] {
        &self.slides
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SlideRecord> {
        self.slides.iter()
    }

    /// True when the slide numbers are exactly `1..=len` in order.
    pub fn is_contiguous(&self) -> bool {
        self.slides
            .iter()
            .enumerate()
            .all(|(i, slide)| slide.number == (i + 1) as f64)
    }

    /// Copy of the deck with narration dropped, used as model context so the
    /// model only repopulates narration when asked to.
    pub fn without_narration(&self) -> Self {
        let slides = self
            .slides
            .iter()
            .cloned()
            .map(|mut slide| {
                slide.narration = None;
                slide
            })
            .collect();
        Self { slides }
    }
}

impl<'a> IntoIterator for &'a SlideDeck {
    type Item = &'a SlideRecord;
    type IntoIter = std::slice::Iter<'a, SlideRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.slides.iter()
    }
}

impl From<Vec<SlideRecord>> for SlideDeck {
    fn from(slides: Vec<SlideRecord>) -> Self {
        Self::new(slides)
    }
}

/// A proposed change to a deck.
///
/// The sign and fractional part of `number` carry the intent: negative
/// deletes, fractional inserts, integral replaces (or creates when nothing
/// sits at that position).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideOperation {
    #[serde(rename = "slide_number")]
    pub number: f64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_keyword: Option<String>,
}

impl SlideOperation {
    pub fn new(number: f64, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            number,
            title: title.into(),
            content: content.into(),
            narration: None,
            image_keyword: None,
        }
    }

    /// Operation removing the slide currently numbered `number`.
    pub fn delete(number: u32) -> Self {
        Self::new(-f64::from(number), "", "")
    }

    pub fn with_narration(mut self, narration: impl Into<String>) -> Self {
        self.narration = Some(narration.into());
        self
    }

    /// The record this operation produces, placed at `number`.
    pub fn to_record(&self, number: f64) -> SlideRecord {
        SlideRecord {
            number,
            title: self.title.clone(),
            content: self.content.clone(),
            narration: self.narration.clone(),
            image_keyword: self.image_keyword.clone(),
        }
    }
}

/// A whitespace-bounded slice of a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub index: usize,
    pub text: String,
    pub word_count: usize,
}
