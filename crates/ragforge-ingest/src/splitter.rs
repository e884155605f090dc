use crate::types::Chunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitterConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks. Must be less than `chunk_size`.
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 4000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> SplitterConfig {
        self.config
    }

    /// Split each element independently, keeping element order.
    #[must_use]
    pub fn split_elements<S: AsRef<str>>(&self, elements: &[S]) -> Vec<Chunk> {
        elements
            .iter()
            .enumerate()
            .flat_map(|(element_index, element)| {
                self.split(element.as_ref())
                    .into_iter()
                    .enumerate()
                    .map(move |(chunk_index, text)| Chunk {
                        text,
                        element_index,
                        chunk_index,
                    })
            })
            .collect()
    }

    /// Character windows of `chunk_size` advancing by `chunk_size - chunk_overlap`.
    /// The last window ends exactly at the end of `text`.
    #[must_use]
    pub fn split(&self, text: &str) -> Vec<String> {
        split_chars(text, self.config.chunk_size, self.config.chunk_overlap)
    }
}

fn split_chars(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    let chunk_size = chunk_size.max(1);
    let step = chunk_size.saturating_sub(overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}
