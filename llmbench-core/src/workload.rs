//! Workload items and the sources that produce them.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read workload file `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("workload file `{0}` contains no items")]
    EmptyFile(PathBuf),

    #[error("workload is empty but {needed} items are required")]
    Empty { needed: usize },
}

const DEFAULT_PROMPTS: [&str; 5] = [
    "Hello, how are you?",
    "What is the capital of France?",
    "Explain quantum computing in simple terms.",
    "Write a short poem about the ocean.",
    "What are the benefits of exercise?",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadInput {
    Prompt(String),
    Messages(Vec<ChatMessage>),
}

/// One request's input. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadItem {
    pub id: String,
    pub input: WorkloadInput,
    /// Per-item output cap; `None` defers to the target's default.
    pub max_tokens: Option<u32>,
}

impl WorkloadItem {
    pub fn prompt(id: impl Into<String>, prompt: impl Into<String>, max_tokens: Option<u32>) -> Self {
        Self {
            id: id.into(),
            input: WorkloadInput::Prompt(prompt.into()),
            max_tokens,
        }
    }

    pub fn chat(id: impl Into<String>, messages: Vec<ChatMessage>, max_tokens: Option<u32>) -> Self {
        Self {
            id: id.into(),
            input: WorkloadInput::Messages(messages),
            max_tokens,
        }
    }

    /// The item as chat messages. A bare prompt becomes a single `user` message; an empty prompt
    /// yields no messages.
    pub fn to_messages(&self) -> Cow<'_, [ChatMessage]> {
        match &self.input {
            WorkloadInput::Messages(messages) => Cow::Borrowed(messages.as_slice()),
            WorkloadInput::Prompt(prompt) if prompt.is_empty() => Cow::Borrowed(&[]),
            WorkloadInput::Prompt(prompt) => Cow::Owned(vec![ChatMessage::user(prompt.as_str())]),
        }
    }

    fn with_id(&self, id: String) -> Self {
        Self {
            id,
            input: self.input.clone(),
            max_tokens: self.max_tokens,
        }
    }
}

pub trait WorkloadSource {
    fn load(&self) -> Result<Vec<WorkloadItem>>;
}

/// Plain-text (one prompt per line) or JSONL workload file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    default_max_tokens: Option<u32>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, default_max_tokens: Option<u32>) -> Self {
        Self {
            path: path.into(),
            default_max_tokens,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WorkloadSource for FileSource {
    fn load(&self) -> Result<Vec<WorkloadItem>> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| Error::Io {
            path: self.path.clone(),
            source,
        })?;

        let items = parse_lines(&text, self.default_max_tokens);
        if items.is_empty() {
            return Err(Error::EmptyFile(self.path.clone()));
        }
        tracing::debug!(path = %self.path.display(), items = items.len(), "loaded workload");
        Ok(items)
    }
}

/// Built-in prompts, cycled to `count` items.
#[derive(Debug, Clone, Copy)]
pub struct DefaultSource {
    pub count: usize,
    pub max_tokens: Option<u32>,
}

impl WorkloadSource for DefaultSource {
    fn load(&self) -> Result<Vec<WorkloadItem>> {
        Ok((0..self.count)
            .map(|i| {
                WorkloadItem::prompt(
                    request_id(i + 1),
                    DEFAULT_PROMPTS[i % DEFAULT_PROMPTS.len()],
                    self.max_tokens,
                )
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct JsonLine {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    messages: Vec<ChatMessage>,
    #[serde(default)]
    max_tokens: Option<u32>,
}

fn parse_lines(text: &str, default_max_tokens: Option<u32>) -> Vec<WorkloadItem> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(idx, line)| parse_line(line, idx + 1, default_max_tokens))
        .collect()
}

fn parse_line(line: &str, n: usize, default_max_tokens: Option<u32>) -> WorkloadItem {
    if line.starts_with('{')
        && let Ok(parsed) = serde_json::from_str::<JsonLine>(line)
    {
        let id = parsed
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| request_id(n));
        let max_tokens = parsed
            .max_tokens
            .filter(|&m| m > 0)
            .or(default_max_tokens);
        let input = if parsed.messages.is_empty() {
            WorkloadInput::Prompt(parsed.prompt.unwrap_or_default())
        } else {
            WorkloadInput::Messages(parsed.messages)
        };
        return WorkloadItem {
            id,
            input,
            max_tokens,
        };
    }

    WorkloadItem::prompt(request_id(n), line, default_max_tokens)
}

fn request_id(n: usize) -> String {
    format!("req-{n}")
}

/// Produce exactly `needed` items, replaying `items` in order with fresh ids `req-<position+1>`
/// once the supply runs out.
pub fn expand_cyclic(items: Vec<WorkloadItem>, needed: usize) -> Result<Vec<WorkloadItem>> {
    if items.len() >= needed {
        let mut items = items;
        items.truncate(needed);
        return Ok(items);
    }
    if items.is_empty() {
        return Err(Error::Empty { needed });
    }

    let supplied = items.len();
    let mut out = items;
    out.reserve(needed - supplied);
    for pos in supplied..needed {
        let replay = out[pos % supplied].with_id(request_id(pos + 1));
        out.push(replay);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    fn write_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap_or_else(|e| panic!("{e}"));
        file.write_all(contents.as_bytes())
            .unwrap_or_else(|e| panic!("{e}"));
        file
    }

    #[test]
    fn loads_plain_text_prompts() {
        let file = write_file("first prompt\n\n   \nsecond prompt\n");
        let items = FileSource::new(file.path(), Some(128))
            .load()
            .unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(
            items,
            vec![
                WorkloadItem::prompt("req-1", "first prompt", Some(128)),
                WorkloadItem::prompt("req-2", "second prompt", Some(128)),
            ]
        );
    }

    #[test]
    fn loads_jsonl_items() {
        let file = write_file(concat!(
            r#"{"id":"a","prompt":"p1","max_tokens":16}"#,
            "\n",
            r#"{"messages":[{"role":"system","content":"s"},{"role":"user","content":"u"}]}"#,
            "\n",
            r#"{"prompt":"p3","max_tokens":0}"#,
            "\n",
        ));
        let items = FileSource::new(file.path(), Some(256))
            .load()
            .unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(items[0], WorkloadItem::prompt("a", "p1", Some(16)));
        assert_eq!(items[1].id, "req-2");
        assert_eq!(items[1].max_tokens, Some(256));
        assert_eq!(items[1].to_messages().len(), 2);
        assert_eq!(items[2], WorkloadItem::prompt("req-3", "p3", Some(256)));
    }

    #[test]
    fn broken_json_line_is_a_prompt() {
        let file = write_file("{not json at all\n");
        let items = FileSource::new(file.path(), None)
            .load()
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(
            items,
            vec![WorkloadItem::prompt("req-1", "{not json at all", None)]
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let err = FileSource::new(dir.path().join("missing.txt"), None).load();
        assert!(matches!(err, Err(Error::Io { .. })));
    }

    #[test]
    fn blank_file_is_rejected() {
        let file = write_file("\n  \n");
        let err = FileSource::new(file.path(), None).load();
        assert!(matches!(err, Err(Error::EmptyFile(_))));
    }

    #[test]
    fn default_source_cycles_prompts() {
        let items = DefaultSource {
            count: 7,
            max_tokens: Some(64),
        }
        .load()
        .unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(items.len(), 7);
        assert_eq!(items[6].id, "req-7");
        assert_eq!(items[5].input, items[0].input);
    }

    #[test]
    fn to_messages_wraps_prompt() {
        let item = WorkloadItem::prompt("req-1", "hi", None);
        assert_eq!(item.to_messages().into_owned(), vec![ChatMessage::user("hi")]);
        assert!(
            WorkloadItem::prompt("req-1", "", None)
                .to_messages()
                .is_empty()
        );
    }

    #[test]
    fn expand_cyclic_replays_with_fresh_ids() {
        let items = vec![
            WorkloadItem::prompt("a", "one", None),
            WorkloadItem::prompt("b", "two", None),
        ];
        let out = expand_cyclic(items, 5).unwrap_or_else(|e| panic!("{e}"));

        let ids: Vec<_> = out.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "req-3", "req-4", "req-5"]);
        assert_eq!(out[2].input, out[0].input);
        assert_eq!(out[3].input, out[1].input);
    }

    #[test]
    fn expand_cyclic_truncates_surplus() {
        let items = vec![
            WorkloadItem::prompt("a", "one", None),
            WorkloadItem::prompt("b", "two", None),
        ];
        let out = expand_cyclic(items, 1).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "a");
    }

    #[test]
    fn expand_cyclic_of_nothing_fails() {
        assert!(matches!(
            expand_cyclic(Vec::new(), 3),
            Err(Error::Empty { needed: 3 })
        ));
        assert!(
            expand_cyclic(Vec::new(), 0)
                .unwrap_or_else(|e| panic!("{e}"))
                .is_empty()
        );
    }
}
