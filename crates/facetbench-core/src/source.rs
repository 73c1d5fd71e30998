//! Record sources feeding the index build.
//!
//! - [`JsonRecordSource`]: isbndb-style JSON exports (a file or a directory of them)
//! - [`VecRecordSource`]: in-memory records, mostly for tests
//! - [`SyntheticSource`]: deterministic generated books with skewed author popularity
use serde::Deserialize;
use std::collections::VecDeque;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use twox_hash::XxHash64;

use crate::error::{Error, Result};
use crate::traits::RecordSource;
use crate::types::{Author, Book};

#[derive(Debug, Deserialize)]
struct IsbnDbBook {
    #[serde(default)]
    isbn13: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    publisher_text: Option<String>,
    #[serde(default)]
    author_data: Vec<IsbnDbAuthor>,
}

#[derive(Debug, Deserialize)]
struct IsbnDbAuthor {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Streams books from `.json` (array of books) and `.jsonl` (one book per
/// line) files. Files are read one at a time, in path order.
pub struct JsonRecordSource {
    files: VecDeque<PathBuf>,
    pending: VecDeque<Book>,
    next_id: u64,
}

impl JsonRecordSource {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::SourceUnavailable(format!("{} does not exist", path.display())));
        }
        let files = if path.is_dir() { list_json_files(path) } else { vec![path.to_path_buf()] };
        if files.is_empty() {
            tracing::warn!(dir = %path.display(), "no .json or .jsonl files found");
        }
        Ok(Self { files: files.into(), pending: VecDeque::new(), next_id: 0 })
    }

    fn load_next_file(&mut self) -> Result<bool> {
        let Some(file) = self.files.pop_front() else { return Ok(false) };
        let content = fs::read_to_string(&file)
            .map_err(|e| Error::SourceUnavailable(format!("{}: {}", file.display(), e)))?;
        let parse_err = |e: serde_json::Error| Error::SourceUnavailable(format!("{}: {}", file.display(), e));
        let raw: Vec<IsbnDbBook> = if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            content
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(serde_json::from_str)
                .collect::<std::result::Result<_, _>>()
                .map_err(parse_err)?
        } else {
            serde_json::from_str(&content).map_err(parse_err)?
        };
        tracing::debug!(file = %file.display(), books = raw.len(), "loaded record file");
        for book in raw {
            let id = self.next_id;
            self.next_id += 1;
            self.pending.push_back(convert(id, book));
        }
        Ok(true)
    }
}

impl RecordSource for JsonRecordSource {
    fn next_batch(&mut self, max: usize) -> Result<Option<Vec<Book>>> {
        while self.pending.len() < max {
            if !self.load_next_file()? {
                break;
            }
        }
        if self.pending.is_empty() {
            return Ok(None);
        }
        let take = max.min(self.pending.len());
        Ok(Some(self.pending.drain(..take).collect()))
    }
}

fn convert(id: u64, raw: IsbnDbBook) -> Book {
    let mut authors: Vec<Author> = Vec::with_capacity(raw.author_data.len());
    for a in raw.author_data {
        let name = a.name.unwrap_or_default();
        let author_id = a.id.unwrap_or_else(|| name.clone());
        if authors.iter().any(|x| x.id == author_id) {
            continue;
        }
        authors.push(Author { id: author_id, name });
    }
    Book {
        id,
        isbn: raw.isbn13.unwrap_or_default(),
        title: raw.title.unwrap_or_default(),
        publisher: raw.publisher_text.unwrap_or_default(),
        authors,
    }
}

fn list_json_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")))
        .collect();
    files.sort();
    files
}

#[derive(Debug, Default)]
pub struct VecRecordSource {
    books: VecDeque<Book>,
}

impl VecRecordSource {
    pub fn new(books: Vec<Book>) -> Self {
        Self { books: books.into() }
    }
}

impl RecordSource for VecRecordSource {
    fn next_batch(&mut self, max: usize) -> Result<Option<Vec<Book>>> {
        if self.books.is_empty() {
            return Ok(None);
        }
        let take = max.min(self.books.len());
        Ok(Some(self.books.drain(..take).collect()))
    }
}

const SURNAMES: [&str; 16] = [
    "Bittinger", "Atwood", "Baldwin", "Calvino", "Dickens", "Eco", "Faulkner", "Garcia",
    "Hesse", "Ishiguro", "Joyce", "Kafka", "Lessing", "Morrison", "Nabokov", "Orwell",
];
const GIVEN_NAMES: [&str; 8] = ["Marvin L.", "Margaret", "James", "Italo", "Charles", "Umberto", "William", "Gabriel"];

/// Deterministic book generator. Author popularity is skewed so that facet
/// counts have a clear head and a long tail.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    total: u64,
    next: u64,
    author_pool: u64,
    seed: u64,
}

impl SyntheticSource {
    pub fn new(total: u64, author_pool: u64, seed: u64) -> Self {
        Self { total, next: 0, author_pool: author_pool.max(1), seed }
    }

    pub fn author_name(index: u64) -> String {
        let s = SURNAMES.len() as u64;
        let g = GIVEN_NAMES.len() as u64;
        let base = format!("{}, {}", SURNAMES[(index % s) as usize], GIVEN_NAMES[((index / s) % g) as usize]);
        match index / (s * g) {
            0 => base,
            n => format!("{base} {}", n + 1),
        }
    }

    fn hash(&self, parts: (u64, u64)) -> u64 {
        let mut hasher = XxHash64::with_seed(self.seed);
        parts.hash(&mut hasher);
        hasher.finish()
    }

    fn book(&self, id: u64) -> Book {
        let h = self.hash((id, u64::MAX));
        let author_count = h % 3 + (h >> 60) % 2;
        let mut authors: Vec<Author> = Vec::new();
        for slot in 0..author_count {
            let ah = self.hash((id, slot));
            let pick = (ah % self.author_pool) * ((ah >> 32) % self.author_pool) / self.author_pool;
            if authors.iter().any(|a| a.id == pick.to_string()) {
                continue;
            }
            authors.push(Author { id: pick.to_string(), name: Self::author_name(pick) });
        }
        Book {
            id,
            isbn: format!("978{:010}", id),
            title: format!("Volume {} of the collected works", id),
            publisher: format!("Publisher {}", h % 7),
            authors,
        }
    }
}

impl RecordSource for SyntheticSource {
    fn next_batch(&mut self, max: usize) -> Result<Option<Vec<Book>>> {
        if self.next >= self.total {
            return Ok(None);
        }
        let end = (self.next + max as u64).min(self.total);
        let batch = (self.next..end).map(|id| self.book(id)).collect();
        self.next = end;
        Ok(Some(batch))
    }
}
