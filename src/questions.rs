//! Question corpus mapping.
//!
//! The corpus is either a JSON array of objects or JSON Lines. Each record is
//! linked to its database by `db_id`. Field names differ between BIRD
//! releases, so each field accepts a few spellings:
//!
//! | Field         | Accepted keys                                          |
//! |---------------|--------------------------------------------------------|
//! | id            | `id` (else `bird_NNNNNN` from the record position)     |
//! | question      | `question`, `query`                                    |
//! | sql           | `sql`, `SQL`, `sql_query`, `clean_up_sql`, `preprocess_sql` |
//! | difficulty    | `difficulty`, `difficulty_tier` (else `unknown`)       |
//! | original id   | `question_id`, `instance_id`                           |
//!
//! Records without a database id or question text are skipped and logged.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::source::domain;

const ID_KEYS: &[&str] = &["id"];
const QUESTION_KEYS: &[&str] = &["question", "query"];
const SQL_KEYS: &[&str] = &["sql", "SQL", "sql_query", "clean_up_sql", "preprocess_sql"];
const DIFFICULTY_KEYS: &[&str] = &["difficulty", "difficulty_tier"];
const ORIGINAL_ID_KEYS: &[&str] = &["question_id", "instance_id"];

const UNKNOWN_DIFFICULTY: &str = "unknown";

/// One benchmark question linked to its source database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub db_id: String,
    pub question: String,
    pub evidence: Option<String>,
    /// Gold SQL.
    pub sql: String,
    pub difficulty: String,
    pub domain: String,
    /// Identifier used by the corpus itself, if any.
    pub original_id: Option<String>,
}

/// The corpus file could not be read at all.
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("failed to read question corpus {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("question corpus {} is not a JSON array: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Result of mapping a corpus.
#[derive(Debug, Clone, Default)]
pub struct MappedQuestions {
    pub questions: Vec<Question>,
    /// Records that were skipped.
    pub skipped: usize,
}

/// Read and map a corpus file.
///
/// `domains` maps database ids to their classified domain; questions for
/// databases not in the map are classified from the id alone.
pub fn load_questions(
    path: &Path,
    domains: &HashMap<String, String>,
) -> Result<MappedQuestions, CorpusError> {
    let text = fs::read_to_string(path).map_err(|source| CorpusError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mapped = parse_corpus(&text, domains).map_err(|source| CorpusError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        path = %path.display(),
        questions = mapped.questions.len(),
        skipped = mapped.skipped,
        "mapped question corpus"
    );
    Ok(mapped)
}

/// Map corpus text. Fails only when the text looks like a JSON array but
/// does not parse as one.
pub fn parse_corpus(
    text: &str,
    domains: &HashMap<String, String>,
) -> Result<MappedQuestions, serde_json::Error> {
    let records: Vec<Option<Json>> = if text.trim_start().starts_with('[') {
        serde_json::from_str::<Vec<Json>>(text)?
            .into_iter()
            .map(Some)
            .collect()
    } else {
        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(lineno, line)| match serde_json::from_str(line) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(line = lineno + 1, error = %e, "skipping malformed question line");
                    None
                }
            })
            .collect()
    };

    let mut out = MappedQuestions::default();
    let mut seen = HashSet::new();

    for (idx, record) in records.into_iter().enumerate() {
        let question = match record.as_ref().map(|r| map_record(idx, r, domains)) {
            Some(Ok(question)) => question,
            Some(Err(reason)) => {
                warn!(record = idx, reason, "skipping question record");
                out.skipped += 1;
                continue;
            }
            None => {
                out.skipped += 1;
                continue;
            }
        };

        if !seen.insert(question.id.clone()) {
            warn!(record = idx, id = %question.id, "skipping duplicate question id");
            out.skipped += 1;
            continue;
        }
        out.questions.push(question);
    }

    Ok(out)
}

fn map_record(
    idx: usize,
    record: &Json,
    domains: &HashMap<String, String>,
) -> Result<Question, &'static str> {
    let obj = record.as_object().ok_or("record is not an object")?;

    let db_id = field(obj, &["db_id"]).ok_or("missing db_id")?;
    let question = field(obj, QUESTION_KEYS).ok_or("missing question text")?;

    let id = field(obj, ID_KEYS).unwrap_or_else(|| format!("bird_{idx:06}"));
    let domain = domains
        .get(&db_id)
        .cloned()
        .unwrap_or_else(|| domain::classify(&db_id, &[], &[]).to_string());

    Ok(Question {
        id,
        question,
        evidence: field(obj, &["evidence"]),
        sql: field(obj, SQL_KEYS).unwrap_or_default(),
        difficulty: field(obj, DIFFICULTY_KEYS).unwrap_or_else(|| UNKNOWN_DIFFICULTY.to_string()),
        domain,
        original_id: field(obj, ORIGINAL_ID_KEYS),
        db_id,
    })
}

/// First non-empty value among `keys`. Numbers are accepted as text.
fn field(obj: &Map<String, Json>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Json::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
