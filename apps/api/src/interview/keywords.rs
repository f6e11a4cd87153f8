//! Keyword ranking and mining.
//!
//! `rank` is the pure leaf: it merges the four keyword sources into one
//! priority-ordered sequence. `mine_keyword_sources` is the plumbing around
//! it, deriving each source list from the start-request fields through the
//! oracle.

use std::collections::HashSet;

use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::interview::prompts::{
    JD_KEYWORDS_TEMPLATE, MINING_SYSTEM, RESUME_KEYWORDS_TEMPLATE, TITLE_KEYWORDS_TEMPLATE,
};
use crate::llm_client::{extract_json_object, Oracle};

/// The four keyword source lists fed to the ranker, each already deduplicated
/// and in extraction order.
#[derive(Debug, Default, Clone)]
pub struct KeywordSources {
    pub resume: Vec<String>,
    pub jd: Vec<String>,
    pub explicit: Vec<String>,
    pub title: Vec<String>,
}

/// Case-insensitive identity for deduplication ("Python" and "python" are
/// the same keyword).
fn normalize(keyword: &str) -> String {
    keyword.trim().to_lowercase()
}

/// Merges the four sources into one priority-ordered sequence.
///
/// Bucket precedence, highest first:
/// 1. explicit keywords (user override),
/// 2. keywords confirmed by both JD and resume,
/// 3. resume-only keywords (claimed but unconfirmed),
/// 4. job-title keywords (role-generic),
/// 5. JD-only keywords (gap skills).
///
/// Within a bucket, source order is preserved; a keyword already emitted by
/// an earlier bucket is dropped. All-empty inputs yield an empty sequence —
/// callers must treat that as "no questions possible".
pub fn rank(sources: &KeywordSources) -> Vec<String> {
    let resume_keys: Vec<String> = sources.resume.iter().map(|k| normalize(k)).collect();
    let jd_keys: Vec<String> = sources.jd.iter().map(|k| normalize(k)).collect();

    let mut seen: HashSet<String> = HashSet::new();
    let mut ranked: Vec<String> = Vec::new();
    let push = |ranked: &mut Vec<String>, seen: &mut HashSet<String>, kw: &str| {
        let key = normalize(kw);
        if !key.is_empty() && seen.insert(key) {
            ranked.push(kw.trim().to_string());
        }
    };

    for kw in &sources.explicit {
        push(&mut ranked, &mut seen, kw);
    }
    // Confirmed skills: iterate the JD side so the employer's emphasis order wins.
    for (kw, key) in sources.jd.iter().zip(&jd_keys) {
        if resume_keys.contains(key) {
            push(&mut ranked, &mut seen, kw);
        }
    }
    for (kw, key) in sources.resume.iter().zip(&resume_keys) {
        if !jd_keys.contains(key) {
            push(&mut ranked, &mut seen, kw);
        }
    }
    for kw in &sources.title {
        push(&mut ranked, &mut seen, kw);
    }
    for (kw, key) in sources.jd.iter().zip(&jd_keys) {
        if !resume_keys.contains(key) {
            push(&mut ranked, &mut seen, kw);
        }
    }

    ranked
}

/// Raw fields of a start request that keyword sources are mined from.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeywordInputs {
    pub resume_text: Option<String>,
    pub job_description: Option<String>,
    /// Comma-separated explicit keyword list (ASCII or fullwidth comma).
    pub keywords: Option<String>,
    pub job_title: Option<String>,
}

/// Derives the four keyword source lists from the start-request fields.
/// Text fields go through the oracle; the explicit list is split locally.
/// A source whose extraction comes back unusable contributes an empty list
/// rather than failing the whole start.
pub async fn mine_keyword_sources(
    oracle: &dyn Oracle,
    inputs: &KeywordInputs,
) -> Result<KeywordSources, AppError> {
    let mut sources = KeywordSources::default();

    if let Some(resume_text) = non_empty(&inputs.resume_text) {
        let prompt = RESUME_KEYWORDS_TEMPLATE.replace("{resume_text}", resume_text);
        sources.resume = mine_one(oracle, &prompt, "resume").await;
    }
    if let Some(jd) = non_empty(&inputs.job_description) {
        let prompt = JD_KEYWORDS_TEMPLATE.replace("{job_description}", jd);
        sources.jd = mine_one(oracle, &prompt, "job_description").await;
    }
    if let Some(list) = non_empty(&inputs.keywords) {
        sources.explicit = split_explicit(list);
    }
    if let Some(title) = non_empty(&inputs.job_title) {
        let prompt = TITLE_KEYWORDS_TEMPLATE.replace("{job_title}", title);
        sources.title = mine_one(oracle, &prompt, "job_title").await;
    }

    info!(
        "Mined keyword sources: resume={}, jd={}, explicit={}, title={}",
        sources.resume.len(),
        sources.jd.len(),
        sources.explicit.len(),
        sources.title.len()
    );
    Ok(sources)
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

async fn mine_one(oracle: &dyn Oracle, prompt: &str, source: &str) -> Vec<String> {
    match oracle.complete(prompt, MINING_SYSTEM).await {
        Ok(raw) => {
            let flattened = flatten_categorized(&raw);
            if flattened.is_empty() {
                warn!("Keyword mining for {source} produced no usable output");
            }
            flattened
        }
        Err(e) => {
            warn!("Keyword mining for {source} failed: {e}");
            Vec::new()
        }
    }
}

/// Parses the mining output — a JSON object mapping category names to keyword
/// arrays — and flattens the category values in order.
fn flatten_categorized(raw: &str) -> Vec<String> {
    let Some(json) = extract_json_object(raw) else {
        return Vec::new();
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(json) else {
        return Vec::new();
    };
    let Some(map) = value.as_object() else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for category in map.values() {
        if let Some(items) = category.as_array() {
            for item in items {
                if let Some(kw) = item.as_str() {
                    let kw = kw.trim();
                    if !kw.is_empty() {
                        out.push(kw.to_string());
                    }
                }
            }
        }
    }
    out
}

/// Splits a user-supplied keyword list on ASCII or fullwidth commas.
fn split_explicit(list: &str) -> Vec<String> {
    list.split(|c| c == ',' || c == '，')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(
        resume: &[&str],
        jd: &[&str],
        explicit: &[&str],
        title: &[&str],
    ) -> KeywordSources {
        let owned = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect();
        KeywordSources {
            resume: owned(resume),
            jd: owned(jd),
            explicit: owned(explicit),
            title: owned(title),
        }
    }

    #[test]
    fn test_rank_bucket_precedence() {
        let ranked = rank(&sources(
            &["Python", "Docker", "FAISS"],
            &["Docker", "Kubernetes"],
            &["Redis"],
            &["SQL"],
        ));
        // explicit, jd∩resume, resume−jd, title, jd−resume
        assert_eq!(
            ranked,
            vec!["Redis", "Docker", "Python", "FAISS", "SQL", "Kubernetes"]
        );
    }

    #[test]
    fn test_rank_has_no_duplicates_case_insensitive() {
        let ranked = rank(&sources(
            &["python", "Docker"],
            &["Python", "Docker"],
            &["PYTHON"],
            &["docker"],
        ));
        assert_eq!(ranked, vec!["PYTHON", "Docker"]);
    }

    #[test]
    fn test_rank_all_empty_inputs_is_empty() {
        assert!(rank(&KeywordSources::default()).is_empty());
    }

    #[test]
    fn test_rank_is_idempotent_over_same_inputs() {
        let input = sources(&["A", "B"], &["B", "C"], &["D"], &["E"]);
        assert_eq!(rank(&input), rank(&input));
    }

    #[test]
    fn test_rank_preserves_source_order_within_bucket() {
        let ranked = rank(&sources(&[], &["Kafka", "Redis", "Milvus"], &[], &[]));
        assert_eq!(ranked, vec!["Kafka", "Redis", "Milvus"]);
    }

    #[test]
    fn test_flatten_categorized_keeps_category_values() {
        let raw = r#"分析结果如下：
        {"编程语言": ["Python", "Rust"], "工具": ["Docker"]}"#;
        let flattened = flatten_categorized(raw);
        assert_eq!(flattened.len(), 3);
        assert!(flattened.contains(&"Docker".to_string()));
    }

    #[test]
    fn test_flatten_categorized_rejects_non_object() {
        assert!(flatten_categorized("no json at all").is_empty());
        assert!(flatten_categorized("[1, 2, 3]").is_empty());
    }

    #[test]
    fn test_split_explicit_handles_both_comma_styles() {
        assert_eq!(
            split_explicit("Docker, Kubernetes，Redis"),
            vec!["Docker", "Kubernetes", "Redis"]
        );
        assert_eq!(split_explicit(" , ，"), Vec::<String>::new());
    }
}
