//! Reference lookups answered by a language model.
//!
//! Each call shape is one prompt asking for a bare JSON object (or a bare
//! word for exact-match relevance). Replies are located with
//! [`extract_json_object`] and decoded with serde; anything else becomes a
//! [`ProviderError::Parse`].

use indexmap::IndexMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::llm::{LlmError, TextModel, extract_json_object};

use super::{
    CandidatePaper, ReferenceProvider, RelevanceMode, RelevanceQuery, RelevanceVerdict,
    SeminalWork, TopicQuery,
};

/// System prompt shared by every lookup.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

const JSON_ONLY: &str =
    "Do NOT include tick marks or any other formatting. Just ONLY provide the JSON object:";

#[derive(Deserialize)]
struct SurveyReply {
    #[serde(default)]
    papers: Vec<PaperEntry>,
}

#[derive(Deserialize)]
struct SeminalReply {
    #[serde(default)]
    seminal_works: Vec<PaperEntry>,
}

/// One listed paper. Only the title is trusted; models return metadata in
/// whatever shape they like, so it is read best-effort.
#[derive(Deserialize)]
struct PaperEntry {
    #[serde(default)]
    title: String,
    #[serde(default)]
    authors: serde_json::Value,
    #[serde(default)]
    year: serde_json::Value,
    #[serde(default)]
    doi: serde_json::Value,
    #[serde(default)]
    url: serde_json::Value,
}

impl PaperEntry {
    fn into_candidate(self) -> CandidatePaper {
        CandidatePaper {
            authors: loose_authors(&self.authors),
            year: loose_year(&self.year),
            doi: loose_string(&self.doi),
            url: loose_string(&self.url),
            ..CandidatePaper::titled(self.title.trim())
        }
    }

    fn into_seminal(self) -> SeminalWork {
        SeminalWork {
            year: loose_year(&self.year),
            ..SeminalWork::titled(self.title.trim())
        }
    }
}

/// `1998` or `"1998"`; anything else is no year.
fn loose_year(value: &serde_json::Value) -> Option<i32> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A list of names, or one string taken as a single author.
fn loose_authors(value: &serde_json::Value) -> Vec<String> {
    let names: Vec<&str> = match value {
        serde_json::Value::Array(items) => items.iter().filter_map(|v| v.as_str()).collect(),
        serde_json::Value::String(s) => vec![s.as_str()],
        _ => Vec::new(),
    };
    names
        .into_iter()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect()
}

fn loose_string(value: &serde_json::Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[derive(Deserialize)]
struct RankingReply {
    #[serde(default)]
    ranked_papers: Vec<String>,
}

#[derive(Deserialize)]
struct VerdictReply {
    relevant: bool,
}

#[derive(Deserialize)]
struct TopicEntry {
    topic: String,
}

#[derive(Deserialize)]
struct TopicsReply {
    #[serde(default)]
    foundational_topics: Vec<TopicEntry>,
}

#[derive(Deserialize)]
struct ResourceEntry {
    topic: String,
    #[serde(default)]
    resource: Option<String>,
}

/// [`ReferenceProvider`] backed by a [`TextModel`].
pub struct LlmReferenceProvider<M> {
    model: M,
    relevance_mode: RelevanceMode,
}

impl<M: TextModel> LlmReferenceProvider<M> {
    pub fn new(model: M, relevance_mode: RelevanceMode) -> Self {
        Self {
            model,
            relevance_mode,
        }
    }

    fn ask(&self, call: &'static str, subject: &str, prompt: &str) -> ProviderResult<String> {
        let reply = self
            .model
            .complete(SYSTEM_PROMPT, prompt)
            .map_err(|e| call_error(call, subject, e))?;
        debug!(call, subject, reply = %reply, "model reply");
        Ok(reply)
    }

    fn ask_json<T: DeserializeOwned>(
        &self,
        call: &'static str,
        subject: &str,
        prompt: &str,
    ) -> ProviderResult<T> {
        let reply = self.ask(call, subject, prompt)?;
        decode_json(call, subject, &reply)
    }
}

fn call_error(call: &'static str, subject: &str, err: LlmError) -> ProviderError {
    ProviderError::Call {
        call,
        subject: subject.to_string(),
        message: err.to_string(),
    }
}

fn parse_error(call: &'static str, subject: &str, message: impl Into<String>) -> ProviderError {
    ProviderError::Parse {
        call,
        subject: subject.to_string(),
        message: message.into(),
    }
}

fn decode_json<T: DeserializeOwned>(
    call: &'static str,
    subject: &str,
    reply: &str,
) -> ProviderResult<T> {
    let json = extract_json_object(reply)
        .ok_or_else(|| parse_error(call, subject, "no JSON object in reply"))?;
    serde_json::from_str(json).map_err(|e| parse_error(call, subject, e.to_string()))
}

/// Resources come back either as `{"resources": [...]}` or keyed by the
/// paper title, `{"<paper>": [...]}`.
fn decode_resources(
    paper_title: &str,
    reply: &str,
) -> ProviderResult<IndexMap<String, String>> {
    const CALL: &str = "topic-resources";
    let value: serde_json::Value = decode_json(CALL, paper_title, reply)?;
    let entries = value
        .get("resources")
        .or_else(|| value.get(paper_title))
        .cloned()
        .ok_or_else(|| parse_error(CALL, paper_title, "no resource list in reply"))?;
    let entries: Vec<ResourceEntry> = serde_json::from_value(entries)
        .map_err(|e| parse_error(CALL, paper_title, e.to_string()))?;

    Ok(entries
        .into_iter()
        .filter_map(|e| e.resource.map(|r| (e.topic, r)))
        .collect())
}

impl<M: TextModel> ReferenceProvider for LlmReferenceProvider<M> {
    fn survey_papers(&self, topic: &str, limit: usize) -> ProviderResult<Vec<CandidatePaper>> {
        let prompt = format!(
            "Provide {limit} survey papers on the topic '{topic}' in the following JSON format.\n\
             {JSON_ONLY}\n\
             {{\"papers\": [{{\"title\": \"<title>\"}}]}}"
        );
        let reply: SurveyReply = self.ask_json("survey-papers", topic, &prompt)?;
        let mut papers: Vec<CandidatePaper> = reply
            .papers
            .into_iter()
            .map(PaperEntry::into_candidate)
            .filter(|p| !p.title.is_empty())
            .collect();
        papers.truncate(limit);
        Ok(papers)
    }

    fn seminal_works(&self, paper_title: &str, limit: usize) -> ProviderResult<Vec<SeminalWork>> {
        let prompt = format!(
            "For the paper titled '{paper_title}', provide the {limit} most seminal works \
             (including papers and textbooks) in the field that are related to this paper and \
             would likely be cited. If you cannot access external databases, respond with \
             {limit} plausible seminal works based on the paper title, using the same structure.\n\
             {JSON_ONLY}\n\
             {{\"seminal_works\": [{{\"title\": \"<title>\", \"year\": 1998}}]}}"
        );
        let reply: SeminalReply = self.ask_json("seminal-works", paper_title, &prompt)?;
        let mut works: Vec<SeminalWork> = reply
            .seminal_works
            .into_iter()
            .map(PaperEntry::into_seminal)
            .filter(|w| !w.title.is_empty())
            .collect();
        works.truncate(limit);
        Ok(works)
    }

    fn rank_relevance(
        &self,
        topic: &str,
        project_summary: &str,
        candidates: &[String],
        top_n: usize,
    ) -> ProviderResult<Vec<String>> {
        let listing = candidates
            .iter()
            .map(|c| format!("- {c}"))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Assess the relevance of the following papers to the topic '{topic}' in the context \
             of this project: {project_summary}\n\
             Papers:\n{listing}\n\n\
             Return the {top_n} most relevant titles, most relevant first, copied exactly \
             from the list above.\n\
             {JSON_ONLY}\n\
             {{\"ranked_papers\": [\"<title>\"]}}"
        );
        let reply: RankingReply = self.ask_json("relevance-ranking", topic, &prompt)?;
        Ok(reply.ranked_papers)
    }

    fn judge_relevance(&self, query: &RelevanceQuery<'_>) -> ProviderResult<RelevanceVerdict> {
        let preamble = format!(
            "The project focuses on the following specialized topics: {}.\n\
             Determine if the paper titled '{}' is directly relevant and truly essential to \
             either one of these:\n\
             1. general understanding of {}\n\
             2. the project: {}.\n\n",
            query.specialized_concepts.join(", "),
            query.paper_title,
            query.topic,
            query.project_summary,
        );

        match self.relevance_mode {
            RelevanceMode::ExactMatch => {
                let prompt = format!(
                    "{preamble}Respond with ONLY the word \"yes\" (nothing other than the word) \
                     if it is relevant or beneficial to understanding the topic in general.\n\
                     Otherwise respond with ONLY the word \"no\" (nothing other than the word)."
                );
                let reply = self.ask("relevance", query.paper_title, &prompt)?;
                Ok(RelevanceVerdict::from_exact_reply(&reply))
            }
            RelevanceMode::Structured => {
                let prompt = format!(
                    "{preamble}{JSON_ONLY}\n{{\"relevant\": true}}\n\
                     Use false when the paper is not essential."
                );
                let reply: VerdictReply = self.ask_json("relevance", query.paper_title, &prompt)?;
                Ok(if reply.relevant {
                    RelevanceVerdict::Relevant
                } else {
                    RelevanceVerdict::NotRelevant
                })
            }
        }
    }

    fn foundational_topics(&self, query: &TopicQuery<'_>) -> ProviderResult<Vec<String>> {
        let prompt = format!(
            "The project involves the following paper: {paper}.\n\
             Identify all foundational topics required to understand this paper.\n\
             Include both the existing foundational topics: {existing}\n\
             and any additional foundational topics not listed.\n\
             Foundational topics are foundational to the core concepts ({core}) and provide the \
             theoretical or technical background to work with them. They must not include the \
             core concepts themselves. They are more advanced than prerequisites but not as \
             specific as core concepts, e.g. Machine Learning, Deep Learning, Robotic \
             Kinematics, Control Theory. Too basic: Linear Algebra, Calculus, Classical Mechanics.\n\
             {JSON_ONLY}\n\
             {{\"foundational_topics\": [{{\"topic\": \"<topic>\"}}]}}",
            paper = query.paper_title,
            existing = query.existing_concepts.join(", "),
            core = query.core_concepts.join(", "),
        );
        let reply: TopicsReply = self.ask_json("foundational-topics", query.paper_title, &prompt)?;
        Ok(reply
            .foundational_topics
            .into_iter()
            .map(|t| t.topic.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect())
    }

    fn topic_resources(
        &self,
        paper_title: &str,
        topics: &[String],
    ) -> ProviderResult<IndexMap<String, String>> {
        let prompt = format!(
            "The following foundational topics have been identified for the paper \
             '{paper_title}': {}.\n\
             For each topic, recommend a research paper, textbook, or resource that provides a \
             comprehensive introduction to the topic.\n\
             {JSON_ONLY}\n\
             {{\"resources\": [{{\"topic\": \"<topic>\", \"resource\": \"<resource title and author or link>\"}}]}}",
            topics.join(", "),
        );
        let reply = self.ask("topic-resources", paper_title, &prompt)?;
        decode_resources(paper_title, &reply)
    }

    fn explain_relevance(
        &self,
        topic: &str,
        paper_title: &str,
        project_summary: &str,
    ) -> ProviderResult<String> {
        let prompt = format!(
            "Explain why the paper titled '{paper_title}' is relevant to the topic '{topic}' in \
             the context of this project: {project_summary}\n\
             Give a concise explanation (two sentences at most) of its significance."
        );
        let reply = self.ask("explanation", paper_title, &prompt)?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(parse_error("explanation", paper_title, "empty reply"));
        }
        Ok(reply.to_string())
    }
}
