//! Topic exploration from Wikipedia.
//!
//! Fetches the English article for a topic, keeps the paragraph text and
//! asks the model to pull out key concepts, subtopics, researchers,
//! references and a summary.

use std::time::Duration;

use miette::Diagnostic;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::llm::{LlmError, TextModel, extract_json_object};

/// Characters of article text handed to the model.
pub const ARTICLE_CHARS: usize = 4000;

const DEFAULT_BASE_URL: &str = "https://en.wikipedia.org";

#[derive(Debug, Error, Diagnostic)]
pub enum WikiError {
    #[error("no Wikipedia article for \"{topic}\"")]
    #[diagnostic(
        code(prereq::wiki::page_not_found),
        help("Use the article's exact title, e.g. \"Reinforcement learning\".")
    )]
    PageNotFound { topic: String },

    #[error("failed to fetch {url}: {message}")]
    #[diagnostic(
        code(prereq::wiki::fetch),
        help("Check network access to en.wikipedia.org.")
    )]
    Fetch { url: String, message: String },

    #[error("article for \"{topic}\" has no paragraph text")]
    #[diagnostic(
        code(prereq::wiki::empty),
        help("Disambiguation and redirect pages have no body; try a more specific title.")
    )]
    EmptyArticle { topic: String },

    #[error("could not decode exploration for \"{topic}\": {message}")]
    #[diagnostic(
        code(prereq::wiki::parse),
        help("The model did not return the expected JSON object; retry or switch models.")
    )]
    Parse { topic: String, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),
}

pub type WikiResult<T> = std::result::Result<T, WikiError>;

/// What the model extracted from an article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Exploration {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub key_concepts: Vec<String>,
    #[serde(default)]
    pub subtopics: Vec<String>,
    #[serde(default)]
    pub researchers: Vec<String>,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

/// Paragraph text of an article page, whitespace-collapsed, truncated to
/// `limit` characters.
pub fn article_text(html: &str, limit: usize) -> String {
    let document = Html::parse_document(html);
    let Ok(paragraphs) = Selector::parse("p") else {
        return String::new();
    };

    let mut text = String::new();
    for p in document.select(&paragraphs) {
        let para = p.text().collect::<Vec<_>>().join("");
        let para = para.split_whitespace().collect::<Vec<_>>().join(" ");
        if para.is_empty() {
            continue;
        }
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&para);
        if text.chars().count() >= limit {
            break;
        }
    }
    text.chars().take(limit).collect()
}

pub struct WikiExplorer<M> {
    model: M,
    agent: ureq::Agent,
    base_url: String,
}

impl<M: TextModel> WikiExplorer<M> {
    pub fn new(model: M) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("prereq-tree/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            model,
            agent,
            base_url: DEFAULT_BASE_URL.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch the article for `topic` and analyse it.
    pub fn explore(&self, topic: &str) -> WikiResult<Exploration> {
        let html = self.fetch(topic)?;
        let text = article_text(&html, ARTICLE_CHARS);
        if text.is_empty() {
            return Err(WikiError::EmptyArticle {
                topic: topic.to_string(),
            });
        }
        self.analyze(topic, &text)
    }

    fn fetch(&self, topic: &str) -> WikiResult<String> {
        let title = topic.trim().replace(' ', "_");
        let url = format!("{}/wiki/{title}", self.base_url.trim_end_matches('/'));
        debug!(url = %url, "fetching article");
        match self.agent.get(&url).call() {
            Ok(response) => response.into_string().map_err(|e| WikiError::Fetch {
                url,
                message: format!("read body: {e}"),
            }),
            Err(ureq::Error::Status(404, _)) => Err(WikiError::PageNotFound {
                topic: topic.to_string(),
            }),
            Err(e) => Err(WikiError::Fetch {
                url,
                message: e.to_string(),
            }),
        }
    }

    /// Ask the model for the exploration record of an article's text.
    pub fn analyze(&self, topic: &str, text: &str) -> WikiResult<Exploration> {
        let prompt = format!(
            "Analyze this Wikipedia content for {topic}:\n{text}\n\n\
             Return ONLY a JSON object with this structure, without code fences:\n\
             {{\"key_concepts\": [\"...\"], \"subtopics\": [\"...\"], \"researchers\": [\"...\"], \
             \"references\": [\"...\"], \"summary\": \"...\"}}\n\
             Key concepts are the fundamental ideas needed to understand the topic. \
             Subtopics are major areas within the field. Researchers are significant \
             contributors. References are important papers or books. The summary is \
             a concise explanation of the topic."
        );
        let reply = self
            .model
            .complete(crate::provider::llm::SYSTEM_PROMPT, &prompt)?;
        let parse_err = |message: String| WikiError::Parse {
            topic: topic.to_string(),
            message,
        };
        let json = extract_json_object(&reply)
            .ok_or_else(|| parse_err("no JSON object in reply".into()))?;
        let mut exploration: Exploration =
            serde_json::from_str(json).map_err(|e| parse_err(e.to_string()))?;
        exploration.topic = topic.to_string();

        info!(
            topic,
            key_concepts = exploration.key_concepts.len(),
            subtopics = exploration.subtopics.len(),
            researchers = exploration.researchers.len(),
            references = exploration.references.len(),
            "explored topic"
        );
        Ok(exploration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(&'static str);

    impl TextModel for Canned {
        fn complete(&self, _system: &str, prompt: &str) -> Result<String, LlmError> {
            assert!(prompt.contains("Reinforcement learning"));
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn article_text_keeps_paragraphs_only() {
        let html = r#"<html><body>
            <div class="navbox"><a>Skip me</a></div>
            <p>Reinforcement   learning is an
               area of machine learning.</p>
            <p>   </p>
            <p>It differs from <b>supervised</b> learning.</p>
        </body></html>"#;
        assert_eq!(
            article_text(html, ARTICLE_CHARS),
            "Reinforcement learning is an area of machine learning.\nIt differs from supervised learning."
        );
        assert_eq!(article_text(html, 13), "Reinforcement");
    }

    #[test]
    fn analyze_decodes_fenced_reply() {
        let explorer = WikiExplorer::new(Canned(
            "```json\n{\"key_concepts\": [\"Markov decision process\"], \"subtopics\": [\"Q-learning\"], \
             \"researchers\": [\"Richard Sutton\"], \"references\": [], \"summary\": \"Learning by reward.\"}\n```",
        ));
        let exploration = explorer
            .analyze("Reinforcement learning", "Reinforcement learning is...")
            .unwrap();
        assert_eq!(exploration.topic, "Reinforcement learning");
        assert_eq!(exploration.key_concepts, ["Markov decision process"]);
        assert_eq!(exploration.researchers, ["Richard Sutton"]);
        assert!(exploration.references.is_empty());
        assert_eq!(exploration.summary, "Learning by reward.");
    }

    #[test]
    fn analyze_rejects_prose() {
        let explorer = WikiExplorer::new(Canned("I cannot help with that."));
        assert!(matches!(
            explorer.analyze("Reinforcement learning", "text"),
            Err(WikiError::Parse { .. })
        ));
    }

    #[test]
    fn unreachable_host_is_a_fetch_error() {
        let explorer = WikiExplorer::new(Canned("{}")).with_base_url("http://127.0.0.1:1");
        assert!(matches!(
            explorer.explore("Reinforcement learning"),
            Err(WikiError::Fetch { .. })
        ));
    }
}
