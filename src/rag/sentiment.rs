//! Zero-shot sentiment classification.
//!
//! Two backends share the `SentimentClassifier` trait:
//!
//! * `ZeroShotClassifier` turns each label into a hypothesis sentence ("This
//!   example is Positive."). The email body and every hypothesis are embedded,
//!   and the cosine similarities are pushed through a temperature-scaled
//!   softmax, so the scores across labels sum to one. The top label wins; ties
//!   go to the label listed first.
//! * `PromptedClassifier` asks a language model to answer with one label and
//!   reads the first label named in the answer.

use anyhow::{Result, anyhow};
use log::{debug, warn};

use crate::config::SentimentConfig;
use crate::domain::email::Sentiment;
use crate::rag::embeddings::{Embedder, cosine_similarity};
use crate::rag::llm::LanguageModel;

const SENTIMENT_PROMPT: &str = r#"Classify the sentiment of this email as exactly one of: {labels}.

Email:
{body}

Respond with ONLY the label. Nothing else."#;

/// Characters of the body sent to the model.
const BODY_PREVIEW_CHARS: usize = 2000;
/// Score reported when the answer names a label.
const MATCHED_SCORE: f32 = 0.85;

pub trait SentimentClassifier {
    fn classify(&self, text: &str) -> Result<Sentiment>;
}

pub struct ZeroShotClassifier {
    embedder: Box<dyn Embedder>,
    labels: Vec<String>,
    hypotheses: Vec<String>,
    temperature: f32,
}

impl ZeroShotClassifier {
    pub fn new(embedder: Box<dyn Embedder>, cfg: &SentimentConfig) -> Result<Self> {
        if cfg.labels.is_empty() {
            return Err(anyhow!("zero-shot classification needs at least one label"));
        }
        if cfg.temperature <= 0.0 {
            return Err(anyhow!("sentiment.temperature must be positive"));
        }
        let hypotheses = cfg
            .labels
            .iter()
            .map(|l| cfg.hypothesis_template.replace("{}", l))
            .collect();
        Ok(Self {
            embedder,
            labels: cfg.labels.clone(),
            hypotheses,
            temperature: cfg.temperature,
        })
    }
}

impl SentimentClassifier for ZeroShotClassifier {
    fn classify(&self, text: &str) -> Result<Sentiment> {
        let mut inputs = Vec::with_capacity(self.hypotheses.len() + 1);
        inputs.push(text.to_string());
        inputs.extend(self.hypotheses.iter().cloned());

        let vectors = self.embedder.embed_batch(&inputs)?;
        let (text_vec, label_vecs) = vectors
            .split_first()
            .ok_or_else(|| anyhow!("embedding backend returned nothing"))?;

        let sims: Vec<f32> = label_vecs
            .iter()
            .map(|v| cosine_similarity(text_vec, v))
            .collect();
        let scores = softmax(&sims, self.temperature);

        let (best, score) = scores
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::MIN), |acc, (i, s)| if s > acc.1 { (i, s) } else { acc });
        debug!("sentiment scores {:?} -> {}", scores, self.labels[best]);

        Ok(Sentiment {
            label: self.labels[best].clone(),
            score,
        })
    }
}

pub struct PromptedClassifier {
    model: Box<dyn LanguageModel>,
    labels: Vec<String>,
}

impl PromptedClassifier {
    pub fn new(model: Box<dyn LanguageModel>, cfg: &SentimentConfig) -> Result<Self> {
        if cfg.labels.is_empty() {
            return Err(anyhow!("zero-shot classification needs at least one label"));
        }
        Ok(Self {
            model,
            labels: cfg.labels.clone(),
        })
    }

    fn build_prompt(&self, text: &str) -> String {
        let preview: String = text.chars().take(BODY_PREVIEW_CHARS).collect();
        SENTIMENT_PROMPT
            .replace("{labels}", &self.labels.join(", "))
            .replace("{body}", &preview)
    }

    /// The label named earliest in `answer`. Unrecognised answers fall back to
    /// "Neutral" when it is a label, else the first label, at chance score.
    fn parse_answer(&self, answer: &str) -> Sentiment {
        let cleaned = answer.trim().to_lowercase();
        let named = self
            .labels
            .iter()
            .filter_map(|l| cleaned.find(&l.to_lowercase()).map(|pos| (pos, l)))
            .min_by_key(|(pos, _)| *pos);

        match named {
            Some((_, label)) => Sentiment {
                label: label.clone(),
                score: MATCHED_SCORE,
            },
            None => {
                warn!("model answered with no known sentiment label: {cleaned}");
                let fallback = self
                    .labels
                    .iter()
                    .find(|l| l.eq_ignore_ascii_case("neutral"))
                    .unwrap_or(&self.labels[0]);
                Sentiment {
                    label: fallback.clone(),
                    score: 1.0 / self.labels.len() as f32,
                }
            }
        }
    }
}

impl SentimentClassifier for PromptedClassifier {
    fn classify(&self, text: &str) -> Result<Sentiment> {
        let answer = self.model.complete(&self.build_prompt(text))?;
        Ok(self.parse_answer(&answer))
    }
}

fn softmax(values: &[f32], temperature: f32) -> Vec<f32> {
    let max = values.iter().copied().fold(f32::MIN, f32::max);
    let exps: Vec<f32> = values
        .iter()
        .map(|v| ((v - max) / temperature).exp())
        .collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Maps texts containing a keyword onto fixed axes.
    struct KeywordEmbedder;

    impl Embedder for KeywordEmbedder {
        fn model(&self) -> &str {
            "keywords"
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    let hit = |words: &[&str]| {
                        if words.iter().any(|w| t.contains(w)) { 1.0 } else { 0.0 }
                    };
                    vec![
                        hit(&["positive", "thanks", "great"]),
                        hit(&["negative", "broken", "angry"]),
                        hit(&["neutral", "question", "when"]),
                    ]
                })
                .collect())
        }
    }

    fn classifier(embedder: Box<dyn Embedder>) -> ZeroShotClassifier {
        ZeroShotClassifier::new(embedder, &SentimentConfig::default()).unwrap()
    }

    #[test]
    fn picks_the_closest_label() {
        let c = classifier(Box::new(KeywordEmbedder));
        assert_eq!(c.classify("Thanks, great service").unwrap().label, "Positive");
        assert_eq!(c.classify("The lid was broken").unwrap().label, "Negative");
        assert_eq!(c.classify("Quick question about hours").unwrap().label, "Neutral");
    }

    #[test]
    fn scores_are_probabilities() {
        let c = classifier(Box::new(KeywordEmbedder));
        let s = c.classify("broken and angry").unwrap();
        assert!(s.score > 1.0 / 3.0 && s.score <= 1.0, "{}", s.score);
    }

    #[test]
    fn same_text_same_label() {
        let c = classifier(Box::new(KeywordEmbedder));
        let body = "My order arrived broken and I am angry.";
        let first = c.classify(body).unwrap();
        assert_eq!(first.label, "Negative");
        for _ in 0..3 {
            assert_eq!(c.classify(body).unwrap(), first);
        }
    }

    /// Answers with a fixed string and records the prompt it was given.
    struct CannedModel {
        answer: &'static str,
        prompts: RefCell<Vec<String>>,
    }

    impl CannedModel {
        fn new(answer: &'static str) -> Self {
            Self {
                answer,
                prompts: RefCell::default(),
            }
        }
    }

    impl LanguageModel for Rc<CannedModel> {
        fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.borrow_mut().push(prompt.to_string());
            Ok(self.answer.to_string())
        }
    }

    fn prompted(answer: &'static str) -> (Rc<CannedModel>, PromptedClassifier) {
        let model = Rc::new(CannedModel::new(answer));
        let c =
            PromptedClassifier::new(Box::new(model.clone()), &SentimentConfig::default()).unwrap();
        (model, c)
    }

    #[test]
    fn prompted_classifier_reads_the_named_label() {
        let (model, c) = prompted(" Negative.\n");
        let s = c.classify("I am furious, this is terrible and broken.").unwrap();
        assert_eq!(s.label, "Negative");
        assert_eq!(s.score, MATCHED_SCORE);

        let prompts = model.prompts.borrow();
        assert!(prompts[0].contains("Positive, Negative, Neutral"));
        assert!(prompts[0].contains("I am furious, this is terrible and broken."));
    }

    #[test]
    fn prompted_classifier_takes_the_earliest_label_in_a_sentence() {
        let (_, c) = prompted("The sentiment is positive, not negative.");
        assert_eq!(c.classify("Thank you so much!").unwrap().label, "Positive");
    }

    #[test]
    fn unrecognised_answer_falls_back_to_neutral() {
        let (_, c) = prompted("I cannot tell.");
        let s = c.classify("When does the store open?").unwrap();
        assert_eq!(s.label, "Neutral");
        assert!((s.score - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn ties_go_to_first_label() {
        let c = classifier(Box::new(KeywordEmbedder));
        let s = c.classify("nothing matches here").unwrap();
        assert_eq!(s.label, "Positive");
        assert!((s.score - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_empty_label_set() {
        let cfg = SentimentConfig {
            labels: vec![],
            ..Default::default()
        };
        assert!(ZeroShotClassifier::new(Box::new(KeywordEmbedder), &cfg).is_err());
    }

    #[test]
    fn softmax_sums_to_one() {
        let p = softmax(&[0.2, 0.5, -0.1], 0.1);
        assert!((p.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(p[1] > p[0] && p[0] > p[2]);
    }
}
