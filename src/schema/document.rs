/// Parsed documents from the upstream linguistic pipeline, and their
/// reduction to scripts.
use rustc_hash::FxHashMap;

use super::argument::Argument;
use super::entity::Entity;
use super::event::{Event, Predicate};
use super::mention::Mention;
use super::script::{Script, ScriptError};
use super::token::Token;

const SUBJ_LABELS: &[&str] = &["nsubj", "agent", "nmod:agent"];
const OBJ_LABELS: &[&str] = &["dobj", "obj", "nsubjpass", "nsubj:pass"];
const PRT_LABELS: &[&str] = &["prt", "compound:prt"];
const NEG_LABEL: &str = "neg";
const XCOMP_LABEL: &str = "xcomp";

/// A typed dependency edge between two tokens of one sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub label: String,
    pub gov_idx: usize,
    pub dep_idx: usize,
}

impl Dependency {
    pub fn new(label: impl Into<String>, gov_idx: usize, dep_idx: usize) -> Self {
        Self {
            label: label.into(),
            gov_idx,
            dep_idx,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    pub edges: Vec<Dependency>,
}

impl DependencyGraph {
    pub fn new(edges: Vec<Dependency>) -> Self {
        Self { edges }
    }

    /// Edges where `token_idx` is the dependent.
    pub fn governors(&self, token_idx: usize) -> impl Iterator<Item = &Dependency> {
        self.edges.iter().filter(move |e| e.dep_idx == token_idx)
    }

    /// Edges where `token_idx` is the governor.
    pub fn dependents(&self, token_idx: usize) -> impl Iterator<Item = &Dependency> {
        self.edges.iter().filter(move |e| e.gov_idx == token_idx)
    }

    pub fn is_governed_by(&self, token_idx: usize, label: &str) -> bool {
        self.governors(token_idx).any(|e| e.label == label)
    }

    pub fn has_dependent(&self, token_idx: usize, label: &str) -> bool {
        self.dependents(token_idx).any(|e| e.label == label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub tokens: Vec<Token>,
    pub dep_graph: DependencyGraph,
}

impl Sentence {
    fn dependents_with<'a>(
        &'a self,
        pred_idx: usize,
        labels: &'static [&'static str],
    ) -> impl Iterator<Item = &'a Token> + 'a {
        self.dep_graph
            .dependents(pred_idx)
            .filter(move |e| labels.iter().any(|label| *label == e.label))
            .filter_map(move |e| self.tokens.get(e.dep_idx))
    }

    pub fn subj_list(&self, pred_idx: usize) -> Vec<&Token> {
        self.dependents_with(pred_idx, SUBJ_LABELS).collect()
    }

    pub fn obj_list(&self, pred_idx: usize) -> Vec<&Token> {
        self.dependents_with(pred_idx, OBJ_LABELS).collect()
    }

    /// Prepositional objects from collapsed `prep_<p>` or `nmod:<p>` edges.
    pub fn pobj_list(&self, pred_idx: usize) -> Vec<(String, &Token)> {
        self.dep_graph
            .dependents(pred_idx)
            .filter_map(|e| {
                let prep = e
                    .label
                    .strip_prefix("prep_")
                    .or_else(|| e.label.strip_prefix("nmod:"))?;
                if matches!(prep, "agent" | "poss" | "tmod" | "npmod") {
                    return None;
                }
                Some((prep.to_string(), self.tokens.get(e.dep_idx)?))
            })
            .collect()
    }

    pub fn particle(&self, pred_idx: usize) -> Option<&Token> {
        self.dependents_with(pred_idx, PRT_LABELS).next()
    }
}

/// One mention of a coreference chain, by position in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorefMention {
    pub sent_idx: usize,
    pub start_token_idx: usize,
    pub end_token_idx: usize,
    pub head_token_idx: usize,
    pub rep: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coref {
    pub mentions: Vec<CorefMention>,
}

/// A document as produced by the upstream parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub doc_name: String,
    pub sents: Vec<Sentence>,
    pub corefs: Vec<Coref>,
}

impl Document {
    pub fn entity_from_coref(&self, coref: &Coref) -> Result<Entity, ScriptError> {
        let mentions = coref
            .mentions
            .iter()
            .map(|m| {
                let sent = self.sents.get(m.sent_idx).ok_or_else(|| {
                    ScriptError::Parse(format!(
                        "coref mention in missing sentence {} of {}",
                        m.sent_idx, self.doc_name
                    ))
                })?;
                let tokens = sent
                    .tokens
                    .get(m.start_token_idx..m.end_token_idx)
                    .ok_or_else(|| {
                        ScriptError::Parse(format!(
                            "coref mention span {}..{} outside sentence {} of {}",
                            m.start_token_idx, m.end_token_idx, m.sent_idx, self.doc_name
                        ))
                    })?
                    .to_vec();
                let ner = sent
                    .tokens
                    .get(m.head_token_idx)
                    .map(|t| t.ner.clone())
                    .unwrap_or_default();
                Mention::new(
                    m.sent_idx,
                    m.start_token_idx,
                    m.end_token_idx,
                    m.head_token_idx,
                    m.rep,
                    ner,
                    tokens,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        Entity::new(mentions)
    }
}

impl Script {
    /// Extract events and entities from a parsed document.
    ///
    /// Every verb except `be` and xcomp-governed verbs becomes one event per
    /// (subject, object) candidate combination; verbs with neither are
    /// skipped. Entities map one-to-one onto coreference chains.
    pub fn from_doc(doc: &Document) -> Result<Script, ScriptError> {
        // (sent_idx, head token) -> (entity_idx, mention_idx)
        let mut heads: FxHashMap<(usize, usize), (usize, usize)> = FxHashMap::default();
        for (entity_idx, coref) in doc.corefs.iter().enumerate() {
            for (mention_idx, m) in coref.mentions.iter().enumerate() {
                heads
                    .entry((m.sent_idx, m.head_token_idx))
                    .or_insert((entity_idx, mention_idx));
            }
        }
        let to_arg = |sent_idx: usize, token: &Token| match heads.get(&(sent_idx, token.token_idx)) {
            Some(&(entity_idx, mention_idx)) => {
                Argument::linked(entity_idx, mention_idx, token.clone())
            }
            None => Argument::literal(token.clone()),
        };

        let mut events = Vec::new();
        for (sent_idx, sent) in doc.sents.iter().enumerate() {
            for pred_token in sent.tokens.iter().filter(|t| t.is_verb()) {
                let idx = pred_token.token_idx;
                if pred_token.lemma == "be" || sent.dep_graph.is_governed_by(idx, XCOMP_LABEL) {
                    continue;
                }
                let subj_list = sent.subj_list(idx);
                let obj_list = sent.obj_list(idx);
                if subj_list.is_empty() && obj_list.is_empty() {
                    continue;
                }

                let neg = sent.dep_graph.has_dependent(idx, NEG_LABEL);
                let prt = sent
                    .particle(idx)
                    .map(|t| t.word.to_lowercase())
                    .unwrap_or_default();
                let pobj_list: Vec<(String, Argument)> = sent
                    .pobj_list(idx)
                    .into_iter()
                    .map(|(prep, token)| (prep, to_arg(sent_idx, token)))
                    .collect();

                let subjs: Vec<Option<Argument>> = if subj_list.is_empty() {
                    vec![None]
                } else {
                    subj_list.iter().map(|t| Some(to_arg(sent_idx, t))).collect()
                };
                let objs: Vec<Option<Argument>> = if obj_list.is_empty() {
                    vec![None]
                } else {
                    obj_list.iter().map(|t| Some(to_arg(sent_idx, t))).collect()
                };

                for subj in &subjs {
                    for obj in &objs {
                        events.push(Event::new(
                            Predicate::new(pred_token.clone(), neg, prt.clone())?,
                            subj.clone(),
                            obj.clone(),
                            pobj_list.clone(),
                        )?);
                    }
                }
            }
        }

        if events.is_empty() {
            log::warn!("doc {} has no events", doc.doc_name);
        }
        if doc.corefs.is_empty() {
            log::warn!("doc {} has no corefs", doc.doc_name);
        }

        let entities = doc
            .corefs
            .iter()
            .map(|coref| doc.entity_from_coref(coref))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Script::new(doc.doc_name.clone(), entities, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(idx: usize, word: &str, lemma: &str, pos: &str) -> Token {
        Token::new(word, lemma, pos, idx)
    }

    /// "John did n't give Mary the book in Boston . He wanted to leave ."
    fn sample_doc() -> Document {
        let sent0 = Sentence {
            tokens: vec![
                tok(0, "John", "John", "NNP").with_ner("PERSON"),
                tok(1, "did", "do", "VBD"),
                tok(2, "n't", "not", "RB"),
                tok(3, "give", "give", "VB"),
                tok(4, "Mary", "Mary", "NNP").with_ner("PERSON"),
                tok(5, "the", "the", "DT"),
                tok(6, "book", "book", "NN"),
                tok(7, "in", "in", "IN"),
                tok(8, "Boston", "Boston", "NNP").with_ner("LOCATION"),
                tok(9, ".", ".", "."),
            ],
            dep_graph: DependencyGraph::new(vec![
                Dependency::new("nsubj", 3, 0),
                Dependency::new("aux", 3, 1),
                Dependency::new("neg", 3, 2),
                Dependency::new("iobj", 3, 4),
                Dependency::new("det", 6, 5),
                Dependency::new("dobj", 3, 6),
                Dependency::new("prep_in", 3, 8),
            ]),
        };
        let sent1 = Sentence {
            tokens: vec![
                tok(0, "He", "he", "PRP"),
                tok(1, "wanted", "want", "VBD"),
                tok(2, "to", "to", "TO"),
                tok(3, "leave", "leave", "VB"),
                tok(4, ".", ".", "."),
            ],
            dep_graph: DependencyGraph::new(vec![
                Dependency::new("nsubj", 1, 0),
                Dependency::new("xcomp", 1, 3),
                Dependency::new("nsubj", 3, 0),
            ]),
        };
        Document {
            doc_name: "sample".to_string(),
            sents: vec![sent0, sent1],
            corefs: vec![Coref {
                mentions: vec![
                    CorefMention {
                        sent_idx: 0,
                        start_token_idx: 0,
                        end_token_idx: 1,
                        head_token_idx: 0,
                        rep: true,
                    },
                    CorefMention {
                        sent_idx: 1,
                        start_token_idx: 0,
                        end_token_idx: 1,
                        head_token_idx: 0,
                        rep: false,
                    },
                ],
            }],
        }
    }

    #[test]
    fn extracts_events_and_entities() {
        let script = Script::from_doc(&sample_doc()).unwrap();
        assert_eq!(script.doc_name, "sample");
        assert_eq!(script.entities.len(), 1);
        assert_eq!(script.entities[0].rep_mention().ner, "PERSON");

        // "did" has no arguments and "leave" is xcomp-governed.
        let preds: Vec<&str> = script
            .events
            .iter()
            .map(|e| e.pred.token.lemma.as_str())
            .collect();
        assert_eq!(preds, vec!["give", "want"]);
    }

    #[test]
    fn give_event_details() {
        let script = Script::from_doc(&sample_doc()).unwrap();
        let give = &script.events[0];
        assert!(give.pred.neg);
        assert_eq!(give.subj.as_ref().unwrap().entity_ref(), Some((0, 0)));
        let obj = give.obj.as_ref().unwrap();
        assert!(!obj.is_linked());
        assert_eq!(obj.token().word, "book");
        assert_eq!(give.pobj_list.len(), 1);
        assert_eq!(give.pobj_list[0].0, "in");
        assert_eq!(give.pobj_list[0].1.token().word, "Boston");

        let want = &script.events[1];
        assert_eq!(want.subj.as_ref().unwrap().entity_ref(), Some((0, 1)));
        assert!(want.obj.is_none());
        assert!(script.check_entity_idx_range().is_ok());
    }

    #[test]
    fn cartesian_product_of_candidates() {
        let sent = Sentence {
            tokens: vec![
                tok(0, "cats", "cat", "NNS"),
                tok(1, "dogs", "dog", "NNS"),
                tok(2, "chase", "chase", "VBP"),
                tok(3, "mice", "mouse", "NNS"),
                tok(4, "rats", "rat", "NNS"),
            ],
            dep_graph: DependencyGraph::new(vec![
                Dependency::new("nsubj", 2, 0),
                Dependency::new("nsubj", 2, 1),
                Dependency::new("dobj", 2, 3),
                Dependency::new("dobj", 2, 4),
            ]),
        };
        let doc = Document {
            doc_name: "plural".to_string(),
            sents: vec![sent],
            corefs: Vec::new(),
        };
        let script = Script::from_doc(&doc).unwrap();
        assert_eq!(script.events.len(), 4);
        assert!(!script.has_entities());
    }

    #[test]
    fn particle_is_attached() {
        let sent = Sentence {
            tokens: vec![
                tok(0, "She", "she", "PRP"),
                tok(1, "picked", "pick", "VBD"),
                tok(2, "up", "up", "RP"),
                tok(3, "it", "it", "PRP"),
            ],
            dep_graph: DependencyGraph::new(vec![
                Dependency::new("nsubj", 1, 0),
                Dependency::new("compound:prt", 1, 2),
                Dependency::new("obj", 1, 3),
            ]),
        };
        let doc = Document {
            doc_name: "prt".to_string(),
            sents: vec![sent],
            corefs: Vec::new(),
        };
        let script = Script::from_doc(&doc).unwrap();
        assert_eq!(script.events[0].pred.full_representation(true), "pick_up");
    }

    #[test]
    fn no_events_and_no_corefs_is_an_empty_script() {
        let sent = Sentence {
            tokens: vec![
                tok(0, "Breaking", "breaking", "NN"),
                tok(1, "news", "news", "NN"),
                tok(2, ".", ".", "."),
            ],
            dep_graph: DependencyGraph::new(vec![Dependency::new("compound", 1, 0)]),
        };
        let doc = Document {
            doc_name: "headline".to_string(),
            sents: vec![sent],
            corefs: Vec::new(),
        };
        let script = Script::from_doc(&doc).unwrap();
        assert_eq!(script.doc_name, "headline");
        assert!(!script.has_events());
        assert!(!script.has_entities());

        let empty = Document {
            doc_name: "empty".to_string(),
            sents: Vec::new(),
            corefs: Vec::new(),
        };
        assert_eq!(
            Script::from_doc(&empty).unwrap(),
            Script::new("empty", Vec::new(), Vec::new())
        );
    }

    #[test]
    fn bad_coref_span_is_an_error() {
        let mut doc = sample_doc();
        doc.corefs[0].mentions[1].end_token_idx = 12;
        assert!(Script::from_doc(&doc).is_err());
    }
}
