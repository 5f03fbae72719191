#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    Human,
    Infected,
}

/// Keyword tables matched case-insensitively as substrings.
#[derive(Debug, Clone)]
pub struct Classifier {
    infected: Vec<String>,
    human: Vec<String>,
}

impl Classifier {
    pub fn new(infected: &[String], human: &[String]) -> Self {
        let lower = |words: &[String]| words.iter().map(|w| w.to_lowercase()).collect();
        Self {
            infected: lower(infected),
            human: lower(human),
        }
    }

    fn match_text(&self, text: &str) -> Option<Class> {
        if text.is_empty() {
            return None;
        }
        let text = text.to_lowercase();
        if self.infected.iter().any(|k| text.contains(k.as_str())) {
            Some(Class::Infected)
        } else if self.human.iter().any(|k| text.contains(k.as_str())) {
            Some(Class::Human)
        } else {
            None
        }
    }

    /// Clan is checked before name; neither matching means human.
    pub fn classify(&self, name: &str, clan: &str) -> Class {
        self.match_text(clan)
            .or_else(|| self.match_text(name))
            .unwrap_or(Class::Human)
    }

    /// The server writes the local player's class into the clan only.
    pub fn classify_local(&self, clan: &str) -> Class {
        self.match_text(clan).unwrap_or(Class::Human)
    }
}
