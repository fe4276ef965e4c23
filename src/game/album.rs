use crate::protocol::{Album, PlayerId, Step, StepContent, StepKind};

impl Step {
    pub fn new(author_id: PlayerId, author: &str, content: StepContent, timed_out: bool) -> Self {
        Self {
            kind: content.kind(),
            author_id,
            author: author.to_string(),
            content,
            timed_out,
        }
    }

    /// Placeholder used when a task was not handed in: empty text for text
    /// tasks, an empty stroke list for drawings.
    pub fn placeholder(author_id: PlayerId, author: &str, kind: StepKind) -> Self {
        Self::new(author_id, author, placeholder_content(kind), true)
    }
}

pub fn placeholder_content(kind: StepKind) -> StepContent {
    match kind {
        StepKind::Prompt => StepContent::Text(String::new()),
        StepKind::Drawing => StepContent::Drawing(Vec::new()),
    }
}

impl Album {
    /// A new album whose first step is its author's prompt.
    pub fn seeded(prompt: Step) -> Self {
        Self {
            author_id: prompt.author_id,
            author_name: prompt.author.clone(),
            steps: vec![prompt],
        }
    }

    /// Steps are append-only.
    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn last(&self) -> Option<&Step> {
        self.steps.last()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[cfg(test)]
    pub fn contributors(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.steps.iter().map(|s| s.author_id)
    }
}
