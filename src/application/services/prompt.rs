use serde::Deserialize;
use std::fmt::Write;

use crate::domain::{
    recent_turns, Language, Message, PromptBudgetExceeded, RetrievalResult, ScoredChunk,
};

/// Wording of the prompt for one response language.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PromptTemplate {
    pub system: String,
    pub context_header: String,
    pub no_context: String,
    pub history_header: String,
    pub question_label: String,
}

impl PromptTemplate {
    pub fn english() -> Self {
        Self {
            system: "You are a helpful assistant that answers questions based on the provided documents.\n\n\
                     RULES:\n\
                     1. Answer ONLY using the information in the CONTEXT below\n\
                     2. If the answer is not in the context, say \"I don't have information about that in the documents\"\n\
                     3. Be clear and concise\n\
                     4. Cite sources by their number, like [1] or [2]\n\
                     5. Always respond in English"
                .into(),
            context_header: "CONTEXT:".into(),
            no_context: "No documents matched this question.".into(),
            history_header: "CONVERSATION:".into(),
            question_label: "QUESTION:".into(),
        }
    }

    pub fn arabic() -> Self {
        Self {
            system: "أنت مساعد مفيد يجيب على الأسئلة بناءً على المستندات المقدمة.\n\n\
                     القواعد:\n\
                     1. أجب فقط باستخدام المعلومات الموجودة في السياق أدناه\n\
                     2. إذا لم تكن الإجابة موجودة في السياق، قل \"لا تتوفر لدي معلومات حول ذلك في المستندات\"\n\
                     3. كن واضحاً ومختصراً\n\
                     4. استشهد بالمصادر بأرقامها مثل [1] أو [2]\n\
                     5. أجب دائماً باللغة العربية"
                .into(),
            context_header: "السياق:".into(),
            no_context: "لا توجد مستندات مطابقة لهذا السؤال.".into(),
            history_header: "المحادثة:".into(),
            question_label: "السؤال:".into(),
        }
    }
}

/// One template per supported response language.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptTemplates {
    pub english: PromptTemplate,
    pub arabic: PromptTemplate,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            english: PromptTemplate::english(),
            arabic: PromptTemplate::arabic(),
        }
    }
}

impl PromptTemplates {
    pub fn for_language(&self, language: Language) -> &PromptTemplate {
        match language {
            Language::Arabic => &self.arabic,
            Language::English | Language::Unknown => &self.english,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    pub text: String,
    /// Context entries that made it into the prompt, numbered `[1]..` in
    /// this order.
    pub retained: RetrievalResult,
    pub dropped_context: usize,
    pub dropped_history: usize,
}

impl AssembledPrompt {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Builds prompts within a character budget.
///
/// Over budget, the lowest-scoring context entry goes first (the later one on
/// ties), then the oldest history message. The system text and the query are
/// never cut; if they alone overflow, assembly fails.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    max_chars: usize,
    max_history_turns: usize,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(12_000)
    }
}

impl PromptAssembler {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            max_history_turns: 4,
        }
    }

    pub fn with_max_history_turns(mut self, turns: usize) -> Self {
        self.max_history_turns = turns;
        self
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn assemble(
        &self,
        query: &str,
        history: &[Message],
        retrieval: &RetrievalResult,
        template: &PromptTemplate,
    ) -> Result<AssembledPrompt, PromptBudgetExceeded> {
        let required = render(template, &[], &[], query).chars().count();
        if required > self.max_chars {
            return Err(PromptBudgetExceeded {
                required,
                budget: self.max_chars,
            });
        }

        let mut context: Vec<ScoredChunk> = retrieval.entries().to_vec();
        let mut history: &[Message] = recent_turns(history, self.max_history_turns);
        let mut dropped_context = 0;
        let mut dropped_history = 0;

        let mut text = render(template, &context, history, query);
        while text.chars().count() > self.max_chars {
            if let Some(position) = lowest_scoring(&context) {
                context.remove(position);
                dropped_context += 1;
            } else if let Some((_, rest)) = history.split_first() {
                history = rest;
                dropped_history += 1;
            } else {
                break;
            }
            text = render(template, &context, history, query);
        }

        Ok(AssembledPrompt {
            text,
            retained: RetrievalResult::from_ranked(context),
            dropped_context,
            dropped_history,
        })
    }
}

fn lowest_scoring(entries: &[ScoredChunk]) -> Option<usize> {
    entries
        .iter()
        .enumerate()
        .fold(None, |lowest: Option<(usize, f32)>, (i, e)| match lowest {
            Some((_, score)) if e.score > score => lowest,
            _ => Some((i, e.score)),
        })
        .map(|(i, _)| i)
}

fn render(
    template: &PromptTemplate,
    context: &[ScoredChunk],
    history: &[Message],
    query: &str,
) -> String {
    let mut out = String::new();
    out.push_str(&template.system);
    out.push_str("\n\n");
    out.push_str(&template.context_header);
    out.push('\n');

    if context.is_empty() {
        out.push_str(&template.no_context);
    } else {
        for (i, entry) in context.iter().enumerate() {
            if i > 0 {
                out.push_str("\n\n");
            }
            let _ = write!(
                out,
                "[{}] (source: {})\n{}",
                i + 1,
                entry.chunk.source_ref,
                entry.chunk.text
            );
        }
    }

    if !history.is_empty() {
        out.push_str("\n\n");
        out.push_str(&template.history_header);
        for message in history {
            let _ = write!(out, "\n{}: {}", message.role.as_str(), message.content);
        }
    }

    let _ = write!(out, "\n\n{} {}", template.question_label, query);
    out
}
