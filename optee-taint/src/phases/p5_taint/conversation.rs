use crate::llm::ChatMessage;
use crate::model::CandidateFlow;
use crate::rag::VectorStore;

/// Which turn of a chain's conversation a given exchange represents,
/// per spec.md §5's start/middle*/end protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationTurn {
    /// First turn: introduces the chain and the destination.
    Start,
    /// An intermediate turn, walking one more hop toward the sink.
    Middle {
        /// 1-based index of this middle turn within the chain.
        hop: usize,
    },
    /// Final turn: the sink call itself, expects the authoritative verdict.
    End,
}

impl ConversationTurn {
    /// Whether this turn's output is expected in the two-line contract
    /// (`{json}` then `FINDINGS=...`) rather than the three-line one.
    #[must_use]
    pub fn uses_two_line_contract(self) -> bool {
        !matches!(self, Self::End)
    }
}

/// One chain's multi-turn conversation with the model, walking from
/// the entry point down to the sink one hop at a time.
pub struct ChainConversation<'a> {
    flow: &'a CandidateFlow,
    history: Vec<ChatMessage>,
    /// Retrieved documentation fragment about the sink API, appended
    /// to the end turn's prompt when RAG is configured (spec.md
    /// §4.5.1's "sink-adjacent turn" context).
    rag_context: Option<String>,
}

impl<'a> ChainConversation<'a> {
    /// Starts a new conversation for `flow`, with no retrieved context.
    #[must_use]
    pub fn new(flow: &'a CandidateFlow) -> Self {
        Self::with_rag_context(flow, None)
    }

    /// Starts a new conversation for `flow`, threading in a
    /// previously-retrieved documentation fragment, if any.
    #[must_use]
    pub fn with_rag_context(flow: &'a CandidateFlow, rag_context: Option<String>) -> Self {
        Self {
            flow,
            history: vec![ChatMessage::system(SYSTEM_PROMPT)],
            rag_context,
        }
    }

    /// Fetches a documentation fragment about a flow's sink API from
    /// `rag`, if one is configured. Returns `None` unconditionally
    /// when `rag` is `None`, so every call site can pass through an
    /// optional store without branching itself.
    pub async fn fetch_rag_context(flow: &CandidateFlow, rag: Option<&dyn VectorStore>) -> Option<String> {
        let store = rag?;
        let docs = store.search_by_api(&flow.destination.sink.sink_function).await;
        if docs.is_empty() {
            return None;
        }
        Some(
            docs.iter()
                .map(|doc| format!("({}) {}", doc.source, doc.text))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    /// Full message history to send for a given turn, including every
    /// prior turn's user/assistant exchange.
    #[must_use]
    pub fn messages_for(&self, turn: ConversationTurn) -> Vec<ChatMessage> {
        let mut messages = self.history.clone();
        let mut prompt = render_turn_prompt(self.flow, turn);
        if matches!(turn, ConversationTurn::End) {
            if let Some(context) = &self.rag_context {
                prompt.push_str(&format!("\n\nReference material on the sink API:\n{context}"));
            }
        }
        messages.push(ChatMessage::user(prompt));
        messages
    }

    /// Records the model's raw response for `turn`, advancing history.
    pub fn record_response(&mut self, turn: ConversationTurn, prompt: String, response: String) {
        self.history.push(ChatMessage::user(prompt));
        self.history.push(ChatMessage {
            role: crate::llm::Role::Assistant,
            content: response,
        });
        let _ = turn;
    }

    /// The full ordered sequence of turns this flow's chain requires:
    /// one `Start`, one `Middle` per interior hop, one `End` at the sink.
    #[must_use]
    pub fn turn_plan(&self) -> Vec<ConversationTurn> {
        let depth = self.flow.chain.depth();
        let mut turns = vec![ConversationTurn::Start];
        for hop in 1..depth {
            turns.push(ConversationTurn::Middle { hop });
        }
        turns.push(ConversationTurn::End);
        turns
    }

    /// Prefix key used by [`super::prefix_cache::PrefixCache`]: the
    /// chain edges walked so far, plus the initial taint-source label.
    #[must_use]
    pub fn prefix_key(&self, up_to_turn: ConversationTurn) -> String {
        let hops = match up_to_turn {
            ConversationTurn::Start => 0,
            ConversationTurn::Middle { hop } => hop,
            ConversationTurn::End => self.flow.chain.depth(),
        };
        let mut key = String::new();
        key.push_str(self.flow.chain.entry_point().unwrap_or("<sink>"));
        for edge in self.flow.chain.edges.iter().take(hops) {
            key.push('>');
            key.push_str(&edge.callee);
        }
        key
    }
}

const SYSTEM_PROMPT: &str = "You are a security reviewer tracing a single call chain in an \
OP-TEE Trusted Application from its entry point to one parameter of one API call, checking \
whether untrusted data from the Rich Execution Environment reaches that parameter unsafely. \
Respond only in the requested format for each turn.";

fn render_turn_prompt(flow: &CandidateFlow, turn: ConversationTurn) -> String {
    match turn {
        ConversationTurn::Start => render_start(flow),
        ConversationTurn::Middle { hop } => render_middle(flow, hop),
        ConversationTurn::End => render_end(flow),
    }
}

fn render_start(flow: &CandidateFlow) -> String {
    let entry = flow.chain.entry_point().unwrap_or("<unknown>");
    format!(
        "Entry point: {entry}\n\
         Destination: {}() parameter {} at {}:{}\n\
         Category under test: {}\n\
         This is the first turn. Summarize what taint could enter at this entry point.\n\
         Respond with a JSON object on the first line describing your initial assessment, \
         then a line `FINDINGS=` listing any findings so far (usually none at this stage).",
        flow.destination.sink.sink_function,
        flow.destination.param_index,
        flow.destination.sink.file.display(),
        flow.destination.sink.line,
        flow.destination.sink.category,
    )
}

fn render_middle(flow: &CandidateFlow, hop: usize) -> String {
    let edge = &flow.chain.edges[hop - 1];
    format!(
        "Next hop: {} calls {} at {}:{}\n\
         Does the tainted value survive this hop unmodified, sanitized, or blocked? \
         Respond with a JSON object on the first line, then `FINDINGS=` with any findings.",
        edge.caller,
        edge.callee,
        edge.file.display(),
        edge.call_site_line,
    )
}

fn render_end(flow: &CandidateFlow) -> String {
    format!(
        "Final hop: the value reaches {}() parameter {} at {}:{} (category {}).\n\
         Give your final verdict. Respond with:\n\
         line 1: {{\"vulnerability_found\": true|false}}\n\
         line 2: a JSON object with decision, severity, rule_id, and explanation\n\
         line 3: `END_FINDINGS=` followed by a JSON array of findings, or an empty array.",
        flow.destination.sink.sink_function,
        flow.destination.param_index,
        flow.destination.sink.file.display(),
        flow.destination.sink.line,
        flow.destination.sink.category,
    )
}
