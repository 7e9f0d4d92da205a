//! One handler per node kind (§4.3). Handlers are pure with respect to
//! scheduler state except for their own slot in the shared conversation
//! memory / loop-iteration maps; the scheduler is the only thing that
//! touches the `ready`/`running`/`completed`/`failed` sets.

pub mod condition_loop;
pub mod consistency;
pub mod debate_voting;
pub mod input_output;
pub mod llm_node;
pub mod moa;
pub mod reduce;
pub mod search;
pub mod splitter;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::events::EventSink;
use crate::graph::{Node, NodeKind};
use crate::result::NodeResult;
use crate::search::SearchClient;
use engine_core::Message;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One parent's contribution to a node's input mapping, gathered and
/// branch-gated by the scheduler before the handler ever runs (§4.2).
#[derive(Debug, Clone)]
pub struct GatheredInput {
    pub source_id: String,
    pub result: NodeResult,
}

impl GatheredInput {
    pub fn text(&self) -> String {
        self.result.text()
    }
}

pub fn concat_inputs(inputs: &[GatheredInput]) -> String {
    inputs.iter().map(GatheredInput::text).collect::<Vec<_>>().join("\n")
}

pub fn concat_inputs_labeled(inputs: &[GatheredInput]) -> String {
    inputs
        .iter()
        .map(|i| format!("[{}]: {}", i.source_id, i.text()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Default)]
pub struct LoopState {
    pub iteration: u64,
}

/// Per-run state shared across concurrently-dispatched node handlers. Each
/// handler only ever writes its own node id's slot.
#[derive(Default)]
pub struct RunState {
    pub results: Mutex<HashMap<String, NodeResult>>,
    pub memory: Mutex<HashMap<String, Vec<Message>>>,
    pub loop_state: Mutex<HashMap<String, LoopState>>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Everything a handler needs besides its node and gathered inputs: the
/// event sink, the external collaborators, and this run's shared state.
#[derive(Clone)]
pub struct NodeContext {
    pub sink: EventSink,
    pub chat_model: Arc<llm::OpenRouterClient>,
    pub search_client: Arc<dyn SearchClient>,
    pub run_state: Arc<RunState>,
    pub config: Arc<EngineConfig>,
}

pub async fn execute(node: &Node, inputs: &[GatheredInput], ctx: &NodeContext) -> Result<NodeResult> {
    match node.kind {
        NodeKind::Input => input_output::input(node),
        NodeKind::Output => input_output::output(inputs),
        NodeKind::Search => search::execute(node, inputs, ctx).await,
        NodeKind::Llm => llm_node::execute(node, inputs, ctx).await,
        NodeKind::Condition => condition_loop::condition(node, inputs),
        NodeKind::Loop => condition_loop::loop_node(node, inputs, ctx).await,
        NodeKind::Splitter => splitter::execute(node, inputs),
        NodeKind::Reduce => reduce::execute(node, inputs, ctx).await,
        NodeKind::SelfConsistency => consistency::execute(node, inputs, ctx).await,
        NodeKind::MoaProposer => moa::proposer(node, inputs, ctx).await,
        NodeKind::MoaAggregator => moa::aggregator(node, inputs, ctx).await,
        NodeKind::Debate => debate_voting::debate(node, inputs, ctx).await,
        NodeKind::Voting => debate_voting::voting(node, inputs, ctx).await,
    }
}
