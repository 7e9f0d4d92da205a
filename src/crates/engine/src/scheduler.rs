//! The dependency-aware, bounded-concurrency dispatch loop (§4.1). Dispatches
//! ready nodes up to `max_concurrent` at once, waits for *any one* to finish
//! (never barriers on all), re-evaluates readiness, and repeats until the
//! ready and running sets are both empty or the global step counter trips.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{Event, EventSink, ExecutionStats};
use crate::executors::{self, GatheredInput, NodeContext, RunState};
use crate::graph::{Adjacency, Edge, Graph, Node};
use crate::result::NodeResult;
use crate::search::SearchClient;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// §4.1 resolved open question: the 100-step cap counts dispatches (node
/// executions launched), not distinct node identities.
const MAX_STEPS: u64 = 100;

pub struct Scheduler {
    graph: Graph,
    adjacency: Adjacency,
    sink: EventSink,
    run_state: Arc<RunState>,
    chat_model: Arc<llm::OpenRouterClient>,
    search_client: Arc<dyn SearchClient>,
    config: Arc<EngineConfig>,
}

impl Scheduler {
    pub fn new(
        graph: Graph,
        sink: EventSink,
        chat_model: Arc<llm::OpenRouterClient>,
        search_client: Arc<dyn SearchClient>,
        config: Arc<EngineConfig>,
    ) -> Self {
        let adjacency = Adjacency::build(&graph);
        Self { graph, adjacency, sink, run_state: Arc::new(RunState::new()), chat_model, search_client, config }
    }

    fn node_context(&self) -> NodeContext {
        NodeContext {
            sink: self.sink.clone(),
            chat_model: self.chat_model.clone(),
            search_client: self.search_client.clone(),
            run_state: self.run_state.clone(),
            config: self.config.clone(),
        }
    }

    /// Runs the graph to completion, emitting `execution_start` and
    /// `execution_complete` around the dispatch loop.
    pub async fn run(self) {
        self.sink.emit(Event::ExecutionStart);

        let total = self.graph.nodes.len();
        let mut ready: VecDeque<String> = self.graph.roots().into_iter().map(str::to_string).collect();
        let mut running: HashSet<String> = HashSet::new();
        let mut completed: HashSet<String> = HashSet::new();
        let mut failed: HashSet<String> = HashSet::new();
        let mut join_set: tokio::task::JoinSet<(String, crate::error::Result<NodeResult>)> = tokio::task::JoinSet::new();
        let mut steps: u64 = 0;

        loop {
            while !ready.is_empty() && running.len() < self.config.max_concurrent.max(1) && steps < MAX_STEPS {
                let node_id = ready.pop_front().unwrap();
                let node = self.graph.node(&node_id).expect("ready node must exist in graph").clone();
                let (inputs, has_incoming) = self.gather_inputs(&node_id).await;

                if has_incoming && inputs.is_empty() {
                    self.sink.node_skipped(&node_id);
                    failed.insert(node_id);
                    continue;
                }

                steps += 1;
                running.insert(node_id.clone());
                self.sink.node_start(&node_id);
                let ctx = self.node_context();
                join_set.spawn(async move {
                    let result = executors::execute(&node, &inputs, &ctx).await;
                    (node_id, result)
                });
            }

            if join_set.is_empty() {
                break;
            }

            match join_set.join_next().await {
                Some(Ok((node_id, Ok(result)))) => {
                    running.remove(&node_id);
                    self.sink.node_finish(&node_id, result.ui_projection());
                    let is_loop_signal = matches!(&result, NodeResult::Tagged(t) if t.signal == "loop");
                    {
                        let mut results = self.run_state.results.lock().await;
                        results.insert(node_id.clone(), result);
                    }
                    completed.insert(node_id.clone());

                    if is_loop_signal {
                        self.requeue_loop_targets(&node_id, &running, &mut completed, &mut failed, &mut ready);
                    }
                    self.requeue_ready_children(&node_id, &completed, &failed, &running, &mut ready);
                }
                Some(Ok((node_id, Err(err)))) => {
                    running.remove(&node_id);
                    let wrapped = EngineError::node(node_id.clone(), err);
                    self.sink.node_error(&node_id, &wrapped);
                    failed.insert(node_id);
                }
                Some(Err(join_err)) => {
                    self.sink.emit(Event::ExecutionError { node_id: "system".to_string(), error: join_err.to_string() });
                }
                None => break,
            }

            if ready.is_empty() && join_set.is_empty() {
                break;
            }
            if steps >= MAX_STEPS && running.is_empty() {
                tracing::warn!(steps, "step counter tripped, terminating run");
                break;
            }
        }

        self.sink.emit(Event::ExecutionComplete {
            stats: ExecutionStats { completed: completed.len(), failed: failed.len(), total },
        });
    }

    /// §4.2: for each incoming edge, suppress it if the source is tagged and
    /// its signal doesn't match the edge's handle; otherwise propagate. A
    /// node with at least one incoming edge and zero surviving inputs is a
    /// dead branch.
    async fn gather_inputs(&self, node_id: &str) -> (Vec<GatheredInput>, bool) {
        let edges: Vec<&Edge> = self.graph.incoming_edges(node_id).collect();
        if edges.is_empty() {
            return (Vec::new(), false);
        }

        let results = self.run_state.results.lock().await;
        let mut gathered = Vec::new();
        for edge in edges {
            let Some(result) = results.get(&edge.source) else { continue };
            if let NodeResult::Tagged(tagged) = result {
                if let Some(handle) = &edge.source_handle {
                    if handle != &tagged.signal {
                        continue;
                    }
                }
            }
            gathered.push(GatheredInput { source_id: edge.source.clone(), result: result.clone() });
        }
        (gathered, true)
    }

    fn parents_all_completed(&self, node_id: &str, completed: &HashSet<String>) -> bool {
        self.adjacency.parents.get(node_id).map(|parents| parents.iter().all(|p| completed.contains(p))).unwrap_or(true)
    }

    fn requeue_ready_children(
        &self,
        node_id: &str,
        completed: &HashSet<String>,
        failed: &HashSet<String>,
        running: &HashSet<String>,
        ready: &mut VecDeque<String>,
    ) {
        let Some(children) = self.adjacency.children.get(node_id) else { return };
        for child in children {
            if ready.contains(child) || running.contains(child) || completed.contains(child) || failed.contains(child) {
                continue;
            }
            if self.parents_all_completed(child, completed) {
                ready.push_back(child.clone());
            }
        }
    }

    /// §4.1 cycle handling: a `loop` signal moves its loop-handle successors
    /// (and, transitively, their completed descendants) out of `completed`
    /// and `failed` so a fresh readiness check can pick them up again.
    fn requeue_loop_targets(
        &self,
        node_id: &str,
        running: &HashSet<String>,
        completed: &mut HashSet<String>,
        failed: &mut HashSet<String>,
        ready: &mut VecDeque<String>,
    ) {
        let targets: Vec<String> = self
            .graph
            .outgoing_edges(node_id)
            .filter(|e| e.source_handle.as_deref() == Some("loop"))
            .map(|e| e.target.clone())
            .collect();

        for target in targets {
            self.clear_downstream(&target, completed, failed);
            if !running.contains(&target) && !ready.contains(&target) {
                ready.push_back(target);
            }
        }
    }

    fn clear_downstream(&self, node_id: &str, completed: &mut HashSet<String>, failed: &mut HashSet<String>) {
        let mut stack = vec![node_id.to_string()];
        let mut visited = HashSet::new();
        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            let was_completed = completed.remove(&current);
            failed.remove(&current);
            if was_completed || current == node_id {
                if let Some(children) = self.adjacency.children.get(&current) {
                    stack.extend(children.iter().cloned());
                }
            }
        }
    }
}
