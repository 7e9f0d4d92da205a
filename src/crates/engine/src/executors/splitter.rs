use super::{concat_inputs, GatheredInput};
use crate::error::Result;
use crate::graph::Node;
use crate::result::NodeResult;
use serde_json::Map;

/// **splitter**: breaks the concatenated input into chunks under
/// `config.strategy` (`semantic` default, `sliding`, `fixed`). An empty
/// document or a strategy that produces no chunks falls back to a single
/// chunk holding the whole document.
pub fn execute(node: &Node, inputs: &[GatheredInput]) -> Result<NodeResult> {
    let document = concat_inputs(inputs);
    let chunk_size = node.config_usize("chunk_size", 2000).max(1);
    let strategy = node.config_str("strategy").unwrap_or("semantic");

    let mut chunks = match strategy {
        "sliding" => sliding_chunks(&document, chunk_size, node.config_usize("overlap", 200)),
        "fixed" => fixed_chunks(&document, chunk_size),
        _ => semantic_chunks(&document, chunk_size),
    };

    if chunks.is_empty() {
        chunks.push(document.clone());
    }

    let mut fields = Map::new();
    fields.insert("chunks".to_string(), serde_json::json!(chunks));
    fields.insert("num_chunks".to_string(), serde_json::json!(chunks.len()));
    fields.insert("chunk_size".to_string(), serde_json::json!(chunk_size));

    Ok(NodeResult::structured(chunks.join("\n\n"), fields))
}

fn semantic_chunks(document: &str, chunk_size: usize) -> Vec<String> {
    if document.is_empty() {
        return Vec::new();
    }
    let mut chunks = Vec::new();
    let mut current = String::new();
    for paragraph in document.split("\n\n") {
        let candidate_len = if current.is_empty() { paragraph.len() } else { current.len() + 2 + paragraph.len() };
        if !current.is_empty() && candidate_len > chunk_size {
            chunks.push(current.trim().to_string());
            current = paragraph.to_string();
        } else {
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(paragraph);
        }
    }
    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }
    chunks
}

fn sliding_chunks(document: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if document.is_empty() {
        return Vec::new();
    }
    let chars: Vec<char> = document.chars().collect();
    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

fn fixed_chunks(document: &str, chunk_size: usize) -> Vec<String> {
    if document.is_empty() {
        return Vec::new();
    }
    let chars: Vec<char> = document.chars().collect();
    chars.chunks(chunk_size).map(|c| c.iter().collect()).collect()
}
