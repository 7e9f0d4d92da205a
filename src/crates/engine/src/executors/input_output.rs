use super::{concat_inputs, GatheredInput};
use crate::error::Result;
use crate::graph::Node;
use crate::result::NodeResult;

/// **input**: emits `config.inputValue`, or a literal placeholder when
/// absent or blank. Never makes an external call.
pub fn input(node: &Node) -> Result<NodeResult> {
    let value = node
        .config_str("inputValue")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("Empty Input");
    Ok(NodeResult::Plain(value.to_string()))
}

/// **output**: concatenation of every gathered input by newline.
pub fn output(inputs: &[GatheredInput]) -> Result<NodeResult> {
    Ok(NodeResult::Plain(concat_inputs(inputs)))
}
