//! Key/value rows describing what the selected entity saw and did this turn.

use botscope_protocol::{params, Entity, Opcode};
use serde::Serialize;
use serde_json::Value;

/// Opcodes that only carry bookkeeping and are hidden from the output rows.
const HIDDEN_OPCODES: [&str; 2] = ["Log", "Nop"];
const VIEW_PLACEHOLDER: &str = "<view>";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inspection {
    pub id: String,
    pub name: String,
    pub master: bool,
    pub input: Vec<Row>,
    pub output: Vec<Row>,
    pub log: Option<String>,
}

impl Inspection {
    pub fn of(entity: &Entity) -> Self {
        Self {
            id: entity.id.clone(),
            name: entity.display_name().to_string(),
            master: entity.master,
            input: input_rows(entity),
            output: output_rows(entity),
            log: entity.debug_output.clone(),
        }
    }
}

/// Control-function parameters, minus the view and the bot's name.
pub fn input_rows(entity: &Entity) -> Vec<Row> {
    entity
        .input
        .params
        .iter()
        .filter(|(k, _)| k.as_str() != params::VIEW && k.as_str() != params::NAME)
        .map(|(k, v)| Row {
            key: k.clone(),
            value: display_value(v),
        })
        .collect()
}

pub fn output_rows(entity: &Entity) -> Vec<Row> {
    entity
        .output
        .iter()
        .filter(|op| !HIDDEN_OPCODES.contains(&op.opcode.as_str()))
        .map(|op| Row {
            key: op.opcode.clone(),
            value: param_string(op),
        })
        .collect()
}

/// `k=v` pairs joined by commas; views are far too long to show inline.
pub fn param_string(op: &Opcode) -> String {
    op.params
        .iter()
        .map(|(k, v)| {
            if k == params::VIEW {
                format!("{k}={VIEW_PLACEHOLDER}")
            } else {
                format!("{k}={}", display_value(v))
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
